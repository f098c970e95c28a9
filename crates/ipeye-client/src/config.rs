use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ALL_DEVICES_URL: &str = "https://www.ipeye.ru/index.php?route=proc_cam_cart";
pub const DEFAULT_DEVICE_INFO_URL: &str = "https://ipeye.ru/webs/stream_info.php?devid={devcode}";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"), default)]
pub struct ClientConfig {
    pub all_devices_url: String,
    /// Info lookup URL; `{devcode}` is replaced with the device code.
    pub device_info_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            all_devices_url: DEFAULT_ALL_DEVICES_URL.to_string(),
            device_info_url: DEFAULT_DEVICE_INFO_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

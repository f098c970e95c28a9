use serde::{Deserialize, Serialize};

/// A camera entry from the public directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id_user: String,
    pub devcode: String,
    pub name: String,
    /// HLS playlist URL, set once the device's stream server has been resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
}

/// Response of the per-device stream info lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub server: String,
}

/// Fills a stream URL template such as
/// `http://{server}/api/v1/stream/{devcode}/hls/index.m3u8`.
pub fn render_stream_url(template: &str, server: &str, devcode: &str) -> String {
    template
        .replace("{server}", server)
        .replace("{devcode}", devcode)
}

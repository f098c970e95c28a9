use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ipeye_client::config::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, enrich, server};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"), default)]
pub struct Config {
    pub ipeye: ClientConfig,
    pub storage: StorageConfig,
    pub enrich: enrich::Config,
    pub server: server::Config,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"), default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./static/cameras.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"), default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,reqwest=warn,hyper=warn".to_string(),
            ansi: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.enrich.workers == 0 {
            return Err(Error::Config("enrich.workers must be at least 1".to_string()));
        }
        if self.enrich.retries == 0 {
            return Err(Error::Config("enrich.retries must be at least 1".to_string()));
        }
        if self.ipeye.request_timeout.is_zero() {
            return Err(Error::Config(
                "ipeye.request-timeout must be greater than zero".to_string(),
            ));
        }
        if !self.ipeye.device_info_url.contains("{devcode}") {
            return Err(Error::Config(
                "ipeye.device-info-url must contain {devcode}".to_string(),
            ));
        }
        for placeholder in ["{server}", "{devcode}"] {
            if !self.enrich.stream_url_template.contains(placeholder) {
                return Err(Error::Config(format!(
                    "enrich.stream-url-template must contain {placeholder}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args<T: serde::de::DeserializeOwned + Default + Clone + Send + Sync + 'static> {
    #[arg(short, long, env, value_parser = toml_from_file::<T>)]
    pub config: Option<T>,
    #[arg(short, long, env, default_value = "false")]
    pub validate: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Refresh the camera catalog and resolve stream URLs
    Update,
    /// Serve the camera catalog until interrupted
    Serve,
    /// Interactive menu (default)
    Menu,
}

impl<T: serde::de::DeserializeOwned + Default + Clone + Send + Sync + 'static> Args<T> {
    pub fn get_config(&self) -> Result<T> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }

        let default_path = default_config_path();
        if Path::new(&default_path).is_file() {
            toml_from_file(&default_path)
        } else {
            Ok(T::default())
        }
    }
}

pub fn default_config_path() -> String {
    if let Ok(home_dir) = std::env::var("HOME") {
        format!("{home_dir}/.ipeye-viewer/config.toml")
    } else {
        "config.toml".to_string()
    }
}

pub fn toml_from_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let toml = std::fs::read_to_string(path)?;
    config_from_toml(&toml)
}

pub fn config_from_toml<T: serde::de::DeserializeOwned>(toml: &str) -> Result<T> {
    let config_json: serde_json::Value = toml::from_str(toml)?;
    let config = serde_json::from_value(config_json)?;
    Ok(config)
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to download device catalog: {0}")]
    Fetch(#[source] ipeye_client::Error),

    #[error("Failed to load device catalog: {0}")]
    Load(#[source] ipeye_data::Error),

    #[error("Failed to save device catalog: {0}")]
    Save(#[source] ipeye_data::Error),

    #[error("Update cancelled")]
    Cancelled,

    #[error("Client error: {0}")]
    Client(#[from] ipeye_client::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("HTTP server error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Web server error: {0}")]
    Server(String),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

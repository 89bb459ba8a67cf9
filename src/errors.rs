use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("Connection closed by peer: {0}")]
    ConnectionClosed(String),

    #[error("Stream ended")]
    StreamEnded,

    #[error("Shutdown requested")]
    Shutdown,
}

impl AppError {
    /// True when the error is the cooperative shutdown outcome rather than a failure.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, AppError::Shutdown)
    }
}

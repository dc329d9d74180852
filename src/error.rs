use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Instrument identity errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstrumentError {
    #[error("invalid instrument identifier '{input}': {reason}")]
    InvalidIdentifier { input: String, reason: String },
}

impl InstrumentError {
    pub(crate) fn invalid(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Trading calendar errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// Session window rejected at construction.
    #[error("malformed session window: {0}")]
    MalformedWindow(String),

    /// Stage classification fell through every case. The session table is
    /// corrupt or not total; callers must treat this as fatal.
    #[error("internal consistency violation: {0}")]
    InternalConsistencyViolation(String),
}

/// Feed producer errors.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("producer '{id}' construction failed: {reason}")]
    ConstructionFailed { id: String, reason: String },

    /// The remote side refused the session (bad URL, handshake or auth
    /// rejection). Surfaces as the `ConnectFailed` status.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Transport dropped; the producer falls back to `Disconnected` and is
    /// retried by the next reconcile pass.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl From<tokio_tungstenite::tungstenite::Error> for ProducerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ProducerError::WebSocket(Box::new(err))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

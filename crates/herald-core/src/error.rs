use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The envelope `type` does not name a known task kind.
    #[error("Unknown task type: {0}")]
    UnknownKind(String),

    /// The envelope parsed but `data` does not match the shape its `type` requires.
    #[error("Malformed {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid task status: {0}")]
    InvalidStatus(String),

    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    #[error("Invalid repeat: {0}")]
    InvalidRepeat(String),

    #[error("Invalid timestamp {value}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Short error code used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::UnknownKind(_) => "UNKNOWN_KIND",
            CoreError::Payload { .. } => "MALFORMED_PAYLOAD",
            CoreError::InvalidStatus(_) => "INVALID_STATUS",
            CoreError::InvalidOwner(_) => "INVALID_OWNER",
            CoreError::InvalidRepeat(_) => "INVALID_REPEAT",
            CoreError::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            CoreError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

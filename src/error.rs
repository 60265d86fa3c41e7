//! Error types for the OT synchronization engine

/// Result type for otsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the OT synchronization engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Position outside `[0, size]` for insert, `[0, size-1]` for access
    #[error("position {pos} out of bounds (size: {size})")]
    OutOfBounds {
        /// Offending position
        pos: usize,
        /// Size of the sequence at the time of the access
        size: usize,
    },

    /// Client's requested base version is below `min_version`; client must reinitialize
    #[error("version {requested} is stale (retained since {min_version})")]
    StaleVersion {
        /// Version the client asked for
        requested: u64,
        /// Oldest version still retained in history
        min_version: u64,
    },

    /// Negative or future-dated version; protocol error
    #[error("invalid version {0}")]
    InvalidVersion(i64),

    /// Wire format carried an operation tag this build doesn't know
    #[error("unknown operation type: {0}")]
    UnknownOperationType(String),

    /// Failure at the transport boundary
    #[error("transport error: {0}")]
    TransportError(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Channel closed
    #[error("channel closed")]
    ChannelClosed,

    /// Timeout
    #[error("operation timed out")]
    Timeout,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if error is recoverable (caller should retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout | Error::Connection(_) | Error::TransportError(_) | Error::ChannelClosed
        )
    }

    /// Check if error is a client error (bad request equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::OutOfBounds { .. }
                | Error::InvalidVersion(_)
                | Error::UnknownOperationType(_)
                | Error::Protocol(_)
        )
    }

    /// Check if error is a server error (internal fault equivalent)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Config(_))
    }

    /// Get error code for protocol responses
    pub fn error_code(&self) -> u16 {
        match self {
            Error::OutOfBounds { .. } => 400,
            Error::InvalidVersion(_) => 400,
            Error::UnknownOperationType(_) => 400,
            Error::StaleVersion { .. } => 410,
            Error::Timeout => 408,
            Error::Internal(_) | Error::Config(_) => 500,
            Error::Connection(_) | Error::TransportError(_) => 503,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

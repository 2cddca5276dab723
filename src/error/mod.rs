//! Error handling for the tangle node
//!
//! One error type covers every subsystem. Confirmation and gossip loops log
//! these and move on to the next item; nothing in here is meant to take the
//! process down.

use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, TangleError>;

/// Error types for store, gossip and confirmation operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TangleError {
    /// Database-related errors
    Database(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// Network communication errors
    Network(String),
    /// File I/O errors
    Io(String),
    /// A transaction is missing persisted fields it should have
    Integrity(String),
    /// A value-bearing transaction sits behind the snapshot trim horizon
    SnapshotHorizon { value: i64 },
    /// Frame that cannot be split into transaction bytes and requested hash
    InvalidFrame(String),
}

impl fmt::Display for TangleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TangleError::Database(msg) => write!(f, "Database error: {msg}"),
            TangleError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            TangleError::Config(msg) => write!(f, "Configuration error: {msg}"),
            TangleError::Network(msg) => write!(f, "Network error: {msg}"),
            TangleError::Io(msg) => write!(f, "I/O error: {msg}"),
            TangleError::Integrity(msg) => write!(f, "Database inconsistency: {msg}"),
            TangleError::SnapshotHorizon { value } => write!(
                f,
                "Value transaction ({value}) confirmation behind snapshot horizon"
            ),
            TangleError::InvalidFrame(msg) => write!(f, "Invalid frame: {msg}"),
        }
    }
}

impl std::error::Error for TangleError {}

impl From<std::io::Error> for TangleError {
    fn from(err: std::io::Error) -> Self {
        TangleError::Io(err.to_string())
    }
}

impl From<sled::Error> for TangleError {
    fn from(err: sled::Error) -> Self {
        TangleError::Database(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<TangleError>> for TangleError {
    fn from(err: sled::transaction::TransactionError<TangleError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => TangleError::Database(e.to_string()),
        }
    }
}

impl From<bincode::error::EncodeError> for TangleError {
    fn from(err: bincode::error::EncodeError) -> Self {
        TangleError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for TangleError {
    fn from(err: bincode::error::DecodeError) -> Self {
        TangleError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for TangleError {
    fn from(err: toml::de::Error) -> Self {
        TangleError::Config(err.to_string())
    }
}

impl TangleError {
    /// Integrity and horizon errors point at on-disk state, not at a caller
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            TangleError::Integrity(_) | TangleError::SnapshotHorizon { .. }
        )
    }
}

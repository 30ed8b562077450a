//! Error types for the kith storage core.

use std::sync::Arc;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Storage error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Connection not opened")]
    ConnectionClosed,

    #[error("Backing store initialization failed: {0}")]
    StoreInit(String),

    #[error("Persistence flush failed: {0}")]
    Flush(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Failure of a single-flight attempt, handed to every caller that
    /// waited on it.
    #[error("{0}")]
    Shared(Arc<Error>),
}

/// How the façade should react to a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Connection-state problem; reconnect and retry once.
    Transient,
    /// Integrity constraint rejected the statement.
    ConstraintViolation,
    /// Everything else.
    Fatal,
}

impl Error {
    /// Classify this error for the retry policy.
    ///
    /// Structured SQLite codes decide first. Message text is only consulted
    /// for conditions SQLite reports as a generic `SQLITE_ERROR`.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Shared(inner) => inner.class(),
            Error::ConnectionClosed => ErrorClass::Transient,
            Error::Sqlite(rusqlite::Error::SqliteFailure(err, msg)) => match err.code {
                ErrorCode::ApiMisuse | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    ErrorClass::Transient
                }
                ErrorCode::ConstraintViolation => ErrorClass::ConstraintViolation,
                _ if msg.as_deref().is_some_and(is_transient_message) => ErrorClass::Transient,
                _ => ErrorClass::Fatal,
            },
            Error::Sqlite(e) if is_transient_message(&e.to_string()) => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    /// True when the engine refused to begin a transaction because one is
    /// already active on this connection.
    pub fn is_nested_transaction(&self) -> bool {
        match self {
            Error::Shared(inner) => inner.is_nested_transaction(),
            Error::Sqlite(e) => is_nested_transaction_message(&e.to_string()),
            _ => false,
        }
    }

    /// True for foreign key violations specifically.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            Error::Shared(inner) => inner.is_foreign_key_violation(),
            Error::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
            }
            _ => false,
        }
    }

    /// The underlying error, looking through shared single-flight failures.
    pub fn root(&self) -> &Error {
        match self {
            Error::Shared(inner) => inner.root(),
            other => other,
        }
    }
}

fn is_transient_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("not opened")
        || msg.contains("database is closed")
        || is_nested_transaction_message(&msg)
}

fn is_nested_transaction_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("within a transaction") || msg.contains("transaction is already active")
}

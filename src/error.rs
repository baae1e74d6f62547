//! Error types for the bridge.
//!
//! Everything below the boundary returns `Result<T, BridgeError>`; only the
//! dispatcher turns an error into the `{"error": ...}` envelope.

use thiserror::Error;

use crate::pg::PgError;
use crate::session::SessionKind;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Connection string rejected, or network/authentication failure.
    #[error("{0}")]
    Connect(PgError),

    /// Unknown handle, or a session already closed by another caller.
    #[error("invalid handle")]
    InvalidHandle,

    #[error("bad params json: {0}")]
    BadParams(String),

    /// The server or driver failed the statement.
    #[error("{0}")]
    Query(PgError),

    #[error("{0}")]
    Close(PgError),

    #[error("handle {handle} is a {actual} session, not a {expected} session")]
    WrongSessionKind {
        handle: u64,
        expected: SessionKind,
        actual: SessionKind,
    },

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("internal panic: {0}")]
    Panic(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(BridgeError::InvalidHandle.to_string(), "invalid handle");
        assert_eq!(
            BridgeError::BadParams("EOF while parsing a list".to_string()).to_string(),
            "bad params json: EOF while parsing a list"
        );
        assert_eq!(
            BridgeError::Query(PgError::ConnectionClosed).to_string(),
            PgError::ConnectionClosed.to_string()
        );
        assert_eq!(
            BridgeError::WrongSessionKind {
                handle: 3,
                expected: SessionKind::Connection,
                actual: SessionKind::Pool,
            }
            .to_string(),
            "handle 3 is a pool session, not a connection session"
        );
    }
}

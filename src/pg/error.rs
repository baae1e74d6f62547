//! Error types for the PostgreSQL client.

use std::fmt;
use std::io;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur while talking to a PostgreSQL server.
#[derive(Debug)]
pub enum PgError {
    /// I/O error during communication.
    Io(io::Error),

    /// Protocol error (unexpected message, invalid format, etc.).
    Protocol(String),

    /// Authentication failed.
    Auth(String),

    /// Server returned an error.
    Server {
        severity: String,
        code: String,
        message: String,
        detail: Option<String>,
        hint: Option<String>,
    },

    /// A value could not be decoded from its wire representation.
    Type(String),

    /// The connection string or a connection option is invalid.
    Config(String),

    /// Connection is closed or in invalid state.
    ConnectionClosed,

    /// The pool has been closed and hands out no more connections.
    PoolClosed,

    /// Connection establishment did not finish in time.
    Timeout,
}

impl PgError {
    /// SQLSTATE code for server errors.
    pub fn code(&self) -> Option<&str> {
        match self {
            PgError::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the error leaves the connection unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            PgError::Io(_) | PgError::ConnectionClosed | PgError::Protocol(_) => true,
            PgError::Server { severity, .. } => severity == "FATAL" || severity == "PANIC",
            _ => false,
        }
    }
}

impl fmt::Display for PgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgError::Io(e) => write!(f, "I/O error: {}", e),
            PgError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            PgError::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            PgError::Server {
                severity,
                code,
                message,
                detail,
                hint,
            } => {
                write!(f, "{}: {} (SQLSTATE {})", severity, message, code)?;
                if let Some(d) = detail {
                    write!(f, "\nDetail: {}", d)?;
                }
                if let Some(h) = hint {
                    write!(f, "\nHint: {}", h)?;
                }
                Ok(())
            }
            PgError::Type(msg) => write!(f, "Type error: {}", msg),
            PgError::Config(msg) => write!(f, "Invalid connection string: {}", msg),
            PgError::ConnectionClosed => write!(f, "Connection is closed"),
            PgError::PoolClosed => write!(f, "Pool is closed"),
            PgError::Timeout => write!(f, "Connection attempt timed out"),
        }
    }
}

impl std::error::Error for PgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PgError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PgError {
    fn from(e: io::Error) -> Self {
        PgError::Io(e)
    }
}

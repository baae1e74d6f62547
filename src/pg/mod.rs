//! Custom PostgreSQL wire protocol implementation.
//!
//! This module provides the PostgreSQL client the bridge drives:
//! - Simple query protocol for raw SQL text
//! - Extended protocol on the unnamed statement for bound parameters
//! - Text-format results decoded into typed values
//!
//! Architecture:
//! - `protocol`: Low-level wire protocol encoding/decoding
//! - `connection`: Connection state machine and management
//! - `types`: PostgreSQL type decoding
//! - `array`: Array literal parsing and formatting
//! - `scram`: SCRAM-SHA-256 authentication
//! - `pool`: Connection pool with health checks

pub mod array;
pub mod connection;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod scram;
pub mod types;


// Public API re-exports for library consumers
pub use connection::{PgConfig, PgConnection, QueryResult, Row};
pub use error::{PgError, PgResult};
pub use pool::{PgPool, PoolSettings, PooledConnection};
pub use types::{Oid, PgValue};

//! pgbridge - drive PostgreSQL from any language that can call C.
//!
//! Callers open a connection or a pool and receive an integer handle, then
//! run queries and statements against that handle. Every call returns JSON
//! text: the payload on success, `{"error": "..."}` otherwise.
//!
//! - `ffi`: the exported C functions
//! - `dispatcher`: `Bridge`, owner of the runtime and the registry
//! - `registry`: handle allocation and lookup
//! - `session`: single connection or pool behind one interface
//! - `codec`: JSON parameters in, JSON rows out
//! - `pg`: the PostgreSQL client

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod ffi;
mod logging;
pub mod pg;
pub mod registry;
pub mod session;

#[cfg(all(test, feature = "postgres-integration-tests"))]
mod tests;

pub use dispatcher::Bridge;
pub use error::{BridgeError, Result};
pub use registry::{Handle, SessionRegistry};
pub use session::{Session, SessionKind};

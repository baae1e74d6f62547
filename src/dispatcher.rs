//! Boundary dispatcher.
//!
//! `Bridge` owns the tokio runtime and the session registry. Each boundary
//! call blocks its calling thread on the runtime until the database work is
//! done, so independent callers run in parallel on their own threads.
//!
//! The `try_*` methods return typed results; the rest produce the JSON text
//! handed back across the boundary, which is always either a payload or an
//! `{"error": "..."}` envelope.

use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};

use crate::codec::{decode_params, encode_rows, RowFormat};
use crate::error::{BridgeError, Result};
use crate::logging;
use crate::pg::PoolSettings;
use crate::registry::{Handle, SessionRegistry};
use crate::session::{Session, SessionKind};

/// Environment variable overriding the number of runtime worker threads.
pub const WORKER_THREADS_ENV: &str = "PGBRIDGE_WORKER_THREADS";

static GLOBAL: OnceCell<Bridge> = OnceCell::new();

#[derive(Serialize)]
struct HandleBody {
    handle: Handle,
}

#[derive(Serialize)]
struct OkBody {
    ok: bool,
}

#[derive(Serialize)]
struct RowsAffectedBody {
    rows_affected: u64,
}

#[derive(Serialize)]
struct ShutdownBody {
    ok: bool,
    closed: usize,
}

#[derive(Serialize)]
struct VersionBody {
    version: &'static str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

pub struct Bridge {
    runtime: Runtime,
    sessions: SessionRegistry,
    pool_settings: PoolSettings,
}

impl Bridge {
    pub fn new() -> Result<Self> {
        Self::with_pool_settings(PoolSettings::DEFAULT)
    }

    /// A bridge whose pools use `pool_settings` instead of the defaults.
    pub fn with_pool_settings(pool_settings: PoolSettings) -> Result<Self> {
        logging::init();

        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name("pgbridge-worker");
        if let Some(threads) = worker_threads()? {
            builder.worker_threads(threads);
        }
        let runtime = builder
            .build()
            .map_err(|e| BridgeError::Runtime(e.to_string()))?;

        Ok(Self {
            runtime,
            sessions: SessionRegistry::new(),
            pool_settings,
        })
    }

    /// The process-wide bridge used by the exported C functions.
    pub fn global() -> Result<&'static Bridge> {
        GLOBAL.get_or_try_init(Bridge::new)
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    // ========================================================================
    // Typed operations
    // ========================================================================

    pub fn try_connect(&self, url: &str) -> Result<Handle> {
        let session = self
            .runtime
            .block_on(Session::connect(url))
            .inspect_err(|err| tracing::warn!(error = %err, "connect failed"))?;
        let handle = self.sessions.allocate(session);
        tracing::info!(handle, "connection opened");
        Ok(handle)
    }

    pub fn try_connect_pool(&self, url: &str) -> Result<Handle> {
        let session = self
            .runtime
            .block_on(Session::connect_pool(url, self.pool_settings))
            .inspect_err(|err| tracing::warn!(error = %err, "pool connect failed"))?;
        let handle = self.sessions.allocate(session);
        tracing::info!(
            handle,
            max_connections = self.pool_settings.max_connections,
            "pool opened"
        );
        Ok(handle)
    }

    /// Run a query and return its encoded rows.
    pub fn try_query(&self, handle: Handle, sql: &str, params: &str, format: &str) -> Result<String> {
        let session = self.sessions.lookup(handle).ok_or(BridgeError::InvalidHandle)?;
        let params = decode_params(params)?;
        let format = RowFormat::from_flag(format);
        tracing::debug!(handle, bound = params.is_some(), ?format, "query");

        let result = self
            .runtime
            .block_on(session.query(sql, params.as_deref()))?;
        Ok(encode_rows(&result, format)?)
    }

    pub fn try_execute(&self, handle: Handle, sql: &str, params: &str) -> Result<u64> {
        let session = self.sessions.lookup(handle).ok_or(BridgeError::InvalidHandle)?;
        let params = decode_params(params)?;
        tracing::debug!(handle, bound = params.is_some(), "execute");

        self.runtime.block_on(session.execute(sql, params.as_deref()))
    }

    /// Close the session named by `handle`, which must be of kind `expected`.
    ///
    /// The handle is unregistered only when the close succeeds.
    pub fn try_close(&self, handle: Handle, expected: SessionKind) -> Result<()> {
        let session = self.sessions.lookup(handle).ok_or(BridgeError::InvalidHandle)?;
        let actual = session.kind();
        if actual != expected {
            return Err(BridgeError::WrongSessionKind {
                handle,
                expected,
                actual,
            });
        }

        self.runtime
            .block_on(session.close())
            .inspect_err(|err| tracing::warn!(handle, error = %err, "close failed"))?;
        self.sessions.remove(handle);
        tracing::info!(handle, kind = %actual, "session closed");
        Ok(())
    }

    /// Close every open session and empty the registry.
    ///
    /// Returns the number of sessions this call closed.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        for (handle, session) in self.sessions.drain() {
            match self.runtime.block_on(session.close()) {
                Ok(()) => closed += 1,
                // Closed concurrently by another caller
                Err(BridgeError::InvalidHandle) => {}
                Err(err) => tracing::warn!(handle, error = %err, "close during shutdown failed"),
            }
        }
        closed
    }

    // ========================================================================
    // Boundary operations
    // ========================================================================

    /// `{"handle": N}` or an error envelope.
    pub fn connect(&self, url: &str) -> String {
        respond(self.try_connect(url).map(|handle| HandleBody { handle }))
    }

    pub fn connect_pool(&self, url: &str) -> String {
        respond(self.try_connect_pool(url).map(|handle| HandleBody { handle }))
    }

    /// Rows as JSON (named for format `json`, positional otherwise) or an
    /// error envelope.
    pub fn query(&self, handle: Handle, sql: &str, params: &str, format: &str) -> String {
        match self.try_query(handle, sql, params, format) {
            Ok(body) => body,
            Err(err) => error_envelope(&err),
        }
    }

    /// `{"rows_affected": N}` or an error envelope.
    pub fn execute(&self, handle: Handle, sql: &str, params: &str) -> String {
        respond(
            self.try_execute(handle, sql, params)
                .map(|rows_affected| RowsAffectedBody { rows_affected }),
        )
    }

    /// `{"ok": true}` or an error envelope.
    pub fn close(&self, handle: Handle) -> String {
        respond(
            self.try_close(handle, SessionKind::Connection)
                .map(|()| OkBody { ok: true }),
        )
    }

    pub fn close_pool(&self, handle: Handle) -> String {
        respond(
            self.try_close(handle, SessionKind::Pool)
                .map(|()| OkBody { ok: true }),
        )
    }

    /// `{"ok": true, "closed": N}`.
    pub fn shutdown(&self) -> String {
        let closed = self.close_all();
        tracing::info!(closed, "bridge shut down");
        respond(Ok(ShutdownBody { ok: true, closed }))
    }

    pub fn version(&self) -> String {
        version()
    }
}

/// `{"version": "<crate version>"}`.
pub fn version() -> String {
    respond(Ok(VersionBody {
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Serialize a payload, or the error envelope on failure.
pub fn respond<T: Serialize>(result: Result<T>) -> String {
    match result.and_then(|body| serde_json::to_string(&body).map_err(BridgeError::from)) {
        Ok(body) => body,
        Err(err) => error_envelope(&err),
    }
}

/// `{"error": "<message>"}`.
pub fn error_envelope(err: &BridgeError) -> String {
    let message = err.to_string();
    serde_json::to_string(&ErrorBody { error: &message })
        .unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string())
}

fn worker_threads() -> Result<Option<usize>> {
    match std::env::var(WORKER_THREADS_ENV) {
        Ok(value) => match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(BridgeError::Runtime(format!(
                "{} must be a positive integer, got {:?}",
                WORKER_THREADS_ENV, value
            ))),
        },
        Err(_) => Ok(None),
    }
}

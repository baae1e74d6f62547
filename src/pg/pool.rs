//! PostgreSQL connection pool.
//!
//! This module provides a connection pool built on top of our custom
//! PostgreSQL connection implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::connection::{PgConfig, PgConnection};
use super::error::{PgError, PgResult};
use super::protocol::TransactionStatus;

// ============================================================================
// Pool Settings
// ============================================================================

/// Connection pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of connections checked out at once
    pub max_connections: u32,
    /// Connections opened up front and kept warm
    pub min_connections: u32,
    /// An idle connection older than this is pinged before reuse
    pub health_check_interval: Duration,
}

impl PoolSettings {
    pub const DEFAULT: PoolSettings = PoolSettings {
        max_connections: 10,
        min_connections: 1,
        health_check_interval: Duration::from_secs(60),
    };

    /// Set the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the health check interval.
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// Pooled Connection
// ============================================================================

/// A connection checked out from the pool.
///
/// When dropped, the connection is returned to the pool.
pub struct PooledConnection {
    /// The actual connection (None when returned to pool)
    conn: Option<PgConnection>,
    /// Reference back to the pool
    pool: Arc<PgPoolInner>,
    /// Semaphore permit (controls pool size)
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Borrow the underlying connection.
    pub fn connection_mut(&mut self) -> PgResult<&mut PgConnection> {
        self.conn.as_mut().ok_or(PgError::ConnectionClosed)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Only idle, healthy connections go back to an open pool; one
            // left inside a transaction is dropped, which closes its socket
            let reusable = !conn.is_closed()
                && conn.transaction_status() == TransactionStatus::Idle
                && !self.pool.closed.load(Ordering::Acquire);
            if reusable {
                let mut idle = self.pool.idle_connections.lock();
                idle.push(conn);
            }
        }
    }
}

// ============================================================================
// Pool Inner
// ============================================================================

/// Internal pool state.
struct PgPoolInner {
    /// Parsed once at construction and reused for every new connection
    config: PgConfig,
    settings: PoolSettings,
    /// Idle connections waiting to be used
    idle_connections: Mutex<Vec<PgConnection>>,
    /// Semaphore to limit total connections
    semaphore: Arc<Semaphore>,
    closed: AtomicBool,
}

// ============================================================================
// Connection Pool
// ============================================================================

/// A PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgPool {
    inner: Arc<PgPoolInner>,
}

impl PgPool {
    /// Create a new connection pool.
    ///
    /// `min_connections` connections are opened before this returns; failure
    /// to open any of them fails construction.
    pub async fn connect(url: &str, settings: PoolSettings) -> PgResult<Self> {
        if settings.max_connections == 0 || settings.min_connections > settings.max_connections {
            return Err(PgError::Config(format!(
                "invalid pool size: min {} max {}",
                settings.min_connections, settings.max_connections
            )));
        }

        let config = PgConfig::from_url(url)?;
        let inner = Arc::new(PgPoolInner {
            semaphore: Arc::new(Semaphore::new(settings.max_connections as usize)),
            config,
            settings,
            idle_connections: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        let pool = Self { inner };

        // Pre-create minimum connections
        for _ in 0..settings.min_connections {
            let conn = pool.create_connection().await?;
            pool.inner.idle_connections.lock().push(conn);
        }

        Ok(pool)
    }

    /// Get a connection from the pool.
    ///
    /// Waits while `max_connections` are checked out. An idle connection
    /// unused for longer than the health check interval is pinged first and
    /// replaced if the ping fails.
    pub async fn acquire(&self) -> PgResult<PooledConnection> {
        if self.is_closed() {
            return Err(PgError::PoolClosed);
        }

        // Acquire a permit (blocks if pool is exhausted)
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PgError::PoolClosed)?;

        let conn = loop {
            let candidate = self.inner.idle_connections.lock().pop();
            match candidate {
                Some(c) if c.is_closed() => continue,
                Some(mut c) => {
                    if c.idle_for() < self.inner.settings.health_check_interval {
                        break c;
                    }
                    match c.ping().await {
                        Ok(()) => break c,
                        Err(err) => {
                            tracing::debug!(error = %err, "discarding pooled connection that failed health check");
                            continue;
                        }
                    }
                }
                None => break self.create_connection().await?,
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Close the pool and all idle connections.
    ///
    /// Only the first call succeeds; later calls return `PoolClosed`.
    /// Checked-out connections are dropped when their holders release them.
    pub async fn close(&self) -> PgResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(PgError::PoolClosed);
        }
        self.inner.semaphore.close();

        // Drain and close all idle connections
        let connections = {
            let mut idle = self.inner.idle_connections.lock();
            std::mem::take(&mut *idle)
        };

        for mut conn in connections {
            if let Err(err) = conn.close().await {
                tracing::debug!(error = %err, "error closing pooled connection");
            }
        }

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the current number of idle connections.
    pub fn idle_count(&self) -> usize {
        self.inner.idle_connections.lock().len()
    }

    /// Create a new connection with the pool's configuration.
    async fn create_connection(&self) -> PgResult<PgConnection> {
        PgConnection::connect_with_config(self.inner.config.clone()).await
    }
}

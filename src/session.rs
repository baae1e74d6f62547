//! Sessions: a single connection or a pool behind query, execute and close.

use std::fmt;

use tokio::sync::Mutex;

use crate::error::{BridgeError, Result};
use crate::pg::{PgConnection, PgError, PgPool, PgResult, PoolSettings, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Connection,
    Pool,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Connection => f.write_str("connection"),
            SessionKind::Pool => f.write_str("pool"),
        }
    }
}

/// A live database session owned by the registry.
pub enum Session {
    /// One connection. The slot empties on close, so a caller that loses a
    /// race with close sees `InvalidHandle`.
    Connection(Mutex<Option<PgConnection>>),
    /// A pool; every call checks out its own connection.
    Pool(PgPool),
}

impl Session {
    pub async fn connect(url: &str) -> Result<Self> {
        let conn = PgConnection::connect(url)
            .await
            .map_err(BridgeError::Connect)?;
        Ok(Session::Connection(Mutex::new(Some(conn))))
    }

    pub async fn connect_pool(url: &str, settings: PoolSettings) -> Result<Self> {
        let pool = PgPool::connect(url, settings)
            .await
            .map_err(BridgeError::Connect)?;
        Ok(Session::Pool(pool))
    }

    pub fn kind(&self) -> SessionKind {
        match self {
            Session::Connection(_) => SessionKind::Connection,
            Session::Pool(_) => SessionKind::Pool,
        }
    }

    /// Run `sql` and return its rows.
    ///
    /// `None` sends the text verbatim (several statements allowed, the last
    /// one's result is returned); `Some` binds the parameters to a single
    /// statement.
    pub async fn query(&self, sql: &str, params: Option<&[Option<String>]>) -> Result<QueryResult> {
        match self {
            Session::Connection(slot) => {
                let mut guard = slot.lock().await;
                let conn = guard.as_mut().ok_or(BridgeError::InvalidHandle)?;
                run(conn, sql, params).await.map_err(BridgeError::Query)
            }
            Session::Pool(pool) => {
                let mut pooled = pool.acquire().await.map_err(|err| match err {
                    PgError::PoolClosed => BridgeError::InvalidHandle,
                    err => BridgeError::Query(err),
                })?;
                let conn = pooled.connection_mut().map_err(BridgeError::Query)?;
                run(conn, sql, params).await.map_err(BridgeError::Query)
            }
        }
    }

    /// Run `sql` and return the number of rows it affected.
    pub async fn execute(&self, sql: &str, params: Option<&[Option<String>]>) -> Result<u64> {
        self.query(sql, params).await.map(|r| r.rows_affected())
    }

    /// Release the underlying connection(s).
    ///
    /// A single connection whose release fails is put back, so the session
    /// stays usable and a retried close can still find it.
    pub async fn close(&self) -> Result<()> {
        match self {
            Session::Connection(slot) => {
                let mut guard = slot.lock().await;
                let mut conn = guard.take().ok_or(BridgeError::InvalidHandle)?;
                match conn.close().await {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        *guard = Some(conn);
                        Err(BridgeError::Close(err))
                    }
                }
            }
            Session::Pool(pool) => pool.close().await.map_err(|err| match err {
                PgError::PoolClosed => BridgeError::InvalidHandle,
                err => BridgeError::Close(err),
            }),
        }
    }
}

async fn run(
    conn: &mut PgConnection,
    sql: &str,
    params: Option<&[Option<String>]>,
) -> PgResult<QueryResult> {
    match params {
        Some(params) => conn.query(sql, params).await,
        None => {
            let mut results = conn.simple_query(sql).await?;
            Ok(results.pop().unwrap_or_default())
        }
    }
}

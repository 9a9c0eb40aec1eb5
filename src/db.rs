use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use sqlx::{
    pool::PoolConnection,
    postgres::{PgConnection, PgPoolOptions},
    PgPool, Postgres,
};
use tracing::{debug, error, info, trace};

use crate::config::DatabaseConfig;

/// Bounded pool of Postgres connections.
///
/// `acquire` suspends while every connection is checked out and gives up with
/// `sqlx::Error::PoolTimedOut` after the configured acquire timeout. The first
/// acquisition of the process logs which role/database the pool talks to; a
/// failure there is logged and otherwise ignored.
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
    identity_checked: Arc<AtomicBool>,
}

/// A checked-out connection. Dropping it hands it back to the pool.
pub struct PooledConn {
    inner: PoolConnection<Postgres>,
}

impl DbPool {
    /// Build the pool without opening any connection yet, so an unreachable
    /// database does not stop the process from starting.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            identity_checked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn acquire(&self) -> Result<PooledConn, sqlx::Error> {
        let acquired = self.pool.acquire().await;
        let first_use = !self.identity_checked.swap(true, Ordering::AcqRel);

        let mut inner = match acquired {
            Ok(conn) => conn,
            Err(e) => {
                if first_use {
                    error!(error = %e, "database unreachable on first use; pool stays available");
                }
                return Err(e);
            }
        };

        if first_use {
            log_identity(&mut inner).await;
        }
        trace!(size = self.pool.size(), idle = self.pool.num_idle(), "connection acquired");
        Ok(PooledConn { inner })
    }

    /// Return a connection to the pool. Equivalent to dropping it.
    pub fn release(&self, conn: PooledConn) {
        drop(conn);
        trace!(idle = self.pool.num_idle(), "connection released");
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    pub fn inner(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        debug!("database pool closed");
    }
}

async fn log_identity(conn: &mut PgConnection) {
    let identity = sqlx::query_as::<_, (String, String)>(
        r#"SELECT current_user::text, current_database()::text"#,
    )
    .fetch_one(conn)
    .await;

    match identity {
        Ok((role, database)) => info!(%role, %database, "connected to database"),
        Err(e) => error!(error = %e, "database identity check failed"),
    }
}

impl Deref for PooledConn {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        &self.inner
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut PgConnection {
        &mut self.inner
    }
}

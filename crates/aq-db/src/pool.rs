//! Connection pool
//!
//! Bounds the number of concurrently open physical connections. Every
//! connection is opened eagerly at construction; [`ConnectionPool::acquire`]
//! hands one out or fails immediately with `PoolExhausted`, and dropping the
//! [`PooledConnection`] returns the connection to the pool. Acquisition
//! never waits and the pool never grows past its capacity. There is no
//! drain operation; dropping the pool drops whatever connections are idle.

use std::sync::Arc;

use aq_core::{AqError, AqResult, SqlRow, SqlValue};
use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::postgres::PgSource;
use crate::source::{Connection, DataSource};

struct Slot {
    id: Uuid,
    conn: Box<dyn Connection>,
}

struct PoolInner {
    available: Mutex<Vec<Slot>>,
    capacity: usize,
}

/// A bounded pool of live database connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("capacity", &self.inner.capacity)
            .field("available", &self.inner.available.lock().len())
            .finish()
    }
}

impl ConnectionPool {
    /// Open a PostgreSQL-backed pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> AqResult<Self> {
        let source = PgSource::new(config)?;
        Self::initialize(Arc::new(source), config.pool_size).await
    }

    /// Eagerly open exactly `size` connections from `source`.
    ///
    /// The first failed open aborts construction and the error propagates;
    /// a partially filled pool is never observable. Connections opened
    /// before the failure are dropped.
    pub async fn initialize(source: Arc<dyn DataSource>, size: u32) -> AqResult<Self> {
        let mut slots = Vec::with_capacity(size as usize);
        for _ in 0..size {
            let conn = source.connection().await?;
            slots.push(Slot {
                id: Uuid::new_v4(),
                conn,
            });
        }

        tracing::info!(capacity = size, "connection pool initialized");

        Ok(Self {
            inner: Arc::new(PoolInner {
                available: Mutex::new(slots),
                capacity: size as usize,
            }),
        })
    }

    /// Check a connection out of the pool.
    ///
    /// Never waits: when every connection is already checked out this fails
    /// immediately with `PoolExhausted`, and the caller decides whether to
    /// retry.
    pub fn acquire(&self) -> AqResult<PooledConnection> {
        let slot = self.inner.available.lock().pop();
        match slot {
            Some(slot) => {
                tracing::debug!(connection = %slot.id, "connection checked out");
                Ok(PooledConnection {
                    slot: Some(slot),
                    pool: Arc::clone(&self.inner),
                })
            }
            None => Err(AqError::PoolExhausted {
                capacity: self.inner.capacity,
            }),
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.inner.capacity,
            idle: self.inner.available.lock().len(),
        }
    }
}

#[async_trait]
impl DataSource for ConnectionPool {
    async fn connection(&self) -> AqResult<Box<dyn Connection>> {
        Ok(Box::new(self.acquire()?))
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
}

const RELEASED: &str = "(bug) connection already released back to the pool";

/// A checked-out connection.
///
/// Returns itself to the pool when dropped, on every exit path. Release
/// consumes the slot, so a connection is returned at most once.
pub struct PooledConnection {
    slot: Option<Slot>,
    pool: Arc<PoolInner>,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection_id", &self.slot.as_ref().map(|s| s.id))
            .finish()
    }
}

impl PooledConnection {
    /// Identifier of the underlying physical connection.
    pub fn connection_id(&self) -> Uuid {
        self.slot.as_ref().expect(RELEASED).id
    }

    /// Return the connection to the pool explicitly.
    ///
    /// Dropping has the same effect; this form just names the handoff.
    pub fn release(self) {}
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::debug!(connection = %slot.id, "connection returned");
            self.pool.available.lock().push(slot);
        }
    }
}

#[async_trait]
impl Connection for PooledConnection {
    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> AqResult<Option<SqlRow>> {
        self.slot
            .as_mut()
            .expect(RELEASED)
            .conn
            .fetch_optional(sql, params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use aq_core::DataAccessError;

    fn seeded_source() -> MemorySource {
        let source = MemorySource::new();
        source.insert(
            "persons",
            SqlRow::new().with("id", 1i64).with("first_name", "Ada"),
        );
        source
    }

    #[tokio::test]
    async fn test_acquire_until_exhausted() {
        let pool = ConnectionPool::initialize(Arc::new(MemorySource::new()), 3)
            .await
            .unwrap();

        let held: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(pool.stats().idle, 0);

        let err = pool.acquire().expect_err("pool must be exhausted");
        assert!(matches!(err, AqError::PoolExhausted { capacity: 3 }));

        drop(held);
        assert_eq!(pool.stats().idle, 3);
    }

    #[tokio::test]
    async fn test_release_recycles_the_same_connection() {
        let source = seeded_source();
        let pool = ConnectionPool::initialize(Arc::new(source.clone()), 1)
            .await
            .unwrap();
        assert_eq!(source.opened(), 1);

        let first = pool.acquire().unwrap();
        let first_id = first.connection_id();
        first.release();

        let second = pool.acquire().unwrap();
        assert_eq!(second.connection_id(), first_id);
        // recycled, not reopened
        assert_eq!(source.opened(), 1);
    }

    #[tokio::test]
    async fn test_initialization_aborts_on_first_failure() {
        let err = ConnectionPool::initialize(Arc::new(MemorySource::failing()), 4)
            .await
            .expect_err("construction must fail");
        assert!(matches!(
            err,
            AqError::DataAccess(DataAccessError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_track_checkouts() {
        let pool = ConnectionPool::initialize(Arc::new(MemorySource::new()), 2)
            .await
            .unwrap();
        assert_eq!(
            pool.stats(),
            PoolStats {
                capacity: 2,
                idle: 2
            }
        );

        let conn = pool.acquire().unwrap();
        assert_eq!(pool.stats().idle, 1);
        drop(conn);
        assert_eq!(pool.stats().idle, 2);
    }

    #[tokio::test]
    async fn test_exhaustion_recovers_after_release() {
        let source = seeded_source();
        let pool = ConnectionPool::initialize(Arc::new(source), 2)
            .await
            .unwrap();

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(pool.acquire().is_err());

        a.release();

        let mut c = pool.acquire().unwrap();
        let row = c
            .fetch_optional("SELECT * FROM persons WHERE id = $1", &[SqlValue::Int(1)])
            .await
            .unwrap()
            .expect("seeded row");
        assert_eq!(row.get("first_name"), Some(&SqlValue::Text("Ada".into())));

        drop(b);
        drop(c);
        assert_eq!(pool.stats().idle, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkout_never_duplicates_or_loses() {
        use std::collections::HashSet;

        const TASKS: usize = 8;
        const ITERATIONS: usize = 200;
        const CAPACITY: u32 = 4;

        let pool = ConnectionPool::initialize(Arc::new(MemorySource::new()), CAPACITY)
            .await
            .unwrap();
        let held: Arc<Mutex<HashSet<Uuid>>> = Arc::new(Mutex::new(HashSet::new()));

        let mut tasks = Vec::new();
        for _ in 0..TASKS {
            let pool = pool.clone();
            let held = Arc::clone(&held);
            tasks.push(tokio::spawn(async move {
                let mut checkouts = 0usize;
                for _ in 0..ITERATIONS {
                    match pool.acquire() {
                        Ok(conn) => {
                            let id = conn.connection_id();
                            {
                                let mut held = held.lock();
                                // a connection must never be handed out twice
                                assert!(held.insert(id));
                                assert!(held.len() <= CAPACITY as usize);
                            }
                            tokio::task::yield_now().await;
                            held.lock().remove(&id);
                            drop(conn);
                            checkouts += 1;
                        }
                        Err(AqError::PoolExhausted { .. }) => {
                            tokio::task::yield_now().await;
                        }
                        Err(other) => panic!("unexpected acquire failure: {other}"),
                    }
                }
                checkouts
            }));
        }

        let mut total = 0usize;
        for task in tasks {
            total += task.await.unwrap();
        }

        assert!(total > 0);
        // nothing leaked: every connection is back in the pool
        assert_eq!(pool.stats().idle, CAPACITY as usize);
    }
}

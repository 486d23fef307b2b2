//! Data-source boundary
//!
//! The engine's only contract with a database driver: open a connection,
//! then execute a parameterized single-row query over it. The connection
//! pool, the PostgreSQL binding, and the in-memory driver all satisfy this
//! pair of traits, so a [`crate::pool::ConnectionPool`] and a direct driver
//! are interchangeable from the caller's point of view.

use aq_core::{AqResult, SqlRow, SqlValue};
use async_trait::async_trait;

/// Something that can hand out live database connections.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Open (or hand out) a connection.
    async fn connection(&self) -> AqResult<Box<dyn Connection>>;
}

/// A live database connection.
///
/// Exclusive use is enforced by `&mut self`; a connection is never shared
/// between holders. Dropping the box returns pooled connections to their
/// pool and closes direct ones.
#[async_trait]
pub trait Connection: Send {
    /// Execute a parameterized query expected to match at most one row.
    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> AqResult<Option<SqlRow>>;
}

//! In-memory data source
//!
//! A small in-process driver backed by seeded rows. It understands exactly
//! the single-row select shape the session emits, so the rest of the engine
//! can be exercised end to end without a running database server. The pool
//! and session test suites run against it; it is also handy for local
//! experiments.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use aq_core::{AqResult, DataAccessError, SqlRow, SqlValue};
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::source::{Connection, DataSource};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MemoryError(String);

#[derive(Default)]
struct MemoryState {
    tables: RwLock<HashMap<String, Vec<SqlRow>>>,
    opened: AtomicUsize,
}

/// In-process data source backed by seeded rows.
#[derive(Clone, Default)]
pub struct MemorySource {
    state: Arc<MemoryState>,
    fail_connect: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every open attempt fails.
    pub fn failing() -> Self {
        Self {
            state: Arc::default(),
            fail_connect: true,
        }
    }

    /// Seed one row into a table, creating the table on first use.
    pub fn insert(&self, table: &str, row: SqlRow) {
        self.state
            .tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Number of physical connections opened so far.
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn connection(&self) -> AqResult<Box<dyn Connection>> {
        if self.fail_connect {
            return Err(DataAccessError::connect(MemoryError(
                "connection refused".to_string(),
            ))
            .into());
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryConnection {
    state: Arc<MemoryState>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> AqResult<Option<SqlRow>> {
        let (table, column) = parse_select_by_column(sql).ok_or_else(|| {
            DataAccessError::execute(MemoryError(format!("unsupported query: {sql}")))
        })?;
        let param = params.first().ok_or_else(|| {
            DataAccessError::execute(MemoryError("missing bind parameter".to_string()))
        })?;

        let tables = self.state.tables.read();
        let rows = tables.get(&table).ok_or_else(|| {
            DataAccessError::execute(MemoryError(format!("relation `{table}` does not exist")))
        })?;

        Ok(rows
            .iter()
            .find(|row| row.get(&column) == Some(param))
            .cloned())
    }
}

/// Parse `SELECT * FROM <table> WHERE <column> = $1`.
fn parse_select_by_column(sql: &str) -> Option<(String, String)> {
    let mut words = sql.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("select") {
        return None;
    }
    if words.next()? != "*" {
        return None;
    }
    if !words.next()?.eq_ignore_ascii_case("from") {
        return None;
    }
    let table = words.next()?;
    if !words.next()?.eq_ignore_ascii_case("where") {
        return None;
    }
    let column = words.next()?;
    if words.next()? != "=" {
        return None;
    }
    if words.next()? != "$1" {
        return None;
    }
    if words.next().is_some() {
        return None;
    }
    Some((table.to_string(), column.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_by_column() {
        let parsed = parse_select_by_column("SELECT * FROM persons WHERE id = $1");
        assert_eq!(parsed, Some(("persons".to_string(), "id".to_string())));

        assert!(parse_select_by_column("SELECT * FROM persons").is_none());
        assert!(parse_select_by_column("DELETE FROM persons WHERE id = $1").is_none());
        assert!(parse_select_by_column("SELECT * FROM persons WHERE id = $1 OR 1=1").is_none());
    }

    #[tokio::test]
    async fn test_fetch_seeded_row() {
        let source = MemorySource::new();
        source.insert(
            "persons",
            SqlRow::new().with("id", 1i64).with("first_name", "Ada"),
        );
        source.insert(
            "persons",
            SqlRow::new().with("id", 2i64).with("first_name", "Grace"),
        );

        let mut conn = source.connection().await.unwrap();
        let row = conn
            .fetch_optional("SELECT * FROM persons WHERE id = $1", &[SqlValue::Int(2)])
            .await
            .unwrap()
            .expect("row seeded");
        assert_eq!(row.get("first_name"), Some(&SqlValue::Text("Grace".into())));

        let missing = conn
            .fetch_optional("SELECT * FROM persons WHERE id = $1", &[SqlValue::Int(99)])
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_unknown_table_is_a_driver_error() {
        let source = MemorySource::new();
        let mut conn = source.connection().await.unwrap();
        let err = conn
            .fetch_optional("SELECT * FROM nothing WHERE id = $1", &[SqlValue::Int(1)])
            .await
            .expect_err("missing relation");
        assert!(matches!(
            err,
            aq_core::AqError::DataAccess(DataAccessError::Execute(_))
        ));
    }

    #[tokio::test]
    async fn test_failing_source_refuses_to_open() {
        let source = MemorySource::failing();
        assert!(source.connection().await.is_err());
        assert_eq!(source.opened(), 0);
    }
}

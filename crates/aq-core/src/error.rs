//! Error taxonomy for Aquifer
//!
//! Every failure the engine can surface belongs to one of four kinds:
//! entity metadata problems ([`MappingError`]), driver-level failures
//! ([`DataAccessError`]), a missing row (`NotFound`), or an empty pool
//! (`PoolExhausted`). The last two have no payload beyond diagnostics and
//! live directly on the top-level [`AqError`].

use thiserror::Error;

/// Boxed lower-level error carried as the cause of a data-access failure.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Entity metadata is absent, malformed, or ambiguous.
///
/// Always fatal to the calling operation; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("entity `{entity}` has no table mapping")]
    MissingTable { entity: &'static str },

    #[error("entity `{entity}` declares no identifier field")]
    MissingId { entity: &'static str },

    #[error("entity `{entity}` declares {count} identifier fields, expected exactly one")]
    AmbiguousId { entity: &'static str, count: usize },
}

/// A failure surfaced by the underlying data-source boundary.
///
/// Driver errors keep the original cause attached; they are propagated to
/// the caller, never swallowed or retried.
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("failed to open database connection")]
    Connect(#[source] BoxedCause),

    #[error("query execution failed")]
    Execute(#[source] BoxedCause),

    #[error("result row has no column `{column}`")]
    MissingColumn { column: String },

    #[error("column `{column}` holds {actual}, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("column `{column}` has unsupported database type {ty}")]
    Unsupported { column: String, ty: String },
}

impl DataAccessError {
    /// Wrap a driver error raised while opening a connection.
    pub fn connect(cause: impl Into<BoxedCause>) -> Self {
        Self::Connect(cause.into())
    }

    /// Wrap a driver error raised while executing a query.
    pub fn execute(cause: impl Into<BoxedCause>) -> Self {
        Self::Execute(cause.into())
    }
}

/// Top-level error type for Aquifer operations.
#[derive(Debug, Error)]
pub enum AqError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error("connection pool exhausted: all {capacity} connections are checked out")]
    PoolExhausted { capacity: usize },
}

impl AqError {
    /// Whether the caller can reasonably treat this as "not present".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_messages() {
        let err = MappingError::MissingTable { entity: "Person" };
        assert_eq!(err.to_string(), "entity `Person` has no table mapping");

        let err = MappingError::AmbiguousId {
            entity: "Note",
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "entity `Note` declares 2 identifier fields, expected exactly one"
        );
    }

    #[test]
    fn test_not_found_is_recoverable() {
        let err = AqError::NotFound {
            entity: "Person",
            id: "42".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Person with id 42 not found");

        let err = AqError::PoolExhausted { capacity: 10 };
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_data_access_error_keeps_cause() {
        use std::error::Error as _;

        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DataAccessError::connect(cause);
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "failed to open database connection");
    }

    #[test]
    fn test_mapping_error_converts_transparently() {
        let err: AqError = MappingError::MissingId { entity: "Person" }.into();
        assert_eq!(err.to_string(), "entity `Person` declares no identifier field");
    }
}

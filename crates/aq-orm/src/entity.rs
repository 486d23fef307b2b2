//! Entity mapping metadata
//!
//! Declarative, statically registered metadata takes the place of runtime
//! reflection: each entity type hands the resolver a const table describing
//! its table name, identifier, and column tags, and constructs itself from a
//! [`HydratedRow`] through typed accessors. How a binding produces the table
//! (by hand, by macro) is its own business; the engine only reads it.

use std::fmt;

use aq_core::{AqResult, DataAccessError, SqlValue};
use chrono::NaiveDateTime;
use uuid::Uuid;

/// Declared value kind of a persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Uuid,
    Timestamp,
}

impl FieldKind {
    /// Short name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Uuid => "uuid",
            Self::Timestamp => "timestamp",
        }
    }

    /// Whether a decoded value is an acceptable rendition of this kind.
    ///
    /// NULL always passes; nullability is the entity's concern, expressed
    /// through the `take_opt_*` accessors.
    pub(crate) fn admits(self, value: &SqlValue) -> bool {
        if value.is_null() {
            return true;
        }
        matches!(
            (self, value),
            (Self::Bool, SqlValue::Bool(_))
                | (Self::Int, SqlValue::Int(_))
                | (Self::Float, SqlValue::Float(_))
                | (Self::Text, SqlValue::Text(_))
                | (Self::Bytes, SqlValue::Bytes(_))
                | (Self::Uuid, SqlValue::Uuid(_))
                | (Self::Timestamp, SqlValue::Timestamp(_))
        )
    }
}

/// Declarative mapping for one persisted field.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    /// Field name on the entity type
    pub field: &'static str,
    /// Explicit column tag; the field name itself is the column when absent
    pub column: Option<&'static str>,
    /// Declared value kind
    pub kind: FieldKind,
    /// Whether this field is the identifier
    pub id: bool,
}

impl FieldMapping {
    /// A plain field, stored under its own name.
    pub const fn new(field: &'static str, kind: FieldKind) -> Self {
        Self {
            field,
            column: None,
            kind,
            id: false,
        }
    }

    /// The identifier field.
    pub const fn id(field: &'static str, kind: FieldKind) -> Self {
        Self {
            field,
            column: None,
            kind,
            id: true,
        }
    }

    /// A field stored under an explicit column name.
    pub const fn renamed(field: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            field,
            column: Some(column),
            kind,
            id: false,
        }
    }
}

/// Declarative mapping for one entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntityMapping {
    /// Type name, used in diagnostics
    pub entity: &'static str,
    /// Table tag; resolution fails when absent
    pub table: Option<&'static str>,
    /// Every persisted field, identifier included
    pub fields: &'static [FieldMapping],
}

/// A data type whose instances correspond one-to-one with rows of a table.
pub trait Entity: Sized + Send + Sync + 'static {
    /// Identifier type, bound as the sole query parameter.
    type Id: Into<SqlValue> + fmt::Display + Clone + Send + Sync;

    /// The statically registered mapping table for this type.
    fn mapping() -> &'static EntityMapping;

    /// Construct an instance from a hydrated row.
    fn hydrate(row: &mut HydratedRow) -> AqResult<Self>;
}

/// Column values re-keyed by field name, ready for typed extraction.
///
/// Each value can be taken exactly once; taking it through the wrong
/// accessor, or asking for an unmapped field, is a [`DataAccessError`].
#[derive(Debug)]
pub struct HydratedRow {
    values: Vec<(&'static str, Option<SqlValue>)>,
}

impl HydratedRow {
    pub(crate) fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub(crate) fn push(&mut self, field: &'static str, value: SqlValue) {
        self.values.push((field, Some(value)));
    }

    fn take(&mut self, field: &str) -> Result<SqlValue, DataAccessError> {
        self.values
            .iter_mut()
            .find(|(name, _)| *name == field)
            .and_then(|(_, value)| value.take())
            .ok_or_else(|| DataAccessError::MissingColumn {
                column: field.to_string(),
            })
    }
}

fn mismatch(field: &str, expected: &'static str, actual: &SqlValue) -> DataAccessError {
    DataAccessError::ColumnType {
        column: field.to_string(),
        expected,
        actual: actual.kind_name(),
    }
}

macro_rules! take_accessors {
    ($($take:ident, $take_opt:ident => $variant:ident($ty:ty), $kind:literal;)*) => {
        impl HydratedRow {
            $(
                pub fn $take(&mut self, field: &str) -> Result<$ty, DataAccessError> {
                    match self.take(field)? {
                        SqlValue::$variant(value) => Ok(value),
                        other => Err(mismatch(field, $kind, &other)),
                    }
                }

                pub fn $take_opt(&mut self, field: &str) -> Result<Option<$ty>, DataAccessError> {
                    match self.take(field)? {
                        SqlValue::Null => Ok(None),
                        SqlValue::$variant(value) => Ok(Some(value)),
                        other => Err(mismatch(field, $kind, &other)),
                    }
                }
            )*
        }
    };
}

take_accessors! {
    take_bool, take_opt_bool => Bool(bool), "bool";
    take_int, take_opt_int => Int(i64), "int";
    take_float, take_opt_float => Float(f64), "float";
    take_text, take_opt_text => Text(String), "text";
    take_bytes, take_opt_bytes => Bytes(Vec<u8>), "bytes";
    take_uuid, take_opt_uuid => Uuid(Uuid), "uuid";
    take_timestamp, take_opt_timestamp => Timestamp(NaiveDateTime), "timestamp";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> HydratedRow {
        let mut row = HydratedRow::new();
        row.push("id", SqlValue::Int(7));
        row.push("body", SqlValue::Null);
        row.push("first_name", SqlValue::Text("Ada".to_string()));
        row
    }

    #[test]
    fn test_typed_take() {
        let mut row = row();
        assert_eq!(row.take_int("id").unwrap(), 7);
        assert_eq!(row.take_text("first_name").unwrap(), "Ada");
    }

    #[test]
    fn test_null_needs_an_opt_accessor() {
        let mut row = row();
        assert_eq!(row.take_opt_text("body").unwrap(), None);

        let mut row = self::row();
        let err = row.take_text("body").expect_err("null into non-optional");
        assert!(matches!(err, DataAccessError::ColumnType { .. }));
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let mut row = row();
        let err = row.take_text("id").expect_err("int is not text");
        match err {
            DataAccessError::ColumnType {
                column,
                expected,
                actual,
            } => {
                assert_eq!(column, "id");
                assert_eq!(expected, "text");
                assert_eq!(actual, "int");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_values_are_taken_once() {
        let mut row = row();
        row.take_int("id").unwrap();
        assert!(row.take_int("id").is_err());
        assert!(row.take_int("missing").is_err());
    }

    #[test]
    fn test_kind_admits_null_and_exact_matches() {
        assert!(FieldKind::Text.admits(&SqlValue::Null));
        assert!(FieldKind::Int.admits(&SqlValue::Int(1)));
        assert!(!FieldKind::Int.admits(&SqlValue::Text("1".to_string())));
    }
}

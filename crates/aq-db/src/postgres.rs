//! PostgreSQL driver binding
//!
//! Implements the data-source boundary over raw sqlx connections. Result
//! columns are decoded by their natural database type into [`SqlValue`];
//! `TIMESTAMP` and `TIMESTAMPTZ` both arrive at the caller as a naive
//! date-time, the latter normalized to UTC first.

use aq_core::{AqResult, DataAccessError, SqlRow, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgColumn, PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection as _, Row, TypeInfo, ValueRef};

use crate::config::DatabaseConfig;
use crate::source::{Connection, DataSource};

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

/// Data source that opens one physical PostgreSQL connection per request.
#[derive(Debug, Clone)]
pub struct PgSource {
    options: PgConnectOptions,
}

impl PgSource {
    /// Build a source from configuration.
    ///
    /// Credentials given in the config override whatever the URL carries.
    pub fn new(config: &DatabaseConfig) -> AqResult<Self> {
        let mut options: PgConnectOptions =
            config.url.parse().map_err(DataAccessError::connect)?;
        if let Some(username) = &config.username {
            options = options.username(username);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        Ok(Self { options })
    }
}

#[async_trait]
impl DataSource for PgSource {
    async fn connection(&self) -> AqResult<Box<dyn Connection>> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(DataAccessError::connect)?;
        Ok(Box::new(PgLiveConnection { conn }))
    }
}

struct PgLiveConnection {
    conn: PgConnection,
}

#[async_trait]
impl Connection for PgLiveConnection {
    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> AqResult<Option<SqlRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }
        let row = query
            .fetch_optional(&mut self.conn)
            .await
            .map_err(DataAccessError::execute)?;
        match row {
            Some(row) => Ok(Some(decode_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn bind_value<'q>(query: PgQuery<'q>, value: &SqlValue) -> PgQuery<'q> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
    }
}

fn decode_row(row: &PgRow) -> Result<SqlRow, DataAccessError> {
    let mut out = SqlRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.push(column.name(), decode_column(row, index, column)?);
    }
    Ok(out)
}

fn decode_column(
    row: &PgRow,
    index: usize,
    column: &PgColumn,
) -> Result<SqlValue, DataAccessError> {
    let raw = row.try_get_raw(index).map_err(DataAccessError::execute)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match column.type_info().name() {
        "BOOL" => SqlValue::Bool(get(row, index)?),
        "INT2" => SqlValue::Int(i64::from(get::<i16>(row, index)?)),
        "INT4" => SqlValue::Int(i64::from(get::<i32>(row, index)?)),
        "INT8" => SqlValue::Int(get(row, index)?),
        "FLOAT4" => SqlValue::Float(f64::from(get::<f32>(row, index)?)),
        "FLOAT8" => SqlValue::Float(get(row, index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => SqlValue::Text(get(row, index)?),
        "BYTEA" => SqlValue::Bytes(get(row, index)?),
        "UUID" => SqlValue::Uuid(get(row, index)?),
        "TIMESTAMP" => SqlValue::Timestamp(get::<NaiveDateTime>(row, index)?),
        "TIMESTAMPTZ" => {
            SqlValue::Timestamp(get::<DateTime<Utc>>(row, index)?.naive_utc())
        }
        other => {
            return Err(DataAccessError::Unsupported {
                column: column.name().to_string(),
                ty: other.to_string(),
            })
        }
    };
    Ok(value)
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<T, DataAccessError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(index).map_err(DataAccessError::execute)
}

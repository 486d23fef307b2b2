//! # aq-db
//!
//! Database layer for Aquifer.
//!
//! This crate provides the data-source boundary and its implementations:
//!
//! - The [`DataSource`] / [`Connection`] trait pair drivers implement
//! - A PostgreSQL binding over raw sqlx connections
//! - An in-memory driver for tests and local experiments
//! - A bounded connection pool with eager initialization
//!
//! ## Example
//!
//! ```ignore
//! use aq_db::{ConnectionPool, DatabaseConfig};
//!
//! let config = DatabaseConfig::from_env();
//! let pool = ConnectionPool::connect(&config).await?;
//!
//! let conn = pool.acquire()?;
//! // dropping `conn` returns it to the pool
//! ```

pub mod config;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod source;

// Re-exports
pub use config::DatabaseConfig;
pub use memory::MemorySource;
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use postgres::PgSource;
pub use source::{Connection, DataSource};

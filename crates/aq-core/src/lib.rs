//! # aq-core
//!
//! Core types for Aquifer.
//!
//! This crate provides the foundational building blocks used across the
//! other crates:
//! - The error taxonomy (`MappingError`, `DataAccessError`, `AqError`)
//! - Result type aliases
//! - Driver-neutral SQL value and row types

pub mod error;
pub mod result;
pub mod types;

pub use error::*;
pub use result::*;
pub use types::*;

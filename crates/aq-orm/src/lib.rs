//! # aq-orm
//!
//! Entity mapping and session loader for Aquifer.
//!
//! This crate turns statically registered entity metadata into single-row
//! loads:
//!
//! - [`Entity`] and its const [`EntityMapping`] table declare how a type
//!   maps to a table
//! - [`EntityDescriptor`] is the validated, cached form the engine consumes
//! - [`Session::find`] loads one instance by identifier over any
//!   [`aq_db::DataSource`]
//!
//! ## Example
//!
//! ```ignore
//! use aq_orm::Session;
//! use std::sync::Arc;
//!
//! let session = Session::new(Arc::new(pool));
//! let person: Person = session.find(1i64).await?;
//! ```

pub mod descriptor;
pub mod entity;
pub mod session;

// Re-exports
pub use descriptor::{DescriptorCache, EntityDescriptor, FieldRef, MappedColumn};
pub use entity::{Entity, EntityMapping, FieldKind, FieldMapping, HydratedRow};
pub use session::Session;

//! Entity descriptors
//!
//! Turns the declarative per-type mapping into the reusable query-building
//! metadata the session consumes: table name, identifier column, and the
//! full field-to-column pairing. Resolution validates the mapping (a missing
//! table tag or anything but exactly one identifier is a [`MappingError`]),
//! and the result is cached per type for the life of the owning session.

use std::any::TypeId;
use std::sync::Arc;

use aq_core::MappingError;
use dashmap::DashMap;

use crate::entity::{Entity, EntityMapping, FieldKind};

/// A named, typed slot on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// One resolved field-to-column pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedColumn {
    pub field: FieldRef,
    pub column: &'static str,
}

/// Derived metadata describing how an entity type maps to a table.
///
/// Pure and immutable once resolved; never re-parsed per query.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Entity type name, used in diagnostics
    pub entity: &'static str,
    /// Resolved table name
    pub table: &'static str,
    id_index: usize,
    /// Every declared field with its column, identifier included
    pub columns: Vec<MappedColumn>,
}

impl EntityDescriptor {
    /// Derive a descriptor from a declarative mapping.
    pub fn resolve(mapping: &EntityMapping) -> Result<Self, MappingError> {
        let entity = mapping.entity;
        let table = mapping.table.ok_or(MappingError::MissingTable { entity })?;

        let columns: Vec<MappedColumn> = mapping
            .fields
            .iter()
            .map(|f| MappedColumn {
                field: FieldRef {
                    name: f.field,
                    kind: f.kind,
                },
                // explicit tag wins verbatim, otherwise the field's own name
                column: f.column.unwrap_or(f.field),
            })
            .collect();

        let ids: Vec<usize> = mapping
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.id)
            .map(|(index, _)| index)
            .collect();
        let id_index = match ids.as_slice() {
            [index] => *index,
            [] => return Err(MappingError::MissingId { entity }),
            more => {
                return Err(MappingError::AmbiguousId {
                    entity,
                    count: more.len(),
                })
            }
        };

        Ok(Self {
            entity,
            table,
            id_index,
            columns,
        })
    }

    /// The identifier's field-to-column pairing.
    pub fn id(&self) -> &MappedColumn {
        &self.columns[self.id_index]
    }

    /// Column name of the identifier.
    pub fn id_column(&self) -> &'static str {
        self.id().column
    }
}

/// Concurrent per-type descriptor cache.
///
/// First use of a type resolves its descriptor at most once, even under
/// concurrent callers; later uses are lookups.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    inner: DashMap<TypeId, Arc<EntityDescriptor>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `E`'s descriptor, computing it on first use.
    pub fn resolve<E: Entity>(&self) -> Result<Arc<EntityDescriptor>, MappingError> {
        let entry = self
            .inner
            .entry(TypeId::of::<E>())
            .or_try_insert_with(|| EntityDescriptor::resolve(E::mapping()).map(Arc::new))?;
        Ok(Arc::clone(entry.value()))
    }

    /// Number of entity types resolved so far.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

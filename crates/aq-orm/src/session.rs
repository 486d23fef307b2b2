//! Entity loading session
//!
//! Loads single entity instances by primary key. The session resolves (and
//! caches) the entity's descriptor, builds the one supported query shape,
//! runs it over a connection acquired from its data source, and hydrates
//! the result through the entity's typed constructor. Whether connections
//! come from a pool or a direct driver is the source's business.

use std::sync::Arc;

use aq_core::{AqError, AqResult, DataAccessError, SqlRow};
use aq_db::DataSource;

use crate::descriptor::{DescriptorCache, EntityDescriptor};
use crate::entity::{Entity, HydratedRow};

/// Loads entities by identifier over a data source.
pub struct Session {
    source: Arc<dyn DataSource>,
    descriptors: DescriptorCache,
}

impl Session {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            descriptors: DescriptorCache::new(),
        }
    }

    /// Load the `E` identified by `id`.
    ///
    /// Exactly one query, at most one round trip. Zero rows is an explicit
    /// `NotFound`, never a half-hydrated instance. The connection is
    /// released back to its source on every exit path.
    pub async fn find<E: Entity>(&self, id: E::Id) -> AqResult<E> {
        let descriptor = self.descriptors.resolve::<E>()?;
        let sql = select_by_id(&descriptor);
        tracing::debug!(entity = descriptor.entity, sql = %sql, "loading entity by id");

        let mut conn = self.source.connection().await?;
        let row = conn.fetch_optional(&sql, &[id.clone().into()]).await?;
        drop(conn);

        let Some(row) = row else {
            return Err(AqError::NotFound {
                entity: descriptor.entity,
                id: id.to_string(),
            });
        };

        let mut hydrated = hydrate_row(&descriptor, &row)?;
        E::hydrate(&mut hydrated)
    }
}

/// Build the single supported query shape.
fn select_by_id(descriptor: &EntityDescriptor) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = $1",
        descriptor.table,
        descriptor.id_column()
    )
}

/// Re-key a result row by field name, checking every value against its
/// field's declared kind on the way through.
fn hydrate_row(
    descriptor: &EntityDescriptor,
    row: &SqlRow,
) -> Result<HydratedRow, DataAccessError> {
    let mut hydrated = HydratedRow::new();
    for mapped in &descriptor.columns {
        let value = row
            .get(mapped.column)
            .ok_or_else(|| DataAccessError::MissingColumn {
                column: mapped.column.to_string(),
            })?;
        if !mapped.field.kind.admits(value) {
            return Err(DataAccessError::ColumnType {
                column: mapped.column.to_string(),
                expected: mapped.field.kind.name(),
                actual: value.kind_name(),
            });
        }
        hydrated.push(mapped.field.name, value.clone());
    }
    Ok(hydrated)
}

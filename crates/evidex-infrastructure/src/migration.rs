//! Load-time migration of persisted records into the domain model.
//!
//! Records written before versioning existed are bare conversation
//! snapshots. Each one becomes a container holding exactly one version, so
//! nothing downstream ever sees the legacy shape.

use crate::dto::{PersistedCollection, SnapshotRecord, StoredRecord};
use chrono::{DateTime, Utc};
use evidex_core::conversation::{Container, Version, new_id};
use evidex_core::error::Result;
use std::collections::HashSet;

/// Wraps a legacy snapshot record in a single-version container.
#[derive(Debug, Clone)]
pub struct LegacyRecordMigration {
    loaded_at: DateTime<Utc>,
}

impl LegacyRecordMigration {
    /// `loaded_at` becomes the timestamp of every synthesized version.
    pub fn new(loaded_at: DateTime<Utc>) -> Self {
        Self { loaded_at }
    }

    pub fn description(&self) -> &str {
        "Wrap unversioned conversation record in a single-version container"
    }

    /// Builds the container.
    ///
    /// The container id is taken from the collection key, then the record's
    /// own id, and only synthesized when neither exists. The version id is
    /// always fresh.
    pub fn migrate(&self, key: Option<String>, record: SnapshotRecord) -> Result<Container> {
        let id = key
            .filter(|k| !k.is_empty())
            .or_else(|| record.id.clone().filter(|i| !i.is_empty()))
            .unwrap_or_else(new_id);
        let title = record.title.clone();

        let version = Version {
            id: new_id(),
            timestamp: self.loaded_at,
            snapshot: record.into_snapshot(),
        };
        let active = version.id.clone();

        Container::from_parts(id, title, active, vec![version])
    }
}

/// Resolves every persisted entry into a domain container.
///
/// Versioned records that break the container invariant are skipped with a
/// warning rather than failing the whole load. A repeated id is reassigned.
pub fn resolve_collection(
    collection: PersistedCollection,
    loaded_at: DateTime<Utc>,
) -> Vec<Container> {
    let migration = LegacyRecordMigration::new(loaded_at);
    let mut seen: HashSet<String> = HashSet::new();
    let mut containers = Vec::with_capacity(collection.len());
    let mut migrated = 0usize;

    for (key, record) in collection.into_entries() {
        let resolved = match record {
            StoredRecord::Versioned(record) => record.into_domain(),
            StoredRecord::Legacy(record) => {
                migrated += 1;
                migration.migrate(key, record)
            }
        };
        let container = match resolved {
            Ok(container) => container,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping invalid container record");
                continue;
            }
        };

        let container = if seen.contains(container.id()) {
            let fresh = new_id();
            tracing::warn!(
                duplicate_id = %container.id(),
                new_id = %fresh,
                "Duplicate container id in store, reassigning"
            );
            container.with_id(fresh)
        } else {
            container
        };

        seen.insert(container.id().to_string());
        containers.push(container);
    }

    if migrated > 0 {
        tracing::info!(
            count = migrated,
            migration = migration.description(),
            "Migrated legacy conversation records"
        );
    }

    containers
}

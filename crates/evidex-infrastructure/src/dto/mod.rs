//! Data Transfer Objects for persistence.
//!
//! Field names follow the persisted JSON layout (camelCase), not the domain
//! model. Conversion to and from the domain lives next to each DTO.

mod conversation;

pub use conversation::{
    ContainerRecord, PersistedCollection, SnapshotRecord, StoredRecord, VersionRecord,
};

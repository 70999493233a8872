//! Conversation collection DTOs.
//!
//! The persisted collection is an ordered array of `[containerId, record]`
//! pairs. A record is either a versioned container or, in data written before
//! versioning existed, a bare conversation snapshot. Which one it is gets
//! decided once, when the text is decoded into [`StoredRecord`].

use chrono::{DateTime, Utc};
use evidex_core::conversation::{Container, DerivedArtifacts, Message, Snapshot, Version};
use evidex_core::error::{EvidexError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Snapshot
// ============================================================================

/// A conversation snapshot as stored (and as exported/imported).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    /// Only present on legacy and imported records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    /// Required: it is what tells a conversation apart from arbitrary JSON
    pub conversation: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_signals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_assessment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognition_artifact: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Value>,
}

impl SnapshotRecord {
    /// Builds a record from a domain snapshot.
    pub fn from_snapshot(id: Option<String>, snapshot: &Snapshot) -> Self {
        Self {
            id,
            title: snapshot.title.clone(),
            conversation: snapshot.messages.clone(),
            extracted_signals: snapshot.artifacts.extracted_signals.clone(),
            signal_assessment: snapshot.artifacts.signal_assessment.clone(),
            cognition_artifact: snapshot.artifacts.cognition_artifact.clone(),
            evaluation: snapshot.artifacts.evaluation.clone(),
        }
    }

    /// Converts to the domain snapshot, dropping the id.
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            title: self.title,
            messages: self.conversation,
            artifacts: DerivedArtifacts {
                extracted_signals: self.extracted_signals,
                signal_assessment: self.signal_assessment,
                cognition_artifact: self.cognition_artifact,
                evaluation: self.evaluation,
            },
        }
    }
}

// ============================================================================
// Version / Container
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub data: SnapshotRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub active_version_id: String,
    pub versions: Vec<VersionRecord>,
}

impl From<&Version> for VersionRecord {
    fn from(version: &Version) -> Self {
        Self {
            id: version.id.clone(),
            timestamp: version.timestamp.timestamp_millis(),
            data: SnapshotRecord::from_snapshot(None, &version.snapshot),
        }
    }
}

impl VersionRecord {
    fn into_domain(self) -> Result<Version> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.timestamp).ok_or_else(|| {
            EvidexError::migration(format!(
                "version '{}' has out-of-range timestamp {}",
                self.id, self.timestamp
            ))
        })?;

        Ok(Version {
            id: self.id,
            timestamp,
            snapshot: self.data.into_snapshot(),
        })
    }
}

impl From<&Container> for ContainerRecord {
    fn from(container: &Container) -> Self {
        Self {
            id: container.id().to_string(),
            title: container.title().to_string(),
            active_version_id: container.active_version_id().to_string(),
            versions: container.versions().iter().map(VersionRecord::from).collect(),
        }
    }
}

impl ContainerRecord {
    /// Converts to the domain model, validating the active-version invariant.
    pub fn into_domain(self) -> Result<Container> {
        let versions = self
            .versions
            .into_iter()
            .map(VersionRecord::into_domain)
            .collect::<Result<Vec<_>>>()?;

        Container::from_parts(self.id, self.title, self.active_version_id, versions)
    }
}

// ============================================================================
// Collection
// ============================================================================

/// One persisted entry, classified at decode time.
///
/// `Versioned` is tried first; only records without a `versions` field fall
/// through to `Legacy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Versioned(ContainerRecord),
    Legacy(SnapshotRecord),
}

/// The shapes a persisted collection may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedCollection {
    /// `[[id, record], ...]`: the current form, also used by legacy data
    Pairs(Vec<(String, StoredRecord)>),
    /// `[record, ...]`: a plain export of conversations
    Records(Vec<StoredRecord>),
    /// `{id: record, ...}`: an object keyed by id
    Keyed(BTreeMap<String, StoredRecord>),
}

impl PersistedCollection {
    /// Builds the current on-disk form from domain containers.
    pub fn from_containers(containers: &[Container]) -> Self {
        Self::Pairs(
            containers
                .iter()
                .map(|c| {
                    (
                        c.id().to_string(),
                        StoredRecord::Versioned(ContainerRecord::from(c)),
                    )
                })
                .collect(),
        )
    }

    /// Flattens every shape to `(key, record)` entries in stored order.
    pub fn into_entries(self) -> Vec<(Option<String>, StoredRecord)> {
        match self {
            Self::Pairs(pairs) => pairs.into_iter().map(|(k, r)| (Some(k), r)).collect(),
            Self::Records(records) => records.into_iter().map(|r| (None, r)).collect(),
            Self::Keyed(map) => map.into_iter().map(|(k, r)| (Some(k), r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Pairs(pairs) => pairs.len(),
            Self::Records(records) => records.len(),
            Self::Keyed(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidex_core::conversation::MessageRole;

    #[test]
    fn test_versioned_record_is_recognised() {
        let json = r#"[["c1", {
            "id": "c1",
            "title": "Interview",
            "activeVersionId": "v1",
            "versions": [{"id": "v1", "timestamp": 1700000000000,
                          "data": {"title": "Interview", "conversation": []}}]
        }]]"#;

        let collection: PersistedCollection = serde_json::from_str(json).unwrap();
        let entries = collection.into_entries();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0].1, StoredRecord::Versioned(_)));
    }

    #[test]
    fn test_record_without_versions_is_legacy() {
        let json = r#"[["c1", {
            "id": "c1",
            "title": "Old",
            "conversation": [{"role": "user", "content": "hi"}],
            "cognitionArtifact": {"tier": "applied"}
        }]]"#;

        let collection: PersistedCollection = serde_json::from_str(json).unwrap();
        let (key, record) = collection.into_entries().remove(0);
        assert_eq!(key.as_deref(), Some("c1"));
        match record {
            StoredRecord::Legacy(snapshot) => {
                assert_eq!(snapshot.conversation[0].role, MessageRole::User);
                assert!(snapshot.cognition_artifact.is_some());
            }
            other => panic!("expected legacy record, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_record_array_and_keyed_object() {
        let records: PersistedCollection =
            serde_json::from_str(r#"[{"title": "a", "conversation": []}]"#).unwrap();
        assert!(matches!(records, PersistedCollection::Records(_)));

        let keyed: PersistedCollection =
            serde_json::from_str(r#"{"k": {"title": "a", "conversation": []}}"#).unwrap();
        assert!(matches!(keyed, PersistedCollection::Keyed(_)));
        assert_eq!(keyed.len(), 1);
    }

    #[test]
    fn test_container_round_trip_through_record() {
        let container = Container::new(
            "c1",
            "Interview",
            Snapshot::new("Interview", vec![Message::user("hello")]),
        );

        let record = ContainerRecord::from(&container);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"activeVersionId\""));

        let back: ContainerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_domain().unwrap(), container);
    }
}

//! Versioned conversation domain model.
//!
//! A [`Container`] is the stable identity of one interview lineage. It owns an
//! ordered list of [`Version`]s, each wrapping an immutable [`Snapshot`] of the
//! transcript, and points at exactly one of them as active.

use super::message::Message;
use crate::error::{EvidexError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns the current time truncated to millisecond precision.
///
/// Version timestamps are persisted as epoch milliseconds, so anything finer
/// would not survive a save/load cycle.
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Creates a fresh identifier for containers and versions.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Artifacts derived from a transcript by the external reasoning pipeline.
///
/// The core never interprets these; they travel with the snapshot so a
/// historical version reproduces the evaluation it was saved with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedArtifacts {
    pub extracted_signals: Option<Value>,
    pub signal_assessment: Option<Value>,
    pub cognition_artifact: Option<Value>,
    pub evaluation: Option<Value>,
}

/// One saved state of a conversation plus its derived artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub artifacts: DerivedArtifacts,
}

impl Snapshot {
    pub fn new(title: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            title: title.into(),
            messages,
            artifacts: DerivedArtifacts::default(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: DerivedArtifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Ensures the transcript opens with a system message.
    ///
    /// Returns `true` when `default_prompt` had to be injected.
    pub fn ensure_system_prompt(&mut self, default_prompt: &str) -> bool {
        if self.messages.first().is_some_and(Message::is_system) {
            return false;
        }
        self.messages.insert(0, Message::system(default_prompt));
        true
    }

    /// Returns a copy without any system messages.
    pub fn without_system_messages(&self) -> Snapshot {
        Snapshot {
            title: self.title.clone(),
            messages: self
                .messages
                .iter()
                .filter(|m| !m.is_system())
                .cloned()
                .collect(),
            artifacts: self.artifacts.clone(),
        }
    }
}

/// A timestamped snapshot inside a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub snapshot: Snapshot,
}

impl Version {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            id: new_id(),
            timestamp: timestamp_now(),
            snapshot,
        }
    }
}

/// How a save against an existing container should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveAction {
    /// Replace the active version's snapshot in place, keeping its id.
    Overwrite,
    /// Append a new version and make it active.
    New,
}

/// Stable identity of an interview lineage.
///
/// Invariant: `versions` is never empty and `active_version_id` always names
/// one of them. Every constructor and mutator upholds it, which is why the
/// fields are private.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    id: String,
    title: String,
    active_version_id: String,
    versions: Vec<Version>,
}

impl Container {
    /// Creates a container holding a single, active version.
    pub fn new(id: impl Into<String>, title: impl Into<String>, snapshot: Snapshot) -> Self {
        let version = Version::new(snapshot);
        Self {
            id: id.into(),
            title: title.into(),
            active_version_id: version.id.clone(),
            versions: vec![version],
        }
    }

    /// Rebuilds a container from persisted parts, validating the invariant.
    pub fn from_parts(
        id: impl Into<String>,
        title: impl Into<String>,
        active_version_id: impl Into<String>,
        versions: Vec<Version>,
    ) -> Result<Self> {
        let id = id.into();
        let active_version_id = active_version_id.into();

        if versions.is_empty() {
            return Err(EvidexError::migration(format!(
                "container '{}' has no versions",
                id
            )));
        }
        if !versions.iter().any(|v| v.id == active_version_id) {
            return Err(EvidexError::migration(format!(
                "container '{}' points at unknown active version '{}'",
                id, active_version_id
            )));
        }

        Ok(Self {
            id,
            title: title.into(),
            active_version_id,
            versions,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn active_version_id(&self) -> &str {
        &self.active_version_id
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn version(&self, version_id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == version_id)
    }

    pub fn active_version(&self) -> &Version {
        // The invariant guarantees a hit; fall back to the first version
        // rather than panicking if it were ever broken.
        self.version(&self.active_version_id)
            .unwrap_or(&self.versions[0])
    }

    pub fn active_snapshot(&self) -> &Snapshot {
        &self.active_version().snapshot
    }

    /// Replaces the active version's snapshot and timestamp, keeping its id.
    pub fn overwrite_active(&mut self, snapshot: Snapshot) -> String {
        let active_id = self.active_version_id.clone();
        if let Some(version) = self.versions.iter_mut().find(|v| v.id == active_id) {
            version.snapshot = snapshot;
            version.timestamp = timestamp_now();
        }
        active_id
    }

    /// Appends a new version and makes it active.
    pub fn push_version(&mut self, snapshot: Snapshot) -> String {
        let version = Version::new(snapshot);
        let version_id = version.id.clone();
        self.versions.push(version);
        self.active_version_id = version_id.clone();
        version_id
    }

    /// Points the container at another of its versions.
    pub fn set_active(&mut self, version_id: &str) -> Result<()> {
        if self.version(version_id).is_none() {
            return Err(EvidexError::not_found("Version", version_id));
        }
        self.active_version_id = version_id.to_string();
        Ok(())
    }

    /// Assigns a new identity, used when an imported id collides.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn summary(&self) -> ContainerSummary {
        ContainerSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            version_count: self.versions.len(),
            active_version_id: self.active_version_id.clone(),
        }
    }

    /// Lists versions oldest first, labelled `v1..vN` in that order.
    pub fn version_summaries(&self) -> Vec<VersionSummary> {
        let mut ordered: Vec<&Version> = self.versions.iter().collect();
        ordered.sort_by_key(|v| v.timestamp);
        ordered
            .into_iter()
            .enumerate()
            .map(|(index, v)| VersionSummary {
                id: v.id.clone(),
                label: format!("v{}", index + 1),
                timestamp: v.timestamp,
                is_active: v.id == self.active_version_id,
            })
            .collect()
    }
}

/// Lightweight listing entry for a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub title: String,
    pub version_count: usize,
    pub active_version_id: String,
}

/// Listing entry for one version tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub id: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub is_active: bool,
}

//! Versioned, fork-aware conversation store.
//!
//! The whole collection is held in memory behind one `RwLock` and written
//! back through the repository after every mutation. Mutations are applied to
//! a copy first and only committed once the copy has been persisted, so a
//! failed write leaves memory and disk in agreement.

use evidex_core::conversation::{
    Container, ContainerSummary, ConversationRepository, SaveAction, Snapshot, VersionSummary,
    new_id,
};
use evidex_core::error::{EvidexError, Result};
use evidex_infrastructure::dto::SnapshotRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// What a save did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub container_id: String,
    pub version_id: String,
    /// The save created a new container instead of touching the requested one
    pub forked: bool,
}

/// One conversation handed to [`VersionedConversationStore::bulk_import`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedConversation {
    pub id: Option<String>,
    pub snapshot: Snapshot,
}

impl ImportedConversation {
    pub fn new(id: Option<String>, snapshot: Snapshot) -> Self {
        Self { id, snapshot }
    }

    /// Parses an import file: a JSON array of conversation records or a
    /// single record.
    pub fn parse_json(text: &str) -> Result<Vec<Self>> {
        let records = match serde_json::from_str::<ImportFile>(text)? {
            ImportFile::Many(records) => records,
            ImportFile::One(record) => vec![record],
        };
        Ok(records.into_iter().map(Self::from).collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Many(Vec<SnapshotRecord>),
    One(SnapshotRecord),
}

impl From<SnapshotRecord> for ImportedConversation {
    fn from(record: SnapshotRecord) -> Self {
        let id = record.id.clone();
        Self {
            id,
            snapshot: record.into_snapshot(),
        }
    }
}

/// The active snapshot of a container, ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedConversation {
    pub container_id: String,
    pub snapshot: Snapshot,
}

impl ExportedConversation {
    /// The record shape accepted back by [`ImportedConversation::parse_json`].
    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord::from_snapshot(Some(self.container_id.clone()), &self.snapshot)
    }

    /// Serializes a batch as a pretty JSON array of records.
    pub fn to_json(exported: &[ExportedConversation]) -> Result<String> {
        let records: Vec<SnapshotRecord> = exported.iter().map(Self::to_record).collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

pub struct VersionedConversationStore {
    containers: RwLock<Vec<Container>>,
    /// Serializes writers; readers only ever wait on the final swap.
    write_gate: Mutex<()>,
    repository: Arc<dyn ConversationRepository>,
    default_system_prompt: String,
}

impl VersionedConversationStore {
    /// Creates an empty store. Call [`load`](Self::load) to read persisted data.
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        default_system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            containers: RwLock::new(Vec::new()),
            write_gate: Mutex::new(()),
            repository,
            default_system_prompt: default_system_prompt.into(),
        }
    }

    /// Creates a store and loads the persisted collection into it.
    pub async fn open(
        repository: Arc<dyn ConversationRepository>,
        default_system_prompt: impl Into<String>,
    ) -> Self {
        let store = Self::new(repository, default_system_prompt);
        store.load().await;
        store
    }

    /// Replaces the in-memory table with the persisted collection.
    ///
    /// A collection that cannot be read or decoded yields an empty store; the
    /// failure is logged, not returned. Returns the number of containers.
    pub async fn load(&self) -> usize {
        let _writer = self.write_gate.lock().await;
        let loaded = match self.repository.load_all().await {
            Ok(containers) => containers,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load conversation store, starting empty");
                Vec::new()
            }
        };

        let count = loaded.len();
        *self.containers.write().await = loaded;
        tracing::debug!(count, "Conversation store loaded");
        count
    }

    /// Applies `f` to a copy of the table, persists the copy, then commits it.
    ///
    /// The table lock is only held to take the copy and to swap it back in,
    /// so reads keep being served while the copy is written out.
    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Container>) -> Result<T>,
    {
        let _writer = self.write_gate.lock().await;
        let mut next = self.containers.read().await.clone();
        let out = f(&mut next)?;
        self.repository.persist_all(&next).await?;
        *self.containers.write().await = next;
        Ok(out)
    }

    /// Saves `snapshot` under `title`.
    ///
    /// - no `container_id`: new container
    /// - unknown id, or the stored title differs from `title`: fork into a
    ///   new container, leaving the original untouched
    /// - same title: overwrite the active version or append a new one,
    ///   according to `action`
    pub async fn save_version(
        &self,
        container_id: Option<&str>,
        title: &str,
        mut snapshot: Snapshot,
        action: SaveAction,
    ) -> Result<SaveOutcome> {
        snapshot.title = title.to_string();

        self.mutate(|containers| {
            let position = container_id
                .and_then(|id| containers.iter().position(|c| c.id() == id))
                .filter(|&index| containers[index].title() == title);

            if let Some(index) = position {
                let container = &mut containers[index];
                let version_id = match action {
                    SaveAction::Overwrite => container.overwrite_active(snapshot),
                    SaveAction::New => container.push_version(snapshot),
                };
                tracing::debug!(
                    container_id = %container.id(),
                    version_id = %version_id,
                    action = ?action,
                    "Saved version"
                );
                return Ok(SaveOutcome {
                    container_id: container.id().to_string(),
                    version_id,
                    forked: false,
                });
            }

            let forked = container_id.is_some();
            let container = Container::new(new_id(), title, snapshot);
            let outcome = SaveOutcome {
                container_id: container.id().to_string(),
                version_id: container.active_version_id().to_string(),
                forked,
            };
            if let Some(from) = container_id {
                tracing::debug!(
                    from,
                    to = %outcome.container_id,
                    "Title changed or container unknown, forked"
                );
            }
            containers.push(container);
            Ok(outcome)
        })
        .await
    }

    /// Points a container at one of its existing versions.
    pub async fn switch_active_version(&self, container_id: &str, version_id: &str) -> Result<()> {
        self.mutate(|containers| {
            let container = find_mut(containers, container_id)?;
            container.set_active(version_id)
        })
        .await?;

        tracing::debug!(container_id, version_id, "Switched active version");
        Ok(())
    }

    /// Returns a copy of the active snapshot.
    pub async fn load_active_snapshot(&self, container_id: &str) -> Result<Snapshot> {
        let containers = self.containers.read().await;
        let container = find(&containers, container_id)?;
        Ok(container.active_snapshot().clone())
    }

    /// Returns a copy of a specific historical snapshot.
    pub async fn load_version_snapshot(
        &self,
        container_id: &str,
        version_id: &str,
    ) -> Result<Snapshot> {
        let containers = self.containers.read().await;
        let container = find(&containers, container_id)?;
        container
            .version(version_id)
            .map(|v| v.snapshot.clone())
            .ok_or_else(|| EvidexError::not_found("Version", version_id))
    }

    /// Removes a container with all its versions.
    ///
    /// Returns `false` (and persists nothing) when the id is unknown.
    pub async fn delete_container(&self, container_id: &str) -> Result<bool> {
        {
            let containers = self.containers.read().await;
            if !containers.iter().any(|c| c.id() == container_id) {
                tracing::warn!(container_id, "Delete requested for unknown container");
                return Ok(false);
            }
        }

        self.mutate(|containers| {
            containers.retain(|c| c.id() != container_id);
            Ok(())
        })
        .await?;

        tracing::debug!(container_id, "Deleted container");
        Ok(true)
    }

    /// Adds each conversation as a new single-version container.
    ///
    /// Missing ids are synthesized and ids already in use (by the store or an
    /// earlier entry of this batch) are replaced. Transcripts that do not
    /// open with a system message get the default system prompt. Returns the
    /// assigned ids in input order.
    pub async fn bulk_import(&self, conversations: Vec<ImportedConversation>) -> Result<Vec<String>> {
        let default_prompt = self.default_system_prompt.clone();

        let ids = self
            .mutate(move |containers| {
                let mut taken: HashSet<String> =
                    containers.iter().map(|c| c.id().to_string()).collect();
                let mut ids = Vec::with_capacity(conversations.len());

                for imported in conversations {
                    let id = match imported.id.filter(|id| !id.is_empty()) {
                        Some(id) if !taken.contains(&id) => id,
                        Some(id) => {
                            let fresh = new_id();
                            tracing::warn!(
                                imported_id = %id,
                                new_id = %fresh,
                                "Imported id already in use, assigning a new one"
                            );
                            fresh
                        }
                        None => new_id(),
                    };

                    let mut snapshot = imported.snapshot;
                    if snapshot.ensure_system_prompt(&default_prompt) {
                        tracing::debug!(container_id = %id, "Injected default system prompt");
                    }

                    let title = snapshot.title.clone();
                    taken.insert(id.clone());
                    containers.push(Container::new(id.clone(), title, snapshot));
                    ids.push(id);
                }

                Ok(ids)
            })
            .await?;

        tracing::info!(count = ids.len(), "Imported conversations");
        Ok(ids)
    }

    /// Lists containers in stored order.
    pub async fn list_containers(&self) -> Vec<ContainerSummary> {
        self.containers
            .read()
            .await
            .iter()
            .map(Container::summary)
            .collect()
    }

    /// Lists a container's versions oldest first, labelled `v1..vN`.
    pub async fn list_versions(&self, container_id: &str) -> Result<Vec<VersionSummary>> {
        let containers = self.containers.read().await;
        Ok(find(&containers, container_id)?.version_summaries())
    }

    /// Active snapshots of the given containers with system messages removed.
    ///
    /// Unknown ids are skipped.
    pub async fn export_active(&self, container_ids: &[String]) -> Vec<ExportedConversation> {
        let containers = self.containers.read().await;
        container_ids
            .iter()
            .filter_map(|id| match find(&containers, id) {
                Ok(container) => Some(ExportedConversation {
                    container_id: container.id().to_string(),
                    snapshot: container.active_snapshot().without_system_messages(),
                }),
                Err(_) => {
                    tracing::debug!(container_id = %id, "Skipping unknown container in export");
                    None
                }
            })
            .collect()
    }

    /// First container (in stored order) with exactly this title.
    pub async fn find_by_title(&self, title: &str) -> Option<String> {
        self.containers
            .read()
            .await
            .iter()
            .find(|c| c.title() == title)
            .map(|c| c.id().to_string())
    }

    pub async fn len(&self) -> usize {
        self.containers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.containers.read().await.is_empty()
    }
}

fn find<'a>(containers: &'a [Container], id: &str) -> Result<&'a Container> {
    containers
        .iter()
        .find(|c| c.id() == id)
        .ok_or_else(|| EvidexError::not_found("Container", id))
}

fn find_mut<'a>(containers: &'a mut [Container], id: &str) -> Result<&'a mut Container> {
    containers
        .iter_mut()
        .find(|c| c.id() == id)
        .ok_or_else(|| EvidexError::not_found("Container", id))
}

//! File-backed ConversationRepository.
//!
//! The whole collection lives in one file that is rewritten atomically on
//! every persist. Legacy records are migrated while loading, so the file is
//! upgraded to the versioned layout on the first write after a load.

use crate::dto::PersistedCollection;
use crate::migration::resolve_collection;
use crate::storage::{AtomicTextFile, CollectionCodec, JsonCollectionCodec};
use async_trait::async_trait;
use evidex_core::conversation::{Container, ConversationRepository, timestamp_now};
use evidex_core::error::{EvidexError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct JsonConversationRepository {
    file: AtomicTextFile,
    codec: Arc<dyn CollectionCodec>,
}

impl JsonConversationRepository {
    /// Stores the collection as JSON at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_codec(path, Arc::new(JsonCollectionCodec::new()))
    }

    /// Stores the collection at `path` in the codec's format.
    pub fn with_codec(path: impl Into<PathBuf>, codec: Arc<dyn CollectionCodec>) -> Self {
        Self {
            file: AtomicTextFile::new(path),
            codec,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[async_trait]
impl ConversationRepository for JsonConversationRepository {
    async fn load_all(&self) -> Result<Vec<Container>> {
        let file = self.file.clone();
        let text = tokio::task::spawn_blocking(move || file.read())
            .await
            .map_err(|e| EvidexError::internal(format!("Store read task failed: {}", e)))??;

        let Some(text) = text else {
            tracing::debug!(path = %self.path().display(), "No store file yet");
            return Ok(Vec::new());
        };

        let collection = self.codec.decode(&text)?;
        let containers = resolve_collection(collection, timestamp_now());
        tracing::debug!(
            path = %self.path().display(),
            count = containers.len(),
            "Loaded conversation store"
        );
        Ok(containers)
    }

    async fn persist_all(&self, containers: &[Container]) -> Result<()> {
        let text = self
            .codec
            .encode(&PersistedCollection::from_containers(containers))?;

        let file = self.file.clone();
        tokio::task::spawn_blocking(move || file.write(&text))
            .await
            .map_err(|e| EvidexError::internal(format!("Store write task failed: {}", e)))??;

        tracing::debug!(
            path = %self.path().display(),
            count = containers.len(),
            format = self.codec.format(),
            "Persisted conversation store"
        );
        Ok(())
    }
}

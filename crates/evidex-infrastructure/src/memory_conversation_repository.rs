//! In-memory ConversationRepository.
//!
//! Keeps the encoded collection text instead of live containers, so loads go
//! through the same decode and migration path as the file repository.

use crate::dto::PersistedCollection;
use crate::migration::resolve_collection;
use crate::storage::{CollectionCodec, JsonCollectionCodec};
use async_trait::async_trait;
use evidex_core::conversation::{Container, ConversationRepository, timestamp_now};
use evidex_core::error::Result;
use std::sync::{Arc, Mutex};

pub struct InMemoryConversationRepository {
    text: Mutex<Option<String>>,
    codec: Arc<dyn CollectionCodec>,
    persist_count: Mutex<usize>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self {
            text: Mutex::new(None),
            codec: Arc::new(JsonCollectionCodec::new()),
            persist_count: Mutex::new(0),
        }
    }

    /// Starts from raw persisted text, e.g. a legacy or corrupted store.
    pub fn with_text(text: impl Into<String>) -> Self {
        let repo = Self::new();
        *repo.text.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.into());
        repo
    }

    /// The currently persisted text, if anything was ever written.
    pub fn text(&self) -> Option<String> {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// How many times the collection has been persisted.
    pub fn persist_count(&self) -> usize {
        *self.persist_count.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryConversationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn load_all(&self) -> Result<Vec<Container>> {
        let Some(text) = self.text() else {
            return Ok(Vec::new());
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let collection = self.codec.decode(&text)?;
        Ok(resolve_collection(collection, timestamp_now()))
    }

    async fn persist_all(&self, containers: &[Container]) -> Result<()> {
        let text = self
            .codec
            .encode(&PersistedCollection::from_containers(containers))?;

        *self.text.lock().unwrap_or_else(|e| e.into_inner()) = Some(text);
        *self.persist_count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

//! Wiring of the store, the upstream adapter, and resolution.

use crate::conversation_store::VersionedConversationStore;
use crate::reference::{EvidenceSession, ReferenceResolutionService, RetryPolicy};
use crate::telemetry::init_tracing;
use evidex_core::config::EvidexConfig;
use evidex_core::conversation::ConversationRepository;
use evidex_core::error::{EvidexError, Result};
use evidex_core::reference::ReferenceSource;
use evidex_infrastructure::storage::{CollectionCodec, JsonCollectionCodec};
use evidex_infrastructure::{ConfigService, HttpReferenceSource, JsonConversationRepository};
use std::sync::Arc;

pub struct EvidexApp {
    config: EvidexConfig,
    store: Arc<VersionedConversationStore>,
    resolution: Arc<ReferenceResolutionService>,
}

impl EvidexApp {
    /// Loads `config.toml` from the platform config directory and opens the app.
    pub async fn open_default() -> Result<Self> {
        Self::bootstrap(&ConfigService::new()).await
    }

    /// Loads configuration through `configs`, installs logging, and opens the
    /// app.
    ///
    /// An invalid log filter is an error. A subscriber installed earlier (by
    /// an embedding host or a previous bootstrap) is kept.
    pub async fn bootstrap(configs: &ConfigService) -> Result<Self> {
        let config = configs.get_config()?;

        match init_tracing(&config.logging) {
            Ok(()) => {}
            Err(e @ EvidexError::Config(_)) => return Err(e),
            Err(e) => tracing::debug!(error = %e, "Keeping existing tracing subscriber"),
        }

        Self::from_config(config).await
    }

    /// Opens the JSON store and the HTTP reasoning service named by `config`.
    pub async fn from_config(config: EvidexConfig) -> Result<Self> {
        let store_path = ConfigService::store_path(&config)?;
        tracing::info!(path = %store_path.display(), "Opening conversation store");

        let codec: Arc<dyn CollectionCodec> = if config.store.pretty {
            Arc::new(JsonCollectionCodec::pretty())
        } else {
            Arc::new(JsonCollectionCodec::new())
        };
        let repository = Arc::new(JsonConversationRepository::with_codec(store_path, codec));
        let source = Arc::new(HttpReferenceSource::new(&config.upstream)?);
        Ok(Self::with_parts(config, repository, source).await)
    }

    /// Builds the app around caller-supplied persistence and upstream.
    pub async fn with_parts(
        config: EvidexConfig,
        repository: Arc<dyn ConversationRepository>,
        source: Arc<dyn ReferenceSource>,
    ) -> Self {
        let store = Arc::new(
            VersionedConversationStore::open(
                repository,
                config.store.default_system_prompt.clone(),
            )
            .await,
        );
        let resolution = Arc::new(ReferenceResolutionService::new(
            store.clone(),
            source,
            RetryPolicy::new(config.upstream.max_retries),
        ));

        Self {
            config,
            store,
            resolution,
        }
    }

    pub fn config(&self) -> &EvidexConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<VersionedConversationStore> {
        &self.store
    }

    pub fn resolution(&self) -> &Arc<ReferenceResolutionService> {
        &self.resolution
    }

    /// A fresh evidence session for one open view.
    pub fn new_session(&self) -> EvidenceSession {
        EvidenceSession::new(self.resolution.clone())
    }
}

//! Claim-to-evidence resolution.
//!
//! Loads the active snapshot of a container, asks the reasoning service which
//! passages support a claim, and locates each passage in the transcript.

use super::retry::RetryPolicy;
use crate::conversation_store::VersionedConversationStore;
use evidex_core::conversation::{Message, Snapshot};
use evidex_core::error::{EvidexError, Result};
use evidex_core::evidence::{EvidenceResult, QuoteEvidence};
use evidex_core::reference::{
    BatchConversation, BatchReferenceEntry, BatchReferencePayload, DeepDiveAnalysis,
    ReferencePayload, ReferenceSource, SupportingQuote, parse_batch_reference_payload,
    parse_deep_dive, parse_reference_payload,
};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A container that could not be resolved as part of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub container_id: String,
    pub error: EvidexError,
}

/// Outcome of resolving one claim across several containers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResolution {
    /// Successful lookups in request order, including ones with no evidence
    pub results: Vec<EvidenceResult>,
    pub failures: Vec<BatchFailure>,
}

impl BatchResolution {
    pub fn has_evidence(&self) -> bool {
        self.results.iter().any(EvidenceResult::has_evidence)
    }
}

/// Located evidence for one justification or defense point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeepDiveResult {
    pub point: String,
    pub analysis: String,
    pub quotes: Vec<QuoteEvidence>,
}

pub struct ReferenceResolutionService {
    store: Arc<VersionedConversationStore>,
    source: Arc<dyn ReferenceSource>,
    retry: RetryPolicy,
}

impl ReferenceResolutionService {
    pub fn new(
        store: Arc<VersionedConversationStore>,
        source: Arc<dyn ReferenceSource>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            source,
            retry,
        }
    }

    pub fn store(&self) -> &Arc<VersionedConversationStore> {
        &self.store
    }

    /// Resolves `claim` against the active snapshot of one container.
    ///
    /// A result without any located quote is a valid outcome, not an error.
    pub async fn resolve_single(&self, claim: &str, container_id: &str) -> Result<EvidenceResult> {
        let snapshot = self.store.load_active_snapshot(container_id).await?;
        let payload = self.fetch_references(claim, &snapshot.messages).await?;

        tracing::debug!(
            container_id,
            quotes = payload.supporting_material.len(),
            "Reference payload received"
        );

        Ok(collect(container_id, &snapshot, payload.supporting_material))
    }

    /// Locates already-known quotations in a container's active snapshot.
    pub async fn resolve_quotes(
        &self,
        container_id: &str,
        quotes: Vec<String>,
    ) -> Result<EvidenceResult> {
        let snapshot = self.store.load_active_snapshot(container_id).await?;
        let quotes = quotes.into_iter().map(SupportingQuote::new).collect();
        Ok(collect(container_id, &snapshot, quotes))
    }

    /// Resolves `claim` against several containers concurrently.
    ///
    /// Each container succeeds or fails on its own; failures are collected.
    pub async fn resolve_batch(&self, claim: &str, container_ids: &[String]) -> BatchResolution {
        let lookups = container_ids
            .iter()
            .map(|id| async move { (id, self.resolve_single(claim, id).await) });

        let mut resolution = BatchResolution::default();
        for (container_id, outcome) in join_all(lookups).await {
            match outcome {
                Ok(result) => resolution.results.push(result),
                Err(error) => {
                    tracing::warn!(container_id = %container_id, error = %error, "Batch lookup failed");
                    resolution.failures.push(BatchFailure {
                        container_id: container_id.clone(),
                        error,
                    });
                }
            }
        }

        tracing::debug!(
            resolved = resolution.results.len(),
            failed = resolution.failures.len(),
            "Batch resolution finished"
        );
        resolution
    }

    /// Resolves a cognitive `pattern` against several containers with a single
    /// batch request.
    ///
    /// Each result from the service is mapped back to its container by the
    /// echoed id, or by title when the id is missing or unknown. Containers
    /// that cannot be loaded, or that the service returned nothing for, are
    /// reported as failures. An exhausted retry budget fails every container.
    pub async fn resolve_pattern(&self, pattern: &str, container_ids: &[String]) -> BatchResolution {
        let mut resolution = BatchResolution::default();
        let mut requested: Vec<(String, Snapshot)> = Vec::with_capacity(container_ids.len());

        for id in container_ids {
            match self.store.load_active_snapshot(id).await {
                Ok(snapshot) => requested.push((id.clone(), snapshot)),
                Err(error) => resolution.failures.push(BatchFailure {
                    container_id: id.clone(),
                    error,
                }),
            }
        }
        if requested.is_empty() {
            return resolution;
        }

        let conversations: Vec<BatchConversation> = requested
            .iter()
            .map(|(id, snapshot)| BatchConversation {
                id: id.clone(),
                title: snapshot.title.clone(),
                conversation: snapshot.messages.clone(),
            })
            .collect();

        let payload = match self.fetch_batch_references(pattern, &conversations).await {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(error = %error, "Batch reference detection failed");
                resolution
                    .failures
                    .extend(requested.into_iter().map(|(container_id, _)| BatchFailure {
                        container_id,
                        error: error.clone(),
                    }));
                return resolution;
            }
        };

        let mut quotes_by_container: HashMap<String, Vec<SupportingQuote>> = HashMap::new();
        for entry in payload.results {
            match self.container_for_entry(&entry, &requested).await {
                Some(container_id) => {
                    quotes_by_container
                        .entry(container_id)
                        .or_default()
                        .extend(entry.supporting_material);
                }
                None => tracing::warn!(
                    conversation_id = ?entry.conversation_id,
                    conversation_title = ?entry.conversation_title,
                    "Batch result matches no requested container, skipping"
                ),
            }
        }

        for (container_id, snapshot) in &requested {
            match quotes_by_container.remove(container_id) {
                Some(quotes) => resolution.results.push(collect(container_id, snapshot, quotes)),
                None => resolution.failures.push(BatchFailure {
                    container_id: container_id.clone(),
                    error: EvidexError::upstream("no detection result returned for conversation"),
                }),
            }
        }

        tracing::debug!(
            resolved = resolution.results.len(),
            failed = resolution.failures.len(),
            "Pattern resolution finished"
        );
        resolution
    }

    async fn container_for_entry(
        &self,
        entry: &BatchReferenceEntry,
        requested: &[(String, Snapshot)],
    ) -> Option<String> {
        let is_requested = |id: &str| requested.iter().any(|(requested_id, _)| requested_id == id);

        if let Some(id) = entry.conversation_id.as_deref().filter(|id| is_requested(id)) {
            return Some(id.to_string());
        }

        let title = entry.conversation_title.as_deref()?;
        let id = self.store.find_by_title(title).await?;
        is_requested(&id).then_some(id)
    }

    /// Runs a deep dive on `point` and locates its supporting quotes.
    ///
    /// Uncached; [`EvidenceSession`](super::EvidenceSession) caches per item.
    pub async fn deep_dive(&self, point: &str, container_id: &str) -> Result<DeepDiveResult> {
        let snapshot = self.store.load_active_snapshot(container_id).await?;
        let analysis = self.fetch_deep_dive(point, &snapshot.messages).await?;

        let quotes = analysis
            .supporting_quotes
            .into_iter()
            .map(|quote| QuoteEvidence::locate_in(SupportingQuote::new(quote), &snapshot.messages))
            .collect();

        Ok(DeepDiveResult {
            point: if analysis.point.is_empty() {
                point.to_string()
            } else {
                analysis.point
            },
            analysis: analysis.deep_dive_analysis,
            quotes,
        })
    }

    async fn fetch_references(&self, claim: &str, messages: &[Message]) -> Result<ReferencePayload> {
        let source = &self.source;
        self.retry
            .run("detect_reference", move |_| async move {
                let raw = source.detect_references(claim, messages).await?;
                parse_reference_payload(&raw)
            })
            .await
    }

    async fn fetch_batch_references(
        &self,
        pattern: &str,
        conversations: &[BatchConversation],
    ) -> Result<BatchReferencePayload> {
        let source = &self.source;
        self.retry
            .run("detect_batch_reference", move |_| async move {
                let raw = source
                    .detect_batch_references(pattern, conversations)
                    .await?;
                parse_batch_reference_payload(&raw)
            })
            .await
    }

    async fn fetch_deep_dive(&self, point: &str, messages: &[Message]) -> Result<DeepDiveAnalysis> {
        let source = &self.source;
        self.retry
            .run("deep_dive_reference", move |_| async move {
                let raw = source.deep_dive(point, messages).await?;
                parse_deep_dive(&raw)
            })
            .await
    }
}

fn collect(container_id: &str, snapshot: &Snapshot, quotes: Vec<SupportingQuote>) -> EvidenceResult {
    EvidenceResult::collect(container_id, snapshot.title.clone(), snapshot, quotes)
}

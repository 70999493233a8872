//! Evidence lookup session.
//!
//! One session backs one open evidence view: a claim lookup plus the deep
//! dives expanded beneath it. Every request takes a ticket (the session
//! generation when it started); a result is only recorded if the generation
//! is unchanged when it arrives. Closing the session or starting a new lookup
//! bumps the generation, so late results are dropped.
//!
//! The generation lives with the slots under one lock: a ticket is always
//! taken in the same critical section that marks the slot as requested.

use super::deep_dive::{DeepDiveCache, DeepDiveState};
use super::resolution_service::{BatchResolution, ReferenceResolutionService};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum LookupState {
    Idle,
    Requested { claim: String },
    /// At least one quote was located
    Resolved(BatchResolution),
    /// Lookups succeeded but nothing supporting the claim was located
    Empty(BatchResolution),
    /// Every container failed, e.g. the upstream retry budget ran out
    Failed(String),
}

impl LookupState {
    fn from_resolution(resolution: BatchResolution) -> Self {
        if resolution.results.is_empty() && !resolution.failures.is_empty() {
            let message = resolution
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.container_id, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            return LookupState::Failed(message);
        }

        if resolution.has_evidence() {
            LookupState::Resolved(resolution)
        } else {
            LookupState::Empty(resolution)
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, LookupState::Idle)
    }
}

struct SessionSlots {
    generation: u64,
    lookup: LookupState,
    deep_dives: DeepDiveCache,
}

impl SessionSlots {
    /// Drops every slot and invalidates outstanding tickets.
    fn reset(&mut self) {
        self.generation += 1;
        self.lookup = LookupState::Idle;
        self.deep_dives.clear();
    }
}

pub struct EvidenceSession {
    service: Arc<ReferenceResolutionService>,
    slots: RwLock<SessionSlots>,
}

impl EvidenceSession {
    pub fn new(service: Arc<ReferenceResolutionService>) -> Self {
        Self {
            service,
            slots: RwLock::new(SessionSlots {
                generation: 0,
                lookup: LookupState::Idle,
                deep_dives: DeepDiveCache::new(),
            }),
        }
    }

    pub async fn lookup_state(&self) -> LookupState {
        self.slots.read().await.lookup.clone()
    }

    pub async fn deep_dive_state(&self, item_id: &str) -> DeepDiveState {
        self.slots.read().await.deep_dives.state(item_id)
    }

    /// Looks up `claim` across `container_ids`.
    ///
    /// Starting a lookup discards the previous one, including its expanded
    /// deep dives. Returns the session's lookup state once the request has
    /// finished; if the session was closed or superseded meanwhile, that is
    /// whatever state replaced it.
    pub async fn lookup(&self, claim: &str, container_ids: &[String]) -> LookupState {
        let ticket = {
            let mut slots = self.slots.write().await;
            slots.reset();
            slots.lookup = LookupState::Requested {
                claim: claim.to_string(),
            };
            slots.generation
        };

        let resolution = self.service.resolve_batch(claim, container_ids).await;
        let state = LookupState::from_resolution(resolution);

        let mut slots = self.slots.write().await;
        if slots.generation == ticket {
            slots.lookup = state;
        } else {
            tracing::debug!(claim, "Lookup finished after session moved on, discarding");
        }
        slots.lookup.clone()
    }

    /// Expands one reasoning point, at most once per item.
    ///
    /// A cached, pending, or failed item is returned as is without querying
    /// the upstream again.
    pub async fn expand(&self, item_id: &str, point: &str, container_id: &str) -> DeepDiveState {
        let ticket = {
            let mut slots = self.slots.write().await;
            if !slots.deep_dives.begin(item_id) {
                tracing::debug!(item_id, "Deep dive already requested, serving cached state");
                return slots.deep_dives.state(item_id);
            }
            slots.generation
        };

        let outcome = self
            .service
            .deep_dive(point, container_id)
            .await
            .map_err(|e| {
                tracing::warn!(item_id, error = %e, "Deep dive failed");
                e.to_string()
            });

        let mut slots = self.slots.write().await;
        if slots.generation == ticket {
            slots.deep_dives.complete(item_id, outcome);
        } else {
            tracing::debug!(item_id, "Deep dive finished after session moved on, discarding");
        }
        slots.deep_dives.state(item_id)
    }

    /// Tears the session down: every slot is discarded and in-flight results
    /// will be ignored when they arrive.
    pub async fn close(&self) {
        self.slots.write().await.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation_store::VersionedConversationStore;
    use crate::reference::{PointKind, RetryPolicy, item_id};
    use async_trait::async_trait;
    use evidex_core::conversation::{Message, SaveAction, Snapshot};
    use evidex_core::error::{EvidexError, Result};
    use evidex_core::reference::{BatchConversation, ReferenceSource};
    use evidex_infrastructure::InMemoryConversationRepository;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    const ANSWER: &str = "We sharded by tenant id so that one noisy customer could never \
                          starve the others of write capacity. It worked.";
    const QUOTE: &str = "sharded by tenant id so that one noisy customer could never starve";

    struct FakeSource {
        detect_body: String,
        deep_ok: bool,
        deep_calls: AtomicU32,
        /// When set, deep dives wait for it before answering
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ReferenceSource for FakeSource {
        async fn detect_references(&self, _claim: &str, _messages: &[Message]) -> Result<String> {
            Ok(self.detect_body.clone())
        }

        async fn detect_batch_references(
            &self,
            _pattern: &str,
            _conversations: &[BatchConversation],
        ) -> Result<String> {
            Ok(r#"{"results": []}"#.to_string())
        }

        async fn deep_dive(&self, point: &str, _messages: &[Message]) -> Result<String> {
            self.deep_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.deep_ok {
                Ok(format!(
                    r#"{{"point": "{point}", "deep_dive_analysis": "ok", "supporting_quotes": ["{QUOTE}"]}}"#
                ))
            } else {
                Err(EvidexError::upstream("service unavailable"))
            }
        }
    }

    fn source(detect_quote: &str, deep_ok: bool, gate: Option<Arc<Notify>>) -> FakeSource {
        FakeSource {
            detect_body: format!(r#"{{"supporting_material": ["{detect_quote}"]}}"#),
            deep_ok,
            deep_calls: AtomicU32::new(0),
            gate,
        }
    }

    async fn session(source: FakeSource) -> (Arc<EvidenceSession>, Arc<FakeSource>, String) {
        let repo = Arc::new(InMemoryConversationRepository::new());
        let store = Arc::new(VersionedConversationStore::new(repo, "sys"));
        let saved = store
            .save_version(
                None,
                "Scaling",
                Snapshot::new("", vec![Message::user(ANSWER)]),
                SaveAction::New,
            )
            .await
            .unwrap();

        let source = Arc::new(source);
        let service = Arc::new(ReferenceResolutionService::new(
            store,
            source.clone(),
            RetryPolicy::new(1),
        ));
        (Arc::new(EvidenceSession::new(service)), source, saved.container_id)
    }

    #[tokio::test]
    async fn test_lookup_resolves_then_close_returns_to_idle() {
        let (session, _, id) = session(source(QUOTE, true, None)).await;
        assert!(session.lookup_state().await.is_idle());

        let state = session.lookup("Isolation", &[id]).await;
        assert!(matches!(state, LookupState::Resolved(_)));

        session.close().await;
        assert!(session.lookup_state().await.is_idle());
    }

    #[tokio::test]
    async fn test_lookup_without_located_quote_is_empty() {
        let unrelated = "a completely different sentence that the candidate never said aloud";
        let (session, _, id) = session(source(unrelated, true, None)).await;

        let state = session.lookup("Isolation", &[id]).await;
        assert!(matches!(state, LookupState::Empty(_)));
    }

    #[tokio::test]
    async fn test_lookup_failure_when_every_container_fails() {
        let (session, _, _) = session(source(QUOTE, true, None)).await;

        let state = session.lookup("Isolation", &["missing".to_string()]).await;
        assert!(matches!(state, LookupState::Failed(_)));
    }

    #[tokio::test]
    async fn test_expand_is_cached_per_item() {
        let (session, source, id) = session(source(QUOTE, true, None)).await;
        let item = item_id(0, 0, PointKind::Justification);

        let first = session.expand(&item, "isolation", &id).await;
        let second = session.expand(&item, "isolation", &id).await;

        assert!(matches!(first, DeepDiveState::Resolved(_)));
        assert_eq!(first, second);
        assert_eq!(source.deep_calls.load(Ordering::SeqCst), 1);

        // A different item is its own request
        session
            .expand(&item_id(0, 0, PointKind::Defense), "isolation", &id)
            .await;
        assert_eq!(source.deep_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_expand_is_terminal() {
        let (session, source, id) = session(source(QUOTE, false, None)).await;
        let item = item_id(0, 0, PointKind::Defense);

        let first = session.expand(&item, "isolation", &id).await;
        assert!(matches!(first, DeepDiveState::Failed(_)));
        // One attempt plus one retry
        assert_eq!(source.deep_calls.load(Ordering::SeqCst), 2);

        let second = session.expand(&item, "isolation", &id).await;
        assert!(matches!(second, DeepDiveState::Failed(_)));
        assert_eq!(source.deep_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_result_arriving_after_close_is_ignored() {
        let gate = Arc::new(Notify::new());
        let (session, _, id) = session(source(QUOTE, true, Some(gate.clone()))).await;
        let item = item_id(0, 0, PointKind::Justification);

        let pending = {
            let session = session.clone();
            let item = item.clone();
            tokio::spawn(async move { session.expand(&item, "isolation", &id).await })
        };

        // Wait until the request is in flight
        while session.deep_dive_state(&item).await != DeepDiveState::Requested {
            tokio::task::yield_now().await;
        }

        session.close().await;
        gate.notify_one();

        let returned = pending.await.unwrap();
        assert_eq!(returned, DeepDiveState::Collapsed);
        assert_eq!(session.deep_dive_state(&item).await, DeepDiveState::Collapsed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_racing_expand_never_strands_a_request() {
        let (session, _, id) = session(source(QUOTE, true, None)).await;
        let item = item_id(0, 0, PointKind::Justification);

        for _ in 0..50 {
            let expanding = {
                let session = session.clone();
                let item = item.clone();
                let id = id.clone();
                tokio::spawn(async move { session.expand(&item, "isolation", &id).await })
            };
            let closing = {
                let session = session.clone();
                tokio::spawn(async move { session.close().await })
            };
            expanding.await.unwrap();
            closing.await.unwrap();

            // Nothing is in flight, so the item is either settled or reset
            let state = session.deep_dive_state(&item).await;
            assert_ne!(state, DeepDiveState::Requested);
            session.close().await;
        }

        let state = session.expand(&item, "isolation", &id).await;
        assert!(matches!(state, DeepDiveState::Resolved(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_racing_lookup_never_strands_a_request() {
        let (session, _, id) = session(source(QUOTE, true, None)).await;
        let ids = vec![id];

        for _ in 0..50 {
            let looking = {
                let session = session.clone();
                let ids = ids.clone();
                tokio::spawn(async move { session.lookup("Isolation", &ids).await })
            };
            let closing = {
                let session = session.clone();
                tokio::spawn(async move { session.close().await })
            };
            looking.await.unwrap();
            closing.await.unwrap();

            let state = session.lookup_state().await;
            assert!(state.is_idle() || matches!(state, LookupState::Resolved(_)));
        }
    }
}

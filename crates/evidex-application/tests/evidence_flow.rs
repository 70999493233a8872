//! End-to-end: a legacy store on disk, edits saved as versions, and claims
//! resolved against whichever version is active.

use async_trait::async_trait;
use evidex_application::reference::{PointKind, item_id};
use evidex_application::{DeepDiveState, EvidexApp, LookupState};
use evidex_core::config::EvidexConfig;
use evidex_core::conversation::{Message, MessageRole, SaveAction};
use evidex_core::error::Result;
use evidex_core::reference::{BatchConversation, ReferenceSource};
use evidex_infrastructure::JsonConversationRepository;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

const ORIGINAL_ANSWER: &str = "Honestly the first thing I did was add tracing to every hop so \
                               we could see where latency accumulated. Then we fixed the worst one.";
const EDITED_ANSWER: &str = "We replaced the polling loop with change data capture so that \
                             consumers only woke up when rows actually changed.";

const TRACING_QUOTE: &str =
    "the first thing I did was add tracing to every hop so we could see where latency accumulated";
const CDC_QUOTE: &str =
    "replaced the polling loop with change data capture so that consumers only woke up";

/// Claims every known quote supports the claim; the locator decides which
/// ones actually appear in the transcript it was handed.
struct StaticSource {
    detect_calls: AtomicU32,
    deep_calls: AtomicU32,
}

#[async_trait]
impl ReferenceSource for StaticSource {
    async fn detect_references(&self, _claim: &str, _messages: &[Message]) -> Result<String> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "```json\n{{\"reference\": \"Observability first\", \"supporting_material\": [\
             {{\"quote\": \"{TRACING_QUOTE}\", \"justification\": \"measures before fixing\", \
             \"defense\": \"could be habit\"}}, \"{CDC_QUOTE}\"]}}\n```"
        ))
    }

    /// Tags results by title only, the way the service does when it drops ids.
    async fn detect_batch_references(
        &self,
        _pattern: &str,
        conversations: &[BatchConversation],
    ) -> Result<String> {
        let results: Vec<serde_json::Value> = conversations
            .iter()
            .map(|c| {
                serde_json::json!({
                    "conversation_title": c.title,
                    "reference": "Observability first",
                    "supporting_material": [TRACING_QUOTE],
                })
            })
            .collect();
        Ok(serde_json::json!({ "results": results }).to_string())
    }

    async fn deep_dive(&self, point: &str, _messages: &[Message]) -> Result<String> {
        self.deep_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            r#"{{"point": "{point}", "deep_dive_analysis": "Instrumented before optimizing.", "supporting_quotes": ["{TRACING_QUOTE}"]}}"#
        ))
    }
}

fn legacy_store() -> String {
    serde_json::json!([[
        "legacy-1",
        {
            "id": "legacy-1",
            "title": "Latency debugging",
            "conversation": [
                {"role": "system", "content": "You are an interviewer."},
                {"role": "assistant", "content": "Tell me about a latency problem."},
                {"role": "user", "content": ORIGINAL_ANSWER}
            ],
            "evaluation": {"overall": "strong"}
        }
    ]])
    .to_string()
}

async fn open_app(temp_dir: &TempDir) -> (EvidexApp, Arc<StaticSource>) {
    let path = temp_dir.path().join("conversations.json");
    if !path.exists() {
        std::fs::write(&path, legacy_store()).unwrap();
    }

    let source = Arc::new(StaticSource {
        detect_calls: AtomicU32::new(0),
        deep_calls: AtomicU32::new(0),
    });
    let app = EvidexApp::with_parts(
        EvidexConfig::default(),
        Arc::new(JsonConversationRepository::new(path)),
        source.clone(),
    )
    .await;
    (app, source)
}

#[tokio::test]
async fn test_evidence_follows_the_active_version() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _) = open_app(&temp_dir).await;
    let store = app.store();

    // The legacy record was migrated into a one-version container
    let versions = store.list_versions("legacy-1").await.unwrap();
    assert_eq!(versions.len(), 1);
    let original_version = versions[0].id.clone();

    let original = store.load_active_snapshot("legacy-1").await.unwrap();
    assert_eq!(
        original.artifacts.evaluation,
        Some(serde_json::json!({"overall": "strong"}))
    );

    // Save an edited transcript as a new version of the same container
    let mut edited = original.clone();
    edited.messages[2] = Message::user(EDITED_ANSWER);
    let saved = store
        .save_version(Some("legacy-1"), "Latency debugging", edited, SaveAction::New)
        .await
        .unwrap();
    assert_eq!(saved.container_id, "legacy-1");

    let resolution = app.resolution();

    let on_edit = resolution
        .resolve_single("Observability first", "legacy-1")
        .await
        .unwrap();
    assert!(!on_edit.quotes[0].is_found());
    assert!(on_edit.quotes[1].is_found());
    assert_eq!(on_edit.quotes[1].matches[0].role, MessageRole::User);

    store
        .switch_active_version("legacy-1", &original_version)
        .await
        .unwrap();

    let on_original = resolution
        .resolve_single("Observability first", "legacy-1")
        .await
        .unwrap();
    assert!(on_original.quotes[0].is_found());
    assert!(!on_original.quotes[1].is_found());
    let span = &on_original.quotes[0].matches[0].span;
    assert_eq!(span.matched_text, TRACING_QUOTE);
    assert_eq!(span.prefix_context, "Honestly ");
    assert_eq!(span.suffix_context, ". Then we fixed the worst one.");
    assert_eq!(
        on_original.quotes[0].quote.justification.as_deref(),
        Some("measures before fixing")
    );
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let (app, _) = open_app(&temp_dir).await;
        let original = app.store().load_active_snapshot("legacy-1").await.unwrap();
        app.store()
            .save_version(Some("legacy-1"), "Renamed", original, SaveAction::Overwrite)
            .await
            .unwrap();
    }

    let (app, _) = open_app(&temp_dir).await;
    let listed = app.store().list_containers().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, "legacy-1");
    assert_eq!(listed[0].title, "Latency debugging");
    assert_eq!(listed[1].title, "Renamed");
    assert!(app.store().find_by_title("Renamed").await.is_some());

    // The rewritten file uses the versioned layout
    let raw = std::fs::read_to_string(temp_dir.path().join("conversations.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value[0][1]["versions"].is_array());
}

#[tokio::test]
async fn test_session_lookup_and_cached_deep_dive() {
    let temp_dir = TempDir::new().unwrap();
    let (app, source) = open_app(&temp_dir).await;
    let session = app.new_session();

    let state = session
        .lookup("Observability first", &["legacy-1".to_string()])
        .await;
    let LookupState::Resolved(resolution) = state else {
        panic!("expected resolved lookup");
    };
    assert_eq!(resolution.results[0].conversation_title, "Latency debugging");

    let item = item_id(0, 0, PointKind::Justification);
    let first = session
        .expand(&item, "measures before fixing", "legacy-1")
        .await;
    let again = session
        .expand(&item, "measures before fixing", "legacy-1")
        .await;
    assert!(matches!(first, DeepDiveState::Resolved(ref r) if r.quotes[0].is_found()));
    assert_eq!(first, again);
    assert_eq!(source.deep_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.detect_calls.load(Ordering::SeqCst), 1);

    session.close().await;
    assert!(session.lookup_state().await.is_idle());
    assert_eq!(session.deep_dive_state(&item).await, DeepDiveState::Collapsed);
}

#[tokio::test]
async fn test_pattern_lookup_maps_titles_back_to_containers() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _) = open_app(&temp_dir).await;
    let store = app.store();

    let edited = {
        let mut snapshot = store.load_active_snapshot("legacy-1").await.unwrap();
        snapshot.messages[2] = Message::user(EDITED_ANSWER);
        snapshot
    };
    let other = store
        .save_version(None, "Queue redesign", edited, SaveAction::New)
        .await
        .unwrap();

    let batch = app
        .resolution()
        .resolve_pattern(
            "Observability first",
            &["legacy-1".to_string(), other.container_id.clone()],
        )
        .await;

    assert!(batch.failures.is_empty());
    assert_eq!(batch.results.len(), 2);
    assert_eq!(batch.results[0].container_id, "legacy-1");
    assert!(batch.results[0].has_evidence());
    assert_eq!(batch.results[1].container_id, other.container_id);
    assert_eq!(batch.results[1].conversation_title, "Queue redesign");
    assert!(!batch.results[1].has_evidence());
}

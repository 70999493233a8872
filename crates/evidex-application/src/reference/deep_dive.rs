//! Per-item deep-dive state.
//!
//! Each justification or defense under a located quote can be expanded once.
//! Its state lives here keyed by item id, so expanding it again is served
//! from the cache instead of re-running the upstream analysis.

use super::resolution_service::DeepDiveResult;
use serde::Serialize;
use std::collections::HashMap;

/// Which reasoning point of a quote is being expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Justification,
    Defense,
}

impl PointKind {
    fn suffix(self) -> &'static str {
        match self {
            PointKind::Justification => "j",
            PointKind::Defense => "d",
        }
    }
}

/// Stable id of one expandable point: `{result}-{quote}-{j|d}`.
pub fn item_id(result_index: usize, quote_index: usize, kind: PointKind) -> String {
    format!("{}-{}-{}", result_index, quote_index, kind.suffix())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum DeepDiveState {
    Collapsed,
    Requested,
    Resolved(DeepDiveResult),
    /// Terminal for the item until the session is torn down
    Failed(String),
}

impl DeepDiveState {
    /// Whether the item is past `Collapsed` and must not be re-requested.
    pub fn is_settled_or_pending(&self) -> bool {
        !matches!(self, DeepDiveState::Collapsed)
    }
}

#[derive(Debug, Default)]
pub struct DeepDiveCache {
    items: HashMap<String, DeepDiveState>,
}

impl DeepDiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, item_id: &str) -> DeepDiveState {
        self.items
            .get(item_id)
            .cloned()
            .unwrap_or(DeepDiveState::Collapsed)
    }

    /// Marks the item requested.
    ///
    /// Returns `false` when it already left `Collapsed`, meaning the caller
    /// must not query the upstream again.
    pub fn begin(&mut self, item_id: &str) -> bool {
        if self.state(item_id).is_settled_or_pending() {
            return false;
        }
        self.items
            .insert(item_id.to_string(), DeepDiveState::Requested);
        true
    }

    /// Records the outcome of a request started with [`begin`](Self::begin).
    pub fn complete(&mut self, item_id: &str, outcome: Result<DeepDiveResult, String>) {
        let state = match outcome {
            Ok(result) => DeepDiveState::Resolved(result),
            Err(message) => DeepDiveState::Failed(message),
        };
        self.items.insert(item_id.to_string(), state);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> DeepDiveResult {
        DeepDiveResult {
            point: "p".into(),
            analysis: "a".into(),
            quotes: vec![],
        }
    }

    #[test]
    fn test_item_ids() {
        assert_eq!(item_id(0, 2, PointKind::Justification), "0-2-j");
        assert_eq!(item_id(1, 0, PointKind::Defense), "1-0-d");
    }

    #[test]
    fn test_begin_only_once() {
        let mut cache = DeepDiveCache::new();
        assert_eq!(cache.state("0-0-j"), DeepDiveState::Collapsed);

        assert!(cache.begin("0-0-j"));
        assert_eq!(cache.state("0-0-j"), DeepDiveState::Requested);
        assert!(!cache.begin("0-0-j"));

        cache.complete("0-0-j", Ok(result()));
        assert!(!cache.begin("0-0-j"));
        assert_eq!(cache.state("0-0-j"), DeepDiveState::Resolved(result()));
    }

    #[test]
    fn test_failure_is_terminal_until_cleared() {
        let mut cache = DeepDiveCache::new();
        cache.begin("0-0-d");
        cache.complete("0-0-d", Err("upstream down".into()));

        assert!(!cache.begin("0-0-d"));
        assert!(matches!(cache.state("0-0-d"), DeepDiveState::Failed(_)));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.begin("0-0-d"));
    }
}

//! Claim resolution against stored conversations.
//!
//! - `retry`: bounded retry for upstream calls
//! - `resolution_service`: single, batch, and deep-dive resolution
//! - `deep_dive`: per-item deep-dive cache
//! - `session`: lookup and deep-dive state for one open evidence view

mod deep_dive;
mod resolution_service;
mod retry;
mod session;

pub use deep_dive::{DeepDiveCache, DeepDiveState, PointKind, item_id};
pub use resolution_service::{
    BatchFailure, BatchResolution, DeepDiveResult, ReferenceResolutionService,
};
pub use retry::RetryPolicy;
pub use session::{EvidenceSession, LookupState};

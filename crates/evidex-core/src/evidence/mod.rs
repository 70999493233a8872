//! Evidence location.
//!
//! - `locator`: the pure quotation matcher (`locate`)
//! - `model`: spans and per-conversation evidence results

mod locator;
mod model;

pub use locator::{MIN_EVIDENCE_TOKENS, locate};
pub use model::{EvidenceResult, LocateOutcome, MatchSpan, MessageMatch, QuoteEvidence};

//! Upstream reference detection contract.

mod model;
mod source;

pub use model::{
    BatchConversation, BatchReferenceEntry, BatchReferencePayload, DeepDiveAnalysis,
    ReferencePayload, SupportingQuote, clean_json_response, parse_batch_reference_payload,
    parse_deep_dive, parse_reference_payload,
};
pub use source::ReferenceSource;

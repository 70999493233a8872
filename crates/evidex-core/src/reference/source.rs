//! Upstream reasoning service abstraction.

use super::model::BatchConversation;
use crate::conversation::Message;
use crate::error::Result;
use async_trait::async_trait;

/// The external service that turns a claim into supporting quotations.
///
/// Implementations return the raw response body. Parsing happens in the
/// resolution layer so that unparseable content can be retried with the
/// same inputs.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Asks for quotations in `messages` supporting `claim`.
    ///
    /// The expected body is a JSON [`ReferencePayload`](super::ReferencePayload).
    async fn detect_references(&self, claim: &str, messages: &[Message]) -> Result<String>;

    /// Asks for quotations supporting `pattern` in each of `conversations`.
    ///
    /// The expected body is a JSON
    /// [`BatchReferencePayload`](super::BatchReferencePayload) whose entries
    /// echo each conversation's id and title.
    async fn detect_batch_references(
        &self,
        pattern: &str,
        conversations: &[BatchConversation],
    ) -> Result<String>;

    /// Asks for a deeper analysis of a justification or defense.
    ///
    /// The expected body is a JSON [`DeepDiveAnalysis`](super::DeepDiveAnalysis).
    async fn deep_dive(&self, point: &str, messages: &[Message]) -> Result<String>;
}

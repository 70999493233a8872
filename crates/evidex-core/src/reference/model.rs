//! Payloads supplied by the upstream reasoning service.

use crate::conversation::Message;
use crate::error::{EvidexError, Result};
use serde::{Deserialize, Serialize};

/// A quotation the upstream claims supports a pattern, with its reasoning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSupportingQuote")]
pub struct SupportingQuote {
    pub quote: String,
    /// Why the quote demonstrates the claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    /// Why the quote might not demonstrate the claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defense: Option<String>,
}

impl SupportingQuote {
    pub fn new(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            justification: None,
            defense: None,
        }
    }

    pub fn with_reasoning(
        mut self,
        justification: impl Into<String>,
        defense: impl Into<String>,
    ) -> Self {
        self.justification = Some(justification.into());
        self.defense = Some(defense.into());
        self
    }
}

/// Single-conversation detection returns bare strings, batch detection
/// returns objects; both are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSupportingQuote {
    Text(String),
    Detailed {
        quote: String,
        #[serde(default)]
        justification: Option<String>,
        #[serde(default)]
        defense: Option<String>,
    },
}

impl From<RawSupportingQuote> for SupportingQuote {
    fn from(raw: RawSupportingQuote) -> Self {
        match raw {
            RawSupportingQuote::Text(quote) => SupportingQuote::new(quote),
            RawSupportingQuote::Detailed {
                quote,
                justification,
                defense,
            } => SupportingQuote {
                quote,
                justification,
                defense,
            },
        }
    }
}

/// Reference detection response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePayload {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub supporting_material: Vec<SupportingQuote>,
}

/// One conversation handed to batch detection.
///
/// The id and title are echoed back on each result so it can be mapped to
/// its container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchConversation {
    pub id: String,
    pub title: String,
    pub conversation: Vec<Message>,
}

/// Batch detection response.
///
/// Conversations the service could not process are simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReferencePayload {
    #[serde(default)]
    pub results: Vec<BatchReferenceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReferenceEntry {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub conversation_title: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub supporting_material: Vec<SupportingQuote>,
}

/// Deep-dive response for a justification or defense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepDiveAnalysis {
    #[serde(default)]
    pub point: String,
    pub deep_dive_analysis: String,
    #[serde(default)]
    pub supporting_quotes: Vec<String>,
}

/// Strips markdown code fences the model sometimes wraps JSON in.
pub fn clean_json_response(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses a reference detection response.
///
/// Unparseable content is an [`EvidexError::Upstream`] so callers retry it.
pub fn parse_reference_payload(raw: &str) -> Result<ReferencePayload> {
    serde_json::from_str(clean_json_response(raw))
        .map_err(|e| EvidexError::upstream(format!("unparseable reference payload: {}", e)))
}

/// Parses a batch detection response.
pub fn parse_batch_reference_payload(raw: &str) -> Result<BatchReferencePayload> {
    serde_json::from_str(clean_json_response(raw))
        .map_err(|e| EvidexError::upstream(format!("unparseable batch reference payload: {}", e)))
}

/// Parses a deep-dive response.
pub fn parse_deep_dive(raw: &str) -> Result<DeepDiveAnalysis> {
    serde_json::from_str(clean_json_response(raw))
        .map_err(|e| EvidexError::upstream(format!("unparseable deep dive payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_quotes() {
        let raw = r#"{"reference": "Designs for failure", "supporting_material": ["a quote"]}"#;
        let payload = parse_reference_payload(raw).unwrap();
        assert_eq!(payload.reference.as_deref(), Some("Designs for failure"));
        assert_eq!(payload.supporting_material, vec![SupportingQuote::new("a quote")]);
    }

    #[test]
    fn test_parse_detailed_quotes_inside_fence() {
        let raw = "```json\n{\"supporting_material\": [{\"quote\": \"q\", \
                   \"justification\": \"j\", \"defense\": \"d\"}]}\n```";
        let payload = parse_reference_payload(raw).unwrap();
        assert_eq!(
            payload.supporting_material,
            vec![SupportingQuote::new("q").with_reasoning("j", "d")]
        );
    }

    #[test]
    fn test_unparseable_payload_is_retryable_upstream_error() {
        let err = parse_reference_payload("Sure! Here is the JSON you asked for").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_batch_payload_keeps_conversation_tags() {
        let raw = r#"{"results": [
            {"conversation_id": "c1", "conversation_title": "Scaling",
             "reference": "Designs for failure",
             "supporting_material": [{"quote": "q", "justification": "j", "defense": "d"}]},
            {"conversation_title": "Untagged", "supporting_material": []}
        ]}"#;
        let payload = parse_batch_reference_payload(raw).unwrap();

        assert_eq!(payload.results.len(), 2);
        assert_eq!(payload.results[0].conversation_id.as_deref(), Some("c1"));
        assert_eq!(
            payload.results[0].supporting_material,
            vec![SupportingQuote::new("q").with_reasoning("j", "d")]
        );
        assert_eq!(payload.results[1].conversation_id, None);
        assert!(parse_batch_reference_payload("[1, 2").unwrap_err().is_retryable());
    }

    #[test]
    fn test_batch_conversation_wire_shape() {
        let value = serde_json::to_value(BatchConversation {
            id: "c1".into(),
            title: "Scaling".into(),
            conversation: vec![Message::user("hi")],
        })
        .unwrap();
        assert_eq!(value["id"], "c1");
        assert_eq!(value["title"], "Scaling");
        assert_eq!(value["conversation"][0]["role"], "user");
    }

    #[test]
    fn test_parse_deep_dive() {
        let raw = r#"{"point": "p", "deep_dive_analysis": "analysis", "supporting_quotes": ["x"]}"#;
        let analysis = parse_deep_dive(raw).unwrap();
        assert_eq!(analysis.deep_dive_analysis, "analysis");
        assert_eq!(analysis.supporting_quotes, vec!["x".to_string()]);
    }

    #[test]
    fn test_clean_json_response_passthrough() {
        assert_eq!(clean_json_response("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(clean_json_response("```\n{}\n```"), "{}");
    }
}

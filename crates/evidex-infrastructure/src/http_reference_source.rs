//! HTTP adapter for the upstream reasoning service.
//!
//! Only transport lives here. The raw response body is handed back untouched
//! and parsed (code fences stripped) by the caller, so a malformed body and a
//! failed request are retried the same way.

use async_trait::async_trait;
use evidex_core::config::UpstreamConfig;
use evidex_core::conversation::Message;
use evidex_core::error::{EvidexError, Result};
use evidex_core::reference::{BatchConversation, ReferenceSource};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const DETECT_REFERENCE_PATH: &str = "detect-reference";
const DETECT_BATCH_REFERENCE_PATH: &str = "detect-batch-reference";
const DEEP_DIVE_PATH: &str = "deep-dive-reference";

#[derive(Debug, Serialize)]
struct DetectReferenceRequest<'a> {
    strength: &'a str,
    conversation: &'a [Message],
}

#[derive(Debug, Serialize)]
struct DetectBatchReferenceRequest<'a> {
    pattern: &'a str,
    conversations: &'a [BatchConversation],
}

#[derive(Debug, Serialize)]
struct DeepDiveRequest<'a> {
    point: &'a str,
    conversation: &'a [Message],
}

pub struct HttpReferenceSource {
    client: Client,
    base_url: String,
}

impl HttpReferenceSource {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvidexError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String> {
        let url = self.endpoint(path);
        tracing::debug!(url = %url, "Calling reasoning service");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| EvidexError::upstream(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EvidexError::upstream(format!("Reading {} response failed: {}", url, e)))?;

        if !status.is_success() {
            return Err(EvidexError::upstream(format!(
                "{} returned {}: {}",
                url,
                status.as_u16(),
                text
            )));
        }

        Ok(text)
    }
}

#[async_trait]
impl ReferenceSource for HttpReferenceSource {
    async fn detect_references(&self, claim: &str, messages: &[Message]) -> Result<String> {
        let body = DetectReferenceRequest {
            strength: claim,
            conversation: messages,
        };
        self.post(DETECT_REFERENCE_PATH, &body).await
    }

    async fn detect_batch_references(
        &self,
        pattern: &str,
        conversations: &[BatchConversation],
    ) -> Result<String> {
        let body = DetectBatchReferenceRequest {
            pattern,
            conversations,
        };
        self.post(DETECT_BATCH_REFERENCE_PATH, &body).await
    }

    async fn deep_dive(&self, point: &str, messages: &[Message]) -> Result<String> {
        let body = DeepDiveRequest {
            point,
            conversation: messages,
        };
        self.post(DEEP_DIVE_PATH, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = UpstreamConfig {
            base_url: "http://localhost:5001/".into(),
            ..UpstreamConfig::default()
        };
        let source = HttpReferenceSource::new(&config).unwrap();
        assert_eq!(
            source.endpoint(DETECT_REFERENCE_PATH),
            "http://localhost:5001/detect-reference"
        );
    }

    #[test]
    fn test_request_bodies_match_service_contract() {
        let messages = vec![Message::user("I used a queue")];

        let detect = serde_json::to_value(DetectReferenceRequest {
            strength: "Handles backpressure",
            conversation: &messages,
        })
        .unwrap();
        assert_eq!(detect["strength"], "Handles backpressure");
        assert_eq!(detect["conversation"][0]["role"], "user");
        assert_eq!(detect["conversation"][0]["content"], "I used a queue");

        let deep = serde_json::to_value(DeepDiveRequest {
            point: "queue",
            conversation: &messages,
        })
        .unwrap();
        assert_eq!(deep["point"], "queue");

        let conversations = vec![BatchConversation {
            id: "c1".into(),
            title: "Queues".into(),
            conversation: messages.clone(),
        }];
        let batch = serde_json::to_value(DetectBatchReferenceRequest {
            pattern: "Handles backpressure",
            conversations: &conversations,
        })
        .unwrap();
        assert_eq!(batch["pattern"], "Handles backpressure");
        assert_eq!(batch["conversations"][0]["id"], "c1");
        assert_eq!(batch["conversations"][0]["title"], "Queues");
        assert_eq!(batch["conversations"][0]["conversation"][0]["content"], "I used a queue");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_retryable_upstream_error() {
        let config = UpstreamConfig {
            // Port 9 (discard) is closed on test machines
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..UpstreamConfig::default()
        };
        let source = HttpReferenceSource::new(&config).unwrap();

        let err = source.detect_references("claim", &[]).await.unwrap_err();
        assert!(err.is_retryable());
    }
}

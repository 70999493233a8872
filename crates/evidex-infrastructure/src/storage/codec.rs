//! Text encodings for the persisted collection.

use crate::dto::PersistedCollection;
use evidex_core::error::{EvidexError, Result};

/// Encodes and decodes the whole persisted collection.
pub trait CollectionCodec: Send + Sync {
    /// Short name of the format, used in logs and errors.
    fn format(&self) -> &'static str;

    fn encode(&self, collection: &PersistedCollection) -> Result<String>;

    fn decode(&self, text: &str) -> Result<PersistedCollection>;
}

/// JSON codec matching the browser-era store layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCollectionCodec {
    pretty: bool,
}

impl JsonCollectionCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indents output; handy for a store that gets inspected by hand.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl CollectionCodec for JsonCollectionCodec {
    fn format(&self) -> &'static str {
        "JSON"
    }

    fn encode(&self, collection: &PersistedCollection) -> Result<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(collection)?
        } else {
            serde_json::to_string(collection)?
        };
        Ok(text)
    }

    fn decode(&self, text: &str) -> Result<PersistedCollection> {
        serde_json::from_str(text).map_err(|e| EvidexError::Serialization {
            format: self.format().to_string(),
            message: e.to_string(),
        })
    }
}

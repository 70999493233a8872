//! Evidence domain models.

use crate::conversation::{Message, MessageRole, Snapshot};
use crate::reference::SupportingQuote;
use serde::{Deserialize, Serialize};

use super::locator::locate;

/// A located quotation plus bounded sentence-level context.
///
/// `start` and `end` are character offsets into the message content exactly
/// as stored; consumers must not re-case or re-space the content before using
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpan {
    pub matched_text: String,
    pub prefix_context: String,
    pub suffix_context: String,
    /// More text preceded the captured prefix
    pub prefix_truncated: bool,
    /// More text followed the captured suffix
    pub suffix_truncated: bool,
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    /// Renders the span as plain text with the match in brackets.
    pub fn to_snippet(&self) -> String {
        let mut snippet = String::new();
        if self.prefix_truncated {
            snippet.push_str("... ");
        }
        snippet.push_str(&self.prefix_context);
        snippet.push('[');
        snippet.push_str(&self.matched_text);
        snippet.push(']');
        snippet.push_str(&self.suffix_context);
        if self.suffix_truncated {
            snippet.push_str(" ...");
        }
        snippet
    }
}

/// Result of [`locate`](super::locate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "span", rename_all = "snake_case")]
pub enum LocateOutcome {
    Found(MatchSpan),
    /// No run of the quotation long enough to count as evidence was found.
    NotFound,
}

impl LocateOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn span(&self) -> Option<&MatchSpan> {
        match self {
            Self::Found(span) => Some(span),
            Self::NotFound => None,
        }
    }

    pub fn into_span(self) -> Option<MatchSpan> {
        match self {
            Self::Found(span) => Some(span),
            Self::NotFound => None,
        }
    }
}

/// A quotation located inside one message of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMatch {
    pub message_index: usize,
    pub role: MessageRole,
    pub span: MatchSpan,
}

/// One supporting quote and every message it was found in.
///
/// An empty `matches` list is the "no evidence found" outcome for the quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteEvidence {
    pub quote: SupportingQuote,
    pub matches: Vec<MessageMatch>,
}

impl QuoteEvidence {
    /// Runs the locator for `quote` over every message.
    pub fn locate_in(quote: SupportingQuote, messages: &[Message]) -> Self {
        let matches = messages
            .iter()
            .enumerate()
            .filter_map(|(index, message)| {
                locate(&message.content, &quote.quote)
                    .into_span()
                    .map(|span| MessageMatch {
                        message_index: index,
                        role: message.role,
                        span,
                    })
            })
            .collect();

        Self { quote, matches }
    }

    pub fn is_found(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Evidence for one claim within one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceResult {
    pub container_id: String,
    pub conversation_title: String,
    /// The messages of the snapshot the quotes were located in.
    pub messages: Vec<Message>,
    pub quotes: Vec<QuoteEvidence>,
}

impl EvidenceResult {
    /// Locates every quote against every message of `snapshot`.
    pub fn collect(
        container_id: impl Into<String>,
        conversation_title: impl Into<String>,
        snapshot: &Snapshot,
        quotes: Vec<SupportingQuote>,
    ) -> Self {
        let quotes = quotes
            .into_iter()
            .map(|quote| QuoteEvidence::locate_in(quote, &snapshot.messages))
            .collect();

        Self {
            container_id: container_id.into(),
            conversation_title: conversation_title.into(),
            messages: snapshot.messages.clone(),
            quotes,
        }
    }

    /// Whether at least one quote was found in at least one message.
    pub fn has_evidence(&self) -> bool {
        self.quotes.iter().any(QuoteEvidence::is_found)
    }

    /// Quotes that were found, in upstream order.
    pub fn found_quotes(&self) -> impl Iterator<Item = &QuoteEvidence> {
        self.quotes.iter().filter(|q| q.is_found())
    }
}

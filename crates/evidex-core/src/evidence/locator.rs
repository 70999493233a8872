//! Quotation locator.
//!
//! Finds an approximate quotation inside a transcript message and cuts a
//! readable, sentence-bounded context window around it. Matching is purely
//! lexical: case-insensitive, on whitespace-separated tokens.

use super::model::{LocateOutcome, MatchSpan};

/// Quotations with fewer tokens than this are never matched.
///
/// Short phrases ("I think so", "that makes sense") occur everywhere in a
/// conversation and would attach evidence to the wrong passage.
pub const MIN_EVIDENCE_TOKENS: usize = 10;

/// Fragments kept before the match: two full sentences plus the lead-in.
const PREFIX_FRAGMENTS: usize = 3;

/// Fragments kept after the match: the rest of the sentence plus one more.
const SUFFIX_FRAGMENTS: usize = 2;

/// Locates `quotation` inside `haystack`.
///
/// 1. Quotations shorter than [`MIN_EVIDENCE_TOKENS`] tokens are `NotFound`.
/// 2. The trimmed quotation is searched verbatim (case-insensitively); the
///    leftmost occurrence wins.
/// 3. Otherwise the longest contiguous run of at least
///    [`MIN_EVIDENCE_TOKENS`] quotation tokens, re-joined with single spaces,
///    is searched. Start indices are scanned ascending and, for each, end
///    indices descending; a candidate only replaces the best one when it is
///    strictly longer, so ties go to the first discovered.
///
/// The returned span preserves the original casing of `haystack`.
pub fn locate(haystack: &str, quotation: &str) -> LocateOutcome {
    let tokens: Vec<&str> = quotation.split_whitespace().collect();
    if tokens.len() < MIN_EVIDENCE_TOKENS {
        return LocateOutcome::NotFound;
    }

    let folded = FoldedText::new(haystack);
    let range = folded
        .find(quotation.trim())
        .or_else(|| longest_token_run(&folded, &tokens));

    match range {
        Some((start, end)) => LocateOutcome::Found(build_span(haystack, start, end)),
        None => LocateOutcome::NotFound,
    }
}

/// Searches the longest sub-phrase of `tokens` present in `folded`.
///
/// Returns the byte range in the original text.
fn longest_token_run(folded: &FoldedText, tokens: &[&str]) -> Option<(usize, usize)> {
    let k = tokens.len();
    let mut best: Option<(usize, (usize, usize))> = None;

    for i in 0..k {
        let best_len = best.map_or(0, |(len, _)| len);
        if k - i <= best_len {
            break;
        }

        let mut j = k;
        while j >= i + MIN_EVIDENCE_TOKENS && j - i > best_len {
            let phrase = tokens[i..j].join(" ");
            if let Some(range) = folded.find(&phrase) {
                best = Some((j - i, range));
                // Shorter runs from the same start cannot beat this one.
                break;
            }
            j -= 1;
        }
    }

    best.map(|(_, range)| range)
}

fn build_span(haystack: &str, start: usize, end: usize) -> MatchSpan {
    let before = &haystack[..start];
    let matched = &haystack[start..end];
    let after = &haystack[end..];

    let before_parts = sentence_fragments(before);
    let (prefix_context, prefix_truncated) = if before_parts.len() >= PREFIX_FRAGMENTS {
        (
            before_parts[before_parts.len() - PREFIX_FRAGMENTS..].join(" "),
            before_parts.len() > PREFIX_FRAGMENTS,
        )
    } else {
        (before.to_string(), false)
    };

    let after_parts = sentence_fragments(after);
    let suffix_context = after_parts
        .iter()
        .take(SUFFIX_FRAGMENTS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    let suffix_truncated = after_parts.len() > SUFFIX_FRAGMENTS;

    let start_char = before.chars().count();
    MatchSpan {
        matched_text: matched.to_string(),
        prefix_context,
        suffix_context,
        prefix_truncated,
        suffix_truncated,
        start: start_char,
        end: start_char + matched.chars().count(),
    }
}

/// Splits text after `.`, `!` or `?` followed by whitespace.
///
/// The whitespace run is dropped. Leading and trailing empty fragments are
/// kept, so `"One. "` yields `["One.", ""]` and `""` yields `[""]`.
fn sentence_fragments(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            let mut resume = idx + ch.len_utf8();
            while let Some(&(next_idx, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                resume = next_idx + next.len_utf8();
                chars.next();
            }
            parts.push(&text[start..idx]);
            start = resume;
            prev = None;
            continue;
        }
        prev = Some(ch);
    }

    parts.push(&text[start..]);
    parts
}

/// Lowercased copy of a text that remembers where each byte came from.
///
/// Lowercasing can change byte lengths (and, for a few code points, the
/// number of chars), so matches in the folded copy are mapped back through
/// `origins` instead of being reused as offsets into the original.
struct FoldedText {
    folded: String,
    origins: Vec<usize>,
    source_len: usize,
}

impl FoldedText {
    fn new(text: &str) -> Self {
        let mut folded = String::with_capacity(text.len());
        let mut origins = Vec::with_capacity(text.len());

        for (offset, ch) in text.char_indices() {
            for lower in ch.to_lowercase() {
                let before = folded.len();
                folded.push(lower);
                origins.extend(std::iter::repeat_n(offset, folded.len() - before));
            }
        }

        Self {
            folded,
            origins,
            source_len: text.len(),
        }
    }

    /// Finds the leftmost case-insensitive occurrence of `needle`.
    fn find(&self, needle: &str) -> Option<(usize, usize)> {
        let needle: String = needle.chars().flat_map(char::to_lowercase).collect();
        if needle.is_empty() {
            return None;
        }
        let start = self.folded.find(&needle)?;
        let end = start + needle.len();
        Some((self.origin(start), self.origin(end)))
    }

    fn origin(&self, folded_offset: usize) -> usize {
        self.origins
            .get(folded_offset)
            .copied()
            .unwrap_or(self.source_len)
    }
}

//! Acceptance check applied to every model-produced rewrite or repair
//! before it may replace a document on disk.

use serde::{Deserialize, Serialize};

use crate::text::head_chars;

/// Phrases that mark conversational replies instead of document content.
pub const META_PHRASES: [&str; 7] = [
    "I'll provide",
    "I'll polish",
    "Would you like",
    "Before I",
    "Let me",
    "I can",
    "May I clarify",
];

/// Only the opening of the model output is searched for meta phrases.
pub const META_WINDOW_CHARS: usize = 200;

/// Why a candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    TooShort { original: usize, candidate: usize },
    MetaCommentary { phrase: String },
    /// The output had nothing that could be merged.
    Unusable { detail: String },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::TooShort {
                original,
                candidate,
            } => write!(
                f,
                "candidate is {candidate} bytes, less than half of the original {original}"
            ),
            RejectReason::MetaCommentary { phrase } => {
                write!(f, "output opens with meta-commentary ({phrase:?})")
            }
            RejectReason::Unusable { detail } => write!(f, "unusable output: {detail}"),
        }
    }
}

/// First meta phrase found in the opening window of `output`.
pub fn meta_phrase(output: &str) -> Option<&'static str> {
    let window = head_chars(output, META_WINDOW_CHARS);
    META_PHRASES.into_iter().find(|p| window.contains(p))
}

/// Decide whether `candidate` may replace `original`.
///
/// `output` is the raw model text the candidate was built from; for a
/// full rewrite it equals the candidate.
pub fn check(original: &str, candidate: &str, output: &str) -> Result<(), RejectReason> {
    if candidate.len() * 2 < original.len() {
        return Err(RejectReason::TooShort {
            original: original.len(),
            candidate: candidate.len(),
        });
    }
    if let Some(phrase) = meta_phrase(output) {
        return Err(RejectReason::MetaCommentary {
            phrase: phrase.to_string(),
        });
    }
    Ok(())
}

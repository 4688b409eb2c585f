// Token Corpus Module
// Pre-segmented text fragments that stand in for model output, and the
// cyclic selector that picks a slice of them for a token budget.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A fragment of canned output and the number of tokens it represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusToken {
    pub content: String,
    #[serde(rename = "tokens")]
    pub token_count: u32,
}

impl CorpusToken {
    pub fn new(content: impl Into<String>, token_count: u32) -> Self {
        Self {
            content: content.into(),
            token_count,
        }
    }
}

/// Errors raised while loading a corpus
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Failed to read corpus file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse corpus file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("Corpus is empty")]
    Empty,
    #[error("Corpus token {index} has a zero token count")]
    InvalidTokenCount { index: usize },
}

/// Tokens picked for one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub tokens: Vec<CorpusToken>,
    pub total_tokens: u32,
}

impl Selection {
    /// Concatenated text of every selected fragment
    pub fn content(&self) -> String {
        self.tokens.iter().map(|t| t.content.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Immutable, non-empty ordered sequence of corpus tokens.
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct Corpus {
    tokens: Vec<CorpusToken>,
}

impl Corpus {
    /// Build a corpus, rejecting empty input and zero-count tokens
    pub fn from_tokens(tokens: Vec<CorpusToken>) -> Result<Self, CorpusError> {
        if tokens.is_empty() {
            return Err(CorpusError::Empty);
        }
        if let Some(index) = tokens.iter().position(|t| t.token_count == 0) {
            return Err(CorpusError::InvalidTokenCount { index });
        }
        Ok(Self { tokens })
    }

    /// Parse a corpus from its JSON form: `[{"content": "...", "tokens": 1}, ...]`
    pub fn from_json(json: &str) -> Result<Self, CorpusError> {
        let tokens = serde_json::from_str(json).map_err(|source| CorpusError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        Self::from_tokens(tokens)
    }

    /// Load a corpus JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let tokens = serde_json::from_str(&content).map_err(|source| CorpusError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let corpus = Self::from_tokens(tokens)?;

        tracing::info!(
            path = %path.display(),
            fragments = corpus.len(),
            tokens = corpus.total_tokens(),
            "Loaded token corpus"
        );
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[CorpusToken] {
        &self.tokens
    }

    /// Sum of all token counts in the corpus
    pub fn total_tokens(&self) -> u64 {
        self.tokens.iter().map(|t| t.token_count as u64).sum()
    }

    /// Pick a contiguous, wrapping run of tokens for `budget`.
    ///
    /// Starts at `offset % len` and accumulates token counts until the
    /// cumulative total reaches `budget`. A token that would push the total
    /// past the budget is dropped unless it is the first one picked, so the
    /// result undershoots rather than overshoots and is never empty: a budget
    /// of zero, or one smaller than the first token, yields exactly that
    /// first token.
    ///
    /// Deterministic: the same `(offset, budget)` on the same corpus always
    /// returns the same selection.
    pub fn select(&self, offset: usize, budget: u32) -> Selection {
        let start = offset % self.tokens.len();
        let budget = budget as u64;

        let mut tokens = Vec::new();
        let mut total: u64 = 0;
        for token in self.tokens.iter().cycle().skip(start) {
            let next = total + token.token_count as u64;
            if next > budget && !tokens.is_empty() {
                break;
            }
            tokens.push(token.clone());
            total = next;
            if total >= budget {
                break;
            }
        }

        Selection {
            tokens,
            total_tokens: total as u32,
        }
    }
}

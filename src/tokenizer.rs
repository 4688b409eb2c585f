// Corpus Tokenizer Module
// Exact cl100k_base tokenization used to build corpus files and to calibrate
// the fast counter. Never used while serving requests.

use crate::corpus::CorpusToken;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Error type for tokenizer operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to initialize tokenizer: {0}")]
    InitError(String),
    #[error("Failed to decode token {0}: {1}")]
    DecodeError(u32, String),
}

/// Tokenizer with a cached `cl100k_base` encoder
pub struct Tokenizer {
    bpe: CoreBPE,
}

impl Tokenizer {
    /// Create a tokenizer using the `cl100k_base` encoding
    pub fn new() -> Result<Self, TokenError> {
        let bpe = cl100k_base().map_err(|e| TokenError::InitError(e.to_string()))?;
        Ok(Self { bpe })
    }

    /// Count tokens exactly
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Raw bytes of a single token, which may be an incomplete UTF-8 sequence
    fn token_bytes(&self, id: u32) -> Result<Vec<u8>, TokenError> {
        self.bpe
            ._decode_native_and_split(vec![id])
            .next()
            .ok_or_else(|| TokenError::DecodeError(id, "unknown token".to_string()))
    }

    /// Split text into corpus fragments, one per BPE token.
    ///
    /// A token whose bytes end in the middle of a multi-byte character is
    /// merged with the following tokens until the bytes decode; the fragment's
    /// `token_count` is the number of merged tokens. Bytes that can never
    /// decode are emitted lossily.
    pub fn split_text(&self, text: &str) -> Result<Vec<CorpusToken>, TokenError> {
        let ids = self.bpe.encode_ordinary(text);
        let mut fragments = Vec::with_capacity(ids.len());

        let mut i = 0;
        while i < ids.len() {
            let mut bytes = self.token_bytes(ids[i])?;
            let mut end = i;

            let content = loop {
                match std::str::from_utf8(&bytes) {
                    Ok(s) => break s.to_string(),
                    // error_len() == None: sequence is truncated, more bytes may complete it
                    Err(e) if e.error_len().is_none() && end + 1 < ids.len() => {
                        end += 1;
                        bytes.extend(self.token_bytes(ids[end])?);
                    }
                    Err(_) => break String::from_utf8_lossy(&bytes).into_owned(),
                }
            };

            fragments.push(CorpusToken::new(content, (end - i + 1) as u32));
            i = end + 1;
        }

        Ok(fragments)
    }

    /// UTF-8 bytes per token for `text`, or 0.0 when it has no tokens
    pub fn byte_token_rate(&self, text: &str) -> f64 {
        let tokens = self.count(text);
        if tokens == 0 {
            return 0.0;
        }
        text.len() as f64 / tokens as f64
    }
}

// Fast Token Counter Module
// Length-based token estimate used for budget arithmetic on the hot path.

/// Average number of UTF-8 bytes per `cl100k_base` token.
///
/// Calibrated with `llm-mock rate` over mixed English/CJK text; see
/// [`crate::tokenizer::Tokenizer::byte_token_rate`].
pub const BYTES_PER_TOKEN: f64 = 3.75;

/// Approximate the number of tokens in `text`.
///
/// This is **not** a tokenizer: it divides the UTF-8 byte length by
/// [`BYTES_PER_TOKEN`] and truncates. It is cheap, deterministic and
/// monotonic in input length, which is all the output budget computation
/// needs. Never use it for billing-grade accounting.
pub fn count_tokens_fast(text: &str) -> usize {
    (text.len() as f64 / BYTES_PER_TOKEN) as usize
}

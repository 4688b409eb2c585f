//! OpenAI-compatible chat completion wire types.

mod types;

pub use types::*;

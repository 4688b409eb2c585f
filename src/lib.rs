//! # llm-mock - LLM Chat Completion Emulator
//!
//! An HTTP server that answers OpenAI-style chat completion requests with
//! text drawn from a pre-tokenized corpus, paced like a real model would
//! produce it.
//!
//! ## Features
//!
//! - Per-model limits and pacing (time-to-first-token range, output tokens per second)
//! - Streaming (Server-Sent Events) and non-streaming responses
//! - Constant-time token estimation for prompts
//! - Prompt cancellation on client disconnect or write deadline
//! - Corpus tooling built on tiktoken-rs
//!
//! ## Usage
//!
//! ### As a CLI
//!
//! ```bash
//! llm-mock split novel.txt -o tokens.json
//! llm-mock serve --config config.yaml
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use llm_mock::{Corpus, CorpusToken, Generator, ModelProfile, ModelRegistry};
//!
//! let registry = ModelRegistry::load(vec![ModelProfile {
//!     name: "mock-small".to_string(),
//!     max_context_tokens: 4096,
//!     max_output_tokens: 256,
//!     ttft_min_ms: 100,
//!     ttft_max_ms: 300,
//!     output_tokens_per_second: 50,
//! }])
//! .unwrap();
//! let corpus = Corpus::from_tokens(vec![CorpusToken::new("Hello", 1)]).unwrap();
//! let generator = Generator::new(registry, corpus);
//!
//! let tokens = llm_mock::tokens::count_tokens_fast("Hello, world!");
//! ```

// Core library modules
pub mod corpus;
pub mod errors;
pub mod generator;
pub mod latency;
pub mod openai;
pub mod registry;
pub mod stats;
pub mod stream;
pub mod tokenizer;
pub mod tokens;

// CLI module (for `llm-mock serve` command)
pub mod cli;

// Re-export commonly used types
pub use corpus::{Corpus, CorpusError, CorpusToken, Selection};
pub use errors::MockError;
pub use generator::{GenerationRequest, Generator};
pub use latency::{Pacer, PacingProfile};
pub use registry::{ModelProfile, ModelRegistry, RegistryError};
pub use stats::{new_shared_stats, SharedStats, Stats, StatsSnapshot};
pub use stream::{ResponseEncoder, StreamOutcome};
pub use tokens::count_tokens_fast;

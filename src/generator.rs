// Generation Planning Module
// Turns a decoded chat request into a fully planned generation: the model
// profile, prompt size estimate, output budget and the selected corpus tokens.

use crate::corpus::{Corpus, Selection};
use crate::errors::MockError;
use crate::openai::{ChatCompletionRequest, Usage};
use crate::registry::{ModelProfile, ModelRegistry};
use crate::tokens::count_tokens_fast;
use std::sync::Arc;
use std::time::Instant;

/// Budget used when the computed output budget is not positive
pub const DEFAULT_OUTPUT_TOKENS: u32 = 50;

/// Compute the number of tokens to generate.
///
/// `min(max_tokens, max_output_tokens, max_context_tokens - prompt_tokens)`,
/// with a missing `max_tokens` treated as 0. A non-positive result falls back
/// to `fallback`, still capped by the model's `max_output_tokens`.
pub fn output_budget(
    max_tokens: Option<i64>,
    profile: &ModelProfile,
    prompt_tokens: u32,
    fallback: u32,
) -> u32 {
    let remaining_context = profile.max_context_tokens as i64 - prompt_tokens as i64;
    let budget = max_tokens
        .unwrap_or(0)
        .min(profile.max_output_tokens as i64)
        .min(remaining_context);

    if budget <= 0 {
        fallback.min(profile.max_output_tokens)
    } else {
        budget as u32
    }
}

/// One planned generation. Owned by the task serving the request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub id: String,
    pub started: Instant,
    pub model: Arc<ModelProfile>,
    pub prompt_tokens: u32,
    pub output_budget: u32,
    pub selection: Selection,
}

impl GenerationRequest {
    /// Usage once every selected token has been emitted
    pub fn final_usage(&self) -> Usage {
        Usage::new(self.prompt_tokens, self.selection.total_tokens)
    }
}

/// Plans generations against the read-only registry and corpus
#[derive(Debug, Clone)]
pub struct Generator {
    registry: ModelRegistry,
    corpus: Corpus,
    default_output_tokens: u32,
}

impl Generator {
    pub fn new(registry: ModelRegistry, corpus: Corpus) -> Self {
        Self {
            registry,
            corpus,
            default_output_tokens: DEFAULT_OUTPUT_TOKENS,
        }
    }

    pub fn with_default_output_tokens(mut self, tokens: u32) -> Self {
        self.default_output_tokens = tokens;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Validate the request and select its output tokens.
    ///
    /// The prompt token count doubles as the corpus offset, so different
    /// prompts get different text while identical prompts get identical text.
    pub fn plan(&self, request: &ChatCompletionRequest) -> Result<GenerationRequest, MockError> {
        let started = Instant::now();

        let model = self
            .registry
            .lookup(&request.model)
            .map_err(|_| MockError::ModelNotFound)?;

        let prompt_tokens =
            u32::try_from(count_tokens_fast(&request.prompt_text())).unwrap_or(u32::MAX);
        if prompt_tokens > model.max_context_tokens {
            return Err(MockError::PromptTooLong);
        }

        let output_budget = output_budget(
            request.max_tokens,
            &model,
            prompt_tokens,
            self.default_output_tokens,
        );
        let selection = self.corpus.select(prompt_tokens as usize, output_budget);

        Ok(GenerationRequest {
            id: uuid::Uuid::new_v4().to_string(),
            started,
            model,
            prompt_tokens,
            output_budget,
            selection,
        })
    }
}

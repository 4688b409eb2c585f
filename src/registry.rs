// Model Registry Module
// Immutable name -> simulation parameters mapping, built once at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Simulation parameters for one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Model name, the registry key
    pub name: String,
    /// Largest prompt (in estimated tokens) the model accepts
    pub max_context_tokens: u32,
    /// Upper bound on generated tokens per request
    pub max_output_tokens: u32,
    /// Lower bound of the time-to-first-token range (ms)
    pub ttft_min_ms: u64,
    /// Upper bound of the time-to-first-token range (ms)
    pub ttft_max_ms: u64,
    /// Simulated output throughput
    pub output_tokens_per_second: u32,
}

/// Errors raised by the model registry
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Model list is empty")]
    Empty,
    #[error("Model '{0}' not found")]
    NotFound(String),
}

/// Read-only registry of model profiles.
///
/// No write path exists after [`ModelRegistry::load`], so concurrent
/// lookups need no synchronization.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelProfile>>,
}

impl ModelRegistry {
    /// Build the registry. When two profiles share a name the later one wins.
    pub fn load(profiles: Vec<ModelProfile>) -> Result<Self, RegistryError> {
        if profiles.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut models = HashMap::with_capacity(profiles.len());
        for profile in profiles {
            let name = profile.name.clone();
            if models.insert(name.clone(), Arc::new(profile)).is_some() {
                tracing::warn!(model = %name, "Duplicate model name, keeping the last definition");
            }
        }

        Ok(Self { models })
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<ModelProfile>, RegistryError> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Registered model names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

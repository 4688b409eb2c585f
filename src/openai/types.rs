// OpenAI-compatible Wire Types
// Request body accepted by /v1/chat/completions and the completion / chunk
// objects written back. Response objects are built fresh per response.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A message in the incoming conversation.
///
/// `content` is kept as raw JSON: the prompt size estimate is taken over the
/// JSON text exactly as the client sent it, whatever its shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<Box<RawValue>>,
}

/// Chat completion request
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Concatenated raw JSON text of every message's content
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .filter_map(|m| m.content.as_deref())
            .map(RawValue::get)
            .collect()
    }
}

/// Role of the generated message; the simulator only ever speaks as the assistant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
}

/// Reasoning content is never produced. The type has no values, so
/// `Option<ReasoningContent>` is always `None` and serializes as `null`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReasoningContent {}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Generated message in a non-streaming completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantMessage {
    pub role: Role,
    pub content: String,
}

/// A choice in the completion response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// Chat completion response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

impl ChatCompletion {
    pub fn new(id: String, model: String, content: String, usage: Usage) -> Self {
        Self {
            id,
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model,
            choices: vec![Choice {
                index: 0,
                message: AssistantMessage {
                    role: Role::Assistant,
                    content,
                },
                finish_reason: None,
            }],
            usage,
        }
    }

    /// Content of the first choice
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default()
    }
}

/// Delta content in streaming response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkDelta {
    pub content: String,
    pub role: Role,
    pub reasoning_content: Option<ReasoningContent>,
}

/// A choice in streaming response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// Streaming chat completion chunk.
///
/// Every chunk carries the cumulative usage up to and including itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    pub usage: Usage,
}

impl ChatCompletionChunk {
    pub fn new(id: String, model: String, content: String, usage: Usage) -> Self {
        Self {
            id,
            object: "chat.completion.chunk".to_string(),
            created: chrono::Utc::now().timestamp(),
            model,
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content,
                    role: Role::Assistant,
                    reasoning_content: None,
                },
                finish_reason: None,
            }],
            usage,
        }
    }

    /// Delta content of the first choice
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.delta.content.as_str())
            .unwrap_or_default()
    }
}

/// Response for /v1/models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// Error body: `{"error": "<message>"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

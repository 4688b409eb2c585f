// Request Errors Module
// Failures a single chat completion request can end in.

/// Errors returned to the client for one request.
///
/// Validation failures abort the request before any output is written.
/// Client disconnects and deadlines are not errors; see [`crate::stream::StreamOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Model not found")]
    ModelNotFound,
    /// Body could not be decoded; carries the decoder's message
    #[error("{0}")]
    InvalidBody(String),
    #[error("Prompt tokens exceed max context tokens")]
    PromptTooLong,
    #[error("Failed to encode response: {0}")]
    Encoding(#[from] serde_json::Error),
    /// The non-streaming response deadline passed before generation finished
    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

impl MockError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            MockError::ModelNotFound | MockError::InvalidBody(_) | MockError::PromptTooLong => 400,
            MockError::Encoding(_) => 500,
            MockError::DeadlineExceeded => 504,
        }
    }
}

// Response Encoding Module
// Drives a planned generation through the pacing state machine and encodes
// it as a single completion object or as a Server-Sent-Events chunk stream.

use crate::errors::MockError;
use crate::generator::GenerationRequest;
use crate::latency::{Pacer, Paced};
use crate::openai::{ChatCompletion, ChatCompletionChunk, Usage};
use async_stream::stream;
use futures::Stream;
use tokio::sync::mpsc;

/// Stream terminator
pub const DONE_EVENT: &str = "data: [DONE]\n\n";

/// Emission state of one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitState {
    /// Accepted, nothing emitted yet
    Pending,
    /// Waiting out the time to first token
    FirstDelay,
    /// About to emit the selected token at this index
    Chunk(usize),
    /// All tokens emitted; next event is the usage-only chunk and terminator
    FinalChunk,
    /// Terminator written, or emission cancelled
    Done,
}

/// How a streamed response ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every chunk and the terminator were handed to the client
    Completed { usage: Usage },
    /// The client went away or the deadline passed
    Cancelled { emitted_chunks: usize },
    /// A chunk failed to serialize
    Failed,
}

/// Format a chunk as a Server-Sent Event
pub fn format_sse(chunk: &ChatCompletionChunk) -> Result<String, MockError> {
    let json = serde_json::to_string(chunk)?;
    Ok(format!("data: {}\n\n", json))
}

/// Serialize a non-streaming completion
pub fn encode_completion(completion: &ChatCompletion) -> Result<Vec<u8>, MockError> {
    Ok(serde_json::to_vec(completion)?)
}

/// Paces and encodes one generation
#[derive(Debug)]
pub struct ResponseEncoder {
    request: GenerationRequest,
    pacer: Pacer,
    state: EmitState,
    completion_tokens: u32,
    emitted_chunks: usize,
    cancelled: bool,
}

impl ResponseEncoder {
    pub fn new(request: GenerationRequest, pacer: Pacer) -> Self {
        Self {
            request,
            pacer,
            state: EmitState::Pending,
            completion_tokens: 0,
            emitted_chunks: 0,
            cancelled: false,
        }
    }

    pub fn state(&self) -> EmitState {
        self.state
    }

    /// Usage accumulated over the chunks emitted so far
    pub fn usage(&self) -> Usage {
        Usage::new(self.request.prompt_tokens, self.completion_tokens)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.state = EmitState::Done;
    }

    fn chunk(&self, content: String) -> ChatCompletionChunk {
        ChatCompletionChunk::new(
            self.request.id.clone(),
            self.request.model.name.clone(),
            content,
            self.usage(),
        )
    }

    /// Advance the state machine and return the next SSE event.
    ///
    /// Returns `Ok(None)` once the stream is done or cancelled. The final
    /// event carries the empty-content usage chunk followed by the
    /// terminator.
    pub async fn next_event(&mut self) -> Result<Option<String>, MockError> {
        loop {
            match self.state {
                EmitState::Pending => self.state = EmitState::FirstDelay,
                EmitState::FirstDelay => {
                    if self.pacer.first_token().await == Paced::Cancelled {
                        self.cancel();
                        return Ok(None);
                    }
                    self.state = if self.request.selection.is_empty() {
                        EmitState::FinalChunk
                    } else {
                        EmitState::Chunk(0)
                    };
                }
                EmitState::Chunk(index) => {
                    // The first token's delay was the TTFT; only re-check cancellation
                    let cancelled = if index == 0 {
                        self.pacer.is_cancelled()
                    } else {
                        self.pacer.next_token().await == Paced::Cancelled
                    };
                    if cancelled {
                        self.cancel();
                        return Ok(None);
                    }

                    let token = &self.request.selection.tokens[index];
                    self.completion_tokens += token.token_count;
                    let event = format_sse(&self.chunk(token.content.clone()))?;

                    self.emitted_chunks += 1;
                    self.state = if index + 1 < self.request.selection.len() {
                        EmitState::Chunk(index + 1)
                    } else {
                        EmitState::FinalChunk
                    };
                    return Ok(Some(event));
                }
                EmitState::FinalChunk => {
                    let mut event = format_sse(&self.chunk(String::new()))?;
                    event.push_str(DONE_EVENT);
                    self.state = EmitState::Done;
                    return Ok(Some(event));
                }
                EmitState::Done => return Ok(None),
            }
        }
    }

    /// Run the whole generation and build one completion object.
    ///
    /// Delays are applied exactly as in streaming mode. Returns `Ok(None)`
    /// if the request was cancelled before the last token.
    pub async fn complete(mut self) -> Result<Option<ChatCompletion>, MockError> {
        self.state = EmitState::FirstDelay;
        if self.pacer.first_token().await == Paced::Cancelled {
            self.cancel();
            return Ok(None);
        }

        let mut content = String::new();
        for (index, token) in self.request.selection.tokens.iter().enumerate() {
            self.state = EmitState::Chunk(index);
            if index > 0 && self.pacer.next_token().await == Paced::Cancelled {
                self.cancel();
                return Ok(None);
            }
            content.push_str(&token.content);
            self.completion_tokens += token.token_count;
        }
        self.state = EmitState::Done;

        Ok(Some(ChatCompletion::new(
            self.request.id.clone(),
            self.request.model.name.clone(),
            content,
            self.usage(),
        )))
    }

    async fn pump(mut self, tx: mpsc::Sender<Result<String, MockError>>) -> StreamOutcome {
        let cancel = self.pacer.cancel_token().clone();
        loop {
            let event = match self.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) if self.cancelled => {
                    return StreamOutcome::Cancelled {
                        emitted_chunks: self.emitted_chunks,
                    }
                }
                Ok(None) => {
                    return StreamOutcome::Completed {
                        usage: self.usage(),
                    }
                }
                Err(e) => {
                    tracing::error!(request_id = %self.request.id, error = %e, "Failed to encode chunk");
                    let _ = tx.send(Err(e)).await;
                    return StreamOutcome::Failed;
                }
            };

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                result = tx.send(Ok(event)) => result.is_ok(),
            };
            if !sent {
                cancel.cancel();
                return StreamOutcome::Cancelled {
                    emitted_chunks: self.emitted_chunks,
                };
            }
        }
    }

    /// Run emission on its own task and return the SSE body stream.
    ///
    /// Dropping the returned stream (client disconnect) cancels the
    /// request's token, which wakes the emission task out of any pending
    /// wait; it then exits without writing another chunk. `on_finish` runs
    /// on that task exactly once with the outcome.
    pub fn into_event_stream<F>(
        self,
        on_finish: F,
    ) -> impl Stream<Item = Result<String, MockError>> + Send + 'static
    where
        F: FnOnce(StreamOutcome) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(1);
        let guard = self.pacer.cancel_token().clone().drop_guard();

        tokio::spawn(async move {
            let outcome = self.pump(tx).await;
            on_finish(outcome);
        });

        stream! {
            let _guard = guard;
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }
    }
}

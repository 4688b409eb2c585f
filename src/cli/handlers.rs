// HTTP Handlers Module
// Implements the chat completion and model listing endpoints.

use super::state::AppState;
use crate::{
    errors::MockError,
    latency::{cancel_after, Pacer, PacingProfile},
    openai::{ChatCompletionRequest, ErrorResponse, ModelsResponse},
    stats::SharedStats,
    stream::{encode_completion, ResponseEncoder, StreamOutcome},
};
use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// JSON body extractor whose rejection is `400 {"error": <decoder message>}`
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = MockError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| MockError::InvalidBody(e.body_text()))?;
        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|e| MockError::InvalidBody(e.to_string()))
    }
}

/// Error text attached to error responses for the access log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage(pub String);

/// Counts a non-streaming request as cancelled if its handler future is
/// dropped (client disconnect) before generation finishes
struct PendingCompletion {
    stats: SharedStats,
    request_id: String,
    finished: bool,
}

impl PendingCompletion {
    fn new(stats: SharedStats, request_id: String) -> Self {
        Self {
            stats,
            request_id,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if !self.finished {
            self.stats.record_cancelled();
            tracing::debug!(request_id = %self.request_id, "Client disconnected before completion");
        }
    }
}

/// GET /v1/models
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.generator.registry().names(),
    })
}

/// GET /debug/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.stats.snapshot())
}

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    payload: Result<JsonBody<ChatCompletionRequest>, MockError>,
) -> Result<Response, MockError> {
    let active = state.stats.enter();

    let generation = payload
        .and_then(|JsonBody(request)| {
            let generation = state.generator.plan(&request)?;
            Ok((request.stream, generation))
        })
        .inspect_err(|e| state.stats.record_error(e.status_code()));
    let (stream, generation) = generation?;

    tracing::debug!(
        request_id = %generation.id,
        model = %generation.model.name,
        stream,
        prompt_tokens = generation.prompt_tokens,
        output_budget = generation.output_budget,
        selected_tokens = generation.selection.total_tokens,
        "Chat completion request"
    );
    state.stats.record_accepted(stream);

    let cancel = CancellationToken::new();
    if let Some(deadline) = state.config.server.write_timeout() {
        cancel_after(&cancel, deadline);
    }

    let started = generation.started;
    let request_id = generation.id.clone();
    let model = generation.model.name.clone();
    let pacer = Pacer::new(PacingProfile::from_model(&generation.model), cancel.clone());
    let encoder = ResponseEncoder::new(generation, pacer);

    if stream {
        let stats = state.stats.clone();
        let events = encoder.into_event_stream(move |outcome| {
            match outcome {
                StreamOutcome::Completed { usage } => {
                    stats.record_completed(
                        started.elapsed(),
                        usage.prompt_tokens,
                        usage.completion_tokens,
                    );
                    tracing::info!(
                        request_id = %request_id,
                        model = %model,
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Stream completed"
                    );
                }
                StreamOutcome::Cancelled { emitted_chunks } => {
                    stats.record_cancelled();
                    tracing::debug!(request_id = %request_id, emitted_chunks, "Stream cancelled");
                }
                StreamOutcome::Failed => stats.record_error(500),
            }
            drop(active);
        });

        return Ok((
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(events),
        )
            .into_response());
    }

    // Client disconnect drops this future; the guard then cancels the deadline timer
    let _cancel_on_drop = cancel.drop_guard();

    let pending = PendingCompletion::new(state.stats.clone(), request_id.clone());
    let outcome = encoder.complete().await;
    pending.finish();

    let result = match outcome {
        Ok(Some(completion)) => encode_completion(&completion).map(|body| (completion, body)),
        Ok(None) => Err(MockError::DeadlineExceeded),
        Err(e) => Err(e),
    };
    let (completion, body) = result.inspect_err(|e| {
        if matches!(e, MockError::DeadlineExceeded) {
            state.stats.record_cancelled();
        } else {
            state.stats.record_error(e.status_code());
        }
    })?;

    state.stats.record_completed(
        started.elapsed(),
        completion.usage.prompt_tokens,
        completion.usage.completion_tokens,
    );
    tracing::info!(
        request_id = %request_id,
        model = %model,
        prompt_tokens = completion.usage.prompt_tokens,
        completion_tokens = completion.usage.completion_tokens,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Completion finished"
    );

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = self.to_string();

        let mut response = (status, Json(ErrorResponse::new(message.clone()))).into_response();
        response.extensions_mut().insert(ErrorMessage(message));
        response
    }
}

//! CLI module for the llm-mock server.
//!
//! This module provides the `llm-mock serve` command implementation.

mod config;
mod handlers;
mod state;

pub use config::{CommonConfig, Config, ConfigError, ModelConfig, ServerConfig, TtftConfig};
pub use handlers::{ErrorMessage, JsonBody};
pub use state::AppState;

use crate::corpus::Corpus;
use crate::generator::Generator;
use crate::registry::ModelRegistry;
use crate::stats::{new_shared_stats, SharedStats};
use axum::{
    http::{Response, StatusCode},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer, timeout::RequestBodyTimeoutLayer, trace::TraceLayer,
};
use tracing::Span;

/// Build the HTTP router for the given state
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/chat/completions", post(handlers::chat_completions));

    if state.config.server.stats_enabled {
        app = app.route("/debug/stats", get(handlers::get_stats));
    }

    let read_timeout = state.config.server.read_timeout();
    with_middleware(app.with_state(state), read_timeout)
}

/// Body read timeout, panic recovery and the access log
fn with_middleware(mut app: Router, read_timeout: Option<Duration>) -> Router {
    if let Some(timeout) = read_timeout {
        app = app.layer(RequestBodyTimeoutLayer::new(timeout));
    }

    app.layer(CatchPanicLayer::new()).layer(
        TraceLayer::new_for_http().on_response(
            |response: &Response<_>, latency: Duration, _span: &Span| {
                log_response(
                    response.status(),
                    response.extensions().get::<ErrorMessage>(),
                    latency,
                )
            },
        ),
    )
}

/// Every non-2xx response is logged at warn, router 404/405 and panics included
fn log_response(status: StatusCode, error: Option<&ErrorMessage>, latency: Duration) {
    let latency_ms = latency.as_millis() as u64;
    if status.is_success() {
        tracing::debug!(status = status.as_u16(), latency_ms, "Response sent");
        return;
    }

    let message = match error {
        Some(ErrorMessage(message)) => message.as_str(),
        None => status.canonical_reason().unwrap_or("unknown"),
    };
    tracing::warn!(status = status.as_u16(), latency_ms, error = %message, "Request failed");
}

/// Build the application state from a validated configuration
pub fn build_state(
    config: Config,
    stats: SharedStats,
) -> Result<AppState, Box<dyn std::error::Error>> {
    config.validate()?;

    let registry = ModelRegistry::load(config.model_profiles())?;
    let corpus = Corpus::load(&config.common.tokens_file)?;
    let generator = Generator::new(registry, corpus)
        .with_default_output_tokens(config.common.default_output_tokens);

    Ok(AppState::new(config, generator, stats))
}

/// Run the llm-mock server with the given configuration
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    tracing::info!("Effective configuration:\n{}", config.to_yaml()?);

    let state = Arc::new(build_state(config, new_shared_stats())?);
    tracing::info!(
        models = ?state.generator.registry().names(),
        corpus_tokens = state.generator.corpus().len(),
        "Model registry ready"
    );
    if state.config.server.stats_enabled {
        tracing::info!("Stats endpoint: /debug/stats");
    }

    let app = router(state);

    tracing::info!("Starting llm-mock server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn panicking_handler() -> &'static str {
        panic!("handler panicked")
    }

    fn app() -> Router {
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/panic", get(panicking_handler));
        with_middleware(app, Some(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let response = app()
            .oneshot(Request::get("/panic").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // The server keeps serving after a panic
        let response = app()
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_passes_through() {
        let response = app()
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_log_response_without_message() {
        log_response(StatusCode::METHOD_NOT_ALLOWED, None, Duration::from_millis(3));
        log_response(
            StatusCode::BAD_REQUEST,
            Some(&ErrorMessage("Model not found".to_string())),
            Duration::ZERO,
        );
        log_response(StatusCode::OK, None, Duration::ZERO);
    }
}

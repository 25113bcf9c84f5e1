//! HTTP surface: `GET /health` and `POST /chat`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{ChatRequest, ChatService};

pub fn router(service: Arc<ChatService>) -> Router {
    // Any origin, no credentials: the UI shell is served from elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .with_state(service)
        .layer(cors)
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(service: Arc<ChatService>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    serve_on(listener, service, shutdown_signal()).await
}

pub async fn serve_on<S>(
    listener: TcpListener,
    service: Arc<ChatService>,
    shutdown: S,
) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr().context("Failed to read bound address")?;
    tracing::info!(
        addr = %local,
        agent_available = service.is_available(),
        "listening"
    );
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(err) => tracing::error!(error = %err, "failed to listen for Ctrl-C"),
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn chat(State(service): State<Arc<ChatService>>, Json(request): Json<ChatRequest>) -> Response {
    match service.answer(request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            tracing::info!(error = %err, "rejected chat request");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::json;

    use super::{chat, health};
    use crate::chat::{ChatRequest, ChatService};
    use crate::data::DatasetSource;

    fn degraded() -> Arc<ChatService> {
        Arc::new(ChatService::unavailable(Arc::new(DatasetSource::new(
            "/missing.csv",
        ))))
    }

    #[tokio::test]
    async fn health_is_ok() {
        let axum::Json(body) = health().await;
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn blank_question_is_unprocessable() {
        let response = chat(State(degraded()), axum::Json(ChatRequest::new(" "))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn degraded_chat_still_answers() {
        let response = chat(State(degraded()), axum::Json(ChatRequest::new("hi")))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

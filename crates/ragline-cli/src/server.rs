use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ragline_agent::RagService;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub service: Arc<RagService>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

/// Build the HTTP router around a shared service.
pub fn build_router(service: Arc<RagService>) -> Router {
    let state = Arc::new(AppState { service });
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/ask", post(ask_handler))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "ragline"}))
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();

    let Json(request) = match payload {
        Ok(r) => r,
        Err(rejection) => {
            warn!(%request_id, error = %rejection, "Rejected malformed ask request");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": rejection.body_text()})),
            );
        }
    };
    let question = request.question.trim();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "question must not be empty"})),
        );
    }

    info!(%request_id, question, "Answering question");
    match state.service.generate_response(question).await {
        Ok(response) => {
            info!(
                %request_id,
                sources = response.sources.len(),
                degraded = response.degraded,
                "Answer ready"
            );
            match serde_json::to_value(&response) {
                Ok(body) => (StatusCode::OK, Json(body)),
                Err(e) => {
                    error!(%request_id, error = %e, "Failed to serialize response");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(serde_json::json!({"error": "internal error"})),
                    )
                }
            }
        }
        Err(e) => {
            error!(%request_id, error = %e, "Retrieval failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": "retrieval failed",
                    "detail": e.to_string(),
                    "request_id": request_id.to_string(),
                })),
            )
        }
    }
}

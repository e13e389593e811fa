pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/evaluations", post(handlers::handle_evaluate))
        .route(
            "/api/v1/model-evaluation",
            get(handlers::handle_model_evaluation),
        )
        .route(
            "/api/v1/conversation-history",
            get(handlers::handle_conversation_history),
        )
        .route("/api/v1/feedback", post(handlers::handle_feedback))
        .with_state(state)
}

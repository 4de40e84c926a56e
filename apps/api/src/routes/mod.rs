pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::render::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Render API
        .route(
            "/api/v1/estimates/render/pdf",
            post(handlers::handle_render_pdf),
        )
        .route(
            "/api/v1/estimates/render/docx",
            post(handlers::handle_render_docx),
        )
        .route("/api/v1/estimates/compose", post(handlers::handle_compose))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

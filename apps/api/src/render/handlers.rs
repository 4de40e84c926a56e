//! Axum route handlers for the Render API.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::compose::{compose_document, ComposedDocument, Lang};
use crate::errors::AppError;
use crate::models::EstimateRecord;
use crate::render::{render, OutputFormat};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RenderQuery {
    pub lang: Option<String>,
}

impl RenderQuery {
    fn lang(&self) -> Lang {
        Lang::from_param(self.lang.as_deref())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/estimates/render/pdf?lang=en|es
pub async fn handle_render_pdf(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
    payload: Result<Json<EstimateRecord>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(estimate) = payload?;
    render_estimate(&state, estimate, query.lang(), OutputFormat::Pdf).await
}

/// POST /api/v1/estimates/render/docx?lang=en|es
pub async fn handle_render_docx(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
    payload: Result<Json<EstimateRecord>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(estimate) = payload?;
    render_estimate(&state, estimate, query.lang(), OutputFormat::Docx).await
}

/// POST /api/v1/estimates/compose?lang=en|es
///
/// Returns the Composed Document as JSON (image bytes omitted). Useful for
/// checking which blocks both renderers will draw.
pub async fn handle_compose(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
    payload: Result<Json<EstimateRecord>, JsonRejection>,
) -> Result<Json<ComposedDocument>, AppError> {
    let Json(estimate) = payload?;
    let document = compose_document(&estimate, query.lang(), state.assets.as_ref()).await;
    Ok(Json(document))
}

async fn render_estimate(
    state: &AppState,
    estimate: EstimateRecord,
    lang: Lang,
    format: OutputFormat,
) -> Result<Response, AppError> {
    let span = tracing::info_span!(
        "render",
        render_id = %Uuid::new_v4(),
        estimate_id = %estimate.id,
        format = format.extension()
    );
    render_in_span(state, estimate, lang, format)
        .instrument(span)
        .await
}

async fn render_in_span(
    state: &AppState,
    estimate: EstimateRecord,
    lang: Lang,
    format: OutputFormat,
) -> Result<Response, AppError> {
    let document = compose_document(&estimate, lang, state.assets.as_ref()).await;
    let filename = format.filename(&document.estimate_id);

    // Layout and serialization are CPU-bound; keep them off the async workers.
    let output = tokio::task::spawn_blocking(move || render(format, &document))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Render task failed: {e}")))??;

    info!(bytes = output.len(), ?lang, "Rendered estimate");

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Bytes::from(output),
    )
        .into_response())
}

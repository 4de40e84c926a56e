// Output renderers for a Composed Document.
// Both renderers are synchronous, CPU-bound, and consume the same document;
// handlers run them inside tokio::task::spawn_blocking.

pub mod docx;
pub mod handlers;
pub mod metrics;
pub mod pdf;

use serde::Deserialize;
use thiserror::Error;

use crate::compose::ComposedDocument;

pub use docx::PackageRenderer;
pub use pdf::StreamRenderer;

/// Fatal renderer failures. Asset misses never reach this type.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF rendering failed: {0}")]
    Stream(String),

    #[error("DOCX rendering failed: {0}")]
    Package(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Docx,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Docx => "docx",
        }
    }

    /// `estimate-<id>.<ext>`, with the id reduced to `[A-Za-z0-9_-]`.
    pub fn filename(&self, estimate_id: &str) -> String {
        let safe: String = estimate_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .collect();
        let safe = if safe.is_empty() { "draft".to_string() } else { safe };
        format!("estimate-{safe}.{}", self.extension())
    }
}

/// A renderer turns one Composed Document into one output byte buffer.
pub trait DocumentRenderer {
    fn render(&self, doc: &ComposedDocument) -> Result<Vec<u8>, RenderError>;
}

/// Renders `doc` in the requested format.
pub fn render(format: OutputFormat, doc: &ComposedDocument) -> Result<Vec<u8>, RenderError> {
    match format {
        OutputFormat::Pdf => StreamRenderer.render(doc),
        OutputFormat::Docx => PackageRenderer.render(doc),
    }
}

/// Scales a `width × height` pixel image to fit inside a box in points,
/// preserving aspect ratio and never upscaling past one pixel per point.
/// Both renderers size images through this function.
pub fn fit_within(width_px: u32, height_px: u32, max_w_pt: f32, max_h_pt: f32) -> (f32, f32) {
    if width_px == 0 || height_px == 0 {
        return (0.0, 0.0);
    }
    let (w, h) = (width_px as f32, height_px as f32);
    let scale = (max_w_pt / w).min(max_h_pt / h).min(1.0);
    (w * scale, h * scale)
}

/// Logo bounding box in points.
pub const LOGO_MAX: (f32, f32) = (120.0, 60.0);
/// Signature image bounding box in points.
pub const SIGNATURE_MAX: (f32, f32) = (180.0, 60.0);
/// Items table column fractions: description, quantity, unit price, line total.
pub const ITEM_COLUMN_RATIOS: [f32; 4] = [0.45, 0.15, 0.20, 0.20];

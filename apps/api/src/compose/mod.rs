// Format-independent document composition.
// Theme, totals, section plan and block assembly live here so that the PDF and
// DOCX renderers consume one identical Composed Document.

pub mod document;
pub mod finance;
pub mod labels;
pub mod planner;
pub mod theme;

// Re-export the public API consumed by the renderers and handlers.
pub use document::{compose_document, BlockKind, ComposedDocument, ContentBlock};
pub use labels::Lang;

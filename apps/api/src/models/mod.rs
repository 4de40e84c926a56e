// Input data handed over by the CRUD layer: the estimate record and the
// template configuration embedded in its project's metadata.

pub mod estimate;
pub mod lenient;
pub mod template;

pub use estimate::{EstimateRecord, LineItem, Project};
pub use template::{SectionDescriptor, SectionId, TemplateConfig};

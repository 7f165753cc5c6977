pub mod context;
pub mod extractor;

pub use context::{MissingTenantContext, TenantContext};
pub use extractor::TenantExtractor;

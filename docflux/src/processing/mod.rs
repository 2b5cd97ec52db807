pub mod classifier;
pub mod extractors;
pub mod normalizer;
pub mod pdf;
mod registry;
mod service;

pub use classifier::{classify, is_supported, supported_content_types};
pub use normalizer::{normalize, ExtractorOutput};
pub use registry::{Engines, ExtractorRegistry};
pub use service::ConversionService;

pub mod decode;
pub mod dimension_resolver;

pub use dimension_resolver::{DimensionResolver, ResolvedBatch, DEFAULT_LOAD_TIMEOUT};

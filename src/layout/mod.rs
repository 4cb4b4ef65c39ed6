pub mod layout_cache;
pub mod masonry;

pub use layout_cache::CachedLayoutComputer;
pub use masonry::{MasonryLayout, MasonryResult};

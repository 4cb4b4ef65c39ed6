pub mod cache;
pub mod store;

pub use cache::{OfflineCache, DEFAULT_CACHE_NAME, DEFAULT_PRECACHE};
pub use store::ResponseStore;

//! Where image listings and image bytes come from.
//!
//! A listing is an ordered list of opaque `ImageRef`s. Image bytes are
//! fetched per ref and only ever inspected for their header dimensions.

mod directory;
mod http;

use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::debug;

pub use directory::{DirectoryImageSource, DirectoryListProvider};
pub use http::{HttpImageSource, HttpListProvider};

use crate::error::{DimensionError, ListFetchError};
use crate::models::ImageRef;

/// Built-in listing served when no list endpoint or directory is configured.
pub const STUB_IMAGES: &[&str] = &[
    "RGB.png",
    "RGB2.png",
    "RGB3.png",
    "RGB_2048.png",
    "Tarinor.png",
    "Tree.png",
    "nuance gris.png",
];

/// Produces the ordered image listing.
pub trait ImageListProvider: Send + Sync {
    fn fetch_list(&self) -> BoxFuture<'_, Result<Vec<ImageRef>, ListFetchError>>;
}

/// Produces the raw bytes of one image.
pub trait ImageSource: Send + Sync {
    fn load<'a>(&'a self, image: &'a ImageRef) -> BoxFuture<'a, Result<Bytes, DimensionError>>;

    /// Where the image is displayed from.
    fn locate(&self, image: &ImageRef) -> String;
}

/// Sub-delimiters left literal in a URI component, on top of the
/// unreserved set `urlencoding` already keeps.
const URI_COMPONENT_LITERALS: &[(&str, &str)] = &[
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Builds the URL of an image: the base followed by the ref encoded as a
/// URI component.
///
/// Every other reserved character in the ref is escaped, including `/`.
pub fn image_url(base: &str, image: &ImageRef) -> String {
    let mut encoded = urlencoding::encode(image.as_str()).into_owned();
    for (escaped, literal) in URI_COMPONENT_LITERALS {
        if encoded.contains(escaped) {
            encoded = encoded.replace(escaped, literal);
        }
    }
    format!("{}{}", base, encoded)
}

/// Serves a fixed listing.
#[derive(Debug, Clone)]
pub struct StaticListProvider {
    images: Vec<ImageRef>,
}

impl StaticListProvider {
    pub fn new(images: Vec<ImageRef>) -> Self {
        Self { images }
    }

    /// The built-in stub listing.
    pub fn stub() -> Self {
        Self::new(STUB_IMAGES.iter().map(|s| ImageRef::from(*s)).collect())
    }
}

impl Default for StaticListProvider {
    fn default() -> Self {
        Self::stub()
    }
}

impl ImageListProvider for StaticListProvider {
    fn fetch_list(&self) -> BoxFuture<'_, Result<Vec<ImageRef>, ListFetchError>> {
        Box::pin(async move {
            debug!(count = self.images.len(), "Serving static image list");
            Ok(self.images.clone())
        })
    }
}

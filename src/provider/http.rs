use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::{debug, info};
use url::Url;

use super::{image_url, ImageListProvider, ImageSource};
use crate::error::{DimensionError, ListFetchError};
use crate::models::ImageRef;
use crate::net::{Destination, Fetcher, Request};

/// Fetches the listing as a JSON array of strings.
pub struct HttpListProvider {
    url: Url,
    fetcher: Arc<dyn Fetcher>,
}

impl HttpListProvider {
    pub fn new(url: Url, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { url, fetcher }
    }
}

impl ImageListProvider for HttpListProvider {
    fn fetch_list(&self) -> BoxFuture<'_, Result<Vec<ImageRef>, ListFetchError>> {
        Box::pin(async move {
            let request = Request::get(self.url.clone(), Destination::Other);
            let response = self.fetcher.fetch(&request).await?;
            if !response.is_success() {
                return Err(ListFetchError::Status {
                    url: self.url.to_string(),
                    status: response.status,
                });
            }

            let names: Vec<String> = serde_json::from_slice(&response.body)?;
            info!(url = %self.url, count = names.len(), "Fetched image list");
            Ok(names.into_iter().map(ImageRef::from).collect())
        })
    }
}

/// Loads image bytes over HTTP from `base_url + encoded ref`.
///
/// The fetcher is normally the offline cache, so images fetched once are
/// served locally afterwards.
pub struct HttpImageSource {
    base_url: String,
    fetcher: Arc<dyn Fetcher>,
}

impl HttpImageSource {
    pub fn new(base_url: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            base_url: base_url.into(),
            fetcher,
        }
    }
}

impl ImageSource for HttpImageSource {
    fn load<'a>(&'a self, image: &'a ImageRef) -> BoxFuture<'a, Result<Bytes, DimensionError>> {
        Box::pin(async move {
            let load_err = |reason: String| DimensionError::Load {
                image: image.to_string(),
                reason,
            };

            let url = Url::parse(&self.locate(image)).map_err(|e| load_err(e.to_string()))?;
            let response = self
                .fetcher
                .fetch(&Request::get(url, Destination::Image))
                .await
                .map_err(|e| load_err(e.to_string()))?;

            if !response.is_success() {
                return Err(load_err(format!("status {}", response.status)));
            }

            debug!(%image, bytes = response.body.len(), "Loaded image");
            Ok(response.body)
        })
    }

    fn locate(&self, image: &ImageRef) -> String {
        image_url(&self.base_url, image)
    }
}

//! Network seam shared by the list provider, the image source and the
//! offline cache.

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tracing::trace;
use url::Url;

use crate::error::FetchError;

/// What a request is going to be used for. Drives cacheability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Other,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
}

impl Request {
    pub fn get(url: Url, destination: Destination) -> Self {
        Self {
            method: Method::GET,
            url,
            destination,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single network round trip.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>>;
}

/// `Fetcher` backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
        Box::pin(async move {
            let network_err = |e: reqwest::Error| FetchError::Network {
                url: request.url.to_string(),
                reason: e.to_string(),
            };

            trace!(method = %request.method, url = %request.url, "Fetching");
            let response = self
                .client
                .request(request.method.clone(), request.url.clone())
                .send()
                .await
                .map_err(network_err)?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response.bytes().await.map_err(network_err)?;

            Ok(Response {
                status,
                content_type,
                body,
            })
        })
    }
}

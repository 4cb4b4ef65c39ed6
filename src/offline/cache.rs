//! Offline response cache with a memory layer in front of the SQLite store.
//!
//! - Install: create the named cache and precache the static assets
//! - Activate: purge every cache whose name differs from the current one
//! - Fetch: cache-first for GET requests, storing successful image, script
//!   and style responses as they pass through
//!
//! Bumping the cache name on deployment is how stale assets get purged; a
//! single image is replaced the next time it is fetched successfully.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Method;
use tracing::{debug, info, trace, warn};
use url::Url;
use xxhash_rust::xxh3::xxh3_64;

use super::store::{ResponseStore, StoreStats};
use crate::error::{CacheError, FetchError};
use crate::net::{Destination, Fetcher, Request, Response};

/// Default cache generation name.
pub const DEFAULT_CACHE_NAME: &str = "galerie-cache-v2";

/// Static assets stored on install, relative to the app origin.
pub const DEFAULT_PRECACHE: &[&str] = &["/", "/index.html", "/vite.svg"];

/// Number of responses kept in the memory layer.
const DEFAULT_MEMORY_ENTRIES: usize = 256;

/// Responses larger than this are only kept on disk.
const MAX_MEMORY_ENTRY_BYTES: usize = 4 * 1024 * 1024;

/// Hit/miss counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stored: u64,
    pub bypassed: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stored: AtomicU64,
    bypassed: AtomicU64,
}

/// Request/response cache bound to one cache generation name.
pub struct OfflineCache {
    name: String,
    store: Mutex<ResponseStore>,
    memory: Mutex<LruCache<u64, Response>>,
    network: Arc<dyn Fetcher>,
    counters: Counters,
}

impl OfflineCache {
    pub fn new(name: impl Into<String>, store: ResponseStore, network: Arc<dyn Fetcher>) -> Self {
        let name = name.into();
        debug!(cache_name = %name, "Initialized offline cache");
        Self {
            name,
            store: Mutex::new(store),
            memory: Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_MEMORY_ENTRIES).unwrap_or(NonZeroUsize::MIN),
            )),
            network,
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates the cache and stores every precache asset.
    ///
    /// All assets are fetched before anything is written; one failure fails
    /// the install and leaves the store untouched.
    pub async fn install(&self, origin: &Url, assets: &[&str]) -> Result<usize, CacheError> {
        let mut entries = Vec::with_capacity(assets.len());
        for asset in assets {
            let url = origin
                .join(asset)
                .map_err(|_| FetchError::InvalidUrl(format!("{}{}", origin, asset)))?;
            let response = self
                .network
                .fetch(&Request::get(url.clone(), Destination::Document))
                .await?;
            if !response.is_success() {
                return Err(CacheError::Install {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            entries.push((url.to_string(), response));
        }

        let count = {
            let mut store = self.store.lock();
            store.open_cache(&self.name)?;
            store.put_all(&self.name, &entries)?
        };

        info!(cache_name = %self.name, assets = count, "Offline cache installed");
        Ok(count)
    }

    /// Deletes every cache other than the current one. Returns the purged names.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        let store = self.store.lock();
        let stale: Vec<String> = store
            .cache_names()?
            .into_iter()
            .filter(|name| name != &self.name)
            .collect();

        for name in &stale {
            store.delete_cache(name)?;
        }

        if !stale.is_empty() {
            info!(cache_name = %self.name, purged = ?stale, "Purged stale caches");
        }
        Ok(stale)
    }

    /// Cache-first fetch.
    pub async fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        if request.method != Method::GET {
            self.counters.bypassed.fetch_add(1, Ordering::Relaxed);
            return Ok(self.network.fetch(request).await?);
        }

        let url = request.url.as_str();
        if let Some(hit) = self.lookup(url)? {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(url, "Offline cache hit");
            return Ok(hit);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let response = self.network.fetch(request).await?;
        if response.status == 200 && Self::is_cacheable(request) {
            if let Err(e) = self.put(url, &response) {
                warn!(url, error = ?e, "Failed to store response");
            }
        }
        Ok(response)
    }

    /// Whether a successful response to this request should be stored.
    pub fn is_cacheable(request: &Request) -> bool {
        request.url.path().contains("/images/")
            || matches!(
                request.destination,
                Destination::Image | Destination::Script | Destination::Style
            )
    }

    fn lookup(&self, url: &str) -> Result<Option<Response>, CacheError> {
        let key = xxh3_64(url.as_bytes());
        if let Some(hit) = self.memory.lock().get(&key) {
            return Ok(Some(hit.clone()));
        }

        let stored = self.store.lock().match_url(&self.name, url)?;
        if let Some(response) = &stored {
            self.remember(key, response);
        }
        Ok(stored)
    }

    fn put(&self, url: &str, response: &Response) -> Result<(), CacheError> {
        self.store.lock().put(&self.name, url, response)?;
        self.remember(xxh3_64(url.as_bytes()), response);
        self.counters.stored.fetch_add(1, Ordering::Relaxed);
        debug!(url, bytes = response.body.len(), "Cached response");
        Ok(())
    }

    fn remember(&self, key: u64, response: &Response) {
        if response.body.len() <= MAX_MEMORY_ENTRY_BYTES {
            self.memory.lock().put(key, response.clone());
        }
    }

    /// Drops the memory layer; stored responses are kept.
    #[cfg(test)]
    pub fn clear_memory(&self) {
        self.memory.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stored: self.counters.stored.load(Ordering::Relaxed),
            bypassed: self.counters.bypassed.load(Ordering::Relaxed),
        }
    }

    /// Totals of the backing store across every cache name.
    pub fn store_stats(&self) -> Result<StoreStats, CacheError> {
        self.store.lock().get_stats()
    }
}

impl Fetcher for OfflineCache {
    fn fetch<'a>(
        &'a self,
        request: &'a Request,
    ) -> futures::future::BoxFuture<'a, Result<Response, FetchError>> {
        Box::pin(async move {
            match OfflineCache::fetch(self, request).await {
                Ok(response) => Ok(response),
                Err(CacheError::Fetch(e)) => Err(e),
                Err(e) => {
                    // A broken store must not take the network down with it.
                    warn!(url = %request.url, error = ?e, "Offline cache unavailable, going to network");
                    self.network.fetch(request).await
                }
            }
        })
    }
}

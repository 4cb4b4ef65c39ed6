//! Concurrent dimension discovery.
//!
//! - One task per image, loading through the configured `ImageSource`
//! - Completions reported on a flume channel in whatever order they finish
//! - A batch settles once every task has reported
//! - Failures and timeouts become fallback dimensions

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, trace, warn};

use super::decode::read_dimensions;
use crate::error::DimensionError;
use crate::models::{Generation, ImageDimensions, ImageRef};
use crate::provider::ImageSource;

/// Default upper bound on a single image load.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Index-ordered dimensions of one request, tagged with the generation it
/// was requested for.
#[derive(Debug, Clone)]
pub struct ResolvedBatch {
    pub generation: Generation,
    pub dimensions: Vec<ImageDimensions>,
}

/// Owns the dimension map of the current generation.
pub struct DimensionResolver {
    source: Arc<dyn ImageSource>,
    timeout: Duration,
    generation: Generation,
    resolved: HashMap<ImageRef, ImageDimensions>,
}

impl DimensionResolver {
    #[cfg(test)]
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        Self::with_timeout(source, DEFAULT_LOAD_TIMEOUT)
    }

    pub fn with_timeout(source: Arc<dyn ImageSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            generation: Generation::default(),
            resolved: HashMap::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn source(&self) -> &Arc<dyn ImageSource> {
        &self.source
    }

    /// Starts a new generation, forgetting every resolved dimension.
    ///
    /// Loads still in flight for the old generation will be discarded by
    /// `apply` when their batch settles.
    pub fn begin_generation(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.resolved.clear();
        debug!(generation = %self.generation, "Started new generation");
        self.generation
    }

    /// Refs without dimensions in the current generation, deduplicated, in order.
    pub fn missing(&self, refs: &[ImageRef]) -> Vec<ImageRef> {
        let mut seen = HashSet::new();
        refs.iter()
            .filter(|r| !self.resolved.contains_key(*r) && seen.insert(*r))
            .cloned()
            .collect()
    }

    /// Spawns one load per ref and returns a future that settles once all
    /// of them have completed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&self, refs: &[ImageRef]) -> BoxFuture<'static, ResolvedBatch> {
        let generation = self.generation;
        let refs = refs.to_vec();
        let (tx, rx) = flume::unbounded();

        for (index, image) in refs.iter().cloned().enumerate() {
            let source = Arc::clone(&self.source);
            let tx = tx.clone();
            let timeout = self.timeout;
            tokio::spawn(async move {
                let dimensions = resolve_one(source.as_ref(), image, timeout).await;
                // Receiver gone means nobody waits for this batch anymore
                let _ = tx.send((index, dimensions));
            });
        }
        drop(tx);

        debug!(%generation, count = refs.len(), "Requested dimensions");

        Box::pin(async move {
            let mut slots: Vec<Option<ImageDimensions>> = vec![None; refs.len()];
            let mut settled = 0;
            while settled < refs.len() {
                match rx.recv_async().await {
                    Ok((index, dimensions)) => {
                        slots[index] = Some(dimensions);
                        settled += 1;
                    }
                    // Every sender dropped: a load task panicked
                    Err(_) => break,
                }
            }

            let dimensions = refs
                .into_iter()
                .zip(slots)
                .map(|(image, slot)| slot.unwrap_or_else(|| ImageDimensions::fallback(image)))
                .collect();

            ResolvedBatch {
                generation,
                dimensions,
            }
        })
    }

    /// Merges a settled batch into the dimension map.
    ///
    /// Batches from an older generation are discarded and `false` is
    /// returned. Dimensions already present are never overwritten.
    pub fn apply(&mut self, batch: ResolvedBatch) -> bool {
        if batch.generation != self.generation {
            debug!(
                batch = %batch.generation,
                current = %self.generation,
                "Discarding stale dimension batch"
            );
            return false;
        }

        for dimensions in batch.dimensions {
            self.resolved
                .entry(dimensions.image.clone())
                .or_insert(dimensions);
        }
        true
    }

    #[cfg(test)]
    pub fn get(&self, image: &ImageRef) -> Option<&ImageDimensions> {
        self.resolved.get(image)
    }

    /// Dimensions for every ref, or `None` while any is still unresolved.
    pub fn all(&self, refs: &[ImageRef]) -> Option<Vec<ImageDimensions>> {
        refs.iter().map(|r| self.resolved.get(r).cloned()).collect()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}

async fn resolve_one(source: &dyn ImageSource, image: ImageRef, timeout: Duration) -> ImageDimensions {
    let result = match tokio::time::timeout(timeout, source.load(&image)).await {
        Ok(Ok(bytes)) => read_dimensions(&image, &bytes),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(DimensionError::Timeout {
            image: image.to_string(),
            timeout,
        }),
    };

    match result {
        Ok(size) => {
            trace!(%image, width = size.width, height = size.height, "Resolved dimensions");
            ImageDimensions::measured(image, size.width, size.height)
        }
        Err(e) => {
            warn!(%image, error = %e, "Using fallback dimensions");
            ImageDimensions::fallback(image)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dimensions;
    use crate::resolver::decode::encode_png;
    use bytes::Bytes;
    use parking_lot::Mutex;

    enum Script {
        Png { width: u32, height: u32, delay: Duration },
        Fail,
        Hang,
    }

    /// Image source answering from a fixed script.
    #[derive(Default)]
    struct ScriptedSource {
        scripts: HashMap<String, Script>,
        loads: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn png(mut self, name: &str, width: u32, height: u32, delay_ms: u64) -> Self {
            let delay = Duration::from_millis(delay_ms);
            self.scripts
                .insert(name.to_string(), Script::Png { width, height, delay });
            self
        }

        fn fail(mut self, name: &str) -> Self {
            self.scripts.insert(name.to_string(), Script::Fail);
            self
        }

        fn hang(mut self, name: &str) -> Self {
            self.scripts.insert(name.to_string(), Script::Hang);
            self
        }
    }

    impl ImageSource for ScriptedSource {
        fn load<'a>(&'a self, image: &'a ImageRef) -> BoxFuture<'a, Result<Bytes, DimensionError>> {
            Box::pin(async move {
                self.loads.lock().push(image.to_string());
                match self.scripts.get(image.as_str()) {
                    Some(Script::Png { width, height, delay }) => {
                        tokio::time::sleep(*delay).await;
                        Ok(Bytes::from(encode_png(*width, *height)))
                    }
                    Some(Script::Hang) => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(Bytes::new())
                    }
                    Some(Script::Fail) | None => Err(DimensionError::Load {
                        image: image.to_string(),
                        reason: "not found".to_string(),
                    }),
                }
            })
        }

        fn locate(&self, image: &ImageRef) -> String {
            image.to_string()
        }
    }

    fn refs(names: &[&str]) -> Vec<ImageRef> {
        names.iter().map(|n| ImageRef::from(*n)).collect()
    }

    #[tokio::test]
    async fn test_batch_is_index_ordered_despite_completion_order() {
        let source = ScriptedSource::default()
            .png("slow.png", 10, 20, 60)
            .png("fast.png", 30, 40, 0);
        let mut resolver = DimensionResolver::new(Arc::new(source));
        resolver.begin_generation();

        let batch = resolver.request(&refs(&["slow.png", "fast.png"])).await;
        let sizes: Vec<Dimensions> = batch.dimensions.iter().map(|d| d.size).collect();
        assert_eq!(
            sizes,
            vec![Dimensions::new(10, 20), Dimensions::new(30, 40)]
        );
        assert!(resolver.apply(batch));
        assert_eq!(resolver.resolved_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_uses_fallback() {
        let source = ScriptedSource::default().png("ok.png", 640, 480, 0).fail("broken.png");
        let mut resolver = DimensionResolver::new(Arc::new(source));
        resolver.begin_generation();

        let batch = resolver.request(&refs(&["ok.png", "broken.png", "unknown.png"])).await;
        resolver.apply(batch);

        let ok = resolver.get(&ImageRef::from("ok.png")).unwrap();
        assert!(!ok.fallback);
        for name in ["broken.png", "unknown.png"] {
            let dims = resolver.get(&ImageRef::from(name)).unwrap();
            assert!(dims.fallback);
            assert_eq!(dims.size, Dimensions::FALLBACK);
        }
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let source = ScriptedSource::default().hang("stuck.png").png("ok.png", 5, 5, 0);
        let resolver =
            DimensionResolver::with_timeout(Arc::new(source), Duration::from_millis(50));

        let batch = resolver.request(&refs(&["stuck.png", "ok.png"])).await;
        assert!(batch.dimensions[0].fallback);
        assert!(!batch.dimensions[1].fallback);
    }

    #[tokio::test]
    async fn test_stale_batch_is_discarded() {
        let source = ScriptedSource::default().png("a.png", 100, 50, 0);
        let mut resolver = DimensionResolver::new(Arc::new(source));
        resolver.begin_generation();

        let pending = resolver.request(&refs(&["a.png"]));
        resolver.begin_generation();
        let batch = pending.await;

        assert!(!resolver.apply(batch));
        assert!(resolver.get(&ImageRef::from("a.png")).is_none());
    }

    #[tokio::test]
    async fn test_apply_never_overwrites() {
        let source = ScriptedSource::default().png("a.png", 100, 50, 0);
        let mut resolver = DimensionResolver::new(Arc::new(source));
        resolver.begin_generation();

        let first = resolver.request(&refs(&["a.png"])).await;
        resolver.apply(first);

        let generation = resolver.generation();
        let later = ResolvedBatch {
            generation,
            dimensions: vec![ImageDimensions::fallback(ImageRef::from("a.png"))],
        };
        assert!(resolver.apply(later));
        assert_eq!(
            resolver.get(&ImageRef::from("a.png")).unwrap().size,
            Dimensions::new(100, 50)
        );
    }

    #[tokio::test]
    async fn test_missing_skips_resolved_and_duplicates() {
        let source = ScriptedSource::default().png("a.png", 1, 1, 0);
        let mut resolver = DimensionResolver::new(Arc::new(source));
        resolver.begin_generation();

        let batch = resolver.request(&refs(&["a.png"])).await;
        resolver.apply(batch);

        let all = refs(&["a.png", "b.png", "b.png", "c.png"]);
        assert_eq!(resolver.missing(&all), refs(&["b.png", "c.png"]));
        assert!(resolver.all(&all).is_none());
        assert_eq!(resolver.all(&refs(&["a.png"])).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_request_settles_immediately() {
        let resolver = DimensionResolver::new(Arc::new(ScriptedSource::default()));
        let batch = resolver.request(&[]).await;
        assert!(batch.dimensions.is_empty());
    }
}

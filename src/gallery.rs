//! Gallery controller.
//!
//! Owns the listing, the dimension map, the reveal window, the layout cache
//! and the lightbox, and keeps them consistent across listing reloads.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::layout::{CachedLayoutComputer, MasonryLayout, MasonryResult};
use crate::lightbox::Lightbox;
use crate::models::{Generation, ImageDimensions, ImageRef};
use crate::provider::ImageListProvider;
use crate::resolver::{DimensionResolver, ResolvedBatch};
use crate::reveal::RevealController;

/// Message shown for an empty listing.
pub const EMPTY_MESSAGE: &str = "No images found.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Listing or visible dimensions still pending, or no width yet.
    Loading,
    /// The listing could not be fetched.
    Error(String),
    Empty,
    Ready,
}

impl Status {
    pub fn message(&self) -> Option<&str> {
        match self {
            Status::Error(msg) => Some(msg.as_str()),
            Status::Empty => Some(EMPTY_MESSAGE),
            Status::Loading | Status::Ready => None,
        }
    }
}

pub struct Gallery {
    provider: Arc<dyn ImageListProvider>,
    resolver: DimensionResolver,
    reveal: RevealController,
    layout: CachedLayoutComputer,
    lightbox: Lightbox,
    images: Vec<ImageRef>,
    container_width: f64,
    loaded: bool,
    error: Option<String>,
}

impl Gallery {
    pub fn new(
        provider: Arc<dyn ImageListProvider>,
        resolver: DimensionResolver,
        reveal: RevealController,
        layout: MasonryLayout,
    ) -> Self {
        Self {
            provider,
            resolver,
            reveal,
            layout: CachedLayoutComputer::with_layout(layout),
            lightbox: Lightbox::new(),
            images: Vec::new(),
            container_width: 0.0,
            loaded: false,
            error: None,
        }
    }

    /// Fetches the listing and starts a new generation.
    ///
    /// A list failure leaves the gallery empty with an error status; it is
    /// not retried.
    pub async fn reload(&mut self) -> Generation {
        let generation = self.resolver.begin_generation();
        self.layout.invalidate();

        match self.provider.fetch_list().await {
            Ok(images) => {
                info!(%generation, count = images.len(), "Loaded image list");
                self.images = images;
                self.error = None;
            }
            Err(e) => {
                warn!(%generation, error = %e, "Failed to load image list");
                self.images.clear();
                self.error = Some(e.to_string());
            }
        }

        self.reveal.reset(self.images.len());
        let source = self.resolver.source();
        self.lightbox
            .set_urls(self.images.iter().map(|r| source.locate(r)).collect());
        self.loaded = true;
        generation
    }

    /// Starts loading the visible refs that have no dimensions yet.
    ///
    /// Returns `None` when nothing is missing. The batch must be handed back
    /// to `apply`; batches that outlive a reload are discarded there.
    pub fn request_visible(&self) -> Option<BoxFuture<'static, ResolvedBatch>> {
        let missing = self.resolver.missing(self.visible());
        if missing.is_empty() {
            return None;
        }
        Some(self.resolver.request(&missing))
    }

    pub fn apply(&mut self, batch: ResolvedBatch) -> bool {
        self.resolver.apply(batch)
    }

    /// Resolves every visible ref that has no dimensions yet. Returns the
    /// number of refs applied.
    pub async fn resolve_visible(&mut self) -> usize {
        let Some(pending) = self.request_visible() else {
            return 0;
        };
        let batch = pending.await;
        let count = batch.dimensions.len();
        if self.apply(batch) {
            debug!(
                count,
                resolved = self.resolver.resolved_count(),
                "Applied dimension batch"
            );
            count
        } else {
            0
        }
    }

    /// Feeds the sentinel visibility signal; newly revealed images are
    /// resolved before returning. Returns whether the window grew.
    pub async fn sentinel_changed(&mut self, visible: bool) -> bool {
        if self.reveal.sentinel_changed(visible).is_none() {
            return false;
        }
        self.resolve_visible().await;
        true
    }

    /// Non-finite widths are treated as an unmeasured container.
    pub fn set_container_width(&mut self, width: f64) {
        self.container_width = if width.is_finite() { width } else { 0.0 };
    }

    pub fn container_width(&self) -> f64 {
        self.container_width
    }

    /// Layout of the visible window, or `None` while any visible image is
    /// still waiting for its dimensions.
    pub fn layout(&self) -> Option<MasonryResult> {
        let dimensions = self.visible_dimensions()?;
        Some(self.layout.compute(&dimensions, self.container_width))
    }

    pub fn visible_dimensions(&self) -> Option<Vec<ImageDimensions>> {
        self.resolver.all(self.visible())
    }

    pub fn status(&self) -> Status {
        if !self.loaded {
            return Status::Loading;
        }
        if let Some(msg) = &self.error {
            return Status::Error(msg.clone());
        }
        if self.images.is_empty() {
            return Status::Empty;
        }
        if self.container_width <= 0.0 || self.visible_dimensions().is_none() {
            return Status::Loading;
        }
        Status::Ready
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    pub fn visible(&self) -> &[ImageRef] {
        &self.images[..self.reveal.count().min(self.images.len())]
    }

    pub fn reveal(&self) -> &RevealController {
        &self.reveal
    }

    pub fn generation(&self) -> Generation {
        self.resolver.generation()
    }

    pub fn lightbox(&self) -> &Lightbox {
        &self.lightbox
    }

    pub fn lightbox_mut(&mut self) -> &mut Lightbox {
        &mut self.lightbox
    }

    /// Opens the lightbox on a listing index.
    pub fn open_image(&mut self, index: usize) -> bool {
        self.lightbox.open(index)
    }
}

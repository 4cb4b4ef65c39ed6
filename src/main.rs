mod config;
mod error;
mod gallery;
mod layout;
mod lightbox;
mod models;
mod net;
mod offline;
mod provider;
mod resolver;
mod reveal;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use config::{GalleryConfig, USAGE};
use gallery::{Gallery, Status};
use layout::MasonryLayout;
use lightbox::{Key, LightboxView};
use models::LayoutBox;
use net::{Fetcher, HttpFetcher};
use offline::{OfflineCache, ResponseStore, DEFAULT_PRECACHE};
use provider::{
    DirectoryImageSource, DirectoryListProvider, HttpImageSource, HttpListProvider,
    ImageListProvider, ImageSource, StaticListProvider,
};
use resolver::DimensionResolver;
use reveal::RevealController;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("galerie=info".parse().context("Invalid log directive")?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = GalleryConfig::from_env()?;
    if config.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: GalleryConfig) -> Result<()> {
    let sources = build_sources(&config).await?;

    let mut gallery = Gallery::new(
        sources.provider,
        DimensionResolver::with_timeout(sources.source, config.load_timeout),
        RevealController::new(config.initial_batch, config.batch_size),
        MasonryLayout::with_gutter(config.gutter),
    );
    gallery.set_container_width(config.container_width);

    gallery.reload().await;
    gallery.resolve_visible().await;

    for _ in 0..config.reveal_steps {
        if !gallery.sentinel_changed(true).await {
            break;
        }
        gallery.sentinel_changed(false).await;
    }

    if let Some(index) = config.open {
        if !gallery.open_image(index) {
            warn!(index, total = gallery.images().len(), "No image at lightbox index");
        }
        for name in &config.keys {
            if !gallery.lightbox_mut().handle_key(Key::from_name(name)) {
                debug!(key = %name, "Key ignored by lightbox");
            }
        }
    }

    let offline = sources
        .cache
        .as_deref()
        .map(OfflineReport::from_cache)
        .transpose()?;
    let report = Report::from_gallery(&gallery, offline);
    if config.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to encode report")?
        );
    } else {
        report.print();
    }
    Ok(())
}

/// Where the listing and the image bytes come from.
struct Sources {
    provider: Arc<dyn ImageListProvider>,
    source: Arc<dyn ImageSource>,
    /// Set when image requests go through the offline cache.
    cache: Option<Arc<OfflineCache>>,
}

async fn build_sources(config: &GalleryConfig) -> Result<Sources> {
    if let Some(dir) = &config.image_dir {
        info!("Serving images from {:?}", dir);
        let provider = DirectoryListProvider::new(dir).follow_symlinks(config.follow_symlinks);
        return Ok(Sources {
            provider: Arc::new(provider),
            source: Arc::new(DirectoryImageSource::new(dir)),
            cache: None,
        });
    }

    let http: Arc<dyn Fetcher> =
        Arc::new(HttpFetcher::new(config.load_timeout).context("Failed to build HTTP client")?);
    let (fetcher, cache) = if config.offline {
        let cache = Arc::new(open_offline_cache(config, http).await?);
        (Arc::clone(&cache) as Arc<dyn Fetcher>, Some(cache))
    } else {
        (http, None)
    };

    let provider: Arc<dyn ImageListProvider> = match &config.list_url {
        Some(url) => Arc::new(HttpListProvider::new(url.clone(), Arc::clone(&fetcher))),
        None => Arc::new(StaticListProvider::stub()),
    };
    let source: Arc<dyn ImageSource> =
        Arc::new(HttpImageSource::new(config.image_base_url.as_str(), fetcher));
    Ok(Sources {
        provider,
        source,
        cache,
    })
}

async fn open_offline_cache(config: &GalleryConfig, network: Arc<dyn Fetcher>) -> Result<OfflineCache> {
    let store = match &config.db_path {
        Some(path) => ResponseStore::open(path)
            .with_context(|| format!("Failed to open offline cache at {:?}", path))?,
        None => ResponseStore::open_default()?,
    };
    let cache = OfflineCache::new(&config.cache_name, store, network);

    // The app keeps working without its precached shell
    if let Err(e) = cache.install(&config.origin, DEFAULT_PRECACHE).await {
        warn!(error = %e, "Offline cache install failed");
    }
    cache.activate().context("Failed to activate offline cache")?;
    Ok(cache)
}

#[derive(Serialize)]
struct ReportItem {
    index: usize,
    #[serde(rename = "ref")]
    image: String,
    column: usize,
    natural_width: u32,
    natural_height: u32,
    fallback: bool,
    #[serde(flatten)]
    position: LayoutBox,
}

/// Offline cache counters for this run plus the store totals.
#[derive(Serialize)]
struct OfflineReport {
    cache_name: String,
    hits: u64,
    misses: u64,
    stored: u64,
    bypassed: u64,
    responses: i64,
    body_bytes: i64,
}

impl OfflineReport {
    fn from_cache(cache: &OfflineCache) -> Result<Self> {
        let session = cache.stats();
        let store = cache
            .store_stats()
            .context("Failed to read offline cache statistics")?;
        Ok(Self {
            cache_name: cache.name().to_string(),
            hits: session.hits,
            misses: session.misses,
            stored: session.stored,
            bypassed: session.bypassed,
            responses: store.response_count,
            body_bytes: store.body_bytes,
        })
    }
}

#[derive(Serialize)]
struct Report {
    status: &'static str,
    message: Option<String>,
    generation: u64,
    total: usize,
    shown: usize,
    complete: bool,
    container_width: f64,
    column_count: usize,
    column_width: f64,
    total_height: f64,
    items: Vec<ReportItem>,
    lightbox: Option<LightboxView>,
    offline: Option<OfflineReport>,
}

impl Report {
    fn from_gallery(gallery: &Gallery, offline: Option<OfflineReport>) -> Self {
        let status = gallery.status();
        let layout = gallery.layout().unwrap_or_default();
        let dimensions = gallery.visible_dimensions().unwrap_or_default();
        let reveal = gallery.reveal();

        let items = layout
            .boxes
            .iter()
            .zip(&layout.columns)
            .zip(&dimensions)
            .enumerate()
            .map(|(index, ((position, column), dims))| ReportItem {
                index,
                image: dims.image.to_string(),
                column: *column,
                natural_width: dims.width(),
                natural_height: dims.height(),
                fallback: dims.fallback,
                position: *position,
            })
            .collect();

        Self {
            status: match status {
                Status::Loading => "loading",
                Status::Error(_) => "error",
                Status::Empty => "empty",
                Status::Ready => "ready",
            },
            message: status.message().map(str::to_owned),
            generation: gallery.generation().get(),
            total: reveal.total(),
            shown: reveal.count(),
            complete: reveal.is_complete(),
            container_width: gallery.container_width(),
            column_count: layout.column_count,
            column_width: layout.column_width,
            total_height: layout.total_height,
            items,
            lightbox: gallery.lightbox().view(),
            offline,
        }
    }

    fn print(&self) {
        if let Some(msg) = &self.message {
            println!("{}", msg);
        }
        for item in &self.items {
            println!(
                "index={} ref={:?} col={} size={}x{} top={:.2} left={:.2} width={:.2} height={:.2}{}",
                item.index,
                item.image,
                item.column,
                item.natural_width,
                item.natural_height,
                item.position.top,
                item.position.left,
                item.position.width,
                item.position.height,
                if item.fallback { " fallback" } else { "" },
            );
        }
        println!(
            "status={} shown={}/{}{} columns={} column_width={:.2} total_height={:.2}",
            self.status,
            self.shown,
            self.total,
            if self.complete { "" } else { " more" },
            self.column_count,
            self.column_width,
            self.total_height,
        );
        if let Some(view) = &self.lightbox {
            println!(
                "lightbox index={} alt={:?} url={} prev={} next={} preload={:?}",
                view.index, view.alt, view.url, view.has_prev, view.has_next, view.preload,
            );
        }
        if let Some(offline) = &self.offline {
            println!(
                "offline cache={} hits={} misses={} stored={} bypassed={} responses={} bytes={}",
                offline.cache_name,
                offline.hits,
                offline.misses,
                offline.stored,
                offline.bypassed,
                offline.responses,
                offline.body_bytes,
            );
        }
    }
}

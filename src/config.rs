//! Command-line configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::layout::masonry::DEFAULT_GUTTER;
use crate::offline::DEFAULT_CACHE_NAME;
use crate::resolver::DEFAULT_LOAD_TIMEOUT;
use crate::reveal::{DEFAULT_BATCH_SIZE, DEFAULT_INITIAL_BATCH};

pub const DEFAULT_IMAGE_BASE_URL: &str = "http://localhost:3002/images/";
pub const DEFAULT_ORIGIN: &str = "http://localhost:5173/";
pub const DEFAULT_CONTAINER_WIDTH: f64 = 1280.0;

pub const USAGE: &str = "\
Usage: galerie [OPTIONS]

Options:
  --width <px>            Container width (default 1280)
  --reveal-steps <n>      Extra batches to reveal after the first one
  --initial-batch <n>     Images shown initially (default 20)
  --batch-size <n>        Images added per reveal (default 20)
  --gutter <px>           Gap between columns and rows (default 16)
  --list-url <url>        Fetch the listing as a JSON array from this URL
  --image-dir <path>      List and load images from a local directory
  --follow-symlinks       Descend into symlinked directories under --image-dir
  --base-url <url>        Prefix for image URLs
  --origin <url>          App origin for precached assets
  --cache-name <name>     Offline cache generation name
  --db-path <path>        Offline cache database location
  --no-offline            Skip the offline cache
  --timeout-ms <ms>       Per-image load timeout (default 10000)
  --open <index>          Print lightbox state for this listing index
  --keys <k1,k2,..>       Key presses sent to the open lightbox
  --json                  Print a JSON document instead of text
  -h, --help              Print this help";

#[derive(Debug, Clone)]
pub struct GalleryConfig {
    pub container_width: f64,
    pub reveal_steps: usize,
    pub initial_batch: usize,
    pub batch_size: usize,
    pub gutter: f64,
    pub list_url: Option<Url>,
    pub image_dir: Option<PathBuf>,
    pub follow_symlinks: bool,
    pub image_base_url: String,
    pub origin: Url,
    pub cache_name: String,
    pub db_path: Option<PathBuf>,
    pub offline: bool,
    pub load_timeout: Duration,
    pub open: Option<usize>,
    pub keys: Vec<String>,
    pub json: bool,
    pub help: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            container_width: DEFAULT_CONTAINER_WIDTH,
            reveal_steps: 0,
            initial_batch: DEFAULT_INITIAL_BATCH,
            batch_size: DEFAULT_BATCH_SIZE,
            gutter: DEFAULT_GUTTER,
            list_url: None,
            image_dir: None,
            follow_symlinks: false,
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            origin: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid url"),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            db_path: None,
            offline: true,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            open: None,
            keys: Vec::new(),
            json: false,
            help: false,
        }
    }
}

impl GalleryConfig {
    pub fn from_env() -> Result<Self> {
        Self::parse_args(env::args().skip(1))
    }

    pub fn parse_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--width" => {
                    let value = args.next().context("Missing value for --width")?;
                    config.container_width = value
                        .parse::<f64>()
                        .context("Failed to parse --width as a number")?;
                }
                "--reveal-steps" => {
                    let value = args.next().context("Missing value for --reveal-steps")?;
                    config.reveal_steps = value
                        .parse::<usize>()
                        .context("Failed to parse --reveal-steps as a non-negative integer")?;
                }
                "--initial-batch" => {
                    let value = args.next().context("Missing value for --initial-batch")?;
                    config.initial_batch = value
                        .parse::<usize>()
                        .context("Failed to parse --initial-batch as a non-negative integer")?;
                }
                "--batch-size" => {
                    let value = args.next().context("Missing value for --batch-size")?;
                    config.batch_size = value
                        .parse::<usize>()
                        .context("Failed to parse --batch-size as a positive integer")?;
                }
                "--gutter" => {
                    let value = args.next().context("Missing value for --gutter")?;
                    config.gutter = value
                        .parse::<f64>()
                        .context("Failed to parse --gutter as a number")?;
                }
                "--list-url" => {
                    let value = args.next().context("Missing value for --list-url")?;
                    config.list_url =
                        Some(Url::parse(&value).context("Failed to parse --list-url")?);
                }
                "--image-dir" => {
                    let value = args.next().context("Missing value for --image-dir")?;
                    config.image_dir = Some(PathBuf::from(value));
                }
                "--follow-symlinks" => config.follow_symlinks = true,
                "--base-url" => {
                    config.image_base_url =
                        args.next().context("Missing value for --base-url")?;
                }
                "--origin" => {
                    let value = args.next().context("Missing value for --origin")?;
                    config.origin = Url::parse(&value).context("Failed to parse --origin")?;
                }
                "--cache-name" => {
                    config.cache_name = args.next().context("Missing value for --cache-name")?;
                }
                "--db-path" => {
                    let value = args.next().context("Missing value for --db-path")?;
                    config.db_path = Some(PathBuf::from(value));
                }
                "--no-offline" => config.offline = false,
                "--timeout-ms" => {
                    let value = args.next().context("Missing value for --timeout-ms")?;
                    let ms = value
                        .parse::<u64>()
                        .context("Failed to parse --timeout-ms as a positive integer")?;
                    config.load_timeout = Duration::from_millis(ms);
                }
                "--open" => {
                    let value = args.next().context("Missing value for --open")?;
                    config.open = Some(
                        value
                            .parse::<usize>()
                            .context("Failed to parse --open as an image index")?,
                    );
                }
                "--keys" => {
                    let value = args.next().context("Missing value for --keys")?;
                    config.keys = value
                        .split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_owned)
                        .collect();
                }
                "--json" => config.json = true,
                "-h" | "--help" => config.help = true,
                other => bail!("Unknown argument: {}", other),
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.container_width.is_finite() || self.container_width < 0.0 {
            bail!("--width must be a non-negative number");
        }
        if !self.gutter.is_finite() || self.gutter < 0.0 {
            bail!("--gutter must be a non-negative number");
        }
        if self.batch_size == 0 {
            bail!("--batch-size must be >= 1");
        }
        if self.load_timeout.is_zero() {
            bail!("--timeout-ms must be >= 1");
        }
        if self.cache_name.trim().is_empty() {
            bail!("--cache-name must not be empty");
        }
        if !self.keys.is_empty() && self.open.is_none() {
            bail!("--keys requires --open");
        }
        if self.list_url.is_some() && self.image_dir.is_some() {
            bail!("--list-url and --image-dir are mutually exclusive");
        }
        if self.follow_symlinks && self.image_dir.is_none() {
            bail!("--follow-symlinks requires --image-dir");
        }
        Ok(())
    }
}

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::task;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::{ImageListProvider, ImageSource};
use crate::error::{DimensionError, ListFetchError};
use crate::models::ImageRef;

/// File extensions recognised as images.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff",
];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lists the image files under a local directory, sorted by path.
///
/// Refs are paths relative to the root, with `/` separators.
#[derive(Debug, Clone)]
pub struct DirectoryListProvider {
    root: PathBuf,
    follow_symlinks: bool,
}

impl DirectoryListProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
        }
    }

    /// Descend into symlinked directories. Off by default.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    fn discover(root: &Path, follow_symlinks: bool) -> Result<Vec<ImageRef>, ListFetchError> {
        if !root.is_dir() {
            return Err(ListFetchError::Io(format!("{:?} is not a directory", root)));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(follow_symlinks) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_dir() || !is_image(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                paths.push(relative.to_path_buf());
            }
        }

        // Sort by path for consistent ordering
        paths.sort();

        Ok(paths
            .iter()
            .map(|p| {
                let parts: Vec<String> = p
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                ImageRef::from(parts.join("/"))
            })
            .collect())
    }
}

impl ImageListProvider for DirectoryListProvider {
    fn fetch_list(&self) -> BoxFuture<'_, Result<Vec<ImageRef>, ListFetchError>> {
        Box::pin(async move {
            let root = self.root.clone();
            let follow = self.follow_symlinks;
            let list = task::spawn_blocking(move || Self::discover(&root, follow))
                .await
                .map_err(|e| ListFetchError::Io(format!("scan task panicked: {}", e)))??;
            info!("Discovered {} images in {:?}", list.len(), self.root);
            Ok(list)
        })
    }
}

/// Reads image bytes from `root/ref`.
#[derive(Debug, Clone)]
pub struct DirectoryImageSource {
    root: PathBuf,
}

impl DirectoryImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSource for DirectoryImageSource {
    fn load<'a>(&'a self, image: &'a ImageRef) -> BoxFuture<'a, Result<Bytes, DimensionError>> {
        Box::pin(async move {
            let path = self.root.join(image.as_str());
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| DimensionError::Load {
                    image: image.to_string(),
                    reason: e.to_string(),
                })?;
            Ok(Bytes::from(bytes))
        })
    }

    fn locate(&self, image: &ImageRef) -> String {
        self.root.join(image.as_str()).display().to_string()
    }
}

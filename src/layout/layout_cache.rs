use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::trace;
use xxhash_rust::xxh3::xxh3_64;

use crate::layout::{MasonryLayout, MasonryResult};
use crate::models::{Dimensions, ImageDimensions};

/// Maximum number of cached layouts to keep in memory.
const MAX_CACHE_ENTRIES: usize = 8;

/// Key for the layout cache, combining the exact container width and list hash.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    width_bits: u64,
    list_hash: u64,
}

impl CacheKey {
    fn new(container_width: f64, list_hash: u64) -> Self {
        Self {
            width_bits: container_width.to_bits(),
            list_hash,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedLayout {
    result: MasonryResult,
    /// Number of images this layout was computed for
    item_count: usize,
    /// Timestamp of when this cache entry was last used (for LRU eviction)
    last_used: Instant,
}

/// Layout cache keyed by (container width, list hash).
///
/// Widths are not bucketed: the masonry output depends on the exact width and
/// a hit must be indistinguishable from a fresh computation.
///
/// The list hash covers (ref + width + height) for every image in display
/// order, so a new listing, a newly revealed batch, or a changed size all miss.
pub struct LayoutCache {
    cache: RwLock<HashMap<CacheKey, CachedLayout>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::with_capacity(MAX_CACHE_ENTRIES)),
        }
    }

    /// Computes a fast hash of the ordered image list.
    pub fn compute_list_hash(images: &[ImageDimensions]) -> u64 {
        let mut hasher_input = Vec::with_capacity(images.len() * 48);

        for image in images {
            hasher_input.extend_from_slice(image.image.as_str().as_bytes());
            // Separator so "ab"+"c" and "a"+"bc" hash differently
            hasher_input.push(0);
            hasher_input.extend_from_slice(&image.size.width.to_le_bytes());
            hasher_input.extend_from_slice(&image.size.height.to_le_bytes());
        }

        xxh3_64(&hasher_input)
    }

    /// Returns the cached layout, if present and computed for `item_count` images.
    pub fn get(&self, container_width: f64, list_hash: u64, item_count: usize) -> Option<MasonryResult> {
        let key = CacheKey::new(container_width, list_hash);
        let mut cache = self.cache.write();
        let entry = cache.get_mut(&key)?;
        if entry.item_count != item_count {
            return None;
        }
        entry.last_used = Instant::now();
        Some(entry.result.clone())
    }

    /// Stores a layout in the cache.
    pub fn set(&self, container_width: f64, list_hash: u64, result: MasonryResult, item_count: usize) {
        let key = CacheKey::new(container_width, list_hash);
        let entry = CachedLayout {
            result,
            item_count,
            last_used: Instant::now(),
        };

        let mut cache = self.cache.write();

        // Evict oldest entry if at capacity
        if cache.len() >= MAX_CACHE_ENTRIES && !cache.contains_key(&key) {
            Self::evict_oldest(&mut cache);
        }

        cache.insert(key, entry);
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    fn evict_oldest(cache: &mut HashMap<CacheKey, CachedLayout>) {
        let oldest_key = cache
            .iter()
            .min_by_key(|(_, v)| v.last_used)
            .map(|(k, _)| k.clone());

        if let Some(key) = oldest_key {
            cache.remove(&key);
        }
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines layout computation with caching.
pub struct CachedLayoutComputer {
    pub layout: MasonryLayout,
    pub cache: LayoutCache,
}

impl CachedLayoutComputer {
    pub fn new() -> Self {
        Self::with_layout(MasonryLayout::default())
    }

    pub fn with_layout(layout: MasonryLayout) -> Self {
        Self {
            layout,
            cache: LayoutCache::new(),
        }
    }

    /// Computes the layout, using a cached result if available.
    pub fn compute(&self, images: &[ImageDimensions], container_width: f64) -> MasonryResult {
        if images.is_empty() || !container_width.is_finite() || container_width <= 0.0 {
            return self.layout.compute(&[], container_width);
        }

        let list_hash = LayoutCache::compute_list_hash(images);
        if let Some(result) = self.cache.get(container_width, list_hash, images.len()) {
            trace!(container_width, images = images.len(), "Layout cache hit");
            return result;
        }

        let sizes: Vec<Dimensions> = images.iter().map(|i| i.size).collect();
        let result = self.layout.compute(&sizes, container_width);
        self.cache
            .set(container_width, list_hash, result.clone(), images.len());
        result
    }

    /// Drops every cached layout; called when a new image list arrives.
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl Default for CachedLayoutComputer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageRef;

    fn make_image(id: &str, width: u32, height: u32) -> ImageDimensions {
        ImageDimensions::measured(ImageRef::from(id), width, height)
    }

    fn make_images(count: usize) -> Vec<ImageDimensions> {
        (0..count)
            .map(|i| make_image(&format!("{}.png", i), 400 + i as u32 * 10, 300 + i as u32 * 25))
            .collect()
    }

    #[test]
    fn test_list_hash_consistency() {
        let images = make_images(5);
        assert_eq!(
            LayoutCache::compute_list_hash(&images),
            LayoutCache::compute_list_hash(&images)
        );
    }

    #[test]
    fn test_list_hash_changes_on_order() {
        let a = vec![make_image("a.png", 100, 100), make_image("b.png", 200, 200)];
        let b = vec![make_image("b.png", 200, 200), make_image("a.png", 100, 100)];
        assert_ne!(
            LayoutCache::compute_list_hash(&a),
            LayoutCache::compute_list_hash(&b)
        );
    }

    #[test]
    fn test_list_hash_changes_on_dimensions() {
        let a = vec![make_image("a.png", 100, 100)];
        let b = vec![make_image("a.png", 100, 101)];
        assert_ne!(
            LayoutCache::compute_list_hash(&a),
            LayoutCache::compute_list_hash(&b)
        );
    }

    #[test]
    fn test_cache_miss_then_hit() {
        let cache = LayoutCache::new();
        let layout = MasonryLayout::default();
        let sizes = vec![Dimensions::new(400, 400)];
        let result = layout.compute(&sizes, 1000.0);

        assert!(cache.get(1000.0, 42, 1).is_none());
        cache.set(1000.0, 42, result.clone(), 1);
        assert_eq!(cache.get(1000.0, 42, 1), Some(result));
        // Item count mismatch is a miss
        assert!(cache.get(1000.0, 42, 2).is_none());
        // Different width is a miss
        assert!(cache.get(1000.5, 42, 1).is_none());
    }

    #[test]
    fn test_cache_eviction() {
        let cache = LayoutCache::new();
        let result = MasonryLayout::default().compute(&[Dimensions::new(1, 1)], 500.0);

        for i in 0..(MAX_CACHE_ENTRIES + 5) {
            cache.set(500.0 + i as f64, i as u64, result.clone(), 1);
        }

        assert!(cache.len() <= MAX_CACHE_ENTRIES);
    }

    #[test]
    fn test_cached_computer_matches_direct_layout() {
        let computer = CachedLayoutComputer::new();
        let images = make_images(12);
        let sizes: Vec<Dimensions> = images.iter().map(|i| i.size).collect();

        let direct = computer.layout.compute(&sizes, 1440.0);
        let first = computer.compute(&images, 1440.0);
        let second = computer.compute(&images, 1440.0);

        assert_eq!(first, direct);
        assert_eq!(second, direct);
        assert_eq!(computer.cache.len(), 1);
    }

    #[test]
    fn test_invalidate_and_degenerate_input() {
        let computer = CachedLayoutComputer::new();
        let images = make_images(3);
        computer.compute(&images, 800.0);
        assert!(!computer.cache.is_empty());

        computer.invalidate();
        assert!(computer.cache.is_empty());

        assert!(computer.compute(&[], 800.0).is_empty());
        assert!(computer.compute(&images, 0.0).is_empty());
        assert!(computer.compute(&images, f64::NAN).is_empty());
        assert!(computer.cache.is_empty());
    }
}

use std::fmt;

use serde::Serialize;

/// Width substituted when an image's dimensions cannot be discovered.
pub const FALLBACK_WIDTH: u32 = 400;
/// Height substituted when an image's dimensions cannot be discovered.
pub const FALLBACK_HEIGHT: u32 = 400;

/// Opaque identifier of an image within a listing.
///
/// Identifiers are unique within one listing and their order in the listing
/// is the canonical display order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ImageRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Intrinsic pixel size of an image. Both sides are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const FALLBACK: Self = Self {
        width: FALLBACK_WIDTH,
        height: FALLBACK_HEIGHT,
    };

    /// Creates a size, substituting the fallback if either side is zero.
    pub fn new(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            Self::FALLBACK
        } else {
            Self { width, height }
        }
    }
}

/// Discovered (or substituted) dimensions of one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDimensions {
    pub image: ImageRef,
    pub size: Dimensions,
    /// True when `size` is the fallback rather than a measurement.
    pub fallback: bool,
}

impl ImageDimensions {
    /// Create a record from measured dimensions.
    ///
    /// A zero-sized measurement is recorded as a fallback.
    pub fn measured(image: ImageRef, width: u32, height: u32) -> Self {
        let fallback = width == 0 || height == 0;
        Self {
            image,
            size: Dimensions::new(width, height),
            fallback,
        }
    }

    /// Create a record carrying the fallback size.
    pub fn fallback(image: ImageRef) -> Self {
        Self {
            image,
            size: Dimensions::FALLBACK,
            fallback: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }
}

/// Version tag of one full image-list replacement.
///
/// Every asynchronous result carries the generation it was requested for;
/// results from an older generation are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sized_measurement_falls_back() {
        let dims = ImageDimensions::measured(ImageRef::from("broken.png"), 0, 300);
        assert!(dims.fallback);
        assert_eq!(dims.size, Dimensions::FALLBACK);

        let dims = ImageDimensions::measured(ImageRef::from("ok.png"), 640, 480);
        assert!(!dims.fallback);
        assert_eq!((dims.width(), dims.height()), (640, 480));
    }

    #[test]
    fn test_fallback_is_400_square() {
        let dims = ImageDimensions::fallback(ImageRef::from("missing.png"));
        assert_eq!(dims.width(), 400);
        assert_eq!(dims.height(), 400);
    }

    #[test]
    fn test_generation_ordering() {
        let first = Generation::default();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.get(), 1);
        assert_eq!(second.to_string(), "gen-1");
    }
}

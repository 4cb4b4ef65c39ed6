use serde::Serialize;

/// Absolute position of one image relative to the gallery container's
/// top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutBox {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutBox {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

use serde::Serialize;

use crate::models::{Dimensions, LayoutBox};

/// Default gap between columns and between stacked images, in pixels.
pub const DEFAULT_GUTTER: f64 = 16.0;

/// One entry of the breakpoint table: containers narrower than `below`
/// get `columns` columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub below: f64,
    pub columns: usize,
}

/// Configuration for the masonry layout algorithm.
///
/// Images keep their aspect ratio and are fitted to a fixed column width;
/// each image goes to the currently shortest column.
#[derive(Debug, Clone)]
pub struct MasonryLayout {
    /// Gap between columns and between images in a column (default: 16)
    pub gutter: f64,
    /// Ascending width thresholds (default: 640/768/1024/1280)
    pub breakpoints: Vec<Breakpoint>,
    /// Column count for containers at least as wide as the last threshold (default: 6)
    pub max_columns: usize,
}

impl Default for MasonryLayout {
    fn default() -> Self {
        Self {
            gutter: DEFAULT_GUTTER,
            breakpoints: vec![
                Breakpoint {
                    below: 640.0,
                    columns: 2,
                },
                Breakpoint {
                    below: 768.0,
                    columns: 3,
                },
                Breakpoint {
                    below: 1024.0,
                    columns: 4,
                },
                Breakpoint {
                    below: 1280.0,
                    columns: 5,
                },
            ],
            max_columns: 6,
        }
    }
}

/// Result of one layout pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MasonryResult {
    /// One box per input image, index-aligned with the input.
    pub boxes: Vec<LayoutBox>,
    /// Column each box was placed in.
    pub columns: Vec<usize>,
    pub column_count: usize,
    pub column_width: f64,
    /// Height of the container needed to hold every box.
    pub total_height: f64,
}

impl MasonryResult {
    fn empty(column_count: usize) -> Self {
        Self {
            boxes: Vec::new(),
            columns: Vec::new(),
            column_count,
            column_width: 0.0,
            total_height: 0.0,
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }
}

impl MasonryLayout {
    /// Creates a layout with a custom gutter and the default breakpoints.
    pub fn with_gutter(gutter: f64) -> Self {
        Self {
            gutter: gutter.max(0.0),
            ..Self::default()
        }
    }

    /// Returns the column count for a container width.
    pub fn column_count(&self, container_width: f64) -> usize {
        self.breakpoints
            .iter()
            .find(|bp| container_width < bp.below)
            .map(|bp| bp.columns)
            .unwrap_or(self.max_columns)
            .max(1)
    }

    /// Width of a single column for the given container width and column count.
    pub fn column_width(&self, container_width: f64, column_count: usize) -> f64 {
        let gaps = self.gutter * column_count.saturating_sub(1) as f64;
        (container_width - gaps) / column_count as f64
    }

    /// Computes the masonry layout for images in display order.
    ///
    /// # Algorithm
    /// 1. Pick the column count from the breakpoint table.
    /// 2. Scale each image to the column width, preserving aspect ratio.
    /// 3. Place it in the shortest column (lowest index on ties).
    /// 4. Advance that column by the image height plus the gutter.
    ///
    /// No images, or a container too narrow to leave a positive column width
    /// (including zero and non-finite widths), yields an empty layout.
    pub fn compute(&self, images: &[Dimensions], container_width: f64) -> MasonryResult {
        let column_count = self.column_count(container_width);
        if images.is_empty() || !container_width.is_finite() || container_width <= 0.0 {
            return MasonryResult::empty(column_count);
        }

        let column_width = self.column_width(container_width, column_count);
        if column_width <= 0.0 {
            return MasonryResult::empty(column_count);
        }
        let mut heights = vec![0.0f64; column_count];
        let mut boxes = Vec::with_capacity(images.len());
        let mut columns = Vec::with_capacity(images.len());
        let mut total_height = 0.0f64;

        for size in images {
            // Guard against hand-built sizes that bypassed `Dimensions::new`.
            let size = Dimensions::new(size.width, size.height);
            let height = size.height as f64 * (column_width / size.width as f64);

            let col = shortest_column(&heights);
            let top = heights[col];
            let left = col as f64 * (column_width + self.gutter);

            let placed = LayoutBox::new(top, left, column_width, height);
            total_height = total_height.max(placed.bottom());
            heights[col] = top + height + self.gutter;

            boxes.push(placed);
            columns.push(col);
        }

        MasonryResult {
            boxes,
            columns,
            column_count,
            column_width,
            total_height,
        }
    }
}

/// Index of the minimum accumulated height; the first one wins ties.
fn shortest_column(heights: &[f64]) -> usize {
    let mut best = 0;
    for (idx, h) in heights.iter().enumerate().skip(1) {
        if *h < heights[best] {
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_items() {
        let layout = MasonryLayout::default();
        let result = layout.compute(&[], 1920.0);
        assert!(result.is_empty());
        assert_eq!(result.total_height, 0.0);
    }

    #[test]
    fn test_zero_width_container() {
        let layout = MasonryLayout::default();
        let result = layout.compute(&[size(400, 400)], 0.0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_container_narrower_than_gutters() {
        let layout = MasonryLayout::default();
        // Two columns need one 16px gutter; 10px leaves a negative column width
        let result = layout.compute(&[size(100, 1000); 3], 10.0);
        assert!(result.is_empty());
        assert_eq!(result.total_height, 0.0);

        // Exactly the gutter leaves zero-width columns
        assert!(layout.compute(&[size(100, 100)], 16.0).is_empty());
        assert_eq!(layout.compute(&[size(100, 100)], 17.0).len(), 1);
    }

    #[test]
    fn test_non_finite_container_width() {
        let layout = MasonryLayout::default();
        for width in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = layout.compute(&[size(400, 400)], width);
            assert!(result.is_empty(), "width {} should be degenerate", width);
            assert!(result.total_height.is_finite());
        }
    }

    #[test]
    fn test_column_count_breakpoints() {
        let layout = MasonryLayout::default();
        let widths = [
            0.0, 639.0, 640.0, 767.0, 768.0, 1023.0, 1024.0, 1279.0, 1280.0, 2000.0,
        ];
        let counts: Vec<usize> = widths.iter().map(|w| layout.column_count(*w)).collect();
        assert_eq!(counts, vec![2, 2, 3, 3, 4, 4, 5, 5, 6, 6]);
    }

    #[test]
    fn test_deterministic() {
        let layout = MasonryLayout::default();
        let items: Vec<Dimensions> = (0..50)
            .map(|i| size(300 + (i * 37) % 500, 200 + (i * 53) % 900))
            .collect();

        let first = layout.compute(&items, 1133.0);
        let second = layout.compute(&items, 1133.0);
        assert_eq!(first, second);
        for (a, b) in first.boxes.iter().zip(second.boxes.iter()) {
            assert_eq!(a.top.to_bits(), b.top.to_bits());
            assert_eq!(a.height.to_bits(), b.height.to_bits());
        }
    }

    fn five_columns() -> MasonryLayout {
        MasonryLayout {
            breakpoints: Vec::new(),
            max_columns: 5,
            ..MasonryLayout::default()
        }
    }

    fn example_items() -> Vec<Dimensions> {
        vec![
            size(400, 400),
            size(400, 800),
            size(400, 200),
            size(400, 400),
            size(400, 400),
            size(400, 400),
        ]
    }

    #[test]
    fn test_1000px_uses_four_columns() {
        let layout = MasonryLayout::default();
        let result = layout.compute(&example_items(), 1000.0);

        assert_eq!(result.column_count, 4);
        assert!(approx(result.column_width, 238.0));
        // Columns 0..3 fill up first; then column 2 (119 + 16) is shortest,
        // then columns 0 and 3 tie at 254 and the lower index wins.
        assert_eq!(result.columns, vec![0, 1, 2, 3, 2, 0]);
        assert!(approx(result.boxes[4].top, 119.0 + 16.0));
        assert!(approx(result.boxes[5].top, 238.0 + 16.0));
        assert!(approx(result.total_height, 238.0 + 16.0 + 238.0));
    }

    #[test]
    fn test_five_column_arithmetic() {
        let result = five_columns().compute(&example_items(), 1000.0);

        assert_eq!(result.column_count, 5);
        assert!(approx(result.column_width, 187.2));
        assert_eq!(result.columns, vec![0, 1, 2, 3, 4, 2]);

        assert!(approx(result.boxes[0].height, 187.2));
        assert!(approx(result.boxes[1].height, 374.4));
        assert!(approx(result.boxes[2].height, 93.6));
        assert!(approx(result.boxes[3].top, 0.0));
        assert!(approx(result.boxes[3].left, 3.0 * (187.2 + 16.0)));
        assert!(approx(result.boxes[4].left, 4.0 * (187.2 + 16.0)));
        assert!(approx(result.boxes[5].top, 93.6 + 16.0));
        assert!(approx(result.total_height, 374.4));
    }

    #[test]
    fn test_tied_empty_columns_prefer_lowest_index() {
        let layout = five_columns();
        let items = &example_items()[..4];
        let result = layout.compute(items, 1000.0);
        assert_eq!(result.columns, vec![0, 1, 2, 3]);

        // Column 4 is the only empty one left
        let result = layout.compute(&example_items()[..5], 1000.0);
        assert_eq!(result.columns[4], 4);

        // All empty: every tie resolves to column 0 first
        let result = layout.compute(&[size(10, 10)], 1000.0);
        assert_eq!(result.columns, vec![0]);
    }

    #[test]
    fn test_columns_stack_with_gutter() {
        let layout = MasonryLayout::default();
        let items: Vec<Dimensions> = (0..40)
            .map(|i| size(200 + (i * 71) % 600, 150 + (i * 97) % 1000))
            .collect();
        let result = layout.compute(&items, 1500.0);

        for col in 0..result.column_count {
            let stacked: Vec<&LayoutBox> = result
                .boxes
                .iter()
                .zip(result.columns.iter())
                .filter(|(_, c)| **c == col)
                .map(|(b, _)| b)
                .collect();

            let mut expected_top = 0.0;
            for b in stacked {
                assert!(approx(b.top, expected_top), "column {} misaligned", col);
                assert!(approx(b.left, col as f64 * (result.column_width + layout.gutter)));
                expected_top = b.top + b.height + layout.gutter;
            }
        }
    }

    #[test]
    fn test_greedy_choice_is_minimal() {
        let layout = MasonryLayout::default();
        let items: Vec<Dimensions> = (0..30)
            .map(|i| size(100 + (i * 13) % 400, 100 + (i * 29) % 700))
            .collect();
        let result = layout.compute(&items, 900.0);

        let mut heights = vec![0.0f64; result.column_count];
        for (b, col) in result.boxes.iter().zip(result.columns.iter()) {
            for h in &heights {
                assert!(heights[*col] <= *h);
            }
            let first_min = heights
                .iter()
                .position(|h| approx(*h, heights[*col]))
                .unwrap();
            assert_eq!(first_min, *col);
            heights[*col] = b.top + b.height + layout.gutter;
        }
    }

    #[test]
    fn test_zero_width_image_uses_fallback() {
        let layout = MasonryLayout::default();
        let result = layout.compute(&[size(0, 500)], 1000.0);
        assert_eq!(result.len(), 1);
        // Fallback is square, so height equals the column width.
        assert!(approx(result.boxes[0].height, result.column_width));
        assert!(result.boxes[0].height.is_finite());
    }

    #[test]
    fn test_custom_gutter() {
        let layout = MasonryLayout::with_gutter(0.0);
        let result = layout.compute(&[size(100, 100), size(100, 100), size(100, 100)], 600.0);
        assert!(approx(result.column_width, 300.0));
        assert!(approx(result.boxes[2].top, 300.0));
        assert_eq!(result.columns, vec![0, 1, 0]);
    }
}

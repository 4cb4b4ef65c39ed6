pub mod image;
pub mod layout_box;

pub use image::*;
pub use layout_box::*;

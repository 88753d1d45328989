//! Shared test helpers: a byte-level image builder and factories for damaged images.

mod image;

pub use factories::*;
pub use image::*;

//! # Imaging
//!
//! Remote image loading with a bounded in-memory cache and in-flight fetch
//! deduplication.

pub mod bounded_cache;
pub mod image_loader;

pub use bounded_cache::{BoundedCache, DEFAULT_COST_LIMIT, DEFAULT_COUNT_LIMIT};
pub use image_loader::{DecodedImage, ImageLoader};

//! Image processing: the transform engine.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Normalize upload** | decode, drop alpha, JPEG encode |
//! | **Transform** | rotate / flip / grayscale / brightness |
//! | **Thumbnail** | bounded by the longest edge, aspect preserved |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and pixel math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions producing a [`Rendition`]
//!
//! Nothing here knows about versions, namespaces or the ledger.

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::calculate_thumbnail_bounds;
pub use operations::{Rendition, apply_transformation, encode_original};
pub use params::{
    Quality, RenditionConfig, ThumbnailParams, TransformParams, Transformation,
    UnknownTransformation,
};
pub use rust_backend::{OUTPUT_EXTENSION, RustBackend};

//! High-level image operations.
//!
//! These functions combine calculations with backend execution. Each one
//! yields a [`Rendition`]: the processed image plus its thumbnail, both
//! encoded and ready to be handed to the artifact store. The thumbnail is
//! always derived from the processed bytes so the two never disagree.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_thumbnail_bounds;
use super::params::{RenditionConfig, ThumbnailParams, TransformParams, Transformation};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// The pair of derived files stored for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub processed: Vec<u8>,
    pub thumbnail: Vec<u8>,
}

/// Plan a thumbnail for already-encoded bytes without producing it.
pub fn plan_thumbnail(
    backend: &impl ImageBackend,
    processed: &[u8],
    config: &RenditionConfig,
) -> Result<ThumbnailParams> {
    let dims = backend.identify(processed)?;
    let (width, height) =
        calculate_thumbnail_bounds((dims.width, dims.height), config.thumbnail_max_edge);
    Ok(ThumbnailParams {
        width,
        height,
        quality: config.quality,
    })
}

fn with_thumbnail(
    backend: &impl ImageBackend,
    processed: Vec<u8>,
    config: &RenditionConfig,
) -> Result<Rendition> {
    let params = plan_thumbnail(backend, &processed, config)?;
    let thumbnail = backend.thumbnail(&processed, &params)?;
    Ok(Rendition {
        processed,
        thumbnail,
    })
}

/// Normalize a fresh upload: opaque, canonical format, plus thumbnail.
pub fn encode_original(
    backend: &impl ImageBackend,
    raw: &[u8],
    config: &RenditionConfig,
) -> Result<Rendition> {
    let processed = backend.normalize(raw, config.quality)?;
    with_thumbnail(backend, processed, config)
}

/// Apply one transformation to a version's processed bytes.
pub fn apply_transformation(
    backend: &impl ImageBackend,
    source: &[u8],
    transformation: Transformation,
    config: &RenditionConfig,
) -> Result<Rendition> {
    let processed = backend.transform(
        source,
        &TransformParams {
            transformation,
            brightness_factor: config.brightness_factor,
            quality: config.quality,
        },
    )?;
    with_thumbnail(backend, processed, config)
}

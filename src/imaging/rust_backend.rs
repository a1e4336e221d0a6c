//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::load_from_memory` |
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Drop alpha | `DynamicImage::to_rgb8` / `to_luma8` |
//! | Rotate | `DynamicImage::rotate270` (90° counter-clockwise) |
//! | Flip | `DynamicImage::fliph` |
//! | Grayscale | `DynamicImage::to_luma8` |
//! | Brightness | per-channel multiply, see [`scale_channel`] |
//! | Thumbnail | `DynamicImage::thumbnail_exact` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::scale_channel;
use super::params::{Quality, ThumbnailParams, TransformParams, Transformation};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// File extension of every artifact the backend produces.
pub const OUTPUT_EXTENSION: &str = "jpeg";

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an image held in memory, guessing the format from its magic bytes.
fn load_image(source: &[u8]) -> Result<DynamicImage, BackendError> {
    image::load_from_memory(source).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Reduce any pixel layout to one the JPEG encoder accepts.
///
/// Color images become 8-bit RGB and grayscale images 8-bit luma; alpha is
/// discarded, and 16-bit and float samples are narrowed.
fn flatten(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => img,
        other if other.color().has_color() => DynamicImage::ImageRgb8(other.to_rgb8()),
        other => DynamicImage::ImageLuma8(other.to_luma8()),
    }
}

fn encode_jpeg(img: DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let img = flatten(img);
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.as_u8());
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(buf)
}

fn brighten(img: DynamicImage, factor: f32) -> DynamicImage {
    match flatten(img) {
        DynamicImage::ImageLuma8(mut luma) => {
            for pixel in luma.pixels_mut() {
                pixel.0[0] = scale_channel(pixel.0[0], factor);
            }
            DynamicImage::ImageLuma8(luma)
        }
        other => {
            let mut rgb = other.to_rgb8();
            for pixel in rgb.pixels_mut() {
                for channel in pixel.0.iter_mut() {
                    *channel = scale_channel(*channel, factor);
                }
            }
            DynamicImage::ImageRgb8(rgb)
        }
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(source))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }

    fn normalize(&self, source: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError> {
        let img = load_image(source)?;
        encode_jpeg(img, quality)
    }

    fn transform(&self, source: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(source)?;
        let edited = match params.transformation {
            Transformation::Rotate => img.rotate270(),
            Transformation::Flip => img.fliph(),
            Transformation::Grayscale => DynamicImage::ImageLuma8(img.to_luma8()),
            Transformation::Brightness => brighten(img, params.brightness_factor),
        };
        encode_jpeg(edited, params.quality)
    }

    fn thumbnail(&self, source: &[u8], params: &ThumbnailParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(source)?;
        let thumb = img.thumbnail_exact(params.width, params.height);
        encode_jpeg(thumb, params.quality)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ColorType, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    /// Encode a synthetic image with the given format into memory.
    pub(crate) fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    /// A PNG whose left half is red and right half is blue.
    pub(crate) fn split_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        encode(&DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).unwrap()
    }

    fn is_blue(p: Rgba<u8>) -> bool {
        p.0[2] > 200 && p.0[0] < 60
    }

    fn is_red(p: Rgba<u8>) -> bool {
        p.0[0] > 200 && p.0[2] < 60
    }

    fn transform(source: &[u8], transformation: Transformation) -> DynamicImage {
        let out = RustBackend::new()
            .transform(
                source,
                &TransformParams {
                    transformation,
                    brightness_factor: 1.5,
                    quality: Quality::new(100),
                },
            )
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        decode(&out)
    }

    #[test]
    fn identify_synthetic_png() {
        let dims = RustBackend::new().identify(&split_png(200, 150)).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_garbage_errors() {
        assert!(RustBackend::new().identify(b"not an image").is_err());
    }

    #[test]
    fn normalize_rgba_png_to_opaque_jpeg() {
        let rgba = RgbaImage::from_pixel(40, 30, Rgba([10, 200, 30, 0]));
        let png = encode(&DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let out = RustBackend::new().normalize(&png, Quality::default()).unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        let decoded = decode(&out);
        assert_eq!(decoded.dimensions(), (40, 30));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn normalize_rejects_undecodable_bytes() {
        let result = RustBackend::new().normalize(b"\x89PNG broken", Quality::default());
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn rotate_is_counter_clockwise() {
        let rotated = transform(&split_png(64, 32), Transformation::Rotate);
        assert_eq!(rotated.dimensions(), (32, 64));
        // The right (blue) half ends up on top.
        assert!(is_blue(rotated.get_pixel(16, 8)));
        assert!(is_red(rotated.get_pixel(16, 56)));
    }

    #[test]
    fn flip_mirrors_left_right() {
        let flipped = transform(&split_png(64, 32), Transformation::Flip);
        assert_eq!(flipped.dimensions(), (64, 32));
        assert!(is_blue(flipped.get_pixel(8, 16)));
        assert!(is_red(flipped.get_pixel(56, 16)));
    }

    #[test]
    fn grayscale_decodes_as_single_channel_jpeg() {
        let gray = transform(&split_png(32, 32), Transformation::Grayscale);
        assert_eq!(gray.color(), ColorType::L8);
    }

    #[test]
    fn brightness_multiplies_and_clips() {
        let img = RgbImage::from_fn(32, 32, |x, _| {
            if x < 16 { Rgb([100, 100, 100]) } else { Rgb([220, 220, 220]) }
        });
        let png = encode(&DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let bright = transform(&png, Transformation::Brightness).to_rgb8();
        let mid = bright.get_pixel(4, 16).0[0];
        let top = bright.get_pixel(28, 16).0[0];
        assert!((145..=155).contains(&mid), "expected ~150, got {mid}");
        assert!(top >= 250, "expected clipping near 255, got {top}");
    }

    #[test]
    fn transform_does_not_mutate_input() {
        let source = split_png(16, 16);
        let before = source.clone();
        transform(&source, Transformation::Brightness);
        assert_eq!(source, before);
    }

    #[test]
    fn thumbnail_exact_dimensions() {
        let out = RustBackend::new()
            .thumbnail(
                &split_png(800, 600),
                &ThumbnailParams {
                    width: 150,
                    height: 113,
                    quality: Quality::default(),
                },
            )
            .unwrap();
        assert_eq!(decode(&out).dimensions(), (150, 113));
    }
}

//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which renditions to produce) and the
//! [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 90). Clamped on construction.
//! - [`Transformation`]: The closed set of edits an image version can receive.
//! - [`RenditionConfig`]: Encoding knobs shared by every rendition: quality,
//!   thumbnail bound, brightness factor.
//! - [`TransformParams`]: One edit, fully specified for the backend.
//! - [`ThumbnailParams`]: Exact thumbnail dimensions, already computed.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality as the `u8` the JPEG encoder expects.
    pub fn as_u8(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// An edit that produces a new version from the latest one.
///
/// Parsed from the lower-case names `rotate`, `flip`, `grayscale` and
/// `brightness`. Anything else is rejected before any I/O happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transformation {
    /// 90° counter-clockwise.
    Rotate,
    /// Horizontal mirror (left-right).
    Flip,
    /// Single luminance channel.
    Grayscale,
    /// Multiply every channel by the configured factor, clipped at 255.
    Brightness,
}

impl Transformation {
    pub const ALL: [Transformation; 4] = [
        Transformation::Rotate,
        Transformation::Flip,
        Transformation::Grayscale,
        Transformation::Brightness,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Transformation::Rotate => "rotate",
            Transformation::Flip => "flip",
            Transformation::Grayscale => "grayscale",
            Transformation::Brightness => "brightness",
        }
    }

    /// Comma-separated list of every accepted name, for error messages.
    pub fn allowed_names() -> String {
        Self::ALL
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a transformation name is not in the allow-list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown transformation '{0}' (allowed: {allowed})", allowed = Transformation::allowed_names())]
pub struct UnknownTransformation(pub String);

impl FromStr for Transformation {
    type Err = UnknownTransformation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnknownTransformation(s.to_string()))
    }
}

/// Encoding settings applied to every rendition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenditionConfig {
    pub quality: Quality,
    /// Longest side of a thumbnail, in pixels.
    pub thumbnail_max_edge: u32,
    /// Multiplier used by [`Transformation::Brightness`].
    pub brightness_factor: f32,
}

impl Default for RenditionConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            thumbnail_max_edge: 150,
            brightness_factor: 1.5,
        }
    }
}

/// Parameters for a single transformation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub transformation: Transformation,
    pub brightness_factor: f32,
    pub quality: Quality,
}

/// Parameters for a thumbnail operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailParams {
    /// Final dimensions; the operations layer has already bounded them.
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four primitives every backend must
//! support: identify, normalize, transform, and thumbnail. All of them work
//! on in-memory encoded bytes and return freshly encoded bytes; a backend
//! never touches the artifact store and never keeps state between calls.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{Quality, ThumbnailParams, TransformParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be pure with respect to their inputs: the same bytes
/// and parameters always yield equivalent output, and the input slice is
/// never modified.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode arbitrary input, drop transparency, and re-encode in the
    /// canonical output format.
    fn normalize(&self, source: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError>;

    /// Apply one transformation and re-encode in the canonical format.
    fn transform(&self, source: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError>;

    /// Resize to exactly the dimensions in `params`.
    fn thumbnail(&self, source: &[u8], params: &ThumbnailParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::Transformation;
    use std::sync::Mutex;

    /// Mock backend that records operations without decoding anything.
    ///
    /// Outputs are tagged copies of the input so tests can tell which
    /// primitive produced which artifact.
    #[derive(Default)]
    pub struct MockBackend {
        pub dimensions: Option<Dimensions>,
        pub fail_decode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify { len: usize },
        Normalize { len: usize, quality: u32 },
        Transform { transformation: Transformation, quality: u32 },
        Thumbnail { width: u32, height: u32 },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::with_dimensions(Dimensions {
                width: 300,
                height: 200,
            })
        }

        pub fn with_dimensions(dims: Dimensions) -> Self {
            Self {
                dimensions: Some(dims),
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail_decode: true,
                ..Self::new()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }

        fn check(&self) -> Result<(), BackendError> {
            if self.fail_decode {
                Err(BackendError::Decode("mock decode failure".into()))
            } else {
                Ok(())
            }
        }
    }

    fn tagged(tag: &str, source: &[u8]) -> Vec<u8> {
        let mut out = tag.as_bytes().to_vec();
        out.push(b':');
        out.extend_from_slice(source);
        out
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Identify { len: source.len() });
            self.check()?;
            self.dimensions
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn normalize(&self, source: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError> {
            self.record(RecordedOp::Normalize {
                len: source.len(),
                quality: quality.value(),
            });
            self.check()?;
            Ok(tagged("normalized", source))
        }

        fn transform(
            &self,
            source: &[u8],
            params: &TransformParams,
        ) -> Result<Vec<u8>, BackendError> {
            self.record(RecordedOp::Transform {
                transformation: params.transformation,
                quality: params.quality.value(),
            });
            self.check()?;
            Ok(tagged(params.transformation.name(), source))
        }

        fn thumbnail(
            &self,
            source: &[u8],
            params: &ThumbnailParams,
        ) -> Result<Vec<u8>, BackendError> {
            self.record(RecordedOp::Thumbnail {
                width: params.width,
                height: params.height,
            });
            self.check()?;
            Ok(tagged("thumbnail", source))
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(Dimensions {
            width: 800,
            height: 600,
        });

        let result = backend.identify(b"abc").unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Identify { len: 3 }]);
    }

    #[test]
    fn mock_tags_transform_output() {
        let backend = MockBackend::new();
        let out = backend
            .transform(
                b"src",
                &TransformParams {
                    transformation: Transformation::Flip,
                    brightness_factor: 1.5,
                    quality: Quality::new(80),
                },
            )
            .unwrap();

        assert_eq!(out, b"flip:src");
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Transform {
                transformation: Transformation::Flip,
                quality: 80
            }
        ));
    }

    #[test]
    fn failing_mock_still_records() {
        let backend = MockBackend::failing();
        assert!(matches!(
            backend.normalize(b"x", Quality::default()),
            Err(BackendError::Decode(_))
        ));
        assert_eq!(backend.get_operations().len(), 1);
    }
}

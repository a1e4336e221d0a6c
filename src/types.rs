//! Caller-facing view objects.
//!
//! Every successful vault operation returns one of these. They are plain
//! data with `Serialize`, rendered either as text by [`crate::output`] or as
//! JSON by the CLI's `--json` flag.

use crate::ledger::{Image, ImageVersion};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// An image as shown to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageView {
    pub id: i64,
    /// Generated filename, e.g. `cat-1a2b3c4d`. Also the artifact namespace.
    pub filename: String,
    /// Relative path of the normalized upload.
    pub original: String,
    /// Relative path of the upload's thumbnail.
    pub thumbnail: String,
    pub created_at: DateTime<Utc>,
}

impl From<Image> for ImageView {
    fn from(image: Image) -> Self {
        Self {
            id: image.id,
            filename: image.filename,
            original: image.original_path,
            thumbnail: image.thumbnail_path,
            created_at: image.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionView {
    pub id: i64,
    pub image_id: i64,
    pub version_id: String,
    pub processed: String,
    pub thumbnail: String,
    pub created_at: DateTime<Utc>,
}

impl From<ImageVersion> for VersionView {
    fn from(version: ImageVersion) -> Self {
        Self {
            id: version.id,
            image_id: version.image_id,
            version_id: version.version_id,
            processed: version.processed_path,
            thumbnail: version.processed_thumbnail_path,
            created_at: version.created_at,
        }
    }
}

/// An image's full chain, newest first, plus the current version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionHistory {
    pub image_id: i64,
    pub versions: Vec<VersionView>,
    pub latest: VersionView,
}

/// Result of a revert: the latest row after its paths were repointed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevertOutcome {
    pub image_id: i64,
    /// The version whose artifacts the latest row now points at.
    pub reverted_to: String,
    pub latest: VersionView,
    /// Length of the chain, unchanged by the revert.
    pub versions: usize,
}

/// Result of a cascade delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub image_id: i64,
    pub filename: String,
    pub versions_removed: usize,
}

/// What kind of problem [`crate::vault::Vault::check`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// A record references an artifact that is not on disk.
    MissingArtifact,
    /// A file in the namespace that no record references.
    OrphanArtifact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub path: String,
    /// The version row referencing the path, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

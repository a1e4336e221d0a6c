//! Artifact store: the derived files on disk.
//!
//! # Layout
//!
//! ```text
//! uploads/                         # storage root
//! └── cat-1a2b3c4d/                # namespace = the image's generated filename
//!     ├── 1a2b3c4d/                # version 1 (the upload itself)
//!     │   ├── 1a2b3c4d.jpeg        # processed artifact
//!     │   └── thumbnail-1a2b3c4d.jpeg
//!     └── 5e6f7a8b/                # a later edit, sibling of version 1
//!         ├── 5e6f7a8b.jpeg
//!         └── thumbnail-5e6f7a8b.jpeg
//! ```
//!
//! Paths handed out by the store, and stored in the ledger, are relative to
//! the storage root and always use `/` separators. Resolving a path rejects
//! absolute paths and `..` components so a stored path can never reach
//! outside the root.
//!
//! # Write discipline
//!
//! Each file is written to a [`NamedTempFile`] inside its version directory
//! and atomically persisted under its final name. A temp file that is never
//! persisted (error, panic, cancellation) is removed when it is dropped, so
//! no half-written artifact ever appears under a name the ledger could
//! reference.
//!
//! Version directories, and the namespace directory of a new image, are
//! created exclusively. A `put` that finds its target already on disk fails
//! with [`ArtifactError::AlreadyExists`] and touches nothing, so cleaning up
//! after a failed `put` can only ever remove what that call created.

use crate::imaging::{OUTPUT_EXTENSION, Rendition};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Artifact not found: {0}")]
    NotFound(String),
    #[error("Failed to delete artifact namespace '{namespace}': {source}")]
    NamespaceDelete {
        namespace: String,
        #[source]
        source: io::Error,
    },
    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),
    #[error("Artifact directory already exists: {0}")]
    AlreadyExists(String),
}

impl ArtifactError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ArtifactError::NotFound(path.display().to_string())
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Relative paths of the two files stored for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub processed: String,
    pub thumbnail: String,
}

/// Filesystem-backed artifact store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ArtifactError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative paths a version's artifacts live at.
    pub fn paths_for(namespace: &str, version_id: &str) -> ArtifactPaths {
        ArtifactPaths {
            processed: format!(
                "{}/{}/{}.{}",
                namespace, version_id, version_id, OUTPUT_EXTENSION
            ),
            thumbnail: format!(
                "{}/{}/thumbnail-{}.{}",
                namespace, version_id, version_id, OUTPUT_EXTENSION
            ),
        }
    }

    /// Resolve a relative artifact path against the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        if path.is_empty()
            || !rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ArtifactError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn check_segment(segment: &str) -> Result<()> {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains(['/', '\\'])
        {
            return Err(ArtifactError::InvalidPath(segment.to_string()));
        }
        Ok(())
    }

    /// Persist a rendition as version `version_id` of an existing image's
    /// `namespace`.
    ///
    /// Either both files end up on disk under their final names, or neither
    /// does. Fails with `AlreadyExists` if the version directory is already
    /// there.
    pub fn put(
        &self,
        namespace: &str,
        version_id: &str,
        rendition: &Rendition,
    ) -> Result<ArtifactPaths> {
        Self::check_segment(namespace)?;
        Self::check_segment(version_id)?;
        let ns_dir = self.root.join(namespace);
        fs::create_dir_all(&ns_dir).map_err(|e| ArtifactError::io(&ns_dir, e))?;
        self.write_version(namespace, version_id, rendition)
    }

    /// Persist the first version of a new image.
    ///
    /// The namespace must not exist yet. If writing the version fails, the
    /// namespace this call created is removed again.
    pub fn put_new_namespace(
        &self,
        namespace: &str,
        version_id: &str,
        rendition: &Rendition,
    ) -> Result<ArtifactPaths> {
        Self::check_segment(namespace)?;
        Self::check_segment(version_id)?;
        let ns_dir = self.root.join(namespace);
        create_dir_exclusive(&ns_dir)?;

        let written = self.write_version(namespace, version_id, rendition);
        if written.is_err() {
            remove_created(&ns_dir);
        }
        written
    }

    fn write_version(
        &self,
        namespace: &str,
        version_id: &str,
        rendition: &Rendition,
    ) -> Result<ArtifactPaths> {
        let paths = Self::paths_for(namespace, version_id);
        let version_dir = self.root.join(namespace).join(version_id);
        create_dir_exclusive(&version_dir)?;

        let processed = self.resolve(&paths.processed)?;
        let thumbnail = self.resolve(&paths.thumbnail)?;

        let written = write_atomic(&version_dir, &processed, &rendition.processed).and_then(|_| {
            write_atomic(&version_dir, &thumbnail, &rendition.thumbnail)
        });
        if let Err(e) = written {
            // Created above and not referenced by any record yet.
            remove_created(&version_dir);
            return Err(e);
        }

        debug!(
            namespace,
            version_id,
            processed_bytes = rendition.processed.len(),
            thumbnail_bytes = rendition.thumbnail.len(),
            "stored rendition"
        );
        Ok(paths)
    }

    /// Read a whole artifact into memory.
    pub fn get(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| ArtifactError::io(&full, e))
    }

    /// Open an artifact for streaming.
    pub fn open_file(&self, path: &str) -> Result<fs::File> {
        let full = self.resolve(path)?;
        fs::File::open(&full).map_err(|e| ArtifactError::io(&full, e))
    }

    /// Whether an artifact exists. Invalid paths never exist.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_file())
    }

    /// Remove one version directory. Used to undo a `put` whose record was
    /// never written.
    pub fn delete_version(&self, namespace: &str, version_id: &str) -> Result<()> {
        Self::check_segment(namespace)?;
        Self::check_segment(version_id)?;
        let dir = self.root.join(namespace).join(version_id);
        fs::remove_dir_all(&dir).map_err(|e| ArtifactError::io(&dir, e))
    }

    /// Remove a namespace and everything under it.
    ///
    /// A missing namespace is `NotFound`; any other failure is
    /// `NamespaceDelete`, and the caller must keep the records that point
    /// into it.
    pub fn delete_namespace(&self, namespace: &str) -> Result<()> {
        Self::check_segment(namespace)?;
        let dir = self.root.join(namespace);
        if !dir.exists() {
            return Err(ArtifactError::NotFound(namespace.to_string()));
        }
        fs::remove_dir_all(&dir).map_err(|source| ArtifactError::NamespaceDelete {
            namespace: namespace.to_string(),
            source,
        })?;
        debug!(namespace, "deleted artifact namespace");
        Ok(())
    }

    /// Whether a namespace directory exists.
    pub fn namespace_exists(&self, namespace: &str) -> bool {
        Self::check_segment(namespace).is_ok() && self.root.join(namespace).is_dir()
    }

    /// All files under a namespace, as sorted relative paths.
    pub fn list_namespace(&self, namespace: &str) -> Result<Vec<String>> {
        Self::check_segment(namespace)?;
        let dir = self.root.join(namespace);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&dir).to_path_buf();
                ArtifactError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                let parts: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(parts.join("/"));
            }
        }
        files.sort();
        Ok(files)
    }
}

fn create_dir_exclusive(dir: &Path) -> Result<()> {
    fs::create_dir(dir).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            ArtifactError::AlreadyExists(dir.display().to_string())
        } else {
            ArtifactError::io(dir, e)
        }
    })
}

fn remove_created(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        warn!(
            path = %dir.display(),
            error = %e,
            "could not remove partially written artifacts"
        );
    }
}

/// Write `bytes` to `target` via a temp file in `dir`. Never replaces an
/// existing file.
fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ArtifactError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ArtifactError::io(tmp.path(), e))?;
    tmp.persist_noclobber(target).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            ArtifactError::AlreadyExists(target.display().to_string())
        } else {
            ArtifactError::io(target, e.error)
        }
    })?;
    Ok(())
}

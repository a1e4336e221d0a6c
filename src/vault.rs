//! The vault: upload, edit, revert, and delete with failure-safe sequencing.
//!
//! A [`Vault`] owns one [`ArtifactStore`], one [`Ledger`], and one
//! [`ImageBackend`]. Every mutating workflow follows the same order:
//!
//! ```text
//! validate ─▶ transform ─▶ store.put ─▶ ledger write
//!                              │             │
//!                              │        fails: undo the put
//!                         fails: nothing to undo
//! ```
//!
//! Validation happens before any bytes are decoded or written, so a rejected
//! request leaves no trace. Artifacts are always written before the record
//! that references them, and a record is only removed after its artifacts
//! are gone, so the ledger never points at a file that was not (or is no
//! longer) meant to exist.
//!
//! Version ids are short, so one can already be taken. Version directories
//! are created exclusively, and a write that finds its id in use on disk or
//! in the ledger is retried under a fresh id. Undoing a failed write only
//! ever removes the directory that write created.
//!
//! Revert touches only the ledger. Delete removes the image's whole artifact
//! namespace first and only then deletes the records; if the filesystem
//! refuses, the records stay and the error is surfaced.

use crate::config::{ConfigError, VaultConfig};
use crate::imaging::{
    BackendError, ImageBackend, Rendition, RenditionConfig, RustBackend, Transformation,
    apply_transformation, encode_original,
};
use crate::ledger::{Image, Ledger, LedgerError, NewImage};
use crate::naming::{extension_allowed, generate_version_id, generated_filename, parse_upload_name};
use crate::store::{ArtifactError, ArtifactStore};
use crate::types::{
    DeleteOutcome, ImageView, Inconsistency, InconsistencyKind, RevertOutcome, VersionHistory,
    VersionView,
};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Rejected input. Raised before any I/O.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported file extension '{0}'. Allowed: {1}")]
    UnsupportedFormat(String, String),
    #[error("{0}")]
    InvalidTransformation(String),
    #[error("File name is required")]
    MissingFilename,
    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),
    #[error("Cannot read upload {path}: {source}")]
    UnreadableUpload {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum VaultError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Artifact store error: {0}")]
    ArtifactStore(#[source] ArtifactError),
    #[error("Record store error: {0}")]
    RecordStore(#[source] LedgerError),
    #[error("Imaging error: {0}")]
    Imaging(#[from] BackendError),
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl VaultError {
    /// HTTP-style status for this error: 400, 404, or 500.
    pub fn status_code(&self) -> u16 {
        match self {
            VaultError::Validation(_) => 400,
            VaultError::NotFound(_) => 404,
            VaultError::ArtifactStore(_)
            | VaultError::RecordStore(_)
            | VaultError::Imaging(_)
            | VaultError::InconsistentState(_)
            | VaultError::Config(_) => 500,
        }
    }

    /// Whether the error is the system's fault rather than the caller's.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<ArtifactError> for VaultError {
    fn from(e: ArtifactError) -> Self {
        match e {
            ArtifactError::NotFound(path) => VaultError::NotFound(format!("artifact {}", path)),
            ArtifactError::InvalidPath(path) => {
                VaultError::Validation(ValidationError::InvalidPath(path))
            }
            other => VaultError::ArtifactStore(other),
        }
    }
}

impl From<LedgerError> for VaultError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ImageNotFound(id) => VaultError::NotFound(format!("image {}", id)),
            LedgerError::VersionNotFound {
                image_id,
                version_id: Some(version_id),
            } => VaultError::NotFound(format!("version {} of image {}", version_id, image_id)),
            LedgerError::VersionNotFound {
                image_id,
                version_id: None,
            } => VaultError::NotFound(format!("versions of image {}", image_id)),
            other => VaultError::RecordStore(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Fresh version ids tried before a write gives up on collisions.
const ID_ATTEMPTS: usize = 3;

/// Outcome of one write under a specific version id.
enum Attempt<T> {
    Stored(T),
    /// The id is already in use. Nothing was left behind by this attempt.
    IdTaken(String),
}

/// Versioned image storage.
pub struct Vault<B: ImageBackend = RustBackend> {
    backend: B,
    store: ArtifactStore,
    ledger: Ledger,
    rendition: RenditionConfig,
    allowed_extensions: Vec<String>,
}

impl Vault<RustBackend> {
    /// Open the store and ledger named by `config` with the `image` crate
    /// backend.
    pub fn open(config: &VaultConfig) -> Result<Self> {
        Self::with_backend(config, RustBackend::new())
    }
}

impl<B: ImageBackend> Vault<B> {
    pub fn with_backend(config: &VaultConfig, backend: B) -> Result<Self> {
        config.validate()?;
        let store = ArtifactStore::open(&config.storage_root)?;
        let ledger = Ledger::open(&config.database)?;
        Ok(Self::from_parts(store, ledger, backend, config))
    }

    /// Assemble a vault from already-open parts.
    pub fn from_parts(
        store: ArtifactStore,
        ledger: Ledger,
        backend: B,
        config: &VaultConfig,
    ) -> Self {
        Self {
            backend,
            store,
            ledger,
            rendition: config.rendition_config(),
            allowed_extensions: config.uploads.allowed_extensions.clone(),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Store a new image from its uploaded name and raw bytes.
    pub fn upload(&mut self, original_name: &str, bytes: &[u8]) -> Result<ImageView> {
        let name = parse_upload_name(original_name);
        if original_name.trim().is_empty() {
            return Err(ValidationError::MissingFilename.into());
        }
        if !extension_allowed(name.extension.as_deref(), &self.allowed_extensions) {
            error!(
                name = original_name,
                extension = name.extension.as_deref().unwrap_or(""),
                "rejected upload with unsupported extension"
            );
            return Err(ValidationError::UnsupportedFormat(
                name.extension.unwrap_or_default(),
                self.allowed_extensions.join(", "),
            )
            .into());
        }
        if name.stem.is_empty() {
            return Err(ValidationError::MissingFilename.into());
        }

        let rendition = encode_original(&self.backend, bytes, &self.rendition)?;
        self.with_fresh_id(|vault, version_id| {
            vault.store_upload(&name.stem, version_id, &rendition)
        })
    }

    /// Read an upload from disk and store it under its file name.
    pub fn upload_file(&mut self, path: &Path) -> Result<ImageView> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(ValidationError::MissingFilename)?;
        let bytes = fs::read(path).map_err(|source| ValidationError::UnreadableUpload {
            path: path.to_path_buf(),
            source,
        })?;
        self.upload(&name, &bytes)
    }

    /// Apply a named transformation to an image's latest version, appending
    /// the result as a new version.
    pub fn edit(&mut self, image_id: i64, transformation: &str) -> Result<VersionView> {
        let transformation = transformation.parse::<Transformation>().map_err(|e| {
            error!(image_id, transformation, "rejected unknown transformation");
            ValidationError::InvalidTransformation(e.to_string())
        })?;

        let image = self.ledger.get_image(image_id)?;
        let latest = self.ledger.latest_version(image_id)?;
        let source = self.read_referenced(&latest.processed_path)?;

        let rendition = apply_transformation(&self.backend, &source, transformation, &self.rendition)?;
        let version = self.with_fresh_id(|vault, version_id| {
            vault.store_version(&image, version_id, &rendition)
        })?;

        info!(
            image_id,
            version_id = %version.version_id,
            transformation = %transformation,
            "applied transformation"
        );
        Ok(version)
    }

    /// Point the latest version at an earlier version's artifacts.
    pub fn revert(&mut self, image_id: i64, version_id: &str) -> Result<RevertOutcome> {
        let latest = self.ledger.revert(image_id, version_id).inspect_err(|e| {
            error!(image_id, version_id, error = %e, "revert failed");
        })?;
        let versions = self.ledger.count_versions(image_id)?;
        info!(
            image_id,
            version_id,
            latest = %latest.version_id,
            versions,
            "reverted image"
        );
        Ok(RevertOutcome {
            image_id,
            reverted_to: version_id.to_string(),
            latest: latest.into(),
            versions,
        })
    }

    /// Delete an image, its artifacts, and all of its versions.
    pub fn delete(&mut self, image_id: i64) -> Result<DeleteOutcome> {
        let image = self.ledger.get_image(image_id)?;

        match self.store.delete_namespace(&image.filename) {
            Ok(()) => {}
            Err(ArtifactError::NotFound(_)) => {
                warn!(
                    image_id,
                    namespace = %image.filename,
                    "artifact namespace already gone, removing records"
                );
            }
            Err(e) => {
                error!(image_id, namespace = %image.filename, error = %e, "artifact delete failed");
                return Err(VaultError::ArtifactStore(e));
            }
        }

        let versions_removed = self.ledger.delete_image(image_id)?;
        info!(image_id, versions_removed, "deleted image");
        Ok(DeleteOutcome {
            image_id,
            filename: image.filename,
            versions_removed,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn list_images(&self) -> Result<Vec<ImageView>> {
        Ok(self
            .ledger
            .list_images()?
            .into_iter()
            .map(ImageView::from)
            .collect())
    }

    pub fn get_image(&self, image_id: i64) -> Result<ImageView> {
        Ok(self.ledger.get_image(image_id)?.into())
    }

    /// The whole chain, newest first, with the latest version.
    pub fn versions(&self, image_id: i64) -> Result<VersionHistory> {
        let versions: Vec<VersionView> = self
            .ledger
            .list_versions(image_id)?
            .into_iter()
            .map(VersionView::from)
            .collect();
        let latest = versions
            .first()
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("versions of image {}", image_id)))?;
        Ok(VersionHistory {
            image_id,
            versions,
            latest,
        })
    }

    /// One version of an image by its version id.
    pub fn version(&self, image_id: i64, version_id: &str) -> Result<VersionView> {
        Ok(self.ledger.find_version(image_id, version_id)?.into())
    }

    /// Bytes of the normalized upload.
    pub fn read_original(&self, image_id: i64) -> Result<Vec<u8>> {
        let image = self.ledger.get_image(image_id)?;
        self.read_referenced(&image.original_path)
    }

    /// Bytes of the latest version's processed artifact.
    pub fn read_latest(&self, image_id: i64) -> Result<Vec<u8>> {
        let latest = self.ledger.latest_version(image_id)?;
        self.read_referenced(&latest.processed_path)
    }

    pub fn read_latest_thumbnail(&self, image_id: i64) -> Result<Vec<u8>> {
        let latest = self.ledger.latest_version(image_id)?;
        self.read_referenced(&latest.processed_thumbnail_path)
    }

    /// Bytes of any artifact by its stored relative path. Paths that would
    /// leave the storage root are rejected.
    pub fn read_by_path(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.store.get(path)?)
    }

    /// Open the normalized upload for streaming.
    pub fn open_original(&self, image_id: i64) -> Result<fs::File> {
        let image = self.ledger.get_image(image_id)?;
        self.open_referenced(&image.original_path)
    }

    pub fn open_latest(&self, image_id: i64) -> Result<fs::File> {
        let latest = self.ledger.latest_version(image_id)?;
        self.open_referenced(&latest.processed_path)
    }

    pub fn open_latest_thumbnail(&self, image_id: i64) -> Result<fs::File> {
        let latest = self.ledger.latest_version(image_id)?;
        self.open_referenced(&latest.processed_thumbnail_path)
    }

    /// Open any artifact by its stored relative path.
    pub fn open_by_path(&self, path: &str) -> Result<fs::File> {
        Ok(self.store.open_file(path)?)
    }

    /// Compare an image's records with what is on disk.
    ///
    /// Reports referenced artifacts that are missing and files in the
    /// namespace that belong to no version. An empty result means the image
    /// is consistent.
    pub fn check(&self, image_id: i64) -> Result<Vec<Inconsistency>> {
        let image = self.ledger.get_image(image_id)?;
        let versions = self.ledger.list_versions(image_id)?;

        let mut referenced = BTreeSet::new();
        let mut found = Vec::new();

        let mut expect_file = |path: &str, version_id: Option<&str>| {
            if !referenced.insert(path.to_string()) {
                return;
            }
            if !self.store.exists(path) {
                found.push(Inconsistency {
                    kind: InconsistencyKind::MissingArtifact,
                    path: path.to_string(),
                    version_id: version_id.map(str::to_string),
                });
            }
        };
        for v in versions.iter().rev() {
            expect_file(&v.processed_path, Some(v.version_id.as_str()));
            expect_file(&v.processed_thumbnail_path, Some(v.version_id.as_str()));
        }
        expect_file(&image.original_path, None);
        expect_file(&image.thumbnail_path, None);

        // A version keeps owning its directory after a revert repoints the
        // latest row, so only files outside every version directory count.
        let owned: BTreeSet<&str> = versions.iter().map(|v| v.version_id.as_str()).collect();
        for file in self.store.list_namespace(&image.filename)? {
            let version_dir = file.split('/').nth(1).unwrap_or("");
            if !referenced.contains(&file) && !owned.contains(version_dir) {
                found.push(Inconsistency {
                    kind: InconsistencyKind::OrphanArtifact,
                    path: file,
                    version_id: None,
                });
            }
        }

        for issue in &found {
            error!(
                image_id,
                kind = ?issue.kind,
                path = %issue.path,
                version_id = issue.version_id.as_deref().unwrap_or(""),
                "inconsistent state"
            );
        }
        Ok(found)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Run one write attempt per fresh version id until one is not already
    /// taken on disk or in the ledger.
    fn with_fresh_id<T>(
        &mut self,
        mut attempt: impl FnMut(&mut Self, &str) -> Result<Attempt<T>>,
    ) -> Result<T> {
        let mut taken = String::new();
        for _ in 0..ID_ATTEMPTS {
            let version_id = generate_version_id();
            match attempt(self, &version_id)? {
                Attempt::Stored(value) => return Ok(value),
                Attempt::IdTaken(what) => {
                    warn!(
                        version_id = %version_id,
                        taken = %what,
                        "version id already in use, retrying"
                    );
                    taken = what;
                }
            }
        }
        error!(attempts = ID_ATTEMPTS, "no free version id");
        Err(VaultError::ArtifactStore(ArtifactError::AlreadyExists(taken)))
    }

    /// Write a new image under `version_id`: its namespace, then its record.
    fn store_upload(
        &mut self,
        stem: &str,
        version_id: &str,
        rendition: &Rendition,
    ) -> Result<Attempt<ImageView>> {
        let filename = generated_filename(stem, version_id);
        let paths = match self.store.put_new_namespace(&filename, version_id, rendition) {
            Ok(paths) => paths,
            Err(ArtifactError::AlreadyExists(path)) => return Ok(Attempt::IdTaken(path)),
            Err(e) => return Err(e.into()),
        };

        let created = self.ledger.create_image(&NewImage {
            filename: &filename,
            version_id,
            original_path: &paths.processed,
            thumbnail_path: &paths.thumbnail,
        });
        let (image, version) = match created {
            Ok(created) => created,
            Err(e) => {
                error!(filename = %filename, error = %e, "ledger write failed after upload");
                // The namespace was created by this call.
                self.discard_namespace(&filename);
                return match e {
                    LedgerError::DuplicateFilename(taken) => Ok(Attempt::IdTaken(taken)),
                    e => Err(e.into()),
                };
            }
        };

        info!(
            image_id = image.id,
            version_id = %version.version_id,
            filename = %image.filename,
            "uploaded image"
        );
        Ok(Attempt::Stored(image.into()))
    }

    /// Write `rendition` as version `version_id` of `image`: its version
    /// directory, then its record.
    fn store_version(
        &mut self,
        image: &Image,
        version_id: &str,
        rendition: &Rendition,
    ) -> Result<Attempt<VersionView>> {
        let paths = match self.store.put(&image.filename, version_id, rendition) {
            Ok(paths) => paths,
            Err(ArtifactError::AlreadyExists(path)) => return Ok(Attempt::IdTaken(path)),
            Err(e) => return Err(e.into()),
        };

        let appended =
            self.ledger
                .append_version(image.id, version_id, &paths.processed, &paths.thumbnail);
        match appended {
            Ok(version) => Ok(Attempt::Stored(version.into())),
            Err(e) => {
                error!(image_id = image.id, version_id, error = %e, "ledger write failed after edit");
                // The version directory was created by this call.
                if let Err(cleanup) = self.store.delete_version(&image.filename, version_id) {
                    warn!(
                        namespace = %image.filename,
                        version_id,
                        error = %cleanup,
                        "could not remove unrecorded version"
                    );
                }
                match e {
                    LedgerError::DuplicateVersion { version_id, .. } => {
                        Ok(Attempt::IdTaken(version_id))
                    }
                    e => Err(e.into()),
                }
            }
        }
    }

    /// Read an artifact a record points at.
    fn read_referenced(&self, path: &str) -> Result<Vec<u8>> {
        referenced(path, self.store.get(path))
    }

    fn open_referenced(&self, path: &str) -> Result<fs::File> {
        referenced(path, self.store.open_file(path))
    }

    fn discard_namespace(&self, namespace: &str) {
        if let Err(e) = self.store.delete_namespace(namespace) {
            warn!(namespace, error = %e, "could not remove unrecorded artifacts");
        }
    }
}

/// A missing artifact that a record points at means the store and the
/// ledger disagree.
fn referenced<T>(path: &str, found: std::result::Result<T, ArtifactError>) -> Result<T> {
    match found {
        Ok(value) => Ok(value),
        Err(ArtifactError::NotFound(_)) => {
            error!(path, "record references a missing artifact");
            Err(VaultError::InconsistentState(format!(
                "referenced artifact {} is missing",
                path
            )))
        }
        Err(e) => Err(e.into()),
    }
}

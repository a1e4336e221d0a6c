//! Version ledger: images and their version chains in SQLite.
//!
//! The ledger is the system of record for lineage. It knows nothing about
//! pixels or files beyond the relative artifact paths it stores.
//!
//! # Chain rules
//!
//! - An image is created together with its first version, in one
//!   transaction. Every image therefore has at least one version.
//! - Versions are ordered by row id. The row with the highest id is the
//!   **latest** version.
//! - [`Ledger::append_version`] always inserts; it never overwrites.
//! - [`Ledger::revert`] is the only mutation of an existing row: it copies an
//!   older version's two paths onto the latest row. No row is added and the
//!   target row is left as it was.
//! - [`Ledger::delete_image`] removes the version rows and then the image row
//!   in one transaction.

mod schema;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use schema::SCHEMA;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// How long a write waits on another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image not found: {0}")]
    ImageNotFound(i64),
    #[error("Version not found for image {image_id}: {}", .version_id.as_deref().unwrap_or("<no versions>"))]
    VersionNotFound {
        image_id: i64,
        version_id: Option<String>,
    },
    #[error("An image named '{0}' already exists")]
    DuplicateFilename(String),
    #[error("Version '{version_id}' already exists for image {image_id}")]
    DuplicateVersion { image_id: i64, version_id: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// One logical picture.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: i64,
    pub filename: String,
    pub original_path: String,
    pub thumbnail_path: String,
    pub created_at: DateTime<Utc>,
}

/// One point in an image's history.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageVersion {
    pub id: i64,
    pub image_id: i64,
    pub version_id: String,
    pub processed_path: String,
    pub processed_thumbnail_path: String,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to create an image and its first version.
#[derive(Debug, Clone)]
pub struct NewImage<'a> {
    /// Already suffixed, e.g. `cat-1a2b3c4d`.
    pub filename: &'a str,
    pub version_id: &'a str,
    pub original_path: &'a str,
    pub thumbnail_path: &'a str,
}

const IMAGE_COLUMNS: &str = "id, filename, original_path, thumbnail_path, created_at";
const VERSION_COLUMNS: &str =
    "id, image_id, version_id, processed_path, processed_thumbnail_path, created_at";

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_path: row.get(2)?,
        thumbnail_path: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ImageVersion> {
    Ok(ImageVersion {
        id: row.get(0)?,
        image_id: row.get(1)?,
        version_id: row.get(2)?,
        processed_path: row.get(3)?,
        processed_thumbnail_path: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// Helpers take `&Connection` so they work inside a `Transaction` as well.

fn fetch_image(conn: &Connection, image_id: i64) -> Result<Image> {
    conn.query_row(
        &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?1"),
        params![image_id],
        image_from_row,
    )
    .optional()?
    .ok_or(LedgerError::ImageNotFound(image_id))
}

fn fetch_version(conn: &Connection, image_id: i64, version_id: &str) -> Result<ImageVersion> {
    conn.query_row(
        &format!(
            "SELECT {VERSION_COLUMNS} FROM image_versions
             WHERE image_id = ?1 AND version_id = ?2"
        ),
        params![image_id, version_id],
        version_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::VersionNotFound {
        image_id,
        version_id: Some(version_id.to_string()),
    })
}

fn fetch_latest(conn: &Connection, image_id: i64) -> Result<ImageVersion> {
    fetch_image(conn, image_id)?;
    conn.query_row(
        &format!(
            "SELECT {VERSION_COLUMNS} FROM image_versions
             WHERE image_id = ?1 ORDER BY id DESC LIMIT 1"
        ),
        params![image_id],
        version_from_row,
    )
    .optional()?
    .ok_or(LedgerError::VersionNotFound {
        image_id,
        version_id: None,
    })
}

fn fetch_version_by_row(conn: &Connection, id: i64) -> Result<ImageVersion> {
    Ok(conn.query_row(
        &format!("SELECT {VERSION_COLUMNS} FROM image_versions WHERE id = ?1"),
        params![id],
        version_from_row,
    )?)
}

fn insert_version(
    conn: &Connection,
    image_id: i64,
    version_id: &str,
    processed_path: &str,
    thumbnail_path: &str,
    created_at: DateTime<Utc>,
) -> Result<ImageVersion> {
    conn.execute(
        "INSERT INTO image_versions
            (image_id, version_id, processed_path, processed_thumbnail_path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![image_id, version_id, processed_path, thumbnail_path, created_at],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            LedgerError::DuplicateVersion {
                image_id,
                version_id: version_id.to_string(),
            }
        } else {
            e.into()
        }
    })?;
    fetch_version_by_row(conn, conn.last_insert_rowid())
}

/// SQLite-backed version ledger.
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// A private in-memory ledger. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an image and its first version, which points at the same
    /// artifacts as the image itself.
    pub fn create_image(&mut self, new: &NewImage<'_>) -> Result<(Image, ImageVersion)> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO images (filename, original_path, thumbnail_path, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![new.filename, new.original_path, new.thumbnail_path, now],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DuplicateFilename(new.filename.to_string())
            } else {
                e.into()
            }
        })?;
        let image_id = tx.last_insert_rowid();

        let version = insert_version(
            &tx,
            image_id,
            new.version_id,
            new.original_path,
            new.thumbnail_path,
            now,
        )?;
        let image = fetch_image(&tx, image_id)?;

        tx.commit()?;
        Ok((image, version))
    }

    pub fn get_image(&self, image_id: i64) -> Result<Image> {
        fetch_image(&self.conn, image_id)
    }

    /// All images, oldest first.
    pub fn list_images(&self) -> Result<Vec<Image>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {IMAGE_COLUMNS} FROM images ORDER BY id ASC"))?;
        let images = stmt
            .query_map([], image_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    /// The version with the highest row id.
    ///
    /// An image without versions breaks the chain invariant; it is reported
    /// as `VersionNotFound` rather than assumed impossible.
    pub fn latest_version(&self, image_id: i64) -> Result<ImageVersion> {
        fetch_latest(&self.conn, image_id)
    }

    /// Look up a version by its opaque id, scoped to one image.
    pub fn find_version(&self, image_id: i64, version_id: &str) -> Result<ImageVersion> {
        fetch_version(&self.conn, image_id, version_id)
    }

    /// Append a new version to an image's chain.
    pub fn append_version(
        &mut self,
        image_id: i64,
        version_id: &str,
        processed_path: &str,
        thumbnail_path: &str,
    ) -> Result<ImageVersion> {
        let tx = self.conn.transaction()?;
        fetch_image(&tx, image_id)?;
        let version = insert_version(
            &tx,
            image_id,
            version_id,
            processed_path,
            thumbnail_path,
            Utc::now(),
        )?;
        tx.commit()?;
        Ok(version)
    }

    /// Every version of an image, newest first.
    pub fn list_versions(&self, image_id: i64) -> Result<Vec<ImageVersion>> {
        fetch_image(&self.conn, image_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM image_versions
             WHERE image_id = ?1 ORDER BY id DESC"
        ))?;
        let versions = stmt
            .query_map(params![image_id], version_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    pub fn count_versions(&self, image_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM image_versions WHERE image_id = ?1",
            params![image_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Point the latest version at `version_id`'s artifacts.
    ///
    /// Returns the updated latest row. The target row is not modified and no
    /// row is added, so the chain length is unchanged.
    pub fn revert(&mut self, image_id: i64, version_id: &str) -> Result<ImageVersion> {
        let tx = self.conn.transaction()?;
        fetch_image(&tx, image_id)?;
        let target = fetch_version(&tx, image_id, version_id)?;
        let mut latest = fetch_latest(&tx, image_id)?;

        tx.execute(
            "UPDATE image_versions
             SET processed_path = ?1, processed_thumbnail_path = ?2
             WHERE id = ?3",
            params![
                target.processed_path,
                target.processed_thumbnail_path,
                latest.id
            ],
        )?;
        tx.commit()?;

        latest.processed_path = target.processed_path;
        latest.processed_thumbnail_path = target.processed_thumbnail_path;
        Ok(latest)
    }

    /// Delete an image and all of its versions as one unit.
    ///
    /// Returns the number of version rows removed. Callers are expected to
    /// have removed the image's artifacts first.
    pub fn delete_image(&mut self, image_id: i64) -> Result<usize> {
        let tx = self.conn.transaction()?;
        fetch_image(&tx, image_id)?;
        let removed = tx.execute(
            "DELETE FROM image_versions WHERE image_id = ?1",
            params![image_id],
        )?;
        tx.execute("DELETE FROM images WHERE id = ?1", params![image_id])?;
        tx.commit()?;
        Ok(removed)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

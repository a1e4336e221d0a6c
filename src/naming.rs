//! Upload filename parsing and identifier generation.
//!
//! An upload name like `holiday.cat.PNG` splits into a **stem** (everything
//! before the first dot, `holiday`) and an **extension** (everything after the
//! last dot, lower-cased, `png`). The stem becomes the human part of the
//! image's generated filename; the extension is only used for the allow-list
//! check.
//!
//! ## Generated names
//!
//! Every upload gets a fresh 8-character version id. The image's filename,
//! which doubles as its artifact namespace, is `{stem}-{version_id}`:
//!
//! - `cat.png` → `cat-1a2b3c4d`
//! - `My Photo.jpg` → `My_Photo-9f8e7d6c`
//!
//! Two uploads of the same human name therefore never share a namespace.

use uuid::Uuid;

/// Length of a generated version id.
pub const VERSION_ID_LEN: usize = 8;

/// Result of parsing an upload name like `cat.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    /// Filesystem-safe stem. Empty if the name starts with a dot.
    pub stem: String,
    /// Lower-cased text after the last dot, `None` if there is no dot.
    pub extension: Option<String>,
}

/// Parse an upload name. Any directory components are ignored.
///
/// - `"cat.png"` → stem `cat`, extension `png`
/// - `"archive.tar.JPG"` → stem `archive`, extension `jpg`
/// - `"README"` → stem `README`, extension `None`
/// - `"../../etc/passwd.png"` → stem `passwd`, extension `png`
pub fn parse_upload_name(name: &str) -> UploadName {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let extension = base
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    let raw_stem = base.split('.').next().unwrap_or("");

    UploadName {
        stem: sanitize_stem(raw_stem),
        extension,
    }
}

/// Replace anything that is not ASCII alphanumeric, `-` or `_` with `_`.
fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Case-insensitive allow-list check for an extension.
pub fn extension_allowed(extension: Option<&str>, allowed: &[String]) -> bool {
    extension.is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Generate a fresh opaque version id: 8 lowercase hex characters.
pub fn generate_version_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(VERSION_ID_LEN);
    id
}

/// The generated filename (and artifact namespace) for an upload.
pub fn generated_filename(stem: &str, version_id: &str) -> String {
    format!("{}-{}", stem, version_id)
}

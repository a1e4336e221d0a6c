//! CLI output formatting for every vault command.
//!
//! # Display Contract
//!
//! Every entity leads with its identity on a header line (`#1 cat-1a2b3c4d`,
//! `003 5e6f7a8b`) and shows artifact paths as indented context lines. Paths
//! are always the stored relative form, so they can be fed straight back into
//! `export-path`.
//!
//! ## Upload / show / list
//!
//! ```text
//! #1 cat-1a2b3c4d
//!     Original: cat-1a2b3c4d/1a2b3c4d/1a2b3c4d.jpeg
//!     Thumbnail: cat-1a2b3c4d/1a2b3c4d/thumbnail-1a2b3c4d.jpeg
//!     Created: 2024-05-01 12:00:00 UTC
//! ```
//!
//! ## Versions
//!
//! ```text
//! Image #1 (3 versions)
//! 003 9f8e7d6c (latest)
//!     Processed: cat-1a2b3c4d/1a2b3c4d/1a2b3c4d.jpeg
//!     Thumbnail: cat-1a2b3c4d/1a2b3c4d/thumbnail-1a2b3c4d.jpeg
//! 002 5e6f7a8b
//!     ...
//! ```
//!
//! Positional indices count from the upload (001) so they stay stable as the
//! chain grows, even though the listing is newest first.
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::types::{
    DeleteOutcome, ImageView, Inconsistency, InconsistencyKind, RevertOutcome, VersionHistory,
    VersionView,
};
use chrono::{DateTime, Utc};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

/// Header plus context lines for one image.
fn image_lines(image: &ImageView) -> Vec<String> {
    vec![
        format!("#{} {}", image.id, image.filename),
        format!("{}Original: {}", indent(1), image.original),
        format!("{}Thumbnail: {}", indent(1), image.thumbnail),
        format!("{}Created: {}", indent(1), format_timestamp(&image.created_at)),
    ]
}

fn version_lines(index: usize, version: &VersionView, is_latest: bool) -> Vec<String> {
    let marker = if is_latest { " (latest)" } else { "" };
    vec![
        format!("{} {}{}", format_index(index), version.version_id, marker),
        format!("{}Processed: {}", indent(1), version.processed),
        format!("{}Thumbnail: {}", indent(1), version.thumbnail),
    ]
}

// ============================================================================
// Images
// ============================================================================

/// Format a single image (upload and show).
pub fn format_image(image: &ImageView) -> Vec<String> {
    image_lines(image)
}

pub fn print_image(image: &ImageView) {
    print_lines(format_image(image));
}

/// Format every image, oldest first, with a count footer.
pub fn format_image_list(images: &[ImageView]) -> Vec<String> {
    if images.is_empty() {
        return vec!["No images".to_string()];
    }
    let mut lines: Vec<String> = images.iter().flat_map(image_lines).collect();
    lines.push(String::new());
    lines.push(plural(images.len(), "image", "images"));
    lines
}

pub fn print_image_list(images: &[ImageView]) {
    print_lines(format_image_list(images));
}

// ============================================================================
// Versions
// ============================================================================

/// Format a freshly appended version.
pub fn format_edit(version: &VersionView, transformation: &str) -> Vec<String> {
    vec![
        format!(
            "{} → version {} of image #{}",
            transformation, version.version_id, version.image_id
        ),
        format!("{}Processed: {}", indent(1), version.processed),
        format!("{}Thumbnail: {}", indent(1), version.thumbnail),
    ]
}

pub fn print_edit(version: &VersionView, transformation: &str) {
    print_lines(format_edit(version, transformation));
}

/// Format an image's version chain, newest first.
pub fn format_version_history(history: &VersionHistory) -> Vec<String> {
    let total = history.versions.len();
    let mut lines = vec![format!(
        "Image #{} ({})",
        history.image_id,
        plural(total, "version", "versions")
    )];
    for (i, version) in history.versions.iter().enumerate() {
        lines.extend(version_lines(
            total - i,
            version,
            version.id == history.latest.id,
        ));
    }
    lines
}

pub fn print_version_history(history: &VersionHistory) {
    print_lines(format_version_history(history));
}

/// Format one version looked up by its version id.
pub fn format_version(version: &VersionView) -> Vec<String> {
    vec![
        format!("{} of image #{}", version.version_id, version.image_id),
        format!("{}Processed: {}", indent(1), version.processed),
        format!("{}Thumbnail: {}", indent(1), version.thumbnail),
        format!("{}Created: {}", indent(1), format_timestamp(&version.created_at)),
    ]
}

pub fn print_version(version: &VersionView) {
    print_lines(format_version(version));
}

pub fn format_revert(outcome: &RevertOutcome) -> Vec<String> {
    vec![
        format!(
            "Reverted image #{} to {} ({} kept)",
            outcome.image_id,
            outcome.reverted_to,
            plural(outcome.versions, "version", "versions")
        ),
        format!(
            "{}Latest {} now points at: {}",
            indent(1),
            outcome.latest.version_id,
            outcome.latest.processed
        ),
    ]
}

pub fn print_revert(outcome: &RevertOutcome) {
    print_lines(format_revert(outcome));
}

pub fn format_delete(outcome: &DeleteOutcome) -> Vec<String> {
    vec![format!(
        "Deleted image #{} ({}), {} removed",
        outcome.image_id,
        outcome.filename,
        plural(outcome.versions_removed, "version", "versions")
    )]
}

pub fn print_delete(outcome: &DeleteOutcome) {
    print_lines(format_delete(outcome));
}

// ============================================================================
// Export and check
// ============================================================================

pub fn format_export(out: &Path, bytes: usize) -> Vec<String> {
    vec![format!("Wrote {} bytes to {}", bytes, out.display())]
}

pub fn print_export(out: &Path, bytes: usize) {
    print_lines(format_export(out, bytes));
}

/// Format a consistency report. Missing artifacts come before orphans.
pub fn format_check(image_id: i64, issues: &[Inconsistency]) -> Vec<String> {
    if issues.is_empty() {
        return vec![format!("Image #{} is consistent", image_id)];
    }
    let mut lines = vec![format!(
        "Image #{}: {} found",
        image_id,
        plural(issues.len(), "problem", "problems")
    )];
    for issue in issues {
        let line = match (issue.kind, &issue.version_id) {
            (InconsistencyKind::MissingArtifact, Some(v)) => {
                format!("missing {} (version {})", issue.path, v)
            }
            (InconsistencyKind::MissingArtifact, None) => format!("missing {}", issue.path),
            (InconsistencyKind::OrphanArtifact, _) => format!("orphan  {}", issue.path),
        };
        lines.push(format!("{}{}", indent(1), line));
    }
    lines
}

pub fn print_check(image_id: i64, issues: &[Inconsistency]) {
    print_lines(format_check(image_id, issues));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn image(id: i64, filename: &str) -> ImageView {
        ImageView {
            id,
            filename: filename.to_string(),
            original: format!("{filename}/v1/v1.jpeg"),
            thumbnail: format!("{filename}/v1/thumbnail-v1.jpeg"),
            created_at: at(),
        }
    }

    fn version(id: i64, version_id: &str) -> VersionView {
        VersionView {
            id,
            image_id: 1,
            version_id: version_id.to_string(),
            processed: format!("cat/{version_id}/{version_id}.jpeg"),
            thumbnail: format!("cat/{version_id}/thumbnail-{version_id}.jpeg"),
            created_at: at(),
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "image", "images"), "1 image");
        assert_eq!(plural(0, "image", "images"), "0 images");
    }

    // =========================================================================
    // Images
    // =========================================================================

    #[test]
    fn image_shows_identity_then_paths() {
        let lines = format_image(&image(1, "cat-aaaa"));
        assert_eq!(lines[0], "#1 cat-aaaa");
        assert_eq!(lines[1], "    Original: cat-aaaa/v1/v1.jpeg");
        assert_eq!(lines[2], "    Thumbnail: cat-aaaa/v1/thumbnail-v1.jpeg");
        assert_eq!(lines[3], "    Created: 2024-05-01 12:00:00 UTC");
    }

    #[test]
    fn empty_image_list() {
        assert_eq!(format_image_list(&[]), vec!["No images"]);
    }

    #[test]
    fn image_list_has_count_footer() {
        let lines = format_image_list(&[image(1, "a-1"), image(2, "b-2")]);
        assert_eq!(lines[0], "#1 a-1");
        assert_eq!(lines[4], "#2 b-2");
        assert_eq!(lines.last().unwrap(), "2 images");
    }

    // =========================================================================
    // Versions
    // =========================================================================

    #[test]
    fn history_counts_from_upload_and_marks_latest() {
        let history = VersionHistory {
            image_id: 1,
            versions: vec![version(3, "cccc"), version(2, "bbbb"), version(1, "aaaa")],
            latest: version(3, "cccc"),
        };
        let lines = format_version_history(&history);
        assert_eq!(lines[0], "Image #1 (3 versions)");
        assert_eq!(lines[1], "003 cccc (latest)");
        assert_eq!(lines[4], "002 bbbb");
        assert_eq!(lines[7], "001 aaaa");
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn edit_names_transformation_and_version() {
        let lines = format_edit(&version(2, "bbbb"), "rotate");
        assert_eq!(lines[0], "rotate → version bbbb of image #1");
        assert_eq!(lines[1], "    Processed: cat/bbbb/bbbb.jpeg");
    }

    #[test]
    fn single_version_names_its_image() {
        let lines = format_version(&version(2, "bbbb"));
        assert_eq!(lines[0], "bbbb of image #1");
        assert_eq!(lines[2], "    Thumbnail: cat/bbbb/thumbnail-bbbb.jpeg");
        assert_eq!(lines[3], "    Created: 2024-05-01 12:00:00 UTC");
    }

    #[test]
    fn revert_shows_new_latest_target() {
        let mut latest = version(3, "cccc");
        latest.processed = "cat/aaaa/aaaa.jpeg".into();
        let lines = format_revert(&RevertOutcome {
            image_id: 1,
            reverted_to: "aaaa".into(),
            latest,
            versions: 3,
        });
        assert_eq!(lines[0], "Reverted image #1 to aaaa (3 versions kept)");
        assert_eq!(lines[1], "    Latest cccc now points at: cat/aaaa/aaaa.jpeg");
    }

    #[test]
    fn delete_summary() {
        let lines = format_delete(&DeleteOutcome {
            image_id: 4,
            filename: "cat-aaaa".into(),
            versions_removed: 1,
        });
        assert_eq!(lines, vec!["Deleted image #4 (cat-aaaa), 1 version removed"]);
    }

    // =========================================================================
    // Export and check
    // =========================================================================

    #[test]
    fn export_reports_size_and_destination() {
        let lines = format_export(Path::new("out.jpeg"), 2048);
        assert_eq!(lines, vec!["Wrote 2048 bytes to out.jpeg"]);
    }

    #[test]
    fn clean_check() {
        assert_eq!(format_check(1, &[]), vec!["Image #1 is consistent"]);
    }

    #[test]
    fn check_lists_each_problem() {
        let issues = vec![
            Inconsistency {
                kind: InconsistencyKind::MissingArtifact,
                path: "cat/bbbb/bbbb.jpeg".into(),
                version_id: Some("bbbb".into()),
            },
            Inconsistency {
                kind: InconsistencyKind::OrphanArtifact,
                path: "cat/zzzz/zzzz.jpeg".into(),
                version_id: None,
            },
        ];
        let lines = format_check(1, &issues);
        assert_eq!(lines[0], "Image #1: 2 problems found");
        assert_eq!(lines[1], "    missing cat/bbbb/bbbb.jpeg (version bbbb)");
        assert_eq!(lines[2], "    orphan  cat/zzzz/zzzz.jpeg");
    }
}

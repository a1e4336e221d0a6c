/// Tables for images and their version chains.
///
/// `AUTOINCREMENT` keeps row ids strictly increasing and never reused, which
/// is what orders a chain. Version rows are removed explicitly before their
/// image; there is no `ON DELETE CASCADE`.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS images (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        filename        TEXT NOT NULL UNIQUE,
        original_path   TEXT NOT NULL,
        thumbnail_path  TEXT NOT NULL,
        created_at      TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS image_versions (
        id                        INTEGER PRIMARY KEY AUTOINCREMENT,
        image_id                  INTEGER NOT NULL,
        version_id                TEXT NOT NULL,
        processed_path            TEXT NOT NULL,
        processed_thumbnail_path  TEXT NOT NULL,
        created_at                TEXT NOT NULL,
        FOREIGN KEY(image_id) REFERENCES images(id),
        UNIQUE(image_id, version_id)
    );

    CREATE INDEX IF NOT EXISTS idx_image_versions_chain
        ON image_versions(image_id, id DESC);
";

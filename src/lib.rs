//! # Image Vault
//!
//! Versioned image storage. Every uploaded image keeps a linear history of
//! edits: rotate, flip, grayscale, and brightness each append a new version,
//! any earlier version can be made current again, and deleting an image
//! removes its whole history from disk and from the record store.
//!
//! # Architecture
//!
//! Three independent components sit behind one orchestrator:
//!
//! ```text
//!                  ┌───────────── Vault ─────────────┐
//!  upload / edit → │ imaging  →  store  →  ledger    │ → ImageView / VersionView
//!                  └─────────────────────────────────┘
//!                     bytes      files     SQLite rows
//! ```
//!
//! - The **transform engine** ([`imaging`]) is a pure function from source
//!   bytes and a transformation to a processed image plus its thumbnail. It
//!   knows nothing about versions.
//! - The **artifact store** ([`store`]) owns the files under the storage root,
//!   one namespace directory per image and one subdirectory per version.
//! - The **version ledger** ([`ledger`]) is the system of record for images
//!   and their version chains.
//! - The **vault** ([`vault`]) sequences the three so a failure at any step
//!   leaves nothing reachable that should not be.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`vault`] | Upload, edit, revert, delete, reads, and consistency checks |
//! | [`imaging`] | Backend trait, `image`-crate backend, thumbnail math |
//! | [`store`] | Artifact layout, atomic writes, namespace deletion |
//! | [`ledger`] | SQLite schema and transactional version-chain operations |
//! | [`naming`] | Upload name parsing and version id generation |
//! | [`config`] | `vault.toml` loading, merging, and validation |
//! | [`types`] | Serializable view objects returned to callers |
//! | [`output`] | CLI text formatting for every command |
//!
//! # Design Decisions
//!
//! ## Revert Overwrites Latest In Place
//!
//! Reverting does not add a version. The latest row's two artifact paths are
//! repointed at an older version's files, and every other row is left alone.
//! The history after the reverted-to point stays listable, and the files of
//! the version that was current before the revert stay on disk until the
//! image is deleted.
//!
//! ## One Output Format
//!
//! Every stored artifact, including the normalized upload, is a JPEG. Alpha
//! is dropped during normalization, so every later transformation starts from
//! an opaque image.
//!
//! ## Files Before Records
//!
//! Artifacts are written before the row that references them and deleted
//! before the rows that reference them. Whatever fails in between, the ledger
//! never names a file that does not exist; at worst a few unreferenced files
//! remain, and [`vault::Vault::check`] reports them.

pub mod config;
pub mod imaging;
pub mod ledger;
pub mod naming;
pub mod output;
pub mod store;
pub mod types;
pub mod vault;

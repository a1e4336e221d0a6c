use clap::{Parser, Subcommand};
use image_vault::config::{self, VaultConfig};
use image_vault::output;
use image_vault::store::ArtifactError;
use image_vault::vault::{Vault, VaultError};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "image-vault")]
#[command(about = "Versioned image storage with thumbnails and edit history")]
#[command(long_about = "\
Versioned image storage with thumbnails and edit history

Every upload is normalized to JPEG with a thumbnail and becomes version 1 of a
new image. Each edit appends a version; revert makes an earlier version
current again without adding one; delete removes the image, its history, and
its files.

Storage layout:

  uploads/
  └── cat-1a2b3c4d/                # one directory per image
      ├── 1a2b3c4d/                # version 1 (the upload)
      │   ├── 1a2b3c4d.jpeg
      │   └── thumbnail-1a2b3c4d.jpeg
      └── 5e6f7a8b/                # a later edit
          ├── 5e6f7a8b.jpeg
          └── thumbnail-5e6f7a8b.jpeg

Transformations: rotate (90° counter-clockwise), flip (horizontal),
grayscale, brightness.

Run 'image-vault gen-config' to generate a documented vault.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Override the artifact storage root
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    /// Override the ledger database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a JPEG or PNG file as a new image
    Upload { file: PathBuf },
    /// List all images
    List,
    /// Show one image
    Show { id: i64 },
    /// Apply a transformation to the latest version
    Edit { id: i64, transformation: String },
    /// List an image's versions, newest first
    Versions { id: i64 },
    /// Show one version of an image
    ShowVersion { id: i64, version_id: String },
    /// Make an earlier version current again
    Revert { id: i64, version_id: String },
    /// Delete an image with all its versions and files
    Delete { id: i64 },
    /// Write an image's latest version (or its original or thumbnail) to a file
    Export {
        id: i64,
        #[arg(long)]
        out: PathBuf,
        /// Export the normalized upload instead of the latest version
        #[arg(long, conflicts_with = "thumbnail")]
        original: bool,
        /// Export the latest version's thumbnail
        #[arg(long)]
        thumbnail: bool,
    },
    /// Write an artifact to a file by its stored path
    ExportPath {
        path: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Compare an image's records with the files on disk
    Check { id: i64 },
    /// Print a stock vault.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            error!(error = %e, "failed to load configuration");
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, status = e.status_code(), "command failed");
            if e.is_internal() {
                eprintln!("Error: internal error (see log for details)");
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<VaultConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(root) = &cli.storage_root {
        config.storage_root = root.clone();
    }
    if let Some(db) = &cli.database {
        config.database = db.clone();
    }
    Ok(config)
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, config: &VaultConfig) -> Result<(), VaultError> {
    let mut vault = Vault::open(config)?;

    match &cli.command {
        Command::Upload { file } => {
            let image = vault.upload_file(file)?;
            emit(cli.json, &image, || output::print_image(&image));
        }
        Command::List => {
            let images = vault.list_images()?;
            emit(cli.json, &images, || output::print_image_list(&images));
        }
        Command::Show { id } => {
            let image = vault.get_image(*id)?;
            emit(cli.json, &image, || output::print_image(&image));
        }
        Command::Edit { id, transformation } => {
            let version = vault.edit(*id, transformation)?;
            emit(cli.json, &version, || {
                output::print_edit(&version, transformation)
            });
        }
        Command::Versions { id } => {
            let history = vault.versions(*id)?;
            emit(cli.json, &history, || output::print_version_history(&history));
        }
        Command::ShowVersion { id, version_id } => {
            let version = vault.version(*id, version_id)?;
            emit(cli.json, &version, || output::print_version(&version));
        }
        Command::Revert { id, version_id } => {
            let outcome = vault.revert(*id, version_id)?;
            emit(cli.json, &outcome, || output::print_revert(&outcome));
        }
        Command::Delete { id } => {
            let outcome = vault.delete(*id)?;
            emit(cli.json, &outcome, || output::print_delete(&outcome));
        }
        Command::Export {
            id,
            out,
            original,
            thumbnail,
        } => {
            let source = if *original {
                vault.open_original(*id)?
            } else if *thumbnail {
                vault.open_latest_thumbnail(*id)?
            } else {
                vault.open_latest(*id)?
            };
            export(cli.json, out, source)?;
        }
        Command::ExportPath { path, out } => {
            let source = vault.open_by_path(path)?;
            export(cli.json, out, source)?;
        }
        Command::Check { id } => {
            let issues = vault.check(*id)?;
            emit(cli.json, &issues, || output::print_check(*id, &issues));
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

/// Print `value` as JSON, or fall back to the text printer.
fn emit<T: Serialize>(json: bool, value: &T, print_text: impl FnOnce()) {
    if !json {
        print_text();
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => error!(error = %e, "failed to serialize output"),
    }
}

#[derive(Serialize)]
struct Exported<'a> {
    out: &'a Path,
    bytes: usize,
}

/// Stream an artifact into `out`.
fn export(json: bool, out: &Path, mut source: fs::File) -> Result<(), VaultError> {
    let write_failed = |e: io::Error| {
        VaultError::ArtifactStore(ArtifactError::Io {
            path: out.to_path_buf(),
            source: e,
        })
    };
    let mut dest = fs::File::create(out).map_err(write_failed)?;
    let copied = io::copy(&mut source, &mut dest).map_err(write_failed)?;
    let bytes = copied as usize;

    let summary = Exported { out, bytes };
    emit(json, &summary, || output::print_export(out, bytes));
    Ok(())
}

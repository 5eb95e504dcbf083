//! Read-only export of the submission table and photos into a zip archive.
//!
//! Runs as an independent batch job next to a live store. It only reads:
//! the CSV sink replaces its file by rename, so the table is always seen
//! whole.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::{
    blob::{BlobError, BlobStore, DirBlobStore},
    config::SurveyConfig,
    core::table::SubmissionTable,
    persist::{PersistError, load_table},
    types::{SURVEYOR_COLUMN, TIMESTAMP_COLUMN},
};

/// Directory inside the archive holding photos.
pub const PHOTOS_ENTRY_DIR: &str = "photos";

/// Failure to build an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Neither a table nor any photo exists.
    #[error("no survey data at {table} or {photos}")]
    NothingToArchive {
        /// Table location checked.
        table: PathBuf,
        /// Photo directory checked.
        photos: PathBuf,
    },
    /// Reading the table failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// Reading a photo failed.
    #[error(transparent)]
    Blob(#[from] BlobError),
    /// Zip encoding failed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Writing the archive failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What went into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Written archive.
    pub path: PathBuf,
    /// Records in the exported table.
    pub records: usize,
    /// Photos copied.
    pub photos: usize,
}

/// Writes the table (optionally filtered by `filter`) and photos to `out`.
///
/// With a filter, only photos referenced by matching records are included.
pub fn build_archive(
    config: &SurveyConfig,
    out: &Path,
    filter: Option<&str>,
) -> Result<ArchiveSummary, ArchiveError> {
    let table_path = config.store_path();
    let blobs = DirBlobStore::new(config.photos_path());
    let photo_keys = blobs.list()?;

    let table_exists = table_path.exists();
    if !table_exists && photo_keys.is_empty() {
        return Err(ArchiveError::NothingToArchive {
            table: table_path,
            photos: config.photos_path().to_path_buf(),
        });
    }

    let table = if table_exists {
        let outcome = load_table(config)?;
        if let Some(warning) = &outcome.warning {
            tracing::warn!(reason = %warning.reason, "archiving an empty table");
        }
        outcome.table
    } else {
        tracing::warn!(path = %table_path.display(), "no submission table, archiving photos only");
        SubmissionTable::new()
    };
    let table = match filter {
        Some(term) => table.filtered(term),
        None => table,
    };
    let table = if table.columns().is_empty() {
        SubmissionTable::with_columns([TIMESTAMP_COLUMN, SURVEYOR_COLUMN])
    } else {
        table
    };

    let wanted: Option<HashSet<&str>> = filter.map(|_| {
        table
            .records()
            .iter()
            .filter_map(|r| r.attached_blob_ref.as_deref())
            .collect()
    });
    let photo_keys: Vec<&String> = photo_keys
        .iter()
        .filter(|key| wanted.as_ref().is_none_or(|w| w.contains(key.as_str())))
        .collect();

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = out.with_extension("zip.tmp");
    let written = write_zip(&tmp, config, &table, &blobs, &photo_keys);
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written?;
    fs::rename(&tmp, out)?;

    let summary = ArchiveSummary {
        path: out.to_path_buf(),
        records: table.len(),
        photos: photo_keys.len(),
    };
    tracing::info!(
        path = %summary.path.display(),
        records = summary.records,
        photos = summary.photos,
        "archive written"
    );
    Ok(summary)
}

fn write_zip(
    path: &Path,
    config: &SurveyConfig,
    table: &SubmissionTable,
    blobs: &DirBlobStore,
    photo_keys: &[&String],
) -> Result<(), ArchiveError> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let csv_name = Path::new(&config.table_file)
        .with_extension("csv")
        .to_string_lossy()
        .into_owned();
    zip.start_file(csv_name, options)?;
    zip.write_all(&table.to_csv_bytes()?)?;

    for key in photo_keys {
        zip.start_file(format!("{PHOTOS_ENTRY_DIR}/{key}"), options)?;
        zip.write_all(&blobs.get(key)?)?;
    }

    zip.finish()?.sync_all()?;
    Ok(())
}

//! Key/bytes storage for uploaded photos.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Failure of a blob store operation.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// Key is empty or would escape the store.
    #[error("invalid blob key `{0}`")]
    InvalidKey(String),
    /// No blob stored under the key.
    #[error("no blob named `{0}`")]
    NotFound(String),
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A photo could not be stored; the record was saved without it.
#[derive(Debug, thiserror::Error)]
#[error("failed to store photo `{key}`: {source}")]
pub struct BlobWriteFailure {
    /// Key the photo was going to be stored under.
    pub key: String,
    /// Underlying failure.
    #[source]
    pub source: BlobError,
}

/// Plain key to bytes storage.
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any previous value.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobError>;
    /// Every stored key, sorted.
    fn list(&self) -> Result<Vec<String>, BlobError>;
    /// Bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;
    /// Returns true when something is stored under `key`.
    fn contains(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.list()?.iter().any(|k| k == key))
    }
}

/// Blob store backed by one flat directory.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    /// Store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\'])
            && !key.contains('\0');
        if !valid {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for DirBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, BlobError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key)?;
        fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => BlobError::NotFound(key.to_string()),
            _ => BlobError::Io(err),
        })
    }

    fn contains(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.path_for(key)?.is_file())
    }
}

/// Storage key for a photo: `photo_<slug(name)>_<YYYYmmdd_HHMMSS>.<ext>`.
pub fn photo_key(name: &str, at: &DateTime<Utc>, extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };
    format!("photo_{}_{}.{}", slug(name), at.format("%Y%m%d_%H%M%S"), ext)
}

/// First key derived from `key` that `store` does not hold yet: `key`
/// itself, then `stem_2.ext`, `stem_3.ext` and so on.
pub fn unused_key(store: &dyn BlobStore, key: &str) -> Result<String, BlobError> {
    if !store.contains(key)? {
        return Ok(key.to_string());
    }
    let (stem, ext) = key.rsplit_once('.').unwrap_or((key, ""));
    let mut n = 2u32;
    loop {
        let candidate = if ext.is_empty() {
            format!("{stem}_{n}")
        } else {
            format!("{stem}_{n}.{ext}")
        };
        if !store.contains(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Lower-case alphanumeric slug; other runs of characters become `_`.
///
/// Returns `"anonymous"` when nothing alphanumeric remains.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_matches('_');
    if out.is_empty() {
        "anonymous".to_string()
    } else {
        out.to_string()
    }
}

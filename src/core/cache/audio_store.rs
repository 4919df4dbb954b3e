//! Content-addressed audio file storage.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::core::request::ContentKey;
use crate::core::tts::EdgeOutputFormat;

/// Errors from the audio store.
#[derive(Error, Debug)]
pub enum AudioStoreError {
    /// I/O error occurred during filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The filename cannot name a file inside the storage root.
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
}

pub type Result<T> = std::result::Result<T, AudioStoreError>;

/// Metadata of a stored audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudio {
    pub path: PathBuf,
    pub size: u64,
}

/// Maps a filename extension to its MIME type.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Replaces every path-unsafe character with `_`.
///
/// Separators, `: * ? " < > |`, whitespace and control characters are
/// replaced. The result never contains a path separator.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Suffix of in-progress writes.
const TEMP_SUFFIX: &str = ".tmp";

/// Writes synthesized audio under a storage root and resolves stored names.
#[derive(Debug, Clone)]
pub struct AudioStore {
    root: PathBuf,
}

impl AudioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of the audio for `key` in `format`.
    ///
    /// The extension follows the encoding actually requested from the
    /// backend, so unrecognised formats land in `.mp3` files.
    pub fn path_for(&self, key: &ContentKey, format: &str) -> PathBuf {
        let ext = EdgeOutputFormat::from_format(format).extension();
        self.root.join(format!("{key}{ext}"))
    }

    /// Writes `audio` to the path for `key`.
    ///
    /// Bytes go to a uniquely named temp file that is then renamed into
    /// place, so concurrent writers of the same key never expose a partial
    /// file. Rewriting a key overwrites it.
    pub async fn write(&self, audio: &Bytes, key: &ContentKey, format: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).await?;

        let path = self.path_for(key, format);
        let temp_path = self.root.join(format!(
            "{key}.{}{TEMP_SUFFIX}",
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(audio).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!("Stored {} bytes at {}", audio.len(), path.display());
        Ok(path)
    }

    /// Resolves an externally supplied filename to a path inside the root.
    ///
    /// The name is sanitized before it touches the filesystem. Names that
    /// sanitize to nothing, `.` or `..` are rejected.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let clean = sanitize_filename(filename);
        if clean.is_empty() || clean == "." || clean == ".." {
            return Err(AudioStoreError::InvalidFilename(filename.to_string()));
        }
        Ok(self.root.join(clean))
    }

    /// Metadata of a stored file, `None` if it does not exist.
    pub async fn stat(&self, path: &Path) -> Result<Option<StoredAudio>> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(StoredAudio {
                path: path.to_path_buf(),
                size: meta.len(),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a stored file. Returns whether a file was removed.
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes temp files left behind by interrupted writes whose last
    /// modification is before `cutoff`. Returns how many were removed.
    ///
    /// A missing storage root counts as empty.
    pub async fn remove_stale_temp_files(&self, cutoff: SystemTime) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Failed to read temp file metadata {}: {e}", entry.path().display());
                    continue;
                }
            };
            if modified < cutoff && self.remove(&entry.path()).await? {
                debug!("Removed stale temp file {}", entry.path().display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Public URL of a stored file: `<prefix>/<filename>`.
pub fn audio_url(prefix: &str, path: &Path) -> String {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{filename}", prefix.trim_end_matches('/'))
}

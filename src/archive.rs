//! Relocation of downloaded files into private archive folders.
//!
//! Browsers share one download folder across every download they perform, so
//! a finished file is moved into a folder that belongs to this download alone.
//! Folder names combine a timestamp, the process id, a process-wide counter
//! and a random suffix, and folders are created with `create_dir` so two
//! archivers can never end up sharing one.
//!
//! Moves are atomic from the point of view of other readers: a same-device
//! move is a single `rename`; a cross-device move copies into a hidden
//! temporary file next to the target, verifies its checksum, and only then
//! renames it into place.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

use crate::error::DownloadError;

/// Attempts at finding an unused folder name before giving up.
const MAX_FOLDER_ATTEMPTS: usize = 16;

/// Read buffer used when hashing files.
const HASH_BUFFER_BYTES: usize = 64 * 1024;

static FOLDER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A downloaded file after it was moved into its private folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    /// Final location.
    pub path: PathBuf,
    /// Where the browser originally saved the file.
    pub source: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

impl ArchivedFile {
    /// Final location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consumes the record and returns the final location.
    #[must_use]
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Moves files into unique folders below a root directory.
#[derive(Debug, Clone)]
pub struct Archiver {
    root: PathBuf,
}

impl Archiver {
    /// Creates an archiver rooted at `root`. The root is created on first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the archive.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh folder no other archive operation uses.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Archive`] if the folder cannot be created.
    pub async fn prepare_target_folder(&self) -> Result<PathBuf, DownloadError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DownloadError::archive(&self.root, e))?;

        for _ in 0..MAX_FOLDER_ATTEMPTS {
            let candidate = self.root.join(unique_folder_name());
            match tokio::fs::create_dir(&candidate).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(folder = %candidate.display(), "archive folder taken, retrying");
                }
                Err(e) => return Err(DownloadError::archive(candidate, e)),
            }
        }

        Err(DownloadError::archive(
            &self.root,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "could not allocate a unique archive folder",
            ),
        ))
    }

    /// Moves `file` into a new private folder, keeping its name.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Archive`] if the file has no name, the folder
    /// cannot be created, or the move fails.
    #[instrument(level = "debug", skip_all, fields(file = %file.display()))]
    pub async fn archive(&self, file: &Path) -> Result<ArchivedFile, DownloadError> {
        let Some(name) = file.file_name() else {
            return Err(DownloadError::archive(
                file,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            ));
        };

        let folder = self.prepare_target_folder().await?;
        let target = folder.join(name);
        let size = move_file(file, &target).await?;
        debug!(from = %file.display(), to = %target.display(), "moved the downloaded file");

        Ok(ArchivedFile {
            path: target,
            source: file.to_path_buf(),
            size,
        })
    }
}

fn unique_folder_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let counter = FOLDER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let salt: u32 = rand::thread_rng().r#gen();
    format!("{millis}_{}_{counter}_{salt:08x}", std::process::id())
}

/// Moves `source` to `target`, returning the size of the moved file.
///
/// # Errors
///
/// Returns [`DownloadError::Archive`] if the source cannot be read or the move fails.
pub async fn move_file(source: &Path, target: &Path) -> Result<u64, DownloadError> {
    let size = tokio::fs::metadata(source)
        .await
        .map_err(|e| DownloadError::archive(source, e))?
        .len();

    match tokio::fs::rename(source, target).await {
        Ok(()) => Ok(size),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %source.display(), to = %target.display(), "cross-device move, copying");
            copy_then_remove(source, target).await?;
            Ok(size)
        }
        Err(e) => Err(DownloadError::archive(target, e)),
    }
}

/// Copies through a hidden temporary file, verifies it, publishes it with a rename,
/// then removes the source.
pub(crate) async fn copy_then_remove(source: &Path, target: &Path) -> Result<(), DownloadError> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = target.with_file_name(format!(".{name}.part"));

    if let Err(error) = copy_verified(source, &partial).await {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await
            && cleanup.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %partial.display(), error = %cleanup, "failed to remove partial copy");
        }
        return Err(error);
    }

    tokio::fs::rename(&partial, target)
        .await
        .map_err(|e| DownloadError::archive(target, e))?;
    tokio::fs::remove_file(source)
        .await
        .map_err(|e| DownloadError::archive(source, e))?;
    Ok(())
}

async fn copy_verified(source: &Path, partial: &Path) -> Result<(), DownloadError> {
    tokio::fs::copy(source, partial)
        .await
        .map_err(|e| DownloadError::archive(partial, e))?;
    let copy = tokio::fs::OpenOptions::new()
        .write(true)
        .open(partial)
        .await
        .map_err(|e| DownloadError::archive(partial, e))?;
    copy.sync_all()
        .await
        .map_err(|e| DownloadError::archive(partial, e))?;

    let expected = sha256_of(source).await?;
    let actual = sha256_of(partial).await?;
    if expected != actual {
        return Err(DownloadError::archive(
            partial,
            io::Error::new(
                io::ErrorKind::InvalidData,
                "copied content differs from the downloaded file",
            ),
        ));
    }
    Ok(())
}

async fn sha256_of(path: &Path) -> Result<[u8; 32], DownloadError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DownloadError::archive(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_BYTES];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadError::archive(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().into())
}

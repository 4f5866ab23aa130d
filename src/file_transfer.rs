//! Copying and unpacking single files into the destination tree.
//!
//! A regular file is copied to `<dest>/<category>/<file name>`. An archive is
//! unpacked into `<dest>/archives/<stem>/` instead of being copied. Existing
//! destination files are overwritten without warning.

use crate::archive::{self, ArchiveError};
use crate::file_category::{Category, FileMapper};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info};

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file was copied byte for byte.
    Copied {
        destination: PathBuf,
        category: Category,
        bytes: u64,
    },
    /// The archive was extracted into its own folder.
    Unpacked { destination: PathBuf, entries: usize },
    /// Dry run: the file would have been written to `destination`.
    Planned {
        destination: PathBuf,
        category: Category,
    },
}

impl TransferOutcome {
    pub fn category(&self) -> Category {
        match self {
            Self::Copied { category, .. } | Self::Planned { category, .. } => *category,
            Self::Unpacked { .. } => Category::Archives,
        }
    }
}

/// Errors that can occur while transferring a single file.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Failed to create a category directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to copy a file into its category directory.
    #[error("Failed to copy {} to {}: {source}", path.display(), destination.display())]
    Copy {
        path: PathBuf,
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to unpack an archive.
    #[error("Failed to unpack {}: {source}", path.display())]
    Unpack {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },
    /// The path has no final component to name the copy after.
    #[error("File has no name component: {}", path.display())]
    MissingFileName { path: PathBuf },
}

/// Result type for file transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Creates every category folder under `dest_root`.
///
/// Folders that already exist are left alone, so calling this repeatedly is
/// harmless.
pub async fn ensure_category_dirs(dest_root: &Path) -> TransferResult<()> {
    for category in Category::ALL {
        let path = dest_root.join(category.dir_name());
        fs::create_dir_all(&path)
            .await
            .map_err(|source| TransferError::CreateDir { path, source })?;
    }
    Ok(())
}

/// Transfers single files into a destination tree.
///
/// Cheap to clone; the extension tables are shared.
#[derive(Debug, Clone)]
pub struct FileTransfer {
    mapper: Arc<FileMapper>,
    dry_run: bool,
}

impl FileTransfer {
    pub fn new(mapper: FileMapper) -> Self {
        Self {
            mapper: Arc::new(mapper),
            dry_run: false,
        }
    }

    /// In dry-run mode nothing is written; outcomes are `Planned`.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Copies or unpacks `file` into `dest_root`.
    ///
    /// The caller guarantees `file` is a regular file and that the category
    /// folders exist (see [`ensure_category_dirs`]). The result is logged here
    /// with the file's name, success or failure, and returned for the caller to
    /// aggregate; a failure only concerns this one file.
    pub async fn transfer(&self, file: &Path, dest_root: &Path) -> TransferResult<TransferOutcome> {
        let result = self.try_transfer(file, dest_root).await;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| file.to_string_lossy());

        match &result {
            Ok(TransferOutcome::Copied { destination, .. }) => {
                info!("Copied {} to {}", name, parent_display(destination));
            }
            Ok(TransferOutcome::Unpacked {
                destination,
                entries,
            }) => {
                info!(
                    "Unpacked {} to {} ({} entries)",
                    name,
                    destination.display(),
                    entries
                );
            }
            Ok(TransferOutcome::Planned { destination, .. }) => {
                info!("Would place {} at {}", name, destination.display());
            }
            Err(e) => {
                error!(file = %file.display(), "Error while copying {}: {}", name, e);
            }
        }

        result
    }

    async fn try_transfer(&self, file: &Path, dest_root: &Path) -> TransferResult<TransferOutcome> {
        let file_name = file
            .file_name()
            .ok_or_else(|| TransferError::MissingFileName {
                path: file.to_path_buf(),
            })?;
        let name = file_name.to_string_lossy();
        let category = self.mapper.classify(&name);
        let category_dir = dest_root.join(category.dir_name());

        if category.is_archive() {
            let (_, extension) = self.mapper.split_name(&name);
            let destination = category_dir.join(strip_extension(file_name, extension));
            if self.dry_run {
                return Ok(TransferOutcome::Planned {
                    destination,
                    category,
                });
            }
            let entries = unpack_blocking(file, &destination).await?;
            return Ok(TransferOutcome::Unpacked {
                destination,
                entries,
            });
        }

        let destination = category_dir.join(file_name);
        if self.dry_run {
            return Ok(TransferOutcome::Planned {
                destination,
                category,
            });
        }

        let bytes = fs::copy(file, &destination)
            .await
            .map_err(|source| TransferError::Copy {
                path: file.to_path_buf(),
                destination: destination.clone(),
                source,
            })?;

        Ok(TransferOutcome::Copied {
            destination,
            category,
            bytes,
        })
    }
}

/// Runs archive extraction on the blocking pool.
async fn unpack_blocking(file: &Path, destination: &Path) -> TransferResult<usize> {
    let archive_path = file.to_path_buf();
    let target = destination.to_path_buf();

    let joined = tokio::task::spawn_blocking(move || archive::unpack(&archive_path, &target)).await;

    let unpacked = joined.unwrap_or_else(|join_error| {
        Err(ArchiveError::Io {
            path: file.to_path_buf(),
            source: io::Error::other(join_error),
        })
    });

    unpacked.map_err(|source| TransferError::Unpack {
        path: file.to_path_buf(),
        source,
    })
}

/// Strips `extension` from `file_name` one dot-segment at a time, so bytes that
/// are not valid UTF-8 survive in the stem.
fn strip_extension<'a>(file_name: &'a OsStr, extension: Option<&str>) -> &'a OsStr {
    let segments = extension.map_or(0, |ext| ext.matches('.').count());
    (0..segments).fold(file_name, |stem, _| Path::new(stem).file_stem().unwrap_or(stem))
}

fn parent_display(path: &Path) -> std::path::Display<'_> {
    path.parent().unwrap_or(path).display()
}

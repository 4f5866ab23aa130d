//! Archive unpacking.
//!
//! Supports zip, plain tar and tar streams compressed with gzip, bzip2 or xz.
//! The container format is sniffed from the file's leading bytes and only
//! falls back to the file name when sniffing is inconclusive.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Enough bytes to reach the `ustar` magic of a tar header.
const SNIFF_LEN: usize = 512;

/// Errors that can occur while unpacking an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive could not be opened or read, or the target could not be written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Neither the content nor the name identifies a supported format.
    #[error("unsupported archive format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },
    /// The zip central directory or an entry is damaged.
    #[error("corrupt zip archive {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    /// The tar stream (or its compression layer) is damaged.
    #[error("corrupt tar archive {}: {source}", path.display())]
    Tar {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A supported archive container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveFormat {
    /// Detects the format of the archive at `path`.
    pub fn detect(path: &Path) -> Result<Self, ArchiveError> {
        let mut head = Vec::with_capacity(SNIFF_LEN);
        File::open(path)
            .and_then(|file| file.take(SNIFF_LEN as u64).read_to_end(&mut head))
            .map_err(|source| ArchiveError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_magic(&head)
            .or_else(|| Self::from_file_name(path))
            .ok_or_else(|| ArchiveError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
    }

    /// Identifies the format from the leading bytes of a file.
    pub fn from_magic(head: &[u8]) -> Option<Self> {
        let kind = infer::get(head)?;
        match kind.mime_type() {
            "application/zip" => Some(Self::Zip),
            "application/x-tar" => Some(Self::Tar),
            "application/gzip" => Some(Self::TarGz),
            "application/x-bzip2" => Some(Self::TarBz2),
            "application/x-xz" => Some(Self::TarXz),
            _ => None,
        }
    }

    /// Identifies the format from the file name suffix.
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        // Longer suffixes first so `.tar.gz` is not read as `.tar`.
        const SUFFIXES: [(&str, ArchiveFormat); 8] = [
            (".tar.bz2", ArchiveFormat::TarBz2),
            (".tar.gz", ArchiveFormat::TarGz),
            (".tar.xz", ArchiveFormat::TarXz),
            (".tbz2", ArchiveFormat::TarBz2),
            (".tgz", ArchiveFormat::TarGz),
            (".txz", ArchiveFormat::TarXz),
            (".tar", ArchiveFormat::Tar),
            (".zip", ArchiveFormat::Zip),
        ];
        SUFFIXES
            .into_iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, format)| format)
    }
}

/// Unpacks `archive` into `target_dir`, creating it if needed.
///
/// Returns the number of entries written. `target_dir` is only created once
/// the archive has been opened and its first entry read, so an unreadable
/// archive leaves nothing behind. A zip entry whose path would escape
/// `target_dir` fails the whole archive; such tar entries are skipped. This is
/// blocking code.
pub fn unpack(archive: &Path, target_dir: &Path) -> Result<usize, ArchiveError> {
    let format = ArchiveFormat::detect(archive)?;

    let file = File::open(archive).map_err(|source| ArchiveError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    match format {
        ArchiveFormat::Zip => unpack_zip(archive, reader, target_dir),
        ArchiveFormat::Tar => unpack_tar(archive, reader, target_dir),
        ArchiveFormat::TarGz => {
            unpack_tar(archive, flate2::bufread::GzDecoder::new(reader), target_dir)
        }
        ArchiveFormat::TarBz2 => {
            unpack_tar(archive, bzip2::bufread::BzDecoder::new(reader), target_dir)
        }
        ArchiveFormat::TarXz => {
            unpack_tar(archive, xz2::bufread::XzDecoder::new(reader), target_dir)
        }
    }
}

fn create_target(target_dir: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(target_dir).map_err(|source| ArchiveError::Io {
        path: target_dir.to_path_buf(),
        source,
    })
}

fn unpack_zip(
    archive: &Path,
    reader: BufReader<File>,
    target_dir: &Path,
) -> Result<usize, ArchiveError> {
    let zip_error = |source| ArchiveError::Zip {
        path: archive.to_path_buf(),
        source,
    };

    let mut zip = zip::ZipArchive::new(reader).map_err(zip_error)?;
    create_target(target_dir)?;
    let entries = zip.len();
    zip.extract(target_dir).map_err(zip_error)?;
    Ok(entries)
}

fn unpack_tar<R: Read>(archive: &Path, reader: R, target_dir: &Path) -> Result<usize, ArchiveError> {
    let tar_error = |source| ArchiveError::Tar {
        path: archive.to_path_buf(),
        source,
    };

    let mut tar = tar::Archive::new(reader);
    let mut entries = tar.entries().map_err(tar_error)?;
    // A damaged stream usually fails on the first header.
    let first = entries.next().transpose().map_err(tar_error)?;
    create_target(target_dir)?;

    let mut written = 0;
    for entry in first.into_iter().map(Ok).chain(entries) {
        let mut entry = entry.map_err(tar_error)?;
        if entry.unpack_in(target_dir).map_err(tar_error)? {
            written += 1;
        }
    }
    Ok(written)
}

//! Recursive walk of the source tree.
//!
//! Every child of a directory listing is visited concurrently: files go to
//! [`FileTransfer`], subdirectories are walked with the same destination root,
//! so nested folders are flattened into the category folders. Directories named
//! like a category folder are never entered; they are output of an earlier run,
//! or the destination itself when it lives inside the source.
//!
//! All children are futures joined on the calling task, which suspends at
//! every filesystem operation. A failure in one file or subtree is logged and
//! recorded in the [`Summary`]; it never stops its siblings.

use crate::config::CompiledFilters;
use crate::file_category::{Category, FileMapper, is_category_dir_name};
use crate::file_transfer::{FileTransfer, TransferOutcome, ensure_category_dirs};
use futures::future::{BoxFuture, FutureExt, join_all};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{self, DirEntry};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Errors that end the walk of one directory.
#[derive(Debug, Error)]
pub enum WalkError {
    /// The directory could not be listed.
    #[error("Error while reading folder {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The category folders could not be created under the destination.
    #[error("Error while preparing category folders: {source}")]
    CategoryDirs {
        #[source]
        source: crate::file_transfer::TransferError,
    },
}

/// Which stage a recorded failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A directory could not be listed; its files were not processed.
    DirectoryRead,
    /// A single file could not be copied or unpacked.
    Transfer,
}

/// One entry that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Aggregated result of a walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub dry_run: bool,
    /// Regular files copied into a category folder.
    pub files_copied: usize,
    pub bytes_copied: u64,
    pub archives_unpacked: usize,
    /// Files that would have been transferred (dry run only).
    pub files_planned: usize,
    /// Category folders, special files and filtered files left alone.
    pub skipped: usize,
    /// Files handled per category, whether copied, unpacked or planned.
    pub per_category: BTreeMap<Category, usize>,
    pub failures: Vec<Failure>,
}

impl Summary {
    fn new(source: &Path, destination: &Path, dry_run: bool) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            dry_run,
            ..Default::default()
        }
    }

    /// Total number of files transferred (or planned).
    pub fn files_handled(&self) -> usize {
        self.per_category.values().sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record_outcome(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Copied { bytes, .. } => {
                self.files_copied += 1;
                self.bytes_copied += bytes;
            }
            TransferOutcome::Unpacked { .. } => self.archives_unpacked += 1,
            TransferOutcome::Planned { .. } => self.files_planned += 1,
        }
        *self.per_category.entry(outcome.category()).or_insert(0) += 1;
    }

    fn record_failure(&mut self, path: &Path, kind: FailureKind, message: String) {
        self.failures.push(Failure {
            path: path.to_path_buf(),
            kind,
            message,
        });
    }

    /// Folds a subtree's counts into this summary.
    fn merge(&mut self, child: Summary) {
        self.files_copied += child.files_copied;
        self.bytes_copied += child.bytes_copied;
        self.archives_unpacked += child.archives_unpacked;
        self.files_planned += child.files_planned;
        self.skipped += child.skipped;
        for (category, count) in child.per_category {
            *self.per_category.entry(category).or_insert(0) += count;
        }
        self.failures.extend(child.failures);
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.dry_run {
            write!(
                f,
                "Dry run: {} files from {} would be sorted into {}.",
                self.files_planned,
                self.source.display(),
                self.destination.display()
            )?;
        } else {
            write!(
                f,
                "All files from {} have been copied to the appropriate folders in {}.",
                self.source.display(),
                self.destination.display()
            )?;
        }
        if self.has_failures() {
            write!(f, " {} entries could not be processed.", self.failures.len())?;
        }
        Ok(())
    }
}

/// Everything a walk needs besides its two paths.
#[derive(Debug, Clone)]
pub struct WalkContext {
    transfer: FileTransfer,
    filters: Arc<CompiledFilters>,
    permits: Option<Arc<Semaphore>>,
    source_root: Option<PathBuf>,
}

impl WalkContext {
    pub fn new(mapper: FileMapper) -> Self {
        Self {
            transfer: FileTransfer::new(mapper),
            filters: Arc::new(CompiledFilters::allow_all()),
            permits: None,
            source_root: None,
        }
    }

    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = Arc::new(filters);
        self
    }

    /// Bounds the number of file transfers running at once; 0 means unbounded.
    ///
    /// Only transfers take a permit. Sub-walks never do, so a deep tree cannot
    /// starve itself.
    pub fn with_max_concurrent_transfers(mut self, limit: usize) -> Self {
        self.permits = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.transfer = self.transfer.with_dry_run(dry_run);
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.transfer.is_dry_run()
    }

    /// Path filter rules are matched relative to this root. Defaults to the
    /// directory the walk starts in.
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }
}

impl Default for WalkContext {
    fn default() -> Self {
        Self::new(FileMapper::default())
    }
}

/// What visiting one directory entry produced.
enum Visit {
    Transferred(TransferOutcome),
    Walked(Summary),
    Skipped,
    Failed(Failure),
}

/// Sorts everything below `source_dir` into the category folders of `dest_root`.
///
/// `source_dir` must exist. Returns `Err` only when `source_dir` itself cannot
/// be listed or the category folders cannot be created; problems further down
/// are logged and listed in [`Summary::failures`].
pub async fn walk_and_sort(
    source_dir: &Path,
    dest_root: &Path,
    ctx: &WalkContext,
) -> Result<Summary, WalkError> {
    let root = ctx
        .source_root
        .clone()
        .unwrap_or_else(|| source_dir.to_path_buf());
    walk_dir(source_dir, dest_root, &root, ctx).await
}

fn walk_dir<'a>(
    dir: &'a Path,
    dest_root: &'a Path,
    source_root: &'a Path,
    ctx: &'a WalkContext,
) -> BoxFuture<'a, Result<Summary, WalkError>> {
    async move {
        let result = list_and_dispatch(dir, dest_root, source_root, ctx).await;
        if let Err(e) = &result {
            error!("{}", e);
        }
        result
    }
    .boxed()
}

async fn list_and_dispatch(
    dir: &Path,
    dest_root: &Path,
    source_root: &Path,
    ctx: &WalkContext,
) -> Result<Summary, WalkError> {
    if !ctx.is_dry_run() {
        ensure_category_dirs(dest_root)
            .await
            .map_err(|source| WalkError::CategoryDirs { source })?;
    }

    let mut summary = Summary::new(dir, dest_root, ctx.is_dry_run());

    let mut listing = fs::read_dir(dir).await.map_err(|source| WalkError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    loop {
        match listing.next_entry().await {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => break,
            Err(e) => {
                // The entries read so far are still processed.
                error!("Error while reading folder {}: {}", dir.display(), e);
                summary.record_failure(dir, FailureKind::DirectoryRead, e.to_string());
                break;
            }
        }
    }

    let visits = join_all(
        entries
            .iter()
            .map(|entry| visit(entry, dest_root, source_root, ctx)),
    )
    .await;

    for visit in visits {
        match visit {
            Visit::Transferred(outcome) => summary.record_outcome(&outcome),
            Visit::Walked(child) => summary.merge(child),
            Visit::Skipped => summary.skipped += 1,
            Visit::Failed(failure) => summary.failures.push(failure),
        }
    }

    Ok(summary)
}

async fn visit(
    entry: &DirEntry,
    dest_root: &Path,
    source_root: &Path,
    ctx: &WalkContext,
) -> Visit {
    let path = entry.path();

    let file_type = match entry.file_type().await {
        Ok(file_type) => file_type,
        Err(e) => {
            error!("Error while inspecting {}: {}", path.display(), e);
            return Visit::Failed(Failure {
                path,
                kind: FailureKind::Transfer,
                message: e.to_string(),
            });
        }
    };

    if file_type.is_file() {
        let relative = path.strip_prefix(source_root).unwrap_or(path.as_path());
        if !ctx.filters.should_include(relative) {
            debug!("Skipping filtered file {}", path.display());
            return Visit::Skipped;
        }

        let _permit = match &ctx.permits {
            Some(permits) => permits.acquire().await.ok(),
            None => None,
        };
        return match ctx.transfer.transfer(&path, dest_root).await {
            Ok(outcome) => Visit::Transferred(outcome),
            Err(e) => Visit::Failed(Failure {
                path,
                kind: FailureKind::Transfer,
                message: e.to_string(),
            }),
        };
    }

    if file_type.is_dir() {
        let name = entry.file_name();
        if is_category_dir_name(&name.to_string_lossy()) {
            debug!("Skipping already-sorted folder {}", path.display());
            return Visit::Skipped;
        }

        // walk_dir has already logged the error.
        return match walk_dir(&path, dest_root, source_root, ctx).await {
            Ok(child) => Visit::Walked(child),
            Err(e) => Visit::Failed(Failure {
                path,
                kind: FailureKind::DirectoryRead,
                message: e.to_string(),
            }),
        };
    }

    warn!(
        "Skipping {}: neither a regular file nor a directory",
        path.display()
    );
    Visit::Skipped
}

//! dirsort - sort a directory tree into category folders
//!
//! This library walks a source directory recursively, classifies each file by
//! its extension and copies it into `<dest>/<category>/`, unpacking archives
//! into `<dest>/archives/<stem>/` instead. Nested source folders are flattened
//! and one failing file or folder never stops the rest of the walk.

pub mod archive;
pub mod cli;
pub mod config;
pub mod dir_walker;
pub mod file_category;
pub mod file_transfer;
pub mod output;

pub use config::{CompiledFilters, ConfigError, SortConfig};
pub use dir_walker::{Failure, FailureKind, Summary, WalkContext, WalkError, walk_and_sort};
pub use file_category::{Category, FileMapper};
pub use file_transfer::{FileTransfer, TransferError, TransferOutcome, ensure_category_dirs};

pub use cli::{Cli, CliError, run_cli};

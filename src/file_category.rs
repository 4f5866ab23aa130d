//! File categorization by extension.
//!
//! Every file lands in exactly one [`Category`]. Extensions are matched on the
//! lower-cased file name as whole literal suffixes, longest first, so that
//! `backup.tar.gz` is recognized as an archive rather than an unknown `.gz`.
//!
//! # Examples
//!
//! ```
//! use dirsort::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.classify_extension(".JPG"), Category::Images);
//! assert_eq!(mapper.classify("backup.tar.gz"), Category::Archives);
//! assert_eq!(mapper.classify("notes.xyz"), Category::Others);
//! ```

use serde::Serialize;
use std::collections::HashMap;

/// A destination bucket for sorted files.
///
/// The declaration order is also the lookup priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Image files (JPG, PNG, SVG, etc.)
    Images,
    /// Video files (MP4, MKV, AVI, etc.)
    Videos,
    /// Audio files (MP3, WAV, FLAC)
    Audio,
    /// Document files (PDF, DOCX, TXT)
    Documents,
    /// Archives, which are unpacked instead of copied
    Archives,
    /// Anything not matched by the other categories
    Others,
}

impl Category {
    /// All categories, in lookup priority order.
    pub const ALL: [Category; 6] = [
        Category::Images,
        Category::Videos,
        Category::Audio,
        Category::Documents,
        Category::Archives,
        Category::Others,
    ];

    /// Returns the destination folder name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::file_category::Category;
    ///
    /// assert_eq!(Category::Images.dir_name(), "images");
    /// assert_eq!(Category::Others.dir_name(), "others");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Videos => "videos",
            Category::Audio => "audio",
            Category::Documents => "documents",
            Category::Archives => "archives",
            Category::Others => "others",
        }
    }

    /// Looks up a category by its folder name. Matching is exact.
    pub fn from_dir_name(name: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|category| category.dir_name() == name)
    }

    /// Archives are unpacked rather than copied.
    pub fn is_archive(&self) -> bool {
        matches!(self, Category::Archives)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Returns true if `name` is one of the category folder names.
///
/// Source directories with such a name are treated as already-sorted output.
pub fn is_category_dir_name(name: &str) -> bool {
    Category::from_dir_name(name).is_some()
}

/// Maps file extensions to categories.
///
/// Keys are stored ASCII lower-cased with their leading dot, and may span several
/// dot-segments (`.tar.gz`).
#[derive(Debug, Clone)]
pub struct FileMapper {
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    /// Creates a new `FileMapper` with the standard extension tables.
    pub fn new() -> Self {
        let mut mapper = Self {
            extension_map: HashMap::new(),
        };
        mapper.populate_standard_mappings();
        mapper
    }

    fn populate_standard_mappings(&mut self) {
        const TABLES: [(Category, &[&str]); 5] = [
            (
                Category::Images,
                &[
                    ".jpeg", ".png", ".jpg", ".svg", ".tif", ".tiff", ".webp", ".gif", ".bmp",
                ],
            ),
            (Category::Videos, &[".mp4", ".avi", ".mov", ".mkv"]),
            (Category::Audio, &[".mp3", ".wav", ".flac"]),
            (Category::Documents, &[".pdf", ".docx", ".txt"]),
            (
                Category::Archives,
                &[
                    ".zip", ".tar", ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tar.xz", ".txz",
                ],
            ),
        ];

        // Tables are walked in priority order; the first one to claim an extension keeps it.
        for (category, extensions) in TABLES {
            for ext in extensions {
                self.extension_map
                    .entry(normalize_extension(ext))
                    .or_insert(category);
            }
        }
    }

    /// Adds (or replaces) an extension to category mapping.
    ///
    /// The extension may be given with or without its leading dot.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map
            .insert(normalize_extension(ext), category);
    }

    /// Maps an extension such as `.JPG` to its category, `Others` if unknown.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::file_category::{Category, FileMapper};
    ///
    /// let mapper = FileMapper::default();
    /// assert_eq!(mapper.classify_extension(".pdf"), Category::Documents);
    /// assert_eq!(mapper.classify_extension(".Tar.Gz"), Category::Archives);
    /// assert_eq!(mapper.classify_extension(".exe"), Category::Others);
    /// ```
    pub fn classify_extension(&self, ext: &str) -> Category {
        self.extension_map
            .get(&normalize_extension(ext))
            .copied()
            .unwrap_or(Category::Others)
    }

    /// Classifies a file by its name.
    ///
    /// Every dot-separated suffix of the name is tried, longest first, so a
    /// known multi-part suffix wins over its last segment alone.
    pub fn classify(&self, file_name: &str) -> Category {
        self.known_suffix(file_name)
            .map(|(_, category)| category)
            .unwrap_or(Category::Others)
    }

    /// Splits a file name into its stem and extension.
    ///
    /// A known (possibly multi-part) suffix is split off whole; otherwise the
    /// last dot-segment is. A leading dot never starts an extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::file_category::FileMapper;
    ///
    /// let mapper = FileMapper::default();
    /// assert_eq!(mapper.split_name("backup.tar.gz"), ("backup", Some(".tar.gz")));
    /// assert_eq!(mapper.split_name("report.v2.pdf"), ("report.v2", Some(".pdf")));
    /// assert_eq!(mapper.split_name(".bashrc"), (".bashrc", None));
    /// ```
    pub fn split_name<'a>(&self, file_name: &'a str) -> (&'a str, Option<&'a str>) {
        let split_at = self
            .known_suffix(file_name)
            .map(|(idx, _)| idx)
            .or_else(|| file_name.rfind('.').filter(|&idx| idx > 0));

        match split_at {
            Some(idx) => (&file_name[..idx], Some(&file_name[idx..])),
            None => (file_name, None),
        }
    }

    /// Finds the longest mapped suffix of `file_name`, returning its byte offset.
    fn known_suffix(&self, file_name: &str) -> Option<(usize, Category)> {
        // ASCII lower-casing keeps byte offsets aligned with the original name.
        let lower = file_name.to_ascii_lowercase();
        lower
            .match_indices('.')
            .map(|(idx, _)| idx)
            .filter(|&idx| idx > 0)
            .find_map(|idx| {
                self.extension_map
                    .get(&lower[idx..])
                    .map(|category| (idx, *category))
            })
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds case the same way file names are folded in `known_suffix`.
fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim().to_ascii_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

use clap::Parser;
use dirsort::cli::{Cli, CliError, run_cli};
use dirsort::file_category::Category;
/// Integration tests for dirsort
///
/// These tests run complete sorts over temporary directory trees through the
/// same entry point the binary uses.
///
/// Test categories:
/// 1. End-to-end sorting
/// 2. Flattening and recursion termination
/// 3. Archive unpacking
/// 4. Partial failures
/// 5. Dry-run and configuration
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary workspace holding a source tree and an output directory.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("src")).expect("Failed to create source directory");
        TestFixture { temp_dir }
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn source(&self) -> PathBuf {
        self.root().join("src")
    }

    fn output(&self) -> PathBuf {
        self.root().join("out")
    }

    /// Create a file (and its parent folders) under the source tree.
    fn create_file(&self, rel_path: &str, content: &[u8]) {
        let file_path = self.source().join(rel_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content)
            .expect("Failed to write file content");
    }

    /// Create a zip archive under the source tree.
    fn create_zip(&self, rel_path: &str, entries: &[(&str, &[u8])]) {
        let file = File::create(self.source().join(rel_path)).expect("Failed to create archive");
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .expect("Failed to start zip entry");
            writer.write_all(content).expect("Failed to write zip entry");
        }
        writer.finish().expect("Failed to finish zip");
    }

    /// Create a gzip-compressed tarball under the source tree.
    fn create_tar_gz(&self, rel_path: &str, entries: &[(&str, &[u8])]) {
        let file = File::create(self.source().join(rel_path)).expect("Failed to create archive");
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, *content)
                .expect("Failed to append tar entry");
        }
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .expect("Failed to finish tarball");
    }

    /// Build CLI arguments for sorting `src` into `output`.
    fn cli(&self, output: &Path, extra: &[&str]) -> Cli {
        let mut args: Vec<OsString> = vec![
            "dirsort".into(),
            self.source().into_os_string(),
            output.as_os_str().to_os_string(),
        ];
        args.extend(extra.iter().map(OsString::from));
        Cli::try_parse_from(args).expect("Failed to parse arguments")
    }

    fn assert_file_exists(&self, path: &Path) {
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_not_exists(&self, path: &Path) {
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }

    /// List all files below `dir`, relative to it, sorted.
    fn list_files_recursive(dir: &Path) -> Vec<String> {
        let mut files = Vec::new();
        Self::walk_dir(dir, dir, &mut files);
        files.sort();
        files
    }

    fn walk_dir(base: &Path, dir: &Path, files: &mut Vec<String>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    let rel = path.strip_prefix(base).expect("Path outside base");
                    files.push(rel.to_string_lossy().replace('\\', "/"));
                } else if path.is_dir() {
                    Self::walk_dir(base, &path, files);
                }
            }
        }
    }
}

// ============================================================================
// Test Suite 1: End-to-end sorting
// ============================================================================

#[tokio::test]
async fn test_end_to_end_sort() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.jpg", b"jpg");
    fixture.create_file("clip.mp4", b"mp4");
    fixture.create_file("song.mp3", b"mp3");
    fixture.create_file("report.pdf", b"%PDF-1.4");
    fixture.create_file("notes.xyz", b"xyz");
    fixture.create_file("nested/old.png", b"png");

    let out = fixture.output();
    let summary = run_cli(&fixture.cli(&out, &[]))
        .await
        .expect("Sort should succeed");

    assert_eq!(
        TestFixture::list_files_recursive(&out),
        vec![
            "audio/song.mp3",
            "documents/report.pdf",
            "images/old.png",
            "images/photo.jpg",
            "others/notes.xyz",
            "videos/clip.mp4",
        ]
    );
    for category in Category::ALL {
        assert!(out.join(category.dir_name()).is_dir());
    }
    assert_eq!(summary.files_copied, 6);
    assert_eq!(summary.per_category.get(&Category::Images), Some(&2));
    assert!(!summary.has_failures());
}

#[tokio::test]
async fn test_sources_are_left_untouched() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.jpg", b"original bytes");

    run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed");

    assert_eq!(
        fs::read(fixture.source().join("photo.jpg")).unwrap(),
        b"original bytes"
    );
    assert_eq!(
        fs::read(fixture.output().join("images/photo.jpg")).unwrap(),
        b"original bytes"
    );
}

#[tokio::test]
async fn test_extensions_are_case_insensitive() {
    let fixture = TestFixture::new();
    fixture.create_file("SHOUT.JPG", b"jpg");
    fixture.create_file("Mixed.Flac", b"flac");

    run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed");

    fixture.assert_file_exists(&fixture.output().join("images/SHOUT.JPG"));
    fixture.assert_file_exists(&fixture.output().join("audio/Mixed.Flac"));
}

#[tokio::test]
async fn test_empty_source_creates_only_category_folders() {
    let fixture = TestFixture::new();

    let summary = run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed");

    assert!(TestFixture::list_files_recursive(&fixture.output()).is_empty());
    assert_eq!(fs::read_dir(fixture.output()).unwrap().count(), 6);
    assert_eq!(summary.files_handled(), 0);
}

#[tokio::test]
async fn test_missing_source_is_reported() {
    let fixture = TestFixture::new();
    fs::remove_dir(fixture.source()).unwrap();

    let result = run_cli(&fixture.cli(&fixture.output(), &[])).await;

    assert!(matches!(result, Err(CliError::SourceNotFound(_))));
    fixture.assert_not_exists(&fixture.output());
}

#[tokio::test]
async fn test_source_that_is_a_file_is_rejected() {
    let fixture = TestFixture::new();
    let file = fixture.root().join("single.txt");
    fs::write(&file, b"text").unwrap();

    let cli = Cli::try_parse_from([
        OsString::from("dirsort"),
        file.into_os_string(),
        fixture.output().into_os_string(),
    ])
    .unwrap();

    assert!(matches!(
        run_cli(&cli).await,
        Err(CliError::SourceNotDirectory(_))
    ));
}

// ============================================================================
// Test Suite 2: Flattening and recursion termination
// ============================================================================

#[tokio::test]
async fn test_nested_folders_are_flattened() {
    let fixture = TestFixture::new();
    fixture.create_file("a/photo.jpg", b"a");
    fixture.create_file("b/c/d/photo2.jpg", b"b");

    run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed");

    assert_eq!(
        TestFixture::list_files_recursive(&fixture.output().join("images")),
        vec!["photo.jpg", "photo2.jpg"]
    );
}

#[tokio::test]
async fn test_destination_inside_source_is_not_resorted() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.jpg", b"jpg");
    fixture.create_file("docs/readme.txt", b"txt");
    let out = fixture.source().join("sorted_files");

    run_cli(&fixture.cli(&out, &[])).await.expect("First run failed");
    let second = run_cli(&fixture.cli(&out, &[]))
        .await
        .expect("Second run failed");

    assert_eq!(second.files_copied, 2);
    assert_eq!(
        TestFixture::list_files_recursive(&out),
        vec!["documents/readme.txt", "images/photo.jpg"]
    );
}

#[tokio::test]
async fn test_duplicate_names_last_write_wins() {
    let fixture = TestFixture::new();
    fixture.create_file("a/cover.png", b"first");
    fixture.create_file("b/cover.png", b"second");

    run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed");

    let content = fs::read(fixture.output().join("images/cover.png")).unwrap();
    assert!(content == b"first" || content == b"second");
    assert_eq!(
        TestFixture::list_files_recursive(&fixture.output()),
        vec!["images/cover.png"]
    );
}

// ============================================================================
// Test Suite 3: Archive unpacking
// ============================================================================

#[tokio::test]
async fn test_zip_is_unpacked_into_stem_folder() {
    let fixture = TestFixture::new();
    fixture.create_zip("archive.zip", &[("a.txt", b"a"), ("sub/b.txt", b"b")]);

    let summary = run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed");

    assert_eq!(
        TestFixture::list_files_recursive(&fixture.output().join("archives")),
        vec!["archive/a.txt", "archive/sub/b.txt"]
    );
    fixture.assert_not_exists(&fixture.output().join("archives/archive.zip"));
    assert_eq!(summary.archives_unpacked, 1);
    assert_eq!(summary.files_copied, 0);
}

#[tokio::test]
async fn test_tar_gz_uses_whole_suffix_for_stem() {
    let fixture = TestFixture::new();
    fixture.create_tar_gz("backup.tar.gz", &[("db.sql", b"select 1;")]);

    run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed");

    assert_eq!(
        fs::read(fixture.output().join("archives/backup/db.sql")).unwrap(),
        b"select 1;"
    );
    fixture.assert_not_exists(&fixture.output().join("others/backup.tar.gz"));
}

// ============================================================================
// Test Suite 4: Partial failures
// ============================================================================

#[tokio::test]
async fn test_corrupt_archive_does_not_stop_the_run() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", b"a");
    fixture.create_file("broken.zip", b"PK\x03\x04 this is not a zip");
    fixture.create_file("nested/b.png", b"b");

    let summary = run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed despite the bad archive");

    assert_eq!(summary.files_copied, 2);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].path.ends_with("broken.zip"));
    fixture.assert_file_exists(&fixture.output().join("documents/a.txt"));
    fixture.assert_file_exists(&fixture.output().join("images/b.png"));
    fixture.assert_not_exists(&fixture.output().join("archives/broken"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_file_is_isolated() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = TestFixture::new();
    for i in 0..5 {
        fixture.create_file(&format!("file{i}.txt"), b"data");
    }
    let locked = fixture.source().join("file2.txt");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // Privileged users can read it anyway; nothing to isolate.
        return;
    }

    let summary = run_cli(&fixture.cli(&fixture.output(), &[]))
        .await
        .expect("Sort should succeed");

    assert_eq!(summary.files_copied, 4);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].path.ends_with("file2.txt"));
    for i in [0, 1, 3, 4] {
        fixture.assert_file_exists(&fixture.output().join(format!("documents/file{i}.txt")));
    }
}

// ============================================================================
// Test Suite 5: Dry-run and configuration
// ============================================================================

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.jpg", b"jpg");
    fixture.create_zip("bundle.zip", &[("x.txt", b"x")]);

    let summary = run_cli(&fixture.cli(&fixture.output(), &["--dry-run"]))
        .await
        .expect("Dry run should succeed");

    fixture.assert_not_exists(&fixture.output());
    assert_eq!(summary.files_planned, 2);
    assert!(summary.dry_run);
}

#[tokio::test]
async fn test_config_filters_and_extra_extensions() {
    let fixture = TestFixture::new();
    fixture.create_file("shot.heic", b"heic");
    fixture.create_file("draft.bak", b"bak");
    fixture.create_file("node_modules/pkg/logo.png", b"png");
    fixture.create_file("keep.png", b"png");

    let config_path = fixture.root().join("dirsort.toml");
    fs::write(
        &config_path,
        r#"
[filters.exclude]
extensions = ["bak"]
patterns = ["node_modules/**"]

[categories]
images = [".heic"]

[transfer]
max_concurrent_transfers = 2
"#,
    )
    .unwrap();

    let summary = run_cli(&fixture.cli(
        &fixture.output(),
        &["--config", config_path.to_str().unwrap()],
    ))
    .await
    .expect("Sort should succeed");

    assert_eq!(
        TestFixture::list_files_recursive(&fixture.output()),
        vec!["images/keep.png", "images/shot.heic"]
    );
    assert_eq!(summary.skipped, 2);
}

#[tokio::test]
async fn test_invalid_config_stops_before_writing() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.jpg", b"jpg");
    let config_path = fixture.root().join("bad.toml");
    fs::write(&config_path, "[filters.exclude]\nregex = [\"(unclosed\"]\n").unwrap();

    let result = run_cli(&fixture.cli(
        &fixture.output(),
        &["--config", config_path.to_str().unwrap()],
    ))
    .await;

    assert!(matches!(result, Err(CliError::Config(_))));
    fixture.assert_not_exists(&fixture.output());
}

//! Markdown file discovery.
//!
//! The order returned here is the chapter order of the final document, so
//! results are always sorted by full path.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Return the markdown files named by `path`.
///
/// A file is returned on its own when it has an `.md` extension. A directory
/// is searched (recursively when `recursive` is set) and every markdown file
/// beneath it is returned in sorted path order. Anything else yields an empty
/// list.
pub fn collect_markdown_files(path: &Path, recursive: bool) -> Vec<PathBuf> {
    if path.is_file() {
        return if is_markdown(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }
    if !path.is_dir() {
        return Vec::new();
    }

    let mut walker = WalkDir::new(path).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .map(|e| e.into_path())
        .filter(|p| is_markdown(p) && p.is_file())
        .collect();

    files.sort();
    files
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("02-getting-started.md"), "# Two").unwrap();
        fs::write(root.join("01-intro.md"), "# One").unwrap();
        fs::write(root.join("notes.txt"), "not markdown").unwrap();
        fs::create_dir(root.join("advanced")).unwrap();
        fs::write(root.join("advanced").join("03-advanced.md"), "# Three").unwrap();
        fs::create_dir(root.join("folder.md")).unwrap();
        dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn single_markdown_file() {
        let dir = sample_dir();
        let file = dir.path().join("01-intro.md");
        assert_eq!(collect_markdown_files(&file, true), vec![file]);
    }

    #[test]
    fn non_markdown_file_is_empty() {
        let dir = sample_dir();
        assert!(collect_markdown_files(&dir.path().join("notes.txt"), true).is_empty());
    }

    #[test]
    fn uppercase_extension_counts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("README.MD");
        fs::write(&file, "# Readme").unwrap();
        assert_eq!(collect_markdown_files(&file, true), vec![file]);
    }

    #[test]
    fn recursive_directory() {
        let dir = sample_dir();
        let files = collect_markdown_files(dir.path(), true);
        assert_eq!(
            names(&files),
            vec!["01-intro.md", "02-getting-started.md", "03-advanced.md"]
        );
    }

    #[test]
    fn non_recursive_directory() {
        let dir = sample_dir();
        let files = collect_markdown_files(dir.path(), false);
        assert_eq!(names(&files), vec!["01-intro.md", "02-getting-started.md"]);
    }

    #[test]
    fn sorted_by_full_path() {
        let dir = sample_dir();
        let files = collect_markdown_files(dir.path(), true);
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_markdown_files(dir.path(), true).is_empty());
    }

    #[test]
    fn missing_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_markdown_files(&dir.path().join("nope"), true).is_empty());
    }
}

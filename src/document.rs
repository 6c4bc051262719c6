//! Source loading shared by the PDF and EPUB assemblers: validates the input
//! path, collects the markdown files, and converts each one into a chapter.

use std::fs;
use std::path::{Path, PathBuf};

use crate::collect::collect_markdown_files;
use crate::config::{title_case, DocumentMeta, WeaverConfig};
use crate::convert::{convert_markdown, Heading};
use crate::error::{Result, WeaverError};

/// One converted markdown file.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub source: PathBuf,
    /// First `<h1>` text, else derived from the file stem.
    pub title: String,
    pub html: String,
    pub headings: Vec<Heading>,
}

/// The validated input of a run.
#[derive(Debug, Clone)]
pub struct SourceSet {
    /// Canonical input path.
    pub input: PathBuf,
    pub files: Vec<PathBuf>,
    pub meta: DocumentMeta,
}

impl SourceSet {
    /// Resolve `input`, collect its markdown files, and derive metadata.
    pub fn load(input: &Path, config: &WeaverConfig) -> Result<Self> {
        if !input.exists() {
            return Err(WeaverError::PathNotFound {
                path: input.to_path_buf(),
            });
        }
        let input = input
            .canonicalize()
            .map_err(|e| WeaverError::io(input, e))?;

        let files = collect_markdown_files(&input, config.recursive);
        if files.is_empty() {
            return Err(WeaverError::NoMarkdownFiles { path: input });
        }

        let version = config.export_version();
        let meta = DocumentMeta::for_input(&input, config.title.as_deref(), version);
        log::info!(
            "Found {} markdown file(s) in {} (v{})",
            files.len(),
            input.display(),
            meta.version
        );

        Ok(Self { input, files, meta })
    }

    /// Read and convert every file, in collection order.
    pub fn chapters(&self) -> Result<Vec<Chapter>> {
        self.files.iter().map(|f| load_chapter(f)).collect()
    }
}

fn load_chapter(path: &Path) -> Result<Chapter> {
    let display = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
    log::info!("  Processing: {display}");

    let markdown = fs::read_to_string(path).map_err(|e| WeaverError::io(path, e))?;
    let converted = convert_markdown(&markdown);
    let title = match converted.first_h1() {
        Some(h1) if !h1.trim().is_empty() => h1.trim().to_string(),
        _ => stem_title(path),
    };

    Ok(Chapter {
        source: path.to_path_buf(),
        title,
        html: converted.html,
        headings: converted.headings,
    })
}

/// `01-getting-started` → `Getting Started`; a stem without `-` is used whole.
pub fn stem_title(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let rest = match stem.split_once('-') {
        Some((_, rest)) => rest,
        None => stem.as_str(),
    };
    title_case(&rest.replace('-', " "))
}

//! Run configuration and the branding metadata stamped on every artifact.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Datelike;

/// Copyright holder written into PDF footers, EPUB metadata, and chapters.
pub const AUTHOR_ATTRIBUTION: &str = "Jim Hodapp / Pybites";

/// Distribution notice printed next to the copyright line.
pub const SHARE_NOTICE: &str = "Exclusive cohort materials - Please do not share";

/// Version used when no version marker file is present.
pub const DEFAULT_VERSION: &str = "0.0";

/// Default name of the version marker file.
pub const VERSION_FILE: &str = "EXPORT_VERSION";

/// Which artifacts to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pdf,
    Epub,
    Both,
}

impl OutputFormat {
    pub fn wants_pdf(self) -> bool {
        matches!(self, Self::Pdf | Self::Both)
    }

    pub fn wants_epub(self) -> bool {
        matches!(self, Self::Epub | Self::Both)
    }
}

/// Options for one conversion run.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// Directory artifacts are written to; created if absent.
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    /// Overrides the title derived from the input path.
    pub title: Option<String>,
    /// Diagonal watermark text for PDF pages. EPUB ignores it.
    pub watermark: Option<String>,
    /// Search input directories recursively.
    pub recursive: bool,
    /// Version marker file; its trimmed content becomes `v<version>`.
    pub version_file: PathBuf,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            format: OutputFormat::Pdf,
            title: None,
            watermark: None,
            recursive: true,
            version_file: PathBuf::from(VERSION_FILE),
        }
    }
}

impl WeaverConfig {
    /// Read the export version, falling back to [`DEFAULT_VERSION`].
    pub fn export_version(&self) -> String {
        read_export_version(&self.version_file)
    }
}

/// Trimmed content of `path`, or `"0.0"` when it cannot be read.
pub fn read_export_version(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(s) => s.trim().to_string(),
        Err(_) => DEFAULT_VERSION.to_string(),
    }
}

/// Naming and branding shared by the PDF and EPUB assemblers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    /// File stem of a single input, or the directory name.
    pub name: String,
    pub title: String,
    pub version: String,
    pub year: i32,
}

impl DocumentMeta {
    /// Derive metadata for `input` (expected to be an absolute path).
    pub fn for_input(input: &Path, title: Option<&str>, version: String) -> Self {
        let name = document_name(input);
        let title = match title {
            Some(t) => t.to_string(),
            None => derive_title(&name),
        };
        Self {
            name,
            title,
            version,
            year: chrono::Local::now().year(),
        }
    }

    /// `<name>_v<version>.<ext>`
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}_v{}.{}", self.name, self.version, ext)
    }

    /// `(C) <year> <author> | v<version>`, as shown in PDF footers.
    pub fn copyright_line(&self) -> String {
        format!("(C) {} {} | v{}", self.year, AUTHOR_ATTRIBUTION, self.version)
    }
}

fn document_name(input: &Path) -> String {
    let part = if input.is_file() {
        input.file_stem()
    } else {
        input.file_name()
    };
    part.map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// `rust-basics_intro` → `Rust Basics Intro`.
pub fn derive_title(name: &str) -> String {
    title_case(&name.replace(['-', '_'], " "))
}

/// Uppercase the first letter of every run of letters and lowercase the
/// rest. Digits and punctuation start a new run (`2nd` → `2Nd`).
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

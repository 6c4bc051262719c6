//! Error types for mdweaver.
//!
//! Only two conditions are user-facing: the input path is missing, or it holds
//! no markdown. Everything else (I/O, rendering, packaging) propagates as-is;
//! there is no partial-output policy.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the mdweaver library.
#[derive(Debug, Error)]
pub enum WeaverError {
    /// The input path does not exist.
    #[error("Path not found: {}", path.display())]
    PathNotFound { path: PathBuf },

    /// The input path exists but contains no `.md` files.
    #[error("No markdown files found in {}", path.display())]
    NoMarkdownFiles { path: PathBuf },

    /// Reading an input or writing an artifact failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The print engine could not produce a PDF.
    #[error("PDF rendering failed: {0}")]
    Render(String),

    /// The EPUB container could not be written.
    #[error("EPUB packaging failed: {0}")]
    Epub(String),
}

impl WeaverError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<zip::result::ZipError> for WeaverError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Epub(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WeaverError>;

//! # mdweaver – markdown → branded PDF and EPUB
//!
//! A markdown file or directory becomes one document. Each file passes
//! through these stages:
//!
//! 1. **Normalize** – escape generic-type syntax, separate lists ([`normalize`])
//! 2. **Convert** – markdown → HTML with highlighted code ([`convert`])
//! 3. **Assemble** – PDF via the print engine ([`pdf`]) or EPUB ([`epub`])
//!
//! The print engine renders HTML + CSS to PDF:
//!
//! 1. **Parse** – HTML string → DOM tree ([`dom`]), CSS → rules ([`css`])
//! 2. **Style** – cascade and inheritance ([`style`])
//! 3. **Layout** – block flow with Taffy, inline text wrapping ([`layout`])
//! 4. **Paginate** – split into pages, stamp footers ([`pagination`])
//! 5. **Render** – emit PDF bytes via printpdf ([`render`])

use std::path::{Path, PathBuf};

pub mod collect;
pub mod config;
pub mod convert;
pub mod css;
pub mod document;
pub mod dom;
pub mod epub;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod layout_config;
pub mod normalize;
pub mod pagination;
pub mod pdf;
pub mod pipeline;
pub mod render;
pub mod samples;
pub mod style;
pub mod stylesheet;

// Re-exports for convenience
pub use config::{OutputFormat, WeaverConfig};
pub use convert::{convert_markdown, markdown_to_html};
pub use document::{Chapter, SourceSet};
pub use error::{Result, WeaverError};
pub use normalize::normalize_markdown;
pub use pipeline::{generate_pdf, PageOrientation};

/// Convert `input` into the formats selected by `config`, returning the
/// written artifact paths (PDF first).
pub fn run(input: &Path, config: &WeaverConfig) -> Result<Vec<PathBuf>> {
    let sources = SourceSet::load(input, config)?;
    let chapters = sources.chapters()?;

    let mut written = Vec::new();
    if config.format.wants_pdf() {
        written.push(pdf::write_pdf(
            &sources.meta,
            &chapters,
            &config.output_dir,
            config.watermark.as_deref(),
        )?);
    }
    if config.format.wants_epub() {
        written.push(epub::write_epub(&sources.meta, &chapters, &config.output_dir)?);
    }
    Ok(written)
}

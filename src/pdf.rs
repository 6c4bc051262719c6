//! PDF assembly: chapters become `.lesson` sections of one HTML document that
//! the print engine renders with the print stylesheet.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DocumentMeta;
use crate::convert::escape_html;
use crate::document::Chapter;
use crate::error::{Result, WeaverError};
use crate::layout_config::LayoutConfig;
use crate::pipeline::{compute_layout_config, PipelineConfig};
use crate::render::render_pdf;
use crate::stylesheet::print_css;

/// Wrap chapters into a complete HTML document.
pub fn assemble_html(meta: &DocumentMeta, chapters: &[Chapter]) -> String {
    let sections: Vec<String> = chapters
        .iter()
        .map(|c| format!("<div class=\"lesson\">\n{}\n</div>", c.html))
        .collect();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\">\n    <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(&meta.title),
        sections.join("\n")
    )
}

/// Paginate `chapters` under the print stylesheet.
pub fn layout_document(meta: &DocumentMeta, chapters: &[Chapter], watermark: Option<&str>) -> Result<LayoutConfig> {
    let html = assemble_html(meta, chapters);
    let css = print_css(meta, watermark);
    let config = PipelineConfig {
        title: meta.title.clone(),
        ..PipelineConfig::default()
    };
    compute_layout_config(&html, &css, &config)
}

/// Render `chapters` to PDF bytes.
pub fn render_document(meta: &DocumentMeta, chapters: &[Chapter], watermark: Option<&str>) -> Result<Vec<u8>> {
    let layout = layout_document(meta, chapters, watermark)?;
    log::debug!("PDF has {} page(s)", layout.pages.len());
    render_pdf(&layout)
}

/// Write `<output_dir>/<name>_v<version>.pdf` and return its path.
pub fn write_pdf(
    meta: &DocumentMeta,
    chapters: &[Chapter],
    output_dir: &Path,
    watermark: Option<&str>,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).map_err(|e| WeaverError::io(output_dir, e))?;
    let output = output_dir.join(meta.file_name("pdf"));
    log::info!("Generating PDF: {}", output.display());

    let bytes = render_document(meta, chapters, watermark)?;
    fs::write(&output, bytes).map_err(|e| WeaverError::io(&output, e))?;

    log::info!("PDF generated successfully: {}", output.display());
    Ok(output)
}

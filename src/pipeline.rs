//! Pipeline – ties together parsing, styling, layout, pagination, and
//! rendering into a single function call.

use crate::css::{parse_stylesheet, PageRule};
use crate::dom::{document_title, parse_html};
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::layout_config::LayoutConfig;
use crate::pagination::{paginate, PageDecorations, PageGeometry};
use crate::render::render_pdf;
use crate::style::{build_styled_document, parse_length, ROOT_FONT_SIZE};
use crate::Result;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Configuration for the PDF generation pipeline. Values here are defaults;
/// an `@page` rule in the stylesheet overrides size and margins.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// PDF metadata title used when the document has no `<title>`.
    pub title: String,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Top, right, bottom, left margins in points.
    pub margins: [f32; 4],
    /// Swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "mdweaver output".to_string(),
            page_width: 595.28,
            page_height: 841.89,
            margins: [40.0; 4],
            orientation: PageOrientation::Portrait,
        }
    }
}

/// Named page sizes in points, portrait.
fn named_page_size(name: &str) -> Option<(f32, f32)> {
    Some(match name.to_ascii_lowercase().as_str() {
        "a3" => (841.89, 1190.55),
        "a4" => (595.28, 841.89),
        "a5" => (419.53, 595.28),
        "b5" => (498.9, 708.66),
        "letter" => (612.0, 792.0),
        "legal" => (612.0, 1008.0),
        "ledger" => (792.0, 1224.0),
        _ => return None,
    })
}

/// Expand a 1–4 value box shorthand into `[top, right, bottom, left]`.
fn box_shorthand(value: &str) -> Option<[f32; 4]> {
    let parts: Option<Vec<f32>> = value
        .split_whitespace()
        .map(|v| parse_length(v, ROOT_FONT_SIZE))
        .collect();
    Some(match parts?.as_slice() {
        [a] => [*a; 4],
        [v, h] => [*v, *h, *v, *h],
        [t, h, b] => [*t, *h, *b, *h],
        [t, r, b, l] => [*t, *r, *b, *l],
        _ => return None,
    })
}

impl PipelineConfig {
    /// Effective page width after applying orientation.
    pub fn effective_width(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    /// Effective page height after applying orientation.
    pub fn effective_height(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    /// Create an A4 landscape config.
    pub fn a4_landscape() -> Self {
        Self {
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }

    /// Apply `size` and `margin*` from an `@page` rule.
    pub fn with_page_rule(mut self, page: &PageRule) -> Self {
        if let Some(size) = page.get("size") {
            self.apply_size(size);
        }
        if let Some(m) = page.get("margin").and_then(box_shorthand) {
            self.margins = m;
        }
        for (i, side) in ["margin-top", "margin-right", "margin-bottom", "margin-left"]
            .iter()
            .enumerate()
        {
            if let Some(v) = page.get(side).and_then(|v| parse_length(v, ROOT_FONT_SIZE)) {
                self.margins[i] = v;
            }
        }
        self
    }

    fn apply_size(&mut self, size: &str) {
        let mut lengths = Vec::new();
        for word in size.split_whitespace() {
            match word.to_ascii_lowercase().as_str() {
                "portrait" => self.orientation = PageOrientation::Portrait,
                "landscape" => self.orientation = PageOrientation::Landscape,
                "auto" => {}
                other => {
                    if let Some((w, h)) = named_page_size(other) {
                        self.page_width = w;
                        self.page_height = h;
                    } else if let Some(len) = parse_length(other, ROOT_FONT_SIZE) {
                        lengths.push(len);
                    } else {
                        log::warn!("Ignoring unknown @page size '{other}'");
                    }
                }
            }
        }
        match lengths.as_slice() {
            [side] => {
                self.page_width = *side;
                self.page_height = *side;
            }
            [w, h, ..] => {
                self.page_width = *w;
                self.page_height = *h;
                self.orientation = PageOrientation::Portrait;
            }
            [] => {}
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        let [margin_top, margin_right, margin_bottom, margin_left] = self.margins;
        PageGeometry {
            width: self.effective_width(),
            height: self.effective_height(),
            margin_top,
            margin_right,
            margin_bottom,
            margin_left,
        }
    }
}

/// Full pipeline: HTML string + print stylesheet → PDF bytes.
///
/// Returns `(pdf_bytes, layout_config)`.
pub fn generate_pdf(html: &str, css: &str, config: &PipelineConfig) -> Result<(Vec<u8>, LayoutConfig)> {
    let layout_config = compute_layout_config(html, css, config)?;
    let pdf_bytes = render_pdf(&layout_config)?;
    Ok((pdf_bytes, layout_config))
}

/// Generate only the layout config (no PDF rendering) – useful for testing.
pub fn compute_layout_config(html: &str, css: &str, config: &PipelineConfig) -> Result<LayoutConfig> {
    // 1. Parse HTML and CSS
    let dom = parse_html(html);
    let sheet = parse_stylesheet(css);
    let config = config.clone().with_page_rule(&sheet.page);
    let geometry = config.geometry();

    // 2. Build styled tree
    let (root_style, styled) = build_styled_document(&dom, &sheet);

    // 3. Compute layout
    let fonts = FontManager::default();
    let boxes = compute_layout(
        &styled,
        &root_style,
        geometry.content_width(),
        geometry.margin_left,
        &fonts,
    )?;

    // 4. Paginate
    let decorations = PageDecorations::from_stylesheet(&sheet, &root_style);
    let mut layout_config = paginate(&boxes, &geometry, &decorations, &fonts);
    layout_config.title = document_title(&dom)
        .filter(|t| !t.is_empty())
        .unwrap_or(config.title);
    log::debug!(
        "Laid out {} page(s) at {}x{}pt",
        layout_config.pages.len(),
        geometry.width,
        geometry.height
    );

    Ok(layout_config)
}

//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. This is the "frozen" structure that encodes exactly what
//! goes on each page, and can be dumped as JSON for inspection.

use serde::{Deserialize, Serialize};

use crate::fonts::FontFamily;

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    /// Painted before any box.
    #[serde(default)]
    pub watermark: Option<Watermark>,
    pub boxes: Vec<LayoutBox>,
}

impl PageLayout {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            watermark: None,
            boxes: Vec::new(),
        }
    }

    /// All text on the page in paint order, one entry per line.
    pub fn text_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for b in &self.boxes {
            b.collect_lines(&mut out);
        }
        out
    }
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    /// Visual styling
    pub background_color: Option<[f32; 4]>,
    #[serde(default)]
    pub borders: Borders,

    /// Content (mutually exclusive in practice)
    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    /// Children (nested boxes)
    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Borders {
    pub top: Option<BorderStyle>,
    pub right: Option<BorderStyle>,
    pub bottom: Option<BorderStyle>,
    pub left: Option<BorderStyle>,
}

impl Borders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

/// Font and paint attributes shared by a run of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
    pub font_size: f32,
    pub color: [f32; 4],
    /// Highlight drawn behind the glyphs (inline code).
    pub background: Option<[f32; 4]>,
    pub underline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines of text.
    pub lines: Vec<TextLine>,
    /// List bullet/number drawn in the gutter left of the first line.
    pub list_marker: Option<ListMarker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMarker {
    pub text: String,
    pub style: TextStyle,
    /// Baseline offset from the top of the box.
    pub baseline: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub fragments: Vec<TextFragment>,
    /// X offset within the layout box (for alignment)
    pub x_offset: f32,
    /// Y offset from the top of the text content area
    pub y_offset: f32,
    pub height: f32,
    /// Baseline offset from the top of the line.
    pub baseline: f32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

/// A uniformly styled piece of a line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Offset from the start of the line.
    pub x_offset: f32,
    pub width: f32,
    pub style: TextStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

/// Rotated text painted behind page content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    /// Centre of the text on the page (top-left origin).
    pub center_x: f32,
    pub center_y: f32,
    /// Counter-clockwise rotation in degrees.
    pub angle_deg: f32,
    pub width: f32,
    pub style: TextStyle,
}

impl LayoutConfig {
    /// Create an A4 layout config.
    pub fn a4() -> Self {
        Self {
            title: Self::default_title(),
            // A4: 210mm × 297mm = 595.28 × 841.89 points
            page_width_pt: 595.28,
            page_height_pt: 841.89,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "mdweaver output".to_string()
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            borders: Borders::default(),
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    fn collect_lines(&self, out: &mut Vec<String>) {
        if let Some(text) = &self.text {
            if let Some(marker) = &text.list_marker {
                out.push(marker.text.clone());
            }
            out.extend(text.lines.iter().map(TextLine::text));
        }
        for child in &self.children {
            child.collect_lines(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_watermark_and_fragments() {
        let style = TextStyle {
            family: FontFamily::SansSerif,
            bold: true,
            italic: false,
            font_size: 10.0,
            color: [0.0, 0.0, 0.0, 1.0],
            background: None,
            underline: false,
        };
        let mut page = PageLayout::new(0);
        page.watermark = Some(Watermark {
            text: "DRAFT".into(),
            center_x: 297.0,
            center_y: 380.0,
            angle_deg: 45.0,
            width: 100.0,
            style: style.clone(),
        });
        let mut lb = LayoutBox::new(0.0, 0.0, 100.0, 12.0);
        lb.text = Some(TextContent {
            lines: vec![TextLine {
                fragments: vec![TextFragment {
                    text: "Hi".into(),
                    x_offset: 0.0,
                    width: 10.0,
                    style,
                }],
                x_offset: 0.0,
                y_offset: 0.0,
                height: 12.0,
                baseline: 9.0,
            }],
            list_marker: None,
        });
        page.boxes.push(lb);
        let mut config = LayoutConfig::a4();
        config.pages.push(page);

        let json = config.to_json();
        assert!(json.contains("\"sans-serif\""));
        let back = LayoutConfig::from_json(&json).unwrap();
        assert_eq!(back.pages[0].watermark.as_ref().unwrap().text, "DRAFT");
        assert_eq!(back.pages[0].text_lines(), vec!["Hi"]);
    }
}

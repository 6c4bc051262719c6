//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::error::{Result, WeaverError};
use crate::fonts::{FontFamily, FontManager};
use crate::layout_config::*;

/// Gap between a list marker and the start of its item.
const MARKER_GAP: f32 = 6.0;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

struct PageContext<'a> {
    page_height: f32,
    images: &'a HashMap<String, ImageResource>,
    fonts: &'a FontManager,
}

/// Render a LayoutConfig into PDF bytes.
///
/// `<img>` elements whose `src` is not a base64 data URI, or whose bytes
/// cannot be decoded, are skipped with a `log::warn`.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>> {
    if !(config.page_width_pt > 0.0 && config.page_height_pt > 0.0) {
        return Err(WeaverError::Render(format!(
            "invalid page size {}x{}pt",
            config.page_width_pt, config.page_height_pt
        )));
    }
    let page_w = Mm(config.page_width_pt * 0.352778); // pt → mm
    let page_h = Mm(config.page_height_pt * 0.352778);

    let mut doc = PdfDocument::new(&config.title);
    let fonts = FontManager::default();

    // ── Pre-register all images ────────────────────────────────────────────
    let mut all_srcs: HashSet<&str> = HashSet::new();
    for page_layout in &config.pages {
        for lbox in &page_layout.boxes {
            collect_image_srcs(lbox, &mut all_srcs);
        }
    }

    let mut image_resources: HashMap<String, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();

    for src in &all_srcs {
        let bytes = match parse_data_uri(src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                continue;
            }
        };

        let dyn_img = match ::image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Skipping image: decode error: {e}");
                continue;
            }
        };
        let (px_width, px_height) = (dyn_img.width(), dyn_img.height());

        let raw = match RawImage::decode_from_bytes(&bytes, &mut img_warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping image: PDF encode error: {e}");
                continue;
            }
        };
        let xobj_id = doc.add_image(&raw);

        image_resources.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width,
                px_height,
            },
        );
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let ctx = PageContext {
        page_height: config.page_height_pt,
        images: &image_resources,
        fonts: &fonts,
    };
    let mut pages = Vec::new();

    for page_layout in &config.pages {
        let mut ops = Vec::new();

        if let Some(wm) = &page_layout.watermark {
            render_watermark(&mut ops, wm, config.page_height_pt);
        }
        for lbox in &page_layout.boxes {
            render_box(&mut ops, lbox, &ctx);
        }

        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    log::debug!("Rendering {} page(s) to PDF", pages.len());
    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());

    Ok(bytes)
}

/// The standard-14 face for a family and weight/slant.
fn builtin_font(family: FontFamily, bold: bool, italic: bool) -> BuiltinFont {
    match (family, bold, italic) {
        (FontFamily::Serif, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Serif, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Serif, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Serif, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::SansSerif, true, true) => BuiltinFont::HelveticaBoldOblique,
        (FontFamily::SansSerif, true, false) => BuiltinFont::HelveticaBold,
        (FontFamily::SansSerif, false, true) => BuiltinFont::HelveticaOblique,
        (FontFamily::SansSerif, false, false) => BuiltinFont::Helvetica,
        (FontFamily::Monospace, true, true) => BuiltinFont::CourierBoldOblique,
        (FontFamily::Monospace, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Monospace, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Monospace, false, false) => BuiltinFont::Courier,
    }
}

fn rgb(c: &[f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Fill a rectangle given in PDF coordinates (bottom-left origin).
fn fill_rect(ops: &mut Vec<Op>, x: f32, bottom: f32, width: f32, height: f32, color: &[f32; 4]) {
    ops.push(Op::SetFillColor { col: rgb(color) });
    ops.push(Op::DrawPolygon {
        polygon: Polygon {
            rings: vec![PolygonRing {
                points: vec![
                    point(x, bottom),
                    point(x + width, bottom),
                    point(x + width, bottom + height),
                    point(x, bottom + height),
                ],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        },
    });
}

fn stroke_line(ops: &mut Vec<Op>, from: (f32, f32), to: (f32, f32), width: f32, color: &[f32; 4]) {
    ops.push(Op::SetOutlineColor { col: rgb(color) });
    ops.push(Op::SetOutlineThickness { pt: Pt(width) });
    ops.push(Op::DrawLine {
        line: Line {
            points: vec![point(from.0, from.1), point(to.0, to.1)],
            is_closed: false,
        },
    });
}

fn write_text(ops: &mut Vec<Op>, text: &str, x: f32, baseline_y: f32, style: &TextStyle) {
    let font = builtin_font(style.family, style.bold, style.italic);
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(x),
            y: Pt(baseline_y),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(style.font_size),
        font,
    });
    ops.push(Op::SetFillColor {
        col: rgb(&style.color),
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(to_winlatin(text))],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82, // single low-9 quote
            '\u{201E}' => 0x84, // double low-9 quote
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' => 0x20, // non-breaking space -> space
            '\t' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for 0x80-0x9F range; printpdf passes
    // these bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
///
/// Returns `Err` if `src` is not a data URI or does not use base64 encoding.
fn parse_data_uri(src: &str) -> std::result::Result<Vec<u8>, String> {
    if !src.starts_with("data:") {
        let preview: String = src.chars().take(80).collect();
        return Err(format!(
            "image src must be a base64 data URI \
             (e.g. `data:image/png;base64,...`). Got: {preview:?}"
        ));
    }
    let rest = &src["data:".len()..];
    let comma_pos = rest
        .find(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator between header and data".to_string())?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    let b64_data = rest[comma_pos + 1..].trim();
    BASE64_STD
        .decode(b64_data)
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Recursively collect all unique `image.src` strings from a [`LayoutBox`] tree.
fn collect_image_srcs<'a>(lbox: &'a LayoutBox, srcs: &mut HashSet<&'a str>) {
    if let Some(img) = &lbox.image {
        srcs.insert(img.src.as_str());
    }
    for child in &lbox.children {
        collect_image_srcs(child, srcs);
    }
}

/// Paint rotated text around its centre point.
fn render_watermark(ops: &mut Vec<Op>, wm: &Watermark, page_height: f32) {
    let (sin, cos) = wm.angle_deg.to_radians().sin_cos();
    let cx = wm.center_x;
    let cy = page_height - wm.center_y;
    // Baseline start relative to the centre, before rotation.
    let dx = -wm.width / 2.0;
    let dy = -wm.style.font_size * 0.35;
    let x0 = cx + dx * cos - dy * sin;
    let y0 = cy + dx * sin + dy * cos;

    let font = builtin_font(wm.style.family, wm.style.bold, wm.style.italic);
    ops.push(Op::StartTextSection);
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(wm.style.font_size),
        font,
    });
    ops.push(Op::SetFillColor {
        col: rgb(&wm.style.color),
    });
    ops.push(Op::SetTextMatrix {
        matrix: TextMatrix::Raw([cos, sin, -sin, cos, x0, y0]),
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(to_winlatin(&wm.text))],
        font,
    });
    ops.push(Op::EndTextSection);
}

fn render_borders(ops: &mut Vec<Op>, lbox: &LayoutBox, top: f32) {
    let (x1, x2) = (lbox.x, lbox.x + lbox.width);
    let bottom = top - lbox.height;
    let b = &lbox.borders;
    // Each side is stroked along the inside of the border box.
    if let Some(s) = &b.top {
        let y = top - s.width / 2.0;
        stroke_line(ops, (x1, y), (x2, y), s.width, &s.color);
    }
    if let Some(s) = &b.bottom {
        let y = bottom + s.width / 2.0;
        stroke_line(ops, (x1, y), (x2, y), s.width, &s.color);
    }
    if let Some(s) = &b.left {
        let x = x1 + s.width / 2.0;
        stroke_line(ops, (x, bottom), (x, top), s.width, &s.color);
    }
    if let Some(s) = &b.right {
        let x = x2 - s.width / 2.0;
        stroke_line(ops, (x, bottom), (x, top), s.width, &s.color);
    }
}

fn render_text(ops: &mut Vec<Op>, lbox: &LayoutBox, text: &TextContent, top: f32, fonts: &FontManager) {
    for tline in &text.lines {
        let line_top = top - tline.y_offset;
        let baseline_y = line_top - tline.baseline;
        for frag in &tline.fragments {
            if frag.text.is_empty() {
                continue;
            }
            let x = lbox.x + tline.x_offset + frag.x_offset;
            if let Some(bg) = &frag.style.background {
                fill_rect(ops, x - 1.0, line_top - tline.height, frag.width + 2.0, tline.height, bg);
            }
            if !frag.text.trim().is_empty() {
                write_text(ops, &frag.text, x, baseline_y, &frag.style);
            }
            if frag.style.underline {
                let y = baseline_y - frag.style.font_size * 0.1;
                stroke_line(ops, (x, y), (x + frag.width, y), 0.5, &frag.style.color);
            }
        }
    }

    if let Some(marker) = &text.list_marker {
        let width = fonts.measure(&marker.text, &marker.style);
        let x = lbox.x - MARKER_GAP - width;
        write_text(ops, &marker.text, x, top - marker.baseline, &marker.style);
    }
}

/// Recursively render a LayoutBox and its children into PDF ops.
fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, ctx: &PageContext<'_>) {
    // PDF coordinate system: origin at bottom-left.
    // Our layout uses origin at top-left. Convert:
    let pdf_y = ctx.page_height - lbox.y;

    if let Some(bg) = &lbox.background_color {
        fill_rect(ops, lbox.x, pdf_y - lbox.height, lbox.width, lbox.height, bg);
    }

    if !lbox.borders.is_empty() {
        render_borders(ops, lbox, pdf_y);
    }

    if let Some(text) = &lbox.text {
        render_text(ops, lbox, text, pdf_y, ctx.fonts);
    }

    // Image – embed from pre-registered XObject
    if let Some(img) = &lbox.image {
        if let Some(res) = ctx.images.get(&img.src) {
            let img_bottom_y = ctx.page_height - lbox.y - img.height;

            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = if res.px_width > 0 {
                img.width / res.px_width as f32
            } else {
                1.0
            };
            let scale_y = if res.px_height > 0 {
                img.height / res.px_height as f32
            } else {
                1.0
            };

            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(img_bottom_y)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> TextStyle {
        TextStyle {
            family: FontFamily::Serif,
            bold: false,
            italic: false,
            font_size: 12.0,
            color: [0.2, 0.2, 0.2, 1.0],
            background: Some([0.95, 0.95, 0.95, 1.0]),
            underline: true,
        }
    }

    #[test]
    fn render_empty_page() {
        let config = LayoutConfig::a4();
        let bytes = render_pdf(&config).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn render_text_borders_and_watermark() {
        let mut page = PageLayout::new(0);
        page.watermark = Some(Watermark {
            text: "CONFIDENTIAL".into(),
            center_x: 297.0,
            center_y: 380.0,
            angle_deg: 45.0,
            width: 200.0,
            style: style(),
        });
        let mut lb = LayoutBox::new(50.0, 50.0, 200.0, 20.0);
        lb.borders.left = Some(BorderStyle {
            width: 3.0,
            color: [0.8, 0.8, 0.8, 1.0],
        });
        lb.text = Some(TextContent {
            lines: vec![TextLine {
                fragments: vec![TextFragment {
                    text: "café – “quoted”".into(),
                    x_offset: 0.0,
                    width: 80.0,
                    style: style(),
                }],
                x_offset: 0.0,
                y_offset: 0.0,
                height: 14.4,
                baseline: 11.0,
            }],
            list_marker: Some(ListMarker {
                text: "1.".into(),
                style: style(),
                baseline: 11.0,
            }),
        });
        page.boxes.push(lb);
        let mut config = LayoutConfig::a4();
        config.pages.push(page);
        let bytes = render_pdf(&config).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn rejects_zero_sized_pages() {
        let mut config = LayoutConfig::a4();
        config.page_width_pt = 0.0;
        assert!(render_pdf(&config).is_err());
    }

    #[test]
    fn font_table_covers_families() {
        assert!(matches!(builtin_font(FontFamily::Monospace, true, false), BuiltinFont::CourierBold));
        assert!(matches!(builtin_font(FontFamily::Serif, false, true), BuiltinFont::TimesItalic));
    }

    #[test]
    fn data_uri_parsing() {
        assert_eq!(parse_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert!(parse_data_uri("images/logo.png").is_err());
        assert!(parse_data_uri("data:text/plain,hi").is_err());
    }

    #[test]
    fn winlatin_maps_typographic_quotes() {
        let s = to_winlatin("\u{201C}x\u{201D}");
        assert_eq!(s.as_bytes(), &[0x93, b'x', 0x94]);
    }
}

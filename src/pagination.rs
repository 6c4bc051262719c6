//! Pagination – splits a flat list of positioned boxes into pages.
//!
//! Handles:
//! - page boundaries from the `@page` geometry
//! - page-break-before / page-break-after hints, including hints on
//!   containers that get flattened
//! - splitting long text blocks between lines (two-line orphan/widow limit)
//! - table rows as the unit of table splitting
//! - page margin boxes (footers with `counter(page)`) and the watermark

use crate::css::{self, Declaration, Stylesheet};
use crate::fonts::FontManager;
use crate::layout::{text_style, BoxContent, PositionedBox};
use crate::layout_config::*;
use crate::style::{self, ComputedStyle};

/// Page size and margins in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        (self.width - self.margin_left - self.margin_right).max(1.0)
    }

    pub fn content_height(&self) -> f32 {
        (self.height - self.margin_top - self.margin_bottom).max(1.0)
    }
}

/// Text placed in a page margin, e.g. `@bottom-center`.
#[derive(Debug, Clone)]
pub struct MarginBox {
    /// `bottom-left`, `top-center`, …
    pub slot: String,
    /// Literal text; `{page}` and `{pages}` are substituted per page.
    pub template: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone)]
pub struct WatermarkRule {
    pub text: String,
    pub style: TextStyle,
    /// Centre as a fraction of the page content area.
    pub left: f32,
    pub top: f32,
    /// Counter-clockwise rotation in degrees.
    pub angle_deg: f32,
}

/// Everything painted on each page besides the flowed content.
#[derive(Debug, Clone, Default)]
pub struct PageDecorations {
    pub margin_boxes: Vec<MarginBox>,
    pub watermark: Option<WatermarkRule>,
}

impl PageDecorations {
    /// Read margin boxes from `@page` and the watermark from `body::before`.
    /// `root` supplies inherited font properties.
    pub fn from_stylesheet(sheet: &Stylesheet, root: &ComputedStyle) -> Self {
        let margin_boxes = sheet
            .page
            .margin_boxes
            .iter()
            .filter_map(|(slot, decls)| {
                let template = css::parse_content(css::find(decls, "content")?);
                if template.is_empty() {
                    return None;
                }
                Some(MarginBox {
                    slot: slot.clone(),
                    template,
                    style: resolve_text_style(decls, root),
                })
            })
            .collect();

        let watermark = sheet.body_before.as_ref().and_then(|decls| {
            let text = css::parse_content(css::find(decls, "content")?);
            if text.trim().is_empty() {
                return None;
            }
            Some(WatermarkRule {
                text,
                style: resolve_text_style(decls, root),
                left: css::find(decls, "left").and_then(parse_fraction).unwrap_or(0.5),
                top: css::find(decls, "top").and_then(parse_fraction).unwrap_or(0.5),
                angle_deg: css::find(decls, "transform")
                    .and_then(parse_rotation)
                    .map_or(0.0, |css_deg| -css_deg),
            })
        });

        Self {
            margin_boxes,
            watermark,
        }
    }
}

fn resolve_text_style(decls: &[Declaration], root: &ComputedStyle) -> TextStyle {
    let mut s = root.inherited();
    for d in decls {
        style::apply_css_property(&mut s, &d.property, &d.value, root.font_size);
    }
    text_style(&s, None)
}

fn parse_fraction(v: &str) -> Option<f32> {
    v.trim()
        .strip_suffix('%')
        .and_then(|p| p.trim().parse::<f32>().ok())
        .map(|p| p / 100.0)
}

/// Clockwise degrees from `rotate(...)` inside a `transform` value.
fn parse_rotation(v: &str) -> Option<f32> {
    let start = v.find("rotate(")? + "rotate(".len();
    let arg = v[start..].split(')').next()?.trim();
    if let Some(d) = arg.strip_suffix("deg") {
        d.trim().parse().ok()
    } else if let Some(r) = arg.strip_suffix("rad") {
        r.trim().parse::<f32>().ok().map(f32::to_degrees)
    } else if let Some(t) = arg.strip_suffix("turn") {
        t.trim().parse::<f32>().ok().map(|t| t * 360.0)
    } else {
        arg.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

struct FlatBox<'a> {
    pbox: &'a PositionedBox,
    break_before: bool,
    break_after: bool,
}

fn has_decoration(pbox: &PositionedBox) -> bool {
    !pbox.style.background_color.is_transparent()
        || pbox.style.borders().iter().any(|b| b.is_visible())
}

/// Expand container boxes so their children paginate individually.
///
/// Undecorated containers are always expanded. Containers with a background
/// or border stay whole unless taller than a page; expanded ones are recorded
/// in `sliced` so their decoration can be repainted per page. Break hints of
/// an expanded container move to its first / last descendant.
fn flatten_for_pagination<'a>(
    boxes: &'a [PositionedBox],
    content_height: f32,
    inherited_before: bool,
    out: &mut Vec<FlatBox<'a>>,
    sliced: &mut Vec<&'a PositionedBox>,
) {
    for (i, pbox) in boxes.iter().enumerate() {
        let break_before = pbox.page_break_before || (i == 0 && inherited_before);
        let expandable = matches!(pbox.content, BoxContent::None)
            && !pbox.children.is_empty()
            && !(pbox.page_break_inside_avoid && pbox.height <= content_height);
        let decorated = has_decoration(pbox);

        if expandable && (!decorated || pbox.height > content_height) {
            if decorated {
                sliced.push(pbox);
            }
            let start = out.len();
            flatten_for_pagination(&pbox.children, content_height, break_before, out, sliced);
            if out.len() == start {
                continue;
            }
            if pbox.page_break_after {
                if let Some(last) = out.last_mut() {
                    last.break_after = true;
                }
            }
        } else {
            out.push(FlatBox {
                pbox,
                break_before,
                break_after: pbox.page_break_after,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Page assembly
// ---------------------------------------------------------------------------

struct Pager {
    geometry: PageGeometry,
    pages: Vec<PageLayout>,
    current: PageLayout,
    /// Document-space y at which each page begins. All PositionedBox.y
    /// values are absolute document coordinates, so `y - start` gives the
    /// y-on-page for any box.
    starts: Vec<f32>,
}

impl Pager {
    fn start(&self) -> f32 {
        self.starts.last().copied().unwrap_or(0.0)
    }

    fn y_on_page(&self, doc_y: f32) -> f32 {
        (doc_y - self.start()).max(0.0)
    }

    fn new_page(&mut self, doc_y: f32) {
        let index = self.pages.len() + 1;
        self.pages
            .push(std::mem::replace(&mut self.current, PageLayout::new(index)));
        self.starts.push(doc_y);
    }

    fn place(&mut self, pbox: &PositionedBox) {
        let abs_y = self.geometry.margin_top + self.y_on_page(pbox.y);
        self.current
            .boxes
            .push(build_layout_box(pbox, pbox.x, abs_y));
    }

    /// Place a text box line by line, continuing on new pages as needed.
    fn place_split_text(&mut self, pbox: &PositionedBox, lines: &[TextLine]) {
        let content_height = self.geometry.content_height();
        let n = lines.len();
        let mut first = 0;
        while first < n {
            let top_doc = pbox.y + lines[first].y_offset;
            let avail = content_height - (top_doc - self.start());
            let base = lines[first].y_offset;
            let mut k = lines[first..]
                .iter()
                .take_while(|l| l.y_offset + l.height - base <= avail + 0.01)
                .count();
            let remaining = n - first;
            if k < remaining {
                if k < 2 && !self.current.boxes.is_empty() {
                    k = 0;
                } else if remaining - k < 2 && k > 2 {
                    k = remaining - 2;
                }
            }
            if k == 0 {
                if self.current.boxes.is_empty() {
                    // A single line taller than the page.
                    k = 1;
                } else {
                    self.new_page(top_doc);
                    continue;
                }
            }

            let abs_y = self.geometry.margin_top + self.y_on_page(top_doc);
            self.current
                .boxes
                .push(text_slice_box(pbox, &lines[first..first + k], abs_y));
            first += k;
            if first < n {
                self.new_page(pbox.y + lines[first].y_offset);
            }
        }
    }

    fn finish(mut self) -> (Vec<PageLayout>, Vec<f32>) {
        if !self.current.boxes.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        } else {
            self.starts.pop();
        }
        (self.pages, self.starts)
    }
}

/// Convert positioned boxes into a paginated LayoutConfig.
pub fn paginate(
    boxes: &[PositionedBox],
    geometry: &PageGeometry,
    decorations: &PageDecorations,
    fonts: &FontManager,
) -> LayoutConfig {
    let content_height = geometry.content_height();

    let mut flat = Vec::new();
    let mut sliced = Vec::new();
    flatten_for_pagination(boxes, content_height, false, &mut flat, &mut sliced);

    let mut pager = Pager {
        geometry: *geometry,
        pages: Vec::new(),
        current: PageLayout::new(0),
        starts: vec![0.0],
    };

    for item in &flat {
        let pbox = item.pbox;
        if item.break_before && !pager.current.boxes.is_empty() {
            pager.new_page(pbox.y);
        }

        let box_bottom = pager.y_on_page(pbox.y) + pbox.height;
        if box_bottom > content_height {
            match &pbox.content {
                BoxContent::Text { lines } if lines.len() > 1 && !pbox.page_break_inside_avoid => {
                    pager.place_split_text(pbox, lines);
                }
                _ => {
                    if !pager.current.boxes.is_empty() {
                        pager.new_page(pbox.y);
                    }
                    pager.place(pbox);
                }
            }
        } else {
            pager.place(pbox);
        }

        if item.break_after {
            pager.new_page(pbox.y + pbox.height);
        }
    }

    let (mut pages, starts) = pager.finish();
    paint_sliced_decorations(&mut pages, &starts, &sliced, geometry);

    let total = pages.len();
    for (i, page) in pages.iter_mut().enumerate() {
        page.page_index = i;
        for mb in &decorations.margin_boxes {
            if let Some(lb) = margin_box_layout(mb, i + 1, total, geometry, fonts) {
                page.boxes.push(lb);
            }
        }
        if let Some(rule) = &decorations.watermark {
            page.watermark = Some(Watermark {
                text: rule.text.clone(),
                center_x: geometry.margin_left + rule.left * geometry.content_width(),
                center_y: geometry.margin_top + rule.top * geometry.content_height(),
                angle_deg: rule.angle_deg,
                width: fonts.measure(&rule.text, &rule.style),
                style: rule.style.clone(),
            });
        }
    }

    LayoutConfig {
        title: "mdweaver output".to_string(),
        page_width_pt: geometry.width,
        page_height_pt: geometry.height,
        pages,
    }
}

/// Repaint background and side borders of expanded containers on each page
/// they cover, behind that page's content.
fn paint_sliced_decorations(
    pages: &mut [PageLayout],
    starts: &[f32],
    sliced: &[&PositionedBox],
    geometry: &PageGeometry,
) {
    for (i, page) in pages.iter_mut().enumerate() {
        let start = starts.get(i).copied().unwrap_or(0.0);
        let end = starts
            .get(i + 1)
            .copied()
            .unwrap_or(f32::INFINITY)
            .min(start + geometry.content_height());
        let mut slices = Vec::new();
        for pbox in sliced {
            let y0 = pbox.y.max(start);
            let y1 = (pbox.y + pbox.height).min(end);
            if y1 <= y0 {
                continue;
            }
            let mut lb = LayoutBox::new(pbox.x, geometry.margin_top + (y0 - start), pbox.width, y1 - y0);
            lb.background_color = background_of(&pbox.style);
            let borders = borders_of(&pbox.style);
            lb.borders = Borders {
                top: borders.top.filter(|_| pbox.y >= start),
                bottom: borders.bottom.filter(|_| pbox.y + pbox.height <= end),
                left: borders.left,
                right: borders.right,
            };
            slices.push(lb);
        }
        if !slices.is_empty() {
            slices.append(&mut page.boxes);
            page.boxes = slices;
        }
    }
}

fn margin_box_layout(
    mb: &MarginBox,
    page: usize,
    total: usize,
    g: &PageGeometry,
    fonts: &FontManager,
) -> Option<LayoutBox> {
    let text = mb
        .template
        .replace("{page}", &page.to_string())
        .replace("{pages}", &total.to_string());
    let width = fonts.measure(&text, &mb.style);
    let size = mb.style.font_size;
    let height = size * 1.2;

    let (vertical, horizontal) = mb.slot.split_once('-')?;
    let y = match vertical {
        "bottom" => g.height - g.margin_bottom + (g.margin_bottom - height) / 2.0,
        "top" => (g.margin_top - height) / 2.0,
        _ => return None,
    };
    let x = match horizontal {
        "left" => g.margin_left,
        "center" => g.margin_left + (g.content_width() - width) / 2.0,
        "right" => g.width - g.margin_right - width,
        _ => return None,
    };

    let mut lb = LayoutBox::new(x, y, width, height);
    lb.text = Some(TextContent {
        lines: vec![TextLine {
            fragments: vec![TextFragment {
                text,
                x_offset: 0.0,
                width,
                style: mb.style.clone(),
            }],
            x_offset: 0.0,
            y_offset: 0.0,
            height,
            baseline: (height - size) / 2.0 + size * 0.8,
        }],
        list_marker: None,
    });
    Some(lb)
}

fn background_of(s: &ComputedStyle) -> Option<[f32; 4]> {
    if s.background_color.is_transparent() {
        None
    } else {
        Some(s.background_color.on_white())
    }
}

fn borders_of(s: &ComputedStyle) -> Borders {
    let side = |b: &style::BorderSide| {
        b.is_visible().then(|| BorderStyle {
            width: b.width,
            color: b.color.on_white(),
        })
    };
    Borders {
        top: side(&s.border_top),
        right: side(&s.border_right),
        bottom: side(&s.border_bottom),
        left: side(&s.border_left),
    }
}

/// A text box holding only `lines`, placed at `abs_y`.
fn text_slice_box(pbox: &PositionedBox, lines: &[TextLine], abs_y: f32) -> LayoutBox {
    let base = lines.first().map_or(0.0, |l| l.y_offset);
    let height: f32 = lines.iter().map(|l| l.height).sum();
    let mut lb = LayoutBox::new(pbox.x, abs_y, pbox.width, height);
    lb.text = Some(TextContent {
        lines: lines
            .iter()
            .map(|l| TextLine {
                y_offset: l.y_offset - base,
                ..l.clone()
            })
            .collect(),
        list_marker: None,
    });
    lb
}

/// Baseline of the first text line inside `pbox`, relative to its top.
fn first_baseline(pbox: &PositionedBox) -> Option<f32> {
    if let BoxContent::Text { lines } = &pbox.content {
        return lines.first().map(|l| l.y_offset + l.baseline);
    }
    pbox.children
        .iter()
        .find_map(|c| first_baseline(c).map(|b| b + (c.y - pbox.y)))
}

/// Recursively build a LayoutBox tree where every box carries *page-absolute*
/// x/y coordinates (origin = top-left of the physical page).
///
/// For each child, its absolute y is derived by:
///   `child_abs_y = parent_abs_y + (child.y − parent.y)`
/// because PositionedBox.y values are accumulated document-space absolutes.
fn build_layout_box(pbox: &PositionedBox, abs_x: f32, abs_y: f32) -> LayoutBox {
    let mut lb = LayoutBox::new(abs_x, abs_y, pbox.width, pbox.height);
    lb.background_color = background_of(&pbox.style);
    lb.borders = borders_of(&pbox.style);

    match &pbox.content {
        BoxContent::Text { lines } => {
            lb.text = Some(TextContent {
                lines: lines.clone(),
                list_marker: None,
            });
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::ListItem { marker } => {
            // `lines` is empty – the marker is drawn in the gutter left of
            // the li box, aligned with its first line of text.
            let style = text_style(&pbox.style, None);
            let baseline = first_baseline(pbox).unwrap_or(style.font_size * 0.8);
            lb.text = Some(TextContent {
                lines: vec![],
                list_marker: Some(ListMarker {
                    text: marker.clone(),
                    style,
                    baseline,
                }),
            });
        }
        BoxContent::TableRow | BoxContent::None => {}
    }

    for child in &pbox.children {
        let child_abs_y = abs_y + (child.y - pbox.y);
        lb.children.push(build_layout_box(child, child.x, child_abs_y));
    }

    lb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parse_stylesheet;
    use crate::dom::parse_html;
    use crate::layout::compute_layout;
    use crate::style::build_styled_document;

    const A4: PageGeometry = PageGeometry {
        width: 595.0,
        height: 842.0,
        margin_top: 40.0,
        margin_right: 40.0,
        margin_bottom: 40.0,
        margin_left: 40.0,
    };

    fn paginate_html(html: &str, css: &str) -> LayoutConfig {
        let dom = parse_html(html);
        let sheet = parse_stylesheet(css);
        let (root, styled) = build_styled_document(&dom, &sheet);
        let fonts = FontManager::default();
        let boxes = compute_layout(&styled, &root, A4.content_width(), A4.margin_left, &fonts).unwrap();
        let decorations = PageDecorations::from_stylesheet(&sheet, &root);
        paginate(&boxes, &A4, &decorations, &fonts)
    }

    #[test]
    fn single_page() {
        let config = paginate_html("<p>Short text</p>", "");
        assert_eq!(config.pages.len(), 1);
    }

    #[test]
    fn multiple_pages() {
        let mut html = String::new();
        for i in 0..80 {
            html.push_str(&format!("<p>Paragraph {i} with some text</p>"));
        }
        let config = paginate_html(&html, "");
        assert!(
            config.pages.len() > 1,
            "Expected multiple pages, got {}",
            config.pages.len()
        );
    }

    #[test]
    fn lesson_breaks_propagate_through_flattening() {
        let css = ".lesson { page-break-before: always; } .lesson:first-child { page-break-before: avoid; }";
        let html = r#"<div class="lesson"><h1>One</h1></div><div class="lesson"><h1>Two</h1></div><div class="lesson"><h1>Three</h1></div>"#;
        let config = paginate_html(html, css);
        assert_eq!(config.pages.len(), 3);
        assert_eq!(config.pages[1].text_lines(), vec!["Two"]);
    }

    #[test]
    fn long_text_splits_between_lines() {
        let text = "word ".repeat(3000);
        let config = paginate_html(&format!("<p>{text}</p>"), "");
        assert!(config.pages.len() > 1);
        for page in &config.pages {
            for b in &page.boxes {
                assert!(b.y + b.height <= A4.height - A4.margin_bottom + 0.5);
            }
        }
    }

    #[test]
    fn footers_numbered_per_page() {
        let css = r#"@page { @bottom-center { content: "Page " counter(page) " of " counter(pages); font-size: 10pt; } }
            .lesson { page-break-before: always; }"#;
        let html = r#"<div class="lesson">a</div><div class="lesson">b</div>"#;
        let config = paginate_html(html, css);
        assert_eq!(config.pages.len(), 2);
        let last = config.pages[1].text_lines();
        assert!(last.contains(&"Page 2 of 2".to_string()), "{last:?}");
    }

    #[test]
    fn watermark_on_every_page() {
        let css = r#"body::before { content: "DRAFT"; top: 45%; left: 50%; transform: translate(-50%, -50%) rotate(-45deg); font-size: 60pt; color: rgba(0, 0, 0, 0.03); }
            .lesson { page-break-before: always; }"#;
        let config = paginate_html(r#"<div class="lesson">a</div><div class="lesson">b</div>"#, css);
        for page in &config.pages {
            let wm = page.watermark.as_ref().unwrap();
            assert_eq!(wm.text, "DRAFT");
            assert_eq!(wm.angle_deg, 45.0);
            assert!(wm.style.color[0] > 0.95);
        }
    }

    #[test]
    fn rotation_units() {
        assert_eq!(parse_rotation("translate(-50%, -50%) rotate(-45deg)"), Some(-45.0));
        assert_eq!(parse_rotation("rotate(0.5turn)"), Some(180.0));
        assert_eq!(parse_rotation("scale(2)"), None);
    }
}

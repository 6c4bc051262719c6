//! Layout engine – uses Taffy to compute block layout from a styled DOM tree,
//! then converts the result into a flat list of positioned boxes.
//!
//! Block elements become flex columns. Consecutive inline children (text,
//! `strong`, `code`, …) are gathered into one anonymous text box whose lines
//! are broken up front, so Taffy only sees fixed-size leaves.

use std::collections::HashMap;

use taffy::prelude::*;
use taffy::TaffyResult;

use crate::dom::Tag;
use crate::error::{Result, WeaverError};
use crate::fonts::{line_width, wrap_runs, FontManager, InlineRun};
use crate::layout_config::{TextLine, TextStyle};
use crate::style::{self, BorderSide, ComputedStyle, StyledNode, WhiteSpace, PT_PER_PX};

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    /// Broken lines of an inline formatting context.
    Text { lines: Vec<TextLine> },
    Image { src: String },
    /// List item marker
    ListItem { marker: String },
    /// A table row; rows are the unit tables split on.
    TableRow,
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
        }
    }

    /// True for nodes that flow inside a line: text and inline elements.
    /// Images always get a box of their own.
    fn is_inline(node: &StyledNode) -> bool {
        match node {
            StyledNode::Text { .. } => true,
            StyledNode::Element { tag, style, .. } => {
                style.display == style::Display::Inline && *tag != Tag::Img
            }
        }
    }

    /// Flatten an inline subtree into styled runs. `background` is the
    /// nearest inline ancestor's background (inline code highlight).
    fn collect_runs(node: &StyledNode, background: Option<[f32; 4]>, out: &mut Vec<InlineRun>) {
        match node {
            StyledNode::Text { text, style } => out.push(InlineRun {
                text: text.clone(),
                style: text_style(style, background),
                preformatted: style.white_space == WhiteSpace::Pre,
            }),
            StyledNode::Element {
                tag: Tag::Br,
                style,
                ..
            } => out.push(InlineRun::line_break(text_style(style, background))),
            StyledNode::Element {
                style, children, ..
            } => {
                let bg = if style.background_color.is_transparent() {
                    background
                } else {
                    Some(style.background_color.on_white())
                };
                for child in children {
                    Self::collect_runs(child, bg, out);
                }
            }
        }
    }

    fn build_node(&mut self, styled: &StyledNode, avail_width: f32) -> TaffyResult<Option<NodeId>> {
        match styled {
            StyledNode::Text { style, .. } => {
                self.build_inline_group(&[styled], style, avail_width)
            }
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => self.build_element_node(tag, style, children, attrs, avail_width),
        }
    }

    /// Lay out a run of inline siblings as one text leaf. Returns `None`
    /// when the group holds nothing but collapsible whitespace.
    fn build_inline_group(
        &mut self,
        group: &[&StyledNode],
        block_style: &ComputedStyle,
        avail_width: f32,
    ) -> TaffyResult<Option<NodeId>> {
        let mut runs = Vec::new();
        for node in group {
            Self::collect_runs(node, None, &mut runs);
        }
        let blank = runs
            .iter()
            .all(|r| !r.preformatted && r.text.chars().all(|c| c.is_whitespace() && c != '\u{00A0}'));
        if blank {
            return Ok(None);
        }

        let wrapped = wrap_runs(&runs, avail_width, self.fonts);
        if wrapped.is_empty() {
            return Ok(None);
        }

        let base_line = block_style.font_size * block_style.line_height;
        let mut y = 0.0f32;
        let mut lines = Vec::with_capacity(wrapped.len());
        for fragments in wrapped {
            let max_size = fragments
                .iter()
                .map(|f| f.style.font_size)
                .fold(0.0f32, f32::max);
            let max_size = if max_size > 0.0 {
                max_size
            } else {
                block_style.font_size
            };
            let height = base_line.max(max_size * block_style.line_height);
            let baseline = (height - max_size) / 2.0 + max_size * 0.8;
            let width = line_width(&fragments);
            let x_offset = match block_style.text_align {
                style::TextAlign::Center => ((avail_width - width) / 2.0).max(0.0),
                style::TextAlign::Right => (avail_width - width).max(0.0),
                style::TextAlign::Left | style::TextAlign::Justify => 0.0,
            };
            lines.push(TextLine {
                fragments,
                x_offset,
                y_offset: y,
                height,
                baseline,
            });
            y += height;
        }

        let taffy_style = Style {
            size: Size {
                width: Dimension::Length(avail_width.max(0.0)),
                height: Dimension::Length(y),
            },
            flex_shrink: 0.0,
            ..Default::default()
        };
        let node = self.taffy.new_leaf(taffy_style)?;
        self.node_styles.insert(node, block_style.inherited());
        self.node_content.insert(node, BoxContent::Text { lines });
        Ok(Some(node))
    }

    /// Build block children, grouping inline runs into anonymous text boxes.
    fn build_block_children(
        &mut self,
        parent_tag: Option<&Tag>,
        parent_style: &ComputedStyle,
        attrs: Option<&HashMap<String, String>>,
        children: &[StyledNode],
        inner_width: f32,
    ) -> TaffyResult<Vec<NodeId>> {
        let mut nodes = Vec::new();
        let mut group: Vec<&StyledNode> = Vec::new();
        let mut list_counter: u32 = attrs
            .and_then(|a| a.get("start"))
            .and_then(|s| s.trim().parse::<u32>().ok())
            .map_or(0, |start| start.saturating_sub(1));

        for child in children {
            if Self::is_inline(child) {
                group.push(child);
                continue;
            }
            if !group.is_empty() {
                if let Some(id) = self.build_inline_group(&group, parent_style, inner_width)? {
                    nodes.push(id);
                }
                group.clear();
            }

            // For list items, compute the marker so it can be rendered as a
            // bullet / number in the left gutter.
            let li_marker = match child {
                StyledNode::Element { tag: Tag::Li, .. } => {
                    list_counter += 1;
                    Some(if parent_tag == Some(&Tag::Ol) {
                        format!("{list_counter}.")
                    } else {
                        "\u{2022}".to_string()
                    })
                }
                _ => None,
            };

            if let Some(child_id) = self.build_node(child, inner_width)? {
                if let Some(marker) = li_marker {
                    self.node_content
                        .insert(child_id, BoxContent::ListItem { marker });
                }
                nodes.push(child_id);
            }
        }
        if !group.is_empty() {
            if let Some(id) = self.build_inline_group(&group, parent_style, inner_width)? {
                nodes.push(id);
            }
        }
        Ok(nodes)
    }

    fn build_element_node(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
        avail_width: f32,
    ) -> TaffyResult<Option<NodeId>> {
        if style.display == style::Display::None {
            return Ok(None);
        }
        if *tag == Tag::Img {
            return self.build_image(style, attrs, avail_width).map(Some);
        }
        if style.display == style::Display::Inline {
            // A lone inline element between blocks.
            return self.build_inline_group(&[&StyledNode::Element {
                tag: tag.clone(),
                style: style.clone(),
                children: children.to_vec(),
                attrs: attrs.clone(),
            }], style, avail_width);
        }

        let my_width = box_width(style, avail_width);
        let inner_width = (my_width - horizontal_insets(style)).max(1.0);

        let child_nodes = if *tag == Tag::Table {
            self.build_table_rows(children, inner_width)?
        } else {
            self.build_block_children(Some(tag), style, Some(attrs), children, inner_width)?
        };

        let taffy_style = computed_to_taffy(style);
        let node = self.taffy.new_with_children(taffy_style, &child_nodes)?;
        self.node_styles.insert(node, style.clone());
        Ok(Some(node))
    }

    /// Rows of a table, looking through `thead` / `tbody`.
    fn build_table_rows(&mut self, children: &[StyledNode], inner_width: f32) -> TaffyResult<Vec<NodeId>> {
        let mut rows = Vec::new();
        for child in children {
            let StyledNode::Element {
                tag,
                style,
                children: grand,
                ..
            } = child
            else {
                continue;
            };
            match tag {
                Tag::Thead | Tag::Tbody => {
                    for row in grand {
                        if let StyledNode::Element {
                            tag: Tag::Tr,
                            style,
                            children: cells,
                            ..
                        } = row
                        {
                            rows.push(self.build_table_row(style, cells, inner_width)?);
                        }
                    }
                }
                Tag::Tr => rows.push(self.build_table_row(style, grand, inner_width)?),
                _ => {}
            }
        }
        Ok(rows)
    }

    /// Cells share the row width equally.
    fn build_table_row(
        &mut self,
        style: &ComputedStyle,
        cells: &[StyledNode],
        table_width: f32,
    ) -> TaffyResult<NodeId> {
        let cell_count = cells
            .iter()
            .filter(|c| matches!(c, StyledNode::Element { .. }))
            .count()
            .max(1);
        let cell_width = table_width / cell_count as f32;

        let mut cell_nodes = Vec::new();
        for cell in cells {
            let StyledNode::Element {
                tag,
                style: cell_style,
                children,
                attrs,
            } = cell
            else {
                continue;
            };
            let inner = (cell_width - horizontal_insets(cell_style)).max(1.0);
            let content = self.build_block_children(Some(tag), cell_style, Some(attrs), children, inner)?;
            let mut ts = computed_to_taffy(cell_style);
            ts.flex_grow = 1.0;
            ts.flex_shrink = 1.0;
            ts.flex_basis = Dimension::Length(0.0); // equal columns
            ts.size.width = Dimension::Auto;
            let node = self.taffy.new_with_children(ts, &content)?;
            self.node_styles.insert(node, cell_style.clone());
            cell_nodes.push(node);
        }

        let mut ts = computed_to_taffy(style);
        ts.flex_direction = FlexDirection::Row;
        ts.align_items = Some(AlignItems::Stretch);
        ts.size.width = Dimension::Percent(1.0);
        let node = self.taffy.new_with_children(ts, &cell_nodes)?;
        self.node_styles.insert(node, style.clone());
        self.node_content.insert(node, BoxContent::TableRow);
        Ok(node)
    }

    fn build_image(
        &mut self,
        style: &ComputedStyle,
        attrs: &HashMap<String, String>,
        avail_width: f32,
    ) -> TaffyResult<NodeId> {
        let src = attrs.get("src").cloned().unwrap_or_default();
        // Without concrete dimensions an empty flex item computes to 0×0.
        let resolved = resolve_img_auto_dimensions(&src, style, avail_width);
        let effective = resolved.as_ref().unwrap_or(style);
        let node = self.taffy.new_leaf(computed_to_taffy(effective))?;
        self.node_styles.insert(node, effective.clone());
        if resolved.is_none() && !src.starts_with("data:") {
            log::warn!("Image '{src}' is not embedded; only data URIs are rendered");
        }
        self.node_content.insert(node, BoxContent::Image { src });
        Ok(node)
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> TaffyResult<PositionedBox> {
        let layout = self.taffy.layout(node)?;
        let style = self.node_styles.get(&node).cloned().unwrap_or_default();
        let content = self
            .node_content
            .get(&node)
            .cloned()
            .unwrap_or(BoxContent::None);

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<TaffyResult<Vec<_>>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            page_break_before: style.page_break_before,
            page_break_after: style.page_break_after,
            page_break_inside_avoid: style.page_break_inside_avoid,
            style,
            content,
            children,
        })
    }
}

pub(crate) fn text_style(style: &ComputedStyle, background: Option<[f32; 4]>) -> TextStyle {
    TextStyle {
        family: style.font_family,
        bold: style.is_bold(),
        italic: style.is_italic(),
        font_size: style.font_size,
        color: style.color.on_white(),
        background,
        underline: style.text_decoration == style::TextDecoration::Underline,
    }
}

fn border_width(side: &BorderSide) -> f32 {
    if side.is_visible() {
        side.width
    } else {
        0.0
    }
}

fn horizontal_insets(s: &ComputedStyle) -> f32 {
    s.padding_left + s.padding_right + border_width(&s.border_left) + border_width(&s.border_right)
}

/// Outer width a block takes inside `avail_width`, minus its margins.
fn box_width(s: &ComputedStyle, avail_width: f32) -> f32 {
    let width = match s.width {
        style::Dimension::Pt(w) => w,
        style::Dimension::Percent(p) => avail_width * p / 100.0,
        style::Dimension::Auto => avail_width - s.margin_left - s.margin_right,
    };
    let max = match s.max_width {
        style::Dimension::Pt(w) => w,
        style::Dimension::Percent(p) => avail_width * p / 100.0,
        style::Dimension::Auto => f32::INFINITY,
    };
    width.min(max).max(0.0)
}

fn dim_to_taffy(d: style::Dimension) -> Dimension {
    match d {
        style::Dimension::Auto => Dimension::Auto,
        style::Dimension::Pt(v) => Dimension::Length(v),
        style::Dimension::Percent(v) => Dimension::Percent(v / 100.0),
    }
}

/// Every box is a flex column: children stack vertically and stretch to the
/// container width.
fn computed_to_taffy(s: &ComputedStyle) -> Style {
    Style {
        display: Display::Flex,
        flex_direction: FlexDirection::Column,
        flex_shrink: 0.0,
        size: Size {
            width: dim_to_taffy(s.width),
            height: dim_to_taffy(s.height),
        },
        min_size: Size {
            width: Dimension::Length(0.0),
            height: Dimension::Auto,
        },
        max_size: Size {
            width: dim_to_taffy(s.max_width),
            height: Dimension::Auto,
        },
        margin: Rect {
            top: LengthPercentageAuto::Length(s.margin_top),
            right: LengthPercentageAuto::Length(s.margin_right),
            bottom: LengthPercentageAuto::Length(s.margin_bottom),
            left: LengthPercentageAuto::Length(s.margin_left),
        },
        padding: Rect {
            top: LengthPercentage::Length(s.padding_top),
            right: LengthPercentage::Length(s.padding_right),
            bottom: LengthPercentage::Length(s.padding_bottom),
            left: LengthPercentage::Length(s.padding_left),
        },
        border: Rect {
            top: LengthPercentage::Length(border_width(&s.border_top)),
            right: LengthPercentage::Length(border_width(&s.border_right)),
            bottom: LengthPercentage::Length(border_width(&s.border_bottom)),
            left: LengthPercentage::Length(border_width(&s.border_left)),
        },
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Image intrinsic-size helper
// ---------------------------------------------------------------------------

/// Attempt to decode a base64 data-URI image and return a cloned
/// [`ComputedStyle`] with any `Auto` width/height replaced by concrete point
/// values derived from the image's intrinsic dimensions. Images wider than
/// the available width are scaled down.
///
/// Returns `None` when the src is not a parseable base64 data URI, when image
/// decoding fails, or when both dimensions are already specified.
fn resolve_img_auto_dimensions(
    src: &str,
    style: &ComputedStyle,
    avail_width: f32,
) -> Option<ComputedStyle> {
    use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

    if !src.starts_with("data:") || !src.contains(";base64,") {
        return None;
    }
    let comma = src.find(',')?;
    let bytes = BASE64_STD.decode(src[comma + 1..].trim()).ok()?;
    let img = ::image::load_from_memory(&bytes).ok()?;
    let (w, h) = (img.width() as f32 * PT_PER_PX, img.height() as f32 * PT_PER_PX);
    if w == 0.0 || h == 0.0 {
        return None;
    }
    let aspect = w / h;

    let known_w = match style.width {
        style::Dimension::Pt(v) => Some(v),
        style::Dimension::Percent(p) => Some(avail_width * p / 100.0),
        style::Dimension::Auto => None,
    };
    let known_h = match style.height {
        style::Dimension::Pt(v) => Some(v),
        _ => None,
    };

    let (w, h) = match (known_w, known_h) {
        (Some(w), None) => (w, (w / aspect).max(1.0)),
        (None, Some(h)) => ((h * aspect).max(1.0), h),
        (None, None) => (w, h),
        (Some(_), Some(_)) => return None,
    };
    let (w, h) = if w > avail_width && avail_width > 0.0 {
        (avail_width, avail_width / aspect)
    } else {
        (w, h)
    };

    let mut s = style.clone();
    s.width = style::Dimension::Pt(w);
    s.height = style::Dimension::Pt(h);
    Some(s)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for a styled tree, returning a list of top-level positioned
/// boxes in document coordinates. `root_style` is the `<body>` style; boxes
/// are offset horizontally by `origin_x` (the left page margin).
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    root_style: &ComputedStyle,
    content_width: f32,
    origin_x: f32,
    fonts: &FontManager,
) -> Result<Vec<PositionedBox>> {
    layout_tree(styled_nodes, root_style, content_width, origin_x, fonts)
        .map_err(|e| WeaverError::Render(format!("layout failed: {e}")))
}

fn layout_tree(
    styled_nodes: &[StyledNode],
    root_style: &ComputedStyle,
    content_width: f32,
    origin_x: f32,
    fonts: &FontManager,
) -> TaffyResult<Vec<PositionedBox>> {
    let mut builder = LayoutBuilder::new(fonts);
    let child_ids = builder.build_block_children(None, root_style, None, styled_nodes, content_width)?;

    // Wrap all nodes in a root flex-column container
    let root_style = Style {
        display: Display::Flex,
        flex_direction: FlexDirection::Column,
        size: Size {
            width: Dimension::Length(content_width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };
    let root = builder.taffy.new_with_children(root_style, &child_ids)?;

    builder.taffy.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(content_width),
            height: AvailableSpace::MaxContent,
        },
    )?;

    Ok(builder.extract(root, origin_x, 0.0)?.children)
}

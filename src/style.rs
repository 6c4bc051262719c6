//! Style resolver – cascades a parsed [`Stylesheet`] and inline `style`
//! attributes onto the DOM, producing a flat [`ComputedStyle`] per element for
//! the layout engine.
//!
//! Order of application for each element:
//! 1. inherited text properties from the parent;
//! 2. built-in defaults for the tag (bold headings, monospace `pre`, …);
//! 3. matching stylesheet rules by specificity, then source order;
//! 4. the inline `style` attribute.
//!
//! All lengths are converted to PDF points (1px = 0.75pt).

use std::collections::HashMap;

use crate::css::{self, Combinator, Compound, Nth, Pseudo, Selector, Stylesheet};
use crate::dom::{DomNode, ElementNode, Tag};
use crate::fonts::FontFamily;

/// Points per CSS pixel.
pub const PT_PER_PX: f32 = 0.75;
/// Root font size (16px).
pub const ROOT_FONT_SIZE: f32 = 12.0;

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    pub display: Display,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,
    pub max_width: Dimension,

    // Spacing (pt)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    // Border
    pub border_top: BorderSide,
    pub border_right: BorderSide,
    pub border_bottom: BorderSide,
    pub border_left: BorderSide,

    // Typography
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_family: FontFamily,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,
    pub font_style: FontStyle,
    pub white_space: WhiteSpace,

    // Background
    pub background_color: Color,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            width: Dimension::Auto,
            height: Dimension::Auto,
            max_width: Dimension::Auto,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            border_top: BorderSide::NONE,
            border_right: BorderSide::NONE,
            border_bottom: BorderSide::NONE,
            border_left: BorderSide::NONE,
            font_size: ROOT_FONT_SIZE,
            font_weight: FontWeight::Normal,
            font_family: FontFamily::Serif,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.2,
            text_decoration: TextDecoration::None,
            font_style: FontStyle::Normal,
            white_space: WhiteSpace::Normal,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// A fresh style carrying only the inheritable properties of `self`.
    pub fn inherited(&self) -> Self {
        Self {
            font_size: self.font_size,
            font_weight: self.font_weight,
            font_family: self.font_family,
            color: self.color,
            text_align: self.text_align,
            line_height: self.line_height,
            font_style: self.font_style,
            white_space: self.white_space,
            // Underlines propagate to inline descendants.
            text_decoration: self.text_decoration,
            ..Self::default()
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    pub fn borders(&self) -> [&BorderSide; 4] {
        [
            &self.border_top,
            &self.border_right,
            &self.border_bottom,
            &self.border_left,
        ]
    }
}

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
    /// Laid out flush left; lines are not stretched.
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Normal,
    /// Keep spaces and newlines; long lines still wrap.
    Pre,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    Percent(f32),
}

/// One edge of a box border. A zero width means no border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderSide {
    pub width: f32,
    pub color: Color,
}

impl BorderSide {
    pub const NONE: Self = Self {
        width: 0.0,
        color: Color::BLACK,
    };

    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && !self.color.is_transparent()
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    /// Blend onto a white page; PDF output has no alpha.
    pub fn on_white(&self) -> [f32; 4] {
        let a = self.a.clamp(0.0, 1.0);
        let mix = |c: f32| c * a + (1.0 - a);
        [mix(self.r), mix(self.g), mix(self.b), 1.0]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Parse `#hex`, `rgb()`, `rgba()` or a handful of named colours.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v.starts_with('#') {
            return Self::from_hex(&v);
        }
        if let Some(args) = v
            .strip_prefix("rgba(")
            .or_else(|| v.strip_prefix("rgb("))
            .and_then(|r| r.strip_suffix(')'))
        {
            let parts: Vec<f32> = args
                .split([',', ' ', '/'])
                .filter(|p| !p.is_empty())
                .filter_map(|p| p.trim().parse().ok())
                .collect();
            return match parts.as_slice() {
                [r, g, b] => Some(Self {
                    r: r / 255.0,
                    g: g / 255.0,
                    b: b / 255.0,
                    a: 1.0,
                }),
                [r, g, b, a] => Some(Self {
                    r: r / 255.0,
                    g: g / 255.0,
                    b: b / 255.0,
                    a: *a,
                }),
                _ => None,
            };
        }
        match v.as_str() {
            "black" => Some(Self::BLACK),
            "white" => Some(Self::WHITE),
            "transparent" => Some(Self::TRANSPARENT),
            "red" => Some(Self::rgb(255, 0, 0)),
            "green" => Some(Self::rgb(0, 128, 0)),
            "blue" => Some(Self::rgb(0, 0, 255)),
            "gray" | "grey" => Some(Self::rgb(128, 128, 128)),
            "silver" => Some(Self::rgb(192, 192, 192)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Selector matching
// ---------------------------------------------------------------------------

/// What a selector can see of one element.
#[derive(Debug, Clone)]
pub struct ElementInfo<'a> {
    pub tag: &'a str,
    pub classes: Vec<&'a str>,
    /// 1-based position among element siblings.
    pub index: usize,
}

impl<'a> ElementInfo<'a> {
    pub fn new(element: &'a ElementNode, index: usize) -> Self {
        Self {
            tag: element.tag.name(),
            classes: element.classes(),
            index,
        }
    }
}

/// Does `selector` match the last element of `chain` (root first)?
pub fn matches_selector(selector: &Selector, chain: &[ElementInfo]) -> bool {
    let (Some(((link, subject), rest)), Some((element, ancestors))) =
        (selector.parts.split_last(), chain.split_last())
    else {
        return false;
    };
    matches_compound(subject, element) && matches_ancestors(rest, *link, ancestors)
}

/// `parts` must match `ancestors`, the nearest connected through `link`.
fn matches_ancestors(
    parts: &[(Combinator, Compound)],
    link: Combinator,
    ancestors: &[ElementInfo],
) -> bool {
    let Some(((next_link, compound), rest)) = parts.split_last() else {
        return true;
    };
    match link {
        Combinator::Child => match ancestors.split_last() {
            Some((parent, above)) => {
                matches_compound(compound, parent) && matches_ancestors(rest, *next_link, above)
            }
            None => false,
        },
        Combinator::Descendant => (0..ancestors.len()).rev().any(|i| {
            matches_compound(compound, &ancestors[i])
                && matches_ancestors(rest, *next_link, &ancestors[..i])
        }),
    }
}

fn matches_compound(compound: &Compound, element: &ElementInfo) -> bool {
    if let Some(tag) = &compound.tag {
        if tag != element.tag {
            return false;
        }
    }
    if !compound
        .classes
        .iter()
        .all(|c| element.classes.contains(&c.as_str()))
    {
        return false;
    }
    compound.pseudos.iter().all(|p| match p {
        Pseudo::FirstChild => element.index == 1,
        Pseudo::NthChild(Nth::Even) => element.index % 2 == 0,
        Pseudo::NthChild(Nth::Odd) => element.index % 2 == 1,
        Pseudo::NthChild(Nth::Index(n)) => element.index == *n,
    })
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for the last element of `chain`, inheriting text
/// properties from `parent`.
pub fn resolve_style(
    element: &ElementNode,
    chain: &[ElementInfo],
    parent: Option<&ComputedStyle>,
    sheet: &Stylesheet,
) -> ComputedStyle {
    let parent_font_size = parent.map_or(ROOT_FONT_SIZE, |p| p.font_size);
    let mut style = parent.map(ComputedStyle::inherited).unwrap_or_default();
    apply_tag_defaults(&mut style, &element.tag, parent_font_size);

    let mut matched: Vec<((usize, usize), usize, &[css::Declaration])> = sheet
        .rules
        .iter()
        .filter_map(|rule| {
            rule.selectors
                .iter()
                .filter(|sel| matches_selector(sel, chain))
                .map(Selector::specificity)
                .max()
                .map(|spec| (spec, rule.order, rule.declarations.as_slice()))
        })
        .collect();
    matched.sort_by_key(|(spec, order, _)| (*spec, *order));

    for (_, _, declarations) in matched {
        for decl in declarations {
            apply_css_property(&mut style, &decl.property, &decl.value, parent_font_size);
        }
    }

    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline, parent_font_size);
    }

    style
}

/// Built-in defaults based on tag semantics.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag, parent_font_size: f32) {
    let em = parent_font_size;
    match tag {
        Tag::H1 | Tag::H2 | Tag::H3 | Tag::H4 | Tag::H5 | Tag::H6 => {
            let scale = match tag {
                Tag::H1 => 2.0,
                Tag::H2 => 1.5,
                Tag::H3 => 1.17,
                Tag::H4 => 1.0,
                Tag::H5 => 0.83,
                _ => 0.67,
            };
            s.font_size = em * scale;
            s.font_weight = FontWeight::Bold;
            s.margin_top = s.font_size * 0.67;
            s.margin_bottom = s.font_size * 0.67;
        }
        Tag::P => {
            s.margin_bottom = em;
        }
        Tag::Ul | Tag::Ol => {
            s.margin_bottom = em;
            s.padding_left = 40.0 * PT_PER_PX;
        }
        Tag::Li => {
            s.display = Display::ListItem;
        }
        Tag::Blockquote => {
            s.margin_top = em;
            s.margin_bottom = em;
            s.margin_left = 40.0 * PT_PER_PX;
            s.margin_right = 40.0 * PT_PER_PX;
        }
        Tag::Pre => {
            s.font_family = FontFamily::Monospace;
            s.white_space = WhiteSpace::Pre;
            s.margin_top = em;
            s.margin_bottom = em;
        }
        Tag::Hr => {
            s.margin_top = em * 0.5;
            s.margin_bottom = em * 0.5;
            let side = BorderSide {
                width: 1.0,
                color: Color::rgb(128, 128, 128),
            };
            s.border_top = side;
            s.border_bottom = side;
        }
        Tag::Table => {
            s.display = Display::Table;
        }
        Tag::Thead | Tag::Tbody => {}
        Tag::Tr => {
            s.display = Display::TableRow;
        }
        Tag::Td | Tag::Th => {
            s.display = Display::TableCell;
            s.padding_top = 1.0;
            s.padding_right = 1.0;
            s.padding_bottom = 1.0;
            s.padding_left = 1.0;
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.text_align = TextAlign::Center;
            }
        }
        Tag::Code => {
            s.display = Display::Inline;
            s.font_family = FontFamily::Monospace;
        }
        Tag::Strong | Tag::B => {
            s.display = Display::Inline;
            s.font_weight = FontWeight::Bold;
        }
        Tag::Em | Tag::I => {
            s.display = Display::Inline;
            s.font_style = FontStyle::Italic;
        }
        Tag::A => {
            s.display = Display::Inline;
            s.color = Color::rgb(0, 0, 238);
            s.text_decoration = TextDecoration::Underline;
        }
        Tag::Span | Tag::Br => {
            s.display = Display::Inline;
        }
        Tag::Img => {
            s.display = Display::Inline;
        }
        Tag::Head | Tag::Title | Tag::Meta => {
            s.display = Display::None;
        }
        Tag::Unknown(name) if matches!(name.as_str(), "script" | "style" | "link") => {
            s.display = Display::None;
        }
        Tag::Div | Tag::Body | Tag::Html | Tag::Unknown(_) => {}
    }
}

// ---------------------------------------------------------------------------
// Property parsing
// ---------------------------------------------------------------------------

fn apply_inline_style(s: &mut ComputedStyle, style_str: &str, parent_font_size: f32) {
    for decl in css::parse_declarations(style_str) {
        apply_css_property(s, &decl.property, &decl.value, parent_font_size);
    }
}

/// Apply one declaration. Unknown properties and unparseable values are
/// ignored.
pub fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str, parent_font_size: f32) {
    let val = val.trim();
    let em = s.font_size;
    match prop {
        "display" => {
            s.display = match val {
                "block" | "flex" | "grid" => Display::Block,
                "inline" | "inline-block" => Display::Inline,
                "list-item" => Display::ListItem,
                "table" => Display::Table,
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "font-size" => {
            if let Some(pt) = parse_font_size(val, parent_font_size) {
                s.font_size = pt;
            }
        }
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "font-family" => {
            if let Some(family) = parse_font_family(val) {
                s.font_family = family;
            }
        }
        "font" => {
            // Only the family part of the shorthand matters here.
            if let Some(family) = parse_font_family(val) {
                s.font_family = family;
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = val.split_whitespace().find_map(Color::parse).or_else(|| Color::parse(val)) {
                s.background_color = c;
            } else if val == "none" {
                s.background_color = Color::TRANSPARENT;
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                "justify" => TextAlign::Justify,
                _ => TextAlign::Left,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if val.contains("underline") {
                TextDecoration::Underline
            } else {
                TextDecoration::None
            }
        }
        "white-space" => {
            s.white_space = match val {
                "pre" | "pre-wrap" | "pre-line" | "break-spaces" => WhiteSpace::Pre,
                _ => WhiteSpace::Normal,
            }
        }
        "width" => s.width = parse_dimension(val, em),
        "height" => s.height = parse_dimension(val, em),
        "max-width" => s.max_width = parse_dimension(val, em),
        "margin" => apply_shorthand_spacing(
            val,
            em,
            &mut s.margin_top,
            &mut s.margin_right,
            &mut s.margin_bottom,
            &mut s.margin_left,
        ),
        "margin-top" => set_length(&mut s.margin_top, val, em),
        "margin-right" => set_length(&mut s.margin_right, val, em),
        "margin-bottom" => set_length(&mut s.margin_bottom, val, em),
        "margin-left" => set_length(&mut s.margin_left, val, em),
        "padding" => apply_shorthand_spacing(
            val,
            em,
            &mut s.padding_top,
            &mut s.padding_right,
            &mut s.padding_bottom,
            &mut s.padding_left,
        ),
        "padding-top" => set_length(&mut s.padding_top, val, em),
        "padding-right" => set_length(&mut s.padding_right, val, em),
        "padding-bottom" => set_length(&mut s.padding_bottom, val, em),
        "padding-left" => set_length(&mut s.padding_left, val, em),
        "border" => {
            let side = parse_border(val, s.color, em);
            s.border_top = side;
            s.border_right = side;
            s.border_bottom = side;
            s.border_left = side;
        }
        "border-top" => s.border_top = parse_border(val, s.color, em),
        "border-right" => s.border_right = parse_border(val, s.color, em),
        "border-bottom" => s.border_bottom = parse_border(val, s.color, em),
        "border-left" => s.border_left = parse_border(val, s.color, em),
        "border-width" => {
            if let Some(w) = parse_length(val, em) {
                for side in [
                    &mut s.border_top,
                    &mut s.border_right,
                    &mut s.border_bottom,
                    &mut s.border_left,
                ] {
                    side.width = w;
                }
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                for side in [
                    &mut s.border_top,
                    &mut s.border_right,
                    &mut s.border_bottom,
                    &mut s.border_left,
                ] {
                    side.color = c;
                }
            }
        }
        "line-height" => {
            if val == "normal" {
                s.line_height = 1.2;
            } else if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(pct) = val.strip_suffix('%').and_then(|p| p.trim().parse::<f32>().ok()) {
                s.line_height = pct / 100.0;
            } else if let Some(pt) = parse_length(val, em) {
                if s.font_size > 0.0 {
                    s.line_height = pt / s.font_size;
                }
            }
        }
        "break-before" | "page-break-before" => {
            s.page_break_before = matches!(val, "always" | "page" | "left" | "right");
        }
        "break-after" | "page-break-after" => {
            s.page_break_after = matches!(val, "always" | "page" | "left" | "right");
        }
        "break-inside" | "page-break-inside" => {
            s.page_break_inside_avoid = val == "avoid";
        }
        _ => {}
    }
}

fn set_length(target: &mut f32, val: &str, em: f32) {
    if let Some(pt) = parse_length(val, em) {
        *target = pt;
    }
}

/// Parse a CSS length into points. `em` is the reference font size.
/// Percentages and `auto` are not lengths here.
pub fn parse_length(val: &str, em: f32) -> Option<f32> {
    let v = val.trim();
    if v == "0" {
        return Some(0.0);
    }
    let split = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let (num, unit) = v.split_at(split);
    let n: f32 = num.parse().ok()?;
    let pt = match unit {
        "px" => n * PT_PER_PX,
        "pt" => n,
        "cm" => n * 72.0 / 2.54,
        "mm" => n * 72.0 / 25.4,
        "in" => n * 72.0,
        "pc" => n * 12.0,
        "em" => n * em,
        "rem" => n * ROOT_FONT_SIZE,
        "" => n * PT_PER_PX,
        _ => return None,
    };
    Some(pt)
}

fn parse_font_size(val: &str, parent: f32) -> Option<f32> {
    if let Some(pct) = val.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|p| parent * p / 100.0);
    }
    let keyword = match val {
        "xx-small" => Some(0.5625),
        "x-small" => Some(0.625),
        "small" => Some(0.8125),
        "medium" => Some(1.0),
        "large" => Some(1.125),
        "x-large" => Some(1.5),
        "xx-large" => Some(2.0),
        "smaller" => return Some(parent * 0.83),
        "larger" => return Some(parent * 1.2),
        _ => None,
    };
    match keyword {
        Some(k) => Some(ROOT_FONT_SIZE * k),
        None => parse_length(val, parent),
    }
}

/// First recognised family in a `font-family` list.
pub fn parse_font_family(val: &str) -> Option<FontFamily> {
    css::split_top_level(val, ',').into_iter().find_map(|name| {
        let name = name
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_ascii_lowercase();
        // `font` shorthand: the family is the trailing part.
        let name = name.rsplit(' ').next().unwrap_or(&name).to_string();
        match name.as_str() {
            "helvetica" | "arial" | "sans-serif" | "verdana" | "system-ui" => {
                Some(FontFamily::SansSerif)
            }
            "georgia" | "times" | "roman" | "serif" | "cambria" => Some(FontFamily::Serif),
            "menlo" | "monaco" | "consolas" | "courier" | "monospace" => Some(FontFamily::Monospace),
            _ => None,
        }
    })
}

fn parse_dimension(s: &str, em: f32) -> Dimension {
    let s = s.trim();
    if s == "auto" || s == "none" {
        Dimension::Auto
    } else if let Some(pct) = s.strip_suffix('%') {
        pct.trim()
            .parse::<f32>()
            .map(Dimension::Percent)
            .unwrap_or(Dimension::Auto)
    } else {
        parse_length(s, em).map(Dimension::Pt).unwrap_or(Dimension::Auto)
    }
}

/// `border` shorthand: `<width> <style> <color>` in any order.
fn parse_border(val: &str, current_color: Color, em: f32) -> BorderSide {
    let mut side = BorderSide {
        width: 3.0 * PT_PER_PX,
        color: current_color,
    };
    for token in css::split_top_level(val, ' ') {
        let token = token.trim();
        match token {
            "" => {}
            "none" | "hidden" => return BorderSide::NONE,
            "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset" | "outset" => {}
            "thin" => side.width = 1.0 * PT_PER_PX,
            "medium" => side.width = 3.0 * PT_PER_PX,
            "thick" => side.width = 5.0 * PT_PER_PX,
            t => {
                if let Some(w) = parse_length(t, em) {
                    side.width = w;
                } else if let Some(c) = Color::parse(t) {
                    side.color = c;
                }
            }
        }
    }
    side
}

fn apply_shorthand_spacing(
    val: &str,
    em: f32,
    top: &mut f32,
    right: &mut f32,
    bottom: &mut f32,
    left: &mut f32,
) {
    // `auto` counts as zero; horizontal centring is not supported.
    let parts: Vec<f32> = val
        .split_whitespace()
        .map(|p| if p == "auto" { Some(0.0) } else { parse_length(p, em) })
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default();
    let (t, r, b, l) = match parts.as_slice() {
        [a] => (*a, *a, *a, *a),
        [v, h] => (*v, *h, *v, *h),
        [t, h, b] => (*t, *h, *b, *h),
        [t, r, b, l] => (*t, *r, *b, *l),
        _ => return,
    };
    *top = t;
    *right = r;
    *bottom = b;
    *left = l;
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (for images src, etc.)
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

/// Style a whole document. Returns the style of `<body>` (or of a synthetic
/// root when there is none) together with the styled body content.
pub fn build_styled_document(nodes: &[DomNode], sheet: &Stylesheet) -> (ComputedStyle, Vec<StyledNode>) {
    let body = find_body(nodes);
    let synthetic = ElementNode::new(Tag::Body);
    let body_el = body.unwrap_or(&synthetic);

    let chain = vec![ElementInfo::new(body_el, 1)];
    let root_style = resolve_style(body_el, &chain, None, sheet);
    let content: &[DomNode] = match body {
        Some(b) => &b.children,
        None => nodes,
    };
    let styled = build_styled_tree(content, &chain, Some(&root_style), sheet);
    (root_style, styled)
}

fn find_body(nodes: &[DomNode]) -> Option<&ElementNode> {
    nodes.iter().find_map(|n| match n {
        DomNode::Element(e) if e.tag == Tag::Body => Some(e),
        DomNode::Element(e) if e.tag == Tag::Html => find_body(&e.children),
        _ => None,
    })
}

/// Build a styled tree from a DOM tree, resolving styles top-down. `chain`
/// holds the already-resolved ancestors (root first).
pub fn build_styled_tree(
    nodes: &[DomNode],
    chain: &[ElementInfo],
    parent_style: Option<&ComputedStyle>,
    sheet: &Stylesheet,
) -> Vec<StyledNode> {
    let mut result = Vec::new();
    let mut element_index = 0;
    for node in nodes {
        match node {
            DomNode::Element(e) => {
                element_index += 1;
                let mut own_chain = chain.to_vec();
                own_chain.push(ElementInfo::new(e, element_index));
                let style = resolve_style(e, &own_chain, parent_style, sheet);
                if style.display == Display::None {
                    continue;
                }
                let children = build_styled_tree(&e.children, &own_chain, Some(&style), sheet);
                result.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    attrs: e.attributes.clone(),
                });
            }
            DomNode::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                // Text nodes render inline and carry only inherited properties.
                let style = parent_style.map(ComputedStyle::inherited).unwrap_or_default();
                result.push(StyledNode::Text {
                    text: text.clone(),
                    style,
                });
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parse_stylesheet;
    use crate::dom::parse_html;

    fn element_style<'a>(nodes: &'a [StyledNode], path: &[usize]) -> &'a ComputedStyle {
        let elements: Vec<&StyledNode> = nodes
            .iter()
            .filter(|n| matches!(n, StyledNode::Element { .. }))
            .collect();
        match elements[path[0]] {
            StyledNode::Element { style, children, .. } => {
                if path.len() == 1 {
                    style
                } else {
                    element_style(children, &path[1..])
                }
            }
            StyledNode::Text { .. } => unreachable!(),
        }
    }

    #[test]
    fn lengths_convert_to_points() {
        assert_eq!(parse_length("12px", 10.0), Some(9.0));
        assert_eq!(parse_length("8pt", 10.0), Some(8.0));
        assert_eq!(parse_length("2em", 10.0), Some(20.0));
        assert!((parse_length("2cm", 10.0).unwrap() - 56.69).abs() < 0.01);
        assert_eq!(parse_length("auto", 10.0), None);
    }

    #[test]
    fn colors_parse() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.r - 1.0).abs() < 0.01);
        assert!((c.g - 0.533).abs() < 0.01);
        let faint = Color::parse("rgba(0, 0, 0, 0.03)").unwrap();
        assert!((faint.on_white()[0] - 0.97).abs() < 0.001);
        assert_eq!(Color::parse("white"), Some(Color::WHITE));
        assert_eq!(Color::parse("#eee"), Some(Color::rgb(0xee, 0xee, 0xee)));
    }

    #[test]
    fn font_family_lists() {
        assert_eq!(
            parse_font_family("'Georgia', 'Times New Roman', serif"),
            Some(FontFamily::Serif)
        );
        assert_eq!(
            parse_font_family("'Menlo', 'Monaco', 'Consolas', monospace"),
            Some(FontFamily::Monospace)
        );
        assert_eq!(parse_font_family("'Helvetica', sans-serif"), Some(FontFamily::SansSerif));
    }

    #[test]
    fn cascade_orders_by_specificity_then_source() {
        let sheet = parse_stylesheet(
            ".lesson p { color: #ff0000; } p { color: #0000ff; font-size: 10pt; } p { font-size: 14pt; }",
        );
        let dom = parse_html(r#"<div class="lesson"><p>x</p></div>"#);
        let (_, styled) = build_styled_document(&dom, &sheet);
        let p = element_style(&styled, &[0, 0]);
        assert_eq!(p.color, Color::rgb(255, 0, 0));
        assert_eq!(p.font_size, 14.0);
    }

    #[test]
    fn inline_style_wins() {
        let sheet = parse_stylesheet("span { color: #00ff00; }");
        let dom = parse_html(r#"<p><span style="color: #ff0000; font-size: 24px">x</span></p>"#);
        let (_, styled) = build_styled_document(&dom, &sheet);
        let span = element_style(&styled, &[0, 0]);
        assert_eq!(span.color, Color::rgb(255, 0, 0));
        assert_eq!(span.font_size, 18.0);
    }

    #[test]
    fn structural_pseudo_classes() {
        let sheet = parse_stylesheet(
            ".lesson { page-break-before: always; } .lesson:first-child { page-break-before: avoid; } tr:nth-child(even) { background-color: #f9f9f9; }",
        );
        let dom = parse_html(
            "<div class=\"lesson\"></div>\n<div class=\"lesson\"></div><table><tbody><tr></tr><tr></tr></tbody></table>",
        );
        let (_, styled) = build_styled_document(&dom, &sheet);
        assert!(!element_style(&styled, &[0]).page_break_before);
        assert!(element_style(&styled, &[1]).page_break_before);
        assert!(element_style(&styled, &[2, 0, 0]).background_color.is_transparent());
        assert!(!element_style(&styled, &[2, 0, 1]).background_color.is_transparent());
    }

    #[test]
    fn child_combinator() {
        let sheet = parse_stylesheet("li > ul { margin-top: 6px; }");
        let dom = parse_html("<ul><li><ul><li>x</li></ul></li></ul>");
        let (_, styled) = build_styled_document(&dom, &sheet);
        assert_eq!(element_style(&styled, &[0]).margin_top, 0.0);
        assert_eq!(element_style(&styled, &[0, 0, 0]).margin_top, 4.5);
    }

    #[test]
    fn body_rule_inherits_into_content() {
        let sheet = parse_stylesheet("body { font-size: 11pt; color: #333; } h1 { font-size: 24pt; }");
        let dom = parse_html("<html><body><h1>T</h1><p>x</p></body></html>");
        let (root, styled) = build_styled_document(&dom, &sheet);
        assert_eq!(root.font_size, 11.0);
        assert_eq!(element_style(&styled, &[0]).font_size, 24.0);
        assert!(element_style(&styled, &[0]).is_bold());
        assert_eq!(element_style(&styled, &[1]).color, Color::rgb(0x33, 0x33, 0x33));
    }

    #[test]
    fn border_shorthands() {
        let mut s = ComputedStyle::default();
        apply_css_property(&mut s, "border-bottom", "3px solid #3498db", 12.0);
        assert_eq!(s.border_bottom.width, 2.25);
        assert_eq!(s.border_bottom.color, Color::rgb(0x34, 0x98, 0xdb));
        apply_css_property(&mut s, "border", "none", 12.0);
        assert!(!s.border_bottom.is_visible());
    }

    #[test]
    fn spacing_shorthand_forms() {
        let mut s = ComputedStyle::default();
        apply_css_property(&mut s, "padding", "10px 20px", 12.0);
        assert_eq!((s.padding_top, s.padding_left), (7.5, 15.0));
        apply_css_property(&mut s, "margin", "15px 0", 12.0);
        assert_eq!((s.margin_top, s.margin_right), (11.25, 0.0));
    }
}

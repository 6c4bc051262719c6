//! Font metrics and line breaking.
//!
//! PDF output uses the 14 builtin fonts (Times, Helvetica, Courier), which
//! are never embedded, so text is measured with per-family width heuristics
//! tuned to those faces.

use serde::{Deserialize, Serialize};

use crate::layout_config::{TextFragment, TextStyle};

/// The generic family a CSS `font-family` list resolves to.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    Serif,
    SansSerif,
    Monospace,
}

/// Text measurement for the builtin PDF fonts.
#[derive(Debug, Default, Clone, Copy)]
pub struct FontManager;

impl FontManager {
    /// Measure the width of a string at a given font size (in pt).
    pub fn measure_text_width(
        &self,
        text: &str,
        font_size: f32,
        bold: bool,
        _italic: bool,
        family: FontFamily,
    ) -> f32 {
        text.chars()
            .map(|c| builtin_char_width(c, family, bold))
            .sum::<f32>()
            * font_size
    }

    pub fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        self.measure_text_width(text, style.font_size, style.bold, style.italic, style.family)
    }
}

/// Approximate advance of `c` in em for the builtin fonts.
fn builtin_char_width(c: char, family: FontFamily, bold: bool) -> f32 {
    if family == FontFamily::Monospace {
        return 0.6;
    }
    let base = match c {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.28,
        ' ' | 'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' | '/' => 0.36,
        'm' | 'w' | 'M' | 'W' | '@' => 0.86,
        c if c.is_ascii_uppercase() => 0.68,
        c if c.is_ascii_digit() => 0.56,
        c if c.is_ascii() => 0.52,
        // Non-Latin glyphs are replaced downstream; reserve a full width.
        _ => 0.6,
    };
    let family_scale = match family {
        FontFamily::Serif => 0.94,
        _ => 1.0,
    };
    let weight_scale = if bold { 1.08 } else { 1.0 };
    base * family_scale * weight_scale
}

// ---------------------------------------------------------------------------
// Line breaking
// ---------------------------------------------------------------------------

/// A piece of inline text with uniform style.
#[derive(Debug, Clone)]
pub struct InlineRun {
    pub text: String,
    pub style: TextStyle,
    /// Keep spaces and newlines as written.
    pub preformatted: bool,
}

impl InlineRun {
    /// A forced line break (`<br>`).
    pub fn line_break(style: TextStyle) -> Self {
        Self {
            text: "\n".to_string(),
            style,
            preformatted: true,
        }
    }
}

enum Item {
    /// Unbreakable text, possibly spanning several runs.
    Word(Vec<(String, usize)>),
    Space(usize),
    Break,
}

fn tokenize(runs: &[InlineRun]) -> Vec<Item> {
    let mut items = Vec::new();
    let mut word: Vec<(String, usize)> = Vec::new();

    fn flush(word: &mut Vec<(String, usize)>, items: &mut Vec<Item>) {
        if !word.is_empty() {
            items.push(Item::Word(std::mem::take(word)));
        }
    }

    for (idx, run) in runs.iter().enumerate() {
        for c in run.text.chars() {
            match c {
                '\n' if run.preformatted => {
                    flush(&mut word, &mut items);
                    items.push(Item::Break);
                }
                '\r' if run.preformatted => {}
                ' ' | '\t' if run.preformatted => {
                    flush(&mut word, &mut items);
                    let n = if c == '\t' { 4 } else { 1 };
                    for _ in 0..n {
                        items.push(Item::Space(idx));
                    }
                }
                c if c.is_whitespace() && c != '\u{00A0}' => {
                    flush(&mut word, &mut items);
                    if !matches!(items.last(), Some(Item::Space(_))) {
                        items.push(Item::Space(idx));
                    }
                }
                c => match word.last_mut() {
                    Some((text, r)) if *r == idx => text.push(c),
                    _ => word.push((c.to_string(), idx)),
                },
            }
        }
    }
    flush(&mut word, &mut items);
    items
}

struct LineBuilder<'a> {
    runs: &'a [InlineRun],
    fonts: &'a FontManager,
    lines: Vec<Vec<TextFragment>>,
    current: Vec<TextFragment>,
    current_run: Option<usize>,
    x: f32,
}

impl<'a> LineBuilder<'a> {
    fn push(&mut self, text: &str, run: usize) {
        let runs = self.runs;
        let style = &runs[run].style;
        let w = self.fonts.measure(text, style);
        match self.current.last_mut() {
            Some(frag) if self.current_run == Some(run) => {
                frag.text.push_str(text);
                frag.width += w;
            }
            _ => self.current.push(TextFragment {
                text: text.to_string(),
                x_offset: self.x,
                width: w,
                style: style.clone(),
            }),
        }
        self.current_run = Some(run);
        self.x += w;
    }

    fn finish_line(&mut self) {
        // Collapsible trailing spaces do not count.
        let runs = self.runs;
        let fonts = self.fonts;
        if let Some(frag) = self.current.last_mut() {
            let run = self.current_run.map(|r| &runs[r]);
            if run.is_some_and(|r| !r.preformatted) {
                let trimmed = frag.text.trim_end_matches(' ').len();
                if trimmed < frag.text.len() {
                    frag.text.truncate(trimmed);
                    frag.width = fonts.measure(&frag.text, &frag.style);
                }
            }
        }
        self.lines.push(std::mem::take(&mut self.current));
        self.current_run = None;
        self.x = 0.0;
    }

    fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

/// Break styled runs into lines no wider than `max_width`.
///
/// Whitespace in normal runs collapses to single spaces, and spaces at a
/// line start are dropped. Preformatted runs keep every space and break
/// at `\n`. A word wider than a whole line is split between characters.
/// Fragment offsets are relative to the line start.
pub fn wrap_runs(runs: &[InlineRun], max_width: f32, fonts: &FontManager) -> Vec<Vec<TextFragment>> {
    let max_width = if max_width > 0.0 { max_width } else { f32::INFINITY };
    let mut b = LineBuilder {
        runs,
        fonts,
        lines: Vec::new(),
        current: Vec::new(),
        current_run: None,
        x: 0.0,
    };
    let mut pending_space: Option<usize> = None;

    for item in tokenize(runs) {
        match item {
            Item::Break => {
                b.finish_line();
                pending_space = None;
            }
            Item::Space(r) if runs[r].preformatted => {
                let w = fonts.measure(" ", &runs[r].style);
                if b.x + w > max_width && !b.is_empty() {
                    b.finish_line();
                }
                b.push(" ", r);
            }
            Item::Space(r) => {
                if !b.is_empty() {
                    pending_space = Some(r);
                }
            }
            Item::Word(pieces) => {
                let word_w: f32 = pieces
                    .iter()
                    .map(|(t, r)| fonts.measure(t, &runs[*r].style))
                    .sum();
                let space_w = pending_space.map_or(0.0, |r| fonts.measure(" ", &runs[r].style));
                if !b.is_empty() && b.x + space_w + word_w > max_width {
                    b.finish_line();
                    pending_space = None;
                }
                if let Some(r) = pending_space.take() {
                    b.push(" ", r);
                }
                if word_w > max_width && b.is_empty() {
                    for (text, r) in &pieces {
                        for c in text.chars() {
                            let mut buf = [0u8; 4];
                            let s = c.encode_utf8(&mut buf);
                            let cw = fonts.measure(s, &runs[*r].style);
                            if b.x + cw > max_width && !b.is_empty() {
                                b.finish_line();
                            }
                            b.push(s, *r);
                        }
                    }
                } else {
                    for (text, r) in &pieces {
                        b.push(text, *r);
                    }
                }
            }
        }
    }
    if !b.is_empty() {
        b.finish_line();
    }
    b.lines
}

/// Width of a wrapped line.
pub fn line_width(line: &[TextFragment]) -> f32 {
    line.last().map_or(0.0, |f| f.x_offset + f.width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(family: FontFamily) -> TextStyle {
        TextStyle {
            family,
            bold: false,
            italic: false,
            font_size: 10.0,
            color: [0.0, 0.0, 0.0, 1.0],
            background: None,
            underline: false,
        }
    }

    fn run(text: &str, family: FontFamily, preformatted: bool) -> InlineRun {
        InlineRun {
            text: text.to_string(),
            style: style(family),
            preformatted,
        }
    }

    fn line_texts(lines: &[Vec<TextFragment>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.iter().map(|f| f.text.as_str()).collect())
            .collect()
    }

    #[test]
    fn monospace_width_is_exact() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 10.0, false, false, FontFamily::Monospace);
        assert!((w - 30.0).abs() < 0.01);
    }

    #[test]
    fn bold_is_wider() {
        let mgr = FontManager::default();
        let normal = mgr.measure_text_width("Hello", 10.0, false, false, FontFamily::SansSerif);
        let bold = mgr.measure_text_width("Hello", 10.0, true, false, FontFamily::SansSerif);
        assert!(bold > normal);
    }

    #[test]
    fn serif_is_narrower_than_sans() {
        let mgr = FontManager::default();
        let serif = mgr.measure_text_width("Ownership", 12.0, false, false, FontFamily::Serif);
        let sans = mgr.measure_text_width("Ownership", 12.0, false, false, FontFamily::SansSerif);
        assert!(serif < sans);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_runs(&[run("Hello world foo bar", FontFamily::Monospace, false)], 60.0, &mgr);
        assert_eq!(line_texts(&lines), vec!["Hello", "world foo", "bar"]);
    }

    #[test]
    fn whitespace_collapses_across_runs() {
        let mgr = FontManager::default();
        let runs = [
            run("  one \n ", FontFamily::Serif, false),
            run(" two", FontFamily::Serif, false),
        ];
        let lines = wrap_runs(&runs, 500.0, &mgr);
        assert_eq!(line_texts(&lines), vec!["one two"]);
    }

    #[test]
    fn styled_word_stays_together() {
        let mgr = FontManager::default();
        // "bold," where the comma belongs to a different run
        let mut bold = run("bold", FontFamily::Monospace, false);
        bold.style.bold = true;
        let runs = [run("aaaa ", FontFamily::Monospace, false), bold, run(", x", FontFamily::Monospace, false)];
        let lines = wrap_runs(&runs, 40.0, &mgr);
        assert_eq!(line_texts(&lines), vec!["aaaa", "bold,", "x"]);
        assert_eq!(lines[1].len(), 2);
        assert!(lines[1][0].style.bold);
        assert!((lines[1][1].x_offset - 24.0).abs() < 0.01);
    }

    #[test]
    fn preformatted_keeps_indentation_and_blank_lines() {
        let mgr = FontManager::default();
        let lines = wrap_runs(
            &[run("fn main() {\n\n    body();\n}\n", FontFamily::Monospace, true)],
            1000.0,
            &mgr,
        );
        assert_eq!(line_texts(&lines), vec!["fn main() {", "", "    body();", "}"]);
    }

    #[test]
    fn long_word_split_between_characters() {
        let mgr = FontManager::default();
        let lines = wrap_runs(&[run("abcdefghij", FontFamily::Monospace, false)], 30.0, &mgr);
        assert_eq!(line_texts(&lines), vec!["abcde", "fghij"]);
    }

    #[test]
    fn explicit_break() {
        let mgr = FontManager::default();
        let runs = [
            run("one", FontFamily::Serif, false),
            InlineRun::line_break(style(FontFamily::Serif)),
            run("two", FontFamily::Serif, false),
        ];
        assert_eq!(line_texts(&wrap_runs(&runs, 500.0, &mgr)), vec!["one", "two"]);
    }
}

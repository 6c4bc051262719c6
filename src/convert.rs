//! Markdown → HTML conversion.
//!
//! Runs the [`normalize`](crate::normalize) pass, then renders with
//! `pulldown-cmark` (tables enabled). Every code block is wrapped in
//! `<div class="highlight">`; fenced blocks whose language `syntect` knows are
//! coloured with inline styles, everything else is escaped verbatim. Headings
//! get slug ids and are reported back for navigation.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;

use crate::normalize::normalize_markdown;

/// Highlighting theme used for fenced code in both PDF and EPUB output.
pub const HIGHLIGHT_THEME: &str = "base16-ocean.dark";

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);
static VOID_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(area|base|br|col|embed|hr|img|input|link|meta|source|track|wbr)\b([^>]*?)\s*/?>").unwrap()
});

/// The loaded highlighting theme.
pub fn highlight_theme() -> &'static Theme {
    &THEMES.themes[HIGHLIGHT_THEME]
}

/// A heading found while converting, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub id: String,
    /// Plain text content, entities decoded.
    pub text: String,
}

/// Output of [`convert_markdown`].
#[derive(Debug, Clone)]
pub struct Converted {
    pub html: String,
    pub headings: Vec<Heading>,
}

impl Converted {
    /// Text of the first `<h1>`, if any.
    pub fn first_h1(&self) -> Option<&str> {
        self.headings
            .iter()
            .find(|h| h.level == 1)
            .map(|h| h.text.as_str())
    }
}

/// Convert markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    convert_markdown(markdown).html
}

/// Convert markdown to an HTML fragment plus its heading outline.
pub fn convert_markdown(markdown: &str) -> Converted {
    let normalized = normalize_markdown(markdown);
    let events: Vec<Event> = Parser::new_ext(&normalized, Options::ENABLE_TABLES).collect();

    let mut out_events: Vec<Event> = Vec::with_capacity(events.len());
    let mut headings = Vec::new();
    let mut slugs = SlugRegistry::default();

    let mut i = 0;
    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::Heading {
                level,
                classes,
                attrs,
                ..
            }) => {
                let text = heading_text(&events[i + 1..]);
                let id = slugs.unique(&text);
                headings.push(Heading {
                    level: heading_level(*level),
                    id: id.clone(),
                    text,
                });
                out_events.push(Event::Start(Tag::Heading {
                    level: *level,
                    id: Some(CowStr::from(id)),
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                }));
                i += 1;
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                let mut code = String::new();
                i += 1;
                while i < events.len() {
                    match &events[i] {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(t) => code.push_str(t),
                        _ => {}
                    }
                    i += 1;
                }
                out_events.push(Event::Html(CowStr::from(code_block_html(
                    &code,
                    lang.as_deref(),
                ))));
                // skip End(CodeBlock)
                i += 1;
            }
            Event::Html(raw) => {
                out_events.push(Event::Html(close_void_tags(raw)));
                i += 1;
            }
            Event::InlineHtml(raw) => {
                out_events.push(Event::InlineHtml(close_void_tags(raw)));
                i += 1;
            }
            other => {
                out_events.push(other.clone());
                i += 1;
            }
        }
    }

    let mut html_out = String::with_capacity(normalized.len() * 3 / 2);
    html::push_html(&mut html_out, out_events.into_iter());
    Converted {
        html: html_out,
        headings,
    }
}

/// Raw HTML passes through untouched, so `<br>` and friends are rewritten
/// to their self-closing form to keep EPUB chapters well-formed XML.
fn close_void_tags<'a>(raw: &CowStr<'a>) -> CowStr<'a> {
    match VOID_TAG.replace_all(raw, "<$1$2 />") {
        std::borrow::Cow::Borrowed(_) => raw.clone(),
        std::borrow::Cow::Owned(fixed) => CowStr::from(fixed),
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Concatenate text and inline code up to the closing heading tag.
fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text.trim().to_string()
}

fn code_block_html(code: &str, lang: Option<&str>) -> String {
    let syntax = lang.and_then(|l| SYNTAXES.find_syntax_by_token(l));
    let inner = match (lang, syntax) {
        (_, Some(syntax)) => {
            match syntect::html::highlighted_html_for_string(
                code,
                &SYNTAXES,
                syntax,
                highlight_theme(),
            ) {
                Ok(h) => strip_leading_pre_newline(h),
                Err(e) => {
                    log::warn!("Highlighting failed, emitting plain code: {e}");
                    plain_code_html(code, lang)
                }
            }
        }
        (Some(l), None) => {
            log::warn!("No syntax definition for language '{l}'");
            plain_code_html(code, lang)
        }
        (None, None) => plain_code_html(code, None),
    };
    format!("<div class=\"highlight\">{inner}</div>\n")
}

fn plain_code_html(code: &str, lang: Option<&str>) -> String {
    match lang {
        Some(l) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            escape_html(l),
            escape_html(code)
        ),
        None => format!("<pre><code>{}</code></pre>", escape_html(code)),
    }
}

/// syntect emits `<pre style="…">\n`; XML readers would keep that newline.
fn strip_leading_pre_newline(mut html: String) -> String {
    if let Some(end) = html.find('>') {
        if html[end + 1..].starts_with('\n') {
            html.remove(end + 1);
        }
    }
    html
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Hands out heading ids, suffixing `_1`, `_2`… on collision.
#[derive(Default)]
struct SlugRegistry {
    seen: HashMap<String, usize>,
}

impl SlugRegistry {
    fn unique(&mut self, text: &str) -> String {
        let base = slugify(text);
        let count = self.seen.entry(base.clone()).or_insert(0);
        let id = if *count == 0 {
            base.clone()
        } else {
            format!("{base}_{count}")
        };
        *count += 1;
        id
    }
}

/// Lowercase, keep word characters, join words with `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_conversion() {
        let html = markdown_to_html("# Hello\n\nThis is a paragraph.");
        assert!(html.contains("<h1"));
        assert!(html.contains("Hello"));
        assert!(html.contains("<p>"));
    }

    #[test]
    fn heading_ids_and_outline() {
        let c = convert_markdown("# Intro\n## Result<T, E> basics\n## Intro");
        assert!(c.html.contains(r#"<h1 id="intro">"#));
        assert_eq!(c.headings.len(), 3);
        assert_eq!(c.headings[1].text, "Result<T, E> basics");
        assert_eq!(c.headings[1].id, "resultt-e-basics");
        assert_eq!(c.headings[2].id, "intro_1");
        assert_eq!(c.first_h1(), Some("Intro"));
    }

    #[test]
    fn code_blocks_highlighted() {
        let html = markdown_to_html("```python\ndef hello():\n    print(\"Hello\")\n```");
        assert!(html.contains(r#"class="highlight""#));
        assert!(html.contains("style="));
        assert!(!html.contains("<pre style=\"background-color:#2b303b;\">\n"));
    }

    #[test]
    fn raw_void_tags_are_self_closed() {
        let html = markdown_to_html("line one<br>line two\n\n<img src=\"http://x/y.png\">\n\n<HR/>");
        assert!(html.contains("line one<br />line two"));
        assert!(html.contains(r#"<img src="http://x/y.png" />"#));
        assert!(html.contains("<HR />"));
        assert!(!html.contains("<br>"));
    }

    #[test]
    fn unknown_language_is_plain() {
        let html = markdown_to_html("```nosuchlang\nlet x = a < b;\n```");
        assert!(html.contains(r#"<div class="highlight"><pre><code class="language-nosuchlang">"#));
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn fenced_generics_survive() {
        let html = markdown_to_html("```\nResult<T, E>\n```");
        assert!(html.contains("Result&lt;T, E&gt;"));
    }

    #[test]
    fn prose_generics_escaped_once() {
        let html = markdown_to_html("Returns Result<T, E> here.");
        assert!(html.contains("Result&lt;T, E&gt;"));
        assert!(!html.contains("&amp;lt;"));
    }

    #[test]
    fn tables_converted() {
        let html = markdown_to_html("| A | B |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>"));
        assert!(html.contains("<td>"));
    }

    #[test]
    fn inline_code() {
        let html = markdown_to_html("Use `print()` function.");
        assert!(html.contains("<code>"));
        assert!(html.contains("print()"));
    }

    #[test]
    fn bold_and_italic() {
        let html = markdown_to_html("This is **bold** and *italic*.");
        assert!(html.contains("<strong>"));
        assert!(html.contains("<em>"));
    }

    #[test]
    fn list_after_paragraph_renders_as_list() {
        let html = markdown_to_html("Steps:\n- one\n- two");
        assert!(html.contains("<ul>"));
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  a -- b "), "a-b");
        assert_eq!(slugify("???"), "section");
    }
}

//! Markdown normalizer – fixes two rendering defects before the text is
//! handed to the markdown renderer:
//!
//! 1. Capitalised generic-type syntax (`Result<T, E>`) outside code is
//!    escaped to `&lt;…&gt;` so the renderer does not swallow it as an HTML
//!    tag. Only brackets whose content starts with an uppercase letter
//!    qualify; comparisons and lowercase tags are left alone. The heuristic
//!    also matches capitalised HTML-like tags (`<Foo>`), which is a known
//!    limitation.
//! 2. A blank line is inserted before a list that directly follows a
//!    paragraph line, since the renderer needs one to start a list.
//!
//! Fenced code blocks and single-backtick code spans are never modified. An
//! unbalanced fence leaves the rest of the document treated as code.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]+`").unwrap());
static GENERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([A-Z][^>]*)>").unwrap());
static NUMBERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\. ").unwrap());

const FENCE: &str = "```";

/// Normalize one markdown document. Pure; the empty string maps to itself.
pub fn normalize_markdown(text: &str) -> String {
    let mut in_fence = false;
    let mut out: Vec<String> = Vec::new();

    for (i, line) in text.split('\n').enumerate() {
        if line.trim().starts_with(FENCE) {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }

        let line = escape_generics(line);

        // Compare against the line we actually emitted last, so a blank line
        // inserted on a previous run is recognised and not doubled.
        if i > 0 && is_list_item(&line) {
            let prev = out.last().map(String::as_str).unwrap_or("");
            if !prev.trim().is_empty() && !is_list_item(prev) && !prev.starts_with('#') {
                out.push(String::new());
            }
        }
        out.push(line);
    }

    out.join("\n")
}

/// Escape `<Upper…>` in every non-code segment of a single line.
fn escape_generics(line: &str) -> String {
    let mut result = String::with_capacity(line.len());
    let mut last = 0;
    for span in CODE_SPAN.find_iter(line) {
        push_segment(&mut result, &line[last..span.start()]);
        result.push_str(span.as_str());
        last = span.end();
    }
    push_segment(&mut result, &line[last..]);
    result
}

fn push_segment(out: &mut String, segment: &str) {
    if segment.is_empty() {
        return;
    }
    if segment.starts_with('`') && segment.ends_with('`') {
        out.push_str(segment);
    } else {
        out.push_str(&GENERIC.replace_all(segment, "&lt;${1}&gt;"));
    }
}

fn is_list_item(line: &str) -> bool {
    line.starts_with("- ") || NUMBERED_ITEM.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_generic_types() {
        let out = normalize_markdown("The function returns Result<T, E> for errors.");
        assert!(out.contains("Result&lt;T, E&gt;"));
        assert!(!out.contains("<T, E>"));
    }

    #[test]
    fn leaves_code_span_untouched() {
        let md = "Use `Result<T, E>` for error handling.";
        assert_eq!(normalize_markdown(md), md);
    }

    #[test]
    fn mixed_span_and_prose() {
        let out = normalize_markdown("`Vec<T>` wraps Option<T> values");
        assert_eq!(out, "`Vec<T>` wraps Option&lt;T&gt; values");
    }

    #[test]
    fn lowercase_and_comparisons_unchanged() {
        let md = "if a < b and c > d then <div> stays";
        assert_eq!(normalize_markdown(md), md);
    }

    #[test]
    fn fenced_block_is_verbatim() {
        let md = "Some text.\n\n```rust\nfn example<T>(value: T) -> Result<T, Error> {\n- not a list\n}\n```\n";
        let out = normalize_markdown(md);
        assert!(out.contains("Result<T, Error>"));
        assert!(out.contains("{\n- not a list\n}"));
    }

    #[test]
    fn fence_with_language_tag_and_indent() {
        let md = "  ```python\nx = List<int>\n  ```\nMap<K>";
        let out = normalize_markdown(md);
        assert_eq!(out, "  ```python\nx = List<int>\n  ```\nMap&lt;K&gt;");
    }

    #[test]
    fn unbalanced_fence_protects_rest() {
        let md = "```\nResult<T>\nparagraph\n- item";
        assert_eq!(normalize_markdown(md), md);
    }

    #[test]
    fn blank_line_before_bullet_list() {
        let out = normalize_markdown("Some paragraph text.\n- Item 1\n- Item 2");
        assert_eq!(out, "Some paragraph text.\n\n- Item 1\n- Item 2");
    }

    #[test]
    fn blank_line_before_numbered_list() {
        let out = normalize_markdown("Intro:\n1. First item\n2. Second item");
        assert_eq!(out, "Intro:\n\n1. First item\n2. Second item");
    }

    #[test]
    fn no_blank_after_header() {
        let out = normalize_markdown("## Header\n- Item 1");
        assert_eq!(out, "## Header\n- Item 1");
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn no_blank_after_blank() {
        let md = "Para.\n\n- a";
        assert_eq!(normalize_markdown(md), md);
    }

    #[test]
    fn heterogeneous_lists_not_separated() {
        let md = "- bullet\n1. numbered";
        assert_eq!(normalize_markdown(md), md);
    }

    #[test]
    fn first_line_list_untouched() {
        assert_eq!(normalize_markdown("- only"), "- only");
    }

    #[test]
    fn indented_items_are_not_list_starts() {
        let md = "Text\n  - nested";
        assert_eq!(normalize_markdown(md), md);
    }

    #[test]
    fn resumed_list_gets_fresh_blank() {
        let out = normalize_markdown("- a\nparagraph\n- b");
        assert_eq!(out, "- a\nparagraph\n\n- b");
    }

    #[test]
    fn idempotent() {
        let md = "# T\nIntro Option<T>\n- a\n- b\nText\n1. x\n```\n<Keep>\n```\n`Box<T>`";
        let once = normalize_markdown(md);
        assert_eq!(normalize_markdown(&once), once);
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize_markdown(""), "");
    }

    #[test]
    fn preserves_line_endings_content() {
        let md = "line one\r\nline two";
        assert_eq!(normalize_markdown(md), md);
    }
}

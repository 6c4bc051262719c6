//! Stylesheet parser – the subset of CSS the print stylesheet uses.
//!
//! Supported:
//! - type, class, `:first-child` and `:nth-child(even|odd|N)` selectors,
//!   joined by descendant (` `) or child (`>`) combinators, in comma lists;
//! - `@page` with its own declarations and `@bottom-*`/`@top-*` margin boxes;
//! - `body::before`, collected separately (it carries the watermark).
//!
//! Selectors outside this subset are dropped with a debug log; other
//! at-rules are skipped.

/// A single `property: value` pair. Values are kept as raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nth {
    Even,
    Odd,
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    FirstChild,
    NthChild(Nth),
}

/// One compound selector such as `li.done:first-child`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    pub tag: Option<String>,
    pub classes: Vec<String>,
    pub pseudos: Vec<Pseudo>,
}

/// A complex selector. `parts[0]` is the leftmost compound; every later part
/// carries the combinator linking it to the part before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub parts: Vec<(Combinator, Compound)>,
}

impl Selector {
    /// `(class-like count, type count)`; compared lexicographically.
    pub fn specificity(&self) -> (usize, usize) {
        self.parts.iter().fold((0, 0), |(c, t), (_, comp)| {
            (
                c + comp.classes.len() + comp.pseudos.len(),
                t + usize::from(comp.tag.is_some()),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
    /// Source position, used as the cascade tie-breaker.
    pub order: usize,
}

/// The `@page` rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRule {
    pub declarations: Vec<Declaration>,
    /// `(name, declarations)`, e.g. `("bottom-left", …)`.
    pub margin_boxes: Vec<(String, Vec<Declaration>)>,
}

impl PageRule {
    pub fn get(&self, property: &str) -> Option<&str> {
        find(&self.declarations, property)
    }

    pub fn margin_box(&self, name: &str) -> Option<&[Declaration]> {
        self.margin_boxes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
    pub page: PageRule,
    /// Declarations of `body::before`, if present.
    pub body_before: Option<Vec<Declaration>>,
}

/// Last value declared for `property`.
pub fn find<'a>(decls: &'a [Declaration], property: &str) -> Option<&'a str> {
    decls
        .iter()
        .rev()
        .find(|d| d.property == property)
        .map(|d| d.value.as_str())
}

/// Parse a stylesheet. Malformed input is skipped rather than rejected.
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    let css = strip_comments(css);
    let mut sheet = Stylesheet::default();
    let mut order = 0usize;

    for (prelude, body) in split_blocks(&css) {
        let prelude = prelude.trim();
        if let Some(rest) = prelude.strip_prefix('@') {
            if rest.trim().starts_with("page") {
                merge_page_rule(&mut sheet.page, body);
            } else {
                log::debug!("Skipping unsupported at-rule @{rest}");
            }
            continue;
        }

        let declarations = parse_declarations(body);
        let mut selectors = Vec::new();
        for raw in prelude.split(',') {
            let raw = raw.trim();
            if raw == "body::before" || raw == "body:before" {
                sheet
                    .body_before
                    .get_or_insert_with(Vec::new)
                    .extend(declarations.iter().cloned());
                continue;
            }
            match parse_selector(raw) {
                Some(sel) => selectors.push(sel),
                None => log::debug!("Skipping unsupported selector '{raw}'"),
            }
        }
        if !selectors.is_empty() {
            sheet.rules.push(Rule {
                selectors,
                declarations,
                order,
            });
            order += 1;
        }
    }
    sheet
}

fn merge_page_rule(page: &mut PageRule, body: &str) {
    let mut flat = String::new();
    for (prelude, inner) in split_blocks_with_rest(body, &mut flat) {
        if let Some(name) = prelude.trim().strip_prefix('@') {
            page.margin_boxes
                .push((name.trim().to_string(), parse_declarations(inner)));
        }
    }
    page.declarations.extend(parse_declarations(&flat));
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Split top-level `prelude { body }` pairs.
fn split_blocks(css: &str) -> Vec<(&str, &str)> {
    let mut ignored = String::new();
    split_blocks_with_rest(css, &mut ignored)
}

/// Like [`split_blocks`], also collecting text outside any block into
/// `rest` (the declarations of an `@page` body live there).
fn split_blocks_with_rest<'a>(css: &'a str, rest: &mut String) -> Vec<(&'a str, &'a str)> {
    let bytes = css.as_bytes();
    let mut blocks = Vec::new();
    let mut seg_start = 0;
    let mut i = 0;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b';' => {
                // A declaration outside any block.
                rest.push_str(&css[seg_start..=i]);
                seg_start = i + 1;
            }
            b'{' => {
                let prelude = &css[seg_start..i];
                let body_start = i + 1;
                let mut depth = 1;
                let mut j = body_start;
                let mut q: Option<u8> = None;
                while j < bytes.len() && depth > 0 {
                    let c = bytes[j];
                    match q {
                        Some(qc) => {
                            if c == b'\\' {
                                j += 1;
                            } else if c == qc {
                                q = None;
                            }
                        }
                        None => match c {
                            b'"' | b'\'' => q = Some(c),
                            b'{' => depth += 1,
                            b'}' => depth -= 1,
                            _ => {}
                        },
                    }
                    j += 1;
                }
                let body_end = if depth == 0 { j - 1 } else { bytes.len() };
                blocks.push((prelude, &css[body_start..body_end]));
                seg_start = j.min(bytes.len());
                i = seg_start;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if seg_start < css.len() {
        rest.push_str(&css[seg_start..]);
    }
    blocks
}

/// Parse `prop: value; …`, honouring quotes and parentheses in values.
pub fn parse_declarations(body: &str) -> Vec<Declaration> {
    let mut decls = Vec::new();
    for item in split_top_level(body, ';') {
        let Some((prop, value)) = item.split_once(':') else {
            continue;
        };
        let property = prop.trim().to_ascii_lowercase();
        let value = value.trim().trim_end_matches("!important").trim();
        if property.is_empty() || value.is_empty() {
            continue;
        }
        decls.push(Declaration {
            property,
            value: value.to_string(),
        });
    }
    decls
}

/// Split on `sep` outside quotes and parentheses.
pub fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match quote {
            Some(q) => {
                if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                c if c == sep && depth == 0 => {
                    parts.push(&s[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Parse one complex selector; `None` if it uses unsupported syntax.
pub fn parse_selector(raw: &str) -> Option<Selector> {
    let spaced = raw.replace('>', " > ");
    let mut parts = Vec::new();
    let mut pending = Combinator::Descendant;
    for token in spaced.split_whitespace() {
        if token == ">" {
            pending = Combinator::Child;
            continue;
        }
        let compound = parse_compound(token)?;
        parts.push((pending, compound));
        pending = Combinator::Descendant;
    }
    if parts.is_empty() {
        None
    } else {
        Some(Selector { parts })
    }
}

fn parse_compound(token: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut rest = token;

    let tag_end = rest.find(['.', ':']).unwrap_or(rest.len());
    let tag = &rest[..tag_end];
    if !tag.is_empty() && tag != "*" {
        if !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        compound.tag = Some(tag.to_ascii_lowercase());
    }
    rest = &rest[tag_end..];

    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix('.') {
            let end = r.find(['.', ':']).unwrap_or(r.len());
            let class = &r[..end];
            if class.is_empty() {
                return None;
            }
            compound.classes.push(class.to_string());
            rest = &r[end..];
        } else if rest.starts_with("::") {
            return None;
        } else if let Some(r) = rest.strip_prefix(':') {
            let end = r
                .char_indices()
                .find(|&(i, c)| (c == '.' || c == ':') && !r[..i].contains('(') || c == ')')
                .map(|(i, c)| if c == ')' { i + 1 } else { i })
                .unwrap_or(r.len());
            compound.pseudos.push(parse_pseudo(&r[..end])?);
            rest = &r[end..];
        } else {
            return None;
        }
    }
    Some(compound)
}

fn parse_pseudo(p: &str) -> Option<Pseudo> {
    if p == "first-child" {
        return Some(Pseudo::FirstChild);
    }
    let arg = p.strip_prefix("nth-child(")?.strip_suffix(')')?.trim();
    let nth = match arg {
        "even" | "2n" => Nth::Even,
        "odd" | "2n+1" => Nth::Odd,
        n => Nth::Index(n.parse().ok()?),
    };
    Some(Pseudo::NthChild(nth))
}

/// Parse a CSS `content` value into literal text. `counter(page)` and
/// `counter(pages)` become `{page}` / `{pages}` placeholders.
pub fn parse_content(value: &str) -> String {
    let mut out = String::new();
    let mut chars = value.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                while let Some(ch) = chars.next() {
                    if ch == c {
                        break;
                    }
                    if ch == '\\' {
                        if let Some(esc) = chars.next() {
                            if esc == 'A' || esc == 'a' {
                                out.push('\n');
                                if chars.peek() == Some(&' ') {
                                    chars.next();
                                }
                            } else {
                                out.push(esc);
                            }
                        }
                    } else {
                        out.push(ch);
                    }
                }
            }
            'c' => {
                let mut ident = String::from("c");
                while let Some(&ch) = chars.peek() {
                    ident.push(ch);
                    chars.next();
                    if ch == ')' {
                        break;
                    }
                }
                match ident.replace(' ', "").as_str() {
                    "counter(page)" => out.push_str("{page}"),
                    "counter(pages)" => out.push_str("{pages}"),
                    _ => {}
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules_and_comments() {
        let sheet = parse_stylesheet("/* c */ p { color: #333; margin: 0 } h1, h2 { font-size: 2em; }");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].declarations.len(), 2);
        assert_eq!(sheet.rules[1].selectors.len(), 2);
        assert_eq!(sheet.rules[1].order, 1);
    }

    #[test]
    fn parses_page_rule_and_margin_boxes() {
        let sheet = parse_stylesheet(
            r#"@page { size: A4; margin: 2cm; @bottom-center { content: counter(page); } @bottom-left { content: "a; b"; } }"#,
        );
        assert_eq!(sheet.page.get("size"), Some("A4"));
        assert_eq!(sheet.page.get("margin"), Some("2cm"));
        let center = sheet.page.margin_box("bottom-center").unwrap();
        assert_eq!(parse_content(find(center, "content").unwrap()), "{page}");
        let left = sheet.page.margin_box("bottom-left").unwrap();
        assert_eq!(parse_content(find(left, "content").unwrap()), "a; b");
    }

    #[test]
    fn body_before_collected() {
        let sheet = parse_stylesheet(r#"body::before { content: "DRAFT \"x\""; font-size: 60pt; }"#);
        let decls = sheet.body_before.unwrap();
        assert_eq!(parse_content(find(&decls, "content").unwrap()), "DRAFT \"x\"");
        assert!(sheet.rules.is_empty());
    }

    #[test]
    fn selector_forms() {
        let s = parse_selector("li > ul").unwrap();
        assert_eq!(s.parts.len(), 2);
        assert_eq!(s.parts[1].0, Combinator::Child);

        let s = parse_selector(".lesson:first-child").unwrap();
        assert_eq!(s.parts[0].1.classes, vec!["lesson"]);
        assert_eq!(s.parts[0].1.pseudos, vec![Pseudo::FirstChild]);
        assert_eq!(s.specificity(), (2, 0));

        let s = parse_selector("tr:nth-child(even)").unwrap();
        assert_eq!(s.parts[0].1.pseudos, vec![Pseudo::NthChild(Nth::Even)]);

        assert!(parse_selector("a[href]").is_none());
        assert!(parse_selector("p::after").is_none());
    }

    #[test]
    fn declarations_keep_parenthesised_values() {
        let d = parse_declarations("color: rgba(0, 0, 0, 0.03); transform: translate(-50%, -50%) rotate(-45deg)");
        assert_eq!(d[0].value, "rgba(0, 0, 0, 0.03)");
        assert_eq!(d[1].property, "transform");
    }
}

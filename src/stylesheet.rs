//! Stylesheets – the print stylesheet consumed by the PDF engine and the
//! reflow stylesheet shipped inside the EPUB.

use crate::config::{DocumentMeta, SHARE_NOTICE};
use crate::convert::highlight_theme;

/// Print stylesheet: A4 pages, branded footers, optional watermark.
pub fn print_css(meta: &DocumentMeta, watermark: Option<&str>) -> String {
    let copyright = css_string(&meta.copyright_line());
    let notice = css_string(SHARE_NOTICE);
    let watermark_css = watermark.map(watermark_css).unwrap_or_default();
    let (code_bg, code_fg) = highlight_colors();

    format!(
        r#"
@page {{
    size: A4;
    margin: 2cm;
    @bottom-left {{
        content: {copyright};
        font-family: 'Helvetica', sans-serif;
        font-size: 8pt;
        color: #999;
    }}
    @bottom-center {{
        content: counter(page);
        font-family: 'Helvetica', sans-serif;
        font-size: 10pt;
        color: #666;
    }}
    @bottom-right {{
        content: {notice};
        font-family: 'Helvetica', sans-serif;
        font-size: 8pt;
        color: #999;
    }}
}}
{watermark_css}
body {{
    font-family: 'Georgia', 'Times New Roman', serif;
    font-size: 11pt;
    line-height: 1.6;
    color: #333;
    max-width: 100%;
}}

h1 {{
    font-family: 'Helvetica', 'Arial', sans-serif;
    font-size: 24pt;
    color: #2c3e50;
    border-bottom: 3px solid #3498db;
    padding-bottom: 10px;
    margin-top: 0;
    margin-bottom: 20px;
}}

h2 {{
    font-family: 'Helvetica', 'Arial', sans-serif;
    font-size: 18pt;
    color: #34495e;
    margin-top: 30px;
    margin-bottom: 15px;
    border-bottom: 1px solid #bdc3c7;
    padding-bottom: 5px;
}}

h3 {{
    font-family: 'Helvetica', 'Arial', sans-serif;
    font-size: 14pt;
    color: #7f8c8d;
    margin-top: 25px;
    margin-bottom: 10px;
}}

h4 {{
    font-family: 'Helvetica', 'Arial', sans-serif;
    font-size: 12pt;
    color: #95a5a6;
    margin-top: 20px;
    margin-bottom: 10px;
}}

p {{
    margin-bottom: 12px;
    text-align: justify;
}}

/* Inline code */
code {{
    font-family: 'Menlo', 'Monaco', 'Consolas', monospace;
    font-size: 9.5pt;
    background-color: #f4f4f4;
    padding: 2px 6px;
    border-radius: 3px;
    color: #c0392b;
}}

/* Code blocks */
.highlight {{
    background-color: {code_bg};
    border-radius: 6px;
    padding: 15px;
    margin: 15px 0;
    overflow-x: auto;
}}

.highlight pre {{
    margin: 0;
    padding: 0;
    background: transparent;
    font-family: 'Menlo', 'Monaco', 'Consolas', monospace;
    font-size: 9pt;
    line-height: 1.4;
    color: {code_fg};
    white-space: pre-wrap;
    word-wrap: break-word;
}}

.highlight code {{
    background: transparent;
    padding: 0;
    color: {code_fg};
    font-size: 9pt;
}}

/* Lists */
ul, ol {{
    margin-bottom: 12px;
    padding-left: 25px;
}}

li {{
    margin-bottom: 6px;
}}

li > ul, li > ol {{
    margin-top: 6px;
    margin-bottom: 6px;
}}

strong {{
    color: #2c3e50;
}}

em {{
    color: #555;
}}

/* Tables */
table {{
    border-collapse: collapse;
    width: 100%;
    margin: 15px 0;
}}

th, td {{
    border: 1px solid #ddd;
    padding: 10px;
    text-align: left;
}}

th {{
    background-color: #3498db;
    color: white;
    font-family: 'Helvetica', 'Arial', sans-serif;
}}

tr:nth-child(even) {{
    background-color: #f9f9f9;
}}

blockquote {{
    border-left: 4px solid #3498db;
    margin: 15px 0;
    padding: 10px 20px;
    background-color: #f9f9f9;
    font-style: italic;
    color: #555;
}}

a {{
    color: #3498db;
    text-decoration: none;
}}

/* One lesson per page */
.lesson {{
    page-break-before: always;
}}

.lesson:first-child {{
    page-break-before: avoid;
}}

hr {{
    border: none;
    border-top: 2px solid #eee;
    margin: 30px 0;
}}
"#
    )
}

fn watermark_css(text: &str) -> String {
    format!(
        r#"
/* Subtle diagonal watermark */
body::before {{
    content: {};
    position: fixed;
    top: 45%;
    left: 50%;
    transform: translate(-50%, -50%) rotate(-45deg);
    font-family: 'Helvetica', sans-serif;
    font-size: 60pt;
    color: rgba(0, 0, 0, 0.03);
    white-space: nowrap;
    pointer-events: none;
    z-index: -1;
}}
"#,
        css_string(text)
    )
}

/// Reflow stylesheet for e-readers.
pub fn epub_css() -> String {
    let (code_bg, code_fg) = highlight_colors();
    format!(
        r#"
body {{
    font-family: Georgia, serif;
    font-size: 1em;
    line-height: 1.6;
    color: #333;
}}

h1 {{
    font-size: 1.8em;
    color: #2c3e50;
    border-bottom: 2px solid #3498db;
    padding-bottom: 8px;
    margin-top: 0;
}}

h2 {{
    font-size: 1.4em;
    color: #34495e;
    margin-top: 1.5em;
    border-bottom: 1px solid #bdc3c7;
    padding-bottom: 4px;
}}

h3 {{
    font-size: 1.2em;
    color: #7f8c8d;
    margin-top: 1.2em;
}}

code {{
    font-family: monospace;
    font-size: 0.9em;
    background-color: #f4f4f4;
    padding: 2px 4px;
}}

pre {{
    background-color: {code_bg};
    color: {code_fg};
    padding: 12px;
    overflow-x: auto;
    font-size: 0.85em;
    line-height: 1.4;
    border-radius: 4px;
}}

pre code {{
    background: transparent;
    padding: 0;
    color: inherit;
}}

blockquote {{
    border-left: 3px solid #3498db;
    margin: 1em 0;
    padding: 0.5em 1em;
    background-color: #f9f9f9;
    font-style: italic;
}}

table {{
    border-collapse: collapse;
    width: 100%;
    margin: 1em 0;
}}

th, td {{
    border: 1px solid #ddd;
    padding: 8px;
    text-align: left;
}}

th {{
    background-color: #3498db;
    color: white;
}}

.copyright {{
    margin-top: 2em;
    padding-top: 1em;
    border-top: 1px solid #eee;
    font-size: 0.8em;
    color: #999;
    text-align: center;
}}
"#
    )
}

/// Background and default foreground of the highlighting theme as CSS hex.
fn highlight_colors() -> (String, String) {
    let settings = &highlight_theme().settings;
    let hex = |c: syntect::highlighting::Color| format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b);
    (
        settings.background.map(hex).unwrap_or_else(|| "#272822".into()),
        settings.foreground.map(hex).unwrap_or_else(|| "#f8f8f2".into()),
    )
}

/// Quote `s` as a CSS string literal.
fn css_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\A "),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

//! Integration tests for the mdweaver pipeline.
//!
//! These tests validate:
//! - HTML conversion of course markdown
//! - Layout of the assembled document under the print stylesheet
//! - Page breaks between lessons, footers, and the watermark
//! - PDF and EPUB artifacts written by `run`

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use mdweaver::config::{DocumentMeta, OutputFormat, WeaverConfig, SHARE_NOTICE};
use mdweaver::document::SourceSet;
use mdweaver::dom::{parse_html, DomNode, Tag};
use mdweaver::layout_config::{LayoutBox, LayoutConfig};
use mdweaver::pdf::assemble_html;
use mdweaver::pipeline::{compute_layout_config, generate_pdf, PipelineConfig};
use mdweaver::render::render_pdf;
use mdweaver::stylesheet::print_css;
use mdweaver::{convert_markdown, markdown_to_html, run, samples, WeaverError};

// =====================================================================
// Helper
// =====================================================================

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn meta() -> DocumentMeta {
    DocumentMeta {
        name: "course".into(),
        title: "Course".into(),
        version: "1.0".into(),
        year: 2026,
    }
}

/// Write the sample course into `dir` along with a version file.
fn write_course(dir: &Path) -> WeaverConfig {
    for (name, md) in samples::course() {
        fs::write(dir.join(name), md).unwrap();
    }
    let version_file = dir.join("EXPORT_VERSION");
    fs::write(&version_file, "1.0\n").unwrap();
    WeaverConfig {
        output_dir: dir.join("out"),
        version_file,
        ..WeaverConfig::default()
    }
}

/// Lay out the sample course the way the PDF assembler does.
fn course_layout(watermark: Option<&str>) -> LayoutConfig {
    let dir = tempfile::tempdir().unwrap();
    let config = write_course(dir.path());
    let sources = SourceSet::load(dir.path(), &config).unwrap();
    let chapters = sources.chapters().unwrap();
    let html = assemble_html(&meta(), &chapters);
    compute_layout_config(&html, &print_css(&meta(), watermark), &PipelineConfig::default()).unwrap()
}

fn visit_box(lbox: &LayoutBox, f: &mut dyn FnMut(&LayoutBox)) {
    f(lbox);
    for child in &lbox.children {
        visit_box(child, f);
    }
}

// =====================================================================
// Conversion tests
// =====================================================================

#[test]
fn heading_and_paragraph() {
    let html = markdown_to_html(samples::minimal_lesson());
    assert!(html.contains("<h1"));
    assert!(html.contains("Hello"));
    assert!(html.contains("<p>"));
}

#[test]
fn generics_survive_conversion() {
    let html = markdown_to_html(samples::generics_lesson());
    assert!(html.contains("Vec&lt;String&gt;"));
    assert!(html.contains("<code>Vec&lt;T&gt;</code>"));
    // list after "Things to remember:" is recognised as a list
    assert!(html.contains("<ul>"));
    assert!(html.contains("<ol>"));
    assert!(html.contains("class=\"highlight\""));
}

#[test]
fn tables_and_emphasis() {
    let html = markdown_to_html(samples::ownership_lesson());
    for needle in ["<table>", "<th>", "<td>", "<strong>", "<em>", "<blockquote>"] {
        assert!(html.contains(needle), "missing {needle}");
    }
}

#[test]
fn converted_html_parses() {
    let html = markdown_to_html(samples::ownership_lesson());
    let dom = parse_html(&html);
    let tags: Vec<Tag> = dom
        .iter()
        .filter_map(|n| match n {
            DomNode::Element(e) => Some(e.tag.clone()),
            _ => None,
        })
        .collect();
    assert!(tags.contains(&Tag::H1));
    assert!(tags.contains(&Tag::Table));
    assert!(tags.contains(&Tag::Blockquote));
}

#[test]
fn headings_reported_with_ids() {
    let converted = convert_markdown(samples::generics_lesson());
    assert_eq!(converted.first_h1(), Some("Generics in Rust"));
    assert!(converted.headings.iter().any(|h| h.level == 2 && h.id == "trait-bounds"));
}

// =====================================================================
// Layout & pagination tests
// =====================================================================

#[test]
fn layout_positions_are_within_page() {
    let config = course_layout(None);
    for page in &config.pages {
        for b in &page.boxes {
            visit_box(b, &mut |lb| {
                assert!(lb.x >= -0.5, "box x {} is off the page", lb.x);
                assert!(lb.x + lb.width <= config.page_width_pt + 0.5);
                assert!(lb.y + lb.height <= config.page_height_pt + 0.5);
            });
        }
    }
}

#[test]
fn lessons_start_on_new_pages() {
    let config = course_layout(None);
    assert!(config.pages.len() >= 3, "got {} pages", config.pages.len());
    for heading in ["Generics in Rust", "Ownership", "Exercises"] {
        let page = config
            .pages
            .iter()
            .find(|p| p.text_lines().iter().any(|l| l == heading))
            .unwrap_or_else(|| panic!("no page with heading {heading}"));
        assert_eq!(page.text_lines()[0], heading);
    }
}

#[test]
fn footers_on_every_page() {
    let config = course_layout(None);
    let copyright = meta().copyright_line();
    for (i, page) in config.pages.iter().enumerate() {
        let lines = page.text_lines();
        assert!(lines.contains(&copyright), "page {} lacks copyright", i + 1);
        assert!(lines.contains(&SHARE_NOTICE.to_string()));
        assert!(lines.contains(&(i + 1).to_string()), "page {} lacks its number", i + 1);
    }
}

#[test]
fn watermark_only_when_requested() {
    let config = course_layout(Some("CONFIDENTIAL"));
    assert!(config
        .pages
        .iter()
        .all(|p| p.watermark.as_ref().map(|w| w.text.as_str()) == Some("CONFIDENTIAL")));

    let config = course_layout(None);
    assert!(config.pages.iter().all(|p| p.watermark.is_none()));
}

#[test]
fn highlighted_code_has_background() {
    let html = assemble_html(
        &meta(),
        &[mdweaver::Chapter {
            source: "a.md".into(),
            title: "A".into(),
            html: markdown_to_html("```rust\nfn main() {}\n```"),
            headings: vec![],
        }],
    );
    let config = compute_layout_config(&html, &print_css(&meta(), None), &PipelineConfig::default()).unwrap();
    let mut backgrounds = 0;
    for b in &config.pages[0].boxes {
        visit_box(b, &mut |lb| {
            if lb.background_color.is_some() {
                backgrounds += 1;
            }
        });
    }
    assert!(backgrounds > 0);
}

#[test]
fn layout_config_json_roundtrip() {
    let config = compute_layout_config("<h1>Hi</h1><p>There</p>", "", &PipelineConfig::default()).unwrap();
    let json = config.to_json();
    let back = LayoutConfig::from_json(&json).unwrap();
    assert_eq!(back.pages.len(), config.pages.len());
    assert_valid_pdf(&render_pdf(&back).unwrap());
}

#[test]
fn pdf_output_is_stable() {
    let html = markdown_to_html(samples::minimal_lesson());
    let (bytes1, _) = generate_pdf(&html, "", &PipelineConfig::default()).unwrap();
    let (bytes2, _) = generate_pdf(&html, "", &PipelineConfig::default()).unwrap();

    // printpdf embeds timestamps, so byte-exact equality isn't guaranteed.
    let diff = (bytes1.len() as i64 - bytes2.len() as i64).unsigned_abs();
    assert!(diff < 200, "PDF outputs differ: {} vs {} bytes", bytes1.len(), bytes2.len());
}

// =====================================================================
// End-to-end
// =====================================================================

#[test]
fn run_writes_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_course(dir.path());
    let written = run(dir.path(), &config).unwrap();
    assert_eq!(written.len(), 1);
    let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(written[0], config.output_dir.join(format!("{name}_v1.0.pdf")));
    assert_valid_pdf(&fs::read(&written[0]).unwrap());
}

#[test]
fn run_writes_epub_in_collector_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = WeaverConfig {
        format: OutputFormat::Epub,
        title: Some("Rust Cohort".into()),
        ..write_course(dir.path())
    };
    let written = run(dir.path(), &config).unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0].to_string_lossy().ends_with("_v1.0.epub"));

    let bytes = fs::read(&written[0]).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");

    let mut nav = String::new();
    archive
        .by_name("EPUB/nav.xhtml")
        .unwrap()
        .read_to_string(&mut nav)
        .unwrap();
    let first = nav.find("Generics in Rust").unwrap();
    let second = nav.find("Ownership").unwrap();
    let third = nav.find("Exercises").unwrap();
    assert!(first < second && second < third);

    let mut opf = String::new();
    archive
        .by_name("EPUB/content.opf")
        .unwrap()
        .read_to_string(&mut opf)
        .unwrap();
    assert!(opf.contains("<dc:title>Rust Cohort</dc:title>"));
}

#[test]
fn run_writes_both_formats() {
    let dir = tempfile::tempdir().unwrap();
    let config = WeaverConfig {
        format: OutputFormat::Both,
        watermark: Some("DRAFT".into()),
        ..write_course(dir.path())
    };
    let written = run(dir.path(), &config).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written[0].extension().unwrap() == "pdf");
    assert!(written[1].extension().unwrap() == "epub");
}

#[test]
fn single_file_input_uses_stem() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("intro-notes.md");
    fs::write(&file, samples::minimal_lesson()).unwrap();
    let config = WeaverConfig {
        output_dir: dir.path().join("out"),
        version_file: dir.path().join("missing"),
        ..WeaverConfig::default()
    };
    let written = run(&file, &config).unwrap();
    assert_eq!(written[0].file_name().unwrap(), "intro-notes_v0.0.pdf");
}

#[test]
fn run_reports_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(&dir.path().join("absent"), &WeaverConfig::default()).unwrap_err();
    assert!(matches!(err, WeaverError::PathNotFound { .. }));
    assert!(err.to_string().starts_with("Path not found:"));
}

#[test]
fn run_reports_no_markdown() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("readme.txt"), "hi").unwrap();
    let err = run(dir.path(), &WeaverConfig::default()).unwrap_err();
    assert!(matches!(err, WeaverError::NoMarkdownFiles { .. }));
}

#[test]
fn no_recursive_skips_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested").join("deep.md"), "# Deep").unwrap();
    let config = WeaverConfig {
        recursive: false,
        ..WeaverConfig::default()
    };
    let err = run(dir.path(), &config).unwrap_err();
    assert!(matches!(err, WeaverError::NoMarkdownFiles { .. }));
}

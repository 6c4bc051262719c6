//! EPUB 3 packaging. One XHTML document per chapter, an EPUB 3 navigation
//! document first in the spine, and an EPUB 2 NCX for older readers.

use std::fs;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{DocumentMeta, AUTHOR_ATTRIBUTION, SHARE_NOTICE};
use crate::convert::escape_html;
use crate::document::Chapter;
use crate::error::{Result, WeaverError};
use crate::stylesheet::epub_css;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="EPUB/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const STYLE_HREF: &str = "style/main.css";

/// Package identifier: `md2pdf-<name>-v<version>`.
pub fn identifier(meta: &DocumentMeta) -> String {
    format!("md2pdf-{}-v{}", meta.name, meta.version)
}

/// `chapter_01.xhtml`, `chapter_02.xhtml`, …
pub fn chapter_href(index: usize) -> String {
    format!("chapter_{:02}.xhtml", index + 1)
}

fn chapter_id(index: usize) -> String {
    format!("chapter_{:02}", index + 1)
}

/// Write `<output_dir>/<name>_v<version>.epub` and return its path.
pub fn write_epub(meta: &DocumentMeta, chapters: &[Chapter], output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).map_err(|e| WeaverError::io(output_dir, e))?;
    let output = output_dir.join(meta.file_name("epub"));
    log::info!("Generating EPUB: {}", output.display());

    let mut buf = Cursor::new(Vec::new());
    write_epub_to_writer(meta, chapters, &mut buf)?;
    fs::write(&output, buf.into_inner()).map_err(|e| WeaverError::io(&output, e))?;

    log::info!("EPUB generated successfully: {}", output.display());
    Ok(output)
}

/// Write the EPUB container to any [`Write`] + [`Seek`] destination.
pub fn write_epub_to_writer<W: Write + Seek>(meta: &DocumentMeta, chapters: &[Chapter], writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);

    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // mimetype must be first and uncompressed
    zip.start_file("mimetype", stored)?;
    write_entry(&mut zip, b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    write_entry(&mut zip, CONTAINER_XML.as_bytes())?;

    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    zip.start_file("EPUB/content.opf", deflated)?;
    write_entry(&mut zip, generate_opf(meta, chapters, &modified).as_bytes())?;

    zip.start_file("EPUB/nav.xhtml", deflated)?;
    write_entry(&mut zip, generate_nav(meta, chapters).as_bytes())?;

    zip.start_file("EPUB/toc.ncx", deflated)?;
    write_entry(&mut zip, generate_ncx(meta, chapters).as_bytes())?;

    zip.start_file(format!("EPUB/{STYLE_HREF}"), deflated)?;
    write_entry(&mut zip, epub_css().as_bytes())?;

    for (i, chapter) in chapters.iter().enumerate() {
        zip.start_file(format!("EPUB/{}", chapter_href(i)), deflated)?;
        write_entry(&mut zip, chapter_xhtml(meta, chapter).as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

fn write_entry<W: Write + Seek>(zip: &mut ZipWriter<W>, bytes: &[u8]) -> Result<()> {
    zip.write_all(bytes)
        .map_err(|e| WeaverError::Epub(e.to_string()))
}

fn generate_opf(meta: &DocumentMeta, chapters: &[Chapter], modified: &str) -> String {
    let mut opf = String::new();
    opf.push_str(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id" xml:lang="en">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );
    opf.push_str(&format!(
        "    <dc:identifier id=\"id\">{}</dc:identifier>\n",
        escape_html(&identifier(meta))
    ));
    opf.push_str(&format!("    <dc:title>{}</dc:title>\n", escape_html(&meta.title)));
    opf.push_str("    <dc:language>en</dc:language>\n");
    opf.push_str(&format!(
        "    <dc:creator id=\"creator\">{}</dc:creator>\n",
        escape_html(AUTHOR_ATTRIBUTION)
    ));
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{modified}</meta>\n"
    ));
    opf.push_str("  </metadata>\n  <manifest>\n");

    opf.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    opf.push_str("    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n");
    opf.push_str(&format!(
        "    <item id=\"style\" href=\"{STYLE_HREF}\" media-type=\"text/css\"/>\n"
    ));
    for i in 0..chapters.len() {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter_id(i),
            chapter_href(i)
        ));
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    opf.push_str("    <itemref idref=\"nav\"/>\n");
    for i in 0..chapters.len() {
        opf.push_str(&format!("    <itemref idref=\"{}\"/>\n", chapter_id(i)));
    }
    opf.push_str("  </spine>\n</package>\n");
    opf
}

/// Second-level headings listed under each chapter in the navigation.
fn sections(chapter: &Chapter) -> impl Iterator<Item = &crate::convert::Heading> {
    chapter.headings.iter().filter(|h| h.level == 2)
}

fn generate_nav(meta: &DocumentMeta, chapters: &[Chapter]) -> String {
    let title = escape_html(&meta.title);
    let mut nav = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="en" xml:lang="en">
<head>
  <title>{title}</title>
</head>
<body>
  <nav epub:type="toc" id="id" role="doc-toc">
    <h2>{title}</h2>
    <ol>
"#
    );
    for (i, chapter) in chapters.iter().enumerate() {
        let href = chapter_href(i);
        nav.push_str(&format!(
            "      <li><a href=\"{href}\">{}</a>",
            escape_html(&chapter.title)
        ));
        let mut subs = sections(chapter).peekable();
        if subs.peek().is_some() {
            nav.push_str("\n        <ol>\n");
            for h in subs {
                nav.push_str(&format!(
                    "          <li><a href=\"{href}#{}\">{}</a></li>\n",
                    escape_html(&h.id),
                    escape_html(&h.text)
                ));
            }
            nav.push_str("        </ol>\n      ");
        }
        nav.push_str("</li>\n");
    }
    nav.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
    nav
}

fn generate_ncx(meta: &DocumentMeta, chapters: &[Chapter]) -> String {
    let mut ncx = String::new();
    ncx.push_str(
        r#"<?xml version="1.0" encoding="utf-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
"#,
    );
    ncx.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\"/>\n",
        escape_html(&identifier(meta))
    ));
    ncx.push_str("    <meta name=\"dtb:depth\" content=\"2\"/>\n");
    ncx.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
    ncx.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n");
    ncx.push_str("  </head>\n");
    ncx.push_str(&format!(
        "  <docTitle>\n    <text>{}</text>\n  </docTitle>\n  <navMap>\n",
        escape_html(&meta.title)
    ));

    let mut play_order = 0;
    for (i, chapter) in chapters.iter().enumerate() {
        play_order += 1;
        let href = chapter_href(i);
        ncx.push_str(&format!(
            "    <navPoint id=\"{}\" playOrder=\"{play_order}\">\n      <navLabel><text>{}</text></navLabel>\n      <content src=\"{href}\"/>\n",
            chapter_id(i),
            escape_html(&chapter.title)
        ));
        for (j, h) in sections(chapter).enumerate() {
            play_order += 1;
            ncx.push_str(&format!(
                "      <navPoint id=\"{}_{}\" playOrder=\"{play_order}\">\n        <navLabel><text>{}</text></navLabel>\n        <content src=\"{href}#{}\"/>\n      </navPoint>\n",
                chapter_id(i),
                j + 1,
                escape_html(&h.text),
                escape_html(&h.id)
            ));
        }
        ncx.push_str("    </navPoint>\n");
    }
    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

/// XHTML chapter document: converted HTML followed by the copyright block.
fn chapter_xhtml(meta: &DocumentMeta, chapter: &Chapter) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="en" xml:lang="en">
<head>
  <title>{title}</title>
  <link href="{STYLE_HREF}" rel="stylesheet" type="text/css"/>
</head>
<body>
{html}
<div class="copyright">
  <p>&#169; {year} {author} | v{version}</p>
  <p>{notice}</p>
</div>
</body>
</html>
"#,
        title = escape_html(&chapter.title),
        html = chapter.html,
        year = meta.year,
        author = escape_html(AUTHOR_ATTRIBUTION),
        version = escape_html(&meta.version),
        notice = escape_html(SHARE_NOTICE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Heading;
    use std::io::Read;

    fn meta() -> DocumentMeta {
        DocumentMeta {
            name: "rust-cohort".into(),
            title: "Rust Cohort".into(),
            version: "1.0".into(),
            year: 2026,
        }
    }

    fn chapter(title: &str, html: &str, headings: Vec<Heading>) -> Chapter {
        Chapter {
            source: PathBuf::from(format!("{title}.md")),
            title: title.into(),
            html: html.into(),
            headings,
        }
    }

    fn build(chapters: &[Chapter]) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        let mut buf = Cursor::new(Vec::new());
        write_epub_to_writer(&meta(), chapters, &mut buf).unwrap();
        zip::ZipArchive::new(Cursor::new(buf.into_inner())).unwrap()
    }

    fn read(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut s = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn mimetype_first_and_stored() {
        let mut archive = build(&[chapter("One", "<p>1</p>", vec![])]);
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn opf_metadata_and_spine_order() {
        let mut archive = build(&[
            chapter("One", "<p>1</p>", vec![]),
            chapter("Two", "<p>2</p>", vec![]),
        ]);
        let opf = read(&mut archive, "EPUB/content.opf");
        assert!(opf.contains("md2pdf-rust-cohort-v1.0"));
        assert!(opf.contains("<dc:language>en</dc:language>"));
        assert!(opf.contains("Jim Hodapp / Pybites"));
        let nav = opf.find("idref=\"nav\"").unwrap();
        let one = opf.find("idref=\"chapter_01\"").unwrap();
        let two = opf.find("idref=\"chapter_02\"").unwrap();
        assert!(nav < one && one < two);
    }

    #[test]
    fn chapters_carry_copyright_block() {
        let mut archive = build(&[chapter("A <b>", "<h1>A</h1>", vec![])]);
        let xhtml = read(&mut archive, "EPUB/chapter_01.xhtml");
        assert!(xhtml.contains("<title>A &lt;b&gt;</title>"));
        assert!(xhtml.contains("&#169; 2026 Jim Hodapp / Pybites | v1.0"));
        assert!(xhtml.contains(SHARE_NOTICE));
        assert!(xhtml.contains("style/main.css"));
    }

    fn assert_well_formed(xml: &str) {
        let mut reader = quick_xml::Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("not well-formed at {}: {e}", reader.buffer_position()),
            }
        }
    }

    #[test]
    fn raw_html_chapters_are_well_formed() {
        let html = crate::convert::markdown_to_html(
            "# Raw\n\nline one<br>line two\n\n<img src=\"http://x/y.png\">\n\n<hr>",
        );
        let mut archive = build(&[chapter("Raw", &html, vec![])]);
        let xhtml = read(&mut archive, "EPUB/chapter_01.xhtml");
        assert!(xhtml.contains("<br />"));
        assert_well_formed(&xhtml);
    }

    #[test]
    fn nav_lists_sections() {
        let headings = vec![
            Heading {
                level: 1,
                id: "intro".into(),
                text: "Intro".into(),
            },
            Heading {
                level: 2,
                id: "setup".into(),
                text: "Setup".into(),
            },
        ];
        let mut archive = build(&[chapter("Intro", "<h1 id=\"intro\">Intro</h1>", headings)]);
        let nav = read(&mut archive, "EPUB/nav.xhtml");
        assert!(nav.contains("<a href=\"chapter_01.xhtml\">Intro</a>"));
        assert!(nav.contains("<a href=\"chapter_01.xhtml#setup\">Setup</a>"));
        let ncx = read(&mut archive, "EPUB/toc.ncx");
        assert!(ncx.contains("playOrder=\"2\""));
    }
}

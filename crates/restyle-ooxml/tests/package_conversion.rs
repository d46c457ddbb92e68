//! End-to-end package conversion tests
//!
//! Build a realistic package in memory, run the full conversion, and
//! check the merged element sequence, metadata and handoff serialization.

use std::path::{Path, PathBuf};

use restyle_model::Element;
use restyle_ooxml::archive::{
    PackageArchive, CONTENT_TYPES_PATH, CORE_PROPS_PATH, DOCUMENT_PATH, DOCUMENT_RELS_PATH,
};
use restyle_ooxml::convert::{parse_package, ConvertOptions};
use restyle_ooxml::OoxmlError;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
  <w:style w:type="paragraph" w:styleId="RSChapterTitle"><w:name w:val="RS-ChapterTitle"/></w:style>
  <w:style w:type="paragraph" w:styleId="RSInsight"><w:name w:val="RS-Insight"/></w:style>
  <w:style w:type="paragraph" w:styleId="RSQaQuestion"><w:name w:val="RS-QA-Question"/></w:style>
  <w:style w:type="paragraph" w:styleId="RSQaAnswer"><w:name w:val="RS-QA-Answer"/></w:style>
  <w:style w:type="paragraph" w:styleId="RSConclusion"><w:name w:val="RS-Conclusion"/></w:style>
  <w:style w:type="paragraph" w:styleId="RSCaption"><w:name w:val="RS-Caption"/></w:style>
  <w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/></w:style>
</w:styles>"#;

const CORE_XML: &str = r#"<?xml version="1.0"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
                   xmlns:dc="http://purl.org/dc/elements/1.1/">
  <dc:title>Working Smarter</dc:title>
  <dc:creator>A. Writer</dc:creator>
</cp:coreProperties>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
</Relationships>"#;

fn styled(style: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{style}"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
    )
}

fn document_xml() -> String {
    let mut body = String::new();
    body.push_str(&styled(
        "RSChapterTitle",
        "Working Smarter | [Phase 2] | Habits that stick",
    ));
    body.push_str(&styled("Heading1", "Getting Started"));
    // Custom style on a huge font: style must win (tier 3 over tier 6).
    body.push_str(
        r#"<w:p><w:pPr><w:pStyle w:val="RSInsight"/></w:pPr>
           <w:r><w:rPr><w:sz w:val="60"/></w:rPr><w:t>Styled, not a heading</w:t></w:r></w:p>"#,
    );
    // Two list paragraphs by numbering metadata.
    for item in ["first item", "second item"] {
        body.push_str(&format!(
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr>
               <w:r><w:t>{item}</w:t></w:r></w:p>"#
        ));
    }
    body.push_str(&styled("RSQaQuestion", "How do I start?"));
    body.push_str(&styled("RSQaAnswer", "Pick one habit."));
    body.push_str(&styled("RSQaAnswer", "Track it daily."));
    // Image paragraph followed by a caption-styled paragraph.
    body.push_str(
        r#"<w:p><w:r><w:drawing xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"
            xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
            xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><wp:inline>
          <wp:extent cx="1828800" cy="914400"/>
          <a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">
            <pic:pic><pic:blipFill><a:blip r:embed="rId4"/></pic:blipFill></pic:pic>
          </a:graphicData></a:graphic>
        </wp:inline></w:drawing></w:r></w:p>"#,
    );
    body.push_str(&styled("RSCaption", "Figure 1: the habit loop"));
    body.push_str(&styled("RSConclusion", "Start small."));
    body.push_str(&styled("RSConclusion", "Stay consistent."));
    // Indented paragraph reads as a quote.
    body.push_str(
        r#"<w:p><w:pPr><w:ind w:left="720"/></w:pPr><w:r><w:t>Quoted passage</w:t></w:r></w:p>"#,
    );
    body.push_str(r#"<w:p><w:r><w:t>Plain closing paragraph.</w:t></w:r></w:p>"#);
    // Two-column table.
    body.push_str(
        r#"<w:tbl>
             <w:tr><w:tc><w:p><w:r><w:t>Habit</w:t></w:r></w:p></w:tc>
                    <w:tc><w:p><w:r><w:t>Cue</w:t></w:r></w:p></w:tc></w:tr>
             <w:tr><w:tc><w:p><w:r><w:t>Reading</w:t></w:r></w:p></w:tc>
                    <w:tc><w:p><w:r><w:t>Coffee</w:t></w:r></w:p></w:tc></w:tr>
           </w:tbl>"#,
    );

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
            xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <w:body>{body}</w:body>
</w:document>"#
    )
}

fn write_package(dir: &Path) -> PathBuf {
    let mut archive = PackageArchive::new();
    archive.set(CONTENT_TYPES_PATH, b"<Types/>".to_vec());
    archive.set(DOCUMENT_PATH, document_xml().into_bytes());
    archive.set(DOCUMENT_RELS_PATH, RELS_XML.as_bytes().to_vec());
    archive.set("word/styles.xml", STYLES_XML.as_bytes().to_vec());
    archive.set(CORE_PROPS_PATH, CORE_XML.as_bytes().to_vec());
    archive.set("word/media/image1.png", b"png-payload".to_vec());

    let path = dir.join("chapter.docx");
    archive.write_to_file(&path).unwrap();
    path
}

#[test]
fn test_full_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let package = write_package(dir.path());

    let doc = parse_package(&package, dir.path().join("staging"), &ConvertOptions::default())
        .unwrap();

    assert_eq!(
        doc.elements,
        vec![
            Element::ChapterTitle {
                text: "Working Smarter".into(),
                sub: "Habits that stick".into(),
                phase: "[Phase 2]".into(),
            },
            Element::Heading1 {
                num: String::new(),
                text: "Getting Started".into(),
            },
            Element::Insight {
                text: "Styled, not a heading".into()
            },
            Element::BulletList {
                items: vec!["first item".into(), "second item".into()]
            },
            Element::QAndA {
                question: "How do I start?".into(),
                answers: vec!["Pick one habit.".into(), "Track it daily.".into()],
            },
            Element::ImageBlock {
                filename: "image1.png".into(),
                local_path: doc.assets["image1.png"].local_path.to_string_lossy().into_owned(),
                width_emu: 1828800,
                height_emu: 914400,
                caption: "Figure 1: the habit loop".into(),
            },
            Element::ConclusionBlock {
                lines: vec!["Start small.".into(), "Stay consistent.".into()]
            },
            Element::QuoteBlock {
                text: "Quoted passage".into()
            },
            Element::BodyText {
                text: "Plain closing paragraph.".into(),
                indent: 0,
            },
            Element::TableTwoCol {
                col1: "Habit".into(),
                col2: "Cue".into(),
                rows: vec![vec!["Reading".into(), "Coffee".into()]],
            },
        ]
    );

    // Metadata: core properties plus the chapter-title scan.
    assert_eq!(doc.meta.title, "Working Smarter");
    assert_eq!(doc.meta.author, "A. Writer");
    assert_eq!(doc.meta.chapter, "[Phase 2]");
    assert_eq!(doc.meta.sub, "Habits that stick");

    // Assets staged and referenced.
    let asset = doc.assets.get("image1.png").unwrap();
    assert_eq!(asset.rel_id, "rId4");
    assert!(asset.local_path.is_file());
    assert!(doc.asset_base_dir.is_dir());

    // Handoff is clean: nothing internal survived the pipeline.
    let json = doc.to_handoff_json().unwrap();
    assert!(json.contains(r#""type":"qa""#));
    assert!(json.contains(r#""type":"table2""#));
}

#[test]
fn test_chapter_override_wins() {
    let dir = tempfile::tempdir().unwrap();
    let package = write_package(dir.path());

    let options = ConvertOptions {
        chapter_override: Some("[Phase 7]".into()),
        ..Default::default()
    };
    let doc = parse_package(&package, dir.path().join("staging"), &options).unwrap();
    assert_eq!(doc.meta.chapter, "[Phase 7]");
}

#[test]
fn test_non_package_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("draft.txt");
    std::fs::write(&path, "tagged text, not a package").unwrap();

    let err = parse_package(&path, dir.path().join("staging"), &ConvertOptions::default())
        .unwrap_err();
    assert!(matches!(err, OoxmlError::NotAPackage(_)));
}

#[test]
fn test_conversion_is_deterministic_modulo_staging() {
    let dir = tempfile::tempdir().unwrap();
    let package = write_package(dir.path());

    let a = parse_package(&package, dir.path().join("staging"), &ConvertOptions::default())
        .unwrap();
    let b = parse_package(&package, dir.path().join("staging"), &ConvertOptions::default())
        .unwrap();

    assert_eq!(a.meta, b.meta);
    assert_eq!(a.elements.len(), b.elements.len());
    for (x, y) in a.elements.iter().zip(&b.elements) {
        match (x, y) {
            // Image paths differ by session directory; everything else
            // must match exactly.
            (Element::ImageBlock { filename: f1, .. }, Element::ImageBlock { filename: f2, .. }) => {
                assert_eq!(f1, f2)
            }
            _ => assert_eq!(x, y),
        }
    }
}

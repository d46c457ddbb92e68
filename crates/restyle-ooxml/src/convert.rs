//! Package-to-document conversion
//!
//! Wires the package path end-to-end: asset extraction, body stream
//! parsing, per-paragraph classification, the merge pipeline, and metadata
//! from core-properties plus an element-sequence scan.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use restyle_core::run_pipeline;
use restyle_model::{DocumentMeta, Element, ParsedDocument};

use crate::archive::PackageArchive;
use crate::classify::{Classifier, ClassifierConfig, ParaFacts, StyleMap};
use crate::document::{Block, DocumentStream};
use crate::error::Result;
use crate::extract::extract_assets;
use crate::relationships::Relationships;
use crate::styles::StyleSheet;

/// Options for a package conversion session.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Typographic thresholds for the classifier
    pub config: ClassifierConfig,
    /// Custom semantic style registry
    pub styles: StyleMap,
    /// Force the chapter label regardless of document metadata
    pub chapter_override: Option<String>,
}

/// Parse a word-processing package into a [`ParsedDocument`].
///
/// Assets are staged under a fresh session directory inside
/// `staging_root`; the caller owns and eventually deletes that directory.
pub fn parse_package(
    package_path: impl AsRef<Path>,
    staging_root: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<ParsedDocument> {
    let package_path = package_path.as_ref();

    let extraction = extract_assets(package_path, staging_root)?;
    let archive = PackageArchive::open(package_path)?;

    let stream = DocumentStream::parse(archive.document_xml()?)?;
    let sheet = match archive.get("word/styles.xml") {
        Some(xml) => StyleSheet::parse(xml)?,
        None => StyleSheet::default(),
    };
    let rel_filenames = match archive.document_rels_xml() {
        Some(xml) => Relationships::parse(xml)?.image_filenames(),
        None => HashMap::new(),
    };

    let classifier = Classifier::new(&options.config, &options.styles, &extraction.assets);
    let mut elements = Vec::new();
    for block in &stream.blocks {
        let element = match block {
            Block::Paragraph(para) => {
                let facts = ParaFacts::gather(para, &sheet, &rel_filenames);
                classifier.classify_paragraph(&facts)
            }
            Block::Table(table) => classifier.classify_table(table),
        };
        if let Some(element) = element {
            elements.push(element);
        }
    }
    let mut elements = run_pipeline(elements);

    let mut meta = match archive.core_props_xml() {
        Some(xml) => parse_core_props(xml)?,
        None => DocumentMeta::default(),
    };
    if let Some(chapter) = &options.chapter_override {
        meta.chapter = chapter.clone();
    }
    enrich_meta_from_elements(&mut meta, &mut elements);

    Ok(ParsedDocument {
        meta,
        elements,
        assets: extraction.assets,
        asset_base_dir: extraction.staging_dir,
    })
}

/// Read title/creator from `docProps/core.xml`.
fn parse_core_props(xml: &[u8]) -> Result<DocumentMeta> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut meta = DocumentMeta::default();
    let mut buf = Vec::new();
    let mut field: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                field = match e.local_name().as_ref() {
                    b"title" => Some("title"),
                    b"creator" => Some("creator"),
                    _ => None,
                };
            }
            Ok(Event::Text(ref e)) => {
                if let Some(name) = field {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match name {
                        "title" => meta.title = text,
                        _ => meta.author = text,
                    }
                }
            }
            Ok(Event::End(_)) => field = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(meta)
}

/// Fill metadata gaps from the element sequence.
///
/// The first chapter-title element may carry a `title | chapter | sub`
/// split; it is normalized in place and backfills empty meta fields. With
/// no chapter label anywhere, the first level-1 heading stands in.
fn enrich_meta_from_elements(meta: &mut DocumentMeta, elements: &mut [Element]) {
    for el in elements.iter_mut() {
        if let Element::ChapterTitle { text, sub, phase } = el {
            if text.contains('|') {
                let parts: Vec<String> =
                    text.split('|').map(|p| p.trim().to_string()).collect();
                *text = parts[0].clone();
                if parts.len() > 1 && phase.is_empty() {
                    *phase = parts[1].clone();
                }
                if parts.len() > 2 && sub.is_empty() {
                    *sub = parts[2].clone();
                }
            }
            if meta.title.is_empty() {
                meta.title = text.clone();
            }
            if meta.chapter.is_empty() {
                meta.chapter = phase.clone();
            }
            if meta.sub.is_empty() {
                meta.sub = sub.clone();
            }
            break;
        }
    }
    if meta.chapter.is_empty() {
        for el in elements.iter() {
            if let Element::Heading1 { text, .. } = el {
                meta.chapter = text.clone();
                break;
            }
        }
    }
}

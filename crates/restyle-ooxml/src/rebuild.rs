//! Package reconstruction
//!
//! Takes a template-rendered package whose body text carries
//! `[ASSET:<logical-id>]` markers, embeds the session's extracted assets,
//! wires relationships, registers content types, and swaps each marker for
//! a structurally valid inline drawing. Construction happens in a
//! temporary archive that is persisted onto the output path only on full
//! success, so a failure never corrupts an existing output file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use restyle_model::{Asset, AssetMap};

use crate::archive::{
    PackageArchive, CONTENT_TYPES_PATH, DOCUMENT_PATH, DOCUMENT_RELS_PATH, MEDIA_DIR,
};
use crate::content_types::{content_type_for_extension, ContentTypes};
use crate::error::{OoxmlError, Result};
use crate::relationships::{RelIdAllocator, Relationships};

/// Widest extent an embedded image may take, in EMUs (full content width).
pub const MAX_IMAGE_WIDTH_EMU: i64 = 6_096_000;

/// Fallback extent for assets that carry no dimensions.
const DEFAULT_EXTENT_EMU: (i64, i64) = (MAX_IMAGE_WIDTH_EMU, MAX_IMAGE_WIDTH_EMU / 2);

/// Rebuild `template_path` into `output_path` with `assets` embedded.
///
/// With an empty asset map the template is copied through byte-for-byte.
pub fn rebuild_package(
    template_path: impl AsRef<Path>,
    assets: &AssetMap,
    output_path: impl AsRef<Path>,
) -> Result<()> {
    let template_path = template_path.as_ref();
    let output_path = output_path.as_ref();

    if assets.is_empty() {
        fs::copy(template_path, output_path)?;
        return Ok(());
    }

    let mut archive = PackageArchive::open(template_path)?;

    // Content types: one default mapping per asset extension not already
    // registered.
    let mut content_types = ContentTypes::parse(archive.content_types_xml()?)?;
    for asset in assets.values() {
        if content_types.register_default(&asset.ext, content_type_for_extension(&asset.ext)) {
            log::debug!("registered content type for .{}", asset.ext);
        }
    }

    // Relationships: allocate a collision-free id per asset. Templates
    // without any pre-existing images have no manifest at all; synthesize
    // one holding only the new relationships.
    let mut rels = match archive.document_rels_xml() {
        Some(xml) => Relationships::parse(xml)?,
        None => {
            log::warn!("template has no relationship manifest, synthesizing one");
            Relationships::new()
        }
    };
    let mut allocator = RelIdAllocator::for_manifest(&rels);
    let mut rel_ids: HashMap<&str, String> = HashMap::new();
    for asset in assets.values() {
        let rel_id = allocator.allocate(&rels);
        rels.insert_image(rel_id.as_str(), format!("media/{}", asset.filename));
        rel_ids.insert(asset.id.as_str(), rel_id);
    }

    // Media payloads; existing entries are kept so partial re-runs stay
    // safe.
    for asset in assets.values() {
        let target = format!("{MEDIA_DIR}{}", asset.filename);
        if archive.contains(&target) {
            continue;
        }
        let data = fs::read(&asset.local_path)?;
        archive.set(target, data);
    }

    // Marker substitution over the document text.
    let document = String::from_utf8_lossy(archive.document_xml()?).into_owned();
    let document = substitute_markers(&document, assets, &rel_ids);

    archive.set(DOCUMENT_PATH, document.into_bytes());
    archive.set(DOCUMENT_RELS_PATH, rels.to_xml().into_bytes());
    archive.set(CONTENT_TYPES_PATH, content_types.to_xml().into_bytes());

    // Build in a temporary file and move it into place only once the
    // archive is complete.
    let out_dir = output_path.parent().filter(|p| !p.as_os_str().is_empty());
    let tmp = tempfile::NamedTempFile::new_in(out_dir.unwrap_or_else(|| Path::new(".")))?;
    archive.write_to(tmp.as_file())?;
    tmp.persist(output_path)
        .map_err(|e| OoxmlError::Io(e.error))?;
    Ok(())
}

fn run_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A marker filling a whole text element: the element is replaced by
    // the drawing outright.
    RE.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>\s*\[ASSET:([A-Za-z0-9_.-]+)\]\s*</w:t>").unwrap()
    })
}

fn inline_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[ASSET:([A-Za-z0-9_.-]+)\]").unwrap())
}

/// Replace `[ASSET:<id>]` markers with inline drawings.
///
/// Markers whose id has no staged asset or allocated relationship are left
/// untouched: a visible marker beats silent corruption.
fn substitute_markers(
    document: &str,
    assets: &AssetMap,
    rel_ids: &HashMap<&str, String>,
) -> String {
    let mut shape_ids = ShapeIdCounter::scan(document);

    // Pass 1: markers occupying a whole <w:t>.
    let document = run_marker_re().replace_all(document, |cap: &Captures| {
        match lookup(assets, rel_ids, &cap[1]) {
            Some((asset, rel_id)) => drawing_xml(asset, rel_id, shape_ids.next_id()),
            None => untouched(&cap[0], &cap[1]),
        }
    });

    // Pass 2: markers embedded mid-text. The drawing is spliced in as a
    // sibling run child, keeping the surrounding text element valid.
    inline_marker_re()
        .replace_all(&document, |cap: &Captures| {
            match lookup(assets, rel_ids, &cap[1]) {
                Some((asset, rel_id)) => format!(
                    "</w:t>{}<w:t>",
                    drawing_xml(asset, rel_id, shape_ids.next_id())
                ),
                None => untouched(&cap[0], &cap[1]),
            }
        })
        .into_owned()
}

fn lookup<'a>(
    assets: &'a AssetMap,
    rel_ids: &'a HashMap<&str, String>,
    logical_id: &str,
) -> Option<(&'a Asset, &'a str)> {
    let asset = assets.values().find(|a| a.id == logical_id)?;
    let rel_id = rel_ids.get(logical_id)?;
    Some((asset, rel_id.as_str()))
}

fn untouched(matched: &str, logical_id: &str) -> String {
    log::warn!("leaving unresolved asset marker [ASSET:{logical_id}] in place");
    matched.to_string()
}

/// Strictly increasing drawing/shape id counter, seeded past every id the
/// template already uses.
struct ShapeIdCounter {
    next: u64,
}

impl ShapeIdCounter {
    fn scan(document: &str) -> Self {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r#"docPr id="(\d+)""#).unwrap());
        let max = re
            .captures_iter(document)
            .filter_map(|cap| cap[1].parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self { next: max + 1 }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Extent for an asset, capped to the content width with the aspect ratio
/// kept.
fn extent_for(asset: &Asset) -> (i64, i64) {
    let (mut width, mut height) = if asset.has_dimensions() {
        (asset.width_emu, asset.height_emu)
    } else {
        DEFAULT_EXTENT_EMU
    };
    if width > MAX_IMAGE_WIDTH_EMU {
        height = (height as f64 * MAX_IMAGE_WIDTH_EMU as f64 / width as f64).round() as i64;
        width = MAX_IMAGE_WIDTH_EMU;
    }
    (width, height)
}

/// A namespace-complete inline drawing referencing `rel_id`.
fn drawing_xml(asset: &Asset, rel_id: &str, shape_id: u64) -> String {
    let (cx, cy) = extent_for(asset);
    let name = &asset.filename;
    format!(
        r#"<w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:docPr id="{shape_id}" name="Picture {shape_id}"/><wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr><a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:nvPicPr><pic:cNvPr id="{shape_id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{rel_id}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
    )
}

//! Relationship manifest parsing, serialization and id allocation
//!
//! Package parts reference media through relationship files
//! (`_rels/*.rels`) mapping ids to targets. The reconstructor appends
//! image relationships to a template's manifest, so new ids must never
//! collide with ids the template already uses. Allocation is handled by
//! an explicit [`RelIdAllocator`] threaded through the rebuild instead of
//! implicit per-call numbering.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{OoxmlError, Result};

/// OOXML namespace for relationship manifests
pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Image relationship type URI
pub const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// One relationship entry.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Target path relative to the owning part ("media/image1.png")
    pub target: String,
    /// Relationship type URI
    pub rel_type: String,
    /// "External" for external targets, None for package-internal ones
    pub target_mode: Option<String>,
}

/// A parsed relationship manifest.
///
/// Insertion order is kept so serialization is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    order: Vec<String>,
    map: HashMap<String, Relationship>,
}

impl Relationships {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a manifest from XML bytes.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut rels = Self::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    if e.local_name().as_ref() == b"Relationship" {
                        let mut id = None;
                        let mut target = None;
                        let mut rel_type = None;
                        let mut target_mode = None;

                        for attr in e.attributes().filter_map(|a| a.ok()) {
                            let value = attr.unescape_value().ok().map(|v| v.to_string());
                            match attr.key.as_ref() {
                                b"Id" => id = value,
                                b"Target" => target = value,
                                b"Type" => rel_type = value,
                                b"TargetMode" => target_mode = value,
                                _ => {}
                            }
                        }

                        if let (Some(id), Some(target)) = (id, target) {
                            rels.insert(
                                id,
                                Relationship {
                                    target,
                                    rel_type: rel_type.unwrap_or_default(),
                                    target_mode,
                                },
                            );
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(OoxmlError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Insert a relationship under an explicit id.
    pub fn insert(&mut self, id: impl Into<String>, rel: Relationship) {
        let id = id.into();
        if !self.map.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.map.insert(id, rel);
    }

    /// Append a package-internal image relationship under the given id.
    pub fn insert_image(&mut self, id: impl Into<String>, target: impl Into<String>) {
        self.insert(
            id,
            Relationship {
                target: target.into(),
                rel_type: IMAGE_REL_TYPE.to_string(),
                target_mode: None,
            },
        );
    }

    /// Get a relationship target path by id.
    pub fn target(&self, id: &str) -> Option<&str> {
        self.map.get(id).map(|r| r.target.as_str())
    }

    /// Whether an id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    /// Whether the relationship under this id is an image.
    pub fn is_image(&self, id: &str) -> bool {
        self.map
            .get(id)
            .map(|r| r.rel_type.contains("image"))
            .unwrap_or(false)
    }

    /// Number of relationships.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate `(id, relationship)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Relationship)> {
        self.order
            .iter()
            .filter_map(|id| self.map.get(id).map(|rel| (id.as_str(), rel)))
    }

    /// Map of image relationship ids to their target filename (the final
    /// path component), as used to pair drawings with media files.
    pub fn image_filenames(&self) -> HashMap<String, String> {
        self.iter()
            .filter(|(id, _)| self.is_image(id))
            .map(|(id, rel)| {
                let filename = rel.target.rsplit('/').next().unwrap_or(&rel.target);
                (id.to_string(), filename.to_string())
            })
            .collect()
    }

    /// Largest numeric `rIdN` present, 0 when none.
    pub fn max_numeric_id(&self) -> u32 {
        self.map
            .keys()
            .filter_map(|id| extract_id_number(id))
            .max()
            .unwrap_or(0)
    }

    /// Serialize to manifest XML.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Relationships xmlns="{RELATIONSHIPS_NS}">"#));
        xml.push('\n');

        for (id, rel) in self.iter() {
            xml.push_str("  <Relationship");
            xml.push_str(&format!(r#" Id="{}""#, escape_xml(id)));
            xml.push_str(&format!(r#" Type="{}""#, escape_xml(&rel.rel_type)));
            xml.push_str(&format!(r#" Target="{}""#, escape_xml(&rel.target)));
            if let Some(mode) = &rel.target_mode {
                xml.push_str(&format!(r#" TargetMode="{}""#, escape_xml(mode)));
            }
            xml.push_str("/>\n");
        }

        xml.push_str("</Relationships>");
        xml
    }
}

/// Allocates relationship ids guaranteed not to collide with a template's
/// own ids.
///
/// The pool starts above a high watermark (or above the largest existing
/// numeric id, whichever is greater) and skips over any id already taken,
/// so ids stay disjoint from the pre-existing manifest for the whole
/// reconstruction.
#[derive(Debug)]
pub struct RelIdAllocator {
    next: u32,
}

impl RelIdAllocator {
    /// Ids are drawn from above this floor so template ids (usually small
    /// and dense) are never shadowed.
    pub const HIGH_WATERMARK: u32 = 1000;

    /// Seed an allocator from an existing manifest.
    pub fn for_manifest(rels: &Relationships) -> Self {
        Self {
            next: rels.max_numeric_id().max(Self::HIGH_WATERMARK) + 1,
        }
    }

    /// Allocate the next id not present in `rels`.
    pub fn allocate(&mut self, rels: &Relationships) -> String {
        loop {
            let id = format!("rId{}", self.next);
            self.next += 1;
            if !rels.contains(&id) {
                return id;
            }
        }
    }
}

/// Extract the numeric portion from a relationship id ("rId5" -> 5).
fn extract_id_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId")
        .or_else(|| id.strip_prefix("RId"))
        .or_else(|| id.strip_prefix("rid"))
        .and_then(|num| num.parse().ok())
}

/// Escape special XML characters in attribute values.
pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
    <Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
        <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
        <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
    </Relationships>"#;

    #[test]
    fn test_parse_manifest() {
        let rels = Relationships::parse(SAMPLE).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels.target("rId7"), Some("media/image1.png"));
        assert!(rels.is_image("rId7"));
        assert!(!rels.is_image("rId1"));
        assert_eq!(rels.max_numeric_id(), 7);
    }

    #[test]
    fn test_image_filenames() {
        let rels = Relationships::parse(SAMPLE).unwrap();
        let map = rels.image_filenames();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("rId7").map(String::as_str), Some("image1.png"));
    }

    #[test]
    fn test_allocator_starts_above_watermark() {
        let rels = Relationships::parse(SAMPLE).unwrap();
        let mut alloc = RelIdAllocator::for_manifest(&rels);
        assert_eq!(alloc.allocate(&rels), "rId1001");
        assert_eq!(alloc.allocate(&rels), "rId1002");
    }

    #[test]
    fn test_allocator_skips_collisions() {
        let mut rels = Relationships::new();
        rels.insert_image("rId1001", "media/a.png");
        rels.insert_image("rId1002", "media/b.png");

        let mut alloc = RelIdAllocator::for_manifest(&rels);
        // Seeded past the existing numeric maximum already.
        let id = alloc.allocate(&rels);
        assert_eq!(id, "rId1003");
    }

    #[test]
    fn test_allocated_ids_disjoint_from_existing() {
        let rels = Relationships::parse(SAMPLE).unwrap();
        let mut alloc = RelIdAllocator::for_manifest(&rels);
        let mut seen = Vec::new();
        for _ in 0..20 {
            let id = alloc.allocate(&rels);
            assert!(!rels.contains(&id));
            assert!(!seen.contains(&id));
            seen.push(id);
        }
    }

    #[test]
    fn test_serialization_roundtrip_with_escaping() {
        let mut rels = Relationships::new();
        rels.insert_image("rId1001", "media/a & \"b\".png");

        let xml = rels.to_xml();
        assert!(xml.contains("&amp;"));
        assert!(xml.contains("&quot;"));

        let reparsed = Relationships::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.target("rId1001"), Some("media/a & \"b\".png"));
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut rels = Relationships::new();
        rels.insert_image("rId1001", "media/a.png");
        rels.insert_image("rId1002", "media/b.png");

        let ids: Vec<&str> = rels.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["rId1001", "rId1002"]);
    }
}

//! Content-type registry (`[Content_Types].xml`)
//!
//! The registry maps file extensions to MIME types (`<Default>`) and
//! individual parts to types (`<Override>`). Injected media needs its
//! extension registered or the package is invalid; the reconstructor
//! appends missing defaults here.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{OoxmlError, Result};
use crate::relationships::escape_xml;

/// OOXML namespace for the content-type registry
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// MIME content type for a raster/vector image extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "tiff" | "tif" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Parsed content-type registry, entry order preserved.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Parse the registry from XML bytes.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut registry = Self::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match e.local_name().as_ref()
                {
                    b"Default" => {
                        let mut extension = None;
                        let mut content_type = None;
                        for attr in e.attributes().filter_map(|a| a.ok()) {
                            let value = attr.unescape_value().ok().map(|v| v.to_string());
                            match attr.key.as_ref() {
                                b"Extension" => extension = value,
                                b"ContentType" => content_type = value,
                                _ => {}
                            }
                        }
                        if let (Some(ext), Some(ct)) = (extension, content_type) {
                            registry.defaults.push((ext, ct));
                        }
                    }
                    b"Override" => {
                        let mut part_name = None;
                        let mut content_type = None;
                        for attr in e.attributes().filter_map(|a| a.ok()) {
                            let value = attr.unescape_value().ok().map(|v| v.to_string());
                            match attr.key.as_ref() {
                                b"PartName" => part_name = value,
                                b"ContentType" => content_type = value,
                                _ => {}
                            }
                        }
                        if let (Some(part), Some(ct)) = (part_name, content_type) {
                            registry.overrides.push((part, ct));
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OoxmlError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(registry)
    }

    /// Whether a default mapping exists for the extension
    /// (case-insensitive).
    pub fn has_default(&self, ext: &str) -> bool {
        self.defaults
            .iter()
            .any(|(e, _)| e.eq_ignore_ascii_case(ext))
    }

    /// Register a default mapping unless the extension is already covered.
    /// Returns whether an entry was added.
    pub fn register_default(&mut self, ext: &str, content_type: &str) -> bool {
        if self.has_default(ext) {
            return false;
        }
        self.defaults
            .push((ext.to_lowercase(), content_type.to_string()));
        true
    }

    /// Number of default mappings.
    pub fn default_count(&self) -> usize {
        self.defaults.len()
    }

    /// Serialize back to registry XML.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{CONTENT_TYPES_NS}">"#));
        xml.push('\n');
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                "  <Default Extension=\"{}\" ContentType=\"{}\"/>\n",
                escape_xml(ext),
                escape_xml(ct)
            ));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                "  <Override PartName=\"{}\" ContentType=\"{}\"/>\n",
                escape_xml(part),
                escape_xml(ct)
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
    <Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
        <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
        <Default Extension="xml" ContentType="application/xml"/>
        <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
    </Types>"#;

    #[test]
    fn test_parse_registry() {
        let registry = ContentTypes::parse(SAMPLE).unwrap();
        assert_eq!(registry.default_count(), 2);
        assert!(registry.has_default("rels"));
        assert!(registry.has_default("XML"));
        assert!(!registry.has_default("png"));
    }

    #[test]
    fn test_register_default_deduplicates() {
        let mut registry = ContentTypes::parse(SAMPLE).unwrap();
        assert!(registry.register_default("png", "image/png"));
        assert!(!registry.register_default("png", "image/png"));
        assert!(!registry.register_default("PNG", "image/png"));
        assert_eq!(registry.default_count(), 3);
    }

    #[test]
    fn test_roundtrip_keeps_overrides() {
        let mut registry = ContentTypes::parse(SAMPLE).unwrap();
        registry.register_default("jpeg", "image/jpeg");

        let xml = registry.to_xml();
        let reparsed = ContentTypes::parse(xml.as_bytes()).unwrap();
        assert!(reparsed.has_default("jpeg"));
        assert!(xml.contains("/word/document.xml"));
    }

    #[test]
    fn test_content_type_table() {
        assert_eq!(content_type_for_extension("png"), "image/png");
        assert_eq!(content_type_for_extension("JPG"), "image/jpeg");
        assert_eq!(content_type_for_extension("tif"), "image/tiff");
        assert_eq!(
            content_type_for_extension("bin"),
            "application/octet-stream"
        );
    }
}

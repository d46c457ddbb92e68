//! Style definitions parsing (word/styles.xml)
//!
//! Classification matches on the style *name* authors see in the style
//! gallery, but document paragraphs reference styles by *id*. This module
//! resolves the id -> name mapping.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{OoxmlError, Result};

/// Paragraph style names keyed by style id.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    names: HashMap<String, String>,
}

impl StyleSheet {
    /// Parse styles from XML bytes.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut names = HashMap::new();
        let mut buf = Vec::new();
        let mut current_id: Option<String> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"style" => {
                            current_id = get_attr(e, b"w:styleId");
                        }
                        b"name" => {
                            if let (Some(id), Some(name)) =
                                (current_id.as_ref(), get_attr(e, b"w:val"))
                            {
                                names.insert(id.clone(), name);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => {
                    if e.local_name().as_ref() == b"style" {
                        current_id = None;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(OoxmlError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { names })
    }

    /// Resolve a style id to its display name, falling back to the id
    /// itself when the stylesheet has no entry (or no stylesheet was
    /// available at all).
    pub fn display_name<'a>(&'a self, style_id: &'a str) -> &'a str {
        self.names
            .get(style_id)
            .map(String::as_str)
            .unwrap_or(style_id)
    }

    /// Number of named styles.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the stylesheet has no entries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn get_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

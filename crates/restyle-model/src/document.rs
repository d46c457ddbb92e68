//! Parsed document root and metadata
//!
//! `ParsedDocument` is the sole handoff artifact to the external layout
//! engine: metadata, the ordered element sequence, and the asset map with
//! its staging base directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::AssetMap;
use crate::element::Element;

/// Document metadata, populated from tagged-text front-matter or from
/// package core-properties plus an element-sequence scan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Document title
    #[serde(default)]
    pub title: String,
    /// Author
    #[serde(default)]
    pub author: String,
    /// Chapter label (e.g. "[Phase 9]" or a section name)
    #[serde(default)]
    pub chapter: String,
    /// Chapter subtitle
    #[serde(default)]
    pub sub: String,
}

/// Errors raised when serializing a document for the layout engine.
#[derive(Error, Debug)]
pub enum HandoffError {
    /// A pipeline-internal element survived merging. The sequence is not
    /// fit for the layout boundary.
    #[error("internal element at index {index} not eliminated by the merge pipeline: {tag}")]
    InternalElement { index: usize, tag: &'static str },

    /// JSON serialization failed
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The complete result of parsing one source document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Document metadata
    pub meta: DocumentMeta,
    /// Ordered content elements
    pub elements: Vec<Element>,
    /// Extracted assets keyed by original filename
    pub assets: AssetMap,
    /// Session staging directory holding the asset files
    pub asset_base_dir: PathBuf,
}

impl ParsedDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of content elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the document has no content elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Serialize for the layout engine.
    ///
    /// Refuses sequences still containing pipeline-internal elements: their
    /// presence after merging is a pipeline defect, not a valid handoff.
    pub fn to_handoff_json(&self) -> Result<String, HandoffError> {
        if let Some((index, el)) = self
            .elements
            .iter()
            .enumerate()
            .find(|(_, el)| el.is_internal())
        {
            return Err(HandoffError::InternalElement {
                index,
                tag: internal_tag(el),
            });
        }
        Ok(serde_json::to_string(self)?)
    }
}

fn internal_tag(el: &Element) -> &'static str {
    match el {
        Element::CaptionText { .. } => "caption",
        Element::BulletItem { .. } => "bullet_item",
        Element::ConclusionLine { .. } => "conclusion_line",
        Element::QaQuestion { .. } => "qa_question",
        Element::QaAnswer { .. } => "qa_answer",
        _ => "element",
    }
}

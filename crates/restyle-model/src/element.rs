//! Typed content elements
//!
//! A parsed document is an ordered sequence of these elements. The serde
//! `type` tags are the wire contract with the layout engine and must stay
//! stable: `chapter_title`, `h1`..`h3`, `body`, `quote`, `insight`, `tip`,
//! `warning`, `qa`, `prompt`, `conclusion`, `bullets`, `image`,
//! `image_placeholder`, `table2`, `table3`, `hr`, `empty`.
//!
//! A handful of variants are internal to the conversion pipeline and never
//! reach the layout boundary: `CaptionText` and the run fragments
//! (`BulletItem`, `ConclusionLine`, `QaQuestion`, `QaAnswer`) exist only
//! between classification and merging. See [`Element::is_internal`].

use serde::{Deserialize, Serialize};

/// Callout flavor for the boxed emphasis elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalloutKind {
    Insight,
    Tip,
    Warning,
}

/// Table shape: a two-column layout table or a wide (3+ column) data table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    TwoColumn,
    Wide,
}

/// A single content element.
///
/// Payload fields are only meaningful for their own variant; producers must
/// uphold that (e.g. `answers` belongs to `QAndA` alone). Sequence order is
/// significant and preserved from the source document end-to-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    /// Chapter opener: title line plus optional subtitle and phase label.
    ChapterTitle {
        text: String,
        #[serde(default)]
        sub: String,
        #[serde(default)]
        phase: String,
    },
    /// Level-1 heading; `num` holds a leading section number ("1", "2", ...)
    /// split off an `N. Title` pattern, empty when the heading had none.
    #[serde(rename = "h1")]
    Heading1 {
        #[serde(default)]
        num: String,
        text: String,
    },
    #[serde(rename = "h2")]
    Heading2 { text: String },
    #[serde(rename = "h3")]
    Heading3 { text: String },
    /// Plain paragraph; `indent` is the source left indent in twips.
    #[serde(rename = "body")]
    BodyText {
        text: String,
        #[serde(default)]
        indent: i64,
    },
    #[serde(rename = "quote")]
    QuoteBlock { text: String },
    #[serde(rename = "insight")]
    Insight { text: String },
    #[serde(rename = "tip")]
    Tip { text: String },
    #[serde(rename = "warning")]
    Warning { text: String },
    #[serde(rename = "qa")]
    QAndA {
        question: String,
        answers: Vec<String>,
    },
    #[serde(rename = "prompt")]
    PromptBlock {
        #[serde(default)]
        label: String,
        text: String,
    },
    #[serde(rename = "conclusion")]
    ConclusionBlock { lines: Vec<String> },
    #[serde(rename = "bullets")]
    BulletList { items: Vec<String> },
    /// An image backed by a staged asset file.
    #[serde(rename = "image")]
    ImageBlock {
        filename: String,
        local_path: String,
        width_emu: i64,
        height_emu: i64,
        #[serde(default)]
        caption: String,
    },
    /// An image slot whose binary could not be resolved.
    ImagePlaceholder { text: String },
    /// Two-column table: `col1`/`col2` are the header cells.
    #[serde(rename = "table2")]
    TableTwoCol {
        col1: String,
        col2: String,
        rows: Vec<Vec<String>>,
    },
    /// Wide table with a full header row.
    #[serde(rename = "table3")]
    TableWide {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Horizontal rule; `size` is the rule weight in eighth-points.
    #[serde(rename = "hr")]
    HorizontalRule {
        #[serde(default = "default_hr_size")]
        size: u32,
    },
    /// Vertical spacer; `height` in twips.
    #[serde(rename = "empty")]
    SpacerBlock {
        #[serde(default = "default_spacer_height")]
        height: u32,
    },

    // -- internal-only variants below; never serialized to the handoff ----
    /// Short description paragraph directly after an image. Absorbed into
    /// the image's caption by the merge pipeline.
    #[serde(rename = "caption")]
    CaptionText { text: String },
    /// One raw bullet paragraph, pre-merge.
    BulletItem { text: String },
    /// One raw conclusion paragraph, pre-merge.
    ConclusionLine { text: String },
    /// A question paragraph, pre-merge.
    QaQuestion { text: String },
    /// An answer paragraph, pre-merge.
    QaAnswer { text: String },
}

fn default_hr_size() -> u32 {
    4
}

fn default_spacer_height() -> u32 {
    120
}

impl Element {
    /// Build a callout of the given kind.
    pub fn callout(kind: CalloutKind, text: impl Into<String>) -> Self {
        let text = text.into();
        match kind {
            CalloutKind::Insight => Element::Insight { text },
            CalloutKind::Tip => Element::Tip { text },
            CalloutKind::Warning => Element::Warning { text },
        }
    }

    /// A horizontal rule with the default weight.
    pub fn hr() -> Self {
        Element::HorizontalRule {
            size: default_hr_size(),
        }
    }

    /// A spacer with the default height.
    pub fn spacer() -> Self {
        Element::SpacerBlock {
            height: default_spacer_height(),
        }
    }

    /// A body paragraph with no indentation.
    pub fn body(text: impl Into<String>) -> Self {
        Element::BodyText {
            text: text.into(),
            indent: 0,
        }
    }

    /// The callout kind, for the three callout variants.
    pub fn callout_kind(&self) -> Option<CalloutKind> {
        match self {
            Element::Insight { .. } => Some(CalloutKind::Insight),
            Element::Tip { .. } => Some(CalloutKind::Tip),
            Element::Warning { .. } => Some(CalloutKind::Warning),
            _ => None,
        }
    }

    /// The table kind, for the two table variants.
    pub fn table_kind(&self) -> Option<TableKind> {
        match self {
            Element::TableTwoCol { .. } => Some(TableKind::TwoColumn),
            Element::TableWide { .. } => Some(TableKind::Wide),
            _ => None,
        }
    }

    /// Whether this element is an image slot (real or placeholder).
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            Element::ImageBlock { .. } | Element::ImagePlaceholder { .. }
        )
    }

    /// Whether this element is pipeline-internal and must not survive the
    /// merge passes. Finding one at the handoff boundary is a defect.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Element::CaptionText { .. }
                | Element::BulletItem { .. }
                | Element::ConclusionLine { .. }
                | Element::QaQuestion { .. }
                | Element::QaAnswer { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags_are_stable() {
        let cases = [
            (Element::body("x"), "body"),
            (
                Element::Heading1 {
                    num: "1".into(),
                    text: "Intro".into(),
                },
                "h1",
            ),
            (Element::callout(CalloutKind::Tip, "save often"), "tip"),
            (Element::hr(), "hr"),
            (Element::spacer(), "empty"),
            (
                Element::QAndA {
                    question: "q".into(),
                    answers: vec!["a".into()],
                },
                "qa",
            ),
        ];
        for (el, tag) in cases {
            let json = serde_json::to_value(&el).unwrap();
            assert_eq!(json["type"], tag);
        }
    }

    #[test]
    fn test_internal_variants_flagged() {
        assert!(Element::CaptionText { text: "c".into() }.is_internal());
        assert!(Element::BulletItem { text: "b".into() }.is_internal());
        assert!(Element::QaAnswer { text: "a".into() }.is_internal());
        assert!(!Element::body("b").is_internal());
        assert!(!Element::hr().is_internal());
    }

    #[test]
    fn test_callout_constructor_round_trips_kind() {
        for kind in [CalloutKind::Insight, CalloutKind::Tip, CalloutKind::Warning] {
            let el = Element::callout(kind, "text");
            assert_eq!(el.callout_kind(), Some(kind));
        }
    }

    #[test]
    fn test_deserialize_defaults() {
        let el: Element = serde_json::from_str(r#"{"type":"hr"}"#).unwrap();
        assert_eq!(el, Element::HorizontalRule { size: 4 });

        let el: Element = serde_json::from_str(r#"{"type":"body","text":"t"}"#).unwrap();
        assert_eq!(
            el,
            Element::BodyText {
                text: "t".into(),
                indent: 0
            }
        );
    }
}

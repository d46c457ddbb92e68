//! Heuristic paragraph classification
//!
//! Documents without explicit block tags are classified paragraph by
//! paragraph through a strict precedence chain, first match wins:
//!
//! 1. embedded drawing        -> image / placeholder
//! 2. empty text              -> dropped
//! 3. custom semantic style   -> mapped 1:1
//! 4. standard heading style  -> heading 1-3
//! 5. list paragraph          -> bullet fragment
//! 6. font-size thresholds    -> heading 1-3
//! 7. all-bold short line     -> heading 3
//! 8. deep left indent        -> quote
//! 9. default                 -> body text
//!
//! Explicit author intent (styles) always outranks inferred signals, and
//! structural signals outrank typographic ones: font sizes are routinely
//! abused for emphasis rather than hierarchy. The chain is an ordered rule
//! table so the precedence is auditable and each rule testable on its own.
//!
//! The thresholds of tiers 6-8 are configuration, not constants: the stock
//! values come from the original calibration and may well be wrong for
//! non-Latin scripts or unusual templates.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use restyle_model::{AssetMap, CalloutKind, Element};
use serde::{Deserialize, Serialize};

use crate::document::{Paragraph, Table};
use crate::styles::StyleSheet;

/// Tunable thresholds for the typographic tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum font size in points read as a level-1 heading
    pub h1_min_pt: f32,
    /// Minimum font size in points read as a level-2 heading
    pub h2_min_pt: f32,
    /// Minimum font size in points read as a level-3 heading
    pub h3_min_pt: f32,
    /// Maximum character count for the all-bold heading guess
    pub bold_heading_max_chars: usize,
    /// Left indent in twips read as a quote (720 = 0.5")
    pub quote_indent_twips: i64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            h1_min_pt: 28.0,
            h2_min_pt: 24.0,
            h3_min_pt: 20.0,
            bold_heading_max_chars: 60,
            quote_indent_twips: 720,
        }
    }
}

/// Semantic role of a custom paragraph style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleRole {
    ChapterTitle,
    Insight,
    Tip,
    Warning,
    Quote,
    QaQuestion,
    QaAnswer,
    Prompt,
    Conclusion,
    Caption,
}

/// Registry of author-applied semantic style names.
///
/// Matching is case-insensitive on the style's display name. The default
/// table registers the `rs-*` family shipped with the editor's templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleMap {
    map: HashMap<String, StyleRole>,
}

impl Default for StyleMap {
    fn default() -> Self {
        let mut map = HashMap::new();
        map.insert("rs-chaptertitle".into(), StyleRole::ChapterTitle);
        map.insert("rs-insight".into(), StyleRole::Insight);
        map.insert("rs-tip".into(), StyleRole::Tip);
        map.insert("rs-warning".into(), StyleRole::Warning);
        map.insert("rs-quote".into(), StyleRole::Quote);
        map.insert("rs-qa-question".into(), StyleRole::QaQuestion);
        map.insert("rs-qa-answer".into(), StyleRole::QaAnswer);
        map.insert("rs-prompt".into(), StyleRole::Prompt);
        map.insert("rs-conclusion".into(), StyleRole::Conclusion);
        map.insert("rs-caption".into(), StyleRole::Caption);
        Self { map }
    }
}

impl StyleMap {
    /// An empty registry (style tier never matches).
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Register a style name for a role.
    pub fn register(&mut self, name: impl Into<String>, role: StyleRole) {
        self.map.insert(name.into().to_lowercase(), role);
    }

    /// Look up the role for a style name.
    pub fn role(&self, style_name: &str) -> Option<StyleRole> {
        self.map.get(&style_name.to_lowercase()).copied()
    }
}

impl From<HashMap<String, StyleRole>> for StyleMap {
    fn from(map: HashMap<String, StyleRole>) -> Self {
        let map = map
            .into_iter()
            .map(|(name, role)| (name.to_lowercase(), role))
            .collect();
        Self { map }
    }
}

/// Classification signals snapshotted from one paragraph.
#[derive(Debug, Clone, Default)]
pub struct ParaFacts {
    /// Lowercased display name of the paragraph style
    pub style_name: String,
    /// Whitespace-normalized text
    pub text: String,
    /// Largest run font size in points
    pub size_pt: f32,
    /// Whether every text run is bold
    pub all_bold: bool,
    /// Left indent in twips
    pub indent: i64,
    /// List paragraph (numbering metadata or "list" style)
    pub is_list: bool,
    /// Embedded drawing, with its relationship target resolved to a media
    /// filename where possible
    pub drawing: Option<DrawingFacts>,
}

/// Drawing signals for tier 1.
#[derive(Debug, Clone, Default)]
pub struct DrawingFacts {
    /// Media filename the drawing's relationship id points at; empty when
    /// unresolved
    pub filename: String,
    pub width_emu: i64,
    pub height_emu: i64,
}

impl ParaFacts {
    /// Snapshot the signals of a paragraph.
    ///
    /// `rel_filenames` maps relationship ids to media filenames (from the
    /// document's relationship manifest).
    pub fn gather(
        para: &Paragraph,
        sheet: &StyleSheet,
        rel_filenames: &HashMap<String, String>,
    ) -> Self {
        let style_name = para
            .style_id
            .as_deref()
            .map(|id| sheet.display_name(id).trim().to_lowercase())
            .unwrap_or_default();
        let drawing = para.drawing.as_ref().map(|d| DrawingFacts {
            filename: d
                .rel_id
                .as_deref()
                .and_then(|id| rel_filenames.get(id))
                .cloned()
                .unwrap_or_default(),
            width_emu: d.width_emu,
            height_emu: d.height_emu,
        });
        Self {
            text: para.normalized_text(),
            size_pt: para.max_font_size_pt(),
            all_bold: para.all_bold(),
            indent: para.indent_left,
            is_list: para.has_numbering || style_name.contains("list"),
            style_name,
            drawing,
        }
    }
}

/// Result of one rule.
enum Outcome {
    /// Rule matched and produced an element
    Emit(Element),
    /// Rule matched and the paragraph is dropped (e.g. empty)
    Drop,
    /// Rule did not match; try the next one
    Next,
}

type RuleFn = fn(&Classifier, &ParaFacts) -> Outcome;

/// The precedence chain. Order is the contract.
const RULES: &[(&str, RuleFn)] = &[
    ("embedded-drawing", rule_drawing),
    ("empty-paragraph", rule_empty),
    ("custom-style", rule_custom_style),
    ("heading-style", rule_heading_style),
    ("list-paragraph", rule_list),
    ("font-size", rule_font_size),
    ("bold-short-line", rule_bold_short),
    ("indent-quote", rule_indent),
    ("body-default", rule_body),
];

/// Paragraph/table classifier for one conversion session.
#[derive(Debug)]
pub struct Classifier<'a> {
    config: &'a ClassifierConfig,
    styles: &'a StyleMap,
    assets: &'a AssetMap,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a ClassifierConfig, styles: &'a StyleMap, assets: &'a AssetMap) -> Self {
        Self {
            config,
            styles,
            assets,
        }
    }

    /// Classify one paragraph; `None` means the paragraph contributes
    /// nothing. Never fails: the last rule always produces body text.
    pub fn classify_paragraph(&self, facts: &ParaFacts) -> Option<Element> {
        for (_name, rule) in RULES {
            match rule(self, facts) {
                Outcome::Emit(el) => return Some(el),
                Outcome::Drop => return None,
                Outcome::Next => continue,
            }
        }
        unreachable!("body-default always matches")
    }

    /// Classify a table. Empty tables emit nothing.
    pub fn classify_table(&self, table: &Table) -> Option<Element> {
        if table.is_empty() {
            return None;
        }
        let mut rows = table.rows.clone();
        let header = rows.remove(0);
        if table.column_count() <= 2 {
            Some(Element::TableTwoCol {
                col1: header.first().cloned().unwrap_or_default(),
                col2: header.get(1).cloned().unwrap_or_default(),
                rows,
            })
        } else {
            Some(Element::TableWide {
                headers: header,
                rows,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Rules, in precedence order
// ---------------------------------------------------------------------------

fn rule_drawing(cl: &Classifier, facts: &ParaFacts) -> Outcome {
    let Some(drawing) = &facts.drawing else {
        return Outcome::Next;
    };
    match cl.assets.get(&drawing.filename) {
        Some(asset) => Outcome::Emit(Element::ImageBlock {
            filename: drawing.filename.clone(),
            local_path: asset.local_path.to_string_lossy().into_owned(),
            width_emu: drawing.width_emu,
            height_emu: drawing.height_emu,
            // Text sharing the paragraph doubles as the caption.
            caption: facts.text.clone(),
        }),
        None => {
            let text = if facts.text.is_empty() {
                "image".to_string()
            } else {
                facts.text.clone()
            };
            Outcome::Emit(Element::ImagePlaceholder { text })
        }
    }
}

fn rule_empty(_cl: &Classifier, facts: &ParaFacts) -> Outcome {
    if facts.text.is_empty() {
        Outcome::Drop
    } else {
        Outcome::Next
    }
}

fn rule_custom_style(cl: &Classifier, facts: &ParaFacts) -> Outcome {
    let Some(role) = cl.styles.role(&facts.style_name) else {
        return Outcome::Next;
    };
    let text = facts.text.clone();
    Outcome::Emit(match role {
        StyleRole::ChapterTitle => Element::ChapterTitle {
            text,
            sub: String::new(),
            phase: String::new(),
        },
        StyleRole::Insight => Element::callout(CalloutKind::Insight, text),
        StyleRole::Tip => Element::callout(CalloutKind::Tip, text),
        StyleRole::Warning => Element::callout(CalloutKind::Warning, text),
        StyleRole::Quote => Element::QuoteBlock { text },
        StyleRole::QaQuestion => Element::QaQuestion { text },
        StyleRole::QaAnswer => Element::QaAnswer { text },
        StyleRole::Prompt => {
            let (label, body) = split_prompt_label(&text);
            Element::PromptBlock { label, text: body }
        }
        StyleRole::Conclusion => Element::ConclusionLine { text },
        StyleRole::Caption => Element::CaptionText { text },
    })
}

fn rule_heading_style(_cl: &Classifier, facts: &ParaFacts) -> Outcome {
    let style = facts.style_name.as_str();
    let text = facts.text.clone();
    if style.contains("heading 1") || style == "heading1" {
        return Outcome::Emit(Element::Heading1 {
            num: String::new(),
            text,
        });
    }
    if style.contains("heading 2") || style == "heading2" {
        return Outcome::Emit(Element::Heading2 { text });
    }
    if style.contains("heading 3") || style == "heading3" {
        return Outcome::Emit(Element::Heading3 { text });
    }
    Outcome::Next
}

fn rule_list(_cl: &Classifier, facts: &ParaFacts) -> Outcome {
    if facts.is_list {
        Outcome::Emit(Element::BulletItem {
            text: facts.text.clone(),
        })
    } else {
        Outcome::Next
    }
}

fn rule_font_size(cl: &Classifier, facts: &ParaFacts) -> Outcome {
    let text = facts.text.clone();
    if facts.size_pt >= cl.config.h1_min_pt {
        return Outcome::Emit(Element::Heading1 {
            num: String::new(),
            text,
        });
    }
    if facts.size_pt >= cl.config.h2_min_pt {
        return Outcome::Emit(Element::Heading2 { text });
    }
    if facts.size_pt >= cl.config.h3_min_pt {
        return Outcome::Emit(Element::Heading3 { text });
    }
    Outcome::Next
}

fn rule_bold_short(cl: &Classifier, facts: &ParaFacts) -> Outcome {
    if facts.all_bold && facts.text.chars().count() <= cl.config.bold_heading_max_chars {
        Outcome::Emit(Element::Heading3 {
            text: facts.text.clone(),
        })
    } else {
        Outcome::Next
    }
}

fn rule_indent(cl: &Classifier, facts: &ParaFacts) -> Outcome {
    if facts.indent >= cl.config.quote_indent_twips {
        Outcome::Emit(Element::QuoteBlock {
            text: facts.text.clone(),
        })
    } else {
        Outcome::Next
    }
}

fn rule_body(_cl: &Classifier, facts: &ParaFacts) -> Outcome {
    Outcome::Emit(Element::BodyText {
        text: facts.text.clone(),
        indent: facts.indent,
    })
}

/// Split an inline `label: body` prefix off a prompt paragraph.
fn split_prompt_label(text: &str) -> (String, String) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(.{1,30})[:：]\s*(.+)$").unwrap());
    match re.captures(text) {
        Some(cap) => (cap[1].trim().to_string(), cap[2].trim().to_string()),
        None => (String::new(), text.to_string()),
    }
}

//! Merge pipeline
//!
//! Classification (and the tagged-text parser's fail-open path) emit
//! low-level run fragments: single bullet paragraphs, single conclusion
//! lines, question/answer paragraphs, captions trailing an image. The
//! passes here coalesce those runs into their semantic block elements.
//!
//! Pipeline order is fixed: qa -> bullets -> conclusion -> caption
//! absorption -> label absorption. Every pass is idempotent, so the whole
//! pipeline can safely be re-run on already-merged output.

use regex::Regex;
use restyle_model::Element;
use std::sync::OnceLock;

/// Run all merge passes in pipeline order.
pub fn run_pipeline(elements: Vec<Element>) -> Vec<Element> {
    let elements = merge_qa_runs(elements);
    let elements = merge_bullet_runs(elements);
    let elements = merge_conclusion_runs(elements);
    let elements = absorb_captions(elements);
    absorb_prompt_labels(elements)
}

/// Coalesce question/answer fragments into `QAndA` blocks.
///
/// A `QaQuestion` starts a new block; `QaAnswer` fragments append to the
/// block immediately before them. An answer with no preceding block starts
/// one with an empty question.
pub fn merge_qa_runs(elements: Vec<Element>) -> Vec<Element> {
    let mut merged: Vec<Element> = Vec::with_capacity(elements.len());
    for el in elements {
        match el {
            Element::QaQuestion { text } => {
                merged.push(Element::QAndA {
                    question: text,
                    answers: Vec::new(),
                });
            }
            Element::QaAnswer { text } => match merged.last_mut() {
                Some(Element::QAndA { answers, .. }) => answers.push(text),
                _ => merged.push(Element::QAndA {
                    question: String::new(),
                    answers: vec![text],
                }),
            },
            other => merged.push(other),
        }
    }
    merged
}

/// Collapse consecutive `BulletItem` fragments into one `BulletList`.
pub fn merge_bullet_runs(elements: Vec<Element>) -> Vec<Element> {
    let mut merged: Vec<Element> = Vec::with_capacity(elements.len());
    let mut items: Vec<String> = Vec::new();
    for el in elements {
        match el {
            Element::BulletItem { text } => items.push(text),
            other => {
                if !items.is_empty() {
                    merged.push(Element::BulletList {
                        items: std::mem::take(&mut items),
                    });
                }
                merged.push(other);
            }
        }
    }
    if !items.is_empty() {
        merged.push(Element::BulletList { items });
    }
    merged
}

/// Collapse consecutive `ConclusionLine` fragments into one
/// `ConclusionBlock`.
pub fn merge_conclusion_runs(elements: Vec<Element>) -> Vec<Element> {
    let mut merged: Vec<Element> = Vec::with_capacity(elements.len());
    let mut lines: Vec<String> = Vec::new();
    for el in elements {
        match el {
            Element::ConclusionLine { text } => lines.push(text),
            other => {
                if !lines.is_empty() {
                    merged.push(Element::ConclusionBlock {
                        lines: std::mem::take(&mut lines),
                    });
                }
                merged.push(other);
            }
        }
    }
    if !lines.is_empty() {
        merged.push(Element::ConclusionBlock { lines });
    }
    merged
}

/// Absorb a `CaptionText` into the image element directly before it.
///
/// Applies at most once per image. A caption with no image in front of it
/// has nothing to attach to and degrades to plain body text.
pub fn absorb_captions(elements: Vec<Element>) -> Vec<Element> {
    let mut merged: Vec<Element> = Vec::with_capacity(elements.len());
    let mut iter = elements.into_iter().peekable();
    while let Some(el) = iter.next() {
        let was_image = el.is_image();
        let el = match el {
            Element::CaptionText { text } => Element::body(text),
            other => other,
        };
        merged.push(el);
        if was_image {
            if matches!(iter.peek(), Some(Element::CaptionText { .. })) {
                let Some(Element::CaptionText { text }) = iter.next() else {
                    unreachable!()
                };
                match merged.last_mut() {
                    Some(Element::ImageBlock { caption, .. }) => *caption = text,
                    Some(Element::ImagePlaceholder { text: slot }) => *slot = text,
                    _ => unreachable!(),
                }
            }
        }
    }
    merged
}

fn label_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A short "label:" line with nothing after the colon; full-width colon
    // accepted for CJK sources.
    RE.get_or_init(|| Regex::new(r"^(.{1,30})[:：]\s*$").unwrap())
}

/// Move a bare `label:` body paragraph into the label of the `PromptBlock`
/// that follows it.
pub fn absorb_prompt_labels(elements: Vec<Element>) -> Vec<Element> {
    let mut merged: Vec<Element> = Vec::with_capacity(elements.len());
    for el in elements {
        if let Element::PromptBlock { label, .. } = &el {
            if label.is_empty() {
                if let Some(Element::BodyText { text, .. }) = merged.last() {
                    if let Some(cap) = label_line_re().captures(text) {
                        let label = cap[1].trim().to_string();
                        merged.pop();
                        let Element::PromptBlock { text, .. } = el else {
                            unreachable!()
                        };
                        merged.push(Element::PromptBlock { label, text });
                        continue;
                    }
                }
            }
        }
        merged.push(el);
    }
    merged
}

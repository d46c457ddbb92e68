//! Tagged-text parser
//!
//! Parses the block-tagged structured-text dialect into the canonical
//! element sequence with full fidelity (no heuristics). The dialect:
//!
//! ```text
//! ---
//! title: My Book
//! author: A. Writer
//! chapter: [Phase 2]
//! sub: Getting unstuck
//! ---
//!
//! [chapter_title]
//!
//! # 1. First Section
//!
//! Body paragraph.
//!
//! - bullet one
//! - bullet two
//!
//! [tip]
//! Remember to save often.
//!
//! [image | A caption]
//! image1.png
//! ```
//!
//! A block boundary is a standalone `[tag]` / `[tag | param | ...]` line, a
//! `#`/`##`/`###` heading line, a lone rule line (`---` / `***`), or end of
//! input; everything between boundaries belongs to the preceding block.
//!
//! The parser never aborts on unexpected content: unknown tags and
//! malformed block bodies degrade to plain body text. Only a missing
//! source file or a malformed front-matter block is an error, since those
//! indicate the caller handed over the wrong artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use restyle_model::{Asset, AssetMap, DocumentMeta, Element, ParsedDocument};
use thiserror::Error;

use crate::merge::run_pipeline;

/// Front-matter delimiter line.
const FRONT_MATTER_SENTINEL: &str = "---";

/// Errors from the tagged-text parser.
///
/// Everything else is recovered by degrading to body text.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The source file does not exist
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    /// Error reading the source file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A front-matter line is not a `key: value` pair
    #[error("malformed front-matter at line {line}")]
    MalformedFrontMatter { line: usize },

    /// The front-matter block was opened but never closed
    #[error("front-matter block not terminated by `{FRONT_MATTER_SENTINEL}`")]
    UnterminatedFrontMatter,
}

/// Options for a tagged-text parse.
#[derive(Debug, Clone, Default)]
pub struct TaggedTextOptions {
    /// Directory resolved against `[image]` filenames. `parse_file`
    /// defaults this to `<source dir>/assets`.
    pub asset_dir: Option<PathBuf>,
    /// Force the chapter label regardless of front-matter.
    pub chapter_override: Option<String>,
}

/// Parse a tagged-text file into a [`ParsedDocument`].
pub fn parse_file(
    path: impl AsRef<Path>,
    options: &TaggedTextOptions,
) -> Result<ParsedDocument, ParseError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ParseError::SourceNotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;

    let mut options = options.clone();
    if options.asset_dir.is_none() {
        options.asset_dir = path.parent().map(|dir| dir.join("assets"));
    }
    parse_str(&text, &options)
}

/// Parse tagged-text source into a [`ParsedDocument`].
///
/// Re-parsing identical input yields an identical element sequence.
pub fn parse_str(text: &str, options: &TaggedTextOptions) -> Result<ParsedDocument, ParseError> {
    Parser::new(options).parse(text)
}

/// A tagged block being accumulated.
#[derive(Debug)]
struct TagBlock {
    tag: String,
    params: Vec<String>,
    lines: Vec<String>,
}

struct Parser {
    meta: DocumentMeta,
    elements: Vec<Element>,
    assets: AssetMap,
    asset_dir: Option<PathBuf>,
    chapter_override: Option<String>,
    pending_bullets: Vec<String>,
    block: Option<TagBlock>,
    asset_seq: usize,
}

impl Parser {
    fn new(options: &TaggedTextOptions) -> Self {
        Self {
            meta: DocumentMeta::default(),
            elements: Vec::new(),
            assets: AssetMap::new(),
            asset_dir: options.asset_dir.clone(),
            chapter_override: options.chapter_override.clone(),
            pending_bullets: Vec::new(),
            block: None,
            asset_seq: 0,
        }
    }

    fn parse(mut self, text: &str) -> Result<ParsedDocument, ParseError> {
        let text = text.replace("\r\n", "\n");
        let lines: Vec<&str> = text.lines().collect();

        let body_start = self.parse_front_matter(&lines)?;
        for line in &lines[body_start..] {
            self.process_line(line);
        }
        self.flush_block();
        self.flush_bullets();

        if let Some(chapter) = self.chapter_override.take() {
            self.meta.chapter = chapter;
        }

        Ok(ParsedDocument {
            meta: self.meta,
            elements: run_pipeline(self.elements),
            assets: self.assets,
            asset_base_dir: self.asset_dir.unwrap_or_default(),
        })
    }

    /// Consume an optional leading front-matter block; returns the index of
    /// the first body line.
    fn parse_front_matter(&mut self, lines: &[&str]) -> Result<usize, ParseError> {
        if lines.first().map(|l| l.trim()) != Some(FRONT_MATTER_SENTINEL) {
            return Ok(0);
        }
        for (i, line) in lines.iter().enumerate().skip(1) {
            let line = line.trim();
            if line == FRONT_MATTER_SENTINEL {
                return Ok(i + 1);
            }
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(ParseError::MalformedFrontMatter { line: i + 1 });
            };
            let value = value.trim();
            match key.trim().to_lowercase().as_str() {
                "title" => self.meta.title = value.to_string(),
                "author" => self.meta.author = value.to_string(),
                "chapter" => self.meta.chapter = value.to_string(),
                "sub" => self.meta.sub = value.to_string(),
                other => log::debug!("ignoring unknown front-matter key `{other}`"),
            }
        }
        Err(ParseError::UnterminatedFrontMatter)
    }

    fn process_line(&mut self, line: &str) {
        if let Some((tag, params)) = parse_tag_line(line) {
            self.flush_block();
            self.flush_bullets();
            // hr and empty take no body; emit them right away so following
            // lines read as un-tagged body text.
            match tag.as_str() {
                "hr" => self.elements.push(Element::hr()),
                "empty" => self.elements.push(Element::spacer()),
                _ => {
                    self.block = Some(TagBlock {
                        tag,
                        params,
                        lines: Vec::new(),
                    });
                }
            }
            return;
        }

        if let Some((level, text)) = parse_heading_line(line) {
            self.flush_block();
            self.flush_bullets();
            self.push_heading(level, text);
            return;
        }

        if is_rule_line(line) {
            self.flush_block();
            self.flush_bullets();
            self.elements.push(Element::hr());
            return;
        }

        // Inside a tagged block everything up to the next boundary belongs
        // to the block.
        if let Some(block) = &mut self.block {
            block.lines.push(line.to_string());
            return;
        }

        // Un-tagged body: buffer bullets, emit everything else directly.
        if let Some(item) = parse_bullet_line(line) {
            self.pending_bullets.push(item.to_string());
            return;
        }
        self.flush_bullets();
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            self.elements.push(Element::body(trimmed));
        }
    }

    fn push_heading(&mut self, level: usize, text: &str) {
        match level {
            1 => {
                // "N. Title" splits into number and title.
                if let Some(cap) = h1_number_re().captures(text) {
                    self.elements.push(Element::Heading1 {
                        num: cap[1].to_string(),
                        text: cap[2].trim().to_string(),
                    });
                } else {
                    self.elements.push(Element::Heading1 {
                        num: String::new(),
                        text: text.to_string(),
                    });
                }
            }
            2 => self.elements.push(Element::Heading2 {
                text: text.to_string(),
            }),
            _ => self.elements.push(Element::Heading3 {
                text: text.to_string(),
            }),
        }
    }

    fn flush_bullets(&mut self) {
        if !self.pending_bullets.is_empty() {
            self.elements.push(Element::BulletList {
                items: std::mem::take(&mut self.pending_bullets),
            });
        }
    }

    fn flush_block(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };
        let body_lines: Vec<&str> = block
            .lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        let body_text = body_lines.join(" ");
        let param = |i: usize| block.params.get(i).cloned().unwrap_or_default();

        match block.tag.as_str() {
            "chapter_title" => {
                let mut text = self.meta.title.clone();
                let mut phase = self.meta.chapter.clone();
                let mut sub = self.meta.sub.clone();
                if let Some(first) = body_lines.first() {
                    if first.contains('|') {
                        let parts: Vec<&str> = first.split('|').map(str::trim).collect();
                        if !parts[0].is_empty() {
                            text = parts[0].to_string();
                        }
                        if parts.len() > 1 && !parts[1].is_empty() {
                            phase = parts[1].to_string();
                        }
                        if parts.len() > 2 && !parts[2].is_empty() {
                            sub = parts[2].to_string();
                        }
                    } else if text.is_empty() {
                        text = first.to_string();
                    }
                }
                if self.meta.title.is_empty() {
                    self.meta.title = text.clone();
                }
                if self.meta.chapter.is_empty() {
                    self.meta.chapter = phase.clone();
                }
                if self.meta.sub.is_empty() {
                    self.meta.sub = sub.clone();
                }
                self.elements.push(Element::ChapterTitle { text, sub, phase });
            }
            "insight" => self.elements.push(Element::Insight { text: body_text }),
            "tip" => self.elements.push(Element::Tip { text: body_text }),
            "warning" => self.elements.push(Element::Warning { text: body_text }),
            "quote" => self.elements.push(Element::QuoteBlock { text: body_text }),
            "conclusion" => {
                self.elements.push(Element::ConclusionBlock {
                    lines: body_lines.iter().map(|l| l.to_string()).collect(),
                });
            }
            "qa" => {
                let mut question = String::new();
                let mut answers = Vec::new();
                for line in &body_lines {
                    if let Some(q) = line.strip_prefix("Q:") {
                        question = q.trim().to_string();
                    } else if let Some(a) = line.strip_prefix("A:") {
                        answers.push(a.trim().to_string());
                    }
                }
                self.elements.push(Element::QAndA { question, answers });
            }
            "prompt" => {
                self.elements.push(Element::PromptBlock {
                    label: param(0),
                    text: body_text,
                });
            }
            "image" => self.push_image(param(0), body_lines.first().copied()),
            "table2" => {
                let rows = parse_table_rows(&body_lines, 2);
                self.elements.push(Element::TableTwoCol {
                    col1: param(0),
                    col2: param(1),
                    rows,
                });
            }
            "table3" => {
                let rows = parse_table_rows(&body_lines, 3);
                self.elements.push(Element::TableWide {
                    headers: vec![param(0), param(1), param(2)],
                    rows,
                });
            }
            unknown => {
                // Fail-open: an unrecognized tag is author input, not an
                // error. The block content stays as body text.
                log::debug!("unrecognized tag `{unknown}`, keeping block as body text");
                for line in &body_lines {
                    self.elements.push(Element::body(*line));
                }
            }
        }
    }

    fn push_image(&mut self, caption: String, filename: Option<&str>) {
        let Some(filename) = filename.filter(|f| !f.is_empty()) else {
            let text = if caption.is_empty() {
                "image".to_string()
            } else {
                caption
            };
            self.elements.push(Element::ImagePlaceholder { text });
            return;
        };

        let staged = self.asset_dir.as_ref().map(|dir| dir.join(filename));
        match staged.filter(|p| p.is_file()) {
            Some(local_path) => {
                self.asset_seq += 1;
                let asset = Asset {
                    id: Asset::logical_id(self.asset_seq),
                    filename: filename.to_string(),
                    local_path: local_path.clone(),
                    width_emu: 0,
                    height_emu: 0,
                    rel_id: String::new(),
                    ext: file_extension(filename),
                };
                self.assets.insert(filename.to_string(), asset);
                // Dimensions stay zero here; a later layout step sizes the
                // image from the binary.
                self.elements.push(Element::ImageBlock {
                    filename: filename.to_string(),
                    local_path: local_path.to_string_lossy().into_owned(),
                    width_emu: 0,
                    height_emu: 0,
                    caption,
                });
            }
            None => {
                let text = if caption.is_empty() {
                    filename.to_string()
                } else {
                    caption
                };
                self.elements.push(Element::ImagePlaceholder { text });
            }
        }
    }
}

/// `[tag]` or `[tag | param | ...]` on a line of its own.
fn parse_tag_line(line: &str) -> Option<(String, Vec<String>)> {
    let line = line.trim();
    if !line.starts_with('[') || !line.ends_with(']') || line.len() < 3 {
        return None;
    }
    let inner = &line[1..line.len() - 1];
    if inner.contains('[') || inner.contains(']') {
        return None;
    }
    let mut parts = inner.split('|').map(str::trim);
    let tag = parts.next()?.to_lowercase();
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((tag, parts.map(|p| p.to_string()).collect()))
}

/// `# ...` / `## ...` / `### ...` heading lines.
fn parse_heading_line(line: &str) -> Option<(usize, &str)> {
    let line = line.trim();
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=3).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim()))
}

/// A lone horizontal rule: three or more `-` or `*` and nothing else.
fn is_rule_line(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3
        && (line.chars().all(|c| c == '-') || line.chars().all(|c| c == '*'))
}

/// `- item` or `* item` bullet lines.
fn parse_bullet_line(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim)
}

/// Split table body lines on `|`, keeping rows with at least `width`
/// fields and truncating longer ones. Malformed rows are dropped.
fn parse_table_rows(lines: &[&str], width: usize) -> Vec<Vec<String>> {
    lines
        .iter()
        .filter_map(|line| {
            let fields: Vec<String> = line
                .split('|')
                .map(|f| f.trim().to_string())
                .take(width)
                .collect();
            (fields.len() == width).then_some(fields)
        })
        .collect()
}

fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn h1_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.\s+(.+)$").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedDocument {
        parse_str(text, &TaggedTextOptions::default()).unwrap()
    }

    #[test]
    fn test_front_matter_populates_meta() {
        let doc = parse("---\ntitle: Book\nauthor: Ann\nchapter: [Phase 2]\nsub: Subtitle\n---\nHello.\n");
        assert_eq!(doc.meta.title, "Book");
        assert_eq!(doc.meta.author, "Ann");
        assert_eq!(doc.meta.chapter, "[Phase 2]");
        assert_eq!(doc.meta.sub, "Subtitle");
        assert_eq!(doc.elements, vec![Element::body("Hello.")]);
    }

    #[test]
    fn test_unterminated_front_matter_is_an_error() {
        let err = parse_str("---\ntitle: Book\n", &TaggedTextOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedFrontMatter));
    }

    #[test]
    fn test_malformed_front_matter_is_an_error() {
        let err =
            parse_str("---\nnot a pair\n---\n", &TaggedTextOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedFrontMatter { line: 2 }
        ));
    }

    #[test]
    fn test_tip_hr_bullets_scenario() {
        let doc = parse("[tip]\nRemember to save often.\n\n[hr]\n\n- item one\n- item two");
        assert_eq!(
            doc.elements,
            vec![
                Element::Tip {
                    text: "Remember to save often.".into()
                },
                Element::hr(),
                Element::BulletList {
                    items: vec!["item one".into(), "item two".into()]
                },
            ]
        );
    }

    #[test]
    fn test_headings_and_numbered_h1() {
        let doc = parse("# 3. Setup\n## Tools\n### Editor\n");
        assert_eq!(
            doc.elements,
            vec![
                Element::Heading1 {
                    num: "3".into(),
                    text: "Setup".into()
                },
                Element::Heading2 {
                    text: "Tools".into()
                },
                Element::Heading3 {
                    text: "Editor".into()
                },
            ]
        );
    }

    #[test]
    fn test_rule_line_variants() {
        let doc = parse("---\ntitle: t\n---\nabove\n-----\nbelow\n***\n");
        assert_eq!(
            doc.elements,
            vec![
                Element::body("above"),
                Element::hr(),
                Element::body("below"),
                Element::hr(),
            ]
        );
    }

    #[test]
    fn test_qa_block_last_question_wins() {
        let doc = parse("[qa]\nQ: first?\nQ: second?\nA: one\nA: two\n");
        assert_eq!(
            doc.elements,
            vec![Element::QAndA {
                question: "second?".into(),
                answers: vec!["one".into(), "two".into()]
            }]
        );
    }

    #[test]
    fn test_prompt_block_with_label() {
        let doc = parse("[prompt | Golden prompt]\nWrite me a summary.\n");
        assert_eq!(
            doc.elements,
            vec![Element::PromptBlock {
                label: "Golden prompt".into(),
                text: "Write me a summary.".into()
            }]
        );
    }

    #[test]
    fn test_conclusion_block_lines() {
        let doc = parse("[conclusion]\nfirst takeaway\n\nsecond takeaway\n");
        assert_eq!(
            doc.elements,
            vec![Element::ConclusionBlock {
                lines: vec!["first takeaway".into(), "second takeaway".into()]
            }]
        );
    }

    #[test]
    fn test_tables_drop_malformed_rows() {
        let doc = parse("[table2 | Item | Detail]\na | b\nmalformed\nc | d | extra\n");
        assert_eq!(
            doc.elements,
            vec![Element::TableTwoCol {
                col1: "Item".into(),
                col2: "Detail".into(),
                rows: vec![
                    vec!["a".into(), "b".into()],
                    vec!["c".into(), "d".into()],
                ],
            }]
        );

        let doc = parse("[table3 | A | B | C]\n1 | 2 | 3\nshort | row\n");
        assert_eq!(
            doc.elements,
            vec![Element::TableWide {
                headers: vec!["A".into(), "B".into(), "C".into()],
                rows: vec![vec!["1".into(), "2".into(), "3".into()]],
            }]
        );
    }

    #[test]
    fn test_unknown_tag_degrades_to_body() {
        let doc = parse("[sidebar]\nsome text\nmore text\n");
        assert_eq!(
            doc.elements,
            vec![Element::body("some text"), Element::body("more text")]
        );
    }

    #[test]
    fn test_image_without_asset_dir_is_placeholder() {
        let doc = parse("[image | The chart]\nchart.png\n");
        assert_eq!(
            doc.elements,
            vec![Element::ImagePlaceholder {
                text: "The chart".into()
            }]
        );
        assert!(doc.assets.is_empty());
    }

    #[test]
    fn test_image_with_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chart.png"), b"png-bytes").unwrap();

        let options = TaggedTextOptions {
            asset_dir: Some(dir.path().to_path_buf()),
            chapter_override: None,
        };
        let doc = parse_str("[image | The chart]\nchart.png\n", &options).unwrap();

        match &doc.elements[0] {
            Element::ImageBlock {
                filename,
                width_emu,
                height_emu,
                caption,
                ..
            } => {
                assert_eq!(filename, "chart.png");
                assert_eq!((*width_emu, *height_emu), (0, 0));
                assert_eq!(caption, "The chart");
            }
            other => panic!("unexpected: {other:?}"),
        }
        let asset = doc.assets.get("chart.png").unwrap();
        assert_eq!(asset.id, "asset1");
        assert_eq!(asset.ext, "png");
        assert_eq!(doc.asset_base_dir, dir.path());
    }

    #[test]
    fn test_chapter_title_from_front_matter() {
        let doc = parse("---\ntitle: Book\nchapter: [Phase 1]\nsub: Start\n---\n[chapter_title]\n");
        assert_eq!(
            doc.elements,
            vec![Element::ChapterTitle {
                text: "Book".into(),
                sub: "Start".into(),
                phase: "[Phase 1]".into()
            }]
        );
    }

    #[test]
    fn test_chapter_title_split_overrides() {
        let doc = parse("[chapter_title]\nDeep Work | [Phase 4] | Focus routines\n");
        assert_eq!(
            doc.elements,
            vec![Element::ChapterTitle {
                text: "Deep Work".into(),
                sub: "Focus routines".into(),
                phase: "[Phase 4]".into()
            }]
        );
        assert_eq!(doc.meta.title, "Deep Work");
        assert_eq!(doc.meta.chapter, "[Phase 4]");
    }

    #[test]
    fn test_chapter_override_option() {
        let options = TaggedTextOptions {
            asset_dir: None,
            chapter_override: Some("[Phase 9]".into()),
        };
        let doc = parse_str("---\nchapter: [Phase 1]\n---\nx\n", &options).unwrap();
        assert_eq!(doc.meta.chapter, "[Phase 9]");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let input = "---\ntitle: T\n---\n# 1. One\n- a\n- b\n[warning]\ncareful\n";
        assert_eq!(parse(input), parse(input));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = parse_file("/nonexistent/draft.txt", &TaggedTextOptions::default());
        assert!(matches!(err, Err(ParseError::SourceNotFound(_))));
    }
}

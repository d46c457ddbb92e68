//! Document content parsing (word/document.xml)
//!
//! Streams the package body into paragraphs and tables, in document order,
//! capturing exactly the signals the classifier ranks: style id, run text
//! and boldness, font sizes, list numbering, left indentation and embedded
//! drawings.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{OoxmlError, Result};

/// The parsed body stream.
#[derive(Debug, Clone, Default)]
pub struct DocumentStream {
    /// Paragraphs and tables in document order
    pub blocks: Vec<Block>,
}

/// One body-level block.
#[derive(Debug, Clone)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// A body paragraph with its classification signals.
#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    /// Style id from `w:pStyle`
    pub style_id: Option<String>,
    /// Text runs in order
    pub runs: Vec<Run>,
    /// Whether the paragraph carries list numbering (`w:numPr`)
    pub has_numbering: bool,
    /// Left indentation in twips (`w:ind w:left`)
    pub indent_left: i64,
    /// Font size of the paragraph mark in half-points, when set
    pub mark_size_half_points: Option<u32>,
    /// First embedded drawing, if any
    pub drawing: Option<DrawingRef>,
}

/// A text run.
#[derive(Debug, Clone, Default)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    /// Font size in half-points (`w:sz`)
    pub size_half_points: Option<u32>,
}

/// Reference to an embedded drawing.
#[derive(Debug, Clone, Default)]
pub struct DrawingRef {
    /// Relationship id from `a:blip r:embed`
    pub rel_id: Option<String>,
    /// Extent width in EMUs, 0 when absent
    pub width_emu: i64,
    /// Extent height in EMUs, 0 when absent
    pub height_emu: i64,
}

/// A table flattened to its cell text.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Rows of trimmed cell text
    pub rows: Vec<Vec<String>>,
}

impl Paragraph {
    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Run text with whitespace collapsed and trimmed.
    pub fn normalized_text(&self) -> String {
        self.text().split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Largest font size in points across runs and the paragraph mark.
    pub fn max_font_size_pt(&self) -> f32 {
        self.runs
            .iter()
            .filter_map(|r| r.size_half_points)
            .chain(self.mark_size_half_points)
            .max()
            .map(|half| half as f32 / 2.0)
            .unwrap_or(0.0)
    }

    /// Whether every text-carrying run is bold (and there is at least one).
    pub fn all_bold(&self) -> bool {
        let mut any = false;
        for run in self.runs.iter().filter(|r| !r.text.trim().is_empty()) {
            if !run.bold {
                return false;
            }
            any = true;
        }
        any
    }
}

impl Table {
    /// Largest cell count across rows.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// Whether the table has no rows at all.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    current_row: Option<Vec<String>>,
    current_cell: Option<String>,
}

impl DocumentStream {
    /// Parse the body stream from document XML bytes.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);

        let mut blocks = Vec::new();
        let mut buf = Vec::new();

        let mut in_body = false;
        let mut in_ppr = false;
        let mut in_text = false;
        let mut current_para: Option<Paragraph> = None;
        let mut current_run: Option<Run> = None;
        let mut current_drawing: Option<DrawingRef> = None;
        let mut current_table: Option<TableBuilder> = None;

        loop {
            let event = reader.read_event_into(&mut buf);
            match event {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let is_empty = matches!(event, Ok(Event::Empty(_)));
                    let name = e.local_name();
                    match name.as_ref() {
                        b"body" => in_body = true,
                        b"p" if in_body && current_drawing.is_none() => {
                            if !is_empty {
                                current_para = Some(Paragraph::default());
                            } else {
                                // A self-closing empty paragraph still
                                // occupies a slot in the stream.
                                push_paragraph(
                                    Paragraph::default(),
                                    &mut blocks,
                                    &mut current_table,
                                );
                            }
                        }
                        b"pPr" if current_para.is_some() => in_ppr = !is_empty,
                        b"pStyle" if current_para.is_some() => {
                            if let Some(style) = get_attr(e, b"w:val") {
                                current_para.as_mut().unwrap().style_id = Some(style);
                            }
                        }
                        b"numPr" if current_para.is_some() => {
                            current_para.as_mut().unwrap().has_numbering = true;
                        }
                        b"ind" if current_para.is_some() => {
                            let left = get_attr(e, b"w:left")
                                .or_else(|| get_attr(e, b"w:start"))
                                .and_then(|v| v.parse::<i64>().ok());
                            if let Some(left) = left {
                                current_para.as_mut().unwrap().indent_left = left;
                            }
                        }
                        b"r" if current_para.is_some() && current_drawing.is_none() => {
                            if !is_empty {
                                current_run = Some(Run::default());
                            }
                        }
                        b"b" if current_run.is_some() => {
                            let off = get_attr(e, b"w:val")
                                .map(|v| v == "0" || v == "false")
                                .unwrap_or(false);
                            if !off {
                                current_run.as_mut().unwrap().bold = true;
                            }
                        }
                        b"sz" => {
                            let size = get_attr(e, b"w:val").and_then(|v| v.parse::<u32>().ok());
                            if let Some(size) = size {
                                if let Some(run) = current_run.as_mut() {
                                    run.size_half_points = Some(size);
                                } else if in_ppr {
                                    if let Some(para) = current_para.as_mut() {
                                        para.mark_size_half_points = Some(size);
                                    }
                                }
                            }
                        }
                        b"t" if current_run.is_some() => in_text = !is_empty,
                        b"drawing" if current_para.is_some() => {
                            current_drawing = Some(DrawingRef::default());
                        }
                        b"extent" if current_drawing.is_some() => {
                            let drawing = current_drawing.as_mut().unwrap();
                            if let Some(cx) =
                                get_attr(e, b"cx").and_then(|v| v.parse::<i64>().ok())
                            {
                                drawing.width_emu = cx;
                            }
                            if let Some(cy) =
                                get_attr(e, b"cy").and_then(|v| v.parse::<i64>().ok())
                            {
                                drawing.height_emu = cy;
                            }
                        }
                        b"blip" if current_drawing.is_some() => {
                            if let Some(rel_id) = get_attr(e, b"r:embed") {
                                current_drawing.as_mut().unwrap().rel_id = Some(rel_id);
                            }
                        }
                        b"tbl" if in_body && current_table.is_none() => {
                            current_table = Some(TableBuilder::default());
                        }
                        b"tr" if current_table.is_some() => {
                            current_table.as_mut().unwrap().current_row = Some(Vec::new());
                        }
                        b"tc" if current_table.is_some() => {
                            current_table.as_mut().unwrap().current_cell = Some(String::new());
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = e.local_name();
                    match name.as_ref() {
                        b"body" => in_body = false,
                        b"pPr" => in_ppr = false,
                        // DrawingML shapes nest their own a:p/a:r; those
                        // must not close the enclosing word paragraph.
                        b"p" if current_drawing.is_none() => {
                            if let Some(para) = current_para.take() {
                                push_paragraph(para, &mut blocks, &mut current_table);
                            }
                        }
                        b"t" => in_text = false,
                        b"r" if current_drawing.is_none() => {
                            if let Some(run) = current_run.take() {
                                if let Some(para) = current_para.as_mut() {
                                    para.runs.push(run);
                                }
                            }
                        }
                        b"drawing" => {
                            if let Some(drawing) = current_drawing.take() {
                                if let Some(para) = current_para.as_mut() {
                                    // First drawing in the paragraph wins.
                                    para.drawing.get_or_insert(drawing);
                                }
                            }
                        }
                        b"tc" => {
                            if let Some(table) = current_table.as_mut() {
                                if let Some(cell) = table.current_cell.take() {
                                    if let Some(row) = table.current_row.as_mut() {
                                        row.push(cell.trim().to_string());
                                    }
                                }
                            }
                        }
                        b"tr" => {
                            if let Some(table) = current_table.as_mut() {
                                if let Some(row) = table.current_row.take() {
                                    table.rows.push(row);
                                }
                            }
                        }
                        b"tbl" => {
                            if let Some(builder) = current_table.take() {
                                blocks.push(Block::Table(Table { rows: builder.rows }));
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if in_text {
                        if let Some(run) = current_run.as_mut() {
                            let text = e.unescape().unwrap_or_default();
                            run.text.push_str(&text);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(OoxmlError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { blocks })
    }
}

/// Route a finished paragraph to the open table cell or the block stream.
fn push_paragraph(para: Paragraph, blocks: &mut Vec<Block>, table: &mut Option<TableBuilder>) {
    if let Some(table) = table.as_mut() {
        if let Some(cell) = table.current_cell.as_mut() {
            let text = para.normalized_text();
            if !text.is_empty() {
                if !cell.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(&text);
            }
            return;
        }
    }
    blocks.push(Block::Paragraph(para));
}

/// Read an attribute by its qualified name.
fn get_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

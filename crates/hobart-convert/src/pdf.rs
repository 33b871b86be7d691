//! Minimal PDF writer over `lopdf`.
//!
//! Text is laid out top to bottom with the standard Type 1 fonts, so no font
//! files are embedded. Lines are wrapped to the page width and pages are
//! started automatically when the cursor reaches the bottom margin.

use crate::error::{ConvertError, Result};
use crate::text::wrap_line;
use hobart_data::CancelFlag;
use hobart_data::atomic::AtomicFile;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::path::{Path, PathBuf};

/// US Letter width in points.
pub const PAGE_WIDTH: i64 = 612;
/// US Letter height in points.
pub const PAGE_HEIGHT: i64 = 792;
/// Margin on every side, in points.
pub const MARGIN: i64 = 54;

/// Standard fonts used by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    /// Helvetica
    Regular,
    /// Helvetica-Bold
    Bold,
    /// Helvetica-Oblique
    Italic,
    /// Helvetica-BoldOblique
    BoldItalic,
    /// Courier
    Mono,
}

impl Font {
    const ALL: [Self; 5] = [
        Self::Regular,
        Self::Bold,
        Self::Italic,
        Self::BoldItalic,
        Self::Mono,
    ];

    /// Font for the given emphasis.
    pub const fn styled(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => Self::Regular,
            (true, false) => Self::Bold,
            (false, true) => Self::Italic,
            (true, true) => Self::BoldItalic,
        }
    }

    const fn resource(&self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
            Self::Italic => "F3",
            Self::BoldItalic => "F4",
            Self::Mono => "F5",
        }
    }

    const fn base_font(&self) -> &'static str {
        match self {
            Self::Regular => "Helvetica",
            Self::Bold => "Helvetica-Bold",
            Self::Italic => "Helvetica-Oblique",
            Self::BoldItalic => "Helvetica-BoldOblique",
            Self::Mono => "Courier",
        }
    }

    /// Average advance width per character, in thousandths of the font size.
    const fn avg_width(&self) -> i64 {
        match self {
            Self::Mono => 600,
            Self::Bold | Self::BoldItalic => 560,
            Self::Regular | Self::Italic => 520,
        }
    }
}

/// Horizontal alignment of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Flush left (after indent)
    #[default]
    Left,
    /// Centred between the margins
    Center,
}

/// One logical line of text before wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    /// Text content
    pub text: String,
    /// Font
    pub font: Font,
    /// Font size in points
    pub size: i64,
    /// Alignment
    pub align: Align,
    /// Left indent in points
    pub indent: i64,
}

impl TextLine {
    /// Left-aligned line in the given font and size.
    pub fn new(text: impl Into<String>, font: Font, size: i64) -> Self {
        Self {
            text: text.into(),
            font,
            size,
            align: Align::Left,
            indent: 0,
        }
    }

    /// Monospace body line.
    pub fn mono(text: impl Into<String>) -> Self {
        Self::new(text, Font::Mono, 9)
    }

    /// Set the alignment.
    pub const fn aligned(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    /// Set the left indent.
    pub const fn indented(mut self, indent: i64) -> Self {
        self.indent = indent;
        self
    }

    const fn leading(&self) -> i64 {
        self.size + self.size / 3 + 1
    }
}

/// Builds a PDF page by page.
#[derive(Debug)]
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    kids: Vec<ObjectId>,
    ops: Vec<Operation>,
    cursor: i64,
    page_has_text: bool,
}

impl PdfBuilder {
    /// Empty document.
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = Dictionary::new();
        for font in Font::ALL {
            let id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(font.resource(), id);
        }
        let resources_id = doc.add_object(dictionary! { "Font" => fonts });

        Self {
            doc,
            pages_id,
            resources_id,
            kids: Vec::new(),
            ops: Vec::new(),
            cursor: PAGE_HEIGHT - MARGIN,
            page_has_text: false,
        }
    }

    /// Pages finished so far, plus the one in progress if it has text.
    pub fn page_count(&self) -> usize {
        self.kids.len() + usize::from(self.page_has_text)
    }

    /// Append a line, wrapping it to the printable width.
    pub fn push_line(&mut self, line: &TextLine) -> Result<()> {
        let usable = PAGE_WIDTH - 2 * MARGIN - line.indent;
        let char_width = (line.font.avg_width() * line.size).max(1);
        let max_chars = ((usable * 1000) / char_width).max(1) as usize;

        for piece in wrap_line(&line.text, max_chars) {
            if self.cursor - line.leading() < MARGIN {
                self.page_break()?;
            }
            self.cursor -= line.leading();
            if piece.is_empty() {
                continue;
            }

            let width = piece.chars().count() as i64 * char_width / 1000;
            let x = match line.align {
                Align::Left => MARGIN + line.indent,
                Align::Center => MARGIN + ((PAGE_WIDTH - 2 * MARGIN - width) / 2).max(0),
            };
            self.ops.extend([
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![line.font.resource().into(), line.size.into()],
                ),
                Operation::new("Td", vec![x.into(), self.cursor.into()]),
                Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(&piece))]),
                Operation::new("ET", vec![]),
            ]);
            self.page_has_text = true;
        }
        Ok(())
    }

    /// Leave vertical space, starting a new page if it does not fit.
    pub fn space(&mut self, points: i64) -> Result<()> {
        if self.cursor - points < MARGIN {
            self.page_break()
        } else {
            self.cursor -= points;
            Ok(())
        }
    }

    /// Finish the current page. Does nothing on an empty page.
    pub fn page_break(&mut self) -> Result<()> {
        if !self.page_has_text {
            self.cursor = PAGE_HEIGHT - MARGIN;
            return Ok(());
        }
        let content = Content {
            operations: std::mem::take(&mut self.ops),
        };
        // Finished pages stay in memory until the document is saved, so they
        // are kept compressed. An uncompressed stream is still valid.
        let mut stream = Stream::new(Dictionary::new(), content.encode()?);
        let _ = stream.compress();
        let stream_id = self.doc.add_object(stream);
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => stream_id,
            "Resources" => self.resources_id,
        });
        self.kids.push(page_id);
        self.cursor = PAGE_HEIGHT - MARGIN;
        self.page_has_text = false;
        Ok(())
    }

    /// Finish the document and write it atomically to `target`.
    ///
    /// A document with no text gets a single blank page so the output is
    /// always a valid PDF.
    pub fn save(self, target: &Path) -> Result<PathBuf> {
        self.finish(target, None)
    }

    /// Like [`save`](Self::save), but leaves `target` untouched if `abort`
    /// is set before the file is renamed into place.
    pub fn save_unless_aborted(self, target: &Path, abort: &CancelFlag) -> Result<PathBuf> {
        self.finish(target, Some(abort))
    }

    fn finish(mut self, target: &Path, abort: Option<&CancelFlag>) -> Result<PathBuf> {
        self.page_break()?;
        if self.kids.is_empty() {
            self.page_has_text = true;
            self.page_break()?;
        }

        let count = self.kids.len() as i64;
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut file = AtomicFile::create(target)?;
        self.doc.save_to(&mut file)?;
        if abort.is_some_and(CancelFlag::is_cancelled) {
            return Err(ConvertError::Render("attempt abandoned".to_string()));
        }
        Ok(file.commit()?)
    }
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode text for the WinAnsi encoding of the standard fonts.
///
/// Characters outside the encoding become `?`; control characters are dropped.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|c| match c {
            ' '..='~' => Some(c as u8),
            '\u{a0}' => Some(b' '),
            '\u{a1}'..='\u{ff}' => Some(c as u32 as u8),
            '\u{20ac}' => Some(0x80),
            '\u{2026}' => Some(0x85),
            '\u{2018}' => Some(0x91),
            '\u{2019}' => Some(0x92),
            '\u{201c}' => Some(0x93),
            '\u{201d}' => Some(0x94),
            '\u{2022}' => Some(0x95),
            '\u{2013}' => Some(0x96),
            '\u{2014}' => Some(0x97),
            '\u{2122}' => Some(0x99),
            c if c.is_control() => None,
            _ => Some(b'?'),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("Caf\u{e9}"), vec![b'C', b'a', b'f', 0xe9]);
        assert_eq!(encode_win_ansi("\u{2014}\u{4e2d}\u{7}"), vec![0x97, b'?']);
    }

    #[test]
    fn test_builder_paginates() {
        let mut builder = PdfBuilder::new();
        for i in 0..200 {
            builder.push_line(&TextLine::mono(format!("line {i}"))).unwrap();
        }
        assert!(builder.page_count() > 2);
    }

    #[test]
    fn test_finished_pages_are_compressed() {
        let mut builder = PdfBuilder::new();
        for i in 0..200 {
            builder.push_line(&TextLine::mono(format!("line {i}"))).unwrap();
        }
        builder.page_break().unwrap();

        let streams: Vec<&Stream> = builder
            .doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .collect();
        assert_eq!(streams.len(), builder.page_count());
        assert!(streams.iter().all(|s| s.dict.has(b"Filter")));
    }

    #[test]
    fn test_save_writes_loadable_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");

        let mut builder = PdfBuilder::new();
        builder
            .push_line(&TextLine::new("ANNUAL REPORT", Font::Bold, 14).aligned(Align::Center))
            .unwrap();
        builder.page_break().unwrap();
        builder.push_line(&TextLine::mono("Item 1. Business")).unwrap();
        builder.save(&target).unwrap();

        let doc = Document::load(&target).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_empty_document_has_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("empty.pdf");
        PdfBuilder::new().save(&target).unwrap();
        assert_eq!(Document::load(&target).unwrap().get_pages().len(), 1);
    }
}

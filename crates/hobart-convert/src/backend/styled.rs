//! Style-aware in-process renderer.
//!
//! Walks the parsed HTML and keeps the structure a reader relies on:
//! headings, bold/italic/centred runs (from tags and inline CSS), tables,
//! lists, preformatted text and CSS page breaks. Hidden elements are dropped.
//! The whole document is held in memory, so the chain only uses this backend
//! below the configured size threshold.

use crate::error::{ConvertError, Result};
use crate::html::{FilingHeader, main_document};
use crate::pdf::{Align, Font, PdfBuilder, TextLine};
use crate::source::{SourceInfo, SourceKind, read_lossy};
use hobart_data::CancelFlag;
use scraper::{ElementRef, Html};
use std::path::{Path, PathBuf};
use tracing::debug;

const BODY_SIZE: i64 = 10;
const LIST_INDENT: i64 = 18;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Style {
    bold: bool,
    italic: bool,
    center: bool,
}

impl Style {
    fn apply(mut self, element: ElementRef<'_>) -> Self {
        let value = element.value();
        match value.name() {
            "b" | "strong" | "th" => self.bold = true,
            "i" | "em" | "cite" => self.italic = true,
            "center" => self.center = true,
            _ => {}
        }
        if value.attr("align").is_some_and(|a| a.eq_ignore_ascii_case("center")) {
            self.center = true;
        }
        if let Some(css) = value.attr("style") {
            let css = normalize_css(css);
            if css.contains("font-weight:bold") || css.contains("font-weight:700") {
                self.bold = true;
            }
            if css.contains("font-style:italic") {
                self.italic = true;
            }
            if css.contains("text-align:center") {
                self.center = true;
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Heading { level: u8, text: String, center: bool },
    Paragraph { text: String, style: Style, indent: i64 },
    Pre(String),
    Row(Vec<String>),
    Rule,
    PageBreak,
}

#[derive(Debug, Default)]
struct Collector {
    blocks: Vec<Block>,
    text: String,
    style: Option<Style>,
    indent: i64,
}

impl Collector {
    fn push_text(&mut self, text: &str, style: Style) {
        if self.style.is_none() && !text.trim().is_empty() {
            self.style = Some(style);
        }
        self.text.push_str(text);
    }

    fn flush(&mut self) {
        let text = collapse_whitespace(&self.text);
        if !text.is_empty() {
            self.blocks.push(Block::Paragraph {
                text,
                style: self.style.unwrap_or_default(),
                indent: self.indent,
            });
        }
        self.text.clear();
        self.style = None;
    }

    fn block(&mut self, block: Block) {
        self.flush();
        if block == Block::PageBreak && self.blocks.last() == Some(&Block::PageBreak) {
            return;
        }
        self.blocks.push(block);
    }
}

fn normalize_css(css: &str) -> String {
    css.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("hidden").is_some()
        || value
            .attr("style")
            .is_some_and(|css| normalize_css(css).contains("display:none"))
}

/// Pending work of the document walk.
///
/// The walk keeps its own stack so nesting depth is bounded by heap memory
/// rather than the thread stack.
enum Step<'a> {
    Text(&'a str, Style),
    Open(ElementRef<'a>, Style),
    Close(Close),
}

#[derive(Debug, Clone, Copy, Default)]
struct Close {
    flush: bool,
    unindent: bool,
    page_break: bool,
}

fn push_children<'a>(stack: &mut Vec<Step<'a>>, element: ElementRef<'a>, style: Style) {
    let children: Vec<_> = element.children().collect();
    for child in children.into_iter().rev() {
        if let Some(text) = child.value().as_text() {
            stack.push(Step::Text(text, style));
        } else if let Some(child_element) = ElementRef::wrap(child) {
            stack.push(Step::Open(child_element, style));
        }
    }
}

fn walk(root: ElementRef<'_>, out: &mut Collector) {
    let mut stack = Vec::new();
    push_children(&mut stack, root, Style::default());

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text, style) => out.push_text(text, style),
            Step::Close(close) => {
                if close.flush {
                    out.flush();
                }
                if close.unindent {
                    out.indent -= LIST_INDENT;
                }
                if close.page_break {
                    out.block(Block::PageBreak);
                }
            }
            Step::Open(element, style) => open(element, style, out, &mut stack),
        }
    }
}

/// Handle an element's start and queue its children and closing step.
fn open<'a>(element: ElementRef<'a>, style: Style, out: &mut Collector, stack: &mut Vec<Step<'a>>) {
    let name = element.value().name();
    if matches!(
        name,
        "script" | "style" | "head" | "title" | "noscript" | "iframe" | "nav" | "ix:header"
    ) || is_hidden(element)
    {
        return;
    }

    let css = element.value().attr("style").map(normalize_css);
    if css
        .as_deref()
        .is_some_and(|c| c.contains("page-break-before:always") || c.contains("break-before:page"))
    {
        out.block(Block::PageBreak);
    }
    let mut close = Close {
        page_break: css
            .as_deref()
            .is_some_and(|c| c.contains("page-break-after:always") || c.contains("break-after:page")),
        ..Close::default()
    };

    let style = style.apply(element);
    let descend = match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse().unwrap_or(6);
            let text = collapse_whitespace(&element.text().collect::<String>());
            if !text.is_empty() {
                out.block(Block::Heading {
                    level,
                    text,
                    center: style.center,
                });
            }
            false
        }
        "pre" => {
            out.block(Block::Pre(element.text().collect()));
            false
        }
        "table" => {
            out.flush();
            for row in element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "tr")
            {
                let cells: Vec<String> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| matches!(c.value().name(), "td" | "th") && !is_hidden(*c))
                    .map(|c| collapse_whitespace(&c.text().collect::<String>()))
                    .filter(|c| !c.is_empty())
                    .collect();
                if !cells.is_empty() {
                    out.block(Block::Row(cells));
                }
            }
            false
        }
        "hr" => {
            out.block(Block::Rule);
            false
        }
        "br" => {
            out.flush();
            false
        }
        "ul" | "ol" => {
            out.flush();
            out.indent += LIST_INDENT;
            close.flush = true;
            close.unindent = true;
            true
        }
        "li" => {
            out.flush();
            out.text.push_str("\u{2022} ");
            close.flush = true;
            true
        }
        "p" | "div" | "section" | "article" | "blockquote" | "tr" | "center" | "dd" | "dt" => {
            out.flush();
            close.flush = true;
            true
        }
        _ => true,
    };

    stack.push(Step::Close(close));
    if descend {
        push_children(stack, element, style);
    }
}

fn collect_blocks(html: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let body = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "body")
        .unwrap_or(root);

    let mut out = Collector::default();
    walk(body, &mut out);
    out.flush();
    out.blocks
}

fn text_blocks(content: &str) -> Vec<Block> {
    content
        .lines()
        .map(|line| {
            if line.contains('\u{c}') {
                Block::PageBreak
            } else {
                Block::Pre(line.to_string())
            }
        })
        .collect()
}

fn title_lines(header: &FilingHeader) -> Vec<TextLine> {
    let mut lines = Vec::new();
    if let Some(company) = &header.company_name {
        lines.push(TextLine::new(company.as_str(), Font::Bold, 16).aligned(Align::Center));
    }
    if let Some(form) = &header.form_type {
        lines.push(TextLine::new(form.as_str(), Font::Regular, 12).aligned(Align::Center));
    }
    let details: Vec<String> = [
        header.accession_number.as_ref().map(|a| format!("Accession {a}")),
        header.filing_date.as_ref().map(|d| format!("Filed {d}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !details.is_empty() {
        lines.push(TextLine::new(details.join("  |  "), Font::Italic, 9).aligned(Align::Center));
    }
    lines
}

fn lay_out(builder: &mut PdfBuilder, blocks: &[Block], abort: &CancelFlag) -> Result<()> {
    for (i, block) in blocks.iter().enumerate() {
        if i % 256 == 0 && abort.is_cancelled() {
            return Err(ConvertError::Render("attempt abandoned".to_string()));
        }
        match block {
            Block::Heading {
                level,
                text,
                center,
            } => {
                let size = match level {
                    1 => 15,
                    2 => 13,
                    _ => 11,
                };
                let align = if *center { Align::Center } else { Align::Left };
                builder.space(6)?;
                builder.push_line(&TextLine::new(text.as_str(), Font::Bold, size).aligned(align))?;
                builder.space(3)?;
            }
            Block::Paragraph {
                text,
                style,
                indent,
            } => {
                let align = if style.center { Align::Center } else { Align::Left };
                let line = TextLine::new(text.as_str(), Font::styled(style.bold, style.italic), BODY_SIZE)
                    .aligned(align)
                    .indented(*indent);
                builder.push_line(&line)?;
                builder.space(4)?;
            }
            Block::Pre(text) => {
                for line in text.lines() {
                    builder.push_line(&TextLine::new(line, Font::Mono, 8))?;
                }
            }
            Block::Row(cells) => {
                builder.push_line(&TextLine::new(cells.join("  |  "), Font::Regular, 9))?;
            }
            Block::Rule => builder.space(8)?,
            Block::PageBreak => builder.page_break()?,
        }
    }
    Ok(())
}

/// Render `source` to a PDF at `target`.
///
/// `abort` is checked while laying out and once more before the output is
/// renamed into place.
pub fn render_styled(source: &SourceInfo, target: &Path, abort: &CancelFlag) -> Result<PathBuf> {
    let content = read_lossy(&source.path)?;

    let (header, blocks) = match source.kind {
        SourceKind::Text => (FilingHeader::default(), text_blocks(&content)),
        SourceKind::Sgml => {
            let header = FilingHeader::from_sgml(&content);
            let main = main_document(&content, &header);
            let blocks = if main.contains('<') {
                collect_blocks(main)
            } else {
                text_blocks(main)
            };
            (header, blocks)
        }
        SourceKind::Html | SourceKind::InlineXbrl => {
            (FilingHeader::default(), collect_blocks(&content))
        }
    };
    if blocks.is_empty() {
        return Err(ConvertError::Render(format!(
            "{} has no renderable content",
            source.display_name()
        )));
    }
    debug!(path = %source.path.display(), blocks = blocks.len(), "styled layout");

    let mut builder = PdfBuilder::new();
    let title = title_lines(&header);
    if !title.is_empty() {
        for line in &title {
            builder.push_line(line)?;
        }
        builder.space(18)?;
    }
    lay_out(&mut builder, &blocks, abort)?;
    builder.save_unless_aborted(target, abort)
}

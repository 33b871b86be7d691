//! HTML extraction from SEC filings.
//!
//! Picks the main document out of an SGML submission (or takes an HTML /
//! inline XBRL file as is), removes non-content elements, unwraps inline
//! XBRL tags keeping their text, strips technical attributes, and wraps the
//! cleaned body in a standalone HTML document with a filing header.

use crate::error::{ConvertError, Result};
use crate::source::read_lossy;
use hobart_data::atomic::write_atomic;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static RE_COMPANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"COMPANY CONFORMED NAME:\s*(.+)").expect("valid company name regex")
});
static RE_ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ACCESSION NUMBER:\s*(\d{10}-\d{2}-\d{6})").expect("valid accession regex")
});
static RE_FILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FILED AS OF DATE:\s*(\d{8})").expect("valid filing date regex"));
static RE_SUBMISSION_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CONFORMED SUBMISSION TYPE:\s*(\S+)").expect("valid submission type regex")
});
static RE_HIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display\s*:\s*none").expect("valid hidden style regex")
});

/// Elements dropped together with their content.
const DROPPED: &[&str] = &[
    "script", "style", "nav", "noscript", "iframe", "head", "title", "meta", "link", "ix:header",
];

/// Void elements, serialized without a closing tag.
const VOID: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "source", "track", "wbr",
];

/// Technical attributes removed from every element.
const STRIPPED_ATTRS: &[&str] = &[
    "contextref", "name", "id", "format", "formatref", "unitref", "decimals", "scale",
];

/// Filing metadata shown in the document header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilingHeader {
    /// Company conformed name
    pub company_name: Option<String>,
    /// Submission form type
    pub form_type: Option<String>,
    /// Accession number
    pub accession_number: Option<String>,
    /// Filing date as `YYYY-MM-DD`
    pub filing_date: Option<String>,
}

impl FilingHeader {
    /// Read the SGML header block of a submission.
    pub fn from_sgml(content: &str) -> Self {
        let head = sgml_header(content);
        let capture = |re: &Regex| {
            re.captures(head)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            company_name: capture(&RE_COMPANY),
            form_type: capture(&RE_SUBMISSION_TYPE),
            accession_number: capture(&RE_ACCESSION),
            filing_date: capture(&RE_FILED).map(|d| format_sgml_date(&d)),
        }
    }

    fn is_empty(&self) -> bool {
        self.company_name.is_none()
            && self.form_type.is_none()
            && self.accession_number.is_none()
            && self.filing_date.is_none()
    }
}

fn sgml_header(content: &str) -> &str {
    match content.find("</SEC-HEADER>") {
        Some(end) => &content[..end],
        None => {
            let mut end = content.len().min(16 * 1024);
            while !content.is_char_boundary(end) {
                end -= 1;
            }
            &content[..end]
        }
    }
}

fn format_sgml_date(raw: &str) -> String {
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..])
    } else {
        raw.to_string()
    }
}

/// One `<DOCUMENT>` of an SGML submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgmlDocument<'a> {
    /// Value of the `<TYPE>` line
    pub doc_type: &'a str,
    /// Content of the `<TEXT>` section
    pub text: &'a str,
}

/// Split an SGML submission into its documents.
pub fn sgml_documents(content: &str) -> Vec<SgmlDocument<'_>> {
    let mut docs = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find("<DOCUMENT>") {
        let after = &rest[start + "<DOCUMENT>".len()..];
        let (body, next) = match after.find("</DOCUMENT>") {
            Some(end) => (&after[..end], &after[end + "</DOCUMENT>".len()..]),
            None => (after, ""),
        };

        let doc_type = body
            .find("<TYPE>")
            .map(|i| {
                body[i + "<TYPE>".len()..]
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim()
            })
            .unwrap_or_default();
        let text = body
            .find("<TEXT>")
            .map(|i| {
                let inner = &body[i + "<TEXT>".len()..];
                inner.find("</TEXT>").map_or(inner, |end| &inner[..end])
            })
            .unwrap_or(body);

        docs.push(SgmlDocument { doc_type, text });
        rest = next;
    }
    docs
}

/// The main document of a filing.
///
/// For an SGML submission this is the document whose type matches the
/// submission type, falling back to the first `<TEXT>` section containing
/// HTML. Anything else is returned unchanged.
pub fn main_document<'a>(content: &'a str, header: &FilingHeader) -> &'a str {
    let docs = sgml_documents(content);
    if docs.is_empty() {
        return content;
    }
    let by_type = header.form_type.as_deref().and_then(|form| {
        docs.iter()
            .find(|d| d.doc_type.eq_ignore_ascii_case(form))
    });
    by_type
        .or_else(|| docs.iter().find(|d| contains_html(d.text)))
        .or_else(|| docs.first())
        .map_or(content, |d| d.text)
}

fn contains_html(text: &str) -> bool {
    let head = &text.as_bytes()[..text.len().min(4096)];
    String::from_utf8_lossy(head).to_ascii_lowercase().contains("<html")
}

/// Clean parsed HTML and serialize the content of its `<body>`.
pub fn clean_body(document: &Html) -> String {
    let root = document.root_element();
    let body = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "body")
        .unwrap_or(root);

    let mut out = String::new();
    write_children(body, &mut out);
    out
}

/// Pending work of the serializer; the stack lives on the heap so deeply
/// nested markup cannot exhaust the thread stack.
enum Step<'a> {
    Text(&'a str),
    Open(ElementRef<'a>),
    Close(&'a str),
}

fn push_children<'a>(stack: &mut Vec<Step<'a>>, element: ElementRef<'a>) {
    let children: Vec<_> = element.children().collect();
    for child in children.into_iter().rev() {
        if let Some(text) = child.value().as_text() {
            stack.push(Step::Text(text));
        } else if let Some(child_element) = ElementRef::wrap(child) {
            stack.push(Step::Open(child_element));
        }
    }
}

fn write_children(root: ElementRef<'_>, out: &mut String) {
    let mut stack = Vec::new();
    push_children(&mut stack, root);

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) => escape_text(text, out),
            Step::Close(name) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Step::Open(element) => {
                let name = element.value().name();
                if DROPPED.contains(&name) || is_hidden(element) {
                    continue;
                }
                if name.starts_with("ix:") || name == "xbrl" || name == "html" || name == "body" {
                    push_children(&mut stack, element);
                    continue;
                }
                write_start_tag(element, out);
                if !VOID.contains(&name) {
                    stack.push(Step::Close(name));
                    push_children(&mut stack, element);
                }
            }
        }
    }
}

fn write_start_tag(element: ElementRef<'_>, out: &mut String) {
    out.push('<');
    out.push_str(element.value().name());
    for (attr, value) in element.value().attrs() {
        if keep_attr(attr) {
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            escape_attr(value, out);
            out.push('"');
        }
    }
    out.push('>');
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("hidden").is_some() || value.attr("style").is_some_and(|s| RE_HIDDEN.is_match(s))
}

fn keep_attr(attr: &str) -> bool {
    let attr = attr.to_ascii_lowercase();
    !(attr.starts_with("xmlns")
        || attr.starts_with("ix:")
        || attr.starts_with("xbrl")
        || attr.starts_with("xml:")
        || STRIPPED_ATTRS.contains(&attr.as_str()))
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            c => out.push(c),
        }
    }
}

/// Registrant name and document type tagged in an inline XBRL document.
fn inline_xbrl_header(document: &Html) -> FilingHeader {
    let mut header = FilingHeader::default();
    for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
        let tagged = match element.value().attr("name") {
            Some(name) if element.value().name().starts_with("ix:") => name,
            _ => continue,
        };
        let text = || {
            let value = element.text().collect::<String>().trim().to_string();
            (!value.is_empty()).then_some(value)
        };
        match tagged {
            "dei:EntityRegistrantName" if header.company_name.is_none() => {
                header.company_name = text()
            }
            "dei:DocumentType" if header.form_type.is_none() => header.form_type = text(),
            _ => {}
        }
    }
    header
}

/// Extract cleaned HTML from a filing's raw content.
///
/// # Errors
/// `ConvertError::Parse` when the source carries no markup or nothing is
/// left after cleaning.
pub fn extract_html(content: &str, file_name: &str) -> Result<String> {
    let sgml_header = FilingHeader::from_sgml(content);
    let main = main_document(content, &sgml_header);
    if !main.contains('<') || !main.contains('>') {
        return Err(ConvertError::Parse(format!(
            "{file_name} has no markup content"
        )));
    }

    let document = Html::parse_document(main);
    let body = clean_body(&document);
    let has_text = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == "body")
        && body.chars().any(|c| c.is_alphanumeric());
    if !has_text {
        return Err(ConvertError::Parse(format!(
            "{file_name} has no content after cleaning"
        )));
    }

    let header = if sgml_header.is_empty() {
        inline_xbrl_header(&document)
    } else {
        sgml_header
    };
    debug!(
        file = file_name,
        company = header.company_name.as_deref().unwrap_or(""),
        body_bytes = body.len(),
        "extracted main document"
    );
    Ok(render_page(&header, file_name, &body))
}

/// Convert a filing on disk to a standalone HTML file.
pub fn convert_to_html(source: &Path, target: &Path) -> Result<PathBuf> {
    let content = read_lossy(source)?;
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let html = extract_html(&content, &file_name)?;
    Ok(write_atomic(target, html.as_bytes())?)
}

fn render_page(header: &FilingHeader, file_name: &str, body: &str) -> String {
    let company = header.company_name.as_deref().unwrap_or("Unknown Company");
    let form = header.form_type.as_deref().unwrap_or("SEC Filing");

    let mut page = String::with_capacity(body.len() + 2048);
    page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    page.push_str("<title>");
    escape_text(&format!("{company} - {form}"), &mut page);
    page.push_str("</title>\n");
    page.push_str(STYLE);
    page.push_str("</head>\n<body>\n<div class=\"filing-header\">\n");

    page.push_str("<div class=\"company-name\">");
    escape_text(company, &mut page);
    page.push_str("</div>\n<div class=\"document-type\">");
    escape_text(form, &mut page);
    page.push_str("</div>\n<div class=\"filing-info\">\n");
    let rows = [
        ("Accession Number", header.accession_number.as_deref()),
        ("Filing Date", header.filing_date.as_deref()),
        ("Source", Some(file_name)),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            page.push_str("<div><strong>");
            page.push_str(label);
            page.push_str(":</strong> ");
            escape_text(value, &mut page);
            page.push_str("</div>\n");
        }
    }
    page.push_str("</div>\n</div>\n<div class=\"content\">\n");
    page.push_str(body);
    page.push_str("\n</div>\n</body>\n</html>\n");
    page
}

const STYLE: &str = r#"<style>
body { font-family: 'Times New Roman', serif; line-height: 1.5; max-width: 1200px; margin: 0 auto; padding: 20px; color: #333; }
.filing-header { text-align: center; border-bottom: 3px solid #2c3e50; padding: 20px; margin-bottom: 30px; background: #f8f9fa; }
.company-name { font-size: 28px; font-weight: bold; color: #2c3e50; }
.document-type { font-size: 20px; color: #7f8c8d; margin: 10px 0; }
.filing-info { font-size: 14px; color: #7f8c8d; }
.content table { border-collapse: collapse; }
@media print { .filing-header { page-break-after: avoid; } }
</style>
"#;

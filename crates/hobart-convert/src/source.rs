//! Source document inspection.

use crate::error::Result;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Bytes read from the head of a file to classify it.
const SNIFF_BYTES: usize = 64 * 1024;

/// Markup flavour of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SourceKind {
    /// Plain text with no markup
    #[display("text")]
    Text,
    /// Ordinary HTML
    #[display("html")]
    Html,
    /// Inline XBRL (HTML with `ix:` elements)
    #[display("ixbrl")]
    InlineXbrl,
    /// SEC SGML submission wrapping one or more documents
    #[display("sgml")]
    Sgml,
}

impl SourceKind {
    /// Classify a document from its leading bytes.
    pub fn sniff(head: &[u8]) -> Self {
        let text = String::from_utf8_lossy(head);
        let lower = text.to_ascii_lowercase();

        if text.contains("<SEC-DOCUMENT>")
            || text.contains("<SEC-HEADER>")
            || text.contains("<ACCEPTANCE-DATETIME>")
            || text.contains("ACCESSION NUMBER:")
        {
            Self::Sgml
        } else if lower.contains("xmlns:ix=")
            || lower.contains("<ix:nonnumeric")
            || lower.contains("<ix:nonfraction")
            || lower.contains("<ix:header")
        {
            Self::InlineXbrl
        } else if lower.contains("<html")
            || lower.contains("<!doctype html")
            || lower.contains("<body")
            || lower.contains("<div")
            || lower.contains("<table")
            || lower.contains("<p>")
        {
            Self::Html
        } else {
            Self::Text
        }
    }

    /// Whether the document carries markup that must be stripped for text output.
    pub const fn has_markup(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// A source file with its size and markup kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Path of the source
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Markup kind
    pub kind: SourceKind,
}

impl SourceInfo {
    /// Stat and sniff a source file without reading all of it.
    pub fn probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();

        let mut head = Vec::with_capacity(SNIFF_BYTES.min(size as usize));
        File::open(path)?
            .take(SNIFF_BYTES as u64)
            .read_to_end(&mut head)?;

        Ok(Self {
            path: path.to_path_buf(),
            size,
            kind: SourceKind::sniff(&head),
        })
    }

    /// File name for document titles.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Read a whole source as text, replacing invalid UTF-8.
pub fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<SEC-DOCUMENT>0000320193-23-000106.txt", SourceKind::Sgml)]
    #[case("ACCESSION NUMBER:\t\t0000320193-23-000106", SourceKind::Sgml)]
    #[case(r#"<html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL">"#, SourceKind::InlineXbrl)]
    #[case("<!DOCTYPE html><html><body>hi</body></html>", SourceKind::Html)]
    #[case("UNITED STATES SECURITIES AND EXCHANGE COMMISSION", SourceKind::Text)]
    fn test_sniff(#[case] head: &str, #[case] kind: SourceKind) {
        assert_eq!(SourceKind::sniff(head.as_bytes()), kind);
    }

    #[test]
    fn test_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.htm");
        std::fs::write(&path, "<html><body>x</body></html>").unwrap();

        let info = SourceInfo::probe(&path).unwrap();
        assert_eq!(info.size, 27);
        assert_eq!(info.kind, SourceKind::Html);
        assert_eq!(info.display_name(), "doc.htm");
    }

    #[test]
    fn test_probe_missing_file() {
        assert!(SourceInfo::probe("/definitely/not/here.txt").is_err());
    }
}

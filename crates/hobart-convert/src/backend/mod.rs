//! PDF rendering backends.
//!
//! Backends are a closed set: the chain holds them in a configured order and
//! dispatches on [`BackendKind`].

pub mod chunked;
pub mod external;
pub mod styled;

pub use chunked::render_chunked;
pub use external::ExternalRenderer;
pub use styled::render_styled;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A conversion backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process, style-aware renderer for documents below the size threshold
    #[display("styled")]
    Styled,
    /// External HTML to PDF program
    #[display("external")]
    External,
    /// Streaming renderer that handles any size
    #[display("chunked")]
    Chunked,
    /// HTML extraction (not part of the PDF chain)
    #[display("html")]
    Html,
}

impl BackendKind {
    /// Backends usable in the PDF chain, in default order.
    pub const PDF_DEFAULT_ORDER: [Self; 3] = [Self::Styled, Self::External, Self::Chunked];

    /// Whether the backend may be tried for a source of `size` bytes.
    pub const fn eligible_for(&self, size: u64, threshold: u64) -> bool {
        match self {
            Self::Styled => size < threshold,
            Self::External | Self::Chunked => true,
            Self::Html => false,
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "styled" => Ok(Self::Styled),
            "external" | "wkhtmltopdf" => Ok(Self::External),
            "chunked" => Ok(Self::Chunked),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown conversion backend: {other}")),
        }
    }
}

/// Backends to try, in order, for a source of `size` bytes.
///
/// Pure function of its inputs. Backends ineligible by size and duplicates
/// are dropped; availability is checked later, when a backend is reached.
pub fn select_backends(order: &[BackendKind], size: u64, threshold: u64) -> Vec<BackendKind> {
    let mut selected: Vec<BackendKind> = Vec::with_capacity(order.len());
    for backend in order {
        if backend.eligible_for(size, threshold) && !selected.contains(backend) {
            selected.push(*backend);
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MIB: u64 = 1024 * 1024;

    #[rstest]
    #[case(MIB, vec![BackendKind::Styled, BackendKind::External, BackendKind::Chunked])]
    #[case(10 * MIB, vec![BackendKind::External, BackendKind::Chunked])]
    #[case(15 * MIB, vec![BackendKind::External, BackendKind::Chunked])]
    fn test_select_default_order(#[case] size: u64, #[case] expected: Vec<BackendKind>) {
        assert_eq!(
            select_backends(&BackendKind::PDF_DEFAULT_ORDER, size, 10 * MIB),
            expected
        );
    }

    #[test]
    fn test_select_respects_order_and_drops_duplicates() {
        let order = [
            BackendKind::Chunked,
            BackendKind::Styled,
            BackendKind::Chunked,
            BackendKind::Html,
        ];
        assert_eq!(
            select_backends(&order, 0, 10),
            vec![BackendKind::Chunked, BackendKind::Styled]
        );
    }

    #[rstest]
    #[case("styled", BackendKind::Styled)]
    #[case("WKHTMLTOPDF", BackendKind::External)]
    #[case(" chunked ", BackendKind::Chunked)]
    fn test_parse(#[case] raw: &str, #[case] expected: BackendKind) {
        assert_eq!(raw.parse::<BackendKind>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown() {
        assert!("weasyprint".parse::<BackendKind>().is_err());
    }
}

//! In-memory registry for batch tests.

#![allow(dead_code, unreachable_pub)]

use async_trait::async_trait;
use hobart::convert::{BackendKind, ChainSettings, ConversionChain};
use hobart::data::edgar::{
    HttpResponse, RegistryClient, RegistryEndpoints, RegistrySettings, Transport,
};
use hobart::data::retry::RetryPolicy;
use hobart::data::{DownloadManager, Result};
use hobart::BatchCoordinator;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE: &str = "http://registry.test";
pub const API: &str = "http://api.registry.test";
pub const DOCS: &str = "http://registry.test/Archives/edgar";

const TICKERS: &str = r#"{
    "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."}
}"#;

const FILINGS: &[(&str, &str, &str, &str)] = &[
    ("0000320193-24-000081", "2024-08-02", "10-Q", "aapl-20240629.htm"),
    ("0000320193-24-000069", "2024-05-03", "10-Q", "aapl-20240330.htm"),
    ("0000320193-24-000006", "2024-02-02", "10-Q", "aapl-20231230.htm"),
    ("0000320193-23-000106", "2023-11-03", "10-K", "aapl-20230930.htm"),
    ("0000320193-23-000077", "2023-08-04", "10-Q", "aapl-20230701.htm"),
    ("0000320193-23-000064", "2023-05-05", "10-Q", "aapl-20230401.htm"),
    ("0000320193-22-000108", "2022-10-28", "10-K", "aapl-20220924.htm"),
];

/// Transport answering from a fixed URL map; unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    routes: HashMap<String, Vec<u8>>,
    log: Mutex<Vec<String>>,
}

impl FakeRegistry {
    /// Registry knowing AAPL and seven of its filings.
    pub fn apple() -> Self {
        Self::apple_with(None)
    }

    /// Like [`apple`](Self::apple), but the latest filing's primary
    /// document is a PDF.
    pub fn apple_with_pdf() -> Self {
        Self::apple_with(Some(("aapl-20240629.pdf", b"%PDF-1.4 original filing".as_slice())))
    }

    fn apple_with(latest: Option<(&str, &[u8])>) -> Self {
        let filings: Vec<(&str, &str, &str, &str)> = FILINGS
            .iter()
            .enumerate()
            .map(|(i, f)| match latest {
                Some((document, _)) if i == 0 => (f.0, f.1, f.2, document),
                _ => *f,
            })
            .collect();
        let mut routes = HashMap::new();
        routes.insert(
            format!("{BASE}/files/company_tickers.json"),
            TICKERS.as_bytes().to_vec(),
        );
        let column = |i: usize| -> Vec<&str> {
            filings.iter().map(|f| [f.0, f.1, f.2, f.3][i]).collect()
        };
        let submissions = serde_json::json!({
            "name": "Apple Inc.",
            "filings": {
                "recent": {
                    "accessionNumber": column(0),
                    "filingDate": column(1),
                    "reportDate": filings.iter().map(|_| "").collect::<Vec<_>>(),
                    "form": column(2),
                    "primaryDocument": column(3),
                    "size": filings.iter().map(|_| 2048_u64).collect::<Vec<_>>(),
                },
                "files": [],
            },
        });
        routes.insert(
            format!("{API}/submissions/CIK0000320193.json"),
            serde_json::to_vec(&submissions).unwrap(),
        );
        for (i, (accession, date, form, document)) in filings.iter().enumerate() {
            let body = match latest {
                Some((_, body)) if i == 0 => body.to_vec(),
                _ => format!(
                    "<html><body><h1>Apple Inc. Form {form}</h1>\
                     <p>Filed {date}. Net sales increased.</p></body></html>"
                )
                .into_bytes(),
            };
            routes.insert(
                format!(
                    "{DOCS}/data/320193/{}/{document}",
                    accession.replace('-', "")
                ),
                body,
            );
        }
        Self {
            routes,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self, needle: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.contains(needle))
            .count()
    }

    /// Body served for the primary document named `document`.
    pub fn document(&self, document: &str) -> Option<&[u8]> {
        let suffix = format!("/{document}");
        self.routes
            .iter()
            .find(|(url, _)| url.ends_with(&suffix))
            .map(|(_, body)| body.as_slice())
    }

    pub fn total(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeRegistry {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.log.lock().unwrap().push(url.to_string());
        Ok(match self.routes.get(url) {
            Some(body) => HttpResponse::ok(body.clone()),
            None => HttpResponse::with_status(404, Vec::new()),
        })
    }
}

pub fn registry_settings() -> RegistrySettings {
    let mut settings = RegistrySettings::new("Hobart Tests tests@example.com");
    settings.endpoints = RegistryEndpoints {
        base_url: BASE.to_string(),
        api_url: API.to_string(),
        documents_url: DOCS.to_string(),
    };
    settings.retry = RetryPolicy::new(1, Duration::from_millis(1));
    settings.rate_limit = Duration::from_millis(1);
    settings
}

/// Chain that never finds the external renderer.
pub fn chain() -> ConversionChain {
    ConversionChain::new(ChainSettings {
        backend_order: BackendKind::PDF_DEFAULT_ORDER.to_vec(),
        external_program: "hobart-no-such-renderer".to_string(),
        ..ChainSettings::default()
    })
    .unwrap()
}

pub fn coordinator(registry: Arc<FakeRegistry>, output_dir: &Path) -> BatchCoordinator {
    let client = RegistryClient::with_transport(registry, registry_settings()).unwrap();
    let downloads = DownloadManager::new(Arc::new(client), output_dir);
    BatchCoordinator::new(downloads, chain())
}

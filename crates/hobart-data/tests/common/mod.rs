//! In-memory registry used by the integration tests.

#![allow(dead_code, unreachable_pub)]

use async_trait::async_trait;
use hobart_data::edgar::{
    HttpResponse, RegistryClient, RegistryEndpoints, RegistrySettings, Transport,
};
use hobart_data::retry::RetryPolicy;
use hobart_data::{DataError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const BASE: &str = "http://registry.test";
pub const API: &str = "http://api.registry.test";
pub const DOCS: &str = "http://registry.test/Archives/edgar";

pub const TICKERS: &str = r#"{
    "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
    "1": {"cik_str": 789019, "ticker": "MSFT", "title": "MICROSOFT CORP"}
}"#;

/// Scripted reply for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Response(HttpResponse),
    TransportFailure(String),
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::Response(HttpResponse::ok(body))
    }

    pub fn status(status: u16) -> Self {
        Self::Response(HttpResponse::with_status(status, Vec::new()))
    }
}

/// Transport answering from a per-URL script.
///
/// Queued replies are consumed first; the sticky reply (if any) answers
/// every request after the queue is drained. Unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct FakeTransport {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    sticky: Mutex<HashMap<String, Reply>>,
    log: Mutex<Vec<(String, Instant)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: impl Into<String>, reply: Reply) -> &Self {
        self.sticky.lock().unwrap().insert(url.into(), reply);
        self
    }

    pub fn queue(&self, url: impl Into<String>, reply: Reply) -> &Self {
        self.queued
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.log.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.requests().iter().filter(|u| u.contains(needle)).count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.log
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|q| q.pop_front());
        let reply = queued.or_else(|| self.sticky.lock().unwrap().get(url).cloned());

        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::TransportFailure(msg)) => Err(DataError::Transport(msg)),
            None => Ok(HttpResponse::with_status(404, Vec::new())),
        }
    }
}

pub fn settings(retry: RetryPolicy, rate_limit: Duration) -> RegistrySettings {
    let mut settings = RegistrySettings::new("Hobart Tests tests@example.com");
    settings.endpoints = RegistryEndpoints {
        base_url: BASE.to_string(),
        api_url: API.to_string(),
        documents_url: DOCS.to_string(),
    };
    settings.retry = retry;
    settings.rate_limit = rate_limit;
    settings
}

pub fn client(transport: Arc<FakeTransport>) -> Arc<RegistryClient> {
    let settings = settings(
        RetryPolicy::new(2, Duration::from_millis(5)),
        Duration::from_millis(1),
    );
    Arc::new(RegistryClient::with_transport(transport, settings).unwrap())
}

pub fn tickers_url() -> String {
    format!("{BASE}/files/company_tickers.json")
}

pub fn submissions_url(padded_cik: &str) -> String {
    format!("{API}/submissions/CIK{padded_cik}.json")
}

pub fn page_url(name: &str) -> String {
    format!("{API}/submissions/{name}")
}

pub fn document_url(cik: &str, accession: &str, document: &str) -> String {
    format!("{DOCS}/data/{cik}/{}/{document}", accession.replace('-', ""))
}

/// One row of a columnar filings block.
#[derive(Debug, Clone)]
pub struct Row {
    pub accession: String,
    pub date: String,
    pub form: String,
    pub document: String,
}

pub fn row(accession: &str, date: &str, form: &str, document: &str) -> Row {
    Row {
        accession: accession.to_string(),
        date: date.to_string(),
        form: form.to_string(),
        document: document.to_string(),
    }
}

pub fn columns_json(rows: &[Row]) -> serde_json::Value {
    serde_json::json!({
        "accessionNumber": rows.iter().map(|r| r.accession.clone()).collect::<Vec<_>>(),
        "filingDate": rows.iter().map(|r| r.date.clone()).collect::<Vec<_>>(),
        "reportDate": rows.iter().map(|_| "").collect::<Vec<_>>(),
        "form": rows.iter().map(|r| r.form.clone()).collect::<Vec<_>>(),
        "primaryDocument": rows.iter().map(|r| r.document.clone()).collect::<Vec<_>>(),
        "size": rows.iter().map(|_| 1024_u64).collect::<Vec<_>>(),
    })
}

pub fn submissions_json(name: &str, recent: &[Row], pages: &[&str]) -> Vec<u8> {
    let files: Vec<_> = pages
        .iter()
        .map(|p| serde_json::json!({"name": p, "filingCount": 0}))
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "name": name,
        "filings": {"recent": columns_json(recent), "files": files},
    }))
    .unwrap()
}

/// Seven Apple filings: four 10-Q, two 10-K, one 8-K that is filtered out.
pub fn apple_rows() -> Vec<Row> {
    vec![
        row("0000320193-24-000081", "2024-08-02", "10-Q", "aapl-20240629.htm"),
        row("0000320193-24-000069", "2024-05-03", "10-Q", "aapl-20240330.htm"),
        row("0000320193-24-000006", "2024-02-02", "10-Q", "aapl-20231230.htm"),
        row("0000320193-23-000106", "2023-11-03", "10-K", "aapl-20230930.htm"),
        row("0000320193-23-000077", "2023-08-04", "10-Q", "aapl-20230701.htm"),
        row("0000320193-23-000064", "2023-05-05", "10-Q", "aapl-20230401.htm"),
        row("0000320193-22-000108", "2022-10-28", "10-K", "aapl-20220924.htm"),
        row("0000320193-23-000010", "2023-02-03", "8-K", "aapl-8k.htm"),
    ]
}

/// Registry with the ticker map, Apple submissions and every Apple document.
pub fn apple_registry() -> Arc<FakeTransport> {
    let transport = Arc::new(FakeTransport::new());
    transport.route(tickers_url(), Reply::ok(TICKERS));
    let rows = apple_rows();
    transport.route(
        submissions_url("0000320193"),
        Reply::ok(submissions_json("Apple Inc.", &rows, &[])),
    );
    for r in &rows {
        transport.route(
            document_url("320193", &r.accession, &r.document),
            Reply::ok(format!("<html><body>{} {}</body></html>", r.form, r.date)),
        );
    }
    transport
}

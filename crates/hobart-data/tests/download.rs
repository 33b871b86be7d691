//! Download manager scenarios against an in-memory registry.

mod common;

use common::*;
use hobart_data::edgar::FormType;
use hobart_data::{CancelFlag, DataError, DownloadManager, ErrorKind};
use std::path::Path;
use std::sync::Arc;

const FORMS: [FormType; 2] = [FormType::TenK, FormType::TenQ];

fn files_under(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_downloads_the_five_most_recent_of_seven_filings() {
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(client(apple_registry()), dir.path());

    let results = manager.download_filings("AAPL", &FORMS, 5).await.unwrap();

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.error.is_none()));
    for result in &results {
        let path = result.local_path.as_ref().unwrap();
        assert!(path.starts_with(dir.path().join("AAPL")));
        assert!(path.exists());
    }
    assert_eq!(
        results[0].local_path.as_deref().unwrap(),
        dir.path().join("AAPL").join("AAPL_2024-08-02_10-Q.htm")
    );
    let body = std::fs::read_to_string(results[3].local_path.as_ref().unwrap()).unwrap();
    assert!(body.contains("10-K 2023-11-03"));
}

#[tokio::test]
async fn test_rerunning_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(client(apple_registry()), dir.path());

    let first = manager.download_filings("aapl", &FORMS, 5).await.unwrap();
    let listing = files_under(&dir.path().join("AAPL"));
    let second = manager.download_filings("aapl", &FORMS, 5).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(files_under(&dir.path().join("AAPL")), listing);
    assert_eq!(listing.len(), 5);
    assert!(listing.iter().all(|n| !n.starts_with(".hobart-")));
}

#[tokio::test]
async fn test_failed_document_does_not_abort_the_ticker() {
    let transport = apple_registry();
    let rows = apple_rows();
    transport.route(
        document_url("320193", &rows[1].accession, &rows[1].document),
        Reply::status(404),
    );
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(client(transport), dir.path());

    let results = manager.download_filings("AAPL", &FORMS, 5).await.unwrap();

    assert_eq!(results.len(), 5);
    assert_eq!(results[1].error_kind(), Some(ErrorKind::NotFound));
    assert!(results[1].local_path.is_none());
    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 4);
}

#[tokio::test]
async fn test_write_failure_is_recorded_as_io() {
    let dir = tempfile::tempdir().unwrap();
    // A file where the ticker directory should be.
    std::fs::write(dir.path().join("AAPL"), b"in the way").unwrap();
    let manager = DownloadManager::new(client(apple_registry()), dir.path());

    let results = manager.download_filings("AAPL", &FORMS, 2).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(
        results
            .iter()
            .all(|r| r.error_kind() == Some(ErrorKind::Io))
    );
}

#[tokio::test]
async fn test_unknown_ticker_fails_the_ticker() {
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(client(apple_registry()), dir.path());

    let err = manager
        .download_filings("ZZZZNOTREAL", &FORMS, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::CikNotFound(_)));
}

#[tokio::test]
async fn test_cancelled_manager_starts_no_filings() {
    let dir = tempfile::tempdir().unwrap();
    let transport = apple_registry();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let manager =
        DownloadManager::new(client(Arc::clone(&transport)), dir.path()).with_cancel_flag(cancel);

    let results = manager.download_filings("AAPL", &FORMS, 5).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(transport.count("/Archives/"), 0);
}

#[tokio::test]
async fn test_colliding_filings_get_accession_qualified_paths() {
    let transport = Arc::new(FakeTransport::new());
    transport.route(tickers_url(), Reply::ok(TICKERS));
    let rows = vec![
        row("0000789019-24-000010", "2024-04-25", "8-K", "a.htm"),
        row("0000789019-24-000011", "2024-04-25", "8-K", "b.htm"),
    ];
    transport.route(
        submissions_url("0000789019"),
        Reply::ok(submissions_json("MICROSOFT CORP", &rows, &[])),
    );
    for r in &rows {
        transport.route(
            document_url("789019", &r.accession, &r.document),
            Reply::ok(r.document.clone()),
        );
    }
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(client(transport), dir.path());

    let results = manager
        .download_filings("MSFT", &[FormType::EightK], 5)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_ne!(results[0].local_path, results[1].local_path);
    assert_eq!(files_under(&dir.path().join("MSFT")).len(), 2);
}

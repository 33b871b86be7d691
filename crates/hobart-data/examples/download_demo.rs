//! Demo of resolving a ticker and downloading its recent filings.
//!
//! This example demonstrates how to:
//! - Resolve a ticker to its CIK through the rate-limited registry client
//! - List the latest 10-K and 10-Q filings
//! - Download the primary documents into a local directory
//!
//! Run with: cargo run -p hobart-data --example download_demo -- [TICKER] [DIR]
//!
//! The SEC asks for a contact address in the User-Agent; set
//! `HOBART_USER_AGENT` to something like `"Your Name you@example.com"`.

use hobart_data::DownloadManager;
use hobart_data::edgar::{FormType, RegistryClient, RegistrySettings};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let ticker = args.next().unwrap_or_else(|| "AAPL".to_string());
    let output_dir = args.next().unwrap_or_else(|| "data/demo".to_string());
    let user_agent = std::env::var("HOBART_USER_AGENT")
        .unwrap_or_else(|_| "Hobart Demo hobart@example.com".to_string());

    // Client with the default endpoints, rate limit and retry policy
    let client = Arc::new(RegistryClient::new(RegistrySettings::new(user_agent))?);

    println!("Resolving {ticker}...");
    let company = client.resolve_ticker(&ticker).await?;
    println!("\n{} ({}):", company.name, company.ticker);
    println!("  CIK: {}", company.cik);

    let forms = [FormType::TenK, FormType::TenQ];
    let filings = client.list_filings(&company.cik, &forms, 5).await?;
    println!("\nLatest filings ({} total):", filings.len());
    for filing in &filings {
        println!(
            "  {} {:<6} {} {}",
            filing.filing_date, filing.form_type, filing.accession_number, filing.primary_document
        );
    }

    // Download the same filings
    println!("\nDownloading into {output_dir}...");
    let manager = DownloadManager::new(client, output_dir);
    let results = manager.download_filings(&ticker, &forms, 5).await?;
    for result in &results {
        match (&result.local_path, &result.error) {
            (Some(path), _) => println!("  saved  {}", path.display()),
            (None, Some(error)) => println!("  failed {}: {}", result.filing.accession_number, error),
            (None, None) => {}
        }
    }

    Ok(())
}

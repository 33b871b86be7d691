//! Hobart CLI binary.
//!
//! Downloads SEC EDGAR filings and converts them to PDF or cleaned HTML.

mod logging;
mod progress;

use clap::{Parser, Subcommand};
use hobart::batch::collect_sources;
use hobart::config::LOCAL_CONFIG_PATH;
use hobart::convert::TargetFormat;
use hobart::data::CancelFlag;
use hobart::data::edgar::{FormType, RegistryClient};
use hobart::{
    BatchCoordinator, BatchOptions, BatchReport, Config, ConvertOptions, write_manifest,
};
use progress::CliProgress;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Download SEC filings and convert them to PDF or HTML", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./config/config.yaml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the most recent filings of one or more companies
    Download {
        /// Ticker symbols
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Root directory for downloaded filings
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Most recent filings per company
        #[arg(long)]
        max_reports: Option<usize>,

        /// Form type to fetch (repeatable, e.g. --form-type 10-K)
        #[arg(long = "form-type")]
        form_types: Vec<FormType>,

        /// Convert every downloaded filing
        #[arg(long)]
        convert: bool,

        /// Conversion output format (pdf or html)
        #[arg(long)]
        format: Option<TargetFormat>,

        /// Print a JSON run summary instead of the text one
        #[arg(long)]
        json: bool,
    },

    /// List companies known to the registry
    ListTickers {
        /// Match against ticker or company name
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of companies shown
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Convert downloaded filings (a file, or a directory walked recursively)
    Convert {
        /// File or directory
        path: PathBuf,

        /// Directory for converted files (default: next to each source)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output format (pdf or html)
        #[arg(long)]
        format: Option<TargetFormat>,
    },

    /// Create or inspect the configuration
    Config {
        /// Write a default config file
        #[arg(long, conflicts_with_all = ["show", "get"])]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Print one value by dotted key (e.g. sec.user_agent)
        #[arg(long)]
        get: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(false) => {}
        Ok(true) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Run the command; `Ok(true)` means some item failed.
async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Config {
        init,
        force,
        show,
        get,
    } = &cli.command
    {
        config_command(cli.config.as_deref(), *init, *force, *show, get.as_deref())?;
        return Ok(false);
    }

    let (config, _) = Config::discover(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    match cli.command {
        Commands::Download {
            tickers,
            output_dir,
            max_reports,
            form_types,
            convert,
            format,
            json,
        } => {
            let mut config = config;
            if let Some(dir) = output_dir {
                config.download.output_dir = dir;
            }
            if let Some(max) = max_reports {
                config.download.max_reports_per_company = max;
            }
            if !form_types.is_empty() {
                config.download.form_types = form_types;
            }
            if let Some(format) = format {
                config.conversion.output_format = format;
            }
            download(&config, &tickers, convert, json).await
        }
        Commands::ListTickers { search, limit } => {
            list_tickers(&config, search.as_deref(), limit).await?;
            Ok(false)
        }
        Commands::Convert {
            path,
            output_dir,
            format,
        } => {
            let mut config = config;
            if let Some(format) = format {
                config.conversion.output_format = format;
            }
            convert(&config, &path, output_dir).await
        }
        Commands::Config { .. } => Ok(false),
    }
}

/// Cancel `flag` on Ctrl-C; the item in progress is allowed to finish.
fn cancel_on_interrupt(flag: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current item");
            flag.cancel();
        }
    });
}

async fn download(
    config: &Config,
    tickers: &[String],
    convert: bool,
    json: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let cancel = CancelFlag::new();
    cancel_on_interrupt(cancel.clone());

    let progress = Arc::new(CliProgress::new(tickers.len(), json));
    let batch = BatchCoordinator::from_config(config)?
        .with_cancel_flag(cancel)
        .with_progress(progress.clone());

    let mut options = BatchOptions::from_config(config);
    if convert {
        options.convert = Some(ConvertOptions::from_config(config));
    }

    let report = batch.run(tickers, &options).await;
    progress.finish();

    let manifest = write_manifest(&report, &config.download.output_dir)?;
    if json {
        println!("{}", report.summary().to_json()?);
    } else {
        print_report(&report);
        println!("Manifest: {}", manifest.display());
    }
    Ok(report.has_failures())
}

async fn list_tickers(
    config: &Config,
    search: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let client = RegistryClient::new(config.registry_settings())?;
    let companies = match search {
        Some(term) => client.search(term, limit).await?,
        None => {
            let mut all = client.companies().await?;
            all.truncate(limit);
            all
        }
    };

    if companies.is_empty() {
        println!("No matching companies");
        return Ok(());
    }
    println!("{:<8} {:<12} Name", "Ticker", "CIK");
    for company in companies {
        println!("{:<8} {:<12} {}", company.ticker, company.cik, company.name);
    }
    Ok(())
}

async fn convert(
    config: &Config,
    path: &Path,
    output_dir: Option<PathBuf>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let sources = if path.is_dir() {
        collect_sources(path)?
    } else {
        vec![path.to_path_buf()]
    };
    if sources.is_empty() {
        println!("No filings found under {}", path.display());
        return Ok(false);
    }

    let cancel = CancelFlag::new();
    cancel_on_interrupt(cancel.clone());

    let progress = Arc::new(CliProgress::new(sources.len(), false));
    let batch = BatchCoordinator::from_config(config)?
        .with_cancel_flag(cancel)
        .with_progress(progress.clone());

    let mut options = ConvertOptions::from_config(config);
    options.output_dir = output_dir;

    let report = batch.convert_paths(&sources, &options).await;
    progress.finish();
    print_report(&report);
    Ok(report.has_failures())
}

fn print_report(report: &BatchReport) {
    for (ticker, result) in &report.tickers {
        match &result.error {
            Some(error) => println!("{:<8} failed: {}", ticker, error),
            None => println!(
                "{:<8} {} saved, {} failed",
                ticker,
                result.saved(),
                result.failed_count()
            ),
        }
        for failed in result.results.iter().filter(|r| !r.is_success()) {
            if let Some(error) = &failed.error {
                println!(
                    "    {} {}: {}",
                    failed.filing.form_type, failed.filing.accession_number, error
                );
            }
        }
    }

    if !report.conversions.is_empty() {
        let succeeded = report.conversions.values().filter(|o| o.succeeded()).count();
        println!(
            "Conversions: {} succeeded, {} failed",
            succeeded,
            report.conversions.len() - succeeded
        );
        for outcome in report.conversions.values() {
            match (outcome.output_path(), outcome.failure()) {
                (Some(output), _) => println!("  ✓ {}", output.display()),
                (None, Some(failure)) => {
                    println!("  ✗ {} ({})", outcome.source.display(), failure);
                    for attempt in &outcome.attempts {
                        if let Some(error) = &attempt.error {
                            println!("      {}: {}", attempt.backend, error);
                        }
                    }
                }
                (None, None) => {}
            }
        }
    }
    if report.cancelled {
        println!("Run cancelled before all items were processed");
    }
}

fn config_command(
    explicit: Option<&Path>,
    init: bool,
    force: bool,
    show: bool,
    get: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    if init {
        let path = explicit.map_or_else(|| PathBuf::from(LOCAL_CONFIG_PATH), Path::to_path_buf);
        if path.exists() && !force {
            return Err(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )
            .into());
        }
        Config::default().save(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let (config, source) = Config::discover(explicit)?;
    if let Some(key) = get {
        let value = config
            .get(key)
            .ok_or_else(|| format!("no configuration value at {key}"))?;
        print!("{}", serde_yaml::to_string(&value)?);
        return Ok(());
    }
    if show {
        match source {
            Some(path) => println!("# loaded from {}", path.display()),
            None => println!("# built-in defaults"),
        }
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }
    Err("nothing to do: pass --init, --show or --get".into())
}

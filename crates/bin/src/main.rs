//! Filings CLI binary.
//!
//! Fetches and merges balance sheets from SEC filings.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use filings::{
    BalanceSheetPipeline, BatchReport, Cik, ClassificationRules, EdgarConfig, EdgarFetcher,
    FilingError, InMemoryStore, MetadataStore, PipelineConfig, SqliteStore, StatementMatrix,
    from_csv, level_two, merge_batch, to_csv, write_parquet,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "filings")]
#[command(about = "Merge SEC balance sheets into one time series", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database for filing metadata and downloaded documents
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON file with classification rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Collapse duplicate periods and drop empty rows after merging
    #[arg(long, global = true)]
    level_two: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and merge every balance sheet of a filer from EDGAR
    Fetch {
        /// Central Index Key of the filer
        #[arg(long)]
        cik: Cik,

        /// Identifying User-Agent required by the SEC ("AppName/Version (contact@email.com)")
        #[arg(long, env = "SEC_USER_AGENT")]
        user_agent: String,

        /// Maximum downloads in flight
        #[arg(long, default_value = "10")]
        concurrency: usize,

        /// Output file (.csv or .parquet); CSV to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Merge balance sheet matrices saved as CSV, oldest first
    Merge {
        /// CSV files in filing order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file (.csv or .parquet); CSV to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Drop cached documents older than the given age
    Prune {
        /// Maximum age in days
        #[arg(long, default_value = "30")]
        days: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let rules = match &cli.rules {
        Some(path) => ClassificationRules::from_path(path)?,
        None => ClassificationRules::default(),
    };

    match cli.command {
        Commands::Fetch {
            cik,
            user_agent,
            concurrency,
            out,
        } => {
            let config = EdgarConfig::new(user_agent).with_max_in_flight(concurrency);
            let fetcher = Arc::new(EdgarFetcher::new(config)?);
            let submissions = fetcher.fetch_submissions(cik).await?;
            info!("Found {} periodic filings for CIK {}", submissions.len(), cik);

            let pipeline = BalanceSheetPipeline::new(fetcher)
                .with_store(open_store(cli.db.as_deref())?)
                .with_config(
                    PipelineConfig::default()
                        .with_rules(rules)
                        .with_level_two(cli.level_two),
                );
            let report = pipeline.merge_filings(cik, &submissions).await?;
            finish(report, out.as_deref())?;
        }
        Commands::Merge { files, out } => {
            let mut matrices = Vec::with_capacity(files.len());
            for path in &files {
                let file = File::open(path)
                    .map_err(|e| FilingError::Parse(format!("{}: {}", path.display(), e)))?;
                matrices.push(from_csv(BufReader::new(file))?);
            }

            let mut report = merge_batch(&matrices, &rules);
            if cli.level_two {
                report.merged = report
                    .merged
                    .map(|merged| level_two(&merged))
                    .transpose()?;
            }
            finish(report, out.as_deref())?;
        }
        Commands::Prune { days } => {
            let store = open_store(cli.db.as_deref())?;
            let removed = store
                .invalidate_stale(Duration::from_secs(days * 24 * 60 * 60))
                .await?;
            println!("Removed {} cached documents", removed);
        }
    }

    Ok(())
}

fn open_store(db: Option<&Path>) -> filings::Result<Arc<dyn MetadataStore>> {
    Ok(match db {
        Some(path) => Arc::new(SqliteStore::new(path)?),
        None => Arc::new(InMemoryStore::new()),
    })
}

/// Logs exclusions and writes the merged matrix.
fn finish(report: BatchReport, out: Option<&Path>) -> filings::Result<()> {
    for exclusion in &report.excluded {
        warn!("Excluded {}: {}", exclusion.accession, exclusion.reason);
    }
    info!(
        "Merged {} filings, excluded {}",
        report.included.len(),
        report.excluded.len()
    );

    let merged = report
        .merged
        .ok_or_else(|| FilingError::NotFound("No balance sheet could be merged".to_string()))?;
    write_output(&merged, out)
}

fn write_output(matrix: &StatementMatrix, out: Option<&Path>) -> filings::Result<()> {
    let Some(path) = out else {
        return to_csv(matrix, io::stdout().lock());
    };

    let is_parquet = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        write_parquet(matrix, path)?;
    } else {
        let file = File::create(path)
            .map_err(|e| FilingError::Output(format!("{}: {}", path.display(), e)))?;
        to_csv(matrix, file)?;
    }
    info!("Wrote {}", path.display());
    Ok(())
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sheetfeed_core::{header_row, ExtractionResult, PageProgress, StageError};
use sheetfeed_upload::{GoogleSheets, MemorySheets, SheetsApi};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod pipeline;
mod upload_form;
mod web;

use config::Config;
use pipeline::{Pipeline, PipelineReport};
use web::AppState;

#[derive(Parser, Debug)]
#[command(
    name = "sheetfeed",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SHEETFEED_BUILD_SHA"), ")"),
    about = "Extract bank statement PDFs into a Google Sheet"
)]
struct Cli {
    /// Config file (default: $SHEETFEED_CONFIG or ./sheetfeed.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload page (default)
    Serve {
        /// Address to listen on, overrides server.bind
        #[arg(long)]
        bind: Option<String>,
        /// Keep rows in memory instead of writing to Google Sheets
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract transactions from a PDF and print them. Nothing is uploaded.
    Extract {
        pdf: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Extract a PDF and append its rows to the configured sheet
    Process {
        pdf: PathBuf,
        /// Print the rows that would be appended instead of uploading
        #[arg(long)]
        dry_run: bool,
    },
    /// Write a default config file
    InitConfig,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config_path = config::config_path(cli.config.as_deref());
    let command = cli.command.unwrap_or(Command::Serve {
        bind: None,
        dry_run: false,
    });

    if let Command::InitConfig = command {
        return config::init_config(&config_path);
    }

    let mut cfg = config::load_config(&config_path)?;
    match command {
        Command::Serve { bind, dry_run } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            serve(cfg, dry_run).await
        }
        Command::Extract { pdf, format } => extract(cfg, &pdf, format).await,
        Command::Process { pdf, dry_run } => process(cfg, &pdf, dry_run).await,
        Command::InitConfig => Ok(()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(cfg: Config, dry_run: bool) -> Result<()> {
    let pipeline = Pipeline::new(&cfg)?;
    if dry_run {
        tracing::warn!("dry run: rows are kept in memory and discarded on exit");
        return run_server(&cfg, pipeline, MemorySheets::new()).await;
    }

    cfg.validate_for_upload()?;
    let sheets = connect(&cfg)
        .await
        .context("connecting to Google Sheets")?;
    run_server(&cfg, pipeline, sheets).await
}

async fn connect(cfg: &Config) -> Result<GoogleSheets> {
    let credential = config::load_credential(cfg, |k| std::env::var(k).ok())?;
    tracing::info!(
        account = credential.client_email().as_deref().unwrap_or("unknown"),
        "authenticating service account"
    );
    let sheets = GoogleSheets::connect(&credential)
        .await?
        .with_value_input_option(cfg.upload.value_input_option.clone());
    Ok(sheets)
}

async fn run_server<S: SheetsApi + 'static>(cfg: &Config, pipeline: Pipeline, sheets: S) -> Result<()> {
    let tab = pipeline.destination().tab.clone();
    let state = Arc::new(AppState::new(pipeline, sheets));
    let app = web::router(state, cfg.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("bind {}", cfg.server.bind))?;
    tracing::info!(addr = %cfg.server.bind, tab = %tab, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn extract(cfg: Config, pdf: &Path, format: OutputFormat) -> Result<()> {
    let pipeline = Pipeline::new(&cfg)?;
    let bytes = std::fs::read(pdf).with_context(|| format!("read {}", pdf.display()))?;

    let result = match pipeline.extract(file_name_of(pdf), bytes, show_progress).await {
        Ok(r) => r,
        Err(e) => fail(e)?,
    };

    match format {
        OutputFormat::Table => print_table(&result),
        OutputFormat::Csv => print_csv(&result)?,
        OutputFormat::Json => {
            let mut out = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &result)?;
            writeln!(out)?;
        }
    }

    for s in &result.skipped {
        eprintln!("skipped page {} line {}: {} ({})", s.page, s.line, s.text, s.reason.describe());
    }
    for w in result.warnings() {
        eprintln!("warning: {w}");
    }
    Ok(())
}

async fn process(cfg: Config, pdf: &Path, dry_run: bool) -> Result<()> {
    let pipeline = Pipeline::new(&cfg)?;
    let bytes = std::fs::read(pdf).with_context(|| format!("read {}", pdf.display()))?;
    let name = file_name_of(pdf);

    if dry_run {
        let sheets = MemorySheets::new();
        let report = match pipeline.run(&sheets, name, bytes).await {
            Ok(r) => r,
            Err(e) => fail(e)?,
        };
        let tab = &pipeline.destination().tab;
        println!("Dry run, nothing was sent. Rows for '{tab}':");
        for row in sheets.rows(tab).await {
            println!("{}", row.join(" | "));
        }
        print_report(&report, tab);
        return Ok(());
    }

    cfg.validate_for_upload()?;
    let sheets = match connect(&cfg).await {
        Ok(s) => s,
        Err(e) => fail(StageError::AuthenticationFailure {
            detail: format!("{e:#}"),
        })?,
    };
    let report = match pipeline.run(&sheets, name, bytes).await {
        Ok(r) => r,
        Err(e) => fail(e)?,
    };
    print_report(&report, &pipeline.destination().tab);
    Ok(())
}

/// Log the detail, show the user-facing message.
fn fail<T>(err: StageError) -> Result<T> {
    tracing::error!(stage = %err.stage(), kind = err.kind(), error = %err, "statement failed");
    bail!(err.user_message())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "statement.pdf".to_string())
}

fn show_progress(p: PageProgress) {
    eprint!("\rpage {}/{} ({}%)", p.page, p.total, p.percent());
    if p.page == p.total {
        eprintln!();
    }
}

fn print_table(result: &ExtractionResult) {
    println!(
        "{:<10}  {:<10}  {:<40}  {:>12}  {:>12}",
        "Date", "Value", "Description", "Amount", "Balance"
    );
    for r in &result.records {
        let desc: String = r.description.chars().take(40).collect();
        println!(
            "{:<10}  {:<10}  {:<40}  {:>12}  {:>12}",
            r.posting_date.to_string(),
            r.value_date.map(|d| d.to_string()).unwrap_or_default(),
            desc,
            r.amount.to_string(),
            r.balance.map(|b| b.to_string()).unwrap_or_default(),
        );
    }
    println!("{} transactions from {} pages", result.records.len(), result.stats.pages);
}

fn print_csv(result: &ExtractionResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    wtr.write_record(header_row())?;
    for r in &result.records {
        wtr.write_record(r.to_row())?;
    }
    wtr.flush()?;
    Ok(())
}

fn print_report(report: &PipelineReport, tab: &str) {
    println!(
        "Appended {} rows to '{}' from {} ({} pages, {} skipped)",
        report.rows_appended,
        tab,
        report.file_name,
        report.pages,
        report.skipped.len()
    );
    if report.upload.tab_created {
        println!("Created tab '{tab}'");
    }
    for w in &report.warnings {
        println!("warning: {w}");
    }
}

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use collectr::config::{ConfigFile, Minifier};
use collectr::store::build_store;
use collectr::sync::{SyncEngine, SyncPhase, SyncProgress, SyncReport};

/// Static file management for object storage.
#[derive(Parser, Debug)]
#[command(name = "collectr", version, about)]
struct Cli {
    /// Directory tree to publish
    root: Option<PathBuf>,

    /// Target bucket
    bucket: Option<String>,

    /// Config file (defaults to ./collectr.toml, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read sources from here and write minified files under ROOT
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Upload every file, ignoring remote timestamps
    #[arg(short, long)]
    force: bool,

    /// Regular expression of root-relative paths to skip (repeatable)
    #[arg(long = "ignore", value_name = "REGEX")]
    ignore: Vec<String>,

    /// Minifier command for CSS and JS, with {in_name} and {out_name}
    #[arg(long)]
    minifier: Option<String>,

    /// Show what would be minified and uploaded without doing it
    #[arg(long)]
    dry_run: bool,

    /// Maximum concurrent uploads
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "collectr=info",
        1 => "collectr=debug",
        _ => "collectr=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<ConfigFile> {
    let mut config = match ConfigFile::locate(cli.config.as_deref()) {
        Some(path) => ConfigFile::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let spec = &mut config.sync;
    if let Some(root) = &cli.root {
        spec.root_directory = root.clone();
    }
    if let Some(input) = &cli.input {
        spec.input_directory = Some(input.clone());
    }
    if let Some(minifier) = &cli.minifier {
        spec.minifier = Some(Minifier::Uniform(minifier.clone()));
    }
    if let Some(concurrency) = cli.concurrency {
        spec.concurrency = concurrency;
    }
    spec.force_update |= cli.force;
    spec.dry_run |= cli.dry_run;
    spec.ignore_patterns.extend(cli.ignore.iter().cloned());

    if let Some(bucket) = &cli.bucket {
        config.bucket = Some(bucket.clone());
    }
    Ok(config)
}

fn spawn_progress(
    mut rx: tokio::sync::mpsc::Receiver<SyncProgress>,
    hidden: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let pb = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        while let Some(progress) = rx.recv().await {
            match progress.phase {
                SyncPhase::Uploading if progress.total_files > 0 => {
                    pb.set_length(progress.total_files as u64);
                    pb.set_position(progress.files_done as u64);
                    pb.set_message(progress.current_file);
                }
                SyncPhase::Done | SyncPhase::Failed => pb.finish_and_clear(),
                phase => pb.set_message(format!("{:?}", phase)),
            }
        }
    })
}

fn print_summary(report: &SyncReport) {
    let size = humansize::format_size(report.bytes_uploaded, humansize::BINARY);
    let mode = if report.dry_run { " (dry run)".yellow().to_string() } else { String::new() };
    println!("{}{}", format!("collectr -> {}", report.bucket).bold(), mode);
    if report.bucket_created {
        println!("  {} bucket", "created".green());
    }
    println!("  minified  {}", report.minified);
    println!("  scanned   {} ({} ignored)", report.scanned, report.ignored);
    if report.dry_run {
        for key in &report.planned {
            println!("  {} {}", "would upload".cyan(), key);
        }
    } else {
        println!("  uploaded  {} ({})", report.uploaded.len().to_string().green(), size);
    }
    println!("  unchanged {}", report.skipped);
    for failure in &report.failures {
        println!("  {} {}: {}", "failed".red(), failure.key, failure.reason);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let Some(bucket) = config.bucket.clone() else {
        bail!("No bucket given; pass BUCKET or set `bucket` in the config file");
    };
    let store = build_store(&config.store).context("Failed to configure object store")?;

    let (tx, rx) = tokio::sync::mpsc::channel(256);
    let progress = spawn_progress(rx, cli.json);

    let mut engine = SyncEngine::new(config.sync, Arc::clone(&store)).with_progress(tx);
    let result = engine.update(&bucket).await;
    drop(engine);
    if let Err(e) = progress.await {
        warn!(error = %e, "progress display task failed");
    }

    let report = result.with_context(|| format!("Sync to {} failed", bucket))?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    report.into_result()?;
    Ok(())
}

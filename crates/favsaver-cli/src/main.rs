//! iPhone Favorites Saver - migrate Photos.sqlite favorites and descriptions
//! into the EXIF/XMP metadata of copied photo files.
//!
//! This binary wraps the favsaver-core engine with argument parsing, run log
//! files, the interactive conflict prompt and Ctrl-C handling.

mod cli;
mod logging;
mod prompt;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use cli::Args;
use favsaver_core::error::{EXIT_GENERAL_ERROR, EXIT_INTERRUPTED};
use favsaver_core::{
    run_migration, CancellationToken, ExifTool, JsonLinesSink, MigrationConfig, MultiSink,
    RunReport, RunStatus, ToolInfo, TracingSink,
};
use prompt::TerminalPrompt;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

fn main() {
    let args = Args::parse();
    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_GENERAL_ERROR
        }
    };
    std::process::exit(code);
}

fn run(args: &Args) -> Result<i32> {
    let started = Local::now();
    let timer = Instant::now();
    let config = args.to_config();

    let log_dir = args
        .log_dir
        .clone()
        .unwrap_or_else(logging::default_log_dir);
    let log_path = logging::init(config.verbose, &log_dir, &started);

    let tool = ExifTool::default();
    let tool_info = match tool.locate() {
        Ok(info) => info,
        Err(e) => {
            error!("{}", e);
            error!("Install exiftool from https://exiftool.org/ before running.");
            return Ok(e.exit_code());
        }
    };
    log_run_header(&config, &tool_info, log_path.as_deref());

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone())?;

    let mut sink = MultiSink::new().with(TracingSink);
    if let Some(path) = &args.audit_json {
        sink = sink.with(JsonLinesSink::create(path)?);
        info!("Audit events: {}", path.display());
    }

    let mut prompt = TerminalPrompt::stdio(cancel.clone());
    let report = match run_migration(&config, &tool, &mut prompt, &sink, &cancel) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            info!("=== Migration aborted ===");
            info!("Runtime: {:.2} seconds", timer.elapsed().as_secs_f64());
            return Ok(e.exit_code());
        }
    };
    drop(sink);

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        info!("Run report: {}", path.display());
    }

    log_run_footer(&report);
    Ok(report.exit_code())
}

/// First Ctrl-C stops after the current file; a second one exits immediately.
fn install_interrupt_handler(cancel: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        if cancel.cancel() {
            std::process::exit(EXIT_INTERRUPTED);
        }
        warn!("Interrupt received; stopping after the current file (press Ctrl-C again to exit now)");
    })
    .context("Failed to install Ctrl-C handler")
}

fn log_run_header(config: &MigrationConfig, tool: &ToolInfo, log_path: Option<&Path>) {
    let invocation: Vec<String> = std::env::args().collect();
    info!("=== Migration started ===");
    if let Some(path) = log_path {
        info!("Log file: {}", path.display());
    }
    info!("CLI invocation: {}", invocation.join(" "));
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("exiftool path: {}", tool.path.display());
    info!("exiftool version: {}", tool.version);
    info!("Database: {}", config.database_path.display());
    info!("Photo directory: {}", config.photo_root.display());
    info!(
        "Mode: {}{}",
        if config.dry_run { "dry run" } else { "write" },
        if config.keep_originals {
            ""
        } else {
            ", overwriting originals"
        }
    );
}

fn log_run_footer(report: &RunReport) {
    let stats = &report.stats;
    match report.status {
        RunStatus::Completed => info!("=== Migration finished ==="),
        RunStatus::CompletedWithFailures => warn!("=== Migration finished with errors ==="),
        RunStatus::Interrupted => warn!("=== Migration interrupted ==="),
    }
    info!(
        "Records: {} | Files: {} | Matched: {} | Missing files: {}",
        stats.records, stats.files, stats.matched, stats.unmatched_records
    );
    if report.dry_run {
        info!(
            "Would write: {} | Skipped: {} | Errors: {}",
            stats.simulated,
            stats.skipped(),
            stats.failed
        );
    } else {
        info!(
            "Processed: {} | Skipped: {} | Errors: {}",
            stats.written,
            stats.skipped(),
            stats.failed
        );
    }
    info!("Runtime: {:.2} seconds", report.elapsed_secs);
}

/// Write the run report as pretty JSON.
fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report {}", path.display()))?;
    Ok(())
}

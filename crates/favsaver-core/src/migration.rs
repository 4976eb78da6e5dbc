//! End-to-end migration run.
//!
//! Stages run strictly in order: schema resolution, record extraction, file
//! indexing, matching, then one photo at a time through conflict evaluation
//! and the write orchestrator. Fatal errors surface before any file is touched.

use crate::cancel::CancellationToken;
use crate::config::MigrationConfig;
use crate::conflict::{ConflictEvaluator, ConflictPrompt, ResolutionPolicy};
use crate::database::{open_read_only, resolve_schema, RecordExtractor};
use crate::error::{EXIT_GENERAL_ERROR, EXIT_INTERRUPTED, EXIT_SUCCESS};
use crate::events::{EventSink, MigrationEvent};
use crate::matcher::{match_records, report_matches};
use crate::orchestrator::{RunStats, WriteOrchestrator};
use crate::scan::{index_files, EligibilityRule};
use crate::tool::MetadataTool;
use crate::Result;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithFailures,
    /// Stopped between files by a cancellation request.
    Interrupted,
}

/// Final summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub stats: RunStats,
    pub dry_run: bool,
    pub elapsed_secs: f64,
}

impl RunReport {
    /// Process exit code for this report.
    ///
    /// Failures take precedence over an interrupt.
    pub fn exit_code(&self) -> i32 {
        if self.stats.has_failures() {
            EXIT_GENERAL_ERROR
        } else if self.status == RunStatus::Interrupted {
            EXIT_INTERRUPTED
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Run a complete migration.
///
/// Returns `Err` only for run-aborting conditions (invalid database, photo
/// root unreadable or empty). Per-file problems are recorded in the report.
pub fn run_migration(
    config: &MigrationConfig,
    tool: &dyn MetadataTool,
    prompt: &mut dyn ConflictPrompt,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let started = Instant::now();
    info!(
        "Starting migration from {} into {}{}",
        config.database_path.display(),
        config.photo_root.display(),
        if config.dry_run { " (dry run)" } else { "" }
    );

    let conn = open_read_only(&config.database_path)?;
    let plan = resolve_schema(&conn, &config.database_path)?;
    sink.emit(&MigrationEvent::SchemaResolved {
        variant: plan.variant,
        description_expr: plan.description_expr(),
    });

    let records = RecordExtractor::new(&conn, &plan).extract(sink)?;
    drop(conn);
    if records.is_empty() {
        warn!("No favorites or descriptions found in the database");
    }
    let duplicate_records = records.duplicates();
    let record_count = records.len();

    let index = index_files(&config.photo_root, &EligibilityRule::default(), sink)?;
    let matches = match_records(records.into_vec(), &index);
    report_matches(&matches, sink);

    let evaluator = ConflictEvaluator::default();
    let mut policy = ResolutionPolicy::default();
    let mut orchestrator = WriteOrchestrator::new(tool, sink, config.dry_run, config.keep_originals);
    let total = matches.matched.len();
    let mut interrupted = false;

    for (position, photo) in matches.matched.iter().enumerate() {
        if cancel.is_cancelled() {
            sink.emit(&MigrationEvent::Interrupted {
                processed: position,
                remaining: total - position,
            });
            interrupted = true;
            break;
        }

        debug!("[{}/{}] {}", position + 1, total, photo.file.relative_path);
        let evaluation = evaluator.evaluate(photo, tool, policy, prompt, sink);
        if evaluation.policy != policy {
            info!("Skipping all remaining conflicts");
        }
        policy = evaluation.policy;
        orchestrator.apply(photo, &evaluation.decision);
    }

    let stats = RunStats {
        records: record_count,
        duplicate_records,
        files: index.len(),
        duplicate_files: index.duplicates(),
        matched: total,
        unmatched_records: matches.unmatched_records.len(),
        unmatched_files: matches.unmatched_files.len(),
        ..orchestrator.into_stats()
    };
    let status = if interrupted {
        RunStatus::Interrupted
    } else if stats.has_failures() {
        RunStatus::CompletedWithFailures
    } else {
        RunStatus::Completed
    };

    sink.emit(&MigrationEvent::RunFinished {
        status,
        stats: stats.clone(),
    });

    Ok(RunReport {
        status,
        stats,
        dry_run: config.dry_run,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: RunStatus, failed: usize) -> RunReport {
        RunReport {
            status,
            stats: RunStats {
                failed,
                ..RunStats::default()
            },
            dry_run: false,
            elapsed_secs: 0.0,
        }
    }

    #[test]
    fn test_exit_code_success() {
        assert_eq!(report(RunStatus::Completed, 0).exit_code(), 0);
    }

    #[test]
    fn test_exit_code_failures() {
        assert_eq!(report(RunStatus::CompletedWithFailures, 2).exit_code(), 1);
    }

    #[test]
    fn test_exit_code_interrupted() {
        assert_eq!(report(RunStatus::Interrupted, 0).exit_code(), 130);
        assert_eq!(report(RunStatus::Interrupted, 1).exit_code(), 1);
    }

    #[test]
    fn test_report_serializes_status_in_snake_case() {
        let json = serde_json::to_value(report(RunStatus::CompletedWithFailures, 1)).unwrap();
        assert_eq!(json["status"], "completed_with_failures");
        assert_eq!(json["stats"]["failed"], 1);
    }
}

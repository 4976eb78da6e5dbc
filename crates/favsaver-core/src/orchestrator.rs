//! Executes decisions and keeps the per-outcome tally.

use crate::conflict::Decision;
use crate::events::{EventSink, MigrationEvent};
use crate::models::MatchedPhoto;
use crate::tool::MetadataTool;
use serde::Serialize;

/// Result of handling one matched photo. Produced exactly once per photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Metadata was written to the file.
    Written,
    /// Dry run: the write would have been issued.
    Simulated,
    /// The file already carried the incoming values; nothing was written.
    Unchanged,
    /// The operator kept the existing metadata.
    KeptExisting,
    /// Skipped because "skip all remaining" was in effect.
    SkippedByPolicy,
    Failed { reason: String },
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub records: usize,
    pub duplicate_records: usize,
    pub files: usize,
    pub duplicate_files: usize,
    pub matched: usize,
    pub unmatched_records: usize,
    pub unmatched_files: usize,
    pub written: usize,
    pub simulated: usize,
    pub unchanged: usize,
    pub kept_existing: usize,
    pub skipped_by_policy: usize,
    pub failed: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: &WriteOutcome) {
        match outcome {
            WriteOutcome::Written => self.written += 1,
            WriteOutcome::Simulated => self.simulated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
            WriteOutcome::KeptExisting => self.kept_existing += 1,
            WriteOutcome::SkippedByPolicy => self.skipped_by_policy += 1,
            WriteOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Photos that received an outcome.
    pub fn processed(&self) -> usize {
        self.written
            + self.simulated
            + self.unchanged
            + self.kept_existing
            + self.skipped_by_policy
            + self.failed
    }

    /// Photos left as they were, for whatever reason.
    pub fn skipped(&self) -> usize {
        self.unchanged + self.kept_existing + self.skipped_by_policy
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Applies decisions through the metadata tool, or simulates them in dry-run.
pub struct WriteOrchestrator<'a> {
    tool: &'a dyn MetadataTool,
    sink: &'a dyn EventSink,
    dry_run: bool,
    keep_originals: bool,
    stats: RunStats,
}

impl<'a> WriteOrchestrator<'a> {
    pub fn new(
        tool: &'a dyn MetadataTool,
        sink: &'a dyn EventSink,
        dry_run: bool,
        keep_originals: bool,
    ) -> Self {
        Self {
            tool,
            sink,
            dry_run,
            keep_originals,
            stats: RunStats::default(),
        }
    }

    /// Produce the outcome for one photo and count it.
    ///
    /// Tool failures become [`WriteOutcome::Failed`]; nothing is retried.
    pub fn apply(&mut self, photo: &MatchedPhoto, decision: &Decision) -> WriteOutcome {
        let outcome = match decision {
            Decision::Keep => WriteOutcome::KeptExisting,
            Decision::SkippedByPolicy => WriteOutcome::SkippedByPolicy,
            Decision::Proceed(update) if update.is_empty() => WriteOutcome::Unchanged,
            Decision::Proceed(update) => {
                let path = &photo.file.absolute_path;
                self.sink.emit(&MigrationEvent::WriteAttempted {
                    relative_path: photo.file.relative_path.clone(),
                    command: self.tool.describe_write(path, update, self.keep_originals),
                    dry_run: self.dry_run,
                });

                if self.dry_run {
                    WriteOutcome::Simulated
                } else {
                    match self.tool.write(path, update, self.keep_originals) {
                        Ok(()) => WriteOutcome::Written,
                        Err(e) => WriteOutcome::Failed {
                            reason: e.to_string(),
                        },
                    }
                }
            }
        };

        self.stats.record(&outcome);
        self.sink.emit(&MigrationEvent::WriteCompleted {
            relative_path: photo.file.relative_path.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_stats(self) -> RunStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::models::{ExifSnapshot, FileRecord, MetadataUpdate, PhotoMeta};
    use crate::tool::ToolError;
    use std::cell::RefCell;
    use std::path::Path;

    #[derive(Default)]
    struct CountingTool {
        writes: RefCell<Vec<(MetadataUpdate, bool)>>,
        fail: bool,
    }

    impl MetadataTool for CountingTool {
        fn read(&self, _path: &Path) -> Result<ExifSnapshot, ToolError> {
            Ok(ExifSnapshot::default())
        }

        fn write(
            &self,
            _path: &Path,
            update: &MetadataUpdate,
            keep_backup: bool,
        ) -> Result<(), ToolError> {
            if self.fail {
                return Err(ToolError::NonZeroExit {
                    program: "exiftool".to_string(),
                    code: Some(1),
                    stderr: "Error: File not found".to_string(),
                });
            }
            self.writes.borrow_mut().push((update.clone(), keep_backup));
            Ok(())
        }
    }

    fn photo() -> MatchedPhoto {
        MatchedPhoto {
            meta: PhotoMeta {
                relative_path: "DCIM/100APPLE/IMG_1.JPG".to_string(),
                favorite: true,
                description: String::new(),
            },
            file: FileRecord {
                relative_path: "100APPLE/IMG_1.JPG".to_string(),
                absolute_path: "/p/100APPLE/IMG_1.JPG".into(),
            },
        }
    }

    fn rating_update() -> Decision {
        Decision::Proceed(MetadataUpdate {
            rating: Some(4),
            description: None,
        })
    }

    #[test]
    fn test_write_passes_backup_mode() {
        let tool = CountingTool::default();
        let sink = RecordingSink::new();
        let mut orchestrator = WriteOrchestrator::new(&tool, &sink, false, false);

        assert_eq!(
            orchestrator.apply(&photo(), &rating_update()),
            WriteOutcome::Written
        );
        assert_eq!(tool.writes.borrow().len(), 1);
        assert!(!tool.writes.borrow()[0].1);
        assert_eq!(orchestrator.stats().written, 1);
    }

    #[test]
    fn test_dry_run_never_writes() {
        let tool = CountingTool::default();
        let sink = RecordingSink::new();
        let mut orchestrator = WriteOrchestrator::new(&tool, &sink, true, true);

        assert_eq!(
            orchestrator.apply(&photo(), &rating_update()),
            WriteOutcome::Simulated
        );
        assert!(tool.writes.borrow().is_empty());
        assert_eq!(
            sink.count(|e| matches!(e, MigrationEvent::WriteAttempted { dry_run: true, .. })),
            1
        );
        assert_eq!(orchestrator.stats().simulated, 1);
        assert_eq!(orchestrator.stats().written, 0);
    }

    #[test]
    fn test_empty_update_is_unchanged_without_tool_call() {
        let tool = CountingTool::default();
        let sink = RecordingSink::new();
        let mut orchestrator = WriteOrchestrator::new(&tool, &sink, false, true);

        let outcome = orchestrator.apply(&photo(), &Decision::Proceed(MetadataUpdate::default()));
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert!(tool.writes.borrow().is_empty());
        assert_eq!(
            sink.count(|e| matches!(e, MigrationEvent::WriteAttempted { .. })),
            0
        );
    }

    #[test]
    fn test_failure_is_recorded_and_not_fatal() {
        let tool = CountingTool {
            fail: true,
            ..CountingTool::default()
        };
        let sink = RecordingSink::new();
        let mut orchestrator = WriteOrchestrator::new(&tool, &sink, false, true);

        let outcome = orchestrator.apply(&photo(), &rating_update());
        assert!(matches!(outcome, WriteOutcome::Failed { ref reason } if reason.contains("File not found")));

        orchestrator.apply(&photo(), &Decision::Keep);
        orchestrator.apply(&photo(), &Decision::SkippedByPolicy);

        let stats = orchestrator.into_stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.kept_existing, 1);
        assert_eq!(stats.skipped_by_policy, 1);
        assert_eq!(stats.processed(), 3);
        assert!(stats.has_failures());
    }
}

//! Structured audit events and the sinks that consume them.
//!
//! Every stage reports what it did as a [`MigrationEvent`]. Formatting and
//! persistence belong to the sink: [`TracingSink`] feeds the console and log
//! file, [`JsonLinesSink`] writes a machine-readable audit trail.

use crate::conflict::ConflictAnswer;
use crate::database::SchemaVariant;
use crate::migration::RunStatus;
use crate::models::{ExifSnapshot, NormalizedKey};
use crate::orchestrator::{RunStats, WriteOutcome};
use crate::{FavSaverError, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// A single audit event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MigrationEvent {
    SchemaResolved {
        variant: SchemaVariant,
        description_expr: String,
    },
    RecordExtracted {
        relative_path: String,
        favorite: bool,
        description: String,
    },
    RecordSkipped {
        directory: Option<String>,
        reason: String,
    },
    DuplicateRecord {
        key: NormalizedKey,
        relative_path: String,
    },
    ExtractionFinished {
        records: usize,
        duplicates: usize,
    },
    FileDiscovered {
        relative_path: String,
    },
    DuplicateFile {
        key: NormalizedKey,
        relative_path: String,
    },
    /// No camera bucket folder exists under the root; every supported file was indexed.
    RelaxedIndexing {
        root: PathBuf,
        files: usize,
    },
    IndexFinished {
        files: usize,
        duplicates: usize,
    },
    Matched {
        key: NormalizedKey,
        relative_path: String,
    },
    Unmatched {
        key: NormalizedKey,
        relative_path: String,
    },
    MatchSummary {
        matched: usize,
        unmatched_records: usize,
        unmatched_files: usize,
    },
    SnapshotUnavailable {
        relative_path: String,
        reason: String,
    },
    ConflictDisclosed {
        relative_path: String,
        existing: ExifSnapshot,
        incoming_rating: i32,
        incoming_description: String,
    },
    ConflictResolved {
        relative_path: String,
        answer: ConflictAnswer,
        prompted: bool,
    },
    WriteAttempted {
        relative_path: String,
        command: String,
        dry_run: bool,
    },
    WriteCompleted {
        relative_path: String,
        outcome: WriteOutcome,
    },
    Interrupted {
        processed: usize,
        remaining: usize,
    },
    RunFinished {
        status: RunStatus,
        stats: RunStats,
    },
}

/// Consumer of audit events.
pub trait EventSink {
    fn emit(&self, event: &MigrationEvent);
}

/// Forwards events to `tracing` at a level matching their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::SchemaResolved {
                variant,
                description_expr,
            } => info!(
                "Schema variant {:?} selected (description expression: {})",
                variant, description_expr
            ),
            MigrationEvent::RecordExtracted {
                relative_path,
                favorite,
                description,
            } => debug!(
                "Record {}: favorite={}, description={:?}",
                relative_path, favorite, description
            ),
            MigrationEvent::RecordSkipped { directory, reason } => {
                warn!("Skipped database row in {:?}: {}", directory, reason)
            }
            MigrationEvent::DuplicateRecord { key, relative_path } => warn!(
                "Duplicate database record for {} ({}); keeping the last one",
                key, relative_path
            ),
            MigrationEvent::ExtractionFinished {
                records,
                duplicates,
            } => info!(
                "Loaded {} metadata record(s) (duplicates replaced: {})",
                records, duplicates
            ),
            MigrationEvent::FileDiscovered { relative_path } => {
                debug!("Discovered {}", relative_path)
            }
            MigrationEvent::DuplicateFile { key, relative_path } => warn!(
                "Duplicate file after normalization for {} ({}); keeping the last one",
                key, relative_path
            ),
            MigrationEvent::RelaxedIndexing { root, files } => warn!(
                "No folders matching [0-9]+APPLE under {}; indexed {} file(s) by extension only",
                root.display(),
                files
            ),
            MigrationEvent::IndexFinished { files, duplicates } => info!(
                "Discovered {} supported photo file(s) (duplicates replaced: {})",
                files, duplicates
            ),
            MigrationEvent::Matched { relative_path, .. } => debug!("Matched {}", relative_path),
            MigrationEvent::Unmatched { relative_path, .. } => {
                warn!("No file on disk for database record {}", relative_path)
            }
            MigrationEvent::MatchSummary {
                matched,
                unmatched_records,
                unmatched_files,
            } => info!(
                "Matched {} photo(s); {} record(s) without files, {} file(s) without metadata",
                matched, unmatched_records, unmatched_files
            ),
            MigrationEvent::SnapshotUnavailable {
                relative_path,
                reason,
            } => warn!(
                "Could not read existing metadata of {}: {}; treating it as empty",
                relative_path, reason
            ),
            MigrationEvent::ConflictDisclosed {
                relative_path,
                existing,
                incoming_rating,
                incoming_description,
            } => info!(
                "Conflict for {}: existing rating={:?} description={:?}, incoming rating={} description={:?}",
                relative_path,
                existing.rating,
                existing.description,
                incoming_rating,
                incoming_description
            ),
            MigrationEvent::ConflictResolved {
                relative_path,
                answer,
                prompted,
            } => info!(
                "Conflict for {} resolved as {:?} (prompted: {})",
                relative_path, answer, prompted
            ),
            MigrationEvent::WriteAttempted {
                command, dry_run, ..
            } => {
                if *dry_run {
                    info!("DRY RUN - would run: {}", command)
                } else {
                    info!("[WRITE] {}", command)
                }
            }
            MigrationEvent::WriteCompleted {
                relative_path,
                outcome,
            } => match outcome {
                WriteOutcome::Failed { reason } => {
                    warn!("Failed to update {}: {}", relative_path, reason)
                }
                other => debug!("{}: {:?}", relative_path, other),
            },
            MigrationEvent::Interrupted {
                processed,
                remaining,
            } => warn!(
                "Interrupted after {} photo(s); {} left unprocessed",
                processed, remaining
            ),
            MigrationEvent::RunFinished { status, stats } => info!(
                "Run finished ({:?}): written={}, simulated={}, unchanged={}, kept={}, skipped_by_policy={}, failed={}",
                status,
                stats.written,
                stats.simulated,
                stats.unchanged,
                stats.kept_existing,
                stats.skipped_by_policy,
                stats.failed
            ),
        }
    }
}

/// Appends each event as one JSON object per line.
///
/// Every line is flushed as soon as it is written, so the file is complete up
/// to the last event even when the process exits abruptly. Write failures are logged and otherwise ignored so the audit trail never
/// aborts a migration.
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| FavSaverError::io_with_path(e, parent))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| FavSaverError::io_with_path(e, path))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_event(&self, event: &MigrationEvent) -> std::io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("audit writer lock poisoned"))?;
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&self, event: &MigrationEvent) {
        if let Err(e) = self.write_event(event) {
            warn!("Failed to append audit event: {}", e);
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&MigrationEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| predicate(e)).count())
            .unwrap_or(0)
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &MigrationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Sends every event to each inner sink in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl EventSink for MultiSink {
    fn emit(&self, event: &MigrationEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct SharedSink(Arc<RecordingSink>);

    impl EventSink for SharedSink {
        fn emit(&self, event: &MigrationEvent) {
            self.0.emit(event);
        }
    }

    fn sample_event() -> MigrationEvent {
        MigrationEvent::FileDiscovered {
            relative_path: "100APPLE/IMG_0001.JPG".to_string(),
        }
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(&sample_event());
        sink.emit(&MigrationEvent::IndexFinished {
            files: 1,
            duplicates: 0,
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], sample_event());
        assert_eq!(
            sink.count(|e| matches!(e, MigrationEvent::IndexFinished { .. })),
            1
        );
    }

    #[test]
    fn test_json_lines_sink_writes_tagged_objects() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("audit/events.jsonl");

        {
            let sink = JsonLinesSink::create(&path).unwrap();
            sink.emit(&sample_event());
            sink.emit(&MigrationEvent::Unmatched {
                key: NormalizedKey::from_relative("100APPLE/IMG_2.JPG"),
                relative_path: "DCIM/100APPLE/IMG_2.JPG".to_string(),
            });
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "file_discovered");
        assert_eq!(lines[1]["event"], "unmatched");
        assert_eq!(lines[1]["key"], "100apple/img_2.jpg");
    }

    #[test]
    fn test_json_lines_sink_flushes_each_event() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.jsonl");
        let sink = JsonLinesSink::create(&path).unwrap();

        sink.emit(&sample_event());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);

        sink.emit(&sample_event());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_multi_sink_fans_out() {
        let first = Arc::new(RecordingSink::new());
        let second = Arc::new(RecordingSink::new());
        let sink = MultiSink::new()
            .with(SharedSink(first.clone()))
            .with(SharedSink(second.clone()));

        sink.emit(&sample_event());

        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
    }
}

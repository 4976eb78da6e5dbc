//! Favsaver Core - Headless engine for migrating iPhone favorites and
//! descriptions into image metadata.
//!
//! The engine reads a copied `Photos.sqlite` database, pairs its records with
//! the copied photo files and writes a rating and description into each file
//! through a [`MetadataTool`]. It never writes to the database and never
//! formats output itself: progress is reported as [`MigrationEvent`]s.
//!
//! For argument parsing, logging and the interactive prompt, see the
//! `favsaver-cli` crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use favsaver_core::{
//!     run_migration, CancellationToken, ExifTool, FixedPrompt, ConflictAnswer,
//!     MigrationConfig, TracingSink,
//! };
//!
//! fn main() -> favsaver_core::Result<()> {
//!     let mut config = MigrationConfig::new("Photos.sqlite", "/mnt/phone/DCIM");
//!     config.dry_run = true;
//!
//!     let tool = ExifTool::default();
//!     tool.locate()?;
//!
//!     let mut prompt = FixedPrompt(ConflictAnswer::Keep);
//!     let report = run_migration(
//!         &config,
//!         &tool,
//!         &mut prompt,
//!         &TracingSink,
//!         &CancellationToken::new(),
//!     )?;
//!     println!("{} photo(s) would be updated", report.stats.simulated);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod conflict;
pub mod database;
pub mod error;
pub mod events;
pub mod matcher;
pub mod migration;
pub mod models;
pub mod orchestrator;
pub mod scan;
pub mod tool;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::{LogConfig, MigrationConfig, MigrationDefaults, ToolConfig};
pub use conflict::{
    Conflict, ConflictAnswer, ConflictEvaluator, ConflictPrompt, Decision, Evaluation,
    FixedPrompt, ResolutionPolicy, ScriptedPrompt,
};
pub use database::{QueryPlan, RecordSet, SchemaVariant};
pub use error::{FavSaverError, Result};
pub use events::{EventSink, JsonLinesSink, MigrationEvent, MultiSink, RecordingSink, TracingSink};
pub use matcher::{match_records, MatchResult};
pub use migration::{run_migration, RunReport, RunStatus};
pub use models::{
    ExifSnapshot, FileRecord, MatchedPhoto, MetadataUpdate, NormalizedKey, PhotoMeta,
};
pub use orchestrator::{RunStats, WriteOrchestrator, WriteOutcome};
pub use scan::{index_files, EligibilityRule, FileIndex};
pub use tool::{ExifTool, MetadataTool, ToolError, ToolInfo};

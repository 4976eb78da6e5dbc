//! Command-line arguments and their cleanup into a [`MigrationConfig`].

use clap::Parser;
use favsaver_core::MigrationConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "iphone-favorites-saver", version)]
#[command(about = "Migrate iPhone photo favorites and descriptions to EXIF metadata")]
pub struct Args {
    /// Path to the Photos.sqlite database file
    pub database: String,

    /// Root directory containing copied photos (with 100APPLE/101APPLE/etc. folders)
    pub photo_dir: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Show actions without writing EXIF data
    #[arg(long)]
    pub dry_run: bool,

    /// Pass -overwrite_original to exiftool so no *_original backups are kept
    #[arg(long)]
    pub overwrite_original: bool,

    /// Directory for run log files (defaults to the user data directory)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Append every migration event as JSON lines to this file
    #[arg(long)]
    pub audit_json: Option<PathBuf>,

    /// Write the final run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Args {
    /// Build the engine configuration, cleaning up shell quoting artefacts.
    pub fn to_config(&self) -> MigrationConfig {
        let (photo_dir, verbose_from_path) = cleanup_path_arg(&self.photo_dir);
        let mut config = MigrationConfig::new(strip_arg_quotes(&self.database), photo_dir);
        config.verbose = self.verbose || verbose_from_path;
        config.dry_run = self.dry_run;
        config.keep_originals = !self.overwrite_original;
        config
    }
}

/// Trim whitespace and stray double quotes around a path argument.
pub fn strip_arg_quotes(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

/// Clean a path argument that may have swallowed a trailing verbose flag.
///
/// `"C:\Photos\" -v` arrives on Windows as a single argument ending in
/// `" -v"`. Returns the cleaned path and whether the flag was found.
pub fn cleanup_path_arg(value: &str) -> (String, bool) {
    let cleaned = strip_arg_quotes(value);
    for flag in [" -v", " --verbose"] {
        if let Some(stripped) = cleaned.strip_suffix(flag) {
            return (strip_arg_quotes(stripped), true);
        }
    }
    (cleaned, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("iphone-favorites-saver").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_strip_arg_quotes() {
        assert_eq!(strip_arg_quotes("  \"C:\\Photos\"  "), "C:\\Photos");
        assert_eq!(strip_arg_quotes("/mnt/photos"), "/mnt/photos");
    }

    #[test]
    fn test_cleanup_path_arg_detects_verbose() {
        assert_eq!(
            cleanup_path_arg("C:\\Photos\" -v"),
            ("C:\\Photos".to_string(), true)
        );
        assert_eq!(
            cleanup_path_arg("/mnt/photos --verbose"),
            ("/mnt/photos".to_string(), true)
        );
        assert_eq!(
            cleanup_path_arg("/mnt/photos-v"),
            ("/mnt/photos-v".to_string(), false)
        );
    }

    #[test]
    fn test_defaults_keep_originals() {
        let config = parse(&["Photos.sqlite", "photos"]).to_config();
        assert_eq!(config.database_path, PathBuf::from("Photos.sqlite"));
        assert_eq!(config.photo_root, PathBuf::from("photos"));
        assert!(config.keep_originals);
        assert!(!config.dry_run);
        assert!(!config.verbose);
    }

    #[test]
    fn test_flags_map_to_config() {
        let config = parse(&[
            "Photos.sqlite",
            "photos",
            "--dry-run",
            "--overwrite-original",
            "-v",
        ])
        .to_config();
        assert!(config.dry_run);
        assert!(!config.keep_originals);
        assert!(config.verbose);
    }

    #[test]
    fn test_verbose_recovered_from_photo_dir() {
        let config = parse(&["Photos.sqlite", "D:\\Backup\\DCIM\" -v"]).to_config();
        assert!(config.verbose);
        assert_eq!(config.photo_root, PathBuf::from("D:\\Backup\\DCIM"));
    }
}

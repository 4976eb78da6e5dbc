//! Core data model shared by every migration stage.

use crate::config::MigrationDefaults;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Camera bucket folder names such as `100APPLE` or `131apple`.
static BUCKET_DIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i)^[0-9]+{}$", MigrationDefaults::BUCKET_SUFFIX))
        .expect("bucket directory regex must compile")
});

/// Whether a single path component names a camera bucket folder.
pub fn is_bucket_dir_name(name: &str) -> bool {
    BUCKET_DIR.is_match(name)
}

/// Metadata extracted from the Photos database for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMeta {
    /// Directory and filename as stored in the database.
    pub relative_path: String,
    pub favorite: bool,
    /// Resolved description, empty when none is set.
    pub description: String,
}

impl PhotoMeta {
    pub fn key(&self) -> NormalizedKey {
        NormalizedKey::from_relative(&self.relative_path)
    }
}

/// A supported image file discovered under the photo root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the photo root, `/`-separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
}

impl FileRecord {
    pub fn key(&self) -> NormalizedKey {
        NormalizedKey::from_relative(&self.relative_path)
    }
}

/// Case- and separator-folded relative path used to join records to files.
///
/// The path is anchored at its first camera bucket component, so
/// `DCIM/100APPLE/IMG_1.HEIC`, `100APPLE/IMG_1.HEIC` and
/// `dcim\100apple\img_1.heic` all share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn from_relative(path: &str) -> Self {
        let unified = path.replace('\\', "/");
        let parts: Vec<&str> = unified
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();

        let start = parts
            .iter()
            .position(|part| is_bucket_dir_name(part))
            .unwrap_or(0);

        NormalizedKey(parts[start..].join("/").to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A database record paired with the file it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedPhoto {
    pub meta: PhotoMeta,
    pub file: FileRecord,
}

/// Metadata already embedded in a file when it was read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifSnapshot {
    pub rating: Option<i32>,
    pub description: Option<String>,
}

impl ExifSnapshot {
    /// Existing rating, treating absent as zero.
    pub fn rating_or_zero(&self) -> i32 {
        self.rating.unwrap_or(0)
    }

    /// Existing description, treating absent as empty.
    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Fields to write to a file. `None` leaves the field untouched.
///
/// `Some(String::new())` clears both description tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    pub rating: Option<i32>,
    pub description: Option<String>,
}

impl MetadataUpdate {
    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_dir_names() {
        assert!(is_bucket_dir_name("100APPLE"));
        assert!(is_bucket_dir_name("131apple"));
        assert!(!is_bucket_dir_name("APPLE"));
        assert!(!is_bucket_dir_name("100APPLE_backup"));
        assert!(!is_bucket_dir_name("DCIM"));
    }

    #[test]
    fn test_key_is_case_and_separator_insensitive() {
        let a = NormalizedKey::from_relative("DCIM/100APPLE/IMG_1.HEIC");
        let b = NormalizedKey::from_relative("dcim\\100apple\\img_1.heic");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "100apple/img_1.heic");
    }

    #[test]
    fn test_key_anchors_at_bucket_folder() {
        let from_db = NormalizedKey::from_relative("DCIM/102APPLE/IMG_0042.JPG");
        let from_disk = NormalizedKey::from_relative("102APPLE/IMG_0042.JPG");
        assert_eq!(from_db, from_disk);
    }

    #[test]
    fn test_key_without_bucket_keeps_whole_path() {
        let key = NormalizedKey::from_relative("./Export//Summer/IMG_1.jpg");
        assert_eq!(key.as_str(), "export/summer/img_1.jpg");
    }

    #[test]
    fn test_snapshot_defaults() {
        let snapshot = ExifSnapshot::default();
        assert_eq!(snapshot.rating_or_zero(), 0);
        assert_eq!(snapshot.description_or_empty(), "");
    }

    #[test]
    fn test_update_emptiness() {
        assert!(MetadataUpdate::default().is_empty());
        let update = MetadataUpdate {
            rating: Some(4),
            description: None,
        };
        assert!(!update.is_empty());
    }
}

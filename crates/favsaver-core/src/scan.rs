//! Discovery of copied photo files.
//!
//! Traversal ([`index_files`]) is kept apart from the eligibility policy
//! ([`EligibilityRule`]) so the matching rule can be tested on its own.

use crate::config::MigrationDefaults;
use crate::events::{EventSink, MigrationEvent};
use crate::models::{is_bucket_dir_name, FileRecord, NormalizedKey};
use crate::{FavSaverError, Result};
use std::collections::HashMap;
use std::path::{Component, Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Which files under the photo root may receive metadata.
#[derive(Debug, Clone)]
pub struct EligibilityRule {
    extensions: Vec<String>,
}

impl Default for EligibilityRule {
    fn default() -> Self {
        Self::with_extensions(MigrationDefaults::SUPPORTED_EXTENSIONS)
    }
}

impl EligibilityRule {
    pub fn with_extensions(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|ext| ext.to_lowercase()).collect(),
        }
    }

    /// Extension check, case-insensitive.
    pub fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|supported| *supported == ext)
            })
            .unwrap_or(false)
    }

    /// Whether any directory of a root-relative file path is a camera bucket.
    pub fn has_bucket_ancestor(&self, relative: &Path) -> bool {
        let Some(parent) = relative.parent() else {
            return false;
        };
        parent.components().any(|component| match component {
            Component::Normal(name) => name.to_str().map(is_bucket_dir_name).unwrap_or(false),
            _ => false,
        })
    }
}

/// Indexed files keyed by [`NormalizedKey`], in traversal order.
#[derive(Debug, Default, Clone)]
pub struct FileIndex {
    files: Vec<FileRecord>,
    positions: HashMap<NormalizedKey, usize>,
    duplicates: usize,
    relaxed: bool,
}

impl FileIndex {
    /// Insert a file, returning the one it replaced.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        let key = record.key();
        match self.positions.get(&key) {
            Some(&index) => {
                self.duplicates += 1;
                Some(std::mem::replace(&mut self.files[index], record))
            }
            None => {
                self.positions.insert(key, self.files.len());
                self.files.push(record);
                None
            }
        }
    }

    pub fn get(&self, key: &NormalizedKey) -> Option<&FileRecord> {
        self.positions.get(key).map(|&index| &self.files[index])
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// True when no bucket folder was found and files were taken by extension only.
    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter()
    }
}

impl FromIterator<FileRecord> for FileIndex {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut index = FileIndex::default();
        for record in iter {
            index.insert(record);
        }
        index
    }
}

/// `/`-separated form of a root-relative path.
fn relative_string(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `root` and index every eligible file.
///
/// Files below a camera bucket folder are preferred. When the tree has no
/// bucket folder at all (an already flattened copy), every supported file is
/// indexed and a [`MigrationEvent::RelaxedIndexing`] is emitted.
///
/// Fails with `PhotoRootUnreadable` if the root cannot be listed and
/// `NoFilesFound` if nothing eligible is found.
pub fn index_files(root: &Path, rule: &EligibilityRule, sink: &dyn EventSink) -> Result<FileIndex> {
    std::fs::read_dir(root).map_err(|e| FavSaverError::PhotoRootUnreadable {
        root: root.to_path_buf(),
        source: Some(e),
    })?;

    let mut bucketed = Vec::new();
    let mut loose = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !rule.is_supported_file(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        let record = FileRecord {
            relative_path: relative_string(relative),
            absolute_path: entry.path().to_path_buf(),
        };
        if rule.has_bucket_ancestor(relative) {
            bucketed.push(record);
        } else {
            loose.push(record);
        }
    }

    let relaxed = bucketed.is_empty();
    let selected = if relaxed {
        if !loose.is_empty() {
            sink.emit(&MigrationEvent::RelaxedIndexing {
                root: root.to_path_buf(),
                files: loose.len(),
            });
        }
        loose
    } else {
        if !loose.is_empty() {
            debug!(
                "Ignoring {} supported file(s) outside camera bucket folders",
                loose.len()
            );
        }
        bucketed
    };

    let mut index = FileIndex {
        relaxed,
        ..FileIndex::default()
    };
    for record in selected {
        let key = record.key();
        let relative_path = record.relative_path.clone();
        sink.emit(&MigrationEvent::FileDiscovered {
            relative_path: relative_path.clone(),
        });
        if index.insert(record).is_some() {
            sink.emit(&MigrationEvent::DuplicateFile { key, relative_path });
        }
    }

    if index.is_empty() {
        return Err(FavSaverError::NoFilesFound(root.to_path_buf()));
    }

    sink.emit(&MigrationEvent::IndexFinished {
        files: index.len(),
        duplicates: index.duplicates(),
    });
    Ok(index)
}

//! Exact pairing of database records with indexed files.

use crate::events::{EventSink, MigrationEvent};
use crate::models::{FileRecord, MatchedPhoto, PhotoMeta};
use crate::scan::FileIndex;
use std::collections::HashSet;

/// Result of joining records to files.
#[derive(Debug, Default, Clone)]
pub struct MatchResult {
    /// Pairs in record order.
    pub matched: Vec<MatchedPhoto>,
    /// Records with no file on disk.
    pub unmatched_records: Vec<PhotoMeta>,
    /// Files with no database metadata.
    pub unmatched_files: Vec<FileRecord>,
}

/// Join records to files on [`crate::models::NormalizedKey`] equality.
///
/// Pure: the output depends only on the inputs, and `matched` follows the
/// order of `records`.
pub fn match_records(records: impl IntoIterator<Item = PhotoMeta>, files: &FileIndex) -> MatchResult {
    let mut result = MatchResult::default();
    let mut used = HashSet::new();

    for meta in records {
        let key = meta.key();
        match files.get(&key) {
            Some(file) => {
                used.insert(key);
                result.matched.push(MatchedPhoto {
                    meta,
                    file: file.clone(),
                });
            }
            None => result.unmatched_records.push(meta),
        }
    }

    result.unmatched_files = files
        .iter()
        .filter(|file| !used.contains(&file.key()))
        .cloned()
        .collect();

    result
}

/// Report a match result to the audit sink.
///
/// Unmatched records are warnings; unmatched files carry nothing to migrate
/// and only appear in the summary count.
pub fn report_matches(result: &MatchResult, sink: &dyn EventSink) {
    for pair in &result.matched {
        sink.emit(&MigrationEvent::Matched {
            key: pair.meta.key(),
            relative_path: pair.file.relative_path.clone(),
        });
    }
    for meta in &result.unmatched_records {
        sink.emit(&MigrationEvent::Unmatched {
            key: meta.key(),
            relative_path: meta.relative_path.clone(),
        });
    }
    sink.emit(&MigrationEvent::MatchSummary {
        matched: result.matched.len(),
        unmatched_records: result.unmatched_records.len(),
        unmatched_files: result.unmatched_files.len(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use std::path::PathBuf;

    fn meta(path: &str) -> PhotoMeta {
        PhotoMeta {
            relative_path: path.to_string(),
            favorite: true,
            description: String::new(),
        }
    }

    fn file(path: &str) -> FileRecord {
        FileRecord {
            relative_path: path.to_string(),
            absolute_path: PathBuf::from("/photos").join(path),
        }
    }

    #[test]
    fn test_matches_ignore_case_and_separators() {
        let files: FileIndex = vec![file("DCIM/100APPLE/IMG_1.HEIC")].into_iter().collect();
        let result = match_records(vec![meta("dcim\\100apple\\img_1.heic")], &files);

        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].file.relative_path, "DCIM/100APPLE/IMG_1.HEIC");
        assert!(result.unmatched_records.is_empty());
        assert!(result.unmatched_files.is_empty());
    }

    #[test]
    fn test_no_partial_matching() {
        let files: FileIndex = vec![file("100APPLE/IMG_10.JPG")].into_iter().collect();
        let result = match_records(vec![meta("100APPLE/IMG_1.JPG")], &files);

        assert!(result.matched.is_empty());
        assert_eq!(result.unmatched_records.len(), 1);
        assert_eq!(result.unmatched_files.len(), 1);
    }

    #[test]
    fn test_order_follows_records() {
        let files: FileIndex = vec![
            file("100APPLE/A.JPG"),
            file("100APPLE/B.JPG"),
            file("100APPLE/C.JPG"),
        ]
        .into_iter()
        .collect();
        let result = match_records(
            vec![meta("100APPLE/C.JPG"), meta("100APPLE/A.JPG")],
            &files,
        );

        let order: Vec<&str> = result
            .matched
            .iter()
            .map(|m| m.meta.relative_path.as_str())
            .collect();
        assert_eq!(order, vec!["100APPLE/C.JPG", "100APPLE/A.JPG"]);
        assert_eq!(result.unmatched_files[0].relative_path, "100APPLE/B.JPG");
    }

    #[test]
    fn test_report_warns_for_missing_files_only() {
        let files: FileIndex = vec![file("100APPLE/IMG_1.JPG"), file("100APPLE/IMG_3.JPG")]
            .into_iter()
            .collect();
        let result = match_records(
            vec![meta("DCIM/100APPLE/IMG_1.JPG"), meta("DCIM/100APPLE/IMG_2.JPG")],
            &files,
        );
        let sink = RecordingSink::new();
        report_matches(&result, &sink);

        assert_eq!(
            sink.count(|e| matches!(e, MigrationEvent::Unmatched { .. })),
            1
        );
        assert!(sink.events().contains(&MigrationEvent::MatchSummary {
            matched: 1,
            unmatched_records: 1,
            unmatched_files: 1,
        }));
    }
}

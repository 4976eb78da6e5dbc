//! Metadata record extraction from Photos.sqlite.

use super::schema::{DescriptionLink, QueryPlan, SchemaVariant};
use crate::events::{EventSink, MigrationEvent};
use crate::models::{NormalizedKey, PhotoMeta};
use crate::Result;
use rusqlite::Connection;
use std::collections::HashMap;

/// Build the `SELECT` for a resolved plan.
///
/// Trashed assets are excluded; an asset qualifies when it is a favorite or
/// has a non-empty description.
pub fn build_query(plan: &QueryPlan) -> String {
    let mut joins: Vec<&str> = Vec::new();

    if plan.attributes {
        joins.push(match plan.variant {
            SchemaVariant::Modern => {
                "LEFT JOIN ZADDITIONALASSETATTRIBUTES ON ZASSET.ZADDITIONALATTRIBUTES = ZADDITIONALASSETATTRIBUTES.Z_PK"
            }
            SchemaVariant::Legacy => {
                "LEFT JOIN ZADDITIONALASSETATTRIBUTES ON ZADDITIONALASSETATTRIBUTES.ZASSET = ZASSET.Z_PK"
            }
        });
    }

    match plan.description_link {
        Some(DescriptionLink::Forward) => joins.push(
            "LEFT JOIN ZASSETDESCRIPTION ON ZADDITIONALASSETATTRIBUTES.ZASSETDESCRIPTION = ZASSETDESCRIPTION.Z_PK",
        ),
        Some(DescriptionLink::BackReference) => joins.push(
            "LEFT JOIN ZASSETDESCRIPTION ON ZASSETDESCRIPTION.ZASSETATTRIBUTES = ZADDITIONALASSETATTRIBUTES.Z_PK",
        ),
        None => {}
    }

    if plan.variant == SchemaVariant::Legacy
        && plan.sources.contains(&super::schema::DescriptionSource::Caption)
    {
        joins.push("LEFT JOIN ZEXTENDEDATTRIBUTES ON ZEXTENDEDATTRIBUTES.ZASSET = ZASSET.Z_PK");
    }

    let description = plan.description_expr();
    format!(
        "SELECT ZASSET.ZFILENAME, ZASSET.ZDIRECTORY, ZASSET.ZFAVORITE, {description} AS DESCRIPTION \
         FROM ZASSET {joins} \
         WHERE COALESCE(ZASSET.ZTRASHEDSTATE, 0) = 0 \
         AND (COALESCE(ZASSET.ZFAVORITE, 0) != 0 OR {description} != '') \
         ORDER BY ZASSET.Z_PK",
        joins = joins.join(" ")
    )
}

/// Join a database directory and filename into a `/`-separated path.
///
/// Returns `None` when the filename is missing.
pub fn build_relative_path(directory: Option<&str>, filename: Option<&str>) -> Option<String> {
    let filename = filename.map(str::trim).filter(|name| !name.is_empty())?;
    let directory = directory
        .unwrap_or("")
        .trim()
        .trim_end_matches(['/', '\\']);

    if directory.is_empty() {
        Some(filename.to_string())
    } else {
        Some(format!("{}/{}", directory.replace('\\', "/"), filename))
    }
}

/// Streams [`PhotoMeta`] rows for a resolved plan.
pub struct RecordExtractor<'a> {
    conn: &'a Connection,
    plan: &'a QueryPlan,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(conn: &'a Connection, plan: &'a QueryPlan) -> Self {
        Self { conn, plan }
    }

    /// Visit each qualifying row in database order.
    ///
    /// Rows without a filename are reported and skipped.
    pub fn for_each_record(
        &self,
        sink: &dyn EventSink,
        mut visit: impl FnMut(PhotoMeta),
    ) -> Result<()> {
        let sql = build_query(self.plan);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let filename: Option<String> = row.get(0)?;
            let directory: Option<String> = row.get(1)?;
            let favorite = row.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0;
            let description = row
                .get::<_, Option<String>>(3)?
                .unwrap_or_default()
                .trim()
                .to_string();

            let Some(relative_path) =
                build_relative_path(directory.as_deref(), filename.as_deref())
            else {
                sink.emit(&MigrationEvent::RecordSkipped {
                    directory,
                    reason: "missing filename".to_string(),
                });
                continue;
            };

            if !favorite && description.is_empty() {
                continue;
            }

            let meta = PhotoMeta {
                relative_path,
                favorite,
                description,
            };
            sink.emit(&MigrationEvent::RecordExtracted {
                relative_path: meta.relative_path.clone(),
                favorite: meta.favorite,
                description: meta.description.clone(),
            });
            visit(meta);
        }

        Ok(())
    }

    /// Collect all records, replacing duplicates of the same key.
    pub fn extract(&self, sink: &dyn EventSink) -> Result<RecordSet> {
        let mut set = RecordSet::default();
        self.for_each_record(sink, |meta| {
            let key = meta.key();
            let relative_path = meta.relative_path.clone();
            if set.insert(meta).is_some() {
                sink.emit(&MigrationEvent::DuplicateRecord { key, relative_path });
            }
        })?;

        sink.emit(&MigrationEvent::ExtractionFinished {
            records: set.len(),
            duplicates: set.duplicates(),
        });
        Ok(set)
    }
}

/// Extracted records keyed by [`NormalizedKey`].
///
/// A later record with the same key replaces the earlier one but keeps its
/// position, so iteration order stays the database order.
#[derive(Debug, Default, Clone)]
pub struct RecordSet {
    records: Vec<PhotoMeta>,
    positions: HashMap<NormalizedKey, usize>,
    duplicates: usize,
}

impl RecordSet {
    /// Insert a record, returning the one it replaced.
    pub fn insert(&mut self, meta: PhotoMeta) -> Option<PhotoMeta> {
        let key = meta.key();
        match self.positions.get(&key) {
            Some(&index) => {
                self.duplicates += 1;
                Some(std::mem::replace(&mut self.records[index], meta))
            }
            None => {
                self.positions.insert(key, self.records.len());
                self.records.push(meta);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoMeta> {
        self.records.iter()
    }

    pub fn into_vec(self) -> Vec<PhotoMeta> {
        self.records
    }
}

impl FromIterator<PhotoMeta> for RecordSet {
    fn from_iter<I: IntoIterator<Item = PhotoMeta>>(iter: I) -> Self {
        let mut set = RecordSet::default();
        for meta in iter {
            set.insert(meta);
        }
        set
    }
}

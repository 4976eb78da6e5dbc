//! Photos.sqlite schema detection.
//!
//! iOS has moved the asset description around over the years. Rather than
//! probing columns throughout extraction, the resolver inspects the schema once
//! and returns a [`QueryPlan`] tagged with the detected [`SchemaVariant`].

use crate::{FavSaverError, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

pub const ASSET_TABLE: &str = "ZASSET";
pub const ATTRIBUTES_TABLE: &str = "ZADDITIONALASSETATTRIBUTES";
pub const DESCRIPTION_TABLE: &str = "ZASSETDESCRIPTION";
pub const EXTENDED_TABLE: &str = "ZEXTENDEDATTRIBUTES";

/// Asset columns every supported schema provides.
const REQUIRED_ASSET_COLUMNS: &[&str] = &["Z_PK", "ZFILENAME", "ZDIRECTORY", "ZFAVORITE", "ZTRASHEDSTATE"];

/// Known layouts of the asset/attributes/description tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// iOS 18 and later: `ZASSET.ZADDITIONALATTRIBUTES` points at the attributes row.
    Modern,
    /// Earlier releases: the attributes row points back at `ZASSET.Z_PK`.
    Legacy,
}

/// How the description table is reached from the attributes row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionLink {
    /// `ZADDITIONALASSETATTRIBUTES.ZASSETDESCRIPTION = ZASSETDESCRIPTION.Z_PK`
    Forward,
    /// `ZASSETDESCRIPTION.ZASSETATTRIBUTES = ZADDITIONALASSETATTRIBUTES.Z_PK`
    BackReference,
}

/// A column that can supply the description, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionSource {
    LongDescription,
    Title,
    Caption,
}

impl DescriptionSource {
    pub fn column(&self) -> &'static str {
        match self {
            DescriptionSource::LongDescription => "ZASSETDESCRIPTION.ZLONGDESCRIPTION",
            DescriptionSource::Title => "ZADDITIONALASSETATTRIBUTES.ZTITLE",
            DescriptionSource::Caption => "ZEXTENDEDATTRIBUTES.ZCAPTION",
        }
    }
}

/// Characters SQLite `TRIM` strips so that whitespace-only columns count as empty.
const BLANK_CHARS: &str = "' ' || char(9) || char(10) || char(13)";

/// Everything the extractor needs to build its query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub variant: SchemaVariant,
    /// Whether the additional attributes table exists and can be joined.
    pub attributes: bool,
    pub description_link: Option<DescriptionLink>,
    /// Description columns, highest priority first.
    pub sources: Vec<DescriptionSource>,
}

impl QueryPlan {
    /// `COALESCE` over the description sources, `''` when there are none.
    pub fn description_expr(&self) -> String {
        if self.sources.is_empty() {
            return "''".to_string();
        }
        let clauses: Vec<String> = self
            .sources
            .iter()
            .map(|source| {
                format!(
                    "NULLIF(TRIM({}, {}), '')",
                    source.column(),
                    BLANK_CHARS
                )
            })
            .collect();
        format!("COALESCE({}, '')", clauses.join(", "))
    }
}

/// Table and column names of an opened database, uppercased.
#[derive(Debug, Default)]
pub struct SchemaInfo {
    tables: HashMap<String, HashSet<String>>,
}

impl SchemaInfo {
    /// Read table names and the columns of the tables the migration cares about.
    pub fn inspect(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tables = HashMap::new();
        for name in names {
            let upper = name.to_uppercase();
            let columns = if is_relevant_table(&upper) {
                table_columns(conn, &name)?
            } else {
                HashSet::new()
            };
            tables.insert(upper, columns);
        }

        Ok(Self { tables })
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .map(|columns| columns.contains(column))
            .unwrap_or(false)
    }
}

fn is_relevant_table(name: &str) -> bool {
    matches!(
        name,
        ASSET_TABLE | ATTRIBUTES_TABLE | DESCRIPTION_TABLE | EXTENDED_TABLE
    )
}

fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\"")))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .map(|column| column.map(|c| c.to_uppercase()))
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(columns)
}

/// Pick the schema variant and build its query plan.
///
/// Fails with `InvalidDatabase` when `ZASSET` or one of its required columns is
/// missing. Never writes to the database.
pub fn resolve_schema(conn: &Connection, db_path: &Path) -> Result<QueryPlan> {
    let info = SchemaInfo::inspect(conn).map_err(|e| match e {
        FavSaverError::InvalidDatabase { message, source, .. } => FavSaverError::InvalidDatabase {
            path: Some(db_path.to_path_buf()),
            message,
            source,
        },
        other => other,
    })?;
    plan_for(&info, db_path)
}

/// Build the plan for an already inspected schema.
pub fn plan_for(info: &SchemaInfo, db_path: &Path) -> Result<QueryPlan> {
    if !info.has_table(ASSET_TABLE) {
        return Err(FavSaverError::invalid_database(
            db_path,
            format!("not a Photos.sqlite database (missing {})", ASSET_TABLE),
        ));
    }

    let missing: Vec<&str> = REQUIRED_ASSET_COLUMNS
        .iter()
        .copied()
        .filter(|column| !info.has_column(ASSET_TABLE, column))
        .collect();
    if !missing.is_empty() {
        return Err(FavSaverError::invalid_database(
            db_path,
            format!("{} is missing column(s): {}", ASSET_TABLE, missing.join(", ")),
        ));
    }

    let variant = if info.has_column(ASSET_TABLE, "ZADDITIONALATTRIBUTES") {
        SchemaVariant::Modern
    } else {
        SchemaVariant::Legacy
    };

    let attributes = info.has_table(ATTRIBUTES_TABLE)
        && match variant {
            SchemaVariant::Modern => info.has_column(ATTRIBUTES_TABLE, "Z_PK"),
            SchemaVariant::Legacy => info.has_column(ATTRIBUTES_TABLE, "ZASSET"),
        };

    let description_link = if attributes && info.has_table(DESCRIPTION_TABLE) {
        if info.has_column(ATTRIBUTES_TABLE, "ZASSETDESCRIPTION") {
            Some(DescriptionLink::Forward)
        } else if info.has_column(DESCRIPTION_TABLE, "ZASSETATTRIBUTES") {
            Some(DescriptionLink::BackReference)
        } else {
            None
        }
    } else {
        None
    };

    let mut sources = Vec::new();
    if description_link.is_some() && info.has_column(DESCRIPTION_TABLE, "ZLONGDESCRIPTION") {
        sources.push(DescriptionSource::LongDescription);
    }
    if attributes && info.has_column(ATTRIBUTES_TABLE, "ZTITLE") {
        sources.push(DescriptionSource::Title);
    }
    if variant == SchemaVariant::Legacy
        && info.has_column(EXTENDED_TABLE, "ZASSET")
        && info.has_column(EXTENDED_TABLE, "ZCAPTION")
    {
        sources.push(DescriptionSource::Caption);
    }

    let plan = QueryPlan {
        variant,
        attributes,
        description_link,
        sources,
    };
    debug!("Resolved query plan: {:?}", plan);
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(sql: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(sql).unwrap();
        conn
    }

    const ASSET: &str = "CREATE TABLE ZASSET (Z_PK INTEGER PRIMARY KEY, ZFILENAME TEXT, ZDIRECTORY TEXT, ZFAVORITE INTEGER, ZTRASHEDSTATE INTEGER";

    #[test]
    fn test_missing_asset_table_is_invalid() {
        let conn = schema("CREATE TABLE ZOTHER (Z_PK INTEGER PRIMARY KEY);");
        let err = resolve_schema(&conn, Path::new("Photos.sqlite")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("missing ZASSET"));
    }

    #[test]
    fn test_missing_required_column_is_invalid() {
        let conn = schema("CREATE TABLE ZASSET (Z_PK INTEGER PRIMARY KEY, ZFILENAME TEXT);");
        let err = resolve_schema(&conn, Path::new("Photos.sqlite")).unwrap_err();
        assert!(err.to_string().contains("ZFAVORITE"));
    }

    #[test]
    fn test_modern_variant() {
        let conn = schema(&format!(
            "{ASSET}, ZADDITIONALATTRIBUTES INTEGER);
             CREATE TABLE ZADDITIONALASSETATTRIBUTES (Z_PK INTEGER PRIMARY KEY, ZASSET INTEGER, ZTITLE TEXT, ZASSETDESCRIPTION INTEGER);
             CREATE TABLE ZASSETDESCRIPTION (Z_PK INTEGER PRIMARY KEY, ZLONGDESCRIPTION TEXT);
             CREATE TABLE ZEXTENDEDATTRIBUTES (Z_PK INTEGER PRIMARY KEY, ZASSET INTEGER, ZCAPTION TEXT);"
        ));
        let plan = resolve_schema(&conn, Path::new("Photos.sqlite")).unwrap();

        assert_eq!(plan.variant, SchemaVariant::Modern);
        assert!(plan.attributes);
        assert_eq!(plan.description_link, Some(DescriptionLink::Forward));
        // Caption is only reachable through the legacy join plan.
        assert_eq!(
            plan.sources,
            vec![DescriptionSource::LongDescription, DescriptionSource::Title]
        );
    }

    #[test]
    fn test_legacy_variant() {
        let conn = schema(&format!(
            "{ASSET});
             CREATE TABLE ZADDITIONALASSETATTRIBUTES (Z_PK INTEGER PRIMARY KEY, ZASSET INTEGER, ZTITLE TEXT);
             CREATE TABLE ZASSETDESCRIPTION (Z_PK INTEGER PRIMARY KEY, ZASSETATTRIBUTES INTEGER, ZLONGDESCRIPTION TEXT);
             CREATE TABLE ZEXTENDEDATTRIBUTES (Z_PK INTEGER PRIMARY KEY, ZASSET INTEGER, ZCAPTION TEXT);"
        ));
        let plan = resolve_schema(&conn, Path::new("Photos.sqlite")).unwrap();

        assert_eq!(plan.variant, SchemaVariant::Legacy);
        assert_eq!(plan.description_link, Some(DescriptionLink::BackReference));
        assert_eq!(
            plan.sources,
            vec![
                DescriptionSource::LongDescription,
                DescriptionSource::Title,
                DescriptionSource::Caption
            ]
        );
    }

    #[test]
    fn test_asset_table_alone_has_no_description_sources() {
        let conn = schema(&format!("{ASSET});"));
        let plan = resolve_schema(&conn, Path::new("Photos.sqlite")).unwrap();

        assert_eq!(plan.variant, SchemaVariant::Legacy);
        assert!(!plan.attributes);
        assert!(plan.sources.is_empty());
        assert_eq!(plan.description_expr(), "''");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let conn = schema(&format!(
            "{ASSET}, ZADDITIONALATTRIBUTES INTEGER);
             CREATE TABLE ZADDITIONALASSETATTRIBUTES (Z_PK INTEGER PRIMARY KEY, ZTITLE TEXT);"
        ));
        let first = resolve_schema(&conn, Path::new("a")).unwrap();
        let second = resolve_schema(&conn, Path::new("a")).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.description_expr(),
            "COALESCE(NULLIF(TRIM(ZADDITIONALASSETATTRIBUTES.ZTITLE, \
             ' ' || char(9) || char(10) || char(13)), ''), '')"
        );
    }
}

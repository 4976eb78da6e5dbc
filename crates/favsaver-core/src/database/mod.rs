//! Read-only access to the Photos.sqlite database.
//!
//! This module provides:
//! - Schema variant detection ([`resolve_schema`])
//! - Streaming record extraction ([`RecordExtractor`])

mod extract;
mod schema;

pub use extract::{build_query, build_relative_path, RecordExtractor, RecordSet};
pub use schema::{
    plan_for, resolve_schema, DescriptionLink, DescriptionSource, QueryPlan, SchemaInfo,
    SchemaVariant,
};

use crate::{FavSaverError, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Open the database strictly read-only.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(FavSaverError::invalid_database(
            path,
            "database file not found",
        ));
    }

    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| FavSaverError::InvalidDatabase {
        path: Some(path.to_path_buf()),
        message: format!("failed to open database: {}", e),
        source: Some(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_invalid_database() {
        let temp = TempDir::new().unwrap();
        let err = open_read_only(&temp.path().join("Photos.sqlite")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_garbage_file_fails_schema_resolution() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Photos.sqlite");
        std::fs::write(&path, b"this is not a sqlite database at all, not even close").unwrap();

        let result = open_read_only(&path).and_then(|conn| resolve_schema(&conn, &path));
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_read_only_connection_rejects_writes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Photos.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE ZASSET (Z_PK INTEGER PRIMARY KEY);")
            .unwrap();

        let conn = open_read_only(&path).unwrap();
        assert!(conn
            .execute("INSERT INTO ZASSET (Z_PK) VALUES (1)", [])
            .is_err());
    }
}

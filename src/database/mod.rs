// Copyright 2023 Remi Bernotavicius

use diesel::prelude::Connection as _;
use diesel::ExpressionMethods as _;
use diesel::OptionalExtension as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::{Path, PathBuf};

pub mod document;
pub mod models;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Name of the slot holding the whole repository document.
pub const DOCUMENT_SLOT: &str = "bakingCostManager";

/// Where an undecodable document is copied before anything else is saved.
pub const UNREADABLE_SLOT: &str = "bakingCostManager.bad";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database path {0:?} is not valid UTF-8")]
    BadPath(PathBuf),
    #[error("failed to open database {path:?}: {source}")]
    Connection {
        path: PathBuf,
        source: diesel::ConnectionError,
    },
    #[error("failed to run database migrations: {0}")]
    Migration(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("stored document could not be encoded or decoded: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn establish_connection(path: impl AsRef<Path>) -> Result<Connection, StorageError> {
    let path = path.as_ref();
    let url = path
        .to_str()
        .ok_or_else(|| StorageError::BadPath(path.into()))?;
    let mut connection =
        Connection::establish(url).map_err(|source| StorageError::Connection {
            path: path.into(),
            source,
        })?;
    connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(StorageError::Migration)?;
    Ok(connection)
}

pub fn load_slot(conn: &mut Connection, slot_name: &str) -> Result<Option<String>, StorageError> {
    use schema::slots::dsl::*;

    Ok(slots
        .filter(name.eq(slot_name))
        .select(value)
        .first::<String>(conn)
        .optional()?)
}

pub fn save_slot(
    conn: &mut Connection,
    slot_name: &str,
    contents: &str,
) -> Result<(), StorageError> {
    use schema::slots::dsl::*;

    let slot = models::Slot {
        name: slot_name.into(),
        value: contents.into(),
    };
    diesel::replace_into(slots).values(&slot).execute(conn)?;
    Ok(())
}

pub fn load_document(conn: &mut Connection) -> Result<Option<serde_json::Value>, StorageError> {
    let Some(contents) = load_slot(conn, DOCUMENT_SLOT)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Copies the stored document, as is, into `UNREADABLE_SLOT`.
pub fn set_aside_document(conn: &mut Connection) -> Result<(), StorageError> {
    if let Some(contents) = load_slot(conn, DOCUMENT_SLOT)? {
        save_slot(conn, UNREADABLE_SLOT, &contents)?;
    }
    Ok(())
}

pub fn save_document(conn: &mut Connection, doc: &serde_json::Value) -> Result<(), StorageError> {
    let contents = serde_json::to_string(doc)?;
    save_slot(conn, DOCUMENT_SLOT, &contents)?;
    log::debug!("saved {} bytes to slot {DOCUMENT_SLOT:?}", contents.len());
    Ok(())
}

#[cfg(test)]
pub fn in_memory() -> Connection {
    establish_connection(":memory:").unwrap()
}

#[test]
fn slot_round_trip() {
    let mut conn = in_memory();
    assert_eq!(load_slot(&mut conn, "missing").unwrap(), None);

    save_slot(&mut conn, "a", "first").unwrap();
    save_slot(&mut conn, "a", "second").unwrap();
    save_slot(&mut conn, "b", "other").unwrap();

    assert_eq!(load_slot(&mut conn, "a").unwrap().as_deref(), Some("second"));
    assert_eq!(load_slot(&mut conn, "b").unwrap().as_deref(), Some("other"));
}

#[test]
fn document_round_trip() {
    let mut conn = in_memory();
    assert!(load_document(&mut conn).unwrap().is_none());

    let doc = serde_json::json!({ "ingredients": [], "recipes": [{ "id": 1 }] });
    save_document(&mut conn, &doc).unwrap();
    assert_eq!(load_document(&mut conn).unwrap(), Some(doc));
}

#[test]
fn corrupt_document_is_an_error() {
    let mut conn = in_memory();
    save_slot(&mut conn, DOCUMENT_SLOT, "{not json").unwrap();
    assert!(matches!(
        load_document(&mut conn),
        Err(StorageError::Json(_))
    ));
}

#[test]
fn on_disk_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.sqlite");
    {
        let mut conn = establish_connection(&path).unwrap();
        save_slot(&mut conn, DOCUMENT_SLOT, "{}").unwrap();
    }
    let mut conn = establish_connection(&path).unwrap();
    assert_eq!(
        load_slot(&mut conn, DOCUMENT_SLOT).unwrap().as_deref(),
        Some("{}")
    );
}

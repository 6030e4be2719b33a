//! Versioned schema management driven by `PRAGMA user_version`

use rusqlite::{params, Connection};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{error, info, warn};

use super::tables::{
    tables_owned_by, ALL_TABLES, COMPONENT, GATE, SETTINGS, SHIP_STORAGE, SHIP_TYPE, STORAGE,
    SUBORDINATE, SUPERHIGHWAY, WARE,
};
use super::types::{TableOwner, TableSchema, ViewSchema};
use super::views::{
    ALL_VIEWS, PLAYER_SHIPS, PLAYER_SHIPS_TRANSACTIONS_LOG, PLAYER_SHIPS_WITH_TRADES,
    SHIPS_MACRO_TRANSPORT_CAPACITY, STATIONS,
};
use crate::localization::DEFAULT_LANGUAGE;
use crate::writer::schema_gen::{
    generate_create_table, generate_create_view, generate_drop_view, generate_indexes,
};
use crate::writer::sqlite::clear_tables;

/// Version a fresh store is created at and older stores migrate to
pub const SCHEMA_VERSION: i64 = 8;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to read schema version: {0}")]
    Version(#[source] rusqlite::Error),
    #[error("failed to create schema: {0}")]
    Create(#[source] rusqlite::Error),
    #[error("migration to version {version} ({description}) failed: {source}")]
    Step {
        version: i64,
        description: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// Outcome of bringing a store to the current schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaStatus {
    Created,
    Current,
    Migrated { from: i64, to: i64 },
    /// A step failed; the store stays at `version`
    Degraded {
        version: i64,
        target: i64,
        error: String,
    },
}

impl SchemaStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SchemaStatus::Degraded { .. })
    }
}

impl fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaStatus::Created => write!(f, "created at version {}", SCHEMA_VERSION),
            SchemaStatus::Current => write!(f, "up to date (version {})", SCHEMA_VERSION),
            SchemaStatus::Migrated { from, to } => write!(f, "migrated from {} to {}", from, to),
            SchemaStatus::Degraded {
                version,
                target,
                error,
            } => write!(
                f,
                "degraded at version {} (target {}): {}",
                version, target, error
            ),
        }
    }
}

/// One forward-only schema change
pub struct MigrationStep {
    /// Version the store is at after this step
    pub version: i64,
    pub description: &'static str,
    /// Save-derived rows no longer match the new shape and must be reimported
    pub clears_save_data: bool,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
}

pub static MIGRATIONS: &[MigrationStep] = &[
    MigrationStep {
        version: 1,
        description: "recreate ware table",
        clears_save_data: true,
        apply: migrate_v1,
    },
    MigrationStep {
        version: 2,
        description: "rebuild transaction log view",
        clears_save_data: false,
        apply: migrate_v2,
    },
    MigrationStep {
        version: 3,
        description: "recreate component, add storages and cargo capacity view",
        clears_save_data: true,
        apply: migrate_v3,
    },
    MigrationStep {
        version: 4,
        description: "add gates and superhighways",
        clears_save_data: true,
        apply: migrate_v4,
    },
    MigrationStep {
        version: 5,
        description: "add subordinates",
        clears_save_data: true,
        apply: migrate_v5,
    },
    MigrationStep {
        version: 6,
        description: "rebuild transaction log view",
        clears_save_data: true,
        apply: migrate_v6,
    },
    MigrationStep {
        version: 7,
        description: "add ship types",
        clears_save_data: true,
        apply: migrate_v7,
    },
    MigrationStep {
        version: 8,
        description: "rebuild catalog tables with dedupe keys",
        clears_save_data: false,
        apply: migrate_v8,
    },
];

/// Create, migrate or accept the store schema
pub fn ensure_schema(conn: &Connection) -> Result<SchemaStatus, MigrationError> {
    let version = user_version(conn).map_err(MigrationError::Version)?;

    if version == 0 && !has_user_tables(conn).map_err(MigrationError::Version)? {
        create_schema(conn).map_err(MigrationError::Create)?;
        info!("Created store schema at version {}", SCHEMA_VERSION);
        return Ok(SchemaStatus::Created);
    }

    if version >= SCHEMA_VERSION {
        if version > SCHEMA_VERSION {
            warn!(
                "Store schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            );
        }
        return Ok(SchemaStatus::Current);
    }

    Ok(migrate(conn, version, MIGRATIONS))
}

/// Apply every step above `from`, each in its own transaction
pub(crate) fn migrate(conn: &Connection, from: i64, steps: &[MigrationStep]) -> SchemaStatus {
    let target = steps.last().map_or(from, |s| s.version);
    let mut version = from;
    let mut clear_save_data = false;

    for step in steps.iter().filter(|s| s.version > from) {
        info!(
            "Migrating store schema to version {}: {}",
            step.version, step.description
        );

        if let Err(source) = run_step(conn, step) {
            let err = MigrationError::Step {
                version: step.version,
                description: step.description,
                source,
            };
            error!("{}", err);
            clear_save_data_after_migration(conn, clear_save_data);
            return SchemaStatus::Degraded {
                version,
                target,
                error: err.to_string(),
            };
        }

        version = step.version;
        clear_save_data |= step.clears_save_data;
    }

    clear_save_data_after_migration(conn, clear_save_data);
    SchemaStatus::Migrated { from, to: version }
}

fn run_step(conn: &Connection, step: &MigrationStep) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    (step.apply)(&tx)?;
    tx.pragma_update(None, "user_version", step.version)?;
    tx.commit()
}

fn clear_save_data_after_migration(conn: &Connection, needed: bool) {
    if !needed {
        return;
    }
    info!("Clearing save-game data after schema change; the save must be imported again");
    if let Err(e) = clear_tables(conn, &tables_owned_by(TableOwner::SaveGame)) {
        warn!("Failed to clear save-game data after migration: {:#}", e);
    }
}

/// Current `PRAGMA user_version`
pub fn user_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

fn has_user_tables(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%')",
        [],
        |row| row.get(0),
    )
}

fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    for table in ALL_TABLES {
        create_table(&tx, table)?;
    }
    for view in ALL_VIEWS {
        tx.execute_batch(&generate_create_view(view))?;
    }
    ensure_settings_row(&tx)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()
}

fn create_table(conn: &Connection, schema: &TableSchema) -> rusqlite::Result<()> {
    conn.execute_batch(&generate_create_table(schema))?;
    for index in generate_indexes(schema) {
        conn.execute_batch(&index)?;
    }
    Ok(())
}

/// Table plus its non-unique indexes; unique keys arrive with version 8
fn create_table_without_keys(conn: &Connection, schema: &TableSchema) -> rusqlite::Result<()> {
    conn.execute_batch(&generate_create_table(schema))?;
    for (index, sql) in schema.indexes.iter().zip(generate_indexes(schema)) {
        if !index.unique {
            conn.execute_batch(&sql)?;
        }
    }
    Ok(())
}

fn recreate_table(conn: &Connection, schema: &TableSchema) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", schema.name))?;
    create_table_without_keys(conn, schema)
}

fn rebuild_view(conn: &Connection, view: &ViewSchema) -> rusqlite::Result<()> {
    conn.execute_batch(&generate_drop_view(view))?;
    conn.execute_batch(&generate_create_view(view))
}

fn ensure_settings_row(conn: &Connection) -> rusqlite::Result<()> {
    create_table(conn, &SETTINGS)?;
    conn.execute(
        "INSERT INTO settings (current_language) SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM settings)",
        params![DEFAULT_LANGUAGE],
    )?;
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Recreate a table in its current shape, keeping the rows that survive
/// its unique keys (later rows win)
fn rebuild_table_deduplicated(conn: &Connection, schema: &TableSchema) -> rusqlite::Result<()> {
    let old_columns = table_columns(conn, schema.name)?;
    if old_columns.is_empty() {
        return create_table(conn, schema);
    }

    // index names stay taken by the renamed table otherwise
    let old_indexes: Vec<String> = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL")?
        .query_map([schema.name], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    for index in old_indexes {
        conn.execute_batch(&format!("DROP INDEX {}", index))?;
    }

    let staging = format!("{}_before_rebuild", schema.name);
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {staging};
         ALTER TABLE {name} RENAME TO {staging};",
        staging = staging,
        name = schema.name
    ))?;
    conn.execute_batch(&generate_create_table(schema))?;
    // unique keys must exist before the copy for OR REPLACE to dedupe
    for index in generate_indexes(schema) {
        conn.execute_batch(&index)?;
    }

    let copied: Vec<&str> = schema
        .columns
        .iter()
        .filter(|c| c.is_insertable() && !(c.primary_key && c.name == "id"))
        .map(|c| c.name)
        .filter(|name| old_columns.iter().any(|old| old == name))
        .collect();

    if !copied.is_empty() {
        let columns = copied.join(", ");
        conn.execute_batch(&format!(
            "INSERT OR REPLACE INTO {name} ({columns}) SELECT {columns} FROM {staging} ORDER BY rowid",
            name = schema.name,
            columns = columns,
            staging = staging
        ))?;
    }

    conn.execute_batch(&format!("DROP TABLE {}", staging))?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    ensure_settings_row(conn)?;
    recreate_table(conn, &WARE)
}

fn migrate_v2(conn: &Connection) -> rusqlite::Result<()> {
    rebuild_view(conn, &PLAYER_SHIPS_TRANSACTIONS_LOG)
}

fn migrate_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&generate_drop_view(&PLAYER_SHIPS_TRANSACTIONS_LOG))?;
    recreate_table(conn, &COMPONENT)?;
    create_table_without_keys(conn, &STORAGE)?;
    create_table_without_keys(conn, &SHIP_STORAGE)?;
    rebuild_view(conn, &SHIPS_MACRO_TRANSPORT_CAPACITY)?;
    rebuild_view(conn, &PLAYER_SHIPS_TRANSACTIONS_LOG)
}

fn migrate_v4(conn: &Connection) -> rusqlite::Result<()> {
    create_table_without_keys(conn, &GATE)?;
    create_table_without_keys(conn, &SUPERHIGHWAY)?;
    rebuild_view(conn, &PLAYER_SHIPS_TRANSACTIONS_LOG)
}

fn migrate_v5(conn: &Connection) -> rusqlite::Result<()> {
    create_table_without_keys(conn, &SUBORDINATE)
}

fn migrate_v6(conn: &Connection) -> rusqlite::Result<()> {
    for view in [&STATIONS, &PLAYER_SHIPS, &PLAYER_SHIPS_WITH_TRADES] {
        conn.execute_batch(&generate_create_view(view))?;
    }
    rebuild_view(conn, &PLAYER_SHIPS_TRANSACTIONS_LOG)
}

fn migrate_v7(conn: &Connection) -> rusqlite::Result<()> {
    create_table_without_keys(conn, &SHIP_TYPE)
}

fn migrate_v8(conn: &Connection) -> rusqlite::Result<()> {
    // table renames revalidate every view in the schema
    for view in ALL_VIEWS.iter().rev() {
        conn.execute_batch(&generate_drop_view(view))?;
    }

    rebuild_table_deduplicated(conn, &STORAGE)?;
    rebuild_table_deduplicated(conn, &SHIP_STORAGE)?;
    rebuild_table_deduplicated(conn, &SHIP_TYPE)?;

    for view in ALL_VIEWS {
        conn.execute_batch(&generate_create_view(view))?;
    }
    Ok(())
}

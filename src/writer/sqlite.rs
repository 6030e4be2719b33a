use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Params};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::localization::{TextLookup, DEFAULT_LANGUAGE};
use crate::parser::parse_text_ref;
use crate::schema::{ensure_schema, SchemaStatus, TableSchema};

/// Statements per transaction for bulk writes
pub const BATCH_SIZE: usize = 1000;

/// Owned handle on the SQLite store.
///
/// The connection is opened (and the schema ensured) by [`Store::open`];
/// after [`Store::close`] the next [`Store::conn`] reopens it.
pub struct Store {
    path: PathBuf,
    conn: Option<Connection>,
    schema_status: SchemaStatus,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
            }
        }

        let conn = open_connection(path)?;
        let schema_status = ensure_schema(&conn)
            .with_context(|| format!("Failed to prepare schema of {:?}", path))?;

        if schema_status.is_degraded() {
            warn!("Store {:?} schema {}", path, schema_status);
        } else {
            info!("Store {:?} schema {}", path, schema_status);
        }

        Ok(Self {
            path: path.to_path_buf(),
            conn: Some(conn),
            schema_status,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_status(&self) -> &SchemaStatus {
        &self.schema_status
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// The open connection, reopening it when closed
    pub fn conn(&mut self) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                debug!("Reopening store {:?}", self.path);
                open_connection(&self.path)?
            }
        };
        Ok(self.conn.insert(conn))
    }

    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                warn!("Failed to close store {:?}: {}", self.path, e);
            }
        }
    }

    pub fn current_language(&mut self) -> Result<u16> {
        current_language(self.conn()?)
    }

    pub fn set_current_language(&mut self, language: u16) -> Result<()> {
        set_current_language(self.conn()?, language)
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -64000;",
    )?;

    Ok(conn)
}

/// Explicit transaction committed every `size` statements.
///
/// Dropping an unfinished batch rolls back the statements since the last
/// checkpoint.
pub struct Batch<'c> {
    conn: &'c Connection,
    size: usize,
    pending: usize,
    total: u64,
    active: bool,
}

impl<'c> Batch<'c> {
    pub fn begin(conn: &'c Connection, size: usize) -> Result<Self> {
        conn.execute_batch("BEGIN")
            .context("Failed to begin transaction")?;
        Ok(Self {
            conn,
            size: size.max(1),
            pending: 0,
            total: 0,
            active: true,
        })
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    /// Run one statement inside the batch, returning the changed row count
    pub fn execute<P: Params>(&mut self, sql: &str, params: P) -> Result<usize> {
        let changed = {
            let mut stmt = self.conn.prepare_cached(sql)?;
            stmt.execute(params)?
        };
        self.record()?;
        Ok(changed)
    }

    fn record(&mut self) -> Result<()> {
        self.pending += 1;
        self.total += 1;
        if self.pending >= self.size {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Commit what is pending and start a new transaction
    pub fn checkpoint(&mut self) -> Result<()> {
        if self.active {
            self.conn
                .execute_batch("COMMIT")
                .context("Failed to commit batch")?;
            self.active = false;
        }
        self.conn
            .execute_batch("BEGIN")
            .context("Failed to begin transaction")?;
        self.active = true;
        self.pending = 0;
        Ok(())
    }

    /// Commit and return the number of statements executed
    pub fn finish(mut self) -> Result<u64> {
        if self.active {
            self.active = false;
            self.conn
                .execute_batch("COMMIT")
                .context("Failed to commit batch")?;
        }
        Ok(self.total)
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back batch: {}", e);
            }
        }
    }
}

pub fn object_exists(conn: &Connection, kind: &str, name: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2)",
        [kind, name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    object_exists(conn, "table", name)
}

pub fn view_exists(conn: &Connection, name: &str) -> Result<bool> {
    object_exists(conn, "view", name)
}

/// Run a query yielding a single integer (NULL reads as 0)
pub fn scalar_i64(conn: &Connection, sql: &str) -> Result<i64> {
    let value: Option<i64> = conn
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("Query failed: {}", sql))?;
    Ok(value.unwrap_or(0))
}

/// Delete every row of the given tables, then compact the file
pub fn clear_tables(conn: &Connection, tables: &[&TableSchema]) -> Result<()> {
    for table in tables {
        if !table_exists(conn, table.name)? {
            continue;
        }
        conn.execute_batch(&format!("DELETE FROM {}", table.name))
            .with_context(|| format!("Failed to clear table: {}", table.name))?;
        debug!("Cleared table {}", table.name);
    }
    conn.execute_batch("VACUUM").context("Failed to vacuum")?;
    Ok(())
}

pub fn current_language(conn: &Connection) -> Result<u16> {
    let language: Option<i64> = conn
        .query_row("SELECT current_language FROM settings LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(language
        .and_then(|l| u16::try_from(l).ok())
        .unwrap_or(DEFAULT_LANGUAGE))
}

pub fn set_current_language(conn: &Connection, language: u16) -> Result<()> {
    let updated = conn.execute("UPDATE settings SET current_language = ?1", [language])?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO settings (current_language) VALUES (?1)",
            [language],
        )?;
    }
    Ok(())
}

/// One table or view and its row count
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub kind: String,
    pub rows: Option<i64>,
}

/// Tables and views of the store, by name
pub fn list_objects(conn: &Connection) -> Result<Vec<TableInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, type FROM sqlite_master
         WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
         ORDER BY type, name",
    )?;
    let objects = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(objects
        .into_iter()
        .map(|(name, kind)| {
            let rows = scalar_i64(conn, &format!("SELECT COUNT(*) FROM \"{}\"", name)).ok();
            TableInfo { name, kind, rows }
        })
        .collect())
}

// =============================================================================
// Lookup dictionaries used during save import
// =============================================================================

fn string_map(conn: &Connection, sql: &str) -> Result<HashMap<String, String>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("Failed to prepare lookup: {}", sql))?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut map = HashMap::new();
    for row in rows {
        let (key, value) = row?;
        map.entry(key.to_lowercase()).or_insert(value);
    }
    Ok(map)
}

/// Ship macro -> ship type
pub fn load_ship_types(conn: &Connection) -> Result<HashMap<String, String>> {
    string_map(conn, "SELECT macro, type FROM ship_type")
}

/// Faction id -> short name
pub fn load_faction_short_names(conn: &Connection) -> Result<HashMap<String, String>> {
    string_map(
        conn,
        "SELECT id, shortname FROM faction WHERE shortname IS NOT NULL AND shortname != ''",
    )
}

/// Component macro -> ware display name
pub fn load_ware_component_names(conn: &Connection) -> Result<HashMap<String, String>> {
    string_map(
        conn,
        "SELECT component_macro, text FROM ware WHERE component_macro IS NOT NULL AND component_macro != ''",
    )
}

/// Product ware id -> factory name.
///
/// A product's factory name sits three entries after the ware's own name
/// on the same text page.
pub fn load_factory_names(conn: &Connection) -> Result<HashMap<String, String>> {
    let products = string_map(
        conn,
        r"SELECT id, name FROM ware
          WHERE id NOT LIKE '%\_%' ESCAPE '\'
            AND id <> 'credits'
            AND id <> 'crew'",
    )?;

    let mut lookup = TextLookup::new();
    let mut names = HashMap::new();
    for (ware, name) in products {
        let Some((page, id)) = parse_text_ref(&name) else {
            continue;
        };
        if let Some(factory) = lookup.resolve_at(conn, page, id + 3) {
            names.insert(ware, factory);
        }
    }
    Ok(names)
}

//! Summary counts over the store

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::writer::sqlite::{current_language, scalar_i64, table_exists, view_exists};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub trades: i64,
    pub gates: i64,
    pub subordinates: i64,
    pub player_ships: i64,
    pub stations: i64,
    pub removed: i64,
    pub wares: i64,
    pub factions: i64,
    pub sector_names: i64,
    pub storages: i64,
    pub ship_storages: i64,
    pub ship_types: i64,
    pub languages: i64,
    pub current_language: i64,
    pub current_language_texts: i64,
}

/// `COUNT(*)` of `sql`, or 0 when `table` is missing
fn guarded(conn: &Connection, table: &str, sql: &str) -> Result<i64> {
    if !table_exists(conn, table)? {
        return Ok(0);
    }
    scalar_i64(conn, sql)
}

/// Count through a view, falling back to the equivalent query
fn through_view(conn: &Connection, view: &str, fallback: &str) -> Result<i64> {
    if view_exists(conn, view)? {
        return scalar_i64(conn, &format!("SELECT COUNT(*) FROM {}", view));
    }
    guarded(conn, "component", fallback)
}

impl Stats {
    pub fn collect(conn: &Connection) -> Result<Self> {
        Ok(Self {
            trades: guarded(conn, "trade", "SELECT COUNT(*) FROM trade")?,
            gates: guarded(conn, "gate", "SELECT COUNT(*) FROM gate")?,
            subordinates: guarded(conn, "subordinate", "SELECT COUNT(*) FROM subordinate")?,
            player_ships: through_view(
                conn,
                "player_ships",
                "SELECT COUNT(*) FROM component WHERE type = 'ship' AND owner = 'player'",
            )?,
            stations: through_view(
                conn,
                "stations",
                "SELECT COUNT(*) FROM component WHERE type = 'station'",
            )?,
            removed: guarded(
                conn,
                "component",
                "SELECT COUNT(*) FROM component WHERE type = 'removed'",
            )?,
            wares: guarded(conn, "ware", "SELECT COUNT(*) FROM ware")?,
            factions: guarded(conn, "faction", "SELECT COUNT(*) FROM faction")?,
            sector_names: guarded(
                conn,
                "cluster_sector_name",
                "SELECT COUNT(*) FROM cluster_sector_name",
            )?,
            storages: guarded(conn, "storage", "SELECT COUNT(*) FROM storage")?,
            ship_storages: guarded(conn, "ship_storage", "SELECT COUNT(*) FROM ship_storage")?,
            ship_types: guarded(conn, "ship_type", "SELECT COUNT(*) FROM ship_type")?,
            languages: guarded(conn, "text", "SELECT COUNT(DISTINCT language) FROM text")?,
            current_language: match table_exists(conn, "settings")? {
                true => i64::from(current_language(conn)?),
                false => 0,
            },
            current_language_texts: match view_exists(conn, "lang")? {
                true => scalar_i64(conn, "SELECT COUNT(*) FROM lang")?,
                false => 0,
            },
        })
    }

    /// Recount; on failure the previous snapshot is kept. Returns whether
    /// the counts were replaced.
    pub fn refresh(&mut self, conn: &Connection) -> bool {
        match Self::collect(conn) {
            Ok(stats) => {
                debug!("Refreshed stats: {:?}", stats);
                *self = stats;
                true
            }
            Err(e) => {
                warn!("Failed to refresh stats: {:#}", e);
                false
            }
        }
    }

    fn rows(&self) -> [(&'static str, i64); 15] {
        [
            ("trades", self.trades),
            ("gates", self.gates),
            ("subordinates", self.subordinates),
            ("player ships", self.player_ships),
            ("stations", self.stations),
            ("removed objects", self.removed),
            ("wares", self.wares),
            ("factions", self.factions),
            ("sector names", self.sector_names),
            ("storages", self.storages),
            ("ship storages", self.ship_storages),
            ("ship types", self.ship_types),
            ("languages", self.languages),
            ("current language", self.current_language),
            ("current language texts", self.current_language_texts),
        ]
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.rows() {
            writeln!(f, "  {:<24} {}", label, value)?;
        }
        Ok(())
    }
}

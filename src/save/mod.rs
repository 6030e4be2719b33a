//! Save-game import
//!
//! A save is one (usually gzip-compressed) XML document. It is read in a
//! single forward pass: the universe section yields sectors, gates,
//! superhighways, player ships, stations and command structure; the trade
//! log yields trades; the removed section yields destroyed objects.

mod importer;
pub mod links;

use anyhow::{Context, Result};
use flate2::bufread::GzDecoder;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::LoadOptions;
use crate::parser::XmlStream;
use crate::progress::{Counter, ProgressEvent, ProgressSink};
use crate::schema::{tables_owned_by, TableOwner};
use crate::writer::sqlite::clear_tables;
use crate::writer::Store;
use importer::{Importer, Lookups};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Half-links still buffered when the save ended
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Unresolved {
    pub superhighways: usize,
    pub highway_gates: usize,
    pub subordinates: usize,
    pub stations: usize,
}

impl Unresolved {
    pub fn total(&self) -> usize {
        self.superhighways + self.highway_gates + self.subordinates + self.stations
    }
}

/// What a save import wrote
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// Save time in milliseconds; trade times are relative to it
    pub game_time: i64,
    pub counters: BTreeMap<Counter, u64>,
    pub unresolved: Unresolved,
}

impl ImportReport {
    pub fn add(&mut self, counter: Counter, value: u64) {
        *self.counters.entry(counter).or_default() += value;
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }
}

/// Open a save file, decompressing it when it starts with the gzip magic
pub fn open_save(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open save: {:?}", path))?;
    let mut reader = BufReader::new(file);
    let compressed = reader
        .fill_buf()
        .with_context(|| format!("Failed to read save: {:?}", path))?
        .starts_with(&GZIP_MAGIC);

    if compressed {
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Replace the save tables with the content of `save_path`. A missing save
/// is skipped with a warning.
pub fn import_save(
    store: &mut Store,
    save_path: Option<&Path>,
    options: &LoadOptions,
    sink: &mut dyn ProgressSink,
) -> Result<ImportReport> {
    let path = match save_path {
        Some(path) if path.is_file() => path,
        Some(path) => {
            warn!("Save file {:?} does not exist; skipping import", path);
            return Ok(ImportReport::default());
        }
        None => {
            warn!("No save file set; skipping import");
            return Ok(ImportReport::default());
        }
    };

    info!("Importing save {:?}", path);
    let reader = open_save(path)?;
    import_reader(store.conn()?, reader, options, sink)
}

/// Import a save document from any reader
pub fn import_reader<R: BufRead>(
    conn: &Connection,
    reader: R,
    options: &LoadOptions,
    sink: &mut dyn ProgressSink,
) -> Result<ImportReport> {
    let start = Instant::now();

    sink.report(&ProgressEvent::status("Clearing save tables..."));
    clear_tables(conn, &tables_owned_by(TableOwner::SaveGame))?;
    let lookups = Lookups::load(conn)?;

    sink.report(&ProgressEvent::status("Importing save..."));
    let mut stream = XmlStream::new(reader);
    let mut importer = Importer::new(conn, lookups, options, &mut *sink)?;
    let outcome = importer.run(&mut stream);
    let report = importer.finish()?;

    if let Err(e) = outcome {
        error!("Save import stopped early: {:#}", e);
        return Err(e.context("Failed to read save"));
    }

    sink.report(&ProgressEvent::status("Save imported").with_counters(&report.counters));
    info!(
        "Imported save in {:.1}s: {} ships, {} stations, {} trades, {} gates, {} superhighways, {} subordinates, {} removed",
        start.elapsed().as_secs_f64(),
        report.get(Counter::Ships),
        report.get(Counter::Stations),
        report.get(Counter::Trades),
        report.get(Counter::Gates),
        report.get(Counter::Superhighways),
        report.get(Counter::Subordinates),
        report.get(Counter::Removed),
    );
    Ok(report)
}

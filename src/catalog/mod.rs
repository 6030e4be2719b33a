//! Game catalog loading
//!
//! Reads localization, wares, factions, sector names and storage macros
//! from the base game and every extension package into the catalog tables.

mod factions;
mod map_defaults;
mod storages;
mod texts;
mod wares;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::LoadOptions;
use crate::content::{ContentProvider, ContentSource, PackageOrder};
use crate::localization::{RawTexts, TextLookup};
use crate::progress::{Counter, ProgressEvent, ProgressSink};
use crate::schema::{tables_owned_by, TableOwner};
use crate::writer::sqlite::{clear_tables, set_current_language};
use crate::writer::{Batch, Store};

/// What a catalog load wrote
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogReport {
    pub packages: Vec<String>,
    pub game_language: Option<u16>,
    pub counters: BTreeMap<Counter, u64>,
}

impl CatalogReport {
    pub fn add(&mut self, counter: Counter, value: u64) {
        *self.counters.entry(counter).or_default() += value;
    }

    pub fn set(&mut self, counter: Counter, value: u64) {
        self.counters.insert(counter, value);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    pub(crate) fn progress(&self, status: &str, package: &str) -> ProgressEvent {
        ProgressEvent::status(status)
            .with_package(package)
            .with_counters(&self.counters)
    }
}

/// One opened package
pub(crate) struct Package {
    pub label: String,
    pub source: Box<dyn ContentSource>,
}

/// Shared state of the per-file loaders
pub(crate) struct LoadContext<'a> {
    pub conn: &'a Connection,
    pub lookup: TextLookup,
    pub batch_size: usize,
    pub report: CatalogReport,
    pub sink: &'a mut dyn ProgressSink,
}

impl LoadContext<'_> {
    pub fn emit(&mut self, status: &str, package: &str) {
        let event = self.report.progress(status, package);
        self.sink.report(&event);
    }

    pub fn emit_file(&mut self, package: &str, file: &str) {
        let event = ProgressEvent::new()
            .with_package(package)
            .with_file(file)
            .with_counters(&self.report.counters);
        self.sink.report(&event);
    }
}

/// Parser of one catalog file, writing through the package batch
pub(crate) type FileParser = fn(&mut LoadContext<'_>, &mut Batch<'_>, &mut dyn BufRead) -> Result<()>;

/// Run `parse` over every file of `package` matching one of `masks`, in a
/// single batch. A file that fails midway keeps the rows written before the
/// failure and is logged and skipped.
pub(crate) fn load_files(
    ctx: &mut LoadContext,
    package: &Package,
    masks: &[&str],
    what: &str,
    parse: FileParser,
) -> Result<()> {
    let mut entries = Vec::new();
    for mask in masks {
        match package.source.list_entries(mask) {
            Ok(found) => entries.extend(found),
            Err(e) => warn!("Failed to list {} files of {}: {:#}", what, package.label, e),
        }
    }
    if entries.is_empty() {
        debug!("No {} files in {}", what, package.label);
        return Ok(());
    }

    let start = Instant::now();
    debug!("Parsing {} {} file(s) of {}", entries.len(), what, package.label);

    let mut batch = Batch::begin(ctx.conn, ctx.batch_size)?;
    for entry in &entries {
        let parsed = package
            .source
            .open_stream(entry)
            .and_then(|mut reader| parse(ctx, &mut batch, reader.as_mut()));
        if let Err(e) = parsed {
            warn!("Skipping {} file {} of {}: {:#}", what, entry.path, package.label, e);
        }
        ctx.report.add(Counter::Files, 1);
        ctx.emit_file(&package.label, &entry.path);
    }
    let written = batch.finish()?;

    debug!(
        "Finished {} files of {} in {:.2}s ({} statements)",
        what,
        package.label,
        start.elapsed().as_secs_f64(),
        written
    );
    Ok(())
}

/// Game language id from the first line of `<game>/lang.dat`
pub fn read_game_language(game_dir: &Path) -> Option<u16> {
    let content = std::fs::read_to_string(game_dir.join("lang.dat")).ok()?;
    let language: u16 = content.lines().next()?.trim().parse().ok()?;
    (language > 0).then_some(language)
}

/// Mask of the localization files to read
pub fn text_mask(game_language: Option<u16>, only_game_language: bool) -> String {
    match game_language {
        Some(language) if only_game_language => format!("t/*-l{:03}.xml", language),
        _ => "t/*-l*.xml".to_string(),
    }
}

fn package_label(relative: &Path) -> String {
    if relative.as_os_str().is_empty() {
        return "game".to_string();
    }
    relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative.to_string_lossy().into_owned())
}

/// Replace every catalog table with the content of `game_dir` and its
/// extensions. A missing game folder is skipped with a warning.
pub fn load_catalogs(
    store: &mut Store,
    game_dir: Option<&Path>,
    provider: &dyn ContentProvider,
    order: &dyn PackageOrder,
    options: &LoadOptions,
    sink: &mut dyn ProgressSink,
) -> Result<CatalogReport> {
    let game_dir = match game_dir {
        Some(dir) if dir.is_dir() => dir,
        _ => {
            warn!("Game folder is not set or does not exist; skipping catalog load");
            return Ok(CatalogReport::default());
        }
    };

    let start = Instant::now();
    info!("Loading game catalogs from {:?}", game_dir);

    let mut relative_packages = vec![PathBuf::new()];
    match order.sorted_extensions(game_dir) {
        Ok(extensions) => relative_packages.extend(extensions),
        Err(e) => warn!("Failed to order extensions, loading the base game only: {:#}", e),
    }

    let mut packages = Vec::new();
    for relative in &relative_packages {
        let label = package_label(relative);
        match provider.open_package(&game_dir.join(relative)) {
            Ok(source) => packages.push(Package { label, source }),
            Err(e) => warn!("Skipping package {}: {:#}", label, e),
        }
    }
    debug!("Package queue has {} entries", packages.len());

    let conn: &Connection = store.conn()?;
    clear_tables(conn, &tables_owned_by(TableOwner::Catalog))?;

    let game_language = read_game_language(game_dir);
    if let Some(language) = game_language {
        set_current_language(conn, language)?;
        info!("Game language is {}", language);
    }

    let mut ctx = LoadContext {
        conn,
        lookup: TextLookup::new(),
        batch_size: options.batch_size,
        report: CatalogReport {
            packages: packages.iter().map(|p| p.label.clone()).collect(),
            game_language,
            counters: BTreeMap::new(),
        },
        sink,
    };

    // all localization first so references across packages resolve
    let mask = text_mask(game_language, options.load_only_game_language);
    let mut raw = RawTexts::new();
    for package in &packages {
        ctx.emit("Parsing texts...", &package.label);
        texts::collect(&mut ctx, package, &mask, &mut raw);
    }
    let stored_languages = texts::store(&mut ctx, &raw, game_language, options)?;
    if game_language.is_none() {
        if let [language] = stored_languages.as_slice() {
            set_current_language(conn, *language)?;
        }
    }

    for package in &packages {
        ctx.emit("Parsing map defaults...", &package.label);
        map_defaults::load(&mut ctx, package)?;
        ctx.emit("Parsing wares...", &package.label);
        wares::load(&mut ctx, package)?;
        ctx.emit("Parsing factions...", &package.label);
        factions::load(&mut ctx, package)?;
        ctx.emit("Parsing storages & ship storages...", &package.label);
        storages::load(&mut ctx, package)?;
        debug!("Completed package {}", package.label);
    }

    ctx.emit("Catalogs loaded", "");
    let report = ctx.report;
    info!(
        "Loaded catalogs in {:.1}s: {} files, {} texts, {} wares, {} factions, {} sector names, {} storages, {} ship storages, {} ship types",
        start.elapsed().as_secs_f64(),
        report.get(Counter::Files),
        report.get(Counter::Texts),
        report.get(Counter::Wares),
        report.get(Counter::Factions),
        report.get(Counter::SectorNames),
        report.get(Counter::Storages),
        report.get(Counter::ShipStorages),
        report.get(Counter::ShipTypes),
    );

    Ok(report)
}

#[cfg(test)]
impl<'a> LoadContext<'a> {
    pub fn for_tests(conn: &'a Connection, sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            conn,
            lookup: TextLookup::new(),
            batch_size: 2,
            report: CatalogReport::default(),
            sink,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::content::MemorySource;
    use crate::progress::NullSink;
    use crate::schema::ensure_schema;
    use tempfile::TempDir;

    pub(crate) fn context_parts() -> (Connection, NullSink) {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        (conn, NullSink)
    }

    pub(crate) fn memory_package(files: &[(&str, &str)]) -> Package {
        let mut source = MemorySource::new();
        for (path, content) in files {
            source.insert(path, content.as_bytes());
        }
        Package {
            label: "game".to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn query_strings(conn: &Connection, sql: &str) -> Vec<String> {
        let mut stmt = conn.prepare(sql).unwrap();
        let rows = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
        rows.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_text_mask() {
        assert_eq!(text_mask(Some(44), true), "t/*-l044.xml");
        assert_eq!(text_mask(Some(7), true), "t/*-l007.xml");
        assert_eq!(text_mask(Some(44), false), "t/*-l*.xml");
        assert_eq!(text_mask(None, true), "t/*-l*.xml");
    }

    #[test]
    fn test_read_game_language() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_game_language(dir.path()), None);
        std::fs::write(dir.path().join("lang.dat"), "49\r\n").unwrap();
        assert_eq!(read_game_language(dir.path()), Some(49));
        std::fs::write(dir.path().join("lang.dat"), "0\n").unwrap();
        assert_eq!(read_game_language(dir.path()), None);
    }

    #[test]
    fn test_package_label() {
        assert_eq!(package_label(Path::new("")), "game");
        assert_eq!(
            package_label(Path::new("extensions/ego_dlc_split")),
            "ego_dlc_split"
        );
    }
}

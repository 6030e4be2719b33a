use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::io::BufRead;
use tracing::{debug, warn};

use super::links::{GateSide, HighwayLinker, SubordinateLink, SubordinateLinker, Superhighway};
use super::{ImportReport, Unresolved};
use crate::config::LoadOptions;
use crate::localization::TextLookup;
use crate::parser::{name_index_suffix, normalize_time, parse_id, parse_int, Element, XmlEvent, XmlStream};
use crate::progress::{Counter, ProgressEvent, ProgressSink};
use crate::writer::sqlite::{
    load_faction_short_names, load_factory_names, load_ship_types, load_ware_component_names,
};
use crate::writer::Batch;

const INSERT_COMPONENT: &str = "INSERT OR IGNORE INTO component(id, type, class, macro, owner, sector, name, nameindex, code) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
const INSERT_TRADE: &str =
    "INSERT OR IGNORE INTO trade(seller, buyer, ware, price, volume, time) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const INSERT_GATE: &str =
    "INSERT INTO gate(gate_id, code, sector, connection, connected) VALUES (?1, ?2, ?3, ?4, ?5)";
const INSERT_SUPERHIGHWAY: &str = "INSERT OR IGNORE INTO superhighway(id, macro, sector_from, entrygate, sector_to, exitgate) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const INSERT_SUBORDINATE: &str =
    "INSERT INTO subordinate(commander_id, subordinate_id, assignment) VALUES (?1, ?2, ?3)";
const SELECT_COMPONENT: &str = "SELECT type, class, macro, owner, sector, name, nameindex, code FROM component WHERE id = ?1";

const PROGRESS_EVERY: u64 = 2000;

/// Catalog data the importer resolves names and filters with
#[derive(Debug, Default)]
pub(crate) struct Lookups {
    pub ship_types: HashMap<String, String>,
    pub faction_short_names: HashMap<String, String>,
    pub ware_component_names: HashMap<String, String>,
    pub factory_names: HashMap<String, String>,
}

impl Lookups {
    pub fn load(conn: &Connection) -> Result<Self> {
        let lookups = Self {
            ship_types: load_ship_types(conn)?,
            faction_short_names: load_faction_short_names(conn)?,
            ware_component_names: load_ware_component_names(conn)?,
            factory_names: load_factory_names(conn)?,
        };
        debug!(
            "Loaded lookups: {} ship types, {} faction short names, {} ware component names, {} factory names",
            lookups.ship_types.len(),
            lookups.faction_short_names.len(),
            lookups.ware_component_names.len(),
            lookups.factory_names.len()
        );
        Ok(lookups)
    }

    /// Drones, personal vehicles and laser towers are not tracked
    fn is_filtered_ship(&self, macro_name: &str) -> bool {
        match self.ship_types.get(&macro_name.to_lowercase()) {
            Some(ship_type) => {
                let ship_type = ship_type.to_lowercase();
                ship_type.contains("drone") || ship_type == "personalvehicle" || ship_type == "lasertower"
            }
            None => false,
        }
    }

    /// Station name from its production: a product ware or a production
    /// module macro (`prod_<race>_<ware>_macro`)
    fn factory_name(&self, element: &Element) -> Option<(String, Option<String>)> {
        if element.is("production") {
            let product = element.attr_or_empty("originalproduct").trim();
            if product.is_empty() {
                return None;
            }
            let name = self
                .factory_names
                .get(&product.to_lowercase())
                .cloned()
                .unwrap_or_else(|| product.to_string());
            return Some((name, None));
        }

        if element.is("component") && element.attr_or_empty("class") == "production" {
            let macro_name = element.attr_or_empty("macro").trim();
            if macro_name.is_empty() {
                return None;
            }
            let parts: Vec<&str> = macro_name.split('_').collect();
            let name = match parts.as_slice() {
                [_, _, ware, _] => self
                    .factory_names
                    .get(&ware.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| macro_name.to_string()),
                _ => macro_name.to_string(),
            };
            return Some((name, Some(macro_name.to_string())));
        }

        None
    }
}

/// One `component` table row
#[derive(Debug, Clone, PartialEq)]
struct ComponentRow {
    id: i64,
    kind: String,
    class: String,
    macro_name: String,
    owner: String,
    sector: String,
    name: String,
    nameindex: String,
    code: String,
}

impl ComponentRow {
    /// Common fields of a ship or station; `None` without id or code
    fn from_element(element: &Element, kind: &str, sector: &str) -> Option<Self> {
        let id = parse_id(element.attr_or_empty("id"));
        let code = element.attr_or_empty("code").trim();
        if id <= 0 || code.is_empty() {
            return None;
        }
        let name = match element.attr_or_empty("name") {
            name if name.trim().is_empty() => element.attr_or_empty("basename"),
            name => name,
        };

        Some(Self {
            id,
            kind: kind.to_string(),
            class: element.attr_or_empty("class").to_string(),
            macro_name: String::new(),
            owner: element.attr_or_empty("owner").to_string(),
            sector: sector.to_string(),
            name: name.trim().to_string(),
            nameindex: name_index_suffix(element.attr_or_empty("nameindex")).to_string(),
            code: code.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Pending,
    Active,
    Done,
}

/// A ship or station whose children are attributed to it
#[derive(Debug)]
struct Tracked {
    id: i64,
    /// Player-owned: its subordinate structure is read
    commands: bool,
    /// Unnamed station waiting for its production to name it
    pending: Option<ComponentRow>,
}

/// Context carried by an open element
#[derive(Debug)]
enum Frame {
    Plain,
    Sector(String),
    Gate {
        id: i64,
        code: String,
        sector: String,
    },
    GateConnection(i64),
    Highway {
        id: i64,
        macro_name: String,
        superhighway: bool,
        entry: i64,
        exit: i64,
    },
    HighwayGate {
        side: GateSide,
        sector: String,
        connected: i64,
    },
    Tracked(Tracked),
    CommanderConnection,
    TradeEntries,
    Removed,
}

impl Frame {
    /// Frames that claim the elements nested in them
    fn is_owner(&self) -> bool {
        matches!(
            self,
            Frame::Gate { .. } | Frame::Highway { .. } | Frame::HighwayGate { .. } | Frame::Tracked(_)
        )
    }
}

/// Single-pass save importer
pub(crate) struct Importer<'a> {
    conn: &'a Connection,
    batch: Batch<'a>,
    lookup: TextLookup,
    lookups: Lookups,
    load_removed_objects: bool,
    frames: Vec<Frame>,
    zones: HashMap<i64, String>,
    highways: HighwayLinker,
    subordinates: SubordinateLinker,
    game_time: Option<i64>,
    universe_done: bool,
    trade: Stage,
    removed: Stage,
    elements: u64,
    sectors: u64,
    dropped_stations: usize,
    report: ImportReport,
    sink: &'a mut dyn ProgressSink,
}

impl<'a> Importer<'a> {
    pub fn new(
        conn: &'a Connection,
        lookups: Lookups,
        options: &LoadOptions,
        sink: &'a mut dyn ProgressSink,
    ) -> Result<Self> {
        Ok(Self {
            conn,
            batch: Batch::begin(conn, options.batch_size)?,
            lookup: TextLookup::new(),
            lookups,
            load_removed_objects: options.load_removed_objects,
            frames: Vec::with_capacity(64),
            zones: HashMap::new(),
            highways: HighwayLinker::new(),
            subordinates: SubordinateLinker::new(),
            game_time: None,
            universe_done: false,
            trade: Stage::Pending,
            removed: Stage::Pending,
            elements: 0,
            sectors: 0,
            dropped_stations: 0,
            report: ImportReport::default(),
            sink,
        })
    }

    /// Consume the whole stream
    pub fn run<R: BufRead>(&mut self, stream: &mut XmlStream<R>) -> Result<()> {
        while let Some(event) = stream.next_event()? {
            match event {
                XmlEvent::Start(element) => {
                    let frame = self.start(&element, stream.parent_name())?;
                    self.frames.push(frame);
                }
                XmlEvent::End(name) => {
                    if let Some(frame) = self.frames.pop() {
                        self.end(frame)?;
                    }
                    if name == "universe" && !self.universe_done {
                        self.batch.checkpoint()?;
                        self.universe_done = true;
                        debug!(
                            "Finished universe after {} elements and {} sectors",
                            self.elements, self.sectors
                        );
                        self.emit(Some("Universe imported"));
                    }
                }
                XmlEvent::Text(_) => {}
            }
        }
        Ok(())
    }

    /// Commit and report what was left unresolved
    pub fn finish(self) -> Result<ImportReport> {
        let statements = self.batch.finish()?;
        let mut report = self.report;
        report.game_time = self.game_time.unwrap_or(0);
        report.unresolved = Unresolved {
            superhighways: self.highways.pending_highways(),
            highway_gates: self.highways.pending_gates(),
            subordinates: self.subordinates.pending(),
            stations: self.dropped_stations,
        };

        debug!("Save import wrote {} statements", statements);
        if report.unresolved.total() > 0 {
            warn!(
                "Dropped unresolved entries: {} superhighways, {} highway gates, {} subordinates, {} unnamed stations",
                report.unresolved.superhighways,
                report.unresolved.highway_gates,
                report.unresolved.subordinates,
                report.unresolved.stations
            );
        }
        Ok(report)
    }

    fn emit(&mut self, status: Option<&str>) {
        let event = match status {
            Some(status) => ProgressEvent::status(status),
            None => ProgressEvent::new(),
        };
        self.sink.report(&event.with_counters(&self.report.counters));
    }

    fn start(&mut self, element: &Element, parent: Option<&str>) -> Result<Frame> {
        self.elements += 1;
        if self.elements % PROGRESS_EVERY == 0 {
            self.emit(None);
        }

        if self.game_time.is_none() && element.is("game") {
            self.game_time = Some(normalize_time(element.attr_or_empty("time")));
            return Ok(Frame::Plain);
        }
        if self.trade == Stage::Pending
            && element.is("entries")
            && element.attr("type") == Some("trade")
        {
            self.batch.checkpoint()?;
            self.trade = Stage::Active;
            debug!("Importing trade entries");
            self.emit(Some("Importing trade logs..."));
            return Ok(Frame::TradeEntries);
        }
        if self.universe_done && self.removed == Stage::Pending && element.is("removed") {
            self.removed = Stage::Active;
            debug!("Importing removed objects");
            self.emit(Some("Importing removed objects..."));
            return Ok(Frame::Removed);
        }
        if self.removed == Stage::Active && element.is("object") {
            self.removed_object(element)?;
            return Ok(Frame::Plain);
        }
        if self.trade == Stage::Active && element.is("log") {
            self.trade_log(element)?;
            return Ok(Frame::Plain);
        }
        if !self.universe_done {
            return self.universe_element(element, parent);
        }
        Ok(Frame::Plain)
    }

    fn end(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Highway {
                id,
                macro_name,
                superhighway: true,
                entry,
                exit,
            } => {
                if let Some(highway) = self.highways.add_highway(id, &macro_name, entry, exit) {
                    self.insert_highway(&highway)?;
                }
            }
            Frame::HighwayGate {
                side,
                sector,
                connected,
            } if connected > 0 => {
                if let Some(highway) = self.highways.add_gate(side, connected, &sector) {
                    self.insert_highway(&highway)?;
                }
            }
            Frame::Tracked(Tracked {
                pending: Some(row), ..
            }) => {
                self.dropped_stations += 1;
                debug!("Station {} ended before its production named it", row.code);
            }
            Frame::TradeEntries => {
                self.batch.checkpoint()?;
                self.trade = Stage::Done;
                debug!("Finished trade entries");
                self.emit(Some("Trade logs imported"));
            }
            Frame::Removed => {
                self.batch.checkpoint()?;
                self.removed = Stage::Done;
                debug!("Finished removed objects");
                self.emit(Some("Removed objects imported"));
            }
            _ => {}
        }
        Ok(())
    }

    fn universe_element(&mut self, element: &Element, parent: Option<&str>) -> Result<Frame> {
        let owner = self.frames.iter().rposition(Frame::is_owner);

        if let Some(index) = owner {
            let handled = match &self.frames[index] {
                Frame::Gate { .. } => self.gate_child(index, element)?,
                Frame::Highway { .. } => self.highway_child(index, element),
                Frame::HighwayGate { .. } => self.highway_gate_child(index, element),
                Frame::Tracked(_) => self.tracked_child(index, element, parent)?,
                _ => None,
            };
            if let Some(frame) = handled {
                return Ok(frame);
            }
        }

        if element.is("component") {
            let inside_tracked =
                owner.is_some_and(|index| matches!(self.frames[index], Frame::Tracked(_)));
            return self.component(element, inside_tracked);
        }
        Ok(Frame::Plain)
    }

    fn current_sector(&self) -> String {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| match frame {
                Frame::Sector(sector) => Some(sector.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn component(&mut self, element: &Element, inside_tracked: bool) -> Result<Frame> {
        let class = element.attr_or_empty("class");
        let is_ship = class.starts_with("ship_");
        // docked player ships are read whatever their visibility
        if element.attr("knownto") != Some("player") && !(is_ship && inside_tracked) {
            return Ok(Frame::Plain);
        }
        let id = parse_id(element.attr_or_empty("id"));
        let sector = self.current_sector();

        match class {
            "sector" => {
                self.sectors += 1;
                Ok(Frame::Sector(element.attr_or_empty("macro").to_string()))
            }
            "zone" => {
                if id > 0 && !sector.is_empty() {
                    self.zones.insert(id, sector);
                }
                Ok(Frame::Plain)
            }
            "gate" => {
                let code = element.attr_or_empty("code").trim();
                if id <= 0 || code.is_empty() || sector.is_empty() {
                    return Ok(Frame::Plain);
                }
                Ok(Frame::Gate {
                    id,
                    code: code.to_string(),
                    sector,
                })
            }
            "highway" => {
                let macro_name = element.attr_or_empty("macro").trim();
                if id <= 0 || macro_name.is_empty() {
                    return Ok(Frame::Plain);
                }
                Ok(Frame::Highway {
                    id,
                    macro_name: macro_name.to_string(),
                    superhighway: false,
                    entry: 0,
                    exit: 0,
                })
            }
            "station" => self.track_station(element, &sector),
            _ if is_ship => self.track_ship(element, &sector),
            _ => match GateSide::from_class(class) {
                Some(side) if id > 0 => Ok(Frame::HighwayGate {
                    side,
                    sector,
                    connected: 0,
                }),
                _ => Ok(Frame::Plain),
            },
        }
    }

    fn track_station(&mut self, element: &Element, sector: &str) -> Result<Frame> {
        let Some(mut row) = ComponentRow::from_element(element, "station", sector) else {
            return Ok(Frame::Plain);
        };
        let player = row.owner == "player";

        if row.name.is_empty() {
            return Ok(Frame::Tracked(Tracked {
                id: row.id,
                commands: player,
                pending: Some(row),
            }));
        }

        row.name = self.lookup.name(self.conn, &row.name);
        self.insert_component(&row)?;
        self.report.add(Counter::Stations, 1);

        if !player {
            return Ok(Frame::Plain);
        }
        Ok(Frame::Tracked(Tracked {
            id: row.id,
            commands: true,
            pending: None,
        }))
    }

    fn track_ship(&mut self, element: &Element, sector: &str) -> Result<Frame> {
        if element.attr_or_empty("owner") != "player" {
            return Ok(Frame::Plain);
        }
        let Some(mut row) = ComponentRow::from_element(element, "ship", sector) else {
            return Ok(Frame::Plain);
        };
        row.macro_name = element.attr_or_empty("macro").to_string();
        if self.lookups.is_filtered_ship(&row.macro_name) {
            return Ok(Frame::Plain);
        }

        if row.name.is_empty() {
            row.name = self
                .lookups
                .ware_component_names
                .get(&row.macro_name.to_lowercase())
                .cloned()
                .unwrap_or_default();
        }
        row.name = self.lookup.name(self.conn, &row.name);
        self.insert_component(&row)?;
        self.report.add(Counter::Ships, 1);

        Ok(Frame::Tracked(Tracked {
            id: row.id,
            commands: true,
            pending: None,
        }))
    }

    fn gate_child(&mut self, index: usize, element: &Element) -> Result<Option<Frame>> {
        if element.is("connection") {
            let connection = parse_id(element.attr_or_empty("id"));
            return Ok(Some(if connection > 0 {
                Frame::GateConnection(connection)
            } else {
                Frame::Plain
            }));
        }
        if !element.is("connected") {
            return Ok(None);
        }

        let connected = parse_id(element.attr_or_empty("connection"));
        let connection = self.frames[index..].iter().rev().find_map(|frame| match frame {
            Frame::GateConnection(connection) => Some(*connection),
            _ => None,
        });
        if let (Some(connection), Frame::Gate { id, code, sector }) = (connection, &self.frames[index]) {
            if connected > 0 {
                self.batch
                    .execute(INSERT_GATE, params![id, code, sector, connection, connected])?;
                self.report.add(Counter::Gates, 1);
            }
        }
        Ok(Some(Frame::Plain))
    }

    fn highway_child(&mut self, index: usize, element: &Element) -> Option<Frame> {
        let Frame::Highway {
            superhighway,
            entry,
            exit,
            ..
        } = &mut self.frames[index]
        else {
            return None;
        };

        if element.is("highway") {
            *superhighway = element.attr("superhighway") == Some("1");
            return Some(Frame::Plain);
        }
        if element.is("connection") {
            let id = parse_id(element.attr_or_empty("id"));
            match element.attr_or_empty("connection") {
                "entrygate" if id > 0 => *entry = id,
                "exitgate" if id > 0 => *exit = id,
                _ => {}
            }
            return Some(Frame::Plain);
        }
        None
    }

    fn highway_gate_child(&mut self, index: usize, element: &Element) -> Option<Frame> {
        if !element.is("connected") {
            return None;
        }
        if let Frame::HighwayGate { connected, .. } = &mut self.frames[index] {
            let id = parse_id(element.attr_or_empty("connection"));
            if *connected == 0 && id > 0 {
                *connected = id;
            }
        }
        Some(Frame::Plain)
    }

    fn tracked_child(
        &mut self,
        index: usize,
        element: &Element,
        parent: Option<&str>,
    ) -> Result<Option<Frame>> {
        let (id, commands, naming) = match &self.frames[index] {
            Frame::Tracked(tracked) => (tracked.id, tracked.commands, tracked.pending.is_some()),
            _ => return Ok(None),
        };

        if naming {
            if let Some((name, macro_name)) = self.lookups.factory_name(element) {
                let pending = match &mut self.frames[index] {
                    Frame::Tracked(tracked) => tracked.pending.take(),
                    _ => None,
                };
                if let Some(mut row) = pending {
                    row.name = name;
                    if let Some(macro_name) = macro_name {
                        row.macro_name = macro_name;
                    }
                    self.insert_component(&row)?;
                    self.report.add(Counter::Stations, 1);
                }
                return Ok(Some(Frame::Plain));
            }
        }

        if !commands {
            return Ok(None);
        }

        let links = if element.is("group") && parent == Some("subordinates") {
            let group = parse_int(element.attr_or_empty("index"));
            // both spellings occur in saves
            let assignment = element
                .attr("assignmment")
                .filter(|a| !a.trim().is_empty())
                .or_else(|| element.attr("assignment"))
                .unwrap_or("");
            self.subordinates.add_group(id, group, assignment)
        } else if element.is("subordinate") {
            let group = parse_int(element.attr_or_empty("group"));
            self.subordinates.add_member_group(id, group)
        } else if element.is("connection") {
            match element.attr_or_empty("connection") {
                "subordinates" => {
                    let connection = parse_id(element.attr_or_empty("id"));
                    self.subordinates.add_commander(id, connection)
                }
                "commander" => return Ok(Some(Frame::CommanderConnection)),
                _ => return Ok(None),
            }
        } else if element.is("connected")
            && matches!(self.frames.last(), Some(Frame::CommanderConnection))
        {
            let connection = parse_id(element.attr_or_empty("connection"));
            self.subordinates.add_subordinate(id, connection)
        } else {
            return Ok(None);
        };

        self.insert_links(links)?;
        Ok(Some(Frame::Plain))
    }

    fn trade_log(&mut self, element: &Element) -> Result<()> {
        if element.attr("type") != Some("trade") {
            return Ok(());
        }
        let seller = parse_id(element.attr_or_empty("seller"));
        let buyer = parse_id(element.attr_or_empty("buyer"));
        let time = normalize_time(element.attr_or_empty("time"));
        let ware = element.attr_or_empty("ware").trim();
        let price = parse_int(element.attr_or_empty("price"));
        let volume = parse_int(element.attr_or_empty("v"));
        if seller <= 0 || buyer <= 0 || time <= 0 || ware.is_empty() || price <= 0 || volume <= 0 {
            return Ok(());
        }

        let relative = time - self.game_time.unwrap_or(0);
        self.batch.execute(
            INSERT_TRADE,
            params![seller, buyer, ware, price, volume, relative],
        )?;
        self.report.add(Counter::Trades, 1);
        Ok(())
    }

    fn removed_object(&mut self, element: &Element) -> Result<()> {
        let id = parse_id(element.attr_or_empty("id"));
        if id <= 0 {
            return Ok(());
        }

        let next = parse_id(element.attr_or_empty("next"));
        if next > 0 {
            let Some(mut row) = self.find_component(next)? else {
                return Ok(());
            };
            if row.kind == "ship" && self.lookups.is_filtered_ship(&row.macro_name) {
                return Ok(());
            }
            row.id = id;
            self.insert_component(&row)?;
            if self.load_removed_objects {
                match row.kind.as_str() {
                    "station" => self.report.add(Counter::Stations, 1),
                    "ship" => self.report.add(Counter::Ships, 1),
                    _ => {}
                }
            }
            return Ok(());
        }

        if !self.load_removed_objects {
            return Ok(());
        }
        let owner = element.attr_or_empty("owner");
        let name = element.attr_or_empty("name").trim();
        let code = element.attr_or_empty("code").trim();
        if name.is_empty() || code.is_empty() {
            return Ok(());
        }
        let space = parse_id(element.attr_or_empty("space"));
        let Some(sector) = self.zones.get(&space).filter(|s| !s.is_empty()).cloned() else {
            return Ok(());
        };

        let name = match self.lookups.faction_short_names.get(&owner.to_lowercase()) {
            Some(short) => strip_faction_prefix(name, short),
            None => name,
        };
        let row = ComponentRow {
            id,
            kind: "removed".to_string(),
            class: "removed".to_string(),
            macro_name: String::new(),
            owner: owner.to_string(),
            sector,
            name: name.to_string(),
            nameindex: String::new(),
            code: code.to_string(),
        };
        self.insert_component(&row)?;
        self.report.add(Counter::Removed, 1);
        Ok(())
    }

    fn find_component(&self, id: i64) -> Result<Option<ComponentRow>> {
        let mut stmt = self
            .conn
            .prepare_cached(SELECT_COMPONENT)
            .context("Failed to prepare component lookup")?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok(ComponentRow {
                    id,
                    kind: row.get(0)?,
                    class: row.get(1)?,
                    macro_name: row.get(2)?,
                    owner: row.get(3)?,
                    sector: row.get(4)?,
                    name: row.get(5)?,
                    nameindex: row.get(6)?,
                    code: row.get(7)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    fn insert_component(&mut self, row: &ComponentRow) -> Result<()> {
        self.batch.execute(
            INSERT_COMPONENT,
            params![
                row.id,
                row.kind,
                row.class,
                row.macro_name,
                row.owner,
                row.sector,
                row.name,
                row.nameindex,
                row.code
            ],
        )?;
        Ok(())
    }

    fn insert_highway(&mut self, highway: &Superhighway) -> Result<()> {
        self.batch.execute(
            INSERT_SUPERHIGHWAY,
            params![
                highway.id,
                highway.macro_name,
                highway.sector_from,
                highway.entry_gate,
                highway.sector_to,
                highway.exit_gate
            ],
        )?;
        self.report.add(Counter::Superhighways, 1);
        Ok(())
    }

    fn insert_links(&mut self, links: Vec<SubordinateLink>) -> Result<()> {
        for link in links {
            self.batch.execute(
                INSERT_SUBORDINATE,
                params![link.commander_id, link.subordinate_id, link.assignment],
            )?;
            self.report.add(Counter::Subordinates, 1);
        }
        Ok(())
    }
}

/// Drop a leading `"<short name> "` from an object name
fn strip_faction_prefix<'n>(name: &'n str, short_name: &str) -> &'n str {
    if short_name.is_empty() {
        return name;
    }
    match name.strip_prefix(short_name) {
        Some(rest) if rest.starts_with(' ') => rest.trim_start(),
        _ => name,
    }
}

use anyhow::Result;
use rusqlite::params;
use std::io::BufRead;

use super::{LoadContext, Package};
use crate::parser::{parse_number, Element, XmlEvent, XmlStream};
use crate::progress::Counter;
use crate::writer::Batch;

const MACRO_MASKS: &[&str] = &[
    "assets/units/size_*/macros/*.xml",
    "assets/props/StorageModules/macros/*.xml",
];

const TRANSPORTS: &[&str] = &["container", "solid", "liquid", "gas"];

const INSERT_STORAGE: &str =
    "INSERT OR REPLACE INTO storage(macro, transport, capacity) VALUES (?1, ?2, ?3)";
const INSERT_SHIP_STORAGE: &str =
    "INSERT OR IGNORE INTO ship_storage(ship_macro, storage_macro) VALUES (?1, ?2)";
const INSERT_SHIP_TYPE: &str = "INSERT OR REPLACE INTO ship_type(macro, type) VALUES (?1, ?2)";

/// The top-level `<macro>` being read
#[derive(Debug)]
enum MacroFrame {
    Storage { name: String, depth: usize },
    Ship { name: String, depth: usize },
}

impl MacroFrame {
    fn open(element: &Element, depth: usize) -> Option<Self> {
        let name = element.attr_or_empty("name");
        if name.trim().is_empty() {
            return None;
        }
        let class = element.attr_or_empty("class").to_lowercase();
        let name = name.to_lowercase();
        if class == "storage" {
            Some(MacroFrame::Storage { name, depth })
        } else if class.starts_with("ship_") {
            Some(MacroFrame::Ship { name, depth })
        } else {
            None
        }
    }

    fn depth(&self) -> usize {
        match self {
            MacroFrame::Storage { depth, .. } | MacroFrame::Ship { depth, .. } => *depth,
        }
    }
}

pub(super) fn load(ctx: &mut LoadContext, package: &Package) -> Result<()> {
    super::load_files(ctx, package, MACRO_MASKS, "storage macro", parse)
}

fn parse(ctx: &mut LoadContext, batch: &mut Batch, reader: &mut dyn BufRead) -> Result<()> {
    let mut stream = XmlStream::new(reader);
    let mut frame: Option<MacroFrame> = None;

    while let Some(event) = stream.next_event()? {
        match event {
            XmlEvent::Start(element) => match &frame {
                None => {
                    if element.is("macro") {
                        frame = MacroFrame::open(&element, stream.depth());
                    }
                }
                Some(MacroFrame::Storage { name, .. }) => {
                    if element.is("cargo") && stream.within("properties") {
                        store_cargo(ctx, batch, name, &element)?;
                    }
                }
                Some(MacroFrame::Ship { name, .. }) => {
                    if element.is("ship") && stream.within("properties") {
                        let ship_type = element.attr_or_empty("type");
                        if !ship_type.trim().is_empty() {
                            batch.execute(
                                INSERT_SHIP_TYPE,
                                params![name, ship_type.to_lowercase()],
                            )?;
                            ctx.report.add(Counter::ShipTypes, 1);
                        }
                    } else if element.is("macro")
                        && stream.within("connection")
                        && element.attr_or_empty("connection") == "ShipConnection"
                    {
                        let storage = element.attr_or_empty("ref");
                        if !storage.trim().is_empty() {
                            batch.execute(
                                INSERT_SHIP_STORAGE,
                                params![name, storage.to_lowercase()],
                            )?;
                            ctx.report.add(Counter::ShipStorages, 1);
                        }
                    }
                }
            },
            XmlEvent::End(tag) => {
                if tag == "macro" && frame.as_ref().map(MacroFrame::depth) == Some(stream.depth() + 1) {
                    frame = None;
                }
            }
            XmlEvent::Text(_) => {}
        }
    }

    Ok(())
}

/// One storage row per known transport tag of a `<cargo>`
fn store_cargo(ctx: &mut LoadContext, batch: &mut Batch, name: &str, cargo: &Element) -> Result<()> {
    let capacity = parse_number(cargo.attr_or_empty("max"));
    for tag in cargo.attr_or_empty("tags").split_whitespace() {
        let transport = tag.to_lowercase();
        if !TRANSPORTS.contains(&transport.as_str()) {
            continue;
        }
        batch.execute(INSERT_STORAGE, params![name, transport, capacity])?;
        ctx.report.add(Counter::Storages, 1);
    }
    Ok(())
}

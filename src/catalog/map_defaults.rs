use anyhow::Result;
use rusqlite::params;
use std::io::BufRead;

use super::{LoadContext, Package};
use crate::parser::{XmlEvent, XmlStream};
use crate::progress::Counter;
use crate::writer::Batch;

const MAP_DEFAULTS_FILE: &str = "libraries/mapdefaults.xml";

const INSERT_SECTOR_NAME: &str =
    "INSERT OR IGNORE INTO cluster_sector_name(macro, name) VALUES (?1, ?2)";

pub(super) fn load(ctx: &mut LoadContext, package: &Package) -> Result<()> {
    super::load_files(ctx, package, &[MAP_DEFAULTS_FILE], "map defaults", parse)
}

fn parse(ctx: &mut LoadContext, batch: &mut Batch, reader: &mut dyn BufRead) -> Result<()> {
    let mut stream = XmlStream::new(reader);
    // (macro, resolved name, depth) of the open <dataset>
    let mut dataset: Option<(String, String, usize)> = None;

    while let Some(event) = stream.next_event()? {
        match event {
            XmlEvent::Start(element) => {
                if let Some((macro_name, name, _)) = dataset.as_mut() {
                    if element.is("identification") {
                        let raw = element.attr_or_empty("name");
                        if !raw.is_empty() {
                            *name = ctx.lookup.name_or(ctx.conn, raw, macro_name);
                        }
                    }
                } else if element.is("dataset") {
                    let macro_name = element.attr_or_empty("macro");
                    if !macro_name.trim().is_empty() {
                        dataset = Some((
                            macro_name.to_string(),
                            macro_name.to_string(),
                            stream.depth(),
                        ));
                    }
                }
            }
            XmlEvent::End(tag) => {
                let closes = matches!(
                    &dataset,
                    Some((_, _, depth)) if tag == "dataset" && stream.depth() + 1 == *depth
                );
                if !closes {
                    continue;
                }
                if let Some((macro_name, name, _)) = dataset.take() {
                    batch.execute(
                        INSERT_SECTOR_NAME,
                        params![macro_name.to_lowercase(), name],
                    )?;
                    ctx.report.add(Counter::SectorNames, 1);
                }
            }
            XmlEvent::Text(_) => {}
        }
    }

    Ok(())
}

use anyhow::Result;
use rusqlite::params;
use std::io::BufRead;

use super::{LoadContext, Package};
use crate::parser::{parse_number, XmlEvent, XmlStream};
use crate::progress::Counter;
use crate::writer::Batch;

const WARES_FILE: &str = "libraries/wares.xml";

const INSERT_WARE: &str = "INSERT OR IGNORE INTO ware(id, name, group_of, transport, volume, price_min, price_avg, price_max, component_macro, text) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

/// A `<ware>` being read
#[derive(Debug, Default)]
struct WareDraft {
    id: String,
    name: String,
    group: String,
    transport: String,
    volume: i64,
    price_min: i64,
    price_avg: i64,
    price_max: i64,
    component_macro: String,
    depth: usize,
}

pub(super) fn load(ctx: &mut LoadContext, package: &Package) -> Result<()> {
    super::load_files(ctx, package, &[WARES_FILE], "ware", parse)
}

fn parse(ctx: &mut LoadContext, batch: &mut Batch, reader: &mut dyn BufRead) -> Result<()> {
    let mut stream = XmlStream::new(reader);
    let mut draft: Option<WareDraft> = None;

    while let Some(event) = stream.next_event()? {
        match event {
            XmlEvent::Start(element) => match draft.as_mut() {
                None if element.is("ware") => {
                    let id = element.attr_or_empty("id");
                    let name = element.attr_or_empty("name");
                    if id.trim().is_empty() || name.is_empty() {
                        continue;
                    }
                    draft = Some(WareDraft {
                        id: id.to_string(),
                        name: name.to_string(),
                        group: element.attr_or_empty("group").to_string(),
                        transport: element.attr_or_empty("transport").to_string(),
                        volume: parse_number(element.attr_or_empty("volume")),
                        depth: stream.depth(),
                        ..WareDraft::default()
                    });
                }
                None => {}
                // production inputs nest `<ware>` too; only direct children count
                Some(ware) if stream.depth() == ware.depth + 1 => {
                    if element.is("price") {
                        ware.price_min = parse_number(element.attr_or_empty("min"));
                        ware.price_avg = parse_number(element.attr_or_empty("average"));
                        ware.price_max = parse_number(element.attr_or_empty("max"));
                    } else if element.is("component") {
                        ware.component_macro = element.attr_or_empty("ref").to_string();
                    }
                }
                Some(_) => {}
            },
            XmlEvent::End(name) => {
                let closes_draft = matches!(
                    &draft,
                    Some(ware) if name == "ware" && stream.depth() + 1 == ware.depth
                );
                if closes_draft {
                    if let Some(ware) = draft.take() {
                        store(ctx, batch, &ware)?;
                    }
                }
            }
            XmlEvent::Text(_) => {}
        }
    }

    Ok(())
}

fn store(ctx: &mut LoadContext, batch: &mut Batch, ware: &WareDraft) -> Result<()> {
    let text = ctx.lookup.name_or(ctx.conn, &ware.name, &ware.id);
    batch.execute(
        INSERT_WARE,
        params![
            ware.id,
            ware.name,
            ware.group,
            ware.transport,
            ware.volume,
            ware.price_min * 100,
            ware.price_avg * 100,
            ware.price_max * 100,
            ware.component_macro,
            text
        ],
    )?;
    ctx.report.add(Counter::Wares, 1);
    if ctx.report.get(Counter::Wares) % 10 == 0 {
        ctx.emit("Parsing wares...", "");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{context_parts, memory_package, query_strings};

    const WARES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<wares>
  <production>
    <method id="default" name="{20206,101}"/>
  </production>
  <ware id="energycells" name="{20201,701}" group="energy" transport="container" volume="6">
    <price min="10" average="16" max="22"/>
    <production time="60" amount="175" method="default">
      <primary>
        <ware ware="silicon" amount="5"/>
      </primary>
    </production>
    <component ref="ware_ec_macro"/>
  </ware>
  <ware id="silicon" name="{20201,9999}" group="minerals" transport="solid" volume="10">
    <price min="100" average="133" max="166"/>
  </ware>
  <ware id="" name="{20201,1}"/>
</wares>"#;

    #[test]
    fn test_load_wares() {
        let (conn, mut sink) = context_parts();
        conn.execute_batch(
            "INSERT INTO text(id_uniq, language, page, id, text) VALUES (1, 44, 20201, 701, 'Energy Cells');",
        )
        .unwrap();
        let mut ctx = LoadContext::for_tests(&conn, &mut sink);
        let package = memory_package(&[(WARES_FILE, WARES)]);

        load(&mut ctx, &package).unwrap();
        load(&mut ctx, &package).unwrap();

        let rows = query_strings(
            &conn,
            "SELECT id || '|' || transport || '|' || volume || '|' || price_avg || '|' || component_macro || '|' || text FROM ware ORDER BY id",
        );
        assert_eq!(
            rows,
            vec![
                "energycells|container|6|1600|ware_ec_macro|Energy Cells",
                "silicon|solid|10|13300||silicon",
            ]
        );
        assert_eq!(ctx.report.get(Counter::Files), 2);
    }
}

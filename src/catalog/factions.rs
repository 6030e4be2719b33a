use anyhow::Result;
use rusqlite::params;
use std::io::BufRead;

use super::{LoadContext, Package};
use crate::parser::{XmlEvent, XmlStream};
use crate::progress::Counter;
use crate::writer::Batch;

const FACTIONS_FILE: &str = "libraries/factions.xml";

const INSERT_FACTION: &str =
    "INSERT OR IGNORE INTO faction(id, name, shortname, prefixname) VALUES (?1, ?2, ?3, ?4)";

pub(super) fn load(ctx: &mut LoadContext, package: &Package) -> Result<()> {
    super::load_files(ctx, package, &[FACTIONS_FILE], "faction", parse)
}

fn parse(ctx: &mut LoadContext, batch: &mut Batch, reader: &mut dyn BufRead) -> Result<()> {
    let mut stream = XmlStream::new(reader);

    while let Some(event) = stream.next_event()? {
        let XmlEvent::Start(element) = event else {
            continue;
        };
        if !element.is("faction") {
            continue;
        }

        let id = element.attr_or_empty("id");
        let name = ctx.lookup.name(ctx.conn, element.attr_or_empty("name"));
        if id.trim().is_empty() || name.is_empty() {
            continue;
        }
        let shortname = ctx.lookup.name(ctx.conn, element.attr_or_empty("shortname"));
        let prefixname = ctx.lookup.name(ctx.conn, element.attr_or_empty("prefixname"));

        batch.execute(INSERT_FACTION, params![id, name, shortname, prefixname])?;
        ctx.report.add(Counter::Factions, 1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{context_parts, memory_package, query_strings};

    #[test]
    fn test_load_factions() {
        let (conn, mut sink) = context_parts();
        conn.execute_batch(
            "INSERT INTO text(id_uniq, language, page, id, text) VALUES
                (1, 44, 20203, 201, 'Argon Federation'),
                (2, 44, 20203, 204, 'ARG');",
        )
        .unwrap();
        let base = memory_package(&[(
            FACTIONS_FILE,
            r#"<factions>
                <faction id="argon" name="{20203,201}" shortname="{20203,204}" prefixname="{20203,999}"/>
                <faction id="ownerless" name=""/>
                <faction id="xenon" name="Xenon" shortname="XEN"/>
            </factions>"#,
        )]);
        let patch = memory_package(&[(
            FACTIONS_FILE,
            r#"<factions><faction id="argon" name="Patched"/></factions>"#,
        )]);

        let mut ctx = LoadContext::for_tests(&conn, &mut sink);
        load(&mut ctx, &base).unwrap();
        load(&mut ctx, &patch).unwrap();

        let rows = query_strings(
            &conn,
            "SELECT id || '|' || name || '|' || shortname || '|' || prefixname FROM faction ORDER BY id",
        );
        assert_eq!(
            rows,
            vec![
                "argon|Argon Federation|ARG|{20203,999}",
                "xenon|Xenon|XEN|",
            ]
        );
    }
}

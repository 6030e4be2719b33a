use anyhow::{Context, Result};
use rusqlite::params;
use std::io::BufRead;
use tracing::{debug, info, warn};

use super::{LoadContext, Package};
use crate::config::LoadOptions;
use crate::content::Entry;
use crate::localization::{RawTexts, Resolver, TextKey};
use crate::parser::{parse_int, XmlEvent, XmlStream};
use crate::progress::Counter;
use crate::writer::Batch;

const INSERT_TEXT: &str =
    "INSERT OR REPLACE INTO text(id_uniq, language, page, id, text) VALUES (?1, ?2, ?3, ?4, ?5)";

/// Texts of one localization file
#[derive(Debug, Default, PartialEq)]
struct TextFile {
    language: u16,
    items: Vec<(u32, u32, String)>,
}

/// Read every localization file of `package` matching `mask` into `raw`.
/// Files that fail to parse are logged and skipped.
pub(super) fn collect(ctx: &mut LoadContext, package: &Package, mask: &str, raw: &mut RawTexts) {
    let entries = match package.source.list_entries(mask) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list localization files of {}: {:#}", package.label, e);
            return;
        }
    };
    if entries.is_empty() {
        debug!("No localization files in {}", package.label);
        return;
    }
    debug!(
        "Parsing {} localization file(s) of {} with mask '{}'",
        entries.len(),
        package.label,
        mask
    );

    for entry in &entries {
        match read_entry(package, entry) {
            Ok(Some(file)) => {
                for (page, id, value) in file.items {
                    raw.insert(file.language, page, id, value);
                }
            }
            Ok(None) => debug!("Localization file {} declares no language", entry.path),
            Err(e) => warn!("Skipping localization file {}: {:#}", entry.path, e),
        }
        ctx.report.add(Counter::Files, 1);
        ctx.report
            .set(Counter::Languages, raw.languages().len() as u64);
        ctx.emit_file(&package.label, &entry.path);
    }
}

fn read_entry(package: &Package, entry: &Entry) -> Result<Option<TextFile>> {
    let reader = package
        .source
        .open_stream(entry)
        .with_context(|| format!("Failed to open {}", entry.path))?;
    parse_text_file(reader)
}

/// Page or id attribute; anything outside `u32` reads as 0
fn text_number(raw: &str) -> u32 {
    u32::try_from(parse_int(raw)).unwrap_or(0)
}

/// Items of the first `<language id>` scope, `None` without a valid one
fn parse_text_file<R: BufRead>(reader: R) -> Result<Option<TextFile>> {
    let mut stream = XmlStream::new(reader);
    let mut file = TextFile::default();
    let mut scope_depth: Option<usize> = None;
    let mut page: Option<u32> = None;
    // (page, id, text, depth) of the open <t>
    let mut current: Option<(u32, u32, String, usize)> = None;

    while let Some(event) = stream.next_event()? {
        match event {
            XmlEvent::Start(element) => {
                if current.is_some() {
                    continue;
                }
                if element.is("language") {
                    if scope_depth.is_none() && file.language == 0 {
                        let language = parse_int(element.attr_or_empty("id"));
                        if language <= 0 || language > u16::MAX as i64 {
                            return Ok(None);
                        }
                        file.language = language as u16;
                        scope_depth = Some(stream.depth());
                    }
                    continue;
                }
                if scope_depth.is_none() {
                    continue;
                }
                if element.is("page") {
                    page = Some(text_number(element.attr_or_empty("id")));
                } else if element.is("t") {
                    let id = text_number(element.attr_or_empty("id"));
                    let page_id = match page {
                        Some(page_id) => page_id,
                        None => text_number(element.attr_or_empty("page")),
                    };
                    current = Some((page_id, id, String::new(), stream.depth()));
                }
            }
            XmlEvent::Text(text) => {
                if let Some((_, _, value, _)) = current.as_mut() {
                    value.push_str(&text);
                }
            }
            XmlEvent::End(name) => {
                if let Some((page_id, id, value, depth)) = current.take() {
                    if name == "t" && stream.depth() + 1 == depth {
                        if page_id > 0 && id > 0 {
                            file.items.push((page_id, id, value));
                        }
                    } else {
                        current = Some((page_id, id, value, depth));
                    }
                    continue;
                }
                if name == "page" {
                    page = None;
                } else if name == "language" && scope_depth == Some(stream.depth() + 1) {
                    break;
                }
            }
        }
    }

    if file.language == 0 {
        return Ok(None);
    }
    Ok(Some(file))
}

/// Resolve and store the collected texts, returning the stored languages
pub(super) fn store(
    ctx: &mut LoadContext,
    raw: &RawTexts,
    game_language: Option<u16>,
    options: &LoadOptions,
) -> Result<Vec<u16>> {
    let languages: Vec<u16> = if options.load_only_game_language {
        raw.majority_language().into_iter().collect()
    } else {
        raw.languages()
    };
    if let (Some(game), [stored]) = (game_language, languages.as_slice()) {
        if game != *stored {
            warn!(
                "Storing language {} although the game language is {}",
                stored, game
            );
        }
    }

    ctx.emit("Storing texts...", "");
    let mut batch = Batch::begin(ctx.conn, ctx.batch_size)?;
    let mut stored = 0u64;

    for &language in &languages {
        let mut resolver = Resolver::new(raw, language);
        for (page, id) in raw.keys(language) {
            let Some(key) = TextKey::new(language, page, id) else {
                debug!("Text key {}:{{{},{}}} out of range", language, page, id);
                continue;
            };
            let text = resolver.resolve(page, id);
            batch.execute(INSERT_TEXT, params![key.pack(), language, page, id, text])?;
            stored += 1;
            if stored % 1000 == 0 {
                ctx.report.set(Counter::Texts, stored);
                ctx.emit("Storing texts...", "");
            }
        }
    }
    batch.finish()?;

    ctx.report.set(Counter::Texts, stored);
    info!(
        "Stored {} localization strings for {} of {} language(s)",
        stored,
        languages.len(),
        raw.languages().len()
    );
    Ok(languages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{context_parts, memory_package};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_paged_and_free_standing_items() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<language id="44">
  <page id="1001" title="Interface">
    <t id="1">Hull</t>
    <t id="2">{1001,1} (damaged)</t>
    <t id="0">ignored</t>
  </page>
  <t page="20101" id="10">Shard</t>
  <t id="5">no page</t>
</language>"#;
        let file = parse_text_file(xml.as_bytes()).unwrap().unwrap();
        assert_eq!(file.language, 44);
        assert_eq!(
            file.items,
            vec![
                (1001, 1, "Hull".to_string()),
                (1001, 2, "{1001,1} (damaged)".to_string()),
                (20101, 10, "Shard".to_string()),
            ]
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        let xml = r#"<language id="49"><page id="3"><t id="1">A &amp; B</t></page></language>"#;
        let file = parse_text_file(xml.as_bytes()).unwrap().unwrap();
        assert_eq!(file.language, 49);
        assert_eq!(file.items[0].2, "A & B");
    }

    #[test]
    fn test_missing_language() {
        let xml = r#"<page id="3"><t id="1">x</t></page>"#;
        assert_eq!(parse_text_file(xml.as_bytes()).unwrap(), None);

        let xml = r#"<language id="abc"><page id="3"><t id="1">x</t></page></language>"#;
        assert_eq!(parse_text_file(xml.as_bytes()).unwrap(), None);
    }

    #[test]
    fn test_out_of_range_numbers_are_skipped() {
        let xml = r#"<language id="44">
  <page id="4294967297"><t id="1">wrapped page</t></page>
  <page id="1"><t id="4294967298">wrapped id</t><t id="-1">negative</t><t id="3">kept</t></page>
</language>"#;
        let file = parse_text_file(xml.as_bytes()).unwrap().unwrap();
        assert_eq!(file.items, vec![(1, 3, "kept".to_string())]);
    }

    #[test]
    fn test_broken_file_is_skipped_with_warning() {
        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let (conn, mut sink) = context_parts();
        let package = memory_package(&[
            ("t/0001-l044.xml", r#"<language id="44"><page id="3"><t id="1">ok</t></page></language>"#),
            ("t/0002-l044.xml", r#"<language id="44"><page id="3"><t id="2">x</page></language>"#),
        ]);
        let mut ctx = LoadContext::for_tests(&conn, &mut sink);
        let mut raw = RawTexts::new();
        tracing::subscriber::with_default(subscriber, || {
            collect(&mut ctx, &package, "t/*-l*.xml", &mut raw)
        });

        assert_eq!(raw.get(44, 3, 1), Some("ok"));
        assert_eq!(raw.get(44, 3, 2), None);
        assert_eq!(ctx.report.get(Counter::Files), 2);
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("WARN"));
        assert!(logged.contains("Skipping localization file t/0002-l044.xml"));
    }

    #[test]
    fn test_malformed_file_fails() {
        let xml = r#"<language id="44"><page id="3"><t id="1">x</page></language>"#;
        assert!(parse_text_file(xml.as_bytes()).is_err());
    }
}

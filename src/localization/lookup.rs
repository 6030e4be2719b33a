use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::parser::parse_text_ref;

/// Page-at-a-time cache over the `lang` view (texts of the current language)
#[derive(Debug, Default)]
pub struct TextLookup {
    texts: HashMap<(u32, u32), String>,
    loaded_pages: HashSet<u32>,
}

impl TextLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved text at `(page, id)`, loading the page on first use
    pub fn get(&mut self, conn: &Connection, page: u32, id: u32) -> Result<Option<&str>> {
        if self.loaded_pages.insert(page) {
            self.load_page(conn, page)?;
        }
        Ok(self.texts.get(&(page, id)).map(|s| s.as_str()))
    }

    fn load_page(&mut self, conn: &Connection, page: u32) -> Result<()> {
        let mut stmt = conn
            .prepare_cached("SELECT id, text FROM lang WHERE page = ?1")
            .context("Failed to prepare text lookup")?;
        let rows = stmt.query_map(params![page], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (id, text) = row?;
            self.texts.insert((page, id), text);
        }
        Ok(())
    }

    /// Resolve a `{page,id}` attribute value. Returns `None` when the input
    /// is not a reference or the text is unknown.
    pub fn resolve_ref(&mut self, conn: &Connection, input: &str) -> Option<String> {
        let (page, id) = parse_text_ref(input)?;
        self.resolve_at(conn, page, id)
    }

    /// Text at `(page, id)`; lookup failures are logged and treated as missing
    pub fn resolve_at(&mut self, conn: &Connection, page: u32, id: u32) -> Option<String> {
        match self.get(conn, page, id) {
            Ok(text) => text.map(str::to_string),
            Err(e) => {
                debug!("Text lookup for {{{},{}}} failed: {:#}", page, id, e);
                None
            }
        }
    }

    /// The resolved name, or `fallback` when `input` is not a known reference
    pub fn name_or(&mut self, conn: &Connection, input: &str, fallback: &str) -> String {
        self.resolve_ref(conn, input)
            .unwrap_or_else(|| fallback.to_string())
    }

    /// The resolved name, or `input` itself
    pub fn name(&mut self, conn: &Connection, input: &str) -> String {
        self.name_or(conn, input, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE settings (current_language INTEGER NOT NULL);
             INSERT INTO settings VALUES (44);
             CREATE TABLE text (id_uniq INTEGER PRIMARY KEY, language INTEGER, page INTEGER, id INTEGER, text TEXT);
             CREATE VIEW lang AS SELECT t.page, t.id, t.text FROM text t JOIN settings s ON t.language = s.current_language;
             INSERT INTO text VALUES (1, 44, 20101, 1, 'Argon Federation');
             INSERT INTO text VALUES (2, 49, 20101, 1, 'Argon-Föderation');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_resolves_current_language() {
        let conn = setup();
        let mut lookup = TextLookup::new();
        assert_eq!(lookup.name(&conn, "{20101,1}"), "Argon Federation");
        assert_eq!(lookup.name(&conn, "{20101,2}"), "{20101,2}");
        assert_eq!(lookup.name_or(&conn, "{20101,2}", "argon"), "argon");
        assert_eq!(lookup.name(&conn, "plain"), "plain");
    }

    #[test]
    fn test_missing_view_is_not_found() {
        let conn = Connection::open_in_memory().unwrap();
        let mut lookup = TextLookup::new();
        assert_eq!(lookup.resolve_ref(&conn, "{1,1}"), None);
    }
}

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, Cursor};

use super::{compile_mask, normalize_path, ContentSource, Entry};

/// In-memory files, for tests and generated content
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) {
        self.files.insert(normalize_path(path), content.into());
    }

    pub fn with(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }
}

impl ContentSource for MemorySource {
    fn list_entries(&self, mask: &str) -> Result<Vec<Entry>> {
        let matcher = compile_mask(mask)?;
        Ok(self
            .files
            .keys()
            .filter(|path| matcher.is_match(path.as_str()))
            .map(|path| Entry::new(path.clone()))
            .collect())
    }

    fn open_stream(&self, entry: &Entry) -> Result<Box<dyn BufRead + '_>> {
        let content = self
            .files
            .get(&entry.path)
            .with_context(|| format!("No such entry: {}", entry.path))?;
        Ok(Box::new(Cursor::new(content.as_slice())))
    }
}

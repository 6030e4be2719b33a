use anyhow::{Context, Result};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::{compile_mask, normalize_path, ContentSource, Entry};

/// Files inside a zip bundle
pub struct ZipSource {
    path: PathBuf,
    archive: RefCell<ZipArchive<BufReader<File>>>,
    /// Normalized path -> name as stored in the archive
    names: Vec<(String, String)>,
}

impl ZipSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open zip file: {:?}", path))?;
        let archive = ZipArchive::new(BufReader::new(file))
            .with_context(|| format!("Failed to read zip archive: {:?}", path))?;

        let names = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(|name| (normalize_path(name), name.to_string()))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            archive: RefCell::new(archive),
            names,
        })
    }
}

impl ContentSource for ZipSource {
    fn list_entries(&self, mask: &str) -> Result<Vec<Entry>> {
        let matcher = compile_mask(mask)?;
        let mut entries: Vec<Entry> = self
            .names
            .iter()
            .filter(|(normalized, _)| matcher.is_match(normalized))
            .map(|(normalized, _)| Entry::new(normalized.clone()))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn open_stream(&self, entry: &Entry) -> Result<Box<dyn BufRead + '_>> {
        let stored = self
            .names
            .iter()
            .find(|(normalized, _)| *normalized == entry.path)
            .map(|(_, stored)| stored.as_str())
            .with_context(|| format!("{} not found in {:?}", entry.path, self.path))?;

        let mut archive = self.archive.borrow_mut();
        let mut file = archive
            .by_name(stored)
            .with_context(|| format!("Failed to read {} from {:?}", stored, self.path))?;

        let mut buf = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut buf)
            .with_context(|| format!("Failed to extract: {}", stored))?;

        Ok(Box::new(Cursor::new(buf)))
    }
}

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{compile_mask, ContentSource, Entry};

/// Loose files below a package directory
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn walk(&self, dir: &Path, relative: &str, out: &mut Vec<String>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read directory: {:?}", dir)),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if relative.is_empty() {
                name
            } else {
                format!("{}/{}", relative, name)
            };

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.walk(&entry.path(), &path, out)?;
            } else if file_type.is_file() {
                out.push(path);
            }
        }
        Ok(())
    }
}

/// Leading directories of a mask that contain no glob characters
fn literal_prefix(mask: &str) -> &str {
    let glob_start = mask
        .find(|c| matches!(c, '*' | '?' | '[' | '{'))
        .unwrap_or(mask.len());
    match mask[..glob_start].rfind('/') {
        Some(slash) => &mask[..slash],
        None => "",
    }
}

impl ContentSource for DirectorySource {
    fn list_entries(&self, mask: &str) -> Result<Vec<Entry>> {
        let matcher = compile_mask(mask)?;
        let prefix = literal_prefix(mask);

        // Case-sensitive file systems: fall back to a full walk when the
        // literal prefix is spelled differently on disk
        let start = self.root.join(prefix);
        let (start, relative) = if start.is_dir() {
            (start, prefix)
        } else {
            (self.root.clone(), "")
        };

        let mut paths = Vec::new();
        self.walk(&start, relative, &mut paths)?;

        let mut entries: Vec<Entry> = paths
            .into_iter()
            .filter(|p| matcher.is_match(p))
            .map(Entry::new)
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn open_stream(&self, entry: &Entry) -> Result<Box<dyn BufRead + '_>> {
        let path = self.root.join(&entry.path);
        let file = File::open(&path).with_context(|| format!("Failed to open: {:?}", path))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("t/*-l*.xml"), "t");
        assert_eq!(literal_prefix("assets/units/size_*/macros/*.xml"), "assets/units");
        assert_eq!(literal_prefix("libraries/wares.xml"), "libraries");
        assert_eq!(literal_prefix("*.xml"), "");
    }

    #[test]
    fn test_lists_matching_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("t")).unwrap();
        fs::write(dir.path().join("t/0001-l044.xml"), "<language id=\"44\"/>").unwrap();
        fs::write(dir.path().join("t/0001-l049.xml"), "<language id=\"49\"/>").unwrap();
        fs::write(dir.path().join("t/readme.txt"), "").unwrap();

        let source = DirectorySource::new(dir.path());
        let all: Vec<_> = source
            .list_entries("t/*-l*.xml")
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(all, vec!["t/0001-l044.xml", "t/0001-l049.xml"]);

        let english = source.list_entries("t/*-l044.xml").unwrap();
        assert_eq!(english.len(), 1);
        assert!(source.open_stream(&english[0]).is_ok());
    }
}

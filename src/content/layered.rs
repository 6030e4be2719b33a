use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::BufRead;

use super::{ContentSource, Entry};

/// Stack of sources where a later layer overrides files of earlier ones
pub struct LayeredSource {
    layers: Vec<Box<dyn ContentSource>>,
}

impl LayeredSource {
    pub fn new(layers: Vec<Box<dyn ContentSource>>) -> Self {
        Self { layers }
    }
}

impl ContentSource for LayeredSource {
    fn list_entries(&self, mask: &str) -> Result<Vec<Entry>> {
        let mut merged: BTreeMap<String, Entry> = BTreeMap::new();

        for (layer, source) in self.layers.iter().enumerate() {
            for entry in source.list_entries(mask)? {
                merged.insert(
                    entry.path.to_lowercase(),
                    Entry {
                        path: entry.path,
                        layer,
                    },
                );
            }
        }

        let mut entries: Vec<Entry> = merged.into_values().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn open_stream(&self, entry: &Entry) -> Result<Box<dyn BufRead + '_>> {
        let source = self
            .layers
            .get(entry.layer)
            .with_context(|| format!("No content layer {} for {}", entry.layer, entry.path))?;
        source.open_stream(&Entry::new(entry.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MemorySource;
    use std::io::Read;

    #[test]
    fn test_last_layer_wins() {
        let base = MemorySource::new()
            .with("libraries/wares.xml", "base")
            .with("libraries/factions.xml", "factions");
        let patch = MemorySource::new().with("libraries/wares.xml", "patch");

        let layered = LayeredSource::new(vec![Box::new(base), Box::new(patch)]);
        let entries = layered.list_entries("libraries/*.xml").unwrap();
        assert_eq!(entries.len(), 2);

        let wares = entries.iter().find(|e| e.path == "libraries/wares.xml").unwrap();
        assert_eq!(wares.layer, 1);

        let mut content = String::new();
        layered
            .open_stream(wares)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "patch");
    }
}

//! Game content access
//!
//! Catalog loaders only need to list files of a package by glob mask and
//! stream one of them. Packages are the base game folder and each extension
//! folder; a package is read from its loose files and any zip bundles in it.

mod archive;
mod directory;
mod layered;
mod memory;
mod order;

pub use archive::ZipSource;
pub use directory::DirectorySource;
pub use layered::LayeredSource;
pub use memory::MemorySource;
pub use order::{ContentXmlOrder, PackageOrder, StaticOrder};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

/// One file of a content source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Package-relative path with `/` separators
    pub path: String,
    /// Index of the layer holding the file, for layered sources
    pub layer: usize,
}

impl Entry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            layer: 0,
        }
    }
}

pub trait ContentSource {
    /// Entries whose path matches `mask`, sorted by path
    fn list_entries(&self, mask: &str) -> Result<Vec<Entry>>;

    /// Open a listed entry for reading
    fn open_stream(&self, entry: &Entry) -> Result<Box<dyn BufRead + '_>>;
}

/// Builds the content source of one package directory
pub trait ContentProvider {
    fn open_package(&self, dir: &Path) -> Result<Box<dyn ContentSource>>;
}

/// Loose files of a package overlaid by its zip bundles (in name order)
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProvider;

impl ContentProvider for FsProvider {
    fn open_package(&self, dir: &Path) -> Result<Box<dyn ContentSource>> {
        let mut layers: Vec<Box<dyn ContentSource>> = vec![Box::new(DirectorySource::new(dir))];

        if dir.is_dir() {
            let mut bundles = Vec::new();
            for entry in std::fs::read_dir(dir)
                .with_context(|| format!("Failed to read package directory: {:?}", dir))?
            {
                let path = entry?.path();
                let is_zip = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
                if is_zip && path.is_file() {
                    bundles.push(path);
                }
            }
            bundles.sort();

            for bundle in bundles {
                debug!("Adding content bundle {:?}", bundle);
                layers.push(Box::new(ZipSource::open(&bundle)?));
            }
        }

        Ok(Box::new(LayeredSource::new(layers)))
    }
}

/// Compile a content mask (`*` stays within one path segment)
pub(crate) fn compile_mask(mask: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(mask)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid content mask: {}", mask))?;
    Ok(glob.compile_matcher())
}

/// Normalize a stored path to `/` separators without a leading slash
pub(crate) fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    #[test]
    fn test_mask_is_case_insensitive_and_segment_bound() {
        let matcher = compile_mask("assets/units/size_*/macros/*.xml").unwrap();
        assert!(matcher.is_match("assets/units/size_s/macros/ship_arg_s_fighter_01_a_macro.xml"));
        assert!(matcher.is_match("Assets/Units/Size_M/Macros/storage_m.XML"));
        assert!(!matcher.is_match("assets/units/size_s/extra/macros/x.xml"));
    }

    #[test]
    fn test_fs_provider_layers_zip_over_loose_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("libraries")).unwrap();
        fs::write(dir.path().join("libraries/wares.xml"), "<wares>loose</wares>").unwrap();
        fs::write(dir.path().join("libraries/factions.xml"), "<factions/>").unwrap();

        let file = fs::File::create(dir.path().join("01.zip")).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("libraries/wares.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<wares>bundle</wares>").unwrap();
        zip.finish().unwrap();

        let source = FsProvider.open_package(dir.path()).unwrap();
        let entries = source.list_entries("libraries/*.xml").unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["libraries/factions.xml", "libraries/wares.xml"]);

        let wares = entries.iter().find(|e| e.path == "libraries/wares.xml").unwrap();
        let mut content = String::new();
        source
            .open_stream(wares)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<wares>bundle</wares>");
    }

    #[test]
    fn test_missing_package_is_empty() {
        let dir = TempDir::new().unwrap();
        let source = FsProvider.open_package(&dir.path().join("missing")).unwrap();
        assert!(source.list_entries("**/*.xml").unwrap().is_empty());
    }
}

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::parser::{XmlEvent, XmlStream};

/// Decides which extension packages load, and in which order
pub trait PackageOrder {
    /// Extension directories relative to the game root, dependencies first
    fn sorted_extensions(&self, game_root: &Path) -> Result<Vec<PathBuf>>;
}

/// A fixed package list
#[derive(Debug, Default, Clone)]
pub struct StaticOrder(pub Vec<PathBuf>);

impl PackageOrder for StaticOrder {
    fn sorted_extensions(&self, _game_root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.0.clone())
    }
}

/// Orders `extensions/*` by the dependencies declared in their `content.xml`
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentXmlOrder;

#[derive(Debug, Clone, PartialEq)]
struct Extension {
    id: String,
    dir: PathBuf,
    dependencies: Vec<String>,
}

impl PackageOrder for ContentXmlOrder {
    fn sorted_extensions(&self, game_root: &Path) -> Result<Vec<PathBuf>> {
        let extensions_dir = game_root.join("extensions");
        if !extensions_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut extensions = BTreeMap::new();
        for entry in std::fs::read_dir(&extensions_dir)
            .with_context(|| format!("Failed to read {:?}", extensions_dir))?
        {
            let dir = entry?.path();
            let manifest = dir.join("content.xml");
            if !manifest.is_file() {
                continue;
            }
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };

            match read_manifest(&manifest) {
                Ok(Some((id, dependencies))) => {
                    let id = if id.is_empty() { name.clone() } else { id };
                    extensions.insert(
                        id.clone(),
                        Extension {
                            id,
                            dir: PathBuf::from("extensions").join(&name),
                            dependencies,
                        },
                    );
                }
                Ok(None) => debug!("Extension {} is disabled", name),
                Err(e) => warn!("Skipping extension {}: {:#}", name, e),
            }
        }

        Ok(topological_sort(&extensions)
            .into_iter()
            .map(|ext| ext.dir.clone())
            .collect())
    }
}

/// `(id, dependency ids)` of a manifest, `None` when the extension is disabled
fn read_manifest(path: &Path) -> Result<Option<(String, Vec<String>)>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut stream = XmlStream::new(BufReader::new(file));

    let mut id = String::new();
    let mut dependencies = Vec::new();

    while let Some(event) = stream.next_event()? {
        let XmlEvent::Start(element) = event else {
            continue;
        };
        if element.is("content") && stream.depth() == 1 {
            let enabled = element.attr_or_empty("enabled");
            if enabled == "0" || enabled.eq_ignore_ascii_case("false") {
                return Ok(None);
            }
            id = element.attr_or_empty("id").to_string();
        } else if element.is("dependency") {
            if let Some(dep) = element.attr("id").filter(|d| !d.is_empty()) {
                dependencies.push(dep.to_string());
            }
        }
    }

    Ok(Some((id, dependencies)))
}

/// Dependencies before dependents, ties by id. Missing dependencies are
/// ignored; a cycle is broken at the edge that closes it.
fn topological_sort(extensions: &BTreeMap<String, Extension>) -> Vec<&Extension> {
    let mut result = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut temp_visited: HashSet<&str> = HashSet::new();

    for id in extensions.keys() {
        visit(id, extensions, &mut visited, &mut temp_visited, &mut result);
    }

    result
}

fn visit<'a>(
    id: &'a str,
    extensions: &'a BTreeMap<String, Extension>,
    visited: &mut HashSet<&'a str>,
    temp_visited: &mut HashSet<&'a str>,
    result: &mut Vec<&'a Extension>,
) {
    if visited.contains(id) {
        return;
    }
    if temp_visited.contains(id) {
        warn!("Circular extension dependency detected at: {}", id);
        return;
    }
    let Some(extension) = extensions.get(id) else {
        return;
    };

    temp_visited.insert(id);

    let mut deps: Vec<&str> = extension.dependencies.iter().map(|d| d.as_str()).collect();
    deps.sort_unstable();
    for dep in deps {
        if dep != id {
            visit(dep, extensions, visited, temp_visited, result);
        }
    }

    temp_visited.remove(id);
    visited.insert(id);
    result.push(extension);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn add_extension(root: &Path, dir: &str, manifest: &str) {
        let path = root.join("extensions").join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("content.xml"), manifest).unwrap();
    }

    fn names(order: Vec<PathBuf>) -> Vec<String> {
        order
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let dir = TempDir::new().unwrap();
        add_extension(
            dir.path(),
            "ego_dlc_boron",
            r#"<content id="ego_dlc_boron"><dependency id="ego_dlc_split" optional="true"/></content>"#,
        );
        add_extension(dir.path(), "ego_dlc_split", r#"<content id="ego_dlc_split"/>"#);
        add_extension(
            dir.path(),
            "aaa_mod",
            r#"<content id="aaa_mod"><dependency id="ego_dlc_boron"/><dependency id="not_installed"/></content>"#,
        );
        add_extension(dir.path(), "off", r#"<content id="off" enabled="0"/>"#);

        let order = names(ContentXmlOrder.sorted_extensions(dir.path()).unwrap());
        assert_eq!(order, vec!["ego_dlc_split", "ego_dlc_boron", "aaa_mod"]);
    }

    #[test]
    fn test_cycle_still_lists_everything() {
        let dir = TempDir::new().unwrap();
        add_extension(dir.path(), "a", r#"<content id="a"><dependency id="b"/></content>"#);
        add_extension(dir.path(), "b", r#"<content id="b"><dependency id="a"/></content>"#);

        let order = names(ContentXmlOrder.sorted_extensions(dir.path()).unwrap());
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_no_extensions_dir() {
        let dir = TempDir::new().unwrap();
        assert!(ContentXmlOrder
            .sorted_extensions(dir.path())
            .unwrap()
            .is_empty());
        let fixed = StaticOrder(vec![PathBuf::from("extensions/x")]);
        assert_eq!(fixed.sorted_extensions(dir.path()).unwrap().len(), 1);
    }
}

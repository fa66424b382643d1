//! # Document Store
//!
//! Loading and saving of the YAML documents the engine works on, plus path
//! helpers for reading and editing fixed fields inside them.
//!
//! Documents are held as `serde_yaml::Value` trees. Mapping order is kept
//! across a load/save round trip; comments and quoting style are not.
//!
//! ## Key Components
//!
//! - **`load` / `load_as` / `load_all`**: read one document, a typed view of
//!   one document, or every document of a multi-document stream.
//! - **`save` / `write_text`**: write a tree or plain text, creating parent
//!   directories as needed.
//! - **`lookup` / `lookup_mut` / `require_mut`**: read-only and in-place
//!   access to an existing field.
//! - **`ensure_path`**: in-place access that creates missing mappings.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};
use crate::merge::{parse_path, PathSegment};

/// Load a single YAML document.
pub fn load<P: AsRef<Path>>(path: P) -> Result<YamlValue> {
    let path = path.as_ref();
    info!("  Parsing yaml file: {}", path.display());
    let content = read(path)?;
    parse(&content, path)
}

/// Load a single YAML document into a typed view.
pub fn load_as<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let value = load(path)?;
    serde_yaml::from_value(value).map_err(|e| Error::document(path.display().to_string(), e.to_string()))
}

/// Load every document of a multi-document YAML stream.
///
/// Empty documents (a bare `---`) are skipped.
pub fn load_all<P: AsRef<Path>>(path: P) -> Result<Vec<YamlValue>> {
    let path = path.as_ref();
    info!("  Parsing yaml stream: {}", path.display());
    let content = read(path)?;
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        let value = YamlValue::deserialize(document)
            .map_err(|e| Error::document(path.display().to_string(), e.to_string()))?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    debug!("  {} document(s) in {}", documents.len(), path.display());
    Ok(documents)
}

/// Parse a YAML document held in memory, naming `origin` in errors.
pub fn parse(content: &str, origin: &Path) -> Result<YamlValue> {
    serde_yaml::from_str(content).map_err(|e| Error::document(origin.display().to_string(), e.to_string()))
}

/// Write a YAML document.
pub fn save<P: AsRef<Path>>(value: &YamlValue, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("  Writing YAML file: {}", path.display());
    write_text(path, &serde_yaml::to_string(value)?)
}

/// Write plain text, creating parent directories as needed.
pub fn write_text<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    debug!("  Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::document(path.display().to_string(), e.to_string()))
}

/// Look up an existing field.
pub fn lookup<'a>(value: &'a YamlValue, path: &str) -> Option<&'a YamlValue> {
    parse_path(path)
        .iter()
        .try_fold(value, |current, segment| match segment {
            PathSegment::Key(key) => current.as_mapping()?.get(key.as_str()),
            PathSegment::Index(idx) => current.as_sequence()?.get(*idx),
        })
}

/// Mutable access to an existing field.
pub fn lookup_mut<'a>(value: &'a mut YamlValue, path: &str) -> Option<&'a mut YamlValue> {
    let mut current = value;
    for segment in parse_path(path) {
        current = match segment {
            PathSegment::Key(key) => current.as_mapping_mut()?.get_mut(key.as_str())?,
            PathSegment::Index(idx) => current.as_sequence_mut()?.get_mut(idx)?,
        };
    }
    Some(current)
}

/// Mutable access to a field that must exist.
///
/// # Errors
///
/// Returns `Error::Document` naming `origin` and the path when the field is
/// absent.
pub fn require_mut<'a>(value: &'a mut YamlValue, path: &str, origin: &str) -> Result<&'a mut YamlValue> {
    lookup_mut(value, path).ok_or_else(|| Error::document(origin, format!("missing field '{}'", path)))
}

/// Navigate to a field, creating intermediate mappings as needed.
///
/// Index segments must refer to existing elements.
///
/// # Errors
///
/// Returns `Error::Merge` when a non-null scalar sits in the way or an index
/// is out of bounds.
pub fn ensure_path<'a>(value: &'a mut YamlValue, path: &str) -> Result<&'a mut YamlValue> {
    let mut current = value;
    for segment in parse_path(path) {
        match segment {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = YamlValue::Mapping(Default::default());
                }
                let map = current.as_mapping_mut().ok_or_else(|| Error::Merge {
                    operation: "navigate".to_string(),
                    message: format!("Expected mapping while navigating to '{}'", key),
                })?;
                current = map
                    .entry(YamlValue::String(key))
                    .or_insert(YamlValue::Null);
            }
            PathSegment::Index(idx) => {
                current = current
                    .as_sequence_mut()
                    .and_then(|seq| seq.get_mut(idx))
                    .ok_or_else(|| Error::Merge {
                        operation: "navigate".to_string(),
                        message: format!("No sequence element at index {}", idx),
                    })?;
            }
        }
    }
    Ok(current)
}

/// Read a string field, treating absence and non-strings as missing.
pub fn lookup_str<'a>(value: &'a YamlValue, path: &str) -> Option<&'a str> {
    lookup(value, path).and_then(YamlValue::as_str)
}

//! Keyed structural merge
//!
//! [`keyed_merge`] combines two YAML trees without losing data from either
//! side:
//!
//! - Scalars: the source value wins.
//! - Mappings: merged key by key; target-only keys are kept and source-only
//!   keys are added.
//! - Lists at a path named in the [`MergeScheme`]: elements are matched by a
//!   key field. Matched elements are merged recursively, unmatched source
//!   elements are appended and unmatched target elements are kept.
//! - Any other list: the source list replaces the target list.
//!
//! Source elements of a keyed list that are not mappings, or that lack the
//! key field, can never be matched and are appended as-is.
//!
//! [`sync_and_filter`] builds on this to align a destination list with an
//! authoritative one while keeping destination-only overrides.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde_yaml::{Mapping, Value as YamlValue};

use super::{parse_scheme_path, scheme_path_string, yaml_type_name};
use crate::error::{Error, Result};
use crate::image::{deduplicate_and_sort, entries_to_value, EntryFilter, ImageEntry};

/// Which lists are merged by key, and by which field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeScheme {
    rules: BTreeMap<Vec<String>, String>,
}

impl MergeScheme {
    /// A scheme with no keyed lists; every list is replaced wholesale.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheme with a single keyed list.
    ///
    /// ```
    /// use bundle_reconcile::merge::keyed::MergeScheme;
    ///
    /// let scheme = MergeScheme::keyed("$.env", "name").unwrap();
    /// assert_eq!(scheme.key_at(&["env".to_string()]), Some("name"));
    /// ```
    pub fn keyed(path: &str, key: &str) -> Result<Self> {
        Self::new().with_key(path, key)
    }

    /// Add a keyed list rule.
    pub fn with_key(mut self, path: &str, key: &str) -> Result<Self> {
        self.rules.insert(parse_scheme_path(path)?, key.to_string());
        Ok(self)
    }

    /// The key field governing the list at `path`, if any.
    pub fn key_at(&self, path: &[String]) -> Option<&str> {
        self.rules.get(path).map(String::as_str)
    }
}

/// Merge `source` on top of `target`, returning a new tree.
///
/// Neither input is modified.
pub fn keyed_merge(target: &YamlValue, source: &YamlValue, scheme: &MergeScheme) -> YamlValue {
    let mut result = target.clone();
    merge_into(&mut result, source, scheme, &mut Vec::new());
    result
}

fn merge_into(target: &mut YamlValue, source: &YamlValue, scheme: &MergeScheme, path: &mut Vec<String>) {
    if let (Some(target_map), Some(source_map)) = (target.as_mapping_mut(), source.as_mapping()) {
        merge_mappings(target_map, source_map, scheme, path);
        return;
    }

    if let (Some(source_seq), Some(key)) = (source.as_sequence(), scheme.key_at(path)) {
        if let Some(target_seq) = target.as_sequence_mut() {
            merge_keyed_list(target_seq, source_seq, key, scheme, path);
            return;
        }
    }

    if target.is_sequence() && source.is_sequence() {
        debug!("Replacing list at '{}'", scheme_path_string(path));
    } else if !target.is_null() && target != source {
        debug!(
            "Overwriting value at '{}': {} -> {}",
            scheme_path_string(path),
            yaml_type_name(target),
            yaml_type_name(source)
        );
    }

    *target = source.clone();
}

fn merge_mappings(target: &mut Mapping, source: &Mapping, scheme: &MergeScheme, path: &mut Vec<String>) {
    for (key, value) in source {
        path.push(key_label(key));
        match target.get_mut(key) {
            Some(existing) => merge_into(existing, value, scheme, path),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
        path.pop();
    }
}

fn merge_keyed_list(
    target: &mut Vec<YamlValue>,
    source: &[YamlValue],
    key: &str,
    scheme: &MergeScheme,
    path: &mut Vec<String>,
) {
    for item in source {
        let matched = element_key(item, key)
            .and_then(|wanted| target.iter_mut().find(|t| element_key(t, key) == Some(wanted)));
        match matched {
            Some(existing) => merge_into(existing, item, scheme, path),
            None => target.push(item.clone()),
        }
    }
}

fn element_key<'a>(element: &'a YamlValue, key: &str) -> Option<&'a YamlValue> {
    element.as_mapping()?.get(key)
}

fn key_label(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

/// Keep only the elements of `list` whose `key` field is in `keep`.
///
/// # Errors
///
/// Returns `Error::Merge` if `list` is not a sequence.
pub fn restrict_to_keys(list: &YamlValue, key: &str, keep: &BTreeSet<String>) -> Result<YamlValue> {
    let items = list.as_sequence().ok_or_else(|| Error::Merge {
        operation: "restrict to keys".to_string(),
        message: format!("Expected a list, found {}", yaml_type_name(list)),
    })?;

    let kept: Vec<YamlValue> = items
        .iter()
        .filter(|item| {
            let keep_item = element_key(item, key)
                .and_then(YamlValue::as_str)
                .is_some_and(|name| keep.contains(name));
            if !keep_item {
                debug!("Dropping obsolete entry {:?}", element_key(item, key));
            }
            keep_item
        })
        .cloned()
        .collect();

    Ok(YamlValue::Sequence(kept))
}

/// Align `destination` with an authoritative image list.
///
/// The authoritative list is deduplicated by name (first wins), sorted and
/// stripped of entries whose name contains one of `exclusions`. The
/// destination list is then merged on top of it by name and trimmed to the
/// surviving names. Destination-only fields of surviving entries are kept,
/// obsolete destination entries are dropped and new authoritative entries
/// are added.
pub fn sync_and_filter(
    authoritative: &[ImageEntry],
    destination: &YamlValue,
    exclusions: &[String],
) -> Result<YamlValue> {
    let unique = deduplicate_and_sort(authoritative);
    let filtered = if exclusions.is_empty() {
        unique
    } else {
        EntryFilter::Exclude(exclusions.to_vec()).apply(&unique)
    };
    let keep: BTreeSet<String> = filtered.iter().map(|entry| entry.name.clone()).collect();

    let destination = if destination.is_null() {
        YamlValue::Sequence(Vec::new())
    } else {
        destination.clone()
    };

    let scheme = MergeScheme::keyed("$", "name")?;
    let merged = keyed_merge(&entries_to_value(&filtered)?, &destination, &scheme);
    let result = restrict_to_keys(&merged, "name", &keep)?;

    info!("Synced list to {} authoritative entries", keep.len());
    Ok(result)
}

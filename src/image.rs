//! # Image Entries and References
//!
//! Image lists in every document this tool touches (`relatedImages` in the
//! bundle patch, the operands map and the nudging file, the container `env`
//! list of the CSV) share one shape: a `name` that acts as the merge key and a
//! `value` holding a full image reference.
//!
//! An image reference is `registry/org/repo[@digest]`, where `repo` may itself
//! contain slashes. The component name used to key git provenance is the repo
//! path with one trailing platform suffix (`-rhel8`, `-rhel9`) removed.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};

/// Platform suffixes stripped from repo paths to derive component names.
pub const PLATFORM_SUFFIXES: [&str; 2] = ["-rhel8", "-rhel9"];

/// A named image reference as it appears in image lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Logical identifier, e.g. `RELATED_IMAGE_ODH_DASHBOARD_IMAGE`.
    pub name: String,
    /// Full image reference, optionally digest-qualified.
    #[serde(default)]
    pub value: String,
}

impl ImageEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parse a YAML sequence of `{name, value}` mappings.
pub fn entries_from_value(value: &YamlValue) -> Result<Vec<ImageEntry>> {
    Ok(serde_yaml::from_value(value.clone())?)
}

/// Serialize image entries back into a YAML sequence.
pub fn entries_to_value(entries: &[ImageEntry]) -> Result<YamlValue> {
    Ok(serde_yaml::to_value(entries)?)
}

/// A parsed `registry/org/repo[@digest]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub org: String,
    pub repo_path: String,
    pub component_name: String,
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference.
    ///
    /// The digest is everything after the last `@`. An empty digest (a value
    /// ending in `@`) is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedReference` when the path has fewer than three
    /// segments or an empty registry/org.
    pub fn parse(value: &str) -> Result<Self> {
        let (base, digest) = match value.rsplit_once('@') {
            Some((base, digest)) => (base, (!digest.is_empty()).then(|| digest.to_string())),
            None => (value, None),
        };

        let segments: Vec<&str> = base.split('/').collect();
        if segments.len() < 3 || segments[0].is_empty() || segments[1].is_empty() {
            return Err(Error::MalformedReference {
                value: value.to_string(),
            });
        }

        let repo_path = segments[2..].join("/");
        if repo_path.is_empty() {
            return Err(Error::MalformedReference {
                value: value.to_string(),
            });
        }

        Ok(Self {
            registry: segments[0].to_string(),
            org: segments[1].to_string(),
            component_name: component_name(&repo_path).to_string(),
            repo_path,
            digest,
        })
    }

    /// `registry/org/repo` without the digest.
    pub fn location(&self) -> String {
        format!("{}/{}/{}", self.registry, self.org, self.repo_path)
    }

    /// A new reference pinned to `digest`.
    pub fn with_digest(&self, digest: impl Into<String>) -> Self {
        Self {
            digest: Some(digest.into()),
            ..self.clone()
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.digest {
            Some(digest) => write!(f, "{}@{}", self.location(), digest),
            None => f.write_str(&self.location()),
        }
    }
}

/// Strip at most one trailing platform suffix from a repo path.
pub fn component_name(repo_path: &str) -> &str {
    PLATFORM_SUFFIXES
        .iter()
        .find_map(|suffix| repo_path.strip_suffix(suffix))
        .unwrap_or(repo_path)
}

/// Name-substring filter applied to image entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryFilter {
    /// Keep entries whose name contains any of the patterns.
    Include(Vec<String>),
    /// Drop entries whose name contains any of the patterns.
    Exclude(Vec<String>),
}

impl EntryFilter {
    /// Build a filter from optional include/exclude lists.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigParse` when both lists are given.
    pub fn from_options(include: Option<Vec<String>>, exclude: Option<Vec<String>>) -> Result<Option<Self>> {
        match (include, exclude) {
            (Some(_), Some(_)) => Err(Error::config(
                "Cannot use both include and exclude filters at the same time",
            )),
            (Some(patterns), None) => Ok(Some(EntryFilter::Include(patterns))),
            (None, Some(patterns)) => Ok(Some(EntryFilter::Exclude(patterns))),
            (None, None) => Ok(None),
        }
    }

    fn matched<'a>(patterns: &'a [String], name: &str) -> Option<&'a str> {
        patterns
            .iter()
            .find(|pattern| name.contains(pattern.as_str()))
            .map(String::as_str)
    }

    /// Apply the filter, returning copies of the kept entries.
    pub fn apply(&self, entries: &[ImageEntry]) -> Vec<ImageEntry> {
        match self {
            EntryFilter::Include(patterns) => {
                info!("Filtering image entries to INCLUDE patterns: {:?}", patterns);
                entries
                    .iter()
                    .filter(|entry| match Self::matched(patterns, &entry.name) {
                        Some(pattern) => {
                            info!("  + {} (matched pattern: '{}')", entry.name, pattern);
                            true
                        }
                        None => false,
                    })
                    .cloned()
                    .collect()
            }
            EntryFilter::Exclude(patterns) => {
                info!("Filtering image entries to EXCLUDE patterns: {:?}", patterns);
                entries
                    .iter()
                    .filter(|entry| match Self::matched(patterns, &entry.name) {
                        Some(pattern) => {
                            info!("  - {} (matched pattern: '{}')", entry.name, pattern);
                            false
                        }
                        None => true,
                    })
                    .cloned()
                    .collect()
            }
        }
    }
}

/// Deduplicate entries by name keeping the first occurrence, sorted by name.
pub fn deduplicate_and_sort(entries: &[ImageEntry]) -> Vec<ImageEntry> {
    let mut seen: BTreeMap<&str, &ImageEntry> = BTreeMap::new();
    let mut duplicates = Vec::new();

    for entry in entries {
        if seen.contains_key(entry.name.as_str()) {
            duplicates.push(entry.name.as_str());
        } else {
            seen.insert(entry.name.as_str(), entry);
        }
    }

    if duplicates.is_empty() {
        info!("No duplicate entries found");
    } else {
        info!("Duplicate entries removed: {:?}", duplicates);
    }

    let result: Vec<ImageEntry> = seen.into_values().cloned().collect();
    debug!("Deduplicated entries: {:?}", result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_digest() {
        let reference =
            ImageReference::parse("quay.io/rhoai/odh-dashboard-rhel8@sha256:abc123").unwrap();
        assert_eq!(reference.registry, "quay.io");
        assert_eq!(reference.org, "rhoai");
        assert_eq!(reference.repo_path, "odh-dashboard-rhel8");
        assert_eq!(reference.component_name, "odh-dashboard");
        assert_eq!(reference.digest.as_deref(), Some("sha256:abc123"));
    }

    #[test]
    fn test_parse_nested_repo_path() {
        let reference = ImageReference::parse("quay.io/org/team/tool-rhel9").unwrap();
        assert_eq!(reference.repo_path, "team/tool-rhel9");
        assert_eq!(reference.component_name, "team/tool");
        assert_eq!(reference.digest, None);
    }

    #[test]
    fn test_parse_trailing_at_means_no_digest() {
        let reference = ImageReference::parse("quay.io/org/foo-rhel9@").unwrap();
        assert_eq!(reference.digest, None);
        assert_eq!(reference.to_string(), "quay.io/org/foo-rhel9");
    }

    #[test]
    fn test_parse_rejects_short_paths() {
        for value in ["quay.io/org", "quay.io", "", "/org/repo", "quay.io//repo", "quay.io/org/"] {
            match ImageReference::parse(value) {
                Err(Error::MalformedReference { value: v }) => assert_eq!(v, value),
                other => panic!("expected MalformedReference for {:?}, got {:?}", value, other),
            }
        }
    }

    #[test]
    fn test_with_digest_round_trips() {
        let reference = ImageReference::parse("quay.io/org/foo-rhel9").unwrap();
        let pinned = reference.with_digest("sha256:1");
        assert_eq!(pinned.to_string(), "quay.io/org/foo-rhel9@sha256:1");
        assert_eq!(reference.digest, None);
    }

    #[test]
    fn test_component_name_strips_one_suffix() {
        assert_eq!(component_name("foo-rhel8"), "foo");
        assert_eq!(component_name("foo-rhel9"), "foo");
        assert_eq!(component_name("foo-rhel9-rhel8"), "foo-rhel9");
        assert_eq!(component_name("rhel8-foo"), "rhel8-foo");
        assert_eq!(component_name("foo"), "foo");
    }

    #[test]
    fn test_filter_include() {
        let entries = vec![
            ImageEntry::new("RELATED_IMAGE_ODH_OPERATOR_IMAGE", "a"),
            ImageEntry::new("RELATED_IMAGE_DASHBOARD_IMAGE", "b"),
        ];
        let filter = EntryFilter::Include(vec!["ODH_OPERATOR".to_string()]);
        let kept = filter.apply(&entries);
        assert_eq!(kept, vec![entries[0].clone()]);
    }

    #[test]
    fn test_filter_exclude() {
        let entries = vec![
            ImageEntry::new("RELATED_IMAGE_FBC_IMAGE", "a"),
            ImageEntry::new("RELATED_IMAGE_DASHBOARD_IMAGE", "b"),
            ImageEntry::new("RELATED_IMAGE_BUNDLE_IMAGE", "c"),
        ];
        let filter = EntryFilter::Exclude(vec!["FBC".to_string(), "BUNDLE".to_string()]);
        let kept = filter.apply(&entries);
        assert_eq!(kept, vec![entries[1].clone()]);
    }

    #[test]
    fn test_filter_rejects_both_lists() {
        let result = EntryFilter::from_options(Some(vec!["A".into()]), Some(vec!["B".into()]));
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
        assert_eq!(EntryFilter::from_options(None, None).unwrap(), None);
    }

    #[test]
    fn test_deduplicate_keeps_first_and_sorts() {
        let entries = vec![
            ImageEntry::new("b", "first-b"),
            ImageEntry::new("a", "first-a"),
            ImageEntry::new("b", "second-b"),
        ];
        let result = deduplicate_and_sort(&entries);
        assert_eq!(
            result,
            vec![ImageEntry::new("a", "first-a"), ImageEntry::new("b", "first-b")]
        );
    }

    #[test]
    fn test_entries_value_conversion() {
        let value: YamlValue =
            serde_yaml::from_str("- name: A\n  value: quay.io/o/a@sha256:1\n- name: B\n").unwrap();
        let entries = entries_from_value(&value).unwrap();
        assert_eq!(entries[1], ImageEntry::new("B", ""));
        let back = entries_to_value(&entries).unwrap();
        assert_eq!(back[0]["name"], YamlValue::String("A".to_string()));
    }

    proptest::proptest! {
        #[test]
        fn suffix_is_stripped_exactly_once(
            base in "[a-z][a-z0-9-]{0,15}",
            suffix in proptest::sample::select(vec!["-rhel8", "-rhel9"]),
        ) {
            let repo = format!("{}{}", base, suffix);
            proptest::prop_assert_eq!(component_name(&repo), base.as_str());
        }

        #[test]
        fn names_without_suffix_are_unchanged(base in "[a-z][a-z0-9]{0,15}") {
            proptest::prop_assert_eq!(component_name(&base), base.as_str());
        }
    }
}

//! # Registry Remapping
//!
//! Build pipelines push images to a build registry under build-time repo
//! paths. Release manifests must instead reference the production registry
//! and release repo paths. [`RegistryMapping`] captures that translation and
//! [`RegistryMapping::remap`] applies it to a batch of image entries.
//!
//! Only the exact `source_registry/source_repo@` prefix is rewritten, so a
//! mapping for `rhoai/odh-dashboard` never touches
//! `quay.io/rhoai/odh-dashboard-extra@...`.

use log::{debug, info};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::config::{BuildConfig, Replacement};
use crate::error::{Error, Result};
use crate::image::ImageEntry;

/// One registry pair plus an ordered repo-path mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryMapping {
    source_registry: String,
    target_registry: String,
    repos: Vec<(String, String)>,
}

impl RegistryMapping {
    /// Build a mapping from a registry map and an ordered repo mapping.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRegistryMapping` unless `registries` holds
    /// exactly one pair.
    pub fn new(registries: &[(String, String)], repos: Vec<(String, String)>) -> Result<Self> {
        match registries {
            [(source, target)] => Ok(Self {
                source_registry: source.clone(),
                target_registry: target.clone(),
                repos,
            }),
            _ => Err(Error::InvalidRegistryMapping {
                count: registries.len(),
            }),
        }
    }

    /// Build the mapping from a YAML mapping of registries, as found in
    /// configuration documents.
    pub fn from_yaml(registries: &Mapping, repos: Vec<(String, String)>) -> Result<Self> {
        let pairs = yaml_string_pairs(registries)?;
        Self::new(&pairs, repos)
    }

    /// Mapping from a build-config replacement to the production registry.
    pub fn from_replacement(replacement: &Replacement, production_registry: &str) -> Result<Self> {
        Self::new(
            &[(replacement.registry.clone(), production_registry.to_string())],
            replacement.repo_mappings.clone(),
        )
    }

    /// Mapping from the first `config.replacements` entry of a build config.
    pub fn from_build_config(config: &BuildConfig, production_registry: &str) -> Result<Self> {
        Self::from_replacement(config.primary_replacement()?, production_registry)
    }

    pub fn source_registry(&self) -> &str {
        &self.source_registry
    }

    pub fn target_registry(&self) -> &str {
        &self.target_registry
    }

    /// Rewrite a single image value.
    pub fn remap_value(&self, value: &str) -> String {
        if value.is_empty() {
            return String::new();
        }
        self.repos
            .iter()
            .find_map(|(source_repo, target_repo)| {
                value
                    .strip_prefix(&format!("{}/{}@", self.source_registry, source_repo))
                    .map(|digest| format!("{}/{}@{}", self.target_registry, target_repo, digest))
            })
            .unwrap_or_else(|| value.to_string())
    }

    /// Rewrite every entry in place.
    pub fn remap(&self, entries: &mut [ImageEntry]) {
        info!(
            "Applying registry and repo replacements to {} image(s)",
            entries.len()
        );
        for entry in entries.iter_mut() {
            let new_value = self.remap_value(&entry.value);
            debug!("  {} -> {}", entry.value, new_value);
            entry.value = new_value;
        }
    }
}

/// Collect string key/value pairs from a YAML mapping in insertion order.
pub fn yaml_string_pairs(mapping: &Mapping) -> Result<Vec<(String, String)>> {
    mapping
        .iter()
        .map(|(key, value)| match (key, value) {
            (YamlValue::String(k), YamlValue::String(v)) => Ok((k.clone(), v.clone())),
            _ => Err(Error::config(format!(
                "Expected string mapping entry, got {:?}: {:?}",
                key, value
            ))),
        })
        .collect()
}

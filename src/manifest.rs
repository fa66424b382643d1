//! # Bundle Manifest Patching
//!
//! Targeted rewrites of the ClusterServiceVersion (CSV) and the bundle
//! annotations document, plus rendering of the bundle build arguments.
//!
//! ## Key Components
//!
//! - **`ManifestPatcher::patch_csv_fields`**: pins the operator image, stamps
//!   version and creation time, drops upgrade-graph fields and merges the
//!   additional-fields patch.
//! - **`ManifestPatcher::patch_related_images`**: merges image entries into
//!   the operator container `env` by name and rebuilds `spec.relatedImages`.
//! - **`strip_image_tags`**, **`strip_channel_annotations`** and
//!   **`render_build_args`**: smaller helpers used by the bundle processor.
//!
//! All edits go through fixed field paths. A CSV missing one of the required
//! paths is reported as a document error naming the path.

use chrono::{DateTime, Utc};
use log::{debug, info};
use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::defaults::{Settings, GIT_COMMIT_LABEL, GIT_URL_LABEL};
use crate::document::{ensure_path, lookup, lookup_mut, require_mut};
use crate::error::{Error, Result};
use crate::image::ImageEntry;
use crate::merge::keyed::{keyed_merge, MergeScheme};
use crate::provenance::ProvenanceMap;

/// The operator container inside the CSV install strategy.
pub const OPERATOR_CONTAINER_PATH: &str = "spec.install.spec.deployments[0].spec.template.spec.containers[0]";

/// Channel annotations dropped from bundle metadata.
pub const CHANNEL_ANNOTATIONS: [&str; 2] = [
    "operators.operatorframework.io.bundle.channels.v1",
    "operators.operatorframework.io.bundle.channel.default.v1",
];

const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const CSV: &str = "CSV";

#[derive(Debug, Serialize)]
struct RelatedImage {
    name: String,
    image: String,
}

/// Applies the bundle edits to a CSV document.
#[derive(Debug, Clone)]
pub struct ManifestPatcher {
    operator_name: String,
    production_registry: String,
}

impl ManifestPatcher {
    pub fn new(settings: &Settings) -> Self {
        Self {
            operator_name: settings.operator_name.clone(),
            production_registry: settings.production_registry.clone(),
        }
    }

    /// Set the operator image, version and creation time, remove
    /// `olm.skipRange` and `spec.replaces`, then merge `csv_patch` on top.
    pub fn patch_csv_fields(
        &self,
        csv: &mut YamlValue,
        operator_image: &str,
        version: &str,
        created_at: DateTime<Utc>,
        csv_patch: Option<&YamlValue>,
    ) -> Result<()> {
        info!("Updating operator container image...");
        *ensure_path(csv, "metadata.annotations.containerImage")? = operator_image.into();
        let container = require_mut(csv, OPERATOR_CONTAINER_PATH, CSV)?;
        *ensure_path(container, "image")? = operator_image.into();
        info!("  containerImage: {}", operator_image);

        info!("Updating version and metadata fields...");
        let created_at = created_at.format(CREATED_AT_FORMAT).to_string();
        let csv_name = format!("{}.{}", self.operator_name, version);
        *ensure_path(csv, "metadata.annotations.createdAt")? = created_at.as_str().into();
        *ensure_path(csv, "metadata.name")? = csv_name.as_str().into();
        *ensure_path(csv, "spec.version")? = version.into();
        info!("  createdAt: {}", created_at);
        info!("  metadata.name: {}", csv_name);
        info!("  spec.version: {}", version);

        if let Some(removed) = remove_key(csv, "metadata.annotations", "olm.skipRange") {
            info!("  Removed olm.skipRange: {:?}", removed);
        }
        if let Some(removed) = remove_key(csv, "spec", "replaces") {
            info!("  Removed replaces: {:?}", removed);
        }

        if let Some(patch) = csv_patch {
            info!("Applying CSV patches...");
            *csv = keyed_merge(csv, patch, &MergeScheme::new());
        }
        Ok(())
    }

    /// Merge `env_entries` into the operator container `env` by name and
    /// rebuild `spec.relatedImages`.
    ///
    /// Related images list the digest-pinned production images found in the
    /// CSV annotations first, then every entry of `env_entries` with its
    /// `RELATED_IMAGE_` prefix dropped and the name lower-cased.
    pub fn patch_related_images(&self, csv: &mut YamlValue, env_entries: &[ImageEntry]) -> Result<()> {
        info!("Updating deployment env vars...");
        let container = require_mut(csv, OPERATOR_CONTAINER_PATH, CSV)?;
        let existing = container.get("env").cloned().unwrap_or(YamlValue::Sequence(Vec::new()));

        let scheme = MergeScheme::keyed("$.env", "name")?;
        let target = single_key_mapping("env", existing);
        let source = single_key_mapping("env", serde_yaml::to_value(env_entries)?);
        let merged = keyed_merge(&target, &source, &scheme);
        let env = merged.get("env").cloned().unwrap_or(YamlValue::Null);
        *ensure_path(container, "env")? = env;

        info!("Updating spec.relatedImages list...");
        let mut related = Vec::new();
        if let Some(annotations) = lookup(csv, "metadata.annotations").and_then(YamlValue::as_mapping) {
            for value in annotations.values().filter_map(YamlValue::as_str) {
                if value.starts_with(&self.production_registry) && value.contains("@sha256:") {
                    let last = value.rsplit('/').next().unwrap_or(value);
                    related.push(RelatedImage {
                        name: format!("{}-annotation", last.replace("@sha256:", "-")),
                        image: value.to_string(),
                    });
                }
            }
        }
        for entry in env_entries {
            related.push(RelatedImage {
                name: entry.name.replace("RELATED_IMAGE_", "").to_lowercase(),
                image: entry.value.clone(),
            });
        }
        debug!("  relatedImages: {:?}", related);

        *ensure_path(csv, "spec.relatedImages")? = serde_yaml::to_value(&related)?;
        info!("  spec.relatedImages updated with {} entries", related.len());
        Ok(())
    }
}

fn single_key_mapping(key: &str, value: YamlValue) -> YamlValue {
    let mut mapping = Mapping::new();
    mapping.insert(key.into(), value);
    YamlValue::Mapping(mapping)
}

fn remove_key(doc: &mut YamlValue, parent: &str, key: &str) -> Option<YamlValue> {
    lookup_mut(doc, parent)?.as_mapping_mut()?.shift_remove(key)
}

/// Drop the tag from `repo:tag@digest` references and deduplicate by name.
///
/// A later entry with the same name replaces the value of the earlier one but
/// keeps its position.
pub fn strip_image_tags(entries: &[ImageEntry]) -> Result<Vec<ImageEntry>> {
    let tag = Regex::new(r":[^\s:@/]+@")?;
    let mut result: Vec<ImageEntry> = Vec::new();
    for entry in entries {
        let value = tag.replace_all(&entry.value, "@").into_owned();
        match result.iter_mut().find(|existing| existing.name == entry.name) {
            Some(existing) => existing.value = value,
            None => result.push(ImageEntry::new(entry.name.clone(), value)),
        }
    }
    Ok(result)
}

/// Remove the channel annotations from a bundle `annotations.yaml` document.
///
/// Returns the keys that were present.
pub fn strip_channel_annotations(annotations_doc: &mut YamlValue) -> Vec<String> {
    let mut removed = Vec::new();
    for key in CHANNEL_ANNOTATIONS {
        if let Some(value) = remove_key(annotations_doc, "annotations", key) {
            info!("  Removed {}: {:?}", key, value);
            removed.push(key.to_string());
        }
    }
    removed
}

/// Combine operator provenance with the manifests-config `map` and
/// `additional_meta` sections.
///
/// Later sources overwrite the value of a component but never its position.
pub fn build_arg_components(operator: &ProvenanceMap, manifests_config: &YamlValue) -> Mapping {
    let mut components = Mapping::new();
    for (name, provenance) in operator.iter() {
        components.insert(name.into(), provenance.to_yaml());
    }
    for section in ["map", "additional_meta"] {
        if let Some(entries) = manifests_config.get(section).and_then(YamlValue::as_mapping) {
            for (name, meta) in entries {
                components.insert(name.clone(), meta.clone());
            }
        }
    }
    components
}

/// Render `<COMPONENT>_GIT_URL=` / `<COMPONENT>_GIT_COMMIT=` lines.
///
/// Components with a `ref_type` are skipped. Component names are upper-cased
/// with `-` replaced by `_`.
///
/// # Errors
///
/// Returns `Error::Document` for a component lacking `git.url` or
/// `git.commit`.
pub fn render_build_args(components: &Mapping) -> Result<String> {
    let variable = |component: &str, label: &str| {
        format!(
            "{}_{}",
            component.replace('-', "_").to_uppercase(),
            label.replace('.', "_").to_uppercase()
        )
    };

    let mut args = String::new();
    for (name, meta) in components {
        let component = name.as_str().ok_or_else(|| {
            Error::document("manifests-config", format!("component name {:?} is not a string", name))
        })?;
        if meta.get("ref_type").is_some() {
            debug!("Skipping build args for '{}' (ref_type set)", component);
            continue;
        }
        for label in [GIT_URL_LABEL, GIT_COMMIT_LABEL] {
            let value = meta.get(label).and_then(YamlValue::as_str).ok_or_else(|| {
                Error::document("manifests-config", format!("component '{}' has no {}", component, label))
            })?;
            args.push_str(&format!("{}={}\n", variable(component, label), value));
        }
    }
    Ok(args)
}

//! # Configuration Documents
//!
//! Typed views of the YAML inputs the engine reads but never rewrites:
//!
//! - **`BuildConfig`** (`build-config.yaml`): registry replacements used to
//!   move images from the build registry to the production registry, and the
//!   list of supported platform versions used by catalog validation.
//! - **`BundlePatch`** (`bundle-patch.yaml`): the authoritative list of
//!   related images, the bundle version, and references to additional patch
//!   files living next to it.
//! - **`AdditionalImages`**: extra related images merged into the CSV.
//!
//! Documents that are edited and written back (CSV, operands map, manifests
//! config, nudging file, pipelines) are handled as plain YAML trees instead,
//! so unknown fields survive the round trip.
//!
//! Repo mappings are order-sensitive (replacements are applied in file
//! order), so they are read as ordered pairs rather than a hash map.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Mapping;

use crate::document;
use crate::error::{Error, Result};
use crate::image::ImageEntry;
use crate::remap::yaml_string_pairs;
use crate::version::PlatformVersion;

/// Root of `build-config.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    pub config: BuildConfigBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfigBody {
    #[serde(default)]
    pub replacements: Vec<Replacement>,
    #[serde(default, rename = "supported-ocp-versions")]
    pub supported_ocp_versions: Option<SupportedPlatforms>,
}

/// A build registry and the repo paths it publishes.
#[derive(Debug, Clone, Deserialize)]
pub struct Replacement {
    pub registry: String,
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub repo_mappings: Vec<(String, String)>,
}

/// Supported platform versions, in one of the two layouts in use.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SupportedPlatforms {
    /// Release and build platforms, used for per-platform catalog folders.
    Grouped {
        #[serde(default)]
        release: Vec<String>,
        #[serde(default)]
        build: Vec<NamedPlatform>,
    },
    /// Platforms with optional discontinuity cut-offs, used for pcc catalogs.
    Listed(Vec<PlatformEntry>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedPlatform {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformEntry {
    pub version: String,
    #[serde(default, rename = "discontinued-from")]
    pub discontinued_from: Option<String>,
}

impl BuildConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        document::load_as(path)
    }

    /// The first replacement block, which drives registry remapping.
    pub fn primary_replacement(&self) -> Result<&Replacement> {
        self.config.replacements.first().ok_or_else(|| Error::ConfigParse {
            message: "build config has no config.replacements entries".to_string(),
            hint: Some("Add a replacements entry with 'registry' and 'repo_mappings'".to_string()),
        })
    }

    fn supported(&self) -> Result<&SupportedPlatforms> {
        self.config
            .supported_ocp_versions
            .as_ref()
            .ok_or_else(|| Error::config("build config has no config.supported-ocp-versions"))
    }

    /// Sorted, deduplicated union of release and build platforms.
    pub fn grouped_platforms(&self) -> Result<Vec<PlatformVersion>> {
        match self.supported()? {
            SupportedPlatforms::Grouped { release, build } => {
                let mut platforms = release
                    .iter()
                    .map(String::as_str)
                    .chain(build.iter().map(|b| b.name.as_str()))
                    .map(PlatformVersion::parse)
                    .collect::<Result<Vec<_>>>()?;
                platforms.sort();
                platforms.dedup();
                Ok(platforms)
            }
            SupportedPlatforms::Listed(_) => Err(Error::config(
                "supported-ocp-versions must have 'release' and 'build' keys for catalog validation",
            )),
        }
    }

    /// Platforms with their optional discontinuity cut-offs, sorted.
    pub fn listed_platforms(&self) -> Result<Vec<(PlatformVersion, Option<String>)>> {
        match self.supported()? {
            SupportedPlatforms::Listed(entries) => {
                let mut platforms = entries
                    .iter()
                    .map(|entry| {
                        Ok((
                            PlatformVersion::parse(&entry.version)?,
                            entry.discontinued_from.clone(),
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                platforms.sort();
                Ok(platforms)
            }
            SupportedPlatforms::Grouped { .. } => Err(Error::config(
                "supported-ocp-versions must be a list of {version, discontinued-from} for pcc validation",
            )),
        }
    }
}

/// Root of `bundle-patch.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BundlePatch {
    pub patch: PatchBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchBody {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, rename = "relatedImages")]
    pub related_images: Vec<ImageEntry>,
    #[serde(default, rename = "additional-fields")]
    pub additional_fields: Option<FileRef>,
    #[serde(default, rename = "additional-related-images")]
    pub additional_related_images: Option<FileRef>,
}

/// Reference to a sibling file, resolved relative to the referencing file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub file: String,
}

impl BundlePatch {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        document::load_as(path)
    }

    /// The bundle version, required when patching a CSV.
    pub fn version(&self) -> Result<&str> {
        self.patch
            .version
            .as_deref()
            .ok_or_else(|| Error::config("bundle patch has no patch.version"))
    }
}

/// Root of the additional related images file.
#[derive(Debug, Clone, Deserialize)]
pub struct AdditionalImages {
    #[serde(default, rename = "additionalImages")]
    pub additional_images: Vec<ImageEntry>,
}

impl AdditionalImages {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        document::load_as(path)
    }
}

fn ordered_pairs<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let mapping = Option::<Mapping>::deserialize(deserializer)?.unwrap_or_default();
    yaml_string_pairs(&mapping).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILD_CONFIG: &str = r#"
config:
  replacements:
    - registry: quay.io
      repo_mappings:
        modh/odh-dashboard: rhoai/odh-dashboard
        aipcc/llama-stack-core: rhoai/odh-llama-stack-core
        rhoai/odh-rhel9-operator: rhoai/odh-rhel9-operator
  supported-ocp-versions:
    release: [v4.19, v4.16]
    build:
      - name: v4.20
      - name: v4.16
"#;

    #[test]
    fn test_parse_build_config_keeps_mapping_order() {
        let config: BuildConfig = serde_yaml::from_str(BUILD_CONFIG).unwrap();
        let replacement = config.primary_replacement().unwrap();
        assert_eq!(replacement.registry, "quay.io");
        let sources: Vec<&str> = replacement
            .repo_mappings
            .iter()
            .map(|(source, _)| source.as_str())
            .collect();
        assert_eq!(
            sources,
            vec!["modh/odh-dashboard", "aipcc/llama-stack-core", "rhoai/odh-rhel9-operator"]
        );
    }

    #[test]
    fn test_grouped_platforms_are_sorted_and_unique() {
        let config: BuildConfig = serde_yaml::from_str(BUILD_CONFIG).unwrap();
        let platforms: Vec<String> = config
            .grouped_platforms()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(platforms, vec!["v4.16", "v4.19", "v4.20"]);
        assert!(config.listed_platforms().is_err());
    }

    #[test]
    fn test_listed_platforms_with_cutoffs() {
        let yaml = r#"
config:
  supported-ocp-versions:
    - version: v4.17
    - version: v4.14
      discontinued-from: rhods-operator.2.20.0
"#;
        let config: BuildConfig = serde_yaml::from_str(yaml).unwrap();
        let platforms = config.listed_platforms().unwrap();
        assert_eq!(platforms[0].0.to_string(), "v4.14");
        assert_eq!(platforms[0].1.as_deref(), Some("rhods-operator.2.20.0"));
        assert_eq!(platforms[1].1, None);
        assert!(config.grouped_platforms().is_err());
        assert!(config.primary_replacement().is_err());
    }

    #[test]
    fn test_parse_bundle_patch() {
        let yaml = r#"
patch:
  version: 2.13.0
  additional-fields:
    file: csv-patch.yaml
  relatedImages:
    - name: RELATED_IMAGE_ODH_OPERATOR_IMAGE
      value: quay.io/rhoai/odh-rhel9-operator@sha256:abc
"#;
        let patch: BundlePatch = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(patch.version().unwrap(), "2.13.0");
        assert_eq!(patch.patch.related_images.len(), 1);
        assert_eq!(patch.patch.additional_fields.unwrap().file, "csv-patch.yaml");
        assert!(patch.patch.additional_related_images.is_none());
    }

    #[test]
    fn test_bundle_patch_without_version() {
        let patch: BundlePatch = serde_yaml::from_str("patch:\n  relatedImages: []\n").unwrap();
        assert!(patch.version().is_err());
    }

    #[test]
    fn test_repo_mappings_must_be_strings() {
        let yaml = "config:\n  replacements:\n    - registry: quay.io\n      repo_mappings:\n        a: [1]\n";
        assert!(serde_yaml::from_str::<BuildConfig>(yaml).is_err());
    }
}

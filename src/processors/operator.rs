//! `sync-operator`: align the operator repository with the bundle patch.
//!
//! 1. The operands map `relatedImages` is replaced by the bundle patch list
//!    (deduplicated, sorted, operator/bundle/FBC entries excluded).
//! 2. The nudging file is synced against the same list, keeping its own
//!    values for components that survive.
//! 3. Every operand is resolved to its latest signed digest for the release
//!    tag and merged back into the operands map by name.
//! 4. The manifests config `map` receives the resolved git provenance;
//!    resolved components not in `map` go to `additional_meta`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use log::{debug, info, warn};
use serde_yaml::{Mapping, Value as YamlValue};

use super::{related_images, single_entry, stage, GatedPipeline};
use crate::config::BundlePatch;
use crate::defaults::{Settings, GIT_COMMIT_LABEL, GIT_URL_LABEL};
use crate::document::{self, ensure_path};
use crate::error::{Error, Result};
use crate::gate::GateOperation;
use crate::image::{deduplicate_and_sort, entries_to_value, EntryFilter};
use crate::merge::keyed::{keyed_merge, sync_and_filter, MergeScheme};
use crate::provenance::{ImageProvenanceResolver, ProvenanceGap, ProvenanceMap, ResolverConfig};
use crate::registry::RegistryOperations;
use crate::report::Findings;
use crate::version::VersionTag;

/// Input locations of an operator run. Every document except the bundle
/// patch is rewritten in place.
#[derive(Debug, Clone)]
pub struct OperatorPaths {
    pub patch: PathBuf,
    pub operands_map: PathBuf,
    pub nudging: PathBuf,
    pub manifests_config: PathBuf,
    pub pipeline: PathBuf,
}

#[derive(Debug, Clone)]
pub struct OperatorRequest {
    pub paths: OperatorPaths,
    pub tag: VersionTag,
    pub pipeline: GateOperation,
}

/// What an operator run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorOutcome {
    /// Operand images pinned to a new digest.
    pub resolved: usize,
    /// Components written to `additional_meta`.
    pub additional_components: Vec<String>,
    pub pipeline_changed: bool,
}

pub struct OperatorProcessor {
    resolver: ImageProvenanceResolver,
    settings: Settings,
}

impl OperatorProcessor {
    pub fn new(registry: Box<dyn RegistryOperations>, settings: Settings, resolver_config: ResolverConfig) -> Self {
        Self {
            resolver: ImageProvenanceResolver::new(registry, resolver_config),
            settings,
        }
    }

    pub fn process(&self, request: &OperatorRequest) -> Result<OperatorOutcome> {
        let paths = &request.paths;
        stage("Initializing Operator Processor");
        info!("version tag: {}", request.tag);
        info!("push pipeline operation: {}", request.pipeline);
        debug!("paths: {:?}", paths);

        info!("Loading yaml files...");
        let patch = BundlePatch::from_file(&paths.patch)?;
        let mut operands_map = document::load(&paths.operands_map)?;
        let mut nudging = document::load(&paths.nudging)?;
        let mut manifests_config = document::load(&paths.manifests_config)?;
        let mut pipeline = GatedPipeline::load(&paths.pipeline)?;

        stage("Syncing relatedImages list from bundle patch...");
        let exclusions = &self.settings.operand_exclusions;
        let operands = EntryFilter::Exclude(exclusions.clone()).apply(&deduplicate_and_sort(&patch.patch.related_images));
        *ensure_path(&mut operands_map, "relatedImages")? = entries_to_value(&operands)?;
        info!("Operands map synced with {} entries", operands.len());

        let current_nudging = nudging.get("relatedImages").cloned().unwrap_or(YamlValue::Null);
        *ensure_path(&mut nudging, "relatedImages")? =
            sync_and_filter(&patch.patch.related_images, &current_nudging, exclusions)?;
        info!("Nudging file synced");

        stage("Querying the registry for latest image digests and git metadata...");
        let tag = request.tag.symbolic();
        let entries = related_images(&operands_map, &paths.operands_map.display().to_string())?;
        let (latest, provenance) = self.resolver.resolve(&entries, &tag, false)?;

        if !latest.is_empty() {
            stage("Updating operands map with latest image digests...");
            let scheme = MergeScheme::keyed("$.relatedImages", "name")?;
            operands_map = keyed_merge(&operands_map, &single_entry("relatedImages", entries_to_value(&latest)?), &scheme);
            info!("Operands map updated with {} digest(s)", latest.len());
        }

        // Runs even with nothing resolved so retired components still fail
        stage("Updating manifests config with git metadata...");
        let additional_components = update_manifests_config(&mut manifests_config, &provenance)
            .map_err(|findings| Error::ProvenanceResolution {
                tag: tag.clone(),
                findings,
            })?;

        stage("Processing push pipeline...");
        pipeline.apply(request.pipeline)?;

        stage("Writing output files...");
        document::save(&nudging, &paths.nudging)?;
        document::save(&operands_map, &paths.operands_map)?;
        document::save(&manifests_config, &paths.manifests_config)?;
        let pipeline_changed = pipeline.save_if_changed(&paths.pipeline)?;
        info!("Output files written successfully");

        Ok(OperatorOutcome {
            resolved: latest.len(),
            additional_components,
            pipeline_changed,
        })
    }
}

/// Write resolved git provenance into a manifests config document.
///
/// Entries of `map` with `ref_type: branch` are left alone. Every other entry
/// must have a resolved component with both `git.url` and `git.commit`.
/// `additional_meta` is replaced by the resolved components that `map` does
/// not name; their names are returned.
///
/// # Errors
///
/// Returns every `map` entry without a resolved component and every
/// component with incomplete provenance, after all entries were examined.
pub fn update_manifests_config(
    manifests_config: &mut YamlValue,
    provenance: &ProvenanceMap,
) -> std::result::Result<Vec<String>, Findings<ProvenanceGap>> {
    let mut findings = Findings::new();
    let mut known = BTreeSet::new();

    if let Some(map) = manifests_config.get_mut("map").and_then(YamlValue::as_mapping_mut) {
        for (name, entry) in map.iter_mut() {
            let Some(component) = name.as_str() else {
                continue;
            };
            known.insert(component.to_string());

            if entry.get("ref_type").and_then(YamlValue::as_str) == Some("branch") {
                info!("  Skipping component '{}' (ref_type=branch)", component);
                continue;
            }
            let Some(git) = provenance.get(component) else {
                warn!("  Component '{}' not found in resolved provenance", component);
                findings.record(ProvenanceGap::MissingComponent, component);
                continue;
            };
            if !git.is_complete() {
                warn!("  Component '{}' is missing git labels", component);
                findings.record(ProvenanceGap::MissingGitLabels, component);
                continue;
            }
            match entry.as_mapping_mut() {
                Some(fields) => {
                    fields.insert(GIT_URL_LABEL.into(), git.url.as_str().into());
                    fields.insert(GIT_COMMIT_LABEL.into(), git.commit.as_str().into());
                    info!("  Metadata for component '{}' updated", component);
                }
                None => findings.record(ProvenanceGap::MissingGitLabels, component),
            }
        }
    }

    let mut additional = Mapping::new();
    let mut added = Vec::new();
    for (component, git) in provenance.iter().filter(|(name, _)| !known.contains(*name)) {
        info!("  Metadata for component '{}' added to additional_meta", component);
        additional.insert(component.into(), git.to_yaml());
        added.push(component.to_string());
    }
    if let Some(root) = manifests_config.as_mapping_mut() {
        root.insert("additional_meta".into(), YamlValue::Mapping(additional));
    }

    findings.into_result(|findings| findings)?;
    Ok(added)
}

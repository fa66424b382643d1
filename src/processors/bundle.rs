//! `bundle-patch`: rewrite a bundle CSV for release.
//!
//! The operator image listed in `bundle-patch.yaml` is resolved to its latest
//! signed digest with upstream (`github.*`) provenance preferred. The
//! operator repository is then read at that commit for its operand list and
//! manifests config, which drive the CSV env vars, `spec.relatedImages` and
//! the bundle build arguments.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_yaml::Value as YamlValue;

use super::{related_images, stage, GatedPipeline};
use crate::config::{AdditionalImages, BuildConfig, BundlePatch};
use crate::defaults::Settings;
use crate::document;
use crate::error::{Error, Result};
use crate::gate::GateOperation;
use crate::image::{EntryFilter, ImageEntry};
use crate::manifest::{build_arg_components, render_build_args, strip_channel_annotations, strip_image_tags, ManifestPatcher};
use crate::provenance::{ImageProvenanceResolver, ResolverConfig};
use crate::registry::{RegistryOperations, SourceFetcher};
use crate::remap::RegistryMapping;
use crate::version::VersionTag;

/// Build arguments file written next to the bundle patch.
pub const BUILD_ARGS_FILE: &str = "bundle_build_args.map";

/// Input and output locations of a bundle run.
#[derive(Debug, Clone)]
pub struct BundlePaths {
    pub build_config: PathBuf,
    pub csv: PathBuf,
    pub patch: PathBuf,
    pub annotations: PathBuf,
    pub output: PathBuf,
    pub pipeline: PathBuf,
}

impl BundlePaths {
    /// Where the build arguments are written.
    pub fn build_args(&self) -> PathBuf {
        self.patch_dir().join(BUILD_ARGS_FILE)
    }

    fn patch_dir(&self) -> &Path {
        self.patch.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// One bundle run.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub paths: BundlePaths,
    pub tag: VersionTag,
    pub pipeline: GateOperation,
    /// Stamped into `metadata.annotations.createdAt`.
    pub created_at: DateTime<Utc>,
}

/// What a bundle run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutcome {
    pub operator_image: String,
    pub related_images: usize,
    pub build_args: String,
    pub pipeline_changed: bool,
}

pub struct BundleProcessor {
    resolver: ImageProvenanceResolver,
    fetcher: Box<dyn SourceFetcher>,
    patcher: ManifestPatcher,
    settings: Settings,
}

impl BundleProcessor {
    pub fn new(
        registry: Box<dyn RegistryOperations>,
        fetcher: Box<dyn SourceFetcher>,
        settings: Settings,
        resolver_config: ResolverConfig,
    ) -> Self {
        Self {
            resolver: ImageProvenanceResolver::new(registry, resolver_config),
            fetcher,
            patcher: ManifestPatcher::new(&settings),
            settings,
        }
    }

    /// Run the whole bundle reconciliation and write its outputs.
    ///
    /// Nothing is written unless every step succeeds.
    pub fn process(&self, request: &BundleRequest) -> Result<BundleOutcome> {
        let paths = &request.paths;
        stage("Initializing Bundle Processor");
        info!("version tag: {}", request.tag);
        info!("push pipeline operation: {}", request.pipeline);
        debug!("paths: {:?}", paths);

        info!("Loading yaml files...");
        let build_config = BuildConfig::from_file(&paths.build_config)?;
        let mut csv = document::load(&paths.csv)?;
        let patch = BundlePatch::from_file(&paths.patch)?;
        let mut annotations = document::load(&paths.annotations)?;
        let mut pipeline = GatedPipeline::load(&paths.pipeline)?;
        let version = patch.version()?;
        let mapping = RegistryMapping::from_build_config(&build_config, &self.settings.production_registry)?;

        stage("Filtering operator entry from bundle patch...");
        let operator_entry = self.operator_entry(&patch.patch.related_images)?;

        stage("Querying the registry for the latest operator image digest and git metadata...");
        let tag = request.tag.symbolic();
        info!("Using image tag: {}", tag);
        let (mut operator_images, operator_provenance) = self.resolver.resolve(&operator_entry, &tag, true)?;
        let (operator_component, operator_git) = operator_provenance
            .iter()
            .next()
            .ok_or_else(|| Error::config("operator image resolved without git provenance"))?;
        info!("  Operator name: {}", operator_component);
        info!("  Operator git URL: {}", operator_git.url);
        info!("  Operator git commit: {}", operator_git.commit);

        stage("Fetching operands map and manifests config from the operator repository...");
        let operands_map = self.fetch_document(&operator_git.url, &operator_git.commit, &self.settings.operands_map_path)?;
        let manifests_config =
            self.fetch_document(&operator_git.url, &operator_git.commit, &self.settings.manifests_config_path)?;

        stage("Generating operand image entries and bundle build args...");
        let mut operand_images = related_images(&operands_map, &self.settings.operands_map_path)?;
        let build_args = render_build_args(&build_arg_components(&operator_provenance, &manifests_config))?;
        debug!("bundle build args:\n{}", build_args);

        stage("Applying registry and repo replacements for operator and operand images...");
        mapping.remap(&mut operator_images);
        mapping.remap(&mut operand_images);
        let operator_image = operator_images
            .first()
            .map(|entry| entry.value.clone())
            .ok_or_else(|| Error::config("operator image resolution returned no entry"))?;

        stage("Patching CSV fields...");
        let csv_patch = match &patch.patch.additional_fields {
            Some(file) => {
                info!("  Loading csv-patch file: {}", file.file);
                Some(document::load(paths.patch_dir().join(&file.file))?)
            }
            None => None,
        };
        self.patcher
            .patch_csv_fields(&mut csv, &operator_image, version, request.created_at, csv_patch.as_ref())?;

        stage("Patching related images in CSV...");
        let mut env_entries = operand_images;
        if let Some(file) = &patch.patch.additional_related_images {
            info!("  Adding additional images from: {}", file.file);
            let additional = AdditionalImages::from_file(paths.patch_dir().join(&file.file))?;
            env_entries.extend(strip_image_tags(&additional.additional_images)?);
        }
        self.patcher.patch_related_images(&mut csv, &env_entries)?;

        stage("Processing annotations...");
        strip_channel_annotations(&mut annotations);

        stage("Processing push pipeline...");
        pipeline.apply(request.pipeline)?;

        stage("Writing output files...");
        document::save(&csv, &paths.output)?;
        document::save(&annotations, &paths.annotations)?;
        document::write_text(paths.build_args(), &build_args)?;
        let pipeline_changed = pipeline.save_if_changed(&paths.pipeline)?;
        info!("Output files written successfully");

        Ok(BundleOutcome {
            operator_image,
            related_images: env_entries.len(),
            build_args,
            pipeline_changed,
        })
    }

    fn operator_entry(&self, related_images: &[ImageEntry]) -> Result<Vec<ImageEntry>> {
        let filter = &self.settings.operator_entry_filter;
        let entries = EntryFilter::Include(vec![filter.clone()]).apply(related_images);
        match entries.len() {
            1 => Ok(entries),
            0 => Err(Error::ConfigParse {
                message: format!("No {} entry found in relatedImages", filter),
                hint: Some("Add the operator image to patch.relatedImages in bundle-patch.yaml".to_string()),
            }),
            count => Err(Error::ConfigParse {
                message: format!("Found {} {} entries in relatedImages, expected exactly one", count, filter),
                hint: None,
            }),
        }
    }

    fn fetch_document(&self, repo_url: &str, commit: &str, path: &str) -> Result<YamlValue> {
        info!("Fetching {} at {}", path, commit);
        let content = self.fetcher.fetch_file(repo_url, commit, path)?;
        document::parse(&content, Path::new(path))
    }
}

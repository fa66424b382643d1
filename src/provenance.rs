//! # Image Provenance Resolution
//!
//! Turns symbolic image tags into signed digests plus the git source they
//! were built from.
//!
//! ## Protocol
//!
//! For each image entry:
//!
//! 1. List the registry tags named after the symbolic tag.
//! 2. Walk them in registry order and pick the first whose detached
//!    signature tag (`sha256-<hex>.sig`) exists.
//! 3. Emit a new entry pinned to that digest.
//! 4. For manifest lists, read labels from the first per-platform manifest,
//!    since the list itself carries none.
//! 5. Read `git.url` / `git.commit`, optionally overridden by
//!    `github.url` / `github.commit`.
//!
//! Missing images, unsigned images and missing labels are collected across
//! the whole batch. If any were found the batch fails as a unit with
//! [`Error::ProvenanceResolution`] listing every offender.
//!
//! Entries are independent, so they are resolved on a bounded `rayon` pool.
//! Output order always matches input order.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::defaults::{GITHUB_COMMIT_LABEL, GITHUB_URL_LABEL, GIT_COMMIT_LABEL, GIT_URL_LABEL};
use crate::error::{Error, Result};
use crate::image::{ImageEntry, ImageReference};
use crate::registry::RegistryOperations;
use crate::report::Findings;

/// Kind of problem found while resolving a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProvenanceGap {
    /// No tag matches the symbolic tag.
    MissingImage,
    /// Tags exist but none carries a signature.
    UnsignedImage,
    /// `git.url` or `git.commit` is absent or empty.
    MissingGitLabels,
    /// A configured component has no resolved provenance.
    MissingComponent,
}

impl fmt::Display for ProvenanceGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProvenanceGap::MissingImage => "missing image",
            ProvenanceGap::UnsignedImage => "no signed image",
            ProvenanceGap::MissingGitLabels => "missing git labels",
            ProvenanceGap::MissingComponent => "missing component",
        })
    }
}

/// Source location an image was built from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GitProvenance {
    pub url: String,
    pub commit: String,
}

impl GitProvenance {
    pub fn new(url: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            commit: commit.into(),
        }
    }

    /// Pick provenance out of a label set.
    ///
    /// With `prefer_upstream`, `github.*` labels replace `git.*` labels when
    /// present.
    pub fn from_labels(labels: &HashMap<String, String>, prefer_upstream: bool) -> Self {
        let pick = |primary: &str, upstream: &str| {
            let upstream_value = prefer_upstream.then(|| labels.get(upstream)).flatten();
            if upstream_value.is_some() {
                debug!("Using {} override", upstream);
            }
            upstream_value
                .or_else(|| labels.get(primary))
                .cloned()
                .unwrap_or_default()
        };

        Self {
            url: pick(GIT_URL_LABEL, GITHUB_URL_LABEL),
            commit: pick(GIT_COMMIT_LABEL, GITHUB_COMMIT_LABEL),
        }
    }

    /// Both url and commit are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.url.is_empty() && !self.commit.is_empty()
    }

    /// `{git.url: ..., git.commit: ...}` as a YAML mapping.
    pub fn to_yaml(&self) -> YamlValue {
        let mut mapping = Mapping::new();
        mapping.insert(GIT_URL_LABEL.into(), self.url.clone().into());
        mapping.insert(GIT_COMMIT_LABEL.into(), self.commit.clone().into());
        YamlValue::Mapping(mapping)
    }
}

/// Git provenance by component name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceMap {
    components: Vec<(String, GitProvenance)>,
}

impl ProvenanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced component keeps its position.
    pub fn insert(&mut self, component: impl Into<String>, provenance: GitProvenance) {
        let component = component.into();
        match self.components.iter_mut().find(|(name, _)| *name == component) {
            Some((_, existing)) => *existing = provenance,
            None => self.components.push((component, provenance)),
        }
    }

    pub fn get(&self, component: &str) -> Option<&GitProvenance> {
        self.components
            .iter()
            .find(|(name, _)| name == component)
            .map(|(_, provenance)| provenance)
    }

    pub fn contains(&self, component: &str) -> bool {
        self.get(component).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GitProvenance)> {
        self.components.iter().map(|(name, provenance)| (name.as_str(), provenance))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// `{component: {git.url, git.commit}}` as a YAML mapping.
    pub fn to_yaml(&self) -> YamlValue {
        let mapping: Mapping = self
            .iter()
            .map(|(name, provenance)| (YamlValue::from(name), provenance.to_yaml()))
            .collect();
        YamlValue::Mapping(mapping)
    }
}

/// Tuning for the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Entries resolved concurrently; `1` resolves strictly in sequence.
    pub workers: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Signature tag name for a manifest digest.
///
/// ```
/// use bundle_reconcile::provenance::signature_tag;
///
/// assert_eq!(signature_tag("sha256:abc"), "sha256-abc.sig");
/// ```
pub fn signature_tag(digest: &str) -> String {
    format!("{}.sig", digest.replace(':', "-"))
}

enum Outcome {
    Resolved {
        entry: ImageEntry,
        component: String,
        provenance: GitProvenance,
    },
    /// A gap keyed by component name, matching the provenance map.
    Gap(ProvenanceGap, String),
}

/// Resolves image entries against a registry.
pub struct ImageProvenanceResolver {
    registry: Box<dyn RegistryOperations>,
    config: ResolverConfig,
}

impl ImageProvenanceResolver {
    pub fn new(registry: Box<dyn RegistryOperations>, config: ResolverConfig) -> Self {
        Self { registry, config }
    }

    /// Resolve every entry to a signed digest and git provenance.
    ///
    /// # Errors
    ///
    /// - `Error::ProvenanceResolution` if any entry is missing, unsigned or
    ///   lacks git labels. Nothing is returned for the other entries.
    /// - `Error::MalformedReference` for an unparseable image value.
    /// - Registry and network errors as reported by the registry. When several
    ///   entries fail this way, the error of the earliest entry is returned.
    pub fn resolve(
        &self,
        entries: &[ImageEntry],
        tag: &str,
        prefer_upstream: bool,
    ) -> Result<(Vec<ImageEntry>, ProvenanceMap)> {
        info!(
            "Resolving {} image(s) with tag '{}' ({} worker(s))",
            entries.len(),
            tag,
            self.config.workers
        );

        let outcomes: Vec<Result<Outcome>> = if self.config.workers <= 1 {
            entries
                .iter()
                .map(|entry| self.resolve_entry(entry, tag, prefer_upstream))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.workers)
                .build()
                .map_err(|e| Error::config(format!("failed to start resolver workers: {}", e)))?;
            pool.install(|| {
                entries
                    .par_iter()
                    .map(|entry| self.resolve_entry(entry, tag, prefer_upstream))
                    .collect()
            })
        };

        let mut resolved = Vec::new();
        let mut provenance = ProvenanceMap::new();
        let mut findings = Findings::new();

        for outcome in outcomes {
            match outcome? {
                Outcome::Resolved {
                    entry,
                    component,
                    provenance: git,
                } => {
                    if !git.is_complete() {
                        findings.record(ProvenanceGap::MissingGitLabels, component.as_str());
                    }
                    resolved.push(entry);
                    provenance.insert(component, git);
                }
                Outcome::Gap(gap, component) => findings.record(gap, component),
            }
        }

        findings.into_result(|findings| Error::ProvenanceResolution {
            tag: tag.to_string(),
            findings,
        })?;

        info!("Resolved {} image(s) and {} component(s)", resolved.len(), provenance.len());
        Ok((resolved, provenance))
    }

    fn resolve_entry(&self, entry: &ImageEntry, tag: &str, prefer_upstream: bool) -> Result<Outcome> {
        let reference = ImageReference::parse(&entry.value)?;
        let (org, repo) = (reference.org.as_str(), reference.repo_path.as_str());
        info!("  Processing: {}", reference.location());

        let tags = self.registry.list_tags(org, repo, tag)?;
        if tags.is_empty() {
            warn!("'{}' tag not found for image: '{}'", tag, repo);
            return Ok(Outcome::Gap(ProvenanceGap::MissingImage, reference.component_name.clone()));
        }

        for candidate in &tags {
            let signature = signature_tag(&candidate.manifest_digest);
            if self.registry.tag_detail(org, repo, &signature)?.is_none() {
                debug!("  {} has no signature {}", candidate.manifest_digest, signature);
                continue;
            }

            let pinned = reference.with_digest(&candidate.manifest_digest);
            let mut label_digest = candidate.manifest_digest.clone();
            if candidate.is_manifest_list {
                debug!("Manifest list detected, reading labels from the first platform manifest");
                if let Some(first) = self
                    .registry
                    .sub_manifest_digests(org, repo, &candidate.manifest_digest)?
                    .into_iter()
                    .next()
                {
                    label_digest = first;
                }
            }

            let labels: HashMap<String, String> = self
                .registry
                .labels(org, repo, &label_digest)?
                .into_iter()
                .filter_map(|label| match label.value {
                    Some(value) if !value.is_empty() => Some((label.key, value)),
                    _ => None,
                })
                .collect();
            let provenance = GitProvenance::from_labels(&labels, prefer_upstream);
            debug!(
                "Collected git labels for '{}': git.url='{}', git.commit='{}'",
                reference.component_name, provenance.url, provenance.commit
            );

            return Ok(Outcome::Resolved {
                entry: ImageEntry::new(entry.name.clone(), pinned.to_string()),
                component: reference.component_name.clone(),
                provenance,
            });
        }

        warn!("No signed '{}' tag found for image: '{}'", tag, repo);
        Ok(Outcome::Gap(ProvenanceGap::UnsignedImage, reference.component_name.clone()))
    }
}

//! # Catalog Completeness Validation
//!
//! Cross-references the shipped release versions against the bundles present
//! in the generated File-Based Catalogs, one catalog per target platform.
//!
//! ## Rules
//!
//! For every platform and every shipped version `V`, the bundle
//! `<operator>.V` must be present unless:
//!
//! - it is listed as a known exception,
//! - a [`MajorVersionRule`] says `V` is not published for that platform
//!   (3.x releases need `v4.19` or newer), or
//! - a discontinuity cut-off exists for the platform and `V` is at or beyond
//!   it.
//!
//! A bundle that is present on a platform its major-version rule forbids is
//! reported as **misplaced**.
//!
//! Every platform is examined before anything is reported. Failures are
//! collected in a [`CatalogReport`] and raised once as
//! [`Error::CatalogValidation`].
//!
//! ## Layouts
//!
//! - [`CatalogLayout::Catalogs`]: `<dir>/<platform>/<operator>/catalog.yaml`,
//!   platforms from `supported-ocp-versions.{release, build}`.
//! - [`CatalogLayout::Pcc`]: `<dir>/catalog-<platform>.yaml`, platforms and
//!   cut-offs from a `supported-ocp-versions` list.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_yaml::Value as YamlValue;

use crate::config::BuildConfig;
use crate::defaults::Settings;
use crate::document;
use crate::error::{Error, Result};
use crate::report::Findings;
use crate::version::{CatalogVersion, PlatformVersion};

/// Highest release a cut-off may name; platforms without one keep every
/// release.
pub const OPEN_CUTOFF_RELEASE: &str = "9.99.99";

const BUNDLE_SCHEMA: &str = "olm.bundle";

/// Minimum platform for a major release line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MajorVersionRule {
    pub major: u64,
    /// Compact platform number, `419` for `v4.19`.
    pub min_platform: u32,
}

impl MajorVersionRule {
    /// Whether `version` may be published on `platform`.
    pub fn allows(&self, version: &CatalogVersion, platform: PlatformVersion) -> bool {
        version.major() != self.major || platform.numeric() >= self.min_platform
    }
}

impl Default for MajorVersionRule {
    fn default() -> Self {
        Self {
            major: 3,
            min_platform: 419,
        }
    }
}

/// Where catalogs live and how their platforms are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogLayout {
    /// Per-platform catalog directories.
    Catalogs,
    /// Flat `catalog-<platform>.yaml` files with discontinuity cut-offs.
    Pcc,
}

/// Outcome of a completeness check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogReport {
    /// Expected bundles absent from a platform catalog.
    pub missing: Findings<PlatformVersion>,
    /// Bundles present on a platform their major version does not support.
    pub misplaced: Findings<PlatformVersion>,
}

impl CatalogReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.misplaced.is_empty()
    }

    /// `Ok(())` when nothing was found, otherwise `Error::CatalogValidation`.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::CatalogValidation { report: self })
        }
    }
}

impl fmt::Display for CatalogReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = Vec::new();
        if !self.missing.is_empty() {
            sections.push(format!("Bundles missing from the catalogs:\n{}", self.missing));
        }
        if !self.misplaced.is_empty() {
            sections.push(format!(
                "Bundles added to unsupported platform versions:\n{}",
                self.misplaced
            ));
        }
        f.write_str(&sections.join("\n"))
    }
}

/// Checks catalogs against the shipped release list.
#[derive(Debug, Clone)]
pub struct CatalogValidator {
    exceptions: BTreeSet<String>,
    rules: Vec<MajorVersionRule>,
    report_misplaced: bool,
}

impl CatalogValidator {
    pub fn new<I, S>(exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exceptions: exceptions.into_iter().map(Into::into).collect(),
            rules: vec![MajorVersionRule::default()],
            report_misplaced: true,
        }
    }

    /// Replace the major-version rules.
    pub fn with_rules(mut self, rules: Vec<MajorVersionRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Turn misplaced-bundle reporting on or off.
    pub fn with_misplaced_check(mut self, enabled: bool) -> Self {
        self.report_misplaced = enabled;
        self
    }

    fn allowed_on(&self, version: &CatalogVersion, platform: PlatformVersion) -> bool {
        self.rules.iter().all(|rule| rule.allows(version, platform))
    }

    /// Check every platform catalog for every expected version.
    ///
    /// `catalogs` maps a platform to the bundle names its catalog contains.
    /// `discontinuity` maps a platform to the first release it no longer
    /// carries; platforms absent from it keep every release.
    pub fn validate_completeness(
        &self,
        expected: &[CatalogVersion],
        catalogs: &BTreeMap<PlatformVersion, BTreeSet<String>>,
        discontinuity: Option<&BTreeMap<PlatformVersion, CatalogVersion>>,
    ) -> CatalogReport {
        let mut report = CatalogReport::default();

        for (platform, bundles) in catalogs {
            report.missing.track(*platform);
            report.misplaced.track(*platform);
            let cutoff = discontinuity.and_then(|map| map.get(platform));

            for version in expected {
                let name = version.to_string();
                let present = bundles.contains(&name);
                let allowed = self.allowed_on(version, *platform);

                if present {
                    if !allowed && self.report_misplaced {
                        report.misplaced.record(*platform, name);
                    }
                    continue;
                }
                if self.exceptions.contains(&name) || !allowed {
                    debug!("Skipping {} on {}", name, platform);
                    continue;
                }
                if let Some(cutoff) = cutoff.filter(|cutoff| version >= *cutoff) {
                    info!(
                        "Ignoring since platform {} is not supported for {} (discontinued from {})",
                        platform, name, cutoff
                    );
                    continue;
                }
                report.missing.record(*platform, name);
            }
        }

        report
    }
}

/// Parse the shipped-versions text file.
///
/// Only lines with more than one `.` count. Each keeps the part before the
/// first `-` with any `v` removed. A line whose remainder is not a semantic
/// version is logged and skipped. The result is deduplicated and sorted
/// numerically.
pub fn parse_shipped_versions(content: &str, operator_name: &str) -> Vec<CatalogVersion> {
    let mut releases = BTreeMap::new();
    for line in content.lines() {
        if line.matches('.').count() <= 1 {
            continue;
        }
        let release = line.split('-').next().unwrap_or_default().trim().replace('v', "");
        releases.entry(release).or_insert(line);
    }

    let mut versions: Vec<CatalogVersion> = releases
        .iter()
        .filter_map(|(release, line)| match CatalogVersion::new(operator_name, release) {
            Ok(version) => Some(version),
            Err(e) => {
                warn!("Skipping shipped version line '{}': {}", line, e);
                None
            }
        })
        .collect();
    versions.sort();
    versions
}

/// Bundle names declared by `schema: olm.bundle` documents.
pub fn bundle_names(documents: &[YamlValue]) -> BTreeSet<String> {
    documents
        .iter()
        .filter(|doc| document::lookup_str(doc, "schema") == Some(BUNDLE_SCHEMA))
        .filter_map(|doc| document::lookup_str(doc, "name"))
        .map(str::to_string)
        .collect()
}

/// Location of the catalog for `platform`.
pub fn catalog_path(dir: &Path, platform: PlatformVersion, layout: CatalogLayout, operator_name: &str) -> PathBuf {
    match layout {
        CatalogLayout::Catalogs => dir
            .join(platform.to_string())
            .join(operator_name)
            .join("catalog.yaml"),
        CatalogLayout::Pcc => dir.join(format!("catalog-{}.yaml", platform)),
    }
}

/// Read the catalogs and shipped versions described by a build config and
/// validate them.
pub fn validate_catalog_tree(
    layout: CatalogLayout,
    build_config: &BuildConfig,
    catalog_dir: &Path,
    shipped_versions: &Path,
    settings: &Settings,
) -> Result<CatalogReport> {
    let operator = settings.operator_name.as_str();
    let content = fs::read_to_string(shipped_versions)
        .map_err(|e| Error::document(shipped_versions.display().to_string(), e.to_string()))?;
    let expected = parse_shipped_versions(&content, operator);
    info!(
        "Shipped versions: {}",
        expected.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );

    let (platforms, discontinuity) = match layout {
        CatalogLayout::Catalogs => (build_config.grouped_platforms()?, None),
        CatalogLayout::Pcc => {
            let default_cutoff = CatalogVersion::new(operator, OPEN_CUTOFF_RELEASE)?;
            let mut cutoffs = BTreeMap::new();
            let mut platforms = Vec::new();
            for (platform, cutoff) in build_config.listed_platforms()? {
                let cutoff = match cutoff {
                    Some(name) => CatalogVersion::parse(&name)?,
                    None => default_cutoff.clone(),
                };
                cutoffs.insert(platform, cutoff);
                platforms.push(platform);
            }
            (platforms, Some(cutoffs))
        }
    };

    let mut catalogs = BTreeMap::new();
    for platform in platforms {
        let path = catalog_path(catalog_dir, platform, layout, operator);
        let bundles = bundle_names(&document::load_all(&path)?);
        debug!("{} bundle(s) in {}", bundles.len(), path.display());
        catalogs.insert(platform, bundles);
    }

    let validator = CatalogValidator::new(settings.missing_bundle_exceptions.iter().cloned())
        .with_misplaced_check(layout == CatalogLayout::Catalogs);
    Ok(validator.validate_completeness(&expected, &catalogs, discontinuity.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn versions(releases: &[&str]) -> Vec<CatalogVersion> {
        releases
            .iter()
            .map(|r| CatalogVersion::new("rhods-operator", r).unwrap())
            .collect()
    }

    fn catalog(platform: &str, bundles: &[&str]) -> (PlatformVersion, BTreeSet<String>) {
        (
            PlatformVersion::parse(platform).unwrap(),
            bundles.iter().map(|b| b.to_string()).collect(),
        )
    }

    fn validator() -> CatalogValidator {
        CatalogValidator::new(Settings::default().missing_bundle_exceptions)
    }

    mod shipped_versions {
        use super::*;

        #[test]
        fn test_parse_filters_and_dedupes() {
            let content = "v2.10.0-1\nv2.9.1\n2.10.0\nrhoai-2.8\n\nv2.16.0\n";
            let parsed = parse_shipped_versions(content, "rhods-operator");
            let names: Vec<String> = parsed.iter().map(ToString::to_string).collect();
            assert_eq!(
                names,
                vec![
                    "rhods-operator.2.9.1",
                    "rhods-operator.2.10.0",
                    "rhods-operator.2.16.0"
                ]
            );
        }

        #[test]
        fn test_parse_skips_lines_without_a_semantic_version() {
            let content = "v2.9.2\nrhoai-2.13.0\n2.11.0rc\nv2.10.0-rc1\n";
            let parsed = parse_shipped_versions(content, "rhods-operator");
            let names: Vec<String> = parsed.iter().map(ToString::to_string).collect();
            assert_eq!(names, vec!["rhods-operator.2.9.2", "rhods-operator.2.10.0"]);
        }
    }

    mod completeness {
        use super::*;

        #[test]
        fn test_missing_bundle_is_reported_per_platform() {
            let catalogs: BTreeMap<_, _> = [
                catalog("v4.17", &["rhods-operator.2.10.0"]),
                catalog("v4.18", &["rhods-operator.2.10.0", "rhods-operator.2.11.0"]),
            ]
            .into_iter()
            .collect();

            let report =
                validator().validate_completeness(&versions(&["2.10.0", "2.11.0"]), &catalogs, None);
            let v417 = PlatformVersion::new(4, 17);
            let v418 = PlatformVersion::new(4, 18);
            assert_eq!(report.missing.items(&v417), ["rhods-operator.2.11.0"]);
            assert!(report.missing.items(&v418).is_empty());
            assert!(report.misplaced.is_empty());
            assert!(matches!(
                report.into_result(),
                Err(Error::CatalogValidation { .. })
            ));
        }

        #[test]
        fn test_exceptions_are_never_missing() {
            let catalogs: BTreeMap<_, _> = [catalog("v4.16", &[])].into_iter().collect();
            let report = validator().validate_completeness(&versions(&["2.9.0", "2.9.1"]), &catalogs, None);
            assert!(report.is_empty());
        }

        #[test]
        fn test_major_three_requires_v4_19() {
            let catalogs: BTreeMap<_, _> = [
                catalog("v4.18", &["rhods-operator.3.0.0"]),
                catalog("v4.19", &[]),
            ]
            .into_iter()
            .collect();

            let report = validator().validate_completeness(&versions(&["3.0.0"]), &catalogs, None);
            assert_eq!(
                report.misplaced.items(&PlatformVersion::new(4, 18)),
                ["rhods-operator.3.0.0"]
            );
            assert!(report.missing.items(&PlatformVersion::new(4, 18)).is_empty());
            assert_eq!(
                report.missing.items(&PlatformVersion::new(4, 19)),
                ["rhods-operator.3.0.0"]
            );
        }

        #[test]
        fn test_misplaced_check_can_be_disabled() {
            let catalogs: BTreeMap<_, _> = [catalog("v4.18", &["rhods-operator.3.0.0"])].into_iter().collect();
            let report = validator()
                .with_misplaced_check(false)
                .validate_completeness(&versions(&["3.0.0"]), &catalogs, None);
            assert!(report.is_empty());
        }

        #[test]
        fn test_discontinuity_uses_numeric_order() {
            let v414 = PlatformVersion::new(4, 14);
            let catalogs: BTreeMap<_, _> = [catalog("v4.14", &[])].into_iter().collect();
            let cutoffs: BTreeMap<_, _> = [(v414, CatalogVersion::parse("rhods-operator.2.9.5").unwrap())]
                .into_iter()
                .collect();

            let report = validator().validate_completeness(
                &versions(&["2.8.0", "2.10.0"]),
                &catalogs,
                Some(&cutoffs),
            );
            // 2.10.0 >= 2.9.5, so only the older release is expected.
            assert_eq!(report.missing.items(&v414), ["rhods-operator.2.8.0"]);
        }

        #[test]
        fn test_report_display_lists_both_sections() {
            let mut report = CatalogReport::default();
            report.missing.record(PlatformVersion::new(4, 17), "rhods-operator.2.11.0");
            report.misplaced.record(PlatformVersion::new(4, 18), "rhods-operator.3.0.0");
            insta::assert_snapshot!(report.to_string(), @r###"
            Bundles missing from the catalogs:
              v4.17: rhods-operator.2.11.0
            Bundles added to unsupported platform versions:
              v4.18: rhods-operator.3.0.0
            "###);
        }
    }

    mod layout {
        use super::*;

        const BUNDLE_DOCS: &str = "---\nschema: olm.package\nname: rhods-operator\n---\nschema: olm.bundle\nname: rhods-operator.2.10.0\n---\nschema: olm.channel\nname: fast\n";

        #[test]
        fn test_bundle_names_only_from_bundle_schema() {
            let documents: Vec<YamlValue> = serde_yaml::Deserializer::from_str(BUNDLE_DOCS)
                .map(|doc| serde::Deserialize::deserialize(doc).unwrap())
                .collect();
            let names = bundle_names(&documents);
            assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["rhods-operator.2.10.0"]);
        }

        #[test]
        fn test_catalog_paths() {
            let dir = Path::new("/catalogs");
            let platform = PlatformVersion::new(4, 17);
            assert_eq!(
                catalog_path(dir, platform, CatalogLayout::Catalogs, "rhods-operator"),
                PathBuf::from("/catalogs/v4.17/rhods-operator/catalog.yaml")
            );
            assert_eq!(
                catalog_path(dir, platform, CatalogLayout::Pcc, "rhods-operator"),
                PathBuf::from("/catalogs/catalog-v4.17.yaml")
            );
        }

        #[test]
        fn test_validate_pcc_tree() {
            let dir = TempDir::new().unwrap();
            let config_path = dir.path().join("config.yaml");
            fs::write(
                &config_path,
                "config:\n  supported-ocp-versions:\n    - version: v4.14\n      discontinued-from: rhods-operator.2.10.0\n    - version: v4.15\n",
            )
            .unwrap();
            fs::write(dir.path().join("catalog-v4.14.yaml"), BUNDLE_DOCS.replace("2.10.0", "2.9.2")).unwrap();
            fs::write(dir.path().join("catalog-v4.15.yaml"), BUNDLE_DOCS).unwrap();
            let shipped = dir.path().join("shipped.txt");
            fs::write(&shipped, "v2.9.2\nv2.10.0\n").unwrap();

            let config = BuildConfig::from_file(&config_path).unwrap();
            let report =
                validate_catalog_tree(CatalogLayout::Pcc, &config, dir.path(), &shipped, &Settings::default())
                    .unwrap();
            assert_eq!(
                report.missing.items(&PlatformVersion::new(4, 15)),
                ["rhods-operator.2.9.2"]
            );
            assert!(report.missing.items(&PlatformVersion::new(4, 14)).is_empty());
        }
    }
}

//! # Version Tags and Bundle Versions
//!
//! Three small value types live here:
//!
//! - **`VersionTag`**: the symbolic image tag queried in the registry. CI
//!   builds use the release stream name as-is (`rhoai-2.13`); nightly builds
//!   append `-nightly`.
//! - **`CatalogVersion`**: an operator bundle name of the form
//!   `<prefix>.<major>.<minor>.<patch>` such as `rhods-operator.2.9.0`.
//! - **`PlatformVersion`**: a target platform release such as `v4.19`.
//!
//! ## Ordering
//!
//! `CatalogVersion` orders by the numeric `(major, minor, patch)` tuple, so
//! `rhods-operator.2.10.0` sorts after `rhods-operator.2.9.5`. Components are
//! never compared as strings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;

use crate::error::{Error, Result};

/// Kind of build being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildType {
    /// Regular CI build, consumes release tags.
    #[default]
    Ci,
    /// Nightly build, consumes `-nightly` tags.
    Nightly,
}

impl FromStr for BuildType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ci" => Ok(BuildType::Ci),
            "nightly" => Ok(BuildType::Nightly),
            other => Err(Error::ConfigParse {
                message: format!("Unknown build type '{}'", other),
                hint: Some("Use 'ci' or 'nightly'".to_string()),
            }),
        }
    }
}

/// The symbolic tag used to look up images in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    release: String,
    build: BuildType,
}

impl VersionTag {
    /// Create a tag for a release stream and build type.
    pub fn new(release: impl Into<String>, build: BuildType) -> Self {
        Self {
            release: release.into(),
            build,
        }
    }

    /// Tag for a regular release build.
    pub fn release(release: impl Into<String>) -> Self {
        Self::new(release, BuildType::Ci)
    }

    /// The release stream without any build suffix.
    pub fn release_name(&self) -> &str {
        &self.release
    }

    pub fn build_type(&self) -> BuildType {
        self.build
    }

    /// The tag string queried in the registry.
    pub fn symbolic(&self) -> String {
        match self.build {
            BuildType::Ci => self.release.clone(),
            BuildType::Nightly => format!("{}-nightly", self.release),
        }
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbolic())
    }
}

/// An operator bundle version such as `rhods-operator.2.9.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogVersion {
    prefix: String,
    version: Version,
}

impl CatalogVersion {
    /// Build from a package prefix and a bare release (`2.9.0`).
    pub fn new(prefix: impl Into<String>, release: &str) -> Result<Self> {
        Ok(Self {
            prefix: prefix.into(),
            version: Version::parse(release)?,
        })
    }

    /// Parse a full bundle name, `<prefix>.<major>.<minor>.<patch>`.
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.rsplitn(4, '.').collect();
        if parts.len() != 4 || parts[3].is_empty() {
            return Err(Error::config(format!(
                "Invalid bundle version '{}', expected <prefix>.<major>.<minor>.<patch>",
                name
            )));
        }
        let release = format!("{}.{}.{}", parts[2], parts[1], parts[0]);
        Self::new(parts[3], &release)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }
}

impl Ord for CatalogVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.prefix.cmp(&other.prefix))
    }
}

impl PartialOrd for CatalogVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.prefix, self.version)
    }
}

impl FromStr for CatalogVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A target platform release such as `v4.19`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformVersion {
    major: u32,
    minor: u32,
}

impl PlatformVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse `v4.19` or `4.19`.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let invalid = || Error::config(format!("Invalid platform version '{}'", s));
        let (major, minor) = bare.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }

    /// Compact numeric form, `v4.19` -> `419`.
    pub fn numeric(&self) -> u32 {
        self.major * 100 + self.minor
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

impl FromStr for PlatformVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cv(name: &str) -> CatalogVersion {
        CatalogVersion::parse(name).unwrap()
    }

    #[test]
    fn test_symbolic_tag_by_build_type() {
        assert_eq!(VersionTag::release("rhoai-2.13").symbolic(), "rhoai-2.13");
        assert_eq!(
            VersionTag::new("rhoai-2.13", BuildType::Nightly).symbolic(),
            "rhoai-2.13-nightly"
        );
    }

    #[test]
    fn test_build_type_parse_is_case_insensitive() {
        assert_eq!("NIGHTLY".parse::<BuildType>().unwrap(), BuildType::Nightly);
        assert_eq!("ci".parse::<BuildType>().unwrap(), BuildType::Ci);
        assert!("weekly".parse::<BuildType>().is_err());
    }

    #[test]
    fn test_catalog_version_parse() {
        let version = cv("rhods-operator.2.9.0");
        assert_eq!(version.prefix(), "rhods-operator");
        assert_eq!(version.version(), &Version::new(2, 9, 0));
        assert_eq!(version.to_string(), "rhods-operator.2.9.0");
    }

    #[test]
    fn test_catalog_version_parse_rejects_short_names() {
        assert!(CatalogVersion::parse("2.9.0").is_err());
        assert!(CatalogVersion::parse("rhods-operator.2.9").is_err());
        assert!(CatalogVersion::parse("rhods-operator.2.x.0").is_err());
    }

    #[test]
    fn test_multi_digit_minor_compares_numerically() {
        // "10" < "9" as strings; the tuple comparison must not do that.
        assert!(cv("rhods-operator.2.10.0") >= cv("rhods-operator.2.9.5"));
        assert!(cv("rhods-operator.2.9.5") < cv("rhods-operator.2.10.0"));
    }

    #[test]
    fn test_comparison_uses_all_components() {
        assert!(cv("rhods-operator.3.0.0") >= cv("rhods-operator.2.25.9"));
        assert!(cv("rhods-operator.2.16.1") >= cv("rhods-operator.2.16.1"));
        assert!(cv("rhods-operator.2.16.0") < cv("rhods-operator.2.16.1"));
        assert!(cv("rhods-operator.10.0.0") > cv("rhods-operator.9.99.99"));
    }

    #[test]
    fn test_platform_version_parse_and_numeric() {
        let platform = PlatformVersion::parse("v4.19").unwrap();
        assert_eq!(platform.numeric(), 419);
        assert_eq!(platform.to_string(), "v4.19");
        assert_eq!(PlatformVersion::parse("4.9").unwrap().numeric(), 409);
        assert!(PlatformVersion::parse("v4").is_err());
    }

    #[test]
    fn test_platform_versions_sort_numerically() {
        let mut platforms: Vec<PlatformVersion> = ["v4.10", "v4.9", "v4.19"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        platforms.sort();
        let rendered: Vec<String> = platforms.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["v4.9", "v4.10", "v4.19"]);
    }
}

//! # Registry and Source Access
//!
//! Narrow interfaces to the two remote services the engine talks to:
//!
//! - **`RegistryOperations`**: tag listing, tag detail, manifest detail and
//!   label lookup against a container registry. `QuayClient` implements it
//!   over the Quay v1 REST API.
//! - **`SourceFetcher`**: fetch a file from a source repository at a given
//!   commit. `RawContentFetcher` implements it over raw-content URLs.
//!
//! Both traits exist so the resolver and processors can be exercised against
//! in-memory fakes. The HTTP implementations use blocking `reqwest` clients
//! with a per-request timeout and never retry.
//!
//! Quay requests authenticate with a bearer token read from
//! `<ORG>_QUAY_API_TOKEN`, where `<ORG>` is the upper-cased organization.

use std::env;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use url::Url;

use crate::defaults::DEFAULT_REGISTRY_API;
use crate::error::{Error, Result};

/// A tag as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub manifest_digest: String,
    #[serde(default)]
    pub is_manifest_list: bool,
}

/// Manifest metadata. `manifest_data` is the raw manifest as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ManifestDetail {
    #[serde(default)]
    pub is_manifest_list: bool,
    #[serde(default)]
    pub manifest_data: String,
}

/// A key/value label attached to a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// Registry queries used by provenance resolution.
pub trait RegistryOperations: Send + Sync {
    /// All tags (active or not) whose name equals `tag`, in registry order.
    fn list_tags(&self, org: &str, repo: &str, tag: &str) -> Result<Vec<Tag>>;

    /// The first active tag named `tag`, if any.
    fn tag_detail(&self, org: &str, repo: &str, tag: &str) -> Result<Option<Tag>>;

    /// Metadata for the manifest addressed by `digest`.
    fn manifest_detail(&self, org: &str, repo: &str, digest: &str) -> Result<ManifestDetail>;

    /// Labels of the manifest addressed by `digest`.
    fn labels(&self, org: &str, repo: &str, digest: &str) -> Result<Vec<Label>>;

    /// Digests of the per-platform manifests of a manifest list.
    ///
    /// Returns an empty list for single-platform manifests.
    fn sub_manifest_digests(&self, org: &str, repo: &str, digest: &str) -> Result<Vec<String>> {
        let detail = self.manifest_detail(org, repo, digest)?;
        if !detail.is_manifest_list {
            return Ok(Vec::new());
        }
        parse_manifest_list(&detail.manifest_data)
    }
}

/// Extract `manifests[].digest` from a manifest list document.
pub fn parse_manifest_list(manifest_data: &str) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct ManifestList {
        #[serde(default)]
        manifests: Vec<ManifestRef>,
    }
    #[derive(Deserialize)]
    struct ManifestRef {
        digest: String,
    }

    let list: ManifestList = serde_json::from_str(manifest_data)?;
    Ok(list.manifests.into_iter().map(|m| m.digest).collect())
}

/// Connection settings for the registry API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_API.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Environment variable holding the API token for `org`.
pub fn token_variable(org: &str) -> String {
    format!("{}_QUAY_API_TOKEN", org.to_uppercase())
}

/// `RegistryOperations` over the Quay v1 REST API.
pub struct QuayClient {
    client: Client,
    base_url: String,
}

impl QuayClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network {
                url: config.base_url.clone(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn tags_url(&self, org: &str, repo: &str, tag: &str, active_only: bool) -> Result<Url> {
        let base = format!("{}/repository/{}/{}/tag/", self.base_url, org, repo);
        Url::parse_with_params(
            &base,
            &[
                ("specificTag", tag),
                ("onlyActiveTags", if active_only { "true" } else { "false" }),
            ],
        )
        .map_err(|e| Error::Registry {
            url: base,
            message: e.to_string(),
        })
    }

    pub(crate) fn manifest_url(&self, org: &str, repo: &str, digest: &str, suffix: &str) -> Result<Url> {
        let raw = format!("{}/repository/{}/{}/manifest/{}{}", self.base_url, org, repo, digest, suffix);
        Url::parse(&raw).map_err(|e| Error::Registry {
            url: raw,
            message: e.to_string(),
        })
    }

    fn get_json(&self, org: &str, url: &Url) -> Result<JsonValue> {
        debug!("GET {}", url);
        let mut request = self.client.get(url.clone()).header(ACCEPT, "application/json");

        let variable = token_variable(org);
        match env::var(&variable) {
            Ok(token) if !token.is_empty() => request = request.bearer_auth(token),
            _ => warn!("{} is not set, querying {} anonymously", variable, url),
        }

        let response = request.send().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&body).map_err(|e| Error::Registry {
            url: url.to_string(),
            message: format!("HTTP {}: unreadable response ({}): {}", status, e, body),
        })
    }
}

/// Take a required top-level field from a registry response.
fn take_field<T: DeserializeOwned>(url: &Url, mut response: JsonValue, field: &str) -> Result<T> {
    let value = response
        .get_mut(field)
        .map(JsonValue::take)
        .ok_or_else(|| Error::Registry {
            url: url.to_string(),
            message: format!("response has no '{}' field: {}", field, response),
        })?;
    serde_json::from_value(value).map_err(|e| Error::Registry {
        url: url.to_string(),
        message: format!("malformed '{}' field: {}", field, e),
    })
}

impl RegistryOperations for QuayClient {
    fn list_tags(&self, org: &str, repo: &str, tag: &str) -> Result<Vec<Tag>> {
        let url = self.tags_url(org, repo, tag, false)?;
        take_field(&url, self.get_json(org, &url)?, "tags")
    }

    fn tag_detail(&self, org: &str, repo: &str, tag: &str) -> Result<Option<Tag>> {
        let url = self.tags_url(org, repo, tag, true)?;
        let tags: Vec<Tag> = take_field(&url, self.get_json(org, &url)?, "tags")?;
        Ok(tags.into_iter().next())
    }

    fn manifest_detail(&self, org: &str, repo: &str, digest: &str) -> Result<ManifestDetail> {
        let url = self.manifest_url(org, repo, digest, "")?;
        let response = self.get_json(org, &url)?;
        if response.get("manifest_data").is_none() {
            return Err(Error::Registry {
                url: url.to_string(),
                message: format!("response has no 'manifest_data' field: {}", response),
            });
        }
        serde_json::from_value(response).map_err(|e| Error::Registry {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn labels(&self, org: &str, repo: &str, digest: &str) -> Result<Vec<Label>> {
        let url = self.manifest_url(org, repo, digest, "/labels")?;
        take_field(&url, self.get_json(org, &url)?, "labels")
    }
}

/// Fetch a file from a source repository at a commit.
pub trait SourceFetcher: Send + Sync {
    fn fetch_file(&self, repo_url: &str, commit: &str, path: &str) -> Result<String>;
}

/// Raw-content URL for `path` at `commit` in the repository at `repo_url`.
///
/// A trailing `.git` is dropped and `github.com` is served from
/// `raw.githubusercontent.com`.
///
/// ```
/// use bundle_reconcile::registry::raw_content_url;
///
/// let url = raw_content_url("https://github.com/org/repo.git", "abc123", "build/operands-map.yaml").unwrap();
/// assert_eq!(url.as_str(), "https://raw.githubusercontent.com/org/repo/abc123/build/operands-map.yaml");
/// ```
pub fn raw_content_url(repo_url: &str, commit: &str, path: &str) -> Result<Url> {
    let invalid = |message: String| Error::Network {
        url: repo_url.to_string(),
        message,
    };

    let trimmed = repo_url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let mut url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;

    if url.host_str() == Some("github.com") {
        url.set_host(Some("raw.githubusercontent.com"))
            .map_err(|e| invalid(e.to_string()))?;
    }

    url.path_segments_mut()
        .map_err(|_| invalid("repository URL cannot be a base".to_string()))?
        .pop_if_empty()
        .push(commit)
        .extend(path.split('/').filter(|segment| !segment.is_empty()));

    Ok(url)
}

/// `SourceFetcher` over raw-content HTTP downloads.
pub struct RawContentFetcher {
    client: Client,
}

impl RawContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl SourceFetcher for RawContentFetcher {
    fn fetch_file(&self, repo_url: &str, commit: &str, path: &str) -> Result<String> {
        let url = raw_content_url(repo_url, commit, path)?;
        info!("Fetching content from {}", url);

        let network = |message: String| Error::Network {
            url: url.to_string(),
            message,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| network(e.to_string()))?;
        let content = response.text().map_err(|e| network(e.to_string()))?;

        info!("Successfully fetched {} bytes", content.len());
        Ok(content)
    }
}

//! Default values for bundle-reconcile.
//!
//! The engine never reads process-wide constants directly. Everything a
//! component needs (registry names, label keys, source paths, filters) lives
//! in [`Settings`], which commands build once and pass down.

/// Label holding the source repository URL of an image.
pub const GIT_URL_LABEL: &str = "git.url";
/// Label holding the source commit of an image.
pub const GIT_COMMIT_LABEL: &str = "git.commit";
/// Upstream override for [`GIT_URL_LABEL`].
pub const GITHUB_URL_LABEL: &str = "github.url";
/// Upstream override for [`GIT_COMMIT_LABEL`].
pub const GITHUB_COMMIT_LABEL: &str = "github.commit";

/// Default Quay API endpoint.
pub const DEFAULT_REGISTRY_API: &str = "https://quay.io/api/v1";

/// Engine-wide settings passed to each component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Registry that release images are published to.
    pub production_registry: String,
    /// Operator package name, also the bundle version prefix.
    pub operator_name: String,
    /// Path of the operands map inside the operator repository.
    pub operands_map_path: String,
    /// Path of the manifests config inside the operator repository.
    pub manifests_config_path: String,
    /// Name substring selecting the operator entry in the bundle patch.
    pub operator_entry_filter: String,
    /// Name substrings excluded when syncing operand lists.
    pub operand_exclusions: Vec<String>,
    /// Bundle versions that are allowed to be absent from every catalog.
    pub missing_bundle_exceptions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            production_registry: "registry.redhat.io".to_string(),
            operator_name: "rhods-operator".to_string(),
            operands_map_path: "build/operands-map.yaml".to_string(),
            manifests_config_path: "build/manifests-config.yaml".to_string(),
            operator_entry_filter: "ODH_OPERATOR".to_string(),
            operand_exclusions: vec![
                "FBC".to_string(),
                "BUNDLE".to_string(),
                "ODH_OPERATOR".to_string(),
            ],
            missing_bundle_exceptions: vec![
                "rhods-operator.2.9.0".to_string(),
                "rhods-operator.2.9.1".to_string(),
            ],
        }
    }
}

//! # CLI Command Implementations
//!
//! One module per subcommand of the `bundle-reconcile` tool. Each module
//! holds an `Args` struct derived with `clap` and an `execute` function that
//! builds the engine components from those arguments and calls into the
//! `bundle_reconcile` library.

use std::time::Duration;

use clap::Args;

use bundle_reconcile::defaults::DEFAULT_REGISTRY_API;
use bundle_reconcile::provenance::ResolverConfig;
use bundle_reconcile::registry::RegistryConfig;

pub mod bundle_patch;
pub mod pipeline_gate;
pub mod sync_operator;
pub mod validate_catalogs;

/// Registry connection options shared by the commands that resolve images.
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Base URL of the Quay API.
    #[arg(
        long,
        value_name = "URL",
        env = "BUNDLE_RECONCILE_REGISTRY_URL",
        default_value = DEFAULT_REGISTRY_API
    )]
    pub registry_url: String,

    /// Number of images resolved concurrently.
    #[arg(
        long,
        value_name = "N",
        env = "BUNDLE_RECONCILE_WORKERS",
        default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub workers: u16,

    /// Timeout for each HTTP request, in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,
}

impl RegistryArgs {
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            base_url: self.registry_url.trim_end_matches('/').to_string(),
            timeout: self.timeout(),
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            workers: usize::from(self.workers),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

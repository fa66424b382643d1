//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use bundle_reconcile::catalog::CatalogLayout;

use crate::commands;

/// Bundle Reconcile - Pin operator bundle images and validate release catalogs
#[derive(Parser, Debug)]
#[command(name = "bundle-reconcile")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Patch a bundle CSV with resolved operator and operand images
    BundlePatch(commands::bundle_patch::BundlePatchArgs),

    /// Sync operator repository documents with the bundle patch
    SyncOperator(commands::sync_operator::SyncOperatorArgs),

    /// Validate per-platform catalog directories
    ValidateCatalogs(commands::validate_catalogs::ValidateCatalogsArgs),

    /// Validate flat catalog files with discontinuity cut-offs
    ValidatePcc(commands::validate_catalogs::ValidateCatalogsArgs),

    /// Enable or disable a push pipeline trigger
    PipelineGate(commands::pipeline_gate::PipelineGateArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let color = self.color.as_str();

        match self.command {
            Commands::BundlePatch(args) => commands::bundle_patch::execute(args, color),
            Commands::SyncOperator(args) => commands::sync_operator::execute(args, color),
            Commands::ValidateCatalogs(args) => {
                commands::validate_catalogs::execute(args, CatalogLayout::Catalogs, color)
            }
            Commands::ValidatePcc(args) => {
                commands::validate_catalogs::execute(args, CatalogLayout::Pcc, color)
            }
            Commands::PipelineGate(args) => commands::pipeline_gate::execute(args, color),
        }
    }
}

/// Route `log` records to stderr. `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when running under a test harness
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

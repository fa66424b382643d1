//! # Sync Operator Command
//!
//! Implements `sync-operator`: aligns the operator repository's operand map
//! and nudging document with the bundle patch, pins every operand to its
//! latest signed digest and records the git provenance of each component in
//! the manifests config.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use bundle_reconcile::defaults::Settings;
use bundle_reconcile::gate::GateOperation;
use bundle_reconcile::output::{emoji, OutputConfig};
use bundle_reconcile::processors::{OperatorPaths, OperatorProcessor, OperatorRequest};
use bundle_reconcile::registry::QuayClient;
use bundle_reconcile::version::{BuildType, VersionTag};

use super::RegistryArgs;

/// Sync operator repository documents with the bundle patch
#[derive(Args, Debug)]
pub struct SyncOperatorArgs {
    /// Bundle patch document listing the related images.
    #[arg(short = 'p', long, value_name = "FILE")]
    pub patch: PathBuf,

    /// Operands map, rewritten in place.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub operands_map: PathBuf,

    /// Nudging document, rewritten in place.
    #[arg(short = 'n', long, value_name = "FILE")]
    pub nudging: PathBuf,

    /// Manifests config, rewritten in place.
    #[arg(short = 'm', long, value_name = "FILE")]
    pub manifests_config: PathBuf,

    /// Tekton push pipeline whose trigger is gated.
    #[arg(short = 'y', long, value_name = "FILE")]
    pub push_pipeline: PathBuf,

    /// Release stream, for example `rhoai-2.16`.
    #[arg(short = 'v', long, value_name = "VERSION")]
    pub release: String,

    /// Build type (ci, nightly).
    #[arg(short = 't', long, value_name = "TYPE", default_value = "ci")]
    pub build_type: BuildType,

    /// Push pipeline operation (enable, disable).
    #[arg(short = 'x', long, value_name = "OP", default_value = "enable")]
    pub pipeline_operation: GateOperation,

    #[command(flatten)]
    pub registry: RegistryArgs,
}

/// Execute the `sync-operator` command.
pub fn execute(args: SyncOperatorArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let tag = VersionTag::new(args.release.as_str(), args.build_type);
    println!(
        "{} Syncing operator documents for {}",
        emoji(&out, "🔄", "[SYNC]"),
        tag
    );

    let registry = QuayClient::new(&args.registry.registry_config())
        .context("Failed to create the registry client")?;
    let processor = OperatorProcessor::new(
        Box::new(registry),
        Settings::default(),
        args.registry.resolver_config(),
    );

    let request = OperatorRequest {
        paths: OperatorPaths {
            patch: args.patch,
            operands_map: args.operands_map,
            nudging: args.nudging,
            manifests_config: args.manifests_config,
            pipeline: args.push_pipeline,
        },
        tag,
        pipeline: args.pipeline_operation,
    };

    let outcome = processor.process(&request)?;

    println!(
        "{} {} operand image(s) pinned",
        emoji(&out, "✅", "[OK]"),
        outcome.resolved
    );
    println!(
        "{} Provenance recorded for {} component(s) in {}",
        emoji(&out, "✅", "[OK]"),
        outcome.additional_components.len(),
        request.paths.manifests_config.display()
    );
    if outcome.pipeline_changed {
        println!(
            "{} Push pipeline {}d",
            emoji(&out, "🔧", "[GATE]"),
            request.pipeline
        );
    }
    Ok(())
}

//! # Bundle Patch Command
//!
//! Implements `bundle-patch`: pins the operator image of a bundle CSV to its
//! latest signed digest, pulls the operand list from the operator repository
//! at the commit that image was built from, and rewrites the CSV, the bundle
//! annotations and the bundle build arguments. The push pipeline gate is
//! applied last.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use bundle_reconcile::defaults::Settings;
use bundle_reconcile::gate::GateOperation;
use bundle_reconcile::output::{emoji, OutputConfig};
use bundle_reconcile::processors::{BundlePaths, BundleProcessor, BundleRequest};
use bundle_reconcile::registry::{QuayClient, RawContentFetcher};
use bundle_reconcile::version::{BuildType, VersionTag};

use super::RegistryArgs;

/// Patch a bundle CSV with resolved operator and operand images
#[derive(Args, Debug)]
pub struct BundlePatchArgs {
    /// Build config holding the registry and repo replacements.
    #[arg(short = 'b', long, value_name = "FILE")]
    pub build_config: PathBuf,

    /// Bundle ClusterServiceVersion to patch in place.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub bundle_csv: PathBuf,

    /// Bundle patch document; the build arguments are written next to it.
    #[arg(short = 'p', long, value_name = "FILE")]
    pub patch: PathBuf,

    /// Bundle annotations document to strip of channel annotations.
    #[arg(short = 'a', long, value_name = "FILE")]
    pub annotations: PathBuf,

    /// Where to write the patched CSV. Defaults to the input CSV.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

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

/// Execute the `bundle-patch` command.
pub fn execute(args: BundlePatchArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let tag = VersionTag::new(args.release.as_str(), args.build_type);
    println!(
        "{} Patching bundle {} for {}",
        emoji(&out, "📦", "[BUNDLE]"),
        args.bundle_csv.display(),
        tag
    );

    let registry = QuayClient::new(&args.registry.registry_config())
        .context("Failed to create the registry client")?;
    let fetcher = RawContentFetcher::new(args.registry.timeout())
        .context("Failed to create the source fetcher")?;
    let processor = BundleProcessor::new(
        Box::new(registry),
        Box::new(fetcher),
        Settings::default(),
        args.registry.resolver_config(),
    );

    let paths = BundlePaths {
        output: args.output.unwrap_or_else(|| args.bundle_csv.clone()),
        build_config: args.build_config,
        csv: args.bundle_csv,
        patch: args.patch,
        annotations: args.annotations,
        pipeline: args.push_pipeline,
    };
    let request = BundleRequest {
        paths,
        tag,
        pipeline: args.pipeline_operation,
        created_at: Utc::now(),
    };

    let outcome = processor.process(&request)?;

    println!(
        "{} Operator image pinned to {}",
        emoji(&out, "✅", "[OK]"),
        outcome.operator_image
    );
    println!(
        "{} {} related image(s) written to {}",
        emoji(&out, "✅", "[OK]"),
        outcome.related_images,
        request.paths.output.display()
    );
    println!(
        "{} Build arguments written to {}",
        emoji(&out, "✅", "[OK]"),
        request.paths.build_args().display()
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

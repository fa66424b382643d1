//! # Catalog Validation Commands
//!
//! Implements `validate-catalogs` and `validate-pcc`. Both check that every
//! shipped bundle version appears in the catalog of every supported platform
//! and print one summary line per platform. They differ only in where the
//! catalogs live and how the platforms are configured, see
//! [`CatalogLayout`].
//!
//! These commands never modify any file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use bundle_reconcile::catalog::{validate_catalog_tree, CatalogLayout};
use bundle_reconcile::config::BuildConfig;
use bundle_reconcile::defaults::Settings;
use bundle_reconcile::output::{catalog_summary, emoji, OutputConfig};

/// Validate that every shipped bundle is present in the catalogs
#[derive(Args, Debug)]
pub struct ValidateCatalogsArgs {
    /// Build config listing the supported platforms.
    #[arg(short = 'b', long, value_name = "FILE")]
    pub build_config: PathBuf,

    /// Directory holding the generated catalogs.
    #[arg(short = 'c', long, value_name = "DIR")]
    pub catalog_dir: PathBuf,

    /// File listing the shipped release versions, one per line.
    #[arg(short = 's', long, value_name = "FILE")]
    pub shipped_versions: PathBuf,
}

/// Execute a catalog validation for `layout`.
pub fn execute(args: ValidateCatalogsArgs, layout: CatalogLayout, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    println!(
        "{} Validating catalogs in {}",
        emoji(&out, "🔍", "[SCAN]"),
        args.catalog_dir.display()
    );

    let build_config = BuildConfig::from_file(&args.build_config)
        .with_context(|| format!("Failed to load {}", args.build_config.display()))?;
    let report = validate_catalog_tree(
        layout,
        &build_config,
        &args.catalog_dir,
        &args.shipped_versions,
        &Settings::default(),
    )?;

    print!("{}", catalog_summary(&out, &report));
    if report.is_empty() {
        println!("{} All catalogs are complete", emoji(&out, "✅", "[OK]"));
    }
    report.into_result()?;
    Ok(())
}

//! # Pipeline Gate Command
//!
//! Implements `pipeline-gate`: enables or disables the trigger of a Tekton
//! push pipeline by toggling a guard clause in its CEL expression. The file
//! is only rewritten when the expression changes.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use bundle_reconcile::document;
use bundle_reconcile::gate::{apply_to_pipeline, GateOperation};
use bundle_reconcile::output::{emoji, OutputConfig};

/// Enable or disable a push pipeline trigger
#[derive(Args, Debug)]
pub struct PipelineGateArgs {
    /// Tekton push pipeline to update in place.
    #[arg(short = 'y', long, value_name = "FILE")]
    pub push_pipeline: PathBuf,

    /// Operation to apply (enable, disable).
    #[arg(short = 'x', long, value_name = "OP", default_value = "enable")]
    pub operation: GateOperation,
}

/// Execute the `pipeline-gate` command.
pub fn execute(args: PipelineGateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let mut pipeline = document::load(&args.push_pipeline)?;

    if apply_to_pipeline(&mut pipeline, args.operation)? {
        document::save(&pipeline, &args.push_pipeline)?;
        println!(
            "{} Push pipeline {}d: {}",
            emoji(&out, "✅", "[OK]"),
            args.operation,
            args.push_pipeline.display()
        );
    } else {
        println!(
            "{} Push pipeline already {}d, nothing to do",
            emoji(&out, "ℹ️", "[INFO]"),
            args.operation
        );
    }
    Ok(())
}

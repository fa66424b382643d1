//! # Bundle Reconcile CLI
//!
//! This is the binary entry point for the `bundle-reconcile` command-line tool.
//!
//! It parses the command line with `clap` and dispatches to a subcommand. Any
//! error bubbles up as an `anyhow::Error`, is printed to stderr with its full
//! report and ends the process with exit code 1.
//!
//! The reconciliation logic lives in the `bundle_reconcile` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}

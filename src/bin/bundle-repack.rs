//! bundle-repack CLI Binary
//!
//! Command-line interface for dependency resolution and repacking of asset containers.

use anyhow::Context;
use bundle_repack::tooling::cli::{Cli, CliContext};
use clap::Parser;
use std::process;

fn run(cli: Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli.config.clone(), cli.log_level.clone())
        .context("failed to initialize")?;
    let output = context.execute(&cli.command)?;
    Ok(output)
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

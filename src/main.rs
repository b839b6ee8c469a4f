//! CLI entry point for the camera-trap covariate and model pipeline

use camtrap::io::cli::{Cli, init_tracing, run};
use clap::Parser;

fn main() -> camtrap::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;
    run(&cli)?;
    Ok(())
}

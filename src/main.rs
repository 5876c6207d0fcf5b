//! reloadr - run scripts whose classes and functions reload while they run.

mod cli;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use reloadr::config::ReloadrConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    let shutdown = cli::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    match &cli.command {
        Commands::Run { args } => {
            let config = ReloadrConfig::load(&cli.config)?;
            cli::run::run_script(args, &config, &shutdown)
        }
        Commands::Check { script } => cli::check::check_script(script),
    }
}

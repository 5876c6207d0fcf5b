//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use reloadr::config::CONFIG_FILE;

/// Run scripts whose classes and functions reload while they run
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: reloadr.toml, optional)
    #[arg(short = 'C', long, global = true, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Load a script, start reload triggers and call its entry function
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Parse a script and list its reloadable definitions
    #[command(visible_alias = "c")]
    Check {
        /// Script file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        script: PathBuf,
    },
}

/// Run command arguments. Unset options fall back to the config file.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Script file
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub script: PathBuf,

    /// Function called after loading (default: main)
    #[arg(short, long)]
    pub entry: Option<String>,

    /// Reload every proxy when its source file is saved
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,

    /// Reload every proxy on this interval in milliseconds (0 disables)
    #[arg(short, long, value_name = "MS")]
    pub timer: Option<u64>,

    /// Print debug output
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["reloadr", "run", "car.rl"]);
        assert_eq!(cli.config, PathBuf::from("reloadr.toml"));
        let Commands::Run { args } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.script, PathBuf::from("car.rl"));
        assert_eq!(args.entry, None);
        assert_eq!(args.watch, None);
        assert_eq!(args.timer, None);
        assert!(!args.verbose);
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::parse_from([
            "reloadr", "-C", "dev.toml", "run", "car.rl", "--entry", "simulate", "--watch",
            "--timer", "500", "-v",
        ]);
        assert_eq!(cli.config, PathBuf::from("dev.toml"));
        let Commands::Run { args } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.entry.as_deref(), Some("simulate"));
        assert_eq!(args.watch, Some(true));
        assert_eq!(args.timer, Some(500));
        assert!(args.verbose);
    }

    #[test]
    fn test_watch_can_be_disabled() {
        let cli = Cli::parse_from(["reloadr", "run", "car.rl", "--watch", "false"]);
        let Commands::Run { args } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.watch, Some(false));
    }

    #[test]
    fn test_check_alias() {
        let cli = Cli::parse_from(["reloadr", "c", "car.rl"]);
        assert!(matches!(cli.command, Commands::Check { .. }));
    }
}

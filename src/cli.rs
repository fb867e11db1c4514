//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use robotdev::defaults::default_env_root;
use robotdev::output::OutputConfig;

use crate::commands;

/// robotdev - Build, run and release robot software components
#[derive(Parser, Debug)]
#[command(name = "robotdev")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Development environment root (default: ~/robotdev)
    #[arg(long, global = true, value_name = "DIR", env = "ROBOTDEV_ENV")]
    env: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Release a repository and publish the images of its components
    Deploy(commands::deploy::DeployArgs),

    /// Build the image of a component for a robot
    Build(commands::build::BuildArgs),

    /// Push the image of a component to the registry
    Push(commands::push::PushArgs),

    /// Run a component on a robot, or a command in its running container
    Run(commands::run::RunArgs),

    /// Copy the trees a component mounts to a remote robot
    Sync(commands::sync::SyncArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Output settings derived from `--color` and the environment.
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }

    /// `RUST_LOG` wins over `--log-level` when set.
    fn init_logging(&self) {
        let env = env_logger::Env::default().default_filter_or(self.log_level.as_str());
        // A logger may already be installed when embedded in tests.
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .try_init();
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging();
        let env_root = self.env.clone().unwrap_or_else(default_env_root);
        log::debug!("Using environment root {}", env_root.display());

        match self.command {
            Commands::Deploy(args) => commands::deploy::execute(args, &env_root),
            Commands::Build(args) => commands::build::execute(args, &env_root),
            Commands::Push(args) => commands::push::execute(args, &env_root),
            Commands::Run(args) => commands::run::execute(args, &env_root),
            Commands::Sync(args) => commands::sync::execute(args, &env_root),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

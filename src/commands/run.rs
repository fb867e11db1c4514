//! # Run Command Implementation
//!
//! Runs a component's dev image on a robot, or executes a command inside
//! its container when one is already running from the same image.
//!
//! ```bash
//! robotdev run --robot localhost --component nav/planner
//! robotdev run --robot gary-01 --component nav/planner -d
//! robotdev run --robot gary-01 --component nav/planner -- ros2 topic list
//! ```

use std::path::Path;

use anyhow::Result;
use clap::Args;
use robotdev::process::SystemRunner;
use robotdev::run::{RunHandler, RunMode};

use super::Target;

/// Run a component on a robot
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Robot to run on
    #[arg(short, long, value_name = "ROBOT")]
    pub robot: String,

    /// Component to run, as `repo/component`
    #[arg(short, long, value_name = "COMPONENT")]
    pub component: String,

    /// Start the container in the background
    #[arg(short, long, conflicts_with = "interactive")]
    pub detached: bool,

    /// Attach a terminal to the container
    #[arg(short, long)]
    pub interactive: bool,

    /// Command to run instead of the image's default
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl RunArgs {
    fn mode(&self) -> RunMode {
        if self.detached {
            RunMode::Detached
        } else if self.interactive {
            RunMode::Interactive
        } else {
            RunMode::Attached
        }
    }
}

/// Execute the run command
pub fn execute(args: RunArgs, env_root: &Path) -> Result<()> {
    let target = Target::load(env_root, &args.robot)?;
    let descriptor = target.resolve(&args.component, false)?;
    let workspace = target.workspace()?;
    let docker = target.docker();

    let handler = RunHandler::new(
        &target.env,
        &target.robot,
        &descriptor,
        &docker,
        &SystemRunner,
        workspace,
    );
    handler.run_command(&args.command, args.mode())?;
    Ok(())
}

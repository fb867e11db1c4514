//! # Sync Command Implementation
//!
//! Copies the source trees and shared data a component mounts into the
//! developer's workspace on a remote robot.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use robotdev::process::SystemRunner;
use robotdev::sync::SyncHandler;

use super::Target;

/// Synchronise a component's trees to a robot
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Robot to synchronise to
    #[arg(short, long, value_name = "ROBOT")]
    pub robot: String,

    /// Component whose trees are copied, as `repo/component`
    #[arg(short, long, value_name = "COMPONENT")]
    pub component: String,
}

/// Execute the sync command
pub fn execute(args: SyncArgs, env_root: &Path) -> Result<()> {
    let target = Target::load(env_root, &args.robot)?;
    let descriptor = target.resolve(&args.component, false)?;
    let workspace = target.workspace()?;

    SyncHandler::new(&target.env, &target.robot, &SystemRunner, workspace).sync(&descriptor)?;
    println!("✅ Synchronised '{}' to '{}'", descriptor.full_name(), target.robot.name);
    Ok(())
}

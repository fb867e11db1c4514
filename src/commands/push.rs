//! # Push Command Implementation
//!
//! Pushes a previously built component image to the registry. The image is
//! tagged with the registry prefix, pushed, and the extra tag removed again.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use robotdev::component::BuildType;
use robotdev::docker::BuildOrchestrator;

use super::Target;

/// Push a component image to the registry
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Robot whose platform and docker daemon are used
    #[arg(short, long, value_name = "ROBOT")]
    pub robot: String,

    /// Component to push, as `repo/component`
    #[arg(short, long, value_name = "COMPONENT")]
    pub component: String,

    /// Push the production image instead of the dev image
    #[arg(long)]
    pub prod: bool,
}

/// Execute the push command
pub fn execute(args: PushArgs, env_root: &Path) -> Result<()> {
    let target = Target::load(env_root, &args.robot)?;
    let descriptor = target.resolve(&args.component, false)?;
    let docker = target.docker();
    let orchestrator = BuildOrchestrator::new(&docker, target.env.settings.registry.clone());

    let build_type = if args.prod { BuildType::Prod } else { BuildType::Dev };
    let pushed = orchestrator.push_image(&descriptor, build_type)?;
    println!("✅ Pushed {}", pushed);
    Ok(())
}

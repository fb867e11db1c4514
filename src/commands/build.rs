//! # Build Command Implementation
//!
//! Builds the image of one component for the platform of a robot, using the
//! robot's docker daemon. `--prod` also builds the production image on top
//! of the freshly built dev image.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use robotdev::component::BuildType;
use robotdev::docker::{image_metadata, BuildOrchestrator};
use robotdev::manifest::ManifestFile;

use super::Target;

/// Build a component image
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Robot whose platform and docker daemon are used
    #[arg(short, long, value_name = "ROBOT")]
    pub robot: String,

    /// Component to build, as `repo/component`
    #[arg(short, long, value_name = "COMPONENT")]
    pub component: String,

    /// Also build the production image
    #[arg(long)]
    pub prod: bool,

    /// Mark the dev version with `.changes` when the repository is dirty or
    /// past its last tag
    #[arg(long)]
    pub checks: bool,
}

/// Execute the build command
pub fn execute(args: BuildArgs, env_root: &Path) -> Result<()> {
    let target = Target::load(env_root, &args.robot)?;
    let descriptor = target.resolve(&args.component, args.checks)?;
    let docker = target.docker();
    let orchestrator = BuildOrchestrator::new(&docker, target.env.settings.registry.clone());

    let mut built = vec![orchestrator.build_image(&descriptor, BuildType::Dev, &[])?];
    if args.prod {
        let manifest = ManifestFile::load(&descriptor.repo_path)?;
        let metadata = image_metadata(&manifest.to_json()?, &descriptor)?;
        built.push(orchestrator.build_image(&descriptor, BuildType::Prod, &metadata)?);
    }

    for image in built {
        println!("✅ Built {}", image);
    }
    Ok(())
}

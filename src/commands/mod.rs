//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `robotdev`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the environment
//!   root and performs the command's logic.
//!
//! The helpers below hold what every robot-facing command shares: loading
//! the environment, resolving the robot, and talking to its docker daemon.

pub mod build;
pub mod completions;
pub mod deploy;
pub mod push;
pub mod run;
pub mod sync;

use std::path::Path;

use anyhow::{Context, Result};
use robotdev::component::{ComponentDescriptor, ComponentName, Resolver};
use robotdev::config::Environment;
use robotdev::docker::DockerCli;
use robotdev::git::{default_workspace_name, GitRepository};
use robotdev::process::SystemRunner;
use robotdev::robot::Robot;

/// The environment and the robot a command targets.
pub struct Target {
    pub env: Environment,
    pub robot: Robot,
}

impl Target {
    pub fn load(env_root: &Path, robot: &str) -> Result<Self> {
        let env = Environment::load(env_root)?;
        let robot = Robot::resolve(&env, robot)?;
        Ok(Self { env, robot })
    }

    /// Resolves a `repo/component` name for this robot's platform.
    ///
    /// With `checks`, the dev version reflects the repository's git state.
    pub fn resolve(&self, component: &str, checks: bool) -> Result<ComponentDescriptor> {
        let resolver = Resolver::new(&self.env, self.robot.platform());
        if !checks {
            return Ok(resolver.resolve(component)?);
        }

        let name = ComponentName::parse(component)?;
        let repo = GitRepository::open(self.env.repo_path(&name.repo))?;
        Ok(resolver.resolve_checked(component, &repo, &self.env.settings.deploy_branch)?)
    }

    /// docker client for the robot's daemon, run from the environment root.
    pub fn docker(&self) -> DockerCli {
        let docker_host = self.robot.remote.as_ref().map(|r| r.docker_host());
        DockerCli::new(docker_host).working_dir(&self.env.root)
    }

    /// The configured workspace, or one derived from the git user email.
    pub fn workspace(&self) -> Result<String> {
        match &self.env.settings.workspace {
            Some(workspace) => Ok(workspace.clone()),
            None => default_workspace_name(&SystemRunner)
                .context("Set 'workspace' in robotdev.yaml or configure git user.email"),
        }
    }
}

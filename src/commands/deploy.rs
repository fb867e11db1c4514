//! # Deploy Command Implementation
//!
//! This module implements the `deploy` subcommand, which releases one
//! repository of the environment and publishes the images of its components.
//!
//! ## Functionality
//!
//! 1. Checks that the repository and every repository it depends on are
//!    clean, released and up to date with `origin`.
//! 2. Asks for the next version, offering the valid successors of the last
//!    release, and confirms major bumps.
//! 3. Writes the version to `manifest.yaml` and every `package.xml`, commits,
//!    tags and pushes.
//! 4. Builds the dev and prod images of each component for the build host's
//!    platform and pushes them to the registry.
//!
//! With `--skip-repo-steps` only the last step runs, for the current version.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use robotdev::config::Environment;
use robotdev::deploy::{DeployOptions, DeployReport, DeployStage, DeployWorkflow, Prompter};
use robotdev::docker::BuildOrchestrator;
use robotdev::git::{GitRepository, WorkspaceRepositories};
use robotdev::robot::known_hosts;
use robotdev::version::{validate_next_version, ReleaseVersion};

use super::Target;

/// Release a repository and publish its images
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Repository to deploy, by its directory name under `src/`
    #[arg(short, long, value_name = "REPO")]
    pub repo: String,

    /// Build and push the current version without any git step
    #[arg(long)]
    pub skip_repo_steps: bool,

    /// Host to build the images on (prompted when omitted)
    #[arg(long, value_name = "ROBOT")]
    pub robot: Option<String>,
}

/// Prompts on the terminal with dialoguer.
struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Prompter for TerminalPrompter {
    fn ask_version(
        &self,
        last: &ReleaseVersion,
        suggestions: &[ReleaseVersion],
    ) -> robotdev::error::Result<String> {
        let options: Vec<String> = suggestions.iter().map(ToString::to_string).collect();
        println!("💡 Last released version is {}", last);
        println!("   Valid next versions: {}", options.join(", "));

        let mut input = Input::<String>::with_theme(&self.theme).with_prompt("Version to release");
        if let Some(first) = options.first() {
            input = input.default(first.clone());
        }
        let last = *last;
        let version = input
            .validate_with(move |candidate: &String| -> Result<(), String> {
                validate_next_version(&last, candidate)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .interact_text()
            .map_err(|dialoguer::Error::IO(e)| e)?;
        Ok(version)
    }

    fn confirm_major_bump(
        &self,
        last: &ReleaseVersion,
        next: &ReleaseVersion,
    ) -> robotdev::error::Result<bool> {
        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt(format!(
                "{} -> {} is a major version bump. Continue?",
                last, next
            ))
            .default(false)
            .interact()
            .map_err(|dialoguer::Error::IO(e)| e)?;
        Ok(confirmed)
    }
}

/// Execute the deploy command
pub fn execute(args: DeployArgs, env_root: &Path) -> Result<()> {
    let robot = match &args.robot {
        Some(robot) => robot.clone(),
        None => select_build_host(&Environment::load(env_root)?)?,
    };
    let target = Target::load(env_root, &robot)?;
    let env = &target.env;

    let repo = GitRepository::open(env.repo_path(&args.repo))?;
    let provider = WorkspaceRepositories::new(env.src_dir());
    let prompter = TerminalPrompter {
        theme: ColorfulTheme::default(),
    };
    let docker = target.docker();
    let orchestrator = BuildOrchestrator::new(&docker, env.settings.registry.clone());
    let options = DeployOptions {
        deploy_branch: env.settings.deploy_branch.clone(),
        platform: target.robot.platform().to_string(),
        skip_repo_steps: args.skip_repo_steps,
    };

    println!(
        "🚀 Deploying '{}' from '{}' ({})",
        args.repo,
        target.robot.name,
        target.robot.platform()
    );
    let mut workflow = DeployWorkflow::new(env, &repo, &provider, &prompter, &orchestrator, options);
    let report = workflow.run().with_context(|| match workflow.stage() {
        DeployStage::Done => format!("Deploy of '{}' finished with image failures", args.repo),
        stage => format!("Deploy of '{}' failed at stage '{}'", args.repo, stage),
    })?;

    print_report(&report);
    Ok(())
}

fn select_build_host(env: &Environment) -> Result<String> {
    let hosts = known_hosts(env)?;
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Build host")
        .items(&hosts)
        .default(0)
        .interact()?;
    Ok(hosts[selection].clone())
}

fn print_report(report: &DeployReport) {
    for (dependency, tag) in &report.dependencies {
        println!("   depends on {} {}", dependency, tag);
    }
    for image in &report.pushed {
        println!("   📤 {}", image);
    }
    for component in &report.skipped {
        println!("   ⏭️  {} (no recipe for this platform)", component);
    }
}

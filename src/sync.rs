//! Workspace synchronisation to remote robots.
//!
//! A remote robot has no checkout of its own. Before building or running a
//! component there, the trees the container mounts are copied with rsync
//! into the developer's workspace, `~/<remote_root>/<workspace>/`:
//!
//! - `src/<repo>` of the component
//! - `src/<dep>` for every repository in the descriptor's `src` list
//! - `generic_static_data/`
//! - `config/`
//!
//! Synchronising to `localhost` does nothing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::info;

use crate::component::ComponentDescriptor;
use crate::config::Environment;
use crate::defaults::{CONFIG_DIR, GENERIC_STATIC_DATA_DIR, SRC_DIR};
use crate::error::Result;
use crate::process::{CommandLine, CommandRunner};
use crate::robot::{RemoteHost, Robot};
use crate::ssh::SshSession;

/// Copies a component's trees to a robot.
pub struct SyncHandler<'a> {
    env: &'a Environment,
    robot: &'a Robot,
    runner: &'a dyn CommandRunner,
    workspace: String,
}

impl<'a> SyncHandler<'a> {
    pub fn new(
        env: &'a Environment,
        robot: &'a Robot,
        runner: &'a dyn CommandRunner,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            env,
            robot,
            runner,
            workspace: workspace.into(),
        }
    }

    /// Workspace path relative to the remote user's home.
    pub fn remote_workspace(&self) -> String {
        format!("{}/{}", self.env.settings.remote_root, self.workspace)
    }

    /// Local trees to copy, paired with their path inside the workspace.
    ///
    /// Trees that do not exist locally are left out.
    pub fn sources(&self, descriptor: &ComponentDescriptor) -> Vec<(PathBuf, String)> {
        let mut repos = BTreeSet::new();
        repos.insert(descriptor.name.repo.clone());
        repos.extend(descriptor.spec.src.iter().cloned());

        let mut sources: Vec<(PathBuf, String)> = repos
            .into_iter()
            .map(|repo| (self.env.repo_path(&repo), format!("{}/{}", SRC_DIR, repo)))
            .collect();
        for dir in [GENERIC_STATIC_DATA_DIR, CONFIG_DIR] {
            sources.push((self.env.root.join(dir), dir.to_string()));
        }
        sources.retain(|(local, _)| local.is_dir());
        sources
    }

    /// `rsync -az --delete -e <ssh> <local>/ user@ip:<workspace>/<relative>`
    pub fn rsync_command(&self, host: &RemoteHost, local: &Path, relative: &str) -> CommandLine {
        let session = SshSession::new(host);
        CommandLine::new("rsync")
            .args(["-az", "--delete"])
            .opt("-e", session.rsync_shell())
            .arg(format!("{}/", local.display()))
            .arg(format!(
                "{}:{}/{}/",
                host.destination(),
                self.remote_workspace(),
                relative
            ))
    }

    pub fn sync(&self, descriptor: &ComponentDescriptor) -> Result<()> {
        let Some(host) = &self.robot.remote else {
            info!("Robot is localhost, nothing to synchronise");
            return Ok(());
        };

        println!(
            "🔁 Synchronising '{}' to '{}' ({})",
            descriptor.full_name(),
            self.robot.name,
            self.remote_workspace()
        );

        let session = SshSession::new(host);
        let workspace = self.remote_workspace();
        let src = format!("{}/{}", workspace, SRC_DIR);
        self.runner
            .run_captured(&session.command(["mkdir", "-p", workspace.as_str(), src.as_str()], false))?;

        for (local, relative) in self.sources(descriptor) {
            println!("  - {}", relative);
            self.runner
                .run_streamed(&self.rsync_command(host, &local, &relative))?;
        }
        Ok(())
    }
}

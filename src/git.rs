//! # Repository Handles
//!
//! A [`RepositoryHandle`] wraps a single git working copy and exposes the
//! queries and guards the deploy workflow needs. Everything is asked of git
//! on demand; nothing is cached between calls, since a `fetch` or a commit
//! changes the answers.
//!
//! The trait is split into a few primitive queries, which an implementation
//! must provide, and the guard methods (`assert_*`, `last_tag`,
//! `is_pointing_at_tag`) which are written once on top of them. This keeps
//! the guard semantics identical between the real [`GitRepository`] and the
//! in-memory handles used in tests.
//!
//! [`GitRepository`] shells out to the system `git` binary, which
//! automatically picks up SSH keys, credential helpers and any other
//! authentication configured for the user.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::process::{check, CommandLine, CommandRunner, OutputMode, SystemRunner};

/// A tag reachable from a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    /// Commit the tag points at (peeled for annotated tags).
    pub commit: String,
    /// Committer timestamp of that commit, in seconds since the epoch.
    pub timestamp: i64,
}

/// Trait for git operations on a single working copy - allows mocking in tests
pub trait RepositoryHandle {
    /// Repository name, the last component of its path.
    fn name(&self) -> &str;

    /// URL of the `origin` remote.
    fn remote_url(&self) -> &str;

    /// Root of the working copy.
    fn path(&self) -> &Path;

    /// Updates the remote-tracking refs and tags from `origin`.
    fn fetch(&self) -> Result<()>;

    /// Name of the checked-out branch, `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>>;

    /// Whether tracked files have staged or unstaged modifications.
    fn has_local_changes(&self) -> Result<bool>;

    /// Commit at the tip of the local branch.
    fn branch_tip(&self, branch: &str) -> Result<String>;

    /// Commit at the tip of `origin/<branch>`, `None` if it does not exist.
    fn remote_branch_tip(&self, branch: &str) -> Result<Option<String>>;

    /// Names of every tag in the repository, reachable or not.
    fn all_tags(&self) -> Result<Vec<String>>;

    /// Tags reachable from the branch tip, in any order.
    fn tags_merged_into(&self, branch: &str) -> Result<Vec<Tag>>;

    /// Stages everything and commits it.
    fn create_commit(&self, message: &str) -> Result<()>;

    /// Creates a lightweight tag at HEAD.
    fn create_tag(&self, name: &str) -> Result<()>;

    /// Pushes the branch and then all tags to `origin`.
    fn push(&self, branch: &str) -> Result<()>;

    fn assert_on_deploy_branch(&self, branch: &str) -> Result<()> {
        match self.current_branch()? {
            None => Err(Error::DetachedHead {
                repo: self.name().to_string(),
            }),
            Some(actual) if actual != branch => Err(Error::WrongBranch {
                repo: self.name().to_string(),
                expected: branch.to_string(),
                actual,
            }),
            Some(_) => Ok(()),
        }
    }

    fn assert_no_local_changes(&self) -> Result<()> {
        if self.has_local_changes()? {
            return Err(Error::UncommittedChanges {
                repo: self.name().to_string(),
            });
        }
        Ok(())
    }

    fn assert_branch_up_to_date(&self, branch: &str) -> Result<()> {
        let local = self.branch_tip(branch)?;
        match self.remote_branch_tip(branch)? {
            Some(remote) if remote == local => Ok(()),
            _ => Err(Error::BranchNotUpToDate {
                repo: self.name().to_string(),
                branch: branch.to_string(),
            }),
        }
    }

    /// Tags reachable from the branch, oldest commit first.
    fn list_tags_on_branch(&self, branch: &str) -> Result<Vec<Tag>> {
        if self.all_tags()?.is_empty() {
            return Err(Error::NoTags {
                repo: self.name().to_string(),
            });
        }

        let mut tags = self.tags_merged_into(branch)?;
        if tags.is_empty() {
            return Err(Error::NoTagsOnBranch {
                repo: self.name().to_string(),
                branch: branch.to_string(),
            });
        }

        // Stable, so tags on the same commit keep their listing order.
        tags.sort_by_key(|tag| tag.timestamp);
        Ok(tags)
    }

    fn last_tag(&self, branch: &str) -> Result<Tag> {
        self.list_tags_on_branch(branch)?
            .pop()
            .ok_or_else(|| Error::NoTagsOnBranch {
                repo: self.name().to_string(),
                branch: branch.to_string(),
            })
    }

    fn is_pointing_at_tag(&self, branch: &str) -> Result<bool> {
        let tip = self.branch_tip(branch)?;
        Ok(self.last_tag(branch)?.commit == tip)
    }

    /// Guard for dependency repositories, which must already be released.
    fn assert_pointing_at_tag(&self, branch: &str) -> Result<()> {
        if !self.is_pointing_at_tag(branch)? {
            return Err(Error::NotPointingAtTag {
                repo: self.name().to_string(),
            });
        }
        Ok(())
    }

    /// Guard for the repository being deployed, which must have unreleased work.
    fn assert_not_pointing_at_tag(&self, branch: &str) -> Result<()> {
        if self.is_pointing_at_tag(branch)? {
            return Err(Error::PointingAtTag {
                repo: self.name().to_string(),
            });
        }
        Ok(())
    }
}

/// Opens sibling repositories by name.
pub trait RepositoryProvider {
    fn open(&self, name: &str) -> Result<Box<dyn RepositoryHandle>>;
}

/// A working copy operated on through the `git` command line.
pub struct GitRepository<R: CommandRunner = SystemRunner> {
    path: PathBuf,
    name: String,
    remote_url: String,
    runner: R,
}

impl GitRepository<SystemRunner> {
    /// Opens the working copy at `path` using the system `git`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(path, SystemRunner)
    }
}

impl<R: CommandRunner> GitRepository<R> {
    /// Opens the working copy at `path` with a custom runner.
    ///
    /// Fails unless `path` is the root of a git working copy with an
    /// `origin` remote.
    pub fn open_with(path: impl Into<PathBuf>, runner: R) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let not_found = |message: String| Error::RepositoryNotFound {
            repo: name.clone(),
            message,
        };

        if !path.is_dir() {
            return Err(not_found(format!(
                "'{}' does not exist. Check if it exists in the src folder.",
                path.display()
            )));
        }

        let probe = CommandLine::new("git")
            .arg("-C")
            .path_arg(&path)
            .args(["rev-parse", "--is-inside-work-tree"]);
        let output = runner.execute(&probe, OutputMode::Capture)?;
        if !output.is_success() || output.stdout.trim() != "true" {
            return Err(not_found(output.stderr.trim().to_string()));
        }

        let remote = CommandLine::new("git")
            .arg("-C")
            .path_arg(&path)
            .args(["remote", "get-url", "origin"]);
        let output = runner.execute(&remote, OutputMode::Capture)?;
        if !output.is_success() {
            return Err(not_found("no 'origin' remote configured".to_string()));
        }
        let remote_url = output.stdout.trim().to_string();

        debug!("Opened repository '{}' ({})", name, remote_url);
        Ok(Self {
            path,
            name,
            remote_url,
            runner,
        })
    }

    fn git(&self) -> CommandLine {
        CommandLine::new("git").arg("-C").path_arg(&self.path)
    }

    fn run(&self, cmd: CommandLine) -> Result<String> {
        self.runner.run_captured(&cmd)
    }

    /// Runs a query where exit code 1 means "no answer".
    fn query_optional(&self, cmd: CommandLine) -> Result<Option<String>> {
        let output = self.runner.execute(&cmd, OutputMode::Capture)?;
        if output.code == Some(1) {
            return Ok(None);
        }
        let output = check(&cmd, output)?;
        Ok(Some(output.stdout.trim().to_string()))
    }
}

impl<R: CommandRunner> RepositoryHandle for GitRepository<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn remote_url(&self) -> &str {
        &self.remote_url
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn fetch(&self) -> Result<()> {
        info!("Fetching repository '{}'", self.name);
        self.run(self.git().args(["fetch", "--tags", "origin"]))?;
        Ok(())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        self.query_optional(self.git().args(["symbolic-ref", "--quiet", "--short", "HEAD"]))
    }

    fn has_local_changes(&self) -> Result<bool> {
        let status = self.run(
            self.git()
                .args(["status", "--porcelain", "--untracked-files=no"]),
        )?;
        Ok(!status.trim().is_empty())
    }

    fn branch_tip(&self, branch: &str) -> Result<String> {
        let tip = self.run(
            self.git()
                .args(["rev-parse", "--verify"])
                .arg(format!("refs/heads/{}^{{commit}}", branch)),
        )?;
        Ok(tip.trim().to_string())
    }

    fn remote_branch_tip(&self, branch: &str) -> Result<Option<String>> {
        self.query_optional(
            self.git()
                .args(["rev-parse", "--verify", "--quiet"])
                .arg(format!("refs/remotes/origin/{}^{{commit}}", branch)),
        )
    }

    fn all_tags(&self) -> Result<Vec<String>> {
        let output = self.run(self.git().args(["tag", "--list"]))?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    fn tags_merged_into(&self, branch: &str) -> Result<Vec<Tag>> {
        let names = self.run(
            self.git()
                .arg("for-each-ref")
                .arg(format!("--merged=refs/heads/{}", branch))
                .arg("--format=%(refname:short)")
                .arg("refs/tags"),
        )?;

        let mut tags = Vec::new();
        for name in names.lines().map(str::trim).filter(|n| !n.is_empty()) {
            let info = self.run(
                self.git()
                    .args(["log", "-1", "--format=%H %ct"])
                    .arg(format!("refs/tags/{}", name)),
            )?;
            let mut parts = info.split_whitespace();
            let (Some(commit), Some(timestamp)) = (parts.next(), parts.next()) else {
                continue;
            };
            tags.push(Tag {
                name: name.to_string(),
                commit: commit.to_string(),
                timestamp: timestamp.parse().unwrap_or_default(),
            });
        }
        Ok(tags)
    }

    fn create_commit(&self, message: &str) -> Result<()> {
        println!("    📩 Creating commit with message: {}", message);
        self.run(self.git().args(["add", "--all"]))?;
        self.run(self.git().args(["commit", "-m", message]))?;
        Ok(())
    }

    fn create_tag(&self, name: &str) -> Result<()> {
        println!("    🏷  Creating tag: {}", name);
        self.run(self.git().args(["tag", name]))?;
        Ok(())
    }

    fn push(&self, branch: &str) -> Result<()> {
        println!("    🚀 Pushing repository...");
        self.run(self.git().args(["push", "origin", branch]))?;
        self.run(self.git().args(["push", "origin", "--tags"]))?;
        Ok(())
    }
}

/// Opens repositories under the environment's `src/` directory.
pub struct WorkspaceRepositories {
    src_dir: PathBuf,
}

impl WorkspaceRepositories {
    pub fn new(src_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
        }
    }
}

impl RepositoryProvider for WorkspaceRepositories {
    fn open(&self, name: &str) -> Result<Box<dyn RepositoryHandle>> {
        Ok(Box::new(GitRepository::open(self.src_dir.join(name))?))
    }
}

/// Returns `git config user.email`.
pub fn user_email(runner: &dyn CommandRunner) -> Result<String> {
    let cmd = CommandLine::new("git").args(["config", "user.email"]);
    let output = runner.execute(&cmd, OutputMode::Capture)?;
    let email = output.stdout.trim();
    if !output.is_success() || email.is_empty() {
        return Err(Error::GitEmailNotSet);
    }
    Ok(email.to_string())
}

/// Default workspace name: the local part of the git email.
pub fn default_workspace_name(runner: &dyn CommandRunner) -> Result<String> {
    let email = user_email(runner)?;
    Ok(email.split('@').next().unwrap_or(&email).to_string())
}

//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = EnvFixture::new().with_settings("workspace: alice\n");
//!     fixture.command().args(["sync", "--robot", "localhost"]);
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::EnvFixture;
}

/// A temporary development environment root.
///
/// Repositories live under `src/`, each with a `manifest.yaml` and its
/// components under `components/<name>/`.
pub struct EnvFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl EnvFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Writes `robotdev.yaml`.
    pub fn with_settings(self, content: &str) -> Self {
        self.with_file("robotdev.yaml", content)
    }

    /// Writes `robots.yaml`.
    pub fn with_robots(self, content: &str) -> Self {
        self.with_file("robots.yaml", content)
    }

    /// Writes `src/<repo>/manifest.yaml`.
    pub fn with_repo(self, repo: &str, version: &str) -> Self {
        self.with_file(
            &format!("src/{}/manifest.yaml", repo),
            &format!("version: '{}'\n", version),
        )
    }

    /// Writes a component descriptor and one dockerfile per platform.
    pub fn with_component(self, repo: &str, name: &str, descriptor: &str, platforms: &[&str]) -> Self {
        let folder = format!("src/{}/components/{}", repo, name);
        let mut fixture = self.with_file(&format!("{}/{}.yaml", folder, name), descriptor);
        for platform in platforms {
            fixture = fixture.with_file(
                &format!("{}/dockerfiles/{}.dockerfile", folder, platform),
                "FROM ubuntu:22.04\n",
            );
        }
        fixture
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A `robotdev` command pointed at this environment.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("robotdev");
        cmd.env("ROBOTDEV_ENV", self.path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("DOCKER_HOST");
        cmd
    }
}

impl Default for EnvFixture {
    fn default() -> Self {
        Self::new()
    }
}

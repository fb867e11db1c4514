//! # Environment Settings
//!
//! This module defines the optional `robotdev.yaml` file at the root of the
//! development environment, and the YAML loading helper every other
//! descriptor module uses.
//!
//! ## `robotdev.yaml`
//!
//! Every key is optional:
//!
//! ```yaml
//! registry: registry.local:5000   # where images are pushed
//! deploy_branch: main             # branch releases are cut from
//! namespace: robotdev             # image name prefix
//! workspace: alice                # remote workspace name
//! remote_root: robotdev_ws        # remote directory holding workspaces
//! ```
//!
//! When `workspace` is absent it is derived from the local part of
//! `git config user.email` at the point it is first needed.
//!
//! ## Loading
//!
//! [`load_yaml`] reads a file and deserializes it in a single pass. A missing
//! file is reported through a caller-supplied error so each artifact gets its
//! own named error; malformed content and type mismatches become
//! [`Error::ConfigParse`] naming the file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_DEPLOY_BRANCH, DEFAULT_IMAGE_NAMESPACE, DEFAULT_REGISTRY, DEFAULT_REMOTE_ROOT,
    SETTINGS_FILENAME, SRC_DIR,
};
use crate::error::{Error, Result};

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub registry: String,
    pub deploy_branch: String,
    pub namespace: String,
    pub workspace: Option<String>,
    pub remote_root: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            deploy_branch: DEFAULT_DEPLOY_BRANCH.to_string(),
            namespace: DEFAULT_IMAGE_NAMESPACE.to_string(),
            workspace: None,
            remote_root: DEFAULT_REMOTE_ROOT.to_string(),
        }
    }
}

/// A development environment root and its settings.
#[derive(Debug, Clone)]
pub struct Environment {
    pub root: PathBuf,
    pub settings: Settings,
}

impl Environment {
    /// Loads `robotdev.yaml` from `root` if it exists.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(SETTINGS_FILENAME);
        let settings = match fs::read_to_string(&path) {
            Ok(content) => parse_yaml(&path, &content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Self { root, settings })
    }

    /// Directory holding every repository working copy.
    pub fn src_dir(&self) -> PathBuf {
        self.root.join(SRC_DIR)
    }

    /// Working copy of the named repository.
    pub fn repo_path(&self, repo: &str) -> PathBuf {
        self.src_dir().join(repo)
    }
}

/// Parses YAML text into `T`, attributing errors to `path`.
pub fn parse_yaml<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    // An empty document means "all defaults".
    let content = if content.trim().is_empty() { "{}" } else { content };
    serde_yaml::from_str(content).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Reads and parses a YAML file, mapping "not found" to `missing()`.
pub fn load_yaml<T, F>(path: &Path, missing: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> Error,
{
    match fs::read_to_string(path) {
        Ok(content) => parse_yaml(path, &content),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(missing()),
        Err(e) => Err(Error::Io(e)),
    }
}

//! # Error Handling
//!
//! This module defines the centralized error type for `robotdev`. It uses the
//! `thiserror` library to describe every anticipated failure mode with a
//! message that can be shown to the operator as-is.
//!
//! ## Taxonomy
//!
//! The variants fall into a handful of groups, reported by [`Error::kind`]:
//!
//! - **Configuration** errors: missing or malformed descriptor, manifest,
//!   robot inventory or package files, and malformed component names.
//! - **Git state** errors: dirty trees, wrong branches, branches behind their
//!   remote, missing tags and tag/manifest mismatches.
//! - **Version** errors: malformed version strings and versions that do not
//!   follow the last release.
//! - **External tool** errors: non-zero exits from `git`, `docker`, `ssh`
//!   or `rsync`, with the tool's stderr attached.
//! - **Platform** errors: a component without a build recipe for the
//!   requested platform.
//!
//! Configuration and git-state errors are never retried. The binary turns
//! whichever error reaches `main` into a single report and a non-zero exit.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for robotdev operations
#[derive(Error, Debug)]
pub enum Error {
    /// A YAML or settings file could not be parsed into its typed form.
    #[error("Configuration parsing error in {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// A component name was not of the form `<repo>/<component>`.
    #[error("Invalid component name '{name}'. It must have the format '<repo>/<component>'.")]
    InvalidComponentName { name: String },

    /// The component descriptor file does not exist.
    #[error("Component descriptor file '{}' not found.", path.display())]
    ComponentDescriptorNotFound { path: PathBuf },

    /// The repository manifest file does not exist.
    #[error("Manifest file '{}' not found.", path.display())]
    ManifestNotFound { path: PathBuf },

    /// The repository manifest has no `version` key.
    #[error("Manifest file '{}' does not define a version.", path.display())]
    ManifestMissingVersion { path: PathBuf },

    /// The robot inventory file does not exist.
    #[error("Robots file '{}' not found.", path.display())]
    RobotsFileNotFound { path: PathBuf },

    /// The requested robot is not listed in the inventory.
    #[error("Robot '{name}' not found in file '{}'.", path.display())]
    RobotNotFound { name: String, path: PathBuf },

    /// The current git user has no ROS domain assigned.
    #[error("'{email}' not defined in '{}'.", path.display())]
    RosDomainNotDefined { email: String, path: PathBuf },

    /// `git config user.email` is not set.
    #[error("Can not get git email, make sure you already defined it (git config user.email).")]
    GitEmailNotSet,

    /// A package metadata file has no `<version>` element to rewrite.
    #[error("Package file '{}' has no <version> element.", path.display())]
    PackageVersionMissing { path: PathBuf },

    /// The named repository is not a git working copy with an `origin` remote.
    #[error("Repository '{repo}' not found or not a git repository with an 'origin' remote: {message}")]
    RepositoryNotFound { repo: String, message: String },

    /// HEAD is not attached to a branch.
    #[error("Repository '{repo}' is detached.")]
    DetachedHead { repo: String },

    /// HEAD is attached to a branch other than the deploy branch.
    #[error("Repository '{repo}' not in branch '{expected}' (currently on '{actual}').")]
    WrongBranch {
        repo: String,
        expected: String,
        actual: String,
    },

    /// The working tree has uncommitted modifications.
    #[error("Repository '{repo}' has uncommitted changes.")]
    UncommittedChanges { repo: String },

    /// The local branch tip is not the fetched remote tip.
    #[error("Branch '{branch}' of repo '{repo}' not updated with the remote.")]
    BranchNotUpToDate { repo: String, branch: String },

    /// The repository has no tags at all.
    #[error("Repository '{repo}' does not have tags.")]
    NoTags { repo: String },

    /// None of the repository's tags are reachable from the branch.
    #[error("Repository '{repo}' does not have tags in branch '{branch}'.")]
    NoTagsOnBranch { repo: String, branch: String },

    /// The manifest version and the latest tag disagree.
    #[error("Repository '{repo}' manifest version '{manifest}' does not match its last tag '{tag}'.")]
    TagManifestMismatch {
        repo: String,
        manifest: String,
        tag: String,
    },

    /// The branch tip is already the last release.
    #[error("Repository '{repo}' pointing to a tag.")]
    PointingAtTag { repo: String },

    /// The branch tip has commits after the last release.
    #[error("Repository '{repo}' not pointing to a tag.")]
    NotPointingAtTag { repo: String },

    /// A version string did not match `MAJOR.MINOR` or `MAJOR.MINOR.beta`.
    #[error("Invalid version '{version}'. Expected 'MAJOR.MINOR' or 'MAJOR.MINOR.beta'.")]
    InvalidVersion { version: String },

    /// A candidate version is not a valid successor of the last release.
    #[error("Version '{candidate}' does not follow '{last}'. Valid options: {}", allowed.join(", "))]
    VersionOrder {
        last: String,
        candidate: String,
        allowed: Vec<String>,
    },

    /// An external tool exited with a non-zero status.
    #[error("{tool} command failed ({}): {command}{}", code.map(|c| format!("exit code {}", c)).unwrap_or_else(|| "terminated by signal".to_string()), if stderr.is_empty() { String::new() } else { format!("\n{}", stderr.trim_end()) })]
    ToolFailed {
        tool: String,
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// An external tool could not be started at all.
    #[error("Could not execute {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The component has no dockerfile for the requested platform.
    #[error("Component '{component}' is not supported on platform '{platform}' (missing '{}').", dockerfile.display())]
    UnsupportedPlatform {
        component: String,
        platform: String,
        dockerfile: PathBuf,
    },

    /// The operator declined to continue.
    #[error("Deploy aborted: {reason}")]
    DeployAborted { reason: String },

    /// Some components failed to build or push.
    #[error("Image operations failed for: {}", components.join(", "))]
    ImageOperationsFailed { components: Vec<String> },

    /// A container with the expected name runs a different image.
    #[error("Container '{container}' already running another version of the image: '{running}'.")]
    ContainerImageMismatch { container: String, running: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// The taxonomy group this error belongs to, used in the error report.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConfigParse { .. }
            | Error::InvalidComponentName { .. }
            | Error::ComponentDescriptorNotFound { .. }
            | Error::ManifestNotFound { .. }
            | Error::ManifestMissingVersion { .. }
            | Error::RobotsFileNotFound { .. }
            | Error::RobotNotFound { .. }
            | Error::RosDomainNotDefined { .. }
            | Error::GitEmailNotSet
            | Error::PackageVersionMissing { .. } => "ConfigurationError",
            Error::RepositoryNotFound { .. }
            | Error::DetachedHead { .. }
            | Error::WrongBranch { .. }
            | Error::UncommittedChanges { .. }
            | Error::BranchNotUpToDate { .. }
            | Error::NoTags { .. }
            | Error::NoTagsOnBranch { .. }
            | Error::TagManifestMismatch { .. }
            | Error::PointingAtTag { .. }
            | Error::NotPointingAtTag { .. } => "GitStateError",
            Error::InvalidVersion { .. } | Error::VersionOrder { .. } => "VersionError",
            Error::ToolFailed { .. } | Error::ToolSpawn { .. } => "ExternalToolError",
            Error::UnsupportedPlatform { .. } => "PlatformSupportError",
            Error::DeployAborted { .. } => "DeployAborted",
            Error::ImageOperationsFailed { .. } => "ImageError",
            Error::ContainerImageMismatch { .. } => "RunError",
            Error::Io(_) => "IoError",
            Error::Yaml(_) | Error::Json(_) => "SerializationError",
            Error::Regex(_) => "InternalError",
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

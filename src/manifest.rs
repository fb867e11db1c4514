//! # Repository Manifest
//!
//! Each repository carries a `manifest.yaml` at its root declaring the
//! current release version. After a deploy it also pins the version of every
//! dependency repository:
//!
//! ```yaml
//! version: 1.3.beta
//! dependencies:
//!   common_msgs: "2.1"
//!   drivers: "0.4"
//! ```
//!
//! Keys this tool does not know about are kept as-is when the manifest is
//! rewritten.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::load_yaml;
use crate::defaults::MANIFEST_FILENAME;
use crate::error::{Error, Result};
use crate::version::{parse_version, ReleaseVersion};

/// The typed contents of `manifest.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoManifest {
    #[serde(
        default,
        deserialize_with = "version_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    /// Dependency repository name to the tag it was released against.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

/// Accepts `version` written as a string or, unquoted, as a YAML number.
///
/// Unquoted numbers lose trailing zeros (`1.10` reads as `1.1`), so
/// manifests written by this tool always quote the value.
fn version_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "invalid type for version: {:?}, expected a string",
            other
        ))),
    }
}

/// A manifest together with the file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFile {
    pub path: PathBuf,
    pub manifest: RepoManifest,
}

impl ManifestFile {
    /// Path of the manifest inside a repository.
    pub fn path_in(repo_path: &Path) -> PathBuf {
        repo_path.join(MANIFEST_FILENAME)
    }

    /// Loads the manifest of the repository at `repo_path`.
    pub fn load(repo_path: &Path) -> Result<Self> {
        let path = Self::path_in(repo_path);
        let manifest: RepoManifest = load_yaml(&path, || Error::ManifestNotFound {
            path: path.clone(),
        })?;
        Ok(Self { path, manifest })
    }

    /// The declared version string, which must be present.
    pub fn version(&self) -> Result<&str> {
        self.manifest
            .version
            .as_deref()
            .ok_or_else(|| Error::ManifestMissingVersion {
                path: self.path.clone(),
            })
    }

    /// The declared version, parsed.
    pub fn release_version(&self) -> Result<ReleaseVersion> {
        parse_version(self.version()?)
    }

    /// Records a new release and its pinned dependency versions.
    pub fn set_release(&mut self, version: &ReleaseVersion, dependencies: BTreeMap<String, String>) {
        self.manifest.version = Some(version.to_string());
        self.manifest.dependencies = dependencies;
    }

    /// The manifest as YAML, as [`save`](Self::save) writes it.
    pub fn render(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.manifest)?)
    }

    /// Writes the manifest back to disk.
    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, self.render()?)?;
        Ok(())
    }

    /// The manifest as a single-line JSON document, for build arguments.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.manifest)?)
    }
}

//! Robot host inventory.
//!
//! Commands target either `localhost` or a robot listed in `robots.yaml` at
//! the environment root:
//!
//! ```yaml
//! gary-01:
//!   platform: jetsonorinagx
//!   ip: 192.168.1.40
//!   port: 22
//!   user: gary
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::{load_yaml, Environment};
use crate::defaults::{LOCALHOST, LOCALHOST_DEFAULT_PLATFORM, ROBOTS_FILENAME};
use crate::error::{Error, Result};

/// Connection details of a remote robot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteHost {
    pub platform: String,
    pub ip: String,
    pub port: u16,
    pub user: String,
}

impl RemoteHost {
    /// `user@ip`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.ip)
    }

    /// `ssh://user@ip[:port]`, for `DOCKER_HOST`.
    pub fn docker_host(&self) -> String {
        if self.port == 0 || self.port == 22 {
            format!("ssh://{}", self.destination())
        } else {
            format!("ssh://{}:{}", self.destination(), self.port)
        }
    }

    /// Home directory of the remote user.
    pub fn home(&self) -> PathBuf {
        if self.user == "root" {
            PathBuf::from("/root")
        } else {
            Path::new("/home").join(&self.user)
        }
    }
}

/// A machine commands are executed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Robot {
    pub name: String,
    /// `None` for `localhost`.
    pub remote: Option<RemoteHost>,
}

impl Robot {
    pub fn localhost() -> Self {
        Self {
            name: LOCALHOST.to_string(),
            remote: None,
        }
    }

    /// Resolves `name` to `localhost` or an entry of `robots.yaml`.
    pub fn resolve(env: &Environment, name: &str) -> Result<Self> {
        if name == LOCALHOST {
            return Ok(Self::localhost());
        }

        let path = env.root.join(ROBOTS_FILENAME);
        let mut robots: BTreeMap<String, RemoteHost> =
            load_yaml(&path, || Error::RobotsFileNotFound { path: path.clone() })?;
        let remote = robots.remove(name).ok_or_else(|| Error::RobotNotFound {
            name: name.to_string(),
            path: path.clone(),
        })?;

        Ok(Self {
            name: name.to_string(),
            remote: Some(remote),
        })
    }

    pub fn is_local(&self) -> bool {
        self.remote.is_none()
    }

    pub fn platform(&self) -> &str {
        self.remote
            .as_ref()
            .map(|r| r.platform.as_str())
            .unwrap_or(LOCALHOST_DEFAULT_PLATFORM)
    }

    /// The environment root as seen from this robot.
    ///
    /// Locally that is the environment root itself. A remote robot holds one
    /// workspace per developer under `~/<remote_root>/<workspace>`.
    pub fn host_env_root(&self, env: &Environment, workspace: &str) -> PathBuf {
        match &self.remote {
            None => env.root.clone(),
            Some(remote) => remote
                .home()
                .join(&env.settings.remote_root)
                .join(workspace),
        }
    }
}

/// Names of every robot in `robots.yaml`, plus `localhost` first.
///
/// A missing inventory only offers `localhost`.
pub fn known_hosts(env: &Environment) -> Result<Vec<String>> {
    let path = env.root.join(ROBOTS_FILENAME);
    let mut hosts = vec![LOCALHOST.to_string()];
    if path.is_file() {
        let robots: BTreeMap<String, RemoteHost> =
            load_yaml(&path, || Error::RobotsFileNotFound { path: path.clone() })?;
        hosts.extend(robots.into_keys());
    }
    Ok(hosts)
}

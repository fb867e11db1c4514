//! Default values and fixed names for the development environment.
//!
//! This module provides centralized file names, directory names and
//! defaults used across commands, ensuring consistency and avoiding
//! duplication.

use std::path::PathBuf;

/// Branch releases are cut from.
pub const DEFAULT_DEPLOY_BRANCH: &str = "main";

/// Registry images are pushed to.
pub const DEFAULT_REGISTRY: &str = "registry.local:5000";

/// Namespace prefixed to every image name.
pub const DEFAULT_IMAGE_NAMESPACE: &str = "robotdev";

/// Remote directory, relative to the remote user's home, holding workspaces.
pub const DEFAULT_REMOTE_ROOT: &str = "robotdev_ws";

/// Host name meaning "this machine".
pub const LOCALHOST: &str = "localhost";

/// Platform used when running on `localhost`.
pub const LOCALHOST_DEFAULT_PLATFORM: &str = "x86_64";

/// Platform that requires the nvidia container runtime.
pub const NVIDIA_PLATFORM: &str = "jetsonorinagx";

/// `XDG_RUNTIME_DIR` assumed on robots, and locally when it is unset.
pub const DEFAULT_XDG_RUNTIME_DIR: &str = "/run/user/1000";

pub const SETTINGS_FILENAME: &str = "robotdev.yaml";
pub const ROBOTS_FILENAME: &str = "robots.yaml";
pub const ROS_DOMAINS_FILENAME: &str = "users_ros_domains.yaml";
pub const MANIFEST_FILENAME: &str = "manifest.yaml";
pub const PACKAGE_FILENAME: &str = "package.xml";

pub const SRC_DIR: &str = "src";
pub const COMPONENTS_DIR: &str = "components";
pub const DOCKERFILES_DIR: &str = "dockerfiles";
pub const PROD_DOCKERFILE: &str = "prod.dockerfile";
pub const CONFIG_DIR: &str = "config";
pub const COMMANDS_DIR: &str = "commands";
pub const BUILD_DIR: &str = "build";
pub const GENERIC_STATIC_DATA_DIR: &str = "generic_static_data";
pub const GENERIC_PERSISTENT_DATA_DIR: &str = "generic_persistent_data";
pub const COMPONENT_STATIC_DATA_DIR: &str = "component_static_data";
pub const COMPONENT_PERSISTENT_DATA_DIR: &str = "component_persistent_data";
/// Env files live in `config/env/` and in a component's `config/`.
pub const ENV_DIR: &str = "env";
pub const ENV_FILE: &str = "env";

/// Paths inside the container.
pub mod container {
    pub const ROBOT_NAME: &str = "gary";
    pub const ROBOT_BASE_PATH: &str = "/gary";
    pub const ROBOT_SRC_PATH: &str = "/gary/src";
    pub const ROBOT_BUILD_PATH: &str = "/gary/build";
    pub const ROBOT_CONFIG_PATH: &str = "/gary/config";
    pub const ROBOT_COMMANDS_PATH: &str = "/gary/commands";
    pub const ROBOT_GENERIC_STATIC_DATA_PATH: &str = "/gary/generic_static_data";
    pub const ROBOT_GENERIC_PERSISTENT_DATA_PATH: &str = "/gary/generic_persistent_data";
    pub const ROBOT_COMPONENT_STATIC_DATA_PATH: &str = "/gary/component_static_data";
    pub const ROBOT_COMPONENT_PERSISTENT_DATA_PATH: &str = "/gary/component_persistent_data";
}

/// Returns the default development environment root.
///
/// Uses `~/robotdev`, falling back to `robotdev` in the current directory if
/// the home directory cannot be determined.
///
/// This can be overridden by the `--env` CLI flag or the `ROBOTDEV_ENV`
/// environment variable.
pub fn default_env_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("robotdev"))
        .unwrap_or_else(|| PathBuf::from("robotdev"))
}

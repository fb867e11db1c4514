//! # Component Descriptors
//!
//! A component is an independently buildable and runnable container unit
//! that belongs to a repository. It is named `<repo>/<component>` and lives
//! at `src/<repo>/components/<component>/`:
//!
//! ```text
//! components/planner/
//!   planner.yaml                     descriptor
//!   dockerfiles/x86_64.dockerfile    one recipe per supported platform
//!   dockerfiles/prod.dockerfile      optional production recipe
//!   component_static_data/
//! ```
//!
//! The descriptor file is a YAML mapping in which every key is optional:
//!
//! ```yaml
//! src: [common_msgs, drivers]   # repositories mounted into the container
//! ros_pkgs: [planner_core]      # packages built inside the container
//! display: true                 # X11 access
//! sound: false                  # ALSA / PulseAudio access
//! devices: false                # /dev and udev
//! system: false                 # privileged container
//! docker: false                 # docker socket
//! config: true                  # mount the developer config folder
//! ```
//!
//! Resolution combines the descriptor with the owning repository's manifest
//! into a [`ComponentDescriptor`]. Each missing input has its own error, and
//! a missing platform recipe is reported as [`Error::UnsupportedPlatform`]
//! so batch callers can skip the component instead of aborting.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{load_yaml, Environment};
use crate::defaults::{
    container, BUILD_DIR, COMPONENTS_DIR, COMPONENT_PERSISTENT_DATA_DIR,
    COMPONENT_STATIC_DATA_DIR, DOCKERFILES_DIR, GENERIC_PERSISTENT_DATA_DIR,
    GENERIC_STATIC_DATA_DIR, PROD_DOCKERFILE, SRC_DIR,
};
use crate::error::{Error, Result};
use crate::git::RepositoryHandle;
use crate::manifest::ManifestFile;
use crate::version::dev_version;

/// The two image variants of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    /// Fast iteration image that mounts live source.
    Dev,
    /// Self-contained, metadata-stamped image.
    Prod,
}

impl std::fmt::Display for BuildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildType::Dev => f.write_str("dev"),
            BuildType::Prod => f.write_str("prod"),
        }
    }
}

/// The typed contents of a component descriptor file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSpec {
    pub src: Vec<String>,
    pub ros_pkgs: Vec<String>,
    pub display: bool,
    pub sound: bool,
    pub devices: bool,
    pub system: bool,
    pub docker: bool,
    pub config: bool,
}

impl ComponentSpec {
    /// Loads `<folder>/<name>.yaml`.
    pub fn load(folder: &Path, name: &str) -> Result<Self> {
        let path = descriptor_path(folder, name);
        load_yaml(&path, || Error::ComponentDescriptorNotFound { path: path.clone() })
    }
}

/// Path of the descriptor file inside a component folder.
pub fn descriptor_path(folder: &Path, name: &str) -> PathBuf {
    folder.join(format!("{}.yaml", name))
}

/// A validated `<repo>/<component>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentName {
    pub repo: String,
    pub component: String,
}

impl ComponentName {
    pub fn parse(full_name: &str) -> Result<Self> {
        let invalid = || Error::InvalidComponentName {
            name: full_name.to_string(),
        };
        let (repo, component) = full_name.split_once('/').ok_or_else(invalid)?;
        if !is_identifier(repo) || !is_identifier(component) {
            return Err(invalid());
        }
        Ok(Self {
            repo: repo.to_string(),
            component: component.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.repo, self.component)
    }
}

/// Letters, digits, `_`, `-` and `.`, not starting with `.`, so a name is
/// always a single directory below its parent.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// A bind mount of a host path into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

impl Volume {
    pub fn rw(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: false,
        }
    }

    pub fn ro(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            read_only: true,
            ..Self::rw(host, container)
        }
    }

    /// `host:container[:ro]`, as accepted by `docker run -v`.
    pub fn to_arg(&self) -> String {
        let mut arg = format!("{}:{}", self.host.display(), self.container);
        if self.read_only {
            arg.push_str(":ro");
        }
        arg
    }
}

/// A fully resolved component for one platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    pub name: ComponentName,
    pub platform: String,
    pub repo_path: PathBuf,
    /// The environment's `src/` tree, holding the repository and its
    /// source dependencies side by side.
    pub src_dir: PathBuf,
    pub folder_path: PathBuf,
    pub spec: ComponentSpec,
    pub dev_version: String,
    pub prod_version: String,
    pub dockerfile: PathBuf,
    pub prod_dockerfile: Option<PathBuf>,
    pub generic_prod_dockerfile: PathBuf,
    image_base: String,
}

impl ComponentDescriptor {
    pub fn full_name(&self) -> String {
        self.name.full_name()
    }

    pub fn version(&self, build_type: BuildType) -> &str {
        match build_type {
            BuildType::Dev => &self.dev_version,
            BuildType::Prod => &self.prod_version,
        }
    }

    /// `{namespace}/{repo-id}.{component}:{platform}.{version}`
    pub fn image_name(&self, build_type: BuildType) -> String {
        format!(
            "{}:{}.{}",
            self.image_base,
            self.platform,
            self.version(build_type)
        )
    }

    /// Whether the component ships its own production recipe.
    pub fn has_prod_recipe(&self) -> bool {
        self.prod_dockerfile.is_some()
    }

    /// The production recipe, falling back to the environment's generic one.
    pub fn production_dockerfile(&self) -> &Path {
        self.prod_dockerfile
            .as_deref()
            .unwrap_or(&self.generic_prod_dockerfile)
    }

    /// Container name used when running this component for `workspace`.
    pub fn container_name(&self, workspace: &str) -> String {
        format!("{}.{}", self.name.component, workspace)
    }

    /// The descriptor as a single-line JSON document, for build arguments.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.spec)?)
    }

    /// Container mounts, with host paths rooted at `host_env_root`.
    ///
    /// `host_env_root` is the environment root as seen by the machine running
    /// the container, which differs from the local root for remote robots.
    pub fn volumes(&self, host_env_root: &Path) -> Vec<Volume> {
        let repo = &self.name.repo;
        let component = &self.name.component;
        let host_repo = host_env_root.join(SRC_DIR).join(repo);
        let host_folder = host_repo.join(COMPONENTS_DIR).join(component);

        let mut volumes = vec![
            Volume::rw(
                host_env_root.join(BUILD_DIR).join(component),
                container::ROBOT_BUILD_PATH,
            ),
            Volume::ro(
                host_env_root.join(GENERIC_STATIC_DATA_DIR),
                container::ROBOT_GENERIC_STATIC_DATA_PATH,
            ),
            Volume::rw(
                host_env_root.join(GENERIC_PERSISTENT_DATA_DIR),
                container::ROBOT_GENERIC_PERSISTENT_DATA_PATH,
            ),
            Volume::ro(
                host_folder.join(COMPONENT_STATIC_DATA_DIR),
                container::ROBOT_COMPONENT_STATIC_DATA_PATH,
            ),
            Volume::rw(
                host_env_root
                    .join(COMPONENT_PERSISTENT_DATA_DIR)
                    .join(repo)
                    .join(component),
                container::ROBOT_COMPONENT_PERSISTENT_DATA_PATH,
            ),
        ];

        for src in &self.spec.src {
            volumes.push(Volume::ro(
                host_env_root.join(SRC_DIR).join(src),
                format!("{}/{}", container::ROBOT_SRC_PATH, src),
            ));
        }
        volumes
    }
}

/// Everything needed to resolve components for one platform.
#[derive(Debug, Clone)]
pub struct Resolver {
    src_dir: PathBuf,
    namespace: String,
    generic_prod_dockerfile: PathBuf,
    platform: String,
}

impl Resolver {
    pub fn new(env: &Environment, platform: &str) -> Self {
        Self {
            src_dir: env.src_dir(),
            namespace: env.settings.namespace.clone(),
            generic_prod_dockerfile: env.root.join(DOCKERFILES_DIR).join(PROD_DOCKERFILE),
            platform: platform.to_string(),
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Resolves `<repo>/<component>` from the environment's `src/` tree.
    pub fn resolve(&self, full_name: &str) -> Result<ComponentDescriptor> {
        let name = ComponentName::parse(full_name)?;
        let repo_path = self.src_dir.join(&name.repo);
        self.resolve_name(name, &repo_path)
    }

    /// Resolves a component of the repository checked out at `repo_path`.
    pub fn resolve_in_repo(&self, repo_path: &Path, component: &str) -> Result<ComponentDescriptor> {
        let repo = repo_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = ComponentName::parse(&format!("{}/{}", repo, component))?;
        self.resolve_name(name, repo_path)
    }

    /// Resolves with validation: the dev version is marked `.changes` when
    /// the component's repository is dirty or past its last tag.
    pub fn resolve_checked(
        &self,
        full_name: &str,
        repo: &dyn RepositoryHandle,
        branch: &str,
    ) -> Result<ComponentDescriptor> {
        let mut descriptor = self.resolve(full_name)?;
        let changes = repo.has_local_changes()? || !repo.is_pointing_at_tag(branch)?;
        descriptor.dev_version = dev_version(&descriptor.prod_version, changes);
        Ok(descriptor)
    }

    fn resolve_name(&self, name: ComponentName, repo_path: &Path) -> Result<ComponentDescriptor> {
        let folder_path = repo_path.join(COMPONENTS_DIR).join(&name.component);
        let spec = ComponentSpec::load(&folder_path, &name.component)?;
        let manifest = ManifestFile::load(repo_path)?;
        let prod_version = manifest.version()?.to_string();

        let dockerfiles = folder_path.join(DOCKERFILES_DIR);
        let dockerfile = dockerfiles.join(format!("{}.dockerfile", self.platform));
        if !dockerfile.is_file() {
            return Err(Error::UnsupportedPlatform {
                component: name.full_name(),
                platform: self.platform.clone(),
                dockerfile,
            });
        }
        let prod_dockerfile = Some(dockerfiles.join(PROD_DOCKERFILE)).filter(|p| p.is_file());

        let image_base = format!(
            "{}/{}.{}",
            self.namespace,
            registry_id(&name.repo),
            registry_id(&name.component)
        );

        Ok(ComponentDescriptor {
            dev_version: dev_version(&prod_version, false),
            prod_version,
            platform: self.platform.clone(),
            repo_path: repo_path.to_path_buf(),
            src_dir: self.src_dir.clone(),
            folder_path,
            spec,
            dockerfile,
            prod_dockerfile,
            generic_prod_dockerfile: self.generic_prod_dockerfile.clone(),
            image_base,
            name,
        })
    }
}

/// Lowercases and replaces `_` so the name is valid in an image reference.
fn registry_id(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}


#[cfg(test)]
mod tests {
    use super::fixtures::{write_component, write_manifest};
    use super::*;
    use crate::config::Settings;
    use std::fs;
    use tempfile::TempDir;

    fn env(root: &Path) -> Environment {
        Environment {
            root: root.to_path_buf(),
            settings: Settings::default(),
        }
    }

    #[test]
    fn test_component_name_parse() {
        let name = ComponentName::parse("navigation/planner").unwrap();
        assert_eq!(name.repo, "navigation");
        assert_eq!(name.component, "planner");
        assert!(ComponentName::parse("common_msgs/lidar-driver.v2").is_ok());
        for bad in [
            "planner",
            "a/b/c",
            "/planner",
            "navigation/",
            "",
            "../planner",
            "./planner",
            "navigation/..",
            ".hidden/planner",
            "navigation/my planner",
        ] {
            assert!(
                matches!(
                    ComponentName::parse(bad),
                    Err(Error::InvalidComponentName { .. })
                ),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_resolve_full_descriptor() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("src").join("Navigation_Stack");
        write_manifest(&repo, "1.3.beta");
        write_component(
            &repo,
            "planner",
            "src: [common_msgs]\nros_pkgs: [planner_core, planner_msgs]\ndisplay: true\n",
            &["x86_64"],
        );

        let descriptor = Resolver::new(&env(temp.path()), "x86_64")
            .resolve("Navigation_Stack/planner")
            .unwrap();

        assert_eq!(descriptor.full_name(), "Navigation_Stack/planner");
        assert_eq!(descriptor.prod_version, "1.3.beta");
        assert_eq!(descriptor.dev_version, "1.3.dev");
        assert_eq!(descriptor.spec.src, vec!["common_msgs"]);
        assert_eq!(descriptor.spec.ros_pkgs.len(), 2);
        assert!(descriptor.spec.display);
        assert!(!descriptor.spec.sound);
        assert!(!descriptor.has_prod_recipe());
        assert_eq!(
            descriptor.production_dockerfile(),
            temp.path().join("dockerfiles").join("prod.dockerfile")
        );
        assert_eq!(
            descriptor.image_name(BuildType::Dev),
            "robotdev/navigation-stack.planner:x86_64.1.3.dev"
        );
        assert_eq!(
            descriptor.image_name(BuildType::Prod),
            "robotdev/navigation-stack.planner:x86_64.1.3.beta"
        );
    }

    #[test]
    fn test_resolve_defaults_for_empty_descriptor() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("src").join("nav");
        write_manifest(&repo, "1.0");
        write_component(&repo, "mapper", "", &["x86_64"]);

        let descriptor = Resolver::new(&env(temp.path()), "x86_64")
            .resolve("nav/mapper")
            .unwrap();
        assert_eq!(descriptor.spec, ComponentSpec::default());
    }

    #[test]
    fn test_resolve_uses_component_prod_recipe() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("src").join("nav");
        write_manifest(&repo, "1.0");
        write_component(&repo, "mapper", "", &["x86_64"]);
        let prod = repo.join("components/mapper/dockerfiles/prod.dockerfile");
        fs::write(&prod, "ARG FROM\nFROM ${FROM}\n").unwrap();

        let descriptor = Resolver::new(&env(temp.path()), "x86_64")
            .resolve("nav/mapper")
            .unwrap();
        assert!(descriptor.has_prod_recipe());
        assert_eq!(descriptor.production_dockerfile(), prod);
    }

    #[test]
    fn test_resolve_distinct_errors() {
        let temp = TempDir::new().unwrap();
        let resolver = Resolver::new(&env(temp.path()), "jetsonorinagx");
        let repo = temp.path().join("src").join("nav");

        assert!(matches!(
            resolver.resolve("nav/mapper"),
            Err(Error::ComponentDescriptorNotFound { .. })
        ));

        write_component(&repo, "mapper", "", &["x86_64"]);
        assert!(matches!(
            resolver.resolve("nav/mapper"),
            Err(Error::ManifestNotFound { .. })
        ));

        write_manifest(&repo, "1.0");
        assert!(matches!(
            resolver.resolve("nav/mapper"),
            Err(Error::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_resolve_type_mismatch_fails_closed() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("src").join("nav");
        write_manifest(&repo, "1.0");
        write_component(&repo, "mapper", "display: sometimes\n", &["x86_64"]);

        let err = Resolver::new(&env(temp.path()), "x86_64")
            .resolve("nav/mapper")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_resolve_in_repo_uses_directory_name() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("checkout").join("nav");
        write_manifest(&repo, "2.1");
        write_component(&repo, "mapper", "", &["x86_64"]);

        let descriptor = Resolver::new(&env(temp.path()), "x86_64")
            .resolve_in_repo(&repo, "mapper")
            .unwrap();
        assert_eq!(descriptor.full_name(), "nav/mapper");
        assert_eq!(descriptor.repo_path, repo);
    }

    #[test]
    fn test_volumes_include_src_dependencies() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("src").join("nav");
        write_manifest(&repo, "1.0");
        write_component(&repo, "planner", "src: [common_msgs]\n", &["x86_64"]);

        let descriptor = Resolver::new(&env(temp.path()), "x86_64")
            .resolve("nav/planner")
            .unwrap();
        let args: Vec<String> = descriptor
            .volumes(Path::new("/home/gary/robotdev_ws/alice"))
            .iter()
            .map(Volume::to_arg)
            .collect();

        assert_eq!(
            args,
            vec![
                "/home/gary/robotdev_ws/alice/build/planner:/gary/build",
                "/home/gary/robotdev_ws/alice/generic_static_data:/gary/generic_static_data:ro",
                "/home/gary/robotdev_ws/alice/generic_persistent_data:/gary/generic_persistent_data",
                "/home/gary/robotdev_ws/alice/src/nav/components/planner/component_static_data:/gary/component_static_data:ro",
                "/home/gary/robotdev_ws/alice/component_persistent_data/nav/planner:/gary/component_persistent_data",
                "/home/gary/robotdev_ws/alice/src/common_msgs:/gary/src/common_msgs:ro",
            ]
        );
        assert_eq!(descriptor.container_name("alice"), "planner.alice");
    }
}

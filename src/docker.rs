//! # Container Images
//!
//! The [`ContainerEngine`] trait is the seam between robotdev and the
//! container runtime. [`DockerCli`] implements it with the `docker` command
//! line; remote robots are reached by setting `DOCKER_HOST` to an
//! `ssh://` URL, so images are built and run on the robot itself.
//!
//! [`BuildOrchestrator`] turns a [`ComponentDescriptor`] into build and push
//! operations. Dev images are built from the component folder; production
//! images from the environment's whole `src/` tree, so their recipe can copy
//! the repository together with its `SRC` dependencies.
//!
//! ## Build arguments
//!
//! Every build receives:
//!
//! - `REGISTRY`: the registry images are pushed to
//! - `SRC`: the component's source dependencies, space separated
//! - `ROS_PKGS`: the packages built inside the image, space separated
//! - any caller-supplied metadata pairs
//! - `FROM`: the dev image, for production builds only

use std::path::PathBuf;

use log::{debug, info};

use crate::component::{BuildType, ComponentDescriptor};
use crate::error::Result;
use crate::process::{CommandLine, CommandRunner, OutputMode, SystemRunner};

/// Parameters of a single `docker build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub context: PathBuf,
    pub dockerfile: PathBuf,
    pub tag: String,
    pub build_args: Vec<(String, String)>,
}

/// Trait for container runtime operations - allows mocking in tests
pub trait ContainerEngine {
    fn build(&self, request: &BuildRequest) -> Result<()>;

    fn tag(&self, source: &str, target: &str) -> Result<()>;

    fn push(&self, image: &str) -> Result<()>;

    fn remove_image(&self, image: &str) -> Result<()>;

    /// Image of the running container called `name`, if there is one.
    fn container_image(&self, name: &str) -> Result<Option<String>>;

    /// `docker run <args>`. Interactive runs tolerate a non-zero exit.
    fn run(&self, args: &[String], interactive: bool) -> Result<()>;

    /// `docker exec <args>`. Interactive runs tolerate a non-zero exit.
    fn exec(&self, args: &[String], interactive: bool) -> Result<()>;
}

/// [`ContainerEngine`] backed by the `docker` command line.
pub struct DockerCli<R: CommandRunner = SystemRunner> {
    runner: R,
    docker_host: Option<String>,
    working_dir: Option<PathBuf>,
}

impl DockerCli<SystemRunner> {
    pub fn new(docker_host: Option<String>) -> Self {
        Self::with_runner(SystemRunner, docker_host)
    }
}

impl<R: CommandRunner> DockerCli<R> {
    pub fn with_runner(runner: R, docker_host: Option<String>) -> Self {
        Self {
            runner,
            docker_host,
            working_dir: None,
        }
    }

    /// Directory docker commands are started from.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn docker(&self) -> CommandLine {
        let mut cmd = CommandLine::new("docker");
        if let Some(host) = &self.docker_host {
            cmd = cmd.env("DOCKER_HOST", host.as_str());
        }
        if let Some(dir) = &self.working_dir {
            cmd = cmd.current_dir(dir);
        }
        cmd
    }

    fn attached(&self, cmd: CommandLine, interactive: bool) -> Result<()> {
        if interactive {
            if let Some(code) = self.runner.run_best_effort(&cmd)?.filter(|c| *c != 0) {
                info!("Command exited with code {}", code);
            }
            Ok(())
        } else {
            self.runner.run_streamed(&cmd)
        }
    }
}

/// Renders the `docker build` invocation for a request.
pub fn build_command(base: CommandLine, request: &BuildRequest) -> CommandLine {
    let mut cmd = base
        .arg("build")
        .opt("--tag", request.tag.as_str())
        .arg("-f")
        .path_arg(&request.dockerfile);
    for (key, value) in &request.build_args {
        cmd = cmd.opt("--build-arg", format!("{}={}", key, value));
    }
    cmd.path_arg(&request.context)
}

impl<R: CommandRunner> ContainerEngine for DockerCli<R> {
    fn build(&self, request: &BuildRequest) -> Result<()> {
        self.runner.run_streamed(&build_command(self.docker(), request))
    }

    fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.runner
            .run_captured(&self.docker().args(["tag", source, target]))
            .map(|_| ())
    }

    fn push(&self, image: &str) -> Result<()> {
        self.runner.run_streamed(&self.docker().args(["push", image]))
    }

    fn remove_image(&self, image: &str) -> Result<()> {
        self.runner
            .run_captured(&self.docker().args(["rmi", image]))
            .map(|_| ())
    }

    fn container_image(&self, name: &str) -> Result<Option<String>> {
        let cmd = self
            .docker()
            .args(["container", "ls", "--filter"])
            .arg(format!("name=^{}$", name))
            .args(["--format", "{{.Image}}"]);
        let output = self.runner.execute(&cmd, OutputMode::Capture)?;
        if !output.is_success() {
            debug!("Could not list containers: {}", output.stderr.trim());
            return Ok(None);
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(String::from))
    }

    fn run(&self, args: &[String], interactive: bool) -> Result<()> {
        self.attached(self.docker().arg("run").args(args.iter().cloned()), interactive)
    }

    fn exec(&self, args: &[String], interactive: bool) -> Result<()> {
        self.attached(self.docker().arg("exec").args(args.iter().cloned()), interactive)
    }
}

/// Labels baked into production images: the repository manifest and the
/// resolved component descriptor, both as JSON.
pub fn image_metadata(
    manifest_json: &str,
    descriptor: &ComponentDescriptor,
) -> Result<Vec<(String, String)>> {
    Ok(vec![
        ("REPO_MANIFEST".to_string(), manifest_json.to_string()),
        ("COMPONENT_DESCRIPTOR".to_string(), descriptor.to_json()?),
    ])
}

/// Builds and pushes component images through a [`ContainerEngine`].
pub struct BuildOrchestrator<'a> {
    engine: &'a dyn ContainerEngine,
    registry: String,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, registry: impl Into<String>) -> Self {
        Self {
            engine,
            registry: registry.into(),
        }
    }

    /// The build request for one image variant of a component.
    pub fn build_request(
        &self,
        descriptor: &ComponentDescriptor,
        build_type: BuildType,
        metadata: &[(String, String)],
    ) -> BuildRequest {
        let (context, dockerfile) = match build_type {
            BuildType::Dev => (descriptor.folder_path.clone(), descriptor.dockerfile.clone()),
            BuildType::Prod => (
                descriptor.src_dir.clone(),
                descriptor.production_dockerfile().to_path_buf(),
            ),
        };

        let mut build_args = vec![
            ("REGISTRY".to_string(), self.registry.clone()),
            ("SRC".to_string(), descriptor.spec.src.join(" ")),
            ("ROS_PKGS".to_string(), descriptor.spec.ros_pkgs.join(" ")),
        ];
        build_args.extend(metadata.iter().cloned());
        if build_type == BuildType::Prod {
            build_args.push(("FROM".to_string(), descriptor.image_name(BuildType::Dev)));
        }

        BuildRequest {
            context,
            dockerfile,
            tag: descriptor.image_name(build_type),
            build_args,
        }
    }

    /// Builds the image and returns its name.
    pub fn build_image(
        &self,
        descriptor: &ComponentDescriptor,
        build_type: BuildType,
        metadata: &[(String, String)],
    ) -> Result<String> {
        let request = self.build_request(descriptor, build_type, metadata);
        println!("🔨 Building {} image '{}'", build_type, request.tag);
        self.engine.build(&request)?;
        Ok(request.tag)
    }

    /// Pushes the image to the registry and returns the pushed reference.
    ///
    /// The registry-qualified tag is removed afterwards, even when the push
    /// failed.
    pub fn push_image(
        &self,
        descriptor: &ComponentDescriptor,
        build_type: BuildType,
    ) -> Result<String> {
        let image = descriptor.image_name(build_type);
        let remote = format!("{}/{}", self.registry, image);
        println!("📤 Pushing {} image '{}'", build_type, remote);

        self.engine.tag(&image, &remote)?;
        let pushed = self.engine.push(&remote);
        let removed = self.engine.remove_image(&remote);
        pushed?;
        removed?;
        Ok(remote)
    }
}

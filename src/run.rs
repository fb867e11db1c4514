//! # Running Components
//!
//! [`RunHandler`] starts a component's dev image on a robot, or executes a
//! command inside the container when it is already running.
//!
//! A container is named `{component}.{workspace}`, so every developer gets
//! their own container per component. If that container is running the
//! same image, the command is `docker exec`'d into it. If it runs another
//! image, nothing is started and [`Error::ContainerImageMismatch`] is
//! returned.
//!
//! ## Environment
//!
//! The container receives the `ROBOT_*` path variables, `IDHOST`,
//! `IDCOMPONENT` and `ROS_DOMAIN_ID`. The domain id is looked up in
//! `users_ros_domains.yaml` by `git config user.email`, unless one of the
//! env files below already sets it. Env files are applied in order:
//!
//! 1. `<component>/config/env`
//! 2. `<env root>/config/env/env`
//! 3. `<env root>/config/env/<component>.env`

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use crate::component::{BuildType, ComponentDescriptor, Volume};
use crate::config::{load_yaml, Environment};
use crate::defaults::{
    container, COMMANDS_DIR, COMPONENTS_DIR, CONFIG_DIR, DEFAULT_XDG_RUNTIME_DIR, ENV_DIR,
    ENV_FILE, NVIDIA_PLATFORM, ROS_DOMAINS_FILENAME, SRC_DIR,
};
use crate::docker::ContainerEngine;
use crate::error::{Error, Result};
use crate::git::user_email;
use crate::process::CommandRunner;
use crate::robot::Robot;
use crate::ssh::host_command;

/// How the container is attached to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// `-it --rm`; a non-zero exit is not an error.
    Interactive,
    /// `-d`, with `DETACHED_MODE=true` in the container.
    Detached,
    /// `--rm`, output streamed, a non-zero exit is an error.
    Attached,
}

/// Parses `KEY=VALUE` lines. Spaces are dropped, `#` lines are comments.
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(|line| line.trim().replace(' ', ""))
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            line.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Runs one component on one robot.
pub struct RunHandler<'a> {
    env: &'a Environment,
    robot: &'a Robot,
    descriptor: &'a ComponentDescriptor,
    engine: &'a dyn ContainerEngine,
    runner: &'a dyn CommandRunner,
    workspace: String,
}

impl<'a> RunHandler<'a> {
    pub fn new(
        env: &'a Environment,
        robot: &'a Robot,
        descriptor: &'a ComponentDescriptor,
        engine: &'a dyn ContainerEngine,
        runner: &'a dyn CommandRunner,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            env,
            robot,
            descriptor,
            engine,
            runner,
            workspace: workspace.into(),
        }
    }

    pub fn container_name(&self) -> String {
        self.descriptor.container_name(&self.workspace)
    }

    pub fn image(&self) -> String {
        self.descriptor.image_name(BuildType::Dev)
    }

    fn host_env_root(&self) -> PathBuf {
        self.robot.host_env_root(self.env, &self.workspace)
    }

    /// The component folder as seen from the robot.
    fn host_component_folder(&self) -> PathBuf {
        self.host_env_root()
            .join(SRC_DIR)
            .join(&self.descriptor.name.repo)
            .join(COMPONENTS_DIR)
            .join(&self.descriptor.name.component)
    }

    fn xdg_runtime_dir(&self) -> String {
        if self.robot.is_local() {
            std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| DEFAULT_XDG_RUNTIME_DIR.to_string())
        } else {
            DEFAULT_XDG_RUNTIME_DIR.to_string()
        }
    }

    fn host_home(&self) -> PathBuf {
        match &self.robot.remote {
            Some(remote) => remote.home(),
            None => dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root")),
        }
    }

    /// Env files that exist locally, in application order.
    pub fn env_files(&self) -> Vec<PathBuf> {
        let env_dir = self.env.root.join(CONFIG_DIR).join(ENV_DIR);
        [
            self.descriptor.folder_path.join(CONFIG_DIR).join(ENV_FILE),
            env_dir.join(ENV_FILE),
            env_dir.join(format!("{}.env", self.descriptor.name.component)),
        ]
        .into_iter()
        .filter(|path| path.is_file())
        .collect()
    }

    /// The configuration folder to mount, if any, as a host path.
    ///
    /// A component's own `config/` wins over the environment's.
    pub fn config_folder(&self) -> Option<PathBuf> {
        if self.descriptor.folder_path.join(CONFIG_DIR).is_dir() {
            Some(self.host_component_folder().join(CONFIG_DIR))
        } else if self.descriptor.spec.config && self.env.root.join(CONFIG_DIR).is_dir() {
            Some(self.host_env_root().join(CONFIG_DIR))
        } else {
            None
        }
    }

    fn ros_domain_id(&self) -> Result<String> {
        let path = self.env.root.join(ROS_DOMAINS_FILENAME);
        let email = user_email(self.runner)?;
        let not_defined = || Error::RosDomainNotDefined {
            email: email.clone(),
            path: path.clone(),
        };
        let domains: BTreeMap<String, u32> = load_yaml(&path, not_defined)?;
        domains
            .get(&email)
            .map(ToString::to_string)
            .ok_or_else(not_defined)
    }

    /// Arguments following `docker run`.
    pub fn run_args(&self, command: &[String], mode: RunMode) -> Result<Vec<String>> {
        let spec = &self.descriptor.spec;
        let mut args: Vec<String> = vec!["--tty".into()];
        if spec.system {
            args.push("--privileged".into());
        }
        args.push("--network=host".into());
        args.push("--pid=host".into());
        if self.robot.platform() == NVIDIA_PLATFORM {
            args.extend(["--runtime".into(), "nvidia".into()]);
        }
        args.extend(["--name".into(), self.container_name()]);

        let mut env = vec![
            ("IDHOST", self.robot.name.clone()),
            ("IDCOMPONENT", self.descriptor.name.component.clone()),
            ("ROBOT_NAME", container::ROBOT_NAME.to_string()),
            ("ROBOT_BASE_PATH", container::ROBOT_BASE_PATH.to_string()),
            (
                "ROBOT_GENERIC_STATIC_DATA_PATH",
                container::ROBOT_GENERIC_STATIC_DATA_PATH.to_string(),
            ),
            (
                "ROBOT_GENERIC_PERSISTENT_DATA_PATH",
                container::ROBOT_GENERIC_PERSISTENT_DATA_PATH.to_string(),
            ),
            (
                "ROBOT_COMPONENT_STATIC_DATA_PATH",
                container::ROBOT_COMPONENT_STATIC_DATA_PATH.to_string(),
            ),
            (
                "ROBOT_COMPONENT_PERSISTENT_DATA_PATH",
                container::ROBOT_COMPONENT_PERSISTENT_DATA_PATH.to_string(),
            ),
            ("ROBOT_CONFIG_PATH", container::ROBOT_CONFIG_PATH.to_string()),
            ("ROBOT_BUILD_PATH", container::ROBOT_BUILD_PATH.to_string()),
            ("ROBOT_SRC_PATH", container::ROBOT_SRC_PATH.to_string()),
        ];

        let env_files = self.env_files();
        let mut from_files = BTreeMap::new();
        if !env_files.is_empty() {
            println!("🌎 Using env files:");
        }
        for path in &env_files {
            println!("  - {}", path.display());
            from_files.extend(parse_env_file(&fs::read_to_string(path)?));
        }
        if from_files.contains_key("ROS_DOMAIN_ID") {
            println!("⚠️  Using 'ROS_DOMAIN_ID' from files instead of static one.");
        } else {
            env.push(("ROS_DOMAIN_ID", self.ros_domain_id()?));
        }

        let mut volumes = self.descriptor.volumes(&self.host_env_root());
        let xdg = self.xdg_runtime_dir();
        if spec.display {
            env.push(("XDG_RUNTIME_DIR", xdg.clone()));
            env.push(("DISPLAY", ":0".to_string()));
            volumes.push(Volume::rw(
                format!("{}/gdm/Xauthority", xdg),
                "/root/.Xauthority",
            ));
            volumes.push(Volume::rw("/tmp/.X11-unix", "/tmp/.X11-unix"));
        }
        if spec.sound {
            env.push(("PULSE_SERVER", format!("unix:{}/pulse/native", xdg)));
            env.push(("PULSE_COOKIE", "/root/.config/pulse/cookie".to_string()));
            volumes.push(Volume::rw("/etc/alsa", "/etc/alsa"));
            volumes.push(Volume::rw("/usr/share/alsa", "/usr/share/alsa"));
            let pulse = format!("{}/pulse/native", xdg);
            volumes.push(Volume::rw(pulse.clone(), pulse));
            volumes.push(Volume::rw(
                self.host_home().join(".config/pulse/cookie"),
                "/root/.config/pulse/cookie",
            ));
        }
        if spec.devices {
            volumes.push(Volume::rw("/dev", "/dev"));
            volumes.push(Volume::ro("/run/udev", "/run/udev"));
        }
        if spec.docker {
            volumes.push(Volume::rw("/var/run/docker.sock", "/var/run/docker.sock"));
        }
        if let Some(config) = self.config_folder() {
            println!("⚙️  Using configuration folder: {}", config.display());
            volumes.push(Volume::ro(config, container::ROBOT_CONFIG_PATH));
        }
        if self.descriptor.folder_path.join(COMMANDS_DIR).is_dir() {
            volumes.push(Volume::rw(
                self.host_component_folder().join(COMMANDS_DIR),
                container::ROBOT_COMMANDS_PATH,
            ));
        }

        match mode {
            RunMode::Interactive => args.extend(["-it".into(), "--rm".into()]),
            RunMode::Detached => {
                args.push("-d".into());
                env.push(("DETACHED_MODE", "true".to_string()));
            }
            RunMode::Attached => args.push("--rm".into()),
        }

        for (key, value) in env {
            args.push(format!("-e={}={}", key, value));
        }
        for path in &env_files {
            args.push(format!("--env-file={}", path.display()));
        }
        for volume in &volumes {
            args.push(format!("-v={}", volume.to_arg()));
        }

        args.push(self.image());
        args.extend(command.iter().cloned());
        Ok(args)
    }

    /// Arguments following `docker exec`.
    pub fn exec_args(&self, command: &[String], mode: RunMode) -> Vec<String> {
        let mut args = Vec::new();
        if mode == RunMode::Interactive {
            args.push("-it".to_string());
        }
        args.push(self.container_name());
        if command.is_empty() {
            args.push("bash".to_string());
        } else {
            args.extend(command.iter().cloned());
        }
        args
    }

    /// Runs `command` in the component's container, starting it if needed.
    pub fn run_command(&self, command: &[String], mode: RunMode) -> Result<()> {
        let name = self.container_name();
        let image = self.image();
        let interactive = mode == RunMode::Interactive;

        match self.engine.container_image(&name)? {
            Some(running) if running == image => {
                let shown = if command.is_empty() { "bash".to_string() } else { command.join(" ") };
                println!(
                    "ℹ️  Container '{}' already running, executing '{}' inside it",
                    name, shown
                );
                self.engine.exec(&self.exec_args(command, mode), interactive)
            }
            Some(running) => Err(Error::ContainerImageMismatch {
                container: name,
                running,
            }),
            None => {
                let args = self.run_args(command, mode)?;
                if self.descriptor.spec.display {
                    self.allow_display()?;
                }
                info!("Starting container '{}' from '{}' on '{}'", name, image, self.robot.name);
                self.engine.run(&args, interactive)
            }
        }
    }

    /// Lets local containers use the robot's X server.
    fn allow_display(&self) -> Result<()> {
        let cmd = host_command(self.robot, &["xhost", "+local:*"]).env("DISPLAY", ":0");
        if self.runner.run_best_effort(&cmd)? != Some(0) {
            debug!("xhost could not grant display access");
        }
        Ok(())
    }
}

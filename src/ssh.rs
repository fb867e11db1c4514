//! ssh command construction for remote robots.
//!
//! Every connection to a robot shares one multiplexed master connection per
//! user and address, so consecutive `ssh` and `rsync` invocations only
//! authenticate once.

use crate::process::CommandLine;
use crate::robot::{RemoteHost, Robot};

/// Builds ssh invocations for one remote host.
#[derive(Debug, Clone)]
pub struct SshSession<'a> {
    host: &'a RemoteHost,
}

impl<'a> SshSession<'a> {
    pub fn new(host: &'a RemoteHost) -> Self {
        Self { host }
    }

    pub fn control_path(&self) -> String {
        format!("/tmp/control-{}-{}", self.host.user, self.host.ip)
    }

    /// Shared `-o` options, without the program name.
    fn options(&self) -> Vec<String> {
        let mut options = vec![
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path()),
            "-o".to_string(),
            "ControlPersist=yes".to_string(),
        ];
        if self.host.port > 0 {
            options.push("-p".to_string());
            options.push(self.host.port.to_string());
        }
        options
    }

    /// `ssh [options] [-t] user@ip <remote command>`
    ///
    /// The remote side runs the command through the user's shell, so each
    /// argument is quoted.
    pub fn command<I, S>(&self, remote: I, tty: bool) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let remote: Vec<String> = remote.into_iter().map(|a| shell_quote(a.as_ref())).collect();
        CommandLine::new("ssh")
            .args(self.options())
            .flag_if(tty, "-t")
            .arg(self.host.destination())
            .args(remote)
    }

    /// The `-e` value for rsync, reusing the same master connection.
    pub fn rsync_shell(&self) -> String {
        std::iter::once("ssh".to_string())
            .chain(self.options())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs `argv` on the robot: directly for `localhost`, through ssh otherwise.
pub fn host_command(robot: &Robot, argv: &[&str]) -> CommandLine {
    match &robot.remote {
        None => match argv.split_first() {
            Some((program, args)) => CommandLine::new(*program).args(args.iter().copied()),
            None => CommandLine::new("true"),
        },
        Some(host) => SshSession::new(host).command(argv.iter().copied(), false),
    }
}

/// Single-quotes `arg` for a POSIX shell when it contains anything special.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%~".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

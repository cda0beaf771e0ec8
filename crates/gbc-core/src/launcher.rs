use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Io(String),
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// OS-level "view URL" and "share text" actions.
pub trait Launcher {
    fn view_url(&self, url: &str) -> Result<(), LaunchError>;

    fn share_text(&self, text: &str) -> Result<(), LaunchError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Android,
    MacOs,
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

pub fn view_command(platform: Platform, url: &str) -> LaunchCommand {
    match platform {
        Platform::Android => LaunchCommand::new(
            "am",
            &["start", "-a", "android.intent.action.VIEW", "-d", url],
        ),
        Platform::MacOs => LaunchCommand::new("open", &[url]),
        Platform::Windows => LaunchCommand::new("cmd", &["/C", "start", "", url]),
        Platform::Unix => LaunchCommand::new("xdg-open", &[url]),
    }
}

/// Only Android has a system share sheet reachable from a process.
pub fn share_command(platform: Platform, text: &str) -> Option<LaunchCommand> {
    match platform {
        Platform::Android => Some(LaunchCommand::new(
            "am",
            &[
                "start",
                "-a",
                "android.intent.action.SEND",
                "-t",
                "text/plain",
                "--es",
                "android.intent.extra.TEXT",
                text,
            ],
        )),
        _ => None,
    }
}

/// Launches the platform's opener as a detached child process.
#[derive(Clone, Debug)]
pub struct SystemLauncher {
    platform: Platform,
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
        }
    }
}

impl SystemLauncher {
    fn spawn(&self, command: LaunchCommand) -> Result<(), LaunchError> {
        info!(program = %command.program, "launching {:?}", command.args);
        Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    LaunchError::NotFound(command.program)
                } else {
                    LaunchError::Io(e.to_string())
                }
            })
    }
}

impl Launcher for SystemLauncher {
    fn view_url(&self, url: &str) -> Result<(), LaunchError> {
        self.spawn(view_command(self.platform, url))
    }

    fn share_text(&self, text: &str) -> Result<(), LaunchError> {
        match share_command(self.platform, text) {
            Some(command) => self.spawn(command),
            None => Err(LaunchError::Unsupported("share")),
        }
    }
}

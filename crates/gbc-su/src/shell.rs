use std::{
    io,
    path::PathBuf,
    process::{Output, Stdio},
    sync::OnceLock,
    time::Duration,
};

use tokio::process::Command;
use tracing::debug;

use crate::SuFailure;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellConfig {
    pub su_path: PathBuf,
    pub timeout: Duration,
    /// Fold stderr into the combined output reported on failure.
    pub redirect_stderr: bool,
    pub verbose_logging: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            su_path: PathBuf::from("su"),
            timeout: DEFAULT_TIMEOUT,
            redirect_stderr: true,
            verbose_logging: cfg!(debug_assertions),
        }
    }
}

static SHELL: OnceLock<RootShell> = OnceLock::new();

/// Configures the process-wide root shell. Must run once, before any
/// privileged file operation that relies on the global shell.
pub fn configure(config: ShellConfig) -> Result<&'static RootShell, SuFailure> {
    let mut installed = false;
    let shell = SHELL.get_or_init(|| {
        installed = true;
        RootShell::new(config)
    });
    if !installed {
        return Err(SuFailure::AlreadyConfigured);
    }
    if shell.config.verbose_logging {
        debug!(
            su = %shell.config.su_path.display(),
            timeout_secs = shell.config.timeout.as_secs(),
            redirect_stderr = shell.config.redirect_stderr,
            "root shell configured"
        );
    }
    Ok(shell)
}

pub fn shell() -> Result<&'static RootShell, SuFailure> {
    SHELL.get().ok_or(SuFailure::NotConfigured)
}

pub fn is_configured() -> bool {
    SHELL.get().is_some()
}

/// Runs scripts through `su -c`.
#[derive(Clone, Debug)]
pub struct RootShell {
    config: ShellConfig,
}

impl RootShell {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Runs `script` and requires a zero exit status.
    pub async fn run(&self, script: &str) -> Result<Output, SuFailure> {
        let output = self.output(script).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(self.exit_failure(&output))
        }
    }

    /// Runs `script` and returns its exit code without judging it.
    pub async fn status(&self, script: &str) -> Result<(i32, Output), SuFailure> {
        let output = self.output(script).await?;
        Ok((output.status.code().unwrap_or(-1), output))
    }

    pub(crate) fn exit_failure(&self, output: &Output) -> SuFailure {
        let combined = if self.config.redirect_stderr {
            format_shell_output(
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            )
        } else {
            String::new()
        };
        SuFailure::Exit {
            status: output.status.code().unwrap_or(-1),
            output: combined,
        }
    }

    async fn output(&self, script: &str) -> Result<Output, SuFailure> {
        if self.config.verbose_logging {
            debug!(su = %self.config.su_path.display(), script, "root shell exec");
        }
        let mut cmd = Command::new(&self.config.su_path);
        cmd.arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if self.config.redirect_stderr {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    SuFailure::NotFound(self.config.su_path.clone())
                } else {
                    SuFailure::Io(e.to_string())
                }
            })?,
            Err(_) => return Err(SuFailure::Timeout(self.config.timeout)),
        };

        if self.config.verbose_logging {
            debug!(
                status = output.status.code().unwrap_or(-1),
                stdout_bytes = output.stdout.len(),
                "root shell exit"
            );
        }
        Ok(output)
    }
}

pub(crate) fn format_shell_output(stdout: &str, stderr: &str) -> String {
    let stdout = stdout.trim();
    let stderr = stderr.trim();
    let mut out = String::new();

    if !stdout.is_empty() {
        out.push_str(stdout);
    }
    if !stderr.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(stderr);
    }
    out
}

/// Single-quotes `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::shell::{self, shell_quote, RootShell};
use crate::SuFailure;

/// A single file that may live outside the app sandbox.
#[async_trait]
pub trait PrivilegedFile: Send + Sync {
    fn path(&self) -> &Path;

    async fn exists(&self) -> Result<bool, SuFailure>;

    async fn length(&self) -> Result<u64, SuFailure>;

    async fn read_all(&self) -> Result<Vec<u8>, SuFailure>;
}

/// File accessed through the root shell.
#[derive(Clone, Debug)]
pub struct SuFile {
    path: PathBuf,
    shell: Option<RootShell>,
}

impl SuFile {
    /// Uses the process-wide shell installed by [`shell::configure`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: absolutize(path.into()),
            shell: None,
        }
    }

    pub fn with_shell(path: impl Into<PathBuf>, shell: RootShell) -> Self {
        Self {
            path: absolutize(path.into()),
            shell: Some(shell),
        }
    }

    fn shell(&self) -> Result<&RootShell, SuFailure> {
        match &self.shell {
            Some(shell) => Ok(shell),
            None => shell::shell(),
        }
    }

    fn quoted(&self) -> String {
        shell_quote(&self.path.to_string_lossy())
    }
}

#[async_trait]
impl PrivilegedFile for SuFile {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn exists(&self) -> Result<bool, SuFailure> {
        let shell = self.shell()?;
        let (status, output) = shell.status(&format!("test -e {}", self.quoted())).await?;
        match status {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(shell.exit_failure(&output)),
        }
    }

    async fn length(&self) -> Result<u64, SuFailure> {
        let output = self
            .shell()?
            .run(&format!("stat -c %s {}", self.quoted()))
            .await?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse::<u64>()
            .map_err(|_| SuFailure::Parse(text.trim().to_string()))
    }

    async fn read_all(&self) -> Result<Vec<u8>, SuFailure> {
        let output = self.shell()?.run(&format!("cat {}", self.quoted())).await?;
        Ok(output.stdout)
    }
}

/// File readable with the caller's own permissions.
#[derive(Clone, Debug)]
pub struct PlainFile {
    path: PathBuf,
}

impl PlainFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: absolutize(path.into()),
        }
    }
}

#[async_trait]
impl PrivilegedFile for PlainFile {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn exists(&self) -> Result<bool, SuFailure> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn length(&self) -> Result<u64, SuFailure> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    async fn read_all(&self) -> Result<Vec<u8>, SuFailure> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// Fills a buffer of exactly `expected` bytes from `bytes`.
///
/// Short input is an error; anything past `expected` is dropped.
pub fn read_fully(mut bytes: Vec<u8>, expected: u64) -> Result<Vec<u8>, SuFailure> {
    let actual = bytes.len() as u64;
    if actual < expected {
        return Err(SuFailure::UnexpectedEof { expected, actual });
    }
    bytes.truncate(expected as usize);
    Ok(bytes)
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

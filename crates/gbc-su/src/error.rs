use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures from the root shell and from privileged file access.
///
/// `Display` is the raw text shown to the user, so variants carry the
/// underlying message rather than wrapping it in context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuFailure {
    #[error("root shell is not configured")]
    NotConfigured,
    #[error("root shell is already configured")]
    AlreadyConfigured,
    #[error("su not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("{0}")]
    Io(String),
    #[error("root shell command timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),
    #[error("{}", exit_message(*status, output))]
    Exit { status: i32, output: String },
    #[error("unexpected output: {0}")]
    Parse(String),
    #[error("unexpected end of stream: read {actual} of {expected} bytes")]
    UnexpectedEof { expected: u64, actual: u64 },
}

fn exit_message(status: i32, output: &str) -> String {
    if output.trim().is_empty() {
        format!("root shell command failed with exit {status}")
    } else {
        format!("root shell command failed with exit {status}: {}", output.trim())
    }
}

impl From<std::io::Error> for SuFailure {
    fn from(err: std::io::Error) -> Self {
        SuFailure::Io(err.to_string())
    }
}

//! Root shell access for files outside the app sandbox.
//!
//! The process-wide [`RootShell`] is installed once with [`configure`];
//! [`SuFile`] runs `test`, `stat` and `cat` through it.

mod error;
mod file;
mod shell;

pub use error::SuFailure;
pub use file::{read_fully, PlainFile, PrivilegedFile, SuFile};
pub use shell::{
    configure, is_configured, shell, shell_quote, RootShell, ShellConfig, DEFAULT_TIMEOUT,
};

//! Upload of the Glow baby database and the state a view binds to.

mod db_file;
mod host;
mod launcher;
mod state;
mod transport;
mod ui;

pub use db_file::{DbFile, UploadDispatch, UploadOutcome, UploadTask};
pub use host::{shell_config, start_host, HostError};
pub use launcher::{
    share_command, view_command, LaunchCommand, LaunchError, Launcher, Platform, SystemLauncher,
};
pub use state::{UploadSnapshot, UploadState};
pub use transport::{
    HttpUploader, TransportError, UploadResponse, UploadTransport, DB_FIELD, DB_FILE_NAME,
};
pub use ui::{UiContext, UiTask};

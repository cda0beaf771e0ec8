use gbc_su::{ShellConfig, SuFailure};
use gbc_util::UploaderConfig;
use thiserror::Error;
use tracing::info;

use crate::db_file::DbFile;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("root shell setup failed: {0}")]
    Shell(#[from] SuFailure),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Root shell settings every host starts with: stderr folded into the
/// command output, verbose logging in debug builds only.
pub fn shell_config(cfg: &UploaderConfig) -> ShellConfig {
    ShellConfig {
        su_path: cfg.su_path.clone().into(),
        timeout: cfg.shell_timeout(),
        redirect_stderr: true,
        verbose_logging: cfg!(debug_assertions),
    }
}

/// Process startup shared by the hosts: configure the root shell once, then
/// build the single controller the view binds to.
pub fn start_host(cfg: &UploaderConfig) -> Result<DbFile, HostError> {
    if cfg.use_su {
        gbc_su::configure(shell_config(cfg))?;
    }
    let db = DbFile::from_config(cfg)?;
    info!(
        path = %db.path().display(),
        endpoint = %cfg.endpoint,
        use_su = cfg.use_su,
        "host started"
    );
    Ok(db)
}

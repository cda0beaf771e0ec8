use std::{fs, io, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{parse_flag, state_file_path, write_json_atomic};

pub const UPLOADER_CONFIG_FILE: &str = "uploader-config.json";
pub const DEFAULT_DB_PATH: &str = "/data/data/com.glow.android.baby/databases/baby.db";
pub const DEFAULT_ENDPOINT: &str =
    "https://glow-baby-charts-master.daohoangson.now.sh/api/s3-deploy";
pub const DEFAULT_SU_PATH: &str = "su";
pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    pub db_path: String,
    pub endpoint: String,
    pub su_path: String,
    pub shell_timeout_secs: u64,
    pub use_su: bool,
    pub user_agent: String,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            su_path: DEFAULT_SU_PATH.into(),
            shell_timeout_secs: DEFAULT_SHELL_TIMEOUT_SECS,
            use_su: true,
            user_agent: concat!("gbc/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl UploaderConfig {
    /// File values first, then `GBC_*` environment overrides.
    pub fn load() -> Self {
        Self::load_from(&config_path(), |key| crate::env_var(key))
    }

    pub fn load_from(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<UploaderConfig>(&data) {
                Ok(file_cfg) => file_cfg,
                Err(err) => {
                    warn!("failed to parse {}: {err}", path.display());
                    UploaderConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!("failed to read {}: {err}", path.display());
                }
                UploaderConfig::default()
            }
        };
        cfg.apply_overrides(lookup);
        cfg
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("GBC_DB_PATH") {
            self.db_path = value;
        }
        if let Some(value) = lookup("GBC_ENDPOINT") {
            self.endpoint = value;
        }
        if let Some(value) = lookup("GBC_SU_PATH") {
            self.su_path = value;
        }
        if let Some(value) = lookup("GBC_SHELL_TIMEOUT_SECS") {
            match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.shell_timeout_secs = secs,
                _ => warn!("ignoring GBC_SHELL_TIMEOUT_SECS={value}"),
            }
        }
        if let Some(value) = lookup("GBC_USE_SU") {
            match parse_flag(&value) {
                Some(flag) => self.use_su = flag,
                None => warn!("ignoring GBC_USE_SU={value}"),
            }
        }
    }

    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs.max(1))
    }

    pub fn save(&self) -> io::Result<PathBuf> {
        let path = config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        write_json_atomic(path, self)
    }
}

pub fn config_path() -> PathBuf {
    state_file_path(UPLOADER_CONFIG_FILE)
}

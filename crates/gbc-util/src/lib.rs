mod config;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use gbc_telemetry as telemetry;
use serde::Serialize;

pub use config::{
    config_path, UploaderConfig, DEFAULT_DB_PATH, DEFAULT_ENDPOINT, DEFAULT_SHELL_TIMEOUT_SECS,
    DEFAULT_SU_PATH, UPLOADER_CONFIG_FILE,
};

pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local/share/gbc")
    } else {
        PathBuf::from("/tmp/gbc")
    }
}

pub fn state_dir() -> PathBuf {
    data_dir().join("state")
}

pub fn state_file_path(file_name: &str) -> PathBuf {
    state_dir().join(file_name)
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();
    Ok(())
}

/// Installs tracing and the env-driven telemetry sink, then records `app.start`.
pub fn init_app(app_name: &'static str, app_version: &'static str) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;
    telemetry::init_with_env(app_name, app_version);
    telemetry::event("app.start", &[("app", app_name)]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flag_accepts_common_spellings() {
        for value in ["1", "true", "YES", " on "] {
            assert_eq!(parse_flag(value), Some(true), "{value}");
        }
        for value in ["0", "False", "no", "off"] {
            assert_eq!(parse_flag(value), Some(false), "{value}");
        }
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn write_json_atomic_creates_parent_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");
        write_json_atomic(&path, &serde_json::json!({ "a": 1 })).unwrap();

        let data = fs::read_to_string(&path).unwrap();
        assert!(data.contains("\"a\": 1"));
        assert!(!path.with_extension("json.tmp").exists());
    }
}

use std::sync::Arc;

use clap::{Parser, Subcommand};
use gbc_core::{start_host, SystemLauncher, UiContext, UiTask, UploadDispatch, UploadOutcome};
use gbc_telemetry as telemetry;
use gbc_util::UploaderConfig;
use tracing::debug;

#[derive(Parser)]
#[command(name = "gbc", version, about = "Upload the Glow baby database and print the chart link")]
struct Cli {
    /// Database path on the device
    #[arg(long, global = true)]
    db: Option<String>,
    /// Upload endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Read the database with the current user's permissions instead of su
    #[arg(long, global = true)]
    no_su: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the absolute database path
    Path,
    /// Print the database size in bytes
    Size,
    /// Upload the database and print the resulting link
    Upload {
        /// Open the link once uploaded
        #[arg(long)]
        open: bool,
        /// Share the link once uploaded (Android only)
        #[arg(long)]
        share: bool,
    },
    /// Print the resolved configuration as JSON
    Config {
        /// Persist the resolved configuration for later runs
        #[arg(long)]
        save: bool,
    },
}

/// Headless UI context: posted work runs immediately, toasts go to stderr.
struct TerminalUi;

impl UiContext for TerminalUi {
    fn post(&self, task: UiTask) {
        task();
    }

    fn toast(&self, message: &str) {
        eprintln!("{message}");
    }
}

fn apply_cli_overrides(cfg: &mut UploaderConfig, cli: &Cli) {
    if let Some(db) = &cli.db {
        cfg.db_path = db.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        cfg.endpoint = endpoint.clone();
    }
    if cli.no_su {
        cfg.use_su = false;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    gbc_util::init_app("gbc-cli", env!("CARGO_PKG_VERSION"))?;

    let mut cfg = UploaderConfig::load();
    apply_cli_overrides(&mut cfg, &cli);
    debug!(?cfg, "configuration resolved");
    if let Cmd::Config { save } = cli.cmd {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        if save {
            let path = cfg.save()?;
            eprintln!("saved {}", path.display());
        }
        return Ok(());
    }

    let db = start_host(&cfg)?;

    match cli.cmd {
        Cmd::Path => println!("{}", db.path().display()),
        Cmd::Size => println!("{}", db.length().await?),
        Cmd::Upload { open, share } => {
            let ui: Arc<dyn UiContext> = Arc::new(TerminalUi);
            let task = match db.upload(ui).await {
                UploadDispatch::Dispatched(task) => task,
                UploadDispatch::Skipped => {
                    return Err(format!("no database at {}", db.path().display()).into());
                }
                UploadDispatch::ReadFailed(_) => return Err("upload aborted".into()),
            };

            let outcome = task.outcome().await;
            telemetry::event("cli.upload", &[("completed", bool_str(db.state().upload_completed()))]);
            match outcome {
                UploadOutcome::Completed { location } => println!("{location}"),
                UploadOutcome::Rejected { status } => {
                    return Err(format!("server answered {status} instead of a redirect").into());
                }
                UploadOutcome::MissingLocation => {
                    return Err("server redirect carried no location".into());
                }
                UploadOutcome::Failed { .. } => return Err("upload failed".into()),
            }

            let launcher = SystemLauncher::default();
            if open {
                db.open(&launcher)?;
            }
            if share {
                db.share(&launcher)?;
            }
        }
        Cmd::Config { .. } => {}
    }

    Ok(())
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_override_config() {
        let cli = Cli::try_parse_from([
            "gbc",
            "upload",
            "--open",
            "--db",
            "/sdcard/baby.db",
            "--endpoint",
            "http://127.0.0.1:3000/api/s3-deploy",
            "--no-su",
        ])
        .unwrap();
        let mut cfg = UploaderConfig::default();
        apply_cli_overrides(&mut cfg, &cli);

        assert_eq!(cfg.db_path, "/sdcard/baby.db");
        assert_eq!(cfg.endpoint, "http://127.0.0.1:3000/api/s3-deploy");
        assert!(!cfg.use_su);
        assert!(matches!(cli.cmd, Cmd::Upload { open: true, share: false }));
    }

    #[test]
    fn defaults_are_kept_without_flags() {
        let cli = Cli::try_parse_from(["gbc", "size"]).unwrap();
        let mut cfg = UploaderConfig::default();
        apply_cli_overrides(&mut cfg, &cli);
        assert_eq!(cfg, UploaderConfig::default());
    }

    #[test]
    fn config_save_takes_global_overrides() {
        let cli = Cli::try_parse_from(["gbc", "config", "--save", "--no-su"]).unwrap();
        assert!(matches!(cli.cmd, Cmd::Config { save: true }));

        let mut cfg = UploaderConfig::default();
        apply_cli_overrides(&mut cfg, &cli);
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["use_su"], serde_json::Value::Bool(false));
        assert_eq!(json["db_path"], gbc_util::DEFAULT_DB_PATH);
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["gbc"]).is_err());
    }
}

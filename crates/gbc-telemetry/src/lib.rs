//! Local, opt-in telemetry.
//!
//! Events are queued to a writer thread and appended as JSON lines under
//! `~/.local/share/gbc/telemetry/<app>/events.jsonl`. Nothing leaves the
//! machine. Both usage events and crash reports are off unless enabled.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

const EVENT_QUEUE_CAPACITY: usize = 64;
const MAX_EVENT_BYTES: u64 = 512 * 1024;

#[derive(Clone)]
pub struct TelemetryOptions {
    pub app_name: &'static str,
    pub app_version: &'static str,
    pub usage_enabled: bool,
    pub crash_enabled: bool,
}

pub struct Telemetry {
    app_name: &'static str,
    app_version: &'static str,
    session_id: String,
    root: PathBuf,
    usage_enabled: AtomicBool,
    crash_enabled: AtomicBool,
    sender: SyncSender<Record>,
}

#[derive(Serialize)]
struct Record {
    event_type: String,
    at_unix_millis: i64,
    app: &'static str,
    version: &'static str,
    session_id: String,
    properties: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct CrashReport<'a> {
    at_unix_millis: i64,
    app: &'a str,
    version: &'a str,
    session_id: &'a str,
    message: String,
    location: Option<String>,
}

static TELEMETRY: OnceLock<Arc<Telemetry>> = OnceLock::new();

/// Initializes the process-wide sink. Later calls only update the switches.
pub fn init(options: TelemetryOptions) -> Arc<Telemetry> {
    if let Some(existing) = TELEMETRY.get() {
        existing.set_switches(options.usage_enabled, options.crash_enabled);
        return Arc::clone(existing);
    }
    let telemetry = Telemetry::spawn(options, data_dir().join("telemetry"));
    install_panic_hook(Arc::clone(&telemetry));
    let _ = TELEMETRY.set(Arc::clone(&telemetry));
    telemetry
}

pub fn init_with_env(app_name: &'static str, app_version: &'static str) -> Arc<Telemetry> {
    init(TelemetryOptions {
        app_name,
        app_version,
        usage_enabled: env_flag("GBC_TELEMETRY"),
        crash_enabled: env_flag("GBC_TELEMETRY_CRASH"),
    })
}

pub fn event(event_type: &str, properties: &[(&str, &str)]) {
    if let Some(telemetry) = TELEMETRY.get() {
        telemetry.event(event_type, properties);
    }
}

impl Telemetry {
    fn spawn(options: TelemetryOptions, root: PathBuf) -> Arc<Self> {
        let (sender, receiver) = sync_channel(EVENT_QUEUE_CAPACITY);
        let telemetry = Arc::new(Telemetry {
            app_name: options.app_name,
            app_version: options.app_version,
            session_id: new_session_id(),
            root,
            usage_enabled: AtomicBool::new(options.usage_enabled),
            crash_enabled: AtomicBool::new(options.crash_enabled),
            sender,
        });
        let dir = telemetry.app_dir();
        std::thread::spawn(move || write_loop(&dir, receiver));
        telemetry
    }

    fn set_switches(&self, usage: bool, crash: bool) {
        self.usage_enabled.store(usage, Ordering::Relaxed);
        self.crash_enabled.store(crash, Ordering::Relaxed);
    }

    fn app_dir(&self) -> PathBuf {
        self.root.join(self.app_name)
    }

    pub fn event(&self, event_type: &str, properties: &[(&str, &str)]) {
        if !self.usage_enabled.load(Ordering::Relaxed) {
            return;
        }
        let record = Record {
            event_type: event_type.to_string(),
            at_unix_millis: now_millis(),
            app: self.app_name,
            version: self.app_version,
            session_id: self.session_id.clone(),
            properties: collect_properties(properties),
        };
        // Dropped when the writer falls behind.
        let _ = self.sender.try_send(record);
    }

    fn crash(&self, message: String, location: Option<String>) {
        if !self.crash_enabled.load(Ordering::Relaxed) {
            return;
        }
        let report = CrashReport {
            at_unix_millis: now_millis(),
            app: self.app_name,
            version: self.app_version,
            session_id: &self.session_id,
            message,
            location,
        };
        let dir = self.app_dir().join("crashes");
        if fs::create_dir_all(&dir).is_err() {
            return;
        }
        let path = dir.join(format!(
            "crash-{}-{}.json",
            report.at_unix_millis,
            std::process::id()
        ));
        if let Ok(file) = OpenOptions::new().create(true).write(true).open(&path) {
            let _ = serde_json::to_writer_pretty(file, &report);
        }
    }
}

fn collect_properties(properties: &[(&str, &str)]) -> BTreeMap<String, String> {
    properties
        .iter()
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

fn write_loop(dir: &Path, receiver: Receiver<Record>) {
    while let Ok(record) = receiver.recv() {
        if let Err(err) = append_record(dir, &record) {
            eprintln!("telemetry: failed to write event: {err}");
        }
    }
}

fn append_record(dir: &Path, record: &Record) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join("events.jsonl");
    rotate_if_needed(&path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
    writeln!(file, "{line}")
}

fn rotate_if_needed(path: &Path) -> std::io::Result<()> {
    if let Ok(meta) = fs::metadata(path) {
        if meta.len() >= MAX_EVENT_BYTES {
            let rotated = path.with_extension("jsonl.1");
            let _ = fs::remove_file(&rotated);
            fs::rename(path, rotated)?;
        }
    }
    Ok(())
}

fn install_panic_hook(telemetry: Arc<Telemetry>) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let message = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.clone()
        } else {
            "panic".to_string()
        };
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()));
        telemetry.crash(message, location);
        default_hook(info);
    }));
}

fn data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local/share/gbc")
    } else {
        PathBuf::from("/tmp/gbc")
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn new_session_id() -> String {
    format!("{:x}-{:x}", now_millis(), std::process::id())
}

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use gbc_su::{read_fully, PlainFile, PrivilegedFile, SuFailure, SuFile};
use gbc_telemetry as telemetry;
use gbc_util::UploaderConfig;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::launcher::{LaunchError, Launcher};
use crate::state::UploadState;
use crate::transport::{HttpUploader, TransportError, UploadResponse, UploadTransport};
use crate::ui::UiContext;

const REDIRECT_STATUS: u16 = 301;

/// What [`DbFile::upload`] did before returning.
#[derive(Debug)]
pub enum UploadDispatch {
    /// The database file does not exist; nothing changed.
    Skipped,
    /// Reading the file failed; the error was shown and nothing changed.
    ReadFailed(SuFailure),
    Dispatched(UploadTask),
}

/// How a dispatched upload ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed { location: String },
    Rejected { status: u16 },
    MissingLocation,
    Failed { message: String },
}

impl UploadOutcome {
    fn from_response(result: Result<UploadResponse, TransportError>) -> Self {
        match result {
            Err(err) => UploadOutcome::Failed {
                message: err.to_string(),
            },
            Ok(resp) if resp.status != REDIRECT_STATUS => {
                UploadOutcome::Rejected { status: resp.status }
            }
            Ok(resp) => match resp.location {
                Some(location) if !location.is_empty() => UploadOutcome::Completed { location },
                _ => UploadOutcome::MissingLocation,
            },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            UploadOutcome::Completed { .. } => "completed",
            UploadOutcome::Rejected { .. } => "rejected",
            UploadOutcome::MissingLocation => "missing_location",
            UploadOutcome::Failed { .. } => "failed",
        }
    }
}

/// Handle to the in-flight request.
pub struct UploadTask {
    handle: JoinHandle<UploadOutcome>,
    state: UploadState,
    ui: Arc<dyn UiContext>,
}

impl fmt::Debug for UploadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadTask")
            .field("finished", &self.handle.is_finished())
            .finish_non_exhaustive()
    }
}

impl UploadTask {
    /// Resolves once the response has been classified. The state change it
    /// implies has been posted to the UI context but may not have run yet.
    /// A request task that died before classifying posts the failure itself.
    pub async fn outcome(self) -> UploadOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                let outcome = UploadOutcome::Failed {
                    message: err.to_string(),
                };
                post_outcome(&self.ui, self.state, outcome.clone());
                outcome
            }
        }
    }
}

/// The baby database on the device and its upload state.
#[derive(Clone)]
pub struct DbFile {
    file: Arc<dyn PrivilegedFile>,
    transport: Arc<dyn UploadTransport>,
    state: UploadState,
}

impl DbFile {
    pub fn new(file: Arc<dyn PrivilegedFile>, transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            file,
            transport,
            state: UploadState::new(),
        }
    }

    /// Reads through the global root shell when `use_su` is set, so
    /// `gbc_su::configure` must have run first.
    pub fn from_config(cfg: &UploaderConfig) -> Result<Self, TransportError> {
        let file: Arc<dyn PrivilegedFile> = if cfg.use_su {
            Arc::new(SuFile::new(&cfg.db_path))
        } else {
            Arc::new(PlainFile::new(&cfg.db_path))
        };
        let transport = HttpUploader::new(cfg.endpoint.clone(), &cfg.user_agent)?;
        Ok(Self::new(file, Arc::new(transport)))
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn length(&self) -> Result<u64, SuFailure> {
        self.file.length().await
    }

    pub fn open(&self, launcher: &dyn Launcher) -> Result<(), LaunchError> {
        let location = self.state.uploaded_location();
        if location.is_empty() {
            return Ok(());
        }
        launcher.view_url(&location)
    }

    pub fn share(&self, launcher: &dyn Launcher) -> Result<(), LaunchError> {
        let location = self.state.uploaded_location();
        if location.is_empty() {
            return Ok(());
        }
        launcher.share_text(&location)
    }

    /// Reads the whole file, marks the upload started and posts it on a
    /// background task. Runs on the caller's task; `UploadState` is safe to
    /// write from there and the response handling goes through `ui`.
    pub async fn upload(&self, ui: Arc<dyn UiContext>) -> UploadDispatch {
        match self.file.exists().await {
            Ok(true) => {}
            Ok(false) => {
                debug!(path = %self.path().display(), "database missing, nothing to upload");
                return UploadDispatch::Skipped;
            }
            Err(err) => {
                warn!(path = %self.path().display(), "database check failed: {err}");
                return UploadDispatch::Skipped;
            }
        }

        let bytes = match self.read_bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(path = %self.path().display(), "database read failed: {err}");
                ui.toast(&err.to_string());
                return UploadDispatch::ReadFailed(err);
            }
        };

        self.state.set_started(true);
        let size = bytes.len().to_string();
        info!(bytes = bytes.len(), "uploading database");
        telemetry::event("upload.dispatch", &[("bytes", size.as_str())]);

        let transport = Arc::clone(&self.transport);
        let state = self.state.clone();
        let task_ui = Arc::clone(&ui);
        let handle = tokio::spawn(async move {
            let result = transport.upload_db(bytes).await;
            if let Ok(resp) = &result {
                info!(status = resp.status, location = ?resp.location, "upload response");
            }
            let outcome = UploadOutcome::from_response(result);
            telemetry::event("upload.result", &[("outcome", outcome.label())]);
            post_outcome(&ui, state, outcome.clone());
            outcome
        });
        UploadDispatch::Dispatched(UploadTask {
            handle,
            state: self.state.clone(),
            ui: task_ui,
        })
    }

    async fn read_bytes(&self) -> Result<Vec<u8>, SuFailure> {
        let expected = self.file.length().await?;
        let bytes = self.file.read_all().await?;
        read_fully(bytes, expected)
    }
}

fn post_outcome(ui: &Arc<dyn UiContext>, state: UploadState, outcome: UploadOutcome) {
    let ui_for_task = Arc::clone(ui);
    ui.post(Box::new(move || match outcome {
        UploadOutcome::Completed { location } => state.complete(location),
        UploadOutcome::Failed { message } => {
            error!("upload failed: {message}");
            ui_for_task.toast(&message);
            state.set_started(false);
        }
        UploadOutcome::Rejected { status } => {
            warn!(status, "upload rejected");
            state.set_started(false);
        }
        UploadOutcome::MissingLocation => {
            warn!("upload redirect without location");
            state.set_started(false);
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UploadSnapshot;
    use crate::ui::UiTask;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FakeFile {
        path: PathBuf,
        exists: bool,
        length: Result<u64, SuFailure>,
        bytes: Result<Vec<u8>, SuFailure>,
    }

    impl FakeFile {
        fn with_bytes(bytes: Vec<u8>) -> Self {
            Self {
                path: PathBuf::from("/data/data/com.glow.android.baby/databases/baby.db"),
                exists: true,
                length: Ok(bytes.len() as u64),
                bytes: Ok(bytes),
            }
        }

        fn missing() -> Self {
            Self {
                exists: false,
                length: Err(SuFailure::Io("No such file or directory".into())),
                bytes: Err(SuFailure::Io("No such file or directory".into())),
                ..Self::with_bytes(Vec::new())
            }
        }
    }

    #[async_trait]
    impl PrivilegedFile for FakeFile {
        fn path(&self) -> &Path {
            &self.path
        }

        async fn exists(&self) -> Result<bool, SuFailure> {
            Ok(self.exists)
        }

        async fn length(&self) -> Result<u64, SuFailure> {
            self.length.clone()
        }

        async fn read_all(&self) -> Result<Vec<u8>, SuFailure> {
            self.bytes.clone()
        }
    }

    struct FakeTransport {
        response: Result<UploadResponse, TransportError>,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeTransport {
        fn responding(status: u16, location: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(UploadResponse {
                    status,
                    location: location.map(str::to_string),
                }),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(TransportError::Request(message.into())),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UploadTransport for FakeTransport {
        async fn upload_db(&self, bytes: Vec<u8>) -> Result<UploadResponse, TransportError> {
            self.sent.lock().unwrap().push(bytes);
            self.response.clone()
        }
    }

    /// Holds posted tasks until the test pumps them, like a UI thread that
    /// has not yet drained its queue.
    #[derive(Default)]
    struct QueuedUi {
        tasks: Mutex<Vec<UiTask>>,
        toasts: Mutex<Vec<String>>,
    }

    impl QueuedUi {
        fn pump(&self) -> usize {
            let tasks: Vec<UiTask> = self.tasks.lock().unwrap().drain(..).collect();
            let count = tasks.len();
            for task in tasks {
                task();
            }
            count
        }

        fn toasts(&self) -> Vec<String> {
            self.toasts.lock().unwrap().clone()
        }
    }

    impl UiContext for QueuedUi {
        fn post(&self, task: UiTask) {
            self.tasks.lock().unwrap().push(task);
        }

        fn toast(&self, message: &str) {
            self.toasts.lock().unwrap().push(message.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingLauncher {
        viewed: Mutex<Vec<String>>,
        shared: Mutex<Vec<String>>,
    }

    impl Launcher for RecordingLauncher {
        fn view_url(&self, url: &str) -> Result<(), LaunchError> {
            self.viewed.lock().unwrap().push(url.to_string());
            Ok(())
        }

        fn share_text(&self, text: &str) -> Result<(), LaunchError> {
            self.shared.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn db_file(file: FakeFile, transport: Arc<FakeTransport>) -> DbFile {
        DbFile::new(Arc::new(file), transport)
    }

    async fn dispatch(db: &DbFile, ui: &Arc<QueuedUi>) -> UploadOutcome {
        let ui_ctx: Arc<dyn UiContext> = ui.clone();
        match db.upload(ui_ctx).await {
            UploadDispatch::Dispatched(task) => {
                assert!(db.state().upload_started());
                let outcome = task.outcome().await;
                assert_eq!(ui.pump(), 1);
                outcome
            }
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn redirect_with_location_completes_upload() {
        let payload: Vec<u8> = (0..1024u32).map(|i| i as u8).collect();
        let transport = FakeTransport::responding(301, Some("https://cdn.example/baby.db"));
        let db = db_file(FakeFile::with_bytes(payload.clone()), transport.clone());
        let ui = Arc::new(QueuedUi::default());

        let ui_ctx: Arc<dyn UiContext> = ui.clone();
        let UploadDispatch::Dispatched(task) = db.upload(ui_ctx).await else {
            panic!("upload was not dispatched");
        };
        assert!(db.state().upload_started());
        assert!(!db.state().upload_completed());

        let outcome = task.outcome().await;
        assert_eq!(
            outcome,
            UploadOutcome::Completed {
                location: "https://cdn.example/baby.db".into()
            }
        );
        // Nothing changes until the UI context runs the posted work.
        assert!(!db.state().upload_completed());
        assert!(db.state().uploaded_location().is_empty());

        assert_eq!(ui.pump(), 1);
        let snapshot = db.state().snapshot();
        assert!(snapshot.upload_started);
        assert!(snapshot.upload_completed);
        assert_eq!(snapshot.uploaded_location, "https://cdn.example/baby.db");
        assert_eq!(transport.sent(), vec![payload]);
        assert!(ui.toasts().is_empty());
    }

    #[tokio::test]
    async fn non_redirect_statuses_reset_started() {
        for status in [200, 201, 302, 400, 404, 500] {
            let transport = FakeTransport::responding(status, Some("https://cdn.example/x"));
            let db = db_file(FakeFile::with_bytes(vec![1; 16]), transport);
            let ui = Arc::new(QueuedUi::default());

            assert_eq!(dispatch(&db, &ui).await, UploadOutcome::Rejected { status });
            let snapshot = db.state().snapshot();
            assert!(!snapshot.upload_started, "status {status}");
            assert!(!snapshot.upload_completed, "status {status}");
            assert!(snapshot.uploaded_location.is_empty());
            assert!(ui.toasts().is_empty());
        }
    }

    #[tokio::test]
    async fn redirect_without_location_is_silent_failure() {
        for location in [None, Some("")] {
            let transport = FakeTransport::responding(301, location);
            let db = db_file(FakeFile::with_bytes(vec![7; 8]), transport);
            let ui = Arc::new(QueuedUi::default());

            assert_eq!(dispatch(&db, &ui).await, UploadOutcome::MissingLocation);
            assert!(!db.state().upload_started());
            assert!(!db.state().upload_completed());
            assert!(ui.toasts().is_empty());
        }
    }

    #[tokio::test]
    async fn network_failure_toasts_on_ui_context() {
        let transport = FakeTransport::failing("connection refused");
        let db = db_file(FakeFile::with_bytes(vec![1, 2, 3]), transport);
        let ui = Arc::new(QueuedUi::default());

        let ui_ctx: Arc<dyn UiContext> = ui.clone();
        let UploadDispatch::Dispatched(task) = db.upload(ui_ctx).await else {
            panic!("upload was not dispatched");
        };
        assert_eq!(
            task.outcome().await,
            UploadOutcome::Failed {
                message: "connection refused".into()
            }
        );
        assert!(ui.toasts().is_empty());
        assert!(db.state().upload_started());

        ui.pump();
        assert_eq!(ui.toasts(), vec!["connection refused".to_string()]);
        assert!(!db.state().upload_started());
        assert!(!db.state().upload_completed());
    }

    struct PanickingTransport;

    #[async_trait]
    impl UploadTransport for PanickingTransport {
        async fn upload_db(&self, _bytes: Vec<u8>) -> Result<UploadResponse, TransportError> {
            panic!("transport blew up");
        }
    }

    #[tokio::test]
    async fn crashed_request_task_resets_started() {
        let db = DbFile::new(
            Arc::new(FakeFile::with_bytes(vec![1, 2, 3])),
            Arc::new(PanickingTransport),
        );
        let ui = Arc::new(QueuedUi::default());

        let ui_ctx: Arc<dyn UiContext> = ui.clone();
        let UploadDispatch::Dispatched(task) = db.upload(ui_ctx).await else {
            panic!("upload was not dispatched");
        };
        assert!(matches!(task.outcome().await, UploadOutcome::Failed { .. }));
        assert!(db.state().upload_started());

        assert_eq!(ui.pump(), 1);
        assert_eq!(ui.toasts().len(), 1);
        assert!(!db.state().upload_started());
        assert!(!db.state().upload_completed());
    }

    #[tokio::test]
    async fn missing_file_leaves_state_untouched() {
        let transport = FakeTransport::responding(301, Some("https://cdn.example/x"));
        let db = db_file(FakeFile::missing(), transport.clone());
        db.state().complete("https://earlier.example/baby.db".into());
        let before = db.state().snapshot();
        let ui = Arc::new(QueuedUi::default());

        let ui_ctx: Arc<dyn UiContext> = ui.clone();
        assert!(matches!(db.upload(ui_ctx).await, UploadDispatch::Skipped));
        assert_eq!(db.state().snapshot(), before);
        assert!(transport.sent().is_empty());
        assert!(ui.toasts().is_empty());
        assert_eq!(ui.pump(), 0);
    }

    #[tokio::test]
    async fn read_failure_toasts_and_aborts() {
        let file = FakeFile {
            bytes: Err(SuFailure::Exit {
                status: 1,
                output: "cat: baby.db: Permission denied".into(),
            }),
            ..FakeFile::with_bytes(vec![0; 4])
        };
        let transport = FakeTransport::responding(301, Some("https://cdn.example/x"));
        let db = db_file(file, transport.clone());
        let ui = Arc::new(QueuedUi::default());

        let ui_ctx: Arc<dyn UiContext> = ui.clone();
        let dispatch = db.upload(ui_ctx).await;
        assert!(matches!(dispatch, UploadDispatch::ReadFailed(SuFailure::Exit { .. })));
        assert_eq!(
            ui.toasts(),
            vec!["root shell command failed with exit 1: cat: baby.db: Permission denied".to_string()]
        );
        assert_eq!(db.state().snapshot(), UploadSnapshot::default());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn short_read_is_unexpected_eof() {
        let file = FakeFile {
            length: Ok(1024),
            ..FakeFile::with_bytes(vec![0; 100])
        };
        let transport = FakeTransport::responding(301, Some("https://cdn.example/x"));
        let db = db_file(file, transport);
        let ui = Arc::new(QueuedUi::default());

        let ui_ctx: Arc<dyn UiContext> = ui.clone();
        match db.upload(ui_ctx).await {
            UploadDispatch::ReadFailed(err) => assert_eq!(
                err,
                SuFailure::UnexpectedEof {
                    expected: 1024,
                    actual: 100
                }
            ),
            other => panic!("expected read failure, got {other:?}"),
        }
        assert!(!db.state().upload_started());
    }

    #[tokio::test]
    async fn length_and_path_come_from_the_file() {
        let db = db_file(
            FakeFile::with_bytes(vec![0; 1024]),
            FakeTransport::responding(301, None),
        );
        assert_eq!(db.length().await.unwrap(), 1024);
        assert_eq!(
            db.path(),
            Path::new("/data/data/com.glow.android.baby/databases/baby.db")
        );

        let missing = db_file(FakeFile::missing(), FakeTransport::responding(301, None));
        assert_eq!(
            missing.length().await.unwrap_err(),
            SuFailure::Io("No such file or directory".into())
        );
    }

    #[test]
    fn open_and_share_need_a_location() {
        let db = db_file(FakeFile::missing(), FakeTransport::responding(301, None));
        let launcher = RecordingLauncher::default();

        db.open(&launcher).unwrap();
        db.share(&launcher).unwrap();
        assert!(launcher.viewed.lock().unwrap().is_empty());
        assert!(launcher.shared.lock().unwrap().is_empty());

        db.state().complete("https://example.com/x".into());
        db.open(&launcher).unwrap();
        db.share(&launcher).unwrap();
        assert_eq!(*launcher.viewed.lock().unwrap(), vec!["https://example.com/x".to_string()]);
        assert_eq!(*launcher.shared.lock().unwrap(), vec!["https://example.com/x".to_string()]);
    }
}

use std::sync::Arc;

use tokio::sync::watch;

/// Point-in-time view of the upload fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadSnapshot {
    pub upload_started: bool,
    pub upload_completed: bool,
    pub uploaded_location: String,
}

/// Observable upload state.
///
/// Views call [`UploadState::subscribe`] and re-render when the receiver
/// reports a change. `upload_completed` and `uploaded_location` are only
/// ever written together, so a completed snapshot always carries a location.
#[derive(Clone, Debug)]
pub struct UploadState {
    tx: Arc<watch::Sender<UploadSnapshot>>,
}

impl Default for UploadState {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(UploadSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadSnapshot> {
        self.tx.subscribe()
    }

    pub fn upload_started(&self) -> bool {
        self.tx.borrow().upload_started
    }

    pub fn upload_completed(&self) -> bool {
        self.tx.borrow().upload_completed
    }

    pub fn uploaded_location(&self) -> String {
        self.tx.borrow().uploaded_location.clone()
    }

    pub(crate) fn set_started(&self, started: bool) {
        self.tx.send_if_modified(|state| {
            if state.upload_started == started {
                return false;
            }
            state.upload_started = started;
            true
        });
    }

    pub(crate) fn complete(&self, location: String) {
        self.tx.send_modify(|state| {
            state.uploaded_location = location;
            state.upload_completed = true;
        });
    }
}

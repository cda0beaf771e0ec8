use std::sync::Arc;

use gbc_core::{DbFile, UiContext, UiTask, UploadDispatch, UploadOutcome};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::commands::{AppEvent, UiCommand};
use crate::ui_events::UiEventSender;

/// [`UiContext`] backed by the GTK event queue.
pub(crate) struct GtkUi {
    events: UiEventSender,
}

impl GtkUi {
    pub(crate) fn new(events: UiEventSender) -> Self {
        Self { events }
    }
}

impl UiContext for GtkUi {
    fn post(&self, task: UiTask) {
        self.events.send(AppEvent::Run(task));
    }

    fn toast(&self, message: &str) {
        self.events.send(AppEvent::Toast {
            message: message.to_string(),
        });
    }
}

pub(crate) struct Worker {
    pub(crate) db: DbFile,
    pub(crate) ui: Arc<dyn UiContext>,
    pub(crate) events: UiEventSender,
}

impl Worker {
    pub(crate) async fn handle_command(
        &self,
        cmd: UiCommand,
        uploads: &mut JoinSet<UploadOutcome>,
    ) -> Result<(), String> {
        match cmd {
            UiCommand::Refresh => {
                let length = self.db.length().await.map_err(|err| err.to_string());
                if let Err(err) = &length {
                    debug!("database size unavailable: {err}");
                }
                self.events.send(AppEvent::FileInfo {
                    path: self.db.path().display().to_string(),
                    length,
                });
                Ok(())
            }
            UiCommand::Upload => match self.db.upload(Arc::clone(&self.ui)).await {
                UploadDispatch::Dispatched(task) => {
                    uploads.spawn(task.outcome());
                    Ok(())
                }
                UploadDispatch::Skipped => {
                    info!("no database at {}", self.db.path().display());
                    Ok(())
                }
                UploadDispatch::ReadFailed(err) => Err(err.to_string()),
            },
        }
    }
}

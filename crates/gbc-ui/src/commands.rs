use gbc_core::UiTask;

/// Requests from the GTK thread to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UiCommand {
    Refresh,
    Upload,
}

impl UiCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            UiCommand::Refresh => "refresh",
            UiCommand::Upload => "upload",
        }
    }
}

/// Work the worker hands back to the GTK thread.
pub(crate) enum AppEvent {
    FileInfo {
        path: String,
        length: Result<u64, String>,
    },
    Toast {
        message: String,
    },
    Run(UiTask),
}

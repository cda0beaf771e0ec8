mod commands;
mod ui_events;
mod view;
mod worker;

use std::{sync::Arc, thread};

use gbc_core::{start_host, DbFile};
use gbc_telemetry as telemetry;
use gbc_util::UploaderConfig;
use gtk::prelude::*;
use gtk4 as gtk;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use commands::{AppEvent, UiCommand};
use ui_events::{UiEventQueue, DEFAULT_EVENT_QUEUE_SIZE};
use view::{GioLauncher, MainView};
use worker::{GtkUi, Worker};

fn main() -> glib::ExitCode {
    if let Err(err) = gbc_util::init_app("gbc-ui", env!("CARGO_PKG_VERSION")) {
        eprintln!("failed to initialize logging: {err}");
    }

    let cfg = UploaderConfig::load();
    let db = match start_host(&cfg) {
        Ok(db) => db,
        Err(err) => {
            error!("{err}");
            return glib::ExitCode::FAILURE;
        }
    };

    let app = gtk::Application::builder()
        .application_id("dev.gbc.uploader")
        .build();
    app.connect_activate(move |app| build_ui(app, db.clone()));
    app.run()
}

fn spawn_worker(worker: Worker, mut cmd_rx: mpsc::Receiver<UiCommand>) {
    // The worker owns the tokio runtime; state changes come back through the event queue.
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                error!("failed to build tokio runtime: {err}");
                return;
            }
        };

        rt.block_on(async move {
            let mut uploads = tokio::task::JoinSet::new();
            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break };
                        let cmd_name = cmd.name();
                        telemetry::event("ui.command.start", &[("command", cmd_name)]);
                        match worker.handle_command(cmd, &mut uploads).await {
                            Ok(()) => telemetry::event(
                                "ui.command.result",
                                &[("command", cmd_name), ("result", "ok")],
                            ),
                            Err(err) => {
                                telemetry::event(
                                    "ui.command.result",
                                    &[("command", cmd_name), ("result", "err")],
                                );
                                warn!("{cmd_name} failed: {err}");
                            }
                        }
                    }
                    Some(result) = uploads.join_next(), if !uploads.is_empty() => {
                        match result {
                            Ok(outcome) => info!(?outcome, "upload finished"),
                            Err(err) => warn!("upload task error: {err}"),
                        }
                    }
                }
            }
        });
    });
}

fn build_ui(app: &gtk::Application, db: DbFile) {
    let window = gtk::ApplicationWindow::builder()
        .application(app)
        .title("Glow Baby Charts")
        .default_width(520)
        .default_height(300)
        .build();
    let view = MainView::new();

    let (cmd_tx, cmd_rx) = mpsc::channel::<UiCommand>(16);
    let (event_queue, mut notify_rx) = UiEventQueue::new(DEFAULT_EVENT_QUEUE_SIZE);
    let events = event_queue.sender();
    spawn_worker(
        Worker {
            db: db.clone(),
            ui: Arc::new(GtkUi::new(events.clone())),
            events,
        },
        cmd_rx,
    );

    // State binding: re-render whenever the controller's fields change.
    {
        let view = view.clone();
        let mut state_rx = db.state().subscribe();
        let initial = state_rx.borrow_and_update().clone();
        view.apply(&initial);
        glib::MainContext::default().spawn_local(async move {
            while state_rx.changed().await.is_ok() {
                let snapshot = state_rx.borrow_and_update().clone();
                view.apply(&snapshot);
            }
        });
    }

    // Event routing: drain worker events on the GTK thread.
    {
        let view = view.clone();
        glib::MainContext::default().spawn_local(async move {
            while notify_rx.recv().await.is_some() {
                for ev in event_queue.drain() {
                    match ev {
                        AppEvent::FileInfo { path, length } => view.set_file_info(&path, &length),
                        AppEvent::Toast { message } => view.toast(&message),
                        AppEvent::Run(task) => task(),
                    }
                }
            }
        });
    }

    {
        let cmd_tx = cmd_tx.clone();
        view.upload_btn.connect_clicked(move |_| {
            if cmd_tx.try_send(UiCommand::Upload).is_err() {
                warn!("worker busy, upload request dropped");
            }
        });
    }

    {
        let db = db.clone();
        let view_for_open = view.clone();
        let window = window.clone();
        view.open_btn.connect_clicked(move |_| {
            let launcher = GioLauncher::new(window.clipboard());
            if let Err(err) = db.open(&launcher) {
                view_for_open.toast(&err.to_string());
            }
        });
    }

    {
        let db = db.clone();
        let view_for_share = view.clone();
        let window = window.clone();
        view.share_btn.connect_clicked(move |_| {
            let launcher = GioLauncher::new(window.clipboard());
            match db.share(&launcher) {
                Ok(()) if !db.state().uploaded_location().is_empty() => {
                    view_for_share.toast("Link copied to clipboard");
                }
                Ok(()) => {}
                Err(err) => view_for_share.toast(&err.to_string()),
            }
        });
    }

    if cmd_tx.try_send(UiCommand::Refresh).is_err() {
        warn!("worker unavailable, database info not loaded");
    }

    window.set_child(Some(&view.root));
    window.present();
}

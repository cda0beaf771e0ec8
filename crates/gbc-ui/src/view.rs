use std::cell::Cell;
use std::rc::Rc;

use gbc_core::{LaunchError, Launcher, UploadSnapshot};
use gtk::prelude::*;
use gtk::{gdk, gio};
use gtk4 as gtk;

const TOAST_SECONDS: u32 = 4;

#[derive(Clone)]
pub(crate) struct MainView {
    pub(crate) root: gtk::Box,
    path_label: gtk::Label,
    size_label: gtk::Label,
    status_label: gtk::Label,
    location_label: gtk::Label,
    pub(crate) upload_btn: gtk::Button,
    pub(crate) open_btn: gtk::Button,
    pub(crate) share_btn: gtk::Button,
    toast_revealer: gtk::Revealer,
    toast_label: gtk::Label,
    toast_generation: Rc<Cell<u64>>,
}

impl MainView {
    pub(crate) fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 8);
        root.set_margin_top(16);
        root.set_margin_bottom(16);
        root.set_margin_start(16);
        root.set_margin_end(16);

        let info_frame = gtk::Frame::builder().label("Database").build();
        let info_grid = gtk::Grid::builder()
            .row_spacing(4)
            .column_spacing(12)
            .margin_top(8)
            .margin_bottom(8)
            .margin_start(8)
            .margin_end(8)
            .build();
        let path_label = value_label("-");
        let size_label = value_label("-");
        info_grid.attach(&key_label("Path"), 0, 0, 1, 1);
        info_grid.attach(&path_label, 1, 0, 1, 1);
        info_grid.attach(&key_label("Size"), 0, 1, 1, 1);
        info_grid.attach(&size_label, 1, 1, 1, 1);
        info_frame.set_child(Some(&info_grid));

        let status_label = value_label(status_text(&UploadSnapshot::default()));
        let location_label = value_label("");
        location_label.set_visible(false);

        let actions = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let upload_btn = gtk::Button::with_label("Upload");
        upload_btn.add_css_class("suggested-action");
        let open_btn = gtk::Button::with_label("Open");
        let share_btn = gtk::Button::with_label("Copy link");
        upload_btn.set_tooltip_text(Some("Read the database as root and upload it"));
        share_btn.set_tooltip_text(Some("Copy the uploaded link to the clipboard"));
        actions.append(&upload_btn);
        actions.append(&open_btn);
        actions.append(&share_btn);

        let toast_label = gtk::Label::builder().wrap(true).xalign(0.0).build();
        let toast_revealer = gtk::Revealer::builder()
            .transition_type(gtk::RevealerTransitionType::SlideUp)
            .child(&toast_label)
            .build();

        root.append(&info_frame);
        root.append(&status_label);
        root.append(&location_label);
        root.append(&actions);
        root.append(&toast_revealer);

        let view = Self {
            root,
            path_label,
            size_label,
            status_label,
            location_label,
            upload_btn,
            open_btn,
            share_btn,
            toast_revealer,
            toast_label,
            toast_generation: Rc::new(Cell::new(0)),
        };
        view.apply(&UploadSnapshot::default());
        view
    }

    pub(crate) fn set_file_info(&self, path: &str, length: &Result<u64, String>) {
        self.path_label.set_text(path);
        self.size_label.set_text(&size_text(length));
    }

    pub(crate) fn apply(&self, snapshot: &UploadSnapshot) {
        self.status_label.set_text(status_text(snapshot));
        self.location_label
            .set_text(&snapshot.uploaded_location);
        self.location_label
            .set_visible(!snapshot.uploaded_location.is_empty());
        self.upload_btn.set_sensitive(!snapshot.upload_started || snapshot.upload_completed);
        self.open_btn.set_sensitive(snapshot.upload_completed);
        self.share_btn.set_sensitive(snapshot.upload_completed);
    }

    pub(crate) fn toast(&self, message: &str) {
        let generation = self.toast_generation.get() + 1;
        self.toast_generation.set(generation);
        self.toast_label.set_text(message);
        self.toast_revealer.set_reveal_child(true);

        let revealer = self.toast_revealer.clone();
        let current = Rc::clone(&self.toast_generation);
        glib::timeout_add_seconds_local_once(TOAST_SECONDS, move || {
            if current.get() == generation {
                revealer.set_reveal_child(false);
            }
        });
    }
}

fn key_label(text: &str) -> gtk::Label {
    let label = gtk::Label::builder().label(text).xalign(0.0).build();
    label.add_css_class("dim-label");
    label
}

fn value_label(text: &str) -> gtk::Label {
    gtk::Label::builder()
        .label(text)
        .xalign(0.0)
        .wrap(true)
        .selectable(true)
        .build()
}

pub(crate) fn status_text(snapshot: &UploadSnapshot) -> &'static str {
    if snapshot.upload_completed {
        "Uploaded"
    } else if snapshot.upload_started {
        "Uploading…"
    } else {
        "Ready to upload"
    }
}

pub(crate) fn size_text(length: &Result<u64, String>) -> String {
    match length {
        Ok(bytes) if *bytes >= 1024 * 1024 => {
            format!("{:.1} MiB ({bytes} bytes)", *bytes as f64 / (1024.0 * 1024.0))
        }
        Ok(bytes) if *bytes >= 1024 => format!("{:.1} KiB ({bytes} bytes)", *bytes as f64 / 1024.0),
        Ok(bytes) => format!("{bytes} bytes"),
        Err(err) => format!("unavailable: {err}"),
    }
}

/// Opens links with the desktop's default handler; "share" copies to the clipboard.
pub(crate) struct GioLauncher {
    clipboard: gdk::Clipboard,
}

impl GioLauncher {
    pub(crate) fn new(clipboard: gdk::Clipboard) -> Self {
        Self { clipboard }
    }
}

impl Launcher for GioLauncher {
    fn view_url(&self, url: &str) -> Result<(), LaunchError> {
        gio::AppInfo::launch_default_for_uri(url, None::<&gio::AppLaunchContext>)
            .map_err(|err| LaunchError::Io(err.to_string()))
    }

    fn share_text(&self, text: &str) -> Result<(), LaunchError> {
        self.clipboard.set_text(text);
        Ok(())
    }
}

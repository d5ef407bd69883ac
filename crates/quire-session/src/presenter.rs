use crate::collaborators::{Dialogs, Preview, Rgba, Theme};
use crate::document::Document;
use crate::workspace::Workspace;
use log::{debug, warn};
use quire_core::diagnostics::BIBTEX_LOG_KEY;
use quire_core::{BuildEvent, BuildFailure, BuildResult, BuildState, ResultBlob, SyncPosition};
use quire_engine::Notification;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const SUCCESS_MESSAGE: &str = "Success!";

/// Status line shown after a build that reported `count` errors.
pub fn failure_message(count: usize, color: Rgba) -> String {
    let noun = if count == 1 { "error" } else { "errors" };
    format!(
        "<span color=\"{}\">Failed</span> ({} {})!",
        color.to_hex(),
        count,
        noun
    )
}

/// Applies engine notifications to a document and routes results to the
/// preview, dialogs and other open documents.
pub struct BuildPresenter {
    document: Arc<Document>,
    preview: Arc<dyn Preview>,
    dialogs: Arc<dyn Dialogs>,
    theme: Arc<dyn Theme>,
    workspace: Arc<dyn Workspace>,
}

impl BuildPresenter {
    pub fn new(
        document: Arc<Document>,
        preview: Arc<dyn Preview>,
        dialogs: Arc<dyn Dialogs>,
        theme: Arc<dyn Theme>,
        workspace: Arc<dyn Workspace>,
    ) -> Self {
        Self {
            document,
            preview,
            dialogs,
            theme,
            workspace,
        }
    }

    pub async fn run(self, mut notifications: UnboundedReceiver<Notification>) {
        while let Some(notification) = notifications.recv().await {
            self.handle(notification);
        }
        debug!("Build presenter for {} detached", self.document.filename().display());
    }

    pub fn handle(&self, notification: Notification) {
        match notification {
            Notification::Started => {
                self.transition(BuildEvent::Started);
            }
            Notification::ResetTimer => self.document.reset_timer(),
            Notification::Stopped => {
                self.document.show_build_state("");
                self.transition(BuildEvent::Stopped);
            }
            Notification::Finished(blob) => self.dispatch(blob),
        }
    }

    fn transition(&self, event: BuildEvent) -> bool {
        match self.document.apply(event) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: {}", self.document.filename().display(), e);
                false
            }
        }
    }

    fn dispatch(&self, blob: ResultBlob) {
        let state = self.document.build_state();
        if state != BuildState::BuildingInProgress {
            warn!(
                "Dropping result for {} received while {}",
                self.document.filename().display(),
                state
            );
            return;
        }

        let build_ran = blob.build.is_some();

        if blob.is_build_flavored() {
            if let Some(build) = &blob.build {
                if let Some(pdf) = &build.pdf_filename {
                    self.preview.set_pdf_filename(pdf);
                }
                self.document.notify_pdf_updated();
            }

            if let Some(rectangles) = &blob.forward_sync {
                self.preview.set_synctex_rectangles(rectangles);
                self.document.show_build_state("");
            }

            if let Some(build) = blob.build {
                if let Some(failure) = &build.error {
                    self.report_failure(failure);
                    return;
                }
                self.record_build(build);
            }
        } else if let Some(position) = blob.backward_sync {
            self.route_backward_sync(position);
        }

        self.transition(BuildEvent::Finished);

        if build_ran {
            self.document.invalidate_build_log();
            self.document.notify_build_finished();
        }
    }

    /// Configuration failures end processing of the result early.
    fn report_failure(&self, failure: &BuildFailure) {
        self.document.show_build_state("");
        self.transition(BuildEvent::Abort);

        let open_preferences = match failure {
            BuildFailure::InterpreterMissing { interpreter } => {
                self.dialogs.interpreter_missing(interpreter)
            }
            BuildFailure::InterpreterNotWorking { details } => self.dialogs.building_failed(details),
        };
        if open_preferences {
            self.dialogs.open_preferences();
        }
    }

    fn record_build(&self, build: BuildResult) {
        let mut log_messages = build.log_messages;
        log_messages.insert(BIBTEX_LOG_KEY.to_string(), build.bibtex_log_messages);
        self.document.set_build_log_items(log_messages);

        if let Some(elapsed) = self.document.elapsed_since_build_start() {
            self.document.set_build_time(elapsed);
        }

        let error_count = self.document.error_count();
        if error_count > 0 {
            let message = failure_message(error_count, self.theme.error_color());
            self.document.show_build_state(&message);
        } else {
            self.document.show_build_state(SUCCESS_MESSAGE);
        }

        self.document.set_has_synctex_file(build.has_synctex_file);
        self.document.mark_built();
    }

    fn route_backward_sync(&self, position: SyncPosition) {
        if !self.document.root_is_set() {
            if position.filename.as_path() == self.document.filename() {
                self.document.set_synctex_position(position);
            } else {
                debug!("Backward sync resolved to {}, not open here", position.filename.display());
            }
        } else if self.document.is_root() {
            match self.workspace.find_open_document(&position.filename) {
                Some(document) => document.set_synctex_position(position),
                None => debug!("Backward sync target {} is not open", position.filename.display()),
            }
        }
    }
}

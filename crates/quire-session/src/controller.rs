use crate::document::Document;
use log::{debug, warn};
use quire_core::query::{BuildRequest, ForwardSyncRequest};
use quire_core::{BuildEvent, BuildMode, BuildSignal, PreferencesSource, Query};
use quire_engine::BuildEngine;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;

/// Turns a document's build signals into engine queries and cancellations.
pub struct BuildController {
    document: Arc<Document>,
    engine: Arc<dyn BuildEngine>,
    preferences: Arc<dyn PreferencesSource>,
}

impl BuildController {
    pub fn new(
        document: Arc<Document>,
        engine: Arc<dyn BuildEngine>,
        preferences: Arc<dyn PreferencesSource>,
    ) -> Self {
        Self {
            document,
            engine,
            preferences,
        }
    }

    /// Handles signals until `shutdown` fires, then hands the receiver back.
    pub async fn run(
        self,
        mut signals: UnboundedReceiver<BuildSignal>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> UnboundedReceiver<BuildSignal> {
        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => self.handle_signal(signal),
                    None => break,
                },
                _ = &mut shutdown => break,
            }
        }
        debug!("Build controller for {} detached", self.document.filename().display());
        signals
    }

    pub fn handle_signal(&self, signal: BuildSignal) {
        match signal {
            BuildSignal::ReadyForBuilding => match self.compose_query() {
                Some(query) => self.engine.submit(query),
                None => {
                    // Nothing to submit, so nothing will ever finish.
                    if let Err(e) = self.document.apply(BuildEvent::Abort) {
                        warn!("{}: {}", self.document.filename().display(), e);
                    }
                }
            },
            BuildSignal::BuildingToStop => self.engine.cancel(&self.document.target()),
        }
    }

    /// Builds the query for the document's current build mode. Returns `None`
    /// when the sync data the mode needs is not (or no longer) available.
    pub fn compose_query(&self) -> Option<Query> {
        let target = self.document.target();

        let query = match self.document.build_mode() {
            BuildMode::Build => Query::build(target, self.build_request()),
            BuildMode::ForwardSync => Query::forward_sync(target, self.forward_sync_arguments()?),
            BuildMode::BackwardSync => {
                let Some(data) = self.document.take_backward_sync_data() else {
                    debug!("Ignoring stale backward sync request for {}", target);
                    return None;
                };
                Query::backward_sync(target, data)
            }
            BuildMode::BuildAndForwardSync => {
                let sync = self.forward_sync_arguments()?;
                Query::build_and_forward_sync(target, self.build_request(), sync)
            }
        };

        Some(query)
    }

    fn forward_sync_arguments(&self) -> Option<ForwardSyncRequest> {
        let arguments = self.document.take_forward_sync_arguments();
        if arguments.is_none() {
            debug!(
                "No forward sync arguments set for {}",
                self.document.filename().display()
            );
        }
        arguments
    }

    fn build_request(&self) -> BuildRequest {
        let prefs = self.preferences.current();
        BuildRequest {
            text: self.document.text(),
            latex_interpreter: prefs.latex_interpreter.as_str().to_string(),
            use_latexmk: prefs.use_latexmk,
            additional_arguments: prefs.shell_escape_arguments(),
            do_cleanup: prefs.cleanup_build_files,
        }
    }
}

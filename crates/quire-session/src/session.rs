use crate::collaborators::{Dialogs, Preview, Theme};
use crate::controller::BuildController;
use crate::document::Document;
use crate::presenter::BuildPresenter;
use crate::workspace::Workspace;
use anyhow::{Result, anyhow};
use log::{info, warn};
use quire_core::PreferencesSource;
use quire_engine::BuildEngine;
use quire_core::BuildSignal;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Editor components a presenter reports to.
#[derive(Clone)]
pub struct Collaborators {
    pub preview: Arc<dyn Preview>,
    pub dialogs: Arc<dyn Dialogs>,
    pub theme: Arc<dyn Theme>,
    pub workspace: Arc<dyn Workspace>,
}

/// The running controller/presenter pair of one document.
pub struct BuildSession {
    document: Arc<Document>,
    shutdown: oneshot::Sender<()>,
    controller: JoinHandle<UnboundedReceiver<BuildSignal>>,
    presenter: JoinHandle<()>,
}

impl BuildSession {
    /// Wires `document` to `engine` and spawns both mediators. Fails if the
    /// document already has a controller attached.
    pub fn attach(
        document: Arc<Document>,
        engine: Arc<dyn BuildEngine>,
        preferences: Arc<dyn PreferencesSource>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let signals = document.take_build_signals().ok_or_else(|| {
            anyhow!(
                "{} already has a build controller",
                document.filename().display()
            )
        })?;
        let notifications = engine.subscribe(&document.target());

        let controller = BuildController::new(document.clone(), engine, preferences);
        let presenter = BuildPresenter::new(
            document.clone(),
            collaborators.preview,
            collaborators.dialogs,
            collaborators.theme,
            collaborators.workspace,
        );

        let (shutdown, shutdown_rx) = oneshot::channel();
        info!("Attached build session to {}", document.filename().display());
        Ok(Self {
            document,
            shutdown,
            controller: tokio::spawn(controller.run(signals, shutdown_rx)),
            presenter: tokio::spawn(presenter.run(notifications)),
        })
    }

    /// Stops both mediators. The document keeps its signal channel and can be
    /// attached again.
    pub async fn detach(self) {
        self.presenter.abort();
        // The controller may already be gone if its task panicked.
        let _ = self.shutdown.send(());
        match self.controller.await {
            Ok(signals) => self.document.restore_build_signals(signals),
            Err(e) => warn!(
                "Build controller for {} ended abnormally: {}",
                self.document.filename().display(),
                e
            ),
        }
        info!("Detached build session from {}", self.document.filename().display());
    }
}

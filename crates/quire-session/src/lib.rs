//! # Quire Session
//!
//! Per-document mediators between an editor document and the build engine.
//!
//! - [`BuildController`](controller::BuildController) watches the document's
//!   build signals and submits queries or cancellations.
//! - [`BuildPresenter`](presenter::BuildPresenter) consumes engine
//!   notifications, updates the document's build state and hands results to
//!   the preview, dialogs or another open document.
//! - [`BuildSession`](session::BuildSession) spawns both for one document.

pub mod collaborators;
pub mod controller;
pub mod document;
pub mod presenter;
pub mod session;
pub mod workspace;

pub use collaborators::{Dialogs, Preview, Rgba, Theme};
pub use controller::BuildController;
pub use document::{BuildLogEntry, Document, DocumentEvent};
pub use presenter::BuildPresenter;
pub use session::{BuildSession, Collaborators};
pub use workspace::{OpenDocuments, Workspace};

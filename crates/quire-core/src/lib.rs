//! # Quire Core
//!
//! Data model of the Quire build orchestration layer.
//!
//! ## Overview
//!
//! An editor document that wants to be built (or synchronised with its PDF)
//! never talks to the TeX toolchain directly. Instead it describes the work as
//! a [`Query`](query::Query), hands it to a build engine, and later receives a
//! [`ResultBlob`](result::ResultBlob). This crate holds those value types plus
//! the per-document [`BuildStateMachine`](state::BuildStateMachine) that keeps
//! the two mediators (controller and presenter) in step.
//!
//! ## Modules
//!
//! - [`query`] - Query and per-job request payloads
//! - [`result`] - Result blob, build failures, sync rectangles and positions
//! - [`diagnostics`] - Log items and error counting
//! - [`preferences`] - Build preferences and their live sources
//! - [`state`] - Build modes, events, signals and the state machine
//!
//! ## Examples
//!
//! ```
//! use quire_core::query::{BuildRequest, JobKind, Query, TargetId};
//!
//! let query = Query::build(
//!     TargetId::new("/home/me/thesis/main.tex"),
//!     BuildRequest {
//!         text: "\\documentclass{article}".to_string(),
//!         latex_interpreter: "pdflatex".to_string(),
//!         use_latexmk: false,
//!         additional_arguments: " -no-shell-escape".to_string(),
//!         do_cleanup: true,
//!     },
//! );
//! assert_eq!(query.job_kinds(), vec![JobKind::BuildLatex]);
//! ```

pub mod diagnostics;
pub mod preferences;
pub mod query;
pub mod result;
pub mod state;

pub use diagnostics::{LogItem, LogMessages, Severity};
pub use preferences::{Interpreter, Preferences, PreferencesSource, ShellEscape};
pub use query::{JobKind, JobRequest, Query, TargetId};
pub use result::{BuildFailure, BuildResult, ResultBlob, SyncPosition, SyncRectangle};
pub use state::{BuildEvent, BuildMode, BuildSignal, BuildState, BuildStateMachine, StateError};

//! # Quire Engine
//!
//! The build engine executes [`Query`]s and reports back through a stream of
//! [`Notification`]s per target.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  submit/cancel   ┌─────────────┐   build / sync   ┌───────────┐
//! │ Controller │ ───────────────► │ BuildSystem │ ───────────────► │ JobRunner │
//! └────────────┘                  └──────┬──────┘                  └───────────┘
//!                                        │ Notification (per target)
//!                                        ▼
//!                                 ┌─────────────┐
//!                                 │  Presenter  │
//!                                 └─────────────┘
//! ```
//!
//! [`BuildSystem`](system::BuildSystem) owns scheduling and cancellation; the
//! actual toolchain sits behind the [`JobRunner`](runner::JobRunner) trait.

use quire_core::{Query, ResultBlob, TargetId};
use tokio::sync::mpsc::UnboundedReceiver;

pub mod locator;
pub mod runner;
pub mod system;

pub use locator::{ToolLocator, WhichLocator};
pub use runner::JobRunner;
pub use system::BuildSystem;

/// Lifecycle notifications for a single target, delivered in order:
/// `Started`, then zero or more `ResetTimer`, then `Finished` or `Stopped`.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Started,
    ResetTimer,
    Stopped,
    Finished(ResultBlob),
}

pub trait BuildEngine: Send + Sync {
    /// Queues `query` for its target. Returns immediately; results arrive
    /// through the target's notification stream.
    fn submit(&self, query: Query);

    /// Requests a cooperative stop of the target's work. After `Stopped` has
    /// been delivered no result for the cancelled query is ever sent.
    fn cancel(&self, target: &TargetId);

    /// Opens a notification stream for `target`.
    fn subscribe(&self, target: &TargetId) -> UnboundedReceiver<Notification>;
}

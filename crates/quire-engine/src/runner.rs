use anyhow::Result;
use async_trait::async_trait;
use quire_core::query::{BackwardSyncRequest, BuildRequest, ForwardSyncRequest};
use quire_core::{BuildResult, SyncPosition, SyncRectangle, TargetId};

/// Executes individual jobs against the TeX toolchain.
///
/// Implementations only need to do the work; ordering, cancellation and
/// notification are handled by [`BuildSystem`](crate::system::BuildSystem).
/// A returned `Err` means the tool itself could not run. Compile errors belong
/// in [`BuildResult::log_messages`].
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// uniquely identifies the runner (e.g. "latexmk", "tectonic")
    fn name(&self) -> &str;

    async fn build(&self, target: &TargetId, request: &BuildRequest) -> Result<BuildResult>;

    /// `Ok(None)` when the position could not be located in the output.
    async fn forward_sync(
        &self,
        target: &TargetId,
        request: &ForwardSyncRequest,
    ) -> Result<Option<Vec<SyncRectangle>>>;

    /// `Ok(None)` when the clicked point could not be resolved to a source line.
    async fn backward_sync(
        &self,
        target: &TargetId,
        request: &BackwardSyncRequest,
    ) -> Result<Option<SyncPosition>>;
}

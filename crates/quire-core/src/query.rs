use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifies the document a query is built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(pub PathBuf);

impl TargetId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    BuildLatex,
    ForwardSync,
    BackwardSync,
}

/// Parameters of a `build_latex` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRequest {
    /// Snapshot of the document text at the time the query was composed.
    pub text: String,
    pub latex_interpreter: String,
    pub use_latexmk: bool,
    pub additional_arguments: String,
    pub do_cleanup: bool,
}

/// Source position to locate in the compiled output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardSyncRequest {
    pub filename: PathBuf,
    pub line: u32,
    pub line_offset: u32,
}

/// Output position (plus nearby text) to resolve back to a source location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackwardSyncRequest {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub word: String,
    pub context: String,
}

/// One job of a query together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "job", content = "data", rename_all = "snake_case")]
pub enum JobRequest {
    BuildLatex(BuildRequest),
    ForwardSync(ForwardSyncRequest),
    BackwardSync(BackwardSyncRequest),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::BuildLatex(_) => JobKind::BuildLatex,
            JobRequest::ForwardSync(_) => JobKind::ForwardSync,
            JobRequest::BackwardSync(_) => JobKind::BackwardSync,
        }
    }
}

/// A build/sync request for a single target.
///
/// Queries are only created through the per-mode constructors, which fix the
/// job order (build before forward sync) and the `can_sync` flag. A query
/// cannot be modified after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    target: TargetId,
    jobs: Vec<JobRequest>,
    can_sync: bool,
}

impl Query {
    pub fn build(target: TargetId, build: BuildRequest) -> Self {
        Self {
            target,
            jobs: vec![JobRequest::BuildLatex(build)],
            can_sync: false,
        }
    }

    pub fn forward_sync(target: TargetId, sync: ForwardSyncRequest) -> Self {
        Self {
            target,
            jobs: vec![JobRequest::ForwardSync(sync)],
            can_sync: true,
        }
    }

    pub fn backward_sync(target: TargetId, sync: BackwardSyncRequest) -> Self {
        Self {
            target,
            jobs: vec![JobRequest::BackwardSync(sync)],
            can_sync: true,
        }
    }

    /// Build followed by forward sync. Whether the sync can actually run is
    /// only known once the build has finished, so `can_sync` is false.
    pub fn build_and_forward_sync(
        target: TargetId,
        build: BuildRequest,
        sync: ForwardSyncRequest,
    ) -> Self {
        Self {
            target,
            jobs: vec![JobRequest::BuildLatex(build), JobRequest::ForwardSync(sync)],
            can_sync: false,
        }
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Jobs in execution order.
    pub fn jobs(&self) -> &[JobRequest] {
        &self.jobs
    }

    pub fn job_kinds(&self) -> Vec<JobKind> {
        self.jobs.iter().map(JobRequest::kind).collect()
    }

    pub fn can_sync(&self) -> bool {
        self.can_sync
    }

    pub fn build_request(&self) -> Option<&BuildRequest> {
        self.jobs.iter().find_map(|job| match job {
            JobRequest::BuildLatex(req) => Some(req),
            _ => None,
        })
    }

    pub fn forward_sync_request(&self) -> Option<&ForwardSyncRequest> {
        self.jobs.iter().find_map(|job| match job {
            JobRequest::ForwardSync(req) => Some(req),
            _ => None,
        })
    }

    pub fn backward_sync_request(&self) -> Option<&BackwardSyncRequest> {
        self.jobs.iter().find_map(|job| match job {
            JobRequest::BackwardSync(req) => Some(req),
            _ => None,
        })
    }
}

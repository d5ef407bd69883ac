use crate::locator::{ToolLocator, WhichLocator};
use crate::runner::JobRunner;
use crate::{BuildEngine, Notification};
use dashmap::DashMap;
use log::{debug, info, warn};
use quire_core::query::{BackwardSyncRequest, BuildRequest, ForwardSyncRequest, JobRequest};
use quire_core::{BuildFailure, BuildResult, Query, ResultBlob, SyncPosition, SyncRectangle, TargetId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// In-process [`BuildEngine`] backed by tokio tasks.
///
/// Each target gets at most one worker task, which runs that target's queries
/// one at a time in submission order. Different targets build concurrently.
/// [`submit`](BuildEngine::submit) and [`cancel`](BuildEngine::cancel) must be
/// called from within a tokio runtime.
///
/// A target's slot is dropped once its worker has drained the queue and all
/// of its subscribers are gone.
#[derive(Clone)]
pub struct BuildSystem {
    inner: Arc<Inner>,
}

struct Inner {
    runner: Arc<dyn JobRunner>,
    locator: Arc<dyn ToolLocator>,
    targets: DashMap<TargetId, Arc<TargetSlot>>,
}

#[derive(Default)]
struct TargetSlot {
    subscribers: Mutex<Vec<UnboundedSender<Notification>>>,
    queue: Mutex<SlotQueue>,
}

#[derive(Default)]
struct SlotQueue {
    pending: VecDeque<Query>,
    running: Option<Arc<CancelToken>>,
    worker_alive: bool,
    /// Set when the slot left the registry. Callers holding a stale handle retry.
    retired: bool,
}

#[derive(Default)]
struct CancelToken {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl TargetSlot {
    fn lock_queue(&self) -> MutexGuard<'_, SlotQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<UnboundedSender<Notification>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, notification: Notification) {
        self.lock_subscribers()
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }
}

impl BuildSystem {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self::with_locator(runner, Arc::new(WhichLocator))
    }

    pub fn with_locator(runner: Arc<dyn JobRunner>, locator: Arc<dyn ToolLocator>) -> Self {
        Self {
            inner: Arc::new(Inner {
                runner,
                locator,
                targets: DashMap::new(),
            }),
        }
    }

    pub fn runner_name(&self) -> &str {
        self.inner.runner.name()
    }

    /// Number of targets currently holding a slot.
    pub fn target_count(&self) -> usize {
        self.inner.targets.len()
    }

    /// Number of queries waiting behind the running one for `target`.
    pub fn pending_count(&self, target: &TargetId) -> usize {
        self.inner
            .targets
            .get(target)
            .map(|slot| {
                let queue = slot.lock_queue();
                queue.pending.len()
            })
            .unwrap_or(0)
    }

    fn slot(&self, target: &TargetId) -> Arc<TargetSlot> {
        self.inner
            .targets
            .entry(target.clone())
            .or_default()
            .value()
            .clone()
    }
}

impl BuildEngine for BuildSystem {
    fn submit(&self, query: Query) {
        debug!("Queueing {:?} for {}", query.job_kinds(), query.target());
        let target = query.target().clone();
        loop {
            let slot = self.slot(&target);
            let mut queue = slot.lock_queue();
            if queue.retired {
                continue;
            }

            queue.pending.push_back(query);
            if !queue.worker_alive {
                queue.worker_alive = true;
                let inner = self.inner.clone();
                let worker_slot = slot.clone();
                tokio::spawn(async move { run_worker(inner, target, worker_slot).await });
            }
            return;
        }
    }

    fn cancel(&self, target: &TargetId) {
        // Without a slot there is nobody to confirm the stop to.
        let Some(slot) = self.inner.targets.get(target).map(|s| s.value().clone()) else {
            debug!("Cancel for unknown target {}", target);
            return;
        };
        let mut queue = slot.lock_queue();

        let dropped = queue.pending.len();
        queue.pending.clear();
        if dropped > 0 {
            debug!("Discarded {} queued queries for {}", dropped, target);
        }

        match &queue.running {
            Some(token) => {
                info!("Stopping build of {}", target);
                token.cancel();
            }
            None => {
                // Nothing is running, confirm the stop right away.
                slot.notify(Notification::Stopped);
            }
        }
    }

    fn subscribe(&self, target: &TargetId) -> UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        loop {
            let slot = self.slot(target);
            let queue = slot.lock_queue();
            if queue.retired {
                continue;
            }
            slot.lock_subscribers().push(tx);
            return rx;
        }
    }
}

async fn run_worker(inner: Arc<Inner>, target: TargetId, slot: Arc<TargetSlot>) {
    loop {
        let (query, token) = {
            let mut queue = slot.lock_queue();
            let Some(query) = queue.pending.pop_front() else {
                queue.running = None;
                queue.worker_alive = false;
                drop(queue);
                inner.retire_if_unused(&target, &slot);
                return;
            };
            let token = Arc::new(CancelToken::default());
            queue.running = Some(token.clone());
            slot.notify(Notification::Started);
            (query, token)
        };

        let outcome = tokio::select! {
            blob = inner.execute(&query, &slot) => Some(blob),
            _ = token.cancelled() => None,
        };

        // Decided under the lock so a cancel cannot slip in between the check and the send.
        let mut queue = slot.lock_queue();
        queue.running = None;
        match outcome {
            Some(blob) if !token.is_cancelled() => {
                debug!("Finished {:?} for {}", query.job_kinds(), query.target());
                slot.notify(Notification::Finished(blob));
            }
            _ => {
                info!("Build of {} stopped", query.target());
                slot.notify(Notification::Stopped);
            }
        }
    }
}

impl Inner {
    fn retire_if_unused(&self, target: &TargetId, slot: &Arc<TargetSlot>) {
        let removed = self.targets.remove_if(target, |_, current| {
            if !Arc::ptr_eq(current, slot) {
                return false;
            }
            let mut queue = current.lock_queue();
            let mut subscribers = current.lock_subscribers();
            subscribers.retain(|tx| !tx.is_closed());
            let unused = !queue.worker_alive && queue.pending.is_empty() && subscribers.is_empty();
            queue.retired = unused;
            unused
        });
        if removed.is_some() {
            debug!("Released slot of {}", target);
        }
    }

    async fn execute(&self, query: &Query, slot: &TargetSlot) -> ResultBlob {
        let target = query.target();
        let mut build: Option<BuildResult> = None;
        let mut forward_sync = None;
        let mut backward_sync = None;

        for job in query.jobs() {
            match job {
                JobRequest::BuildLatex(request) => {
                    slot.notify(Notification::ResetTimer);
                    build = Some(self.run_build(target, request).await);
                }
                JobRequest::ForwardSync(request) => {
                    // Combined with a build, syncing needs fresh synctex output.
                    let build_ready = build
                        .as_ref()
                        .is_some_and(|b| b.succeeded() && b.has_synctex_file);
                    if query.can_sync() || build_ready {
                        forward_sync = self.run_forward_sync(target, request).await;
                    } else {
                        debug!("Skipping forward sync for {}: no usable build output", target);
                    }
                }
                JobRequest::BackwardSync(request) => {
                    backward_sync = self.run_backward_sync(target, request).await;
                }
            }
        }

        ResultBlob {
            build,
            forward_sync,
            backward_sync,
        }
    }

    async fn run_build(&self, target: &TargetId, request: &BuildRequest) -> BuildResult {
        let program = if request.use_latexmk {
            "latexmk"
        } else {
            request.latex_interpreter.as_str()
        };

        if !self.locator.is_available(program) {
            warn!("Cannot build {}: '{}' not found", target, program);
            return BuildResult::failed(BuildFailure::InterpreterMissing {
                interpreter: program.to_string(),
            });
        }

        info!("Building {} with {} via {}", target, program, self.runner.name());
        match self.runner.build(target, request).await {
            Ok(result) => result,
            Err(e) => {
                warn!("{} failed to run for {}: {:#}", program, target, e);
                BuildResult::failed(BuildFailure::InterpreterNotWorking {
                    details: format!("{:#}", e),
                })
            }
        }
    }

    async fn run_forward_sync(
        &self,
        target: &TargetId,
        request: &ForwardSyncRequest,
    ) -> Option<Vec<SyncRectangle>> {
        match self.runner.forward_sync(target, request).await {
            Ok(rectangles) => rectangles,
            Err(e) => {
                warn!("Forward sync failed for {}: {:#}", target, e);
                None
            }
        }
    }

    async fn run_backward_sync(
        &self,
        target: &TargetId,
        request: &BackwardSyncRequest,
    ) -> Option<SyncPosition> {
        match self.runner.backward_sync(target, request).await {
            Ok(position) => position,
            Err(e) => {
                warn!("Backward sync failed for {}: {:#}", target, e);
                None
            }
        }
    }
}

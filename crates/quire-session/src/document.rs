use log::debug;
use quire_core::diagnostics::{self, LogItem, LogMessages, Severity};
use quire_core::query::{BackwardSyncRequest, ForwardSyncRequest};
use quire_core::{BuildEvent, BuildMode, BuildSignal, BuildState, BuildStateMachine, StateError};
use quire_core::{SyncPosition, TargetId};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

/// Changes the UI layer can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    StateChanged(BuildState),
    StatusMessage(String),
    PdfUpdated,
    BuildFinished,
    BuildLogInvalidated,
    TimerReset,
    SynctexPosition(SyncPosition),
}

/// One row of the rendered build log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLogEntry {
    pub tool: String,
    pub item: LogItem,
}

#[derive(Debug, Default)]
struct DocumentState {
    text: String,
    is_root: bool,
    root_is_set: bool,
    build_mode: BuildMode,
    forward_sync_arguments: Option<ForwardSyncRequest>,
    backward_sync_data: Option<BackwardSyncRequest>,
    machine: BuildStateMachine,
    status_message: String,
    log_messages: LogMessages,
    build_log_view: Option<Arc<Vec<BuildLogEntry>>>,
    last_build_start: Option<Instant>,
    build_time: Option<Duration>,
    has_synctex_file: bool,
    has_been_built: bool,
    synctex_position: Option<SyncPosition>,
}

/// An open document as seen by the build subsystem.
///
/// The build state is only changed through [`request_build`](Self::request_build)
/// and [`request_stop`](Self::request_stop) (UI) and [`apply`](Self::apply)
/// (controller and presenter). Entering `ready_for_building` or
/// `building_to_stop` pushes a [`BuildSignal`] for the controller.
#[derive(Debug)]
pub struct Document {
    filename: PathBuf,
    state: Mutex<DocumentState>,
    signals: mpsc::UnboundedSender<BuildSignal>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<BuildSignal>>>,
    events: broadcast::Sender<DocumentEvent>,
}

impl Document {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        Self {
            filename: filename.into(),
            state: Mutex::new(DocumentState::default()),
            signals,
            signal_rx: Mutex::new(Some(signal_rx)),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: DocumentEvent) {
        // No UI listening is fine.
        let _ = self.events.send(event);
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn target(&self) -> TargetId {
        TargetId::new(self.filename.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }

    /// Hands out the receiving end of the build-signal channel. Only the first
    /// caller gets it.
    pub fn take_build_signals(&self) -> Option<mpsc::UnboundedReceiver<BuildSignal>> {
        self.signal_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Gives the signal receiver back after a controller detaches, so a new
    /// one can be attached.
    pub fn restore_build_signals(&self, signals: mpsc::UnboundedReceiver<BuildSignal>) {
        *self.signal_rx.lock().unwrap_or_else(|e| e.into_inner()) = Some(signals);
    }

    // --- Text and project structure ---

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.lock().text = text.into();
    }

    pub fn is_root(&self) -> bool {
        self.lock().is_root
    }

    pub fn root_is_set(&self) -> bool {
        self.lock().root_is_set
    }

    /// Marks this document as part of a multi-file project; `is_root` tells
    /// whether it is the project's root document.
    pub fn set_root(&self, root_is_set: bool, is_root: bool) {
        let mut state = self.lock();
        state.root_is_set = root_is_set;
        state.is_root = root_is_set && is_root;
    }

    // --- Build intent (UI) ---

    pub fn build_mode(&self) -> BuildMode {
        self.lock().build_mode
    }

    pub fn set_forward_sync_arguments(&self, arguments: ForwardSyncRequest) {
        self.lock().forward_sync_arguments = Some(arguments);
    }

    pub fn set_backward_sync_data(&self, data: BackwardSyncRequest) {
        self.lock().backward_sync_data = Some(data);
    }

    pub fn take_forward_sync_arguments(&self) -> Option<ForwardSyncRequest> {
        self.lock().forward_sync_arguments.take()
    }

    pub fn take_backward_sync_data(&self) -> Option<BackwardSyncRequest> {
        self.lock().backward_sync_data.take()
    }

    pub fn request_build(&self, mode: BuildMode) -> Result<(), StateError> {
        let mut state = self.lock();
        let signal = state.machine.apply(BuildEvent::RequestBuild)?;
        state.build_mode = mode;
        self.after_transition(&state, signal);
        Ok(())
    }

    pub fn request_stop(&self) -> Result<(), StateError> {
        self.apply(BuildEvent::RequestStop)
    }

    // --- Build state (mediators) ---

    pub fn build_state(&self) -> BuildState {
        self.lock().machine.state()
    }

    pub fn apply(&self, event: BuildEvent) -> Result<(), StateError> {
        let mut state = self.lock();
        let signal = state.machine.apply(event)?;
        self.after_transition(&state, signal);
        Ok(())
    }

    /// Publishes a transition while its lock is still held, so listeners see
    /// every state in the order it was entered.
    fn after_transition(&self, state: &DocumentState, signal: Option<BuildSignal>) {
        self.emit(DocumentEvent::StateChanged(state.machine.state()));
        if let Some(signal) = signal
            && self.signals.send(signal).is_err()
        {
            debug!("No controller attached to {}", self.filename.display());
        }
    }

    pub fn status_message(&self) -> String {
        self.lock().status_message.clone()
    }

    pub fn show_build_state(&self, message: &str) {
        self.lock().status_message = message.to_string();
        self.emit(DocumentEvent::StatusMessage(message.to_string()));
    }

    pub fn notify_pdf_updated(&self) {
        self.emit(DocumentEvent::PdfUpdated);
    }

    pub fn notify_build_finished(&self) {
        self.emit(DocumentEvent::BuildFinished);
    }

    pub fn reset_timer(&self) {
        self.lock().last_build_start = Some(Instant::now());
        self.emit(DocumentEvent::TimerReset);
    }

    pub fn elapsed_since_build_start(&self) -> Option<Duration> {
        self.lock().last_build_start.map(|start| start.elapsed())
    }

    pub fn build_time(&self) -> Option<Duration> {
        self.lock().build_time
    }

    pub fn set_build_time(&self, elapsed: Duration) {
        self.lock().build_time = Some(elapsed);
    }

    pub fn has_synctex_file(&self) -> bool {
        self.lock().has_synctex_file
    }

    pub fn set_has_synctex_file(&self, value: bool) {
        self.lock().has_synctex_file = value;
    }

    pub fn has_been_built(&self) -> bool {
        self.lock().has_been_built
    }

    pub fn mark_built(&self) {
        self.lock().has_been_built = true;
    }

    pub fn synctex_position(&self) -> Option<SyncPosition> {
        self.lock().synctex_position.clone()
    }

    /// Moves the cursor to a position resolved by backward sync.
    pub fn set_synctex_position(&self, position: SyncPosition) {
        self.lock().synctex_position = Some(position.clone());
        self.emit(DocumentEvent::SynctexPosition(position));
    }

    // --- Build log ---

    pub fn log_messages(&self) -> LogMessages {
        self.lock().log_messages.clone()
    }

    pub fn set_build_log_items(&self, messages: LogMessages) {
        self.lock().log_messages = messages;
    }

    pub fn error_count(&self) -> usize {
        diagnostics::error_count(&self.lock().log_messages)
    }

    /// Flattened log, errors first. Computed on first access after
    /// [`invalidate_build_log`](Self::invalidate_build_log).
    pub fn build_log_view(&self) -> Arc<Vec<BuildLogEntry>> {
        let mut state = self.lock();
        if let Some(view) = &state.build_log_view {
            return view.clone();
        }

        let mut entries: Vec<BuildLogEntry> = state
            .log_messages
            .iter()
            .flat_map(|(tool, items)| {
                items.iter().map(move |item| BuildLogEntry {
                    tool: tool.clone(),
                    item: item.clone(),
                })
            })
            .collect();
        entries.sort_by_key(|entry| severity_rank(entry.item.severity));

        let view = Arc::new(entries);
        state.build_log_view = Some(view.clone());
        view
    }

    pub fn invalidate_build_log(&self) {
        self.lock().build_log_view = None;
        self.emit(DocumentEvent::BuildLogInvalidated);
    }
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Error => 0,
        Severity::Warning => 1,
        Severity::Badbox => 2,
    }
}

mod common;

use common::{MockDialogs, MockPreview, RedTheme};
use quire_core::diagnostics::BIBTEX_LOG_KEY;
use quire_core::{
    BuildFailure, BuildMode, BuildResult, BuildState, LogItem, LogMessages,
    ResultBlob, Severity, SyncPosition, SyncRectangle,
};
use quire_engine::Notification;
use quire_session::{BuildPresenter, Document, DocumentEvent, OpenDocuments};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

struct Fixture {
    document: Arc<Document>,
    preview: Arc<MockPreview>,
    dialogs: Arc<MockDialogs>,
    workspace: Arc<OpenDocuments>,
    presenter: BuildPresenter,
}

fn fixture_with(dialogs: MockDialogs) -> Fixture {
    let document = Arc::new(Document::new("/doc/main.tex"));
    let preview = Arc::new(MockPreview::default());
    let dialogs = Arc::new(dialogs);
    let workspace = Arc::new(OpenDocuments::new());
    let presenter = BuildPresenter::new(
        document.clone(),
        preview.clone(),
        dialogs.clone(),
        Arc::new(RedTheme),
        workspace.clone(),
    );
    Fixture {
        document,
        preview,
        dialogs,
        workspace,
        presenter,
    }
}

fn fixture() -> Fixture {
    fixture_with(MockDialogs::default())
}

/// Brings the document to `building_in_progress` the way a build would.
fn start_build(f: &Fixture) {
    f.document.request_build(BuildMode::Build).unwrap();
    f.presenter.handle(Notification::Started);
    f.presenter.handle(Notification::ResetTimer);
    assert_eq!(f.document.build_state(), BuildState::BuildingInProgress);
}

fn build_blob(latex: Vec<LogItem>, bibtex: Vec<LogItem>) -> ResultBlob {
    let mut log_messages = LogMessages::new();
    log_messages.insert("LaTeX".to_string(), latex);
    ResultBlob::for_build(
        Some(BuildResult {
            pdf_filename: Some(PathBuf::from("/doc/main.pdf")),
            log_messages,
            bibtex_log_messages: bibtex,
            has_synctex_file: true,
            error: None,
        }),
        None,
    )
}

fn position(filename: &str) -> SyncPosition {
    SyncPosition {
        filename: PathBuf::from(filename),
        line: 41,
        offset: 3,
        word: Some("theorem".to_string()),
        context: Some("the main theorem".to_string()),
    }
}

#[test]
fn test_successful_build() {
    let f = fixture();
    start_build(&f);

    f.presenter.handle(Notification::Finished(build_blob(
        vec![LogItem::new(Severity::Warning, "Citation undefined")],
        vec![],
    )));

    assert_eq!(f.document.build_state(), BuildState::Idle);
    assert_eq!(f.document.status_message(), "Success!");
    assert_eq!(
        *f.preview.pdf_filenames.lock().unwrap(),
        vec![PathBuf::from("/doc/main.pdf")]
    );
    assert!(f.document.has_been_built());
    assert!(f.document.has_synctex_file());
    assert!(f.document.build_time().is_some());
    assert!(f.document.log_messages().contains_key(BIBTEX_LOG_KEY));
}

#[test]
fn test_failed_build_reports_error_count() {
    let f = fixture();
    start_build(&f);

    f.presenter.handle(Notification::Finished(build_blob(
        vec![
            LogItem::new(Severity::Error, "Undefined control sequence").at("main.tex", 3),
            LogItem::new(Severity::Error, "Missing $ inserted").at("main.tex", 9),
        ],
        vec![LogItem::new(Severity::Error, "I found no \\bibdata command")],
    )));

    let message = f.document.status_message();
    assert_eq!(message, "<span color=\"#cc0000\">Failed</span> (3 errors)!");
    assert_eq!(f.document.error_count(), 3);
    // Artifacts still reach the preview.
    assert_eq!(f.preview.pdf_filenames.lock().unwrap().len(), 1);
    assert_eq!(f.document.build_state(), BuildState::Idle);
}

#[test]
fn test_single_error_uses_singular() {
    let f = fixture();
    start_build(&f);

    f.presenter.handle(Notification::Finished(build_blob(
        vec![LogItem::new(Severity::Error, "Emergency stop")],
        vec![],
    )));

    assert!(f.document.status_message().contains("(1 error)!"));
}

#[test]
fn test_interpreter_missing_leaves_logs_untouched() {
    let f = fixture_with(MockDialogs {
        wants_preferences: true,
        ..MockDialogs::default()
    });
    let mut previous = LogMessages::new();
    previous.insert(
        "LaTeX".to_string(),
        vec![LogItem::new(Severity::Warning, "old warning")],
    );
    f.document.set_build_log_items(previous.clone());
    start_build(&f);

    let blob = ResultBlob::for_build(
        Some(BuildResult::failed(BuildFailure::InterpreterMissing {
            interpreter: "lualatex".to_string(),
        })),
        None,
    );
    f.presenter.handle(Notification::Finished(blob));

    assert_eq!(f.document.build_state(), BuildState::Idle);
    assert_eq!(f.document.log_messages(), previous);
    assert_eq!(f.document.status_message(), "");
    assert!(!f.document.has_been_built());
    assert_eq!(*f.dialogs.missing.lock().unwrap(), vec!["lualatex".to_string()]);
    assert_eq!(f.dialogs.preferences_opened.load(Ordering::SeqCst), 1);
}

#[test]
fn test_interpreter_not_working_without_preferences() {
    let f = fixture();
    start_build(&f);

    let blob = ResultBlob::for_build(
        Some(BuildResult::failed(BuildFailure::InterpreterNotWorking {
            details: "pdflatex: fatal".to_string(),
        })),
        None,
    );
    f.presenter.handle(Notification::Finished(blob));

    assert_eq!(f.document.build_state(), BuildState::Idle);
    assert_eq!(*f.dialogs.failed.lock().unwrap(), vec!["pdflatex: fatal".to_string()]);
    assert_eq!(f.dialogs.preferences_opened.load(Ordering::SeqCst), 0);
    assert!(f.document.log_messages().is_empty());
}

#[test]
fn test_forward_sync_rectangles_reach_preview() {
    let f = fixture();
    f.document.request_build(BuildMode::ForwardSync).unwrap();
    f.presenter.handle(Notification::Started);
    f.document.show_build_state("Syncing...");

    let rectangle = SyncRectangle {
        page: 2,
        x: 72.0,
        y: 144.0,
        width: 400.0,
        height: 12.0,
    };
    f.presenter
        .handle(Notification::Finished(ResultBlob::for_build(None, Some(vec![rectangle]))));

    assert_eq!(*f.preview.rectangles.lock().unwrap(), vec![vec![rectangle]]);
    assert_eq!(f.document.status_message(), "");
    assert!(f.preview.pdf_filenames.lock().unwrap().is_empty());
    assert_eq!(f.document.build_state(), BuildState::Idle);
}

#[test]
fn test_backward_sync_to_own_file() {
    let f = fixture();
    f.document.request_build(BuildMode::BackwardSync).unwrap();
    f.presenter.handle(Notification::Started);

    let pos = position("/doc/main.tex");
    f.presenter
        .handle(Notification::Finished(ResultBlob::for_backward_sync(Some(pos.clone()))));

    assert_eq!(f.document.synctex_position(), Some(pos));
    assert_eq!(f.document.build_state(), BuildState::Idle);
}

#[test]
fn test_backward_sync_to_other_file_is_dropped_without_root() {
    let f = fixture();
    let other = Arc::new(Document::new("/doc/chapter1.tex"));
    f.workspace.open(other.clone());
    f.document.request_build(BuildMode::BackwardSync).unwrap();
    f.presenter.handle(Notification::Started);

    f.presenter.handle(Notification::Finished(ResultBlob::for_backward_sync(Some(
        position("/doc/chapter1.tex"),
    ))));

    assert!(f.document.synctex_position().is_none());
    assert!(other.synctex_position().is_none());
    assert_eq!(f.document.build_state(), BuildState::Idle);
}

#[test]
fn test_backward_sync_routed_through_root() {
    let f = fixture();
    f.document.set_root(true, true);
    let chapter = Arc::new(Document::new("/doc/chapter1.tex"));
    f.workspace.open(chapter.clone());
    f.document.request_build(BuildMode::BackwardSync).unwrap();
    f.presenter.handle(Notification::Started);

    let pos = position("/doc/chapter1.tex");
    f.presenter
        .handle(Notification::Finished(ResultBlob::for_backward_sync(Some(pos.clone()))));

    assert_eq!(chapter.synctex_position(), Some(pos));
    assert!(f.document.synctex_position().is_none());
}

#[test]
fn test_backward_sync_in_non_root_project_document_is_dropped() {
    let f = fixture();
    f.document.set_root(true, false);
    f.document.request_build(BuildMode::BackwardSync).unwrap();
    f.presenter.handle(Notification::Started);

    f.presenter.handle(Notification::Finished(ResultBlob::for_backward_sync(Some(
        position("/doc/main.tex"),
    ))));

    assert!(f.document.synctex_position().is_none());
    assert_eq!(f.document.build_state(), BuildState::Idle);
}

#[test]
fn test_stopped_clears_status() {
    let f = fixture();
    start_build(&f);
    f.document.show_build_state("Building...");
    f.document.request_stop().unwrap();

    f.presenter.handle(Notification::Stopped);

    assert_eq!(f.document.status_message(), "");
    assert_eq!(f.document.build_state(), BuildState::Idle);
}

#[test]
fn test_late_result_after_stop_is_dropped() {
    let f = fixture();
    start_build(&f);
    f.document.request_stop().unwrap();

    f.presenter.handle(Notification::Finished(build_blob(vec![], vec![])));

    assert_eq!(f.document.build_state(), BuildState::BuildingToStop);
    assert!(f.preview.pdf_filenames.lock().unwrap().is_empty());
    assert!(!f.document.has_been_built());
}

#[test]
fn test_build_log_invalidated_after_build() {
    let f = fixture();
    let mut events = f.document.subscribe();
    start_build(&f);
    assert!(f.document.build_log_view().is_empty());

    f.presenter.handle(Notification::Finished(build_blob(
        vec![LogItem::new(Severity::Badbox, "Overfull \\hbox")],
        vec![],
    )));

    assert_eq!(f.document.build_log_view().len(), 1);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&DocumentEvent::PdfUpdated));
    assert!(seen.contains(&DocumentEvent::BuildLogInvalidated));
    assert!(seen.contains(&DocumentEvent::BuildFinished));
    assert!(seen.contains(&DocumentEvent::StateChanged(BuildState::Idle)));
}

#[test]
fn test_started_after_stop_request_keeps_stopping() {
    let f = fixture();
    f.document.request_build(BuildMode::Build).unwrap();
    f.document.request_stop().unwrap();

    f.presenter.handle(Notification::Started);
    assert_eq!(f.document.build_state(), BuildState::BuildingToStop);

    f.presenter.handle(Notification::Stopped);
    assert_eq!(f.document.build_state(), BuildState::Idle);
    assert!(f.document.request_build(BuildMode::Build).is_ok());
}

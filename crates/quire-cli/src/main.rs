use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::debug;
use quire_core::preferences::{PreferencesFile, SharedPreferences};
use quire_core::query::{BackwardSyncRequest, ForwardSyncRequest};
use quire_core::{
    BuildMode, BuildState, PreferencesSource, Query, ResultBlob, SyncPosition, SyncRectangle,
    TargetId,
};
use quire_engine::{BuildEngine, Notification};
use quire_session::{
    BuildController, BuildLogEntry, BuildPresenter, Dialogs, Document, OpenDocuments, Preview,
    Rgba, Theme, Workspace,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Quire build orchestration tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the query a document would submit for a build mode
    Plan {
        /// Path to the .tex file
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// build, forward_sync, backward_sync or build_and_forward_sync
        #[arg(long, default_value = "build")]
        mode: BuildMode,
        /// Preferences JSON file (defaults are used if omitted)
        #[arg(long, value_name = "FILE")]
        prefs: Option<PathBuf>,
        /// Source line for forward sync
        #[arg(long)]
        line: Option<u32>,
        /// Column offset for forward sync
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Output page for backward sync
        #[arg(long)]
        page: Option<u32>,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        /// Word under the pointer for backward sync
        #[arg(long, default_value = "")]
        word: String,
        /// Text surrounding the word for backward sync
        #[arg(long, default_value = "")]
        context: String,
    },
    /// Run a result blob through the presenter and print the document state
    Replay {
        /// Path of the document the result belongs to
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// Result blob as JSON
        #[arg(long, value_name = "FILE")]
        blob: PathBuf,
        /// Treat the document as the root of a multi-file project
        #[arg(long)]
        root: bool,
        /// Other open documents (backward sync targets)
        #[arg(long = "open", value_name = "FILE")]
        open: Vec<PathBuf>,
    },
}

/// Captures submitted queries instead of running them.
#[derive(Default)]
struct DryRunEngine {
    submitted: Mutex<Vec<Query>>,
}

impl BuildEngine for DryRunEngine {
    fn submit(&self, query: Query) {
        self.submitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query);
    }

    fn cancel(&self, target: &TargetId) {
        debug!("cancel {} (dry run)", target);
    }

    fn subscribe(&self, _target: &TargetId) -> UnboundedReceiver<Notification> {
        mpsc::unbounded_channel().1
    }
}

struct ConsolePreview;

impl Preview for ConsolePreview {
    fn set_pdf_filename(&self, filename: &Path) {
        println!("preview: pdf {}", filename.display());
    }

    fn set_synctex_rectangles(&self, rectangles: &[SyncRectangle]) {
        for r in rectangles {
            println!(
                "preview: highlight page {} at ({:.1}, {:.1}) {:.1}x{:.1}",
                r.page, r.x, r.y, r.width, r.height
            );
        }
    }
}

struct ConsoleDialogs;

impl Dialogs for ConsoleDialogs {
    fn interpreter_missing(&self, interpreter: &str) -> bool {
        eprintln!("error: LaTeX interpreter '{}' is not installed", interpreter);
        false
    }

    fn building_failed(&self, details: &str) -> bool {
        eprintln!("error: LaTeX interpreter failed to run: {}", details);
        false
    }

    fn open_preferences(&self) {}
}

struct ConsoleTheme;

impl Theme for ConsoleTheme {
    fn error_color(&self) -> Rgba {
        Rgba::new(0.8, 0.0, 0.0)
    }
}

fn plan(
    file: &Path,
    mode: BuildMode,
    prefs: Option<PathBuf>,
    forward: Option<ForwardSyncRequest>,
    backward: Option<BackwardSyncRequest>,
) -> Result<Option<Query>> {
    let document = Arc::new(Document::new(file));
    if matches!(mode, BuildMode::Build | BuildMode::BuildAndForwardSync) {
        let text = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        document.set_text(text);
    }
    if let Some(forward) = forward {
        document.set_forward_sync_arguments(forward);
    }
    if let Some(backward) = backward {
        document.set_backward_sync_data(backward);
    }

    let preferences: Arc<dyn PreferencesSource> = match prefs {
        Some(path) => Arc::new(PreferencesFile::new(path)),
        None => Arc::new(SharedPreferences::default()),
    };
    let engine = Arc::new(DryRunEngine::default());
    let controller = BuildController::new(document.clone(), engine.clone(), preferences);

    let mut signals = document
        .take_build_signals()
        .ok_or_else(|| anyhow!("signal channel already taken"))?;
    document.request_build(mode)?;
    while let Ok(signal) = signals.try_recv() {
        controller.handle_signal(signal);
    }

    let query = engine
        .submitted
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .pop();
    Ok(query)
}

/// What a replayed result left behind.
#[derive(Debug)]
struct ReplayReport {
    state: BuildState,
    status: String,
    /// Present when the blob carried a build.
    errors: Option<usize>,
    log: Vec<BuildLogEntry>,
    /// Present when the blob was a backward sync. Holds the document the
    /// cursor moved in, or `None` when the position was dropped.
    synctex: Option<Option<(PathBuf, SyncPosition)>>,
}

impl ReplayReport {
    fn print(&self) {
        println!("state: {}", self.state);
        println!("status: {}", self.status);
        if let Some(errors) = self.errors {
            println!("errors: {}", errors);
            for entry in &self.log {
                println!("  [{}] {:?}: {}", entry.tool, entry.item.severity, entry.item.message);
            }
        }
        match &self.synctex {
            Some(Some((filename, p))) => println!(
                "synctex: {} line {} offset {}",
                filename.display(),
                p.line,
                p.offset
            ),
            Some(None) => println!("synctex: dropped"),
            None => {}
        }
    }
}

fn replay(
    file: &Path,
    blob: ResultBlob,
    root: bool,
    open: Vec<PathBuf>,
) -> Result<ReplayReport> {
    let document = Arc::new(Document::new(file));
    document.set_root(root, root);

    let workspace = Arc::new(OpenDocuments::new());
    for path in open {
        workspace.open(Arc::new(Document::new(path)));
    }

    let presenter = BuildPresenter::new(
        document.clone(),
        Arc::new(ConsolePreview),
        Arc::new(ConsoleDialogs),
        Arc::new(ConsoleTheme),
        workspace.clone(),
    );

    let mode = if blob.is_build_flavored() {
        BuildMode::Build
    } else {
        BuildMode::BackwardSync
    };
    let build_ran = blob.build.is_some();
    let target = blob.backward_sync.as_ref().map(|p| p.filename.clone());

    document.request_build(mode)?;
    presenter.handle(Notification::Started);
    if build_ran {
        presenter.handle(Notification::ResetTimer);
    }
    presenter.handle(Notification::Finished(blob));

    let synctex = target.map(|target| {
        let moved = if target.as_path() == file {
            Some(document.clone())
        } else {
            workspace.find_open_document(&target)
        };
        moved.and_then(|doc| {
            doc.synctex_position()
                .map(|p| (doc.filename().to_path_buf(), p))
        })
    });

    Ok(ReplayReport {
        state: document.build_state(),
        status: document.status_message(),
        errors: build_ran.then(|| document.error_count()),
        log: if build_ran {
            document.build_log_view().to_vec()
        } else {
            Vec::new()
        },
        synctex,
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            file,
            mode,
            prefs,
            line,
            offset,
            page,
            x,
            y,
            word,
            context,
        } => {
            let forward = line.map(|line| ForwardSyncRequest {
                filename: file.clone(),
                line,
                line_offset: offset,
            });
            let backward = page.map(|page| BackwardSyncRequest {
                page,
                x,
                y,
                word,
                context,
            });
            match plan(&file, mode, prefs, forward, backward)? {
                Some(query) => println!("{}", serde_json::to_string_pretty(&query)?),
                None => eprintln!("No query submitted: {:?} needs sync data", mode),
            }
        }
        Commands::Replay {
            file,
            blob,
            root,
            open,
        } => {
            let content = fs::read_to_string(&blob)
                .with_context(|| format!("Failed to read {}", blob.display()))?;
            let blob: ResultBlob = serde_json::from_str(&content)
                .with_context(|| format!("Malformed result blob in {}", blob.display()))?;
            replay(&file, blob, root, open)?.print();
        }
    }
    Ok(())
}

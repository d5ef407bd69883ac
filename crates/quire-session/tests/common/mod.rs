#![allow(dead_code)]

use quire_core::SyncRectangle;
use quire_session::{Dialogs, Preview, Rgba, Theme};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MockPreview {
    pub pdf_filenames: Mutex<Vec<PathBuf>>,
    pub rectangles: Mutex<Vec<Vec<SyncRectangle>>>,
}

impl Preview for MockPreview {
    fn set_pdf_filename(&self, filename: &Path) {
        self.pdf_filenames.lock().unwrap().push(filename.to_path_buf());
    }

    fn set_synctex_rectangles(&self, rectangles: &[SyncRectangle]) {
        self.rectangles.lock().unwrap().push(rectangles.to_vec());
    }
}

#[derive(Debug, Default)]
pub struct MockDialogs {
    pub wants_preferences: bool,
    pub missing: Mutex<Vec<String>>,
    pub failed: Mutex<Vec<String>>,
    pub preferences_opened: AtomicUsize,
}

impl Dialogs for MockDialogs {
    fn interpreter_missing(&self, interpreter: &str) -> bool {
        self.missing.lock().unwrap().push(interpreter.to_string());
        self.wants_preferences
    }

    fn building_failed(&self, details: &str) -> bool {
        self.failed.lock().unwrap().push(details.to_string());
        self.wants_preferences
    }

    fn open_preferences(&self) {
        self.preferences_opened.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct RedTheme;

impl Theme for RedTheme {
    fn error_color(&self) -> Rgba {
        Rgba::new(0.8, 0.0, 0.0)
    }
}

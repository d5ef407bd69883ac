//! Interfaces to the parts of the editor the presenter drives.

use quire_core::SyncRectangle;
use std::path::Path;

/// The PDF preview pane.
pub trait Preview: Send + Sync {
    fn set_pdf_filename(&self, filename: &Path);
    fn set_synctex_rectangles(&self, rectangles: &[SyncRectangle]);
}

/// Modal dialogs. The `bool` answers whether the user asked to open the
/// preferences.
pub trait Dialogs: Send + Sync {
    fn interpreter_missing(&self, interpreter: &str) -> bool;
    fn building_failed(&self, details: &str) -> bool;
    fn open_preferences(&self);
}

pub trait Theme: Send + Sync {
    fn error_color(&self) -> Rgba;
}

/// A color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    pub fn new(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 1.0,
        }
    }

    /// `#rrggbb`, alpha ignored.
    pub fn to_hex(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.red),
            channel(self.green),
            channel(self.blue)
        )
    }
}

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

//! User preferences consulted when a build query is composed.
//!
//! Preferences are read through a [`PreferencesSource`] every time a query is
//! built; nothing in the build path caches them.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

/// The TeX engine used for `build_latex` jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    #[default]
    Pdflatex,
    Xelatex,
    Lualatex,
}

impl Interpreter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpreter::Pdflatex => "pdflatex",
            Interpreter::Xelatex => "xelatex",
            Interpreter::Lualatex => "lualatex",
        }
    }

    /// Prefix placed in front of a shell-escape flag. LuaTeX only accepts the
    /// double-dash spelling.
    fn flag_prefix(&self) -> &'static str {
        match self {
            Interpreter::Lualatex => " -",
            _ => " ",
        }
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interpreter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pdflatex" => Ok(Interpreter::Pdflatex),
            "xelatex" => Ok(Interpreter::Xelatex),
            "lualatex" => Ok(Interpreter::Lualatex),
            other => Err(anyhow::anyhow!("Unknown LaTeX interpreter: {}", other)),
        }
    }
}

/// Whether `\write18` system commands are allowed during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellEscape {
    #[default]
    Disable,
    Restricted,
    Enable,
}

impl ShellEscape {
    fn flag(&self) -> &'static str {
        match self {
            ShellEscape::Disable => "-no-shell-escape",
            ShellEscape::Restricted => "-shell-restricted",
            ShellEscape::Enable => "-shell-escape",
        }
    }
}

impl FromStr for ShellEscape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "disable" => Ok(ShellEscape::Disable),
            "restricted" => Ok(ShellEscape::Restricted),
            "enable" => Ok(ShellEscape::Enable),
            other => Err(anyhow::anyhow!("Unknown shell escape policy: {}", other)),
        }
    }
}

/// Build-related preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub latex_interpreter: Interpreter,
    pub use_latexmk: bool,
    pub build_option_system_commands: ShellEscape,
    pub cleanup_build_files: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            latex_interpreter: Interpreter::Pdflatex,
            use_latexmk: false,
            build_option_system_commands: ShellEscape::Disable,
            cleanup_build_files: true,
        }
    }
}

impl Preferences {
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write preferences to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
        let prefs: Self = serde_json::from_str(&content)
            .with_context(|| format!("Malformed preferences in {}", path.display()))?;
        Ok(prefs)
    }

    /// Additional command-line arguments derived from the shell-escape policy,
    /// e.g. `" -no-shell-escape"` for pdflatex or `" --no-shell-escape"` for lualatex.
    pub fn shell_escape_arguments(&self) -> String {
        let mut arguments = String::new();
        arguments.push_str(self.latex_interpreter.flag_prefix());
        arguments.push_str(self.build_option_system_commands.flag());
        arguments
    }
}

/// Live view of the user's preferences.
pub trait PreferencesSource: Send + Sync {
    fn current(&self) -> Preferences;
}

/// In-memory preferences that the settings UI can update at any time.
#[derive(Debug, Default)]
pub struct SharedPreferences {
    inner: RwLock<Preferences>,
}

impl SharedPreferences {
    pub fn new(prefs: Preferences) -> Self {
        Self {
            inner: RwLock::new(prefs),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut Preferences)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl PreferencesSource for SharedPreferences {
    fn current(&self) -> Preferences {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Preferences backed by a JSON file that is re-read on every access.
#[derive(Debug, Clone)]
pub struct PreferencesFile {
    path: PathBuf,
}

impl PreferencesFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferencesSource for PreferencesFile {
    fn current(&self) -> Preferences {
        match Preferences::load(&self.path) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("Using default preferences: {:#}", e);
                Preferences::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(interpreter: Interpreter, shell: ShellEscape) -> Preferences {
        Preferences {
            latex_interpreter: interpreter,
            build_option_system_commands: shell,
            ..Preferences::default()
        }
    }

    #[test]
    fn test_shell_escape_arguments_pdflatex() {
        let p = prefs(Interpreter::Pdflatex, ShellEscape::Disable);
        assert_eq!(p.shell_escape_arguments(), " -no-shell-escape");
        let p = prefs(Interpreter::Xelatex, ShellEscape::Restricted);
        assert_eq!(p.shell_escape_arguments(), " -shell-restricted");
        let p = prefs(Interpreter::Pdflatex, ShellEscape::Enable);
        assert_eq!(p.shell_escape_arguments(), " -shell-escape");
    }

    #[test]
    fn test_shell_escape_arguments_lualatex() {
        let p = prefs(Interpreter::Lualatex, ShellEscape::Disable);
        assert_eq!(p.shell_escape_arguments(), " --no-shell-escape");
        let p = prefs(Interpreter::Lualatex, ShellEscape::Enable);
        assert_eq!(p.shell_escape_arguments(), " --shell-escape");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("lualatex".parse::<Interpreter>().unwrap(), Interpreter::Lualatex);
        assert_eq!("restricted".parse::<ShellEscape>().unwrap(), ShellEscape::Restricted);
        assert!("context".parse::<Interpreter>().is_err());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let p: Preferences = serde_json::from_str(r#"{"latex_interpreter":"xelatex"}"#).unwrap();
        assert_eq!(p.latex_interpreter, Interpreter::Xelatex);
        assert!(p.cleanup_build_files);
        assert_eq!(p.build_option_system_commands, ShellEscape::Disable);
    }

    #[test]
    fn test_shared_preferences_update_is_visible() {
        let shared = SharedPreferences::default();
        shared.update(|p| p.use_latexmk = true);
        assert!(shared.current().use_latexmk);
    }
}

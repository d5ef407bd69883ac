use crate::diagnostics::{LogItem, LogMessages};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration failures reported by a build. Ordinary compile errors are
/// not failures; they show up as error-severity log items instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildFailure {
    /// The configured interpreter could not be found.
    InterpreterMissing { interpreter: String },
    /// The interpreter was found but failed to run.
    InterpreterNotWorking { details: String },
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildFailure::InterpreterMissing { interpreter } => {
                write!(f, "LaTeX interpreter '{}' is missing", interpreter)
            }
            BuildFailure::InterpreterNotWorking { details } => {
                write!(f, "LaTeX interpreter failed to run: {}", details)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildResult {
    pub pdf_filename: Option<PathBuf>,
    pub log_messages: LogMessages,
    pub bibtex_log_messages: Vec<LogItem>,
    pub has_synctex_file: bool,
    pub error: Option<BuildFailure>,
}

impl BuildResult {
    pub fn failed(error: BuildFailure) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A highlighted region on an output page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncRectangle {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A source position resolved by backward sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPosition {
    pub filename: PathBuf,
    pub line: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub word: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// The engine's response to one query.
///
/// A build-flavored query fills `build` and/or `forward_sync`; a
/// backward-sync query fills only `backward_sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultBlob {
    pub build: Option<BuildResult>,
    pub forward_sync: Option<Vec<SyncRectangle>>,
    pub backward_sync: Option<SyncPosition>,
}

impl ResultBlob {
    pub fn for_build(build: Option<BuildResult>, forward_sync: Option<Vec<SyncRectangle>>) -> Self {
        Self {
            build,
            forward_sync,
            backward_sync: None,
        }
    }

    pub fn for_backward_sync(position: Option<SyncPosition>) -> Self {
        Self {
            build: None,
            forward_sync: None,
            backward_sync: position,
        }
    }

    pub fn is_build_flavored(&self) -> bool {
        self.build.is_some() || self.forward_sync.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_classification() {
        assert!(ResultBlob::for_build(Some(BuildResult::default()), None).is_build_flavored());
        assert!(ResultBlob::for_build(None, Some(vec![])).is_build_flavored());
        assert!(!ResultBlob::for_backward_sync(None).is_build_flavored());
        assert!(!ResultBlob::default().is_build_flavored());
    }

    #[test]
    fn test_failure_tag_serialization() {
        let result = BuildResult::failed(BuildFailure::InterpreterMissing {
            interpreter: "lualatex".to_string(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"]["kind"], "interpreter_missing");
        assert_eq!(json["error"]["interpreter"], "lualatex");
        assert!(!result.succeeded());
    }

    #[test]
    fn test_blob_from_partial_json() {
        let blob: ResultBlob = serde_json::from_str(
            r#"{"backward_sync":{"filename":"/doc/chapter.tex","line":7}}"#,
        )
        .unwrap();
        let pos = blob.backward_sync.unwrap();
        assert_eq!(pos.line, 7);
        assert_eq!(pos.offset, 0);
        assert!(blob.build.is_none());
    }
}

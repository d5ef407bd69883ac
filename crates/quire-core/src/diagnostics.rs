use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which BibTeX diagnostics are merged into the per-tool log mapping.
pub const BIBTEX_LOG_KEY: &str = "BibTeX";

/// Per-tool diagnostics, keyed by tool name ("LaTeX", "BibTeX", ...).
pub type LogMessages = BTreeMap<String, Vec<LogItem>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Badbox,
}

/// A single diagnostic entry reported by a tool during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogItem {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl LogItem {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Counts error-severity items across every tool in the mapping.
pub fn error_count(messages: &LogMessages) -> usize {
    messages
        .values()
        .flat_map(|items| items.iter())
        .filter(|item| item.is_error())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_count_spans_tools() {
        let mut messages = LogMessages::new();
        messages.insert(
            "LaTeX".to_string(),
            vec![
                LogItem::new(Severity::Error, "Undefined control sequence").at("main.tex", 12),
                LogItem::new(Severity::Warning, "Label `foo' undefined"),
                LogItem::new(Severity::Badbox, "Overfull \\hbox"),
            ],
        );
        messages.insert(
            BIBTEX_LOG_KEY.to_string(),
            vec![LogItem::new(Severity::Error, "I couldn't open database file")],
        );

        assert_eq!(error_count(&messages), 2);
    }

    #[test]
    fn test_error_count_empty() {
        assert_eq!(error_count(&LogMessages::new()), 0);
    }

    #[test]
    fn test_log_item_optional_fields_skipped() {
        let item = LogItem::new(Severity::Warning, "w");
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("file").is_none());
        assert!(json.get("line").is_none());
    }
}

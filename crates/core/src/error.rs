use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is. Only `Error` blocks IR generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Risk,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Risk => "RISK",
        }
    }
}

/// The compiler stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lexical,
    Syntax,
    Semantic,
}

/// A line-tagged compiler message. Serializes as
/// `{line, type, message, stage}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: u32,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub message: String,
    pub stage: Stage,
}

impl Diagnostic {
    pub fn new(stage: Stage, severity: Severity, line: u32, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            severity,
            message: message.into(),
            stage,
        }
    }

    pub fn lex(line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(Stage::Lexical, Severity::Error, line, message)
    }

    pub fn syntax(line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(Stage::Syntax, Severity::Error, line, message)
    }

    pub fn error(line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(Stage::Semantic, Severity::Error, line, message)
    }

    pub fn warning(line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(Stage::Semantic, Severity::Warning, line, message)
    }

    pub fn risk(line: u32, message: impl Into<String>) -> Self {
        Diagnostic::new(Stage::Semantic, Severity::Risk, line, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] line {}: {}",
            self.severity.as_str(),
            self.line,
            self.message
        )
    }
}

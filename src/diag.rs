//! Compile diagnostics: an ordered record of what happened, mirrored to the `log` facade.
//!
//! The compiler never prints. Every event is pushed here with its source line; the binary
//! decides presentation by installing a logger. Fatal errors are returned as
//! [`CompileError`](crate::CompileError) and recorded once by the caller that gives up.

use log::{error, info, warn};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// New declaration, branch opened, and similar progress events.
    Info,
    /// Recoverable: something was skipped and compilation continued.
    Warning,
    /// The run was aborted.
    Fatal,
}

/// A single diagnostic with location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub severity: Severity,
    pub message: String,
    /// Offending raw text, when there is one.
    pub raw: Option<String>,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, line: usize, message: impl Into<String>) {
        self.push(Diagnostic {
            line,
            severity: Severity::Info,
            message: message.into(),
            raw: None,
        });
    }

    pub fn warn(&mut self, line: usize, message: impl Into<String>, raw: Option<&str>) {
        self.push(Diagnostic {
            line,
            severity: Severity::Warning,
            message: message.into(),
            raw: raw.map(str::to_string),
        });
    }

    pub fn fatal(&mut self, err: &crate::CompileError) {
        self.push(Diagnostic {
            line: err.line,
            severity: Severity::Fatal,
            message: err.kind.to_string(),
            raw: Some(err.raw.clone()),
        });
    }

    pub fn push(&mut self, d: Diagnostic) {
        let raw = d.raw.as_deref().map(|r| format!(" Raw: {}", r)).unwrap_or_default();
        match d.severity {
            Severity::Info => info!("[@Line:{}] {}{}", d.line, d.message, raw),
            Severity::Warning => warn!("[@Line:{}] {}{}", d.line, d.message, raw),
            Severity::Fatal => error!("[@Line:{}] {}{}", d.line, d.message, raw),
        }
        self.messages.push(d);
    }

    /// All diagnostics in the order they were reported.
    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompileError, ErrorKind};

    #[test]
    fn records_in_order_with_severity() {
        let mut d = Diagnostics::new();
        d.info(1, "New Fragment[Pos]");
        d.warn(3, "Skipped unknown info [Q[1]]", Some("X:$1:Q[1]"));
        d.fatal(&CompileError::new(ErrorKind::UnclosedRepeat, 9, "pack"));
        let sev: Vec<_> = d.messages().iter().map(|m| m.severity).collect();
        assert_eq!(sev, vec![Severity::Info, Severity::Warning, Severity::Fatal]);
        assert_eq!(d.warning_count(), 1);
        assert_eq!(d.messages()[2].raw.as_deref(), Some("pack"));
    }
}

//! Error reporting collaborator.
//! Failures are pushed onto an unbounded crossbeam channel for the overlay to
//! display; sending never blocks and a dropped receiver is ignored.

use crossbeam_channel as cb;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Translation,
    Network,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One user-facing failure. `technical_details` keeps raw status and body snippets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub technical_details: String,
}

/// Cheap to clone; every clone feeds the same receiver.
#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    tx: Option<cb::Sender<ErrorReport>>,
}

impl ErrorReporter {
    /// Reporter plus the receiving end the UI drains.
    pub fn channel() -> (Self, cb::Receiver<ErrorReport>) {
        let (tx, rx) = cb::unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// Reporter that drops everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn report(&self, report: ErrorReport) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening.
            let _ = tx.send(report);
        }
    }

    pub fn warning(&self, category: ErrorCategory, message: impl Into<String>, details: impl Into<String>) {
        self.report(ErrorReport {
            category,
            severity: Severity::Warning,
            message: message.into(),
            technical_details: details.into(),
        });
    }

    pub fn error(&self, category: ErrorCategory, message: impl Into<String>, details: impl Into<String>) {
        self.report(ErrorReport {
            category,
            severity: Severity::Error,
            message: message.into(),
            technical_details: details.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_reach_the_receiver() {
        let (reporter, rx) = ErrorReporter::channel();
        reporter
            .clone()
            .warning(ErrorCategory::Network, "Network error: reset", "transport error");
        let got = rx.try_recv().unwrap();
        assert_eq!(got.severity, Severity::Warning);
        assert_eq!(got.message, "Network error: reset");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_and_disabled_reporter_are_silent() {
        let (reporter, rx) = ErrorReporter::channel();
        drop(rx);
        reporter.error(ErrorCategory::Translation, "x", "y");
        ErrorReporter::disabled().error(ErrorCategory::Configuration, "x", "y");
    }
}

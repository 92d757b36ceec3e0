//! Error reporting sink for fault-isolated tree operations.
//!
//! # Responsibility
//! - Receive every error a structural operation swallows (materialization,
//!   reconciliation, observer replay, bulk object retrieval).
//! - Keep the sink injectable instead of process-global.
//!
//! # Invariants
//! - Reporting never fails and never panics.
//! - Point operations do not report; they return their error.

use log::{error, warn};
use std::error::Error;
use std::sync::{Mutex, MutexGuard};

/// One swallowed error with its diagnostic context.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReport<'a> {
    /// Human-readable context, usually naming the node path.
    pub context: Option<&'a str>,
    /// Add-in that contributed the failing element, when known.
    pub addin_id: Option<&'a str>,
    /// Underlying failure, if one exists.
    pub error: Option<&'a (dyn Error + 'static)>,
    /// Set by host code sharing the sink. Reports raised by
    /// [`ExtensionTree`](crate::ExtensionTree) are always non-fatal.
    pub fatal: bool,
}

/// Receiver of non-propagated errors.
///
/// The extension tree only reports failures it has already recovered from,
/// so every report it raises has `fatal == false`. Hosts may route their own
/// fatal failures through the same sink.
pub trait ErrorSink {
    fn report(&self, report: ErrorReport<'_>);
}

/// Sink writing reports through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, report: ErrorReport<'_>) {
        let context = report.context.unwrap_or("-");
        let addin_id = report.addin_id.unwrap_or("-");
        let cause = report
            .error
            .map(error_chain)
            .unwrap_or_else(|| "-".to_string());
        if report.fatal {
            error!(
                "event=extension_error module=report status=error fatal=true addin_id={addin_id} context=\"{context}\" error=\"{cause}\""
            );
        } else {
            warn!(
                "event=extension_error module=report status=degraded fatal=false addin_id={addin_id} context=\"{context}\" error=\"{cause}\""
            );
        }
    }
}

/// Owned copy of one [`ErrorReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub context: Option<String>,
    pub addin_id: Option<String>,
    /// Rendered error chain (`outer: inner: ...`).
    pub error: Option<String>,
    pub fatal: bool,
}

/// Sink that keeps every report in memory for later inspection.
#[derive(Debug, Default)]
pub struct CollectingErrorSink {
    records: Mutex<Vec<ReportRecord>>,
}

impl CollectingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ReportRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drains and returns the collected records.
    pub fn take(&self) -> Vec<ReportRecord> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ReportRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ErrorSink for CollectingErrorSink {
    fn report(&self, report: ErrorReport<'_>) {
        self.lock().push(ReportRecord {
            context: report.context.map(str::to_string),
            addin_id: report.addin_id.map(str::to_string),
            error: report.error.map(error_chain),
            fatal: report.fatal,
        });
    }
}

/// Renders an error and its sources as `outer: inner: ...`.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered.replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::{error_chain, CollectingErrorSink, ErrorReport, ErrorSink, LogErrorSink};
    use crate::backing::BackingTreeError;

    #[test]
    fn collecting_sink_records_error_chain() {
        let sink = CollectingErrorSink::new();
        let err = BackingTreeError::Condition {
            path: "/Menu/Item".to_string(),
            source: "backend\noffline".into(),
        };
        sink.report(ErrorReport {
            context: Some("evaluating visibility"),
            addin_id: Some("demo.core"),
            error: Some(&err),
            fatal: false,
        });

        let records = sink.take();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].error.as_deref(),
            Some("condition evaluation failed for `/Menu/Item`: backend offline")
        );
        assert_eq!(records[0].addin_id.as_deref(), Some("demo.core"));
        assert!(sink.is_empty());
    }

    #[test]
    fn log_sink_accepts_fatal_host_reports() {
        let err = BackingTreeError::RootNotRemovable;
        LogErrorSink.report(ErrorReport {
            context: Some("host shutdown"),
            addin_id: None,
            error: Some(&err),
            fatal: true,
        });
        LogErrorSink.report(ErrorReport {
            context: None,
            addin_id: None,
            error: None,
            fatal: false,
        });
    }

    #[test]
    fn error_chain_renders_single_error() {
        let err = BackingTreeError::RootNotRemovable;
        assert_eq!(error_chain(&err), "the root backing node cannot be removed");
    }
}

// Append-only failure log — collects fetch errors and renders the final report.

use std::fmt::Write as _;

use parking_lot::Mutex;

use crate::source::traits::FetchError;

/// One recorded fetch failure.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// Resolved locator of the artifact that failed.
    pub locator: String,
    /// HTTP status, when the failure carried one.
    pub status: Option<u16>,
    /// Human-readable failure message.
    pub message: String,
}

impl ErrorRecord {
    pub fn from_fetch(locator: &str, err: &FetchError) -> Self {
        Self {
            locator: locator.to_string(),
            status: err.status,
            message: err.to_string(),
        }
    }

    fn status_info(&self) -> String {
        match self.status {
            Some(code) => format!("HTTP {}", code),
            None => "transport".to_string(),
        }
    }
}

/// Append-only collection of fetch failures. Recording never fails; the
/// report is rendered once, after the lifecycle pass completes.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    records: Mutex<Vec<ErrorRecord>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: ErrorRecord) {
        self.records.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Clone out the recorded failures.
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Render the multi-section failure summary.
    pub fn report(&self) -> String {
        let records = self.records.lock();
        let mut out = String::new();

        let _ = writeln!(out, "========================================================");
        let _ = writeln!(out, "                    {} errors found", records.len());
        let _ = writeln!(out, "========================================================");

        for record in records.iter() {
            let _ = writeln!(out, "File: {}", record.locator);
            let _ = writeln!(out, "Status: {}", record.status_info());
            let _ = writeln!(out, "Message: {}", record.message);
            let _ = writeln!(out, "--------------------------------------------------------");
        }

        out
    }
}

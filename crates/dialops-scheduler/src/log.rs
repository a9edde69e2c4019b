//! Execution log — the operator-facing audit trail for a scheduling run.
//!
//! Newest-first, append-only during a run, cleared only on operator
//! request. Lives in memory for the session; it is not persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Newest-first log of scheduler outcomes.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend one entry (newest first) and mirror it to tracing.
    pub fn append(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("📞 {message}");
        self.entries.insert(
            0,
            LogEntry {
                timestamp: Utc::now(),
                message,
            },
        );
    }

    /// Newest-first view, optionally limited.
    pub fn entries(&self, limit: Option<usize>) -> &[LogEntry] {
        match limit {
            Some(n) => &self.entries[..n.min(self.entries.len())],
            None => &self.entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let mut log = ExecutionLog::new();
        log.append("first");
        log.append("second");
        assert_eq!(log.entries(None)[0].message, "second");
        assert_eq!(log.entries(None)[1].message, "first");
    }

    #[test]
    fn test_limit_and_clear() {
        let mut log = ExecutionLog::new();
        for i in 0..5 {
            log.append(format!("entry {i}"));
        }
        assert_eq!(log.entries(Some(2)).len(), 2);
        assert_eq!(log.entries(Some(99)).len(), 5);
        log.clear();
        assert!(log.is_empty());
    }
}

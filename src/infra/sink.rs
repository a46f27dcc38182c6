//! Error sinks: the production sink forwards to `tracing`, the memory sink
//! records reports for assertions.

use std::error::Error as StdError;
use std::sync::Mutex;

use serde_json::Value;
use tracing::{error, warn};

use crate::application::report::{ErrorContext, ErrorSink, Severity};
use crate::cache::lock::mutex_lock;

const SOURCE: &str = "infra::sink::MemorySink";

fn error_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

/// Logs every report with its full source chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, err: &(dyn StdError + 'static), context: &ErrorContext) {
        let chain = error_chain(err);
        match context.severity {
            Severity::Error => error!(
                target = "storefront::report",
                endpoint = context.endpoint,
                severity = %context.severity,
                extra = %context.extra,
                chain = ?chain,
                "{err}"
            ),
            Severity::Warning => warn!(
                target = "storefront::report",
                endpoint = context.endpoint,
                severity = %context.severity,
                extra = %context.extra,
                chain = ?chain,
                "{err}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportedError {
    pub endpoint: &'static str,
    pub severity: Severity,
    pub message: String,
    pub chain: Vec<String>,
    pub extra: Value,
}

/// Keeps reports in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<ReportedError>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<ReportedError> {
        mutex_lock(&self.entries, SOURCE, "entries").clone()
    }

    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }
}

impl ErrorSink for MemorySink {
    fn report(&self, err: &(dyn StdError + 'static), context: &ErrorContext) {
        let entry = ReportedError {
            endpoint: context.endpoint,
            severity: context.severity,
            message: err.to_string(),
            chain: error_chain(err),
            extra: context.extra.clone(),
        };
        mutex_lock(&self.entries, SOURCE, "report").push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;
    use crate::application::products::ActionError;

    #[test]
    fn memory_sink_keeps_chain_and_context() {
        let sink = MemorySink::default();
        let err = ActionError::from_repo(
            RepoError::Persistence("connection reset".into()),
            "Failed to update stock",
        );

        sink.report(
            &err,
            &ErrorContext::new("actions::update_product_stock")
                .with_extra(serde_json::json!({ "id": "abc" })),
        );

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Failed to update stock");
        assert_eq!(entries[0].chain.len(), 2);
        assert_eq!(entries[0].extra["id"], "abc");
        assert_eq!(entries[0].severity, Severity::Error);
    }
}

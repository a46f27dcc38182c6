//! Error reporting seam.
//!
//! Services report every caught failure here before converting it into a
//! public result, so operators see the full chain even when callers only get
//! a generic message.

use std::error::Error as StdError;
use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Operation that failed, e.g. `actions::update_product_stock`.
    pub endpoint: &'static str,
    pub severity: Severity,
    /// Free-form structured detail such as the product id.
    pub extra: Value,
}

impl ErrorContext {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            severity: Severity::Error,
            extra: Value::Null,
        }
    }

    pub fn warning(endpoint: &'static str) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::new(endpoint)
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }
}

pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &(dyn StdError + 'static), context: &ErrorContext);
}

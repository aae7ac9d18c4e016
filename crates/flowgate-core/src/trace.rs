//! Debug execution records.
//!
//! Only produced when the plan's debug flag is set. The finished trace is
//! stored in the context under [`TRACE_KEY`] before end hooks run.

use serde::Serialize;

use crate::category::Category;
use crate::error::FlowError;

/// Context store key holding the [`FlowTrace`].
pub const TRACE_KEY: &str = "trace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitOutcome {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceOutcome {
    Ok,
    Aborted,
    Error,
    Cancelled,
}

/// Single unit execution record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub unit: String,
    pub category: Category,
    pub duration_ms: f64,
    pub outcome: UnitOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Client-safe summary of the error that ended a traced flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceFailure {
    pub status: u16,
    pub code: &'static str,
    pub detail: String,
}

impl From<&FlowError> for TraceFailure {
    fn from(e: &FlowError) -> Self {
        Self {
            status: e.status(),
            code: e.code().as_str(),
            detail: e.detail().to_string(),
        }
    }
}

/// Structured record of one flow execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowTrace {
    pub entries: Vec<TraceEntry>,
    pub total_duration_ms: f64,
    pub outcome: TraceOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TraceFailure>,
}

impl Default for FlowTrace {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            total_duration_ms: 0.0,
            outcome: TraceOutcome::Ok,
            error: None,
        }
    }
}

impl FlowTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed_entries(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries
            .iter()
            .filter(|e| e.outcome == UnitOutcome::Failed)
    }
}

//! Agent-related types: steps, traces, outcomes, errors.

use serde::Serialize;
use serde_json::Value;

use crate::tool::{Observation, ToolErrorKind};

/// One Thought/Action/Observation step of a trace.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    /// 1-based position in the trace
    pub iteration: usize,
    pub thought: String,
    /// Name of the tool invoked
    pub action: String,
    pub action_input: Value,
    pub observation: Option<Observation>,
    /// Exactly one step per trace is terminal
    pub terminal: bool,
}

/// Ordered record of the steps produced by one request.
///
/// Owned by the in-flight request; summarized into a session message and
/// discarded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    pub steps: Vec<AgentStep>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn push(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    /// Observations in production order.
    pub fn observations(&self) -> Vec<Observation> {
        self.steps
            .iter()
            .filter_map(|s| s.observation.clone())
            .collect()
    }

    /// How many times the named tool has failed in this trace.
    pub fn failures_for(&self, tool: &str) -> usize {
        self.steps
            .iter()
            .filter_map(|s| s.observation.as_ref())
            .filter(|o| o.tool == tool && o.is_error())
            .count()
    }

    /// Error kind of the most recent observation, if it failed.
    pub fn last_error_kind(&self) -> Option<ToolErrorKind> {
        self.steps
            .last()
            .and_then(|s| s.observation.as_ref())
            .and_then(|o| o.error.as_ref())
            .map(|e| e.kind)
    }

    /// Mark the final step terminal. A trace carries exactly one terminal
    /// step.
    pub fn mark_terminal(&mut self) {
        if let Some(last) = self.steps.last_mut() {
            last.terminal = true;
        }
    }

    pub fn terminal_count(&self) -> usize {
        self.steps.iter().filter(|s| s.terminal).count()
    }
}

/// Final product of one agent run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    /// User-surface answer, footer included
    pub answer: String,
    /// Unique tool names that produced observations, in first-use order
    pub tools_used: Vec<String>,
    /// Leading numeric-prediction confidence, when one was made
    pub confidence: Option<f64>,
    /// True when the iteration cap or deadline cut the loop short
    pub truncated: bool,
    pub execution_ms: u64,
    pub trace: Trace,
}

/// Errors that abort an agent run outright.
///
/// Most tool failures become observations instead; only internal faults
/// and a fully unavailable backend set surface here.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A tool hit an unexpected internal failure; the trace is aborted
    #[error("unable to process the request: {0}")]
    Internal(String),

    /// Every tool, including generation, failed
    #[error("no backend could answer the query: {0}")]
    AllBackendsFailed(String),

    /// The agent was built against a registry missing a required tool
    #[error("agent misconfigured: {0}")]
    Configuration(String),
}

//! The ReAct state machine.
//!
//! `START → PLAN → ACT → OBSERVE → {PLAN, SYNTHESIZE} → DONE`
//!
//! Transitions are pure functions over the loop signals; all side
//! effects (tool calls, store writes) live in the ACT handler inside
//! `run`. Cancellation — the request deadline — is an input to every
//! transition, never an exception.

use std::sync::OnceLock;

use regex::Regex;

use crate::router::RoutingDecision;
use crate::tool::{Observation, ToolErrorKind};

/// States of the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Start,
    Plan,
    Act,
    Observe,
    Synthesize,
    Done,
}

/// Inputs to the post-OBSERVE transition.
#[derive(Debug, Clone, Copy)]
pub struct LoopSignals {
    pub deadline_expired: bool,
    pub iteration_cap_reached: bool,
    /// Error kind of the last observation, when it failed
    pub last_error: Option<ToolErrorKind>,
    /// A transient failure can still be retried via an alternative
    pub retry_available: bool,
    /// The tool that just ran declares its success terminal
    pub last_tool_terminal: bool,
    /// The needs-more predicate over accumulated observations
    pub needs_more: bool,
}

/// Transition out of START.
///
/// High-confidence routing to a self-sufficient tool skips planning and
/// goes straight to ACT.
pub fn initial_state(decision: &RoutingDecision, chosen_terminal: bool) -> AgentState {
    if decision.permits_direct() && chosen_terminal {
        AgentState::Act
    } else {
        AgentState::Plan
    }
}

/// Transition out of OBSERVE.
pub fn after_observe(signals: &LoopSignals) -> AgentState {
    if signals.deadline_expired || signals.iteration_cap_reached {
        return AgentState::Synthesize;
    }

    match signals.last_error {
        // Not retried: the driver surfaces a clarifying answer.
        Some(ToolErrorKind::InvalidInput) => AgentState::Synthesize,
        Some(ToolErrorKind::Timeout) | Some(ToolErrorKind::BackendUnavailable)
            if signals.retry_available =>
        {
            AgentState::Plan
        }
        // Retries exhausted or non-transient: synthesize on what we have.
        Some(_) => AgentState::Synthesize,
        None if !signals.last_tool_terminal || signals.needs_more => AgentState::Plan,
        None => AgentState::Synthesize,
    }
}

/// Whether the loop would continue were it not for the cap or deadline.
///
/// Drives the `truncated` flag on forced synthesis.
pub fn would_continue(signals: &LoopSignals) -> bool {
    let unbounded = LoopSignals {
        deadline_expired: false,
        iteration_cap_reached: false,
        ..*signals
    };
    after_observe(&unbounded) == AgentState::Plan
}

/// The needs-more predicate: true when any observation flags a followup,
/// when the query asks for staged composition, or when nothing yielded
/// primary content yet.
///
/// Composition markers are "then", "analysis"-family words, and "and"
/// when it introduces a second action clause ("and summarize it"); a
/// bare "and" joining measurements ("rainfall and fertilizer") is not a
/// marker. Each marker asks for one more stage beyond the first; the
/// hint saturates once that many observations carry content, otherwise
/// a single "then" would spend the whole iteration budget.
pub fn needs_more(query: &str, observations: &[Observation]) -> bool {
    if observations.iter().any(Observation::needs_followup) {
        return true;
    }

    let with_content = observations.iter().filter(|o| o.has_content()).count();

    static COMPOSITION: OnceLock<Regex> = OnceLock::new();
    let composition = COMPOSITION.get_or_init(|| {
        Regex::new(
            r"\b(?:then|after that|analy[sz]e|analysis|and\s+(?:summari[sz]e|compare|explain|describe|recommend|suggest|list|check|find|search|translate|predict|estimate|forecast))\b",
        )
        .expect("static pattern compiles")
    });
    let markers = composition.find_iter(&query.to_lowercase()).count();
    if markers > 0 && with_content < markers + 1 {
        return true;
    }

    with_content == 0
}

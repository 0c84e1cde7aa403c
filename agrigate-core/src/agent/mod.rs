//! The ReAct agent: bounded Thought/Action/Observation iteration over the
//! registered tools, followed by a single synthesis call.
//!
//! The agent owns no mutable process state; it borrows the registry and
//! router from the composition root and produces a [`Trace`] per request.

mod run;
mod state;
mod types;

pub use state::{after_observe, initial_state, needs_more, would_continue, AgentState, LoopSignals};
pub use types::{AgentError, AgentOutcome, AgentStep, Trace};

use std::sync::Arc;
use std::time::Duration;

use crate::registry::ToolRegistry;
use crate::router::QueryRouter;
use crate::session::Attachment;

/// Default ReAct iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Default overall request deadline.
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(60);

/// How a request wants the loop driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentMode {
    /// Full ReAct loop up to the iteration cap
    #[default]
    Auto,
    /// Single tool invocation, then synthesis
    Direct,
}

/// One query on its way into the agent.
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    pub query: &'a str,
    pub attachment: Option<&'a Attachment>,
    pub mode: AgentMode,
}

impl<'a> AgentRequest<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            query,
            attachment: None,
            mode: AgentMode::Auto,
        }
    }

    pub fn with_attachment(mut self, attachment: &'a Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_mode(mut self, mode: AgentMode) -> Self {
        self.mode = mode;
        self
    }
}

/// The query-answering agent.
pub struct Agent {
    registry: Arc<ToolRegistry>,
    router: QueryRouter,
    max_iterations: usize,
    deadline: Duration,
    generation_tool: String,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("max_iterations", &self.max_iterations)
            .field("deadline", &self.deadline)
            .field("generation_tool", &self.generation_tool)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    registry: Option<Arc<ToolRegistry>>,
    max_iterations: usize,
    deadline: Duration,
    generation_tool: String,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            deadline: DEFAULT_REQUEST_DEADLINE,
            generation_tool: "generate".to_string(),
        }
    }
}

impl AgentBuilder {
    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Name of the generation tool the synthesizer and router fallback
    /// use.
    pub fn generation_tool(mut self, name: impl Into<String>) -> Self {
        self.generation_tool = name.into();
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let registry = self
            .registry
            .ok_or_else(|| AgentError::Configuration("no tool registry provided".to_string()))?;
        if registry.lookup(&self.generation_tool).is_none() {
            return Err(AgentError::Configuration(format!(
                "generation tool {} is not registered",
                self.generation_tool
            )));
        }
        Ok(Agent {
            router: QueryRouter::new(self.generation_tool.clone()),
            registry,
            max_iterations: self.max_iterations,
            deadline: self.deadline,
            generation_tool: self.generation_tool,
        })
    }
}

//! # agrigate-core
//!
//! Orchestration core of the agrigate agricultural question-answering
//! gateway: the tool contract and registry, the query router, the ReAct
//! agent loop, the prompt/result formatter, the conversation store
//! contract, and identity/auth.
//!
//! A query flows: router proposes a tool → registry resolves its handler
//! and input extractor → the agent invokes it under a timeout → the
//! observation is recorded → the loop continues or synthesizes a final
//! answer through the generation tool.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use agrigate_core::{Agent, AgentRequest, ToolRegistry};
//!
//! # async fn example(registry: ToolRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! let agent = Agent::builder()
//!     .registry(Arc::new(registry))
//!     .max_iterations(5)
//!     .generation_tool("generate")
//!     .build()?;
//!
//! let outcome = agent
//!     .run(AgentRequest::new("Predict wheat yield with 800mm rainfall"))
//!     .await?;
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```
//!
//! Concrete tools (predictors, retrieval, web search, translation,
//! generation, weather) live in the `agrigate-tools` crate; the HTTP
//! surface lives in `agrigate-server`.

pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod formatter;
pub mod registry;
pub mod router;
pub mod session;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, AgentError, AgentMode, AgentOutcome, AgentRequest, AgentStep, Trace,
    DEFAULT_MAX_ITERATIONS, DEFAULT_REQUEST_DEADLINE,
};
pub use auth::{
    AdminOp, AuthError, AuthService, Claims, MemoryUserStore, Role, TokenSigner, User, UserStore,
};
pub use config::{ConfigError, GatewayConfig};
pub use error::{Error, Result};
pub use formatter::{AnswerMeta, TranslationBridge, CANONICAL_LANG};
pub use registry::{
    query_field_extractor, ExtractionContext, InputExtractor, RegistryError, ToolEntry,
    ToolRegistry,
};
pub use router::{QueryRouter, RoutingDecision, DIRECT_CONFIDENCE, SCORE_FLOOR};
pub use session::{
    derive_title, Attachment, ConversationStore, MemoryConversationStore, Message,
    MessageMetadata, MessageRole, Session, SessionError, SessionSummary,
};
pub use tool::{
    box_tool, DynTool, Observation, ObservationError, Tool, ToolCategory, ToolError,
    ToolErrorKind, ToolOutput, DEFAULT_TOOL_TIMEOUT, GENERATION_TIMEOUT, SEARCH_TIMEOUT,
};

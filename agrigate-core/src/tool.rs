use std::time::Duration;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default per-tool invocation timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for generation (language model) calls.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for external web search calls.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Functional category a tool belongs to.
///
/// Categories drive router scoring (structural hints only apply to
/// prediction tools) and `ToolRegistry::list` filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    Prediction,
    Retrieval,
    Generation,
    ExternalSearch,
    Translation,
    Utility,
}

/// Result payload a tool can return.
///
/// Most tools return structured JSON; plain text is used by tools whose
/// backend produces prose (generation, synthesized search answers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolOutput {
    /// Plain text response
    Text(String),

    /// Structured JSON data
    Json(Value),
}

impl ToolOutput {
    /// Create a JSON output from any serializable type
    pub fn json<T: Serialize>(value: T) -> Result<Self, serde_json::Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Create a text output from a string
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Get a reference to the JSON payload if this is a Json variant
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ToolOutput::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Render the payload as text for prompts and logs
    pub fn as_text(&self) -> String {
        match self {
            ToolOutput::Text(s) => s.clone(),
            ToolOutput::Json(v) => v.to_string(),
        }
    }

    /// Whether the payload carries any primary content.
    ///
    /// Empty text, empty objects, and empty result arrays all count as
    /// content-free; the agent's needs-more predicate relies on this.
    pub fn has_content(&self) -> bool {
        match self {
            ToolOutput::Text(s) => !s.trim().is_empty(),
            ToolOutput::Json(Value::Null) => false,
            ToolOutput::Json(Value::Object(obj)) => !obj.is_empty(),
            ToolOutput::Json(Value::Array(items)) => !items.is_empty(),
            ToolOutput::Json(_) => true,
        }
    }
}

impl From<String> for ToolOutput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ToolOutput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Errors a tool invocation can produce.
///
/// The variants are the wire-level error kinds: everything a backend can
/// do wrong collapses into one of these five.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Caller-supplied data violates the tool's declared schema or ranges
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend could not be reached or returned a server failure
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend was reached but rejected the request
    #[error("backend rejected request: {0}")]
    BackendRejected(String),

    /// The invocation exceeded the tool's timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Unexpected failure inside the tool itself
    #[error("internal tool error: {0}")]
    Internal(String),
}

impl ToolError {
    /// The domain-level kind of this error
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::InvalidInput(_) => ToolErrorKind::InvalidInput,
            ToolError::BackendUnavailable(_) => ToolErrorKind::BackendUnavailable,
            ToolError::BackendRejected(_) => ToolErrorKind::BackendRejected,
            ToolError::Timeout(_) => ToolErrorKind::Timeout,
            ToolError::Internal(_) => ToolErrorKind::Internal,
        }
    }

    /// Whether retrying against an alternative tool is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ToolError::BackendUnavailable(_) | ToolError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// Discriminant of [`ToolError`], serialized into error observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolErrorKind {
    InvalidInput,
    BackendUnavailable,
    BackendRejected,
    Timeout,
    Internal,
}

/// The recorded result of one tool invocation inside a trace.
///
/// A failed invocation becomes an error observation rather than
/// terminating the loop; the agent decides what to do with it.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    /// Name of the tool that produced this observation
    pub tool: String,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ToolOutput>,
    /// Error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ObservationError>,
}

/// Error half of an observation
#[derive(Debug, Clone, Serialize)]
pub struct ObservationError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl Observation {
    pub fn success(tool: impl Into<String>, payload: ToolOutput) -> Self {
        Self {
            tool: tool.into(),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(tool: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool: tool.into(),
            payload: None,
            error: Some(ObservationError {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether this observation carries non-empty primary content
    pub fn has_content(&self) -> bool {
        self.payload.as_ref().map(|p| p.has_content()).unwrap_or(false)
    }

    /// Whether the tool flagged its own output as incomplete
    pub fn needs_followup(&self) -> bool {
        self.payload
            .as_ref()
            .and_then(|p| p.as_json())
            .and_then(|v| v.get("needs_followup"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Trait for implementing tools the agent can route queries to.
///
/// Tools define an input type with `#[derive(Deserialize, JsonSchema)]`;
/// the input schema is generated from the type at runtime. Beyond the
/// invocation contract, a tool declares the routing metadata the query
/// router scores it with: keywords, regex patterns, unit hints, and a
/// tie-break priority.
///
/// # Example
///
/// ```rust
/// use agrigate_core::{Tool, ToolCategory, ToolError, ToolOutput};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct FrostInput {
///     /// Minimum overnight temperature in Celsius
///     min_temp_c: f64,
/// }
///
/// struct FrostRiskTool;
///
/// impl Tool for FrostRiskTool {
///     type Input = FrostInput;
///
///     fn name(&self) -> &str { "frost_risk" }
///     fn description(&self) -> &str { "Assess overnight frost risk for standing crops" }
///     fn category(&self) -> ToolCategory { ToolCategory::Prediction }
///     fn keywords(&self) -> &[&'static str] { &["frost", "freeze", "cold"] }
///
///     fn execute(&self, input: Self::Input) -> impl std::future::Future<Output = Result<ToolOutput, ToolError>> + Send {
///         async move {
///             let at_risk = input.min_temp_c < 2.0;
///             ToolOutput::json(serde_json::json!({ "at_risk": at_risk })).map_err(Into::into)
///         }
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The input type for this tool. Must implement `Deserialize` and `JsonSchema`.
    type Input: DeserializeOwned + JsonSchema;

    /// Stable, unique tool name (e.g. "predict_yield")
    fn name(&self) -> &str;

    /// One-line description of what the tool does
    fn description(&self) -> &str;

    /// Functional category
    fn category(&self) -> ToolCategory;

    /// Keywords the router checks for whole-word presence in the query
    fn keywords(&self) -> &[&'static str] {
        &[]
    }

    /// Regex sources matched against the lowercased query.
    ///
    /// Compiled once at registration; an invalid pattern fails
    /// registration, not routing.
    fn patterns(&self) -> &[&'static str] {
        &[]
    }

    /// Measurement units whose presence next to a number favors this tool
    /// (prediction tools only)
    fn unit_hints(&self) -> &[&'static str] {
        &[]
    }

    /// Tie-break priority; higher wins
    fn priority(&self) -> i32 {
        0
    }

    /// Whether a successful output is sufficient to answer the query
    /// without further tool calls
    fn terminal_on_success(&self) -> bool {
        true
    }

    /// Whether an attached image forces routing to this tool
    fn accepts_image(&self) -> bool {
        false
    }

    /// Per-invocation timeout enforced by the agent
    fn timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }

    /// Execute the tool with typed input
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl std::future::Future<Output = Result<ToolOutput, ToolError>> + Send;

    /// JSON schema for this tool's input, generated from the type definition
    fn input_schema(&self) -> Value {
        let schema = schemars::schema_for!(Self::Input);
        serde_json::to_value(schema).expect("schema serialization cannot fail")
    }
}

/// Object-safe trait for dynamic tool dispatch (used by the registry).
///
/// Implement [`Tool`] instead and convert with [`box_tool`].
pub trait DynTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn category(&self) -> ToolCategory;
    fn keywords(&self) -> &[&'static str];
    fn patterns(&self) -> &[&'static str];
    fn unit_hints(&self) -> &[&'static str];
    fn priority(&self) -> i32;
    fn terminal_on_success(&self) -> bool;
    fn accepts_image(&self) -> bool;
    fn timeout(&self) -> Duration;
    fn input_schema(&self) -> Value;

    /// Deserialize `input` against the declared schema and execute.
    fn invoke_raw(
        &self,
        input: Value,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<ToolOutput, ToolError>> + Send + '_>,
    >;
}

/// Convert a [`Tool`] into a type-erased `Box<dyn DynTool>` for registration.
pub fn box_tool<T: Tool + 'static>(tool: T) -> Box<dyn DynTool> {
    Box::new(ToolWrapper(tool))
}

struct ToolWrapper<T>(T);

impl<T: Tool + 'static> DynTool for ToolWrapper<T> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn description(&self) -> &str {
        self.0.description()
    }

    fn category(&self) -> ToolCategory {
        self.0.category()
    }

    fn keywords(&self) -> &[&'static str] {
        self.0.keywords()
    }

    fn patterns(&self) -> &[&'static str] {
        self.0.patterns()
    }

    fn unit_hints(&self) -> &[&'static str] {
        self.0.unit_hints()
    }

    fn priority(&self) -> i32 {
        self.0.priority()
    }

    fn terminal_on_success(&self) -> bool {
        self.0.terminal_on_success()
    }

    fn accepts_image(&self) -> bool {
        self.0.accepts_image()
    }

    fn timeout(&self) -> Duration {
        self.0.timeout()
    }

    fn input_schema(&self) -> Value {
        self.0.input_schema()
    }

    fn invoke_raw(
        &self,
        input: Value,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<ToolOutput, ToolError>> + Send + '_>,
    > {
        Box::pin(async move {
            let typed_input: T::Input = serde_json::from_value(input)
                .map_err(|e| ToolError::InvalidInput(format!("malformed tool input: {}", e)))?;

            self.0.execute(typed_input).await
        })
    }
}

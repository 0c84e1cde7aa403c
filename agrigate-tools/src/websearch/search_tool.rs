use std::time::Duration;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput, SEARCH_TIMEOUT};
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How thoroughly the provider should search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

/// Input for external web search
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WebSearchInput {
    /// Search query text
    pub query: String,

    /// Search depth (default basic)
    #[serde(default)]
    pub depth: SearchDepth,

    /// Number of results to return (1–10, default 5)
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Restrict results to these domains
    #[serde(default)]
    pub include_domains: Option<Vec<String>>,
}

fn default_max_results() -> usize {
    5
}

/// Web search against an external provider.
pub struct WebSearchTool {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl WebSearchTool {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("HTTP client construction cannot fail");
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

impl Tool for WebSearchTool {
    type Input = WebSearchInput;

    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current agricultural information"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ExternalSearch
    }

    fn keywords(&self) -> &[&'static str] {
        &["latest", "news", "current", "price", "market", "today", "recent"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[r"\b(latest|current|today|recent|news)\b", r"\bmarket price\b"]
    }

    fn priority(&self) -> i32 {
        5
    }

    fn timeout(&self) -> Duration {
        SEARCH_TIMEOUT
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if input.query.trim().is_empty() {
            return Err(ToolError::InvalidInput("query must not be empty".into()));
        }
        if !(1..=10).contains(&input.max_results) {
            return Err(ToolError::InvalidInput(format!(
                "max_results must be between 1 and 10, got {}",
                input.max_results
            )));
        }

        let mut body = json!({
            "query": input.query,
            "search_depth": input.depth,
            "max_results": input.max_results,
        });
        if let Some(key) = &self.api_key {
            body["api_key"] = json!(key);
        }
        if let Some(domains) = &input.include_domains {
            body["include_domains"] = json!(domains);
        }

        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(format!("search provider: {}", e))
                } else {
                    ToolError::BackendUnavailable(format!("search provider: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ToolError::BackendUnavailable(format!(
                "search provider returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ToolError::BackendRejected(format!(
                "search provider returned {}",
                status
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ToolError::BackendUnavailable(format!("malformed search response: {}", e)))?;

        let results = payload.get("results").cloned().unwrap_or_else(|| json!([]));
        let mut output = json!({ "results": results });
        if let Some(answer) = payload.get("answer").filter(|a| !a.is_null()) {
            output["answer"] = answer.clone();
        }
        ToolOutput::json(output).map_err(Into::into)
    }
}

/// Forward the whole query into [`WebSearchInput`].
pub fn web_search_extractor() -> InputExtractor {
    Box::new(|cx| Ok(json!({ "query": cx.query })))
}

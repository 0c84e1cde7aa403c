use std::time::Duration;

use agrigate_core::{
    formatter, InputExtractor, Tool, ToolCategory, ToolError, ToolOutput, GENERATION_TIMEOUT,
};
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

/// Input for language-model generation
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerationInput {
    /// Prompt to complete
    pub prompt: String,

    /// Token budget for the completion
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Generation against an external completion endpoint.
///
/// Repetition control is the backend's concern, not the agent's; the
/// request passes the knobs through untouched.
pub struct HttpGenerationTool {
    client: Client,
    base_url: String,
}

impl HttpGenerationTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("HTTP client construction cannot fail");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Tool for HttpGenerationTool {
    type Input = GenerationInput;

    fn name(&self) -> &str {
        "generate"
    }

    fn description(&self) -> &str {
        "Generate text with the language model"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Generation
    }

    fn timeout(&self) -> Duration {
        GENERATION_TIMEOUT
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if input.prompt.trim().is_empty() {
            return Err(ToolError::InvalidInput("prompt must not be empty".into()));
        }

        let response = self
            .client
            .post(&self.base_url)
            .json(&json!({
                "prompt": input.prompt,
                "max_tokens": input.max_tokens,
                "temperature": input.temperature,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(format!("generation backend: {}", e))
                } else {
                    ToolError::BackendUnavailable(format!("generation backend: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ToolError::BackendUnavailable(format!(
                "generation backend returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ToolError::BackendRejected(format!(
                "generation backend returned {}",
                status
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            ToolError::BackendUnavailable(format!("malformed generation response: {}", e))
        })?;

        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ToolError::BackendUnavailable("generation response missing text".into())
            })?;

        ToolOutput::json(json!({
            "text": text,
            "tokens_used": payload.get("tokens_used").cloned().unwrap_or(Value::Null),
        }))
        .map_err(Into::into)
    }
}

/// Deterministic generation stand-in.
///
/// Reflects the observation lines of the prompt back as a readable
/// summary. Used when no completion endpoint is configured and in tests.
pub struct OfflineGenerationTool;

impl Tool for OfflineGenerationTool {
    type Input = GenerationInput;

    fn name(&self) -> &str {
        "generate"
    }

    fn description(&self) -> &str {
        "Summarize tool observations without an external language model"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Generation
    }

    fn timeout(&self) -> Duration {
        GENERATION_TIMEOUT
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if input.prompt.trim().is_empty() {
            return Err(ToolError::InvalidInput("prompt must not be empty".into()));
        }

        // Observation lines in the synthesis prompt look like "[tool] key: value".
        let findings: Vec<&str> = input
            .prompt
            .lines()
            .filter(|line| line.starts_with('['))
            .collect();

        let text = if findings.is_empty() {
            "I don't have tool observations for this question. Please add details such as the \
             crop, region, or measurements, or ask about a covered topic."
                .to_string()
        } else {
            let mut text = String::from("Based on the gathered observations:\n");
            for line in &findings {
                text.push_str("- ");
                text.push_str(line);
                text.push('\n');
            }
            text
        };

        let tokens_used = text.split_whitespace().count();
        ToolOutput::json(json!({ "text": text, "tokens_used": tokens_used })).map_err(Into::into)
    }
}

/// Extractor used when the agent plans a generation step mid-trace:
/// builds an analysis prompt over the query and prior observations.
pub fn generation_extractor() -> InputExtractor {
    Box::new(|cx| {
        let mut prompt = String::from("Analyze the findings gathered so far for this question.\n");
        prompt.push_str("Question: ");
        prompt.push_str(cx.query);
        prompt.push('\n');
        for obs in cx.observations {
            for line in formatter::observation_lines(obs) {
                prompt.push_str(&line);
                prompt.push('\n');
            }
        }
        Ok(json!({ "prompt": prompt }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrigate_core::{ExtractionContext, Observation};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_generation_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"max_tokens": 256})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "Sow wheat after the first soaking rain.",
                "tokens_used": 9
            })))
            .mount(&server)
            .await;

        let tool = HttpGenerationTool::new(server.uri());
        let output = tool
            .execute(GenerationInput {
                prompt: "When to sow wheat?".into(),
                max_tokens: Some(256),
                temperature: Some(0.2),
            })
            .await
            .unwrap();

        let payload = output.as_json().unwrap().clone();
        assert_eq!(payload["text"], "Sow wheat after the first soaking rain.");
        assert_eq!(payload["tokens_used"], 9);
    }

    #[tokio::test]
    async fn test_http_generation_maps_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tool = HttpGenerationTool::new(server.uri());
        let err = tool
            .execute(GenerationInput {
                prompt: "hello".into(),
                max_tokens: None,
                temperature: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_offline_generation_reflects_observations() {
        let tool = OfflineGenerationTool;
        let output = tool
            .execute(GenerationInput {
                prompt: "Question\n[predict_yield] predicted_yield_t_ha: 3.4\nrules".into(),
                max_tokens: None,
                temperature: None,
            })
            .await
            .unwrap();
        let payload = output.as_json().unwrap().clone();
        assert!(payload["text"]
            .as_str()
            .unwrap()
            .contains("[predict_yield] predicted_yield_t_ha: 3.4"));
        assert!(payload["tokens_used"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_generation_extractor_includes_observations() {
        let extractor = generation_extractor();
        let observations = vec![Observation::success(
            "rag_search",
            ToolOutput::Json(json!({"documents": [{"content": "Rotation helps."}]})),
        )];
        let cx = ExtractionContext {
            query: "what is rotation then analyze",
            observations: &observations,
            attachment: None,
        };
        let input = extractor(&cx).unwrap();
        let prompt = input["prompt"].as_str().unwrap();
        assert!(prompt.contains("what is rotation"));
        assert!(prompt.contains("[rag_search]"));
    }
}

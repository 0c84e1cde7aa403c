use std::time::Duration;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

/// Longest text the translation provider accepts.
pub const MAX_TRANSLATE_CHARS: usize = 5000;

/// Input for text translation
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TranslateInput {
    /// Text to translate (at most 5000 characters)
    pub text: String,

    /// Source language code; auto-detected when omitted
    #[serde(default)]
    pub source_lang: Option<String>,

    /// Target language code, e.g. "en", "hi"
    pub target_lang: String,
}

/// Translation against an external provider.
pub struct TranslateTool {
    client: Client,
    base_url: String,
}

impl TranslateTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("HTTP client construction cannot fail");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Tool for TranslateTool {
    type Input = TranslateInput;

    fn name(&self) -> &str {
        "translate"
    }

    fn description(&self) -> &str {
        "Translate text between languages"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Translation
    }

    fn keywords(&self) -> &[&'static str] {
        &["translate", "translation", "language", "hindi", "english"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[r"\btranslate\b", r"\bin (hindi|english|punjabi|tamil|telugu|bengali)\b"]
    }

    fn priority(&self) -> i32 {
        5
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if input.text.chars().count() > MAX_TRANSLATE_CHARS {
            return Err(ToolError::InvalidInput(format!(
                "text exceeds {} characters",
                MAX_TRANSLATE_CHARS
            )));
        }
        if input.target_lang.trim().is_empty() {
            return Err(ToolError::InvalidInput("target_lang must not be empty".into()));
        }

        // Empty text round-trips unchanged.
        if input.text.trim().is_empty() {
            return ToolOutput::json(json!({
                "translated_text": input.text,
                "detected_source_lang": input.source_lang,
                "noop": true,
            }))
            .map_err(Into::into);
        }

        let response = self
            .client
            .post(&self.base_url)
            .json(&json!({
                "text": input.text,
                "source_lang": input.source_lang,
                "target_lang": input.target_lang,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(format!("translation provider: {}", e))
                } else {
                    ToolError::BackendUnavailable(format!("translation provider: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ToolError::BackendUnavailable(format!(
                "translation provider returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ToolError::BackendRejected(format!(
                "translation provider returned {}",
                status
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            ToolError::BackendUnavailable(format!("malformed translation response: {}", e))
        })?;

        let translated = payload
            .get("translated_text")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ToolError::BackendUnavailable("translation response missing translated_text".into())
            })?;

        ToolOutput::json(json!({
            "translated_text": translated,
            "detected_source_lang": payload.get("detected_source_lang").cloned().unwrap_or(Value::Null),
            "noop": false,
        }))
        .map_err(Into::into)
    }
}

/// Default extractor: translate the whole query to English.
pub fn translate_extractor() -> InputExtractor {
    Box::new(|cx| {
        Ok(json!({
            "text": cx.query,
            "target_lang": "en",
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_translates_and_reports_detected_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"target_lang": "en"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translated_text": "When should I sow wheat?",
                "detected_source_lang": "hi"
            })))
            .mount(&server)
            .await;

        let tool = TranslateTool::new(server.uri());
        let output = tool
            .execute(TranslateInput {
                text: "गेहूं कब बोना चाहिए?".into(),
                source_lang: None,
                target_lang: "en".into(),
            })
            .await
            .unwrap();

        let payload = output.as_json().unwrap().clone();
        assert_eq!(payload["translated_text"], "When should I sow wheat?");
        assert_eq!(payload["detected_source_lang"], "hi");
        assert_eq!(payload["noop"], false);
    }

    #[tokio::test]
    async fn test_empty_text_is_noop_without_upstream_call() {
        // No mock server mounted: an upstream call would fail.
        let tool = TranslateTool::new("http://localhost:1");
        let output = tool
            .execute(TranslateInput {
                text: "   ".into(),
                source_lang: Some("hi".into()),
                target_lang: "en".into(),
            })
            .await
            .unwrap();
        assert_eq!(output.as_json().unwrap()["noop"], true);
    }

    #[tokio::test]
    async fn test_overlong_text_rejected() {
        let tool = TranslateTool::new("http://localhost:1");
        let err = tool
            .execute(TranslateInput {
                text: "x".repeat(MAX_TRANSLATE_CHARS + 1),
                source_lang: None,
                target_lang: "en".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}

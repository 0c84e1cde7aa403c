//! Prompt and result formatting.
//!
//! This module is the only place that produces text destined for the
//! generation tool's prompt or for the end user. Everything else hands
//! structured observations around.

use std::sync::Arc;

use serde_json::Value;

use crate::registry::ToolRegistry;
use crate::tool::{Observation, ToolError, ToolOutput};

/// The canonical processing language; queries are translated into it
/// before routing and traces are stored in it.
pub const CANONICAL_LANG: &str = "en";

/// System role paragraph for synthesis prompts.
pub const SYSTEM_ROLE: &str = "You are an agricultural advisory assistant. You answer farming \
questions by synthesizing the tool observations provided below: crop and yield predictions, \
retrieved agronomy documents, weather data, and web search results. You are precise with \
numbers and honest about uncertainty.";

/// Canned answer used when the request deadline elapses during synthesis.
pub const DEADLINE_ANSWER: &str =
    "The request took too long to complete. Partial findings were gathered but could not be \
synthesized in time; please retry, or narrow the question.";

const MAX_VALUE_LEN: usize = 600;
const MAX_ITEM_LEN: usize = 400;
const MAX_ARRAY_ITEMS: usize = 5;

/// Build the synthesis prompt from the original query and the ordered
/// observations.
///
/// `grounded` is true when at least one retrieval or prediction
/// observation is non-empty; it switches on the no-fabrication clause.
pub fn synthesis_prompt(query: &str, observations: &[Observation], grounded: bool) -> String {
    let mut prompt = String::new();
    prompt.push_str(SYSTEM_ROLE);
    prompt.push_str("\n\nUser question:\n");
    prompt.push_str(query);
    prompt.push_str("\n\nObservations:\n");

    if observations.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        for obs in observations {
            for line in observation_lines(obs) {
                prompt.push_str(&line);
                prompt.push('\n');
            }
        }
    }

    prompt.push_str("\nAnswer rules:\n");
    prompt.push_str("- Cite tools by name when drawing on their observations.\n");
    prompt.push_str("- Use headings when the answer has multiple parts; use bullets for enumerations.\n");
    prompt.push_str("- Never fabricate numerical values; report only numbers present in the observations.\n");
    if grounded {
        prompt.push_str(
            "- Do not introduce facts that are not present in the observations above.\n",
        );
    }
    prompt
}

/// Render one observation as `[tool] key: value` lines.
pub fn observation_lines(obs: &Observation) -> Vec<String> {
    if let Some(err) = &obs.error {
        let kind = serde_json::to_value(err.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", err.kind));
        return vec![format!("[{}] error: {}: {}", obs.tool, kind, err.message)];
    }

    match &obs.payload {
        Some(ToolOutput::Text(text)) => {
            vec![format!("[{}] output: {}", obs.tool, clip(text, MAX_VALUE_LEN))]
        }
        Some(ToolOutput::Json(Value::Object(map))) => {
            let mut lines = Vec::new();
            for (key, value) in map {
                match value {
                    Value::Array(items) => {
                        for (i, item) in items.iter().take(MAX_ARRAY_ITEMS).enumerate() {
                            lines.push(format!(
                                "[{}] {}[{}]: {}",
                                obs.tool,
                                key,
                                i,
                                render_value(item, MAX_ITEM_LEN)
                            ));
                        }
                        if items.len() > MAX_ARRAY_ITEMS {
                            lines.push(format!(
                                "[{}] {}: … +{} more",
                                obs.tool,
                                key,
                                items.len() - MAX_ARRAY_ITEMS
                            ));
                        }
                    }
                    other => lines.push(format!(
                        "[{}] {}: {}",
                        obs.tool,
                        key,
                        render_value(other, MAX_VALUE_LEN)
                    )),
                }
            }
            lines
        }
        Some(ToolOutput::Json(other)) => {
            vec![format!(
                "[{}] output: {}",
                obs.tool,
                render_value(other, MAX_VALUE_LEN)
            )]
        }
        None => vec![format!("[{}] output: (empty)", obs.tool)],
    }
}

fn render_value(value: &Value, max: usize) -> String {
    match value {
        Value::String(s) => clip(s, max),
        other => clip(&other.to_string(), max),
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…", head)
    }
}

/// Per-answer metadata rendered into the user-facing footer.
#[derive(Debug, Clone, Default)]
pub struct AnswerMeta {
    pub tools_used: Vec<String>,
    /// Confidence of the leading numeric prediction, when one was made
    pub confidence: Option<f64>,
}

/// Merge generation output with the structured footer.
pub fn render_answer(generated: &str, meta: &AnswerMeta) -> String {
    let mut out = generated.trim_end().to_string();
    if !meta.tools_used.is_empty() {
        out.push_str("\n\n---\nTools used: ");
        out.push_str(&meta.tools_used.join(", "));
        if let Some(confidence) = meta.confidence {
            out.push_str(&format!(
                "\nPrediction confidence: {:.0}%",
                confidence * 100.0
            ));
        }
    }
    out
}

/// Best-effort answer assembled directly from observations, used when the
/// generation backend is unavailable.
pub fn fallback_answer(observations: &[Observation]) -> String {
    let mut out = String::from(
        "The language model could not be reached, so here are the raw findings:\n",
    );
    for obs in observations.iter().filter(|o| !o.is_error()) {
        for line in observation_lines(obs) {
            out.push_str("- ");
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Result of a translation pass.
#[derive(Debug, Clone)]
pub struct TranslatedText {
    pub text: String,
    pub detected_source: Option<String>,
    /// True when no translation was performed (empty input or same
    /// language)
    pub noop: bool,
}

/// Translation wrap around the agent: inbound text is normalized to the
/// canonical language before routing, outbound answers are translated to
/// the user's language after synthesis. Both directions go through the
/// registered translation adapter.
pub struct TranslationBridge {
    registry: Arc<ToolRegistry>,
    tool: String,
}

impl TranslationBridge {
    pub fn new(registry: Arc<ToolRegistry>, tool: impl Into<String>) -> Self {
        Self {
            registry,
            tool: tool.into(),
        }
    }

    /// Translate user input into the canonical language.
    pub async fn inbound(
        &self,
        text: &str,
        source_lang: Option<&str>,
    ) -> Result<TranslatedText, ToolError> {
        if text.trim().is_empty() || source_lang == Some(CANONICAL_LANG) {
            return Ok(TranslatedText {
                text: text.to_string(),
                detected_source: source_lang.map(str::to_string),
                noop: true,
            });
        }
        self.translate(text, source_lang, CANONICAL_LANG).await
    }

    /// Translate the final answer into the user's language.
    pub async fn outbound(&self, text: &str, target_lang: &str) -> Result<TranslatedText, ToolError> {
        if text.trim().is_empty() || target_lang == CANONICAL_LANG {
            return Ok(TranslatedText {
                text: text.to_string(),
                detected_source: None,
                noop: true,
            });
        }
        self.translate(text, Some(CANONICAL_LANG), target_lang).await
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<TranslatedText, ToolError> {
        let handler = self
            .registry
            .handler(&self.tool)
            .ok_or_else(|| ToolError::Internal(format!("translation tool {} missing", self.tool)))?;

        let output = handler
            .invoke_raw(serde_json::json!({
                "text": text,
                "source_lang": source_lang,
                "target_lang": target_lang,
            }))
            .await?;

        let payload = output
            .as_json()
            .cloned()
            .ok_or_else(|| ToolError::Internal("translation returned non-JSON payload".into()))?;

        Ok(TranslatedText {
            text: payload
                .get("translated_text")
                .and_then(Value::as_str)
                .unwrap_or(text)
                .to_string(),
            detected_source: payload
                .get("detected_source_lang")
                .and_then(Value::as_str)
                .map(str::to_string),
            noop: payload
                .get("noop")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

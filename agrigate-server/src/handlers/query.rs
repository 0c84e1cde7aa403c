//! Query endpoints: the agent, direct tool invocation, retrieval, pest
//! detection, and translation.

use agrigate_core::{
    formatter, AgentMode, AgentRequest, Attachment, Message, MessageMetadata, Observation,
    ToolOutput, TranslationBridge, CANONICAL_LANG,
};
use axum::extract::{Multipart, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub query: String,
    /// "agent" (default) or "direct" for a single tool invocation
    #[serde(default)]
    pub mode: Option<String>,
}

pub async fn ask(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(body): Json<AskBody>,
) -> ApiResult<Json<Value>> {
    if body.query.trim().is_empty() {
        return Err(ApiError::invalid_input("query must not be empty"));
    }

    let mode = match body.mode.as_deref() {
        Some("direct") => AgentMode::Direct,
        _ => AgentMode::Auto,
    };

    let outcome = state
        .agent
        .run(AgentRequest::new(&body.query).with_mode(mode))
        .await?;

    Ok(Json(json!({
        "answer": outcome.answer,
        "tools_used": outcome.tools_used,
        "truncated": outcome.truncated,
        "trace": outcome.trace,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AgentBody {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    /// User's language; the query is normalized to the canonical
    /// processing language on the way in and the answer translated back
    #[serde(default)]
    pub language: Option<String>,
}

pub async fn agent(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<AgentBody>,
) -> ApiResult<Json<Value>> {
    if body.query.trim().is_empty() {
        return Err(ApiError::invalid_input("query must not be empty"));
    }

    let session_id = body
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Inbound translation wrap: the trace and the session store the
    // canonical-language form.
    let language = body.language.as_deref().filter(|l| *l != CANONICAL_LANG);
    let (query, translated_from) = match language {
        Some(lang) => {
            if state.registry.lookup("translate").is_none() {
                return Err(ApiError::unavailable("translation is not configured"));
            }
            let bridge = TranslationBridge::new(state.registry.clone(), "translate");
            let translated = bridge.inbound(&body.query, Some(lang)).await?;
            let from = translated.detected_source.clone().or(Some(lang.to_string()));
            (translated.text, if translated.noop { None } else { from })
        }
        None => (body.query.clone(), None),
    };

    // The query is recorded even if the run aborts.
    let mut user_message = Message::user(&query);
    user_message.metadata.translated_from = translated_from.clone();
    if let Some(attachments) = &body.attachments {
        user_message.attachments = attachments.clone();
    }
    if let Err(e) = state
        .conversations
        .append(&user.id, &session_id, user_message)
        .await
    {
        warn!(error = %e, session_id, "failed to persist user message");
    }

    let attachment = body
        .attachments
        .as_ref()
        .and_then(|a| a.iter().find(|att| att.is_image()));

    let mut request = AgentRequest::new(&query);
    if let Some(attachment) = attachment {
        request = request.with_attachment(attachment);
    }
    let outcome = state.agent.run(request).await?;

    // Outbound translation wrap.
    let answer = match language {
        Some(lang) => {
            let bridge = TranslationBridge::new(state.registry.clone(), "translate");
            bridge.outbound(&outcome.answer, lang).await?.text
        }
        None => outcome.answer.clone(),
    };

    let assistant_message = Message::assistant(&answer).with_metadata(MessageMetadata {
        tools_used: outcome.tools_used.clone(),
        confidence: outcome.confidence,
        execution_ms: Some(outcome.execution_ms),
        translated_from: None,
        translated_to: language.map(str::to_string),
    });
    if let Err(e) = state
        .conversations
        .append(&user.id, &session_id, assistant_message)
        .await
    {
        warn!(error = %e, session_id, "failed to persist assistant message");
    }

    Ok(Json(json!({
        "answer": answer,
        "tools_used": outcome.tools_used,
        "session_id": session_id,
        "truncated": outcome.truncated,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RagBody {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

pub async fn rag(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(body): Json<RagBody>,
) -> ApiResult<Json<Value>> {
    let handler = state
        .registry
        .handler("rag_search")
        .ok_or_else(|| ApiError::unavailable("retrieval is not configured"))?;

    let output = handler
        .invoke_raw(json!({
            "query": body.query,
            "top_k": body.top_k.unwrap_or(4),
        }))
        .await?;
    Ok(Json(output.as_json().cloned().unwrap_or_else(|| json!({}))))
}

pub async fn predict_yield(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let handler = state
        .registry
        .handler("predict_yield")
        .ok_or_else(|| ApiError::unavailable("yield predictor is not configured"))?;

    let output = handler.invoke_raw(body).await?;
    Ok(Json(output.as_json().cloned().unwrap_or_else(|| json!({}))))
}

pub async fn detect_pest(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut top_k: usize = 3;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_input(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !content_type.starts_with("image/") {
                    return Err(ApiError::invalid_input(format!(
                        "file must be an image, got {}",
                        if content_type.is_empty() { "unknown" } else { &content_type }
                    )));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid_input(format!("unreadable file field: {}", e)))?;
                image = Some((content_type, bytes.to_vec()));
            }
            Some("top_k") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid_input(format!("unreadable top_k field: {}", e)))?;
                top_k = text
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::invalid_input(format!("top_k is not a number: {}", text)))?;
            }
            _ => {}
        }
    }

    let (_content_type, bytes) =
        image.ok_or_else(|| ApiError::invalid_input("multipart field \"file\" is required"))?;

    let handler = state
        .registry
        .handler("detect_pest")
        .ok_or_else(|| ApiError::unavailable("pest detector is not configured"))?;

    let output = handler
        .invoke_raw(json!({
            "image_base64": BASE64.encode(&bytes),
            "top_k": top_k,
        }))
        .await?;

    // The analysis string is always the synthesizer's output, even when
    // only the pest predictor fired.
    let agent_analysis = synthesize_pest_analysis(&state, &output).await;

    let mut payload = output.as_json().cloned().unwrap_or_else(|| json!({}));
    payload["agent_analysis"] = json!(agent_analysis);
    Ok(Json(payload))
}

async fn synthesize_pest_analysis(state: &AppState, output: &ToolOutput) -> String {
    let observation = Observation::success("detect_pest", output.clone());
    let prompt = formatter::synthesis_prompt(
        "Identify the pest or disease in the attached crop image and advise treatment.",
        std::slice::from_ref(&observation),
        true,
    );

    let Some(handler) = state.registry.handler("generate") else {
        return formatter::fallback_answer(std::slice::from_ref(&observation));
    };
    match handler.invoke_raw(json!({ "prompt": prompt })).await {
        Ok(ToolOutput::Text(text)) => text,
        Ok(ToolOutput::Json(value)) => value
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        Err(e) => {
            warn!(error = %e, "pest analysis synthesis failed");
            formatter::fallback_answer(std::slice::from_ref(&observation))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TranslateBody {
    pub text: String,
    #[serde(default)]
    pub source_lang: Option<String>,
    pub target_lang: String,
}

pub async fn translate(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(body): Json<TranslateBody>,
) -> ApiResult<Json<Value>> {
    let handler = state
        .registry
        .handler("translate")
        .ok_or_else(|| ApiError::unavailable("translation is not configured"))?;

    let output = handler
        .invoke_raw(json!({
            "text": body.text,
            "source_lang": body.source_lang,
            "target_lang": body.target_lang,
        }))
        .await?;
    Ok(Json(output.as_json().cloned().unwrap_or_else(|| json!({}))))
}

//! The agent loop: effectful driver around the pure state machine.

use std::collections::HashSet;

use serde_json::{json, Value};
use tokio::time::{timeout, Instant};
use tracing::debug;

use crate::formatter::{self, AnswerMeta};
use crate::registry::ExtractionContext;
use crate::router::RoutingDecision;
use crate::tool::{DynTool, Observation, ToolCategory, ToolError, ToolErrorKind, ToolOutput};

use super::state::{self, AgentState, LoopSignals};
use super::types::{AgentError, AgentOutcome, AgentStep, Trace};
use super::{Agent, AgentMode, AgentRequest};

impl Agent {
    /// Run one query through the loop and synthesize an answer.
    ///
    /// Tool failures become observations; only internal tool faults and a
    /// fully failed backend set abort the run.
    pub async fn run(&self, request: AgentRequest<'_>) -> Result<AgentOutcome, AgentError> {
        let started = std::time::Instant::now();
        let deadline = Instant::now() + self.deadline;

        let has_image = request.attachment.map(|a| a.is_image()).unwrap_or(false);
        let decision = self
            .router
            .route(&self.registry, request.query, has_image);
        debug!(
            tool = %decision.chosen_tool,
            confidence = decision.confidence,
            fallback = decision.fallback,
            "routed query"
        );

        let max_iterations = match request.mode {
            AgentMode::Direct => 1,
            AgentMode::Auto => self.max_iterations,
        };

        let mut trace = Trace::default();
        let mut truncated = false;
        let mut clarification: Option<String> = None;
        let mut attempted: HashSet<String> = HashSet::new();

        // When routing lands on the generation tool itself, the synthesis
        // call is the whole plan; the loop has nothing to do.
        let mut planned: Option<(String, String)> = if decision.chosen_tool == self.generation_tool
        {
            None
        } else {
            let chosen_terminal = self
                .registry
                .lookup(&decision.chosen_tool)
                .map(|t| t.terminal_on_success())
                .unwrap_or(true);
            let thought = match state::initial_state(&decision, chosen_terminal) {
                AgentState::Act => format!(
                    "Confidence {:.2} permits direct execution of {}",
                    decision.confidence, decision.chosen_tool
                ),
                _ => format!(
                    "Considering {} ({})",
                    decision.chosen_tool, decision.rationale
                ),
            };
            Some((decision.chosen_tool.clone(), thought))
        };

        while let Some((action, thought)) = planned.take() {
            if Instant::now() >= deadline {
                truncated = true;
                break;
            }

            attempted.insert(action.clone());
            let entry = self.registry.entry(&action).ok_or_else(|| {
                AgentError::Configuration(format!("planned tool {} is not registered", action))
            })?;
            let tool = entry.tool();

            let prior = trace.observations();
            let cx = ExtractionContext {
                query: request.query,
                observations: &prior,
                attachment: request.attachment,
            };
            let (action_input, observation) = match entry.extract_input(&cx) {
                Ok(input) => {
                    let observation = self.invoke_with_timeout(tool, input.clone(), deadline).await;
                    (input, observation)
                }
                Err(e) => (Value::Null, Observation::failure(action.clone(), &e)),
            };

            if let Some(err) = &observation.error {
                match err.kind {
                    // Aborts the trace outright; the caller still records
                    // the query in the session.
                    ToolErrorKind::Internal => {
                        return Err(AgentError::Internal(err.message.clone()));
                    }
                    ToolErrorKind::InvalidInput => {
                        clarification = Some(err.message.clone());
                    }
                    _ => {}
                }
            }

            let iteration = trace.len() + 1;
            trace.push(AgentStep {
                iteration,
                thought,
                action: action.clone(),
                action_input,
                observation: Some(observation),
                terminal: false,
            });

            let observations = trace.observations();
            let signals = LoopSignals {
                deadline_expired: Instant::now() >= deadline,
                iteration_cap_reached: trace.len() >= max_iterations,
                last_error: trace.last_error_kind(),
                retry_available: trace.failures_for(&action) < 2
                    && self.retry_target(&decision, &attempted).is_some(),
                last_tool_terminal: tool.terminal_on_success(),
                needs_more: state::needs_more(request.query, &observations),
            };

            match state::after_observe(&signals) {
                AgentState::Plan => {
                    planned = self.plan_next(&trace, &decision, &attempted);
                }
                _ => {
                    truncated = (signals.deadline_expired || signals.iteration_cap_reached)
                        && state::would_continue(&signals);
                }
            }
        }

        self.synthesize(
            request.query,
            &decision,
            trace,
            truncated,
            clarification,
            deadline,
            started,
        )
        .await
    }

    /// Invoke a tool under the smaller of its own timeout and the time
    /// left before the request deadline.
    async fn invoke_with_timeout(
        &self,
        tool: &dyn DynTool,
        input: Value,
        deadline: Instant,
    ) -> Observation {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let budget = tool.timeout().min(remaining);
        let name = tool.name().to_string();
        match timeout(budget, tool.invoke_raw(input)).await {
            Ok(Ok(output)) => Observation::success(name, output),
            Ok(Err(e)) => Observation::failure(name.clone(), &e),
            Err(_) => Observation::failure(
                name.clone(),
                &ToolError::Timeout(format!("{} exceeded {:.0?}", name, budget)),
            ),
        }
    }

    /// Choose the next action after an OBSERVE→PLAN transition.
    fn plan_next(
        &self,
        trace: &Trace,
        decision: &RoutingDecision,
        attempted: &HashSet<String>,
    ) -> Option<(String, String)> {
        if trace.last_error_kind().is_some() {
            let failed = trace
                .steps
                .last()
                .map(|s| s.action.clone())
                .unwrap_or_default();
            let alternative = self.retry_target(decision, attempted)?;
            return Some((
                alternative.clone(),
                format!("{} failed; retrying with alternative {}", failed, alternative),
            ));
        }

        // Successful but incomplete: deepen with the generation tool.
        Some((
            self.generation_tool.clone(),
            "Observations incomplete; running further analysis".to_string(),
        ))
    }

    /// Next-best routing alternative that is registered and untried.
    fn retry_target<'a>(
        &self,
        decision: &'a RoutingDecision,
        attempted: &HashSet<String>,
    ) -> Option<&'a String> {
        decision
            .alternatives
            .iter()
            .map(|(name, _)| name)
            .find(|name| {
                *name != &self.generation_tool
                    && !attempted.contains(*name)
                    && self.registry.lookup(name).is_some()
            })
    }

    #[allow(clippy::too_many_arguments)]
    async fn synthesize(
        &self,
        query: &str,
        decision: &RoutingDecision,
        mut trace: Trace,
        mut truncated: bool,
        clarification: Option<String>,
        deadline: Instant,
        started: std::time::Instant,
    ) -> Result<AgentOutcome, AgentError> {
        let observations = trace.observations();

        let mut tools_used: Vec<String> = Vec::new();
        for obs in &observations {
            if !tools_used.contains(&obs.tool) {
                tools_used.push(obs.tool.clone());
            }
        }

        // Invalid input is never retried; answer with what is missing.
        if let Some(reason) = clarification {
            trace.mark_terminal();
            let answer = format!(
                "I could not run that prediction as asked: {}. Please correct the input and retry.",
                reason
            );
            return Ok(AgentOutcome {
                answer,
                tools_used,
                confidence: None,
                truncated: false,
                execution_ms: started.elapsed().as_millis() as u64,
                trace,
            });
        }

        let grounded = observations.iter().any(|o| {
            !o.is_error()
                && o.has_content()
                && matches!(
                    self.category_of(&o.tool),
                    Some(
                        ToolCategory::Prediction
                            | ToolCategory::Retrieval
                            | ToolCategory::ExternalSearch
                            | ToolCategory::Utility
                    )
                )
        });

        let prompt = formatter::synthesis_prompt(query, &observations, grounded);
        let prediction_confidence = self.leading_prediction_confidence(&observations);

        let handler = self.registry.handler(&self.generation_tool).ok_or_else(|| {
            AgentError::Configuration(format!(
                "generation tool {} is not registered",
                self.generation_tool
            ))
        })?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let generated = if remaining.is_zero() {
            truncated = true;
            GeneratedAnswer::Canned(formatter::DEADLINE_ANSWER.to_string())
        } else {
            let budget = handler.timeout().min(remaining);
            match timeout(budget, handler.invoke_raw(json!({ "prompt": prompt }))).await {
                Ok(Ok(output)) => GeneratedAnswer::Model(extract_generated_text(&output), output),
                Ok(Err(e)) => {
                    if observations.iter().any(Observation::has_content) {
                        GeneratedAnswer::Canned(formatter::fallback_answer(&observations))
                    } else {
                        return Err(AgentError::AllBackendsFailed(e.to_string()));
                    }
                }
                Err(_) => {
                    truncated = true;
                    GeneratedAnswer::Canned(formatter::DEADLINE_ANSWER.to_string())
                }
            }
        };

        if !tools_used.contains(&self.generation_tool) {
            tools_used.push(self.generation_tool.clone());
        }

        let (answer_text, synthesis_output) = match generated {
            GeneratedAnswer::Model(text, output) => (text, Some(output)),
            GeneratedAnswer::Canned(text) => (text, None),
        };

        // A trace carries exactly one terminal step. An empty trace (pure
        // generation) records the synthesis itself as that step.
        if trace.is_empty() {
            let observation = synthesis_output
                .map(|o| Observation::success(self.generation_tool.clone(), o))
                .unwrap_or_else(|| {
                    Observation::success(
                        self.generation_tool.clone(),
                        ToolOutput::text(answer_text.clone()),
                    )
                });
            trace.push(AgentStep {
                iteration: 1,
                thought: "No specialized tool applies; answering with the language model"
                    .to_string(),
                action: self.generation_tool.clone(),
                action_input: json!({ "prompt": prompt }),
                observation: Some(observation),
                terminal: true,
            });
        } else {
            trace.mark_terminal();
        }

        let meta = AnswerMeta {
            tools_used: tools_used.clone(),
            confidence: prediction_confidence,
        };
        let answer = formatter::render_answer(&answer_text, &meta);

        let confidence = prediction_confidence.or(if decision.fallback {
            None
        } else {
            Some(decision.confidence)
        });

        Ok(AgentOutcome {
            answer,
            tools_used,
            confidence,
            truncated,
            execution_ms: started.elapsed().as_millis() as u64,
            trace,
        })
    }

    fn category_of(&self, tool: &str) -> Option<ToolCategory> {
        self.registry.lookup(tool).map(|t| t.category())
    }

    /// Confidence of the first successful numeric prediction, for the
    /// user-surface indicator.
    fn leading_prediction_confidence(&self, observations: &[Observation]) -> Option<f64> {
        observations
            .iter()
            .filter(|o| !o.is_error())
            .filter(|o| self.category_of(&o.tool) == Some(ToolCategory::Prediction))
            .find_map(|o| {
                o.payload
                    .as_ref()?
                    .as_json()?
                    .get("confidence")?
                    .as_f64()
            })
    }
}

enum GeneratedAnswer {
    /// Text produced by the generation tool, with the raw output
    Model(String, ToolOutput),
    /// Canned or assembled locally (deadline, backend down)
    Canned(String),
}

fn extract_generated_text(output: &ToolOutput) -> String {
    match output {
        ToolOutput::Text(s) => s.clone(),
        ToolOutput::Json(v) => v
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{query_field_extractor, InputExtractor, ToolRegistry};
    use crate::tool::{Tool, ToolCategory};
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Deserialize, JsonSchema)]
    struct PromptInput {
        #[allow(dead_code)]
        prompt: String,
    }

    struct StubGenerate;

    impl Tool for StubGenerate {
        type Input = PromptInput;

        fn name(&self) -> &str {
            "generate"
        }

        fn description(&self) -> &str {
            "stub language model"
        }

        fn category(&self) -> ToolCategory {
            ToolCategory::Generation
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(30)
        }

        async fn execute(&self, _input: Self::Input) -> Result<ToolOutput, ToolError> {
            ToolOutput::json(json!({"text": "Synthesized answer.", "tokens_used": 12}))
                .map_err(Into::into)
        }
    }

    #[derive(Deserialize, JsonSchema)]
    struct QueryInput {
        #[allow(dead_code)]
        query: String,
    }

    struct StubYield;

    impl Tool for StubYield {
        type Input = QueryInput;

        fn name(&self) -> &str {
            "predict_yield"
        }

        fn description(&self) -> &str {
            "stub yield predictor"
        }

        fn category(&self) -> ToolCategory {
            ToolCategory::Prediction
        }

        fn keywords(&self) -> &[&'static str] {
            &["yield", "rainfall", "fertilizer", "harvest"]
        }

        fn patterns(&self) -> &[&'static str] {
            &[r"\b(predict|estimate|forecast)\b.*\byield\b", r"\byield\b"]
        }

        fn unit_hints(&self) -> &[&'static str] {
            &["mm", "kg"]
        }

        fn priority(&self) -> i32 {
            20
        }

        async fn execute(&self, _input: Self::Input) -> Result<ToolOutput, ToolError> {
            ToolOutput::json(json!({"predicted_yield_t_ha": 3.4, "confidence": 0.87}))
                .map_err(Into::into)
        }
    }

    struct StubRetrieval;

    impl Tool for StubRetrieval {
        type Input = QueryInput;

        fn name(&self) -> &str {
            "rag_search"
        }

        fn description(&self) -> &str {
            "stub retrieval"
        }

        fn category(&self) -> ToolCategory {
            ToolCategory::Retrieval
        }

        fn keywords(&self) -> &[&'static str] {
            &["what", "crop", "rotation", "explain"]
        }

        fn patterns(&self) -> &[&'static str] {
            &[r"^(what|how|why|explain|describe)\b"]
        }

        fn priority(&self) -> i32 {
            10
        }

        async fn execute(&self, _input: Self::Input) -> Result<ToolOutput, ToolError> {
            ToolOutput::json(json!({
                "documents": [{"content": "Crop rotation alternates crops.", "score": 0.9}]
            }))
            .map_err(Into::into)
        }
    }

    struct FlakyWeather {
        calls: Arc<AtomicUsize>,
    }

    impl Tool for FlakyWeather {
        type Input = QueryInput;

        fn name(&self) -> &str {
            "weather"
        }

        fn description(&self) -> &str {
            "always-unavailable weather"
        }

        fn category(&self) -> ToolCategory {
            ToolCategory::Utility
        }

        fn keywords(&self) -> &[&'static str] {
            &["weather", "forecast", "rain"]
        }

        fn priority(&self) -> i32 {
            20
        }

        async fn execute(&self, _input: Self::Input) -> Result<ToolOutput, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ToolError::BackendUnavailable("upstream down".into()))
        }
    }

    struct RejectingPredictor;

    impl Tool for RejectingPredictor {
        type Input = QueryInput;

        fn name(&self) -> &str {
            "predict_moisture"
        }

        fn description(&self) -> &str {
            "always rejects input"
        }

        fn category(&self) -> ToolCategory {
            ToolCategory::Prediction
        }

        fn keywords(&self) -> &[&'static str] {
            &["moisture", "soil"]
        }

        async fn execute(&self, _input: Self::Input) -> Result<ToolOutput, ToolError> {
            Err(ToolError::InvalidInput("temperature_c out of range".into()))
        }
    }

    fn prompt_extractor() -> InputExtractor {
        Box::new(|cx| Ok(json!({ "prompt": cx.query })))
    }

    fn base_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(StubYield, query_field_extractor("query"))
            .unwrap();
        registry
            .register(StubRetrieval, query_field_extractor("query"))
            .unwrap();
        registry.register(StubGenerate, prompt_extractor()).unwrap();
        registry
    }

    fn agent_with(registry: ToolRegistry, max_iterations: usize) -> Agent {
        Agent::builder()
            .registry(Arc::new(registry))
            .max_iterations(max_iterations)
            .deadline(Duration::from_secs(10))
            .generation_tool("generate")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_yield_query_runs_one_act_plus_synthesis() {
        let agent = agent_with(base_registry(), 5);
        let outcome = agent
            .run(AgentRequest::new(
                "Predict wheat yield in Punjab with 800mm rainfall, 120 kg fertilizer, 2 hectares.",
            ))
            .await
            .unwrap();

        assert_eq!(outcome.trace.len(), 1);
        assert_eq!(outcome.trace.terminal_count(), 1);
        assert_eq!(outcome.trace.steps[0].action, "predict_yield");
        assert!(outcome.tools_used.contains(&"predict_yield".to_string()));
        assert!(outcome.answer.contains("Tools used"));
        assert!(outcome.answer.contains("predict_yield"));
        assert!(outcome.answer.contains("87%"));
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn test_unmatched_query_synthesizes_on_generation_alone() {
        let agent = agent_with(base_registry(), 5);
        let outcome = agent
            .run(AgentRequest::new("zzz qqq unmatched"))
            .await
            .unwrap();

        assert_eq!(outcome.trace.len(), 1);
        assert_eq!(outcome.trace.terminal_count(), 1);
        assert_eq!(outcome.trace.steps[0].action, "generate");
        assert!(outcome.confidence.is_none());
    }

    #[tokio::test]
    async fn test_iteration_cap_truncates_composition_query() {
        let agent = agent_with(base_registry(), 2);
        let outcome = agent
            .run(AgentRequest::new(
                "What is crop rotation? Find documents then analyze them then summarize again.",
            ))
            .await
            .unwrap();

        assert_eq!(outcome.trace.len(), 2);
        assert_eq!(outcome.trace.terminal_count(), 1);
        assert!(outcome.truncated);
        assert!(!outcome.answer.is_empty());
    }

    #[tokio::test]
    async fn test_trace_never_exceeds_cap() {
        for cap in 1..=4 {
            let agent = agent_with(base_registry(), cap);
            let outcome = agent
                .run(AgentRequest::new(
                    "Explain rotation then analyze it then compare again",
                ))
                .await
                .unwrap();
            assert!(outcome.trace.len() <= cap.max(1));
            assert_eq!(outcome.trace.terminal_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retries_alternative_then_synthesizes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(
                FlakyWeather {
                    calls: calls.clone(),
                },
                query_field_extractor("query"),
            )
            .unwrap();
        registry
            .register(StubRetrieval, query_field_extractor("query"))
            .unwrap();
        registry.register(StubGenerate, prompt_extractor()).unwrap();

        let agent = agent_with(registry, 5);
        let outcome = agent
            .run(AgentRequest::new("weather rain forecast for the week"))
            .await
            .unwrap();

        // weather failed once, retried via the retrieval alternative
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(outcome
            .trace
            .steps
            .iter()
            .any(|s| s.action == "rag_search"));
        assert_eq!(outcome.trace.terminal_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_yields_clarifying_answer() {
        let mut registry = ToolRegistry::new();
        registry
            .register(RejectingPredictor, query_field_extractor("query"))
            .unwrap();
        registry.register(StubGenerate, prompt_extractor()).unwrap();

        let agent = agent_with(registry, 5);
        let outcome = agent
            .run(AgentRequest::new("soil moisture prediction please"))
            .await
            .unwrap();

        assert!(outcome.answer.contains("temperature_c out of range"));
        assert_eq!(outcome.trace.terminal_count(), 1);
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn test_direct_mode_caps_at_one_step() {
        let agent = agent_with(base_registry(), 5);
        let outcome = agent
            .run(
                AgentRequest::new("Explain rotation then analyze then compare")
                    .with_mode(AgentMode::Direct),
            )
            .await
            .unwrap();
        assert_eq!(outcome.trace.len(), 1);
    }

    #[tokio::test]
    async fn test_builder_requires_generation_tool() {
        let mut registry = ToolRegistry::new();
        registry
            .register(StubYield, query_field_extractor("query"))
            .unwrap();
        let err = Agent::builder()
            .registry(Arc::new(registry))
            .generation_tool("generate")
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }
}

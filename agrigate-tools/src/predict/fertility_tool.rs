use std::sync::Arc;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::yield_tool::capture_f64;
use super::{check_range, BaselineFertilityModel, Predictor};

/// Input for soil fertility classification
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SoilFertilityInput {
    /// Soil nitrogen in kg/ha (0–300)
    pub nitrogen: f64,

    /// Soil phosphorus in kg/ha (0–150)
    pub phosphorus: f64,

    /// Soil potassium in kg/ha (0–300)
    pub potassium: f64,

    /// Soil pH (3–10)
    pub ph: f64,
}

const FERTILITY_ADVICE: &[(&str, &str)] = &[
    ("low", "Build organic matter with compost or green manure before the next season."),
    ("medium", "Maintain with balanced N-P-K; retest after harvest."),
    ("high", "Fertility is high; avoid surplus nitrogen to prevent lodging and runoff."),
];

/// Classifies soil fertility from N-P-K and pH.
pub struct SoilFertilityTool {
    backend: Arc<dyn Predictor>,
}

impl SoilFertilityTool {
    pub fn new(backend: Arc<dyn Predictor>) -> Self {
        Self { backend }
    }

    pub fn baseline() -> Self {
        Self::new(Arc::new(BaselineFertilityModel))
    }
}

impl Tool for SoilFertilityTool {
    type Input = SoilFertilityInput;

    fn name(&self) -> &str {
        "classify_soil_fertility"
    }

    fn description(&self) -> &str {
        "Classify soil fertility from N-P-K and pH measurements"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Prediction
    }

    fn keywords(&self) -> &[&'static str] {
        &["fertility", "fertile", "soil", "quality", "npk"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[r"\bsoil\b.*\bfertil", r"\bhow\b.*\bfertile\b"]
    }

    fn unit_hints(&self) -> &[&'static str] {
        &["kg/ha", "ph"]
    }

    fn priority(&self) -> i32 {
        12
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        check_range("nitrogen", input.nitrogen, 0.0, 300.0)?;
        check_range("phosphorus", input.phosphorus, 0.0, 150.0)?;
        check_range("potassium", input.potassium, 0.0, 300.0)?;
        check_range("ph", input.ph, 3.0, 10.0)?;

        let ranking = self.backend.predict(&json!({
            "nitrogen": input.nitrogen,
            "phosphorus": input.phosphorus,
            "potassium": input.potassium,
            "ph": input.ph,
        }))?;

        let advice = FERTILITY_ADVICE
            .iter()
            .find(|(label, _)| *label == ranking.primary.label)
            .map(|(_, advice)| *advice)
            .unwrap_or_default();

        ToolOutput::json(json!({
            "fertility": ranking.primary.label,
            "fertility_index": ranking.primary.value,
            "confidence": ranking.primary.confidence,
            "alternatives": ranking.alternatives,
            "recommendations": [advice],
        }))
        .map_err(Into::into)
    }
}

/// Pull N, P, K, and pH readings out of the query.
pub fn fertility_extractor() -> InputExtractor {
    let nitrogen = Regex::new(r"\b(?:nitrogen|n)\b[\s:=]+(\d+(?:\.\d+)?)").expect("static pattern compiles");
    let phosphorus =
        Regex::new(r"\b(?:phosphorus|p)\b[\s:=]+(\d+(?:\.\d+)?)").expect("static pattern compiles");
    let potassium =
        Regex::new(r"\b(?:potassium|k)\b[\s:=]+(\d+(?:\.\d+)?)").expect("static pattern compiles");
    let ph = Regex::new(r"\bph\b[\s:=]+(\d+(?:\.\d+)?)").expect("static pattern compiles");

    Box::new(move |cx| {
        let lowered = cx.query.to_lowercase();
        let need = |name: &str, value: Option<f64>| {
            value.ok_or_else(|| {
                ToolError::InvalidInput(format!("{} not found; state it like \"{}: 80\"", name, name))
            })
        };
        Ok(json!({
            "nitrogen": need("nitrogen", capture_f64(&nitrogen, &lowered))?,
            "phosphorus": need("phosphorus", capture_f64(&phosphorus, &lowered))?,
            "potassium": need("potassium", capture_f64(&potassium, &lowered))?,
            "ph": need("ph", capture_f64(&ph, &lowered))?,
        }))
    })
}

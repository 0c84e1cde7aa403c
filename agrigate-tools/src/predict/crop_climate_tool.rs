use std::sync::Arc;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::yield_tool::capture_f64;
use super::{check_range, BaselineClimateModel, Predictor};

/// Input for climate-based crop recommendation
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CropByClimateInput {
    /// Mean growing-season temperature in °C (-10–55)
    pub temperature_c: f64,

    /// Mean relative humidity in percent (0–100)
    pub humidity_pct: f64,

    /// Seasonal rainfall in millimetres (0–5000)
    pub rainfall_mm: f64,
}

/// Recommends crops suited to the local climate.
pub struct CropByClimateTool {
    backend: Arc<dyn Predictor>,
}

impl CropByClimateTool {
    pub fn new(backend: Arc<dyn Predictor>) -> Self {
        Self { backend }
    }

    pub fn baseline() -> Self {
        Self::new(Arc::new(BaselineClimateModel))
    }
}

impl Tool for CropByClimateTool {
    type Input = CropByClimateInput;

    fn name(&self) -> &str {
        "recommend_crop_climate"
    }

    fn description(&self) -> &str {
        "Recommend crops from temperature, humidity, and rainfall conditions"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Prediction
    }

    fn keywords(&self) -> &[&'static str] {
        &["climate", "temperature", "humidity", "season", "suitable", "grow"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[
            r"\b(which|what)\b.*\bcrop\b.*\bclimate\b",
            r"\bsuitable\b.*\b(crop|grow)",
        ]
    }

    fn unit_hints(&self) -> &[&'static str] {
        &["°c", "%"]
    }

    fn priority(&self) -> i32 {
        15
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        check_range("temperature_c", input.temperature_c, -10.0, 55.0)?;
        check_range("humidity_pct", input.humidity_pct, 0.0, 100.0)?;
        check_range("rainfall_mm", input.rainfall_mm, 0.0, 5000.0)?;

        let ranking = self.backend.predict(&json!({
            "temperature_c": input.temperature_c,
            "humidity_pct": input.humidity_pct,
            "rainfall_mm": input.rainfall_mm,
        }))?;

        ToolOutput::json(json!({
            "recommended_crop": ranking.primary.label,
            "confidence": ranking.primary.confidence,
            "alternatives": ranking.alternatives,
            "recommendations": [format!(
                "{} fits the stated climate best; verify seed availability for your sowing window.",
                ranking.primary.label
            )],
        }))
        .map_err(Into::into)
    }
}

/// Pull climate readings out of the query.
pub fn crop_climate_extractor() -> InputExtractor {
    let temperature =
        Regex::new(r"(-?\d+(?:\.\d+)?)\s*(?:°\s*c|deg(?:rees?)?\s*c|celsius)").expect("static pattern compiles");
    let humidity = Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("static pattern compiles");
    let rainfall = Regex::new(r"(\d+(?:\.\d+)?)\s*mm\b").expect("static pattern compiles");

    Box::new(move |cx| {
        let lowered = cx.query.to_lowercase();
        let temperature_c = capture_f64(&temperature, &lowered).ok_or_else(|| {
            ToolError::InvalidInput("temperature_c not found; state it like \"28°C\"".into())
        })?;
        let humidity_pct = capture_f64(&humidity, &lowered).ok_or_else(|| {
            ToolError::InvalidInput("humidity_pct not found; state it like \"60%\"".into())
        })?;
        let rainfall_mm = capture_f64(&rainfall, &lowered).ok_or_else(|| {
            ToolError::InvalidInput("rainfall_mm not found; state it like \"700mm\"".into())
        })?;
        Ok(json!({
            "temperature_c": temperature_c,
            "humidity_pct": humidity_pct,
            "rainfall_mm": rainfall_mm,
        }))
    })
}

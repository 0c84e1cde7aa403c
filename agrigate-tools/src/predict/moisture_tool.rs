use std::sync::Arc;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::yield_tool::capture_f64;
use super::{check_range, BaselineMoistureModel, Predictor};

/// Input for soil moisture estimation
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SoilMoistureInput {
    /// Air temperature in °C (-30–60)
    pub temperature_c: f64,

    /// Relative humidity in percent (0–100)
    pub humidity_pct: f64,

    /// Recent rainfall in millimetres (0–500)
    pub rainfall_mm: f64,
}

const IRRIGATION_THRESHOLD: f64 = 0.15;

/// Soil moisture estimator from surface weather conditions.
pub struct SoilMoistureTool {
    backend: Arc<dyn Predictor>,
}

impl SoilMoistureTool {
    pub fn new(backend: Arc<dyn Predictor>) -> Self {
        Self { backend }
    }

    pub fn baseline() -> Self {
        Self::new(Arc::new(BaselineMoistureModel))
    }
}

impl Tool for SoilMoistureTool {
    type Input = SoilMoistureInput;

    fn name(&self) -> &str {
        "predict_soil_moisture"
    }

    fn description(&self) -> &str {
        "Estimate volumetric soil moisture from temperature, humidity, and rainfall"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Prediction
    }

    fn keywords(&self) -> &[&'static str] {
        &["moisture", "soil", "irrigation", "water", "dry"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[r"\bsoil\b.*\bmoisture\b", r"\b(need|should).*\birrigat"]
    }

    fn unit_hints(&self) -> &[&'static str] {
        &["°c", "%", "mm"]
    }

    fn priority(&self) -> i32 {
        12
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        check_range("temperature_c", input.temperature_c, -30.0, 60.0)?;
        check_range("humidity_pct", input.humidity_pct, 0.0, 100.0)?;
        check_range("rainfall_mm", input.rainfall_mm, 0.0, 500.0)?;

        let ranking = self.backend.predict(&json!({
            "temperature_c": input.temperature_c,
            "humidity_pct": input.humidity_pct,
            "rainfall_mm": input.rainfall_mm,
        }))?;
        let moisture = ranking.primary.value.ok_or_else(|| {
            ToolError::Internal("moisture backend returned no numeric estimate".into())
        })?;

        let (category, recommendations) = if moisture < IRRIGATION_THRESHOLD {
            (
                "dry",
                vec!["Soil moisture is below the irrigation threshold; irrigate within 48 hours."],
            )
        } else if moisture < 0.30 {
            ("adequate", vec!["Moisture is adequate; re-check after the next hot spell."])
        } else {
            ("wet", vec!["Soil is wet; delay irrigation and watch for waterlogging."])
        };

        ToolOutput::json(json!({
            "soil_moisture_m3m3": moisture,
            "category": category,
            "confidence": ranking.primary.confidence,
            "recommendations": recommendations,
        }))
        .map_err(Into::into)
    }
}

/// Pull temperature, humidity, and rainfall readings out of the query.
pub fn moisture_extractor() -> InputExtractor {
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
            ToolError::InvalidInput("rainfall_mm not found; state it like \"20mm\"".into())
        })?;
        Ok(json!({
            "temperature_c": temperature_c,
            "humidity_pct": humidity_pct,
            "rainfall_mm": rainfall_mm,
        }))
    })
}

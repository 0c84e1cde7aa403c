use std::sync::Arc;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{check_range, crop_in_query, BaselineYieldModel, Predictor};

/// Input for crop yield prediction
#[derive(Debug, Deserialize, JsonSchema)]
pub struct YieldInput {
    /// Crop being grown, e.g. "wheat"
    pub crop: String,

    /// Growing region, free-form (optional)
    #[serde(default)]
    pub region: Option<String>,

    /// Seasonal rainfall in millimetres (0–5000)
    pub rainfall_mm: f64,

    /// Fertilizer applied in kg per hectare (0–1000)
    pub fertilizer_kg: f64,

    /// Cultivated area in hectares (0.01–10000, default 1)
    #[serde(default = "default_area")]
    pub area_ha: f64,
}

fn default_area() -> f64 {
    1.0
}

const RECOMMENDATION_DRY: &str =
    "Rainfall is below the reliable band; plan supplemental irrigation at tillering.";
const RECOMMENDATION_WET: &str =
    "Rainfall is above the reliable band; ensure field drainage before sowing.";
const RECOMMENDATION_HEAVY_FERTILIZER: &str =
    "Split the fertilizer dose across growth stages to limit leaching losses.";
const RECOMMENDATION_LIGHT_FERTILIZER: &str =
    "Fertilizer dose is light for this crop; soil-test before topping up nitrogen.";

/// Crop yield predictor over a black-box model backend.
pub struct YieldPredictionTool {
    backend: Arc<dyn Predictor>,
}

impl YieldPredictionTool {
    pub fn new(backend: Arc<dyn Predictor>) -> Self {
        Self { backend }
    }

    /// Backed by the bundled deterministic model.
    pub fn baseline() -> Self {
        Self::new(Arc::new(BaselineYieldModel))
    }
}

impl Tool for YieldPredictionTool {
    type Input = YieldInput;

    fn name(&self) -> &str {
        "predict_yield"
    }

    fn description(&self) -> &str {
        "Predict crop yield from rainfall, fertilizer use, and cultivated area"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Prediction
    }

    fn keywords(&self) -> &[&'static str] {
        &["yield", "harvest", "production", "rainfall", "fertilizer", "predict"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[
            r"\b(predict|estimate|forecast|expect)\b.*\byield\b",
            r"\byield\b",
            r"\bhow much\b.*\b(harvest|produce|production)\b",
        ]
    }

    fn unit_hints(&self) -> &[&'static str] {
        &["mm", "kg", "ha"]
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if input.crop.trim().is_empty() {
            return Err(ToolError::InvalidInput("crop must not be empty".into()));
        }
        check_range("rainfall_mm", input.rainfall_mm, 0.0, 5000.0)?;
        check_range("fertilizer_kg", input.fertilizer_kg, 0.0, 1000.0)?;
        check_range("area_ha", input.area_ha, 0.01, 10_000.0)?;

        let crop = input.crop.trim().to_lowercase();
        let ranking = self.backend.predict(&json!({
            "crop": crop,
            "rainfall_mm": input.rainfall_mm,
            "fertilizer_kg": input.fertilizer_kg,
        }))?;

        let yield_t_ha = ranking.primary.value.ok_or_else(|| {
            ToolError::Internal("yield backend returned no numeric estimate".into())
        })?;
        let total = (yield_t_ha * input.area_ha * 100.0).round() / 100.0;

        let mut recommendations = Vec::new();
        if input.rainfall_mm < 400.0 {
            recommendations.push(RECOMMENDATION_DRY);
        } else if input.rainfall_mm > 1600.0 {
            recommendations.push(RECOMMENDATION_WET);
        }
        if input.fertilizer_kg > 200.0 {
            recommendations.push(RECOMMENDATION_HEAVY_FERTILIZER);
        } else if input.fertilizer_kg < 40.0 {
            recommendations.push(RECOMMENDATION_LIGHT_FERTILIZER);
        }

        ToolOutput::json(json!({
            "crop": crop,
            "region": input.region,
            "predicted_yield_t_ha": yield_t_ha,
            "total_production_t": total,
            "area_ha": input.area_ha,
            "confidence": ranking.primary.confidence,
            "alternatives": ranking.alternatives,
            "recommendations": recommendations,
        }))
        .map_err(Into::into)
    }
}

/// Shape a free-form query into [`YieldInput`].
///
/// Pulls the crop name, rainfall (mm), fertilizer (kg), and area (ha)
/// out of the text; missing rainfall or fertilizer is an invalid-input
/// error naming the field.
pub fn yield_extractor() -> InputExtractor {
    let rainfall = Regex::new(r"(\d+(?:\.\d+)?)\s*mm\b").expect("static pattern compiles");
    let fertilizer = Regex::new(r"(\d+(?:\.\d+)?)\s*kg\b").expect("static pattern compiles");
    let area = Regex::new(r"(\d+(?:\.\d+)?)\s*(?:hectares?|ha)\b").expect("static pattern compiles");
    let region = Regex::new(r"\bin\s+([a-z][a-z]+)").expect("static pattern compiles");

    Box::new(move |cx| {
        let lowered = cx.query.to_lowercase();

        let crop = crop_in_query(&lowered).ok_or_else(|| {
            ToolError::InvalidInput("crop not recognized in the query; name the crop".into())
        })?;
        let rainfall_mm = capture_f64(&rainfall, &lowered).ok_or_else(|| {
            ToolError::InvalidInput("rainfall_mm not found; state rainfall like \"800mm\"".into())
        })?;
        let fertilizer_kg = capture_f64(&fertilizer, &lowered).ok_or_else(|| {
            ToolError::InvalidInput(
                "fertilizer_kg not found; state fertilizer like \"120 kg\"".into(),
            )
        })?;

        let mut input = json!({
            "crop": crop,
            "rainfall_mm": rainfall_mm,
            "fertilizer_kg": fertilizer_kg,
        });
        if let Some(area_ha) = capture_f64(&area, &lowered) {
            input["area_ha"] = json!(area_ha);
        }
        if let Some(region_name) = region
            .captures(&lowered)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        {
            input["region"] = json!(region_name);
        }
        Ok(input)
    })
}

pub(crate) fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

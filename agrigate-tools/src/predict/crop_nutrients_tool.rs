use std::sync::Arc;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::yield_tool::capture_f64;
use super::{check_range, BaselineNutrientModel, Predictor};

/// Input for nutrient-based crop recommendation
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CropByNutrientsInput {
    /// Soil nitrogen in kg/ha (0–300)
    pub nitrogen: f64,

    /// Soil phosphorus in kg/ha (0–150)
    pub phosphorus: f64,

    /// Soil potassium in kg/ha (0–300)
    pub potassium: f64,

    /// Soil pH (3–10)
    pub ph: f64,

    /// Seasonal rainfall in millimetres (0–5000)
    pub rainfall_mm: f64,
}

/// Recommends crops suited to measured soil nutrients.
pub struct CropByNutrientsTool {
    backend: Arc<dyn Predictor>,
}

impl CropByNutrientsTool {
    pub fn new(backend: Arc<dyn Predictor>) -> Self {
        Self { backend }
    }

    pub fn baseline() -> Self {
        Self::new(Arc::new(BaselineNutrientModel))
    }
}

impl Tool for CropByNutrientsTool {
    type Input = CropByNutrientsInput;

    fn name(&self) -> &str {
        "recommend_crop_nutrients"
    }

    fn description(&self) -> &str {
        "Recommend crops from soil N-P-K, pH, and rainfall measurements"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Prediction
    }

    fn keywords(&self) -> &[&'static str] {
        &["nitrogen", "phosphorus", "potassium", "npk", "ph", "grow", "plant"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[
            r"\b(which|what)\b.*\bcrop\b.*\b(grow|plant|sow|suit)",
            r"\bnpk\b",
            r"\bnitrogen\b.*\bphosphorus\b",
        ]
    }

    fn unit_hints(&self) -> &[&'static str] {
        &["kg/ha", "ph"]
    }

    fn priority(&self) -> i32 {
        15
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        check_range("nitrogen", input.nitrogen, 0.0, 300.0)?;
        check_range("phosphorus", input.phosphorus, 0.0, 150.0)?;
        check_range("potassium", input.potassium, 0.0, 300.0)?;
        check_range("ph", input.ph, 3.0, 10.0)?;
        check_range("rainfall_mm", input.rainfall_mm, 0.0, 5000.0)?;

        let ranking = self.backend.predict(&json!({
            "nitrogen": input.nitrogen,
            "phosphorus": input.phosphorus,
            "potassium": input.potassium,
            "ph": input.ph,
            "rainfall_mm": input.rainfall_mm,
        }))?;

        let mut recommendations = vec![format!(
            "Soil profile best suits {} at the measured nutrient levels.",
            ranking.primary.label
        )];
        if input.ph < 5.5 {
            recommendations.push("Soil is acidic; consider liming before sowing.".to_string());
        } else if input.ph > 8.0 {
            recommendations
                .push("Soil is alkaline; gypsum application can improve structure.".to_string());
        }

        ToolOutput::json(json!({
            "recommended_crop": ranking.primary.label,
            "confidence": ranking.primary.confidence,
            "alternatives": ranking.alternatives,
            "recommendations": recommendations,
        }))
        .map_err(Into::into)
    }
}

/// Pull N, P, K, pH, and rainfall readings out of the query.
pub fn crop_nutrients_extractor() -> InputExtractor {
    let nitrogen = Regex::new(r"\b(?:nitrogen|n)\b[\s:=]+(\d+(?:\.\d+)?)").expect("static pattern compiles");
    let phosphorus =
        Regex::new(r"\b(?:phosphorus|p)\b[\s:=]+(\d+(?:\.\d+)?)").expect("static pattern compiles");
    let potassium =
        Regex::new(r"\b(?:potassium|k)\b[\s:=]+(\d+(?:\.\d+)?)").expect("static pattern compiles");
    let ph = Regex::new(r"\bph\b[\s:=]+(\d+(?:\.\d+)?)").expect("static pattern compiles");
    let rainfall = Regex::new(r"(\d+(?:\.\d+)?)\s*mm\b").expect("static pattern compiles");

    Box::new(move |cx| {
        let lowered = cx.query.to_lowercase();
        let need = |name: &str, value: Option<f64>| {
            value.ok_or_else(|| {
                ToolError::InvalidInput(format!("{} not found; state it like \"{}: 90\"", name, name))
            })
        };
        Ok(json!({
            "nitrogen": need("nitrogen", capture_f64(&nitrogen, &lowered))?,
            "phosphorus": need("phosphorus", capture_f64(&phosphorus, &lowered))?,
            "potassium": need("potassium", capture_f64(&potassium, &lowered))?,
            "ph": need("ph", capture_f64(&ph, &lowered))?,
            "rainfall_mm": capture_f64(&rainfall, &lowered).unwrap_or(600.0),
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrigate_core::ExtractionContext;

    #[tokio::test]
    async fn test_recommends_ranked_crops() {
        let tool = CropByNutrientsTool::baseline();
        let output = tool
            .execute(CropByNutrientsInput {
                nitrogen: 90.0,
                phosphorus: 40.0,
                potassium: 40.0,
                ph: 6.0,
                rainfall_mm: 1800.0,
            })
            .await
            .unwrap();
        let payload = output.as_json().unwrap().clone();
        assert_eq!(payload["recommended_crop"], "rice");
        assert!(!payload["alternatives"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ph_out_of_range_rejected() {
        let tool = CropByNutrientsTool::baseline();
        let err = tool
            .execute(CropByNutrientsInput {
                nitrogen: 90.0,
                phosphorus: 40.0,
                potassium: 40.0,
                ph: 11.0,
                rainfall_mm: 600.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(ref m) if m.contains("ph")));
    }

    #[test]
    fn test_extractor_reads_npk() {
        let extractor = crop_nutrients_extractor();
        let cx = ExtractionContext {
            query: "Which crop should I grow with nitrogen 90 phosphorus 40 potassium 40 ph 6.5 and 700mm rain?",
            observations: &[],
            attachment: None,
        };
        let input = extractor(&cx).unwrap();
        assert_eq!(input["nitrogen"], 90.0);
        assert_eq!(input["ph"], 6.5);
        assert_eq!(input["rainfall_mm"], 700.0);
    }
}

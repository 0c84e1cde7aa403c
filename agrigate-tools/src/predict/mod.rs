//! Structured predictors.
//!
//! Each tool validates its declared input ranges (out-of-range values are
//! rejected, never clipped), hands the features to a black-box
//! [`Predictor`] backend, and wraps the ranked result with a fixed
//! vocabulary of agronomic recommendations.

mod baseline;
mod crop_climate_tool;
mod crop_nutrients_tool;
mod fertility_tool;
mod moisture_tool;
mod pest_tool;
mod yield_tool;

pub use baseline::{
    BaselineClimateModel, BaselineFertilityModel, BaselineMoistureModel, BaselineNutrientModel,
    BaselinePestModel, BaselineYieldModel,
};
pub use crop_climate_tool::{crop_climate_extractor, CropByClimateTool};
pub use crop_nutrients_tool::{crop_nutrients_extractor, CropByNutrientsTool};
pub use fertility_tool::{fertility_extractor, SoilFertilityTool};
pub use moisture_tool::{moisture_extractor, SoilMoistureTool};
pub use pest_tool::{pest_extractor, PestDetectionTool};
pub use yield_tool::{yield_extractor, YieldPredictionTool};

use agrigate_core::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ranked label with an optional numeric value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub confidence: f64,
}

/// A backend's ranked output: the primary prediction plus alternatives
/// in descending confidence.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub primary: Prediction,
    pub alternatives: Vec<Prediction>,
}

/// Black-box model backend.
///
/// The gateway never looks inside: a validated feature map goes in, a
/// ranked result comes out. Backends must be safe to call concurrently.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &Value) -> Result<Ranking, ToolError>;
}

/// Crops the extractors recognize in free-form queries.
pub(crate) const KNOWN_CROPS: &[&str] = &[
    "wheat",
    "rice",
    "maize",
    "corn",
    "cotton",
    "sugarcane",
    "barley",
    "millet",
    "sorghum",
    "soybean",
    "groundnut",
    "potato",
    "mustard",
    "chickpea",
    "lentil",
    "banana",
    "mango",
];

/// Range check shared by every predictor: out-of-range input is an error,
/// never silently clipped.
pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ToolError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ToolError::InvalidInput(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

/// First crop name mentioned in the query, if any.
pub(crate) fn crop_in_query(lowered: &str) -> Option<String> {
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    KNOWN_CROPS
        .iter()
        .find(|crop| tokens.contains(*crop))
        .map(|crop| crop.to_string())
}

//! Deterministic baseline backends.
//!
//! These stand in for trained model services behind the [`Predictor`]
//! trait so the gateway runs end-to-end without external dependencies.
//! They are rule-based, deterministic, and deliberately conservative with
//! confidence.

use agrigate_core::ToolError;
use serde_json::Value;

use super::{Prediction, Predictor, Ranking};

fn f64_field(features: &Value, field: &str) -> Result<f64, ToolError> {
    features
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::Internal(format!("backend feature {} missing", field)))
}

fn str_field<'a>(features: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    features
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::Internal(format!("backend feature {} missing", field)))
}

/// Per-crop base yields in tonnes per hectare under good conditions.
const BASE_YIELDS: &[(&str, f64)] = &[
    ("wheat", 3.5),
    ("rice", 4.0),
    ("maize", 5.5),
    ("corn", 5.5),
    ("cotton", 1.8),
    ("sugarcane", 70.0),
    ("barley", 2.8),
    ("millet", 1.2),
    ("sorghum", 1.5),
    ("soybean", 2.5),
    ("groundnut", 1.6),
    ("potato", 22.0),
    ("mustard", 1.3),
    ("chickpea", 1.1),
    ("lentil", 1.0),
];

/// Yield estimator: crop base yield scaled by rainfall and fertilizer
/// response curves.
pub struct BaselineYieldModel;

impl Predictor for BaselineYieldModel {
    fn predict(&self, features: &Value) -> Result<Ranking, ToolError> {
        let crop = str_field(features, "crop")?;
        let rainfall = f64_field(features, "rainfall_mm")?;
        let fertilizer = f64_field(features, "fertilizer_kg")?;

        let base = BASE_YIELDS
            .iter()
            .find(|(name, _)| *name == crop)
            .map(|(_, y)| *y)
            .unwrap_or(2.0);

        // Response curves peak at 800 mm rain and 150 kg/ha fertilizer.
        let rain_factor = 1.0 - ((rainfall - 800.0) / 1600.0).abs().min(0.6);
        let fert_factor = 0.7 + 0.3 * (fertilizer / 150.0).min(1.5);
        let estimate = base * rain_factor * fert_factor;

        let confidence = (0.95 - ((rainfall - 800.0) / 2000.0).abs()).clamp(0.5, 0.95);
        let round = |v: f64| (v * 100.0).round() / 100.0;

        Ok(Ranking {
            primary: Prediction {
                label: crop.to_string(),
                value: Some(round(estimate)),
                confidence: round(confidence),
            },
            alternatives: vec![
                Prediction {
                    label: "low_estimate".to_string(),
                    value: Some(round(estimate * 0.85)),
                    confidence: round(confidence * 0.8),
                },
                Prediction {
                    label: "high_estimate".to_string(),
                    value: Some(round(estimate * 1.15)),
                    confidence: round(confidence * 0.8),
                },
            ],
        })
    }
}

const PEST_LABELS: &[&str] = &[
    "aphids",
    "leaf rust",
    "powdery mildew",
    "stem borer",
    "armyworm",
    "healthy",
];

/// Image classifier stand-in: ranks the pest vocabulary from a stable
/// signature of the image bytes.
pub struct BaselinePestModel;

impl Predictor for BaselinePestModel {
    fn predict(&self, features: &Value) -> Result<Ranking, ToolError> {
        let signature = f64_field(features, "signature")? as u64;
        let count = PEST_LABELS.len() as u64;
        let top = (signature % count) as usize;

        let mut ranked: Vec<Prediction> = (0..PEST_LABELS.len())
            .map(|offset| {
                let idx = (top + offset) % PEST_LABELS.len();
                Prediction {
                    label: PEST_LABELS[idx].to_string(),
                    value: None,
                    confidence: (0.9 - 0.14 * offset as f64).max(0.05),
                }
            })
            .collect();
        let primary = ranked.remove(0);
        Ok(Ranking {
            primary,
            alternatives: ranked,
        })
    }
}

/// Soil moisture estimator from surface conditions.
pub struct BaselineMoistureModel;

impl Predictor for BaselineMoistureModel {
    fn predict(&self, features: &Value) -> Result<Ranking, ToolError> {
        let temperature = f64_field(features, "temperature_c")?;
        let humidity = f64_field(features, "humidity_pct")?;
        let rainfall = f64_field(features, "rainfall_mm")?;

        let moisture = (0.05 + 0.0022 * humidity + 0.0016 * rainfall - 0.0012 * temperature)
            .clamp(0.02, 0.55);
        let moisture = (moisture * 1000.0).round() / 1000.0;

        Ok(Ranking {
            primary: Prediction {
                label: "soil_moisture_m3m3".to_string(),
                value: Some(moisture),
                confidence: 0.8,
            },
            alternatives: vec![],
        })
    }
}

struct CropProfile {
    name: &'static str,
    temp_c: (f64, f64),
    rainfall_mm: (f64, f64),
    ph: (f64, f64),
    n: (f64, f64),
}

const CROP_PROFILES: &[CropProfile] = &[
    CropProfile { name: "rice", temp_c: (20.0, 35.0), rainfall_mm: (1000.0, 2500.0), ph: (5.0, 7.0), n: (60.0, 120.0) },
    CropProfile { name: "wheat", temp_c: (10.0, 25.0), rainfall_mm: (400.0, 900.0), ph: (6.0, 7.5), n: (80.0, 140.0) },
    CropProfile { name: "maize", temp_c: (18.0, 32.0), rainfall_mm: (500.0, 1100.0), ph: (5.5, 7.5), n: (80.0, 160.0) },
    CropProfile { name: "cotton", temp_c: (21.0, 35.0), rainfall_mm: (500.0, 1000.0), ph: (6.0, 8.0), n: (60.0, 120.0) },
    CropProfile { name: "chickpea", temp_c: (15.0, 28.0), rainfall_mm: (300.0, 700.0), ph: (6.0, 8.0), n: (20.0, 60.0) },
    CropProfile { name: "millet", temp_c: (22.0, 35.0), rainfall_mm: (250.0, 700.0), ph: (5.5, 8.0), n: (30.0, 80.0) },
    CropProfile { name: "sugarcane", temp_c: (22.0, 36.0), rainfall_mm: (1000.0, 2200.0), ph: (6.0, 7.8), n: (100.0, 250.0) },
    CropProfile { name: "soybean", temp_c: (18.0, 30.0), rainfall_mm: (500.0, 1200.0), ph: (6.0, 7.2), n: (30.0, 80.0) },
];

fn band_score(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value >= lo && value <= hi {
        1.0
    } else {
        let distance = if value < lo { lo - value } else { value - hi };
        let span = (hi - lo).max(1.0);
        (1.0 - distance / span).max(0.0)
    }
}

fn ranked_crops(scores: Vec<(String, f64)>) -> Ranking {
    let mut scores = scores;
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut predictions: Vec<Prediction> = scores
        .into_iter()
        .map(|(label, score)| Prediction {
            label,
            value: None,
            confidence: (score * 100.0).round() / 100.0,
        })
        .collect();
    let primary = predictions.remove(0);
    predictions.truncate(4);
    Ranking {
        primary,
        alternatives: predictions,
    }
}

/// Crop recommender over soil nutrient measurements.
pub struct BaselineNutrientModel;

impl Predictor for BaselineNutrientModel {
    fn predict(&self, features: &Value) -> Result<Ranking, ToolError> {
        let n = f64_field(features, "nitrogen")?;
        let ph = f64_field(features, "ph")?;
        let rainfall = f64_field(features, "rainfall_mm")?;

        let scores = CROP_PROFILES
            .iter()
            .map(|p| {
                let score = 0.4 * band_score(n, p.n)
                    + 0.3 * band_score(ph, p.ph)
                    + 0.3 * band_score(rainfall, p.rainfall_mm);
                (p.name.to_string(), score)
            })
            .collect();
        Ok(ranked_crops(scores))
    }
}

/// Crop recommender over climate measurements.
pub struct BaselineClimateModel;

impl Predictor for BaselineClimateModel {
    fn predict(&self, features: &Value) -> Result<Ranking, ToolError> {
        let temperature = f64_field(features, "temperature_c")?;
        let humidity = f64_field(features, "humidity_pct")?;
        let rainfall = f64_field(features, "rainfall_mm")?;

        let scores = CROP_PROFILES
            .iter()
            .map(|p| {
                let humidity_fit = band_score(humidity, (40.0, 85.0));
                let score = 0.45 * band_score(temperature, p.temp_c)
                    + 0.4 * band_score(rainfall, p.rainfall_mm)
                    + 0.15 * humidity_fit;
                (p.name.to_string(), score)
            })
            .collect();
        Ok(ranked_crops(scores))
    }
}

/// Soil fertility classifier over N-P-K and pH.
pub struct BaselineFertilityModel;

impl Predictor for BaselineFertilityModel {
    fn predict(&self, features: &Value) -> Result<Ranking, ToolError> {
        let n = f64_field(features, "nitrogen")?;
        let p = f64_field(features, "phosphorus")?;
        let k = f64_field(features, "potassium")?;
        let ph = f64_field(features, "ph")?;

        let nutrient_index =
            (n / 140.0).min(1.0) * 0.4 + (p / 60.0).min(1.0) * 0.3 + (k / 200.0).min(1.0) * 0.3;
        let ph_penalty = if (6.0..=7.5).contains(&ph) { 0.0 } else { 0.15 };
        let index = (nutrient_index - ph_penalty).clamp(0.0, 1.0);

        let (label, confidence) = if index >= 0.66 {
            ("high", 0.6 + 0.35 * (index - 0.66) / 0.34)
        } else if index >= 0.33 {
            ("medium", 0.6 + 0.3 * (1.0 - ((index - 0.5) / 0.17).abs()).max(0.0))
        } else {
            ("low", 0.6 + 0.35 * (0.33 - index) / 0.33)
        };

        let alternatives = ["low", "medium", "high"]
            .iter()
            .filter(|l| **l != label)
            .map(|l| Prediction {
                label: l.to_string(),
                value: None,
                confidence: ((1.0 - confidence) / 2.0 * 100.0).round() / 100.0,
            })
            .collect();

        Ok(Ranking {
            primary: Prediction {
                label: label.to_string(),
                value: Some((index * 100.0).round() / 100.0),
                confidence: (confidence * 100.0).round() / 100.0,
            },
            alternatives,
        })
    }
}

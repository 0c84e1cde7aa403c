use std::sync::Arc;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{BaselinePestModel, Predictor};

/// Input for image-based pest detection
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PestInput {
    /// Base64-encoded crop image
    pub image_base64: String,

    /// How many ranked predictions to return (1–10, default 3)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    3
}

/// Fixed remediation vocabulary, keyed by detected label.
const PEST_RECOMMENDATIONS: &[(&str, &[&str])] = &[
    (
        "aphids",
        &[
            "Spray neem oil on the undersides of leaves in the early morning.",
            "Introduce ladybird beetles as a biological control.",
        ],
    ),
    (
        "leaf rust",
        &[
            "Remove and destroy infected leaves; do not compost them.",
            "Apply a protective fungicide before the next rain.",
        ],
    ),
    (
        "powdery mildew",
        &[
            "Improve air circulation by thinning dense canopy.",
            "Apply sulfur-based fungicide at first sign of spread.",
        ],
    ),
    (
        "stem borer",
        &[
            "Remove and burn affected stems below the entry hole.",
            "Set pheromone traps to monitor adult moths.",
        ],
    ),
    (
        "armyworm",
        &[
            "Scout fields at dusk when larvae feed actively.",
            "Apply biopesticide while larvae are still small.",
        ],
    ),
    (
        "healthy",
        &["No infestation detected; continue routine scouting weekly."],
    ),
];

/// Pest identification from a crop image, over a black-box classifier.
pub struct PestDetectionTool {
    backend: Arc<dyn Predictor>,
}

impl PestDetectionTool {
    pub fn new(backend: Arc<dyn Predictor>) -> Self {
        Self { backend }
    }

    pub fn baseline() -> Self {
        Self::new(Arc::new(BaselinePestModel))
    }
}

impl Tool for PestDetectionTool {
    type Input = PestInput;

    fn name(&self) -> &str {
        "detect_pest"
    }

    fn description(&self) -> &str {
        "Identify pests or diseases from a crop photograph"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Prediction
    }

    fn keywords(&self) -> &[&'static str] {
        &["pest", "disease", "insect", "leaf", "infestation", "spots"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[r"\b(pest|disease|infest|bug|insect)\b", r"\bwhat.*\b(eating|attacking)\b"]
    }

    fn priority(&self) -> i32 {
        30
    }

    fn accepts_image(&self) -> bool {
        true
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if !(1..=10).contains(&input.top_k) {
            return Err(ToolError::InvalidInput(format!(
                "top_k must be between 1 and 10, got {}",
                input.top_k
            )));
        }
        let bytes = BASE64
            .decode(input.image_base64.trim())
            .map_err(|e| ToolError::InvalidInput(format!("image is not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(ToolError::InvalidInput("image payload is empty".into()));
        }

        // Stable per-image signature for the backend.
        let signature = bytes
            .iter()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u64));

        let ranking = self.backend.predict(&json!({ "signature": signature }))?;

        let mut all = vec![ranking.primary.clone()];
        all.extend(ranking.alternatives);
        all.truncate(input.top_k);

        let recommendations: Vec<&str> = PEST_RECOMMENDATIONS
            .iter()
            .find(|(label, _)| *label == ranking.primary.label)
            .map(|(_, recs)| recs.to_vec())
            .unwrap_or_default();

        ToolOutput::json(json!({
            "top_prediction": ranking.primary,
            "all_predictions": all,
            "confidence": ranking.primary.confidence,
            "recommendations": recommendations,
        }))
        .map_err(Into::into)
    }
}

/// Build [`PestInput`] from the request's image attachment.
pub fn pest_extractor() -> InputExtractor {
    Box::new(|cx| {
        let attachment = cx.attachment.ok_or_else(|| {
            ToolError::InvalidInput("pest detection needs an attached crop image".into())
        })?;
        if !attachment.is_image() {
            return Err(ToolError::InvalidInput(format!(
                "attachment {} is not an image",
                attachment.filename
            )));
        }
        Ok(json!({ "image_base64": attachment.data }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrigate_core::{Attachment, ExtractionContext};

    fn image_b64() -> String {
        BASE64.encode(b"\x89PNG fake image bytes for tests")
    }

    #[tokio::test]
    async fn test_detects_and_recommends() {
        let tool = PestDetectionTool::baseline();
        let output = tool
            .execute(PestInput {
                image_base64: image_b64(),
                top_k: 3,
            })
            .await
            .unwrap();

        let payload = output.as_json().unwrap().clone();
        assert!(payload["top_prediction"]["label"].is_string());
        assert_eq!(payload["all_predictions"].as_array().unwrap().len(), 3);
        assert!(payload["confidence"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_same_image_same_prediction() {
        let tool = PestDetectionTool::baseline();
        let a = tool
            .execute(PestInput {
                image_base64: image_b64(),
                top_k: 1,
            })
            .await
            .unwrap();
        let b = tool
            .execute(PestInput {
                image_base64: image_b64(),
                top_k: 1,
            })
            .await
            .unwrap();
        assert_eq!(a.as_json(), b.as_json());
    }

    #[tokio::test]
    async fn test_rejects_bad_payloads() {
        let tool = PestDetectionTool::baseline();

        let err = tool
            .execute(PestInput {
                image_base64: "not!!base64%%".into(),
                top_k: 3,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        let err = tool
            .execute(PestInput {
                image_base64: image_b64(),
                top_k: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(ref m) if m.contains("top_k")));
    }

    #[test]
    fn test_extractor_requires_image_attachment() {
        let extractor = pest_extractor();

        let cx = ExtractionContext {
            query: "what is eating my wheat",
            observations: &[],
            attachment: None,
        };
        assert!(matches!(
            extractor(&cx).unwrap_err(),
            ToolError::InvalidInput(_)
        ));

        let pdf = Attachment {
            filename: "report.pdf".into(),
            media_type: "application/pdf".into(),
            data: image_b64(),
        };
        let cx = ExtractionContext {
            query: "what is eating my wheat",
            observations: &[],
            attachment: Some(&pdf),
        };
        assert!(matches!(
            extractor(&cx).unwrap_err(),
            ToolError::InvalidInput(_)
        ));

        let image = Attachment {
            filename: "leaf.jpg".into(),
            media_type: "image/jpeg".into(),
            data: image_b64(),
        };
        let cx = ExtractionContext {
            query: "what is eating my wheat",
            observations: &[],
            attachment: Some(&image),
        };
        let input = extractor(&cx).unwrap();
        assert!(input["image_base64"].is_string());
    }
}

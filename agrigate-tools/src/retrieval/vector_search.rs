use std::sync::Arc;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One scored hit from the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub content: String,
    pub metadata: Value,
    /// Relevance in [0, 1], descending in results
    pub score: f64,
}

/// Search contract over the external vector store.
///
/// Index construction and the embedding model live elsewhere; the
/// gateway only searches.
pub trait VectorIndex: Send + Sync {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>, ToolError>;
}

/// Input for knowledge-base retrieval
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RagSearchInput {
    /// Search query text
    pub query: String,

    /// Number of documents to return (1–20, default 4)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    4
}

/// Knowledge-base retrieval over a [`VectorIndex`].
pub struct VectorSearchTool {
    index: Arc<dyn VectorIndex>,
}

impl VectorSearchTool {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Backed by the bundled agronomy snippets.
    pub fn bundled() -> Self {
        Self::new(Arc::new(StaticIndex::bundled()))
    }
}

impl Tool for VectorSearchTool {
    type Input = RagSearchInput;

    fn name(&self) -> &str {
        "rag_search"
    }

    fn description(&self) -> &str {
        "Retrieve relevant passages from the agronomy knowledge base"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Retrieval
    }

    fn keywords(&self) -> &[&'static str] {
        &[
            "what", "how", "why", "explain", "describe", "crop", "soil", "farming",
            "rotation", "organic", "practice",
        ]
    }

    fn patterns(&self) -> &[&'static str] {
        &[
            r"^(what|how|why|when|explain|describe|tell me)\b",
            r"\b(what is|what are|meaning of)\b",
        ]
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if input.query.trim().is_empty() {
            return Err(ToolError::InvalidInput("query must not be empty".into()));
        }
        if !(1..=20).contains(&input.top_k) {
            return Err(ToolError::InvalidInput(format!(
                "top_k must be between 1 and 20, got {}",
                input.top_k
            )));
        }

        let documents = self.index.search(&input.query, input.top_k)?;
        ToolOutput::json(json!({ "documents": documents })).map_err(Into::into)
    }
}

/// Forward the whole query into [`RagSearchInput`].
pub fn rag_extractor() -> InputExtractor {
    Box::new(|cx| Ok(json!({ "query": cx.query })))
}

/// In-memory index over a fixed document set, scored by token overlap.
pub struct StaticIndex {
    documents: Vec<(String, Value)>,
}

impl StaticIndex {
    pub fn new(documents: Vec<(String, Value)>) -> Self {
        Self { documents }
    }

    /// A small agronomy corpus for default wiring and tests.
    pub fn bundled() -> Self {
        let docs = [
            (
                "Crop rotation is the practice of growing different crops on the same land across \
                 seasons. Rotating cereals with legumes interrupts pest cycles and restores soil \
                 nitrogen.",
                json!({"source": "agronomy-handbook", "topic": "crop rotation"}),
            ),
            (
                "Legumes such as chickpea and lentil fix atmospheric nitrogen through root \
                 nodules, reducing fertilizer demand for the following cereal crop.",
                json!({"source": "agronomy-handbook", "topic": "nitrogen fixation"}),
            ),
            (
                "Drip irrigation delivers water directly to the root zone, cutting water use by \
                 30-50% compared with flood irrigation and reducing fungal disease pressure.",
                json!({"source": "irrigation-guide", "topic": "drip irrigation"}),
            ),
            (
                "Integrated pest management combines crop scouting, biological controls, and \
                 targeted pesticide use, applying chemicals only when pest populations cross \
                 economic thresholds.",
                json!({"source": "pest-guide", "topic": "integrated pest management"}),
            ),
            (
                "Soil organic matter improves water retention and nutrient buffering. Compost, \
                 green manure, and reduced tillage are the main ways to build it.",
                json!({"source": "soil-guide", "topic": "soil organic matter"}),
            ),
            (
                "Wheat grows best between 10 and 25 degrees Celsius with 400-900 mm of seasonal \
                 rainfall; late heat during grain filling reduces yield sharply.",
                json!({"source": "crop-profiles", "topic": "wheat"}),
            ),
            (
                "Mulching with straw or plastic film suppresses weeds, moderates soil \
                 temperature, and slows evaporation from the root zone.",
                json!({"source": "soil-guide", "topic": "mulching"}),
            ),
            (
                "Soil pH controls nutrient availability: most field crops prefer 6.0-7.5. Liming \
                 raises pH on acidic soils; gypsum improves sodic soils without raising pH.",
                json!({"source": "soil-guide", "topic": "soil ph"}),
            ),
        ];
        Self::new(
            docs.into_iter()
                .map(|(content, metadata)| (content.to_string(), metadata))
                .collect(),
        )
    }
}

impl VectorIndex for StaticIndex {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>, ToolError> {
        let query_tokens: Vec<String> = tokens(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredDocument> = self
            .documents
            .iter()
            .map(|(content, metadata)| {
                let doc_tokens = tokens(content);
                let hits = query_tokens
                    .iter()
                    .filter(|t| doc_tokens.contains(t))
                    .count();
                let score = hits as f64 / query_tokens.len() as f64;
                ScoredDocument {
                    content: content.clone(),
                    metadata: metadata.clone(),
                    score: (score * 1000.0).round() / 1000.0,
                }
            })
            .filter(|d| d.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

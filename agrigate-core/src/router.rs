//! Query routing.
//!
//! The router scores every registered tool against a query and proposes
//! the best one with a confidence. Scoring is pure (no I/O), deterministic
//! for a fixed registry, and O(T·L) for T tools and query length L: the
//! per-tool regexes are compiled at registration, and one shared pass
//! extracts the numeric-unit tokens.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::registry::ToolRegistry;
use crate::tool::ToolCategory;

/// Confidence at or above which direct execution is permitted.
pub const DIRECT_CONFIDENCE: f64 = 0.7;

/// Minimum top score; below it the router falls back to generation.
pub const SCORE_FLOOR: f64 = 0.15;

const PATTERN_WEIGHT: f64 = 0.25;
const PATTERN_CAP: f64 = 0.5;
const KEYWORD_WEIGHT: f64 = 0.35;
const UNIT_WEIGHT: f64 = 0.15;

/// Outcome of routing a query.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub chosen_tool: String,
    /// Normalized to [0, 1]; 0.0 marks the generation fallback
    pub confidence: f64,
    /// The next-best candidates, highest first
    pub alternatives: Vec<(String, f64)>,
    pub rationale: String,
    /// True when no tool scored above the floor
    pub fallback: bool,
}

impl RoutingDecision {
    /// Whether the decision permits skipping the planning step.
    pub fn permits_direct(&self) -> bool {
        self.confidence >= DIRECT_CONFIDENCE
    }
}

/// Scores registered tools against queries.
pub struct QueryRouter {
    fallback_tool: String,
}

#[derive(Debug)]
struct Scored {
    index: usize,
    name: String,
    priority: i32,
    score: f64,
    rationale: String,
}

impl QueryRouter {
    /// `fallback_tool` is the generation tool used when nothing scores
    /// above the floor.
    pub fn new(fallback_tool: impl Into<String>) -> Self {
        Self {
            fallback_tool: fallback_tool.into(),
        }
    }

    pub fn fallback_tool(&self) -> &str {
        &self.fallback_tool
    }

    /// Route a query to the best tool.
    ///
    /// An attached image forces the image-capable predictor regardless of
    /// the query text.
    pub fn route(&self, registry: &ToolRegistry, query: &str, has_image: bool) -> RoutingDecision {
        let lowered = query.to_lowercase();
        let tokens = word_tokens(&lowered);
        let units = unit_tokens(&lowered);

        let mut scored: Vec<Scored> = registry
            .entries()
            .enumerate()
            .map(|(index, entry)| {
                let tool = entry.tool();

                let pattern_hits = entry
                    .patterns()
                    .iter()
                    .filter(|re| re.is_match(&lowered))
                    .count();
                let pattern_score =
                    (pattern_hits as f64 * PATTERN_WEIGHT).min(PATTERN_CAP);

                let keywords = tool.keywords();
                let keyword_hits = keywords
                    .iter()
                    .filter(|kw| keyword_present(kw, &lowered, &tokens))
                    .count();
                let keyword_score = if keywords.is_empty() {
                    0.0
                } else {
                    keyword_hits as f64 / keywords.len() as f64 * KEYWORD_WEIGHT
                };

                let unit_hit = tool.category() == ToolCategory::Prediction
                    && tool
                        .unit_hints()
                        .iter()
                        .any(|hint| units.iter().any(|u| u == &hint.to_lowercase()));
                let unit_score = if unit_hit { UNIT_WEIGHT } else { 0.0 };

                let score = pattern_score + keyword_score + unit_score;
                let rationale = format!(
                    "{} pattern match(es), {}/{} keywords{}",
                    pattern_hits,
                    keyword_hits,
                    keywords.len(),
                    if unit_hit { ", unit hint" } else { "" }
                );

                Scored {
                    index,
                    name: tool.name().to_string(),
                    priority: tool.priority(),
                    score,
                    rationale,
                }
            })
            .collect();

        // Ties break by priority (higher wins), then insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.priority.cmp(&a.priority))
                .then(a.index.cmp(&b.index))
        });

        if has_image {
            if let Some(image_tool) = registry
                .entries()
                .map(|e| e.tool())
                .find(|t| t.accepts_image())
            {
                let alternatives = scored
                    .iter()
                    .filter(|s| s.name != image_tool.name())
                    .take(2)
                    .map(|s| (s.name.clone(), round3(s.score)))
                    .collect();
                return RoutingDecision {
                    chosen_tool: image_tool.name().to_string(),
                    confidence: 1.0,
                    alternatives,
                    rationale: "image attachment forces image-based predictor".to_string(),
                    fallback: false,
                };
            }
        }

        match scored.first() {
            Some(top) if top.score >= SCORE_FLOOR => RoutingDecision {
                chosen_tool: top.name.clone(),
                confidence: round3(top.score),
                alternatives: scored
                    .iter()
                    .skip(1)
                    .take(2)
                    .map(|s| (s.name.clone(), round3(s.score)))
                    .collect(),
                rationale: top.rationale.clone(),
                fallback: false,
            },
            _ => RoutingDecision {
                chosen_tool: self.fallback_tool.clone(),
                confidence: 0.0,
                alternatives: scored
                    .iter()
                    .take(2)
                    .map(|s| (s.name.clone(), round3(s.score)))
                    .collect(),
                rationale: "no tool scored above the floor".to_string(),
                fallback: true,
            },
        }
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Alphanumeric word tokens of the lowercased query.
fn word_tokens(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whole-word presence check; multi-word keywords match as substrings.
fn keyword_present(keyword: &str, lowered: &str, tokens: &[&str]) -> bool {
    if keyword.contains(' ') {
        lowered.contains(keyword)
    } else {
        tokens.contains(&keyword)
    }
}

/// Unit tokens appearing immediately after a number (e.g. "800mm",
/// "35 °c", "0.2 m³/m³").
fn unit_tokens(lowered: &str) -> Vec<String> {
    static NUM_UNIT: OnceLock<Regex> = OnceLock::new();
    let re = NUM_UNIT.get_or_init(|| {
        Regex::new(r"\d+(?:\.\d+)?\s*(°?[a-z%³µ][a-z%³µ/]*)").expect("static pattern compiles")
    });
    re.captures_iter(lowered)
        .map(|c| c[1].to_string())
        .collect()
}

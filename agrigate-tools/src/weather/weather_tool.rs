use std::sync::Arc;

use agrigate_core::{InputExtractor, Tool, ToolCategory, ToolError, ToolOutput};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{find_region_mention, WeatherError, WeatherService, MAX_FORECAST_DAYS, MIN_FORECAST_DAYS};

/// Input for weather lookup
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeatherInput {
    /// Free-form location, e.g. "Punjab"
    pub location: String,

    /// Forecast horizon in days (1–16, default 3)
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    3
}

/// Weather lookup with agricultural insights, over the shared service.
pub struct WeatherTool {
    service: Arc<WeatherService>,
}

impl WeatherTool {
    pub fn new(service: Arc<WeatherService>) -> Self {
        Self { service }
    }
}

impl Tool for WeatherTool {
    type Input = WeatherInput;

    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Current weather, forecast, and agricultural alerts for a region"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Utility
    }

    fn keywords(&self) -> &[&'static str] {
        &["weather", "rain", "rainfall", "temperature", "forecast", "humidity", "wind"]
    }

    fn patterns(&self) -> &[&'static str] {
        &[
            r"\bweather\b",
            r"\bforecast\b",
            r"\b(will it|going to) rain\b",
        ]
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
        if !(MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(&input.days) {
            return Err(ToolError::InvalidInput(format!(
                "days must be between {} and {}, got {}",
                MIN_FORECAST_DAYS, MAX_FORECAST_DAYS, input.days
            )));
        }

        let snapshot = self
            .service
            .snapshot(&input.location, input.days)
            .await
            .map_err(|e| match e {
                WeatherError::UnknownLocation { query, suggestions } => ToolError::InvalidInput(
                    format!("unknown location {}; closest matches: {}", query, suggestions.join(", ")),
                ),
                WeatherError::Upstream(tool_error) => tool_error,
            })?;

        ToolOutput::json(snapshot).map_err(Into::into)
    }
}

/// Pull the location and horizon out of the query by scanning the region
/// table. Region names must appear as whole words, so short names never
/// match inside unrelated text.
pub fn weather_extractor() -> InputExtractor {
    let days_re = Regex::new(r"(\d+)\s*[- ]?day").expect("static pattern compiles");

    Box::new(move |cx| {
        let lowered = cx.query.to_lowercase();

        let location = find_region_mention(&lowered)
            .map(|r| r.name.to_string())
            .ok_or_else(|| {
                ToolError::InvalidInput(
                    "location not recognized; name a region such as \"Punjab\"".into(),
                )
            })?;

        let days = days_re
            .captures(&lowered)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(3);

        Ok(json!({ "location": location, "days": days }))
    })
}

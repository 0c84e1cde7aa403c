//! Health reporting.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "components": {
            "registry": { "tools": state.registry.len() },
            "weather_cache": { "entries": state.weather.cache_len() },
            "generation": if state.config.generate_url.is_some() { "http" } else { "offline" },
            "web_search": state.config.search_url.is_some(),
            "translation": state.config.translate_url.is_some(),
        }
    }))
}

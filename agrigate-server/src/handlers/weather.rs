//! Weather endpoints.

use agrigate_tools::weather::{MAX_FORECAST_DAYS, MIN_FORECAST_DAYS, REGIONS};
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::extract::AdminUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WeatherBody {
    pub location: String,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    3
}

pub async fn weather(
    State(state): State<AppState>,
    Json(body): Json<WeatherBody>,
) -> ApiResult<Json<Value>> {
    if !(MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(&body.days) {
        return Err(ApiError::invalid_input(format!(
            "days must be between {} and {}, got {}",
            MIN_FORECAST_DAYS, MAX_FORECAST_DAYS, body.days
        )));
    }

    let snapshot = state.weather.snapshot(&body.location, body.days).await?;
    Ok(Json(json!(snapshot)))
}

pub async fn locations() -> Json<Value> {
    let listed: Vec<Value> = REGIONS
        .iter()
        .map(|r| json!({ "canonical_name": r.name, "lat": r.lat, "lon": r.lon }))
        .collect();
    Json(json!(listed))
}

pub async fn cache_clear(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Json<Value> {
    let cleared = state.weather.clear_cache();
    Json(json!({ "cleared": cleared }))
}

//! Real-time weather with agricultural post-processing.
//!
//! The service resolves free-form locations against a bundled region
//! table, caches snapshots under a TTL, fetches misses from the upstream
//! provider, and derives threshold-based agricultural insights.

mod cache;
mod insights;
mod locations;
mod service;
mod weather_tool;

pub use cache::SnapshotCache;
pub use insights::derive_insights;
pub use locations::{find_region_mention, resolve_location, suggest_locations, Region, REGIONS};
pub use service::{OpenMeteoUpstream, UpstreamForecast, WeatherError, WeatherService, WeatherUpstream};
pub use weather_tool::{weather_extractor, WeatherInput, WeatherTool};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive bounds for the forecast horizon in days.
pub const MIN_FORECAST_DAYS: u32 = 1;
pub const MAX_FORECAST_DAYS: u32 = 16;

/// Resolved coordinates of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Canonical region name, the cache key
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Conditions at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub rainfall_mm: f64,
    pub wind_kmh: f64,
    pub soil_temperature_c: f64,
    pub soil_moisture_m3m3: f64,
    pub description: String,
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: String,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub rainfall_mm: f64,
    pub description: String,
}

/// Cached unit of weather data: coordinates, current conditions, the
/// requested forecast horizon, and derived insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    pub forecast: Vec<DailyForecast>,
    pub insights: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

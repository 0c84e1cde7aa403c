//! Weather service: resolve → cache → fetch → post-process.

use std::sync::Arc;
use std::time::Duration;

use agrigate_core::ToolError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{
    derive_insights, resolve_location, suggest_locations, CurrentConditions, DailyForecast,
    LocationInfo, SnapshotCache, WeatherSnapshot, MAX_FORECAST_DAYS, MIN_FORECAST_DAYS,
};

/// Raw upstream payload, before agricultural post-processing.
#[derive(Debug, Clone)]
pub struct UpstreamForecast {
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
}

/// Upstream weather provider contract.
#[async_trait]
pub trait WeatherUpstream: Send + Sync {
    async fn fetch(&self, lat: f64, lon: f64, days: u32) -> Result<UpstreamForecast, ToolError>;
}

/// Errors from the weather service.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// The location is not in the bundled region table; carries the three
    /// nearest names by edit distance.
    #[error("unknown location: {query}")]
    UnknownLocation {
        query: String,
        suggestions: Vec<String>,
    },

    #[error(transparent)]
    Upstream(#[from] ToolError),
}

/// Location resolution, TTL caching, upstream fetch, and insight
/// derivation.
pub struct WeatherService {
    cache: SnapshotCache,
    upstream: Arc<dyn WeatherUpstream>,
}

impl WeatherService {
    pub fn new(upstream: Arc<dyn WeatherUpstream>, cache_ttl: Duration) -> Self {
        Self {
            cache: SnapshotCache::new(cache_ttl),
            upstream,
        }
    }

    /// Snapshot for a free-form location and forecast horizon.
    ///
    /// Cache hits return without touching the upstream; upstream failures
    /// return without poisoning the cache.
    pub async fn snapshot(&self, location: &str, days: u32) -> Result<WeatherSnapshot, WeatherError> {
        if !(MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(&days) {
            return Err(WeatherError::Upstream(ToolError::InvalidInput(format!(
                "days must be between {} and {}, got {}",
                MIN_FORECAST_DAYS, MAX_FORECAST_DAYS, days
            ))));
        }

        let region = resolve_location(location).map_err(|_| WeatherError::UnknownLocation {
            query: location.trim().to_string(),
            suggestions: suggest_locations(location),
        })?;

        if let Some(snapshot) = self.cache.get(region.name, days) {
            debug!(location = region.name, days, "weather cache hit");
            return Ok(snapshot);
        }

        let upstream = self.upstream.fetch(region.lat, region.lon, days).await?;

        let mut forecast = upstream.daily;
        forecast.truncate(days as usize);
        let insights = derive_insights(&upstream.current, &forecast);

        let snapshot = WeatherSnapshot {
            location: LocationInfo {
                name: region.name.to_string(),
                lat: region.lat,
                lon: region.lon,
            },
            current: upstream.current,
            forecast,
            insights,
            fetched_at: Utc::now(),
        };
        self.cache.insert(region.name, days, snapshot.clone());
        Ok(snapshot)
    }

    /// Administrative cache flush; returns the number of dropped entries.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Open-Meteo shaped HTTP upstream.
pub struct OpenMeteoUpstream {
    client: Client,
    base_url: String,
}

impl OpenMeteoUpstream {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("HTTP client construction cannot fail");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m,soil_temperature_0cm,soil_moisture_0_to_1cm,weather_code";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code";

#[async_trait]
impl WeatherUpstream for OpenMeteoUpstream {
    async fn fetch(&self, lat: f64, lon: f64, days: u32) -> Result<UpstreamForecast, ToolError> {
        let response = self
            .client
            .get(format!("{}/v1/forecast", self.base_url))
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("forecast_days", days.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(format!("weather upstream: {}", e))
                } else {
                    ToolError::BackendUnavailable(format!("weather upstream: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::BackendUnavailable(format!(
                "weather upstream returned {}",
                status
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            ToolError::BackendUnavailable(format!("malformed weather response: {}", e))
        })?;
        parse_open_meteo(&payload)
    }
}

fn parse_open_meteo(payload: &Value) -> Result<UpstreamForecast, ToolError> {
    let current = &payload["current"];
    let number = |v: &Value| v.as_f64().unwrap_or(0.0);

    let current = CurrentConditions {
        temperature_c: number(&current["temperature_2m"]),
        humidity_pct: number(&current["relative_humidity_2m"]),
        rainfall_mm: number(&current["precipitation"]),
        wind_kmh: number(&current["wind_speed_10m"]),
        soil_temperature_c: number(&current["soil_temperature_0cm"]),
        soil_moisture_m3m3: number(&current["soil_moisture_0_to_1cm"]),
        description: describe_weather_code(current["weather_code"].as_u64().unwrap_or(0)),
    };

    let daily = &payload["daily"];
    let dates = daily["time"].as_array().cloned().unwrap_or_default();
    let forecast = dates
        .iter()
        .enumerate()
        .map(|(i, date)| DailyForecast {
            date: date.as_str().unwrap_or_default().to_string(),
            temp_min_c: number(&daily["temperature_2m_min"][i]),
            temp_max_c: number(&daily["temperature_2m_max"][i]),
            rainfall_mm: number(&daily["precipitation_sum"][i]),
            description: describe_weather_code(daily["weather_code"][i].as_u64().unwrap_or(0)),
        })
        .collect();

    Ok(UpstreamForecast { current, daily: forecast })
}

/// WMO weather interpretation codes, collapsed to farmer-facing phrases.
fn describe_weather_code(code: u64) -> String {
    let description = match code {
        0 => "clear sky",
        1..=3 => "partly cloudy",
        45 | 48 => "fog",
        51..=57 => "drizzle",
        61..=67 => "rain",
        71..=77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95..=99 => "thunderstorm",
        _ => "mixed conditions",
    };
    description.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingUpstream {
        calls: AtomicUsize,
        temperature: f64,
    }

    impl CountingUpstream {
        fn new(temperature: f64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                temperature,
            }
        }
    }

    #[async_trait]
    impl WeatherUpstream for CountingUpstream {
        async fn fetch(&self, _lat: f64, _lon: f64, days: u32) -> Result<UpstreamForecast, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UpstreamForecast {
                current: CurrentConditions {
                    temperature_c: self.temperature,
                    humidity_pct: 55.0,
                    rainfall_mm: 2.0,
                    wind_kmh: 9.0,
                    soil_temperature_c: self.temperature - 2.0,
                    soil_moisture_m3m3: 0.22,
                    description: "partly cloudy".into(),
                },
                daily: (0..days)
                    .map(|i| DailyForecast {
                        date: format!("2025-06-{:02}", i + 1),
                        temp_min_c: 18.0,
                        temp_max_c: self.temperature + 3.0,
                        rainfall_mm: 4.0,
                        description: "partly cloudy".into(),
                    })
                    .collect(),
            })
        }
    }

    struct FailingUpstream;

    #[async_trait]
    impl WeatherUpstream for FailingUpstream {
        async fn fetch(&self, _lat: f64, _lon: f64, _days: u32) -> Result<UpstreamForecast, ToolError> {
            Err(ToolError::BackendUnavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_second_lookup_within_ttl_hits_cache_once_upstream() {
        let upstream = Arc::new(CountingUpstream::new(24.0));
        let service = WeatherService::new(upstream.clone(), Duration::from_secs(300));

        let first = service.snapshot("Punjab", 3).await.unwrap();
        let second = service.snapshot("Punjab", 3).await.unwrap();

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(first.forecast.len(), 3);
    }

    #[tokio::test]
    async fn test_upstream_failure_does_not_poison_cache() {
        let service = WeatherService::new(Arc::new(FailingUpstream), Duration::from_secs(300));
        let err = service.snapshot("Punjab", 3).await.unwrap_err();
        assert!(matches!(
            err,
            WeatherError::Upstream(ToolError::BackendUnavailable(_))
        ));
        assert_eq!(service.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_location_carries_three_suggestions() {
        let service = WeatherService::new(Arc::new(FailingUpstream), Duration::from_secs(300));
        let err = service.snapshot("Atlantis", 3).await.unwrap_err();
        match err {
            WeatherError::UnknownLocation { query, suggestions } => {
                assert_eq!(query, "Atlantis");
                assert_eq!(suggestions.len(), 3);
            }
            other => panic!("expected UnknownLocation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_days_bounds_checked_before_resolution() {
        let service = WeatherService::new(Arc::new(FailingUpstream), Duration::from_secs(300));
        for days in [0, 17] {
            let err = service.snapshot("Punjab", days).await.unwrap_err();
            assert!(matches!(
                err,
                WeatherError::Upstream(ToolError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_hot_dry_snapshot_gets_insights() {
        let upstream = Arc::new(CountingUpstream::new(38.0));
        let service = WeatherService::new(upstream, Duration::from_secs(300));
        let snapshot = service.snapshot("Rajasthan", 2).await.unwrap();
        assert!(snapshot.insights.iter().any(|i| i.contains("Heat stress")));
    }

    #[tokio::test]
    async fn test_open_meteo_client_parses_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("forecast_days", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current": {
                    "temperature_2m": 31.4,
                    "relative_humidity_2m": 48.0,
                    "precipitation": 0.0,
                    "wind_speed_10m": 12.5,
                    "soil_temperature_0cm": 29.0,
                    "soil_moisture_0_to_1cm": 0.18,
                    "weather_code": 2
                },
                "daily": {
                    "time": ["2025-06-01", "2025-06-02"],
                    "temperature_2m_max": [33.0, 34.5],
                    "temperature_2m_min": [22.0, 23.1],
                    "precipitation_sum": [0.0, 1.2],
                    "weather_code": [0, 61]
                }
            })))
            .mount(&server)
            .await;

        let upstream = OpenMeteoUpstream::new(server.uri());
        let forecast = upstream.fetch(30.9, 75.85, 2).await.unwrap();
        assert_eq!(forecast.current.temperature_c, 31.4);
        assert_eq!(forecast.current.description, "partly cloudy");
        assert_eq!(forecast.daily.len(), 2);
        assert_eq!(forecast.daily[1].rainfall_mm, 1.2);
        assert_eq!(forecast.daily[1].description, "rain");
    }

    #[tokio::test]
    async fn test_open_meteo_5xx_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let upstream = OpenMeteoUpstream::new(server.uri());
        let err = upstream.fetch(30.9, 75.85, 2).await.unwrap_err();
        assert!(matches!(err, ToolError::BackendUnavailable(_)));
    }
}

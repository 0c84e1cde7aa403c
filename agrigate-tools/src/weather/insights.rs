//! Threshold-based agricultural insight rules.

use super::{CurrentConditions, DailyForecast};

pub const HEAT_STRESS_C: f64 = 35.0;
pub const COLD_STRESS_C: f64 = 10.0;
pub const WATERLOGGING_7D_MM: f64 = 100.0;
pub const DROUGHT_7D_MM: f64 = 10.0;
pub const IRRIGATION_MOISTURE_M3M3: f64 = 0.15;

/// Derive fixed-rule agricultural guidance from a snapshot's raw data.
///
/// The seven-day rainfall total uses the forecast when present, falling
/// back to the current reading alone.
pub fn derive_insights(current: &CurrentConditions, forecast: &[DailyForecast]) -> Vec<String> {
    let mut insights = Vec::new();

    if current.temperature_c > HEAT_STRESS_C {
        insights.push(format!(
            "Heat stress alert: {:.1}°C exceeds {:.0}°C; irrigate in the evening and avoid midday spraying.",
            current.temperature_c, HEAT_STRESS_C
        ));
    }
    if current.temperature_c < COLD_STRESS_C {
        insights.push(format!(
            "Cold stress alert: {:.1}°C is below {:.0}°C; protect seedlings and delay transplanting.",
            current.temperature_c, COLD_STRESS_C
        ));
    }

    let week_rainfall: f64 = if forecast.is_empty() {
        current.rainfall_mm
    } else {
        forecast.iter().take(7).map(|d| d.rainfall_mm).sum()
    };
    if week_rainfall > WATERLOGGING_7D_MM {
        insights.push(format!(
            "Waterlogging alert: {:.0} mm expected over 7 days; clear drainage channels now.",
            week_rainfall
        ));
    }
    if week_rainfall < DROUGHT_7D_MM {
        insights.push(format!(
            "Drought alert: only {:.0} mm expected over 7 days; prioritize moisture conservation.",
            week_rainfall
        ));
    }

    if current.soil_moisture_m3m3 < IRRIGATION_MOISTURE_M3M3 {
        insights.push(format!(
            "Irrigation recommended: soil moisture {:.2} m³/m³ is below the {:.2} threshold.",
            current.soil_moisture_m3m3, IRRIGATION_MOISTURE_M3M3
        ));
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions(temp: f64, moisture: f64) -> CurrentConditions {
        CurrentConditions {
            temperature_c: temp,
            humidity_pct: 50.0,
            rainfall_mm: 5.0,
            wind_kmh: 10.0,
            soil_temperature_c: temp - 3.0,
            soil_moisture_m3m3: moisture,
            description: "clear".into(),
        }
    }

    fn day(rain: f64) -> DailyForecast {
        DailyForecast {
            date: "2025-06-01".into(),
            temp_min_c: 18.0,
            temp_max_c: 30.0,
            rainfall_mm: rain,
            description: "rain".into(),
        }
    }

    #[test]
    fn test_heat_and_cold_thresholds_are_exclusive_bounds() {
        assert!(derive_insights(&conditions(35.0, 0.3), &vec![day(5.0); 7]).is_empty());
        let hot = derive_insights(&conditions(35.1, 0.3), &vec![day(5.0); 7]);
        assert!(hot.iter().any(|i| i.contains("Heat stress")));

        let cold = derive_insights(&conditions(9.9, 0.3), &vec![day(5.0); 7]);
        assert!(cold.iter().any(|i| i.contains("Cold stress")));
    }

    #[test]
    fn test_rainfall_window_alerts() {
        let wet = derive_insights(&conditions(25.0, 0.3), &vec![day(20.0); 7]);
        assert!(wet.iter().any(|i| i.contains("Waterlogging")));

        let dry = derive_insights(&conditions(25.0, 0.3), &vec![day(1.0); 7]);
        assert!(dry.iter().any(|i| i.contains("Drought")));
    }

    #[test]
    fn test_rainfall_window_uses_at_most_seven_days() {
        // 10 days of 15 mm: only the first 7 count, 105 mm > 100 mm
        let forecast = vec![day(15.0); 10];
        let insights = derive_insights(&conditions(25.0, 0.3), &forecast);
        assert!(insights.iter().any(|i| i.contains("Waterlogging")));
    }

    #[test]
    fn test_irrigation_threshold() {
        let dry_soil = derive_insights(&conditions(25.0, 0.14), &vec![day(5.0); 7]);
        assert!(dry_soil.iter().any(|i| i.contains("Irrigation recommended")));

        let ok_soil = derive_insights(&conditions(25.0, 0.15), &vec![day(5.0); 7]);
        assert!(ok_soil.iter().all(|i| !i.contains("Irrigation recommended")));
    }
}

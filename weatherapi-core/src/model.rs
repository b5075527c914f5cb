use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// One complete, self-consistent view of a location's weather.
///
/// Snapshots are built in full before they are published; a fetch either
/// yields a whole new snapshot or leaves the previous one untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    /// One entry per forecast day; empty when forecasting is disabled or the
    /// vendor returned nothing usable.
    pub daily_forecast: Vec<ForecastEntry>,
    /// One entry per remaining forecast hour across all days.
    pub hourly_forecast: Vec<ForecastEntry>,
}

/// Current observations. Every field is optional: a missing vendor field
/// degrades to `None`, never to a failed update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Relative humidity, percent.
    pub humidity: Option<f64>,
    /// Air temperature, degrees Celsius.
    pub temperature: Option<f64>,
    /// Pressure, millibars.
    pub pressure: Option<f64>,
    /// Wind speed, km/h.
    pub wind_speed: Option<f64>,
    /// Wind bearing in degrees, passed through unrounded.
    pub wind_bearing: Option<f64>,
    /// Visibility, km.
    pub visibility: Option<f64>,
    pub uv_index: Option<f64>,
    /// Ozone concentration, taken from the air-quality block when present.
    pub ozone: Option<f64>,
    pub condition: Option<Condition>,
    /// The vendor's raw condition code, before classification.
    pub reported_condition: Option<i64>,
    pub air_quality: Option<AirQuality>,
}

/// Pollutant concentrations and the two national air-quality indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub co: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub so2: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub us_epa_index: Option<i64>,
    pub gb_defra_index: Option<i64>,
}

impl AirQuality {
    /// UK DEFRA band for this reading, if the index is present and in range.
    pub fn defra_band(&self) -> Option<&'static str> {
        defra_index_band(self.gb_defra_index)
    }
}

/// Map a UK DEFRA air-quality index to its published band name.
///
/// Indexes below 1 have no band; the scale is open-ended upward, so anything
/// from 10 on is "Very High".
pub fn defra_index_band(value: Option<i64>) -> Option<&'static str> {
    match value? {
        1..=3 => Some("Low"),
        4..=6 => Some("Moderate"),
        7..=9 => Some("High"),
        v if v >= 10 => Some("Very High"),
        _ => None,
    }
}

/// A single daily or hourly forecast row.
///
/// Daily entries carry `templow` but no pressure or bearing; hourly entries
/// are the other way around. Unavailable fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// RFC 3339 instant: the day (midnight UTC) or the hour in the forecast
    /// location's zone.
    pub datetime: Option<String>,
    pub condition: Option<Condition>,
    pub reported_condition: Option<i64>,
    /// Chance of rain, percent, passed through as the vendor sent it.
    pub precipitation_probability: Option<f64>,
    /// Precipitation amount, mm.
    pub precipitation: Option<f64>,
    /// Pressure, millibars (hourly only).
    pub pressure: Option<f64>,
    /// Temperature, degrees Celsius (daily: the day's maximum).
    pub temperature: Option<f64>,
    /// Daily minimum temperature, degrees Celsius.
    pub templow: Option<f64>,
    /// Compass wind direction, e.g. "SSW" (hourly only).
    pub wind_bearing: Option<String>,
    /// Wind speed, km/h (daily: the day's maximum).
    pub wind_speed: Option<f64>,
}

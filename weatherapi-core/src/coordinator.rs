use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    condition::parse_condition_code,
    convert::{datetime_to_iso, is_daytime, to_float, to_int},
    error::{ApiKeyError, UpdateFailed},
    model::{AirQuality, CurrentConditions, ForecastEntry, WeatherSnapshot},
};

const BASE_URL: &str = "https://api.weatherapi.com/v1";
const TIMEZONE_ENDPOINT: &str = "timezone.json";
const CURRENT_ENDPOINT: &str = "current.json";
const FORECAST_ENDPOINT: &str = "forecast.json";

/// Days of forecast requested from the vendor.
pub const FORECAST_DAYS: u8 = 5;

/// Default refresh cadence for hosts.
///
/// 1,000,000 calls/month = 32,258/day = 1,344/hour = 22/minute.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Reference location (a New York ZIP) used for key validation probes.
const PROBE_LOCATION: &str = "00501";

// The vendor rejects unadorned client user agents.
const PROBE_USER_AGENT: &str = "APIMATIC 2.0";
const FETCH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

/// Settings for one coordinator instance.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub api_key: String,
    /// Vendor location query, e.g. "48.85,2.35" or a place name. Opaque to
    /// the coordinator.
    pub location: String,
    /// Display name, used in logs and generated identifiers.
    pub name: String,
    /// Refresh cadence. The coordinator never schedules; hosts read this.
    pub update_interval: Duration,
    /// When false, only current conditions are fetched.
    pub forecast: bool,
    /// Drop hourly entries that precede the current hour.
    pub ignore_past_forecast: bool,
    /// Fallback zone for past-hour filtering when the vendor omits `tz_id`.
    pub time_zone: Tz,
}

impl CoordinatorConfig {
    pub fn new(api_key: String, location: String, name: String) -> Self {
        Self {
            api_key,
            location,
            name,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            forecast: true,
            ignore_past_forecast: true,
            time_zone: Tz::UTC,
        }
    }

    /// Stable identifier for the weather feed itself.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.location, self.name)
    }

    /// Stable identifier for a derived measurement feed.
    pub fn sensor_unique_id(&self, description: &str) -> String {
        format!("{}_{} {}", self.location, self.name, description)
    }
}

/// Polling adapter for WeatherAPI.com.
///
/// Each `fetch` performs exactly one request cycle and either returns a
/// complete [`WeatherSnapshot`] (also retained as last known good) or an
/// [`UpdateFailed`] that leaves the previous snapshot in place. Retry cadence
/// belongs to the host; dropping the returned future aborts the request.
/// `fetch` borrows the coordinator exclusively, so a single instance never
/// has two refreshes in flight.
#[derive(Debug)]
pub struct WeatherApiCoordinator {
    config: CoordinatorConfig,
    http: Client,
    base_url: String,
    data: Option<WeatherSnapshot>,
}

impl WeatherApiCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_base_url(config, BASE_URL)
    }

    /// Same coordinator against an explicit endpoint root. This is how the
    /// test suite points the client at a local server.
    pub fn with_base_url(config: CoordinatorConfig, base_url: impl Into<String>) -> Self {
        Self { config, http: Client::new(), base_url: base_url.into(), data: None }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Last successfully fetched snapshot, `None` until the first success.
    pub fn data(&self) -> Option<&WeatherSnapshot> {
        self.data.as_ref()
    }

    /// Fetch and parse one complete snapshot.
    pub async fn fetch(&mut self) -> Result<WeatherSnapshot, UpdateFailed> {
        let endpoint = if self.config.forecast { FORECAST_ENDPOINT } else { CURRENT_ENDPOINT };
        let url = format!("{}/{}", self.base_url, endpoint);
        let days = FORECAST_DAYS.to_string();

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, FETCH_USER_AGENT)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("q", self.config.location.as_str()),
                ("days", days.as_str()),
                ("aqi", "yes"),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(UpdateFailed::from_reqwest)?;

        // Decode only on 200; other statuses rarely carry a JSON body.
        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpdateFailed::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response.text().await.map_err(UpdateFailed::from_reqwest)?;
        let payload = decode_payload(&body)?;

        // Zone reported for the location, falling back to the configured one.
        let tz = payload
            .location
            .as_ref()
            .and_then(|location| location.tz_id.as_deref())
            .and_then(|tz_id| match tz_id.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    warn!("Unknown time zone {tz_id:?} for {}", self.config.location);
                    None
                }
            })
            .unwrap_or(self.config.time_zone);

        let current = self.parse_current(payload.current.as_ref());
        let (daily_forecast, hourly_forecast) = if self.config.forecast {
            (
                self.parse_forecast(payload.forecast.as_ref(), false, tz)?,
                self.parse_forecast(payload.forecast.as_ref(), true, tz)?,
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let snapshot = WeatherSnapshot { current, daily_forecast, hourly_forecast };
        self.data = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn parse_current(&self, json: Option<&RawCurrent>) -> CurrentConditions {
        let Some(json) = json else {
            warn!("No current data received");
            return CurrentConditions::default();
        };

        debug!("Current {}={json:?}", self.config.name);

        let condition_code = json.condition.as_ref().and_then(|c| c.code.as_ref());
        let is_day = is_daytime(json.is_day.as_ref());

        let air_quality = json.air_quality.as_ref().map(|aq| AirQuality {
            co: to_float(aq.co.as_ref()),
            no2: to_float(aq.no2.as_ref()),
            o3: to_float(aq.o3.as_ref()),
            so2: to_float(aq.so2.as_ref()),
            pm2_5: to_float(aq.pm2_5.as_ref()),
            pm10: to_float(aq.pm10.as_ref()),
            us_epa_index: to_int(aq.us_epa_index.as_ref()),
            gb_defra_index: to_int(aq.gb_defra_index.as_ref()),
        });
        if air_quality.is_none() {
            debug!("No air_quality found in data");
        }

        CurrentConditions {
            humidity: to_float(json.humidity.as_ref()),
            temperature: to_float(json.temp_c.as_ref()),
            pressure: to_float(json.pressure_mb.as_ref()),
            wind_speed: to_float(json.wind_kph.as_ref()),
            wind_bearing: json.wind_degree.as_ref().and_then(Value::as_f64),
            visibility: to_float(json.vis_km.as_ref()),
            uv_index: to_float(json.uv.as_ref()),
            ozone: air_quality.as_ref().and_then(|aq| aq.o3),
            condition: parse_condition_code(condition_code, is_day),
            reported_condition: to_int(condition_code),
            air_quality,
        }
    }

    fn parse_forecast(
        &self,
        json: Option<&RawForecast>,
        hourly: bool,
        tz: Tz,
    ) -> Result<Vec<ForecastEntry>, UpdateFailed> {
        let mut entries = Vec::new();

        let Some(json) = json else {
            warn!("No forecast data received");
            return Ok(entries);
        };

        debug!("Forecast {}={json:?}", self.config.name);

        if json.forecastday.is_empty() {
            warn!("No day forecast found in data");
            return Ok(entries);
        }

        for forecastday in &json.forecastday {
            // `date` is in YYYY-MM-DD format, `time_epoch` is unix time.
            let day = forecastday.day.as_ref();

            if hourly {
                let mut hours_with_no_data = 0;

                for hour in &forecastday.hour {
                    match self.parse_hour_forecast(hour, tz) {
                        HourOutcome::NoData => hours_with_no_data += 1,
                        // Ignored past hours don't count as missing data.
                        HourOutcome::PastHour => {}
                        HourOutcome::Keep(entry) => entries.push(*entry),
                    }
                }

                if hours_with_no_data > 0 {
                    warn!(
                        "Found {hours_with_no_data} hourly forecasts for {} with no data",
                        self.config.name
                    );
                }
            } else {
                let condition_code =
                    day.and_then(|d| d.condition.as_ref()).and_then(|c| c.code.as_ref());
                let is_day = is_daytime(day.and_then(|d| d.is_day.as_ref()));

                entries.push(ForecastEntry {
                    datetime: datetime_to_iso(forecastday.date.as_deref())?,
                    condition: parse_condition_code(condition_code, is_day),
                    reported_condition: to_int(condition_code),
                    precipitation_probability: day
                        .and_then(|d| d.daily_chance_of_rain.as_ref())
                        .and_then(Value::as_f64),
                    precipitation: to_float(day.and_then(|d| d.totalprecip_mm.as_ref())),
                    // There is no pressure or wind_dir in the day aggregate.
                    pressure: None,
                    temperature: to_float(day.and_then(|d| d.maxtemp_c.as_ref())),
                    templow: to_float(day.and_then(|d| d.mintemp_c.as_ref())),
                    wind_bearing: None,
                    wind_speed: to_float(day.and_then(|d| d.maxwind_kph.as_ref())),
                });
            }
        }

        info!("Loaded {} forecast values for {}", entries.len(), self.config.name);
        Ok(entries)
    }

    fn parse_hour_forecast(&self, data: &RawHour, tz: Tz) -> HourOutcome {
        // Sometimes the hourly forecast is empty; skip if `time_epoch` is missing.
        let Some(time_epoch) = data.time_epoch else {
            return HourOutcome::NoData;
        };

        if self.config.ignore_past_forecast && time_epoch < current_hour_epoch(tz) {
            debug!("{}: Ignoring past forecast", self.config.location);
            return HourOutcome::PastHour;
        }

        let condition_code = data.condition.as_ref().and_then(|c| c.code.as_ref());
        let is_day = is_daytime(data.is_day.as_ref());
        let datetime =
            DateTime::from_timestamp(time_epoch, 0).map(|t| t.with_timezone(&tz).to_rfc3339());

        HourOutcome::Keep(Box::new(ForecastEntry {
            datetime,
            condition: parse_condition_code(condition_code, is_day),
            reported_condition: to_int(condition_code),
            precipitation_probability: data.chance_of_rain.as_ref().and_then(Value::as_f64),
            precipitation: to_float(data.precip_mm.as_ref()),
            pressure: to_float(data.pressure_mb.as_ref()),
            temperature: to_float(data.temp_c.as_ref()),
            templow: None,
            wind_bearing: data.wind_dir.clone(),
            wind_speed: to_float(data.wind_kph.as_ref()),
        }))
    }
}

enum HourOutcome {
    /// The hour had no identifying timestamp; counted and reported.
    NoData,
    /// The hour precedes the current one and filtering is on.
    PastHour,
    Keep(Box<ForecastEntry>),
}

/// Top of the current hour as a unix timestamp, computed in `tz`.
///
/// Computing this in the forecast location's zone keeps the cutoff correct
/// for zones with 30- and 45-minute offsets, where the local hour does not
/// start on a whole UTC hour.
fn current_hour_epoch(tz: Tz) -> i64 {
    let now = Utc::now().with_timezone(&tz);
    now.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .map_or_else(|| now.timestamp(), |t| t.timestamp())
}

/// Decode a fetch response body. Any non-empty vendor error object fails the
/// update, whatever its code; only a bare `{}` rides along with valid
/// payloads.
fn decode_payload(body: &str) -> Result<ApiPayload, UpdateFailed> {
    let payload: ApiPayload = serde_json::from_str(body)?;

    if let Some(error) = &payload.error {
        if !error.is_empty() {
            return Err(UpdateFailed::VendorError {
                code: error.code.as_ref().map_or_else(String::new, error_code_string),
                message: error.message.clone().unwrap_or_default(),
            });
        }
    }

    Ok(payload)
}

fn error_code_string(code: &Value) -> String {
    match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Probe-side rule: a vendor error counts only when its code is populated
/// (non-empty string or nonzero number).
fn populated_code(code: Option<&Value>) -> Option<String> {
    match code? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Probe the vendor's timezone endpoint to decide whether `api_key` works.
///
/// `Ok(false)` means the vendor answered and rejected the key;
/// [`ApiKeyError`] means no verdict was possible.
pub async fn is_valid_api_key(api_key: &str) -> Result<bool, ApiKeyError> {
    check_api_key(BASE_URL, api_key).await
}

/// [`is_valid_api_key`] against an explicit endpoint root.
pub async fn check_api_key(base_url: &str, api_key: &str) -> Result<bool, ApiKeyError> {
    if api_key.is_empty() {
        return Err(ApiKeyError::InvalidApiKey);
    }

    let url = format!("{base_url}/{TIMEZONE_ENDPOINT}");

    let response = Client::new()
        .get(&url)
        .header(header::ACCEPT, "application/json")
        .header(header::USER_AGENT, PROBE_USER_AGENT)
        .query(&[("key", api_key), ("q", PROBE_LOCATION)])
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(ApiKeyError::CannotConnect)?;

    let status = response.status();
    if status != StatusCode::OK {
        error!(
            "WeatherAPI responded with HTTP error {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown")
        );
        return Ok(false);
    }

    let payload: ApiPayload =
        response.json().await.map_err(ApiKeyError::CannotConnect)?;

    if let Some(error) = &payload.error {
        if let Some(code) = populated_code(error.code.as_ref()) {
            error!(
                "WeatherAPI responded with error {code}: {}",
                error.message.as_deref().unwrap_or("")
            );
            return Ok(false);
        }
    }

    Ok(true)
}

// Vendor payload skeleton. Numeric-looking leaves stay raw `Value`s and go
// through the coercions, so a string-typed number can never sink the whole
// envelope; only structural mismatches are decode errors.

#[derive(Debug, Deserialize)]
struct ApiPayload {
    location: Option<RawLocation>,
    current: Option<RawCurrent>,
    forecast: Option<RawForecast>,
    error: Option<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    tz_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    code: Option<Value>,
    message: Option<String>,
    /// Whatever else the vendor put in the error object; its presence alone
    /// makes the object non-empty.
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

impl RawError {
    fn is_empty(&self) -> bool {
        self.code.is_none() && self.message.is_none() && self.rest.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    code: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    humidity: Option<Value>,
    temp_c: Option<Value>,
    pressure_mb: Option<Value>,
    wind_kph: Option<Value>,
    wind_degree: Option<Value>,
    vis_km: Option<Value>,
    uv: Option<Value>,
    is_day: Option<Value>,
    condition: Option<RawCondition>,
    air_quality: Option<RawAirQuality>,
}

#[derive(Debug, Deserialize)]
struct RawAirQuality {
    co: Option<Value>,
    no2: Option<Value>,
    o3: Option<Value>,
    so2: Option<Value>,
    pm2_5: Option<Value>,
    pm10: Option<Value>,
    #[serde(rename = "us-epa-index")]
    us_epa_index: Option<Value>,
    #[serde(rename = "gb-defra-index")]
    gb_defra_index: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    #[serde(default)]
    forecastday: Vec<RawForecastDay>,
}

#[derive(Debug, Deserialize)]
struct RawForecastDay {
    date: Option<String>,
    day: Option<RawDay>,
    #[serde(default)]
    hour: Vec<RawHour>,
}

#[derive(Debug, Deserialize)]
struct RawDay {
    condition: Option<RawCondition>,
    is_day: Option<Value>,
    daily_chance_of_rain: Option<Value>,
    totalprecip_mm: Option<Value>,
    maxtemp_c: Option<Value>,
    mintemp_c: Option<Value>,
    maxwind_kph: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawHour {
    time_epoch: Option<i64>,
    condition: Option<RawCondition>,
    is_day: Option<Value>,
    chance_of_rain: Option<Value>,
    precip_mm: Option<Value>,
    pressure_mb: Option<Value>,
    temp_c: Option<Value>,
    wind_dir: Option<String>,
    wind_kph: Option<Value>,
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use std::thread::{self, ThreadId};

    use log::{Level, LevelFilter, Log, Metadata, Record};

    use super::*;
    use crate::condition::Condition;
    use serde_json::json;

    /// Logger that records messages from one designated thread, so log
    /// assertions stay deterministic while other tests run in parallel.
    struct CaptureLogger {
        active: Mutex<Option<(ThreadId, Vec<(Level, String)>)>>,
    }

    impl Log for CaptureLogger {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            let mut active = lock(&self.active);
            if let Some((owner, records)) = active.as_mut() {
                if *owner == thread::current().id() {
                    records.push((record.level(), record.args().to_string()));
                }
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: CaptureLogger = CaptureLogger { active: Mutex::new(None) };
    static CAPTURE_GATE: Mutex<()> = Mutex::new(());

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with log output captured from the current thread.
    fn captured_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<(Level, String)>) {
        let _gate = lock(&CAPTURE_GATE);
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(LevelFilter::Debug);

        *lock(&CAPTURE.active) = Some((thread::current().id(), Vec::new()));
        let value = f();
        let records = lock(&CAPTURE.active).take().map_or_else(Vec::new, |(_, records)| records);
        (value, records)
    }

    fn config() -> CoordinatorConfig {
        CoordinatorConfig::new("test-key".into(), "12.34,56.78".into(), "Home".into())
    }

    fn coordinator() -> WeatherApiCoordinator {
        WeatherApiCoordinator::new(config())
    }

    fn payload(value: Value) -> ApiPayload {
        serde_json::from_value(value).expect("fixture must decode")
    }

    fn sample_current() -> Value {
        json!({
            "last_updated_epoch": 1637744400,
            "temp_c": 26.111,
            "is_day": 1,
            "condition": {"text": "Partly cloudy", "code": 1003},
            "wind_kph": 7.2,
            "wind_degree": 248.7,
            "pressure_mb": "1007.0",
            "humidity": 93,
            "vis_km": 10.0,
            "uv": 6.0,
            "air_quality": {
                "co": 230.3,
                "no2": 13.1,
                "o3": 54.4,
                "so2": 7.9,
                "pm2_5": 8.3,
                "pm10": 9.8,
                "us-epa-index": 1,
                "gb-defra-index": 4
            }
        })
    }

    #[test]
    fn decode_rejects_garbage_body() {
        assert!(matches!(decode_payload("not json"), Err(UpdateFailed::InvalidBody(_))));
        assert!(matches!(decode_payload(""), Err(UpdateFailed::InvalidBody(_))));
    }

    #[test]
    fn decode_tolerates_empty_error_object() {
        assert!(decode_payload("{}").is_ok());
        assert!(decode_payload(r#"{"error": {}}"#).is_ok());
    }

    #[test]
    fn decode_fails_on_any_nonempty_error_object() {
        let err = decode_payload(r#"{"error": {"code": 2006, "message": "API key is invalid."}}"#)
            .unwrap_err();
        match err {
            UpdateFailed::VendorError { code, message } => {
                assert_eq!(code, "2006");
                assert_eq!(message, "API key is invalid.");
            }
            other => panic!("expected VendorError, got {other:?}"),
        }

        let err = decode_payload(r#"{"error": {"code": "1002"}}"#).unwrap_err();
        match err {
            UpdateFailed::VendorError { code, message } => {
                assert_eq!(code, "1002");
                assert_eq!(message, "");
            }
            other => panic!("expected VendorError, got {other:?}"),
        }

        // An unpopulated code still fails the update when the object itself
        // is not empty.
        for body in [
            r#"{"error": {"code": ""}}"#,
            r#"{"error": {"code": 0}}"#,
            r#"{"error": {"message": "server busy"}}"#,
            r#"{"error": {"detail": "unexpected"}}"#,
        ] {
            let err = decode_payload(body).unwrap_err();
            assert!(matches!(err, UpdateFailed::VendorError { .. }), "body {body} must fail");
        }
    }

    #[test]
    fn probe_only_reacts_to_populated_error_codes() {
        assert_eq!(populated_code(None), None);
        assert_eq!(populated_code(Some(&json!(""))), None);
        assert_eq!(populated_code(Some(&json!(0))), None);
        assert_eq!(populated_code(Some(&json!(2006))).as_deref(), Some("2006"));
        assert_eq!(populated_code(Some(&json!("1002"))).as_deref(), Some("1002"));
    }

    #[test]
    fn parse_current_maps_and_rounds_fields() {
        let payload = payload(json!({"current": sample_current()}));
        let current = coordinator().parse_current(payload.current.as_ref());

        assert_eq!(current.temperature, Some(26.1));
        assert_eq!(current.humidity, Some(93.0));
        assert_eq!(current.pressure, Some(1007.0));
        assert_eq!(current.wind_speed, Some(7.2));
        // Bearing passes through unrounded.
        assert_eq!(current.wind_bearing, Some(248.7));
        assert_eq!(current.visibility, Some(10.0));
        assert_eq!(current.uv_index, Some(6.0));
        assert_eq!(current.condition, Some(Condition::PartlyCloudy));
        assert_eq!(current.reported_condition, Some(1003));
        assert_eq!(current.ozone, Some(54.4));

        let aq = current.air_quality.expect("air quality block present");
        assert_eq!(aq.co, Some(230.3));
        assert_eq!(aq.no2, Some(13.1));
        assert_eq!(aq.o3, Some(54.4));
        assert_eq!(aq.so2, Some(7.9));
        assert_eq!(aq.pm2_5, Some(8.3));
        assert_eq!(aq.pm10, Some(9.8));
        assert_eq!(aq.us_epa_index, Some(1));
        assert_eq!(aq.gb_defra_index, Some(4));
        assert_eq!(aq.defra_band(), Some("Moderate"));
    }

    #[test]
    fn parse_current_missing_block_yields_empty() {
        let current = coordinator().parse_current(None);
        assert_eq!(current, CurrentConditions::default());
    }

    #[test]
    fn parse_current_without_air_quality() {
        let mut value = sample_current();
        value.as_object_mut().unwrap().remove("air_quality");
        let payload = payload(json!({"current": value}));

        let current = coordinator().parse_current(payload.current.as_ref());
        assert_eq!(current.air_quality, None);
        assert_eq!(current.ozone, None);
        assert_eq!(current.temperature, Some(26.1));
    }

    #[test]
    fn parse_current_clear_night() {
        let payload = payload(json!({"current": {
            "is_day": 0,
            "condition": {"code": 1000}
        }}));

        let current = coordinator().parse_current(payload.current.as_ref());
        assert_eq!(current.condition, Some(Condition::ClearNight));
        assert_eq!(current.reported_condition, Some(1000));
    }

    #[test]
    fn daily_forecast_entries() {
        let payload = payload(json!({"forecast": {"forecastday": [
            {
                "date": "2021-11-25",
                "day": {
                    "maxtemp_c": 10.5,
                    "mintemp_c": 4.9,
                    "maxwind_kph": 16.6,
                    "totalprecip_mm": 0.26,
                    "daily_chance_of_rain": 89,
                    "condition": {"code": 1183}
                }
            },
            {
                "date": "2021-11-26"
            }
        ]}}));

        let entries = coordinator()
            .parse_forecast(payload.forecast.as_ref(), false, Tz::UTC)
            .unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.datetime.as_deref(), Some("2021-11-25T00:00:00+00:00"));
        assert_eq!(first.condition, Some(Condition::Rainy));
        assert_eq!(first.reported_condition, Some(1183));
        assert_eq!(first.precipitation_probability, Some(89.0));
        assert_eq!(first.precipitation, Some(0.3));
        assert_eq!(first.temperature, Some(10.5));
        assert_eq!(first.templow, Some(4.9));
        assert_eq!(first.wind_speed, Some(16.6));
        assert_eq!(first.pressure, None);
        assert_eq!(first.wind_bearing, None);

        // A day without aggregates still yields a dated entry.
        let second = &entries[1];
        assert_eq!(second.datetime.as_deref(), Some("2021-11-26T00:00:00+00:00"));
        assert_eq!(second.condition, None);
        assert_eq!(second.temperature, None);
    }

    #[test]
    fn daily_forecast_defaults_to_daytime() {
        let payload = payload(json!({"forecast": {"forecastday": [
            {"date": "2021-11-25", "day": {"condition": {"code": 1000}}}
        ]}}));

        let entries = coordinator()
            .parse_forecast(payload.forecast.as_ref(), false, Tz::UTC)
            .unwrap();
        assert_eq!(entries[0].condition, Some(Condition::Sunny));
    }

    #[test]
    fn daily_forecast_bad_date_is_fatal() {
        let payload = payload(json!({"forecast": {"forecastday": [
            {"date": "not a date", "day": {}}
        ]}}));

        let err = coordinator()
            .parse_forecast(payload.forecast.as_ref(), false, Tz::UTC)
            .unwrap_err();
        assert!(matches!(err, UpdateFailed::InvalidDate(_)));
    }

    #[test]
    fn missing_and_empty_forecasts_yield_no_entries() {
        let coordinator = coordinator();

        let (entries, logs) = captured_logs(|| coordinator.parse_forecast(None, true, Tz::UTC));
        assert!(entries.unwrap().is_empty());
        assert!(
            logs.iter().any(|(l, msg)| *l == Level::Warn && msg == "No forecast data received")
        );

        let empty = payload(json!({"forecast": {}}));
        let (entries, logs) =
            captured_logs(|| coordinator.parse_forecast(empty.forecast.as_ref(), false, Tz::UTC));
        assert!(entries.unwrap().is_empty());
        assert!(
            logs.iter().any(|(l, msg)| *l == Level::Warn && msg == "No day forecast found in data")
        );

        let no_days = payload(json!({"forecast": {"forecastday": []}}));
        let entries =
            coordinator.parse_forecast(no_days.forecast.as_ref(), true, Tz::UTC).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn hourly_forecast_skips_hours_without_timestamp() {
        let future = Utc::now().timestamp() + 3600;
        let mut hours = Vec::new();
        for i in 0..24 {
            if i < 2 {
                // No time_epoch: this hour carries no usable data.
                hours.push(json!({"temp_c": 4.9}));
            } else {
                hours.push(json!({"time_epoch": future + i * 60, "temp_c": 4.9}));
            }
        }
        let payload = payload(json!({"forecast": {"forecastday": [{
            "date": "2021-11-25",
            "hour": hours
        }]}}));

        let coordinator = coordinator();
        let (entries, logs) =
            captured_logs(|| coordinator.parse_forecast(payload.forecast.as_ref(), true, Tz::UTC));
        assert_eq!(entries.unwrap().len(), 22);

        // The two dataless hours surface as one aggregated warning.
        let warnings: Vec<&String> =
            logs.iter().filter(|(level, _)| *level == Level::Warn).map(|(_, msg)| msg).collect();
        assert_eq!(warnings.len(), 1, "expected one warning, got {warnings:?}");
        assert!(warnings[0].contains("Found 2 hourly forecasts"));
    }

    #[test]
    fn hourly_forecast_past_filter_follows_flag() {
        let now = Utc::now().timestamp();
        let fixture = json!({"forecast": {"forecastday": [{
            "hour": [
                {"time_epoch": now - 3600, "temp_c": 1.0},
                {"time_epoch": now + 3600, "temp_c": 2.0}
            ]
        }]}});

        let filtering = coordinator();
        let parsed = payload(fixture.clone());
        let entries =
            filtering.parse_forecast(parsed.forecast.as_ref(), true, Tz::UTC).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].temperature, Some(2.0));

        let mut keep_all = config();
        keep_all.ignore_past_forecast = false;
        let keep_all = WeatherApiCoordinator::new(keep_all);
        let parsed = payload(fixture);
        let entries =
            keep_all.parse_forecast(parsed.forecast.as_ref(), true, Tz::UTC).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn hour_entry_fields() {
        // 2021-11-24T09:00:00Z; filtering off since the instant is long past.
        let mut config = config();
        config.ignore_past_forecast = false;
        let coordinator = WeatherApiCoordinator::new(config);

        let payload = payload(json!({"forecast": {"forecastday": [{
            "hour": [{
                "time_epoch": 1637744400,
                "temp_c": 4.9,
                "is_day": 0,
                "condition": {"code": 1000},
                "chance_of_rain": 0.2,
                "precip_mm": 0.1,
                "pressure_mb": 1016.0,
                "wind_dir": "SSW",
                "wind_kph": 30.6
            }]
        }]}}));

        let entries =
            coordinator.parse_forecast(payload.forecast.as_ref(), true, Tz::UTC).unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.datetime.as_deref(), Some("2021-11-24T09:00:00+00:00"));
        assert_eq!(entry.condition, Some(Condition::ClearNight));
        assert_eq!(entry.reported_condition, Some(1000));
        assert_eq!(entry.precipitation_probability, Some(0.2));
        assert_eq!(entry.precipitation, Some(0.1));
        assert_eq!(entry.pressure, Some(1016.0));
        assert_eq!(entry.temperature, Some(4.9));
        assert_eq!(entry.templow, None);
        assert_eq!(entry.wind_bearing.as_deref(), Some("SSW"));
        assert_eq!(entry.wind_speed, Some(30.6));
    }

    #[test]
    fn hour_entry_renders_forecast_zone_offset() {
        let tz: Tz = "Asia/Kathmandu".parse().unwrap();
        let future = Utc::now().timestamp() + 3600;
        let payload = payload(json!({"forecast": {"forecastday": [{
            "hour": [{"time_epoch": future, "temp_c": 4.9}]
        }]}}));

        let entries = coordinator().parse_forecast(payload.forecast.as_ref(), true, tz).unwrap();
        let datetime = entries[0].datetime.as_deref().unwrap();
        assert!(datetime.ends_with("+05:45"), "unexpected offset in {datetime}");
    }

    #[test]
    fn hour_cutoff_is_zone_aligned() {
        let before = Utc::now().timestamp();
        let utc_cutoff = current_hour_epoch(Tz::UTC);
        // Kathmandu runs at +05:45, so its hour starts 900s after the UTC one.
        let ktm_cutoff = current_hour_epoch("Asia/Kathmandu".parse().unwrap());
        let after = Utc::now().timestamp();

        assert_eq!(utc_cutoff.rem_euclid(3600), 0);
        assert_eq!(ktm_cutoff.rem_euclid(3600), 900);

        for cutoff in [utc_cutoff, ktm_cutoff] {
            assert!(cutoff <= after);
            assert!(before - cutoff < 3600);
        }
    }

    #[test]
    fn unique_ids_are_deterministic() {
        let config = config();
        assert_eq!(config.unique_id(), "12.34,56.78_Home");
        assert_eq!(config.sensor_unique_id("UV index"), "12.34,56.78_Home UV index");
        assert_eq!(config.unique_id(), config.unique_id());
    }

    #[test]
    fn envelope_decodes_with_all_blocks_missing() {
        let payload = payload(json!({}));
        assert!(payload.location.is_none());
        assert!(payload.current.is_none());
        assert!(payload.forecast.is_none());
        assert!(payload.error.is_none());
    }
}

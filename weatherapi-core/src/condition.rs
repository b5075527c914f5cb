use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::convert::to_int;

/// Normalized condition vocabulary reported to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "clear-night")]
    ClearNight,
    #[serde(rename = "cloudy")]
    Cloudy,
    #[serde(rename = "fog")]
    Fog,
    #[serde(rename = "hail")]
    Hail,
    #[serde(rename = "lightning")]
    Lightning,
    #[serde(rename = "lightning-rainy")]
    LightningRainy,
    #[serde(rename = "partlycloudy")]
    PartlyCloudy,
    #[serde(rename = "pouring")]
    Pouring,
    #[serde(rename = "rainy")]
    Rainy,
    #[serde(rename = "snowy")]
    Snowy,
    #[serde(rename = "snowy-rainy")]
    SnowyRainy,
    #[serde(rename = "sunny")]
    Sunny,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::ClearNight => "clear-night",
            Condition::Cloudy => "cloudy",
            Condition::Fog => "fog",
            Condition::Hail => "hail",
            Condition::Lightning => "lightning",
            Condition::LightningRainy => "lightning-rainy",
            Condition::PartlyCloudy => "partlycloudy",
            Condition::Pouring => "pouring",
            Condition::Rainy => "rainy",
            Condition::Snowy => "snowy",
            Condition::SnowyRainy => "snowy-rainy",
            Condition::Sunny => "sunny",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// https://www.weatherapi.com/docs/weather_conditions.json
//
// Code 1000 (Sunny / Clear) is deliberately not in this table; it is the only
// code whose category depends on the day/night flag and is special-cased in
// `parse_condition_code`.
static CONDITION_CODES: &[(Condition, &[i64])] = &[
    (Condition::Cloudy, &[1006, 1009]), // Cloudy, Overcast
    (Condition::Fog, &[1030, 1135, 1147]), // Mist, Fog, Freezing fog
    (
        Condition::Hail,
        &[
            1237, // Ice pellets
            1261, // Light showers of ice pellets
            1264, // Moderate or heavy showers of ice pellets
        ],
    ),
    (Condition::Lightning, &[1087]), // Thundery outbreaks possible
    (
        Condition::LightningRainy,
        &[
            1273, // Patchy light rain with thunder
            1276, // Moderate or heavy rain with thunder
        ],
    ),
    (Condition::PartlyCloudy, &[1003]),
    (
        Condition::Pouring,
        &[
            1192, // Heavy rain at times
            1195, // Heavy rain
            1243, // Moderate or heavy rain shower
            1246, // Torrential rain shower
        ],
    ),
    (
        Condition::Rainy,
        &[
            1063, // Patchy rain possible
            1150, // Patchy light drizzle
            1153, // Light drizzle
            1180, // Patchy light rain
            1183, // Light rain
            1186, // Moderate rain at times
            1189, // Moderate rain
            1240, // Light rain shower
        ],
    ),
    (
        Condition::Snowy,
        &[
            1066, // Patchy snow possible
            1114, // Blowing snow
            1117, // Blizzard
            1210, // Patchy light snow
            1213, // Light snow
            1216, // Patchy moderate snow
            1219, // Moderate snow
            1222, // Patchy heavy snow
            1225, // Heavy snow
            1279, // Patchy light snow with thunder
            1282, // Moderate or heavy snow with thunder
        ],
    ),
    (
        Condition::SnowyRainy,
        &[
            1069, // Patchy sleet possible
            1072, // Patchy freezing drizzle possible
            1168, // Freezing drizzle
            1171, // Heavy freezing drizzle
            1198, // Light freezing rain
            1201, // Moderate or heavy freezing rain
            1204, // Light sleet
            1207, // Moderate or heavy sleet
            1249, // Light sleet showers
            1252, // Moderate or heavy sleet showers
            1255, // Light snow showers
            1258, // Moderate or heavy snow showers
        ],
    ),
];

/// Classify a vendor condition code into the normalized vocabulary.
///
/// Accepts the code as a raw JSON scalar (the vendor sometimes sends numeric
/// strings). Missing, non-integer, and unknown codes all yield `None`; code
/// 1000 resolves to sunny or clear-night depending on `is_day`.
pub fn parse_condition_code(value: Option<&Value>, is_day: bool) -> Option<Condition> {
    let code = to_int(value)?;

    if code == 1000 {
        return Some(if is_day { Condition::Sunny } else { Condition::ClearNight });
    }

    CONDITION_CODES
        .iter()
        .find(|(_, codes)| codes.contains(&code))
        .map(|(condition, _)| *condition)
}

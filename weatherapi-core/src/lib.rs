//! Data-update coordinator for WeatherAPI.com.
//!
//! This crate defines:
//! - Value coercions for the vendor's loosely typed JSON payloads
//! - The vendor condition-code classifier
//! - The polling coordinator (fetch, parse, last-known snapshot)
//! - API-key validation against the vendor's timezone endpoint
//! - Stored configuration for hosts
//!
//! It is used by `weatherapi-cli`, but can also be embedded in other hosts
//! that want to schedule their own refresh cadence.

pub mod condition;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod model;

pub use condition::{Condition, parse_condition_code};
pub use config::Config;
pub use coordinator::{CoordinatorConfig, WeatherApiCoordinator, is_valid_api_key};
pub use error::{ApiKeyError, UpdateFailed};
pub use model::{AirQuality, CurrentConditions, ForecastEntry, WeatherSnapshot};

/// Attribution the vendor requires hosts to display alongside the data.
pub const ATTRIBUTION: &str = "Powered by WeatherAPI.com";

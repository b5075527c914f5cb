use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Text};
use log::{error, info};

use weatherapi_core::{
    ATTRIBUTION, ApiKeyError, Config, CoordinatorConfig, ForecastEntry, WeatherApiCoordinator,
    WeatherSnapshot, is_valid_api_key,
};

const HOURLY_PRINT_LIMIT: usize = 12;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherapi", version, about = "WeatherAPI.com weather fetcher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store API key and location after validating the key with the vendor.
    Configure {
        /// API key; prompted for interactively when omitted.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Fetch once and print the resulting snapshot.
    Show {
        /// Print the snapshot as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Refresh on the configured interval until interrupted.
    Watch {
        /// Stop after this many refreshes.
        #[arg(long)]
        count: Option<u32>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { api_key } => configure(api_key).await,
            Command::Show { json } => show(json).await,
            Command::Watch { count } => watch(count).await,
        }
    }
}

async fn configure(api_key: Option<String>) -> Result<()> {
    let mut config = Config::load()?;

    let api_key = match api_key {
        Some(key) => key,
        None => Text::new("WeatherAPI.com API key:")
            .with_initial_value(&config.api_key)
            .prompt()
            .context("Failed to read API key")?,
    };

    // Probe the vendor before persisting anything.
    match is_valid_api_key(&api_key).await {
        Ok(true) => {}
        Ok(false) => bail!("WeatherAPI.com rejected the API key"),
        Err(err @ ApiKeyError::InvalidApiKey) => bail!("{err}"),
        Err(ApiKeyError::CannotConnect(err)) => {
            return Err(anyhow::Error::new(err).context("Cannot connect to WeatherAPI.com"));
        }
    }
    config.api_key = api_key;

    config.latitude = CustomType::<f64>::new("Latitude:")
        .with_default(config.latitude)
        .with_error_message("Please enter a number")
        .prompt()
        .context("Failed to read latitude")?;

    config.longitude = CustomType::<f64>::new("Longitude:")
        .with_default(config.longitude)
        .with_error_message("Please enter a number")
        .prompt()
        .context("Failed to read longitude")?;

    config.name = Text::new("Location name:")
        .with_default(&config.name)
        .prompt()
        .context("Failed to read location name")?;

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());

    Ok(())
}

async fn show(json: bool) -> Result<()> {
    let config = Config::load()?;
    let mut coordinator = WeatherApiCoordinator::new(config.coordinator_config()?);

    let snapshot = coordinator.fetch().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(coordinator.config(), &snapshot);
    }

    Ok(())
}

async fn watch(count: Option<u32>) -> Result<()> {
    let config = Config::load()?;
    let coordinator_config = config.coordinator_config()?;
    let period = coordinator_config.update_interval;

    info!("Watching {} every {}s", coordinator_config.unique_id(), period.as_secs());
    let mut coordinator = WeatherApiCoordinator::new(coordinator_config);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut remaining = count;

    loop {
        if remaining == Some(0) {
            break;
        }

        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                break;
            }
        }

        // One attempt per tick; failures wait for the next one. Ctrl-C mid
        // request drops the fetch future, aborting the request immediately.
        tokio::select! {
            result = coordinator.fetch() => {
                match result {
                    Ok(snapshot) => print_snapshot(coordinator.config(), &snapshot),
                    Err(err) => error!("Update failed: {err}"),
                }
                remaining = remaining.map(|n| n - 1);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                break;
            }
        }
    }

    Ok(())
}

fn print_snapshot(config: &CoordinatorConfig, snapshot: &WeatherSnapshot) {
    let current = &snapshot.current;

    println!("{} ({})", config.name, config.location);
    if let Some(condition) = current.condition {
        println!("  {:<14}{condition}", "Condition:");
    }
    print_metric("Temperature", current.temperature, " °C");
    print_metric("Humidity", current.humidity, " %");
    print_metric("Pressure", current.pressure, " mbar");
    print_metric("Wind speed", current.wind_speed, " km/h");
    print_metric("Wind bearing", current.wind_bearing, "°");
    print_metric("Visibility", current.visibility, " km");
    print_metric("UV index", current.uv_index, "");
    print_metric("Ozone", current.ozone, " µg/m³");

    if let Some(aq) = &current.air_quality {
        print_metric("PM2.5", aq.pm2_5, " µg/m³");
        print_metric("PM10", aq.pm10, " µg/m³");
        if let Some(band) = aq.defra_band() {
            println!("  {:<14}{band} (UK DEFRA)", "Air quality:");
        }
    }

    if !snapshot.daily_forecast.is_empty() {
        println!("Daily forecast:");
        for entry in &snapshot.daily_forecast {
            print_forecast_entry(entry);
        }
    }

    if !snapshot.hourly_forecast.is_empty() {
        println!("Hourly forecast:");
        for entry in snapshot.hourly_forecast.iter().take(HOURLY_PRINT_LIMIT) {
            print_forecast_entry(entry);
        }
        let hidden = snapshot.hourly_forecast.len().saturating_sub(HOURLY_PRINT_LIMIT);
        if hidden > 0 {
            println!("  ... and {hidden} more");
        }
    }

    println!("{ATTRIBUTION}");
}

fn print_metric(label: &str, value: Option<f64>, unit: &str) {
    if let Some(value) = value {
        println!("  {:<14}{value}{unit}", format!("{label}:"));
    }
}

fn print_forecast_entry(entry: &ForecastEntry) {
    let when = entry.datetime.as_deref().unwrap_or("(no time)");
    let condition = entry.condition.map_or("-", |c| c.as_str());
    let temperature = format_value(entry.temperature);

    match entry.templow {
        Some(low) => println!("  {when}  {condition:>15}  {temperature}/{low} °C"),
        None => println!("  {when}  {condition:>15}  {temperature} °C"),
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

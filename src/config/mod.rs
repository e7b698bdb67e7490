pub mod run_options;

use run_options::Args;
use serde::Deserialize;
use std::fs;

use crate::{error::AppError, watering::MAX_DURATION_SECS};

pub const CONFIG_FILE: &str = "./sprout.toml";

#[derive(Debug, Deserialize)]
pub struct Database {
    pub name: String,
}

impl Default for Database {
    fn default() -> Self {
        Self { name: "sprout.db".to_owned() }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebServer {
    pub address: String,
}

impl Default for WebServer {
    fn default() -> Self {
        Self { address: "0.0.0.0:8080".to_owned() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Relay {
    pub address: String,
    /// hard cap on a single bridge call, in seconds
    pub timeout_secs: u64,
}

impl Default for Relay {
    fn default() -> Self {
        Self { address: "http://127.0.0.1:8423".to_owned(), timeout_secs: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Weather {
    pub url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub api_key_file: String,
    /// hour of day (UTC) the daily fetch runs
    pub fetch_hour: u32,
    pub keep_days: usize,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            url: "http://api.openweathermap.org/data/2.5/forecast".to_owned(),
            latitude: 51.529,
            longitude: -3.191,
            api_key_file: "./api".to_owned(),
            fetch_hour: 1,
            keep_days: 7,
        }
    }
}

#[derive(Copy, Clone, Debug, Deserialize)]
pub struct Watering {
    pub max_duration_secs: i64,
    pub default_duration_secs: i64,
    pub tick_secs: u64,
}

impl Default for Watering {
    fn default() -> Self {
        Self { max_duration_secs: MAX_DURATION_SECS, default_duration_secs: 300, tick_secs: 1 }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub web_server: WebServer,
    #[serde(default)]
    pub relay: Relay,
    #[serde(default)]
    pub weather: Weather,
    #[serde(default)]
    pub watering: Watering,
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, AppError> {
        let config_content =
            fs::read_to_string(&args.cfg_file).map_err(|e| AppError::ConfigError(e.to_string()))?;
        Self::load_from_str(&config_content)
    }

    // test helper
    pub fn load_from_str(config_str: &str) -> Result<Self, AppError> {
        toml::from_str(config_str).map_err(|e| AppError::ConfigError(e.to_string()))
    }
}

pub mod api;
pub mod fetch;

use serde::{Deserialize, Serialize};

/// One stored forecast day. Sunrise/sunset are local times ("%H:%M:%S").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub sunrise: String,
    pub sunset: String,
}

/// One 3-hour forecast step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub date: String,
    pub time: String,
    pub temperature_c: f64,
    pub humidity: i64,
    pub weather: String,
    pub rain_chance: f64,
    pub rain_recorded: f64,
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

use chrono::DateTime;
use serde::Deserialize;
use std::{fs, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{error, info};

use crate::{
    config::Weather,
    db::DatabaseTrait,
    error::AppError,
    time::TimeProvider,
    utils::sod,
    weather::{kelvin_to_celsius, ForecastDay, ForecastEntry},
};

// wire format of the forecast endpoint (5 day / 3 hour)

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub city: City,
    pub list: Vec<ForecastSlot>,
}

#[derive(Debug, Deserialize)]
pub struct City {
    /// shift from UTC in seconds
    pub timezone: i64,
    pub sunrise: i64,
    pub sunset: i64,
}

#[derive(Debug, Deserialize)]
pub struct ForecastSlot {
    pub dt: i64,
    pub main: SlotMain,
    #[serde(default)]
    pub weather: Vec<SlotWeather>,
    #[serde(default)]
    pub pop: f64,
    pub rain: Option<SlotRain>,
}

#[derive(Debug, Deserialize)]
pub struct SlotMain {
    pub temp: f64, // Kelvin
    pub humidity: i64,
}

#[derive(Debug, Deserialize)]
pub struct SlotWeather {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotRain {
    #[serde(rename = "3h", default)]
    pub three_hour: f64,
}

fn local_date_time(ts: i64, tz_shift: i64) -> Option<(String, String)> {
    let dt = DateTime::from_timestamp(ts + tz_shift, 0)?;
    Some((dt.format("%Y-%m-%d").to_string(), dt.format("%H:%M:%S").to_string()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalizes the raw response into day and entry rows: timestamps shifted
/// to city local time, Kelvin to Celsius, missing rain volume as zero.
pub fn extract_data(response: &ForecastResponse) -> Result<(Vec<ForecastDay>, Vec<ForecastEntry>), AppError> {
    let tz = response.city.timezone;
    let (_, sunrise) = local_date_time(response.city.sunrise, tz)
        .ok_or_else(|| AppError::WeatherError("sunrise timestamp out of range".to_owned()))?;
    let (_, sunset) = local_date_time(response.city.sunset, tz)
        .ok_or_else(|| AppError::WeatherError("sunset timestamp out of range".to_owned()))?;

    let mut days: Vec<ForecastDay> = Vec::new();
    let mut entries = Vec::with_capacity(response.list.len());
    for slot in &response.list {
        let (date, time) = local_date_time(slot.dt, tz)
            .ok_or_else(|| AppError::WeatherError(format!("slot timestamp {} out of range", slot.dt)))?;
        if days.iter().all(|d| d.date != date) {
            days.push(ForecastDay { date: date.clone(), sunrise: sunrise.clone(), sunset: sunset.clone() });
        }
        entries.push(ForecastEntry {
            date,
            time,
            temperature_c: round2(kelvin_to_celsius(slot.main.temp)),
            humidity: slot.main.humidity,
            weather: slot.weather.first().map(|w| w.description.clone()).unwrap_or_default(),
            rain_chance: slot.pop,
            rain_recorded: slot.rain.as_ref().map(|r| r.three_hour).unwrap_or(0.0),
        });
    }

    drop_trailing_partial_day(&mut days, &mut entries);
    Ok((days, entries))
}

/// A 5-day response carries the first slots of day 6; that partial day is
/// not wanted and is removed along with its entries.
fn drop_trailing_partial_day(days: &mut Vec<ForecastDay>, entries: &mut Vec<ForecastEntry>) {
    days.sort_by(|a, b| a.date.cmp(&b.date));
    entries.sort_by(|a, b| (a.date.as_str(), a.time.as_str()).cmp(&(b.date.as_str(), b.time.as_str())));
    let Some(last) = days.last().map(|d| d.date.clone()) else {
        return;
    };
    let Some(cut) = entries.iter().position(|e| e.date == last) else {
        error!("Weather data missing.");
        return;
    };
    entries.truncate(cut);
    days.pop();
}

pub async fn fetch_forecast(cfg: &Weather) -> Result<ForecastResponse, AppError> {
    let api_key = fs::read_to_string(&cfg.api_key_file)
        .map_err(|e| AppError::ConfigError(format!("cannot read api key file '{}': {}", cfg.api_key_file, e)))?;
    let url =
        format!("{}?lat={}&lon={}&appid={}", cfg.url, cfg.latitude, cfg.longitude, api_key.trim());
    let response = reqwest::get(&url).await?;
    if !response.status().is_success() {
        return Err(AppError::WeatherError(format!("forecast request failed: {}", response.status())));
    }
    Ok(response.json::<ForecastResponse>().await?)
}

/// Fetch, normalize, persist, prune. Returns the dates added.
pub async fn fetch_and_store(db: &Arc<dyn DatabaseTrait>, cfg: &Weather) -> Result<Vec<String>, AppError> {
    let response = fetch_forecast(cfg).await?;
    let (days, entries) = extract_data(&response)?;
    let added = db.store_forecast(days, entries)?;
    db.prune_forecast(cfg.keep_days)?;
    if added.is_empty() {
        info!("No new forecast data.");
    } else {
        info!(dates = ?added, "Forecast stored.");
    }
    Ok(added)
}

fn secs_until_fetch(now: i64, fetch_hour: u32) -> u64 {
    let mut target = sod(now) + i64::from(fetch_hour) * 3600;
    if target <= now {
        target += 86_400;
    }
    (target - now) as u64
}

/// Daily retrieval loop. Failures are logged and retried on the next cycle;
/// nothing here is fatal to the rest of the system.
pub async fn run_weather_job(
    db: Arc<dyn DatabaseTrait>, cfg: Weather, time_provider: Arc<dyn TimeProvider>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let wait = secs_until_fetch(time_provider.now(), cfg.fetch_hour);
        tokio::select! {
            _ = time_provider.sleep(Duration::from_secs(wait)) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        }
        if let Err(e) = fetch_and_store(&db, &cfg).await {
            error!(error = %e, "Weather fetch failed, retrying next cycle.");
        }
    }
    info!("Weather job stopped.");
}

use crate::db::DatabaseTrait;
use crate::watering::ds::{NewPlant, Plant, WateringEvent};
use crate::weather::{ForecastDay, ForecastEntry};
use rusqlite::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct MockData {
    plants: HashMap<u32, Plant>,
    history: Vec<WateringEvent>,
    next_id: u32,
    forecast_days: Vec<ForecastDay>,
    forecast_entries: Vec<ForecastEntry>,
}

/// In-memory stand-in for the SQLite store. Keeps the same transition
/// semantics (`mark_started` is a compare-and-set) and adds failure
/// toggles for the commit-failure paths.
#[derive(Default)]
pub struct MockDatabase {
    data: Mutex<MockData>,
    pub fail_mark_started: AtomicBool,
    pub fail_mark_stopped: AtomicBool,
}

impl MockDatabase {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a flag left behind by a crashed process.
    pub fn force_status(&self, plant_id: u32, status: bool) {
        let mut data = self.data.lock().unwrap();
        if let Some(plant) = data.plants.get_mut(&plant_id) {
            plant.status = status;
        }
    }
}

impl DatabaseTrait for MockDatabase {
    fn load_plants(&self) -> Result<Vec<Plant>> {
        let data = self.data.lock().unwrap();
        let mut plants: Vec<Plant> = data.plants.values().cloned().collect();
        plants.sort_by_key(|p| p.id);
        Ok(plants)
    }

    fn get_plant(&self, plant_id: u32) -> Result<Option<Plant>> {
        Ok(self.data.lock().unwrap().plants.get(&plant_id).cloned())
    }

    fn create_plant(&self, plant: NewPlant) -> Result<u32> {
        let mut data = self.data.lock().unwrap();
        data.next_id += 1;
        let id = data.next_id;
        data.plants.insert(
            id,
            Plant {
                id,
                name: plant.name,
                description: plant.description,
                actuator: plant.actuator,
                relay_line: plant.relay_line,
                status: false,
                config: plant.config,
            },
        );
        Ok(id)
    }

    fn delete_plant(&self, plant_id: u32) -> Result<bool> {
        let mut data = self.data.lock().unwrap();
        let existed = data.plants.remove(&plant_id).is_some();
        data.history.retain(|evt| evt.plant_id != plant_id);
        Ok(existed)
    }

    fn watering_status(&self, plant_id: u32) -> Result<Option<bool>> {
        Ok(self.data.lock().unwrap().plants.get(&plant_id).map(|p| p.status))
    }

    fn mark_started(&self, evt: WateringEvent) -> Result<bool> {
        if self.fail_mark_started.load(Ordering::SeqCst) {
            return Err(rusqlite::Error::InvalidQuery);
        }
        let mut guard = self.data.lock().unwrap();
        let data = &mut *guard;
        match data.plants.get_mut(&evt.plant_id) {
            Some(plant) if !plant.status => {
                plant.status = true;
                data.history.push(evt);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn mark_stopped(&self, plant_id: u32) -> Result<bool> {
        if self.fail_mark_stopped.load(Ordering::SeqCst) {
            return Err(rusqlite::Error::InvalidQuery);
        }
        let mut data = self.data.lock().unwrap();
        match data.plants.get_mut(&plant_id) {
            Some(plant) => {
                plant.status = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn watering_history(&self, plant_id: u32) -> Result<Vec<WateringEvent>> {
        let data = self.data.lock().unwrap();
        Ok(data.history.iter().filter(|evt| evt.plant_id == plant_id).cloned().collect())
    }

    fn store_forecast(&self, days: Vec<ForecastDay>, entries: Vec<ForecastEntry>) -> Result<Vec<String>> {
        let mut data = self.data.lock().unwrap();
        let mut dates_added = Vec::new();
        for day in days {
            if data.forecast_days.iter().any(|d| d.date == day.date) {
                continue;
            }
            dates_added.push(day.date.clone());
            let day_entries: Vec<ForecastEntry> = entries.iter().filter(|e| e.date == day.date).cloned().collect();
            data.forecast_days.push(day);
            data.forecast_entries.extend(day_entries);
        }
        Ok(dates_added)
    }

    fn forecast_days(&self) -> Result<Vec<ForecastDay>> {
        let mut days = self.data.lock().unwrap().forecast_days.clone();
        days.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(days)
    }

    fn forecast_for_day(&self, date: String) -> Result<Vec<ForecastEntry>> {
        let data = self.data.lock().unwrap();
        Ok(data.forecast_entries.iter().filter(|e| e.date == date).cloned().collect())
    }

    fn prune_forecast(&self, keep_days: usize) -> Result<usize> {
        let mut data = self.data.lock().unwrap();
        data.forecast_days.sort_by(|a, b| a.date.cmp(&b.date));
        if data.forecast_days.len() <= keep_days {
            return Ok(0);
        }
        let cut = data.forecast_days.len() - keep_days;
        let dropped: Vec<ForecastDay> = data.forecast_days.drain(..cut).collect();
        for day in &dropped {
            data.forecast_entries.retain(|e| e.date != day.date);
        }
        Ok(dropped.len())
    }
}

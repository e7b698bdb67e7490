use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    actuators::interface::ActuatorKind, config::Weather, db::DatabaseTrait, time::TimeProvider,
    watering::launcher::Launcher,
};

/// A logical irrigation zone: one actuator, one status flag.
#[derive(Debug, Clone, Serialize)]
pub struct Plant {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub actuator: ActuatorKind,
    pub relay_line: u8,
    /// persisted "watering in progress" flag
    pub status: bool,
    pub config: PlantConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlantConfig {
    pub enabled: bool,
    pub duration_secs: i64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self { enabled: true, duration_secs: 300 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlant {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub actuator: ActuatorKind,
    pub relay_line: u8,
    #[serde(default)]
    pub config: PlantConfig,
}

/// History record. Appended once at task start; the stored duration is the
/// requested one, even when the run is cancelled early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WateringEvent {
    pub plant_id: u32,
    pub start_time: i64,
    pub duration_secs: i64,
}

impl WateringEvent {
    pub fn new(plant_id: u32, start_time: i64, duration_secs: i64) -> Self {
        Self { plant_id, start_time, duration_secs }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Activating,
    Running,
    Deactivating,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
    Fault,
}

pub struct AppState {
    pub db: Arc<dyn DatabaseTrait>,
    pub launcher: Arc<Launcher>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub weather_cfg: Weather,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseTrait>, launcher: Arc<Launcher>, time_provider: Arc<dyn TimeProvider>,
        weather_cfg: Weather,
    ) -> Arc<Self> {
        Arc::new(AppState { db, launcher, time_provider, weather_cfg })
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    actuators::interface::{Actuator, ActuatorFactory},
    config::Watering,
    db::DatabaseTrait,
    error::AppError,
    time::TimeProvider,
    watering::ds::{NewPlant, Outcome, Plant, WateringEvent},
    watering::task::WateringTask,
};

struct TaskHandle {
    cancel_tx: watch::Sender<bool>,
    join: JoinHandle<Outcome>,
}

/// Live side of a plant: its device handle and the slot for the one task
/// allowed to drive it.
struct PlantRuntime {
    actuator: Arc<dyn Actuator>,
    active: Mutex<Option<TaskHandle>>,
}

/// Starts and cancels watering tasks, enforcing at most one live task per
/// plant. The persisted status flag is flipped and the history record
/// committed before a task is ever spawned, so a concurrent second start
/// reliably observes "already running".
pub struct Launcher {
    db: Arc<dyn DatabaseTrait>,
    time_provider: Arc<dyn TimeProvider>,
    factory: Arc<dyn ActuatorFactory>,
    cfg: Watering,
    plants: RwLock<HashMap<u32, Arc<PlantRuntime>>>,
}

impl Launcher {
    pub fn new(
        db: Arc<dyn DatabaseTrait>, factory: Arc<dyn ActuatorFactory>, time_provider: Arc<dyn TimeProvider>,
        cfg: Watering,
    ) -> Result<Self, AppError> {
        let mut plants = HashMap::new();
        for plant in db.load_plants()? {
            let actuator = factory.build(plant.actuator, plant.relay_line);
            plants.insert(plant.id, Arc::new(PlantRuntime { actuator, active: Mutex::new(None) }));
        }
        Ok(Self { db, time_provider, factory, cfg, plants: RwLock::new(plants) })
    }

    /// Crash cleanup: a status flag still set at boot belongs to a task that
    /// no longer exists. Clear it and drive the device off.
    pub async fn recover(&self) -> Result<(), AppError> {
        for plant in self.db.load_plants()? {
            if !plant.status {
                continue;
            }
            warn!(plant_id = plant.id, "Stale watering status at boot, clearing.");
            self.db.mark_stopped(plant.id)?;
            if let Some(runtime) = self.runtime(plant.id) {
                if let Err(e) = runtime.actuator.off().await {
                    warn!(plant_id = plant.id, error = %e, "Failed to force actuator off at boot.");
                }
            }
        }
        Ok(())
    }

    fn runtime(&self, plant_id: u32) -> Option<Arc<PlantRuntime>> {
        self.plants.read().unwrap().get(&plant_id).cloned()
    }

    /// Single-flight start. On success the task is already dispatched and
    /// the call returns without waiting for it.
    pub fn start(&self, plant_id: u32, duration_secs: Option<i64>) -> Result<(), AppError> {
        let runtime = self.runtime(plant_id).ok_or(AppError::PlantNotFound(plant_id))?;
        let plant = self.db.get_plant(plant_id)?.ok_or(AppError::PlantNotFound(plant_id))?;

        let requested = duration_secs.unwrap_or(plant.config.duration_secs);
        let duration = requested.clamp(1, self.cfg.max_duration_secs);
        if duration != requested {
            warn!(plant_id, requested, duration, "Requested duration clamped.");
        }

        let mut slot = runtime.active.lock().unwrap();
        if slot.as_ref().is_some_and(|handle| !handle.join.is_finished()) {
            return Err(AppError::AlreadyRunning(plant_id));
        }

        // durably mark running before dispatch; refuse when the flag is set
        let evt = WateringEvent::new(plant_id, self.time_provider.now(), duration);
        if !self.db.mark_started(evt)? {
            return Err(AppError::AlreadyRunning(plant_id));
        }

        // fresh channel per dispatch: no stale signal can cancel the new task
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = WateringTask::new(
            plant_id,
            duration,
            Duration::from_secs(self.cfg.tick_secs),
            runtime.actuator.clone(),
            self.db.clone(),
            self.time_provider.clone(),
            cancel_rx,
        );
        let join = tokio::spawn(task.run());
        *slot = Some(TaskHandle { cancel_tx, join });
        info!(plant_id, duration_secs = duration, "Watering started.");
        Ok(())
    }

    /// Sets the plant's cancellation signal. The task observes it within one
    /// tick and clears the status flag itself on the way out.
    pub fn cancel(&self, plant_id: u32) -> Result<(), AppError> {
        let runtime = self.runtime(plant_id).ok_or(AppError::PlantNotFound(plant_id))?;
        let slot = runtime.active.lock().unwrap();
        match slot.as_ref() {
            Some(handle) if !handle.join.is_finished() => {
                _ = handle.cancel_tx.send(true);
                info!(plant_id, "Cancellation requested.");
                Ok(())
            }
            _ => {
                // a set flag without a live task is a leftover, repair it
                if self.db.watering_status(plant_id)?.unwrap_or(false) {
                    warn!(plant_id, "Status flag set but no live task, clearing.");
                    self.db.mark_stopped(plant_id)?;
                }
                Err(AppError::NotRunning(plant_id))
            }
        }
    }

    /// Task liveness as seen from the handle, not the persisted flag.
    pub fn is_watering(&self, plant_id: u32) -> Result<bool, AppError> {
        let runtime = self.runtime(plant_id).ok_or(AppError::PlantNotFound(plant_id))?;
        let slot = runtime.active.lock().unwrap();
        Ok(slot.as_ref().is_some_and(|handle| !handle.join.is_finished()))
    }

    /// Takes the plant's task handle and waits for the task to finish.
    /// Shutdown and test support.
    pub async fn join(&self, plant_id: u32) -> Option<Outcome> {
        let handle = self.runtime(plant_id)?.active.lock().unwrap().take()?;
        handle.join.await.ok()
    }

    pub fn create_plant(&self, new: NewPlant) -> Result<Plant, AppError> {
        let id = self.db.create_plant(new)?;
        let plant = self.db.get_plant(id)?.ok_or(AppError::PlantNotFound(id))?;
        let actuator = self.factory.build(plant.actuator, plant.relay_line);
        self.plants
            .write()
            .unwrap()
            .insert(plant.id, Arc::new(PlantRuntime { actuator, active: Mutex::new(None) }));
        info!(plant_id = plant.id, name = %plant.name, "Plant created.");
        Ok(plant)
    }

    /// Admin delete: cancels a live run, then drops the plant with its
    /// config and history.
    pub async fn delete_plant(&self, plant_id: u32) -> Result<(), AppError> {
        match self.cancel(plant_id) {
            Ok(()) => {
                self.join(plant_id).await;
            }
            Err(AppError::NotRunning(_)) => {}
            Err(e) => return Err(e),
        }
        self.plants.write().unwrap().remove(&plant_id);
        if !self.db.delete_plant(plant_id)? {
            return Err(AppError::PlantNotFound(plant_id));
        }
        info!(plant_id, "Plant deleted.");
        Ok(())
    }

    /// Cancels every live task and waits for each to wind down.
    pub async fn shutdown(&self) {
        let ids: Vec<u32> = self.plants.read().unwrap().keys().copied().collect();
        for plant_id in ids {
            if self.cancel(plant_id).is_ok() {
                self.join(plant_id).await;
            }
        }
    }
}

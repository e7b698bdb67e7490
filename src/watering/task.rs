use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{error, info, trace};

use crate::{
    actuators::interface::Actuator,
    db::DatabaseTrait,
    time::TimeProvider,
    watering::ds::{Outcome, TaskState},
};

/// One timed actuation run for one plant. Built by the launcher, which owns
/// the cancel sender; the task holds its own handles to actuator, store and
/// clock for exactly its lifetime.
pub struct WateringTask {
    plant_id: u32,
    duration_secs: i64,
    tick: Duration,
    actuator: Arc<dyn Actuator>,
    db: Arc<dyn DatabaseTrait>,
    time_provider: Arc<dyn TimeProvider>,
    cancel_rx: watch::Receiver<bool>,
    state: TaskState,
}

impl WateringTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plant_id: u32, duration_secs: i64, tick: Duration, actuator: Arc<dyn Actuator>,
        db: Arc<dyn DatabaseTrait>, time_provider: Arc<dyn TimeProvider>, cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            plant_id,
            duration_secs,
            tick,
            actuator,
            db,
            time_provider,
            cancel_rx,
            state: TaskState::Idle,
        }
    }

    fn transition(&mut self, next: TaskState) {
        trace!(plant_id = self.plant_id, from = ?self.state, to = ?next, "Task transition.");
        self.state = next;
    }

    /// Drives the machine to completion:
    /// `Idle -> Activating -> Running -> Deactivating -> Done`.
    /// Deactivation and the status reset run on every exit path.
    pub async fn run(mut self) -> Outcome {
        self.transition(TaskState::Activating);
        let outcome = match self.actuator.on().await {
            Ok(()) => {
                info!(plant_id = self.plant_id, duration_secs = self.duration_secs, "Actuator on, watering.");
                self.watering_loop().await
            }
            Err(e) => {
                // no retry: a device that failed to switch on is shut down, not poked again
                error!(plant_id = self.plant_id, error = %e, "Failed to activate actuator.");
                Outcome::Fault
            }
        };

        self.transition(TaskState::Deactivating);
        // runs even after an activation fault or a store failure
        if let Err(e) = self.actuator.off().await {
            error!(plant_id = self.plant_id, error = %e, "Failed to deactivate actuator.");
        }

        self.transition(TaskState::Done);
        if let Err(e) = self.db.mark_stopped(self.plant_id) {
            error!(plant_id = self.plant_id, error = %e, "Failed to clear watering status.");
        }
        info!(plant_id = self.plant_id, outcome = ?outcome, "Watering task finished.");
        outcome
    }

    /// One tick at a time, checking the cancellation signal after each tick,
    /// so cancellation latency is bounded by one tick period.
    async fn watering_loop(&mut self) -> Outcome {
        self.transition(TaskState::Running);
        let tick_secs = self.tick.as_secs().max(1) as i64;
        let mut remaining = self.duration_secs;
        while remaining > 0 {
            self.time_provider.sleep(self.tick).await;
            remaining -= tick_secs;
            if *self.cancel_rx.borrow() {
                info!(plant_id = self.plant_id, remaining, "Cancellation observed, stopping early.");
                return Outcome::Cancelled;
            }
        }
        Outcome::Completed
    }
}

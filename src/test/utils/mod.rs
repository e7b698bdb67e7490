pub mod mock_actuators;
pub mod mock_db;
pub mod mock_time;

use crate::{
    actuators::interface::{ActuatorFactory, ActuatorKind},
    config::{Watering, Weather},
    db::DatabaseTrait,
    time::TimeProvider,
    watering::ds::{AppState, NewPlant, PlantConfig},
    watering::launcher::Launcher,
};
use mock_actuators::RecordingFactory;
use mock_db::MockDatabase;
use mock_time::MockTimeProvider;
use std::sync::Arc;
use std::time::Duration;

pub const START_TIME: i64 = 1_732_900_000;

pub struct TestHarness {
    pub db: Arc<MockDatabase>,
    pub factory: Arc<RecordingFactory>,
    pub time_provider: Arc<MockTimeProvider>,
    pub launcher: Arc<Launcher>,
}

pub fn test_watering_cfg() -> Watering {
    Watering { max_duration_secs: 1800, default_duration_secs: 300, tick_secs: 1 }
}

pub fn seed_plant(db: &MockDatabase, relay_line: u8) -> u32 {
    db.create_plant(NewPlant {
        name: format!("plant-{}", relay_line),
        description: String::new(),
        actuator: ActuatorKind::Pump,
        relay_line,
        config: PlantConfig { enabled: true, duration_secs: 300 },
    })
    .unwrap()
}

fn build_harness(relay_lines: &[u8], manual_time: bool, factory: Arc<RecordingFactory>) -> (TestHarness, Vec<u32>) {
    let db = Arc::new(MockDatabase::new());
    let ids: Vec<u32> = relay_lines.iter().map(|line| seed_plant(&db, *line)).collect();
    let time_provider = Arc::new(if manual_time {
        MockTimeProvider::manual(START_TIME)
    } else {
        MockTimeProvider::new(START_TIME)
    });
    let db_handle: Arc<dyn DatabaseTrait> = db.clone();
    let factory_handle: Arc<dyn ActuatorFactory> = factory.clone();
    let time_handle: Arc<dyn TimeProvider> = time_provider.clone();
    let launcher = Arc::new(Launcher::new(db_handle, factory_handle, time_handle, test_watering_cfg()).unwrap());
    (TestHarness { db, factory, time_provider, launcher }, ids)
}

/// One recording actuator per relay line, all calls succeeding.
pub fn set_harness(relay_lines: &[u8], manual_time: bool) -> (TestHarness, Vec<u32>) {
    build_harness(relay_lines, manual_time, RecordingFactory::new())
}

/// Same, but every actuator fails activation.
pub fn set_harness_faulty(relay_lines: &[u8], manual_time: bool) -> (TestHarness, Vec<u32>) {
    build_harness(relay_lines, manual_time, RecordingFactory::failing())
}

pub fn set_app_state(harness: &TestHarness) -> Arc<AppState> {
    let db_handle: Arc<dyn DatabaseTrait> = harness.db.clone();
    let time_handle: Arc<dyn TimeProvider> = harness.time_provider.clone();
    AppState::new(db_handle, harness.launcher.clone(), time_handle, Weather::default())
}

/// Polls a condition until it holds; panics after a generous deadline so a
/// broken invariant fails the test instead of hanging it.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("timed out waiting for: {}", what);
}

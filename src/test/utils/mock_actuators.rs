use crate::actuators::interface::{Actuator, ActuatorFactory, ActuatorKind};
use crate::error::AppError;
use async_trait::async_trait;
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

mock! {
    #[derive(Debug)]
    pub Actuator {}

    #[async_trait]
    impl Actuator for Actuator {
        async fn on(&self) -> Result<(), AppError>;
        async fn off(&self) -> Result<(), AppError>;
    }
}

/// Permissive mock: any number of on/off calls, all succeeding.
pub fn set_actuator0() -> Arc<MockActuator> {
    let mut mock_actuator = MockActuator::new();
    mock_actuator.expect_on().times(0..).returning(|| {
        trace!("Mocked actuator on");
        Ok(())
    });
    mock_actuator.expect_off().times(0..).returning(|| {
        trace!("Mocked actuator off");
        Ok(())
    });
    Arc::new(mock_actuator)
}

/// Records the on/off call sequence; optionally fails activation.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<&'static str>>,
    fail_on: bool,
}

impl RecordingActuator {
    pub fn new(fail_on: bool) -> Self {
        Self { calls: Mutex::new(Vec::new()), fail_on }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Last observed device state; a device never switched on is off.
    pub fn is_on(&self) -> bool {
        self.calls.lock().unwrap().last() == Some(&"on")
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn on(&self) -> Result<(), AppError> {
        if self.fail_on {
            return Err(AppError::ActuatorFault("simulated relay fault".to_owned()));
        }
        self.calls.lock().unwrap().push("on");
        Ok(())
    }

    async fn off(&self) -> Result<(), AppError> {
        self.calls.lock().unwrap().push("off");
        Ok(())
    }
}

/// Factory handing out recording actuators, keyed by relay line so tests
/// can fish the double back out for assertions.
#[derive(Default)]
pub struct RecordingFactory {
    fail_on: bool,
    built: Mutex<HashMap<u8, Arc<RecordingActuator>>>,
}

impl RecordingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail_on: true, built: Mutex::new(HashMap::new()) })
    }

    pub fn actuator(&self, relay_line: u8) -> Arc<RecordingActuator> {
        self.built.lock().unwrap().get(&relay_line).expect("actuator not built yet").clone()
    }
}

impl ActuatorFactory for RecordingFactory {
    fn build(&self, _kind: ActuatorKind, relay_line: u8) -> Arc<dyn Actuator> {
        let actuator = Arc::new(RecordingActuator::new(self.fail_on));
        self.built.lock().unwrap().insert(relay_line, actuator.clone());
        actuator
    }
}

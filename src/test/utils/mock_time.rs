use crate::time::TimeProvider;
use async_trait::async_trait;
use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};
use tokio::sync::Semaphore;

/// Simulated clock. Free-running mode lets sleeps pass instantly (after a
/// yield, so other tasks get a chance to run); manual mode blocks each
/// sleep until the test releases a tick, which makes the watering loop
/// steppable.
#[derive(Debug)]
pub struct MockTimeProvider {
    current_time: AtomicI64,
    gate: Option<Semaphore>,
}

impl MockTimeProvider {
    pub fn new(start_time: i64) -> Self {
        Self { current_time: AtomicI64::new(start_time), gate: None }
    }

    pub fn manual(start_time: i64) -> Self {
        Self { current_time: AtomicI64::new(start_time), gate: Some(Semaphore::new(0)) }
    }

    pub fn release_ticks(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn advance_time(&self, seconds: i64) {
        self.current_time.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn set(&self, new_time: i64) {
        self.current_time.store(new_time, Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeProvider for MockTimeProvider {
    fn now(&self) -> i64 {
        self.current_time.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        match &self.gate {
            Some(gate) => {
                let permit = gate.acquire().await.expect("tick gate closed");
                permit.forget();
            }
            None => tokio::task::yield_now().await,
        }
        self.current_time.fetch_add(duration.as_secs() as i64, Ordering::SeqCst);
    }
}

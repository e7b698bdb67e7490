use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, str::FromStr, sync::Arc, time::Duration};
use tracing::debug;

use crate::{config::Relay, error::AppError};

/// Binary on/off device. Calls are fast, local and never retried; a failure
/// is a hard hardware fault.
#[async_trait]
pub trait Actuator: Send + Sync + Debug {
    async fn on(&self) -> Result<(), AppError>;
    async fn off(&self) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    Pump,
    Valve,
}

impl ActuatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActuatorKind::Pump => "pump",
            ActuatorKind::Valve => "valve",
        }
    }
}

impl FromStr for ActuatorKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pump" => Ok(ActuatorKind::Pump),
            "valve" => Ok(ActuatorKind::Valve),
            other => Err(AppError::ConfigError(format!("unknown actuator kind '{}'", other))),
        }
    }
}

/// Thin HTTP client for the relay bridge. One bridge drives all relay
/// lines; each actuator owns one line.
#[derive(Debug)]
pub struct RelayClient {
    base_url: String,
    client: Client,
}

impl RelayClient {
    pub fn new(cfg: &Relay) -> Result<Self, AppError> {
        // the timeout is the only thing standing between a dead bridge and
        // a watering task stuck in Activating/Deactivating
        let client = Client::builder().timeout(Duration::from_secs(cfg.timeout_secs)).build()?;
        Ok(Self { base_url: cfg.address.trim_end_matches('/').to_owned(), client })
    }

    async fn set(&self, line: u8, on: bool) -> Result<(), AppError> {
        let state = if on { "on" } else { "off" };
        let url = format!("{}/relay/{}/{}", self.base_url, line, state);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ActuatorFault(format!("relay line {}: {}", line, e)))?;
        if response.status().is_success() {
            debug!(line, state, "Relay line switched.");
            Ok(())
        } else {
            Err(AppError::ActuatorFault(format!("relay line {} -> {}: {}", line, state, response.status())))
        }
    }
}

#[derive(Debug)]
pub struct Pump {
    relay_line: u8,
    relay: Arc<RelayClient>,
}

impl Pump {
    pub fn new(relay_line: u8, relay: Arc<RelayClient>) -> Self {
        Self { relay_line, relay }
    }
}

#[async_trait]
impl Actuator for Pump {
    async fn on(&self) -> Result<(), AppError> {
        self.relay.set(self.relay_line, true).await
    }

    async fn off(&self) -> Result<(), AppError> {
        self.relay.set(self.relay_line, false).await
    }
}

#[derive(Debug)]
pub struct Valve {
    relay_line: u8,
    relay: Arc<RelayClient>,
}

impl Valve {
    pub fn new(relay_line: u8, relay: Arc<RelayClient>) -> Self {
        Self { relay_line, relay }
    }
}

#[async_trait]
impl Actuator for Valve {
    async fn on(&self) -> Result<(), AppError> {
        self.relay.set(self.relay_line, true).await
    }

    async fn off(&self) -> Result<(), AppError> {
        self.relay.set(self.relay_line, false).await
    }
}

/// Seam between the persisted plant record (kind + relay line) and a live
/// device handle. Tests substitute recording doubles here.
pub trait ActuatorFactory: Send + Sync {
    fn build(&self, kind: ActuatorKind, relay_line: u8) -> Arc<dyn Actuator>;
}

pub struct RelayFactory {
    relay: Arc<RelayClient>,
}

impl RelayFactory {
    pub fn new(cfg: &Relay) -> Result<Self, AppError> {
        Ok(Self { relay: Arc::new(RelayClient::new(cfg)?) })
    }
}

impl ActuatorFactory for RelayFactory {
    fn build(&self, kind: ActuatorKind, relay_line: u8) -> Arc<dyn Actuator> {
        match kind {
            ActuatorKind::Pump => Arc::new(Pump::new(relay_line, self.relay.clone())),
            ActuatorKind::Valve => Arc::new(Valve::new(relay_line, self.relay.clone())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn actuator_kind_round_trip() {
        for kind in [ActuatorKind::Pump, ActuatorKind::Valve] {
            assert_eq!(kind.as_str().parse::<ActuatorKind>().unwrap(), kind);
        }
        assert!("sprinkler".parse::<ActuatorKind>().is_err());
    }
}

//! ==============================================================================
//! gateway.rs - remote sensor/actuator gateway
//! ==============================================================================
//!
//! purpose:
//!     the pi runs a small flask api in front of its gpio drivers. this module
//!     is the only place that knows how to talk to it. everything above works
//!     against the `Gateway` trait and typed payloads.
//!
//! implementations:
//!     - HttpGateway: real device over http (reqwest)
//!     - SimulatedGateway: in-process stand-in for development machines
//!
//! relationships:
//!     - used by: sampler.rs (reads), pump.rs + server.rs (actuator commands)
//!     - uses: domain.rs (payload shapes), error.rs (SampleError)
//!
//! ==============================================================================

use crate::domain::{
    ActuatorPayload, ActuatorState, ClimatePayload, DistancePayload, LightPayload,
};
use crate::error::{CommandError, SampleError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// request/response view of the device
///
/// each method issues exactly one request. no retries happen here; the
/// polling schedule is the retry mechanism.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn read_distance(&self) -> Result<DistancePayload, SampleError>;
    async fn read_climate(&self) -> Result<ClimatePayload, SampleError>;
    async fn read_light(&self) -> Result<LightPayload, SampleError>;
    async fn actuator_state(&self) -> Result<ActuatorPayload, SampleError>;
    /// the returned payload is the gateway's confirmation, not a physical check
    async fn command_actuator(&self, target: ActuatorState) -> Result<ActuatorPayload, CommandError>;
}

// ==============================================================================================
// HTTP IMPLEMENTATION (Flask api on the Pi)
// ==============================================================================================

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!("[GATEWAY] Using HTTP gateway at {}", base_url);
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SampleError> {
        let response = self.client.get(self.url(path)).send().await?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SampleError> {
        let response = self.client.post(self.url(path)).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SampleError> {
    let status = response.status();
    if !status.is_success() {
        return Err(SampleError::Status(status.as_u16()));
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| SampleError::malformed(e.to_string()))
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn read_distance(&self) -> Result<DistancePayload, SampleError> {
        self.get_json("ultrasonic").await
    }

    async fn read_climate(&self) -> Result<ClimatePayload, SampleError> {
        self.get_json("sensor/dht11").await
    }

    async fn read_light(&self) -> Result<LightPayload, SampleError> {
        self.get_json("ldr").await
    }

    async fn actuator_state(&self) -> Result<ActuatorPayload, SampleError> {
        self.get_json("led/status").await
    }

    async fn command_actuator(&self, target: ActuatorState) -> Result<ActuatorPayload, CommandError> {
        self.post_json(&format!("led/{}", target.as_str())).await
    }
}

// ==============================================================================================
// SIMULATED IMPLEMENTATION (no Pi attached)
// ==============================================================================================
// every read advances a shared tick so the signals drift over time. humidity
// swings across the pump threshold so the decision path gets exercised.

pub struct SimulatedGateway {
    tick: AtomicU64,
    actuator_on: AtomicBool,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGateway {
    pub fn new() -> Self {
        tracing::info!("[GATEWAY] Using SIMULATED gateway (no hardware access)");
        Self {
            tick: AtomicU64::new(0),
            actuator_on: AtomicBool::new(false),
        }
    }

    fn next_phase(&self, period: f64) -> f64 {
        let t = self.tick.fetch_add(1, Ordering::Relaxed) as f64;
        (t / period * std::f64::consts::TAU).sin()
    }
}

#[async_trait]
impl Gateway for SimulatedGateway {
    async fn read_distance(&self) -> Result<DistancePayload, SampleError> {
        Ok(DistancePayload {
            distance: Some(25.0 + 10.0 * self.next_phase(40.0)),
        })
    }

    async fn read_climate(&self) -> Result<ClimatePayload, SampleError> {
        let phase = self.next_phase(120.0);
        Ok(ClimatePayload {
            success: true,
            temperature: Some(24.0 + 3.0 * phase),
            humidity: Some(42.0 + 8.0 * phase),
            unit_temp: Some("C".to_string()),
            unit_humid: Some("%".to_string()),
            error: None,
        })
    }

    async fn read_light(&self) -> Result<LightPayload, SampleError> {
        let level = 80_000.0 + 40_000.0 * self.next_phase(60.0);
        Ok(LightPayload {
            level: Some(level.round()),
            status: Some("ok".to_string()),
        })
    }

    async fn actuator_state(&self) -> Result<ActuatorPayload, SampleError> {
        let on = self.actuator_on.load(Ordering::SeqCst);
        Ok(ActuatorPayload {
            state: ActuatorState::from_intent(on),
        })
    }

    async fn command_actuator(&self, target: ActuatorState) -> Result<ActuatorPayload, CommandError> {
        tracing::debug!("[MOCK RELAY] set {}", target.as_str());
        self.actuator_on
            .store(target == ActuatorState::On, Ordering::SeqCst);
        Ok(ActuatorPayload { state: target })
    }
}

//! ==============================================================================
//! sampler.rs - one poll of one sensor stream
//! ==============================================================================
//!
//! purpose:
//!     turns a gateway read into either a timestamped Reading or a typed
//!     SampleError. each call to poll() issues exactly one gateway request.
//!
//! validation:
//!     only shape and null checks. a reading of -3 cm is passed through; the
//!     sampler has no opinion on physical plausibility.
//!
//! relationships:
//!     - uses: gateway.rs (reads), domain.rs (payloads, Reading)
//!     - used by: stream.rs / scheduler.rs (periodic polling)
//!
//! ==============================================================================

use crate::domain::{ClimatePayload, Reading, StreamKind};
use crate::error::SampleError;
use crate::gateway::Gateway;

use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct Sampler {
    kind: StreamKind,
    gateway: Arc<dyn Gateway>,
    timeout: Option<Duration>,
}

impl Sampler {
    pub fn new(kind: StreamKind, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            kind,
            gateway,
            timeout: None,
        }
    }

    /// bound a single gateway call; without it a hung call only delays its own cycle
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub async fn poll(&self) -> Result<Reading, SampleError> {
        let value = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetch_value())
                .await
                .map_err(|_| SampleError::Timeout(limit))??,
            None => self.fetch_value().await?,
        };
        Ok(Reading::now(value))
    }

    async fn fetch_value(&self) -> Result<f64, SampleError> {
        match self.kind {
            StreamKind::Distance => {
                let payload = self.gateway.read_distance().await?;
                payload
                    .distance
                    .ok_or_else(|| SampleError::malformed("distance is null"))
            }
            StreamKind::Temperature => {
                let payload = self.gateway.read_climate().await?;
                climate_field(payload, "temperature", |p| p.temperature)
            }
            StreamKind::Humidity => {
                let payload = self.gateway.read_climate().await?;
                climate_field(payload, "humidity", |p| p.humidity)
            }
            StreamKind::Light => {
                let payload = self.gateway.read_light().await?;
                payload
                    .level
                    .ok_or_else(|| SampleError::malformed("light level is null"))
            }
        }
    }
}

/// the dht11 endpoint reports its own failures through `success`/`error`
fn climate_field(
    payload: ClimatePayload,
    field: &str,
    pick: impl Fn(&ClimatePayload) -> Option<f64>,
) -> Result<f64, SampleError> {
    if !payload.success {
        let reason = payload.error.as_deref().unwrap_or("no error given");
        return Err(SampleError::malformed(format!("sensor reported failure: {}", reason)));
    }
    pick(&payload).ok_or_else(|| SampleError::malformed(format!("{} is null", field)))
}

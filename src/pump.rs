//! ==============================================================================
//! pump.rs - irrigation pump decision consumer
//! ==============================================================================
//!
//! purpose:
//!     listens on the ambient channel and keeps the pump intent current. it
//!     never talks to the humidity sampler directly.
//!
//! auto command:
//!     when given a gateway, intent transitions are forwarded as relay
//!     commands through a single worker task, in the order they happened.
//!     commands are sent once; a failure is logged and not retried.
//!
//! relationships:
//!     - uses: channel.rs (subscription), decision.rs (decide), gateway.rs
//!     - used by: main.rs (wiring), server.rs (GET /api/pump)
//!
//! ==============================================================================

use crate::channel::{AmbientChannel, Subscription};
use crate::decision::decide;
use crate::domain::ActuatorState;
use crate::gateway::Gateway;

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PumpStatus {
    pub ambient: Option<f64>,
    pub threshold: f64,
    pub intent: bool,
}

pub struct PumpController {
    channel: AmbientChannel,
    threshold: f64,
    intent: Arc<AtomicBool>,
    subscription: Subscription,
    worker: Option<JoinHandle<()>>,
}

impl PumpController {
    /// subscribe to `channel`; with `commander` set this must run inside a tokio runtime
    pub fn attach(
        channel: &AmbientChannel,
        threshold: f64,
        commander: Option<Arc<dyn Gateway>>,
    ) -> Self {
        let intent = Arc::new(AtomicBool::new(false));

        let (tx, worker) = match commander {
            Some(gateway) => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(tokio::spawn(forward_commands(gateway, rx))))
            }
            None => (None, None),
        };

        let shared = intent.clone();
        let subscription = channel.subscribe(move |ambient| {
            let next = decide(ambient, threshold);
            let previous = shared.swap(next, Ordering::SeqCst);
            if previous == next {
                return;
            }
            tracing::info!(
                "[PUMP] Ambient {:?} vs threshold {} -> pump {}",
                ambient,
                threshold,
                if next { "ON" } else { "OFF" }
            );
            if let Some(tx) = &tx {
                // receiver only goes away once the controller is detached
                let _ = tx.send(ActuatorState::from_intent(next));
            }
        });

        Self {
            channel: channel.clone(),
            threshold,
            intent,
            subscription,
            worker,
        }
    }

    pub fn intent(&self) -> bool {
        self.intent.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PumpStatus {
        PumpStatus {
            ambient: self.channel.current(),
            threshold: self.threshold,
            intent: self.intent(),
        }
    }

    /// stop reacting to ambient updates; idempotent
    pub fn detach(&mut self) {
        self.subscription.unsubscribe();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for PumpController {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn forward_commands(gateway: Arc<dyn Gateway>, mut rx: mpsc::UnboundedReceiver<ActuatorState>) {
    while let Some(target) = rx.recv().await {
        match gateway.command_actuator(target).await {
            Ok(confirm) => {
                tracing::info!("[PUMP] Relay confirmed {}", confirm.state.as_str());
            }
            Err(e) => {
                tracing::warn!("[PUMP] Relay command {} failed: {}", target.as_str(), e);
            }
        }
    }
}

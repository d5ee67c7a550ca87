//! ==============================================================================
//! scheduler.rs - cancellable periodic polling
//! ==============================================================================
//!
//! purpose:
//!     drives one StreamMonitor on a fixed period. the first poll fires
//!     immediately, then one per tick. every tick spawns its own poll task so a
//!     slow gateway call never holds up the timer.
//!
//! cancellation:
//!     stop() is idempotent. the host runs on a current-thread runtime, so once
//!     stop() returns no poll task can start another gateway call. polls already
//!     in flight finish, and their outcome is dropped instead of applied.
//!
//! overlap:
//!     by default overlapping polls are allowed and applied in completion order.
//!     with `skip_if_busy` a tick is skipped while the previous poll is running.
//!
//! ==============================================================================

use crate::stream::StreamMonitor;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct PeriodicTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
}

impl PeriodicTask {
    /// start polling `monitor` every `period`; must be called inside a tokio runtime
    pub fn spawn(monitor: Arc<StreamMonitor>, period: Duration, skip_if_busy: bool) -> Self {
        let token = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(run(monitor, period, skip_if_busy, token.clone(), in_flight.clone()));

        Self {
            token,
            handle: Some(handle),
            in_flight,
        }
    }

    pub fn stop(&mut self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// polls started but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    monitor: Arc<StreamMonitor>,
    period: Duration,
    skip_if_busy: bool,
    token: CancellationToken,
    in_flight: Arc<AtomicUsize>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!("[SAMPLER] {} polling every {:?}", monitor.kind(), period);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if skip_if_busy && in_flight.load(Ordering::SeqCst) > 0 {
            tracing::debug!("[SAMPLER] {} still busy, skipping tick", monitor.kind());
            continue;
        }

        in_flight.fetch_add(1, Ordering::SeqCst);
        let monitor = monitor.clone();
        let token = token.clone();
        let in_flight = in_flight.clone();
        tokio::spawn(async move {
            if !token.is_cancelled() {
                let outcome = monitor.sampler().poll().await;
                if token.is_cancelled() {
                    tracing::debug!("[SAMPLER] {} stopped, dropping late outcome", monitor.kind());
                } else {
                    monitor.apply(outcome);
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    tracing::info!("[SAMPLER] {} stopped", monitor.kind());
}

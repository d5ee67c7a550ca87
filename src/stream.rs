//! ==============================================================================
//! stream.rs - per-stream state: sampler + history + status
//! ==============================================================================
//!
//! purpose:
//!     a StreamMonitor is where poll outcomes land. a successful reading is
//!     appended to the stream's history (if it keeps one) and published on
//!     the ambient channel (if the stream is wired as the ambient producer).
//!     a failure only updates the status; history and ambient stay as they were.
//!
//! ordering:
//!     outcomes are applied in completion order. two overlapping polls can
//!     commit out of issue order; every reading carries its own timestamp.
//!
//! ==============================================================================

use crate::channel::AmbientChannel;
use crate::domain::{Reading, Statistics, StreamKind};
use crate::error::SampleError;
use crate::history::HistoryStore;
use crate::sampler::Sampler;

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// derived liveness of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// no successful poll since the process started
    Stale,
    Live,
}

#[derive(Default)]
struct Status {
    last_reading: Option<Reading>,
    last_error: Option<String>,
    failures: u64,
    successes: u64,
}

/// point-in-time view of a stream for the api
#[derive(Clone, Debug, Serialize)]
pub struct StreamSnapshot {
    pub name: &'static str,
    pub freshness: Freshness,
    pub latest: Option<f64>,
    pub last_reading: Option<Reading>,
    pub last_error: Option<String>,
    pub successes: u64,
    pub failures: u64,
    pub statistics: Option<Statistics>,
    pub buffered: usize,
}

pub struct StreamMonitor {
    sampler: Sampler,
    history: Option<Mutex<HistoryStore>>,
    ambient: Option<AmbientChannel>,
    status: Mutex<Status>,
    show_data: bool,
}

impl StreamMonitor {
    pub fn new(sampler: Sampler) -> Self {
        Self {
            sampler,
            history: None,
            ambient: None,
            status: Mutex::new(Status::default()),
            show_data: false,
        }
    }

    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(Mutex::new(history));
        self
    }

    /// make this stream the producer of the ambient value
    pub fn publishing_to(mut self, channel: AmbientChannel) -> Self {
        self.ambient = Some(channel);
        self
    }

    /// log every reading at info instead of debug
    pub fn show_data(mut self, show: bool) -> Self {
        self.show_data = show;
        self
    }

    pub fn kind(&self) -> StreamKind {
        self.sampler.kind()
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// run one cycle: poll, then apply the outcome
    pub async fn poll_once(&self) -> Result<Reading, SampleError> {
        let outcome = self.sampler.poll().await;
        self.apply(outcome.clone());
        outcome
    }

    pub fn apply(&self, outcome: Result<Reading, SampleError>) {
        match outcome {
            Ok(reading) => {
                if self.show_data {
                    tracing::info!("[{}] {:.3}", self.kind(), reading.value);
                } else {
                    tracing::debug!("[{}] {:.3}", self.kind(), reading.value);
                }

                if let Some(history) = &self.history {
                    lock(history).append(reading);
                }
                if let Some(channel) = &self.ambient {
                    channel.publish(Some(reading.value));
                }

                let mut status = lock(&self.status);
                status.last_reading = Some(reading);
                status.last_error = None;
                status.successes += 1;
            }
            Err(e) => {
                tracing::warn!("[{}] Poll failed: {}", self.kind(), e);
                let mut status = lock(&self.status);
                status.last_error = Some(e.to_string());
                status.failures += 1;
            }
        }
    }

    /// run `f` against the history store, if this stream keeps one
    pub fn with_history_store<R>(&self, f: impl FnOnce(&mut HistoryStore) -> R) -> Option<R> {
        self.history.as_ref().map(|h| f(&mut lock(h)))
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        let status = lock(&self.status);
        let (latest, statistics, buffered) = self
            .with_history_store(|h| (h.latest(), h.statistics(), h.len()))
            .unwrap_or_else(|| (status.last_reading.map(|r| r.value), None, 0));

        StreamSnapshot {
            name: self.kind().name(),
            freshness: if status.successes > 0 {
                Freshness::Live
            } else {
                Freshness::Stale
            },
            latest,
            last_reading: status.last_reading,
            last_error: status.last_error.clone(),
            successes: status.successes,
            failures: status.failures,
            statistics,
            buffered,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

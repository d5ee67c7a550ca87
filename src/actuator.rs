//! manual relay commands and their recent history.
//!
//! commands are at-most-once: one gateway call, the caller sees the outcome,
//! nothing is retried. the log keeps the newest entries first.

use crate::domain::{now_ms, ActuatorState};
use crate::error::CommandError;
use crate::gateway::Gateway;

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_LOG_LEN: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandEntry {
    pub action: ActuatorState,
    /// epoch ms when the command was issued
    pub timestamp: i64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct CommandLog {
    entries: Mutex<VecDeque<CommandEntry>>,
    limit: usize,
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_LEN)
    }
}

impl CommandLog {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    pub fn record(&self, entry: CommandEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_front(entry);
        entries.truncate(self.limit);
    }

    /// newest first
    pub fn entries(&self) -> Vec<CommandEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    /// send `target` to the gateway once and log the outcome
    pub async fn command(
        &self,
        gateway: &dyn Gateway,
        target: ActuatorState,
    ) -> Result<ActuatorState, CommandError> {
        let timestamp = now_ms();
        let outcome = gateway.command_actuator(target).await.map(|p| p.state);

        match &outcome {
            Ok(state) => tracing::info!("[RELAY] {} confirmed ({})", target.as_str(), state.as_str()),
            Err(e) => tracing::warn!("[RELAY] {} failed: {}", target.as_str(), e),
        }
        self.record(CommandEntry {
            action: target,
            timestamp,
            ok: outcome.is_ok(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
        });
        outcome
    }
}

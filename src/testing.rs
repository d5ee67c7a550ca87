//! scripted gateway for unit tests.

use crate::domain::{
    ActuatorPayload, ActuatorState, ClimatePayload, DistancePayload, LightPayload,
};
use crate::error::{CommandError, SampleError};
use crate::gateway::Gateway;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Script<T> = Mutex<VecDeque<Result<T, SampleError>>>;

/// answers each read with the next queued response; an empty queue is a
/// transport error ("unreachable")
#[derive(Default)]
pub struct ScriptedGateway {
    distance: Script<DistancePayload>,
    climate: Script<ClimatePayload>,
    light: Script<LightPayload>,
    actuator: Mutex<Option<ActuatorState>>,
    fail_commands: Mutex<bool>,
    commands: Mutex<Vec<ActuatorState>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// every read sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_distance(&self, r: Result<DistancePayload, SampleError>) {
        self.distance.lock().unwrap().push_back(r);
    }

    pub fn push_climate(&self, r: Result<ClimatePayload, SampleError>) {
        self.climate.lock().unwrap().push_back(r);
    }

    pub fn push_light(&self, r: Result<LightPayload, SampleError>) {
        self.light.lock().unwrap().push_back(r);
    }

    pub fn set_actuator(&self, state: Option<ActuatorState>) {
        *self.actuator.lock().unwrap() = state;
    }

    pub fn fail_commands(&self, fail: bool) {
        *self.fail_commands.lock().unwrap() = fail;
    }

    pub fn commands(&self) -> Vec<ActuatorState> {
        self.commands.lock().unwrap().clone()
    }

    /// number of read requests issued so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next<T>(&self, script: &Script<T>) -> Result<T, SampleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SampleError::transport("connection refused")))
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn read_distance(&self) -> Result<DistancePayload, SampleError> {
        self.next(&self.distance).await
    }

    async fn read_climate(&self) -> Result<ClimatePayload, SampleError> {
        self.next(&self.climate).await
    }

    async fn read_light(&self) -> Result<LightPayload, SampleError> {
        self.next(&self.light).await
    }

    async fn actuator_state(&self) -> Result<ActuatorPayload, SampleError> {
        match *self.actuator.lock().unwrap() {
            Some(state) => Ok(ActuatorPayload { state }),
            None => Err(SampleError::transport("connection refused")),
        }
    }

    async fn command_actuator(&self, target: ActuatorState) -> Result<ActuatorPayload, CommandError> {
        if *self.fail_commands.lock().unwrap() {
            return Err(SampleError::Status(500));
        }
        self.commands.lock().unwrap().push(target);
        *self.actuator.lock().unwrap() = Some(target);
        Ok(ActuatorPayload { state: target })
    }
}

//! live telemetry core for the raspberry pi dashboard host.
//!
//! gateway -> sampler -> { history store, ambient channel } -> { pump decision, api }

pub mod actuator;
pub mod channel;
pub mod config;
pub mod decision;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod history;
pub mod pump;
pub mod sampler;
pub mod scheduler;
pub mod server;
pub mod snapshot;
pub mod stream;

#[cfg(test)]
mod testing;

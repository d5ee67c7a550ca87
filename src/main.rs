//! ==============================================================================
//! main.rs - telemetry host entry point
//! ==============================================================================
//!
//! purpose:
//!     polls the pi's sensor gateway, keeps a rolling history per stream,
//!     feeds ambient humidity to the irrigation pump decision and serves the
//!     dashboard json api.
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    rust host (this file)                     │
//!     │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//!     │  │ samplers    │  │ web server  │  │ pump controller     │  │
//!     │  │ (per-stream │  │ (port 3000) │  │ (ambient listener)  │  │
//!     │  │  timers)    │  │             │  │                     │  │
//!     │  └──────┬──────┘  └──────┬──────┘  └──────────┬──────────┘  │
//!     │         │ history +      │ reads              │ subscribes  │
//!     │         │ ambient        │                    │             │
//!     │         └────────────────┼────────────────────┘             │
//!     └──────────────────────────┼──────────────────────────────────┘
//!                                │ http (json)
//!                         ┌──────┴──────┐
//!                         │ flask api   │  <- gpio, dht11, hc-sr04, ldr
//!                         │ on the pi   │
//!                         └─────────────┘
//!
//! scheduling:
//!     everything runs on one current-thread runtime. timers never block each
//!     other; a slow gateway call only delays its own cycle.
//!
//! ==============================================================================

use pi_telemetry_host::actuator::CommandLog;
use pi_telemetry_host::channel::AmbientChannel;
use pi_telemetry_host::config::HostConfig;
use pi_telemetry_host::domain::StreamKind;
use pi_telemetry_host::gateway::{Gateway, HttpGateway, SimulatedGateway};
use pi_telemetry_host::history::HistoryStore;
use pi_telemetry_host::pump::PumpController;
use pi_telemetry_host::sampler::Sampler;
use pi_telemetry_host::scheduler::PeriodicTask;
use pi_telemetry_host::server::{self, ApiState};
use pi_telemetry_host::snapshot::{FileSnapshotStore, SnapshotStore};
use pi_telemetry_host::stream::StreamMonitor;

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // step 1: load configuration, then logging (RUST_LOG wins over the file)
    let (config, notes) = HostConfig::load_or_default();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("===========================================================");
    tracing::info!("  Pi Telemetry Host");
    tracing::info!("===========================================================");
    for note in &notes {
        tracing::info!("{}", note);
    }
    config.print_summary();

    // step 2: gateway + shared components
    let gateway: Arc<dyn Gateway> = if config.gateway.simulate {
        Arc::new(SimulatedGateway::new())
    } else {
        Arc::new(HttpGateway::new(config.gateway.base_url.clone()))
    };
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(&config.history.snapshot_dir));
    let ambient = AmbientChannel::new();

    // step 3: pump decision listens before any sampler publishes
    let commander = config.actuation.auto_command.then(|| gateway.clone());
    let pump = Arc::new(PumpController::attach(&ambient, config.actuation.threshold, commander));

    // step 4: one monitor + timer per enabled stream
    let mut monitors = Vec::new();
    let mut tasks = Vec::new();
    for kind in StreamKind::ALL {
        let entry = config.streams.entry(kind);
        if !entry.enabled {
            continue;
        }

        let sampler = Sampler::new(kind, gateway.clone()).with_timeout(config.gateway.request_timeout());
        let mut monitor = StreamMonitor::new(sampler).show_data(config.logging.show_sensor_data);
        if entry.history {
            let history = HistoryStore::open(kind.snapshot_key(), config.history.capacity, snapshots.clone());
            tracing::info!("[STARTUP] ✓ {} history restored ({} readings)", kind, history.len());
            monitor = monitor.with_history(history);
        }
        if kind == StreamKind::Humidity {
            monitor = monitor.publishing_to(ambient.clone());
        }

        let monitor = Arc::new(monitor);
        tasks.push(PeriodicTask::spawn(monitor.clone(), entry.interval(kind), entry.skip_if_busy));
        monitors.push(monitor);
    }

    // step 5: web api until ctrl-c
    let state = ApiState {
        streams: Arc::new(monitors),
        pump,
        gateway,
        commands: Arc::new(CommandLog::default()),
    };

    tokio::select! {
        result = server::serve(&config.server.bind, state) => {
            if let Err(e) = result {
                tracing::error!("[SERVER] Web server error: {:#}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("[SHUTDOWN] Ctrl-C received");
        }
    }

    for task in &mut tasks {
        task.stop();
    }
    tracing::info!("[SHUTDOWN] Samplers stopped");
    Ok(())
}

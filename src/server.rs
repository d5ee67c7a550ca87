//! ==============================================================================
//! server.rs - dashboard json api
//! ==============================================================================
//!
//! purpose:
//!     read-only views of stream state for the dashboard frontend, plus the
//!     two write paths a user can trigger: clearing a history and switching
//!     the relay by hand.
//!
//! routes:
//!     GET    /api/streams
//!     GET    /api/streams/:name/history
//!     GET    /api/streams/:name/export      (text/csv)
//!     DELETE /api/streams/:name/history
//!     GET    /api/pump
//!     GET    /api/actuator
//!     POST   /api/actuator/:action          (on | off)
//!     GET    /api/actuator/log
//!
//! ==============================================================================

use crate::actuator::CommandLog;
use crate::decision::LightLevel;
use crate::domain::{ActuatorState, Reading, StreamKind};
use crate::error::SampleError;
use crate::gateway::Gateway;
use crate::pump::PumpController;
use crate::stream::{StreamMonitor, StreamSnapshot};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct ApiState {
    pub streams: Arc<Vec<Arc<StreamMonitor>>>,
    pub pump: Arc<PumpController>,
    pub gateway: Arc<dyn Gateway>,
    pub commands: Arc<CommandLog>,
}

impl ApiState {
    fn stream(&self, name: &str) -> Result<&Arc<StreamMonitor>, ApiError> {
        let kind = StreamKind::from_name(name).ok_or_else(|| ApiError::UnknownStream(name.to_string()))?;
        self.streams
            .iter()
            .find(|s| s.kind() == kind)
            .ok_or_else(|| ApiError::UnknownStream(name.to_string()))
    }
}

pub enum ApiError {
    UnknownStream(String),
    NoHistory(String),
    BadAction(String),
    Gateway(SampleError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownStream(name) => (StatusCode::NOT_FOUND, format!("unknown stream: {}", name)),
            ApiError::NoHistory(name) => (StatusCode::NOT_FOUND, format!("stream {} keeps no history", name)),
            ApiError::BadAction(action) => (StatusCode::BAD_REQUEST, format!("unknown action: {}", action)),
            ApiError::Gateway(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };
        (status, Json(serde_json::json!({"status": "error", "message": message}))).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/streams", get(list_streams))
        .route("/api/streams/:name/history", get(stream_history).delete(clear_history))
        .route("/api/streams/:name/export", get(export_history))
        .route("/api/pump", get(pump_status))
        .route("/api/actuator", get(actuator_state))
        .route("/api/actuator/log", get(actuator_log))
        .route("/api/actuator/:action", post(actuator_command))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(bind: &str, state: ApiState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("[SERVER] Dashboard api live at http://{}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Serialize)]
struct StreamView {
    #[serde(flatten)]
    snapshot: StreamSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    light_level: Option<LightLevel>,
}

async fn list_streams(State(state): State<ApiState>) -> Json<Vec<StreamView>> {
    let views = state
        .streams
        .iter()
        .map(|s| {
            let snapshot = s.snapshot();
            let light_level = match s.kind() {
                StreamKind::Light => snapshot.latest.map(LightLevel::classify),
                _ => None,
            };
            StreamView { snapshot, light_level }
        })
        .collect();
    Json(views)
}

async fn stream_history(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let stream = state.stream(&name)?;
    stream
        .with_history_store(|h| Json(h.readings()))
        .ok_or(ApiError::NoHistory(name))
}

async fn clear_history(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let stream = state.stream(&name)?;
    stream
        .with_history_store(|h| h.clear())
        .ok_or(ApiError::NoHistory(name.clone()))?;
    tracing::info!("[SERVER] Cleared history for {}", name);
    Ok(StatusCode::NO_CONTENT)
}

async fn export_history(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let stream = state.stream(&name)?;
    let csv = stream
        .with_history_store(|h| h.export_csv())
        .ok_or(ApiError::NoHistory(name.clone()))?;

    let disposition = format!("attachment; filename=\"{}\"", export_filename(&name, chrono::Utc::now()));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

/// `<stream>_history_<utc stamp>.csv`, stamp with `:` and `.` swapped for `-`
fn export_filename(name: &str, at: chrono::DateTime<chrono::Utc>) -> String {
    format!("{}_history_{}.csv", name, at.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}

async fn pump_status(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.pump.status())
}

async fn actuator_state(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let payload = state.gateway.actuator_state().await.map_err(ApiError::Gateway)?;
    Ok(Json(payload))
}

async fn actuator_command(
    State(state): State<ApiState>,
    Path(action): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let target = match action.as_str() {
        "on" => ActuatorState::On,
        "off" => ActuatorState::Off,
        _ => return Err(ApiError::BadAction(action)),
    };
    let confirmed = state
        .commands
        .command(state.gateway.as_ref(), target)
        .await
        .map_err(ApiError::Gateway)?;
    Ok(Json(serde_json::json!({"status": "ok", "state": confirmed})))
}

async fn actuator_log(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.commands.entries())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::AmbientChannel;
    use crate::domain::{ClimatePayload, DistancePayload};
    use crate::history::HistoryStore;
    use crate::sampler::Sampler;
    use crate::snapshot::MemorySnapshotStore;
    use crate::testing::ScriptedGateway;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    struct Fixture {
        app: Router,
        gateway: Arc<ScriptedGateway>,
        distance: Arc<StreamMonitor>,
        humidity: Arc<StreamMonitor>,
    }

    fn fixture() -> Fixture {
        let gateway = Arc::new(ScriptedGateway::new());
        let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
        let slots = Arc::new(MemorySnapshotStore::new());
        let channel = AmbientChannel::new();

        let distance = Arc::new(
            StreamMonitor::new(Sampler::new(StreamKind::Distance, dyn_gateway.clone()))
                .with_history(HistoryStore::open("distance", 60, slots.clone())),
        );
        let humidity = Arc::new(
            StreamMonitor::new(Sampler::new(StreamKind::Humidity, dyn_gateway.clone()))
                .publishing_to(channel.clone()),
        );
        let pump = Arc::new(PumpController::attach(&channel, 40.0, None));

        let state = ApiState {
            streams: Arc::new(vec![distance.clone(), humidity.clone()]),
            pump,
            gateway: dyn_gateway,
            commands: Arc::new(CommandLog::default()),
        };
        Fixture {
            app: router(state),
            gateway,
            distance,
            humidity,
        }
    }

    async fn request(app: &Router, method: Method, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn request_json(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let (status, body) = request(app, method, uri).await;
        (status, serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_streams_listing() {
        let f = fixture();
        f.gateway.push_distance(Ok(DistancePayload { distance: Some(12.0) }));
        f.distance.poll_once().await.unwrap();

        let (status, body) = request_json(&f.app, Method::GET, "/api/streams").await;
        assert_eq!(status, StatusCode::OK);
        let streams = body.as_array().unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0]["name"], "distance");
        assert_eq!(streams[0]["freshness"], "live");
        assert_eq!(streams[0]["latest"], 12.0);
        assert_eq!(streams[0]["statistics"]["mean"], 12.0);
        assert_eq!(streams[1]["freshness"], "stale");
        assert!(streams[1]["statistics"].is_null());
    }

    #[tokio::test]
    async fn test_history_export_and_clear() {
        let f = fixture();
        f.gateway.push_distance(Ok(DistancePayload { distance: Some(3.5) }));
        f.distance.poll_once().await.unwrap();

        let (status, body) = request_json(&f.app, Method::GET, "/api/streams/distance/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["value"], 3.5);

        let (status, csv) = request(&f.app, Method::GET, "/api/streams/distance/export").await;
        assert_eq!(status, StatusCode::OK);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp_iso,time_local,value");
        assert!(lines[1].ends_with(",3.500"));

        let response = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/streams/distance/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"distance_history_"));
        assert!(disposition.ends_with("Z.csv\""));
        assert!(!disposition.contains(':'));

        let (status, _) = request(&f.app, Method::DELETE, "/api/streams/distance/history").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = request_json(&f.app, Method::GET, "/api/streams/distance/history").await;
        assert_eq!(body.as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_export_filename_keeps_millis() {
        let at = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(
            export_filename("light", at),
            "light_history_2023-11-14T22-13-20-123Z.csv"
        );
    }

    #[tokio::test]
    async fn test_unknown_stream_and_missing_history() {
        let f = fixture();
        let (status, body) = request_json(&f.app, Method::GET, "/api/streams/pressure/history").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");

        let (status, _) = request(&f.app, Method::GET, "/api/streams/light/export").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = request(&f.app, Method::GET, "/api/streams/humidity/history").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pump_follows_humidity_stream() {
        let f = fixture();
        let (_, body) = request_json(&f.app, Method::GET, "/api/pump").await;
        assert_eq!(body["intent"], false);
        assert!(body["ambient"].is_null());

        f.gateway.push_climate(Ok(ClimatePayload {
            success: true,
            temperature: Some(25.0),
            humidity: Some(31.0),
            unit_temp: None,
            unit_humid: None,
            error: None,
        }));
        f.humidity.poll_once().await.unwrap();

        let (_, body) = request_json(&f.app, Method::GET, "/api/pump").await;
        assert_eq!(body["intent"], true);
        assert_eq!(body["ambient"], 31.0);
        assert_eq!(body["threshold"], 40.0);
    }

    #[tokio::test]
    async fn test_actuator_commands() {
        let f = fixture();
        let (status, _) = request_json(&f.app, Method::GET, "/api/actuator").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, body) = request_json(&f.app, Method::POST, "/api/actuator/on").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "on");

        let (_, body) = request_json(&f.app, Method::GET, "/api/actuator").await;
        assert_eq!(body["state"], "on");

        // relay flipped from the pi side
        f.gateway.set_actuator(Some(ActuatorState::Off));
        let (_, body) = request_json(&f.app, Method::GET, "/api/actuator").await;
        assert_eq!(body["state"], "off");

        let (status, _) = request_json(&f.app, Method::POST, "/api/actuator/blink").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        f.gateway.fail_commands(true);
        let (status, _) = request_json(&f.app, Method::POST, "/api/actuator/off").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (_, body) = request_json(&f.app, Method::GET, "/api/actuator/log").await;
        let log = body.as_array().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0]["action"], "off");
        assert_eq!(log[0]["ok"], false);
        assert_eq!(log[1]["action"], "on");
    }
}

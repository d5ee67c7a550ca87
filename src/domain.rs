use serde::{Deserialize, Serialize};

/// one timestamped sample of a sensor stream
///
/// the serialized shape (`{"timestamp": <epoch ms>, "value": <number>}`) is
/// also the snapshot format, so renaming fields breaks persisted histories.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// client-observed wall clock, unix epoch milliseconds
    pub timestamp: i64,
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// stamp a value with the current wall clock
    pub fn now(value: f64) -> Self {
        Self::new(now_ms(), value)
    }
}

/// current unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// min/max/mean over the live history window
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

/// logical sensor streams polled from the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Distance,
    Temperature,
    Humidity,
    Light,
}

impl StreamKind {
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Distance,
        StreamKind::Temperature,
        StreamKind::Humidity,
        StreamKind::Light,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Distance => "distance",
            StreamKind::Temperature => "temperature",
            StreamKind::Humidity => "humidity",
            StreamKind::Light => "light",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// snapshot key, versioned so a format change can start fresh
    pub fn snapshot_key(&self) -> String {
        format!("{}_readings_v1", self.name())
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ==============================================================================
// gateway payloads
// ==============================================================================
// shapes returned by the flask api on the pi. every numeric field is optional
// on the wire so a null reading is a checked branch in the sampler instead of
// a deserialization failure.

/// GET /ultrasonic
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DistancePayload {
    #[serde(alias = "distance_cm")]
    pub distance: Option<f64>,
}

/// GET /sensor/dht11
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ClimatePayload {
    pub success: bool,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_temp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_humid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /ldr
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LightPayload {
    #[serde(alias = "ldr")]
    pub level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// relay / led state as reported by the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorState {
    On,
    Off,
}

impl ActuatorState {
    pub fn from_intent(intent: bool) -> Self {
        if intent { ActuatorState::On } else { ActuatorState::Off }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActuatorState::On => "on",
            ActuatorState::Off => "off",
        }
    }
}

/// GET /led/status, POST /led/on, POST /led/off
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ActuatorPayload {
    #[serde(alias = "status")]
    pub state: ActuatorState,
}

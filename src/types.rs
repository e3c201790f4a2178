use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Number of telemetry features extracted per log record.
pub const NUM_FEATURES: usize = 5;

/// Column order of a [`FeatureVector`].
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "output_power",
    "battery_level",
    "consumption",
    "error_status",
    "connector_connected",
];

pub type FeatureVector = [f32; NUM_FEATURES];

/// Session identifier as it appears in the CSMS export.
///
/// Any JSON scalar is accepted. Numbers compare by value, so `1`, `1.0` and
/// `true` name the same session, while `"7"` and `7` are different sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum SessionId {
    Integer(i64),
    /// Non-integral number, stored as its bit pattern.
    Float(u64),
    Text(String),
    Null,
}

impl SessionId {
    fn from_f64(v: f64) -> Self {
        // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            Self::Integer(v as i64)
        } else {
            Self::Float(v.to_bits())
        }
    }
}

impl TryFrom<Value> for SessionId {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Integer(i64::from(b))),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(Self::Integer(i)),
                (None, Some(f)) => Ok(Self::from_f64(f)),
                (None, None) => Err(format!("unrepresentable session id {n}")),
            },
            Value::String(s) => Ok(Self::Text(s)),
            other => Err(format!("session id must be a scalar, got {other}")),
        }
    }
}

impl From<SessionId> for Value {
    fn from(id: SessionId) -> Self {
        match id {
            SessionId::Integer(i) => Value::from(i),
            SessionId::Float(bits) => Value::from(f64::from_bits(bits)),
            SessionId::Text(s) => Value::String(s),
            SessionId::Null => Value::Null,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Self::Text(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargingSession {
    pub id: SessionId,
    #[serde(default, deserialize_with = "lenient_label")]
    pub started_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub stopped_at: Option<String>,
}

/// One telemetry sample. Only `session_id` is mandatory at parse time;
/// `created_at` is checked when the owning session is processed.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargingLog {
    pub session_id: SessionId,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub output_power: Option<f32>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub battery_level: Option<f32>,
    #[serde(default, deserialize_with = "lenient_reading")]
    pub consumption: Option<f32>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub connector_status: Option<String>,
}

impl ChargingLog {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("Error")
    }

    pub fn is_connected(&self) -> bool {
        self.connector_status.as_deref() == Some("Connected")
    }

    /// Encodes the record as `[output_power, battery_level, consumption, error, connected]`.
    pub fn features(&self) -> FeatureVector {
        [
            self.output_power.unwrap_or(0.0),
            self.battery_level.unwrap_or(0.0),
            self.consumption.unwrap_or(0.0),
            if self.is_error() { 1.0 } else { 0.0 },
            if self.is_connected() { 1.0 } else { 0.0 },
        ]
    }
}

/// Best-effort numeric coercion of a raw JSON reading.
///
/// `null`, the empty string and a missing key yield `None`, which the
/// feature encoder treats as `0.0`. Numbers, booleans and numeric strings
/// are converted; anything else, a blank string included, is rejected.
pub fn coerce_reading(value: &Value) -> Result<Option<f32>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Value::Number(n) => n
            .as_f64()
            .map(|v| Some(v as f32))
            .ok_or_else(|| format!("unrepresentable number {n}")),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f32>()
            .map(Some)
            .map_err(|_| format!("non-numeric reading {s:?}")),
        other => Err(format!("unsupported reading {other}")),
    }
}

fn lenient_reading<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_reading(&value).map_err(serde::de::Error::custom)
}

// Non-string labels never match a status, so they read as absent.
fn lenient_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

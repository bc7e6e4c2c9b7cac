use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Simulation time as reported by the host's world clock.
///
/// Ordered lexicographically by `(sec, nsec)`; `nsec` is always normalised
/// into `0..1_000_000_000`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    JsonSchema,
)]
pub struct SimTime {
    pub sec: i64,
    pub nsec: u32,
}

impl SimTime {
    /// The start of simulation.
    pub const ZERO: SimTime = SimTime { sec: 0, nsec: 0 };

    /// Create a time value, carrying any whole seconds held in `nsec`.
    pub fn new(sec: i64, nsec: u32) -> Self {
        Self::from_nanos(sec as i128 * NANOS_PER_SEC + nsec as i128)
    }

    /// The latest representable time.
    pub const MAX: SimTime = SimTime {
        sec: i64::MAX,
        nsec: 999_999_999,
    };

    /// The earliest representable time.
    pub const MIN: SimTime = SimTime { sec: i64::MIN, nsec: 0 };

    /// Build from a total nanosecond count (may be negative).  Counts
    /// outside the `i64` seconds range saturate to [`SimTime::MAX`] or
    /// [`SimTime::MIN`].
    pub fn from_nanos(total: i128) -> Self {
        let sec = total.div_euclid(NANOS_PER_SEC);
        let nsec = total.rem_euclid(NANOS_PER_SEC);
        match i64::try_from(sec) {
            Ok(sec) => Self {
                sec,
                nsec: nsec as u32,
            },
            Err(_) if sec > 0 => Self::MAX,
            Err(_) => Self::MIN,
        }
    }

    /// Build from floating-point seconds, rounded to the nearest nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_nanos((secs * 1e9).round() as i128)
    }

    /// Total nanoseconds since the epoch of the simulation clock.
    pub fn as_nanos(self) -> i128 {
        self.sec as i128 * NANOS_PER_SEC + self.nsec as i128
    }

    pub fn as_secs_f64(self) -> f64 {
        self.sec as f64 + self.nsec as f64 * 1e-9
    }

    /// Advance by a (non-negative or negative) number of seconds,
    /// saturating at the ends of the representable range.
    pub fn add_secs_f64(self, secs: f64) -> Self {
        // `as` saturates for out-of-range floats and maps NaN to 0.
        let delta = (secs * 1e9).round() as i128;
        Self::from_nanos(self.as_nanos().saturating_add(delta))
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}s", self.sec, self.nsec)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Report wire messages
// ─────────────────────────────────────────────────────────────────────────────

/// Position component of a [`PoseMsg`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PointMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Orientation component of a [`PoseMsg`], serialised in (x, y, z, w) order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuaternionMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Language-neutral pose: position plus unit-quaternion orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoseMsg {
    pub position: PointMsg,
    pub orientation: QuaternionMsg,
}

/// One entity found inside the view volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectionMsg {
    /// Entity identifier as known to the pose feed.
    pub id: String,
    /// Entity pose expressed in the sensor's local frame.
    pub relative_pose: PoseMsg,
}

/// Timestamped result of one detection tick.
///
/// Immutable once built. `detections` is sorted by entity identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub timestamp: SimTime,
    /// Sensor world pose at capture time.
    pub sensor_pose: PoseMsg,
    pub detections: Vec<DetectionMsg>,
}

impl DetectionReport {
    /// Identifiers of every detected entity, in report order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.detections.iter().map(|d| d.id.as_str())
    }

    /// Look up a single detection by entity identifier.
    pub fn find(&self, id: &str) -> Option<&DetectionMsg> {
        self.detections.iter().find(|d| d.id == id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a sensor as seen by the host runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Unconfigured,
    Loaded,
    Initialized,
    Active,
    Faulted,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Loaded => "loaded",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Active => "active",
            LifecycleState::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper carried by the topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// Wall-clock time the event was handed to the bus.
    pub timestamp: DateTime<Utc>,
    /// Publishing component, e.g. `"logicam-sensors::logical_camera"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current wall clock.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Detections(DetectionReport),
    SensorFault { sensor: String, message: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error type shared by every stage of the detection pipeline.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorError {
    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Sensor '{sensor}' not initialized (state: {state})")]
    NotInitialized {
        sensor: String,
        state: LifecycleState,
    },

    #[error("Destination Unavailable on {topic}: {reason}")]
    DestinationUnavailable { topic: String, reason: String },

    #[error("Invalid Parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown sensor type '{0}'")]
    UnknownSensorType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_time_normalises_nanoseconds() {
        let t = SimTime::new(1, 1_500_000_000);
        assert_eq!(t, SimTime { sec: 2, nsec: 500_000_000 });
    }

    #[test]
    fn sim_time_from_secs_and_ordering() {
        let a = SimTime::from_secs_f64(1.25);
        assert_eq!(a.sec, 1);
        assert_eq!(a.nsec, 250_000_000);
        let b = a.add_secs_f64(0.75);
        assert_eq!(b, SimTime::new(2, 0));
        assert!(a < b);
        assert!((b.as_secs_f64() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn sim_time_negative_is_normalised() {
        let t = SimTime::from_secs_f64(-0.5);
        assert_eq!(t.sec, -1);
        assert_eq!(t.nsec, 500_000_000);
        assert!(t < SimTime::ZERO);
    }

    #[test]
    fn sim_time_add_saturates_instead_of_overflowing() {
        let start = SimTime::new(1, 0);
        assert_eq!(start.add_secs_f64(1e10), SimTime::new(10_000_000_001, 0));
        assert_eq!(start.add_secs_f64(1e20), SimTime::MAX);
        assert_eq!(start.add_secs_f64(1e30), SimTime::MAX);
        assert_eq!(start.add_secs_f64(f64::INFINITY), SimTime::MAX);
        assert_eq!(start.add_secs_f64(-1e30), SimTime::MIN);
        assert_eq!(SimTime::MAX.add_secs_f64(1.0), SimTime::MAX);
        assert_eq!(SimTime::from_nanos(i128::MAX), SimTime::MAX);
        assert_eq!(SimTime::from_nanos(i128::MIN), SimTime::MIN);
    }

    #[test]
    fn report_wire_shape_uses_camel_case() {
        let report = DetectionReport {
            timestamp: SimTime::new(3, 7),
            sensor_pose: PoseMsg::default(),
            detections: vec![DetectionMsg {
                id: "box1".to_string(),
                relative_pose: PoseMsg::default(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["timestamp"]["sec"], 3);
        assert_eq!(json["timestamp"]["nsec"], 7);
        assert!(json.get("sensorPose").is_some());
        assert_eq!(json["detections"][0]["id"], "box1");
        assert_eq!(json["detections"][0]["relativePose"]["orientation"]["w"], 1.0);
    }

    #[test]
    fn report_find_and_ids() {
        let report = DetectionReport {
            detections: vec![
                DetectionMsg {
                    id: "a".into(),
                    relative_pose: PoseMsg::default(),
                },
                DetectionMsg {
                    id: "b".into(),
                    relative_pose: PoseMsg::default(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(report.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(report.find("b").is_some());
        assert!(report.find("c").is_none());
    }

    #[test]
    fn sensor_error_display() {
        let err = SensorError::NotInitialized {
            sensor: "cam".to_string(),
            state: LifecycleState::Unconfigured,
        };
        assert!(err.to_string().contains("not initialized"));
        assert!(err.to_string().contains("unconfigured"));

        let err2 = SensorError::DestinationUnavailable {
            topic: "/cam/logical_camera".to_string(),
            reason: "not advertised".to_string(),
        };
        assert!(err2.to_string().contains("/cam/logical_camera"));
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "logicam-sensors::logical_camera",
            EventPayload::Detections(DetectionReport::default()),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
    }
}

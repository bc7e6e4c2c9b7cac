//! Declarative sensor description.
//!
//! A [`SensorConfig`] is what a host hands to [`Sensor::load`][crate::Sensor::load].
//! It deserialises from TOML (or any serde format):
//!
//! ```toml
//! name = "front_cam"
//! type = "logical_camera"
//! update_rate = 10.0
//!
//! [pose]
//! position = [0.0, 0.0, 1.0]
//! rpy = [0.0, 0.0, 0.0]
//!
//! [logical_camera]
//! near = 0.1
//! far = 5.0
//! horizontal_fov = 1.0472
//! aspect_ratio = 1.0
//! ```

use logicam_middleware::validate_topic;
use logicam_perception::{FrustumParams, Pose3};
use logicam_types::SensorError;
use serde::{Deserialize, Serialize};

/// Type name of the logical camera in the [`SensorRegistry`][crate::SensorRegistry].
pub const LOGICAL_CAMERA_TYPE: &str = "logical_camera";

/// Sensor pose relative to the world, as position + roll/pitch/yaw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseConfig {
    #[serde(default)]
    pub position: [f64; 3],
    /// Roll, pitch, yaw in radians.
    #[serde(default)]
    pub rpy: [f64; 3],
}

impl PoseConfig {
    pub fn to_pose(&self) -> Pose3 {
        Pose3::from_xyz_rpy(self.position, self.rpy)
    }
}

/// The `[logical_camera]` block.  Every field is required; they are optional
/// here only so a missing one is reported as a configuration error naming it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalCameraConfig {
    pub near: Option<f64>,
    pub far: Option<f64>,
    /// Radians.
    pub horizontal_fov: Option<f64>,
    pub aspect_ratio: Option<f64>,
}

impl LogicalCameraConfig {
    pub fn new(near: f64, far: f64, horizontal_fov: f64, aspect_ratio: f64) -> Self {
        Self {
            near: Some(near),
            far: Some(far),
            horizontal_fov: Some(horizontal_fov),
            aspect_ratio: Some(aspect_ratio),
        }
    }

    /// Resolve into validated frustum parameters.
    ///
    /// # Errors
    ///
    /// [`SensorError::Configuration`] if a field is missing or the values
    /// fail [`FrustumParams::validate`].
    pub fn params(&self) -> Result<FrustumParams, SensorError> {
        let params = FrustumParams {
            near: required("near", self.near)?,
            far: required("far", self.far)?,
            horizontal_fov: required("horizontal_fov", self.horizontal_fov)?,
            aspect_ratio: required("aspect_ratio", self.aspect_ratio)?,
        };
        params
            .validate()
            .map_err(|e| SensorError::Configuration(format!("<logical_camera>: {e}")))?;
        Ok(params)
    }
}

fn required(field: &str, value: Option<f64>) -> Result<f64, SensorError> {
    value.ok_or_else(|| {
        SensorError::Configuration(format!("<logical_camera> is missing required '{field}'"))
    })
}

/// Full description of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Unique sensor name; fixed once loaded.
    pub name: String,

    /// Registry type name, e.g. `"logical_camera"`.
    #[serde(rename = "type", default = "default_sensor_type")]
    pub sensor_type: String,

    /// Destination topic.  Defaults to `/<name>/<type>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Ticks per simulated second; `0` ticks on every host step.
    #[serde(default)]
    pub update_rate: f64,

    #[serde(default)]
    pub pose: PoseConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_camera: Option<LogicalCameraConfig>,
}

fn default_sensor_type() -> String {
    LOGICAL_CAMERA_TYPE.to_string()
}

impl SensorConfig {
    /// A logical camera description with default pose, topic and rate.
    pub fn logical_camera(name: impl Into<String>, camera: LogicalCameraConfig) -> Self {
        Self {
            name: name.into(),
            sensor_type: LOGICAL_CAMERA_TYPE.to_string(),
            topic: None,
            update_rate: 0.0,
            pose: PoseConfig::default(),
            logical_camera: Some(camera),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_update_rate(mut self, hz: f64) -> Self {
        self.update_rate = hz;
        self
    }

    pub fn with_pose(mut self, position: [f64; 3], rpy: [f64; 3]) -> Self {
        self.pose = PoseConfig { position, rpy };
        self
    }

    /// The topic reports go to: the explicit one, or `/<name>/<type>`.
    pub fn resolved_topic(&self) -> String {
        self.topic
            .clone()
            .unwrap_or_else(|| format!("/{}/{}", self.name, self.sensor_type))
    }

    /// Check the fields shared by every sensor type.
    ///
    /// # Errors
    ///
    /// [`SensorError::Configuration`] for an empty or whitespace-bearing
    /// name, a negative or non-finite update rate, or a malformed topic.
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.name.is_empty() || self.name.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(SensorError::Configuration(format!(
                "sensor name '{}' must be non-empty without whitespace or '/'",
                self.name
            )));
        }
        if !(self.update_rate.is_finite() && self.update_rate >= 0.0) {
            return Err(SensorError::Configuration(format!(
                "update_rate must be a finite number >= 0, got {}",
                self.update_rate
            )));
        }
        if !self.pose.position.iter().chain(self.pose.rpy.iter()).all(|v| v.is_finite()) {
            return Err(SensorError::Configuration(
                "pose must contain only finite numbers".to_string(),
            ));
        }
        validate_topic(&self.resolved_topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
        name = "front_cam"
        update_rate = 10.0

        [pose]
        position = [1.0, 2.0, 0.5]

        [logical_camera]
        near = 0.1
        far = 5.0
        horizontal_fov = 1.0472
        aspect_ratio = 1.0
    "#;

    #[test]
    fn parses_from_toml_with_defaults() {
        let cfg: SensorConfig = toml::from_str(TOML).unwrap();
        assert_eq!(cfg.name, "front_cam");
        assert_eq!(cfg.sensor_type, LOGICAL_CAMERA_TYPE);
        assert_eq!(cfg.pose.position, [1.0, 2.0, 0.5]);
        assert_eq!(cfg.pose.rpy, [0.0, 0.0, 0.0]);
        assert_eq!(cfg.resolved_topic(), "/front_cam/logical_camera");
        let params = cfg.logical_camera.unwrap().params().unwrap();
        assert_eq!(params.far, 5.0);
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_field_is_configuration_error() {
        let cam = LogicalCameraConfig {
            far: None,
            ..LogicalCameraConfig::new(0.1, 5.0, 1.0, 1.0)
        };
        match cam.params() {
            Err(SensorError::Configuration(msg)) => assert!(msg.contains("far")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn inverted_near_far_is_configuration_error() {
        let cam = LogicalCameraConfig::new(5.0, 1.0, 1.0, 1.0);
        assert!(matches!(cam.params(), Err(SensorError::Configuration(_))));
    }

    #[test]
    fn validate_rejects_bad_common_fields() {
        let cam = LogicalCameraConfig::new(0.1, 5.0, 1.0, 1.0);
        assert!(SensorConfig::logical_camera("", cam).validate().is_err());
        assert!(SensorConfig::logical_camera("a b", cam).validate().is_err());
        assert!(
            SensorConfig::logical_camera("cam", cam)
                .with_update_rate(-1.0)
                .validate()
                .is_err()
        );
        assert!(
            SensorConfig::logical_camera("cam", cam)
                .with_topic("bad topic")
                .validate()
                .is_err()
        );
        assert!(
            SensorConfig::logical_camera("cam", cam)
                .with_pose([f64::NAN, 0.0, 0.0], [0.0; 3])
                .validate()
                .is_err()
        );
        SensorConfig::logical_camera("cam", cam)
            .with_topic("/custom/detections")
            .validate()
            .unwrap();
    }
}

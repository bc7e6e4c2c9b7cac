//! Scenario file – reads/writes the TOML world a `logicam` run simulates.
//!
//! ```toml
//! [simulation]
//! step_size = 0.1
//! steps = 50
//!
//! [[sensors]]
//! name = "front_cam"
//! type = "logical_camera"
//! [sensors.logical_camera]
//! near = 0.1
//! far = 5.0
//! horizontal_fov = 1.0472
//! aspect_ratio = 1.0
//!
//! [[entities]]
//! name = "box1"
//! position = [2.0, 0.0, 0.0]
//! velocity = [0.0, 0.2, 0.0]
//! ```

use std::fs;
use std::path::Path;

use logicam_sensors::{LogicalCameraConfig, SensorConfig};
use serde::{Deserialize, Serialize};

/// `[simulation]` – how the host clock advances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulated seconds per step.
    #[serde(default = "default_step_size")]
    pub step_size: f64,

    /// Number of steps to run.
    #[serde(default = "default_steps")]
    pub steps: u64,

    /// Sleep `step_size` of wall-clock time between steps.
    #[serde(default)]
    pub real_time: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            steps: default_steps(),
            real_time: false,
        }
    }
}

fn default_step_size() -> f64 {
    0.1
}
fn default_steps() -> u64 {
    100
}

/// One `[[entities]]` row: a tracked object moving at constant velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub rpy: [f64; 3],
    /// Metres per simulated second.
    #[serde(default)]
    pub velocity: [f64; 3],
}

/// `[fault_policy]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultPolicyConfig {
    /// Fault a sensor after this many publish failures in a row.  Absent
    /// means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_publish_failures: Option<usize>,
}

/// A complete scenario file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub fault_policy: FaultPolicyConfig,
}

impl ScenarioConfig {
    /// The scenario printed by `logicam --example`: one camera at the origin
    /// and two boxes, one of which drifts across the field of view.
    pub fn example() -> Self {
        Self {
            simulation: SimulationConfig {
                steps: 20,
                ..SimulationConfig::default()
            },
            sensors: vec![
                SensorConfig::logical_camera(
                    "front_cam",
                    LogicalCameraConfig::new(0.1, 5.0, 60f64.to_radians(), 1.0),
                )
                .with_update_rate(5.0),
            ],
            entities: vec![
                EntityConfig {
                    name: "box1".to_string(),
                    position: [2.0, -1.5, 0.0],
                    rpy: [0.0; 3],
                    velocity: [0.0, 1.5, 0.0],
                },
                EntityConfig {
                    name: "box2".to_string(),
                    position: [10.0, 0.0, 0.0],
                    rpy: [0.0; 3],
                    velocity: [0.0; 3],
                },
            ],
            fault_policy: FaultPolicyConfig {
                max_consecutive_publish_failures: Some(10),
            },
        }
    }

    /// Reject scenarios the run loop cannot execute.  Sensor blocks are
    /// checked later, when each sensor loads.
    pub fn validate(&self) -> Result<(), String> {
        let step = self.simulation.step_size;
        if !(step.is_finite() && step > 0.0) {
            return Err(format!("simulation.step_size must be > 0, got {step}"));
        }
        for entity in &self.entities {
            if entity.name.is_empty() {
                return Err("entity names must not be empty".to_string());
            }
            let mut values = entity.position.iter().chain(&entity.rpy).chain(&entity.velocity);
            if !values.all(|v| v.is_finite()) {
                return Err(format!("entity '{}' has non-finite values", entity.name));
            }
        }
        Ok(())
    }
}

/// Load a scenario from `path`, applying environment overrides.
pub fn load_from(path: &Path) -> Result<ScenarioConfig, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read scenario at {}: {}", path.display(), e))?;
    let mut cfg: ScenarioConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse scenario: {}", e))?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Write `cfg` to `path` as pretty TOML.
#[cfg(test)]
pub fn save_to(cfg: &ScenarioConfig, path: &Path) -> Result<(), String> {
    fs::write(path, to_toml(cfg)?)
        .map_err(|e| format!("Failed to write scenario at {}: {}", path.display(), e))
}

pub fn to_toml(cfg: &ScenarioConfig) -> Result<String, String> {
    toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize scenario: {}", e))
}

/// Apply `LOGICAM_*` environment variable overrides to `cfg`.
///
/// | Variable | Scenario field |
/// |---|---|
/// | `LOGICAM_STEPS` | `simulation.steps` |
/// | `LOGICAM_STEP_SIZE` | `simulation.step_size` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut ScenarioConfig) {
    if let Ok(v) = std::env::var("LOGICAM_STEPS")
        && let Ok(steps) = v.parse::<u64>()
    {
        cfg.simulation.steps = steps;
    }
    if let Ok(v) = std::env::var("LOGICAM_STEP_SIZE")
        && let Ok(step) = v.parse::<f64>()
    {
        cfg.simulation.step_size = step;
    }
}

//! `logicam-sensors` – the sensors themselves.
//!
//! # Modules
//!
//! - [`config`] – [`SensorConfig`]: declarative sensor description
//!   (TOML / serde).
//! - [`pose_directory`] – [`PoseDirectory`]: shared entity → world pose map
//!   with isolated snapshots.
//! - [`sensor`] – the [`Sensor`] capability trait and [`SensorCore`], the
//!   bookkeeping every variant embeds.
//! - [`logical_camera`] – [`LogicalCameraSensor`]: frustum-based entity
//!   detection.
//! - [`registry`] – [`SensorRegistry`]: type name → factory.
//! - [`sim`] – in-process report destinations for tests and dry runs.

pub mod config;
pub mod logical_camera;
pub mod pose_directory;
pub mod registry;
pub mod sensor;
pub mod sim;

pub use config::{LOGICAL_CAMERA_TYPE, LogicalCameraConfig, PoseConfig, SensorConfig};
pub use logical_camera::{LogicalCameraSensor, ReportReader};
pub use pose_directory::{PoseDirectory, PoseSnapshot};
pub use registry::{SensorDeps, SensorFactory, SensorRegistry};
pub use sensor::{Sensor, SensorCore, TickOutcome};

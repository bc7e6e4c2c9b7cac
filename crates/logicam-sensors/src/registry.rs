//! [`SensorRegistry`] – sensor type name → constructor.
//!
//! A host describes sensors by type name (`type = "logical_camera"` in a
//! [`SensorConfig`][crate::SensorConfig]).  The registry resolves that name
//! to a factory and builds an unconfigured sensor wired to the host's shared
//! [`SensorDeps`].  Hosts can register their own sensor types next to the
//! built-in ones.
//!
//! # Example
//!
//! ```rust
//! use logicam_middleware::TopicBus;
//! use logicam_sensors::{PoseDirectory, SensorDeps, SensorRegistry};
//!
//! let registry = SensorRegistry::with_builtin();
//! let deps = SensorDeps::new(PoseDirectory::new(), TopicBus::default());
//!
//! let sensor = registry.create("logical_camera", &deps).unwrap();
//! assert_eq!(sensor.sensor_type(), "logical_camera");
//! assert!(registry.create("lidar", &deps).is_err());
//! ```

use std::collections::HashMap;

use logicam_middleware::{BusPublisher, TopicBus};
use logicam_types::SensorError;
use tracing::debug;

use crate::config::LOGICAL_CAMERA_TYPE;
use crate::logical_camera::LogicalCameraSensor;
use crate::pose_directory::PoseDirectory;
use crate::sensor::Sensor;

/// Shared resources handed to every sensor factory.
#[derive(Debug, Clone, Default)]
pub struct SensorDeps {
    pub directory: PoseDirectory,
    pub bus: TopicBus,
}

impl SensorDeps {
    pub fn new(directory: PoseDirectory, bus: TopicBus) -> Self {
        Self { directory, bus }
    }
}

/// Builds one unconfigured sensor.
pub type SensorFactory = Box<dyn Fn(&SensorDeps) -> Box<dyn Sensor> + Send + Sync>;

/// Type-name keyed sensor factories.
#[derive(Default)]
pub struct SensorRegistry {
    factories: HashMap<String, SensorFactory>,
}

impl std::fmt::Debug for SensorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl SensorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that knows the built-in `logical_camera` type.  Its bus
    /// publisher takes the sensor name as event source when the sensor loads.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(LOGICAL_CAMERA_TYPE, |deps: &SensorDeps| {
            Box::new(LogicalCameraSensor::new(
                deps.directory.clone(),
                Box::new(BusPublisher::new(deps.bus.clone(), LOGICAL_CAMERA_TYPE)),
            )) as Box<dyn Sensor>
        });
        registry
    }

    /// Register a factory under `type_name`.  Any previous factory with the
    /// same name is replaced.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&SensorDeps) -> Box<dyn Sensor> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        debug!(sensor_type = %type_name, "sensor type registered");
        self.factories.insert(type_name, Box::new(factory));
    }

    /// Build an unconfigured sensor of `type_name`.
    ///
    /// # Errors
    ///
    /// [`SensorError::UnknownSensorType`] when nothing is registered under
    /// that name.
    pub fn create(
        &self,
        type_name: &str,
        deps: &SensorDeps,
    ) -> Result<Box<dyn Sensor>, SensorError> {
        self.factories
            .get(type_name)
            .map(|factory| factory(deps))
            .ok_or_else(|| SensorError::UnknownSensorType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn clear(&mut self) {
        self.factories.clear();
    }
}

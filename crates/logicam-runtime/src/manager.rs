//! [`SensorManager`] – the host-side tick driver.
//!
//! Owns everything a simulation host shares between its sensors: the
//! [`SensorRegistry`], the [`PoseDirectory`] fed by the world, the
//! [`TopicBus`] reports travel on, and the host's [`FaultPolicy`].  Each
//! host step calls [`SensorManager::run_once`], which ticks every due sensor
//! serially and returns what happened.
//!
//! # Fault handling
//!
//! A failed hand-off never fails a tick.  The manager counts consecutive
//! failed hand-offs per sensor and faults the sensor once the policy
//! threshold is reached.  Every fault, whether raised by the policy or by a
//! sensor whose destination closed, is announced as an
//! [`EventPayload::SensorFault`] on [`FAULT_TOPIC`].
//!
//! # Example
//!
//! ```rust
//! use logicam_perception::Pose3;
//! use logicam_runtime::SensorManager;
//! use logicam_sensors::{LogicalCameraConfig, SensorConfig};
//! use logicam_types::SimTime;
//!
//! let mut manager = SensorManager::new();
//! manager
//!     .create_sensor(&SensorConfig::logical_camera(
//!         "cam",
//!         LogicalCameraConfig::new(0.1, 5.0, 1.0, 1.0),
//!     ))
//!     .unwrap();
//! manager
//!     .directory()
//!     .replace([("box1", Pose3::from_xyz_rpy([2.0, 0.0, 0.0], [0.0; 3]))]);
//!
//! let ticks = manager.run_once(SimTime::new(1, 0), false);
//! assert_eq!(ticks.len(), 1);
//! assert_eq!(ticks[0].result.as_ref().unwrap().detections, 1);
//! ```

use std::collections::BTreeMap;

use logicam_kernel::FaultPolicy;
use logicam_middleware::TopicBus;
use logicam_perception::Pose3;
use logicam_sensors::{PoseDirectory, Sensor, SensorConfig, SensorDeps, SensorRegistry, TickOutcome};
use logicam_types::{Event, EventPayload, LifecycleState, SensorError, SimTime};
use tracing::{debug, info, warn};

/// Topic on which sensor faults are announced.
pub const FAULT_TOPIC: &str = "/logicam/faults";

/// Source stamped on manager-originated events.
const MANAGER_SOURCE: &str = "sensor_manager";

/// What one sensor did during [`SensorManager::run_once`].
#[derive(Debug, Clone, PartialEq)]
pub struct SensorTick {
    pub sensor: String,
    pub result: Result<TickOutcome, SensorError>,
}

/// Host tick driver.  See the module docs.
pub struct SensorManager {
    registry: SensorRegistry,
    deps: SensorDeps,
    sensors: BTreeMap<String, Box<dyn Sensor>>,
    fault_policy: FaultPolicy,
}

impl Default for SensorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorManager {
    /// A manager with the built-in sensor types, a fresh directory and bus,
    /// and faulting on repeated failures disabled.
    pub fn new() -> Self {
        Self::with_parts(
            SensorRegistry::with_builtin(),
            SensorDeps::default(),
            FaultPolicy::new(None),
        )
    }

    pub fn with_parts(
        registry: SensorRegistry,
        deps: SensorDeps,
        fault_policy: FaultPolicy,
    ) -> Self {
        if let Err(e) = deps.bus.advertise(FAULT_TOPIC) {
            warn!(error = %e, "fault announcements disabled");
        }
        Self {
            registry,
            deps,
            sensors: BTreeMap::new(),
            fault_policy,
        }
    }

    /// Replace the fault policy.  Existing failure streaks are discarded.
    pub fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    pub fn directory(&self) -> &PoseDirectory {
        &self.deps.directory
    }

    pub fn bus(&self) -> &TopicBus {
        &self.deps.bus
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SensorRegistry {
        &mut self.registry
    }

    pub fn fault_policy(&self) -> &FaultPolicy {
        &self.fault_policy
    }

    /// Build, load and initialise a sensor from `config`.
    ///
    /// # Errors
    ///
    /// - [`SensorError::Configuration`] for a duplicate name or a config the
    ///   sensor rejects.
    /// - [`SensorError::UnknownSensorType`] when `config.sensor_type` is not
    ///   registered.
    /// - [`SensorError::DestinationUnavailable`] when the topic cannot be
    ///   advertised.
    pub fn create_sensor(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        if self.sensors.contains_key(&config.name) {
            return Err(SensorError::Configuration(format!(
                "a sensor named '{}' already exists",
                config.name
            )));
        }
        let mut sensor = self.registry.create(&config.sensor_type, &self.deps)?;
        sensor.load(config)?;
        sensor.init()?;
        info!(
            sensor = %config.name,
            sensor_type = %config.sensor_type,
            topic = sensor.topic().unwrap_or_default(),
            "sensor created"
        );
        self.sensors.insert(config.name.clone(), sensor);
        Ok(())
    }

    /// Tear down `name`, withdrawing its topic.
    pub fn remove_sensor(&mut self, name: &str) -> Option<Box<dyn Sensor>> {
        let mut sensor = self.sensors.remove(name)?;
        sensor.shutdown();
        self.fault_policy.reset(name);
        info!(sensor = %name, "sensor removed");
        Some(sensor)
    }

    pub fn sensor(&self, name: &str) -> Option<&dyn Sensor> {
        self.sensors.get(name).map(|s| s.as_ref())
    }

    pub fn sensor_mut(&mut self, name: &str) -> Option<&mut (dyn Sensor + 'static)> {
        self.sensors.get_mut(name).map(|s| s.as_mut())
    }

    /// Sensor names in ascending order.
    pub fn sensor_names(&self) -> Vec<&str> {
        self.sensors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Move a sensor (its mount point in the world).
    ///
    /// # Errors
    ///
    /// [`SensorError::InvalidParameter`] for an unknown name or a pose with
    /// non-finite components.
    pub fn set_sensor_pose(&mut self, name: &str, pose: Pose3) -> Result<(), SensorError> {
        if !(pose.position.is_finite() && pose.orientation.norm().is_finite()) {
            return Err(SensorError::InvalidParameter(format!(
                "pose for sensor '{name}' must be finite"
            )));
        }
        self.sensors
            .get_mut(name)
            .ok_or_else(|| unknown_sensor(name))?
            .set_pose(pose);
        Ok(())
    }

    /// Tick every sensor due at `now` (all runnable sensors if `force`),
    /// in name order.  Faulted sensors are skipped.
    pub fn run_once(&mut self, now: SimTime, force: bool) -> Vec<SensorTick> {
        let mut ticks = Vec::new();
        let mut faults = Vec::new();

        for (name, sensor) in self.sensors.iter_mut() {
            if sensor.state() == LifecycleState::Faulted || !(force || sensor.is_due(now)) {
                continue;
            }
            let result = sensor.run_tick(now);
            match &result {
                Ok(outcome) if outcome.published() => self.fault_policy.record_success(name),
                Ok(_) if sensor.state() == LifecycleState::Faulted => {
                    self.fault_policy.reset(name);
                    faults.push((name.clone(), "report destination closed".to_string()));
                }
                Ok(_) => {
                    if self.fault_policy.record_failure(name) {
                        let streak = self.fault_policy.consecutive_failures(name);
                        let reason = format!("{streak} consecutive publish failures");
                        sensor.fault(&reason);
                        self.fault_policy.reset(name);
                        faults.push((name.clone(), reason));
                    }
                }
                Err(e) => warn!(sensor = %name, error = %e, "tick failed"),
            }
            ticks.push(SensorTick {
                sensor: name.clone(),
                result,
            });
        }

        for (sensor, message) in faults {
            self.announce_fault(sensor, message);
        }
        ticks
    }

    /// Bring a faulted sensor back (see
    /// [`Lifecycle::recover`][logicam_kernel::Lifecycle::recover]).
    pub fn recover_sensor(&mut self, name: &str) -> Result<LifecycleState, SensorError> {
        let sensor = self.sensors.get_mut(name).ok_or_else(|| unknown_sensor(name))?;
        sensor.recover();
        self.fault_policy.reset(name);
        Ok(sensor.state())
    }

    /// Host world reset: every sensor forgets its time history.
    pub fn reset_all(&mut self) {
        for sensor in self.sensors.values_mut() {
            sensor.reset();
        }
        debug!(sensors = self.sensors.len(), "sensors reset");
    }

    /// Remove every sensor and forget every registered type.
    pub fn shutdown(&mut self) {
        let names: Vec<String> = self.sensors.keys().cloned().collect();
        for name in names {
            self.remove_sensor(&name);
        }
        self.deps.bus.unadvertise(FAULT_TOPIC);
        self.registry.clear();
        info!("sensor manager shut down");
    }

    fn announce_fault(&self, sensor: String, message: String) {
        warn!(sensor = %sensor, reason = %message, "sensor faulted");
        let event = Event::new(MANAGER_SOURCE, EventPayload::SensorFault { sensor, message });
        if let Err(e) = self.deps.bus.publish(FAULT_TOPIC, event) {
            debug!(error = %e, "fault announcement not delivered");
        }
    }
}

fn unknown_sensor(name: &str) -> SensorError {
    SensorError::InvalidParameter(format!("no sensor named '{name}'"))
}

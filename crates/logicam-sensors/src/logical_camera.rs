//! [`LogicalCameraSensor`] – frustum-based logical detection.
//!
//! A logical camera renders nothing.  Each tick it places its view frustum at
//! its current world pose, takes a snapshot of the [`PoseDirectory`], keeps
//! every entity whose position lies inside the frustum, expresses those
//! entities' poses in the camera frame and publishes the resulting
//! [`DetectionReport`].
//!
//! # Tick guarantees
//!
//! - The sensor pose is read once per tick; the frustum test and every
//!   relative pose use that single value.
//! - The directory snapshot is isolated, so pose-feed updates arriving
//!   mid-tick are seen on the next tick.
//! - Detections are sorted by entity identifier.
//! - A tick either fails before building anything or produces a report; a
//!   failed hand-off is reported in [`TickOutcome::publish_error`] and does
//!   not fail the tick.
//!
//! # Example
//!
//! ```rust
//! use logicam_middleware::{BusPublisher, TopicBus};
//! use logicam_perception::Pose3;
//! use logicam_sensors::{
//!     LogicalCameraConfig, LogicalCameraSensor, PoseDirectory, Sensor, SensorConfig,
//! };
//! use logicam_types::SimTime;
//!
//! let directory = PoseDirectory::new();
//! directory.replace([("box1", Pose3::from_xyz_rpy([2.0, 0.0, 0.0], [0.0; 3]))]);
//!
//! let bus = TopicBus::default();
//! let mut cam = LogicalCameraSensor::new(
//!     directory,
//!     Box::new(BusPublisher::new(bus, "example")),
//! );
//! cam.load(&SensorConfig::logical_camera(
//!     "cam",
//!     LogicalCameraConfig::new(0.1, 5.0, 60f64.to_radians(), 1.0),
//! ))
//! .unwrap();
//! cam.init().unwrap();
//!
//! let outcome = cam.run_tick(SimTime::new(1, 0)).unwrap();
//! assert_eq!(outcome.detections, 1);
//! ```

use std::any::Any;
use std::sync::Arc;

use logicam_middleware::ReportPublisher;
use logicam_perception::{Frustum, FrustumParams, Pose3};
use logicam_types::{DetectionMsg, DetectionReport, LifecycleState, SensorError, SimTime};
use parking_lot::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::{LOGICAL_CAMERA_TYPE, SensorConfig};
use crate::pose_directory::PoseDirectory;
use crate::sensor::{Sensor, SensorCore, TickOutcome};

/// Cloneable, thread-safe read handle to a camera's most recent report.
#[derive(Debug, Clone, Default)]
pub struct ReportReader {
    slot: Arc<RwLock<Option<DetectionReport>>>,
}

impl ReportReader {
    /// Copy of the last built report, or `None` before the first tick.
    pub fn latest(&self) -> Option<DetectionReport> {
        self.slot.read().clone()
    }

    fn store(&self, report: DetectionReport) {
        *self.slot.write() = Some(report);
    }
}

/// Logical camera: reports which tracked entities lie inside its frustum.
pub struct LogicalCameraSensor {
    core: SensorCore,
    frustum: Frustum,
    directory: PoseDirectory,
    publisher: Box<dyn ReportPublisher>,
    last_report: ReportReader,
}

impl LogicalCameraSensor {
    /// Build an unconfigured camera reading `directory` and publishing
    /// through `publisher`.
    pub fn new(directory: PoseDirectory, publisher: Box<dyn ReportPublisher>) -> Self {
        Self {
            core: SensorCore::new(),
            frustum: Frustum::default(),
            directory,
            publisher,
            last_report: ReportReader::default(),
        }
    }

    pub fn near(&self) -> f64 {
        self.frustum.near()
    }

    pub fn far(&self) -> f64 {
        self.frustum.far()
    }

    /// Horizontal field of view in radians.
    pub fn horizontal_fov(&self) -> f64 {
        self.frustum.fov()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.frustum.aspect_ratio()
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Reshape the frustum after load.
    ///
    /// # Errors
    ///
    /// [`SensorError::InvalidParameter`]; the previous shape is kept.
    pub fn set_frustum_params(&mut self, params: FrustumParams) -> Result<(), SensorError> {
        self.frustum.configure(params)
    }

    /// Copy of the last built report.
    pub fn last_report(&self) -> Option<DetectionReport> {
        self.last_report.latest()
    }

    /// A handle other threads can use to read the last report.
    pub fn report_reader(&self) -> ReportReader {
        self.last_report.clone()
    }

    pub fn directory(&self) -> &PoseDirectory {
        &self.directory
    }

    pub fn publisher_available(&self) -> bool {
        self.publisher.is_available()
    }

    /// Filter and transform one directory snapshot against the frustum,
    /// which must already sit at `sensor_pose`.
    fn detect(&self, sensor_pose: &Pose3) -> Vec<DetectionMsg> {
        self.directory
            .snapshot()
            .iter()
            .filter(|(_, pose)| self.frustum.contains(pose.position))
            .map(|(id, pose)| DetectionMsg {
                id: id.to_string(),
                relative_pose: pose.relative_to(sensor_pose).into(),
            })
            .collect()
    }
}

impl Sensor for LogicalCameraSensor {
    fn sensor_type(&self) -> &'static str {
        LOGICAL_CAMERA_TYPE
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn topic(&self) -> Option<&str> {
        self.core.topic()
    }

    fn state(&self) -> LifecycleState {
        self.core.lifecycle().state()
    }

    fn load(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        self.core.lifecycle().check_can_load()?;

        let Some(camera) = config.logical_camera.as_ref() else {
            error!(sensor = %config.name, "<logical_camera> block not found");
            return Err(SensorError::Configuration(format!(
                "sensor '{}' has no <logical_camera> block",
                config.name
            )));
        };
        let params = camera.params().inspect_err(|e| {
            error!(sensor = %config.name, error = %e, "rejected logical camera parameters");
        })?;
        config.validate()?;

        let topic = config.resolved_topic();
        self.publisher.set_source(&config.name);
        self.publisher.advertise(&topic)?;

        self.frustum.configure(params)?;
        self.core.apply(config, topic)?;
        info!(
            sensor = %config.name,
            topic = self.core.topic().unwrap_or_default(),
            near = params.near,
            far = params.far,
            hfov = params.horizontal_fov,
            aspect = params.aspect_ratio,
            "logical camera loaded"
        );
        Ok(())
    }

    fn init(&mut self) -> Result<(), SensorError> {
        self.core.lifecycle_mut().init()
    }

    #[instrument(skip(self), fields(sensor = %self.core.name()))]
    fn run_tick(&mut self, now: SimTime) -> Result<TickOutcome, SensorError> {
        self.core.check_tick(now)?;

        let sensor_pose = self.core.pose();
        self.frustum.set_pose(sensor_pose);

        let report = DetectionReport {
            timestamp: now,
            sensor_pose: sensor_pose.into(),
            detections: self.detect(&sensor_pose),
        };
        let detections = report.detections.len();

        self.last_report.store(report.clone());
        self.core.tick_completed(now);

        let publish_error = self.publisher.publish(&report).err();
        if let Some(e) = &publish_error {
            warn!(error = %e, "detections not delivered");
            if self.publisher.is_closed() {
                self.core.lifecycle_mut().fault("report destination closed");
            }
        }

        Ok(TickOutcome {
            timestamp: now,
            detections,
            publish_error,
        })
    }

    fn pose(&self) -> Pose3 {
        self.core.pose()
    }

    fn set_pose(&mut self, pose: Pose3) {
        self.core.set_pose(pose);
    }

    fn update_rate(&self) -> f64 {
        self.core.update_rate()
    }

    fn next_update_time(&self) -> SimTime {
        self.core.next_update_time()
    }

    fn fault(&mut self, reason: &str) {
        self.core.lifecycle_mut().fault(reason);
    }

    fn recover(&mut self) {
        self.core.lifecycle_mut().recover();
    }

    fn reset(&mut self) {
        self.core.reset();
    }

    fn shutdown(&mut self) {
        self.publisher.withdraw();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogicalCameraConfig;
    use crate::sim::{FailingPublisher, RecordingPublisher};
    use logicam_middleware::{BusPublisher, TopicBus};
    use logicam_perception::{Quaternion, Vec3};
    use logicam_types::EventPayload;
    use std::f64::consts::FRAC_PI_2;

    fn scenario_config() -> SensorConfig {
        SensorConfig::logical_camera(
            "cam",
            LogicalCameraConfig::new(0.1, 5.0, 60f64.to_radians(), 1.0),
        )
    }

    fn entity(x: f64, y: f64, z: f64) -> Pose3 {
        Pose3::new(Vec3::new(x, y, z), Quaternion::identity())
    }

    fn ready_camera(directory: PoseDirectory) -> (LogicalCameraSensor, RecordingPublisher) {
        let publisher = RecordingPublisher::new();
        let mut cam = LogicalCameraSensor::new(directory, Box::new(publisher.clone()));
        cam.load(&scenario_config()).unwrap();
        cam.init().unwrap();
        (cam, publisher)
    }

    #[test]
    fn reference_scenario_detects_box1_only() {
        let directory = PoseDirectory::new();
        directory.replace([("box1", entity(2.0, 0.0, 0.0)), ("box2", entity(10.0, 0.0, 0.0))]);
        let (mut cam, publisher) = ready_camera(directory);

        let outcome = cam.run_tick(SimTime::new(1, 0)).unwrap();
        assert_eq!(outcome.detections, 1);
        assert!(outcome.published());

        let report = cam.last_report().unwrap();
        assert_eq!(report.ids().collect::<Vec<_>>(), vec!["box1"]);
        let rel = Pose3::from(report.detections[0].relative_pose);
        assert!((rel.position.x - 2.0).abs() < 1e-9);
        assert!(rel.position.y.abs() < 1e-9);
        assert!((rel.orientation.w - 1.0).abs() < 1e-9);
        assert_eq!(publisher.reports(), vec![report]);
    }

    #[test]
    fn empty_directory_yields_empty_report() {
        let (mut cam, publisher) = ready_camera(PoseDirectory::new());
        let outcome = cam.run_tick(SimTime::new(0, 5)).unwrap();
        assert_eq!(outcome.detections, 0);
        let report = cam.last_report().unwrap();
        assert!(report.detections.is_empty());
        assert_eq!(report.timestamp, SimTime::new(0, 5));
        assert_eq!(publisher.len(), 1);
    }

    #[test]
    fn inverted_near_far_load_fails_and_stays_unconfigured() {
        let publisher = RecordingPublisher::new();
        let mut cam = LogicalCameraSensor::new(PoseDirectory::new(), Box::new(publisher.clone()));
        let config =
            SensorConfig::logical_camera("cam", LogicalCameraConfig::new(5.0, 1.0, 1.0, 1.0));

        assert!(matches!(cam.load(&config), Err(SensorError::Configuration(_))));
        assert_eq!(cam.state(), LifecycleState::Unconfigured);
        assert!(publisher.topic_name().is_none(), "no destination established");
        // Prior frustum configuration is retained.
        assert_eq!(cam.near(), FrustumParams::default().near);
        assert_eq!(cam.far(), FrustumParams::default().far);
    }

    #[test]
    fn missing_camera_block_is_configuration_error() {
        let mut cam =
            LogicalCameraSensor::new(PoseDirectory::new(), Box::new(RecordingPublisher::new()));
        let mut config = scenario_config();
        config.logical_camera = None;
        assert!(matches!(cam.load(&config), Err(SensorError::Configuration(_))));
        assert_eq!(cam.state(), LifecycleState::Unconfigured);
    }

    #[test]
    fn tick_while_unconfigured_fails_without_report() {
        let publisher = RecordingPublisher::new();
        let mut cam = LogicalCameraSensor::new(PoseDirectory::new(), Box::new(publisher.clone()));
        let err = cam.run_tick(SimTime::new(1, 0)).unwrap_err();
        assert!(matches!(
            err,
            SensorError::NotInitialized {
                state: LifecycleState::Unconfigured,
                ..
            }
        ));
        assert!(cam.last_report().is_none());
        assert!(publisher.is_empty());
    }

    #[test]
    fn tick_while_loaded_but_not_initialized_fails() {
        let mut cam =
            LogicalCameraSensor::new(PoseDirectory::new(), Box::new(RecordingPublisher::new()));
        cam.load(&scenario_config()).unwrap();
        assert!(matches!(
            cam.run_tick(SimTime::new(1, 0)),
            Err(SensorError::NotInitialized { .. })
        ));
        assert_eq!(cam.state(), LifecycleState::Loaded);
    }

    #[test]
    fn first_tick_activates() {
        let (mut cam, _) = ready_camera(PoseDirectory::new());
        assert_eq!(cam.state(), LifecycleState::Initialized);
        cam.run_tick(SimTime::ZERO).unwrap();
        assert_eq!(cam.state(), LifecycleState::Active);
    }

    #[test]
    fn accessors_expose_loaded_frustum() {
        let (cam, _) = ready_camera(PoseDirectory::new());
        assert_eq!(cam.near(), 0.1);
        assert_eq!(cam.far(), 5.0);
        assert!((cam.horizontal_fov() - 60f64.to_radians()).abs() < 1e-12);
        assert_eq!(cam.aspect_ratio(), 1.0);
        assert_eq!(cam.name(), "cam");
        assert_eq!(cam.topic(), Some("/cam/logical_camera"));
    }

    #[test]
    fn second_load_is_rejected() {
        let (mut cam, _) = ready_camera(PoseDirectory::new());
        let other =
            SensorConfig::logical_camera("other", LogicalCameraConfig::new(1.0, 2.0, 1.0, 1.0));
        assert!(matches!(cam.load(&other), Err(SensorError::Configuration(_))));
        assert_eq!(cam.name(), "cam");
        assert_eq!(cam.far(), 5.0);
    }

    #[test]
    fn repeated_ticks_over_unchanged_snapshot_are_identical() {
        let directory = PoseDirectory::new();
        directory.replace([
            ("c", entity(3.0, 0.5, 0.0)),
            ("a", entity(1.0, -0.2, 0.1)),
            ("b", entity(4.0, 0.0, -0.3)),
        ]);
        let (mut cam, _) = ready_camera(directory);
        cam.set_pose(Pose3::from_xyz_rpy([0.0, 0.0, 0.0], [0.0, 0.05, 0.02]));

        cam.run_tick(SimTime::new(1, 0)).unwrap();
        let first = cam.last_report().unwrap();
        cam.run_tick(SimTime::new(2, 0)).unwrap();
        let second = cam.last_report().unwrap();

        assert_eq!(first.detections, second.detections);
        assert_ne!(first.timestamp, second.timestamp);
        assert_eq!(first.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn relative_pose_composes_back_to_world_pose() {
        let directory = PoseDirectory::new();
        let world = Pose3::from_xyz_rpy([1.0, 3.0, 0.2], [0.1, 0.0, 0.4]);
        directory.replace([("target", world)]);
        let (mut cam, _) = ready_camera(directory);
        let sensor = Pose3::from_xyz_rpy([1.0, 1.0, 0.0], [0.0, 0.0, FRAC_PI_2]);
        cam.set_pose(sensor);

        cam.run_tick(SimTime::new(1, 0)).unwrap();
        let report = cam.last_report().unwrap();
        let rel = Pose3::from(report.find("target").expect("target detected").relative_pose);
        let back = Pose3::from(report.sensor_pose).compose(rel);
        assert!((back.position.x - world.position.x).abs() < 1e-9);
        assert!((back.position.y - world.position.y).abs() < 1e-9);
        assert!((back.position.z - world.position.z).abs() < 1e-9);
        let q = back.orientation;
        let w = world.orientation;
        let dot = (q.w * w.w + q.x * w.x + q.y * w.y + q.z * w.z).abs();
        assert!((dot - 1.0).abs() < 1e-9);
    }

    #[test]
    fn frustum_follows_sensor_pose() {
        let directory = PoseDirectory::new();
        directory.replace([("ahead", entity(2.0, 0.0, 0.0)), ("left", entity(0.0, 2.0, 0.0))]);
        let (mut cam, _) = ready_camera(directory);

        cam.run_tick(SimTime::new(1, 0)).unwrap();
        assert_eq!(cam.last_report().unwrap().ids().collect::<Vec<_>>(), vec!["ahead"]);

        cam.set_pose(Pose3::from_xyz_rpy([0.0; 3], [0.0, 0.0, FRAC_PI_2]));
        cam.run_tick(SimTime::new(2, 0)).unwrap();
        assert_eq!(cam.last_report().unwrap().ids().collect::<Vec<_>>(), vec!["left"]);
    }

    #[test]
    fn near_and_far_boundaries_are_deterministic() {
        let directory = PoseDirectory::new();
        directory.replace([("at_near", entity(0.1, 0.0, 0.0)), ("at_far", entity(5.0, 0.0, 0.0))]);
        let (mut cam, _) = ready_camera(directory);
        for sec in 0..3 {
            cam.run_tick(SimTime::new(sec, 0)).unwrap();
            let report = cam.last_report().unwrap();
            assert_eq!(report.ids().collect::<Vec<_>>(), vec!["at_near"]);
        }
    }

    #[test]
    fn publish_failure_is_a_warning_not_a_failure() {
        let mut cam = LogicalCameraSensor::new(
            PoseDirectory::new(),
            Box::new(FailingPublisher::transient()),
        );
        cam.load(&scenario_config()).unwrap();
        cam.init().unwrap();

        let outcome = cam.run_tick(SimTime::new(1, 0)).unwrap();
        assert!(matches!(
            outcome.publish_error,
            Some(SensorError::DestinationUnavailable { .. })
        ));
        assert!(cam.last_report().is_some());
        assert_eq!(cam.state(), LifecycleState::Active);

        // Next tick tries again independently.
        assert!(cam.run_tick(SimTime::new(2, 0)).is_ok());
    }

    #[test]
    fn closed_destination_faults_sensor() {
        let bus = TopicBus::default();
        let mut cam = LogicalCameraSensor::new(
            PoseDirectory::new(),
            Box::new(BusPublisher::new(bus.clone(), "cam")),
        );
        cam.load(&scenario_config()).unwrap();
        cam.init().unwrap();
        cam.run_tick(SimTime::new(1, 0)).unwrap();

        bus.shutdown();
        let outcome = cam.run_tick(SimTime::new(2, 0)).unwrap();
        assert!(!outcome.published());
        assert_eq!(cam.state(), LifecycleState::Faulted);
        assert!(matches!(
            cam.run_tick(SimTime::new(3, 0)),
            Err(SensorError::NotInitialized { .. })
        ));
    }

    #[test]
    fn advertise_failure_fails_load() {
        let mut cam =
            LogicalCameraSensor::new(PoseDirectory::new(), Box::new(FailingPublisher::closed()));
        assert!(matches!(
            cam.load(&scenario_config()),
            Err(SensorError::DestinationUnavailable { .. })
        ));
        assert_eq!(cam.state(), LifecycleState::Unconfigured);
    }

    #[test]
    fn reports_reach_bus_subscribers() {
        let bus = TopicBus::default();
        let mut rx = bus.subscribe("/cam/logical_camera");
        let directory = PoseDirectory::new();
        directory.replace([("box1", entity(2.0, 0.0, 0.0))]);
        let publisher = BusPublisher::new(bus, LOGICAL_CAMERA_TYPE);
        let mut cam = LogicalCameraSensor::new(directory, Box::new(publisher));
        cam.load(&scenario_config()).unwrap();
        cam.init().unwrap();
        cam.run_tick(SimTime::new(1, 0)).unwrap();

        let event = rx.try_recv().expect("report on bus");
        assert_eq!(event.source, "cam");
        match event.payload {
            EventPayload::Detections(report) => assert!(report.find("box1").is_some()),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn time_regression_is_rejected() {
        let (mut cam, publisher) = ready_camera(PoseDirectory::new());
        cam.run_tick(SimTime::new(5, 0)).unwrap();
        assert!(matches!(
            cam.run_tick(SimTime::new(4, 0)),
            Err(SensorError::InvalidParameter(_))
        ));
        assert_eq!(publisher.len(), 1);
        cam.reset();
        cam.run_tick(SimTime::new(4, 0)).unwrap();
        assert_eq!(publisher.len(), 2);
    }

    #[test]
    fn report_reader_sees_updates_from_another_thread() {
        let directory = PoseDirectory::new();
        directory.replace([("box1", entity(2.0, 0.0, 0.0))]);
        let (mut cam, _) = ready_camera(directory);
        let reader = cam.report_reader();
        assert!(reader.latest().is_none());

        cam.run_tick(SimTime::new(1, 0)).unwrap();
        let handle = std::thread::spawn(move || reader.latest());
        let seen = handle.join().unwrap().expect("report visible");
        assert_eq!(seen.timestamp, SimTime::new(1, 0));
    }

    #[test]
    fn set_frustum_params_keeps_previous_on_error() {
        let (mut cam, _) = ready_camera(PoseDirectory::new());
        let bad = FrustumParams {
            near: 3.0,
            far: 2.0,
            ..cam.frustum().params()
        };
        assert!(matches!(
            cam.set_frustum_params(bad),
            Err(SensorError::InvalidParameter(_))
        ));
        assert_eq!(cam.far(), 5.0);
    }
}

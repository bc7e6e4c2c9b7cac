//! The common [`Sensor`] capability set and the shared [`SensorCore`] state.
//!
//! Every sensor variant implements [`Sensor`] so the host can drive it
//! without knowing what it measures.  Variants embed a [`SensorCore`] for
//! the bookkeeping every sensor needs: identity, topic, world pose, update
//! schedule and lifecycle.

use std::any::Any;

use logicam_kernel::Lifecycle;
use logicam_perception::Pose3;
use logicam_types::{LifecycleState, SensorError, SimTime};

use crate::config::SensorConfig;

/// Result of one successful [`Sensor::run_tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub timestamp: SimTime,
    /// Number of entities placed in the report.
    pub detections: usize,
    /// Set when the report was built but could not be handed off.  The tick
    /// itself still counts as a successful detection.
    pub publish_error: Option<SensorError>,
}

impl TickOutcome {
    pub fn published(&self) -> bool {
        self.publish_error.is_none()
    }
}

/// Capability set shared by every sensor variant.
///
/// Implementations are driven serially by one host thread; accessors that
/// other threads need (such as the last report) are exposed through
/// separately shareable handles.
pub trait Sensor: Send + Sync {
    /// Registry type name, e.g. `"logical_camera"`.
    fn sensor_type(&self) -> &'static str;

    /// Name fixed at load time; empty before.
    fn name(&self) -> &str;

    /// Destination topic, once loaded.
    fn topic(&self) -> Option<&str>;

    fn state(&self) -> LifecycleState;

    /// Apply `config`.  On failure the sensor stays `Unconfigured` and keeps
    /// its previous settings.
    fn load(&mut self, config: &SensorConfig) -> Result<(), SensorError>;

    fn init(&mut self) -> Result<(), SensorError>;

    /// Produce and publish one measurement for simulation time `now`.
    fn run_tick(&mut self, now: SimTime) -> Result<TickOutcome, SensorError>;

    /// Current world pose.
    fn pose(&self) -> Pose3;

    fn set_pose(&mut self, pose: Pose3);

    /// Ticks per simulated second; `0` means every host step.
    fn update_rate(&self) -> f64;

    fn next_update_time(&self) -> SimTime;

    /// Whether the update schedule asks for a tick at `now`.
    fn is_due(&self, now: SimTime) -> bool {
        now >= self.next_update_time()
    }

    /// Take the sensor out of service.
    fn fault(&mut self, reason: &str);

    /// Leave `Faulted` (see [`Lifecycle::recover`]).
    fn recover(&mut self);

    /// Forget time history after a host world reset.
    fn reset(&mut self);

    /// Release the destination.  The sensor cannot publish afterwards.
    fn shutdown(&mut self) {}

    fn as_any(&self) -> &dyn Any;
}

// ─────────────────────────────────────────────────────────────────────────────
// SensorCore
// ─────────────────────────────────────────────────────────────────────────────

/// Bookkeeping shared by all sensor variants.
#[derive(Debug, Clone, Default)]
pub struct SensorCore {
    topic: Option<String>,
    update_rate: f64,
    pose: Pose3,
    next_update: SimTime,
    last_tick: Option<SimTime>,
    lifecycle: Lifecycle,
}

impl SensorCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the common parts of an already validated `config`.
    pub fn apply(&mut self, config: &SensorConfig, topic: String) -> Result<(), SensorError> {
        self.lifecycle.loaded(&config.name)?;
        self.topic = Some(topic);
        self.update_rate = config.update_rate;
        self.set_pose(config.pose.to_pose());
        self.next_update = SimTime::ZERO;
        self.last_tick = None;
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.lifecycle.sensor()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn update_rate(&self) -> f64 {
        self.update_rate
    }

    pub fn pose(&self) -> Pose3 {
        self.pose
    }

    /// Store `pose` with its orientation normalised.
    pub fn set_pose(&mut self, pose: Pose3) {
        self.pose = Pose3::new(pose.position, pose.orientation.normalized());
    }

    pub fn next_update_time(&self) -> SimTime {
        self.next_update
    }

    pub fn last_tick(&self) -> Option<SimTime> {
        self.last_tick
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    /// Preconditions for a tick at `now`: runnable lifecycle state and a
    /// timestamp no earlier than the previous tick.
    pub fn check_tick(&self, now: SimTime) -> Result<(), SensorError> {
        self.lifecycle.check_can_tick()?;
        match self.last_tick {
            Some(last) if now < last => Err(SensorError::InvalidParameter(format!(
                "tick time {now} is earlier than previous tick {last}"
            ))),
            _ => Ok(()),
        }
    }

    /// Record a completed tick and schedule the next one.
    pub fn tick_completed(&mut self, now: SimTime) {
        self.last_tick = Some(now);
        self.next_update = if self.update_rate > 0.0 {
            now.add_secs_f64(1.0 / self.update_rate)
        } else {
            now
        };
        self.lifecycle.tick_succeeded();
    }

    pub fn reset(&mut self) {
        self.last_tick = None;
        self.next_update = SimTime::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogicalCameraConfig;

    fn loaded_core(rate: f64) -> SensorCore {
        let cfg = SensorConfig::logical_camera("cam", LogicalCameraConfig::new(0.1, 5.0, 1.0, 1.0))
            .with_update_rate(rate);
        let mut core = SensorCore::new();
        core.apply(&cfg, cfg.resolved_topic()).unwrap();
        core.lifecycle_mut().init().unwrap();
        core
    }

    #[test]
    fn apply_sets_identity_and_topic() {
        let core = loaded_core(0.0);
        assert_eq!(core.name(), "cam");
        assert_eq!(core.topic(), Some("/cam/logical_camera"));
    }

    #[test]
    fn schedule_follows_update_rate() {
        let mut core = loaded_core(4.0);
        core.tick_completed(SimTime::new(1, 0));
        assert_eq!(core.next_update_time(), SimTime::new(1, 250_000_000));
        assert_eq!(core.lifecycle().state(), LifecycleState::Active);
    }

    #[test]
    fn tiny_update_rate_saturates_the_schedule() {
        let mut core = loaded_core(1e-30);
        core.tick_completed(SimTime::new(1, 0));
        assert_eq!(core.next_update_time(), SimTime::MAX);

        let mut core = loaded_core(1e-20);
        core.tick_completed(SimTime::new(1, 0));
        assert_eq!(core.next_update_time(), SimTime::MAX);

        let mut core = loaded_core(1e-9);
        core.tick_completed(SimTime::new(1, 0));
        assert_eq!(core.next_update_time(), SimTime::new(1_000_000_001, 0));
    }

    #[test]
    fn zero_rate_is_always_due() {
        let mut core = loaded_core(0.0);
        core.tick_completed(SimTime::new(2, 0));
        assert_eq!(core.next_update_time(), SimTime::new(2, 0));
    }

    #[test]
    fn time_regression_is_rejected_until_reset() {
        let mut core = loaded_core(0.0);
        core.tick_completed(SimTime::new(5, 0));
        assert!(core.check_tick(SimTime::new(5, 0)).is_ok());
        assert!(matches!(
            core.check_tick(SimTime::new(4, 0)),
            Err(SensorError::InvalidParameter(_))
        ));
        core.reset();
        assert!(core.check_tick(SimTime::new(4, 0)).is_ok());
        assert_eq!(core.next_update_time(), SimTime::ZERO);
    }
}

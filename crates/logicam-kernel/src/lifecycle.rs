//! [`Lifecycle`] – the sensor state machine.
//!
//! ```text
//!  Unconfigured ──load──▶ Loaded ──init──▶ Initialized ──first tick──▶ Active
//!        ▲                                      │                        │
//!        └──────────── (failed load stays) ─────┴────── fault ──▶ Faulted ◀┘
//! ```
//!
//! The machine only tracks state and rejects illegal requests; the sensor
//! owning it does the actual loading and ticking.  Every method that refuses
//! a request leaves the state untouched.

use logicam_types::{LifecycleState, SensorError};
use tracing::{debug, info, warn};

/// Lifecycle of one sensor.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    sensor: String,
    state: LifecycleState,
    loaded: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Name bound at load time; empty before.
    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    /// Check that a load may start.  The sensor identity is fixed by the
    /// first successful load, so only an unconfigured sensor may load.
    ///
    /// # Errors
    ///
    /// [`SensorError::Configuration`] when the sensor was already loaded.
    pub fn check_can_load(&self) -> Result<(), SensorError> {
        match self.state {
            LifecycleState::Unconfigured => Ok(()),
            other => Err(SensorError::Configuration(format!(
                "sensor '{}' is already {other}; identity is fixed after load",
                self.sensor
            ))),
        }
    }

    /// Record a successful load of the sensor named `sensor`.
    pub fn loaded(&mut self, sensor: &str) -> Result<(), SensorError> {
        self.check_can_load()?;
        self.sensor = sensor.to_string();
        self.loaded = true;
        self.transition(LifecycleState::Loaded);
        Ok(())
    }

    /// `Loaded → Initialized`.  Calling it again once initialized is a no-op.
    ///
    /// # Errors
    ///
    /// [`SensorError::NotInitialized`] when the sensor is unconfigured or
    /// faulted.
    pub fn init(&mut self) -> Result<(), SensorError> {
        match self.state {
            LifecycleState::Loaded => {
                self.transition(LifecycleState::Initialized);
                Ok(())
            }
            LifecycleState::Initialized | LifecycleState::Active => Ok(()),
            LifecycleState::Unconfigured | LifecycleState::Faulted => Err(self.not_initialized()),
        }
    }

    /// Gate for a detection tick: only `Initialized` and `Active` may run.
    pub fn check_can_tick(&self) -> Result<(), SensorError> {
        match self.state {
            LifecycleState::Initialized | LifecycleState::Active => Ok(()),
            _ => Err(self.not_initialized()),
        }
    }

    /// Record a completed tick; the first one activates the sensor.
    pub fn tick_succeeded(&mut self) {
        if self.state == LifecycleState::Initialized {
            self.transition(LifecycleState::Active);
        }
    }

    /// Move to `Faulted` from any state.
    pub fn fault(&mut self, reason: &str) {
        if self.state != LifecycleState::Faulted {
            warn!(sensor = %self.sensor, from = %self.state, reason, "sensor faulted");
            self.state = LifecycleState::Faulted;
        }
    }

    /// Host-driven recovery from `Faulted`: a loaded sensor returns to
    /// `Initialized` (and re-activates on its next tick), an unloaded one to
    /// `Unconfigured`.  No-op in any other state.
    pub fn recover(&mut self) {
        if self.state == LifecycleState::Faulted {
            let to = if self.loaded {
                LifecycleState::Initialized
            } else {
                LifecycleState::Unconfigured
            };
            self.transition(to);
        }
    }

    fn transition(&mut self, to: LifecycleState) {
        let from = self.state;
        self.state = to;
        if to == LifecycleState::Active {
            info!(sensor = %self.sensor, %from, %to, "sensor lifecycle transition");
        } else {
            debug!(sensor = %self.sensor, %from, %to, "sensor lifecycle transition");
        }
    }

    fn not_initialized(&self) -> SensorError {
        SensorError::NotInitialized {
            sensor: self.sensor.clone(),
            state: self.state,
        }
    }
}

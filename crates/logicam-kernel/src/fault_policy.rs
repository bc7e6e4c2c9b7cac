//! [`FaultPolicy`] – repeated publish-failure detector.
//!
//! A single failed publish is only a warning: the next tick tries again on
//! its own.  The host may still decide that a sensor whose destination keeps
//! failing should be taken out of service.  The policy counts *consecutive*
//! failures per sensor and reports when the configured threshold is reached.
//!
//! # Example
//!
//! ```rust
//! use logicam_kernel::fault_policy::FaultPolicy;
//!
//! let mut policy = FaultPolicy::new(Some(3));
//!
//! assert!(!policy.record_failure("cam"));
//! assert!(!policy.record_failure("cam"));
//! assert!(policy.record_failure("cam")); // third in a row → fault
//!
//! // A success clears the streak.
//! policy.record_success("cam");
//! assert!(!policy.record_failure("cam"));
//! ```

use std::collections::HashMap;

/// Counts consecutive publish failures per sensor.
///
/// A threshold of `None` disables faulting entirely.
#[derive(Debug, Clone, Default)]
pub struct FaultPolicy {
    threshold: Option<usize>,
    streaks: HashMap<String, usize>,
}

impl FaultPolicy {
    /// `threshold` is the number of consecutive failures that faults a
    /// sensor.  `Some(0)` is treated as `Some(1)`.
    pub fn new(threshold: Option<usize>) -> Self {
        Self {
            threshold: threshold.map(|t| t.max(1)),
            streaks: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    /// Record a failed publish for `sensor`.
    ///
    /// Returns `true` once the streak has reached the threshold, and keeps
    /// returning `true` for further failures.
    pub fn record_failure(&mut self, sensor: &str) -> bool {
        let streak = self.streaks.entry(sensor.to_string()).or_insert(0);
        *streak += 1;
        self.threshold.is_some_and(|t| *streak >= t)
    }

    /// Record a successful publish, clearing the streak.
    pub fn record_success(&mut self, sensor: &str) {
        self.streaks.remove(sensor);
    }

    pub fn consecutive_failures(&self, sensor: &str) -> usize {
        self.streaks.get(sensor).copied().unwrap_or(0)
    }

    /// Forget everything recorded for `sensor`.
    pub fn reset(&mut self, sensor: &str) {
        self.streaks.remove(sensor);
    }
}

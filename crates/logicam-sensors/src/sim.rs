//! In-process report destinations for tests and headless runs.
//!
//! [`RecordingPublisher`] keeps every report it is handed so a test (or a
//! dry-run host) can inspect exactly what a sensor produced, without a bus.
//! [`FailingPublisher`] refuses every publish, for exercising the
//! failed hand-off paths.
//!
//! # Example
//!
//! ```rust
//! use logicam_middleware::ReportPublisher;
//! use logicam_sensors::sim::RecordingPublisher;
//! use logicam_types::DetectionReport;
//!
//! let recorder = RecordingPublisher::new();
//! let mut publisher = recorder.clone();
//! publisher.advertise("/cam/logical_camera").unwrap();
//! publisher.publish(&DetectionReport::default()).unwrap();
//!
//! assert_eq!(recorder.len(), 1);
//! ```

use std::sync::Arc;

use logicam_middleware::{ReportPublisher, validate_topic};
use logicam_types::{DetectionReport, SensorError};
use parking_lot::RwLock;

// ─────────────────────────────────────────────────────────────────────────────
// Recording publisher
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Recording {
    topic: Option<String>,
    reports: Vec<DetectionReport>,
    unavailable: bool,
}

/// Publisher that stores every report.  Clones share the same recording, so
/// keep one clone for inspection and hand the other to the sensor.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    topic: Option<String>,
    shared: Arc<RwLock<Recording>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report recorded so far, oldest first.
    pub fn reports(&self) -> Vec<DetectionReport> {
        self.shared.read().reports.clone()
    }

    pub fn last(&self) -> Option<DetectionReport> {
        self.shared.read().reports.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.read().reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Topic advertised through any clone.
    pub fn topic_name(&self) -> Option<String> {
        self.shared.read().topic.clone()
    }

    /// Simulate the destination going away (`false`) or coming back.
    pub fn set_available(&self, available: bool) {
        self.shared.write().unavailable = !available;
    }

    pub fn clear(&self) {
        self.shared.write().reports.clear();
    }
}

impl ReportPublisher for RecordingPublisher {
    fn advertise(&mut self, topic: &str) -> Result<(), SensorError> {
        validate_topic(topic)?;
        self.topic = Some(topic.to_string());
        self.shared.write().topic = Some(topic.to_string());
        Ok(())
    }

    fn publish(&self, report: &DetectionReport) -> Result<(), SensorError> {
        let mut shared = self.shared.write();
        match &shared.topic {
            Some(topic) if shared.unavailable => Err(SensorError::DestinationUnavailable {
                topic: topic.clone(),
                reason: "recording destination marked unavailable".to_string(),
            }),
            Some(_) => {
                shared.reports.push(report.clone());
                Ok(())
            }
            None => Err(SensorError::DestinationUnavailable {
                topic: String::new(),
                reason: "publisher has not advertised".to_string(),
            }),
        }
    }

    fn is_available(&self) -> bool {
        let shared = self.shared.read();
        shared.topic.is_some() && !shared.unavailable
    }

    fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    fn withdraw(&mut self) {
        self.topic = None;
        self.shared.write().topic = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Failing publisher
// ─────────────────────────────────────────────────────────────────────────────

/// Publisher whose destination never accepts a report.
#[derive(Debug, Clone, Default)]
pub struct FailingPublisher {
    topic: Option<String>,
    closed: bool,
}

impl FailingPublisher {
    /// Advertises fine, then fails every publish; not closed, so each
    /// failure is independent.
    pub fn transient() -> Self {
        Self::default()
    }

    /// Destination that is gone for good: advertising fails too.
    pub fn closed() -> Self {
        Self {
            topic: None,
            closed: true,
        }
    }

    fn error(&self) -> SensorError {
        SensorError::DestinationUnavailable {
            topic: self.topic.clone().unwrap_or_default(),
            reason: if self.closed {
                "destination closed".to_string()
            } else {
                "destination refused report".to_string()
            },
        }
    }
}

impl ReportPublisher for FailingPublisher {
    fn advertise(&mut self, topic: &str) -> Result<(), SensorError> {
        validate_topic(topic)?;
        if self.closed {
            return Err(SensorError::DestinationUnavailable {
                topic: topic.to_string(),
                reason: "destination closed".to_string(),
            });
        }
        self.topic = Some(topic.to_string());
        Ok(())
    }

    fn publish(&self, _report: &DetectionReport) -> Result<(), SensorError> {
        Err(self.error())
    }

    fn is_available(&self) -> bool {
        false
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_requires_advertise() {
        let publisher = RecordingPublisher::new();
        assert!(!publisher.is_available());
        assert!(publisher.publish(&DetectionReport::default()).is_err());
        assert!(publisher.is_empty());
    }

    #[test]
    fn clones_share_recording() {
        let inspector = RecordingPublisher::new();
        let mut publisher = inspector.clone();
        publisher.advertise("/a/b").unwrap();
        publisher.publish(&DetectionReport::default()).unwrap();
        assert_eq!(inspector.len(), 1);
        assert_eq!(inspector.topic_name().as_deref(), Some("/a/b"));
    }

    #[test]
    fn unavailable_recording_refuses_reports() {
        let inspector = RecordingPublisher::new();
        let mut publisher = inspector.clone();
        publisher.advertise("/a").unwrap();
        inspector.set_available(false);
        assert!(matches!(
            publisher.publish(&DetectionReport::default()),
            Err(SensorError::DestinationUnavailable { .. })
        ));
        inspector.set_available(true);
        publisher.publish(&DetectionReport::default()).unwrap();
        assert_eq!(inspector.len(), 1);
    }

    #[test]
    fn withdraw_stops_recording() {
        let inspector = RecordingPublisher::new();
        let mut publisher = inspector.clone();
        publisher.advertise("/a").unwrap();
        publisher.withdraw();
        assert!(publisher.publish(&DetectionReport::default()).is_err());
        assert!(inspector.topic_name().is_none());
    }

    #[test]
    fn failing_publisher_modes() {
        let mut transient = FailingPublisher::transient();
        transient.advertise("/x").unwrap();
        assert!(transient.publish(&DetectionReport::default()).is_err());
        assert!(!transient.is_closed());

        let mut closed = FailingPublisher::closed();
        assert!(closed.advertise("/x").is_err());
        assert!(closed.is_closed());
    }
}

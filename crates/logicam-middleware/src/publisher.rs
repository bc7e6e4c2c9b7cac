//! The report publishing capability.
//!
//! Sensors never speak to the transport directly.  They hold a
//! [`ReportPublisher`], advertise a destination once at load time and then
//! hand every built report to it, fire-and-forget.  [`BusPublisher`] is the
//! implementation backed by the in-process [`TopicBus`].

use logicam_types::{DetectionReport, Event, EventPayload, SensorError};
use tracing::{debug, warn};

use crate::bus::TopicBus;

/// Every report destination must implement this trait.
///
/// # Contract
///
/// * `set_source` – name the sender stamped on outgoing reports, normally
///   the owning sensor.  Called before `advertise`.
/// * `advertise` – establish the destination named `topic`.  Failure means
///   the owning sensor must not become active.
/// * `publish` – forward one report.  Reports are never queued or retried;
///   an unavailable destination yields
///   [`SensorError::DestinationUnavailable`].
/// * `is_available` – whether a publish right now would reach the
///   destination.
/// * `is_closed` – whether the destination is gone for good, i.e. no later
///   publish can ever succeed.
pub trait ReportPublisher: Send + Sync {
    fn set_source(&mut self, _source: &str) {}

    fn advertise(&mut self, topic: &str) -> Result<(), SensorError>;

    fn publish(&self, report: &DetectionReport) -> Result<(), SensorError>;

    fn is_available(&self) -> bool;

    fn is_closed(&self) -> bool {
        false
    }

    /// The advertised topic, if any.
    fn topic(&self) -> Option<&str>;

    /// Withdraw the advertisement.  Later publishes fail.
    fn withdraw(&mut self) {}
}

/// [`ReportPublisher`] that wraps each report in an [`Event`] and sends it on
/// a [`TopicBus`] topic.
pub struct BusPublisher {
    bus: TopicBus,
    source: String,
    topic: Option<String>,
}

impl BusPublisher {
    /// `source` is stamped into every event envelope until the owning sensor
    /// replaces it through [`ReportPublisher::set_source`].
    pub fn new(bus: TopicBus, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
            topic: None,
        }
    }
}

impl ReportPublisher for BusPublisher {
    fn set_source(&mut self, source: &str) {
        self.source = source.to_string();
    }

    fn advertise(&mut self, topic: &str) -> Result<(), SensorError> {
        if self.topic.as_deref() == Some(topic) {
            return Ok(());
        }
        self.bus.advertise(topic)?;
        if let Some(previous) = self.topic.replace(topic.to_string()) {
            self.bus.unadvertise(&previous);
        }
        Ok(())
    }

    fn publish(&self, report: &DetectionReport) -> Result<(), SensorError> {
        let Some(topic) = self.topic.as_deref() else {
            return Err(SensorError::DestinationUnavailable {
                topic: String::new(),
                reason: "publisher has no advertised topic".to_string(),
            });
        };
        let event = Event::new(self.source.clone(), EventPayload::Detections(report.clone()));
        match self.bus.publish(topic, event) {
            Ok(receivers) => {
                debug!(
                    topic = %topic,
                    receivers,
                    detections = report.detections.len(),
                    "report published"
                );
                Ok(())
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "report publish failed");
                Err(e)
            }
        }
    }

    fn is_available(&self) -> bool {
        self.topic
            .as_deref()
            .is_some_and(|topic| self.bus.is_advertised(topic))
    }

    fn is_closed(&self) -> bool {
        self.bus.is_shut_down()
    }

    fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    fn withdraw(&mut self) {
        if let Some(topic) = self.topic.take() {
            self.bus.unadvertise(&topic);
        }
    }
}

impl Drop for BusPublisher {
    fn drop(&mut self) {
        self.withdraw();
    }
}

//! Headless, named-topic publish/subscribe bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Publishing never awaits, so the bus can be driven from a
//! synchronous simulation tick.
//!
//! # Topic states
//!
//! | State | `publish` result |
//! |---|---|
//! | advertised, no subscribers | `Ok(0)` |
//! | advertised, `n` subscribers | `Ok(n)` |
//! | not advertised (or withdrawn) | [`SensorError::DestinationUnavailable`] |
//! | bus shut down | [`SensorError::DestinationUnavailable`] |
//!
//! Subscribing to a topic that has not been advertised yet is allowed; the
//! receiver starts delivering once a publisher advertises it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use logicam_types::{Event, SensorError};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Check that `topic` is a usable topic name: non-empty, starting with `/`,
/// and free of whitespace.
pub fn validate_topic(topic: &str) -> Result<(), SensorError> {
    if topic.len() < 2 || !topic.starts_with('/') {
        return Err(SensorError::Configuration(format!(
            "topic '{topic}' must start with '/' and name at least one segment"
        )));
    }
    if topic.chars().any(char::is_whitespace) {
        return Err(SensorError::Configuration(format!(
            "topic '{topic}' must not contain whitespace"
        )));
    }
    if topic.contains("//") || topic.ends_with('/') {
        return Err(SensorError::Configuration(format!(
            "topic '{topic}' contains an empty segment"
        )));
    }
    Ok(())
}

struct TopicChannel {
    sender: broadcast::Sender<Event>,
    advertisers: usize,
}

struct BusInner {
    capacity: usize,
    channels: RwLock<HashMap<String, TopicChannel>>,
    shut_down: AtomicBool,
}

/// Shared topic bus.  Clone it cheaply – all clones share the same channels.
#[derive(Clone)]
pub struct TopicBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for TopicBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicBus")
            .field("capacity", &self.inner.capacity)
            .field("topics", &self.inner.channels.read().len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl TopicBus {
    /// Create a new bus; `capacity` applies to every topic channel.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                channels: RwLock::new(HashMap::new()),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Declare that a publisher will emit on `topic`.
    ///
    /// Several publishers may advertise the same topic; it stays advertised
    /// until each of them calls [`TopicBus::unadvertise`].
    ///
    /// # Errors
    ///
    /// - [`SensorError::Configuration`] for a malformed topic name.
    /// - [`SensorError::DestinationUnavailable`] after [`TopicBus::shutdown`].
    pub fn advertise(&self, topic: &str) -> Result<(), SensorError> {
        validate_topic(topic)?;
        if self.is_shut_down() {
            return Err(shut_down_error(topic));
        }
        let mut channels = self.inner.channels.write();
        let channel = channels
            .entry(topic.to_string())
            .or_insert_with(|| TopicChannel {
                sender: broadcast::channel(self.inner.capacity).0,
                advertisers: 0,
            });
        channel.advertisers += 1;
        info!(topic = %topic, advertisers = channel.advertisers, "topic advertised");
        Ok(())
    }

    /// Withdraw one advertisement of `topic`.  No-op for unknown topics.
    pub fn unadvertise(&self, topic: &str) {
        let mut channels = self.inner.channels.write();
        if let Some(channel) = channels.get_mut(topic) {
            channel.advertisers = channel.advertisers.saturating_sub(1);
            debug!(topic = %topic, advertisers = channel.advertisers, "topic unadvertised");
        }
    }

    /// Whether at least one publisher currently advertises `topic`.
    pub fn is_advertised(&self, topic: &str) -> bool {
        !self.is_shut_down()
            && self
                .inner
                .channels
                .read()
                .get(topic)
                .is_some_and(|c| c.advertisers > 0)
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of subscribers that were handed the event; zero
    /// subscribers is a normal condition.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::DestinationUnavailable`] when the topic is not
    /// advertised or the bus has been shut down.
    pub fn publish(&self, topic: &str, event: Event) -> Result<usize, SensorError> {
        if self.is_shut_down() {
            return Err(shut_down_error(topic));
        }
        let channels = self.inner.channels.read();
        match channels.get(topic) {
            Some(channel) if channel.advertisers > 0 => {
                // A SendError only means nobody is listening right now.
                Ok(channel.sender.send(event).unwrap_or(0))
            }
            _ => Err(SensorError::DestinationUnavailable {
                topic: topic.to_string(),
                reason: "topic is not advertised".to_string(),
            }),
        }
    }

    /// Subscribe to `topic`, creating the channel if nobody advertised it yet.
    pub fn subscribe(&self, topic: &str) -> TopicReceiver {
        let mut channels = self.inner.channels.write();
        let channel = channels
            .entry(topic.to_string())
            .or_insert_with(|| TopicChannel {
                sender: broadcast::channel(self.inner.capacity).0,
                advertisers: 0,
            });
        TopicReceiver {
            topic: topic.to_string(),
            receiver: channel.sender.subscribe(),
        }
    }

    /// Names of every topic that currently has an advertiser, sorted.
    pub fn advertised_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .inner
            .channels
            .read()
            .iter()
            .filter(|(_, c)| c.advertisers > 0)
            .map(|(t, _)| t.clone())
            .collect();
        topics.sort();
        topics
    }

    /// Permanently close the bus.  Every channel is dropped, so receivers
    /// observe `Closed`, and all later publishes fail.
    pub fn shutdown(&self) {
        if !self.inner.shut_down.swap(true, Ordering::SeqCst) {
            self.inner.channels.write().clear();
            warn!("topic bus shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn shut_down_error(topic: &str) -> SensorError {
    SensorError::DestinationUnavailable {
        topic: topic.to_string(),
        reason: "bus is shut down".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single topic.
///
/// Obtained via [`TopicBus::subscribe`].
pub struct TopicReceiver {
    topic: String,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns `None` once the bus has shut down.  Lagged messages are
    /// logged and skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for synchronous consumers.
    ///
    /// Returns `None` when no event is buffered or the bus has shut down.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    /// The topic this receiver is bound to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logicam_types::{DetectionReport, EventPayload};

    fn make_event() -> Event {
        Event::new("logicam-middleware::test", EventPayload::Detections(DetectionReport::default()))
    }

    #[test]
    fn validate_topic_rules() {
        assert!(validate_topic("/cam/logical_camera").is_ok());
        assert!(validate_topic("cam").is_err());
        assert!(validate_topic("/").is_err());
        assert!(validate_topic("").is_err());
        assert!(validate_topic("/a b").is_err());
        assert!(validate_topic("/a//b").is_err());
        assert!(validate_topic("/a/").is_err());
    }

    #[tokio::test]
    async fn publish_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = TopicBus::default();
        bus.advertise("/cam")?;
        let mut rx = bus.subscribe("/cam");

        let event = make_event();
        assert_eq!(bus.publish("/cam", event.clone())?, 1);

        let received = rx.recv().await.ok_or("no event received")?;
        assert_eq!(received.id, event.id);
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let bus = TopicBus::default();
        bus.advertise("/cam").unwrap();
        assert_eq!(bus.publish("/cam", make_event()).unwrap(), 0);
    }

    #[test]
    fn publish_on_unadvertised_topic_fails() {
        let bus = TopicBus::default();
        let _rx = bus.subscribe("/cam");
        let result = bus.publish("/cam", make_event());
        assert!(matches!(result, Err(SensorError::DestinationUnavailable { .. })));
    }

    #[test]
    fn unadvertise_counts_advertisers() {
        let bus = TopicBus::default();
        bus.advertise("/cam").unwrap();
        bus.advertise("/cam").unwrap();
        bus.unadvertise("/cam");
        assert!(bus.is_advertised("/cam"));
        bus.unadvertise("/cam");
        assert!(!bus.is_advertised("/cam"));
        assert!(bus.publish("/cam", make_event()).is_err());
        // Extra withdrawals are harmless.
        bus.unadvertise("/cam");
        bus.unadvertise("/ghost");
    }

    #[test]
    fn subscriber_on_other_topic_receives_nothing() {
        let bus = TopicBus::default();
        bus.advertise("/a").unwrap();
        let mut rx_b = bus.subscribe("/b");
        bus.publish("/a", make_event()).unwrap();
        assert!(rx_b.try_recv().is_none());
    }

    #[test]
    fn try_recv_skips_lag() {
        let bus = TopicBus::new(4);
        bus.advertise("/flood").unwrap();
        let mut rx = bus.subscribe("/flood");
        for _ in 0..20 {
            bus.publish("/flood", make_event()).unwrap();
        }
        let mut count = 0;
        while rx.try_recv().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn shutdown_closes_receivers_and_rejects_publish() {
        let bus = TopicBus::default();
        bus.advertise("/cam").unwrap();
        let mut rx = bus.subscribe("/cam");
        bus.shutdown();

        assert!(bus.is_shut_down());
        assert!(!bus.is_advertised("/cam"));
        assert!(matches!(
            bus.publish("/cam", make_event()),
            Err(SensorError::DestinationUnavailable { .. })
        ));
        assert!(bus.advertise("/cam").is_err());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn advertised_topics_are_sorted() {
        let bus = TopicBus::default();
        bus.advertise("/z").unwrap();
        bus.advertise("/a").unwrap();
        let _rx = bus.subscribe("/m");
        assert_eq!(bus.advertised_topics(), vec!["/a".to_string(), "/z".to_string()]);
    }
}

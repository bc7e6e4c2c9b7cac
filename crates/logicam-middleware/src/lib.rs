//! `logicam-middleware` – report transport.
//!
//! Routes detection reports from sensors to whoever listens, without caring
//! about what the reports contain.
//!
//! # Modules
//!
//! - [`bus`] – [`TopicBus`]: headless, named-topic publish/subscribe bus
//!   built on Tokio broadcast channels.
//! - [`publisher`] – [`ReportPublisher`]: the publish capability sensors
//!   hold, and [`BusPublisher`], its bus-backed implementation.

pub mod bus;
pub mod publisher;

pub use bus::{TopicBus, TopicReceiver, validate_topic};
pub use publisher::{BusPublisher, ReportPublisher};

//! `logicam-runtime` – the host side.
//!
//! # Modules
//!
//! - [`manager`] – [`SensorManager`][manager::SensorManager]: owns the
//!   sensor registry, the shared pose directory and topic bus, and drives
//!   every sensor's tick from the host's simulation step.  Applies the
//!   [`FaultPolicy`][logicam_kernel::FaultPolicy] to repeated publish
//!   failures and announces faults on [`FAULT_TOPIC`][manager::FAULT_TOPIC].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod manager;
pub mod telemetry;

pub use manager::{FAULT_TOPIC, SensorManager, SensorTick};
pub use telemetry::{TracerProviderGuard, init_tracing};

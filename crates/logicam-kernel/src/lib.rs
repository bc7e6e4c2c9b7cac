//! `logicam-kernel` – sensor governance.
//!
//! Decides *when* a sensor may run.  It does not detect anything itself.
//!
//! # Modules
//!
//! - [`lifecycle`] – [`Lifecycle`][lifecycle::Lifecycle]: the
//!   Unconfigured → Loaded → Initialized → Active (→ Faulted) state machine
//!   every sensor embeds.
//! - [`fault_policy`] – [`FaultPolicy`][fault_policy::FaultPolicy]: host-side
//!   rule that faults a sensor after repeated consecutive publish failures.

pub mod fault_policy;
pub mod lifecycle;

pub use fault_policy::FaultPolicy;
pub use lifecycle::Lifecycle;

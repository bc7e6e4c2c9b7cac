//! `logicam-perception` – geometry for logical sensors.
//!
//! Pure math with no I/O and no locking; everything here is owned by a single
//! detection cycle at a time.
//!
//! # Modules
//!
//! - [`transform`] – [`Pose3`][transform::Pose3], [`Quaternion`][transform::Quaternion]
//!   and [`Vec3`][transform::Vec3]: rigid-body poses with composition,
//!   inversion and relative-pose computation.
//! - [`frustum`] – [`Frustum`][frustum::Frustum]: an oriented view volume
//!   bounded by six planes, answering point-containment queries.

pub mod frustum;
pub mod transform;

pub use frustum::{Frustum, FrustumParams, FrustumPlane, Plane};
pub use transform::{Pose3, Quaternion, Vec3};

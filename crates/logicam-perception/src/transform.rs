//! Rigid-body pose math.
//!
//! [`Vec3`], [`Quaternion`] and [`Pose3`] describe positions and orientations
//! in a right-handed frame (X forward, Y left, Z up).  Poses compose like
//! transforms: if `a` is the pose of frame B in frame A and `b` the pose of C
//! in B, `a.compose(b)` is the pose of C in A.
//!
//! # Example
//!
//! ```rust
//! use logicam_perception::transform::{Pose3, Quaternion, Vec3};
//!
//! // Sensor 1 m forward of the world origin, entity 3 m forward.
//! let sensor = Pose3::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
//! let entity = Pose3::new(Vec3::new(3.0, 0.0, 0.0), Quaternion::identity());
//!
//! let rel = entity.relative_to(&sensor);
//! assert!((rel.position.x - 2.0).abs() < 1e-12);
//! ```

use logicam_types::{PointMsg, PoseMsg, QuaternionMsg};

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const UNIT_X: Vec3 = Vec3 {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1); see [`Quaternion::normalized`].
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Build from intrinsic roll (X), pitch (Y), yaw (Z) Euler angles in
    /// radians, applied yaw first.
    pub fn from_rpy(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();
        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// Recover (roll, pitch, yaw).  Pitch is clamped at ±π/2.
    pub fn to_rpy(self) -> (f64, f64, f64) {
        let q = self.normalized();
        let roll = (2.0 * (q.w * q.x + q.y * q.z)).atan2(1.0 - 2.0 * (q.x * q.x + q.y * q.y));
        let sinp = (2.0 * (q.w * q.y - q.z * q.x)).clamp(-1.0, 1.0);
        let pitch = sinp.asin();
        let yaw = (2.0 * (q.w * q.z + q.x * q.y)).atan2(1.0 - 2.0 * (q.y * q.y + q.z * q.z));
        (roll, pitch, yaw)
    }

    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Scale to unit length.  A zero quaternion becomes the identity.
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n <= f64::EPSILON || !n.is_finite() {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose3
// ────────────────────────────────────────────────────────────────────────────

/// A rigid 6-DOF pose: position plus orientation.
///
/// To convert a point expressed in the posed frame into the parent frame,
/// rotate it by `orientation` then add `position`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose3 {
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl Pose3 {
    pub fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// The identity pose.
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Convenience constructor from position and roll/pitch/yaw.
    pub fn from_xyz_rpy(xyz: [f64; 3], rpy: [f64; 3]) -> Self {
        Self::new(xyz.into(), Quaternion::from_rpy(rpy[0], rpy[1], rpy[2]))
    }

    /// Compose two poses: `self` applied first, then `other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let position = self.position.add(self.orientation.rotate(other.position));
        let orientation = self.orientation.mul(other.orientation);
        Self::new(position, orientation)
    }

    /// The inverse pose, so that `p.compose(p.inverse())` is the identity.
    pub fn inverse(self) -> Self {
        let inv_rot = self.orientation.conjugate();
        Self::new(inv_rot.rotate(self.position).scale(-1.0), inv_rot)
    }

    /// Express `self` (a world-frame pose) in the local frame of `reference`.
    ///
    /// Satisfies `reference.compose(self.relative_to(reference)) == self`.
    pub fn relative_to(&self, reference: &Pose3) -> Pose3 {
        reference.inverse().compose(*self)
    }

    /// Map a parent-frame point into this pose's local frame.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.orientation.conjugate().rotate(point.sub(self.position))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire conversions
// ────────────────────────────────────────────────────────────────────────────

impl From<Pose3> for PoseMsg {
    fn from(p: Pose3) -> Self {
        PoseMsg {
            position: PointMsg {
                x: p.position.x,
                y: p.position.y,
                z: p.position.z,
            },
            orientation: QuaternionMsg {
                x: p.orientation.x,
                y: p.orientation.y,
                z: p.orientation.z,
                w: p.orientation.w,
            },
        }
    }
}

impl From<PoseMsg> for Pose3 {
    fn from(m: PoseMsg) -> Self {
        Pose3::new(
            Vec3::new(m.position.x, m.position.y, m.position.z),
            Quaternion::new(m.orientation.w, m.orientation.x, m.orientation.y, m.orientation.z),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

//! Oriented view frustum.
//!
//! A [`Frustum`] is a truncated pyramid whose apex sits at the sensor pose and
//! which looks down the pose's local +X axis.  It is bounded by six planes:
//! near and far (perpendicular to the view axis) plus left/right/top/bottom
//! planes through the apex, derived from the horizontal field of view and the
//! aspect ratio (`tan(vfov / 2) = tan(hfov / 2) / aspect`).
//!
//! # Boundary rule
//!
//! | Plane | A point exactly on it is |
//! |---|---|
//! | near | inside |
//! | far | outside |
//! | left / right / top / bottom | inside |
//!
//! A configuration with `near >= far` is an empty volume; the validated
//! setters never produce one.
//!
//! # Example
//!
//! ```rust
//! use logicam_perception::frustum::{Frustum, FrustumParams};
//! use logicam_perception::transform::{Pose3, Vec3};
//!
//! let mut frustum = Frustum::new(FrustumParams {
//!     near: 0.1,
//!     far: 5.0,
//!     horizontal_fov: 60f64.to_radians(),
//!     aspect_ratio: 1.0,
//! }).unwrap();
//! frustum.set_pose(Pose3::identity());
//!
//! assert!(frustum.contains(Vec3::new(2.0, 0.0, 0.0)));
//! assert!(!frustum.contains(Vec3::new(10.0, 0.0, 0.0)));
//! ```

use std::f64::consts::PI;

use logicam_types::SensorError;

use crate::transform::{Pose3, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Parameters
// ────────────────────────────────────────────────────────────────────────────

/// The four shape parameters of a view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumParams {
    /// Distance from the apex to the near plane (metres, > 0).
    pub near: f64,
    /// Distance from the apex to the far plane (metres, > `near`).
    pub far: f64,
    /// Full horizontal field of view (radians, in `(0, π)`).
    pub horizontal_fov: f64,
    /// Width / height ratio of the image plane (> 0).
    pub aspect_ratio: f64,
}

impl Default for FrustumParams {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 1.0,
            horizontal_fov: PI / 3.0,
            aspect_ratio: 1.0,
        }
    }
}

impl FrustumParams {
    /// Check every parameter and the `near < far` ordering.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidParameter`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SensorError> {
        check_positive("near", self.near)?;
        check_positive("far", self.far)?;
        if self.near >= self.far {
            return Err(SensorError::InvalidParameter(format!(
                "near ({}) must be less than far ({})",
                self.near, self.far
            )));
        }
        check_fov(self.horizontal_fov)?;
        check_positive("aspect_ratio", self.aspect_ratio)?;
        Ok(())
    }

    /// Full vertical field of view implied by the horizontal FOV and aspect.
    pub fn vertical_fov(&self) -> f64 {
        2.0 * ((self.horizontal_fov * 0.5).tan() / self.aspect_ratio).atan()
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), SensorError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SensorError::InvalidParameter(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

fn check_fov(value: f64) -> Result<(), SensorError> {
    if value.is_finite() && value > 0.0 && value < PI {
        Ok(())
    } else {
        Err(SensorError::InvalidParameter(format!(
            "horizontal_fov must lie in (0, π) radians, got {value}"
        )))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Planes
// ────────────────────────────────────────────────────────────────────────────

/// Index of each bounding plane in [`Frustum::planes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumPlane {
    Near = 0,
    Far = 1,
    Left = 2,
    Right = 3,
    Top = 4,
    Bottom = 5,
}

/// A world-frame plane `normal · p = offset` whose normal points into the
/// volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f64,
}

impl Plane {
    fn through(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            offset: normal.dot(point),
        }
    }

    /// Signed distance; positive on the inward side.
    pub fn signed_distance(&self, point: Vec3) -> f64 {
        self.normal.dot(point) - self.offset
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frustum
// ────────────────────────────────────────────────────────────────────────────

/// An oriented view volume answering point-containment queries.
#[derive(Debug, Clone)]
pub struct Frustum {
    params: FrustumParams,
    pose: Pose3,
    planes: [Plane; 6],
}

impl Default for Frustum {
    fn default() -> Self {
        let params = FrustumParams::default();
        let pose = Pose3::identity();
        Self {
            params,
            pose,
            planes: derive_planes(&params, &pose),
        }
    }
}

impl Frustum {
    /// Build a frustum at the identity pose.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidParameter`] if `params` fails
    /// [`FrustumParams::validate`].
    pub fn new(params: FrustumParams) -> Result<Self, SensorError> {
        params.validate()?;
        let pose = Pose3::identity();
        Ok(Self {
            params,
            pose,
            planes: derive_planes(&params, &pose),
        })
    }

    pub fn near(&self) -> f64 {
        self.params.near
    }

    pub fn far(&self) -> f64 {
        self.params.far
    }

    /// Horizontal field of view in radians.
    pub fn fov(&self) -> f64 {
        self.params.horizontal_fov
    }

    pub fn vertical_fov(&self) -> f64 {
        self.params.vertical_fov()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.params.aspect_ratio
    }

    pub fn params(&self) -> FrustumParams {
        self.params
    }

    pub fn pose(&self) -> Pose3 {
        self.pose
    }

    /// The six bounding planes in world frame, indexed by [`FrustumPlane`].
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    pub fn plane(&self, which: FrustumPlane) -> Plane {
        self.planes[which as usize]
    }

    /// Replace all four shape parameters at once.
    ///
    /// On error the previous configuration is kept.
    pub fn configure(&mut self, params: FrustumParams) -> Result<(), SensorError> {
        params.validate()?;
        self.params = params;
        self.rebuild();
        Ok(())
    }

    pub fn set_near(&mut self, near: f64) -> Result<(), SensorError> {
        self.configure(FrustumParams { near, ..self.params })
    }

    pub fn set_far(&mut self, far: f64) -> Result<(), SensorError> {
        self.configure(FrustumParams { far, ..self.params })
    }

    pub fn set_fov(&mut self, horizontal_fov: f64) -> Result<(), SensorError> {
        self.configure(FrustumParams {
            horizontal_fov,
            ..self.params
        })
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f64) -> Result<(), SensorError> {
        self.configure(FrustumParams {
            aspect_ratio,
            ..self.params
        })
    }

    /// Move the apex to `pose`.  The orientation is normalised before the
    /// planes are rebuilt.
    pub fn set_pose(&mut self, pose: Pose3) {
        self.pose = Pose3::new(pose.position, pose.orientation.normalized());
        self.rebuild();
    }

    /// Whether a world-frame point lies inside the volume (see the module
    /// docs for the boundary rule).
    pub fn contains(&self, point: Vec3) -> bool {
        if self.params.near >= self.params.far || !point.is_finite() {
            return false;
        }
        self.planes.iter().enumerate().all(|(i, plane)| {
            let d = plane.signed_distance(point);
            if i == FrustumPlane::Far as usize {
                d > 0.0
            } else {
                d >= 0.0
            }
        })
    }

    fn rebuild(&mut self) {
        self.planes = derive_planes(&self.params, &self.pose);
    }
}

/// Standard perspective-frustum plane construction in the sensor frame,
/// rotated into world frame by `pose`.
fn derive_planes(params: &FrustumParams, pose: &Pose3) -> [Plane; 6] {
    let rot = pose.orientation;
    let apex = pose.position;
    let forward = rot.rotate(Vec3::UNIT_X);

    let (sh, ch) = (params.horizontal_fov * 0.5).sin_cos();
    let (sv, cv) = (params.vertical_fov() * 0.5).sin_cos();

    let left = rot.rotate(Vec3::new(sh, -ch, 0.0));
    let right = rot.rotate(Vec3::new(sh, ch, 0.0));
    let top = rot.rotate(Vec3::new(sv, 0.0, -cv));
    let bottom = rot.rotate(Vec3::new(sv, 0.0, cv));

    [
        Plane::through(forward, apex.add(forward.scale(params.near))),
        Plane::through(forward.scale(-1.0), apex.add(forward.scale(params.far))),
        Plane::through(left, apex),
        Plane::through(right, apex),
        Plane::through(top, apex),
        Plane::through(bottom, apex),
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

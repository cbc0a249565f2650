//! Bounding volumes, node transforms and vector helpers.

use glam::{Mat4, Quat, Vec3};
use std::f32::consts::TAU;

/// Squared length below which a vector is treated as zero.
const SQUARED_ZERO: f32 = 1e-6 * 1e-6;

/// Axis-aligned bounding box that may also be empty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Aabb {
    /// Contains nothing.
    #[default]
    Null,
    /// A real box.
    Finite {
        /// Minimum corner
        min: Vec3,
        /// Maximum corner
        max: Vec3,
    },
}

impl Aabb {
    /// Creates a finite box from two corners (reordered if needed).
    #[must_use]
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self::Finite {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Whether the box contains nothing.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the box has real extents.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        matches!(self, Self::Finite { .. })
    }

    /// Minimum corner, if any.
    #[must_use]
    pub const fn minimum(&self) -> Option<Vec3> {
        match self {
            Self::Null => None,
            Self::Finite { min, .. } => Some(*min),
        }
    }

    /// Maximum corner, if any.
    #[must_use]
    pub const fn maximum(&self) -> Option<Vec3> {
        match self {
            Self::Null => None,
            Self::Finite { max, .. } => Some(*max),
        }
    }

    /// Centre of the box.
    #[must_use]
    pub fn center(&self) -> Option<Vec3> {
        match self {
            Self::Null => None,
            Self::Finite { min, max } => Some((*min + *max) * 0.5),
        }
    }

    /// Grows this box to enclose `other`.
    pub fn merge(&mut self, other: &Self) {
        match (*self, *other) {
            (_, Self::Null) => {},
            (Self::Null, other) => *self = other,
            (Self::Finite { min, max }, Self::Finite { min: omin, max: omax }) => {
                *self = Self::Finite {
                    min: min.min(omin),
                    max: max.max(omax),
                };
            },
        }
    }

    /// Grows this box to enclose `point`.
    pub fn merge_point(&mut self, point: Vec3) {
        self.merge(&Self::Finite {
            min: point,
            max: point,
        });
    }

    /// Whether `point` lies inside the box (inclusive).
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        match self {
            Self::Null => false,
            Self::Finite { min, max } => point.cmpge(*min).all() && point.cmple(*max).all(),
        }
    }

    /// Returns the box enclosing this one after an affine transform.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let Self::Finite { min, max } = *self else {
            return Self::Null;
        };
        let mut out = Self::Null;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            out.merge_point(matrix.transform_point3(corner));
        }
        out
    }

    /// Distance from the origin to the farthest corner, as used for
    /// bounding radius estimates.
    #[must_use]
    pub fn radius_from_origin(&self) -> f32 {
        match self {
            Self::Null => 0.0,
            Self::Finite { min, max } => min.length_squared().max(max.length_squared()).sqrt(),
        }
    }
}

/// World placement of the scene node a particle system is attached to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    /// Derived world position
    pub position: Vec3,
    /// Derived world orientation
    pub orientation: Quat,
    /// Derived world scale
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl NodeTransform {
    /// The identity placement.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Placement at a world position with no rotation or scale.
    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Converts a node-local position into world space.
    #[must_use]
    pub fn to_world_position(&self, local: Vec3) -> Vec3 {
        self.orientation * (self.scale * local) + self.position
    }

    /// Converts a node-local direction into world space.
    #[must_use]
    pub fn to_world_direction(&self, local: Vec3) -> Vec3 {
        self.orientation * local
    }

    /// Converts a world position into node-local space.
    #[must_use]
    pub fn to_local_position(&self, world: Vec3) -> Vec3 {
        (self.orientation.inverse() * (world - self.position)) / self.scale
    }

    /// Converts a world direction into node-local space.
    #[must_use]
    pub fn to_local_direction(&self, world: Vec3) -> Vec3 {
        self.orientation.inverse() * world
    }

    /// Full local-to-world matrix.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.position)
    }

    /// World-to-local matrix.
    #[must_use]
    pub fn inverse_matrix(&self) -> Mat4 {
        self.matrix().inverse()
    }
}

/// Returns a unit vector perpendicular to `v`.
#[must_use]
pub fn perpendicular(v: Vec3) -> Vec3 {
    let mut perp = v.cross(Vec3::X);
    if perp.length_squared() < SQUARED_ZERO {
        // v is parallel to the x axis
        perp = v.cross(Vec3::Y);
    }
    perp.normalize_or_zero()
}

/// Rotates `v` away from itself by `angle` radians in a random direction.
///
/// The deviation plane is picked by spinning `up` (or a perpendicular of `v`
/// when `up` is zero) a random amount around `v`.
#[must_use]
pub fn random_deviant(v: Vec3, angle: f32, up: Vec3, rng: &mut fastrand::Rng) -> Vec3 {
    let axis = v.normalize_or_zero();
    if axis == Vec3::ZERO {
        return v;
    }
    let base_up = if up.length_squared() < SQUARED_ZERO {
        perpendicular(v)
    } else {
        up.normalize()
    };
    let spin = Quat::from_axis_angle(axis, rng.f32() * TAU);
    let new_up = (spin * base_up).normalize_or_zero();
    if new_up == Vec3::ZERO {
        return v;
    }
    Quat::from_axis_angle(new_up, angle) * v
}

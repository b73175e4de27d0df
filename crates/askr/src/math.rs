//! Math types and glam re-exports.
//!
//! We re-export [glam](https://docs.rs/glam) types so users don't need to
//! depend on it directly. [`Transform`] is the local placement of every
//! spatial node: translation, rotation and scale.
//!
//! ## Conventions
//!
//! Matrices are column-major and act on column vectors, so a chain of nodes
//! composes as `global = parent_global * local`. Reading the product from
//! right to left walks from the leaf up to the root.

use std::ops::{Div, DivAssign, Mul, MulAssign};

pub use glam::{IVec2, Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

/// A 3D transform: position, rotation, and scale.
///
/// Equality is exact, component by component. Rigid-body reconciliation
/// relies on that to detect "the parent did not move".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Identity transform (origin, no rotation, uniform scale of 1).
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create a transform at the given position.
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Decompose an affine matrix. Shear is lost.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Return a copy with uniform scale applied.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Compute the 4x4 model matrix (translate * rotate * scale).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Transform a point from this frame into the enclosing one.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    /// Affine composition: the result maps through `child` first, then `self`.
    ///
    /// Exact for uniform scale, which is the only kind the physics side
    /// keeps on a body.
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.transform_point(child.translation),
            rotation: self.rotation * child.rotation,
            scale: self.scale * child.scale,
        }
    }

    /// The transform that undoes `self`, so that
    /// `t.inverse().mul_transform(&t)` is the identity.
    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.inverse();
        let scale = self.scale.recip();
        Transform {
            translation: -(scale * (rotation * self.translation)),
            rotation,
            scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// Component-wise algebra used by the scene data format: translations add,
// scales multiply, rotations multiply.

impl MulAssign for Transform {
    fn mul_assign(&mut self, other: Transform) {
        self.translation += other.translation;
        self.scale *= other.scale;
        self.rotation *= other.rotation;
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(mut self, other: Transform) -> Transform {
        self *= other;
        self
    }
}

impl DivAssign for Transform {
    fn div_assign(&mut self, other: Transform) {
        self.translation -= other.translation;
        self.scale /= other.scale;
        self.rotation *= other.rotation.inverse();
    }
}

impl Div for Transform {
    type Output = Transform;

    fn div(mut self, other: Transform) -> Transform {
        self /= other;
        self
    }
}

/// An axis-aligned screen rectangle in pixels, `min` at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_position_size(position: Vec2, size: Vec2) -> Self {
        Self {
            min: position,
            max: position + size,
        }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

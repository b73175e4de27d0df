//! Collision shapes.
//!
//! A [`Shape`] is plain data: it turns into a rapier `SharedShape` only when
//! a body is built. Nodes share shapes through `Arc<Shape>` and never mutate
//! one in place; scaling produces a new shape.

use std::sync::Arc;

use rapier3d::prelude::SharedShape;

use crate::error::{Error, Result};
use crate::math::Vec3;
use crate::property::Property;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Cuboid { half_extents: Vec3 },
    Ball { radius: f32 },
    /// Upright along Y.
    Cylinder { half_height: f32, radius: f32 },
}

impl Shape {
    /// A box with full side lengths `extents`.
    pub fn cuboid(extents: Vec3) -> Result<Self> {
        if !(extents.is_finite() && extents.min_element() > 0.0) {
            return Err(Error::invalid_argument(format!("box extents must be positive, got {extents}")));
        }
        Ok(Shape::Cuboid {
            half_extents: extents / 2.0,
        })
    }

    pub fn ball(radius: f32) -> Result<Self> {
        positive("sphere radius", radius)?;
        Ok(Shape::Ball { radius })
    }

    pub fn cylinder(radius: f32, height: f32) -> Result<Self> {
        positive("cylinder radius", radius)?;
        positive("cylinder height", height)?;
        Ok(Shape::Cylinder {
            half_height: height / 2.0,
            radius,
        })
    }

    /// Read `{type: "box", extents}`, `{type: "sphere", radius}` or
    /// `{type: "cylinder", radius, height}`. The type is case-insensitive.
    pub fn from_property(property: &Property) -> Result<Self> {
        let kind: String = property.subproperty("type")?.get()?;
        match kind.to_ascii_lowercase().as_str() {
            "box" => Shape::cuboid(property.subproperty("extents")?.get()?),
            "sphere" => Shape::ball(property.subproperty("radius")?.get()?),
            "cylinder" => Shape::cylinder(
                property.subproperty("radius")?.get()?,
                property.subproperty("height")?.get()?,
            ),
            other => Err(Error::invalid_argument(format!(
                "unknown shape type `{other}`; expected box, sphere or cylinder"
            ))),
        }
    }

    /// A copy scaled by `scale`. A ball stays round, so it takes the largest
    /// component; a cylinder's radius takes the larger of x and z.
    pub fn scaled(&self, scale: Vec3) -> Shape {
        match *self {
            Shape::Cuboid { half_extents } => Shape::Cuboid {
                half_extents: half_extents * scale,
            },
            Shape::Ball { radius } => Shape::Ball {
                radius: radius * scale.max_element(),
            },
            Shape::Cylinder { half_height, radius } => Shape::Cylinder {
                half_height: half_height * scale.y,
                radius: radius * scale.x.max(scale.z),
            },
        }
    }

    pub(crate) fn to_rapier(&self) -> SharedShape {
        match *self {
            Shape::Cuboid { half_extents } => SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
            Shape::Ball { radius } => SharedShape::ball(radius),
            Shape::Cylinder { half_height, radius } => SharedShape::cylinder(half_height, radius),
        }
    }
}

fn positive(what: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!("{what} must be positive, got {value}")))
    }
}

/// Interns shapes by value so identical colliders share one allocation.
#[derive(Debug, Default)]
pub struct ShapePool {
    shapes: Vec<Arc<Shape>>,
}

impl ShapePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, shape: Shape) -> Arc<Shape> {
        if let Some(existing) = self.shapes.iter().find(|s| ***s == shape) {
            return existing.clone();
        }
        let shape = Arc::new(shape);
        self.shapes.push(shape.clone());
        shape
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn shape_property(fields: Vec<Property>) -> Property {
        Property::new("shape", fields)
    }

    #[test]
    fn from_property_builds_each_kind() {
        let cube = shape_property(vec![
            Property::new("type", "box"),
            Property::new("extents", Vec3::new(2.0, 4.0, 6.0)),
        ]);
        assert_eq!(
            Shape::from_property(&cube).unwrap(),
            Shape::Cuboid {
                half_extents: Vec3::new(1.0, 2.0, 3.0)
            }
        );

        let ball = shape_property(vec![Property::new("type", "SPHERE"), Property::new("radius", 0.5f32)]);
        assert_eq!(Shape::from_property(&ball).unwrap(), Shape::Ball { radius: 0.5 });

        let can = shape_property(vec![
            Property::new("type", "cylinder"),
            Property::new("radius", 1i64),
            Property::new("height", 3.0f32),
        ]);
        assert_eq!(
            Shape::from_property(&can).unwrap(),
            Shape::Cylinder {
                half_height: 1.5,
                radius: 1.0
            }
        );
    }

    #[test]
    fn malformed_shapes_are_invalid_arguments() {
        let flat = shape_property(vec![
            Property::new("type", "box"),
            Property::new("extents", Vec3::new(1.0, 0.0, 1.0)),
        ]);
        assert_eq!(Shape::from_property(&flat).unwrap_err().kind(), ErrorKind::InvalidArgument);

        let nan = shape_property(vec![Property::new("type", "sphere"), Property::new("radius", f32::NAN)]);
        assert_eq!(Shape::from_property(&nan).unwrap_err().kind(), ErrorKind::InvalidArgument);

        let cone = shape_property(vec![Property::new("type", "cone")]);
        assert_eq!(Shape::from_property(&cone).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn scaling_returns_new_values() {
        let ball = Shape::Ball { radius: 1.0 };
        assert_eq!(ball.scaled(Vec3::new(1.0, 3.0, 2.0)), Shape::Ball { radius: 3.0 });

        let can = Shape::Cylinder {
            half_height: 1.0,
            radius: 1.0,
        };
        assert_eq!(
            can.scaled(Vec3::new(2.0, 0.5, 3.0)),
            Shape::Cylinder {
                half_height: 0.5,
                radius: 3.0
            }
        );
    }

    #[test]
    fn pool_deduplicates_by_value() {
        let mut pool = ShapePool::new();
        let a = pool.intern(Shape::Ball { radius: 1.0 });
        let b = pool.intern(Shape::Ball { radius: 1.0 });
        let c = pool.intern(Shape::Ball { radius: 2.0 });
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(pool.len(), 2);
    }
}

//! Anchored screen-space placement of a GUI node.

use crate::error::{Error, Result};
use crate::math::{Vec2, Vec3};
use crate::property::Property;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginX {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginY {
    #[default]
    Bottom,
    Center,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeMode {
    /// `size` is in pixels.
    #[default]
    Absolute,
    /// `size` is a fraction of the parent's size.
    Relative,
}

/// Where a GUI node sits inside its parent's rectangle.
///
/// Screen coordinates grow right and down; an anchor of `(0, 0)` is the
/// parent's top-left corner and `(1, 1)` its bottom-right corner. The origin
/// picks which point of the node lands on `anchor * parent_size + offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct GuiTransform {
    pub position_anchor: Vec2,
    /// Pixels from the anchor.
    pub position_offset: Vec2,
    pub z_coordinate: f32,
    pub origin_x: OriginX,
    pub origin_y: OriginY,
    pub size_mode: SizeMode,
    pub size: Vec2,
}

impl Default for GuiTransform {
    fn default() -> Self {
        Self {
            position_anchor: Vec2::ZERO,
            position_offset: Vec2::ZERO,
            z_coordinate: 0.0,
            origin_x: OriginX::default(),
            origin_y: OriginY::default(),
            size_mode: SizeMode::default(),
            size: Vec2::ZERO,
        }
    }
}

impl GuiTransform {
    /// Absolute-size transform anchored at the parent's top-left corner.
    pub fn from_offset_size(offset: Vec2, size: Vec2) -> Self {
        Self {
            position_offset: offset,
            origin_y: OriginY::Top,
            size,
            ..Self::default()
        }
    }

    pub fn with_anchor(mut self, anchor: Vec2) -> Self {
        self.position_anchor = anchor;
        self
    }

    pub fn with_origin(mut self, origin_x: OriginX, origin_y: OriginY) -> Self {
        self.origin_x = origin_x;
        self.origin_y = origin_y;
        self
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z_coordinate = z;
        self
    }

    pub fn with_relative_size(mut self, fraction: Vec2) -> Self {
        self.size_mode = SizeMode::Relative;
        self.size = fraction;
        self
    }

    /// Size in pixels inside a parent of `parent_size` pixels.
    pub fn absolute_size(&self, parent_size: Vec2) -> Vec2 {
        match self.size_mode {
            SizeMode::Absolute => self.size,
            SizeMode::Relative => self.size * parent_size,
        }
    }

    /// Top-left corner relative to the parent's top-left corner, with the
    /// z coordinate in `z`.
    pub fn screen_space_offset(&self, parent_size: Vec2) -> Vec3 {
        let size = self.absolute_size(parent_size);
        let mut offset = self.position_offset + self.position_anchor * parent_size;

        match self.origin_x {
            OriginX::Left => {}
            OriginX::Center => offset.x -= size.x / 2.0,
            OriginX::Right => offset.x -= size.x,
        }
        match self.origin_y {
            OriginY::Top => {}
            OriginY::Center => offset.y -= size.y / 2.0,
            OriginY::Bottom => offset.y -= size.y,
        }

        offset.extend(self.z_coordinate)
    }

    /// Read a `{type: "gui_transform", ...}` struct property. Every field but
    /// `type` is optional.
    pub fn from_property(property: &Property) -> Result<Self> {
        let kind: String = property.subproperty("type")?.get()?;
        if kind != "gui_transform" {
            return Err(Error::invalid_argument(format!(
                "property `{}` has type `{kind}`, expected `gui_transform`",
                property.name
            )));
        }

        let defaults = Self::default();
        Ok(Self {
            position_anchor: property.get_optional("position_anchor")?.unwrap_or(defaults.position_anchor),
            position_offset: property.get_optional("position_offset")?.unwrap_or(defaults.position_offset),
            z_coordinate: property.get_optional("z_coordinate")?.unwrap_or(defaults.z_coordinate),
            origin_x: match property.get_optional::<String>("origin_x")?.as_deref() {
                None | Some("left") => OriginX::Left,
                Some("center") => OriginX::Center,
                Some("right") => OriginX::Right,
                Some(other) => return Err(bad_enum("origin_x", other, "left, center, right")),
            },
            origin_y: match property.get_optional::<String>("origin_y")?.as_deref() {
                None | Some("bottom") => OriginY::Bottom,
                Some("center") => OriginY::Center,
                Some("top") => OriginY::Top,
                Some(other) => return Err(bad_enum("origin_y", other, "bottom, center, top")),
            },
            size_mode: match property.get_optional::<String>("size_mode")?.as_deref() {
                None | Some("absolute") => SizeMode::Absolute,
                Some("relative") => SizeMode::Relative,
                Some(other) => return Err(bad_enum("size_mode", other, "absolute, relative")),
            },
            size: property.get_optional("size")?.unwrap_or(defaults.size),
        })
    }
}

fn bad_enum(field: &str, value: &str, valid: &str) -> Error {
    Error::invalid_argument(format!("`{value}` is not a valid {field}; expected one of {valid}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn anchor_and_origin() {
        let parent = Vec2::new(800.0, 600.0);
        let centered = GuiTransform::from_offset_size(Vec2::ZERO, Vec2::new(100.0, 50.0))
            .with_anchor(Vec2::splat(0.5))
            .with_origin(OriginX::Center, OriginY::Center);
        assert_eq!(centered.screen_space_offset(parent), Vec3::new(350.0, 275.0, 0.0));

        // Default origin is bottom-left: the node hangs above its anchor point.
        let bottom = GuiTransform {
            position_offset: Vec2::new(10.0, 600.0),
            size: Vec2::new(20.0, 30.0),
            z_coordinate: 2.0,
            ..GuiTransform::default()
        };
        assert_eq!(bottom.screen_space_offset(parent), Vec3::new(10.0, 570.0, 2.0));
    }

    #[test]
    fn relative_size_scales_with_parent() {
        let t = GuiTransform::default().with_relative_size(Vec2::new(0.5, 0.25));
        assert_eq!(t.absolute_size(Vec2::new(200.0, 400.0)), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn from_property_reads_optional_fields() {
        let property = Property::new(
            "transform",
            vec![
                Property::new("type", "gui_transform"),
                Property::new("position_anchor", Vec2::new(1.0, 0.0)),
                Property::new("origin_x", "right"),
                Property::new("size", Vec2::new(64.0, 32.0)),
            ],
        );
        let t = GuiTransform::from_property(&property).unwrap();
        assert_eq!(t.position_anchor, Vec2::new(1.0, 0.0));
        assert_eq!(t.origin_x, OriginX::Right);
        assert_eq!(t.origin_y, OriginY::Bottom);
        assert_eq!(t.size_mode, SizeMode::Absolute);
        assert_eq!(t.size, Vec2::new(64.0, 32.0));
    }

    #[test]
    fn from_property_rejects_bad_input() {
        let wrong_type = Property::new("transform", vec![Property::new("type", "texture")]);
        assert_eq!(
            GuiTransform::from_property(&wrong_type).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let bad_origin = Property::new(
            "transform",
            vec![Property::new("type", "gui_transform"), Property::new("origin_y", "middle")],
        );
        assert!(GuiTransform::from_property(&bad_origin).is_err());

        let missing_type = Property::new("transform", Vec::<Property>::new());
        assert_eq!(
            GuiTransform::from_property(&missing_type).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}

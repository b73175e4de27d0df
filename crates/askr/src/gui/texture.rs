//! Bordered GUI textures and their 9-slice partition.
//!
//! ```text
//!        l        w-l-r        r
//!     ┌─────┬───────────────┬─────┐
//!   t │ 0,0 │      1,0      │ 2,0 │   corners keep their pixel size,
//!     ├─────┼───────────────┼─────┤   edges stretch along one axis,
//! h-t-b 0,1 │      1,1      │ 2,1 │   the center stretches along both
//!     ├─────┼───────────────┼─────┤
//!   b │ 0,2 │      1,2      │ 2,2 │
//!     └─────┴───────────────┴─────┘
//! ```

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::math::{Vec2, Vec4};
use crate::property::Property;

/// A texture known by path and pixel size. Loading the pixels is up to the
/// renderer that consumes the draw list.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRef {
    pub path: String,
    pub size: Vec2,
}

impl TextureRef {
    pub fn new(path: impl Into<String>, size: Vec2) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Read `{type?: "texture", path, size: [w, h]}`.
    pub fn from_property(property: &Property) -> Result<Self> {
        if let Some(kind) = property.get_optional::<String>("type")? {
            if kind != "texture" {
                return Err(Error::invalid_argument(format!(
                    "property `{}` has type `{kind}`, expected `texture`",
                    property.name
                )));
            }
        }
        let path: String = property.subproperty("path")?.get()?;
        let size: Vec2 = property.subproperty("size")?.get()?;
        if !(size.x > 0.0 && size.y > 0.0) {
            return Err(Error::invalid_argument(format!("texture `{path}` has no area: {size}")));
        }
        Ok(Self::new(path, size))
    }
}

/// A texture plus the border insets (in texture pixels) that stay unstretched.
#[derive(Debug, Clone, PartialEq)]
pub struct GuiTexture {
    pub texture: Arc<TextureRef>,
    pub left_border: f32,
    pub right_border: f32,
    pub top_border: f32,
    pub bottom_border: f32,
    pub color_factor: Vec4,
}

/// One cell of a 9-slice draw, all in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicePart {
    /// Offset of the quad from the rectangle's top-left corner.
    pub quad_offset: Vec2,
    pub quad_size: Vec2,
    /// Offset of the sampled region from the texture's top-left corner.
    pub tex_offset: Vec2,
    pub tex_size: Vec2,
}

impl GuiTexture {
    /// A texture stretched as a whole, without borders.
    pub fn stretched(texture: Arc<TextureRef>) -> Self {
        Self {
            texture,
            left_border: 0.0,
            right_border: 0.0,
            top_border: 0.0,
            bottom_border: 0.0,
            color_factor: Vec4::ONE,
        }
    }

    pub fn with_borders(mut self, left: f32, right: f32, top: f32, bottom: f32) -> Self {
        self.left_border = left;
        self.right_border = right;
        self.top_border = top;
        self.bottom_border = bottom;
        self
    }

    /// Read `{texture: {...}, borders: [l, r, t, b], color_factor?: [r, g, b, a]}`.
    pub fn from_property(property: &Property) -> Result<Self> {
        let texture = TextureRef::from_property(property.subproperty("texture")?)?;
        let borders: Vec4 = property.subproperty("borders")?.get()?;
        if borders.min_element() < 0.0 || !borders.is_finite() {
            return Err(Error::invalid_argument(format!(
                "borders of `{}` must be finite and non-negative, got {borders}",
                texture.path
            )));
        }
        Ok(Self {
            texture: Arc::new(texture),
            left_border: borders.x,
            right_border: borders.y,
            top_border: borders.z,
            bottom_border: borders.w,
            color_factor: property.get_optional("color_factor")?.unwrap_or(Vec4::ONE),
        })
    }

    /// Partition a `rect_size` rectangle and the texture into the 3×3 grid.
    /// Cells whose quad has no area are left out, so zero borders collapse
    /// their row or column.
    pub fn nine_slice(&self, rect_size: Vec2) -> Vec<SlicePart> {
        let tex_size = self.texture.size;
        let near = Vec2::new(self.left_border, self.top_border);
        let far = Vec2::new(self.right_border, self.bottom_border);

        let tex_part_sizes = [near, tex_size - near - far, far];
        let quad_sizes = [near, rect_size - near - far, far];

        let mut parts = Vec::with_capacity(9);
        let mut quad_offset = Vec2::ZERO;
        let mut tex_offset = Vec2::ZERO;
        for x in 0..3 {
            quad_offset.y = 0.0;
            tex_offset.y = 0.0;
            for y in 0..3 {
                let quad_size = Vec2::new(quad_sizes[x].x, quad_sizes[y].y);
                let tex_size = Vec2::new(tex_part_sizes[x].x, tex_part_sizes[y].y);
                if quad_size.x > 0.0 && quad_size.y > 0.0 {
                    parts.push(SlicePart {
                        quad_offset,
                        quad_size,
                        tex_offset,
                        tex_size,
                    });
                }
                quad_offset.y += quad_sizes[y].y;
                tex_offset.y += tex_part_sizes[y].y;
            }
            quad_offset.x += quad_sizes[x].x;
            tex_offset.x += tex_part_sizes[x].x;
        }
        parts
    }
}

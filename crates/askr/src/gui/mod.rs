//! # GUI — Anchored Rectangles on a Canvas
//!
//! GUI nodes live in the same [`SceneTree`] as spatial nodes and follow the
//! same deferred add/remove and enable rules. Only their geometry differs:
//! instead of a 3D transform each carries a [`GuiTransform`], placed inside
//! its parent's rectangle.
//!
//! ```text
//! canvas (spatial, has a pixel size)
//!   └─ panel      GuiParent::Canvas(canvas)
//!        ├─ button    GuiParent::Node(panel)
//!        └─ label     GuiParent::Node(panel)
//! ```
//!
//! A GUI node's parent is either another GUI node or a canvas, modeled as
//! [`GuiParent`]. Sizes resolve top-down: a relative size is a fraction of
//! the GUI parent's absolute size, or of the canvas size at the top.

mod button;
mod canvas;
mod texture;
mod transform;

pub use button::ButtonNode;
pub use canvas::CanvasState;
pub use texture::{GuiTexture, SlicePart, TextureRef};
pub use transform::{GuiTransform, OriginX, OriginY, SizeMode};

use crate::error::{Error, Result};
use crate::math::{Rect, Vec2, Vec3};
use crate::tree::{Geometry, NodeId, NodeKind, SceneTree};

/// The structural parent of a GUI node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiParent {
    Node(NodeId),
    Canvas(NodeId),
    None,
}

impl SceneTree {
    pub fn gui_transform(&self, id: NodeId) -> Result<&GuiTransform> {
        match &self.entry(id)?.geometry {
            Geometry::Gui(transform) => Ok(transform),
            _ => Err(not_gui(id)),
        }
    }

    /// Replace the placement. An attached node is re-sorted in its canvas's
    /// draw order, since z may have changed.
    pub fn set_gui_transform(&mut self, id: NodeId, transform: GuiTransform) -> Result<()> {
        match &mut self.entry_mut(id)?.geometry {
            Geometry::Gui(current) => *current = transform,
            _ => return Err(not_gui(id)),
        }
        if self.is_attached(id) {
            self.unregister_gui_node(id);
            self.register_gui_node(id);
        }
        Ok(())
    }

    pub fn gui_parent(&self, id: NodeId) -> Result<GuiParent> {
        self.gui_transform(id)?;
        let Some(parent) = self.parent(id)? else {
            return Ok(GuiParent::None);
        };
        Ok(match self.kind(parent)? {
            NodeKind::Gui => GuiParent::Node(parent),
            NodeKind::Canvas => GuiParent::Canvas(parent),
            _ => GuiParent::None,
        })
    }

    /// The canvas at the top of this node's GUI chain.
    pub fn gui_canvas(&self, id: NodeId) -> Result<NodeId> {
        match self.gui_parent(id)? {
            GuiParent::Node(parent) => self.gui_canvas(parent),
            GuiParent::Canvas(canvas) => Ok(canvas),
            GuiParent::None => Err(Error::invalid_state(format!("GUI node {id} is not under a canvas"))),
        }
    }

    /// Absolute size of the GUI parent, or the canvas size.
    pub fn gui_parent_size(&self, id: NodeId) -> Result<Vec2> {
        match self.gui_parent(id)? {
            GuiParent::Node(parent) => self.gui_absolute_size(parent),
            GuiParent::Canvas(canvas) => self.canvas_size(canvas),
            GuiParent::None => Err(Error::invalid_state(format!("GUI node {id} has no parent to size against"))),
        }
    }

    pub fn gui_absolute_size(&self, id: NodeId) -> Result<Vec2> {
        let transform = self.gui_transform(id)?;
        match transform.size_mode {
            SizeMode::Absolute => Ok(transform.size),
            SizeMode::Relative => Ok(transform.absolute_size(self.gui_parent_size(id)?)),
        }
    }

    /// Top-left corner in canvas pixels; `z` accumulates down the chain.
    pub fn gui_screen_position(&self, id: NodeId) -> Result<Vec3> {
        let local = self.gui_transform(id)?.screen_space_offset(self.gui_parent_size(id)?);
        match self.gui_parent(id)? {
            GuiParent::Node(parent) => Ok(local + self.gui_screen_position(parent)?),
            GuiParent::Canvas(_) | GuiParent::None => Ok(local),
        }
    }

    pub fn gui_rect(&self, id: NodeId) -> Result<Rect> {
        let position = self.gui_screen_position(id)?.truncate();
        Ok(Rect::from_position_size(position, self.gui_absolute_size(id)?))
    }

    /// Whether `point` (canvas pixels) lies inside the node, edges included.
    pub fn gui_contains_point(&self, id: NodeId, point: Vec2) -> Result<bool> {
        Ok(self.gui_rect(id)?.contains(point))
    }

    pub(crate) fn register_gui_node(&mut self, id: NodeId) {
        let (Ok(canvas), Ok(transform)) = (self.gui_canvas(id), self.gui_transform(id)) else {
            log::warn!("attached GUI node {id} has no canvas; it won't be drawn");
            return;
        };
        let z = transform.z_coordinate;
        if let Ok(state) = self.canvas_state_mut(canvas) {
            state.insert_sorted(id, z);
        }
    }

    pub(crate) fn unregister_gui_node(&mut self, id: NodeId) {
        if let Ok(canvas) = self.gui_canvas(id) {
            if let Ok(state) = self.canvas_state_mut(canvas) {
                state.remove(id);
            }
        }
    }
}

fn not_gui(id: NodeId) -> Error {
    Error::invalid_argument(format!("node {id} is not a GUI node"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tree::NodeBuilder;

    /// canvas 800x600 → panel (relative half size, centered) → child
    fn layout() -> (SceneTree, NodeId, NodeId, NodeId) {
        let mut tree = SceneTree::new();
        let canvas = tree.spawn(NodeBuilder::canvas().with_canvas_size(Vec2::new(800.0, 600.0)));
        let panel = tree.spawn(
            NodeBuilder::gui().with_gui_transform(
                GuiTransform::default()
                    .with_anchor(Vec2::splat(0.5))
                    .with_origin(OriginX::Center, OriginY::Center)
                    .with_relative_size(Vec2::splat(0.5)),
            ),
        );
        let child = tree.spawn(
            NodeBuilder::gui().with_gui_transform(
                GuiTransform::from_offset_size(Vec2::new(10.0, 20.0), Vec2::new(30.0, 40.0)).with_z(1.0),
            ),
        );
        tree.queue_add_child(canvas, panel).unwrap();
        tree.queue_add_child(panel, child).unwrap();
        tree.advance(canvas).unwrap();
        (tree, canvas, panel, child)
    }

    #[test]
    fn parents_resolve_to_the_tagged_union() {
        let (tree, canvas, panel, child) = layout();
        assert_eq!(tree.gui_parent(panel).unwrap(), GuiParent::Canvas(canvas));
        assert_eq!(tree.gui_parent(child).unwrap(), GuiParent::Node(panel));
        assert_eq!(tree.gui_canvas(child).unwrap(), canvas);
        assert!(tree.gui_parent(canvas).is_err());
    }

    #[test]
    fn positions_compose_top_down() {
        let (tree, _, panel, child) = layout();
        assert_eq!(tree.gui_absolute_size(panel).unwrap(), Vec2::new(400.0, 300.0));
        assert_eq!(tree.gui_screen_position(panel).unwrap(), Vec3::new(200.0, 150.0, 0.0));
        assert_eq!(tree.gui_screen_position(child).unwrap(), Vec3::new(210.0, 170.0, 1.0));

        assert!(tree.gui_contains_point(child, Vec2::new(210.0, 170.0)).unwrap());
        assert!(tree.gui_contains_point(child, Vec2::new(240.0, 210.0)).unwrap());
        assert!(!tree.gui_contains_point(child, Vec2::new(241.0, 190.0)).unwrap());
    }

    #[test]
    fn orphan_gui_node_has_no_size_reference() {
        let mut tree = SceneTree::new();
        let lonely = tree.spawn(NodeBuilder::gui());
        assert_eq!(tree.gui_parent(lonely).unwrap(), GuiParent::None);
        assert_eq!(tree.gui_parent_size(lonely).unwrap_err().kind(), ErrorKind::InvalidState);
        // Absolute sizes don't need a parent.
        assert_eq!(tree.gui_absolute_size(lonely).unwrap(), Vec2::ZERO);
    }

    #[test]
    fn changing_z_resorts_the_canvas() {
        let (mut tree, canvas, panel, child) = layout();
        tree.set_root(canvas).unwrap();
        assert_eq!(tree.canvas_draw_order(canvas).unwrap(), vec![child, panel]);

        let lifted = tree.gui_transform(panel).unwrap().clone().with_z(3.0);
        tree.set_gui_transform(panel, lifted).unwrap();
        assert_eq!(tree.canvas_draw_order(canvas).unwrap(), vec![panel, child]);
    }
}

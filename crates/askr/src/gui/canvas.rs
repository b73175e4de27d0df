//! Canvases: spatial nodes that root GUI trees.
//!
//! Every attached GUI node below a canvas is registered in the canvas's draw
//! order, kept sorted by z coordinate, far (high z) first.

use crate::error::{Error, Result};
use crate::math::Vec2;
use crate::render::RenderingServer;
use crate::tree::{Geometry, NodeId, SceneTree};

#[derive(Debug, Clone)]
pub struct CanvasState {
    /// Pixel size. `None` follows the rendering viewport.
    pub size: Option<Vec2>,
    /// Drawn straight onto the screen rather than placed in the 3D world.
    pub screen_overlayed: bool,
    draw_order: Vec<(NodeId, f32)>,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            size: None,
            screen_overlayed: true,
            draw_order: Vec::new(),
        }
    }
}

impl CanvasState {
    /// Insert before the first entry whose z is not greater than `z`, so the
    /// newest of equal-z nodes draws first.
    pub(crate) fn insert_sorted(&mut self, id: NodeId, z: f32) {
        let pos = self
            .draw_order
            .iter()
            .position(|&(_, other)| z >= other)
            .unwrap_or(self.draw_order.len());
        self.draw_order.insert(pos, (id, z));
    }

    pub(crate) fn remove(&mut self, id: NodeId) {
        self.draw_order.retain(|&(node, _)| node != id);
    }

    pub fn draw_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.draw_order.iter().map(|&(id, _)| id)
    }

    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            size: self.size,
            screen_overlayed: self.screen_overlayed,
            draw_order: Vec::new(),
        }
    }
}

impl SceneTree {
    fn canvas_state(&self, id: NodeId) -> Result<&CanvasState> {
        match &self.entry(id)?.geometry {
            Geometry::Canvas(_, canvas) => Ok(canvas),
            _ => Err(Error::invalid_argument(format!("node {id} is not a canvas"))),
        }
    }

    pub(crate) fn canvas_state_mut(&mut self, id: NodeId) -> Result<&mut CanvasState> {
        match &mut self.entry_mut(id)?.geometry {
            Geometry::Canvas(_, canvas) => Ok(canvas),
            _ => Err(Error::invalid_argument(format!("node {id} is not a canvas"))),
        }
    }

    /// The canvas's pixel size: its own, else the rendering viewport.
    pub fn canvas_size(&self, id: NodeId) -> Result<Vec2> {
        if let Some(size) = self.canvas_state(id)?.size {
            return Ok(size);
        }
        self.get_resource::<RenderingServer>()
            .map(RenderingServer::viewport_size)
            .ok_or_else(|| Error::invalid_state(format!("canvas {id} has no size and there is no viewport")))
    }

    pub fn set_canvas_size(&mut self, id: NodeId, size: Option<Vec2>) -> Result<()> {
        self.canvas_state_mut(id)?.size = size;
        Ok(())
    }

    pub fn is_screen_overlayed(&self, id: NodeId) -> Result<bool> {
        Ok(self.canvas_state(id)?.screen_overlayed)
    }

    pub fn set_screen_overlayed(&mut self, id: NodeId, overlayed: bool) -> Result<()> {
        self.canvas_state_mut(id)?.screen_overlayed = overlayed;
        Ok(())
    }

    /// Attached GUI nodes of the canvas, in draw order.
    pub fn canvas_draw_order(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.canvas_state(id)?.draw_order().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gui::GuiTransform;
    use crate::tree::NodeBuilder;

    fn gui_at_z(tree: &mut SceneTree, z: f32) -> NodeId {
        tree.spawn(NodeBuilder::gui().with_gui_transform(GuiTransform::default().with_z(z)))
    }

    #[test]
    fn draw_order_is_z_descending() {
        let mut tree = SceneTree::new();
        let canvas = tree.spawn(NodeBuilder::canvas().with_canvas_size(Vec2::new(640.0, 480.0)));
        let low = gui_at_z(&mut tree, 0.0);
        let high = gui_at_z(&mut tree, 5.0);
        let mid = gui_at_z(&mut tree, 1.0);
        let tie = gui_at_z(&mut tree, 1.0);
        for node in [low, high, mid, tie] {
            tree.queue_add_child(canvas, node).unwrap();
        }
        tree.set_root(canvas).unwrap();
        tree.advance(canvas).unwrap();

        assert_eq!(tree.canvas_draw_order(canvas).unwrap(), vec![high, tie, mid, low]);

        tree.queue_remove_child(canvas, mid).unwrap();
        tree.advance(canvas).unwrap();
        assert_eq!(tree.canvas_draw_order(canvas).unwrap(), vec![high, tie, low]);
    }

    #[test]
    fn size_falls_back_to_viewport() {
        let mut tree = SceneTree::new();
        let canvas = tree.spawn(NodeBuilder::canvas());
        assert_eq!(tree.canvas_size(canvas).unwrap_err().kind(), ErrorKind::InvalidState);

        tree.insert_resource(RenderingServer::new(Vec2::new(1280.0, 720.0)));
        assert_eq!(tree.canvas_size(canvas).unwrap(), Vec2::new(1280.0, 720.0));

        tree.set_canvas_size(canvas, Some(Vec2::splat(100.0))).unwrap();
        assert_eq!(tree.canvas_size(canvas).unwrap(), Vec2::splat(100.0));
    }
}

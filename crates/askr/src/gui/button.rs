use crate::error::Result;
use crate::input::{MouseButton, PointerState};
use crate::render::DrawContext;
use crate::tree::{Node, NodeId, SceneTree};

use super::GuiTexture;

/// A GUI node drawn with one texture while idle and another while pressed.
#[derive(Debug, Clone, Default)]
pub struct ButtonNode {
    pub idle_texture: Option<GuiTexture>,
    pub pressed_texture: Option<GuiTexture>,
}

impl ButtonNode {
    pub fn new(idle_texture: GuiTexture, pressed_texture: GuiTexture) -> Self {
        Self {
            idle_texture: Some(idle_texture),
            pressed_texture: Some(pressed_texture),
        }
    }

    /// The primary pointer button is down over the button's rectangle.
    pub fn is_pressed(tree: &SceneTree, id: NodeId) -> bool {
        let Some(pointer) = tree.get_resource::<PointerState>() else {
            return false;
        };
        pointer.pressed(MouseButton::Left) && tree.gui_contains_point(id, pointer.position()).unwrap_or(false)
    }
}

impl Node for ButtonNode {
    fn draw(&self, ctx: &mut DrawContext<'_>) -> Result<()> {
        let texture = if Self::is_pressed(ctx.tree(), ctx.id()) {
            &self.pressed_texture
        } else {
            &self.idle_texture
        };
        match texture {
            Some(texture) => ctx.draw_rectangle(texture),
            None => Ok(()),
        }
    }

    fn clone_node(&self) -> Option<Box<dyn Node>> {
        Some(Box::new(self.clone()))
    }
}

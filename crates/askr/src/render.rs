//! # Rendering — Drawable Registry and Draw Lists
//!
//! The tree doesn't talk to a GPU. Nodes that draw register with the
//! [`RenderingServer`] resource when they attach and unregister when they are
//! destroyed; [`RenderingServer::render`] then asks each enabled registrant
//! to describe itself into a [`DrawList`], which a backend consumes.
//!
//! ```text
//!  attach ──► RenderingServer.register(id, program)
//!                   │  drawables sorted by program id (stable)
//!                   ▼
//!  render ──► for each enabled drawable:
//!               node.draw(DrawContext)  ──► DrawCommand::Mesh
//!               canvas? each GUI node in z order
//!                    node.draw(DrawContext) ──► DrawCommand::Quad × 9-slice
//! ```
//!
//! ## Design Decisions
//!
//! **Program-id ordering.** A node reports the shader program it draws with
//! through [`Node::program_id`](crate::tree::Node::program_id). Registrants
//! are kept sorted by that id so consecutive commands share state; equal ids
//! keep registration order. `0` means "no single program" (canvases).
//!
//! **GUI nodes go through their canvas.** GUI nodes are not registered here;
//! the canvas draws them in its own z order, so one canvas is one layer.

use std::sync::Arc;

use crate::error::Result;
use crate::gui::{GuiTexture, TextureRef};
use crate::math::{Mat4, Vec2, Vec4};
use crate::tree::{NodeId, NodeKind, SceneTree};

/// Registry of drawable nodes plus the viewport they draw into.
#[derive(Debug, Clone)]
pub struct RenderingServer {
    drawables: Vec<(u32, NodeId)>,
    viewport_size: Vec2,
}

impl RenderingServer {
    pub fn new(viewport_size: Vec2) -> Self {
        Self {
            drawables: Vec::new(),
            viewport_size,
        }
    }

    pub fn viewport_size(&self) -> Vec2 {
        self.viewport_size
    }

    pub fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport_size = size;
    }

    /// Register after every drawable with a program id `<= program`.
    pub fn register(&mut self, id: NodeId, program: u32) {
        if self.drawables.iter().any(|&(_, node)| node == id) {
            return;
        }
        let pos = self
            .drawables
            .iter()
            .position(|&(other, _)| other > program)
            .unwrap_or(self.drawables.len());
        self.drawables.insert(pos, (program, id));
        log::trace!("registered drawable {id} with program {program}");
    }

    pub fn unregister(&mut self, id: NodeId) {
        self.drawables.retain(|&(_, node)| node != id);
    }

    pub fn drawables(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.drawables.iter().map(|&(_, id)| id)
    }

    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    /// Collect the draw commands of every enabled registrant.
    pub fn render(&self, tree: &SceneTree) -> DrawList {
        let mut list = DrawList::default();
        for &(program, id) in &self.drawables {
            if !tree.is_enabled(id) {
                continue;
            }
            tree.draw_node(id, program, &mut list);

            if matches!(tree.kind(id), Ok(NodeKind::Canvas)) {
                for gui in tree.canvas_draw_order(id).unwrap_or_default() {
                    if tree.is_enabled(gui) {
                        tree.draw_node(gui, 0, &mut list);
                    }
                }
            }
        }
        list
    }
}

impl Default for RenderingServer {
    fn default() -> Self {
        Self::new(Vec2::new(1280.0, 720.0))
    }
}

/// One textured screen-space quad of a GUI node.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadCommand {
    pub node: NodeId,
    pub canvas: NodeId,
    pub texture: Arc<TextureRef>,
    /// Top-left corner in canvas pixels.
    pub position: Vec2,
    pub size: Vec2,
    pub z: f32,
    /// Sampled region, normalized to the texture size.
    pub uv_min: Vec2,
    pub uv_max: Vec2,
    pub color: Vec4,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Mesh {
        node: NodeId,
        program: u32,
        mesh: String,
        model: Mat4,
    },
    Quad(QuadCommand),
}

/// Everything one [`RenderingServer::render`] produced, in draw order.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn quads(&self) -> impl Iterator<Item = &QuadCommand> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Quad(quad) => Some(quad),
            DrawCommand::Mesh { .. } => None,
        })
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

/// What [`Node::draw`](crate::tree::Node::draw) gets: read access to the tree
/// and the list to append to.
pub struct DrawContext<'a> {
    tree: &'a SceneTree,
    id: NodeId,
    program: u32,
    list: &'a mut DrawList,
}

impl<'a> DrawContext<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &SceneTree {
        self.tree
    }

    /// Draw a mesh with the node's global matrix.
    pub fn draw_mesh(&mut self, mesh: impl Into<String>) -> Result<()> {
        let model = self.tree.global_matrix(self.id)?;
        self.list.push(DrawCommand::Mesh {
            node: self.id,
            program: self.program,
            mesh: mesh.into(),
            model,
        });
        Ok(())
    }

    /// Draw the GUI node's rectangle with a 9-slice texture.
    pub fn draw_rectangle(&mut self, texture: &GuiTexture) -> Result<()> {
        let position = self.tree.gui_screen_position(self.id)?;
        let size = self.tree.gui_absolute_size(self.id)?;
        let canvas = self.tree.gui_canvas(self.id)?;
        let tex_size = texture.texture.size;

        for part in texture.nine_slice(size) {
            self.list.push(DrawCommand::Quad(QuadCommand {
                node: self.id,
                canvas,
                texture: texture.texture.clone(),
                position: position.truncate() + part.quad_offset,
                size: part.quad_size,
                z: position.z,
                uv_min: part.tex_offset / tex_size,
                uv_max: (part.tex_offset + part.tex_size) / tex_size,
                color: texture.color_factor,
            }));
        }
        Ok(())
    }
}

impl SceneTree {
    /// Render with the tree's own [`RenderingServer`], if it has one.
    pub fn render(&self) -> DrawList {
        self.get_resource::<RenderingServer>()
            .map(|server| server.render(self))
            .unwrap_or_default()
    }

    fn draw_node(&self, id: NodeId, program: u32, list: &mut DrawList) {
        let Some(behavior) = self.entry(id).ok().and_then(|e| e.behavior.as_deref()) else {
            return;
        };
        let mut ctx = DrawContext {
            tree: self,
            id,
            program,
            list,
        };
        if let Err(err) = behavior.draw(&mut ctx) {
            log::error!("draw of node `{}` ({id}) failed: {err}", self.name(id).unwrap_or_default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui::{ButtonNode, GuiTransform};
    use crate::input::{MouseButton, PointerState};
    use crate::tree::{Node, NodeBuilder};

    #[derive(Clone)]
    struct Mesh(u32);

    impl Node for Mesh {
        fn program_id(&self) -> Option<u32> {
            Some(self.0)
        }

        fn draw(&self, ctx: &mut DrawContext<'_>) -> Result<()> {
            ctx.draw_mesh(format!("mesh{}", self.0))
        }
    }

    fn mesh_names(list: &DrawList) -> Vec<String> {
        list.commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Mesh { mesh, .. } => Some(mesh.clone()),
                DrawCommand::Quad(_) => None,
            })
            .collect()
    }

    #[test]
    fn drawables_sort_stably_by_program() {
        let mut tree = SceneTree::new();
        tree.insert_resource(RenderingServer::default());
        let root = tree.spawn(NodeBuilder::spatial());
        for program in [2, 1, 2, 1] {
            let node = tree.spawn(NodeBuilder::spatial().with_behavior(Mesh(program)));
            tree.queue_add_child(root, node).unwrap();
        }
        tree.set_root(root).unwrap();
        tree.advance(root).unwrap();

        let list = tree.render();
        assert_eq!(mesh_names(&list), ["mesh1", "mesh1", "mesh2", "mesh2"]);
    }

    #[test]
    fn disabled_and_destroyed_nodes_do_not_draw() {
        let mut tree = SceneTree::new();
        tree.insert_resource(RenderingServer::default());
        let root = tree.spawn(NodeBuilder::spatial());
        let a = tree.spawn(NodeBuilder::spatial().with_behavior(Mesh(1)));
        let b = tree.spawn(NodeBuilder::spatial().with_behavior(Mesh(2)));
        tree.queue_add_child(root, a).unwrap();
        tree.queue_add_child(root, b).unwrap();
        tree.set_root(root).unwrap();
        tree.advance(root).unwrap();
        assert_eq!(tree.render().len(), 2);

        tree.disable(a).unwrap();
        assert_eq!(mesh_names(&tree.render()), ["mesh2"]);

        tree.queue_remove_child(root, b).unwrap();
        tree.advance(root).unwrap();
        assert!(tree.render().is_empty());
        assert_eq!(tree.get_resource::<RenderingServer>().unwrap().drawable_count(), 1);
    }

    #[test]
    fn button_draws_its_pressed_texture_under_the_pointer() {
        let idle = GuiTexture::stretched(Arc::new(TextureRef::new("idle.png", Vec2::splat(8.0))));
        let pressed = GuiTexture::stretched(Arc::new(TextureRef::new("pressed.png", Vec2::splat(8.0))));

        let mut tree = SceneTree::new();
        tree.insert_resource(RenderingServer::new(Vec2::new(320.0, 240.0)));
        tree.insert_resource(PointerState::new());
        let canvas = tree.spawn(NodeBuilder::canvas());
        let button = tree.spawn(
            NodeBuilder::gui()
                .with_gui_transform(GuiTransform::from_offset_size(Vec2::new(10.0, 10.0), Vec2::new(50.0, 20.0)))
                .with_behavior(ButtonNode::new(idle, pressed)),
        );
        tree.queue_add_child(canvas, button).unwrap();
        tree.set_root(canvas).unwrap();
        tree.advance(canvas).unwrap();

        let list = tree.render();
        let quad = list.quads().next().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(quad.texture.path, "idle.png");
        assert_eq!(quad.position, Vec2::new(10.0, 10.0));
        assert_eq!(quad.size, Vec2::new(50.0, 20.0));
        assert_eq!((quad.uv_min, quad.uv_max), (Vec2::ZERO, Vec2::ONE));

        let pointer = tree.get_resource_mut::<PointerState>().unwrap();
        pointer.set_position(Vec2::new(30.0, 15.0));
        pointer.press(MouseButton::Left);
        assert!(ButtonNode::is_pressed(&tree, button));
        assert_eq!(tree.render().quads().next().unwrap().texture.path, "pressed.png");

        // Pressed outside the rectangle is still idle.
        tree.get_resource_mut::<PointerState>().unwrap().set_position(Vec2::new(100.0, 100.0));
        assert_eq!(tree.render().quads().next().unwrap().texture.path, "idle.png");
    }
}

//! # Nodes — Behavior, Hooks, and Enable State
//!
//! The data every node shares (name, enabled flags, links, geometry) lives in
//! the [`SceneTree`]. What makes one node type different from another lives
//! in its behavior: a boxed value implementing [`Node`].
//!
//! ```text
//! ┌──────────────── SceneTree slot ────────────────┐
//! │ NodeState   name, enabled, parent_enabled      │
//! │ links       parent, children, queued add/remove│
//! │ geometry    Spatial | Canvas | Gui | RigidBody │
//! │ behavior    Box<dyn Node>  ← your type         │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! ## Hooks
//!
//! Every hook has a do-nothing default. Hooks that can change the world get a
//! [`NodeContext`], which lends out the whole tree plus the node's own id.
//! A hook may queue additions and removals anywhere, including removing its
//! own node; those take effect at the next flush.
//!
//! A hook returning `Err` is logged by the traversal that called it and the
//! traversal moves on to the next node.
//!
//! ## Enable state
//!
//! A node is effectively enabled when its own flag and its parent's effective
//! state are both true. `on_enable` / `on_disable` fire once per edge of the
//! effective state, never on redundant calls, and the edge propagates to the
//! children.

use std::any::Any;

use crate::error::{Error, Result};
use crate::input::PointerState;
use crate::render::{DrawContext, RenderingServer};
use crate::time::Time;

use super::{NodeBuilder, NodeId, SceneTree};

#[cfg(feature = "physics3d")]
use crate::physics::PhysicsServer;

/// Downcasting support for node behaviors. Implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-type node behavior.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone)]
/// struct Spinner { speed: f32 }
///
/// impl Node for Spinner {
///     fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
///         let id = ctx.id();
///         let dt = ctx.time().map_or(0.0, |t| t.delta_secs());
///         let rotation = ctx.tree().rotation(id)? * Quat::from_rotation_y(self.speed * dt);
///         ctx.tree_mut().set_rotation(id, rotation)
///     }
///
///     fn clone_node(&self) -> Option<Box<dyn Node>> {
///         Some(Box::new(self.clone()))
///     }
/// }
/// ```
pub trait Node: AsAny {
    /// Called once per tick, after the node's children were advanced.
    fn update(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_enable(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called when the node joins a tree that has a root.
    fn on_attach(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called right before an attached node is destroyed.
    fn on_detach(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// A rigid body with contact reporting is touching `other`. Called once
    /// per physics step for as long as the contact lasts.
    fn on_contact(&mut self, _ctx: &mut NodeContext<'_>, _other: NodeId) -> Result<()> {
        Ok(())
    }

    /// Shader program this node draws with, or `None` if it doesn't draw.
    /// `Some(0)` means "draws, but with no single program".
    fn program_id(&self) -> Option<u32> {
        None
    }

    fn draw(&self, _ctx: &mut DrawContext<'_>) -> Result<()> {
        Ok(())
    }

    /// A fresh copy of this behavior for [`SceneTree::copy`]. Types that
    /// return `None` can't be copied.
    fn clone_node(&self) -> Option<Box<dyn Node>> {
        None
    }
}

/// Behavior of the built-in node types: no hooks, nothing drawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyNode;

impl Node for EmptyNode {
    fn clone_node(&self) -> Option<Box<dyn Node>> {
        Some(Box::new(*self))
    }
}

/// Identity and enable flags of a node.
#[derive(Debug, Clone)]
pub(crate) struct NodeState {
    pub name: String,
    pub enabled: bool,
    pub parent_enabled: bool,
    pub was_enabled_before: bool,
}

impl NodeState {
    pub fn new(name: String, enabled: bool) -> Self {
        Self {
            name,
            enabled,
            parent_enabled: true,
            was_enabled_before: enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.parent_enabled
    }
}

// ── NodeContext ─────────────────────────────────────────────────────────

/// What a hook gets to work with: the tree and its own id.
///
/// The node's own behavior is lent to the hook as `&mut self`, so looking it
/// up through the tree during the hook finds nothing.
pub struct NodeContext<'a> {
    tree: &'a mut SceneTree,
    id: NodeId,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(tree: &'a mut SceneTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &SceneTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SceneTree {
        self.tree
    }

    pub fn name(&self) -> &str {
        self.tree.name(self.id).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.tree.parent(self.id).ok().flatten()
    }

    /// Queue this node's removal from its parent. Takes effect when the
    /// parent next flushes, never during the current traversal.
    pub fn queue_remove_self(&mut self) -> Result<()> {
        let parent = self
            .parent()
            .ok_or_else(|| Error::invalid_state("a node without a parent can't remove itself"))?;
        self.tree.queue_remove_child(parent, self.id)
    }

    /// Spawn a node and queue it as a child of this node.
    pub fn spawn_child(&mut self, builder: NodeBuilder) -> Result<NodeId> {
        let child = self.tree.spawn(builder);
        self.tree.queue_add_child(self.id, child)?;
        Ok(child)
    }

    /// Deep-copy this node and its subtree while one of its hooks runs.
    /// `this` is the hook's own behavior, which is out of the tree for now.
    /// The copy is detached; queue it wherever it should go.
    pub fn copy_self(&mut self, this: &dyn Node) -> Result<NodeId> {
        self.tree.copy_lent(self.id, Some(this))
    }

    /// Root of the tree this node is attached to.
    pub fn owning_root(&self) -> Result<NodeId> {
        if self.tree.is_attached(self.id) {
            self.tree.owning_root(self.id)
        } else {
            Err(Error::invalid_state(format!("node {} is not attached to a tree", self.id)))
        }
    }

    pub fn rendering(&mut self) -> Result<&mut RenderingServer> {
        self.owning_root()?;
        self.tree
            .get_resource_mut::<RenderingServer>()
            .ok_or_else(|| Error::invalid_state("the tree has no rendering server"))
    }

    #[cfg(feature = "physics3d")]
    pub fn physics(&mut self) -> Result<&mut PhysicsServer> {
        self.owning_root()?;
        self.tree
            .get_resource_mut::<PhysicsServer>()
            .ok_or_else(|| Error::invalid_state("the tree has no physics server"))
    }

    pub fn pointer(&self) -> Option<&PointerState> {
        self.tree.get_resource::<PointerState>()
    }

    pub fn time(&self) -> Option<&Time> {
        self.tree.get_resource::<Time>()
    }
}

// ── Enable / disable ────────────────────────────────────────────────────

impl SceneTree {
    /// Effective enable state: own flag and parent's effective state.
    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.entry(id).is_ok_and(|e| e.state.is_enabled())
    }

    /// The node's own flag, regardless of its ancestors.
    pub fn is_self_enabled(&self, id: NodeId) -> bool {
        self.entry(id).is_ok_and(|e| e.state.enabled)
    }

    pub fn enable(&mut self, id: NodeId) -> Result<()> {
        self.entry_mut(id)?.state.enabled = true;
        self.settle_enable_edge(id);
        Ok(())
    }

    pub fn disable(&mut self, id: NodeId) -> Result<()> {
        self.entry_mut(id)?.state.enabled = false;
        self.settle_enable_edge(id);
        Ok(())
    }

    /// The parent's effective state changed (or the node was just adopted).
    pub(crate) fn on_parent_enable_disable(&mut self, id: NodeId, parent_enabled: bool) {
        let Ok(entry) = self.entry_mut(id) else {
            return;
        };
        entry.state.parent_enabled = parent_enabled;
        self.settle_enable_edge(id);
    }

    /// Compare the effective state to the last one seen; on an edge, fire
    /// the hook and tell the children.
    fn settle_enable_edge(&mut self, id: NodeId) {
        let Ok(entry) = self.entry_mut(id) else {
            return;
        };
        let now = entry.state.is_enabled();
        if now == entry.state.was_enabled_before {
            return;
        }
        entry.state.was_enabled_before = now;
        let children = entry.children.clone();

        if entry.behavior.is_some() {
            self.fire_enable_hook(id, now);
        } else {
            // The node is inside one of its own hooks; the edge waits for it.
            entry.pending_edges.push(now);
        }

        for child in children {
            self.on_parent_enable_disable(child, now);
        }
    }

    pub(crate) fn fire_enable_hook(&mut self, id: NodeId, enabled: bool) {
        if enabled {
            self.run_hook(id, "on_enable", |node, ctx| node.on_enable(ctx));
        } else {
            self.run_hook(id, "on_disable", |node, ctx| node.on_disable(ctx));
        }
    }
}

//! # Scene Tree — Owned Nodes with Deferred Mutation
//!
//! The [`SceneTree`] stores every node, addressed by [`NodeId`]. Structure is
//! expressed with links: each node records its ordered live children (the
//! parent's ownership record) and a non-owning back-reference to its parent.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ SceneTree                                            │
//! │                                                      │
//! │  ids:   IdAllocator       generational NodeIds       │
//! │  slots: Vec<Option<NodeEntry>>   indexed by id       │
//! │  root:  Option<NodeId>    the attached root          │
//! │  resources: HashMap<TypeId, Box<dyn Any>>            │
//! │    RenderingServer, PhysicsServer, PointerState ...  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Deferred mutation
//!
//! [`queue_add_child`](SceneTree::queue_add_child) and
//! [`queue_remove_child`](SceneTree::queue_remove_child) only append to a
//! node's queues. Nothing moves until [`advance`](SceneTree::advance)
//! reaches that node, which runs, in order:
//!
//! ```text
//! 1. flush queued removals   (destroy each removed subtree)
//! 2. flush queued additions  (adopt, attach if we are attached)
//! 3. advance every live child, depth-first
//! 4. run this node's update hook
//! ```
//!
//! Anything queued on this node during steps 3 and 4 waits for the next
//! tick, so a hook can remove its own node, or spawn copies of it, while the
//! traversal is running.
//!
//! ## Attachment
//!
//! A node is Detached until it becomes the root ([`set_root`](SceneTree::set_root))
//! or is adopted by an attached parent. Attaching registers the node with the
//! tree's services (rendering, physics, its GUI canvas) and runs `on_attach`,
//! parent first. Removal destroys the node: `on_detach` runs, services are
//! released, and the id goes stale. There is no way back to Detached.
//!
//! ## Comparison
//!
//! - **Godot**: same deferred `queue_free` idea, but nodes are objects with
//!   parent pointers. Here ids stand in for pointers so the borrow checker
//!   never sees a cycle.
//! - **bevy_hierarchy**: `Parent`/`Children` components over entities, close
//!   to this layout, with commands instead of per-node queues.

pub mod copy;
mod id;
pub mod node;
pub mod spatial;

use std::any::{Any, TypeId};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;

pub use id::NodeId;
pub use node::{AsAny, EmptyNode, Node, NodeContext};
pub use spatial::SpatialState;

use id::IdAllocator;
use node::NodeState;

use crate::error::{Error, Result};
use crate::gui::{CanvasState, GuiTransform};
use crate::math::{Transform, Vec2, Vec3};
use crate::render::RenderingServer;

#[cfg(feature = "physics3d")]
use crate::physics::{RigidBodyState, Shape};
#[cfg(feature = "physics3d")]
use std::sync::Arc;

/// The geometric flavor of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// 3D affine transform, owned by the scene.
    Spatial,
    /// Spatial node that roots a tree of GUI nodes.
    Canvas,
    /// Anchored screen-space rectangle.
    Gui,
    /// Spatial node whose global transform lives in the physics world.
    RigidBody,
}

impl NodeKind {
    /// Everything but GUI nodes lives in 3D space.
    pub fn is_spatial(self) -> bool {
        self != NodeKind::Gui
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Spatial => "spatial",
            NodeKind::Canvas => "canvas",
            NodeKind::Gui => "gui",
            NodeKind::RigidBody => "rigid_body",
        }
    }
}

/// Kind-specific data stored alongside a node.
#[derive(Debug, Clone)]
pub(crate) enum Geometry {
    Spatial(SpatialState),
    Canvas(SpatialState, CanvasState),
    Gui(GuiTransform),
    #[cfg(feature = "physics3d")]
    RigidBody(RigidBodyState),
}

impl Geometry {
    pub fn kind(&self) -> NodeKind {
        match self {
            Geometry::Spatial(_) => NodeKind::Spatial,
            Geometry::Canvas(..) => NodeKind::Canvas,
            Geometry::Gui(_) => NodeKind::Gui,
            #[cfg(feature = "physics3d")]
            Geometry::RigidBody(_) => NodeKind::RigidBody,
        }
    }
}

pub(crate) struct NodeEntry {
    /// Registered type name, empty for nodes built by hand.
    pub type_name: String,
    pub state: NodeState,
    pub parent: Option<NodeId>,
    /// Set while the node sits in another node's add queue.
    pub pending_parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub queued_add: Vec<NodeId>,
    pub queued_remove: Vec<NodeId>,
    pub attached: bool,
    pub root_cache: Cell<Option<NodeId>>,
    pub geometry: Geometry,
    /// `None` only while a hook is running on this node.
    pub behavior: Option<Box<dyn Node>>,
    /// Enable edges that happened while `behavior` was lent out, oldest
    /// first. Delivered when the behavior comes back.
    pub pending_edges: Vec<bool>,
}

// ── NodeBuilder ─────────────────────────────────────────────────────────

/// Describes a node to [`SceneTree::spawn`].
///
/// ```ignore
/// let lamp = tree.spawn(
///     NodeBuilder::spatial()
///         .with_name("lamp")
///         .with_transform(Transform::from_xyz(0.0, 3.0, 0.0)),
/// );
/// ```
pub struct NodeBuilder {
    type_name: String,
    name: String,
    enabled: bool,
    geometry: Geometry,
    behavior: Box<dyn Node>,
}

impl NodeBuilder {
    fn new(geometry: Geometry) -> Self {
        Self {
            type_name: String::new(),
            name: String::new(),
            enabled: true,
            geometry,
            behavior: Box::new(EmptyNode),
        }
    }

    pub fn spatial() -> Self {
        Self::new(Geometry::Spatial(SpatialState::new(Transform::IDENTITY)))
    }

    pub fn canvas() -> Self {
        Self::new(Geometry::Canvas(
            SpatialState::new(Transform::IDENTITY),
            CanvasState::default(),
        ))
    }

    pub fn gui() -> Self {
        Self::new(Geometry::Gui(GuiTransform::default()))
    }

    #[cfg(feature = "physics3d")]
    pub fn rigid_body() -> Self {
        Self::new(Geometry::RigidBody(RigidBodyState::default()))
    }

    pub fn kind(&self) -> NodeKind {
        self.geometry.kind()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_behavior(mut self, behavior: impl Node) -> Self {
        self.behavior = Box::new(behavior);
        self
    }

    pub fn with_boxed_behavior(mut self, behavior: Box<dyn Node>) -> Self {
        self.behavior = behavior;
        self
    }

    /// Local transform. Ignored (with a warning) on GUI nodes.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        match &mut self.geometry {
            Geometry::Spatial(spatial) | Geometry::Canvas(spatial, _) => spatial.set_transform(transform),
            #[cfg(feature = "physics3d")]
            Geometry::RigidBody(body) => body.set_pending_transform(transform),
            Geometry::Gui(_) => log::warn!("GUI node `{}` has no 3D transform; ignoring it", self.name),
        }
        self
    }

    pub fn with_translation(self, translation: Vec3) -> Self {
        self.with_transform(Transform::from_translation(translation))
    }

    /// Screen placement. Ignored (with a warning) on non-GUI nodes.
    pub fn with_gui_transform(mut self, transform: GuiTransform) -> Self {
        match &mut self.geometry {
            Geometry::Gui(gui) => *gui = transform,
            _ => log::warn!("node `{}` is not a GUI node; ignoring its GUI transform", self.name),
        }
        self
    }

    /// Fixed pixel size for a canvas. Without one the canvas follows the viewport.
    pub fn with_canvas_size(mut self, size: Vec2) -> Self {
        match &mut self.geometry {
            Geometry::Canvas(_, canvas) => canvas.size = Some(size),
            _ => log::warn!("node `{}` is not a canvas; ignoring its size", self.name),
        }
        self
    }

    #[cfg(feature = "physics3d")]
    pub fn with_shape(mut self, shape: Arc<Shape>) -> Self {
        match &mut self.geometry {
            Geometry::RigidBody(body) => body.set_base_shape(shape),
            _ => log::warn!("node `{}` is not a rigid body; ignoring its shape", self.name),
        }
        self
    }
}

// ── SceneTree ───────────────────────────────────────────────────────────

pub struct SceneTree {
    ids: IdAllocator,
    slots: Vec<Option<NodeEntry>>,
    root: Option<NodeId>,
    resources: HashMap<TypeId, Box<dyn Any>>,
}

impl fmt::Debug for SceneTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneTree")
            .field("nodes", &self.node_count())
            .field("root", &self.root)
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            slots: Vec::new(),
            root: None,
            resources: HashMap::new(),
        }
    }

    // ── Resources ────────────────────────────────────────────────────

    /// Insert a resource (singleton value). Replaces any existing resource of
    /// the same type.
    pub fn insert_resource<T: 'static>(&mut self, value: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get_resource<T: 'static>(&self) -> Option<&T> {
        self.resources.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    pub fn get_resource_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.resources.get_mut(&TypeId::of::<T>())?.downcast_mut::<T>()
    }

    pub fn has_resource<T: 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Take a resource out of the tree, e.g. to use it alongside `&mut self`.
    pub fn resource_remove<T: 'static>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    // ── Storage ──────────────────────────────────────────────────────

    pub(crate) fn entry(&self, id: NodeId) -> Result<&NodeEntry> {
        if !self.ids.is_alive(id) {
            return Err(Error::NodeNotFound(id));
        }
        self.slots
            .get(id.index as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::NodeNotFound(id))
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry> {
        if !self.ids.is_alive(id) {
            return Err(Error::NodeNotFound(id));
        }
        self.slots
            .get_mut(id.index as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::NodeNotFound(id))
    }

    /// Create a detached node.
    pub fn spawn(&mut self, builder: NodeBuilder) -> NodeId {
        let id = self.ids.allocate();
        let entry = NodeEntry {
            type_name: builder.type_name,
            state: NodeState::new(builder.name, builder.enabled),
            parent: None,
            pending_parent: None,
            children: Vec::new(),
            queued_add: Vec::new(),
            queued_remove: Vec::new(),
            attached: false,
            root_cache: Cell::new(None),
            geometry: builder.geometry,
            behavior: Some(builder.behavior),
            pending_edges: Vec::new(),
        };
        let index = id.index as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(entry);
        log::trace!("spawned node {id}");
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_ok()
    }

    pub fn node_count(&self) -> usize {
        self.ids.alive_count()
    }

    /// Total slots ever allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.ids.total_slots()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn name(&self, id: NodeId) -> Result<&str> {
        Ok(&self.entry(id)?.state.name)
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        self.entry_mut(id)?.state.name = name.into();
        Ok(())
    }

    pub fn type_name(&self, id: NodeId) -> Result<&str> {
        Ok(&self.entry(id)?.type_name)
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.entry(id)?.geometry.kind())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.entry(id)?.parent)
    }

    /// Live children in update/draw order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.entry(id)?.children)
    }

    /// Children waiting for the next flush.
    pub fn queued_children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.entry(id)?.queued_add)
    }

    pub fn queued_removals(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.entry(id)?.queued_remove)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.entry(id).is_ok_and(|e| e.attached)
    }

    /// Topmost ancestor of `id` (itself if it has no parent). Cached per
    /// node; the cache is dropped whenever the node is attached, and a cached
    /// root that has since been adopted somewhere is looked up again.
    pub fn owning_root(&self, id: NodeId) -> Result<NodeId> {
        let entry = self.entry(id)?;
        if let Some(root) = entry.root_cache.get() {
            if self.entry(root).is_ok_and(|r| r.parent.is_none()) {
                return Ok(root);
            }
        }
        let mut current = id;
        while let Some(parent) = self.entry(current)?.parent {
            current = parent;
        }
        entry.root_cache.set(Some(current));
        Ok(current)
    }

    /// The node's behavior, if it is a `T`.
    pub fn behavior<T: Node>(&self, id: NodeId) -> Option<&T> {
        self.entry(id)
            .ok()?
            .behavior
            .as_deref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn behavior_mut<T: Node>(&mut self, id: NodeId) -> Option<&mut T> {
        self.entry_mut(id)
            .ok()?
            .behavior
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// First live descendant of `start` (or `start` itself) with the given
    /// name, depth-first.
    pub fn find(&self, start: NodeId, name: &str) -> Option<NodeId> {
        let entry = self.entry(start).ok()?;
        if entry.state.name == name {
            return Some(start);
        }
        entry.children.iter().find_map(|&child| self.find(child, name))
    }

    /// Visit `start` and its live descendants depth-first with their depth.
    pub fn walk(&self, start: NodeId, f: &mut impl FnMut(NodeId, usize)) {
        self.walk_from(start, 0, f);
    }

    fn walk_from(&self, id: NodeId, depth: usize, f: &mut impl FnMut(NodeId, usize)) {
        let Ok(entry) = self.entry(id) else {
            return;
        };
        f(id, depth);
        for &child in &entry.children {
            self.walk_from(child, depth + 1, f);
        }
    }

    // ── Hooks ────────────────────────────────────────────────────────

    /// Lend a node's behavior to `f` together with a context over the
    /// whole tree. Returns `None` if the node is gone or already lent out.
    pub(crate) fn with_behavior<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn Node, &mut NodeContext<'_>) -> R,
    ) -> Option<R> {
        let mut behavior = self.entry_mut(id).ok()?.behavior.take()?;
        let result = {
            let mut ctx = NodeContext::new(self, id);
            f(behavior.as_mut(), &mut ctx)
        };
        // The hook may have destroyed its own node; the behavior goes with it.
        if let Ok(entry) = self.entry_mut(id) {
            entry.behavior = Some(behavior);
            for enabled in std::mem::take(&mut entry.pending_edges) {
                self.fire_enable_hook(id, enabled);
            }
        }
        Some(result)
    }

    /// Run a hook, logging a failure instead of propagating it.
    pub(crate) fn run_hook(
        &mut self,
        id: NodeId,
        hook: &str,
        f: impl FnOnce(&mut dyn Node, &mut NodeContext<'_>) -> Result<()>,
    ) {
        if let Some(Err(err)) = self.with_behavior(id, f) {
            let name = self.name(id).unwrap_or("<destroyed>");
            log::error!("{hook} of node `{name}` ({id}) failed: {err}");
        }
    }

    // ── Deferred mutation ────────────────────────────────────────────

    /// Queue `child` to become the last child of `parent` at the parent's
    /// next flush.
    ///
    /// `child` must be free: no parent, not queued anywhere, not the root.
    /// Queueing the same child twice is rejected with an invalid-state error.
    pub fn queue_add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_kind = self.kind(parent)?;
        let child_entry = self.entry(child)?;
        let child_kind = child_entry.geometry.kind();

        if child_entry.parent.is_some() || child_entry.pending_parent.is_some() {
            return Err(Error::invalid_state(format!(
                "node {child} already has a parent or is already queued"
            )));
        }
        if self.root == Some(child) {
            return Err(Error::invalid_state("the root can't become a child"));
        }
        if self.is_self_or_ancestor(child, parent) {
            return Err(Error::invalid_argument(format!(
                "adding {child} under {parent} would create a cycle"
            )));
        }
        let compatible = match child_kind {
            NodeKind::Gui => matches!(parent_kind, NodeKind::Gui | NodeKind::Canvas),
            _ => parent_kind.is_spatial(),
        };
        if !compatible {
            return Err(Error::invalid_argument(format!(
                "a {} node can't be a child of a {} node",
                child_kind.as_str(),
                parent_kind.as_str()
            )));
        }

        self.entry_mut(child)?.pending_parent = Some(parent);
        self.entry_mut(parent)?.queued_add.push(child);
        Ok(())
    }

    /// Queue the removal of a live child. Requesting the same removal twice
    /// is a no-op.
    pub fn queue_remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let entry = self.entry_mut(parent)?;
        if !entry.children.contains(&child) {
            return Err(Error::ChildNotFound { parent, child });
        }
        if !entry.queued_remove.contains(&child) {
            entry.queued_remove.push(child);
        }
        Ok(())
    }

    /// Queue the removal of the live child at `index`.
    pub fn queue_remove_child_at(&mut self, parent: NodeId, index: usize) -> Result<()> {
        let children = self.children(parent)?;
        let child = *children.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: children.len(),
        })?;
        self.queue_remove_child(parent, child)
    }

    fn is_self_or_ancestor(&self, candidate: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == candidate {
                return true;
            }
            current = self.entry(node).ok().and_then(|e| e.parent.or(e.pending_parent));
        }
        false
    }

    /// One tick for `id` and its subtree. See the module docs for the order.
    pub fn advance(&mut self, id: NodeId) -> Result<()> {
        self.entry(id)?;
        self.advance_node(id);
        Ok(())
    }

    fn advance_node(&mut self, id: NodeId) {
        self.flush_removals(id);
        self.flush_additions(id);

        let Ok(entry) = self.entry(id) else {
            return;
        };
        for child in entry.children.clone() {
            // A hook may have restructured things; skip what is no longer ours.
            if self.entry(child).is_ok_and(|c| c.parent == Some(id)) {
                self.advance_node(child);
            }
        }

        if self.is_enabled(id) {
            self.run_hook(id, "update", |node, ctx| node.update(ctx));
        }
    }

    fn flush_removals(&mut self, id: NodeId) {
        let Ok(entry) = self.entry_mut(id) else {
            return;
        };
        if entry.queued_remove.is_empty() {
            return;
        }
        for child in std::mem::take(&mut entry.queued_remove) {
            let Ok(entry) = self.entry_mut(id) else {
                return;
            };
            // Already gone is fine.
            let Some(pos) = entry.children.iter().position(|&c| c == child) else {
                continue;
            };
            entry.children.remove(pos);
            log::debug!("removing node {child} from {id}");
            self.destroy_subtree(child);
        }
    }

    fn flush_additions(&mut self, id: NodeId) {
        let Ok(entry) = self.entry_mut(id) else {
            return;
        };
        if entry.queued_add.is_empty() {
            return;
        }
        let additions = std::mem::take(&mut entry.queued_add);
        let attached = entry.attached;
        let enabled = entry.state.is_enabled();

        for child in additions {
            let Ok(child_entry) = self.entry_mut(child) else {
                continue;
            };
            child_entry.pending_parent = None;
            child_entry.parent = Some(id);
            child_entry.root_cache.set(None);
            if let Ok(entry) = self.entry_mut(id) {
                entry.children.push(child);
            }
            self.on_parent_enable_disable(child, enabled);
            if attached {
                self.attach_subtree(child);
            }
        }
    }

    // ── Attachment & destruction ─────────────────────────────────────

    /// Make `id` the attached root of this tree and attach its subtree.
    pub fn set_root(&mut self, id: NodeId) -> Result<()> {
        if let Some(root) = self.root {
            return Err(Error::invalid_state(format!("the tree already has root {root}")));
        }
        let entry = self.entry(id)?;
        if entry.parent.is_some() || entry.pending_parent.is_some() {
            return Err(Error::invalid_state(format!("node {id} is somebody's child")));
        }
        self.root = Some(id);
        log::debug!("node {id} is now the root");
        self.attach_subtree(id);
        Ok(())
    }

    fn attach_subtree(&mut self, id: NodeId) {
        let Ok(entry) = self.entry_mut(id) else {
            return;
        };
        if entry.attached {
            return;
        }
        entry.attached = true;
        entry.root_cache.set(None);
        let children = entry.children.clone();

        self.register_services(id);
        self.run_hook(id, "on_attach", |node, ctx| node.on_attach(ctx));

        for child in children {
            self.attach_subtree(child);
        }
    }

    /// Destroy a node that is not anybody's child, with its whole subtree.
    /// Live children are removed with [`queue_remove_child`](Self::queue_remove_child) instead.
    pub fn destroy(&mut self, id: NodeId) -> Result<()> {
        let entry = self.entry(id)?;
        if entry.parent.is_some() || entry.pending_parent.is_some() {
            return Err(Error::invalid_state(format!(
                "node {id} has a parent; queue its removal there instead"
            )));
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.destroy_subtree(id);
        Ok(())
    }

    fn destroy_subtree(&mut self, id: NodeId) {
        let Ok(entry) = self.entry_mut(id) else {
            return;
        };
        let children = std::mem::take(&mut entry.children);
        let queued = std::mem::take(&mut entry.queued_add);
        let attached = entry.attached;

        for child in children.into_iter().chain(queued) {
            self.destroy_subtree(child);
        }

        if attached {
            self.run_hook(id, "on_detach", |node, ctx| node.on_detach(ctx));
            self.unregister_services(id);
        }

        self.slots[id.index as usize] = None;
        self.ids.release(id);
        log::trace!("destroyed node {id}");
    }

    fn register_services(&mut self, id: NodeId) {
        let Ok(entry) = self.entry(id) else {
            return;
        };
        let kind = entry.geometry.kind();
        let program = entry.behavior.as_deref().and_then(|b| b.program_id());

        match kind {
            NodeKind::Gui => {
                // GUI nodes are drawn by their canvas.
                self.register_gui_node(id);
                return;
            }
            #[cfg(feature = "physics3d")]
            NodeKind::RigidBody => self.create_rigid_body(id),
            _ => {}
        }

        let program = if kind == NodeKind::Canvas {
            Some(program.unwrap_or(0))
        } else {
            program
        };
        if let (Some(program), Some(rendering)) = (program, self.get_resource_mut::<RenderingServer>()) {
            rendering.register(id, program);
        }
    }

    fn unregister_services(&mut self, id: NodeId) {
        let Ok(kind) = self.kind(id) else {
            return;
        };
        match kind {
            NodeKind::Gui => self.unregister_gui_node(id),
            #[cfg(feature = "physics3d")]
            NodeKind::RigidBody => self.remove_rigid_body(id),
            _ => {}
        }
        if let Some(rendering) = self.get_resource_mut::<RenderingServer>() {
            rendering.unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::error::ErrorKind;

    fn translation_of(tree: &SceneTree, id: NodeId) -> Vec3 {
        tree.global_matrix(id).unwrap().col(3).truncate()
    }

    #[test]
    fn end_to_end_deferred_growth() {
        let mut tree = SceneTree::new();
        let r = tree.spawn(NodeBuilder::spatial().with_name("R"));
        let a = tree.spawn(NodeBuilder::spatial().with_name("A").with_translation(Vec3::X));

        tree.queue_add_child(r, a).unwrap();
        assert!(tree.children(r).unwrap().is_empty());
        tree.advance(r).unwrap();

        assert_eq!(tree.children(r).unwrap(), &[a]);
        assert_eq!(tree.parent(a).unwrap(), Some(r));
        assert!((translation_of(&tree, a) - Vec3::X).length() < 0.001);

        // Grandchild queued on A directly, no advance on A in between.
        let b = tree.spawn(NodeBuilder::spatial().with_name("B").with_translation(Vec3::Y));
        tree.queue_add_child(a, b).unwrap();
        assert!(tree.children(a).unwrap().is_empty());

        tree.advance(r).unwrap();
        assert_eq!(tree.children(a).unwrap(), &[b]);
        assert!((translation_of(&tree, b) - Vec3::new(1.0, 1.0, 0.0)).length() < 0.001);
    }

    #[test]
    fn attachment_follows_the_root() {
        let mut tree = SceneTree::new();
        let r = tree.spawn(NodeBuilder::spatial());
        let a = tree.spawn(NodeBuilder::spatial());
        tree.queue_add_child(r, a).unwrap();
        tree.advance(r).unwrap();
        assert!(!tree.is_attached(a));
        assert_eq!(tree.owning_root(a).unwrap(), r);

        tree.set_root(r).unwrap();
        assert!(tree.is_attached(r));
        assert!(tree.is_attached(a));

        // Adopted under an attached parent: attached on flush.
        let b = tree.spawn(NodeBuilder::spatial());
        tree.queue_add_child(a, b).unwrap();
        assert!(!tree.is_attached(b));
        tree.advance(r).unwrap();
        assert!(tree.is_attached(b));
        assert_eq!(tree.owning_root(b).unwrap(), r);
    }

    #[test]
    fn owning_root_follows_adoption_of_an_ancestor() {
        let mut tree = SceneTree::new();
        let r = tree.spawn(NodeBuilder::spatial());
        let a = tree.spawn(NodeBuilder::spatial());
        let b = tree.spawn(NodeBuilder::spatial());
        tree.queue_add_child(a, b).unwrap();
        tree.advance(a).unwrap();
        assert_eq!(tree.owning_root(b).unwrap(), a);

        // Neither tree is attached, so only the cache can go stale here.
        tree.queue_add_child(r, a).unwrap();
        tree.advance(r).unwrap();
        assert_eq!(tree.parent(a).unwrap(), Some(r));
        assert_eq!(tree.owning_root(b).unwrap(), r);
        assert_eq!(tree.owning_root(a).unwrap(), r);
    }

    #[test]
    fn double_queue_is_rejected() {
        let mut tree = SceneTree::new();
        let p = tree.spawn(NodeBuilder::spatial());
        let q = tree.spawn(NodeBuilder::spatial());
        let c = tree.spawn(NodeBuilder::spatial());

        tree.queue_add_child(p, c).unwrap();
        let err = tree.queue_add_child(p, c).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(tree.queue_add_child(q, c).is_err());

        tree.advance(p).unwrap();
        assert_eq!(tree.children(p).unwrap(), &[c]);
        assert!(tree.queued_children(p).unwrap().is_empty());
    }

    #[test]
    fn duplicate_removal_is_a_no_op() {
        let mut tree = SceneTree::new();
        let p = tree.spawn(NodeBuilder::spatial());
        let c = tree.spawn(NodeBuilder::spatial());
        tree.queue_add_child(p, c).unwrap();
        tree.advance(p).unwrap();

        tree.queue_remove_child(p, c).unwrap();
        tree.queue_remove_child(p, c).unwrap();
        assert_eq!(tree.queued_removals(p).unwrap(), &[c]);

        tree.advance(p).unwrap();
        assert!(tree.children(p).unwrap().is_empty());
        assert!(!tree.contains(c));
    }

    #[test]
    fn removal_errors() {
        let mut tree = SceneTree::new();
        let p = tree.spawn(NodeBuilder::spatial());
        let stranger = tree.spawn(NodeBuilder::spatial());

        let err = tree.queue_remove_child(p, stranger).unwrap_err();
        assert!(matches!(err, Error::ChildNotFound { .. }));
        let err = tree.queue_remove_child_at(p, 0).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 0, len: 0 }));
    }

    #[test]
    fn cycles_and_kind_mismatches_are_rejected() {
        let mut tree = SceneTree::new();
        let a = tree.spawn(NodeBuilder::spatial());
        let b = tree.spawn(NodeBuilder::spatial());
        tree.queue_add_child(a, b).unwrap();
        assert_eq!(tree.queue_add_child(b, a).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(tree.queue_add_child(a, a).is_err());

        let gui = tree.spawn(NodeBuilder::gui());
        assert_eq!(tree.queue_add_child(a, gui).unwrap_err().kind(), ErrorKind::InvalidArgument);
        let spatial = tree.spawn(NodeBuilder::spatial());
        assert!(tree.queue_add_child(gui, spatial).is_err());
    }

    /// Removes itself from its parent on its first update.
    struct SelfRemover {
        updates: Rc<RefCell<u32>>,
    }

    impl Node for SelfRemover {
        fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
            *self.updates.borrow_mut() += 1;
            ctx.queue_remove_self()
        }
    }

    #[test]
    fn self_removal_lands_next_tick() {
        let updates = Rc::new(RefCell::new(0));
        let mut tree = SceneTree::new();
        let p = tree.spawn(NodeBuilder::spatial());
        let c = tree.spawn(NodeBuilder::spatial().with_behavior(SelfRemover {
            updates: updates.clone(),
        }));
        tree.queue_add_child(p, c).unwrap();

        tree.advance(p).unwrap();
        // Updated once, removal queued but not applied yet.
        assert_eq!(*updates.borrow(), 1);
        assert!(tree.contains(c));
        assert_eq!(tree.children(p).unwrap(), &[c]);

        tree.advance(p).unwrap();
        assert!(!tree.contains(c));
        assert!(tree.children(p).unwrap().is_empty());
        assert_eq!(*updates.borrow(), 1);
    }

    /// Queues a fresh sibling every update.
    struct Spawner;

    impl Node for Spawner {
        fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
            let parent = ctx.parent().ok_or_else(|| Error::invalid_state("orphan"))?;
            let sibling = ctx.tree_mut().spawn(NodeBuilder::spatial().with_behavior(Spawner));
            ctx.tree_mut().queue_add_child(parent, sibling)
        }
    }

    #[test]
    fn requeueing_does_not_recurse_within_a_tick() {
        let mut tree = SceneTree::new();
        let p = tree.spawn(NodeBuilder::spatial());
        let s = tree.spawn(NodeBuilder::spatial().with_behavior(Spawner));
        tree.queue_add_child(p, s).unwrap();

        tree.advance(p).unwrap();
        assert_eq!(tree.children(p).unwrap().len(), 1);
        assert_eq!(tree.queued_children(p).unwrap().len(), 1);

        tree.advance(p).unwrap();
        assert_eq!(tree.children(p).unwrap().len(), 2);
        assert_eq!(tree.queued_children(p).unwrap().len(), 2);
    }

    struct Failing;

    impl Node for Failing {
        fn update(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
            Err(Error::invalid_state("broken on purpose"))
        }
    }

    struct Counter(Rc<RefCell<u32>>);

    impl Node for Counter {
        fn update(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
            *self.0.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn failing_hook_does_not_stop_siblings() {
        let _ = env_logger::builder().is_test(true).try_init();
        let count = Rc::new(RefCell::new(0));
        let mut tree = SceneTree::new();
        let p = tree.spawn(NodeBuilder::spatial());
        let bad = tree.spawn(NodeBuilder::spatial().with_behavior(Failing));
        let good = tree.spawn(NodeBuilder::spatial().with_behavior(Counter(count.clone())));
        tree.queue_add_child(p, bad).unwrap();
        tree.queue_add_child(p, good).unwrap();

        tree.advance(p).unwrap();
        tree.advance(p).unwrap();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn disabled_nodes_skip_update_but_still_flush() {
        let count = Rc::new(RefCell::new(0));
        let mut tree = SceneTree::new();
        let p = tree.spawn(NodeBuilder::spatial().with_enabled(false));
        let c = tree.spawn(NodeBuilder::spatial().with_behavior(Counter(count.clone())));
        tree.queue_add_child(p, c).unwrap();

        tree.advance(p).unwrap();
        assert_eq!(tree.children(p).unwrap(), &[c]);
        assert_eq!(*count.borrow(), 0);

        tree.enable(p).unwrap();
        tree.advance(p).unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn removal_destroys_the_whole_subtree() {
        let mut tree = SceneTree::new();
        let root = tree.spawn(NodeBuilder::spatial());
        let a = tree.spawn(NodeBuilder::spatial());
        let b = tree.spawn(NodeBuilder::spatial());
        let pending = tree.spawn(NodeBuilder::spatial());
        tree.queue_add_child(root, a).unwrap();
        tree.queue_add_child(a, b).unwrap();
        tree.advance(root).unwrap();
        tree.advance(root).unwrap();
        tree.queue_add_child(b, pending).unwrap();

        tree.queue_remove_child(root, a).unwrap();
        tree.advance(root).unwrap();

        assert_eq!(tree.node_count(), 1);
        assert!(!tree.contains(a) && !tree.contains(b) && !tree.contains(pending));
        // Stale ids stay stale after their slot is reused.
        let fresh = tree.spawn(NodeBuilder::spatial());
        assert_ne!(fresh, a);
        assert!(!tree.contains(a));
        assert_eq!(tree.name(a).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn behavior_downcasts() {
        let mut tree = SceneTree::new();
        let id = tree.spawn(NodeBuilder::spatial().with_behavior(Counter(Rc::new(RefCell::new(7)))));
        assert_eq!(*tree.behavior::<Counter>(id).unwrap().0.borrow(), 7);
        assert!(tree.behavior::<EmptyNode>(id).is_none());
        assert!(tree.find(id, "missing").is_none());
    }
}

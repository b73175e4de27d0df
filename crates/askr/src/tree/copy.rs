//! Structural deep copy of a subtree.
//!
//! The copy is a fresh detached node with the same type name, name, enable
//! flag, local transform and a cloned behavior. Every live and queued child
//! is copied the same way and *queued* on the new node, so the copy grows
//! its children at its first flush, like any other node would.

use std::cell::Cell;

use crate::error::{Error, Result};

use super::node::{Node, NodeState};
use super::{Geometry, NodeEntry, NodeId, SceneTree};

impl SceneTree {
    /// Deep-copy `id` and its subtree. Fails with invalid-argument if some
    /// behavior in the subtree can't be cloned; nothing is left behind then.
    ///
    /// A node running one of its own hooks copies itself with
    /// [`NodeContext::copy_self`](super::NodeContext::copy_self) instead.
    pub fn copy(&mut self, id: NodeId) -> Result<NodeId> {
        self.copy_lent(id, None)
    }

    /// Like [`copy`](Self::copy), with `lent` standing in for the behavior
    /// of `id` while that behavior is out running a hook.
    pub(crate) fn copy_lent(&mut self, id: NodeId, lent: Option<&dyn Node>) -> Result<NodeId> {
        let mut created = Vec::new();
        match self.copy_into(id, lent, &mut created) {
            Ok(copy) => Ok(copy),
            Err(err) => {
                for node in created.into_iter().rev() {
                    self.discard_copy(node);
                }
                Err(err)
            }
        }
    }

    fn copy_into(&mut self, id: NodeId, lent: Option<&dyn Node>, created: &mut Vec<NodeId>) -> Result<NodeId> {
        let entry = self.entry(id)?;
        let behavior = entry
            .behavior
            .as_deref()
            .or(lent)
            .ok_or_else(|| Error::invalid_state(format!("node {id} is busy running a hook")))?
            .clone_node()
            .ok_or_else(|| {
                Error::invalid_argument(format!("the behavior of node `{}` can't be copied", entry.state.name))
            })?;
        let type_name = entry.type_name.clone();
        let state = NodeState::new(entry.state.name.clone(), entry.state.enabled);
        let sources: Vec<NodeId> = entry.children.iter().chain(&entry.queued_add).copied().collect();
        let geometry = self.copied_geometry(id)?;

        let copy = self.ids.allocate();
        let index = copy.index as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(NodeEntry {
            type_name,
            state,
            parent: None,
            pending_parent: None,
            children: Vec::new(),
            queued_add: Vec::new(),
            queued_remove: Vec::new(),
            attached: false,
            root_cache: Cell::new(None),
            geometry,
            behavior: Some(behavior),
            pending_edges: Vec::new(),
        });
        created.push(copy);

        for source in sources {
            let child = self.copy_into(source, None, created)?;
            self.queue_add_child(copy, child)?;
        }
        log::trace!("copied node {id} into {copy}");
        Ok(copy)
    }

    /// Geometry for a detached copy: the local transform without any
    /// service registration.
    fn copied_geometry(&self, id: NodeId) -> Result<Geometry> {
        Ok(match &self.entry(id)?.geometry {
            Geometry::Spatial(spatial) => Geometry::Spatial(spatial.clone()),
            Geometry::Canvas(spatial, canvas) => Geometry::Canvas(spatial.clone(), canvas.detached_copy()),
            Geometry::Gui(transform) => Geometry::Gui(transform.clone()),
            #[cfg(feature = "physics3d")]
            Geometry::RigidBody(body) => {
                Geometry::RigidBody(body.detached_copy(self.rigid_body_local_transform(id)?))
            }
        })
    }

    /// Drop a half-built copy. Nothing was attached, so no hooks run.
    fn discard_copy(&mut self, id: NodeId) {
        if self.contains(id) {
            self.slots[id.index as usize] = None;
            self.ids.release(id);
        }
    }
}

//! # Node Ids — Generational Handles
//!
//! A [`NodeId`] is just a number; the [`SceneTree`](super::SceneTree) maps it
//! to the node's data. Parents refer to children and children back to their
//! parent through ids, so no node holds a reference into another.
//!
//! ## Generational indices
//!
//! Slots are recycled when a node is destroyed. Pairing the index with a
//! generation counter keeps a stale id from silently pointing at whichever
//! node reused the slot:
//!
//! ```text
//! NodeId { index: 5, generation: 0 }  ← original
//! NodeId { index: 5, generation: 1 }  ← after recycle
//! ```
//!
//! Lookups with the old generation fail with a not-found error.

use std::fmt;

/// A handle to a node in a [`SceneTree`](super::SceneTree).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Raw slot index. Useful for diagnostics.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Hands out [`NodeId`]s and recycles freed slots.
///
/// ```text
/// generations: [0, 1, 0, 2, 0]   ← one generation per slot ever allocated
/// free_list:   [1, 3]             ← slots available for reuse
/// ```
pub(crate) struct IdAllocator {
    generations: Vec<u32>,
    free_list: Vec<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn allocate(&mut self) -> NodeId {
        if let Some(index) = self.free_list.pop() {
            // Generation was already bumped on release.
            let generation = self.generations[index as usize];
            NodeId { index, generation }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            NodeId { index, generation: 0 }
        }
    }

    /// Returns `false` if the id was already stale.
    pub fn release(&mut self, id: NodeId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.generations[id.index as usize] += 1;
        self.free_list.push(id.index);
        true
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.generations
            .get(id.index as usize)
            .is_some_and(|&generation| generation == id.generation)
    }

    pub fn alive_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }

    /// Total number of slots ever allocated.
    pub fn total_slots(&self) -> usize {
        self.generations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_sequential() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert_eq!((a.index, b.index), (0, 1));
        assert_eq!(ids.alive_count(), 2);
    }

    #[test]
    fn recycle_bumps_generation() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        assert!(ids.release(a));
        let reused = ids.allocate();
        assert_eq!(reused.index, a.index);
        assert_eq!(reused.generation, 1);
        assert!(!ids.is_alive(a));
        assert!(ids.is_alive(reused));
    }

    #[test]
    fn double_release_returns_false() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        assert!(ids.release(a));
        assert!(!ids.release(a));
        assert_eq!(ids.alive_count(), 0);
        assert_eq!(ids.total_slots(), 1);
    }
}

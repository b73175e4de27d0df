//! Spatial transforms of nodes.
//!
//! A spatial node owns its local [`Transform`]. Its global matrix is the
//! parent's global matrix times the local one, so a chain composes as
//! `global = root_local * ... * parent_local * local`.
//!
//! The local matrix is cached and rebuilt lazily after a setter dirtied it.
//! Global matrices are not cached: they are recomputed from the chain on
//! every query.
//!
//! Rigid bodies answer the same queries, but their global pose comes from
//! the physics world; see [`crate::physics`].

use std::cell::Cell;

use crate::error::{Error, Result};
use crate::math::{Mat4, Quat, Transform, Vec3};

use super::{Geometry, NodeId, SceneTree};

/// Local transform plus its lazily rebuilt matrix.
#[derive(Debug, Clone)]
pub struct SpatialState {
    transform: Transform,
    cached_local: Cell<Mat4>,
    needs_recalculation: Cell<bool>,
}

impl SpatialState {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            cached_local: Cell::new(Mat4::IDENTITY),
            needs_recalculation: Cell::new(true),
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.needs_recalculation.set(true);
    }

    pub fn local_matrix(&self) -> Mat4 {
        if self.needs_recalculation.get() {
            self.cached_local.set(self.transform.matrix());
            self.needs_recalculation.set(false);
        }
        self.cached_local.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.needs_recalculation.get()
    }
}

impl SceneTree {
    fn spatial_state_mut(&mut self, id: NodeId) -> Result<&mut SpatialState> {
        match &mut self.entry_mut(id)?.geometry {
            Geometry::Spatial(spatial) | Geometry::Canvas(spatial, _) => Ok(spatial),
            _ => Err(Error::invalid_argument(format!("node {id} has no local spatial state"))),
        }
    }

    /// Local transform, relative to the parent.
    pub fn transform(&self, id: NodeId) -> Result<Transform> {
        match &self.entry(id)?.geometry {
            Geometry::Spatial(spatial) | Geometry::Canvas(spatial, _) => Ok(spatial.transform()),
            #[cfg(feature = "physics3d")]
            Geometry::RigidBody(_) => self.rigid_body_local_transform(id),
            Geometry::Gui(_) => Err(not_spatial(id)),
        }
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<()> {
        #[cfg(feature = "physics3d")]
        if self.kind(id)? == super::NodeKind::RigidBody {
            self.set_rigid_body_scale(id, transform.scale)?;
            self.set_rigid_body_translation(id, transform.translation)?;
            return self.set_rigid_body_rotation(id, transform.rotation);
        }
        self.spatial_state_mut(id)?.set_transform(transform);
        Ok(())
    }

    pub fn translation(&self, id: NodeId) -> Result<Vec3> {
        Ok(self.transform(id)?.translation)
    }

    pub fn set_translation(&mut self, id: NodeId, translation: Vec3) -> Result<()> {
        #[cfg(feature = "physics3d")]
        if self.kind(id)? == super::NodeKind::RigidBody {
            return self.set_rigid_body_translation(id, translation);
        }
        let spatial = self.spatial_state_mut(id)?;
        let transform = Transform {
            translation,
            ..spatial.transform()
        };
        spatial.set_transform(transform);
        Ok(())
    }

    pub fn rotation(&self, id: NodeId) -> Result<Quat> {
        Ok(self.transform(id)?.rotation)
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) -> Result<()> {
        #[cfg(feature = "physics3d")]
        if self.kind(id)? == super::NodeKind::RigidBody {
            return self.set_rigid_body_rotation(id, rotation);
        }
        let spatial = self.spatial_state_mut(id)?;
        let transform = Transform {
            rotation,
            ..spatial.transform()
        };
        spatial.set_transform(transform);
        Ok(())
    }

    pub fn scale(&self, id: NodeId) -> Result<Vec3> {
        Ok(self.transform(id)?.scale)
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) -> Result<()> {
        #[cfg(feature = "physics3d")]
        if self.kind(id)? == super::NodeKind::RigidBody {
            return self.set_rigid_body_scale(id, scale);
        }
        let spatial = self.spatial_state_mut(id)?;
        let transform = Transform {
            scale,
            ..spatial.transform()
        };
        spatial.set_transform(transform);
        Ok(())
    }

    /// Scale such that the node's global scale becomes `scale`.
    pub fn set_global_scale(&mut self, id: NodeId, scale: Vec3) -> Result<()> {
        let parent_scale = match self.parent(id)? {
            Some(parent) => self.global_transform(parent)?.scale,
            None => Vec3::ONE,
        };
        self.set_scale(id, scale / parent_scale)
    }

    /// Matrix of the local transform; cached for plain spatial nodes.
    pub fn local_matrix(&self, id: NodeId) -> Result<Mat4> {
        match &self.entry(id)?.geometry {
            Geometry::Spatial(spatial) | Geometry::Canvas(spatial, _) => Ok(spatial.local_matrix()),
            #[cfg(feature = "physics3d")]
            Geometry::RigidBody(_) => Ok(self.rigid_body_local_transform(id)?.matrix()),
            Geometry::Gui(_) => Err(not_spatial(id)),
        }
    }

    /// `parent_global * local`, recomputed from the chain on every call.
    pub fn global_matrix(&self, id: NodeId) -> Result<Mat4> {
        let entry = self.entry(id)?;
        #[cfg(feature = "physics3d")]
        if let Geometry::RigidBody(_) = entry.geometry {
            return Ok(self.global_transform(id)?.matrix());
        }
        let local = self.local_matrix(id)?;
        match entry.parent {
            Some(parent) => Ok(self.global_matrix(parent)? * local),
            None => Ok(local),
        }
    }

    /// The global pose as translation, rotation and scale.
    pub fn global_transform(&self, id: NodeId) -> Result<Transform> {
        let entry = self.entry(id)?;
        let local = match &entry.geometry {
            Geometry::Spatial(spatial) | Geometry::Canvas(spatial, _) => spatial.transform(),
            #[cfg(feature = "physics3d")]
            Geometry::RigidBody(body) => return self.rigid_body_global_transform(id, body),
            Geometry::Gui(_) => return Err(not_spatial(id)),
        };
        match entry.parent {
            Some(parent) => Ok(self.global_transform(parent)?.mul_transform(&local)),
            None => Ok(local),
        }
    }

    pub fn global_translation(&self, id: NodeId) -> Result<Vec3> {
        Ok(self.global_transform(id)?.translation)
    }

    pub fn global_rotation(&self, id: NodeId) -> Result<Quat> {
        Ok(self.global_transform(id)?.rotation)
    }

    pub fn global_scale(&self, id: NodeId) -> Result<Vec3> {
        Ok(self.global_transform(id)?.scale)
    }

    /// Global transform of the parent, identity at the top of a chain.
    pub(crate) fn parent_global_transform(&self, id: NodeId) -> Result<Transform> {
        match self.parent(id)? {
            Some(parent) => self.global_transform(parent),
            None => Ok(Transform::IDENTITY),
        }
    }
}

fn not_spatial(id: NodeId) -> Error {
    Error::invalid_argument(format!("GUI node {id} has no 3D transform"))
}

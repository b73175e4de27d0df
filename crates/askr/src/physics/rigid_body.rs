//! Rigid-body nodes.
//!
//! A rigid body is a spatial node whose global pose is stored in the physics
//! world once the node is attached. Translation and rotation setters take
//! values relative to the scene parent and are written to the body as world
//! values. Scale never reaches the body: it rescales the collision shape.
//!
//! ```text
//!              detached                         attached
//!  ┌───────────────────────────┐      ┌──────────────────────────────┐
//!  │ pending: local transform  │ ───► │ rapier body: global pose     │
//!  │ scale, mass, shape        │      │ scale, mass, shape (cached)  │
//!  └───────────────────────────┘      │ previous_parent: Transform   │
//!                                     └──────────────────────────────┘
//! ```

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::math::{Quat, Transform, Vec3};
use crate::tree::{Geometry, NodeId, SceneTree};

use super::{BodyDesc, BodyHandle, PhysicsServer, Shape};

/// Rigid-body data kept on the node.
#[derive(Debug, Clone)]
pub struct RigidBodyState {
    /// Local pose (scale one) used until the body exists.
    pending: Transform,
    /// The scale applied to `base_shape` to get `shape`.
    scale: Vec3,
    mass: f32,
    /// Shape as given, before scaling.
    base_shape: Option<Arc<Shape>>,
    shape: Option<Arc<Shape>>,
    report_contacts: bool,
    handle: Option<BodyHandle>,
    /// Parent's global transform at the last reconciliation.
    previous_parent: Option<Transform>,
}

impl Default for RigidBodyState {
    fn default() -> Self {
        Self {
            pending: Transform::IDENTITY,
            scale: Vec3::ONE,
            mass: 1.0,
            base_shape: None,
            shape: None,
            report_contacts: false,
            handle: None,
            previous_parent: None,
        }
    }
}

impl RigidBodyState {
    pub(crate) fn set_pending_transform(&mut self, transform: Transform) {
        self.pending = Transform {
            scale: Vec3::ONE,
            ..transform
        };
        if validate_scale(transform.scale).is_ok() {
            self.rescale(transform.scale);
        } else {
            log::warn!("ignoring invalid rigid body scale {}", transform.scale);
        }
    }

    /// Store an unscaled shape, applying the current scale to it.
    pub(crate) fn set_base_shape(&mut self, shape: Arc<Shape>) {
        self.shape = Some(if self.scale == Vec3::ONE {
            shape.clone()
        } else {
            Arc::new(shape.scaled(self.scale))
        });
        self.base_shape = Some(shape);
    }

    /// Rebuild the shape from the base at `scale`. Returns whether anything
    /// changed.
    fn rescale(&mut self, scale: Vec3) -> bool {
        if scale == self.scale {
            return false;
        }
        // Always from the base: scaling a ball or cylinder isn't invertible.
        self.shape = self.base_shape.as_ref().map(|base| Arc::new(base.scaled(scale)));
        self.scale = scale;
        true
    }

    /// State for a detached copy placed at `local`.
    pub(crate) fn detached_copy(&self, local: Transform) -> Self {
        Self {
            pending: Transform {
                scale: Vec3::ONE,
                ..local
            },
            handle: None,
            previous_parent: None,
            ..self.clone()
        }
    }
}

fn validate_scale(scale: Vec3) -> Result<()> {
    if scale.is_finite() && scale.min_element() > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!("rigid body scale must be positive, got {scale}")))
    }
}

impl SceneTree {
    fn rigid_body_state(&self, id: NodeId) -> Result<&RigidBodyState> {
        match &self.entry(id)?.geometry {
            Geometry::RigidBody(body) => Ok(body),
            _ => Err(not_a_rigid_body(id)),
        }
    }

    fn rigid_body_state_mut(&mut self, id: NodeId) -> Result<&mut RigidBodyState> {
        match &mut self.entry_mut(id)?.geometry {
            Geometry::RigidBody(body) => Ok(body),
            _ => Err(not_a_rigid_body(id)),
        }
    }

    /// World pose of the node's body, if it has one.
    fn body_pose(&self, body: &RigidBodyState) -> Option<Transform> {
        let handle = body.handle?;
        let (translation, rotation) = self.get_resource::<PhysicsServer>()?.body_pose(handle)?;
        Some(Transform {
            translation,
            rotation,
            scale: Vec3::ONE,
        })
    }

    pub(crate) fn rigid_body_local_transform(&self, id: NodeId) -> Result<Transform> {
        let body = self.rigid_body_state(id)?;
        let local = match self.body_pose(body) {
            Some(pose) => self.parent_global_transform(id)?.inverse().mul_transform(&pose),
            None => body.pending,
        };
        Ok(Transform {
            scale: body.scale,
            ..local
        })
    }

    pub(crate) fn rigid_body_global_transform(&self, id: NodeId, body: &RigidBodyState) -> Result<Transform> {
        let parent = self.parent_global_transform(id)?;
        Ok(match self.body_pose(body) {
            Some(pose) => Transform {
                scale: parent.scale * body.scale,
                ..pose
            },
            None => parent.mul_transform(&Transform {
                scale: body.scale,
                ..body.pending
            }),
        })
    }

    /// Move the body to `translation`, given relative to the scene parent.
    pub(crate) fn set_rigid_body_translation(&mut self, id: NodeId, translation: Vec3) -> Result<()> {
        let parent = self.parent_global_transform(id)?;
        let body = self.rigid_body_state(id)?;
        match (body.handle, self.body_pose(body)) {
            (Some(handle), Some(pose)) => {
                if let Some(server) = self.get_resource_mut::<PhysicsServer>() {
                    server.set_body_pose(handle, parent.transform_point(translation), pose.rotation);
                }
            }
            _ => self.rigid_body_state_mut(id)?.pending.translation = translation,
        }
        Ok(())
    }

    /// Turn the body to `rotation`, given relative to the scene parent.
    pub(crate) fn set_rigid_body_rotation(&mut self, id: NodeId, rotation: Quat) -> Result<()> {
        let parent = self.parent_global_transform(id)?;
        let body = self.rigid_body_state(id)?;
        match (body.handle, self.body_pose(body)) {
            (Some(handle), Some(pose)) => {
                if let Some(server) = self.get_resource_mut::<PhysicsServer>() {
                    server.set_body_pose(handle, pose.translation, parent.rotation * rotation);
                }
            }
            _ => self.rigid_body_state_mut(id)?.pending.rotation = rotation,
        }
        Ok(())
    }

    /// Rescale the collision shape. Every change yields a new shape instance;
    /// the old one may be shared with other nodes.
    pub(crate) fn set_rigid_body_scale(&mut self, id: NodeId, scale: Vec3) -> Result<()> {
        validate_scale(scale)?;
        let body = self.rigid_body_state_mut(id)?;
        if body.rescale(scale) {
            self.sync_shape(id)?;
        }
        Ok(())
    }

    /// Push the cached shape to the physics world, if the body exists.
    fn sync_shape(&mut self, id: NodeId) -> Result<()> {
        let body = self.rigid_body_state(id)?;
        let (Some(mut handle), Some(shape)) = (body.handle, body.shape.clone()) else {
            return Ok(());
        };
        let (mass, report) = (body.mass, body.report_contacts);
        if let Some(server) = self.get_resource_mut::<PhysicsServer>() {
            server.set_body_shape(&mut handle, &shape, mass, report);
        }
        self.rigid_body_state_mut(id)?.handle = Some(handle);
        Ok(())
    }

    pub fn mass(&self, id: NodeId) -> Result<f32> {
        Ok(self.rigid_body_state(id)?.mass)
    }

    /// Zero mass makes the body static.
    pub fn set_mass(&mut self, id: NodeId, mass: f32) -> Result<()> {
        if !mass.is_finite() || mass < 0.0 {
            return Err(Error::invalid_argument(format!(
                "mass must be finite and non-negative, got {mass}"
            )));
        }
        let body = self.rigid_body_state_mut(id)?;
        body.mass = mass;
        if let Some(handle) = body.handle {
            if let Some(server) = self.get_resource_mut::<PhysicsServer>() {
                server.set_body_mass(handle, mass);
            }
        }
        Ok(())
    }

    /// The collision shape at the node's current scale.
    pub fn shape(&self, id: NodeId) -> Result<Option<Arc<Shape>>> {
        Ok(self.rigid_body_state(id)?.shape.clone())
    }

    /// Set an unscaled shape; the node's scale is applied on top.
    pub fn set_shape(&mut self, id: NodeId, shape: Arc<Shape>) -> Result<()> {
        self.rigid_body_state_mut(id)?.set_base_shape(shape);
        self.sync_shape(id)
    }

    pub fn reports_contacts(&self, id: NodeId) -> Result<bool> {
        Ok(self.rigid_body_state(id)?.report_contacts)
    }

    /// Whether the node's `on_contact` hook is called.
    pub fn set_report_contacts(&mut self, id: NodeId, report: bool) -> Result<()> {
        let body = self.rigid_body_state_mut(id)?;
        body.report_contacts = report;
        if let Some(handle) = body.handle {
            if let Some(server) = self.get_resource_mut::<PhysicsServer>() {
                server.set_contact_reporting(id, handle, report);
            }
        }
        Ok(())
    }

    /// Set the world-space linear velocity. Needs an attached body.
    pub fn set_linear_velocity(&mut self, id: NodeId, velocity: Vec3) -> Result<()> {
        let handle = self
            .rigid_body_state(id)?
            .handle
            .ok_or_else(|| Error::invalid_state(format!("rigid body {id} is not in a physics world")))?;
        self.get_resource_mut::<PhysicsServer>()
            .ok_or_else(|| Error::invalid_state("the tree has no physics server"))?
            .set_linear_velocity(handle, velocity);
        Ok(())
    }

    pub(crate) fn create_rigid_body(&mut self, id: NodeId) {
        if !self.has_resource::<PhysicsServer>() {
            log::warn!("rigid body {id} attached to a tree without a physics server");
            return;
        }
        let Ok(parent) = self.parent_global_transform(id) else {
            return;
        };
        let Ok(body) = self.rigid_body_state(id) else {
            return;
        };
        if body.handle.is_some() {
            return;
        }
        let global = parent.mul_transform(&body.pending);
        let shape = body.shape.clone();
        let desc = BodyDesc {
            translation: global.translation,
            rotation: global.rotation,
            mass: body.mass,
            shape: shape.as_deref(),
            report_contacts: body.report_contacts,
        };
        let Some(server) = self.get_resource_mut::<PhysicsServer>() else {
            return;
        };
        let handle = server.insert_body(id, desc);
        if let Ok(body) = self.rigid_body_state_mut(id) {
            body.handle = Some(handle);
            body.previous_parent = Some(parent);
        }
    }

    pub(crate) fn remove_rigid_body(&mut self, id: NodeId) {
        let Ok(body) = self.rigid_body_state_mut(id) else {
            return;
        };
        let Some(handle) = body.handle.take() else {
            return;
        };
        if let Some(server) = self.get_resource_mut::<PhysicsServer>() {
            server.remove_body(id, handle);
        }
    }

    /// Follow the scene parent before the world steps.
    ///
    /// If the parent's global transform differs from the one seen last time,
    /// the body's pose relative to the old parent frame is re-expressed under
    /// the new one, so motion from both the parent and the simulation is kept.
    /// An unmoved parent leaves the body alone.
    pub fn before_simulation_step(&mut self, id: NodeId) -> Result<()> {
        let Some(parent) = self.parent(id)? else {
            return Ok(());
        };
        let current = self.global_transform(parent)?;
        let body = self.rigid_body_state(id)?;
        if body.previous_parent == Some(current) {
            return Ok(());
        }

        if let (Some(previous), Some(handle), Some(pose)) = (body.previous_parent, body.handle, self.body_pose(body)) {
            let moved = current.mul_transform(&previous.inverse().mul_transform(&pose));
            if let Some(server) = self.get_resource_mut::<PhysicsServer>() {
                server.set_body_pose(handle, moved.translation, moved.rotation);
            }
        }
        self.rigid_body_state_mut(id)?.previous_parent = Some(current);
        Ok(())
    }

    /// Feed a frame's delta to the physics world and run every fixed step
    /// that became due. Returns the number of steps taken.
    pub fn step_physics(&mut self, frame_dt: f32) -> u32 {
        let Some(server) = self.get_resource_mut::<PhysicsServer>() else {
            return 0;
        };
        let steps = server.accumulate(frame_dt);
        for _ in 0..steps {
            self.do_physics_step();
        }
        steps
    }

    /// One fixed step: reconcile every body, step, report contacts.
    pub fn do_physics_step(&mut self) {
        let Some(server) = self.get_resource::<PhysicsServer>() else {
            return;
        };
        for id in server.registered().to_vec() {
            if let Err(err) = self.before_simulation_step(id) {
                log::error!("reconciling rigid body {id} failed: {err}");
            }
        }

        let Some(server) = self.get_resource_mut::<PhysicsServer>() else {
            return;
        };
        for (receiver, other) in server.step_once() {
            if self.is_enabled(receiver) {
                self.run_hook(receiver, "on_contact", |node, ctx| node.on_contact(ctx, other));
            }
        }
    }
}

fn not_a_rigid_body(id: NodeId) -> Error {
    Error::invalid_argument(format!("node {id} is not a rigid body"))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::f32::consts::FRAC_PI_2;
    use std::rc::Rc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::physics::ShapePool;
    use crate::tree::{Node, NodeBuilder, NodeContext};

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    const DT: f32 = 1.0 / 64.0;

    fn world() -> SceneTree {
        let mut tree = SceneTree::new();
        tree.insert_resource(PhysicsServer::new().with_timestep(DT));
        tree
    }

    fn body_count(tree: &SceneTree) -> usize {
        tree.get_resource::<PhysicsServer>().map_or(0, PhysicsServer::body_count)
    }

    /// Parent spatial node at `at`, with a static rigid body child at local (1, 0, 0).
    fn parent_and_body(tree: &mut SceneTree, at: Vec3) -> (NodeId, NodeId) {
        let parent = tree.spawn(NodeBuilder::spatial().with_translation(at));
        let body = tree.spawn(NodeBuilder::rigid_body().with_translation(Vec3::X));
        tree.set_mass(body, 0.0).unwrap();
        tree.queue_add_child(parent, body).unwrap();
        tree.set_root(parent).unwrap();
        tree.advance(parent).unwrap();
        (parent, body)
    }

    #[test]
    fn detached_setters_only_touch_cached_values() {
        let mut tree = world();
        let id = tree.spawn(NodeBuilder::rigid_body());
        tree.set_translation(id, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        tree.set_rotation(id, Quat::from_rotation_x(0.5)).unwrap();
        assert_eq!(body_count(&tree), 0);
        assert_eq!(tree.translation(id).unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(tree.global_rotation(id).unwrap(), Quat::from_rotation_x(0.5));
    }

    #[test]
    fn attach_creates_the_body_at_the_parent_relative_pose() {
        let mut tree = world();
        let (_, body) = parent_and_body(&mut tree, Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(body_count(&tree), 1);
        assert!(close(tree.global_translation(body).unwrap(), Vec3::new(1.0, 10.0, 0.0)));
        assert!(close(tree.translation(body).unwrap(), Vec3::X));
    }

    #[test]
    fn translation_setter_is_relative_to_the_parent() {
        let mut tree = world();
        let (parent, body) = parent_and_body(&mut tree, Vec3::ZERO);
        tree.set_rotation(parent, Quat::from_rotation_y(FRAC_PI_2)).unwrap();
        tree.before_simulation_step(body).unwrap();

        tree.set_translation(body, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        // A quarter turn about +Y sends +X to -Z.
        assert!(close(tree.global_translation(body).unwrap(), Vec3::new(0.0, 0.0, -2.0)));
        assert!(close(tree.translation(body).unwrap(), Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let mut tree = world();
        let (_, body) = parent_and_body(&mut tree, Vec3::ZERO);

        let before = tree.global_transform(body).unwrap();
        tree.before_simulation_step(body).unwrap();
        tree.before_simulation_step(body).unwrap();
        assert_eq!(tree.global_transform(body).unwrap(), before);
    }

    #[test]
    fn moving_the_parent_carries_the_body() {
        let mut tree = world();
        let (parent, body) = parent_and_body(&mut tree, Vec3::ZERO);

        tree.set_translation(parent, Vec3::new(5.0, 0.0, 0.0)).unwrap();
        tree.before_simulation_step(body).unwrap();
        assert!(close(tree.global_translation(body).unwrap(), Vec3::new(6.0, 0.0, 0.0)));

        // Second call with no further motion changes nothing.
        tree.before_simulation_step(body).unwrap();
        assert!(close(tree.global_translation(body).unwrap(), Vec3::new(6.0, 0.0, 0.0)));

        tree.set_rotation(parent, Quat::from_rotation_y(FRAC_PI_2)).unwrap();
        tree.before_simulation_step(body).unwrap();
        assert!(close(tree.global_translation(body).unwrap(), Vec3::new(5.0, 0.0, -1.0)));
        assert!(close(tree.translation(body).unwrap(), Vec3::X));
    }

    #[test]
    fn parent_motion_and_gravity_both_survive() {
        let mut tree = world();
        let parent = tree.spawn(NodeBuilder::spatial());
        let ball = tree.spawn(
            NodeBuilder::rigid_body()
                .with_translation(Vec3::X)
                .with_shape(Arc::new(Shape::Ball { radius: 0.5 })),
        );
        tree.queue_add_child(parent, ball).unwrap();
        tree.set_root(parent).unwrap();
        tree.advance(parent).unwrap();

        tree.set_translation(parent, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        assert_eq!(tree.step_physics(DT), 1);

        let global = tree.global_translation(ball).unwrap();
        assert!((global.x - 4.0).abs() < 1e-3);
        assert!(global.y < 0.0);
    }

    #[test]
    fn free_bodies_fall() {
        let mut tree = world();
        let ball = tree.spawn(
            NodeBuilder::rigid_body()
                .with_translation(Vec3::new(0.0, 10.0, 0.0))
                .with_shape(Arc::new(Shape::Ball { radius: 0.5 })),
        );
        tree.set_root(ball).unwrap();

        // Capped at 0.25 s per frame.
        assert_eq!(tree.step_physics(1.0), 16);
        assert!(tree.global_translation(ball).unwrap().y < 10.0);
        assert_eq!(tree.step_physics(0.0), 0);
    }

    #[test]
    fn mass_must_be_finite_and_non_negative() {
        let mut tree = world();
        let id = tree.spawn(NodeBuilder::rigid_body());
        assert_eq!(tree.set_mass(id, -1.0).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(tree.set_mass(id, f32::NAN).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(tree.set_mass(id, f32::INFINITY).unwrap_err().kind(), ErrorKind::InvalidArgument);
        tree.set_mass(id, 0.0).unwrap();
        assert_eq!(tree.mass(id).unwrap(), 0.0);

        let spatial = tree.spawn(NodeBuilder::spatial());
        assert!(tree.set_mass(spatial, 1.0).is_err());
    }

    #[test]
    fn static_bodies_stay_put() {
        let mut tree = world();
        let slab = tree.spawn(
            NodeBuilder::rigid_body()
                .with_shape(Arc::new(Shape::cuboid(Vec3::new(10.0, 1.0, 10.0)).unwrap())),
        );
        tree.set_mass(slab, 0.0).unwrap();
        tree.set_root(slab).unwrap();
        tree.step_physics(0.25);
        assert_eq!(tree.global_translation(slab).unwrap(), Vec3::ZERO);
    }

    #[test]
    fn scaling_replaces_the_shared_shape() {
        let mut tree = world();
        let mut pool = ShapePool::new();
        let shared = pool.intern(Shape::Ball { radius: 1.0 });
        let id = tree.spawn(NodeBuilder::rigid_body());
        tree.set_root(id).unwrap();
        tree.set_shape(id, shared.clone()).unwrap();
        assert!(Arc::ptr_eq(&tree.shape(id).unwrap().unwrap(), &shared));

        tree.set_scale(id, Vec3::splat(2.0)).unwrap();
        let scaled = tree.shape(id).unwrap().unwrap();
        assert!(!Arc::ptr_eq(&scaled, &shared));
        assert_eq!(*scaled, Shape::Ball { radius: 2.0 });
        assert_eq!(*shared, Shape::Ball { radius: 1.0 });
        assert_eq!(tree.scale(id).unwrap(), Vec3::splat(2.0));

        // Same scale again: nothing to rebuild.
        tree.set_scale(id, Vec3::splat(2.0)).unwrap();
        assert!(Arc::ptr_eq(&tree.shape(id).unwrap().unwrap(), &scaled));

        assert_eq!(tree.set_scale(id, Vec3::ZERO).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn scale_history_does_not_leak_into_the_shape() {
        let mut tree = world();
        let id = tree.spawn(NodeBuilder::rigid_body().with_shape(Arc::new(Shape::Ball { radius: 1.0 })));
        tree.set_root(id).unwrap();

        tree.set_scale(id, Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let wide = tree.shape(id).unwrap().unwrap();
        tree.set_scale(id, Vec3::new(1.0, 2.0, 1.0)).unwrap();
        let tall = tree.shape(id).unwrap().unwrap();
        assert_eq!(*tall, Shape::Ball { radius: 2.0 });
        assert!(!Arc::ptr_eq(&wide, &tall));

        tree.set_scale(id, Vec3::ONE).unwrap();
        assert_eq!(*tree.shape(id).unwrap().unwrap(), Shape::Ball { radius: 1.0 });

        let cylinder = tree.spawn(NodeBuilder::rigid_body().with_shape(Arc::new(Shape::Cylinder {
            half_height: 1.0,
            radius: 1.0,
        })));
        tree.set_scale(cylinder, Vec3::new(3.0, 1.0, 1.0)).unwrap();
        tree.set_scale(cylinder, Vec3::new(1.0, 1.0, 2.0)).unwrap();
        assert_eq!(
            *tree.shape(cylinder).unwrap().unwrap(),
            Shape::Cylinder {
                half_height: 1.0,
                radius: 2.0
            }
        );
    }

    #[test]
    fn destroying_the_node_removes_the_body() {
        let mut tree = world();
        let (parent, body) = parent_and_body(&mut tree, Vec3::ZERO);
        assert_eq!(body_count(&tree), 1);

        tree.queue_remove_child(parent, body).unwrap();
        tree.advance(parent).unwrap();
        assert_eq!(body_count(&tree), 0);
        tree.step_physics(0.1);
    }

    #[test]
    fn without_a_server_the_body_stays_pending() {
        let mut tree = SceneTree::new();
        let id = tree.spawn(NodeBuilder::rigid_body().with_translation(Vec3::Y));
        tree.set_root(id).unwrap();
        assert_eq!(tree.global_translation(id).unwrap(), Vec3::Y);
        assert_eq!(tree.step_physics(1.0), 0);
        assert_eq!(
            tree.set_linear_velocity(id, Vec3::X).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn copies_are_detached_at_the_same_local_pose() {
        let mut tree = world();
        let (_, body) = parent_and_body(&mut tree, Vec3::new(0.0, 4.0, 0.0));
        let copy = tree.copy(body).unwrap();
        assert!(!tree.is_attached(copy));
        assert_eq!(body_count(&tree), 1);
        assert!(close(tree.translation(copy).unwrap(), Vec3::X));
        assert_eq!(tree.mass(copy).unwrap(), 0.0);
    }

    #[derive(Clone)]
    struct Recorder(Rc<RefCell<Vec<NodeId>>>);

    impl Node for Recorder {
        fn on_contact(&mut self, _ctx: &mut NodeContext<'_>, other: NodeId) -> Result<()> {
            self.0.borrow_mut().push(other);
            Ok(())
        }
    }

    #[test]
    fn touching_reporters_get_contacts() {
        let ground_log = Rc::new(RefCell::new(Vec::new()));
        let ball_log = Rc::new(RefCell::new(Vec::new()));
        let mut tree = world();

        let root = tree.spawn(NodeBuilder::spatial());
        let ground = tree.spawn(
            NodeBuilder::rigid_body()
                .with_behavior(Recorder(ground_log.clone()))
                .with_shape(Arc::new(Shape::cuboid(Vec3::new(20.0, 1.0, 20.0)).unwrap())),
        );
        tree.set_mass(ground, 0.0).unwrap();
        tree.set_report_contacts(ground, true).unwrap();
        let ball = tree.spawn(
            NodeBuilder::rigid_body()
                .with_behavior(Recorder(ball_log.clone()))
                .with_translation(Vec3::new(0.0, 1.2, 0.0))
                .with_shape(Arc::new(Shape::Ball { radius: 0.5 })),
        );
        tree.queue_add_child(root, ground).unwrap();
        tree.queue_add_child(root, ball).unwrap();
        tree.set_root(root).unwrap();
        tree.advance(root).unwrap();

        for _ in 0..4 {
            tree.step_physics(0.25);
        }

        assert!(!ground_log.borrow().is_empty());
        assert!(ground_log.borrow().iter().all(|&other| other == ball));
        // The ball never asked for reports.
        assert!(ball_log.borrow().is_empty());
        assert!(tree.global_translation(ball).unwrap().y > 0.0);
    }
}

//! # Physics — Rapier World Behind Rigid-Body Nodes
//!
//! The [`PhysicsServer`] resource owns a rapier3d simulation. Rigid-body
//! nodes register a body with it when they attach and remove the body when
//! they are destroyed. The body's pose is the node's global transform.
//!
//! ## Stepping
//!
//! ```text
//! SceneTree::step_physics(frame_dt)
//!   accumulator += min(frame_dt, max_frame_delta)
//!   while accumulator >= dt:            fixed dt, default 1/60 s
//!     for body in registered:           registration order, parents first
//!       before_simulation_step(body)    follow the scene parent
//!     pipeline.step()
//!     on_contact(a, b) / on_contact(b, a) for touching reporters
//! ```
//!
//! ## Two authorities
//!
//! A rigid body's global pose is owned by rapier, but its scene parent may
//! move too. Before every step each body re-expresses its pose relative to
//! the parent's previous global transform under the parent's current one,
//! so both motions survive. See [`SceneTree::before_simulation_step`].
//!
//! ## Comparison
//!
//! - **Godot**: `RigidBody3D` ignores its parent's motion once simulated
//!   (it is "top level"). Here the parent carries the body along instead.
//! - **bevy_rapier**: syncs `GlobalTransform` both ways each frame through
//!   change detection; the parent-follow rule here is explicit instead.

mod rigid_body;
mod shape;

pub use rigid_body::RigidBodyState;
pub use shape::{Shape, ShapePool};

use std::collections::HashMap;
use std::sync::Mutex;

use rapier3d::prelude::*;

use crate::math::{Quat, Vec3};
use crate::tree::NodeId;

/// Convert a glam Quat to a scaled-axis-angle Vec3 (for RigidBodyBuilder::rotation).
fn quat_to_scaled_axis(q: Quat) -> Vec3 {
    let (axis, angle) = q.to_axis_angle();
    axis * angle
}

/// Handles of one node's rapier body and its collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyHandle {
    pub(crate) body: RigidBodyHandle,
    pub(crate) collider: Option<ColliderHandle>,
}

/// What a rigid-body node hands the server to build its body.
pub(crate) struct BodyDesc<'a> {
    pub translation: Vec3,
    pub rotation: Quat,
    pub mass: f32,
    pub shape: Option<&'a Shape>,
    pub report_contacts: bool,
}

fn body_type_for(mass: f32) -> RigidBodyType {
    if mass == 0.0 {
        RigidBodyType::Fixed
    } else {
        RigidBodyType::Dynamic
    }
}

fn contact_events(report: bool) -> ActiveEvents {
    if report {
        ActiveEvents::COLLISION_EVENTS
    } else {
        ActiveEvents::empty()
    }
}

/// Collects collision events while rapier steps.
#[derive(Default)]
struct ContactCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: f32,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: f32,
    ) {
    }
}

/// The 3D physics world. Insert as a resource; the tree steps it through
/// [`SceneTree::step_physics`](crate::tree::SceneTree::step_physics).
pub struct PhysicsServer {
    gravity: Vec3,
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    collector: ContactCollector,
    /// Registered nodes in registration order.
    registered: Vec<NodeId>,
    body_to_node: HashMap<RigidBodyHandle, NodeId>,
    /// Nodes whose `on_contact` hook wants calls.
    reporters: Vec<NodeId>,
    /// Collider pairs currently touching, from start/stop events.
    touching: Vec<(ColliderHandle, ColliderHandle)>,
    accumulator: f32,
    max_frame_delta: f32,
}

impl std::fmt::Debug for PhysicsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsServer")
            .field("gravity", &self.gravity)
            .field("timestep", &self.params.dt)
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .finish()
    }
}

impl Default for PhysicsServer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsServer {
    /// Gravity (0, -9.81, 0), a 1/60 s step, frame deltas capped at 0.25 s.
    pub fn new() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            pipeline: PhysicsPipeline::new(),
            params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            collector: ContactCollector::default(),
            registered: Vec::new(),
            body_to_node: HashMap::new(),
            reporters: Vec::new(),
            touching: Vec::new(),
            accumulator: 0.0,
            max_frame_delta: 0.25,
        }
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_timestep(mut self, dt: f32) -> Self {
        self.params.dt = dt;
        self
    }

    pub fn with_max_frame_delta(mut self, max: f32) -> Self {
        self.max_frame_delta = max;
        self
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn timestep(&self) -> f32 {
        self.params.dt
    }

    pub fn body_count(&self) -> usize {
        self.registered.len()
    }

    /// Registered rigid-body nodes in registration order.
    pub fn registered(&self) -> &[NodeId] {
        &self.registered
    }

    // ── Bodies ───────────────────────────────────────────────────────

    pub(crate) fn insert_body(&mut self, node: NodeId, desc: BodyDesc<'_>) -> BodyHandle {
        let mut builder = RigidBodyBuilder::new(body_type_for(desc.mass))
            .translation(desc.translation)
            .rotation(quat_to_scaled_axis(desc.rotation));
        if desc.shape.is_none() {
            builder = builder.additional_mass(desc.mass);
        }
        let body = self.bodies.insert(builder.build());

        let collider = desc.shape.map(|shape| {
            let collider = Self::collider_for(shape, desc.mass, desc.report_contacts);
            self.colliders.insert_with_parent(collider, body, &mut self.bodies)
        });

        self.registered.push(node);
        self.body_to_node.insert(body, node);
        if desc.report_contacts {
            self.reporters.push(node);
        }
        log::debug!("physics: registered body for node {node}");
        BodyHandle { body, collider }
    }

    fn collider_for(shape: &Shape, mass: f32, report_contacts: bool) -> Collider {
        let mut builder = ColliderBuilder::new(shape.to_rapier()).active_events(contact_events(report_contacts));
        if mass > 0.0 {
            builder = builder.mass(mass);
        }
        builder.build()
    }

    pub(crate) fn remove_body(&mut self, node: NodeId, handle: BodyHandle) {
        if let Some(collider) = handle.collider {
            self.touching.retain(|&(a, b)| a != collider && b != collider);
        }
        self.bodies.remove(
            handle.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        self.body_to_node.remove(&handle.body);
        self.registered.retain(|&n| n != node);
        self.reporters.retain(|&n| n != node);
        log::debug!("physics: removed body of node {node}");
    }

    /// World pose of a body.
    pub fn body_pose(&self, handle: BodyHandle) -> Option<(Vec3, Quat)> {
        let body = self.bodies.get(handle.body)?;
        Some((body.translation(), *body.rotation()))
    }

    pub(crate) fn set_body_pose(&mut self, handle: BodyHandle, translation: Vec3, rotation: Quat) {
        if let Some(body) = self.bodies.get_mut(handle.body) {
            body.set_translation(translation, true);
            body.set_rotation(rotation, true);
        }
    }

    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle.body) {
            body.set_linvel(velocity, true);
        }
    }

    /// Swap the collider's shape, creating the collider if the body had none.
    pub(crate) fn set_body_shape(&mut self, handle: &mut BodyHandle, shape: &Shape, mass: f32, report_contacts: bool) {
        match handle.collider.and_then(|c| self.colliders.get_mut(c)) {
            Some(collider) => collider.set_shape(shape.to_rapier()),
            None => {
                if let Some(body) = self.bodies.get_mut(handle.body) {
                    body.set_additional_mass(0.0, true);
                }
                let collider = Self::collider_for(shape, mass, report_contacts);
                handle.collider = Some(self.colliders.insert_with_parent(collider, handle.body, &mut self.bodies));
            }
        }
    }

    /// Zero mass makes the body fixed; positive mass makes it dynamic.
    pub(crate) fn set_body_mass(&mut self, handle: BodyHandle, mass: f32) {
        if let Some(body) = self.bodies.get_mut(handle.body) {
            body.set_body_type(body_type_for(mass), true);
            if handle.collider.is_none() {
                body.set_additional_mass(mass, true);
            }
        }
        if mass > 0.0 {
            if let Some(collider) = handle.collider.and_then(|c| self.colliders.get_mut(c)) {
                collider.set_mass(mass);
            }
        }
    }

    pub(crate) fn set_contact_reporting(&mut self, node: NodeId, handle: BodyHandle, report: bool) {
        if let Some(collider) = handle.collider.and_then(|c| self.colliders.get_mut(c)) {
            collider.set_active_events(contact_events(report));
        }
        self.reporters.retain(|&n| n != node);
        if report {
            self.reporters.push(node);
        }
    }

    // ── Stepping ─────────────────────────────────────────────────────

    /// Add a frame's time and return how many fixed steps are due.
    pub(crate) fn accumulate(&mut self, frame_dt: f32) -> u32 {
        if frame_dt <= 0.0 {
            return 0;
        }
        self.accumulator += frame_dt.min(self.max_frame_delta);
        let mut steps = 0;
        while self.accumulator >= self.params.dt {
            self.accumulator -= self.params.dt;
            steps += 1;
        }
        steps
    }

    /// Advance the simulation by one fixed step. Returns `(receiver, other)`
    /// pairs for every touching pair whose receiver reports contacts.
    pub(crate) fn step_once(&mut self) -> Vec<(NodeId, NodeId)> {
        self.pipeline.step(
            self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &self.collector,
        );

        let events = match self.collector.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        };
        for event in events {
            let pair = (event.collider1(), event.collider2());
            if event.started() {
                if !self.touching.contains(&pair) {
                    self.touching.push(pair);
                }
            } else {
                self.touching.retain(|&p| p != pair);
            }
        }

        let mut contacts = Vec::new();
        for &(a, b) in &self.touching {
            let (Some(a), Some(b)) = (self.collider_node(a), self.collider_node(b)) else {
                continue;
            };
            if self.reporters.contains(&a) {
                contacts.push((a, b));
            }
            if self.reporters.contains(&b) {
                contacts.push((b, a));
            }
        }
        contacts
    }

    fn collider_node(&self, collider: ColliderHandle) -> Option<NodeId> {
        let body = self.colliders.get(collider)?.parent()?;
        self.body_to_node.get(&body).copied()
    }
}

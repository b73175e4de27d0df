//! Engine and plugin system.
//!
//! The [`Engine`] drives one [`SceneTree`]: the host loop (a window, a test,
//! a headless server) calls [`Engine::tick`] with the time that passed and
//! the engine does the rest in a fixed order.
//!
//! ```text
//!  tick(delta)
//!    │ Time.advance(delta)
//!    │ tree.advance(root)           flush queues, update hooks (post-order)
//!    │ tree.step_physics(delta)     0..n fixed steps          [physics3d]
//!    │ RenderingServer.render(tree) ──► DrawList
//!    │ send_diagnostics(tree)       throttled UDP snapshot    [diagnostics]
//!    ▼ PointerState.clear_just()
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use askr::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::from_file("askr.json")?)
//!     .add_plugins(DefaultPlugins);
//! let level = engine.load_scene_file("assets/level.json")?;
//! engine.set_root(level)?;
//! loop {
//!     engine.tick(Duration::from_millis(16));
//!     backend.submit(engine.draw_list());
//! }
//! ```
//!
//! Plugins insert servers into the tree, so add them before setting the
//! root: nodes register with the servers present when they attach.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::input::PointerState;
use crate::registry::TypeRegistry;
use crate::render::{DrawList, RenderingServer};
use crate::scene;
use crate::time::Time;
use crate::tree::{NodeId, SceneTree};

/// A plugin adds servers, resources and node types to the engine.
pub trait Plugin {
    fn build(&self, engine: &mut Engine);
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    pub frame: u64,
    pub delta: Duration,
    pub physics_steps: u32,
    pub draw_commands: usize,
    /// Time spent in tree traversal, microseconds.
    pub update_us: f64,
    pub physics_us: f64,
    pub render_us: f64,
}

pub struct Engine {
    tree: SceneTree,
    registry: TypeRegistry,
    config: EngineConfig,
    draw_list: DrawList,
    last_tick: TickStats,
}

impl Engine {
    /// An engine with [`Time`], [`PointerState`] and a [`RenderingServer`]
    /// sized from `config`, and the built-in node types registered.
    pub fn new(config: EngineConfig) -> Self {
        let mut tree = SceneTree::new();
        tree.insert_resource(Time::new());
        tree.insert_resource(PointerState::new());
        tree.insert_resource(RenderingServer::new(config.render.viewport_size));

        Self {
            tree,
            registry: TypeRegistry::new(),
            config,
            draw_list: DrawList::default(),
            last_tick: TickStats::default(),
        }
    }

    /// Apply a plugin.
    pub fn add_plugins<P: Plugin>(mut self, plugin: P) -> Self {
        plugin.build(&mut self);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Register game node types here before loading scenes that use them.
    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn time(&self) -> Option<&Time> {
        self.tree.get_resource::<Time>()
    }

    /// The host feeds cursor and button state here between ticks.
    pub fn pointer_mut(&mut self) -> Option<&mut PointerState> {
        self.tree.get_resource_mut::<PointerState>()
    }

    /// Build a detached subtree from a scene file with this engine's registry.
    pub fn load_scene_file(&mut self, path: impl AsRef<Path>) -> Result<NodeId> {
        scene::load_scene_from_file(&mut self.tree, &self.registry, path)
    }

    pub fn set_root(&mut self, id: NodeId) -> Result<()> {
        self.tree.set_root(id)
    }

    /// Draw commands of the last tick.
    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    pub fn last_tick(&self) -> &TickStats {
        &self.last_tick
    }

    /// Run one frame of `delta` simulated time. Hook and node failures are
    /// logged where they happen; a tick itself never fails.
    pub fn tick(&mut self, delta: Duration) -> TickStats {
        let frame = match self.tree.get_resource_mut::<Time>() {
            Some(time) => {
                time.advance(delta);
                time.frame_count()
            }
            None => 0,
        };

        let started = Instant::now();
        if let Some(root) = self.tree.root() {
            if let Err(err) = self.tree.advance(root) {
                log::error!("advancing root {root} failed: {err}");
            }
        }
        let update_us = micros_since(started);

        let started = Instant::now();
        #[cfg(feature = "physics3d")]
        let physics_steps = self.tree.step_physics(delta.as_secs_f32());
        #[cfg(not(feature = "physics3d"))]
        let physics_steps = 0;
        let physics_us = micros_since(started);

        let started = Instant::now();
        self.draw_list = self
            .tree
            .get_resource::<RenderingServer>()
            .map(|rendering| rendering.render(&self.tree))
            .unwrap_or_default();
        let render_us = micros_since(started);

        let stats = TickStats {
            frame,
            delta,
            physics_steps,
            draw_commands: self.draw_list.len(),
            update_us,
            physics_us,
            render_us,
        };

        #[cfg(feature = "diagnostics")]
        crate::diag::send_diagnostics(&mut self.tree, &stats);

        if let Some(pointer) = self.tree.get_resource_mut::<PointerState>() {
            pointer.clear_just();
        }
        self.last_tick = stats;
        stats
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn micros_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1_000_000.0
}

// ── Plugins ─────────────────────────────────────────────────────────────

/// Inserts a [`PhysicsServer`](crate::physics::PhysicsServer) configured from
/// `config.physics`.
#[cfg(feature = "physics3d")]
pub struct PhysicsPlugin;

#[cfg(feature = "physics3d")]
impl Plugin for PhysicsPlugin {
    fn build(&self, engine: &mut Engine) {
        let physics = &engine.config.physics;
        let server = crate::physics::PhysicsServer::new()
            .with_gravity(physics.gravity)
            .with_timestep(physics.timestep)
            .with_max_frame_delta(physics.max_frame_delta);
        if engine.tree.root().is_some() {
            log::warn!("physics added after the root was set; bodies already in the tree stay unsimulated");
        }
        engine.tree.insert_resource(server);
    }
}

/// Installs the capturing logger and a
/// [`DiagSender`](crate::diag::DiagSender) when `config.diagnostics.enabled`.
#[cfg(feature = "diagnostics")]
pub struct DiagnosticsPlugin;

#[cfg(feature = "diagnostics")]
impl Plugin for DiagnosticsPlugin {
    fn build(&self, engine: &mut Engine) {
        let config = &engine.config.diagnostics;
        if !config.enabled {
            return;
        }
        crate::diag::init_logger();
        match crate::diag::DiagSender::new(config) {
            Ok(sender) => engine.tree.insert_resource(sender),
            Err(err) => log::warn!("diagnostics disabled: {err}"),
        }
    }
}

/// Every plugin compiled in.
pub struct DefaultPlugins;

impl Plugin for DefaultPlugins {
    fn build(&self, engine: &mut Engine) {
        #[cfg(feature = "physics3d")]
        PhysicsPlugin.build(engine);
        #[cfg(feature = "diagnostics")]
        DiagnosticsPlugin.build(engine);
        #[cfg(not(any(feature = "physics3d", feature = "diagnostics")))]
        let _ = engine;
    }
}

//! # Askr — Scene Graph and Transform Sync
//!
//! A tree of typed nodes (spatial, GUI, rigid body) with deferred structural
//! edits, lazily cached global transforms, data-driven construction through a
//! [`TypeRegistry`](registry::TypeRegistry), and rigid bodies whose global
//! transform is owned by a rapier world.
//!
//! Start with `use askr::prelude::*` and drive an [`Engine`](engine::Engine),
//! or use a bare [`SceneTree`](tree::SceneTree) directly.

pub mod config;
pub mod engine;
pub mod error;
pub mod gui;
pub mod input;
pub mod math;
pub mod prelude;
pub mod property;
pub mod registry;
pub mod render;
pub mod scene;
pub mod time;
pub mod tree;

#[cfg(feature = "physics3d")]
pub mod physics;

#[cfg(feature = "diagnostics")]
pub mod diag;

pub use error::{Error, ErrorKind, Result};

/// Install `env_logger` as the `log` backend, configured from `RUST_LOG`.
/// Does nothing if a logger is already installed.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

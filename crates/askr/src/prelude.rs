//! Convenience re-exports — `use askr::prelude::*` for the common items.

pub use crate::config::{DiagnosticsConfig, EngineConfig, PhysicsConfig, RenderConfig};
pub use crate::engine::{DefaultPlugins, Engine, Plugin, TickStats};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::gui::{ButtonNode, GuiTexture, GuiTransform, OriginX, OriginY, SizeMode, TextureRef};
pub use crate::input::{Input, MouseButton, PointerState};
pub use crate::math::{Mat4, Quat, Rect, Transform, Vec2, Vec3, Vec4};
pub use crate::property::{FromProperty, Property, PropertyValue};
pub use crate::registry::TypeRegistry;
pub use crate::render::{DrawCommand, DrawContext, DrawList, RenderingServer};
pub use crate::scene::{SceneData, load_scene, load_scene_from_file, load_scene_from_str};
pub use crate::time::Time;
pub use crate::tree::{EmptyNode, Node, NodeBuilder, NodeContext, NodeId, NodeKind, SceneTree};
#[cfg(feature = "physics3d")]
pub use crate::engine::PhysicsPlugin;
#[cfg(feature = "physics3d")]
pub use crate::physics::{PhysicsServer, Shape, ShapePool};
#[cfg(feature = "diagnostics")]
pub use crate::engine::DiagnosticsPlugin;
#[cfg(feature = "diagnostics")]
pub use crate::diag::DiagSender;

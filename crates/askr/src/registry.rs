//! # Type Registry — Data-Driven Node Construction
//!
//! Maps node type names to a constructor, a table of property setters, and a
//! parent type. Scene loaders build nodes exclusively through it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use askr::prelude::*;
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_type("spinner", Some("spatial_node"), || {
//!     NodeBuilder::spatial().with_behavior(Spinner::default())
//! })?;
//! registry.add_behavior_setter::<Spinner>("spinner", "speed", |spinner, property| {
//!     spinner.speed = property.get()?;
//!     Ok(())
//! })?;
//!
//! // `translation` is inherited from spatial_node.
//! let id = registry.construct_with(&mut tree, "spinner", &[
//!     Property::new("speed", 2.0f32),
//!     Property::new("translation", Vec3::Y),
//! ])?;
//! ```
//!
//! ## Setter resolution
//!
//! ```text
//!  call_setter("button_node", {name: "translation"})
//!    button_node.setters  ── miss
//!    gui_node.setters     ── miss
//!    node.setters         ── miss  → Ok(false), caller decides
//! ```
//!
//! A derived type registering a name its ancestor already owns shadows it.
//! Parents are fixed when a type is first registered and must already exist,
//! so the chain can't contain a cycle.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::gui::{ButtonNode, GuiTexture, GuiTransform};
use crate::property::Property;
use crate::tree::{Node, NodeBuilder, NodeId, SceneTree};

#[cfg(feature = "physics3d")]
use crate::physics::{Shape, ShapePool};
#[cfg(feature = "physics3d")]
use std::sync::Arc;

type Constructor = Box<dyn Fn() -> NodeBuilder>;
type Setter = Box<dyn Fn(&mut SceneTree, NodeId, &Property) -> Result<()>>;

struct NodeType {
    /// `None` for abstract types.
    constructor: Option<Constructor>,
    setters: HashMap<String, Setter>,
    parent: Option<String>,
}

/// Name → {constructor, setters, parent type}.
pub struct TypeRegistry {
    types: HashMap<String, NodeType>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry holding the built-in node types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// A registry without any types, not even `node`.
    pub fn empty() -> Self {
        Self { types: HashMap::new() }
    }

    /// Register a concrete type. `base` must already be registered.
    ///
    /// Registering a name again replaces its constructor and keeps its
    /// setters and its original parent.
    pub fn register_type(
        &mut self,
        name: &str,
        base: Option<&str>,
        constructor: impl Fn() -> NodeBuilder + 'static,
    ) -> Result<()> {
        self.insert_type(name, base, Some(Box::new(constructor)))
    }

    /// Register a type that only exists to share setters with its subtypes.
    pub fn register_abstract(&mut self, name: &str, base: Option<&str>) -> Result<()> {
        self.insert_type(name, base, None)
    }

    fn insert_type(&mut self, name: &str, base: Option<&str>, constructor: Option<Constructor>) -> Result<()> {
        if let Some(existing) = self.types.get_mut(name) {
            if existing.parent.as_deref() != base {
                log::warn!("type `{name}` re-registered with a different base; keeping the original");
            }
            existing.constructor = constructor;
            return Ok(());
        }
        if let Some(base) = base {
            if !self.types.contains_key(base) {
                return Err(Error::UnknownType(base.to_owned()));
            }
        }
        self.types.insert(
            name.to_owned(),
            NodeType {
                constructor,
                setters: HashMap::new(),
                parent: base.map(str::to_owned),
            },
        );
        log::debug!("registered node type `{name}`");
        Ok(())
    }

    /// Add a setter that works on the tree-side state of the node.
    pub fn add_setter(
        &mut self,
        type_name: &str,
        property: &str,
        setter: impl Fn(&mut SceneTree, NodeId, &Property) -> Result<()> + 'static,
    ) -> Result<()> {
        let node_type = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_owned()))?;
        node_type.setters.insert(property.to_owned(), Box::new(setter));
        Ok(())
    }

    /// Add a setter that works on the node's behavior of type `T`.
    pub fn add_behavior_setter<T: Node>(
        &mut self,
        type_name: &str,
        property: &str,
        setter: impl Fn(&mut T, &Property) -> Result<()> + 'static,
    ) -> Result<()> {
        let owner = type_name.to_owned();
        self.add_setter(type_name, property, move |tree, id, value| {
            let behavior = tree.behavior_mut::<T>(id).ok_or_else(|| {
                Error::invalid_argument(format!("node {id} does not carry the behavior of `{owner}`"))
            })?;
            setter(behavior, value)
        })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn parent_of(&self, type_name: &str) -> Option<&str> {
        self.types.get(type_name)?.parent.as_deref()
    }

    pub fn is_abstract(&self, type_name: &str) -> bool {
        self.types.get(type_name).is_some_and(|t| t.constructor.is_none())
    }

    /// Whether `type_name` or one of its ancestors owns a setter for `property`.
    pub fn has_setter(&self, type_name: &str, property: &str) -> bool {
        self.find_setter(type_name, property).is_some()
    }

    fn find_setter(&self, type_name: &str, property: &str) -> Option<&Setter> {
        let mut current = self.types.get(type_name);
        while let Some(node_type) = current {
            if let Some(setter) = node_type.setters.get(property) {
                return Some(setter);
            }
            current = node_type.parent.as_deref().and_then(|parent| self.types.get(parent));
        }
        None
    }

    /// Spawn a detached node of a registered type.
    pub fn construct(&self, tree: &mut SceneTree, type_name: &str) -> Result<NodeId> {
        let node_type = self
            .types
            .get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_owned()))?;
        let constructor = node_type
            .constructor
            .as_ref()
            .ok_or_else(|| Error::AbstractType(type_name.to_owned()))?;
        Ok(tree.spawn(constructor().with_type_name(type_name)))
    }

    /// Construct, then apply `properties` in order. Unknown properties are
    /// skipped with a warning. If a setter fails, the node is destroyed and
    /// the error returned.
    pub fn construct_with(&self, tree: &mut SceneTree, type_name: &str, properties: &[Property]) -> Result<NodeId> {
        let id = self.construct(tree, type_name)?;
        if let Err(err) = self.apply(tree, type_name, id, properties) {
            tree.destroy(id)?;
            return Err(err);
        }
        Ok(id)
    }

    /// Apply properties to an existing node, resolved by its registered type.
    pub fn set_properties(&self, tree: &mut SceneTree, id: NodeId, properties: &[Property]) -> Result<()> {
        let type_name = tree.type_name(id)?.to_owned();
        if type_name.is_empty() {
            log::warn!("node {id} has no registered type; ignoring {} properties", properties.len());
            return Ok(());
        }
        self.apply(tree, &type_name, id, properties)
    }

    fn apply(&self, tree: &mut SceneTree, type_name: &str, id: NodeId, properties: &[Property]) -> Result<()> {
        for property in properties {
            if !self.call_setter(tree, type_name, id, property)? {
                log::warn!(
                    "tried to set unregistered property `{}` on a node of type `{type_name}`",
                    property.name
                );
            }
        }
        Ok(())
    }

    /// Run the setter for `property.name`, looking in `type_name` first and
    /// then up the parent chain. `Ok(false)` if no type in the chain owns it.
    pub fn call_setter(&self, tree: &mut SceneTree, type_name: &str, id: NodeId, property: &Property) -> Result<bool> {
        if !self.types.contains_key(type_name) {
            return Err(Error::UnknownType(type_name.to_owned()));
        }
        match self.find_setter(type_name, &property.name) {
            Some(setter) => setter(tree, id, property).map(|()| true),
            None => Ok(false),
        }
    }

    // ── Built-ins ────────────────────────────────────────────────────

    fn register_builtins(&mut self) {
        if let Err(err) = self.try_register_builtins() {
            log::error!("registering built-in node types failed: {err}");
        }
    }

    fn try_register_builtins(&mut self) -> Result<()> {
        self.register_abstract("node", None)?;
        self.add_setter("node", "name", |tree, id, p| tree.set_name(id, p.get::<String>()?))?;
        self.add_setter("node", "enabled", |tree, id, p| {
            if p.get::<bool>()? { tree.enable(id) } else { tree.disable(id) }
        })?;

        self.register_type("spatial_node", Some("node"), NodeBuilder::spatial)?;
        self.add_setter("spatial_node", "translation", |tree, id, p| tree.set_translation(id, p.get()?))?;
        self.add_setter("spatial_node", "rotation", |tree, id, p| tree.set_rotation(id, p.get()?))?;
        self.add_setter("spatial_node", "scale", |tree, id, p| tree.set_scale(id, p.get()?))?;

        #[cfg(feature = "physics3d")]
        {
            self.register_type("rigid_body", Some("spatial_node"), NodeBuilder::rigid_body)?;
            self.add_setter("rigid_body", "mass", |tree, id, p| tree.set_mass(id, p.get()?))?;
            self.add_setter("rigid_body", "report_contacts", |tree, id, p| {
                tree.set_report_contacts(id, p.get()?)
            })?;
            self.add_setter("rigid_body", "shape", |tree, id, p| {
                let shape = Shape::from_property(p)?;
                // A scene load leaves a pool in the tree so equal shapes are shared.
                let shape = match tree.get_resource_mut::<ShapePool>() {
                    Some(pool) => pool.intern(shape),
                    None => Arc::new(shape),
                };
                tree.set_shape(id, shape)
            })?;
        }

        self.register_type("gui_canvas", Some("spatial_node"), NodeBuilder::canvas)?;
        self.add_setter("gui_canvas", "screen_overlayed", |tree, id, p| {
            tree.set_screen_overlayed(id, p.get()?)
        })?;
        self.add_setter("gui_canvas", "size", |tree, id, p| tree.set_canvas_size(id, Some(p.get()?)))?;

        self.register_type("gui_node", Some("node"), NodeBuilder::gui)?;
        self.add_setter("gui_node", "transform", |tree, id, p| {
            tree.set_gui_transform(id, GuiTransform::from_property(p)?)
        })?;

        self.register_type("button_node", Some("gui_node"), || {
            NodeBuilder::gui().with_behavior(ButtonNode::default())
        })?;
        self.add_behavior_setter::<ButtonNode>("button_node", "idle_texture", |button, p| {
            button.idle_texture = Some(GuiTexture::from_property(p)?);
            Ok(())
        })?;
        self.add_behavior_setter::<ButtonNode>("button_node", "pressed_texture", |button, p| {
            button.pressed_texture = Some(GuiTexture::from_property(p)?);
            Ok(())
        })?;
        Ok(())
    }
}

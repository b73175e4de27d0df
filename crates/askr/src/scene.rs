//! # Scene Files — JSON Node Trees
//!
//! Loads a JSON scene into a detached subtree. Nodes are built only through
//! the [`TypeRegistry`] (construct + property setters) and linked only with
//! [`SceneTree::queue_add_child`], so a loaded scene grows its children at
//! its first flush like any other subtree.
//!
//! ## Format
//!
//! ```text
//! {
//!   "version": 1,
//!   "name": "level",
//!   "nodes": [
//!     { "id": 0, "type": "spatial_node", "name": "world" },
//!     { "id": 1, "parent_id": 0, "type": "rigid_body",
//!       "translation": [0, 5, 0], "mass": 1.0,
//!       "shape": { "type": "sphere", "radius": 0.5 } },
//!     { "id": 2, "parent_id": 0, "type": "scene_file",
//!       "scene_file_path": "props/crate.json", "translation": [3, 0, 0] }
//!   ]
//! }
//! ```
//!
//! Every key besides `id`, `parent_id` and `type` is a property. Exactly one
//! node has no `parent_id`. Children keep the order they have in the file.
//!
//! A `scene_file` node is replaced by the root of the file it names
//! (resolved against the directory of the file being loaded); its other
//! properties are applied to that root.
//!
//! ## Quick Start
//!
//! ```ignore
//! let registry = TypeRegistry::new();
//! let level = load_scene_from_file(&mut tree, &registry, "assets/level.json")?;
//! tree.set_root(level)?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::property::Property;
use crate::registry::TypeRegistry;
use crate::tree::{NodeId, SceneTree};

#[cfg(feature = "physics3d")]
use crate::physics::ShapePool;

/// The only scene format version this loader reads.
pub const SCENE_VERSION: u64 = 1;

const SCENE_FILE_TYPE: &str = "scene_file";
const SCENE_FILE_PATH: &str = "scene_file_path";

/// A parsed scene file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneData {
    pub version: u64,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<SceneNodeData>,
}

/// One entry of `nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneNodeData {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl SceneNodeData {
    pub fn properties(&self) -> Result<Vec<Property>> {
        self.properties
            .iter()
            .map(|(name, value)| Property::from_json(name, value))
            .collect()
    }
}

/// Root index plus each node's children (indices into `nodes`, file order).
struct Layout {
    root: usize,
    children: HashMap<u64, Vec<usize>>,
}

impl SceneData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn layout(&self) -> Result<Layout> {
        if self.version != SCENE_VERSION {
            return Err(Error::invalid_argument(format!(
                "unsupported scene version {}; only version {SCENE_VERSION} is supported",
                self.version
            )));
        }

        let mut known = HashMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if known.insert(node.id, index).is_some() {
                return Err(Error::invalid_argument(format!("scene node id {} is used twice", node.id)));
            }
        }

        let roots: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].parent_id.is_none())
            .collect();
        let &[root] = roots.as_slice() else {
            return Err(Error::invalid_argument(format!(
                "a scene needs exactly one root node, found {}",
                roots.len()
            )));
        };

        let mut children: HashMap<u64, Vec<usize>> = HashMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let Some(parent) = node.parent_id else {
                continue;
            };
            if !known.contains_key(&parent) {
                return Err(Error::UnknownSceneParent { node: node.id, parent });
            }
            children.entry(parent).or_default().push(index);
        }

        // Parent links that loop among themselves never reach the root.
        let mut reached = 0;
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            reached += 1;
            if let Some(kids) = children.get(&self.nodes[index].id) {
                stack.extend(kids);
            }
        }
        if reached != self.nodes.len() {
            return Err(Error::invalid_argument(format!(
                "{} scene nodes are not connected to the root",
                self.nodes.len() - reached
            )));
        }

        Ok(Layout { root, children })
    }
}

/// Build the scene described by `data` as a detached subtree and return its
/// root. Nested scene files are resolved against the working directory.
pub fn load_scene(tree: &mut SceneTree, registry: &TypeRegistry, data: &SceneData) -> Result<NodeId> {
    let mut loader = Loader::new(registry);
    with_shape_pool(tree, |tree| loader.load(tree, data, Path::new(".")))
}

/// Parse a JSON string and build it; see [`load_scene`].
pub fn load_scene_from_str(tree: &mut SceneTree, registry: &TypeRegistry, json: &str) -> Result<NodeId> {
    load_scene(tree, registry, &SceneData::from_json_str(json)?)
}

/// Load a scene file. Nested scene files are resolved against its directory.
pub fn load_scene_from_file(
    tree: &mut SceneTree,
    registry: &TypeRegistry,
    path: impl AsRef<Path>,
) -> Result<NodeId> {
    let mut loader = Loader::new(registry);
    with_shape_pool(tree, |tree| loader.load_file(tree, path.as_ref()))
}

/// Shapes built during one load share a pool, unless the caller already put
/// one in the tree.
fn with_shape_pool<R>(tree: &mut SceneTree, f: impl FnOnce(&mut SceneTree) -> R) -> R {
    #[cfg(feature = "physics3d")]
    let inserted = !tree.has_resource::<ShapePool>();
    #[cfg(feature = "physics3d")]
    if inserted {
        tree.insert_resource(ShapePool::new());
    }

    let result = f(tree);

    #[cfg(feature = "physics3d")]
    if inserted {
        if let Some(pool) = tree.resource_remove::<ShapePool>() {
            log::debug!("scene load shared {} distinct shapes", pool.len());
        }
    }
    result
}

struct Loader<'r> {
    registry: &'r TypeRegistry,
    /// Files currently being loaded, outermost first.
    open_files: Vec<PathBuf>,
}

impl<'r> Loader<'r> {
    fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            open_files: Vec::new(),
        }
    }

    fn load_file(&mut self, tree: &mut SceneTree, path: &Path) -> Result<NodeId> {
        let key = path.canonicalize()?;
        if self.open_files.contains(&key) {
            return Err(Error::invalid_argument(format!(
                "scene file {} includes itself",
                path.display()
            )));
        }
        let data = SceneData::from_file(path)?;
        log::debug!("loading scene `{}` from {}", data.name, path.display());

        self.open_files.push(key);
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let result = self.load(tree, &data, base_dir);
        self.open_files.pop();
        result
    }

    fn load(&mut self, tree: &mut SceneTree, data: &SceneData, base_dir: &Path) -> Result<NodeId> {
        let layout = data.layout()?;
        self.build(tree, data, &layout, layout.root, base_dir)
    }

    fn build(
        &mut self,
        tree: &mut SceneTree,
        data: &SceneData,
        layout: &Layout,
        index: usize,
        base_dir: &Path,
    ) -> Result<NodeId> {
        let node = &data.nodes[index];
        let id = self.build_node(tree, node, base_dir)?;

        for &child_index in layout.children.get(&node.id).map(Vec::as_slice).unwrap_or_default() {
            let linked = self.build(tree, data, layout, child_index, base_dir).and_then(|child| {
                tree.queue_add_child(id, child).or_else(|err| {
                    tree.destroy(child)?;
                    Err(err)
                })
            });
            if let Err(err) = linked {
                // Queued children go with it.
                tree.destroy(id)?;
                return Err(err);
            }
        }
        Ok(id)
    }

    fn build_node(&mut self, tree: &mut SceneTree, node: &SceneNodeData, base_dir: &Path) -> Result<NodeId> {
        let properties = node.properties()?;
        if node.type_name != SCENE_FILE_TYPE {
            return self.registry.construct_with(tree, &node.type_name, &properties);
        }

        let (path, overrides): (Vec<_>, Vec<_>) = properties.into_iter().partition(|p| p.name == SCENE_FILE_PATH);
        let relative: String = path
            .first()
            .ok_or_else(|| {
                Error::invalid_argument(format!("scene_file node {} has no `{SCENE_FILE_PATH}`", node.id))
            })?
            .get()?;
        let id = self.load_file(tree, &base_dir.join(relative))?;
        if let Err(err) = self.registry.set_properties(tree, id, &overrides) {
            tree.destroy(id)?;
            return Err(err);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::ErrorKind;
    use crate::math::Vec3;

    /// A fresh directory under the system temp dir for one test.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("askr-scene-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const LEVEL: &str = r#"{
        "version": 1,
        "name": "level",
        "nodes": [
            { "id": 7, "parent_id": 1, "type": "spatial_node", "name": "lamp", "translation": [0, 3, 0] },
            { "id": 1, "type": "spatial_node", "name": "world" },
            { "id": 3, "parent_id": 1, "type": "gui_canvas", "name": "hud", "size": [320, 240] },
            { "id": 4, "parent_id": 3, "type": "button_node", "name": "start",
              "transform": { "type": "gui_transform", "position_offset": [10, 10], "size": [80, 20] } }
        ]
    }"#;

    #[test]
    fn builds_a_detached_tree_through_queues() {
        let registry = TypeRegistry::new();
        let mut tree = SceneTree::new();
        let root = load_scene_from_str(&mut tree, &registry, LEVEL).unwrap();

        assert_eq!(tree.name(root).unwrap(), "world");
        assert!(!tree.is_attached(root));
        assert!(tree.children(root).unwrap().is_empty());
        assert_eq!(tree.queued_children(root).unwrap().len(), 2);

        tree.advance(root).unwrap();
        tree.advance(root).unwrap();
        let names: Vec<&str> = tree
            .children(root)
            .unwrap()
            .iter()
            .map(|&c| tree.name(c).unwrap())
            .collect();
        assert_eq!(names, ["lamp", "hud"]);

        let lamp = tree.find(root, "lamp").unwrap();
        assert_eq!(tree.global_translation(lamp).unwrap(), Vec3::new(0.0, 3.0, 0.0));
        let start = tree.find(root, "start").unwrap();
        assert_eq!(tree.type_name(start).unwrap(), "button_node");
        assert_eq!(tree.gui_absolute_size(start).unwrap(), crate::math::Vec2::new(80.0, 20.0));
    }

    #[test]
    fn malformed_scenes_are_rejected() {
        let registry = TypeRegistry::new();
        let mut tree = SceneTree::new();
        let load = |tree: &mut SceneTree, json: &str| load_scene_from_str(tree, &registry, json).unwrap_err();

        let err = load(&mut tree, r#"{"version": 2, "nodes": [{"id": 0, "type": "spatial_node"}]}"#);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = load(&mut tree, r#"{"version": 1, "nodes": []}"#);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let two_roots = r#"{"version": 1, "nodes": [
            {"id": 0, "type": "spatial_node"}, {"id": 1, "type": "spatial_node"}]}"#;
        assert_eq!(load(&mut tree, two_roots).kind(), ErrorKind::InvalidArgument);

        let orphan = r#"{"version": 1, "nodes": [
            {"id": 0, "type": "spatial_node"}, {"id": 1, "parent_id": 9, "type": "spatial_node"}]}"#;
        assert!(matches!(
            load(&mut tree, orphan),
            Error::UnknownSceneParent { node: 1, parent: 9 }
        ));

        let looped = r#"{"version": 1, "nodes": [
            {"id": 0, "type": "spatial_node"},
            {"id": 1, "parent_id": 2, "type": "spatial_node"},
            {"id": 2, "parent_id": 1, "type": "spatial_node"}]}"#;
        assert_eq!(load(&mut tree, looped).kind(), ErrorKind::InvalidArgument);

        assert_eq!(load(&mut tree, "{").kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn failed_loads_leave_nothing_behind() {
        let registry = TypeRegistry::new();
        let mut tree = SceneTree::new();
        let bad_child = r#"{"version": 1, "nodes": [
            {"id": 0, "type": "spatial_node"},
            {"id": 1, "parent_id": 0, "type": "spatial_node"},
            {"id": 2, "parent_id": 0, "type": "dragon"}]}"#;
        let err = load_scene_from_str(&mut tree, &registry, bad_child).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn nested_scene_files_load_in_place() {
        let dir = scratch_dir("nested");
        fs::create_dir_all(dir.join("props")).unwrap();
        fs::write(
            dir.join("props/crate.json"),
            r#"{"version": 1, "name": "crate", "nodes": [
                {"id": 0, "type": "spatial_node", "name": "crate"},
                {"id": 1, "parent_id": 0, "type": "spatial_node", "name": "lid", "translation": [0, 1, 0]}]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("main.json"),
            r#"{"version": 1, "name": "main", "nodes": [
                {"id": 0, "type": "spatial_node", "name": "main"},
                {"id": 1, "parent_id": 0, "type": "scene_file",
                 "scene_file_path": "props/crate.json", "translation": [5, 0, 0]}]}"#,
        )
        .unwrap();

        let registry = TypeRegistry::new();
        let mut tree = SceneTree::new();
        let root = load_scene_from_file(&mut tree, &registry, dir.join("main.json")).unwrap();
        tree.set_root(root).unwrap();
        tree.advance(root).unwrap();
        tree.advance(root).unwrap();

        let lid = tree.find(root, "lid").unwrap();
        assert_eq!(tree.global_translation(lid).unwrap(), Vec3::new(5.0, 1.0, 0.0));
        assert!(tree.is_attached(lid));
    }

    #[test]
    fn self_including_scene_files_are_rejected() {
        let dir = scratch_dir("recursive");
        fs::write(
            dir.join("loop.json"),
            r#"{"version": 1, "nodes": [
                {"id": 0, "type": "spatial_node"},
                {"id": 1, "parent_id": 0, "type": "scene_file", "scene_file_path": "loop.json"}]}"#,
        )
        .unwrap();

        let registry = TypeRegistry::new();
        let mut tree = SceneTree::new();
        let err = load_scene_from_file(&mut tree, &registry, dir.join("loop.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(tree.node_count(), 0);

        let missing = load_scene_from_file(&mut tree, &registry, dir.join("nope.json")).unwrap_err();
        assert!(matches!(missing, Error::Io(_)));
    }

    #[cfg(feature = "physics3d")]
    #[test]
    fn equal_shapes_are_shared_within_a_load() {
        let registry = TypeRegistry::new();
        let mut tree = SceneTree::new();
        let json = r#"{"version": 1, "nodes": [
            {"id": 0, "type": "spatial_node"},
            {"id": 1, "parent_id": 0, "type": "rigid_body", "name": "a",
             "shape": {"type": "box", "extents": [1, 1, 1]}},
            {"id": 2, "parent_id": 0, "type": "rigid_body", "name": "b", "mass": 0,
             "shape": {"type": "box", "extents": [1.0, 1.0, 1.0]}}]}"#;
        let root = load_scene_from_str(&mut tree, &registry, json).unwrap();
        tree.advance(root).unwrap();

        let a = tree.find(root, "a").unwrap();
        let b = tree.find(root, "b").unwrap();
        let (sa, sb) = (tree.shape(a).unwrap().unwrap(), tree.shape(b).unwrap().unwrap());
        assert!(std::sync::Arc::ptr_eq(&sa, &sb));
        assert!(!tree.has_resource::<ShapePool>());
    }
}

//! Scene node data
//!
//! A [`Node`] is one entry in the scene graph arena: a local transform, a
//! cached world matrix with version stamps, tree links expressed as arena
//! keys, and a [`NodeKind`] payload saying what the node is. Nodes are only
//! ever manipulated through [`SceneGraph`](crate::scene::SceneGraph), which
//! owns the arena.

use std::collections::HashSet;
use std::sync::Arc;

use crate::foundation::math::{Mat4, Transform};
use crate::geometry::Mesh;
use crate::render::camera::Camera;

slotmap::new_key_type! {
    /// Stable handle to a node in the scene graph arena
    ///
    /// Keys stay valid across unrelated insertions and removals; a key to a
    /// removed node is detected rather than aliasing a new node.
    pub struct NodeKey;
}

/// A visual instance of a shared mesh
///
/// The mesh itself is read-mostly and shared; per-instance state lives here.
#[derive(Debug, Clone)]
pub struct ModelInstance {
    /// Shared geometry drawn by this instance
    pub mesh: Arc<Mesh>,
    /// Instance color tint multiplied into vertex colors
    pub color: [f32; 4],
    /// Whether this instance participates in frustum culling
    pub frustum_culling: bool,
}

impl ModelInstance {
    /// Create an instance of a mesh with default tint and culling on
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self {
            mesh,
            color: [1.0, 1.0, 1.0, 1.0],
            frustum_culling: true,
        }
    }
}

/// What a scene node is
///
/// A closed set of node kinds instead of open inheritance: call sites match
/// on the variant they care about and ignore the rest.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A pure transform, useful for grouping
    Empty,
    /// A renderable mesh instance
    Model(ModelInstance),
    /// A camera; its world transform drives the view matrix
    Camera(Camera),
}

/// One node in the scene graph
///
/// World-matrix caching uses version counters: `local_version` bumps on any
/// local mutation, `world_version` bumps whenever the cached world matrix
/// changes, and the `cached_*` stamps record what the cache was computed
/// from. A node is stale when its local version, parent identity, or the
/// parent's world version no longer match the stamps.
#[derive(Debug, Clone)]
pub struct Node {
    /// Display name, used by searches and debug dumps
    pub name: String,
    /// Unordered string tags identifying the node
    pub tags: HashSet<String>,
    /// Whether this node (and with it, its subtree) is rendered
    pub visible: bool,
    /// Node payload
    pub kind: NodeKind,

    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,

    pub(crate) local: Transform,
    pub(crate) local_version: u64,

    pub(crate) world_matrix: Mat4,
    pub(crate) world_version: u64,
    pub(crate) cached_local_version: u64,
    pub(crate) cached_parent: Option<NodeKey>,
    pub(crate) cached_parent_version: u64,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            tags: HashSet::new(),
            visible: true,
            kind,
            parent: None,
            children: Vec::new(),
            local: Transform::identity(),
            local_version: 1,
            world_matrix: Mat4::identity(),
            world_version: 0,
            // local_version starts at 1 so a fresh node is always stale
            cached_local_version: 0,
            cached_parent: None,
            cached_parent_version: 0,
        }
    }

    /// The node's local transform (relative to its parent)
    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// The node's parent key, if any
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// The node's children, in insertion order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Whether this node is a renderable model
    pub fn is_model(&self) -> bool {
        matches!(self.kind, NodeKind::Model(_))
    }

    /// The model instance, if this node is one
    pub fn model(&self) -> Option<&ModelInstance> {
        match &self.kind {
            NodeKind::Model(model) => Some(model),
            _ => None,
        }
    }

    /// The camera, if this node is one
    pub fn camera(&self) -> Option<&Camera> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Mutable access to the camera, if this node is one
    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }
}

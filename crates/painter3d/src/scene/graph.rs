//! Scene graph: an arena of transform nodes
//!
//! The tree is stored as a `slotmap` arena addressed by [`NodeKey`]s;
//! parent links are plain keys (non-owning), child lists are ordered, and
//! all structural mutation goes through [`SceneGraph`] so invariants hold:
//! no cycles, no dangling keys, and world matrices that are never observed
//! stale.
//!
//! World matrices are cached per node with version counters. Local
//! mutation bumps the node's local version; reading a world value walks the
//! ancestor chain and recomputes exactly the stale prefix, so arbitrary
//! interleavings of mutation and reads stay consistent without callback
//! graphs or whole-subtree invalidation.

use slotmap::SlotMap;
use thiserror::Error;

use crate::foundation::math::{Mat4, Quat, Transform, Vec3, Vec4};
use crate::scene::node::{Node, NodeKey, NodeKind};

/// Errors raised by scene graph operations
#[derive(Debug, Error)]
pub enum SceneError {
    /// The key does not refer to a live node
    #[error("node {0:?} not found in scene graph")]
    NodeNotFound(NodeKey),

    /// Reparenting would make a node its own ancestor
    #[error("reparenting {child:?} under {parent:?} would create a cycle")]
    CyclicReparent {
        /// Node being reparented
        child: NodeKey,
        /// Prospective parent (a descendant of `child`, or `child` itself)
        parent: NodeKey,
    },

    /// Removing this node would leave the graph without any root
    #[error("cannot remove the last root node {0:?}")]
    LastRootRemoval(NodeKey),

    /// A parent world transform could not be inverted
    #[error("parent world transform is singular and cannot be inverted")]
    SingularParentTransform,

    /// The node exists but is not a camera
    #[error("node {0:?} is not a camera")]
    NotACamera(NodeKey),
}

/// The tree of transform nodes rooted at a single node
///
/// Created with one root node; further nodes are added under a parent or
/// detached (standalone roots, e.g. after [`SceneGraph::unparent`]).
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
}

impl SceneGraph {
    /// Create a scene graph containing a single empty root node
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new("root", NodeKind::Empty));
        Self {
            nodes,
            roots: vec![root],
        }
    }

    /// The primary root node
    pub fn root(&self) -> NodeKey {
        self.roots[0]
    }

    /// All root nodes: the primary root plus any unparented nodes
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Number of live nodes (including roots)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the key refers to a live node
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Create a node under a parent
    pub fn add_node(
        &mut self,
        parent: NodeKey,
        kind: NodeKind,
        name: impl Into<String>,
    ) -> Result<NodeKey, SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let key = self.nodes.insert(Node::new(name, kind));
        self.nodes[key].parent = Some(parent);
        self.nodes[parent].children.push(key);
        Ok(key)
    }

    /// Create a standalone node with no parent (an extra root)
    pub fn add_detached(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeKey {
        let key = self.nodes.insert(Node::new(name, kind));
        self.roots.push(key);
        key
    }

    /// Borrow a node
    pub fn node(&self, key: NodeKey) -> Result<&Node, SceneError> {
        self.nodes.get(key).ok_or(SceneError::NodeNotFound(key))
    }

    /// Mutably borrow a node
    ///
    /// Name, tags, visibility, and kind may be edited directly; transform
    /// state is private and only changes through the graph's setters so
    /// cache versions stay honest.
    pub fn node_mut(&mut self, key: NodeKey) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound(key))
    }

    /// Borrow the camera stored on a camera node
    pub fn camera(&self, key: NodeKey) -> Result<&crate::render::camera::Camera, SceneError> {
        self.node(key)?.camera().ok_or(SceneError::NotACamera(key))
    }

    // ------------------------------------------------------------------
    // Local transform accessors
    // ------------------------------------------------------------------

    /// The node's local position (relative to its parent)
    pub fn local_position(&self, key: NodeKey) -> Result<Vec3, SceneError> {
        Ok(self.node(key)?.local.position)
    }

    /// The node's local rotation
    pub fn local_rotation(&self, key: NodeKey) -> Result<Quat, SceneError> {
        Ok(self.node(key)?.local.rotation)
    }

    /// The node's local scale
    pub fn local_scale(&self, key: NodeKey) -> Result<Vec3, SceneError> {
        Ok(self.node(key)?.local.scale)
    }

    /// Set the node's local position
    pub fn set_local_position(&mut self, key: NodeKey, position: Vec3) -> Result<(), SceneError> {
        let node = self.node_mut(key)?;
        node.local.position = position;
        node.local_version += 1;
        Ok(())
    }

    /// Set the node's local rotation
    pub fn set_local_rotation(&mut self, key: NodeKey, rotation: Quat) -> Result<(), SceneError> {
        let node = self.node_mut(key)?;
        node.local.rotation = rotation;
        node.local_version += 1;
        Ok(())
    }

    /// Set the node's local scale
    pub fn set_local_scale(&mut self, key: NodeKey, scale: Vec3) -> Result<(), SceneError> {
        let node = self.node_mut(key)?;
        node.local.scale = scale;
        node.local_version += 1;
        Ok(())
    }

    /// Replace the node's whole local transform
    pub fn set_local_transform(
        &mut self,
        key: NodeKey,
        transform: Transform,
    ) -> Result<(), SceneError> {
        let node = self.node_mut(key)?;
        node.local = transform;
        node.local_version += 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // World transform accessors
    // ------------------------------------------------------------------

    /// The node's world matrix, recomputed if stale
    ///
    /// Never returns a matrix inconsistent with the current tree shape and
    /// local transforms, no matter what sequence of mutations preceded the
    /// call.
    pub fn world_transform(&mut self, key: NodeKey) -> Result<Mat4, SceneError> {
        self.refresh_world(key)?;
        Ok(self.nodes[key].world_matrix)
    }

    /// The node's world-space position
    pub fn world_position(&mut self, key: NodeKey) -> Result<Vec3, SceneError> {
        let m = self.world_transform(key)?;
        Ok(Vec3::new(m.m14, m.m24, m.m34))
    }

    /// The node's world-space rotation
    pub fn world_rotation(&mut self, key: NodeKey) -> Result<Quat, SceneError> {
        let m = self.world_transform(key)?;
        Ok(Transform::from_matrix(&m).rotation)
    }

    /// The node's world-space scale
    pub fn world_scale(&mut self, key: NodeKey) -> Result<Vec3, SceneError> {
        let m = self.world_transform(key)?;
        Ok(Transform::from_matrix(&m).scale)
    }

    /// Set the node's world-space position by adjusting its local position
    pub fn set_world_position(&mut self, key: NodeKey, position: Vec3) -> Result<(), SceneError> {
        let parent = self.node(key)?.parent;
        let local_position = match parent {
            Some(p) => {
                let inv = self
                    .world_transform(p)?
                    .try_inverse()
                    .ok_or(SceneError::SingularParentTransform)?;
                let v = inv * Vec4::new(position.x, position.y, position.z, 1.0);
                Vec3::new(v.x, v.y, v.z)
            }
            None => position,
        };
        self.set_local_position(key, local_position)
    }

    /// Set the node's world-space rotation by adjusting its local rotation
    pub fn set_world_rotation(&mut self, key: NodeKey, rotation: Quat) -> Result<(), SceneError> {
        let parent = self.node(key)?.parent;
        let local_rotation = match parent {
            Some(p) => {
                let parent_world = self.world_transform(p)?;
                let parent_rotation = Transform::from_matrix(&parent_world).rotation;
                parent_rotation.inverse() * rotation
            }
            None => rotation,
        };
        self.set_local_rotation(key, local_rotation)
    }

    /// Set the node's world-space scale by adjusting its local scale
    pub fn set_world_scale(&mut self, key: NodeKey, scale: Vec3) -> Result<(), SceneError> {
        let parent = self.node(key)?.parent;
        let local_scale = match parent {
            Some(p) => {
                let parent_world = self.world_transform(p)?;
                let parent_scale = Transform::from_matrix(&parent_world).scale;
                scale.component_div(&parent_scale)
            }
            None => scale,
        };
        self.set_local_scale(key, local_scale)
    }

    /// Refresh the cached world matrices along the ancestor chain of `key`
    ///
    /// Walks up to the root collecting the chain, then refreshes top-down
    /// so every node compares against a current parent. Fresh nodes keep
    /// their `world_version`, so a fully fresh chain does no matrix work.
    fn refresh_world(&mut self, key: NodeKey) -> Result<(), SceneError> {
        let mut chain = Vec::new();
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let node = self.nodes.get(k).ok_or(SceneError::NodeNotFound(k))?;
            chain.push(k);
            cursor = node.parent;
        }

        let mut parent_matrix = Mat4::identity();
        let mut parent_version = 0;
        for k in chain.into_iter().rev() {
            let node = &mut self.nodes[k];
            let stale = node.cached_local_version != node.local_version
                || node.cached_parent != node.parent
                || node.cached_parent_version != parent_version;

            if stale {
                node.world_matrix = parent_matrix * node.local.to_matrix();
                node.world_version = node.world_version.wrapping_add(1);
                node.cached_local_version = node.local_version;
                node.cached_parent = node.parent;
                node.cached_parent_version = parent_version;
            }

            parent_matrix = node.world_matrix;
            parent_version = node.world_version;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Move `child` (and its subtree) under `new_parent`, keeping the
    /// child's LOCAL transform
    ///
    /// The child's world pose generally changes: its local transform is now
    /// composed with a different parent. Use
    /// [`SceneGraph::reparent_keep_world`] for visual continuity.
    pub fn reparent(&mut self, child: NodeKey, new_parent: NodeKey) -> Result<(), SceneError> {
        self.check_cycle(child, new_parent)?;
        self.detach(child);
        self.attach(child, new_parent);
        Ok(())
    }

    /// Move `child` under `new_parent`, keeping the child's WORLD pose
    ///
    /// Recomputes the local transform against the new parent so world
    /// position, rotation, and scale are unchanged (within floating-point
    /// tolerance) immediately after the call.
    pub fn reparent_keep_world(
        &mut self,
        child: NodeKey,
        new_parent: NodeKey,
    ) -> Result<(), SceneError> {
        self.check_cycle(child, new_parent)?;

        let child_world = self.world_transform(child)?;
        let parent_world = self.world_transform(new_parent)?;
        let inv_parent = parent_world
            .try_inverse()
            .ok_or(SceneError::SingularParentTransform)?;
        let local = Transform::from_matrix(&(inv_parent * child_world));

        self.detach(child);
        self.attach(child, new_parent);

        let node = &mut self.nodes[child];
        node.local = local;
        node.local_version += 1;
        Ok(())
    }

    /// Detach `child` from its parent, making it (and its subtree) a root
    ///
    /// The local transform is untouched, so the world pose generally
    /// changes. Use [`SceneGraph::unparent_keep_world`] to keep it.
    pub fn unparent(&mut self, child: NodeKey) -> Result<(), SceneError> {
        if !self.nodes.contains_key(child) {
            return Err(SceneError::NodeNotFound(child));
        }
        self.detach(child);
        self.roots.push(child);
        Ok(())
    }

    /// Detach `child` from its parent, keeping its world pose
    pub fn unparent_keep_world(&mut self, child: NodeKey) -> Result<(), SceneError> {
        let world = self.world_transform(child)?;
        let local = Transform::from_matrix(&world);
        self.detach(child);
        self.roots.push(child);

        let node = &mut self.nodes[child];
        node.local = local;
        node.local_version += 1;
        Ok(())
    }

    /// Remove a node and its whole subtree from the graph
    ///
    /// Removing the last remaining root is rejected; the graph always keeps
    /// at least one root node.
    pub fn remove(&mut self, key: NodeKey) -> Result<(), SceneError> {
        if !self.nodes.contains_key(key) {
            return Err(SceneError::NodeNotFound(key));
        }
        if self.roots.len() == 1 && self.roots[0] == key {
            return Err(SceneError::LastRootRemoval(key));
        }
        self.detach(key);

        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.remove(k) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Deep-copy a subtree
    ///
    /// Produces fresh nodes with identical names, tags, kinds, and local
    /// transforms; shared leaf resources (meshes, materials) are shared by
    /// `Arc`, not duplicated. The clone is attached to the original's
    /// parent (appended after its siblings), or becomes a root if the
    /// original was one.
    pub fn clone_subtree(&mut self, key: NodeKey) -> Result<NodeKey, SceneError> {
        let parent = self.node(key)?.parent;
        let clone = self.clone_recursive(key);
        match parent {
            Some(p) => {
                self.nodes[clone].parent = Some(p);
                self.nodes[p].children.push(clone);
            }
            None => self.roots.push(clone),
        }
        Ok(clone)
    }

    fn clone_recursive(&mut self, key: NodeKey) -> NodeKey {
        let mut copy = self.nodes[key].clone();
        copy.parent = None;
        copy.children = Vec::new();
        // Invalidate the copied cache stamps so the clone recomputes
        copy.cached_local_version = 0;
        copy.cached_parent = None;
        copy.cached_parent_version = 0;
        copy.world_version = 0;
        let new_key = self.nodes.insert(copy);

        let children = self.nodes[key].children.clone();
        for child in children {
            let child_clone = self.clone_recursive(child);
            self.nodes[child_clone].parent = Some(new_key);
            self.nodes[new_key].children.push(child_clone);
        }
        new_key
    }

    fn detach(&mut self, child: NodeKey) {
        match self.nodes[child].parent.take() {
            Some(parent) => {
                self.nodes[parent].children.retain(|&c| c != child);
            }
            None => {
                self.roots.retain(|&r| r != child);
            }
        }
    }

    fn attach(&mut self, child: NodeKey, parent: NodeKey) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn check_cycle(&self, child: NodeKey, new_parent: NodeKey) -> Result<(), SceneError> {
        if !self.nodes.contains_key(child) {
            return Err(SceneError::NodeNotFound(child));
        }
        let mut cursor = Some(new_parent);
        while let Some(k) = cursor {
            let node = self.nodes.get(k).ok_or(SceneError::NodeNotFound(k))?;
            if k == child {
                return Err(SceneError::CyclicReparent {
                    child,
                    parent: new_parent,
                });
            }
            cursor = node.parent;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Traversal and queries
    // ------------------------------------------------------------------

    /// All descendants of a node in depth-first pre-order
    ///
    /// The order is deterministic: children are visited in insertion order,
    /// each immediately followed by its own subtree. The node itself is not
    /// included.
    pub fn descendants(&self, key: NodeKey) -> Result<Vec<NodeKey>, SceneError> {
        let node = self.node(key)?;
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = node.children.iter().rev().copied().collect();
        while let Some(k) = stack.pop() {
            out.push(k);
            stack.extend(self.nodes[k].children.iter().rev());
        }
        Ok(out)
    }

    /// Find the first node named `name` in a subtree (pre-order, root
    /// included)
    pub fn find_by_name(&self, start: NodeKey, name: &str) -> Option<NodeKey> {
        self.find_first(start, |node| node.name == name)
    }

    /// Find all nodes named `name` in a subtree, in pre-order
    pub fn find_all_by_name(&self, start: NodeKey, name: &str) -> Vec<NodeKey> {
        self.find_all(start, |node| node.name == name)
    }

    /// Find all nodes carrying `tag` in a subtree, in pre-order
    pub fn find_with_tag(&self, start: NodeKey, tag: &str) -> Vec<NodeKey> {
        self.find_all(start, |node| node.tags.contains(tag))
    }

    fn find_first(&self, start: NodeKey, predicate: impl Fn(&Node) -> bool) -> Option<NodeKey> {
        let mut stack = vec![start];
        while let Some(k) = stack.pop() {
            let node = self.nodes.get(k)?;
            if predicate(node) {
                return Some(k);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    fn find_all(&self, start: NodeKey, predicate: impl Fn(&Node) -> bool) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.get(k) {
                if predicate(node) {
                    out.push(k);
                }
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Render the subtree hierarchy as an indented string, for debugging
    pub fn tree_to_string(&self, key: NodeKey) -> Result<String, SceneError> {
        fn print_node(graph: &SceneGraph, key: NodeKey, level: usize, out: &mut String) {
            let node = &graph.nodes[key];
            if level == 0 {
                out.push_str("+: ");
            } else {
                for _ in 0..level {
                    out.push_str("    ");
                }
                out.push_str("\\-: ");
            }
            out.push_str(&node.name);
            out.push('\n');
            for &child in &node.children {
                print_node(graph, child, level + 1, out);
            }
        }

        self.node(key)?;
        let mut out = String::new();
        print_node(self, key, 0, &mut out);
        Ok(out)
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Material, Mesh};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn graph_with_child_chain() -> (SceneGraph, NodeKey, NodeKey, NodeKey) {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(graph.root(), NodeKind::Empty, "a").unwrap();
        let b = graph.add_node(a, NodeKind::Empty, "b").unwrap();
        let c = graph.add_node(b, NodeKind::Empty, "c").unwrap();
        (graph, a, b, c)
    }

    #[test]
    fn test_world_equals_parent_world_times_local() {
        let (mut graph, a, b, c) = graph_with_child_chain();

        graph.set_local_position(a, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        graph
            .set_local_rotation(b, Quat::from_axis_angle(&Vec3::y_axis(), 0.5))
            .unwrap();
        graph.set_local_scale(b, Vec3::new(2.0, 2.0, 2.0)).unwrap();
        graph.set_local_position(c, Vec3::new(0.0, 3.0, 0.0)).unwrap();

        for key in [a, b, c] {
            let world = graph.world_transform(key).unwrap();
            let parent_world = match graph.node(key).unwrap().parent() {
                Some(p) => graph.world_transform(p).unwrap(),
                None => Mat4::identity(),
            };
            let local = graph.node(key).unwrap().local_transform().to_matrix();
            assert_relative_eq!(world, parent_world * local, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_world_is_never_stale_after_ancestor_mutation() {
        let (mut graph, a, _b, c) = graph_with_child_chain();

        let before = graph.world_position(c).unwrap();
        assert_relative_eq!(before, Vec3::zeros());

        // Mutating an ancestor must be visible through the child immediately
        graph.set_local_position(a, Vec3::new(0.0, 0.0, -7.0)).unwrap();
        let after = graph.world_position(c).unwrap();
        assert_relative_eq!(after, Vec3::new(0.0, 0.0, -7.0));
    }

    #[test]
    fn test_refresh_keeps_versions_when_fresh() {
        let (mut graph, _a, _b, c) = graph_with_child_chain();

        graph.world_transform(c).unwrap();
        let version_first = graph.node(c).unwrap().world_version;
        graph.world_transform(c).unwrap();
        let version_second = graph.node(c).unwrap().world_version;

        assert_eq!(version_first, version_second);
    }

    #[test]
    fn test_reparent_keeps_local_transform() {
        let mut graph = SceneGraph::new();
        let parent_a = graph.add_node(graph.root(), NodeKind::Empty, "a").unwrap();
        let parent_b = graph.add_node(graph.root(), NodeKind::Empty, "b").unwrap();
        let child = graph.add_node(parent_a, NodeKind::Empty, "child").unwrap();

        graph.set_local_position(parent_b, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        graph.set_local_position(child, Vec3::new(1.0, 2.0, 3.0)).unwrap();

        graph.reparent(child, parent_b).unwrap();

        // Local unchanged, world moved with the new parent
        assert_relative_eq!(graph.local_position(child).unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(
            graph.world_position(child).unwrap(),
            Vec3::new(11.0, 2.0, 3.0)
        );
    }

    #[test]
    fn test_reparent_keep_world_preserves_world_pose() {
        let mut graph = SceneGraph::new();
        let new_parent = graph.add_node(graph.root(), NodeKind::Empty, "parent").unwrap();
        let child = graph.add_node(graph.root(), NodeKind::Empty, "child").unwrap();

        graph.set_local_position(new_parent, Vec3::new(5.0, 0.0, 0.0)).unwrap();
        graph.set_local_position(child, Vec3::new(10.0, 2.0, 0.0)).unwrap();

        graph.reparent_keep_world(child, new_parent).unwrap();

        assert_relative_eq!(
            graph.local_position(child).unwrap(),
            Vec3::new(5.0, 2.0, 0.0),
            epsilon = 1e-5
        );
        assert_relative_eq!(
            graph.world_position(child).unwrap(),
            Vec3::new(10.0, 2.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_reparent_keep_world_under_rotated_scaled_parent() {
        let mut graph = SceneGraph::new();
        let new_parent = graph.add_node(graph.root(), NodeKind::Empty, "parent").unwrap();
        let child = graph.add_node(graph.root(), NodeKind::Empty, "child").unwrap();

        graph.set_local_position(new_parent, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        graph
            .set_local_rotation(new_parent, Quat::from_axis_angle(&Vec3::y_axis(), 1.1))
            .unwrap();
        graph.set_local_scale(new_parent, Vec3::new(2.0, 2.0, 2.0)).unwrap();

        graph.set_local_position(child, Vec3::new(-4.0, 0.5, 6.0)).unwrap();
        graph
            .set_local_rotation(child, Quat::from_axis_angle(&Vec3::x_axis(), 0.3))
            .unwrap();

        let world_before = graph.world_transform(child).unwrap();
        graph.reparent_keep_world(child, new_parent).unwrap();
        let world_after = graph.world_transform(child).unwrap();

        assert_relative_eq!(world_before, world_after, epsilon = 1e-4);
    }

    #[test]
    fn test_unparent_keeps_local_and_changes_world() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_node(graph.root(), NodeKind::Empty, "parent").unwrap();
        let child = graph.add_node(parent, NodeKind::Empty, "child").unwrap();

        graph.set_local_position(parent, Vec3::new(4.0, 0.0, 0.0)).unwrap();
        graph.set_local_position(child, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        graph.unparent(child).unwrap();

        assert!(graph.node(child).unwrap().parent().is_none());
        assert!(graph.roots().contains(&child));
        assert_relative_eq!(graph.local_position(child).unwrap(), Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(graph.world_position(child).unwrap(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_unparent_keep_world() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_node(graph.root(), NodeKind::Empty, "parent").unwrap();
        let child = graph.add_node(parent, NodeKind::Empty, "child").unwrap();

        graph.set_local_position(parent, Vec3::new(4.0, 0.0, 0.0)).unwrap();
        graph.set_local_position(child, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        graph.unparent_keep_world(child).unwrap();

        assert_relative_eq!(
            graph.world_position(child).unwrap(),
            Vec3::new(5.0, 0.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_cyclic_reparent_is_rejected_and_tree_untouched() {
        let (mut graph, a, _b, c) = graph_with_child_chain();

        let result = graph.reparent(a, c);
        assert!(matches!(result, Err(SceneError::CyclicReparent { .. })));

        // Self-parenting is a cycle too
        assert!(matches!(
            graph.reparent(a, a),
            Err(SceneError::CyclicReparent { .. })
        ));

        // Structure unchanged
        assert_eq!(graph.node(a).unwrap().parent(), Some(graph.root()));
        assert_eq!(graph.descendants(a).unwrap().len(), 2);
    }

    #[test]
    fn test_remove_drops_subtree() {
        let (mut graph, a, b, c) = graph_with_child_chain();

        graph.remove(b).unwrap();

        assert!(graph.contains(a));
        assert!(!graph.contains(b));
        assert!(!graph.contains(c));
        assert!(graph.node(a).unwrap().children().is_empty());
    }

    #[test]
    fn test_remove_last_root_is_rejected() {
        let mut graph = SceneGraph::new();
        let child = graph.add_node(graph.root(), NodeKind::Empty, "child").unwrap();

        let result = graph.remove(graph.root());
        assert!(matches!(result, Err(SceneError::LastRootRemoval(_))));

        // Graph untouched; the root stays addressable
        assert!(graph.contains(graph.root()));
        assert!(graph.contains(child));
        assert_eq!(graph.node(graph.root()).unwrap().name, "root");
    }

    #[test]
    fn test_remove_secondary_root_is_allowed() {
        let mut graph = SceneGraph::new();
        let extra = graph.add_detached(NodeKind::Empty, "extra");

        graph.remove(extra).unwrap();

        assert!(!graph.contains(extra));
        assert_eq!(graph.roots().len(), 1);
        assert!(graph.contains(graph.root()));
    }

    #[test]
    fn test_set_world_position_under_transformed_parent() {
        let mut graph = SceneGraph::new();
        let parent = graph.add_node(graph.root(), NodeKind::Empty, "parent").unwrap();
        let child = graph.add_node(parent, NodeKind::Empty, "child").unwrap();

        graph.set_local_position(parent, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        graph
            .set_local_rotation(parent, Quat::from_axis_angle(&Vec3::z_axis(), 0.8))
            .unwrap();
        graph.set_local_scale(parent, Vec3::new(0.5, 0.5, 0.5)).unwrap();

        let target = Vec3::new(-2.0, 7.0, 1.0);
        graph.set_world_position(child, target).unwrap();

        assert_relative_eq!(graph.world_position(child).unwrap(), target, epsilon = 1e-4);
    }

    #[test]
    fn test_clone_subtree_is_isomorphic_and_shares_meshes() {
        let mut graph = SceneGraph::new();
        let mesh = Arc::new(Mesh::cube(Arc::new(Material::default())));

        let parent = graph.add_node(graph.root(), NodeKind::Empty, "parent").unwrap();
        let model = graph
            .add_node(
                parent,
                NodeKind::Model(crate::scene::ModelInstance::new(Arc::clone(&mesh))),
                "model",
            )
            .unwrap();
        let _leaf = graph.add_node(model, NodeKind::Empty, "leaf").unwrap();

        graph.set_local_position(model, Vec3::new(1.0, 2.0, 3.0)).unwrap();

        let clone = graph.clone_subtree(parent).unwrap();

        // Same shape: one child, one grandchild
        let original_children = graph.node(parent).unwrap().children().to_vec();
        let clone_children = graph.node(clone).unwrap().children().to_vec();
        assert_eq!(original_children.len(), clone_children.len());

        let model_clone = clone_children[0];
        assert_eq!(graph.node(model_clone).unwrap().name, "model");
        assert_eq!(graph.node(model_clone).unwrap().children().len(), 1);

        // Identical local transforms
        assert_relative_eq!(
            graph.local_position(model_clone).unwrap(),
            Vec3::new(1.0, 2.0, 3.0)
        );

        // Mesh shared, not duplicated
        let original_mesh = Arc::clone(&graph.node(model).unwrap().model().unwrap().mesh);
        let cloned_mesh = Arc::clone(&graph.node(model_clone).unwrap().model().unwrap().mesh);
        assert!(Arc::ptr_eq(&original_mesh, &cloned_mesh));

        // Clone hangs off the same parent as the original
        assert_eq!(graph.node(clone).unwrap().parent(), Some(graph.root()));
    }

    #[test]
    fn test_find_order_is_deterministic_pre_order() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(graph.root(), NodeKind::Empty, "group").unwrap();
        let b = graph.add_node(graph.root(), NodeKind::Empty, "group").unwrap();
        let a_child = graph.add_node(a, NodeKind::Empty, "group").unwrap();

        // Pre-order: a, then a's subtree, then b
        let found = graph.find_all_by_name(graph.root(), "group");
        assert_eq!(found, vec![a, a_child, b]);

        assert_eq!(graph.find_by_name(graph.root(), "group"), Some(a));
    }

    #[test]
    fn test_find_with_tag() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node(graph.root(), NodeKind::Empty, "a").unwrap();
        let b = graph.add_node(graph.root(), NodeKind::Empty, "b").unwrap();

        graph.node_mut(a).unwrap().tags.insert("enemy".to_string());
        graph.node_mut(b).unwrap().tags.insert("pickup".to_string());

        assert_eq!(graph.find_with_tag(graph.root(), "enemy"), vec![a]);
        assert!(graph.find_with_tag(graph.root(), "boss").is_empty());
    }

    #[test]
    fn test_tree_to_string_layout() {
        let (graph, _a, _b, _c) = graph_with_child_chain();
        let dump = graph.tree_to_string(graph.root()).unwrap();

        assert!(dump.starts_with("+: root\n"));
        assert!(dump.contains("\\-: a\n"));
        assert!(dump.contains("\\-: c\n"));
    }

    #[test]
    fn test_stale_key_is_reported() {
        let (mut graph, _a, b, _c) = graph_with_child_chain();
        graph.remove(b).unwrap();

        assert!(matches!(
            graph.world_transform(b),
            Err(SceneError::NodeNotFound(_))
        ));
    }
}

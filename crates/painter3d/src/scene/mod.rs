//! Scene graph and transform hierarchy
//!
//! Nodes live in an arena addressed by stable [`NodeKey`] handles; parent
//! and child relationships are keys, not pointers, so ownership stays flat
//! and cycles are impossible to represent by accident (and rejected when
//! requested).

pub mod graph;
pub mod node;

pub use graph::{SceneError, SceneGraph};
pub use node::{ModelInstance, Node, NodeKey, NodeKind};

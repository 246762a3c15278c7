//! Geometry data: meshes, materials, and bounding volumes
//!
//! Everything here is plain data consumed by the scene graph and the render
//! pipeline. Meshes are shared (read-mostly) across scene instances via
//! `Arc`; mutation requires an explicit clone.

pub mod bounds;
pub mod material;
pub mod mesh;

pub use bounds::{Aabb, BoundingSphere, Frustum, Plane};
pub use material::{BlendMode, Material, TextureRef};
pub use mesh::{GeometryError, Mesh, MeshPart};

//! Mesh geometry storage
//!
//! A [`Mesh`] is the read-mostly vertex and index data shared by every model
//! instance that draws it; instances never mutate shared geometry. Triangle
//! indices are partitioned into material-homogeneous [`MeshPart`] ranges so
//! the emitter can hand the rasterizer one material run at a time.

use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;

use crate::foundation::math::{Vec2, Vec3};
use crate::geometry::bounds::{Aabb, BoundingSphere};
use crate::geometry::material::Material;

/// Errors raised while constructing or validating mesh geometry
#[derive(Debug, Error)]
pub enum GeometryError {
    /// A triangle index points past the vertex arrays
    #[error("triangle index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// The offending index value
        index: u32,
        /// Number of vertices in the mesh
        vertex_count: usize,
    },

    /// A vertex attribute array disagrees with the position count
    #[error("attribute '{attribute}' has {actual} entries, expected {expected}")]
    AttributeLengthMismatch {
        /// Attribute name (normals, uvs, colors)
        attribute: &'static str,
        /// Expected entry count (position count)
        expected: usize,
        /// Actual entry count
        actual: usize,
    },

    /// A mesh part's triangle range exceeds the index list
    #[error("mesh part range {start}..{end} out of range for {triangle_count} triangles")]
    PartOutOfRange {
        /// Range start (triangle index)
        start: usize,
        /// Range end (triangle index, exclusive)
        end: usize,
        /// Number of triangles in the mesh
        triangle_count: usize,
    },
}

/// A contiguous run of triangles drawn with one material
#[derive(Debug, Clone)]
pub struct MeshPart {
    /// Range into the mesh triangle list
    pub triangles: Range<usize>,
    /// Material shared by every triangle in the range
    pub material: Arc<Material>,
}

/// Immutable-per-frame vertex buffers and triangle list
///
/// Vertex attributes are parallel arrays indexed by the triangle list.
/// Meshes are shared across model instances via `Arc`; cloning a scene
/// subtree shares the mesh rather than duplicating it.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,
    /// Vertex normals, parallel to `positions`
    pub normals: Vec<Vec3>,
    /// Vertex texture coordinates, parallel to `positions`
    pub uvs: Vec<Vec2>,
    /// Vertex colors (RGBA, 0..1), parallel to `positions`
    pub colors: Vec<[f32; 4]>,
    /// Triangle list; each entry indexes `positions` three times
    pub indices: Vec<[u32; 3]>,
    /// Material-homogeneous partitions of the triangle list
    pub parts: Vec<MeshPart>,
    /// Local-space bounds enclosing all vertices
    bounds: Aabb,
}

impl Mesh {
    /// Build a mesh from vertex arrays, a triangle list, and parts
    ///
    /// Validates attribute lengths, index ranges, and part ranges before
    /// the mesh can be used; an invalid mesh is never constructed.
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        colors: Vec<[f32; 4]>,
        indices: Vec<[u32; 3]>,
        parts: Vec<MeshPart>,
    ) -> Result<Self, GeometryError> {
        let vertex_count = positions.len();

        if normals.len() != vertex_count {
            return Err(GeometryError::AttributeLengthMismatch {
                attribute: "normals",
                expected: vertex_count,
                actual: normals.len(),
            });
        }
        if uvs.len() != vertex_count {
            return Err(GeometryError::AttributeLengthMismatch {
                attribute: "uvs",
                expected: vertex_count,
                actual: uvs.len(),
            });
        }
        if colors.len() != vertex_count {
            return Err(GeometryError::AttributeLengthMismatch {
                attribute: "colors",
                expected: vertex_count,
                actual: colors.len(),
            });
        }

        for triangle in &indices {
            for &index in triangle {
                if index as usize >= vertex_count {
                    return Err(GeometryError::IndexOutOfRange {
                        index,
                        vertex_count,
                    });
                }
            }
        }

        for part in &parts {
            if part.triangles.end > indices.len() || part.triangles.start > part.triangles.end {
                return Err(GeometryError::PartOutOfRange {
                    start: part.triangles.start,
                    end: part.triangles.end,
                    triangle_count: indices.len(),
                });
            }
        }

        let bounds = Aabb::from_points(positions.iter());

        Ok(Self {
            positions,
            normals,
            uvs,
            colors,
            indices,
            parts,
            bounds,
        })
    }

    /// Build a single-part mesh covering the whole triangle list
    pub fn with_single_part(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        colors: Vec<[f32; 4]>,
        indices: Vec<[u32; 3]>,
        material: Arc<Material>,
    ) -> Result<Self, GeometryError> {
        let part = MeshPart {
            triangles: 0..indices.len(),
            material,
        };
        Self::new(positions, normals, uvs, colors, indices, vec![part])
    }

    /// Total triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Vertex count
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Local-space bounding box
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Local-space bounding sphere
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::from_aabb(&self.bounds)
    }

    /// Local-space center of a triangle
    pub fn triangle_center(&self, triangle: usize) -> Vec3 {
        let [a, b, c] = self.indices[triangle];
        (self.positions[a as usize] + self.positions[b as usize] + self.positions[c as usize])
            / 3.0
    }

    /// A single triangle in the XY plane, facing +Z
    pub fn triangle(material: Arc<Material>) -> Self {
        let positions = vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.0, 0.5, 0.0),
        ];
        let normals = vec![Vec3::z(); 3];
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.5, 1.0),
        ];
        let colors = vec![[1.0, 1.0, 1.0, 1.0]; 3];
        let indices = vec![[0, 1, 2]];

        Self::with_single_part(positions, normals, uvs, colors, indices, material)
            .unwrap_or_else(|_| unreachable!("builtin triangle is valid"))
    }

    /// A unit quad in the XY plane, facing +Z
    pub fn plane(material: Arc<Material>) -> Self {
        let positions = vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
        ];
        let normals = vec![Vec3::z(); 4];
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let colors = vec![[1.0, 1.0, 1.0, 1.0]; 4];
        let indices = vec![[0, 1, 2], [0, 2, 3]];

        Self::with_single_part(positions, normals, uvs, colors, indices, material)
            .unwrap_or_else(|_| unreachable!("builtin plane is valid"))
    }

    /// A unit cube centered on the origin
    pub fn cube(material: Arc<Material>) -> Self {
        let face_data: [(Vec3, Vec3, Vec3); 6] = [
            // (normal, tangent u, tangent v) per face
            (Vec3::z(), Vec3::x(), Vec3::y()),
            (-Vec3::z(), -Vec3::x(), Vec3::y()),
            (Vec3::x(), -Vec3::z(), Vec3::y()),
            (-Vec3::x(), Vec3::z(), Vec3::y()),
            (Vec3::y(), Vec3::x(), -Vec3::z()),
            (-Vec3::y(), Vec3::x(), Vec3::z()),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut uvs = Vec::with_capacity(24);
        let mut colors = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(12);

        for (normal, u, v) in face_data {
            let base = positions.len() as u32;
            let center = normal * 0.5;
            positions.push(center - u * 0.5 - v * 0.5);
            positions.push(center + u * 0.5 - v * 0.5);
            positions.push(center + u * 0.5 + v * 0.5);
            positions.push(center - u * 0.5 + v * 0.5);
            normals.extend([normal; 4]);
            uvs.extend([
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ]);
            colors.extend([[1.0, 1.0, 1.0, 1.0]; 4]);
            indices.push([base, base + 1, base + 2]);
            indices.push([base, base + 2, base + 3]);
        }

        Self::with_single_part(positions, normals, uvs, colors, indices, material)
            .unwrap_or_else(|_| unreachable!("builtin cube is valid"))
    }
}

//! Static mesh merging
//!
//! Many small static models cost one gather pass each per frame. Merging
//! them bakes their world transforms into a single combined mesh, so the
//! whole group becomes one model with one bounding volume and at most a
//! handful of material runs.
//!
//! Merging is for genuinely static geometry. The baked transforms cannot
//! be edited afterwards; moving a merged piece means rebuilding the merge.

use std::sync::Arc;

use thiserror::Error;

use crate::foundation::math::{Mat3, Mat4, Vec4};
use crate::geometry::{GeometryError, Mesh, MeshPart};
use crate::scene::{NodeKey, SceneError, SceneGraph};

/// The most vertices a merged mesh may hold, the 16-bit index limit
pub const MAX_MERGED_VERTICES: usize = u16::MAX as usize;

/// Errors raised while merging meshes
#[derive(Debug, Error)]
pub enum BatchError {
    /// The combined vertex count exceeds the merged-mesh limit
    #[error("merged mesh would hold {total} vertices, limit is {limit}")]
    TooManyVertices {
        /// Combined vertex count of all inputs
        total: usize,
        /// The fixed vertex limit
        limit: usize,
    },

    /// A scene node named for merging is not a model
    #[error("node {0:?} is not a model")]
    NotAModel(NodeKey),

    /// A scene graph lookup failed
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The merged geometry failed validation
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Merge meshes into one, baking each input's transform into its vertices
///
/// Positions transform by the full matrix; normals by the inverse-transpose
/// so non-uniform scale does not shear them. Parts sharing a material (by
/// `Arc` identity) with the previous part coalesce into one run. The vertex
/// limit is checked before any work happens.
pub fn merge_meshes(items: &[(Arc<Mesh>, Mat4)]) -> Result<Mesh, BatchError> {
    let total: usize = items.iter().map(|(mesh, _)| mesh.vertex_count()).sum();
    if total > MAX_MERGED_VERTICES {
        return Err(BatchError::TooManyVertices {
            total,
            limit: MAX_MERGED_VERTICES,
        });
    }

    let triangle_total: usize = items.iter().map(|(mesh, _)| mesh.triangle_count()).sum();

    let mut positions = Vec::with_capacity(total);
    let mut normals = Vec::with_capacity(total);
    let mut uvs = Vec::with_capacity(total);
    let mut colors = Vec::with_capacity(total);
    let mut indices = Vec::with_capacity(triangle_total);
    let mut parts: Vec<MeshPart> = Vec::new();

    for (mesh, matrix) in items {
        let base_vertex = positions.len() as u32;
        let base_triangle = indices.len();

        let linear: Mat3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map_or(linear, |inverse| inverse.transpose());

        for p in &mesh.positions {
            let v = matrix * Vec4::new(p.x, p.y, p.z, 1.0);
            positions.push(v.xyz());
        }
        for n in &mesh.normals {
            let transformed = normal_matrix * n;
            let length = transformed.magnitude();
            normals.push(if length > f32::EPSILON {
                transformed / length
            } else {
                *n
            });
        }
        uvs.extend_from_slice(&mesh.uvs);
        colors.extend_from_slice(&mesh.colors);
        for [a, b, c] in &mesh.indices {
            indices.push([a + base_vertex, b + base_vertex, c + base_vertex]);
        }

        for part in &mesh.parts {
            let start = base_triangle + part.triangles.start;
            let end = base_triangle + part.triangles.end;
            match parts.last_mut() {
                Some(last)
                    if Arc::ptr_eq(&last.material, &part.material)
                        && last.triangles.end == start =>
                {
                    last.triangles.end = end;
                }
                _ => parts.push(MeshPart {
                    triangles: start..end,
                    material: Arc::clone(&part.material),
                }),
            }
        }
    }

    Ok(Mesh::new(positions, normals, uvs, colors, indices, parts)?)
}

/// Merge the meshes of model nodes, using their current world transforms
///
/// Reads each node's world transform at call time; later edits to the
/// source nodes do not affect the merged result.
pub fn merge_scene_models(
    scene: &mut SceneGraph,
    keys: &[NodeKey],
) -> Result<Mesh, BatchError> {
    let mut items = Vec::with_capacity(keys.len());
    for &key in keys {
        let world = scene.world_transform(key)?;
        let model = scene
            .node(key)?
            .model()
            .ok_or(BatchError::NotAModel(key))?;
        items.push((Arc::clone(&model.mesh), world));
    }
    merge_meshes(&items)
}

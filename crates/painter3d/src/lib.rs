//! # painter3d
//!
//! A software 3D scene and sorting pipeline that renders through any 2D
//! triangle rasterizer.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-backed transform hierarchy with cached world
//!   matrices and stable node handles
//! - **Cameras**: Perspective and orthographic projection, frustum culling,
//!   screen/world conversions, and picking rays
//! - **Depth Sorting**: O(n) bucket sort with fixed capacity and zero
//!   steady-state allocation
//! - **Frame Pipeline**: Cull, gather, sort, emit; triangles reach the
//!   rasterizer as depth-ordered material runs
//! - **Static Merging**: Bake many static models into one mesh
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use painter3d::prelude::*;
//!
//! struct MyRasterizer;
//!
//! impl Rasterizer for MyRasterizer {
//!     fn draw_triangles(&mut self, vertices: &[ScreenVertex], material: &Material) {
//!         // rasterize a depth-ordered run of 2D triangles
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = SceneGraph::new();
//!     let camera = scene.add_node(
//!         scene.root(),
//!         NodeKind::Camera(Camera::perspective((640, 480), 60.0, 0.1, 100.0)),
//!         "camera",
//!     )?;
//!     let mesh = Arc::new(Mesh::cube(Arc::new(Material::default())));
//!     let cube = scene.add_node(
//!         scene.root(),
//!         NodeKind::Model(ModelInstance::new(mesh)),
//!         "cube",
//!     )?;
//!     scene.set_local_position(cube, Vec3::new(0.0, 0.0, -5.0))?;
//!
//!     let mut pipeline = Pipeline::new(&PipelineConfig::default());
//!     let mut rasterizer = MyRasterizer;
//!     let stats = pipeline.render_frame(&mut scene, camera, &mut rasterizer)?;
//!     println!("drew {} triangles", stats.triangles_drawn);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod geometry;
pub mod render;
pub mod scene;

pub use config::{ConfigError, PipelineConfig};

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        config::PipelineConfig,
        foundation::math::{Mat4, Point2, Point3, Quat, Transform, Vec2, Vec3},
        geometry::{Aabb, BoundingSphere, Frustum, Material, Mesh, MeshPart},
        render::{
            merge_meshes, merge_scene_models, Camera, DepthSorter, FrameStats, Pipeline,
            Projection, Rasterizer, Ray, ScreenVertex, SortMode,
        },
        scene::{ModelInstance, NodeKey, NodeKind, SceneGraph},
    };
}

//! Frame pipeline
//!
//! [`Pipeline`] turns a scene graph plus a camera node into ordered 2D
//! triangle batches for a [`Rasterizer`]. A frame moves through four stages
//! in a fixed order: cull, gather, sort, emit. [`Pipeline::render_frame`]
//! drives all four; the individual stage methods are public so a host can
//! interleave its own work between stages, but calling them out of order is
//! an error rather than silent corruption.
//!
//! Per-frame storage (gathered triangles, the depth sorter, material runs)
//! is retained across frames, so steady-state rendering does not allocate.

use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::geometry::{Frustum, Material};
use crate::render::camera::Camera;
use crate::render::sort::{DepthSorter, SortError, SortMode};
use crate::scene::{NodeKey, NodeKind, SceneError, SceneGraph};

/// Errors raised while rendering a frame
#[derive(Debug, Error)]
pub enum RenderError {
    /// A stage method was called out of order
    #[error("invalid pipeline stage: expected {expected:?}, pipeline is {actual:?}")]
    InvalidStage {
        /// The stage the pipeline had to be in
        expected: FrameStage,
        /// The stage it actually was in
        actual: FrameStage,
    },

    /// The camera node's world transform cannot be inverted
    #[error("camera world transform is singular")]
    SingularCameraTransform,

    /// A scene graph lookup failed
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The depth sorter ran out of capacity; the frame was aborted
    #[error(transparent)]
    Sort(#[from] SortError),
}

/// Where the pipeline is in the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    /// Between frames
    Idle,
    /// Visibility is decided; triangles not yet gathered
    Culled,
    /// Triangles are gathered and staged for sorting
    Gathered,
    /// Triangles are binned; ready to emit
    Sorted,
}

/// A screen-space vertex handed to the rasterizer
///
/// `position` is pixel x, pixel y (origin top left, y down), and NDC depth.
/// Plain-old-data so a backend can feed the buffer to anything that takes
/// raw bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScreenVertex {
    /// Pixel x, pixel y, NDC depth
    pub position: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Combined vertex, instance, and material color
    pub color: [f32; 4],
}

/// The 2D drawing backend boundary
///
/// The pipeline calls this once per material run, in depth order. Vertices
/// arrive as a triangle list, three per triangle.
pub trait Rasterizer {
    /// Draw a run of screen-space triangles with one material
    fn draw_triangles(&mut self, vertices: &[ScreenVertex], material: &Material);
}

/// Counters for one rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Nodes visited during culling
    pub nodes_considered: usize,
    /// Model nodes rejected by visibility or bounds tests
    pub nodes_culled: usize,
    /// Triangles accepted by the gather stage
    pub triangles_submitted: usize,
    /// Triangles actually handed to the rasterizer
    pub triangles_drawn: usize,
    /// Rasterizer invocations
    pub draw_calls: usize,
}

#[derive(Debug, Clone, Copy)]
struct GatheredTriangle {
    vertices: [ScreenVertex; 3],
    material: u32,
}

struct FrameContext {
    view: Mat4,
    view_projection: Mat4,
    viewport: (u32, u32),
}

/// Scene-to-rasterizer frame driver
pub struct Pipeline {
    sort_mode: SortMode,
    max_draw_distance: Option<f32>,

    stage: FrameStage,
    context: Option<FrameContext>,
    visible: Vec<NodeKey>,
    gathered: Vec<GatheredTriangle>,
    materials: Vec<Arc<Material>>,
    order: Vec<u32>,
    run: Vec<ScreenVertex>,
    sorter: DepthSorter,
    depth_min: f32,
    depth_max: f32,
    stats: FrameStats,
}

impl Pipeline {
    /// Create a pipeline from validated configuration
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            sort_mode: config.sort_mode,
            max_draw_distance: config.max_draw_distance,
            stage: FrameStage::Idle,
            context: None,
            visible: Vec::new(),
            gathered: Vec::with_capacity(config.max_triangles),
            materials: Vec::new(),
            order: Vec::with_capacity(config.max_triangles),
            run: Vec::new(),
            sorter: DepthSorter::new(config.bin_count, config.max_triangles),
            depth_min: f32::INFINITY,
            depth_max: f32::NEG_INFINITY,
            stats: FrameStats::default(),
        }
    }

    /// The stage the pipeline is currently in
    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Whether a node survived the most recent cull
    pub fn is_visible(&self, key: NodeKey) -> bool {
        self.visible.contains(&key)
    }

    /// Counters from the most recently completed frame
    pub fn last_stats(&self) -> FrameStats {
        self.stats
    }

    /// Render one frame: cull, gather, sort, and emit in order
    pub fn render_frame(
        &mut self,
        scene: &mut SceneGraph,
        camera: NodeKey,
        rasterizer: &mut dyn Rasterizer,
    ) -> Result<FrameStats, RenderError> {
        self.cull(scene, camera)?;
        self.gather(scene)?;
        self.sort()?;
        self.emit(rasterizer)?;
        Ok(self.stats)
    }

    /// Decide which model nodes are visible to the camera
    ///
    /// Walks the scene graph pruning invisible subtrees, then tests each
    /// model's world-space bounding sphere against the camera frustum and
    /// the optional draw-distance limit.
    pub fn cull(&mut self, scene: &mut SceneGraph, camera: NodeKey) -> Result<(), RenderError> {
        self.expect_stage(FrameStage::Idle)?;

        let camera_world = scene.world_transform(camera)?;
        let cam: Camera = scene.camera(camera)?.clone();
        let view = cam
            .view_matrix(&camera_world)
            .ok_or(RenderError::SingularCameraTransform)?;
        let view_projection = cam.projection_matrix() * view;
        let frustum = Frustum::from_matrix(&view_projection);
        let eye = Vec3::new(
            camera_world[(0, 3)],
            camera_world[(1, 3)],
            camera_world[(2, 3)],
        );

        self.visible.clear();
        self.stats = FrameStats::default();

        // Invisible nodes prune their whole subtree
        let mut stack: Vec<NodeKey> = scene.roots().to_vec();
        let mut models: Vec<NodeKey> = Vec::new();
        while let Some(key) = stack.pop() {
            let node = scene.node(key)?;
            if !node.visible {
                continue;
            }
            self.stats.nodes_considered += 1;
            if node.is_model() {
                models.push(key);
            }
            stack.extend(node.children().iter().copied());
        }

        for key in models {
            let world = scene.world_transform(key)?;
            let node = scene.node(key)?;
            let model = match &node.kind {
                NodeKind::Model(model) => model,
                _ => continue,
            };

            let sphere = model.mesh.bounding_sphere().transformed(&world);

            if model.frustum_culling && !frustum.intersects_sphere(&sphere) {
                self.stats.nodes_culled += 1;
                continue;
            }
            if let Some(limit) = self.max_draw_distance {
                if (sphere.center - eye).magnitude() - sphere.radius > limit {
                    self.stats.nodes_culled += 1;
                    continue;
                }
            }

            self.visible.push(key);
        }

        self.context = Some(FrameContext {
            view,
            view_projection,
            viewport: cam.viewport,
        });
        self.stage = FrameStage::Culled;
        Ok(())
    }

    /// Project visible triangles to screen space and stage them for sorting
    ///
    /// Triangles behind the near plane, with degenerate screen area, or
    /// facing away (when their material requests backface culling) are
    /// dropped here. Depth keys are view-space distances of each triangle's
    /// center. A capacity overflow aborts the frame and resets the
    /// pipeline to idle.
    pub fn gather(&mut self, scene: &mut SceneGraph) -> Result<(), RenderError> {
        self.expect_stage(FrameStage::Culled)?;

        self.gathered.clear();
        self.materials.clear();
        self.sorter.clear();
        self.depth_min = f32::INFINITY;
        self.depth_max = f32::NEG_INFINITY;

        let visible = std::mem::take(&mut self.visible);
        let result = self.gather_visible(scene, &visible);
        self.visible = visible;

        match result {
            Ok(()) => {
                self.stage = FrameStage::Gathered;
                Ok(())
            }
            Err(err) => {
                self.reset_frame();
                Err(err)
            }
        }
    }

    fn gather_visible(
        &mut self,
        scene: &mut SceneGraph,
        visible: &[NodeKey],
    ) -> Result<(), RenderError> {
        let (view, view_projection, viewport) = match self.context.as_ref() {
            Some(ctx) => (ctx.view, ctx.view_projection, ctx.viewport),
            None => {
                return Err(RenderError::InvalidStage {
                    expected: FrameStage::Culled,
                    actual: FrameStage::Idle,
                })
            }
        };

        for &key in visible {
            let world = scene.world_transform(key)?;
            let node = scene.node(key)?;
            let model = match &node.kind {
                NodeKind::Model(model) => model,
                _ => continue,
            };
            let mesh = Arc::clone(&model.mesh);
            let instance_color = model.color;

            let mvp = view_projection * world;
            let model_view = view * world;

            for part in &mesh.parts {
                // One table entry per distinct material, so runs sharing a
                // material coalesce across meshes
                let existing = self
                    .materials
                    .iter()
                    .position(|m| Arc::ptr_eq(m, &part.material));
                let material_index = match existing {
                    Some(index) => index as u32,
                    None => {
                        self.materials.push(Arc::clone(&part.material));
                        (self.materials.len() - 1) as u32
                    }
                };
                let material_color = part.material.color;

                for triangle in part.triangles.clone() {
                    let [ia, ib, ic] = mesh.indices[triangle];
                    let corners = [ia as usize, ib as usize, ic as usize];

                    let mut screen = [[0.0_f32; 3]; 3];
                    let mut behind = false;
                    for (slot, &vi) in corners.iter().enumerate() {
                        let p = mesh.positions[vi];
                        let clip = mvp * Vec4::new(p.x, p.y, p.z, 1.0);
                        if clip.w <= f32::EPSILON {
                            behind = true;
                            break;
                        }
                        let ndc = [clip.x / clip.w, clip.y / clip.w, clip.z / clip.w];
                        screen[slot] = [
                            (ndc[0] * 0.5 + 0.5) * viewport.0 as f32,
                            (1.0 - (ndc[1] * 0.5 + 0.5)) * viewport.1 as f32,
                            ndc[2],
                        ];
                    }
                    if behind {
                        continue;
                    }

                    // Screen y is down, so a front-facing (counter-clockwise
                    // in view space) triangle has negative signed area here
                    let area2 = (screen[1][0] - screen[0][0]) * (screen[2][1] - screen[0][1])
                        - (screen[1][1] - screen[0][1]) * (screen[2][0] - screen[0][0]);
                    if !area2.is_finite() || area2.abs() < 1.0e-9 {
                        continue;
                    }
                    if part.material.backface_culling && area2 > 0.0 {
                        continue;
                    }

                    let center = mesh.triangle_center(triangle);
                    let center_view = model_view * Vec4::new(center.x, center.y, center.z, 1.0);
                    let depth = -center_view.z;
                    if depth.is_finite() {
                        self.depth_min = self.depth_min.min(depth);
                        self.depth_max = self.depth_max.max(depth);
                    }

                    let id = self.gathered.len() as u32;
                    self.sorter.push(id, depth)?;

                    let mut vertices = [ScreenVertex {
                        position: [0.0; 3],
                        uv: [0.0; 2],
                        color: [0.0; 4],
                    }; 3];
                    for (slot, &vi) in corners.iter().enumerate() {
                        let vc = mesh.colors[vi];
                        vertices[slot] = ScreenVertex {
                            position: screen[slot],
                            uv: [mesh.uvs[vi].x, mesh.uvs[vi].y],
                            color: [
                                vc[0] * instance_color[0] * material_color[0],
                                vc[1] * instance_color[1] * material_color[1],
                                vc[2] * instance_color[2] * material_color[2],
                                vc[3] * instance_color[3] * material_color[3],
                            ],
                        };
                    }
                    self.gathered.push(GatheredTriangle {
                        vertices,
                        material: material_index,
                    });
                    self.stats.triangles_submitted += 1;
                }
            }
        }
        Ok(())
    }

    /// Bin the gathered triangles by depth
    ///
    /// The bucket range is the min and max depth observed during gather, so
    /// the buckets always span exactly the frame's depth extent.
    pub fn sort(&mut self) -> Result<(), RenderError> {
        self.expect_stage(FrameStage::Gathered)?;
        let (min, max) = if self.depth_min <= self.depth_max {
            (self.depth_min, self.depth_max)
        } else {
            (0.0, 1.0)
        };
        self.sorter.sort(self.sort_mode, min, max);
        self.stage = FrameStage::Sorted;
        Ok(())
    }

    /// Hand the sorted triangles to the rasterizer as material runs
    ///
    /// Consecutive triangles sharing a material become one `draw_triangles`
    /// call. Finishes the frame and returns the pipeline to idle.
    pub fn emit(&mut self, rasterizer: &mut dyn Rasterizer) -> Result<FrameStats, RenderError> {
        self.expect_stage(FrameStage::Sorted)?;

        // The order and run buffers live on the pipeline and keep their
        // capacity across frames
        let mut order = std::mem::take(&mut self.order);
        order.clear();
        self.sorter.for_each(self.sort_mode, |tri| order.push(tri.id));

        let mut run = std::mem::take(&mut self.run);
        run.clear();
        let mut run_material: Option<u32> = None;

        for &id in &order {
            let tri = &self.gathered[id as usize];
            if run_material != Some(tri.material) {
                if let Some(index) = run_material {
                    rasterizer.draw_triangles(&run, &self.materials[index as usize]);
                    self.stats.draw_calls += 1;
                    run.clear();
                }
                run_material = Some(tri.material);
            }
            run.extend_from_slice(&tri.vertices);
            self.stats.triangles_drawn += 1;
        }
        if let Some(index) = run_material {
            rasterizer.draw_triangles(&run, &self.materials[index as usize]);
            self.stats.draw_calls += 1;
        }
        self.order = order;
        self.run = run;

        debug!(
            "frame: {} considered, {} culled, {} submitted, {} drawn, {} draw calls",
            self.stats.nodes_considered,
            self.stats.nodes_culled,
            self.stats.triangles_submitted,
            self.stats.triangles_drawn,
            self.stats.draw_calls
        );

        self.finish_frame();
        Ok(self.stats)
    }

    fn expect_stage(&self, expected: FrameStage) -> Result<(), RenderError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(RenderError::InvalidStage {
                expected,
                actual: self.stage,
            })
        }
    }

    fn finish_frame(&mut self) {
        self.gathered.clear();
        self.materials.clear();
        self.sorter.clear();
        self.context = None;
        self.stage = FrameStage::Idle;
    }

    fn reset_frame(&mut self) {
        self.finish_frame();
        self.visible.clear();
    }
}

//! Rendering: camera, depth sorting, batching, and the frame pipeline

pub mod batch;
pub mod camera;
pub mod pipeline;
pub mod sort;

pub use batch::{merge_meshes, merge_scene_models, BatchError, MAX_MERGED_VERTICES};
pub use camera::{Camera, Projection, Ray};
pub use pipeline::{FrameStage, FrameStats, Pipeline, Rasterizer, RenderError, ScreenVertex};
pub use sort::{DepthSorter, SortError, SortMode};

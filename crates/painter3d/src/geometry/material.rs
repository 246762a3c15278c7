//! Material state for mesh parts
//!
//! Materials describe how a run of triangles is drawn: base color, blend
//! mode, and the culling/shading switches the rasterizer honors. Texture
//! pixel data lives outside this crate; a material only carries an opaque
//! reference the rasterizer can resolve.

/// How a material's triangles are blended into the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// No blending; triangles overwrite the target
    Opaque,
    /// Standard alpha blending
    Alpha,
    /// Additive blending
    Additive,
}

/// Opaque handle to a texture owned by the external rasterizer
///
/// The pipeline never touches pixel data; it forwards this reference with
/// each draw call and uses the dimensions to scale UVs if the rasterizer
/// wants pixel-space source coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRef {
    /// Rasterizer-side texture identifier
    pub id: u32,
    /// Texture width in pixels
    pub width: u32,
    /// Texture height in pixels
    pub height: u32,
}

/// Rendering state shared by all triangles of a mesh part
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Display name, used in logs and searches
    pub name: String,

    /// Base color multiplied with vertex colors (RGBA, 0..1)
    pub color: [f32; 4],

    /// Blend mode for the rasterizer
    pub blend: BlendMode,

    /// Whether triangles facing away from the camera are skipped
    pub backface_culling: bool,

    /// Whether lighting is skipped for this material
    pub shadeless: bool,

    /// Texture reference, if any
    pub texture: Option<TextureRef>,
}

impl Material {
    /// Create an opaque, backface-culled material with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: [1.0, 1.0, 1.0, 1.0],
            blend: BlendMode::Opaque,
            backface_culling: true,
            shadeless: false,
            texture: None,
        }
    }

    /// Whether this material needs back-to-front ordering to composite
    pub fn is_transparent(&self) -> bool {
        self.blend != BlendMode::Opaque || self.color[3] < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

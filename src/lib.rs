//! tiny-raster: a CPU triangle rasterizer with programmable shading
//!
//! Features:
//! - Homogeneous clipping (Sutherland-Hodgman) and back-face culling
//! - Integer edge-function rasterization with the top-left fill rule
//! - Perspective-correct attribute interpolation
//! - 2x2 fragment quads for mip level selection
//! - Phong / Blinn-Phong point lighting with diffuse, specular, normal and glow maps
//! - Parallel geometry and fragment stages with deterministic output
//!
//! # Module Organization
//!
//! - `math` - Vec2/Vec3/Vec4, 3x3 and 4x4 matrices, projection helpers
//! - `error` - RasterError and Result
//! - `config` - RendererConfig (RON)
//! - `state` - per-draw modes and point lights
//! - `texture` - Texture2D with mips, warp and filter modes; TextureUnits registry
//! - `vertex` - VertexData interpolation and QuadFragments
//! - `clip` - clip-space triangle clipping
//! - `framebuffer` - color + depth target, row bands for parallel writes
//! - `parallel` - scoped fork-join helpers
//! - `pipeline` - ShadingPipeline trait, shading programs, rasterizers
//! - `mesh` - DrawableMesh, Material, DrawableConfig
//! - `renderer` - Renderer orchestration

pub mod clip;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod math;
pub mod mesh;
pub mod parallel;
pub mod pipeline;
pub mod renderer;
pub mod state;
pub mod texture;
pub mod vertex;

// =============================================================================
// Convenience re-exports for commonly used items
// =============================================================================

pub use config::RendererConfig;
pub use error::{RasterError, Result};
pub use framebuffer::FrameBuffer;
pub use math::{Mat3, Mat4, Vec2, Vec3, Vec4};
pub use mesh::{DrawableConfig, DrawableMesh, Material};
pub use pipeline::{
    BlinnPhongShadingPipeline, DoNothingShadingPipeline, PhongShadingPipeline, ShadingContext, ShadingPipeline,
    TextureShadingPipeline,
};
pub use renderer::{RenderStats, Renderer};
pub use state::{
    CullFaceMode, DepthTestMode, DepthWriteMode, LightingMode, PointLight, PolygonMode, ShadingState,
    TextureFilterMode, TextureWarpMode,
};
pub use texture::{Texture2D, TextureId, TextureUnits};
pub use vertex::{QuadFragments, VertexData};

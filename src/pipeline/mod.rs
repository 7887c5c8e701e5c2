//! Programmable shading pipeline
//!
//! A [`ShadingPipeline`] supplies the vertex and fragment stages. Everything
//! a shader may look up by handle (textures, point lights, the viewer
//! position) lives in a [`ShadingContext`] that the renderer owns and lends
//! out read-only for the duration of a draw.
//!
//! - `raster` - edge-function quad rasterizer and wireframe rasterizer
//! - `programs` - the concrete shading programs

pub mod programs;
pub mod raster;

use crate::math::{mat3_mul, mat4_mul, mat4_transform, mat3_transform, normal_matrix, Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::mesh::Material;
use crate::state::PointLight;
use crate::texture::{Texture2D, TextureId, TextureUnits};
use crate::vertex::VertexData;

pub use programs::{BlinnPhongShadingPipeline, DoNothingShadingPipeline, PhongShadingPipeline, TextureShadingPipeline};
pub use raster::{rasterize_fill_edge_function, rasterize_wire};

/// Handle-addressable resources visible to shaders
#[derive(Debug, Clone, Default)]
pub struct ShadingContext {
    pub textures: TextureUnits,
    pub lights: Vec<PointLight>,
    pub viewer_pos: Vec3,
}

impl ShadingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_texture(&mut self, texture: Texture2D) -> TextureId {
        self.textures.upload(texture)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture2D> {
        self.textures.get(id)
    }

    /// Append a light; the returned index stays valid
    pub fn add_point_light(&mut self, light: PointLight) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn point_light(&self, index: usize) -> Option<&PointLight> {
        self.lights.get(index)
    }

    pub fn point_light_mut(&mut self, index: usize) -> Option<&mut PointLight> {
        self.lights.get_mut(index)
    }
}

/// Per-draw constants handed to both shader stages
#[derive(Debug, Clone, Copy)]
pub struct Uniforms {
    pub model: Mat4,
    pub view_project: Mat4,
    pub normal_matrix: Mat3,
    pub material: Material,
    pub lighting: bool,
}

impl Uniforms {
    pub fn new(model: Mat4, view: &Mat4, project: &Mat4, material: Material, lighting: bool) -> Self {
        Self {
            model,
            view_project: mat4_mul(project, view),
            normal_matrix: normal_matrix(&model),
            material,
            lighting,
        }
    }
}

/// One fragment plus the screen-space UV derivatives of its quad
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    pub data: &'a VertexData,
    pub duv_dx: Vec2,
    pub duv_dy: Vec2,
}

/// Vertex + fragment stage
pub trait ShadingPipeline: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs once per vertex before clipping. Must fill `cpos`.
    fn vertex_shader(&self, uniforms: &Uniforms, vertex: &mut VertexData) {
        transform_vertex(uniforms, vertex);
    }

    /// Runs once per covered pixel; returns RGBA in `[0,1]` (clamped on write)
    fn fragment_shader(&self, ctx: &ShadingContext, uniforms: &Uniforms, frag: &Fragment<'_>) -> Vec4;
}

/// Shared 3D vertex stage: local -> world -> clip, normals and tangent frame
/// through the normal matrix.
pub fn transform_vertex(uniforms: &Uniforms, v: &mut VertexData) {
    v.pos = mat4_transform(&uniforms.model, v.pos);
    v.cpos = mat4_transform(&uniforms.view_project, v.pos);
    v.nor = mat3_transform(&uniforms.normal_matrix, v.nor);
    v.tbn = mat3_mul(&uniforms.normal_matrix, &v.tbn);
}

/// Sample texture `id`, choosing the mip level from the UV derivatives when
/// the texture has a mip chain. Unknown ids sample as zero.
pub fn texture_2d(ctx: &ShadingContext, id: TextureId, uv: Vec2, duv_dx: Vec2, duv_dy: Vec2) -> Vec4 {
    let Some(texture) = ctx.texture(id) else {
        return Vec4::ZERO;
    };
    if texture.is_generated_mipmap() {
        texture.sample_lod(uv, texture.lod(duv_dx, duv_dy))
    } else {
        texture.sample(uv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{mat4_identity, mat4_translation};
    use crate::state::{TextureFilterMode, TextureWarpMode};

    #[test]
    fn test_texture_2d_out_of_range_is_zero() {
        let ctx = ShadingContext::new();
        let c = texture_2d(&ctx, TextureId(3), Vec2::new(0.5, 0.5), Vec2::ZERO, Vec2::ZERO);
        assert_eq!(c, Vec4::ZERO);
    }

    #[test]
    fn test_texture_2d_uses_mips_for_large_derivatives() {
        let white = Vec4::ONE;
        let black = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let mut tex = Texture2D::checkerboard(64, 32, white, black)
            .unwrap()
            .with_modes(TextureWarpMode::Repeat, TextureFilterMode::Linear);
        tex.generate_mipmap();
        let mut ctx = ShadingContext::new();
        let id = ctx.upload_texture(tex);

        // Sixteen texels per pixel lands far enough down the chain to average out
        let d = Vec2::new(16.0 / 64.0, 0.0);
        let c = texture_2d(&ctx, id, Vec2::new(0.3, 0.3), d, Vec2::new(0.0, 16.0 / 64.0));
        assert!((c.x - 0.5).abs() < 0.05, "expected grey, got {:?}", c);
    }

    #[test]
    fn test_lights_are_index_stable() {
        let mut ctx = ShadingContext::new();
        let a = ctx.add_point_light(PointLight::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::ONE));
        let b = ctx.add_point_light(PointLight::new(Vec3::UP, Vec3::new(1.0, 0.0, 0.0), Vec3::ONE));
        assert_eq!((a, b), (0, 1));
        assert_eq!(ctx.point_light(1).map(|l| l.position), Some(Vec3::UP));
        assert!(ctx.point_light(2).is_none());
    }

    #[test]
    fn test_transform_vertex() {
        let model = mat4_translation(Vec3::new(1.0, 2.0, 3.0));
        let uniforms = Uniforms::new(model, &mat4_identity(), &mat4_identity(), Material::default(), true);
        let mut v = VertexData {
            nor: Vec3::UP,
            ..VertexData::default()
        };
        transform_vertex(&uniforms, &mut v);
        assert_eq!(v.pos, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(v.cpos, v.pos);
        assert_eq!(v.nor, Vec3::UP);
    }
}

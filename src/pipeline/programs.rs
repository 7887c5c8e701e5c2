//! Concrete shading programs
//!
//! All 3D programs share the default vertex stage and differ only in how the
//! fragment color is lit. Lighting is assembled from the helpers below rather
//! than by layering programs on top of each other.

use super::{texture_2d, Fragment, ShadingContext, ShadingPipeline, Uniforms};
use crate::math::{mat3_transform, Vec3, Vec4};
use crate::vertex::VertexData;

/// Material inputs resolved for one fragment
#[derive(Debug, Clone, Copy)]
struct SurfaceSample {
    albedo: Vec4,
    specular: Vec3,
    normal: Vec3,
    emission: Vec3,
}

fn sample_surface(ctx: &ShadingContext, uniforms: &Uniforms, frag: &Fragment<'_>) -> SurfaceSample {
    let data = frag.data;
    let material = &uniforms.material;
    let sample = |id| texture_2d(ctx, id, data.tex, frag.duv_dx, frag.duv_dy);

    let albedo = match material.diffuse_map {
        Some(id) => sample(id).mul_elem(data.col),
        None => data.col,
    };

    let specular = match material.specular_map {
        Some(id) => material.specular.mul_elem(sample(id).xyz()),
        None => material.specular,
    };

    // Tangent-space normal map, decoded from [0,1] to [-1,1]
    let normal = match material.normal_map {
        Some(id) => {
            let t = sample(id).xyz() * 2.0 - Vec3::ONE;
            mat3_transform(&data.tbn, t).normalize()
        }
        None => data.nor.normalize(),
    };

    let emission = match material.glow_map {
        Some(id) => material.emission + sample(id).xyz(),
        None => material.emission,
    };

    SurfaceSample { albedo, specular, normal, emission }
}

/// Specular lobe as a function of normal, light and view directions
type SpecularTerm = fn(n: Vec3, l: Vec3, v: Vec3, shininess: f32) -> f32;

fn phong_specular(n: Vec3, l: Vec3, v: Vec3, shininess: f32) -> f32 {
    let r = (-l).reflect(n);
    r.dot(v).max(0.0).powf(shininess)
}

fn blinn_phong_specular(n: Vec3, l: Vec3, v: Vec3, shininess: f32) -> f32 {
    let h = (l + v).normalize();
    n.dot(h).max(0.0).powf(shininess)
}

/// Ambient + per-light Lambert diffuse and specular, attenuated, plus emission
fn shade_point_lights(ctx: &ShadingContext, uniforms: &Uniforms, data: &VertexData, surface: &SurfaceSample, specular_term: SpecularTerm) -> Vec4 {
    let material = &uniforms.material;
    let albedo = surface.albedo.xyz();
    if !uniforms.lighting {
        let c = albedo + surface.emission;
        return c.extend(surface.albedo.w);
    }

    let pos = data.pos.xyz();
    let n = surface.normal;
    let v = (ctx.viewer_pos - pos).normalize();

    let mut color = material.ambient.mul_elem(albedo);
    for light in &ctx.lights {
        let to_light = light.position - pos;
        let l = to_light.normalize();
        let n_dot_l = n.dot(l).max(0.0);
        if n_dot_l <= 0.0 {
            continue;
        }
        let diffuse = material.diffuse.mul_elem(albedo) * n_dot_l;
        let specular = surface.specular * specular_term(n, l, v, material.shininess);
        color += (diffuse + specular).mul_elem(light.color) * light.falloff(to_light.len());
    }

    (color + surface.emission).extend(surface.albedo.w)
}

/// Passes clip-space input straight through and outputs vertex color
#[derive(Debug, Clone, Copy, Default)]
pub struct DoNothingShadingPipeline;

impl ShadingPipeline for DoNothingShadingPipeline {
    fn name(&self) -> &'static str {
        "do-nothing"
    }

    fn vertex_shader(&self, _uniforms: &Uniforms, vertex: &mut VertexData) {
        vertex.cpos = vertex.pos;
    }

    fn fragment_shader(&self, _ctx: &ShadingContext, _uniforms: &Uniforms, frag: &Fragment<'_>) -> Vec4 {
        frag.data.col
    }
}

/// Unlit: diffuse texture (when bound) modulated by vertex color
#[derive(Debug, Clone, Copy, Default)]
pub struct TextureShadingPipeline;

impl ShadingPipeline for TextureShadingPipeline {
    fn name(&self) -> &'static str {
        "texture"
    }

    fn fragment_shader(&self, ctx: &ShadingContext, uniforms: &Uniforms, frag: &Fragment<'_>) -> Vec4 {
        match uniforms.material.diffuse_map {
            Some(id) => texture_2d(ctx, id, frag.data.tex, frag.duv_dx, frag.duv_dy).mul_elem(frag.data.col),
            None => frag.data.col,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhongShadingPipeline;

impl ShadingPipeline for PhongShadingPipeline {
    fn name(&self) -> &'static str {
        "phong"
    }

    fn fragment_shader(&self, ctx: &ShadingContext, uniforms: &Uniforms, frag: &Fragment<'_>) -> Vec4 {
        let surface = sample_surface(ctx, uniforms, frag);
        shade_point_lights(ctx, uniforms, frag.data, &surface, phong_specular)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlinnPhongShadingPipeline;

impl ShadingPipeline for BlinnPhongShadingPipeline {
    fn name(&self) -> &'static str {
        "blinn-phong"
    }

    fn fragment_shader(&self, ctx: &ShadingContext, uniforms: &Uniforms, frag: &Fragment<'_>) -> Vec4 {
        let surface = sample_surface(ctx, uniforms, frag);
        shade_point_lights(ctx, uniforms, frag.data, &surface, blinn_phong_specular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{mat4_identity, Vec2};
    use crate::mesh::Material;
    use crate::state::PointLight;
    use crate::texture::Texture2D;

    fn lit_context() -> ShadingContext {
        let mut ctx = ShadingContext::new();
        ctx.viewer_pos = Vec3::new(0.0, 0.0, 5.0);
        ctx.add_point_light(PointLight::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 0.0, 0.0), Vec3::ONE));
        ctx
    }

    fn facing_fragment() -> VertexData {
        VertexData {
            pos: Vec4::new(0.0, 0.0, 0.0, 1.0),
            nor: Vec3::new(0.0, 0.0, 1.0),
            col: Vec4::new(0.5, 0.5, 0.5, 1.0),
            ..VertexData::default()
        }
    }

    fn uniforms(material: Material, lighting: bool) -> Uniforms {
        Uniforms::new(mat4_identity(), &mat4_identity(), &mat4_identity(), material, lighting)
    }

    fn shade(program: &dyn ShadingPipeline, ctx: &ShadingContext, u: &Uniforms, data: &VertexData) -> Vec4 {
        let frag = Fragment { data, duv_dx: Vec2::ZERO, duv_dy: Vec2::ZERO };
        program.fragment_shader(ctx, u, &frag)
    }

    #[test]
    fn test_do_nothing_outputs_vertex_color() {
        let data = facing_fragment();
        let c = shade(&DoNothingShadingPipeline, &ShadingContext::new(), &uniforms(Material::default(), true), &data);
        assert_eq!(c, data.col);

        let mut v = VertexData {
            pos: Vec4::new(0.5, 0.25, 0.1, 1.0),
            ..VertexData::default()
        };
        DoNothingShadingPipeline.vertex_shader(&uniforms(Material::default(), true), &mut v);
        assert_eq!(v.cpos, v.pos);
    }

    #[test]
    fn test_head_on_light_gives_full_diffuse() {
        let ctx = lit_context();
        let data = facing_fragment();
        // kD = 1, distance 5, constant attenuation 1
        let c = shade(&PhongShadingPipeline, &ctx, &uniforms(Material::default(), true), &data);
        assert!((c.x - 0.5).abs() < 1e-5);
        assert_eq!(c.w, 1.0);
    }

    #[test]
    fn test_light_behind_surface_leaves_ambient() {
        let mut ctx = lit_context();
        if let Some(light) = ctx.point_light_mut(0) {
            light.position = Vec3::new(0.0, 0.0, -5.0);
        }
        let material = Material {
            ambient: Vec3::splat(0.2),
            ..Material::default()
        };
        let c = shade(&BlinnPhongShadingPipeline, &ctx, &uniforms(material, true), &facing_fragment());
        assert!((c.x - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_phong_and_blinn_differ_off_axis() {
        let mut ctx = lit_context();
        ctx.viewer_pos = Vec3::new(3.0, 0.0, 4.0);
        let material = Material {
            specular: Vec3::ONE,
            shininess: 16.0,
            ..Material::default()
        };
        let u = uniforms(material, true);
        let data = facing_fragment();
        let phong = shade(&PhongShadingPipeline, &ctx, &u, &data);
        let blinn = shade(&BlinnPhongShadingPipeline, &ctx, &u, &data);
        // Half-vector lobe is wider than the reflection lobe
        assert!(blinn.x > phong.x);
    }

    #[test]
    fn test_lighting_disabled_returns_albedo_plus_emission() {
        let ctx = lit_context();
        let material = Material {
            emission: Vec3::new(0.1, 0.0, 0.0),
            ..Material::default()
        };
        let c = shade(&PhongShadingPipeline, &ctx, &uniforms(material, false), &facing_fragment());
        assert!((c.x - 0.6).abs() < 1e-5);
        assert!((c.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_texture_program_samples_diffuse_map() {
        let mut ctx = ShadingContext::new();
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let id = ctx.upload_texture(Texture2D::from_pixels(1, 1, vec![red]).unwrap());
        let material = Material {
            diffuse_map: Some(id),
            ..Material::default()
        };
        let data = VertexData::default();
        assert_eq!(shade(&TextureShadingPipeline, &ctx, &uniforms(material, false), &data), red);

        // A binding past the end of the registry samples as zero
        let dangling = Material {
            diffuse_map: Some(crate::texture::TextureId(9)),
            ..Material::default()
        };
        assert_eq!(shade(&TextureShadingPipeline, &ctx, &uniforms(dangling, false), &data), Vec4::ZERO);
    }

    #[test]
    fn test_flat_normal_map_matches_geometric_normal() {
        let mut ctx = lit_context();
        // (0.5, 0.5, 1.0) decodes to +Z in tangent space
        let id = ctx.upload_texture(Texture2D::from_pixels(1, 1, vec![Vec4::new(0.5, 0.5, 1.0, 1.0)]).unwrap());
        let material = Material {
            normal_map: Some(id),
            ..Material::default()
        };
        let data = facing_fragment();
        let mapped = shade(&PhongShadingPipeline, &ctx, &uniforms(material, true), &data);
        let plain = shade(&PhongShadingPipeline, &ctx, &uniforms(Material::default(), true), &data);
        assert!((mapped.x - plain.x).abs() < 1e-4);
    }
}

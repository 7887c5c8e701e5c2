//! Drawable meshes: indexed vertex attributes, per-face tangent frames and
//! per-mesh draw configuration + material

use crate::math::{mat4_identity, Mat4, Vec2, Vec3, Vec4};
use crate::state::{CullFaceMode, DepthTestMode, DepthWriteMode, LightingMode, PolygonMode, ShadingState};
use crate::texture::TextureId;
use serde::{Deserialize, Serialize};

/// Vertex attribute arrays. Faces index into these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexAttrib {
    pub positions: Vec<Vec4>,
    pub colors: Vec<Vec4>,
    pub texcoords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
}

impl VertexAttrib {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One triangle. Colors share the position index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshFace {
    pub pos_index: [u32; 3],
    pub nor_index: [u32; 3],
    pub tex_index: [u32; 3],
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

/// Per-mesh fixed-function state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawableConfig {
    pub polygon_mode: PolygonMode,
    pub cull_face_mode: CullFaceMode,
    pub depth_test_mode: DepthTestMode,
    pub depth_write_mode: DepthWriteMode,
    pub lighting_mode: LightingMode,
    pub model_matrix: Mat4,
}

impl Default for DrawableConfig {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull_face_mode: CullFaceMode::Back,
            depth_test_mode: DepthTestMode::Enable,
            depth_write_mode: DepthWriteMode::Enable,
            lighting_mode: LightingMode::Enable,
            model_matrix: mat4_identity(),
        }
    }
}

impl DrawableConfig {
    pub fn shading_state(&self) -> ShadingState {
        ShadingState {
            cull_face_mode: self.cull_face_mode,
            depth_test_mode: self.depth_test_mode,
            depth_write_mode: self.depth_write_mode,
            polygon_mode: self.polygon_mode,
            lighting_mode: self.lighting_mode,
        }
    }
}

/// Surface coefficients and texture bindings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub diffuse_map: Option<TextureId>,
    pub specular_map: Option<TextureId>,
    pub normal_map: Option<TextureId>,
    pub glow_map: Option<TextureId>,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub emission: Vec3,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse_map: None,
            specular_map: None,
            normal_map: None,
            glow_map: None,
            ambient: Vec3::ZERO,
            diffuse: Vec3::ONE,
            specular: Vec3::ZERO,
            emission: Vec3::ZERO,
            shininess: 1.0,
        }
    }
}

/// Tangent and bitangent of a triangle from its positions and UVs.
/// Falls back to the X/Y axes when the UV mapping is degenerate.
pub fn face_tangent_frame(p: [Vec3; 3], uv: [Vec2; 3]) -> (Vec3, Vec3) {
    let e1 = p[1] - p[0];
    let e2 = p[2] - p[0];
    let d1 = uv[1] - uv[0];
    let d2 = uv[2] - uv[0];

    let det = d1.x * d2.y - d2.x * d1.y;
    if det.abs() <= f32::EPSILON {
        return (Vec3::new(1.0, 0.0, 0.0), Vec3::UP);
    }
    let f = 1.0 / det;
    let tangent = (e1 * d2.y - e2 * d1.y) * f;
    let bitangent = (e2 * d1.x - e1 * d2.x) * f;
    (tangent.normalize(), bitangent.normalize())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawableMesh {
    attribs: VertexAttrib,
    faces: Vec<MeshFace>,
    config: DrawableConfig,
    material: Material,
}

impl DrawableMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from shared-index arrays: every attribute of a corner is looked
    /// up with the same index. `colors`, `texcoords` and `normals` may be
    /// empty (white, `(0,0)` and a zero normal are used instead).
    pub fn from_arrays(
        positions: Vec<Vec3>,
        colors: Vec<Vec4>,
        texcoords: Vec<Vec2>,
        normals: Vec<Vec3>,
        indices: &[[u32; 3]],
    ) -> Self {
        let mut mesh = Self {
            attribs: VertexAttrib {
                positions: positions.into_iter().map(|p| p.extend(1.0)).collect(),
                colors,
                texcoords,
                normals,
            },
            ..Self::default()
        };
        for &tri in indices {
            mesh.push_face(tri, tri, tri);
        }
        mesh
    }

    /// Append a face, computing its tangent frame. Missing attributes are
    /// treated as zero.
    pub fn push_face(&mut self, pos_index: [u32; 3], nor_index: [u32; 3], tex_index: [u32; 3]) {
        let pos = |i: u32| self.attribs.positions.get(i as usize).map(|p| p.xyz()).unwrap_or(Vec3::ZERO);
        let uv = |i: u32| self.attribs.texcoords.get(i as usize).copied().unwrap_or(Vec2::ZERO);
        let (tangent, bitangent) = face_tangent_frame(
            [pos(pos_index[0]), pos(pos_index[1]), pos(pos_index[2])],
            [uv(tex_index[0]), uv(tex_index[1]), uv(tex_index[2])],
        );
        self.faces.push(MeshFace {
            pos_index,
            nor_index,
            tex_index,
            tangent,
            bitangent,
        });
    }

    /// Axis-aligned cube centred on the origin, 4 vertices per side so every
    /// side gets its own normal and full `[0,1]` UVs.
    pub fn cube(half_extent: f32) -> Self {
        let h = half_extent;
        let corners = [
            // Front
            [(-h, -h, h), (h, -h, h), (h, h, h), (-h, h, h)],
            // Back
            [(-h, -h, -h), (-h, h, -h), (h, h, -h), (h, -h, -h)],
            // Top
            [(-h, h, -h), (-h, h, h), (h, h, h), (h, h, -h)],
            // Bottom
            [(-h, -h, -h), (h, -h, -h), (h, -h, h), (-h, -h, h)],
            // Right
            [(h, -h, -h), (h, h, -h), (h, h, h), (h, -h, h)],
            // Left
            [(-h, -h, -h), (-h, -h, h), (-h, h, h), (-h, h, -h)],
        ];
        let side_normals = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
        ];
        let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];

        let mut positions = Vec::with_capacity(24);
        let mut texcoords = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(12);
        for (side, quad) in corners.iter().enumerate() {
            let base = positions.len() as u32;
            for (i, &(x, y, z)) in quad.iter().enumerate() {
                positions.push(Vec3::new(x, y, z));
                texcoords.push(uvs[i]);
                normals.push(side_normals[side]);
            }
            indices.push([base, base + 1, base + 2]);
            indices.push([base, base + 2, base + 3]);
        }
        Self::from_arrays(positions, Vec::new(), texcoords, normals, &indices)
    }

    /// Floor quad in the XZ plane facing +Y. UVs repeat `uv_repeat` times.
    pub fn plane(half_width: f32, half_depth: f32, uv_repeat: f32) -> Self {
        let (w, d, r) = (half_width, half_depth, uv_repeat);
        let positions = vec![
            Vec3::new(-w, 0.0, d),
            Vec3::new(w, 0.0, d),
            Vec3::new(w, 0.0, -d),
            Vec3::new(-w, 0.0, -d),
        ];
        let texcoords = vec![Vec2::new(0.0, 0.0), Vec2::new(r, 0.0), Vec2::new(r, r), Vec2::new(0.0, r)];
        let normals = vec![Vec3::UP; 4];
        Self::from_arrays(positions, Vec::new(), texcoords, normals, &[[0, 1, 2], [0, 2, 3]])
    }

    pub fn clear(&mut self) {
        self.attribs.clear();
        self.faces.clear();
    }

    // Accessors

    pub fn vertex_attrib(&self) -> &VertexAttrib {
        &self.attribs
    }

    pub fn vertex_attrib_mut(&mut self) -> &mut VertexAttrib {
        &mut self.attribs
    }

    pub fn faces(&self) -> &[MeshFace] {
        &self.faces
    }

    pub fn config(&self) -> &DrawableConfig {
        &self.config
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    // Draw configuration

    pub fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.config.polygon_mode = mode;
    }

    pub fn set_cull_face_mode(&mut self, mode: CullFaceMode) {
        self.config.cull_face_mode = mode;
    }

    pub fn set_depth_test_mode(&mut self, mode: DepthTestMode) {
        self.config.depth_test_mode = mode;
    }

    pub fn set_depth_write_mode(&mut self, mode: DepthWriteMode) {
        self.config.depth_write_mode = mode;
    }

    pub fn set_lighting_mode(&mut self, mode: LightingMode) {
        self.config.lighting_mode = mode;
    }

    pub fn set_model_matrix(&mut self, m: Mat4) {
        self.config.model_matrix = m;
    }

    pub fn model_matrix(&self) -> &Mat4 {
        &self.config.model_matrix
    }

    // Material

    pub fn set_diffuse_map(&mut self, id: Option<TextureId>) {
        self.material.diffuse_map = id;
    }

    pub fn set_specular_map(&mut self, id: Option<TextureId>) {
        self.material.specular_map = id;
    }

    pub fn set_normal_map(&mut self, id: Option<TextureId>) {
        self.material.normal_map = id;
    }

    pub fn set_glow_map(&mut self, id: Option<TextureId>) {
        self.material.glow_map = id;
    }

    pub fn set_ambient_coff(&mut self, k: Vec3) {
        self.material.ambient = k;
    }

    pub fn set_diffuse_coff(&mut self, k: Vec3) {
        self.material.diffuse = k;
    }

    pub fn set_specular_coff(&mut self, k: Vec3) {
        self.material.specular = k;
    }

    pub fn set_emission_coff(&mut self, k: Vec3) {
        self.material.emission = k;
    }

    pub fn set_specular_exponent(&mut self, shininess: f32) {
        self.material.shininess = shininess;
    }
}

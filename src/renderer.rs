//! Renderer: owns the frame buffers, the shading context and the mesh list,
//! and drives each draw through
//! Transform -> Clip -> Cull -> Rasterize -> Shade -> DepthTest -> Write.
//!
//! Geometry runs in parallel per face. Shading runs in parallel per row band
//! of the back buffer; every band walks the rasterized quads in submission
//! order so the image is identical to a single-threaded draw.

use std::sync::Arc;
use std::time::Instant;

use crate::clip::clip_triangle;
use crate::config::RendererConfig;
use crate::error::Result;
use crate::framebuffer::{FrameBand, FrameBuffer};
use crate::math::{mat3_from_columns, mat4_identity, mat4_mul, mat4_transform, mat4_viewport, Mat4, Vec2, Vec3, Vec4};
use crate::mesh::{DrawableMesh, MeshFace, VertexAttrib};
use crate::parallel::{parallel_each, parallel_for, resolve_threads};
use crate::pipeline::raster::signed_area;
use crate::pipeline::{
    rasterize_fill_edge_function, rasterize_wire, BlinnPhongShadingPipeline, Fragment, ShadingContext, ShadingPipeline,
    Uniforms,
};
use crate::state::{CullFaceMode, PointLight, PolygonMode, ShadingState};
use crate::texture::{Texture2D, TextureId, TextureUnits};
use crate::vertex::{QuadFragments, VertexData};

/// Counters and phase timings of the last render call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    pub meshes_drawn: u32,
    pub faces_submitted: u32,
    /// Triangles that survived clipping (before culling)
    pub triangles_clipped: u32,
    pub triangles_culled: u32,
    pub quads_rasterized: u32,
    pub fragments_written: u32,
    pub geometry_ms: f32,
    pub fragment_ms: f32,
}

impl RenderStats {
    fn accumulate(&mut self, other: &RenderStats) {
        self.meshes_drawn += other.meshes_drawn;
        self.faces_submitted += other.faces_submitted;
        self.triangles_clipped += other.triangles_clipped;
        self.triangles_culled += other.triangles_culled;
        self.quads_rasterized += other.quads_rasterized;
        self.fragments_written += other.fragments_written;
        self.geometry_ms += other.geometry_ms;
        self.fragment_ms += other.fragment_ms;
    }
}

/// True if the screen-space triangle must be discarded under `mode`.
/// Counter-clockwise on screen is front-facing; zero-area triangles are
/// never culled here (the rasterizer drops them).
pub fn is_back_facing(v0: &VertexData, v1: &VertexData, v2: &VertexData, mode: CullFaceMode) -> bool {
    let orient = signed_area(v0.spos, v1.spos, v2.spos);
    match mode {
        CullFaceMode::Disable => false,
        CullFaceMode::Back => orient > 0,
        CullFaceMode::Front => orient < 0,
    }
}

/// Per-face output of the geometry stage
#[derive(Debug, Default)]
struct FaceRaster {
    quads: Vec<QuadFragments>,
    triangles: u32,
    culled: u32,
}

/// Frame-wide transforms needed by one draw
struct FrameParams {
    model: Mat4,
    view: Mat4,
    project: Mat4,
    viewport: Mat4,
    width: usize,
    height: usize,
    threads: usize,
}

fn fetch_vertex(attribs: &VertexAttrib, face: &MeshFace, corner: usize) -> Option<VertexData> {
    let pi = face.pos_index[corner] as usize;
    let pos = *attribs.positions.get(pi)?;
    let nor = attribs
        .normals
        .get(face.nor_index[corner] as usize)
        .copied()
        .unwrap_or(Vec3::ZERO);
    Some(VertexData {
        pos,
        col: attribs.colors.get(pi).copied().unwrap_or(Vec4::ONE),
        nor,
        tex: attribs
            .texcoords
            .get(face.tex_index[corner] as usize)
            .copied()
            .unwrap_or(Vec2::ZERO),
        tbn: mat3_from_columns(face.tangent, face.bitangent, nor),
        ..VertexData::default()
    })
}

/// Perspective divide (keeping clip `w`) and viewport mapping to raster
/// coordinates. Attributes are pre-corrected first.
fn to_screen(v: &mut VertexData, viewport: &Mat4) {
    VertexData::pre_persp_correction(v);
    let w = v.cpos.w;
    v.cpos = Vec4::new(v.cpos.x / w, v.cpos.y / w, v.cpos.z / w, w);
    let s = mat4_transform(viewport, Vec4::new(v.cpos.x, v.cpos.y, v.cpos.z, 1.0));
    v.spos = [(s.x + 0.5).floor() as i32, (s.y + 0.5).floor() as i32];
}

fn process_face(
    pipeline: &dyn ShadingPipeline,
    uniforms: &Uniforms,
    state: &ShadingState,
    attribs: &VertexAttrib,
    face: &MeshFace,
    frame: &FrameParams,
) -> FaceRaster {
    let mut out = FaceRaster::default();
    let (Some(mut v0), Some(mut v1), Some(mut v2)) = (
        fetch_vertex(attribs, face, 0),
        fetch_vertex(attribs, face, 1),
        fetch_vertex(attribs, face, 2),
    ) else {
        log::warn!("skipping face with out-of-range position index {:?}", face.pos_index);
        return out;
    };

    for v in [&mut v0, &mut v1, &mut v2] {
        pipeline.vertex_shader(uniforms, v);
    }

    for mut tri in clip_triangle(&v0, &v1, &v2) {
        out.triangles += 1;
        for v in tri.iter_mut() {
            to_screen(v, &frame.viewport);
        }
        if is_back_facing(&tri[0], &tri[1], &tri[2], state.cull_face_mode) {
            out.culled += 1;
            continue;
        }
        match state.polygon_mode {
            PolygonMode::Fill => {
                rasterize_fill_edge_function(&tri[0], &tri[1], &tri[2], frame.width, frame.height, &mut out.quads)
            }
            PolygonMode::Wire => rasterize_wire(&tri[0], &tri[1], &tri[2], frame.width, frame.height, &mut out.quads),
        }
    }
    out
}

/// Shade every lane of `faces` that falls inside `band`. Returns the number
/// of fragments written.
fn shade_band(
    band: &mut FrameBand<'_>,
    ctx: &ShadingContext,
    pipeline: &dyn ShadingPipeline,
    uniforms: &Uniforms,
    state: &ShadingState,
    faces: &[FaceRaster],
) -> u32 {
    let depth_test = state.depth_test_enabled();
    let depth_write = state.depth_write_enabled();
    let mut written = 0;

    for quad in faces.iter().flat_map(|f| f.quads.iter()) {
        if !quad
            .fragments
            .iter()
            .any(|f| f.is_valid() && band.contains_row(f.spos[1]))
        {
            continue;
        }

        let mut quad = *quad;
        for f in quad.fragments.iter_mut() {
            VertexData::aft_persp_correction(f);
        }
        let (mut duv_dx, mut duv_dy) = quad.uv_derivatives();
        // Extrapolated lanes can land past the horizon
        if !(duv_dx.x.is_finite() && duv_dx.y.is_finite() && duv_dy.x.is_finite() && duv_dy.y.is_finite()) {
            duv_dx = Vec2::ZERO;
            duv_dy = Vec2::ZERO;
        }

        for data in quad.fragments.iter() {
            let [x, y] = data.spos;
            if !data.is_valid() || !band.contains_row(y) {
                continue;
            }
            let frag = Fragment { data, duv_dx, duv_dy };
            let color = pipeline.fragment_shader(ctx, uniforms, &frag);
            if band.write_fragment(x, y, data.depth(), color, depth_test, depth_write) {
                written += 1;
            }
        }
    }
    written
}

fn draw_mesh(
    mesh: &DrawableMesh,
    target: &mut FrameBuffer,
    ctx: &ShadingContext,
    pipeline: &dyn ShadingPipeline,
    frame: &FrameParams,
) -> RenderStats {
    let mut stats = RenderStats {
        meshes_drawn: 1,
        faces_submitted: mesh.faces().len() as u32,
        ..RenderStats::default()
    };

    let state = mesh.config().shading_state();
    let model = mat4_mul(&frame.model, mesh.model_matrix());
    let uniforms = Uniforms::new(model, &frame.view, &frame.project, *mesh.material(), state.lighting_enabled());

    // === GEOMETRY ===
    let geometry_start = Instant::now();
    let faces = mesh.faces();
    let attribs = mesh.vertex_attrib();
    let rasterized = parallel_for(faces.len(), frame.threads, |i| {
        process_face(pipeline, &uniforms, &state, attribs, &faces[i], frame)
    });
    stats.geometry_ms = geometry_start.elapsed().as_secs_f32() * 1000.0;

    for face in &rasterized {
        stats.triangles_clipped += face.triangles;
        stats.triangles_culled += face.culled;
        stats.quads_rasterized += face.quads.len() as u32;
    }

    // === FRAGMENTS ===
    let fragment_start = Instant::now();
    let rows = frame.height.div_ceil(frame.threads.max(1));
    let written = parallel_each(target.bands_mut(rows), |mut band| {
        shade_band(&mut band, ctx, pipeline, &uniforms, &state, &rasterized)
    });
    stats.fragments_written = written.iter().sum();
    stats.fragment_ms = fragment_start.elapsed().as_secs_f32() * 1000.0;

    stats
}

pub struct Renderer {
    back: FrameBuffer,
    front: FrameBuffer,
    ctx: ShadingContext,
    pipeline: Arc<dyn ShadingPipeline>,
    model: Mat4,
    view: Mat4,
    project: Mat4,
    viewport: Mat4,
    near: f32,
    far: f32,
    threads: usize,
    meshes: Vec<DrawableMesh>,
    stats: RenderStats,
}

impl Renderer {
    /// Create a renderer with a `width` x `height` color + depth target
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let back = FrameBuffer::new(width, height)?;
        let front = FrameBuffer::new(width, height)?;
        let threads = resolve_threads(0);
        log::info!("renderer created: {}x{}, {} threads", width, height, threads);
        Ok(Self {
            back,
            front,
            ctx: ShadingContext::new(),
            pipeline: Arc::new(BlinnPhongShadingPipeline),
            model: mat4_identity(),
            view: mat4_identity(),
            project: mat4_identity(),
            viewport: mat4_viewport(width, height),
            near: 0.0,
            far: 1.0,
            threads,
            meshes: Vec::new(),
            stats: RenderStats::default(),
        })
    }

    pub fn from_config(config: &RendererConfig) -> Result<Self> {
        config.validate()?;
        let mut renderer = Self::new(config.width, config.height)?;
        renderer.set_threads(config.threads);
        renderer.clear_color_and_depth(config.clear_color_vec(), config.clear_depth);
        Ok(renderer)
    }

    pub fn width(&self) -> usize {
        self.back.width()
    }

    pub fn height(&self) -> usize {
        self.back.height()
    }

    /// Worker count; 0 = one per available core
    pub fn set_threads(&mut self, threads: usize) {
        self.threads = resolve_threads(threads);
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    // Transforms

    pub fn set_view_matrix(&mut self, m: Mat4) {
        self.view = m;
    }

    /// Global model matrix, applied on top of each mesh's own
    pub fn set_model_matrix(&mut self, m: Mat4) {
        self.model = m;
    }

    /// Projection matrix and the view-space depth range it was built for
    pub fn set_project_matrix(&mut self, m: Mat4, near: f32, far: f32) {
        self.project = m;
        self.near = near;
        self.far = far;
        if !self.depth_range_consistent() {
            log::warn!(
                "projection does not map near {} / far {} to depth 0 / 1; depth test may misorder",
                near,
                far
            );
        }
    }

    /// True when the projection sends `z = -near` to depth 0 and `z = -far` to
    /// depth 1 with `0 < near < far`
    pub fn depth_range_consistent(&self) -> bool {
        if !(self.near > 0.0 && self.far > self.near) {
            return false;
        }
        let depth_at = |z: f32| {
            let c = mat4_transform(&self.project, Vec4::new(0.0, 0.0, -z, 1.0));
            (c.w > 0.0).then(|| c.z / c.w)
        };
        match (depth_at(self.near), depth_at(self.far)) {
            (Some(n), Some(f)) => n.abs() < 1e-3 && (f - 1.0).abs() < 1e-3,
            _ => false,
        }
    }

    pub fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    pub fn project_matrix(&self) -> &Mat4 {
        &self.project
    }

    pub fn near_far(&self) -> (f32, f32) {
        (self.near, self.far)
    }

    // Shading

    pub fn set_shader_pipeline(&mut self, pipeline: Arc<dyn ShadingPipeline>) {
        log::debug!("shader pipeline set to {}", pipeline.name());
        self.pipeline = pipeline;
    }

    pub fn shader_pipeline(&self) -> &dyn ShadingPipeline {
        self.pipeline.as_ref()
    }

    pub fn set_viewer_pos(&mut self, pos: Vec3) {
        self.ctx.viewer_pos = pos;
    }

    pub fn add_point_light(&mut self, pos: Vec3, atten: Vec3, color: Vec3) -> usize {
        self.ctx.add_point_light(PointLight::new(pos, atten, color))
    }

    pub fn point_light(&self, index: usize) -> Option<&PointLight> {
        self.ctx.point_light(index)
    }

    pub fn point_light_mut(&mut self, index: usize) -> Option<&mut PointLight> {
        self.ctx.point_light_mut(index)
    }

    pub fn upload_texture(&mut self, texture: Texture2D) -> TextureId {
        self.ctx.upload_texture(texture)
    }

    /// Replace the texture registry, e.g. with one shared by another renderer
    pub fn set_texture_registry(&mut self, textures: TextureUnits) {
        self.ctx.textures = textures;
    }

    pub fn texture_registry(&self) -> &TextureUnits {
        &self.ctx.textures
    }

    pub fn shading_context(&self) -> &ShadingContext {
        &self.ctx
    }

    // Back buffer

    pub fn clear_color(&mut self, color: Vec4) {
        self.back.clear_color(color);
    }

    pub fn clear_depth(&mut self, depth: f32) {
        self.back.clear_depth(depth);
    }

    pub fn clear_color_and_depth(&mut self, color: Vec4, depth: f32) {
        self.back.clear_color_and_depth(color, depth);
    }

    pub fn back_buffer(&self) -> &FrameBuffer {
        &self.back
    }

    pub fn front_buffer(&self) -> &FrameBuffer {
        &self.front
    }

    // Meshes

    pub fn add_drawable_mesh(&mut self, mesh: DrawableMesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_drawable_meshes(&mut self, meshes: impl IntoIterator<Item = DrawableMesh>) {
        self.meshes.extend(meshes);
    }

    pub fn unload_drawable_meshes(&mut self) {
        self.meshes.clear();
    }

    pub fn drawable_meshes(&self) -> &[DrawableMesh] {
        &self.meshes
    }

    pub fn drawable_mesh_mut(&mut self, index: usize) -> Option<&mut DrawableMesh> {
        self.meshes.get_mut(index)
    }

    fn frame_params(&self) -> FrameParams {
        FrameParams {
            model: self.model,
            view: self.view,
            project: self.project,
            viewport: self.viewport,
            width: self.back.width(),
            height: self.back.height(),
            threads: self.threads,
        }
    }

    // Drawing

    /// Draw every mesh in insertion order. Returns the number of fragments
    /// written.
    pub fn render_all_drawable_meshes(&mut self) -> u32 {
        let frame = self.frame_params();
        let mut stats = RenderStats::default();
        for mesh in &self.meshes {
            let s = draw_mesh(mesh, &mut self.back, &self.ctx, self.pipeline.as_ref(), &frame);
            stats.accumulate(&s);
        }
        log::debug!(
            "drew {} meshes: {} faces, {} triangles ({} culled), {} fragments in {:.2}+{:.2} ms",
            stats.meshes_drawn,
            stats.faces_submitted,
            stats.triangles_clipped,
            stats.triangles_culled,
            stats.fragments_written,
            stats.geometry_ms,
            stats.fragment_ms
        );
        self.stats = stats;
        stats.fragments_written
    }

    /// Draw one mesh. An out-of-range index draws nothing and returns 0.
    pub fn render_drawable_mesh(&mut self, index: usize) -> u32 {
        let Some(mesh) = self.meshes.get(index) else {
            log::warn!("render_drawable_mesh: no mesh at index {} ({} loaded)", index, self.meshes.len());
            self.stats = RenderStats::default();
            return 0;
        };
        let frame = self.frame_params();
        self.stats = draw_mesh(mesh, &mut self.back, &self.ctx, self.pipeline.as_ref(), &frame);
        self.stats.fragments_written
    }

    /// Swap back and front buffers and return the front color bytes
    /// (RGBA8, row 0 at the top).
    pub fn commit_rendered_color_buffer(&mut self) -> &[u8] {
        std::mem::swap(&mut self.back, &mut self.front);
        self.front.color_bytes()
    }

    pub fn last_stats(&self) -> &RenderStats {
        &self.stats
    }
}

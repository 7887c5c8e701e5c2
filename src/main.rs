//! tiny-raster viewer
//!
//! Renders a lit, textured, rotating cube over a floor and presents the
//! committed color buffer in a macroquad window, or writes a single frame to
//! a PNG with `--headless=out.png`.
//!
//! Flags: `--config=renderer.ron --width=N --height=N --threads=N
//! --pipeline=blinn-phong|phong|texture|do-nothing --headless=out.png`

use std::path::PathBuf;
use std::sync::Arc;

use macroquad::prelude as mq;
use tiny_raster::math::{mat4_look_at, mat4_perspective, mat4_rotation, mat4_translation};
use tiny_raster::{
    BlinnPhongShadingPipeline, DoNothingShadingPipeline, DrawableMesh, PhongShadingPipeline, RasterError, Renderer,
    RendererConfig, ShadingPipeline, Texture2D, TextureFilterMode, TextureShadingPipeline, TextureWarpMode, Vec3,
    Vec4,
};

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    width: Option<usize>,
    height: Option<usize>,
    threads: Option<usize>,
    pipeline: Option<String>,
    headless: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    for arg in std::env::args().skip(1) {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(format!("expected --flag=value, got '{}'", arg));
        };
        let number = |v: &str| v.parse::<usize>().map_err(|_| format!("{} expects a number, got '{}'", key, v));
        match key {
            "--config" => args.config = Some(PathBuf::from(value)),
            "--width" => args.width = Some(number(value)?),
            "--height" => args.height = Some(number(value)?),
            "--threads" => args.threads = Some(number(value)?),
            "--pipeline" => args.pipeline = Some(value.to_string()),
            "--headless" => args.headless = Some(PathBuf::from(value)),
            _ => return Err(format!("unknown flag '{}'", key)),
        }
    }
    Ok(args)
}

fn pipeline_by_name(name: &str) -> Option<Arc<dyn ShadingPipeline>> {
    match name {
        "blinn-phong" => Some(Arc::new(BlinnPhongShadingPipeline)),
        "phong" => Some(Arc::new(PhongShadingPipeline)),
        "texture" => Some(Arc::new(TextureShadingPipeline)),
        "do-nothing" => Some(Arc::new(DoNothingShadingPipeline)),
        _ => None,
    }
}

const EYE: Vec3 = Vec3::new(0.0, 1.5, 4.0);

fn build_scene(renderer: &mut Renderer) -> Result<(), RasterError> {
    let aspect = renderer.width() as f32 / renderer.height() as f32;
    renderer.set_view_matrix(mat4_look_at(EYE, Vec3::ZERO, Vec3::UP));
    renderer.set_project_matrix(mat4_perspective(60.0, aspect, 0.1, 100.0), 0.1, 100.0);
    renderer.set_viewer_pos(EYE);

    renderer.add_point_light(Vec3::new(2.0, 3.0, 2.0), Vec3::new(1.0, 0.05, 0.01), Vec3::new(1.0, 0.9, 0.8));
    renderer.add_point_light(Vec3::new(-3.0, 2.0, -1.0), Vec3::new(1.0, 0.1, 0.02), Vec3::new(0.3, 0.4, 1.0));

    let mut checker = Texture2D::checkerboard(256, 8, Vec4::new(0.9, 0.9, 0.85, 1.0), Vec4::new(0.25, 0.3, 0.35, 1.0))?
        .with_modes(TextureWarpMode::Repeat, TextureFilterMode::Linear);
    checker.generate_mipmap();
    let checker = renderer.upload_texture(checker);

    let mut cube = DrawableMesh::cube(0.75);
    cube.set_diffuse_map(Some(checker));
    cube.set_ambient_coff(Vec3::splat(0.1));
    cube.set_specular_coff(Vec3::splat(0.6));
    cube.set_specular_exponent(32.0);

    let mut floor = DrawableMesh::plane(4.0, 4.0, 4.0);
    floor.set_model_matrix(mat4_translation(Vec3::new(0.0, -1.0, 0.0)));
    floor.set_diffuse_map(Some(checker));
    floor.set_ambient_coff(Vec3::splat(0.1));

    renderer.add_drawable_meshes([cube, floor]);
    Ok(())
}

/// Spin the cube (mesh 0); `t` in seconds
fn animate(renderer: &mut Renderer, t: f32) {
    if let Some(cube) = renderer.drawable_mesh_mut(0) {
        cube.set_model_matrix(mat4_rotation(Vec3::new(t * 20.0, t * 45.0, 0.0)));
    }
}

fn setup() -> Result<(Renderer, RendererConfig, Option<PathBuf>), RasterError> {
    let args = parse_args().map_err(RasterError::InvalidArgument)?;

    let mut config = match &args.config {
        Some(path) => RendererConfig::load(path)?,
        None => RendererConfig::default(),
    };
    config.width = args.width.unwrap_or(config.width);
    config.height = args.height.unwrap_or(config.height);
    config.threads = args.threads.unwrap_or(config.threads);

    let mut renderer = Renderer::from_config(&config)?;
    if let Some(name) = &args.pipeline {
        match pipeline_by_name(name) {
            Some(p) => renderer.set_shader_pipeline(p),
            None => log::warn!("unknown pipeline '{}', keeping {}", name, renderer.shader_pipeline().name()),
        }
    }
    build_scene(&mut renderer)?;
    Ok((renderer, config, args.headless))
}

fn render_headless(mut renderer: Renderer, config: &RendererConfig, path: PathBuf) -> Result<(), RasterError> {
    animate(&mut renderer, 1.0);
    renderer.clear_color_and_depth(config.clear_color_vec(), config.clear_depth);
    let fragments = renderer.render_all_drawable_meshes();
    renderer.commit_rendered_color_buffer();
    renderer.front_buffer().save_png(&path)?;
    log::info!("wrote {} ({} fragments)", path.display(), fragments);
    Ok(())
}

async fn run_window(mut renderer: Renderer, config: RendererConfig) {
    let (w, h) = (renderer.width(), renderer.height());
    loop {
        if mq::is_key_pressed(mq::KeyCode::Escape) {
            break;
        }

        animate(&mut renderer, mq::get_time() as f32);
        renderer.clear_color_and_depth(config.clear_color_vec(), config.clear_depth);
        renderer.render_all_drawable_meshes();
        let stats = *renderer.last_stats();

        let texture = mq::Texture2D::from_rgba8(w as u16, h as u16, renderer.commit_rendered_color_buffer());
        texture.set_filter(mq::FilterMode::Nearest);

        mq::clear_background(mq::BLACK);
        mq::draw_texture_ex(
            &texture,
            0.0,
            0.0,
            mq::WHITE,
            mq::DrawTextureParams {
                dest_size: Some(mq::vec2(mq::screen_width(), mq::screen_height())),
                ..Default::default()
            },
        );
        let overlay = format!(
            "{} fps | {} tris | {} frags | geo {:.1} ms | frag {:.1} ms",
            mq::get_fps(),
            stats.triangles_clipped - stats.triangles_culled,
            stats.fragments_written,
            stats.geometry_ms,
            stats.fragment_ms
        );
        mq::draw_text(&overlay, 10.0, 20.0, 20.0, mq::WHITE);

        mq::next_frame().await;
    }
}

fn main() {
    env_logger::init();

    let (renderer, config, headless) = match setup() {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = headless {
        if let Err(e) = render_headless(renderer, &config, path) {
            log::error!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    let conf = mq::Conf {
        window_title: format!("tiny-raster v{}", VERSION),
        window_width: config.width as i32,
        window_height: config.height as i32,
        window_resizable: true,
        ..Default::default()
    };
    macroquad::Window::from_config(conf, run_window(renderer, config));
}

//! 2D textures with wrap/filter modes and optional mip chains
//!
//! Texels are stored top row first, as images are decoded. Texture
//! coordinates follow the GL convention: `(0, 0)` is the bottom-left corner.

use crate::error::{RasterError, Result};
use crate::math::{Vec2, Vec4};
use crate::state::{TextureFilterMode, TextureWarpMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One level of a mip chain
#[derive(Debug, Clone)]
struct MipLevel {
    width: usize,
    height: usize,
    pixels: Vec<Vec4>,
}

impl MipLevel {
    #[inline]
    fn texel(&self, x: usize, y: usize) -> Vec4 {
        self.pixels[y * self.width + x]
    }

    /// Box-filter down to half size (at least 1x1)
    fn downsample(&self) -> MipLevel {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            let y0 = (y * 2).min(self.height - 1);
            let y1 = (y * 2 + 1).min(self.height - 1);
            for x in 0..width {
                let x0 = (x * 2).min(self.width - 1);
                let x1 = (x * 2 + 1).min(self.width - 1);
                let sum = self.texel(x0, y0) + self.texel(x1, y0) + self.texel(x0, y1) + self.texel(x1, y1);
                pixels.push(sum * 0.25);
            }
        }
        MipLevel { width, height, pixels }
    }
}

/// Texel coordinate of `f`, bounded so that neighbour offsets cannot overflow.
/// NaN maps to 0.
#[inline]
fn texel_coord(f: f32) -> i64 {
    const LIMIT: f32 = (1u64 << 40) as f32;
    f.floor().clamp(-LIMIT, LIMIT) as i64
}

/// Fractional part of `f`; 0 when `f` is not finite
#[inline]
fn texel_fract(f: f32) -> f32 {
    let t = f - f.floor();
    if t.is_finite() {
        t
    } else {
        0.0
    }
}

/// Fold an integer texel coordinate into `0..size`
#[inline]
fn warp_index(i: i64, size: usize, mode: TextureWarpMode) -> usize {
    let n = size as i64;
    let folded = match mode {
        TextureWarpMode::Repeat => i.rem_euclid(n),
        TextureWarpMode::ClampToEdge => i.clamp(0, n - 1),
        TextureWarpMode::MirroredRepeat => {
            let m = i.rem_euclid(2 * n);
            if m >= n {
                2 * n - 1 - m
            } else {
                m
            }
        }
    };
    folded as usize
}

/// RGBA float texture
#[derive(Debug, Clone)]
pub struct Texture2D {
    pub name: String,
    pub warp_mode: TextureWarpMode,
    pub filter_mode: TextureFilterMode,
    levels: Vec<MipLevel>,
}

impl Texture2D {
    /// Build from `[0,1]` RGBA texels, top row first
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Vec4>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::TextureData(format!("empty texture {}x{}", width, height)));
        }
        if pixels.len() != width * height {
            return Err(RasterError::TextureData(format!(
                "expected {} texels for {}x{}, got {}",
                width * height,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            name: String::new(),
            warp_mode: TextureWarpMode::default(),
            filter_mode: TextureFilterMode::default(),
            levels: vec![MipLevel { width, height, pixels }],
        })
    }

    /// Build from tightly packed RGBA8 bytes, top row first
    pub fn from_rgba8(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != width * height * 4 {
            return Err(RasterError::TextureData(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                width * height * 4,
                width,
                height,
                bytes.len()
            )));
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| Vec4::from_rgba8([p[0], p[1], p[2], p[3]]))
            .collect();
        Self::from_pixels(width, height, pixels)
    }

    /// Load a texture from an image file (PNG, JPEG or BMP)
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut texture = Self::from_rgba8(width as usize, height as usize, rgba.as_raw())?;
        texture.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        log::info!("Loaded texture {} ({}x{})", texture.name, width, height);
        Ok(texture)
    }

    /// Two-color checkerboard, `cells` squares per side
    pub fn checkerboard(size: usize, cells: usize, a: Vec4, b: Vec4) -> Result<Self> {
        let cell = (size / cells.max(1)).max(1);
        let pixels = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if ((x / cell) + (y / cell)) % 2 == 0 {
                    a
                } else {
                    b
                }
            })
            .collect();
        let mut texture = Self::from_pixels(size, size, pixels)?;
        texture.name = "checkerboard".to_string();
        Ok(texture)
    }

    pub fn with_modes(mut self, warp_mode: TextureWarpMode, filter_mode: TextureFilterMode) -> Self {
        self.warp_mode = warp_mode;
        self.filter_mode = filter_mode;
        self
    }

    pub fn width(&self) -> usize {
        self.levels[0].width
    }

    pub fn height(&self) -> usize {
        self.levels[0].height
    }

    /// Number of levels including the base image
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level_size(&self, level: usize) -> Option<(usize, usize)> {
        self.levels.get(level).map(|l| (l.width, l.height))
    }

    pub fn is_generated_mipmap(&self) -> bool {
        self.levels.len() > 1
    }

    /// Build the full mip chain down to 1x1. Rebuilds from the base level.
    pub fn generate_mipmap(&mut self) {
        self.levels.truncate(1);
        loop {
            let last = &self.levels[self.levels.len() - 1];
            if last.width == 1 && last.height == 1 {
                break;
            }
            let next = last.downsample();
            self.levels.push(next);
        }
    }

    /// Level of detail for the given UV derivatives:
    /// `max(0, 0.5 * log2(max(|dfdx|^2, |dfdy|^2)))` with derivatives in texels.
    pub fn lod(&self, duv_dx: Vec2, duv_dy: Vec2) -> f32 {
        let size = Vec2::new(self.width() as f32, self.height() as f32);
        let dfdx = duv_dx.mul_elem(size);
        let dfdy = duv_dy.mul_elem(size);
        let l = dfdx.dot(dfdx).max(dfdy.dot(dfdy));
        if l.is_nan() || l <= 0.0 {
            return 0.0;
        }
        (0.5 * l.log2()).max(0.0)
    }

    /// Sample the base level
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        self.sample_level(0, uv)
    }

    /// Sample at a fractional level of detail. Linear filtering blends the two
    /// nearest levels, nearest filtering picks the closest one.
    pub fn sample_lod(&self, uv: Vec2, lod: f32) -> Vec4 {
        let max_level = (self.levels.len() - 1) as f32;
        let lod = lod.clamp(0.0, max_level);
        match self.filter_mode {
            TextureFilterMode::Nearest => self.sample_level(lod.round() as usize, uv),
            TextureFilterMode::Linear => {
                let l0 = lod.floor();
                let t = lod - l0;
                let a = self.sample_level(l0 as usize, uv);
                if t <= 0.0 {
                    return a;
                }
                let b = self.sample_level((l0 as usize + 1).min(max_level as usize), uv);
                a * (1.0 - t) + b * t
            }
        }
    }

    fn sample_level(&self, level: usize, uv: Vec2) -> Vec4 {
        let Some(mip) = self.levels.get(level) else {
            return Vec4::ZERO;
        };
        let fx = uv.x * mip.width as f32;
        let fy = (1.0 - uv.y) * mip.height as f32;
        match self.filter_mode {
            TextureFilterMode::Nearest => {
                let x = warp_index(texel_coord(fx), mip.width, self.warp_mode);
                let y = warp_index(texel_coord(fy), mip.height, self.warp_mode);
                mip.texel(x, y)
            }
            TextureFilterMode::Linear => {
                let fx = fx - 0.5;
                let fy = fy - 0.5;
                let tx = texel_fract(fx);
                let ty = texel_fract(fy);
                let (x0, y0) = (texel_coord(fx), texel_coord(fy));
                let x0i = warp_index(x0, mip.width, self.warp_mode);
                let x1i = warp_index(x0 + 1, mip.width, self.warp_mode);
                let y0i = warp_index(y0, mip.height, self.warp_mode);
                let y1i = warp_index(y0 + 1, mip.height, self.warp_mode);
                let top = mip.texel(x0i, y0i) * (1.0 - tx) + mip.texel(x1i, y0i) * tx;
                let bottom = mip.texel(x0i, y1i) * (1.0 - tx) + mip.texel(x1i, y1i) * tx;
                top * (1.0 - ty) + bottom * ty
            }
        }
    }
}

/// Handle into a [`TextureUnits`] registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub usize);

/// Append-only texture registry. Ids stay valid for the registry's lifetime;
/// clones share the texture data.
#[derive(Debug, Clone, Default)]
pub struct TextureUnits {
    units: Vec<Arc<Texture2D>>,
}

impl TextureUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(&mut self, texture: Texture2D) -> TextureId {
        self.units.push(Arc::new(texture));
        TextureId(self.units.len() - 1)
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture2D> {
        self.units.get(id.0).map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
    const BLUE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

    fn two_by_one() -> Texture2D {
        Texture2D::from_pixels(2, 1, vec![RED, BLUE]).unwrap()
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(Texture2D::from_pixels(0, 4, vec![]).is_err());
        assert!(Texture2D::from_pixels(2, 2, vec![RED; 3]).is_err());
        assert!(Texture2D::from_rgba8(1, 1, &[0, 0, 0]).is_err());
    }

    #[test]
    fn test_nearest_sample() {
        let tex = two_by_one();
        assert_eq!(tex.sample(Vec2::new(0.25, 0.5)), RED);
        assert_eq!(tex.sample(Vec2::new(0.75, 0.5)), BLUE);
    }

    #[test]
    fn test_v_origin_is_bottom() {
        let tex = Texture2D::from_pixels(1, 2, vec![RED, BLUE]).unwrap();
        // Top texel row is v near 1
        assert_eq!(tex.sample(Vec2::new(0.5, 0.9)), RED);
        assert_eq!(tex.sample(Vec2::new(0.5, 0.1)), BLUE);
    }

    #[test]
    fn test_warp_modes() {
        let repeat = two_by_one();
        assert_eq!(repeat.sample(Vec2::new(1.25, 0.5)), RED);

        let clamp = two_by_one().with_modes(TextureWarpMode::ClampToEdge, TextureFilterMode::Nearest);
        assert_eq!(clamp.sample(Vec2::new(1.25, 0.5)), BLUE);
        assert_eq!(clamp.sample(Vec2::new(-3.0, 0.5)), RED);

        let mirror = two_by_one().with_modes(TextureWarpMode::MirroredRepeat, TextureFilterMode::Nearest);
        // Second period is flipped
        assert_eq!(mirror.sample(Vec2::new(1.25, 0.5)), BLUE);
        assert_eq!(mirror.sample(Vec2::new(1.75, 0.5)), RED);
    }

    #[test]
    fn test_huge_and_nan_coords_stay_in_range() {
        for filter in [TextureFilterMode::Nearest, TextureFilterMode::Linear] {
            let clamp = two_by_one().with_modes(TextureWarpMode::ClampToEdge, filter);
            assert_eq!(clamp.sample(Vec2::new(1e30, 0.5)), BLUE);
            assert_eq!(clamp.sample(Vec2::new(-1e30, 0.5)), RED);

            for warp in [TextureWarpMode::Repeat, TextureWarpMode::MirroredRepeat] {
                let tex = two_by_one().with_modes(warp, filter);
                for uv in [Vec2::new(1e30, -1e30), Vec2::new(f32::MAX, f32::MIN), Vec2::new(f32::NAN, 0.5)] {
                    let c = tex.sample(uv);
                    assert!((c.x + c.z - 1.0).abs() < 1e-5, "{:?} at {:?}", c, uv);
                    assert_eq!(c.w, 1.0);
                }
            }
        }
    }

    #[test]
    fn test_linear_blends_between_texels() {
        let tex = two_by_one().with_modes(TextureWarpMode::ClampToEdge, TextureFilterMode::Linear);
        let mid = tex.sample(Vec2::new(0.5, 0.5));
        assert!((mid.x - 0.5).abs() < 1e-5);
        assert!((mid.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_mip_chain_sizes() {
        let mut tex = Texture2D::checkerboard(16, 4, RED, BLUE).unwrap();
        assert!(!tex.is_generated_mipmap());
        tex.generate_mipmap();
        assert!(tex.is_generated_mipmap());
        assert_eq!(tex.level_count(), 5);
        assert_eq!(tex.level_size(4), Some((1, 1)));

        let mut wide = Texture2D::from_pixels(8, 2, vec![RED; 16]).unwrap();
        wide.generate_mipmap();
        assert_eq!(wide.level_size(1), Some((4, 1)));
        assert_eq!(wide.level_size(3), Some((1, 1)));
    }

    #[test]
    fn test_smallest_mip_is_average() {
        let mut tex = Texture2D::checkerboard(8, 2, RED, BLUE).unwrap();
        tex.generate_mipmap();
        let avg = tex.sample_lod(Vec2::new(0.3, 0.3), 10.0);
        assert!((avg.x - 0.5).abs() < 1e-5);
        assert!((avg.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_lod_monotonic_in_derivative_magnitude() {
        let tex = Texture2D::checkerboard(256, 8, RED, BLUE).unwrap();
        let mut last = 0.0;
        for step in 0..64 {
            let d = step as f32 * 0.002;
            let lod = tex.lod(Vec2::new(d, d * 0.3), Vec2::new(0.0, d * 0.5));
            assert!(lod >= last, "lod decreased at step {}", step);
            last = lod;
        }
        assert_eq!(tex.lod(Vec2::ZERO, Vec2::ZERO), 0.0);
        // One texel per pixel is level 0, two texels per pixel is level 1
        assert!((tex.lod(Vec2::new(2.0 / 256.0, 0.0), Vec2::ZERO) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_registry_out_of_range() {
        let mut units = TextureUnits::new();
        assert!(units.get(TextureId(0)).is_none());
        let id = units.upload(two_by_one());
        assert_eq!(id, TextureId(0));
        assert!(units.get(id).is_some());
        assert!(units.get(TextureId(1)).is_none());
        assert_eq!(units.len(), 1);
    }
}

//! Color + depth frame buffer
//!
//! Color is RGBA8, row-major, row 0 at the top of the image.

use crate::error::{check_dimensions, Result};
use crate::math::Vec4;

/// Framebuffer for software rendering
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pixels: Vec<u8>,   // RGBA, 4 bytes per pixel
    zbuffer: Vec<f32>, // Depth buffer
    width: usize,
    height: usize,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            pixels: vec![0; width * height * 4],
            zbuffer: vec![1.0; width * height],
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear_color(&mut self, color: Vec4) {
        let bytes = color.to_rgba8();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
    }

    pub fn clear_depth(&mut self, depth: f32) {
        self.zbuffer.fill(depth);
    }

    pub fn clear_color_and_depth(&mut self, color: Vec4, depth: f32) {
        self.clear_color(color);
        self.clear_depth(depth);
    }

    /// Raw RGBA bytes
    pub fn color_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn depth_values(&self) -> &[f32] {
        &self.zbuffer
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    pub fn depth(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.zbuffer[y * self.width + x])
    }

    /// Split into disjoint bands of `rows` rows each (the last may be shorter).
    /// Each band can be written from its own thread.
    pub fn bands_mut(&mut self, rows: usize) -> Vec<FrameBand<'_>> {
        let rows = rows.max(1);
        let width = self.width;
        self.pixels
            .chunks_mut(rows * width * 4)
            .zip(self.zbuffer.chunks_mut(rows * width))
            .enumerate()
            .map(|(i, (color, depth))| FrameBand {
                y0: i * rows,
                rows: depth.len() / width,
                width,
                color,
                depth,
            })
            .collect()
    }

    /// Save the color buffer as a PNG
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        image::save_buffer(
            path,
            &self.pixels,
            self.width as u32,
            self.height as u32,
            image::ColorType::Rgba8,
        )?;
        Ok(())
    }
}

/// Mutable view of a horizontal strip of a [`FrameBuffer`]
#[derive(Debug)]
pub struct FrameBand<'a> {
    y0: usize,
    rows: usize,
    width: usize,
    color: &'a mut [u8],
    depth: &'a mut [f32],
}

impl FrameBand<'_> {
    /// True if raster row `y` belongs to this band
    #[inline]
    pub fn contains_row(&self, y: i32) -> bool {
        y >= 0 && (y as usize) >= self.y0 && (y as usize) < self.y0 + self.rows
    }

    pub fn first_row(&self) -> usize {
        self.y0
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || (x as usize) >= self.width || !self.contains_row(y) {
            return None;
        }
        Some((y as usize - self.y0) * self.width + x as usize)
    }

    /// Depth-tested write of one fragment. Returns true when the color was
    /// written. The test is strict less-than, so the earlier of two equal
    /// depths stays.
    #[inline]
    pub fn write_fragment(&mut self, x: i32, y: i32, depth: f32, color: Vec4, depth_test: bool, depth_write: bool) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        if depth_test && !(depth < self.depth[i]) {
            return false;
        }
        if depth_write {
            self.depth[i] = depth;
        }
        self.color[i * 4..i * 4 + 4].copy_from_slice(&color.to_rgba8());
        true
    }
}

//! Error type for the rasterizer

use thiserror::Error;

/// Largest accepted frame buffer side. Keeps raster coordinates and buffer
/// allocations in a sane range.
pub const MAX_DIMENSION: usize = 16384;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid dimensions {width}x{height} (each side must be 1..={max})", max = MAX_DIMENSION)]
    InvalidDimensions { width: usize, height: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("texture data error: {0}")]
    TextureData(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] ron::Error),
}

pub type Result<T> = std::result::Result<T, RasterError>;

/// Reject zero-sized or oversized buffers before anything is allocated.
pub fn check_dimensions(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RasterError::InvalidDimensions { width, height });
    }
    Ok(())
}

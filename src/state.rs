//! Per-draw render state and light sources

use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// How texture coordinates outside `[0, 1]` are folded back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextureWarpMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextureFilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Filled triangles or edges only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolygonMode {
    Wire,
    #[default]
    Fill,
}

/// Which winding gets discarded. Front faces are counter-clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CullFaceMode {
    Disable,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepthTestMode {
    Disable,
    #[default]
    Enable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepthWriteMode {
    Disable,
    #[default]
    Enable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LightingMode {
    Disable,
    #[default]
    Enable,
}

/// Fixed-function state applied to one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShadingState {
    pub cull_face_mode: CullFaceMode,
    pub depth_test_mode: DepthTestMode,
    pub depth_write_mode: DepthWriteMode,
    pub polygon_mode: PolygonMode,
    pub lighting_mode: LightingMode,
}

impl ShadingState {
    pub fn depth_test_enabled(&self) -> bool {
        self.depth_test_mode == DepthTestMode::Enable
    }

    pub fn depth_write_enabled(&self) -> bool {
        self.depth_write_mode == DepthWriteMode::Enable
    }

    pub fn lighting_enabled(&self) -> bool {
        self.lighting_mode == LightingMode::Enable
    }
}

/// Point light in world space.
///
/// `attenuation` holds the constant, linear and quadratic terms of
/// `1 / (c + l*d + q*d^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub attenuation: Vec3,
    pub color: Vec3,
}

impl PointLight {
    pub fn new(position: Vec3, attenuation: Vec3, color: Vec3) -> Self {
        Self { position, attenuation, color }
    }

    /// Light falloff at distance `d`. Never divides by zero.
    pub fn falloff(&self, d: f32) -> f32 {
        let a = self.attenuation;
        let denom = a.x + a.y * d + a.z * d * d;
        if denom <= f32::EPSILON {
            1.0
        } else {
            1.0 / denom
        }
    }
}

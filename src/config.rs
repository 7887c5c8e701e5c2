//! Renderer configuration, stored as RON

use crate::error::{check_dimensions, Result};
use crate::math::Vec4;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub width: usize,
    pub height: usize,
    /// Worker threads; 0 = one per available core
    pub threads: usize,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            threads: 0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
        }
    }
}

impl RendererConfig {
    pub fn clear_color_vec(&self) -> Vec4 {
        let [r, g, b, a] = self.clear_color;
        Vec4::new(r, g, b, a)
    }

    pub fn validate(&self) -> Result<()> {
        check_dimensions(self.width, self.height)
    }

    /// Parse from a RON string. Missing fields take their defaults.
    pub fn from_ron_str(s: &str) -> Result<Self> {
        let config: RendererConfig = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .indentor("  ".to_string());
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RasterError;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("renderer.ron");
        let config = RendererConfig {
            width: 320,
            height: 200,
            threads: 3,
            clear_color: [0.1, 0.2, 0.3, 1.0],
            clear_depth: 0.5,
        };
        config.save(&path).unwrap();
        assert_eq!(RendererConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = RendererConfig::from_ron_str("(width: 100, height: 50)").unwrap();
        assert_eq!((config.width, config.height), (100, 50));
        assert_eq!(config.threads, 0);
        assert_eq!(config.clear_depth, 1.0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            RendererConfig::from_ron_str("(width: 0)"),
            Err(RasterError::InvalidDimensions { .. })
        ));
        assert!(matches!(RendererConfig::from_ron_str("(width: "), Err(RasterError::ConfigParse(_))));
        assert!(matches!(RendererConfig::load("/nonexistent/renderer.ron"), Err(RasterError::Io(_))));
    }
}

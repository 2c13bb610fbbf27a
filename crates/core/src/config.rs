//! Runtime configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock 800x600 window with the Khronos validation layer in debug builds.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::logging::DEFAULT_LOG_FILTER;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub vulkan: VulkanConfig,
    pub assets: AssetConfig,
    /// Fallback `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

/// Output surface settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

/// Instance and device settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulkanConfig {
    pub enable_validation: bool,
    pub validation_layers: Vec<String>,
}

/// Paths to the external inputs of the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Pre-compiled SPIR-V vertex stage.
    pub vertex_shader: PathBuf,
    /// Pre-compiled SPIR-V fragment stage.
    pub fragment_shader: PathBuf,
    /// RGBA texture bound at descriptor binding 1. A 1x1 white texel is used when absent.
    pub texture: Option<PathBuf>,
    /// OBJ model replacing the built-in geometry when present.
    pub model: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            vulkan: VulkanConfig::default(),
            assets: AssetConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "flightdeck".to_string(),
        }
    }
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            validation_layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            vertex_shader: PathBuf::from("shaders/spirv/shader.vert.spv"),
            fragment_shader: PathBuf::from("shaders/spirv/shader.frag.spv"),
            texture: None,
            model: None,
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Rejects values the renderer cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.vulkan.validation_layers.iter().any(|l| l.contains('\0')) {
            return Err(Error::Config(
                "validation layer names must not contain NUL".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(
            config.vulkan.validation_layers,
            vec!["VK_LAYER_KHRONOS_validation".to_string()]
        );
        assert!(config.assets.texture.is_none());
        assert!(config.assets.model.is_none());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 1024

            [assets]
            texture = "textures/chalet.jpg"
            "#,
        )
        .unwrap();
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(
            config.assets.texture,
            Some(PathBuf::from("textures/chalet.jpg"))
        );
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = Config::from_toml_str("[window]\nheight = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = Config::from_toml_str("[window\nwidth = ").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_filter = \"warn\"\n[vulkan]\nenable_validation = false").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.log_filter, "warn");
        assert!(!config.vulkan.enable_validation);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_sample_config_parses() {
        let source = include_str!("../../../flightdeck.toml");
        let config = Config::from_toml_str(source).unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(
            config.assets.vertex_shader,
            AssetConfig::default().vertex_shader
        );
        assert!(config.assets.model.is_none());
    }
}

//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Texture projection and layout output settings.
    pub render: RenderConfig,
    /// Net construction tolerances.
    pub unwrap: UnwrapConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Which assembled layout file to write after the per-face rasters.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum,
)]
pub enum OutputFormat {
    /// Only the per-face rasters.
    None,
    /// A Laidout document listing each face image and its placement.
    Laidout,
    /// An SVG with one positioned image per face and fold/cut lines.
    #[default]
    Svg,
    /// QuickTime VR panorama. Recognized but not produced.
    Qtvr,
    /// A single composited raster of the whole net.
    Image,
}

/// Texture projection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Pixel width of the first rendered face; sets the scale for all faces.
    pub max_width: u32,
    /// Sub-samples per pixel along each axis (k×k box filter).
    pub oversample: u32,
    /// Assembled layout format.
    pub output: OutputFormat,
    /// Base name for output files. `###` or `%03d` mark the face number.
    pub file_base: String,
    /// Rasterize face images. When false only the layout is written.
    pub generate_images: bool,
    /// Render faces on the rayon thread pool.
    pub parallel: bool,
}

/// Net construction configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnwrapConfig {
    /// Vertices closer than this are merged when generating meshes.
    pub collapse_epsilon: f64,
    /// Face matrices drifting further than this from rigid are re-orthonormalized.
    pub orthonormal_epsilon: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_width: 500,
            oversample: 3,
            output: OutputFormat::Svg,
            file_base: "render".to_string(),
            generate_images: true,
            parallel: true,
        }
    }
}

impl Default for UnwrapConfig {
    fn default() -> Self {
        Self {
            collapse_epsilon: 1e-6,
            orthonormal_epsilon: 1e-9,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for polyptych, falling back to `./.polyptych`.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("polyptych"))
        .unwrap_or_else(|| PathBuf::from(".polyptych"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Re-read the file: returns `Some(new_config)` if it changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::tiles::{BACKDROP_ZOOM, IntSize, LayerPolicy};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "tileview";
const MIN_TILE_SIZE: u32 = 16;
const MAX_INFLATE_TILES: u32 = 64;

/// Errors while reading or writing the settings file
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path:?} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Immutable configuration handed to the render core at construction.
///
/// Mode flags that used to be process-wide live here so every component
/// sees the same values for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Tile edge length in device pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,

    /// Live layer prefetch margin, in tiles (width, height)
    #[serde(default = "default_dynamic_inflate")]
    pub dynamic_inflate: [u32; 2],

    #[serde(default = "default_fixed_zoom")]
    pub fixed_zoom: f32,

    /// Backdrop layer prefetch margin, in tiles (width, height)
    #[serde(default = "default_fixed_zoom_inflate")]
    pub fixed_zoom_inflate: [u32; 2],

    #[serde(default = "default_true")]
    pub backdrop_layer: bool,

    /// Failed fetches in a row before a tile is reported; 0 never reports
    #[serde(default = "default_max_fetch_failures")]
    pub max_fetch_failures: u32,

    #[serde(default)]
    pub experimental_mode: bool,

    #[serde(default)]
    pub developer_mode: bool,

    #[serde(default)]
    pub read_only: bool,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_tile_size() -> u32 {
    256
}

fn default_dynamic_inflate() -> [u32; 2] {
    [2, 4]
}

fn default_fixed_zoom() -> f32 {
    BACKDROP_ZOOM
}

fn default_fixed_zoom_inflate() -> [u32; 2] {
    [1, 6]
}

fn default_max_fetch_failures() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            tile_size: default_tile_size(),
            dynamic_inflate: default_dynamic_inflate(),
            fixed_zoom: default_fixed_zoom(),
            fixed_zoom_inflate: default_fixed_zoom_inflate(),
            backdrop_layer: true,
            max_fetch_failures: default_max_fetch_failures(),
            experimental_mode: false,
            developer_mode: false,
            read_only: false,
        }
    }
}

impl Settings {
    /// Read settings from a YAML file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded settings from {path:?}");
        Ok(settings.migrated().validated())
    }

    /// Read settings, falling back to defaults when the file is missing or broken
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file {path:?} not found, using defaults");
            return Self::default();
        }

        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    /// Write settings as YAML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let content = serde_yaml::to_string(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_error)?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    #[must_use]
    pub fn tile_size(&self) -> IntSize {
        IntSize::square(self.tile_size)
    }

    /// Editing commands need experimental mode and must not be read-only
    #[must_use]
    pub fn editing_enabled(&self) -> bool {
        self.experimental_mode && !self.read_only
    }

    /// Layer policies in configuration order
    #[must_use]
    pub fn layer_policies(&self) -> Vec<LayerPolicy> {
        let [w, h] = self.dynamic_inflate;
        let mut policies = vec![LayerPolicy::Dynamic {
            inflate: IntSize::new(w, h),
        }];

        if self.backdrop_layer {
            let [w, h] = self.fixed_zoom_inflate;
            policies.push(LayerPolicy::FixedZoom {
                zoom: self.fixed_zoom,
                inflate: IntSize::new(w, h),
            });
        }
        policies
    }

    fn migrated(mut self) -> Self {
        if self.version < CURRENT_VERSION {
            info!(
                "Migrating settings from v{} to v{}",
                self.version, CURRENT_VERSION
            );
            self.version = CURRENT_VERSION;
        }
        self
    }

    fn validated(mut self) -> Self {
        if self.tile_size < MIN_TILE_SIZE {
            warn!(
                "tile_size {} too small, using {}",
                self.tile_size, MIN_TILE_SIZE
            );
            self.tile_size = MIN_TILE_SIZE;
        }
        if !self.fixed_zoom.is_finite() || self.fixed_zoom <= 0.0 {
            warn!("fixed_zoom {} invalid, using {}", self.fixed_zoom, BACKDROP_ZOOM);
            self.fixed_zoom = BACKDROP_ZOOM;
        }
        for (name, inflate) in [
            ("dynamic_inflate", &mut self.dynamic_inflate),
            ("fixed_zoom_inflate", &mut self.fixed_zoom_inflate),
        ] {
            if inflate.iter().any(|&tiles| tiles > MAX_INFLATE_TILES) {
                warn!("{name} {inflate:?} too large, capping at {MAX_INFLATE_TILES} tiles");
                *inflate = inflate.map(|tiles| tiles.min(MAX_INFLATE_TILES));
            }
        }
        self
    }
}

/// `<config dir>/tileview/config.yaml`, if a config dir exists
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

use std::path::{Path, PathBuf};

use anyhow::Context;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::overlay::LabelKind;

pub const DEFAULT_CONFIG_FILE: &str = "parkview.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// glTF or GLB file. Draco compressed meshes are skipped, so the default
    /// is a bundled uncompressed model.
    pub model_path: PathBuf,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub labels: LabelConfig,
    pub lighting: LightingConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/model/park.gltf"),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            labels: LabelConfig::default(),
            lighting: LightingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub eye: Vec3,
    pub target: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 1.0,
            far: 50000.0,
            eye: Vec3::new(40.0, 30.0, 40.0),
            target: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl ControlsConfig {
    fn validate(&self) -> anyhow::Result<()> {
        let (min, max) = (self.min_distance, self.max_distance);
        if min.is_nan() || max.is_nan() {
            anyhow::bail!("controls.min_distance and controls.max_distance must be numbers");
        }
        if min < 0.0 || min > max {
            anyhow::bail!(
                "controls.min_distance ({}) must be between 0 and controls.max_distance ({})",
                min,
                max
            );
        }
        Ok(())
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Nodes whose name contains this get a label.
    pub marker: String,
    pub offset: Vec3,
    pub class: String,
    pub kind: LabelKind,
    pub scale: f32,
    /// World units covered by one pixel of label text at scale 1.
    pub world_units_per_pixel: f32,
    /// TTF font for label text. The built-in font only covers ASCII.
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            marker: "楼顶".to_string(),
            offset: Vec3::new(0.0, 2.0, 0.0),
            class: "floorText-3d".to_string(),
            kind: LabelKind::Sprite,
            scale: 1.0,
            world_units_per_pixel: 0.1,
            font_path: None,
            font_size: 16.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    pub directional_color: Vec3,
    pub directional_intensity: f32,
    pub directional_position: Vec3,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.8,
            directional_color: Vec3::ONE,
            directional_intensity: 1.2,
            directional_position: Vec3::new(10.0, 10.0, 10.0),
        }
    }
}

/// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] when it exists.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ViewerConfig> {
    let path = match path {
        Some(path) => path,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if !default_path.exists() {
                return Ok(ViewerConfig::default());
            }
            default_path
        }
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: ViewerConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    config
        .controls
        .validate()
        .with_context(|| format!("Invalid config {}", path.display()))?;

    log::info!("Loaded config from {}", path.display());

    Ok(config)
}

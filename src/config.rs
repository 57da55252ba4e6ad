use serde::Deserialize;

use crate::error::ConfigError;

/// Which camera controller drives the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlScheme {
    /// Keyboard thrust plus drag-to-turn.
    #[default]
    Thrust,
    /// Drag-only orbit with flick inertia.
    Inertial,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub scheme: ControlScheme,
    pub enabled: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            scheme: ControlScheme::Thrust,
            enabled: true,
        }
    }
}

/// Tuning for the thrust controller. Speeds are in world units per frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThrustSettings {
    pub thrust: f32,
    pub damping: f32,
    pub max_speed: f32,
    pub snap_threshold: f32,
    /// Degrees of yaw produced by dragging across the full viewport width.
    pub degrees_per_width: f32,
    pub drag_translate_scale: f32,
}

impl Default for ThrustSettings {
    fn default() -> Self {
        Self {
            thrust: 0.01,
            damping: 0.85,
            max_speed: 0.06,
            snap_threshold: 0.007,
            degrees_per_width: 180.0,
            drag_translate_scale: 0.01,
        }
    }
}

/// Tuning for the inertial drag controller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InertialSettings {
    pub vertical_fov_deg: f32,
    pub fov_offset_deg: f32,
    pub translate_scale: f32,
    pub decay: f32,
    pub epsilon: f32,
}

impl Default for InertialSettings {
    fn default() -> Self {
        Self {
            vertical_fov_deg: 80.0,
            fov_offset_deg: 25.0,
            translate_scale: 0.008,
            decay: 0.9,
            epsilon: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [3.0, 8.0, 10.0],
            fov_y_deg: 75.0,
            z_near: 0.1,
            z_far: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Directory (native) or base URL (web) the locations are relative to.
    pub root: String,
    pub model: String,
    pub bake_texture: String,
    pub background: String,
    /// Material names that get replaced by the shared baked material.
    pub baked_materials: Vec<String>,
    /// Node names stripped from the model after loading.
    pub removed_nodes: Vec<String>,
}

impl Default for AssetSettings {
    fn default() -> Self {
        let root = if cfg!(target_arch = "wasm32") { "." } else { "assets" };
        Self {
            root: root.to_string(),
            model: "apartment.glb".to_string(),
            bake_texture: "bake.jpg".to_string(),
            background: "background.jpg".to_string(),
            baked_materials: [
                "Leather",
                "Floor",
                "Walls",
                "Closet",
                "Green Door",
                "Shiny",
                "Marble",
                "Rug",
                "Wallpaper",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            removed_nodes: vec!["sunblock".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "roomview".to_string(),
        }
    }
}

/// Complete viewer configuration. Every section is optional in TOML;
/// missing keys fall back to the defaults above.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub controls: ControlsConfig,
    pub thrust: ThrustSettings,
    pub inertial: InertialSettings,
    pub camera: CameraSettings,
    pub assets: AssetSettings,
    pub window: WindowSettings,
}

impl ViewerConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or defaults when no path is given.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let toml_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_str)
    }

    /// Config path from the first CLI argument, else `ROOMVIEW_CONFIG`.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_args_or_env() -> Result<Self, ConfigError> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("ROOMVIEW_CONFIG").ok())
            .map(std::path::PathBuf::from);
        Self::load(path.as_deref())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thrust;
        if !(t.damping > 0.0 && t.damping <= 1.0) {
            return Err(invalid("thrust.damping", format!("{} is outside (0, 1]", t.damping)));
        }
        if t.max_speed <= 0.0 {
            return Err(invalid("thrust.max_speed", format!("{} must be positive", t.max_speed)));
        }
        if t.snap_threshold < 0.0 || t.snap_threshold >= t.max_speed {
            return Err(invalid(
                "thrust.snap_threshold",
                format!("{} must be in [0, max_speed)", t.snap_threshold),
            ));
        }
        if t.degrees_per_width <= 0.0 {
            return Err(invalid("thrust.degrees_per_width", "must be positive".to_string()));
        }

        let i = &self.inertial;
        if !(i.decay > 0.0 && i.decay < 1.0) {
            return Err(invalid("inertial.decay", format!("{} is outside (0, 1)", i.decay)));
        }
        if !(i.vertical_fov_deg > 0.0 && i.vertical_fov_deg < 180.0) {
            return Err(invalid("inertial.vertical_fov_deg", "must be in (0, 180)".to_string()));
        }
        if i.epsilon < 0.0 {
            return Err(invalid("inertial.epsilon", "must not be negative".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = ViewerConfig::default();
        assert_eq!(config.controls.scheme, ControlScheme::Thrust);
        assert_eq!(config.thrust.thrust, 0.01);
        assert_eq!(config.thrust.damping, 0.85);
        assert_eq!(config.thrust.max_speed, 0.06);
        assert_eq!(config.thrust.snap_threshold, 0.007);
        assert_eq!(config.inertial.decay, 0.9);
        assert_eq!(config.inertial.epsilon, 0.001);
        assert_eq!(config.assets.baked_materials.len(), 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ViewerConfig::from_toml_str(
            r#"
            [controls]
            scheme = "inertial"

            [thrust]
            max_speed = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.controls.scheme, ControlScheme::Inertial);
        assert!(config.controls.enabled);
        assert_eq!(config.thrust.max_speed, 0.1);
        assert_eq!(config.thrust.damping, 0.85);
        assert_eq!(config.assets.model, "apartment.glb");
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(ViewerConfig::from_toml_str("").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = ViewerConfig::from_toml_str("[thrust]\ndamping = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "thrust.damping", .. }));

        let err = ViewerConfig::from_toml_str("[inertial]\ndecay = 1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "inertial.decay", .. }));
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = ViewerConfig::from_toml_str("[controls]\nscheme = \"orbit\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn missing_file_is_an_io_error() {
        let err = ViewerConfig::load(Some(std::path::Path::new("/nonexistent/roomview.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

//! Runtime configuration, passed to the app constructor as an optional JSON
//! string. Every key is optional; missing ones fall back to the defaults below.

use serde::Deserialize;

use crate::color::parse_hex_color;
use crate::error::{PackError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub layout: LayoutConfig,
    pub cell: CellConfig,
    pub camera: CameraConfig,
    pub scene: SceneConfig,
    pub fps_graph: FpsGraphConfig,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub spacing: f32,
    pub row_pitch: f32,
    /// `None` means `-row_pitch`, which puts the first cell on the origin.
    pub group_offset_y: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellShape {
    Cylinder,
    Box,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    pub shape: CellShape,
    pub radius: f32,
    pub height: f32,
    pub size: [f32; 3],
    pub segments: u32,
    pub model_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub clear_color: String,
    pub show_grid_helper: bool,
    pub grid_helper_size: f32,
    pub grid_helper_divisions: u32,
    pub grid_helper_y: f32,
    pub show_axes_helper: bool,
    pub axes_helper_size: f32,
    pub max_pixel_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FpsGraphConfig {
    pub export_interval_ms: f64,
    pub history_len: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            cell: CellConfig::default(),
            camera: CameraConfig::default(),
            scene: SceneConfig::default(),
            fps_graph: FpsGraphConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: crate::grid::DEFAULT_SPACING,
            row_pitch: crate::grid::ROW_PITCH,
            group_offset_y: None,
        }
    }
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            shape: CellShape::Cylinder,
            radius: 0.35,
            height: 1.2,
            size: [1.0, 1.0, 1.0],
            segments: 32,
            model_url: None,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [1.0, 1.0, 1.0],
            target: [0.0, 0.0, 0.0],
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clear_color: "#18142c".to_string(),
            show_grid_helper: true,
            grid_helper_size: 10.0,
            grid_helper_divisions: 10,
            grid_helper_y: -0.5,
            show_axes_helper: true,
            axes_helper_size: 5.0,
            max_pixel_ratio: 2.0,
        }
    }
}

impl Default for FpsGraphConfig {
    fn default() -> Self {
        Self {
            export_interval_ms: 100.0, // 10Hz
            history_len: 60,
        }
    }
}

impl LayoutConfig {
    pub fn group_offset_y(&self) -> f32 {
        self.group_offset_y.unwrap_or(-self.row_pitch)
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PackError::InvalidConfig(format!("{name} must be a positive number, got {value}")))
    }
}

impl PackConfig {
    /// Parses and validates a JSON document. An empty or whitespace-only
    /// string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: PackConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        positive("layout.spacing", self.layout.spacing)?;
        positive("layout.row_pitch", self.layout.row_pitch)?;
        if !self.layout.group_offset_y().is_finite() {
            return Err(PackError::InvalidConfig("layout.group_offset_y must be finite".into()));
        }

        match self.cell.shape {
            CellShape::Cylinder => {
                positive("cell.radius", self.cell.radius)?;
                positive("cell.height", self.cell.height)?;
                if self.cell.segments < 3 {
                    return Err(PackError::InvalidConfig(format!(
                        "cell.segments must be at least 3, got {}",
                        self.cell.segments
                    )));
                }
            }
            CellShape::Box => {
                for (axis, value) in ["x", "y", "z"].iter().zip(self.cell.size) {
                    positive(&format!("cell.size.{axis}"), value)?;
                }
            }
        }

        let camera = &self.camera;
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return Err(PackError::InvalidConfig(format!(
                "camera.fov_degrees must be within (0, 180), got {}",
                camera.fov_degrees
            )));
        }
        positive("camera.near", camera.near)?;
        positive("camera.far", camera.far)?;
        if camera.near >= camera.far {
            return Err(PackError::InvalidConfig("camera.near must be less than camera.far".into()));
        }
        if !(camera.damping_factor > 0.0 && camera.damping_factor <= 1.0) {
            return Err(PackError::InvalidConfig(format!(
                "camera.damping_factor must be within (0, 1], got {}",
                camera.damping_factor
            )));
        }
        positive("camera.rotate_speed", camera.rotate_speed)?;
        positive("camera.zoom_speed", camera.zoom_speed)?;
        positive("camera.pan_speed", camera.pan_speed)?;

        parse_hex_color(&self.scene.clear_color)
            .map_err(|e| PackError::InvalidConfig(format!("scene.clear_color: {e}")))?;
        if self.scene.grid_helper_divisions == 0 {
            return Err(PackError::InvalidConfig("scene.grid_helper_divisions must be at least 1".into()));
        }
        if !(self.scene.max_pixel_ratio.is_finite() && self.scene.max_pixel_ratio > 0.0) {
            return Err(PackError::InvalidConfig("scene.max_pixel_ratio must be positive".into()));
        }

        if self.fps_graph.history_len == 0 {
            return Err(PackError::InvalidConfig("fps_graph.history_len must be at least 1".into()));
        }

        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| PackError::InvalidConfig(format!("unknown log_level '{}'", self.log_level)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = PackConfig::from_json("  ").unwrap();
        assert_eq!(config, PackConfig::default());
        assert_eq!(config.layout.spacing, 0.8);
        assert_eq!(config.layout.group_offset_y(), -config.layout.row_pitch);
        assert_eq!(config.scene.clear_color, "#18142c");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = PackConfig::from_json(
            r#"{ "layout": { "spacing": 1.2 }, "cell": { "shape": "box" }, "log_level": "debug" }"#,
        )
        .unwrap();
        assert_eq!(config.layout.spacing, 1.2);
        assert_eq!(config.layout.row_pitch, crate::grid::ROW_PITCH);
        assert_eq!(config.cell.shape, CellShape::Box);
        assert_eq!(config.camera.fov_degrees, 75.0);
        assert_eq!(config.level_filter().unwrap(), log::LevelFilter::Debug);
    }

    #[test]
    fn explicit_group_offset_wins() {
        let config = PackConfig::from_json(r#"{ "layout": { "group_offset_y": 0.25 } }"#).unwrap();
        assert_eq!(config.layout.group_offset_y(), 0.25);
    }

    #[test]
    fn log_level_covers_off_and_trace() {
        for (text, level) in [("off", log::LevelFilter::Off), ("trace", log::LevelFilter::Trace)] {
            let config = PackConfig::from_json(&format!(r#"{{ "log_level": "{text}" }}"#)).unwrap();
            assert_eq!(config.level_filter().unwrap(), level);
        }
    }

    #[test]
    fn rejects_bad_values() {
        for json in [
            r#"{ "layout": { "spacing": 0 } }"#,
            r#"{ "layout": { "row_pitch": -1 } }"#,
            r#"{ "cell": { "segments": 2 } }"#,
            r#"{ "camera": { "near": 10, "far": 1 } }"#,
            r#"{ "camera": { "damping_factor": 1.5 } }"#,
            r#"{ "scene": { "clear_color": "purple" } }"#,
            r#"{ "fps_graph": { "history_len": 0 } }"#,
            r#"{ "log_level": "loud" }"#,
        ] {
            assert!(
                matches!(PackConfig::from_json(json), Err(PackError::InvalidConfig(_))),
                "{json} should fail validation"
            );
        }
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(PackConfig::from_json("{ nope"), Err(PackError::Config(_))));
    }
}

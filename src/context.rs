//! Application context: everything the page session owns, driven by
//! discrete events from the page and a per-frame `tick`.

use std::rc::Rc;

use crate::camera::{Camera, DragMode, OrbitControls};
use crate::color::parse_hex_color;
use crate::config::PackConfig;
use crate::error::{PackError, Result};
use crate::geometry::BaseGeometry;
use crate::grid::{self, GridSpec};
use crate::scene::Scene;

/// One-shot holder for the cell geometry. Starts `Pending` when the cell
/// comes from a model file, and is completed exactly once.
#[derive(Debug, Clone)]
pub enum AssetSlot {
    Pending,
    Ready(Rc<BaseGeometry>),
}

impl AssetSlot {
    pub fn complete(&mut self, geometry: BaseGeometry) -> Result<Rc<BaseGeometry>> {
        match self {
            AssetSlot::Ready(_) => Err(PackError::AssetAlreadyLoaded),
            AssetSlot::Pending => {
                let geometry = Rc::new(geometry);
                *self = AssetSlot::Ready(Rc::clone(&geometry));
                Ok(geometry)
            }
        }
    }

    pub fn geometry(&self) -> Result<&Rc<BaseGeometry>> {
        match self {
            AssetSlot::Ready(geometry) => Ok(geometry),
            AssetSlot::Pending => Err(PackError::AssetNotReady),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AssetSlot::Ready(_))
    }
}

/// Canvas size in CSS pixels plus the clamped device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn physical_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f64 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Raw text of the three dimension inputs.
    BuildRequested { x: String, y: String, z: String },
    CellModelLoaded(BaseGeometry),
    BackgroundChanged(String),
    Resized { width: u32, height: u32, device_pixel_ratio: f64 },
    /// Pointer movement in CSS pixels.
    PointerDrag { dx: f32, dy: f32, mode: DragMode },
    Wheel { delta_y: f32 },
}

pub struct AppContext {
    config: PackConfig,
    scene: Scene,
    camera: Camera,
    controls: OrbitControls,
    asset: AssetSlot,
    viewport: Viewport,
}

impl AppContext {
    pub fn new(config: PackConfig, width: u32, height: u32) -> Result<Self> {
        config.validate()?;

        let asset = match &config.cell.model_url {
            Some(url) => {
                log::info!("Waiting for cell model {url}");
                AssetSlot::Pending
            }
            None => AssetSlot::Ready(Rc::new(BaseGeometry::from_config(&config.cell))),
        };
        let aspect = if width > 0 && height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };

        Ok(Self {
            scene: Scene::from_config(&config)?,
            camera: Camera::from_config(&config.camera, aspect),
            controls: OrbitControls::from_config(&config.camera),
            asset,
            viewport: Viewport {
                width: width.max(1),
                height: height.max(1),
                pixel_ratio: 1.0,
            },
            config,
        })
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn asset(&self) -> &AssetSlot {
        &self.asset
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn handle(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::BuildRequested { x, y, z } => self.build_pack(&x, &y, &z),
            AppEvent::CellModelLoaded(geometry) => {
                let geometry = self.asset.complete(geometry)?;
                log::info!("Cell geometry '{}' ready", geometry.name());
                Ok(())
            }
            AppEvent::BackgroundChanged(hex) => {
                let color = parse_hex_color(&hex)?;
                self.scene.set_background(color);
                Ok(())
            }
            AppEvent::Resized {
                width,
                height,
                device_pixel_ratio,
            } => {
                if width == 0 || height == 0 {
                    return Ok(());
                }
                let pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
                    device_pixel_ratio.min(self.config.scene.max_pixel_ratio)
                } else {
                    1.0
                };
                self.viewport = Viewport {
                    width,
                    height,
                    pixel_ratio,
                };
                self.camera.set_aspect(width as f32, height as f32);
                Ok(())
            }
            AppEvent::PointerDrag { dx, dy, mode } => {
                let height = self.viewport.height as f32;
                self.controls.drag(&self.camera, dx, dy, height, mode);
                Ok(())
            }
            AppEvent::Wheel { delta_y } => {
                self.controls.wheel(delta_y);
                Ok(())
            }
        }
    }

    /// Parses, builds and attaches a pack. The scene is untouched on error.
    fn build_pack(&mut self, x: &str, y: &str, z: &str) -> Result<()> {
        let layout = &self.config.layout;
        let spec = GridSpec::parse(x, y, z, layout.spacing)?.with_row_pitch(layout.row_pitch)?;
        let geometry = self.asset.geometry()?;

        let pack = grid::build(&spec, geometry);
        log::info!(
            "Battery pack {}x{}x{}: {} cells",
            spec.x_count(),
            spec.y_count(),
            spec.z_count(),
            pack.len()
        );
        self.scene.attach_pack(pack);
        Ok(())
    }

    /// Per-frame update. Returns whether the camera moved.
    pub fn tick(&mut self) -> bool {
        self.controls.update(&mut self.camera)
    }

    /// Drops the pack and the loaded geometry.
    pub fn teardown(&mut self) {
        self.scene.clear_pack();
        self.asset = AssetSlot::Pending;
        log::info!("Battery pack session torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ROW_PITCH;

    fn context() -> AppContext {
        AppContext::new(PackConfig::default(), 800, 600).unwrap()
    }

    fn build(x: &str, y: &str, z: &str) -> AppEvent {
        AppEvent::BuildRequested {
            x: x.into(),
            y: y.into(),
            z: z.into(),
        }
    }

    fn pending_context() -> AppContext {
        let mut config = PackConfig::default();
        config.cell.model_url = Some("cell.obj".into());
        AppContext::new(config, 800, 600).unwrap()
    }

    #[test]
    fn default_primitive_is_ready_immediately() {
        let ctx = context();
        assert!(ctx.asset().is_ready());
        assert!(ctx.scene().shows_reference_cell());
    }

    #[test]
    fn build_attaches_pack() {
        let mut ctx = context();
        ctx.handle(build("2", "2", "2")).unwrap();
        let pack = ctx.scene().pack().unwrap();
        assert_eq!(pack.len(), 8);
        assert_eq!(pack.spec().row_pitch(), ROW_PITCH);
        assert_eq!(pack.spec().spacing(), 0.8);
    }

    #[test]
    fn rebuild_keeps_only_latest_pack() {
        let mut ctx = context();
        ctx.handle(build("3", "1", "2")).unwrap();
        let first: Vec<_> = ctx.scene().pack().unwrap().placements().to_vec();
        ctx.handle(build("3", "1", "2")).unwrap();
        assert_eq!(ctx.scene().instance_count(), 6);
        assert_eq!(ctx.scene().pack().unwrap().placements(), first.as_slice());

        ctx.handle(build("1", "1", "1")).unwrap();
        assert_eq!(ctx.scene().instance_count(), 1);
    }

    #[test]
    fn invalid_dimension_leaves_scene_alone() {
        let mut ctx = context();
        ctx.handle(build("2", "2", "2")).unwrap();
        let generation = ctx.scene().generation();

        let err = ctx.handle(build("2", "0", "2")).unwrap_err();
        assert!(matches!(err, PackError::InvalidDimension { .. }));
        assert_eq!(ctx.scene().instance_count(), 8);
        assert_eq!(ctx.scene().generation(), generation);
    }

    #[test]
    fn build_before_asset_is_refused() {
        let mut ctx = pending_context();
        let err = ctx.handle(build("1", "1", "1")).unwrap_err();
        assert!(matches!(err, PackError::AssetNotReady));
        assert_eq!(ctx.scene().instance_count(), 0);

        ctx.handle(AppEvent::CellModelLoaded(BaseGeometry::cuboid(1.0, 1.0, 1.0)))
            .unwrap();
        ctx.handle(build("1", "1", "1")).unwrap();
        assert_eq!(ctx.scene().instance_count(), 1);
    }

    #[test]
    fn asset_slot_completes_once() {
        let mut ctx = pending_context();
        ctx.handle(AppEvent::CellModelLoaded(BaseGeometry::cuboid(1.0, 1.0, 1.0)))
            .unwrap();
        let err = ctx
            .handle(AppEvent::CellModelLoaded(BaseGeometry::cylinder(1.0, 1.0, 8)))
            .unwrap_err();
        assert!(matches!(err, PackError::AssetAlreadyLoaded));
        assert_eq!(ctx.asset().geometry().unwrap().name(), "box");
    }

    #[test]
    fn background_change() {
        let mut ctx = context();
        ctx.handle(AppEvent::BackgroundChanged("#ffffff".into())).unwrap();
        assert_eq!(ctx.scene().background().r, 1.0);
        assert!(ctx.handle(AppEvent::BackgroundChanged("white".into())).is_err());
        assert_eq!(ctx.scene().background().r, 1.0);
    }

    #[test]
    fn resize_clamps_pixel_ratio() {
        let mut ctx = context();
        ctx.handle(AppEvent::Resized {
            width: 1000,
            height: 500,
            device_pixel_ratio: 3.0,
        })
        .unwrap();
        assert_eq!(ctx.viewport().pixel_ratio, 2.0);
        assert_eq!(ctx.viewport().physical_size(), (2000, 1000));
        assert_eq!(ctx.camera().aspect, 2.0);

        ctx.handle(AppEvent::Resized {
            width: 0,
            height: 500,
            device_pixel_ratio: 1.0,
        })
        .unwrap();
        assert_eq!(ctx.viewport().width, 1000);
    }

    #[test]
    fn tick_applies_pointer_input() {
        let mut ctx = context();
        assert!(!ctx.tick());
        ctx.handle(AppEvent::PointerDrag {
            dx: 40.0,
            dy: 0.0,
            mode: DragMode::Rotate,
        })
        .unwrap();
        assert!(ctx.tick());
        ctx.handle(AppEvent::Wheel { delta_y: 1.0 }).unwrap();
        assert!(ctx.tick());
    }

    #[test]
    fn teardown_resets_session() {
        let mut ctx = context();
        ctx.handle(build("2", "1", "1")).unwrap();
        ctx.teardown();
        assert_eq!(ctx.scene().instance_count(), 0);
        assert!(!ctx.asset().is_ready());
    }
}

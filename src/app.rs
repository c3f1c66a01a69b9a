//! Browser entry points. Only built for wasm32, where a canvas and
//! `fetch` exist.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlCanvasElement, Request, RequestInit, RequestMode, Response};

use crate::camera::DragMode;
use crate::config::PackConfig;
use crate::context::{AppContext, AppEvent};
use crate::error::PackError;
use crate::geometry::BaseGeometry;
use crate::logging;
use crate::performance::{FpsGraph, FpsSample};
use crate::renderer::PackRenderer;
use crate::utils;
use crate::CellModel;

fn asset_err(url: &str, what: &str, e: JsValue) -> PackError {
    PackError::Asset(format!("{url}: {what}: {e:?}"))
}

/// Downloads and parses a Wavefront OBJ cell model.
#[wasm_bindgen]
pub async fn fetch_cell_model(url: String) -> Result<CellModel, JsValue> {
    let window = web_sys::window().ok_or_else(|| PackError::Asset("no window".into()))?;

    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);
    let request = Request::new_with_str_and_init(&url, &opts)
        .map_err(|e| asset_err(&url, "bad request", e))?;

    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| asset_err(&url, "fetch failed", e))?
        .dyn_into()
        .map_err(|e| asset_err(&url, "not a response", e))?;
    if !response.ok() {
        return Err(PackError::Asset(format!("{url}: HTTP {}", response.status())).into());
    }

    let text = JsFuture::from(response.text().map_err(|e| asset_err(&url, "unreadable body", e))?)
        .await
        .map_err(|e| asset_err(&url, "unreadable body", e))?
        .as_string()
        .ok_or_else(|| PackError::Asset(format!("{url}: body is not text")))?;

    let name = url.rsplit('/').next().unwrap_or(&url);
    let geometry = BaseGeometry::from_obj(name, &text)?;
    Ok(CellModel::new(geometry))
}

#[wasm_bindgen]
pub struct BatteryPackApp {
    canvas: HtmlCanvasElement,
    context: AppContext,
    renderer: PackRenderer,
    fps: FpsGraph,
}

#[wasm_bindgen]
impl BatteryPackApp {
    /// `config_json` is an optional `PackConfig` document; missing keys use defaults.
    #[wasm_bindgen(constructor)]
    pub async fn new(canvas: HtmlCanvasElement, config_json: Option<String>) -> Result<BatteryPackApp, JsValue> {
        Self::create(canvas, config_json, false).await
    }

    #[wasm_bindgen]
    pub async fn new_force_webgl(canvas: HtmlCanvasElement, config_json: Option<String>) -> Result<BatteryPackApp, JsValue> {
        Self::create(canvas, config_json, true).await
    }

    async fn create(canvas: HtmlCanvasElement, config_json: Option<String>, force_webgl: bool) -> Result<BatteryPackApp, JsValue> {
        utils::set_panic_hook();

        let config = PackConfig::from_json(config_json.as_deref().unwrap_or(""))?;
        logging::init(config.level_filter()?);

        let width = canvas.width();
        let height = canvas.height();
        log::info!("Canvas width: {width}, height: {height}");

        let context = AppContext::new(config, width, height)?;
        let renderer =
            PackRenderer::new(canvas.clone(), width, height, force_webgl, &context.config().scene).await?;
        let fps = FpsGraph::new(&context.config().fps_graph, utils::now());

        Ok(Self {
            canvas,
            context,
            renderer,
            fps,
        })
    }

    /// Rebuilds the pack from the raw text of the three inputs and returns
    /// the number of cells now in the scene.
    #[wasm_bindgen]
    pub fn build_pack(&mut self, x: &str, y: &str, z: &str) -> Result<u32, JsValue> {
        let event = AppEvent::BuildRequested {
            x: x.to_string(),
            y: y.to_string(),
            z: z.to_string(),
        };
        match self.context.handle(event) {
            Ok(()) => Ok(self.instance_count()),
            Err(PackError::AssetNotReady) => {
                log::warn!("Cell model is still loading; build ignored");
                Ok(0)
            }
            Err(e) => {
                log::warn!("Build rejected: {e}");
                Err(e.into())
            }
        }
    }

    /// Completes the one-shot cell model slot. Later models are ignored.
    #[wasm_bindgen]
    pub fn attach_cell_model(&mut self, model: CellModel) -> Result<(), JsValue> {
        match self.context.handle(AppEvent::CellModelLoaded(model.into_geometry())) {
            Ok(()) => Ok(()),
            Err(PackError::AssetAlreadyLoaded) => {
                log::warn!("Cell model already loaded; ignoring the new one");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[wasm_bindgen]
    pub fn set_background(&mut self, hex: &str) -> Result<(), JsValue> {
        self.context
            .handle(AppEvent::BackgroundChanged(hex.to_string()))
            .map_err(JsValue::from)
    }

    /// Size in CSS pixels plus `window.devicePixelRatio`.
    #[wasm_bindgen]
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f64) -> Result<(), JsValue> {
        self.context.handle(AppEvent::Resized {
            width,
            height,
            device_pixel_ratio,
        })?;

        let (physical_width, physical_height) = self.context.viewport().physical_size();
        self.canvas.set_width(physical_width);
        self.canvas.set_height(physical_height);
        self.renderer.resize(physical_width, physical_height);
        Ok(())
    }

    /// Pointer movement in CSS pixels; `pan` for right/middle-button drags.
    #[wasm_bindgen]
    pub fn on_pointer_drag(&mut self, dx: f32, dy: f32, pan: bool) -> Result<(), JsValue> {
        let mode = if pan { DragMode::Pan } else { DragMode::Rotate };
        self.context
            .handle(AppEvent::PointerDrag { dx, dy, mode })
            .map_err(JsValue::from)
    }

    #[wasm_bindgen]
    pub fn on_wheel(&mut self, delta_y: f32) -> Result<(), JsValue> {
        self.context
            .handle(AppEvent::Wheel { delta_y })
            .map_err(JsValue::from)
    }

    /// One animation frame: advance the controls, draw, record timing.
    #[wasm_bindgen]
    pub fn render(&mut self) -> Result<(), JsValue> {
        self.fps.begin(utils::now());

        self.context.tick();
        self.renderer.render(&self.context)?;

        self.fps.end(utils::now(), self.instance_count());
        Ok(())
    }

    #[wasm_bindgen]
    pub fn fps_sample(&self) -> Option<FpsSample> {
        self.fps.latest()
    }

    /// Recent FPS values for the graph, oldest first.
    #[wasm_bindgen]
    pub fn fps_history(&self) -> Vec<f32> {
        self.fps.history()
    }

    /// Cells in the current pack (the reference cell is not counted).
    #[wasm_bindgen]
    pub fn instance_count(&self) -> u32 {
        u32::try_from(self.context.scene().instance_count()).unwrap_or(u32::MAX)
    }

    /// Ends the session; the JS handle is consumed.
    #[wasm_bindgen]
    pub fn dispose(mut self) {
        self.context.teardown();
    }
}

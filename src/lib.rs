//! Battery pack visualizer.
//!
//! Builds a grid of battery cells from three dimension inputs and renders it
//! into a canvas with wgpu (WebGPU, falling back to WebGL2). The page wires
//! its inputs, buttons and pointer events to `BatteryPackApp` and drives
//! `BatteryPackApp::render` from `requestAnimationFrame`.

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
mod utils;

pub mod camera;
pub mod color;
pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod helpers;
pub mod logging;
pub mod performance;
#[cfg(target_arch = "wasm32")]
pub mod renderer;
pub mod scene;
pub mod types;

use wasm_bindgen::prelude::*;

use crate::geometry::BaseGeometry;

#[cfg(target_arch = "wasm32")]
pub use crate::app::{fetch_cell_model, BatteryPackApp};

/// Initial and reset value for the x, y and z inputs.
#[wasm_bindgen]
pub fn dimension_reset_value() -> String {
    grid::DIMENSION_RESET_VALUE.to_string()
}

/// A parsed cell model, ready to hand to `BatteryPackApp::attach_cell_model`.
#[wasm_bindgen]
pub struct CellModel {
    geometry: BaseGeometry,
}

impl CellModel {
    pub fn new(geometry: BaseGeometry) -> Self {
        Self { geometry }
    }

    pub fn into_geometry(self) -> BaseGeometry {
        self.geometry
    }
}

#[wasm_bindgen]
impl CellModel {
    pub fn name(&self) -> String {
        self.geometry.name().to_string()
    }

    pub fn vertex_count(&self) -> usize {
        self.geometry.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.geometry.triangle_count()
    }
}

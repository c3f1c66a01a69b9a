//! Error types for the battery pack visualizer.

use std::fmt;

use thiserror::Error;
use wasm_bindgen::JsValue;

/// One of the three grid dimensions typed into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PackError {
    /// A dimension field is empty, not a whole number, or below 1.
    #[error("invalid {axis} dimension '{value}': expected a whole number of at least 1")]
    InvalidDimension { axis: Axis, value: String },

    /// A build was requested before the cell geometry finished loading.
    #[error("cell geometry is not loaded yet")]
    AssetNotReady,

    /// The one-shot cell geometry slot was completed twice.
    #[error("cell geometry has already been loaded")]
    AssetAlreadyLoaded,

    #[error("invalid hex color '{0}': expected #RRGGBB")]
    InvalidColor(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration JSON error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("cell model error: {0}")]
    Asset(String),

    #[error("render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, PackError>;

impl From<PackError> for JsValue {
    fn from(err: PackError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

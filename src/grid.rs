//! Grid Builder: turns three cell counts into a positioned, alternately
//! oriented set of cell placements.
//!
//! Cells are indexed from 1 on every axis. Horizontal neighbours are
//! `spacing` apart; rows are stacked `row_pitch` apart, independent of the
//! horizontal spacing. Every even depth layer after the first is flipped
//! half a turn about the x axis, the way cylindrical cells alternate
//! polarity in a pack.

use std::f32::consts::PI;
use std::rc::Rc;

use cgmath::Vector3;

use crate::error::{Axis, PackError, Result};
use crate::geometry::BaseGeometry;

/// Default horizontal centre-to-centre distance between cells.
pub const DEFAULT_SPACING: f32 = 0.8;

/// Vertical distance between rows of cells.
pub const ROW_PITCH: f32 = 1.3;

/// Builds above this many cells log a warning: the build is synchronous and
/// holds up the render loop until it finishes.
pub const LARGE_PACK_WARN_THRESHOLD: u64 = 100_000;

/// Initial and reset text of the three dimension inputs.
pub const DIMENSION_RESET_VALUE: &str = "1";

/// Parses the text of one dimension input.
pub fn parse_dimension(axis: Axis, raw: &str) -> Result<u32> {
    let invalid = || PackError::InvalidDimension {
        axis,
        value: raw.to_string(),
    };

    let value: i64 = raw.trim().parse().map_err(|_| invalid())?;
    if value < 1 {
        return Err(invalid());
    }
    u32::try_from(value).map_err(|_| invalid())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    x_count: u32,
    y_count: u32,
    z_count: u32,
    spacing: f32,
    row_pitch: f32,
}

impl GridSpec {
    /// Validated constructor; counts must be at least 1 and spacing positive.
    pub fn new(x_count: u32, y_count: u32, z_count: u32, spacing: f32) -> Result<Self> {
        for (axis, count) in [(Axis::X, x_count), (Axis::Y, y_count), (Axis::Z, z_count)] {
            if count == 0 {
                return Err(PackError::InvalidDimension {
                    axis,
                    value: count.to_string(),
                });
            }
        }
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(PackError::InvalidConfig(format!(
                "cell spacing must be positive, got {spacing}"
            )));
        }

        Ok(Self {
            x_count,
            y_count,
            z_count,
            spacing,
            row_pitch: ROW_PITCH,
        })
    }

    /// Builds a spec straight from the three input fields.
    pub fn parse(x: &str, y: &str, z: &str, spacing: f32) -> Result<Self> {
        Self::new(
            parse_dimension(Axis::X, x)?,
            parse_dimension(Axis::Y, y)?,
            parse_dimension(Axis::Z, z)?,
            spacing,
        )
    }

    pub fn with_row_pitch(mut self, row_pitch: f32) -> Result<Self> {
        if !(row_pitch.is_finite() && row_pitch > 0.0) {
            return Err(PackError::InvalidConfig(format!(
                "row pitch must be positive, got {row_pitch}"
            )));
        }
        self.row_pitch = row_pitch;
        Ok(self)
    }

    pub fn x_count(&self) -> u32 {
        self.x_count
    }

    pub fn y_count(&self) -> u32 {
        self.y_count
    }

    pub fn z_count(&self) -> u32 {
        self.z_count
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn row_pitch(&self) -> f32 {
        self.row_pitch
    }

    /// Total number of cells, saturating at `u64::MAX`.
    pub fn cell_count(&self) -> u64 {
        (self.x_count as u64)
            .saturating_mul(self.y_count as u64)
            .saturating_mul(self.z_count as u64)
    }

    /// Placement of the cell at a 1-based index.
    pub fn placement(&self, x: u32, y: u32, z: u32) -> CellPlacement {
        let position = Vector3::new(
            x as f32 * self.spacing - self.spacing,
            y as f32 * self.row_pitch,
            z as f32 * self.spacing - self.spacing,
        );
        let rotation_x = if z % 2 == 0 && z > 1 { PI } else { 0.0 };

        CellPlacement {
            index: (x, y, z),
            position,
            rotation_x,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPlacement {
    pub index: (u32, u32, u32),
    pub position: Vector3<f32>,
    /// Either `0` or `π`.
    pub rotation_x: f32,
}

/// All placements of one build, sharing a single base geometry.
#[derive(Debug, Clone)]
pub struct CellInstanceSet {
    spec: GridSpec,
    geometry: Rc<BaseGeometry>,
    placements: Vec<CellPlacement>,
}

impl CellInstanceSet {
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn geometry(&self) -> &Rc<BaseGeometry> {
        &self.geometry
    }

    pub fn placements(&self) -> &[CellPlacement] {
        &self.placements
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CellPlacement> {
        self.placements.iter()
    }
}

impl<'a> IntoIterator for &'a CellInstanceSet {
    type Item = &'a CellPlacement;
    type IntoIter = std::slice::Iter<'a, CellPlacement>;

    fn into_iter(self) -> Self::IntoIter {
        self.placements.iter()
    }
}

/// Huge packs grow as they go instead of reserving everything up front.
fn initial_capacity(count: u64) -> usize {
    usize::try_from(count.min(LARGE_PACK_WARN_THRESHOLD)).unwrap_or(0)
}

/// Enumerates every placement, x outermost and z innermost.
pub fn build(spec: &GridSpec, geometry: &Rc<BaseGeometry>) -> CellInstanceSet {
    let count = spec.cell_count();
    if count > LARGE_PACK_WARN_THRESHOLD {
        log::warn!(
            "Building {count} cells synchronously; rendering pauses until the build finishes"
        );
    }

    let mut placements = Vec::with_capacity(initial_capacity(count));
    for x in 1..=spec.x_count {
        for y in 1..=spec.y_count {
            for z in 1..=spec.z_count {
                placements.push(spec.placement(x, y, z));
            }
        }
    }

    log::debug!(
        "Built {}x{}x{} pack ({} cells, spacing {}, row pitch {})",
        spec.x_count,
        spec.y_count,
        spec.z_count,
        placements.len(),
        spec.spacing,
        spec.row_pitch
    );

    CellInstanceSet {
        spec: *spec,
        geometry: Rc::clone(geometry),
        placements,
    }
}

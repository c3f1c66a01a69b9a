//! The scene that presents a built pack.
//!
//! Owns the live `CellInstanceSet`. Each build replaces the whole set; the
//! generation counter lets the renderer re-upload instance data only when
//! the set actually changed.

use cgmath::{Matrix4, Rad, SquareMatrix, Vector3};

use crate::color::parse_hex_color;
use crate::config::PackConfig;
use crate::error::Result;
use crate::grid::CellInstanceSet;

#[derive(Debug)]
pub struct Scene {
    background: wgpu::Color,
    group_offset_y: f32,
    pack: Option<CellInstanceSet>,
    generation: u64,
    pub show_grid_helper: bool,
    pub show_axes_helper: bool,
}

impl Scene {
    pub fn from_config(config: &PackConfig) -> Result<Self> {
        Ok(Self {
            background: parse_hex_color(&config.scene.clear_color)?,
            group_offset_y: config.layout.group_offset_y(),
            pack: None,
            generation: 0,
            show_grid_helper: config.scene.show_grid_helper,
            show_axes_helper: config.scene.show_axes_helper,
        })
    }

    pub fn background(&self) -> wgpu::Color {
        self.background
    }

    pub fn set_background(&mut self, color: wgpu::Color) {
        self.background = color;
    }

    pub fn group_offset_y(&self) -> f32 {
        self.group_offset_y
    }

    /// Replaces the current pack. The old set is dropped before the new one
    /// goes in, never merged with it.
    pub fn attach_pack(&mut self, pack: CellInstanceSet) {
        if let Some(previous) = self.pack.take() {
            log::debug!("Discarding previous pack of {} cells", previous.len());
        }
        self.pack = Some(pack);
        self.generation += 1;
    }

    pub fn clear_pack(&mut self) {
        if self.pack.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn pack(&self) -> Option<&CellInstanceSet> {
        self.pack.as_ref()
    }

    pub fn instance_count(&self) -> usize {
        self.pack.as_ref().map_or(0, CellInstanceSet::len)
    }

    /// Bumped on every attach or clear.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The lone cell at the origin is shown until the first pack replaces it.
    pub fn shows_reference_cell(&self) -> bool {
        self.pack.is_none()
    }

    /// One model matrix per visible cell, group offset applied.
    pub fn world_transforms(&self) -> Vec<Matrix4<f32>> {
        match &self.pack {
            Some(pack) => pack
                .iter()
                .map(|p| {
                    let translation = Vector3::new(
                        p.position.x,
                        p.position.y + self.group_offset_y,
                        p.position.z,
                    );
                    let flip = if p.rotation_x == 0.0 {
                        Matrix4::identity()
                    } else {
                        Matrix4::from_angle_x(Rad(p.rotation_x))
                    };
                    Matrix4::from_translation(translation) * flip
                })
                .collect(),
            None => vec![Matrix4::identity()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BaseGeometry;
    use crate::grid::{build, GridSpec, ROW_PITCH};
    use std::rc::Rc;

    /// The transformed local +Y axis points down.
    fn is_upside_down(transform: &Matrix4<f32>) -> bool {
        transform.y.y < 0.0
    }

    fn scene() -> Scene {
        Scene::from_config(&PackConfig::default()).unwrap()
    }

    fn pack(x: u32, y: u32, z: u32) -> CellInstanceSet {
        let geometry = Rc::new(BaseGeometry::cuboid(1.0, 1.0, 1.0));
        build(&GridSpec::new(x, y, z, 0.8).unwrap(), &geometry)
    }

    #[test]
    fn starts_with_reference_cell_only() {
        let scene = scene();
        assert_eq!(scene.instance_count(), 0);
        assert!(scene.shows_reference_cell());
        assert_eq!(scene.world_transforms(), vec![Matrix4::<f32>::identity()]);
        assert_eq!(scene.generation(), 0);
    }

    #[test]
    fn rebuild_replaces_instead_of_appending() {
        let mut scene = scene();
        scene.attach_pack(pack(2, 3, 4));
        scene.attach_pack(pack(2, 3, 4));
        assert_eq!(scene.instance_count(), 24);
        assert_eq!(scene.world_transforms().len(), 24);
        assert_eq!(scene.generation(), 2);
        assert!(!scene.shows_reference_cell());
    }

    #[test]
    fn first_cell_lands_on_reference_cell() {
        let mut scene = scene();
        assert_eq!(scene.group_offset_y(), -ROW_PITCH);
        scene.attach_pack(pack(1, 1, 1));
        let first = scene.world_transforms()[0];
        assert!(first.w.x.abs() < 1e-6);
        assert!(first.w.y.abs() < 1e-6);
        assert!(first.w.z.abs() < 1e-6);
    }

    #[test]
    fn flipped_layers_are_upside_down() {
        let mut scene = scene();
        scene.attach_pack(pack(1, 1, 3));
        let flips: Vec<bool> = scene.world_transforms().iter().map(is_upside_down).collect();
        assert_eq!(flips, vec![false, true, false]);
    }

    #[test]
    fn clear_only_bumps_generation_when_something_was_attached() {
        let mut scene = scene();
        scene.clear_pack();
        assert_eq!(scene.generation(), 0);
        scene.attach_pack(pack(1, 1, 1));
        scene.clear_pack();
        assert_eq!(scene.generation(), 2);
        assert!(scene.shows_reference_cell());
    }
}

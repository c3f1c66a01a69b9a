//! Line geometry for the alignment grid and the axes gizmo.

use crate::color::rgb_from_u32;
use crate::types::LineVertex;

const GRID_CENTER_COLOR: u32 = 0x444444;
const GRID_COLOR: u32 = 0x888888;

/// Square grid in the XZ plane at height `y`, `size` wide with `divisions`
/// cells per side. Returns line-list vertices.
pub fn grid_helper(size: f32, divisions: u32, y: f32) -> Vec<LineVertex> {
    let divisions = divisions.max(1);
    let step = size / divisions as f32;
    let half = size / 2.0;
    let center = divisions / 2;

    let mut lines = Vec::with_capacity((divisions as usize + 1) * 4);
    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        let color = if i == center && divisions % 2 == 0 {
            rgb_from_u32(GRID_CENTER_COLOR)
        } else {
            rgb_from_u32(GRID_COLOR)
        };
        lines.push(LineVertex { position: [-half, y, k], color });
        lines.push(LineVertex { position: [half, y, k], color });
        lines.push(LineVertex { position: [k, y, -half], color });
        lines.push(LineVertex { position: [k, y, half], color });
    }
    lines
}

/// Three segments from the origin: x red, y green, z blue.
pub fn axes_helper(size: f32) -> Vec<LineVertex> {
    let axes = [
        ([size, 0.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, size, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, size], [0.0, 0.0, 1.0]),
    ];
    axes.iter()
        .flat_map(|&(end, color)| {
            [
                LineVertex { position: [0.0; 3], color },
                LineVertex { position: end, color },
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_four_vertices_per_line_pair() {
        let grid = grid_helper(10.0, 10, -0.5);
        assert_eq!(grid.len(), 44);
        assert!(grid.iter().all(|v| v.position[1] == -0.5));
        assert!(grid
            .iter()
            .all(|v| v.position[0].abs() <= 5.0 && v.position[2].abs() <= 5.0));
    }

    #[test]
    fn grid_centre_lines_are_darker() {
        let grid = grid_helper(10.0, 10, 0.0);
        let centre = rgb_from_u32(GRID_CENTER_COLOR);
        let through_origin: Vec<_> = grid.iter().filter(|v| v.color == centre).collect();
        assert_eq!(through_origin.len(), 4);
        assert!(through_origin
            .iter()
            .all(|v| v.position[0] == 0.0 || v.position[2] == 0.0));
    }

    #[test]
    fn axes_are_colour_coded() {
        let axes = axes_helper(5.0);
        assert_eq!(axes.len(), 6);
        assert_eq!(axes[1].position, [5.0, 0.0, 0.0]);
        assert_eq!(axes[1].color, [1.0, 0.0, 0.0]);
        assert_eq!(axes[3].position, [0.0, 5.0, 0.0]);
        assert_eq!(axes[5].color, [0.0, 0.0, 1.0]);
    }
}

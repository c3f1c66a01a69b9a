//! Base cell geometry: the shape every placement in a pack refers to.

use std::f32::consts::TAU;
use std::io::BufReader;

use cgmath::{InnerSpace, Vector3};

use crate::config::{CellConfig, CellShape};
use crate::error::{PackError, Result};
use crate::types::Vertex;

#[derive(Debug, Clone, PartialEq)]
pub struct BaseGeometry {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl BaseGeometry {
    pub fn from_config(cell: &CellConfig) -> Self {
        match cell.shape {
            CellShape::Cylinder => Self::cylinder(cell.radius, cell.height, cell.segments),
            CellShape::Box => Self::cuboid(cell.size[0], cell.size[1], cell.size[2]),
        }
    }

    /// Axis-aligned box centred on the origin, 4 vertices per face so each
    /// face keeps a flat normal.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);
        // (normal, u axis, v axis) per face
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = [
                    (normal[0] + su * u[0] + sv * v[0]) * hx,
                    (normal[1] + su * u[1] + sv * v[1]) * hy,
                    (normal[2] + su * u[2] + sv * v[2]) * hz,
                ];
                vertices.push(Vertex { position, normal });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self {
            name: "box".to_string(),
            vertices,
            indices,
        }
    }

    /// Cylinder standing on the y axis, centred on the origin, with capped
    /// ends. Flipping it about x swaps the ends, which is what makes the
    /// alternating layers visible.
    pub fn cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let half = height / 2.0;
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        // side: one top and one bottom vertex per seam, seam duplicated at the end
        for i in 0..=segments {
            let angle = TAU * i as f32 / segments as f32;
            let (sin, cos) = angle.sin_cos();
            let normal = [cos, 0.0, sin];
            vertices.push(Vertex { position: [radius * cos, half, radius * sin], normal });
            vertices.push(Vertex { position: [radius * cos, -half, radius * sin], normal });
        }
        for i in 0..segments {
            let top = 2 * i;
            let bottom = top + 1;
            let next_top = top + 2;
            let next_bottom = top + 3;
            indices.extend_from_slice(&[top, next_top, bottom, bottom, next_top, next_bottom]);
        }

        for (y, ny) in [(half, 1.0f32), (-half, -1.0f32)] {
            let centre = vertices.len() as u32;
            vertices.push(Vertex { position: [0.0, y, 0.0], normal: [0.0, ny, 0.0] });
            for i in 0..=segments {
                let angle = TAU * i as f32 / segments as f32;
                let (sin, cos) = angle.sin_cos();
                vertices.push(Vertex {
                    position: [radius * cos, y, radius * sin],
                    normal: [0.0, ny, 0.0],
                });
            }
            for i in 0..segments {
                let a = centre + 1 + i;
                let b = a + 1;
                if ny > 0.0 {
                    indices.extend_from_slice(&[centre, b, a]);
                } else {
                    indices.extend_from_slice(&[centre, a, b]);
                }
            }
        }

        Self {
            name: "cylinder".to_string(),
            vertices,
            indices,
        }
    }

    /// Parses a Wavefront OBJ document. All meshes in the file are merged;
    /// materials are ignored.
    pub fn from_obj(name: &str, source: &str) -> Result<Self> {
        let mut reader = BufReader::new(source.as_bytes());
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, _materials) =
            tobj::load_obj_buf(&mut reader, &options, |_| Err(tobj::LoadError::OpenFileFailed))
                .map_err(|e| PackError::Asset(format!("{name}: {e}")))?;

        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for model in models {
            let mesh = model.mesh;
            let offset = vertices.len() as u32;
            let has_normals = mesh.normals.len() == mesh.positions.len();

            for (i, p) in mesh.positions.chunks_exact(3).enumerate() {
                let normal = if has_normals {
                    [mesh.normals[3 * i], mesh.normals[3 * i + 1], mesh.normals[3 * i + 2]]
                } else {
                    [0.0; 3]
                };
                vertices.push(Vertex { position: [p[0], p[1], p[2]], normal });
            }
            let first_index = indices.len();
            indices.extend(mesh.indices.iter().map(|i| i + offset));

            if !has_normals {
                accumulate_smooth_normals(&mut vertices, &indices[first_index..]);
            }
        }

        if indices.is_empty() {
            return Err(PackError::Asset(format!("{name}: no triangles found")));
        }
        if indices.iter().any(|&i| i as usize >= vertices.len()) {
            return Err(PackError::Asset(format!("{name}: face index out of range")));
        }

        log::info!(
            "Loaded cell model '{}' ({} vertices, {} triangles)",
            name,
            vertices.len(),
            indices.len() / 3
        );

        Ok(Self {
            name: name.to_string(),
            vertices,
            indices,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Area-weighted vertex normals for a triangle list.
fn accumulate_smooth_normals(vertices: &mut [Vertex], indices: &[u32]) {
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa = Vector3::from(vertices[a].position);
        let pb = Vector3::from(vertices[b].position);
        let pc = Vector3::from(vertices[c].position);
        let face = (pb - pa).cross(pc - pa);
        for i in [a, b, c] {
            let n = Vector3::from(vertices[i].normal) + face;
            vertices[i].normal = n.into();
        }
    }
    for v in vertices.iter_mut() {
        let n = Vector3::from(v.normal);
        if n.magnitude2() > 0.0 {
            v.normal = n.normalize().into();
        }
    }
}

//! CPU-side triangle geometry.
//!
//! Geometry is built once (procedurally or from a model file) and uploaded
//! to the GPU when its mesh node is first drawn.

use glam::{Mat3, Mat4, Vec3};
use std::f32::consts::{PI, TAU};

/// Indexed triangle list with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Flat `width` x `height` plane in the XY plane, facing +Z.
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self {
            positions: vec![[-hw, hh, 0.0], [hw, hh, 0.0], [-hw, -hh, 0.0], [hw, -hh, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            indices: vec![0, 2, 1, 2, 3, 1],
        }
    }

    /// UV sphere centered on the origin.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let mut geometry = Self::default();

        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            let theta = v * PI;
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let phi = u * TAU;
                let normal = Vec3::new(-phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());
                geometry.positions.push((normal * radius).to_array());
                geometry.normals.push(normal.to_array());
            }
        }

        let row = width_segments + 1;
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    geometry.indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    geometry.indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        geometry
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append `other` transformed by `matrix`, rebasing its indices.
    pub fn append(&mut self, other: &Geometry, matrix: Mat4) {
        let base = self.positions.len() as u32;
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();

        self.positions.extend(
            other
                .positions
                .iter()
                .map(|p| matrix.transform_point3(Vec3::from(*p)).to_array()),
        );
        self.normals.extend(
            other
                .normals
                .iter()
                .map(|n| (normal_matrix * Vec3::from(*n)).normalize_or_zero().to_array()),
        );
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Smooth normals from the triangle faces, area weighted.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (pa, pb, pc) = (Vec3::from(self.positions[a]), Vec3::from(self.positions[b]), Vec3::from(self.positions[c]));
            let face = (pb - pa).cross(pc - pa);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        self.normals = normals.into_iter().map(|n| n.normalize_or_zero().to_array()).collect();
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` with no vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self.positions.iter().map(|p| Vec3::from(*p));
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    /// Center on the origin and scale so the largest extent equals `size`.
    pub fn fit_to(&mut self, size: f32) {
        let Some((min, max)) = self.bounds() else {
            return;
        };
        let center = (min + max) * 0.5;
        let extent = (max - min).max_element();
        let scale = if extent > f32::EPSILON { size / extent } else { 1.0 };
        for p in &mut self.positions {
            *p = ((Vec3::from(*p) - center) * scale).to_array();
        }
    }
}

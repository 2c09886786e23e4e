//! Procedural meshes used when no asset directory is available.

use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::assets::Geometry;

fn push_vertex(geometry: &mut Geometry, position: Vec3, normal: Vec3, texel: Vec2) {
    geometry.positions.extend_from_slice(&position.to_array());
    geometry.normals.extend_from_slice(&normal.to_array());
    geometry.texels.extend_from_slice(&texel.to_array());
}

/// Axis-aligned unit cube spanning [-0.5, 0.5] on every axis.
pub fn cube() -> Geometry {
    let mut geometry = Geometry::default();
    let faces = [
        (Vec3::X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::Z),
        (Vec3::Z, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y),
    ];
    for (normal, up) in faces {
        let right = up.cross(normal);
        let corner = |u: f32, v: f32| (normal + right * u + up * v) * 0.5;
        let quad = [
            (corner(-1.0, -1.0), Vec2::new(0.0, 0.0)),
            (corner(1.0, -1.0), Vec2::new(1.0, 0.0)),
            (corner(1.0, 1.0), Vec2::new(1.0, 1.0)),
            (corner(-1.0, 1.0), Vec2::new(0.0, 1.0)),
        ];
        for index in [0, 1, 2, 0, 2, 3] {
            let (position, texel) = quad[index];
            push_vertex(&mut geometry, position, normal, texel);
        }
    }
    geometry
}

/// 2×2 quad in the XZ plane facing +Y.
pub fn plane() -> Geometry {
    let mut geometry = Geometry::default();
    let quad = [
        (Vec3::new(-1.0, 0.0, 1.0), Vec2::new(0.0, 0.0)),
        (Vec3::new(1.0, 0.0, 1.0), Vec2::new(1.0, 0.0)),
        (Vec3::new(1.0, 0.0, -1.0), Vec2::new(1.0, 1.0)),
        (Vec3::new(-1.0, 0.0, -1.0), Vec2::new(0.0, 1.0)),
    ];
    for index in [0, 1, 2, 0, 2, 3] {
        let (position, texel) = quad[index];
        push_vertex(&mut geometry, position, Vec3::Y, texel);
    }
    geometry
}

/// Unit sphere tessellated into `segments` longitudinal slices and `rings`
/// latitudinal bands.
pub fn uv_sphere(segments: u32, rings: u32) -> Geometry {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let point = |segment: u32, ring: u32| {
        let u = segment as f32 / segments as f32;
        let v = ring as f32 / rings as f32;
        let theta = u * 2.0 * PI;
        let phi = v * PI;
        let position = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
        (position, Vec2::new(u, 1.0 - v))
    };

    let mut geometry = Geometry::default();
    for ring in 0..rings {
        for segment in 0..segments {
            let a = point(segment, ring);
            let b = point(segment + 1, ring);
            let c = point(segment + 1, ring + 1);
            let d = point(segment, ring + 1);
            for (position, texel) in [a, c, b, a, d, c] {
                push_vertex(&mut geometry, position, position.normalize_or_zero(), texel);
            }
        }
    }
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_six_outward_faces() {
        let geometry = cube();
        assert_eq!(geometry.vertex_count(), 36);
        for (position, normal) in geometry
            .positions
            .chunks_exact(3)
            .zip(geometry.normals.chunks_exact(3))
        {
            let position = Vec3::from_slice(position);
            let normal = Vec3::from_slice(normal);
            assert!((position.dot(normal) - 0.5).abs() < 1e-5);
            assert!(position.abs().max_element() <= 0.5 + 1e-5);
        }
    }

    #[test]
    fn sphere_vertices_lie_on_unit_sphere() {
        let geometry = uv_sphere(8, 6);
        assert_eq!(geometry.vertex_count(), 8 * 6 * 6);
        for position in geometry.positions.chunks_exact(3) {
            assert!((Vec3::from_slice(position).length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn plane_is_flat() {
        let geometry = plane();
        assert!(geometry.positions.chunks_exact(3).all(|p| p[1] == 0.0));
        assert_eq!(geometry.texels.len(), 12);
    }
}

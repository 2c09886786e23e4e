use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};

use crate::assets::Geometry;

/// Parses Wavefront OBJ text into an unindexed triangle list.
///
/// Polygons are fan-triangulated. Negative indices count back from the most
/// recent element; missing normals and texture coordinates become zeros.
pub fn parse_obj(data: &str) -> Result<Geometry> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut texels = Vec::new();
    let mut triangles: Vec<[Corner; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "vt" => texels.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texel on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                triangulate_face(&polygon, &mut triangles);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let mut geometry = Geometry {
        positions: Vec::with_capacity(triangles.len() * 9),
        normals: Vec::with_capacity(triangles.len() * 9),
        texels: Vec::with_capacity(triangles.len() * 6),
    };
    for corner in triangles.iter().flatten() {
        let position = fix_index(corner.v, positions.len())
            .map(|i| positions[i])
            .ok_or_else(|| anyhow!("vertex index {} out of range", corner.v))?;
        let normal = fix_index(corner.vn, normals.len())
            .map(|i| normals[i])
            .unwrap_or(Vec3::ZERO);
        let texel = fix_index(corner.vt, texels.len())
            .map(|i| texels[i])
            .unwrap_or(Vec2::ZERO);
        geometry.positions.extend_from_slice(&position.to_array());
        geometry.normals.extend_from_slice(&normal.to_array());
        geometry.texels.extend_from_slice(&texel.to_array());
    }
    Ok(geometry)
}

fn next_f32<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<f32> {
    Ok(parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    Ok(Vec3::new(
        next_f32(&mut parts)?,
        next_f32(&mut parts)?,
        next_f32(&mut parts)?,
    ))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    Ok(Vec2::new(next_f32(&mut parts)?, next_f32(&mut parts)?))
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    v: i32,
    vt: i32,
    vn: i32,
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<Corner>> {
    let mut corners = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let mut optional = || -> Result<i32> {
            match segments.next() {
                Some(s) if !s.is_empty() => Ok(s.parse::<i32>()?),
                _ => Ok(0),
            }
        };
        let vt = optional()?;
        let vn = optional()?;
        corners.push(Corner { v, vt, vn });
    }
    if corners.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(corners)
}

fn triangulate_face(polygon: &[Corner], triangles: &mut Vec<[Corner; 3]>) {
    for i in 1..(polygon.len() - 1) {
        triangles.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_corners() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n";
        let geometry = parse_obj(obj).unwrap();
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(&geometry.texels[2..4], &[1.0, 0.0]);
        assert_eq!(&geometry.normals[6..9], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn quads_fan_into_two_triangles() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let geometry = parse_obj(obj).unwrap();
        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(&geometry.positions[9..12], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn negative_indices_are_relative() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3//  -2 -1\n";
        let geometry = parse_obj(obj).unwrap();
        assert_eq!(&geometry.positions[3..6], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_attributes_fill_with_zeros() {
        let geometry = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert!(geometry.normals.iter().all(|value| *value == 0.0));
        assert_eq!(geometry.texels.len(), 6);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}

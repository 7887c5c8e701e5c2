//! Homogeneous clip-space clipping (Sutherland-Hodgman)
//!
//! The clip volume is `-w <= x <= w`, `-w <= y <= w`, `0 <= z <= w`.
//! A `w >= W_EPSILON` plane runs first so nothing at or behind the eye
//! reaches the perspective divide.

use crate::vertex::VertexData;

/// Smallest clip `w` that survives clipping
pub const W_EPSILON: f32 = 1e-5;

/// A clip plane as `(axis, side)`: axis 0..=2 is x/y/z, axis 3 is the w plane.
/// Side `+1` is `c <= w`, side `-1` is `-c <= w` (for z: `z >= 0`).
const CLIP_PLANES: [(usize, i32); 7] = [(3, 1), (0, 1), (0, -1), (1, 1), (1, -1), (2, 1), (2, -1)];

/// Signed distance of `v` to a plane; `>= 0` is inside
#[inline]
fn plane_distance(v: &VertexData, axis: usize, side: i32) -> f32 {
    let c = v.cpos;
    match (axis, side) {
        (3, _) => c.w - W_EPSILON,
        (2, -1) => c.z,
        (axis, 1) => c.w - c.get(axis),
        (axis, _) => c.w + c.get(axis),
    }
}

fn inside_all_planes(v: &VertexData) -> bool {
    CLIP_PLANES
        .iter()
        .all(|&(axis, side)| plane_distance(v, axis, side) >= 0.0)
}

/// Clip a polygon against one plane
fn clip_polygon(polygon: &[VertexData], axis: usize, side: i32) -> Vec<VertexData> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    if polygon.is_empty() {
        return out;
    }

    let mut prev = &polygon[polygon.len() - 1];
    let mut prev_d = plane_distance(prev, axis, side);
    for cur in polygon {
        let cur_d = plane_distance(cur, axis, side);
        let cur_in = cur_d >= 0.0;
        let prev_in = prev_d >= 0.0;

        if cur_in != prev_in {
            let t = prev_d / (prev_d - cur_d);
            out.push(VertexData::lerp(prev, cur, t));
        }
        if cur_in {
            out.push(*cur);
        }

        prev = cur;
        prev_d = cur_d;
    }
    out
}

/// Clip a triangle against the view volume and fan-triangulate the result.
/// Returns between 0 and 7 triangles.
pub fn clip_triangle(v0: &VertexData, v1: &VertexData, v2: &VertexData) -> Vec<[VertexData; 3]> {
    if inside_all_planes(v0) && inside_all_planes(v1) && inside_all_planes(v2) {
        return vec![[*v0, *v1, *v2]];
    }

    let mut polygon = vec![*v0, *v1, *v2];
    for &(axis, side) in CLIP_PLANES.iter() {
        polygon = clip_polygon(&polygon, axis, side);
        if polygon.len() < 3 {
            return Vec::new();
        }
    }

    (1..polygon.len() - 1)
        .map(|i| [polygon[0], polygon[i], polygon[i + 1]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec4;

    fn clip_vertex(x: f32, y: f32, z: f32, w: f32) -> VertexData {
        VertexData {
            cpos: Vec4::new(x, y, z, w),
            ..VertexData::default()
        }
    }

    fn assert_in_volume(v: &VertexData) {
        let c = v.cpos;
        let eps = 1e-4;
        assert!(c.w >= W_EPSILON - eps);
        assert!(c.x.abs() <= c.w + eps, "x out: {:?}", c);
        assert!(c.y.abs() <= c.w + eps, "y out: {:?}", c);
        assert!(c.z >= -eps && c.z <= c.w + eps, "z out: {:?}", c);
    }

    #[test]
    fn test_inside_triangle_passes_through() {
        let a = clip_vertex(0.0, 0.0, 0.5, 1.0);
        let b = clip_vertex(0.5, 0.0, 0.5, 1.0);
        let c = clip_vertex(0.0, 0.5, 0.5, 1.0);
        let tris = clip_triangle(&a, &b, &c);
        assert_eq!(tris.len(), 1);
        assert_eq!(tris[0][1], b);
    }

    #[test]
    fn test_one_vertex_behind_near_gives_two_triangles() {
        let behind = clip_vertex(0.0, 0.0, -0.5, 1.0);
        let b = clip_vertex(0.5, 0.0, 0.5, 1.0);
        let c = clip_vertex(0.0, 0.5, 0.5, 1.0);
        let tris = clip_triangle(&behind, &b, &c);
        assert_eq!(tris.len(), 2);
        for tri in &tris {
            for v in tri {
                assert_in_volume(v);
            }
        }
    }

    #[test]
    fn test_vertex_behind_eye_is_clipped() {
        let behind = clip_vertex(0.0, 0.0, -2.0, -1.0);
        let b = clip_vertex(0.5, 0.0, 0.5, 1.0);
        let c = clip_vertex(0.0, 0.5, 0.5, 1.0);
        let tris = clip_triangle(&behind, &b, &c);
        assert!(!tris.is_empty());
        for tri in &tris {
            for v in tri {
                assert_in_volume(v);
            }
        }
    }

    #[test]
    fn test_fully_outside_one_plane_gives_nothing() {
        let a = clip_vertex(2.0, 0.0, 0.5, 1.0);
        let b = clip_vertex(3.0, 0.5, 0.5, 1.0);
        let c = clip_vertex(2.5, -0.5, 0.5, 1.0);
        assert!(clip_triangle(&a, &b, &c).is_empty());

        let a = clip_vertex(0.0, 0.0, -1.0, 1.0);
        let b = clip_vertex(0.5, 0.0, -1.0, 1.0);
        let c = clip_vertex(0.0, 0.5, -1.0, 1.0);
        assert!(clip_triangle(&a, &b, &c).is_empty());
    }

    #[test]
    fn test_split_point_lies_on_plane() {
        let a = clip_vertex(0.0, 0.0, 0.5, 1.0);
        let b = clip_vertex(3.0, 0.0, 0.5, 1.0);
        let c = clip_vertex(0.0, 0.5, 0.5, 1.0);
        let tris = clip_triangle(&a, &b, &c);
        let on_plane = tris
            .iter()
            .flatten()
            .any(|v| (v.cpos.x - v.cpos.w).abs() < 1e-5 && v.cpos.y.abs() < 1e-5);
        assert!(on_plane);
    }

    #[test]
    fn test_large_triangle_output_is_bounded() {
        let a = clip_vertex(-10.0, -10.0, 0.5, 1.0);
        let b = clip_vertex(10.0, -10.0, 0.5, 1.0);
        let c = clip_vertex(0.0, 10.0, 0.5, 1.0);
        let tris = clip_triangle(&a, &b, &c);
        assert!(!tris.is_empty() && tris.len() <= 7);
        for tri in &tris {
            for v in tri {
                assert_in_volume(v);
            }
        }
    }
}

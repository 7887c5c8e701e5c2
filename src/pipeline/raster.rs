//! Triangle rasterization into 2x2 fragment groups
//!
//! Half-space rasterizer with integer edge functions stepped incrementally
//! (Mileff, Nehez, Dudra: "Accelerated half-space triangle rasterization",
//! Acta Polytechnica Hungarica 12(7), 2015).
//!
//! Raster coordinates grow right and down. Pixels are sampled at integer
//! coordinates. Inputs are expected to be perspective pre-corrected; the
//! emitted fragments carry the interpolated pre-corrected values.

use crate::math::Vec3;
use crate::vertex::{QuadFragments, VertexData, INVALID_SPOS};

/// Twice the signed area in raster coordinates. Negative is counter-clockwise
/// as seen on screen.
#[inline]
pub fn signed_area(a: [i32; 2], b: [i32; 2], c: [i32; 2]) -> i64 {
    let e1 = (b[0] as i64 - a[0] as i64, b[1] as i64 - a[1] as i64);
    let e2 = (c[0] as i64 - a[0] as i64, c[1] as i64 - a[1] as i64);
    e1.0 * e2.1 - e1.1 * e2.0
}

/// Edge function `E(P) = (P - A) x (B - A) = i*x + j*y + k`.
/// Positive on the inner side of a counter-clockwise (on screen) triangle.
#[derive(Debug, Clone, Copy)]
struct Edge {
    i: i64,
    j: i64,
    k: i64,
    /// 0 for top-left edges, -1 otherwise
    bias: i64,
}

impl Edge {
    fn new(a: [i32; 2], b: [i32; 2]) -> Self {
        let (ax, ay) = (a[0] as i64, a[1] as i64);
        let (bx, by) = (b[0] as i64, b[1] as i64);
        // Left edges run downward, top edges run leftward along a row
        let top_left = by > ay || (ay == by && bx < ax);
        Self {
            i: by - ay,
            j: ax - bx,
            k: ay * bx - ax * by,
            bias: if top_left { 0 } else { -1 },
        }
    }

    #[inline]
    fn eval(&self, x: i64, y: i64) -> i64 {
        self.i * x + self.j * y + self.k
    }
}

/// Closed-form barycentric weights of `(x, y)`, valid outside the triangle too
fn barycentric_weight(v: &[VertexData; 3], x: i32, y: i32) -> Vec3 {
    let (a, b, c) = (v[0].spos, v[1].spos, v[2].spos);
    let s0 = Vec3::new((c[0] - a[0]) as f32, (b[0] - a[0]) as f32, (a[0] - x) as f32);
    let s1 = Vec3::new((c[1] - a[1]) as f32, (b[1] - a[1]) as f32, (a[1] - y) as f32);
    let uf = s0.cross(s1);
    Vec3::new(1.0 - (uf.x + uf.y) / uf.z, uf.y / uf.z, uf.x / uf.z)
}

/// Rasterize a filled triangle, appending every 2x2 block with at least one
/// covered pixel. Uncovered lanes of an emitted block still get an
/// interpolated value (for derivatives) and the invalid screen sentinel.
pub fn rasterize_fill_edge_function(
    v0: &VertexData,
    v1: &VertexData,
    v2: &VertexData,
    screen_width: usize,
    screen_height: usize,
    rasterized: &mut Vec<QuadFragments>,
) {
    let mut v = [*v0, *v1, *v2];

    // Enforce counter-clockwise order
    if signed_area(v[0].spos, v[1].spos, v[2].spos) > 0 {
        v.swap(1, 2);
    }

    let min_x = v.iter().map(|p| p.spos[0]).min().unwrap_or(0).max(0);
    let min_y = v.iter().map(|p| p.spos[1]).min().unwrap_or(0).max(0);
    let max_x = v.iter().map(|p| p.spos[0]).max().unwrap_or(-1).min(screen_width as i32 - 1);
    let max_y = v.iter().map(|p| p.spos[1]).max().unwrap_or(-1).min(screen_height as i32 - 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    let (a, b, c) = (v[0].spos, v[1].spos, v[2].spos);
    // e_ab weights C, e_bc weights A, e_ca weights B
    let e_ab = Edge::new(a, b);
    let e_bc = Edge::new(b, c);
    let e_ca = Edge::new(c, a);

    let (x0, y0) = (min_x as i64, min_y as i64);
    let mut row = [e_bc.eval(x0, y0), e_ca.eval(x0, y0), e_ab.eval(x0, y0)];

    // Degenerated to a line or a point
    let total = row[0] + row[1] + row[2];
    if total == 0 {
        return;
    }
    let one_div_total = 1.0 / total as f32;
    let step_x = [e_bc.i, e_ca.i, e_ab.i];
    let step_y = [e_bc.j, e_ca.j, e_ab.j];
    let bias = [e_bc.bias, e_ca.bias, e_ab.bias];

    let lane = |x: i32, y: i32, e: [i64; 3], out: &mut VertexData| -> bool {
        if x > max_x || y > max_y {
            return false;
        }
        if e[0] + bias[0] >= 0 && e[1] + bias[1] >= 0 && e[2] + bias[2] >= 0 {
            let w = Vec3::new(e[0] as f32, e[1] as f32, e[2] as f32) * one_div_total;
            *out = VertexData::barycentric_lerp(&v[0], &v[1], &v[2], w);
            out.spos = [x, y];
            return true;
        }
        false
    };

    let add = |e: [i64; 3], d: [i64; 3]| [e[0] + d[0], e[1] + d[1], e[2] + d[2]];
    let step_xy = add(step_x, step_y);
    let offsets = [(0, 0), (1, 0), (0, 1), (1, 1)];

    let mut y = min_y;
    while y <= max_y {
        let mut cx = row;
        let mut x = min_x;
        while x <= max_x {
            let lane_edges = [cx, add(cx, step_x), add(cx, step_y), add(cx, step_xy)];
            let mut group = [VertexData::invalid(); 4];
            let mut inside = [false; 4];
            for l in 0..4 {
                let (dx, dy) = offsets[l];
                inside[l] = lane(x + dx, y + dy, lane_edges[l], &mut group[l]);
            }

            if inside.iter().any(|&i| i) {
                for l in 0..4 {
                    if !inside[l] {
                        let (dx, dy) = offsets[l];
                        let w = barycentric_weight(&v, x + dx, y + dy);
                        group[l] = VertexData::barycentric_lerp(&v[0], &v[1], &v[2], w);
                        group[l].spos = INVALID_SPOS;
                    }
                }
                rasterized.push(QuadFragments::new(group));
            }

            cx = add(cx, [2 * step_x[0], 2 * step_x[1], 2 * step_x[2]]);
            x += 2;
        }
        row = add(row, [2 * step_y[0], 2 * step_y[1], 2 * step_y[2]]);
        y += 2;
    }
}

/// Rasterize the three edges with Bresenham. Each edge is half-open so shared
/// corners are drawn once. Every pixel becomes a block whose other lanes
/// repeat it as invalid, so its UV derivatives are zero.
pub fn rasterize_wire(
    v0: &VertexData,
    v1: &VertexData,
    v2: &VertexData,
    screen_width: usize,
    screen_height: usize,
    rasterized: &mut Vec<QuadFragments>,
) {
    for (from, to) in [(v0, v1), (v1, v2), (v2, v0)] {
        rasterize_line(from, to, screen_width, screen_height, rasterized);
    }
}

fn rasterize_line(
    from: &VertexData,
    to: &VertexData,
    screen_width: usize,
    screen_height: usize,
    rasterized: &mut Vec<QuadFragments>,
) {
    let (mut x, mut y) = (from.spos[0], from.spos[1]);
    let (x1, y1) = (to.spos[0], to.spos[1]);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let steps = dx.max(-dy);
    let mut err = dx + dy;

    for step in 0..steps {
        if x >= 0 && y >= 0 && (x as usize) < screen_width && (y as usize) < screen_height {
            let mut p = VertexData::lerp(from, to, step as f32 / steps as f32);
            p.spos = [x, y];
            let mut hidden = p;
            hidden.spos = INVALID_SPOS;
            rasterized.push(QuadFragments::new([p, hidden, hidden, hidden]));
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Vec2, Vec4};
    use std::collections::HashMap;

    fn sv(x: i32, y: i32) -> VertexData {
        VertexData {
            spos: [x, y],
            tex: Vec2::new(x as f32, y as f32),
            ..VertexData::default()
        }
    }

    fn coverage(tris: &[[VertexData; 3]], w: usize, h: usize) -> HashMap<(i32, i32), u32> {
        let mut hits = HashMap::new();
        for t in tris {
            let mut quads = Vec::new();
            rasterize_fill_edge_function(&t[0], &t[1], &t[2], w, h, &mut quads);
            for q in &quads {
                for f in q.fragments.iter().filter(|f| f.is_valid()) {
                    *hits.entry((f.spos[0], f.spos[1])).or_insert(0) += 1;
                }
            }
        }
        hits
    }

    #[test]
    fn test_fill_rule_two_triangles_tile_rectangle_once() {
        for (w, h) in [(8, 6), (7, 5), (16, 16), (3, 9)] {
            // Both windings to exercise the reorder path
            let tris = [
                [sv(0, 0), sv(0, h), sv(w, h)],
                [sv(0, 0), sv(w, 0), sv(w, h)],
            ];
            let hits = coverage(&tris, 64, 64);
            assert_eq!(hits.len(), (w * h) as usize, "coverage for {}x{}", w, h);
            for y in 0..h {
                for x in 0..w {
                    assert_eq!(hits.get(&(x, y)), Some(&1), "pixel ({}, {}) in {}x{}", x, y, w, h);
                }
            }
        }
    }

    #[test]
    fn test_fill_rule_shared_edge_inside_screen() {
        // A quad with a slanted shared edge, offset from the origin
        let tris = [
            [sv(3, 2), sv(13, 5), sv(4, 12)],
            [sv(13, 5), sv(15, 14), sv(4, 12)],
        ];
        let hits = coverage(&tris, 32, 32);
        assert!(hits.values().all(|&n| n == 1));
    }

    #[test]
    fn test_degenerate_triangle_emits_nothing() {
        let mut quads = Vec::new();
        rasterize_fill_edge_function(&sv(0, 0), &sv(5, 5), &sv(10, 10), 32, 32, &mut quads);
        assert!(quads.is_empty());
        rasterize_fill_edge_function(&sv(4, 4), &sv(4, 4), &sv(4, 4), 32, 32, &mut quads);
        assert!(quads.is_empty());
    }

    #[test]
    fn test_offscreen_triangle_emits_nothing() {
        let mut quads = Vec::new();
        rasterize_fill_edge_function(&sv(-20, -20), &sv(-10, -20), &sv(-20, -10), 32, 32, &mut quads);
        assert!(quads.is_empty());
    }

    #[test]
    fn test_invalid_lanes_are_interpolated() {
        let mut quads = Vec::new();
        rasterize_fill_edge_function(&sv(0, 0), &sv(0, 9), &sv(9, 0), 16, 16, &mut quads);
        let partial = quads
            .iter()
            .find(|q| q.valid_count() > 0 && q.valid_count() < 4)
            .expect("edge blocks exist");
        for (l, f) in partial.fragments.iter().enumerate() {
            // tex was seeded with the raster position, so it is affine in (x, y)
            let base = partial.fragments.iter().find(|f| f.is_valid()).unwrap();
            let bl = partial.fragments.iter().position(|f| f.is_valid()).unwrap();
            let expected_dx = (l % 2) as f32 - (bl % 2) as f32;
            let expected_dy = (l / 2) as f32 - (bl / 2) as f32;
            assert!((f.tex.x - base.tex.x - expected_dx).abs() < 1e-4);
            assert!((f.tex.y - base.tex.y - expected_dy).abs() < 1e-4);
        }
        let (dx, dy) = partial.uv_derivatives();
        assert!((dx.x - 1.0).abs() < 1e-4 && dy.y.abs() > 0.99);
    }

    #[test]
    fn test_interior_value_matches_vertex_at_corner() {
        let mut a = sv(0, 0);
        a.col = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let mut b = sv(0, 8);
        b.col = Vec4::new(0.0, 1.0, 0.0, 1.0);
        let mut c = sv(8, 0);
        c.col = Vec4::new(0.0, 0.0, 1.0, 1.0);
        let mut quads = Vec::new();
        rasterize_fill_edge_function(&a, &b, &c, 16, 16, &mut quads);
        let corner = quads
            .iter()
            .flat_map(|q| q.fragments.iter())
            .find(|f| f.spos == [0, 0])
            .expect("top-left corner is covered");
        assert!((corner.col.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_wire_draws_edges_once() {
        let mut quads = Vec::new();
        rasterize_wire(&sv(0, 0), &sv(0, 4), &sv(4, 0), 16, 16, &mut quads);
        // 4 + 4 + 4 steps around the outline
        assert_eq!(quads.len(), 12);
        let mut seen = std::collections::HashSet::new();
        for q in &quads {
            assert_eq!(q.valid_count(), 1);
            assert!(seen.insert(q.fragments[0].spos));
            assert_eq!(q.uv_derivatives(), (Vec2::ZERO, Vec2::ZERO));
        }
    }

    #[test]
    fn test_signed_area_orientation() {
        // Down the left side, then over to the top right: counter-clockwise on screen
        assert!(signed_area([0, 0], [0, 10], [10, 0]) < 0);
        assert!(signed_area([0, 0], [10, 0], [0, 10]) > 0);
        assert_eq!(signed_area([0, 0], [1, 1], [2, 2]), 0);
    }
}

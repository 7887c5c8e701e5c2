//! Interpolable per-vertex record and the 2x2 fragment group

use crate::math::{mat3_identity, Mat3, Vec2, Vec3, Vec4};

/// Raster coordinate carried by lanes that are outside the triangle
pub const INVALID_SPOS: [i32; 2] = [-1, -1];

/// One vertex, or one interpolated fragment.
///
/// `pos` starts in local space and is world space after the vertex shader.
/// While a triangle is being rasterized the smooth attributes are stored
/// divided by clip `w`, and `pos.w` holds `1/w`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexData {
    pub pos: Vec4,
    pub col: Vec4,
    pub nor: Vec3,
    pub tex: Vec2,
    /// Clip position; NDC xyz (keeping clip w) after the perspective divide
    pub cpos: Vec4,
    pub spos: [i32; 2],
    /// Columns: tangent, bitangent, normal. Flat across a primitive.
    pub tbn: Mat3,
}

impl Default for VertexData {
    fn default() -> Self {
        Self {
            pos: Vec4::new(0.0, 0.0, 0.0, 1.0),
            col: Vec4::ONE,
            nor: Vec3::ZERO,
            tex: Vec2::ZERO,
            cpos: Vec4::new(0.0, 0.0, 0.0, 1.0),
            spos: [0, 0],
            tbn: mat3_identity(),
        }
    }
}

impl VertexData {
    /// A fragment slot that is outside its triangle
    pub fn invalid() -> Self {
        Self {
            spos: INVALID_SPOS,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.spos != INVALID_SPOS
    }

    /// `(1-frac)*v0 + frac*v1` for every smooth attribute; `tbn` from `v0`.
    pub fn lerp(v0: &VertexData, v1: &VertexData, frac: f32) -> VertexData {
        let a = 1.0 - frac;
        VertexData {
            pos: a * v0.pos + frac * v1.pos,
            col: a * v0.col + frac * v1.col,
            nor: a * v0.nor + frac * v1.nor,
            tex: a * v0.tex + frac * v1.tex,
            cpos: a * v0.cpos + frac * v1.cpos,
            spos: [
                (a * v0.spos[0] as f32 + frac * v1.spos[0] as f32) as i32,
                (a * v0.spos[1] as f32 + frac * v1.spos[1] as f32) as i32,
            ],
            tbn: v0.tbn,
        }
    }

    /// Weighted sum `w.x*v0 + w.y*v1 + w.z*v2`; `tbn` from `v0`.
    pub fn barycentric_lerp(v0: &VertexData, v1: &VertexData, v2: &VertexData, w: Vec3) -> VertexData {
        VertexData {
            pos: w.x * v0.pos + w.y * v1.pos + w.z * v2.pos,
            col: w.x * v0.col + w.y * v1.col + w.z * v2.col,
            nor: w.x * v0.nor + w.y * v1.nor + w.z * v2.nor,
            tex: w.x * v0.tex + w.y * v1.tex + w.z * v2.tex,
            cpos: w.x * v0.cpos + w.y * v1.cpos + w.z * v2.cpos,
            spos: [
                (w.x * v0.spos[0] as f32 + w.y * v1.spos[0] as f32 + w.z * v2.spos[0] as f32) as i32,
                (w.x * v0.spos[1] as f32 + w.y * v1.spos[1] as f32 + w.z * v2.spos[1] as f32) as i32,
            ],
            tbn: v0.tbn,
        }
    }

    /// Divide the smooth attributes by clip `w` before screen-space
    /// interpolation. `pos.w` receives `1/w`.
    pub fn pre_persp_correction(v: &mut VertexData) {
        let one_div_w = 1.0 / v.cpos.w;
        v.pos = Vec4::new(v.pos.x * one_div_w, v.pos.y * one_div_w, v.pos.z * one_div_w, one_div_w);
        v.tex = v.tex * one_div_w;
        v.nor = v.nor * one_div_w;
        v.col = v.col * one_div_w;
    }

    /// Undo [`VertexData::pre_persp_correction`] on an interpolated value,
    /// using the interpolated `1/w` in `pos.w`.
    pub fn aft_persp_correction(v: &mut VertexData) {
        let w = 1.0 / v.pos.w;
        v.pos = Vec4::new(v.pos.x * w, v.pos.y * w, v.pos.z * w, v.pos.w);
        v.tex = v.tex * w;
        v.nor = v.nor * w;
        v.col = v.col * w;
    }

    /// Fragment depth in NDC (`0` near, `1` far)
    #[inline]
    pub fn depth(&self) -> f32 {
        self.cpos.z
    }
}

/// 2x2 pixel block. Lanes: `(x,y)`, `(x+1,y)`, `(x,y+1)`, `(x+1,y+1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadFragments {
    pub fragments: [VertexData; 4],
}

impl QuadFragments {
    pub fn new(fragments: [VertexData; 4]) -> Self {
        Self { fragments }
    }

    /// Screen-space texcoord derivatives across the block
    pub fn uv_derivatives(&self) -> (Vec2, Vec2) {
        let f = &self.fragments;
        (f[1].tex - f[0].tex, f[2].tex - f[0].tex)
    }

    pub fn valid_count(&self) -> usize {
        self.fragments.iter().filter(|f| f.is_valid()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vertex(p: [f32; 4], c: [f32; 4], t: [f32; 2], n: [f32; 3], w: f32) -> VertexData {
        VertexData {
            pos: Vec4::new(p[0], p[1], p[2], p[3]),
            col: Vec4::new(c[0], c[1], c[2], c[3]),
            tex: Vec2::new(t[0], t[1]),
            nor: Vec3::new(n[0], n[1], n[2]),
            cpos: Vec4::new(0.0, 0.0, 0.0, w),
            ..VertexData::default()
        }
    }

    fn arb_vertex() -> impl Strategy<Value = VertexData> {
        (
            prop::array::uniform4(-100.0f32..100.0),
            prop::array::uniform4(0.0f32..1.0),
            prop::array::uniform2(-4.0f32..4.0),
            prop::array::uniform3(-1.0f32..1.0),
            0.1f32..50.0,
        )
            .prop_map(|(p, c, t, n, w)| vertex(p, c, t, n, w))
    }

    proptest! {
        #[test]
        fn prop_lerp_is_linear(v0 in arb_vertex(), v1 in arb_vertex(), frac in 0.0f32..=1.0) {
            let r = VertexData::lerp(&v0, &v1, frac);
            let a = 1.0 - frac;
            prop_assert_eq!(r.pos.x, a * v0.pos.x + frac * v1.pos.x);
            prop_assert_eq!(r.pos.w, a * v0.pos.w + frac * v1.pos.w);
            prop_assert_eq!(r.col.y, a * v0.col.y + frac * v1.col.y);
            prop_assert_eq!(r.tex.x, a * v0.tex.x + frac * v1.tex.x);
            prop_assert_eq!(r.tex.y, a * v0.tex.y + frac * v1.tex.y);
            prop_assert_eq!(r.tbn, v0.tbn);
        }

        #[test]
        fn prop_barycentric_stays_in_hull(
            v0 in arb_vertex(), v1 in arb_vertex(), v2 in arb_vertex(),
            a in 0.0f32..1.0, b in 0.0f32..1.0,
        ) {
            // Fold (a, b) into the unit simplex
            let (a, b) = if a + b > 1.0 { (1.0 - a, 1.0 - b) } else { (a, b) };
            let w = Vec3::new(a, b, 1.0 - a - b);
            let r = VertexData::barycentric_lerp(&v0, &v1, &v2, w);
            let eps = 1e-3;
            for (val, xs) in [
                (r.col.x, [v0.col.x, v1.col.x, v2.col.x]),
                (r.tex.x, [v0.tex.x, v1.tex.x, v2.tex.x]),
                (r.tex.y, [v0.tex.y, v1.tex.y, v2.tex.y]),
                (r.pos.z, [v0.pos.z, v1.pos.z, v2.pos.z]),
            ] {
                let lo = xs[0].min(xs[1]).min(xs[2]);
                let hi = xs[0].max(xs[1]).max(xs[2]);
                prop_assert!(val >= lo - eps && val <= hi + eps);
            }
        }

        #[test]
        fn prop_persp_correction_round_trip(v in arb_vertex()) {
            let mut c = v;
            VertexData::pre_persp_correction(&mut c);
            VertexData::aft_persp_correction(&mut c);
            let close = |a: f32, b: f32| (a - b).abs() <= 1e-4 * (1.0 + b.abs());
            prop_assert!(close(c.pos.x, v.pos.x) && close(c.pos.y, v.pos.y) && close(c.pos.z, v.pos.z));
            prop_assert!(close(c.tex.x, v.tex.x) && close(c.tex.y, v.tex.y));
            prop_assert!(close(c.nor.x, v.nor.x) && close(c.nor.z, v.nor.z));
            prop_assert!(close(c.col.x, v.col.x) && close(c.col.w, v.col.w));
        }
    }

    #[test]
    fn test_pre_correction_stores_inverse_w() {
        let mut v = vertex([2.0, 4.0, 6.0, 1.0], [1.0; 4], [1.0, 1.0], [0.0, 0.0, 1.0], 2.0);
        VertexData::pre_persp_correction(&mut v);
        assert_eq!(v.pos, Vec4::new(1.0, 2.0, 3.0, 0.5));
        assert_eq!(v.tex, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn test_lerp_endpoints() {
        let v0 = vertex([0.0; 4], [0.0; 4], [0.0, 0.0], [0.0; 3], 1.0);
        let mut v1 = vertex([1.0; 4], [1.0; 4], [1.0, 1.0], [1.0; 3], 1.0);
        v1.spos = [10, 20];
        assert_eq!(VertexData::lerp(&v0, &v1, 0.0).pos, v0.pos);
        assert_eq!(VertexData::lerp(&v0, &v1, 1.0).spos, [10, 20]);
    }

    #[test]
    fn test_invalid_sentinel() {
        assert!(!VertexData::invalid().is_valid());
        assert!(VertexData::default().is_valid());
    }
}

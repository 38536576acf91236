// q_shared.rs — foundational types and functions shared by all modules

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

// ============================================================
// Error codes
// ============================================================

pub const ERR_FATAL: i32 = 4;
pub const ERR_DROP: i32 = 8;
pub const ERR_QUIT: i32 = 16;

// ============================================================
// Cvar flags
// ============================================================

pub const CVAR_ZERO: i32 = 0;
pub const CVAR_ARCHIVE: i32 = 1;
pub const CVAR_NOSET: i32 = 8;
/// Read-only to the user; code may still change it with `force_set`.
pub const CVAR_ROM: i32 = 32;
/// Changing this cvar requires a full refresh restart.
pub const CVAR_REFRESH: i32 = 64;
/// Changing this cvar requires renderer media to be reloaded.
pub const CVAR_FILES: i32 = 128;

// ============================================================
// MATHLIB — Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

/// Linear interpolation from `a` to `b` by `frac`.
#[inline]
pub fn vector_lerp(a: &Vec3, b: &Vec3, frac: f32) -> Vec3 {
    [
        a[0] + (b[0] - a[0]) * frac,
        a[1] + (b[1] - a[1]) * frac,
        a[2] + (b[2] - a[2]) * frac,
    ]
}

#[inline]
pub fn vector_min(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])]
}

#[inline]
pub fn vector_clamp(v: &Vec3, lo: f32, hi: f32) -> Vec3 {
    [v[0].clamp(lo, hi), v[1].clamp(lo, hi), v[2].clamp(lo, hi)]
}

/// Hermite smoothstep between two edges, clamped to [0, 1].
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// GLSL-style step: 0.0 when x < edge, 1.0 otherwise.
#[inline]
pub fn step(edge: f32, x: f32) -> f32 {
    if x < edge { 0.0 } else { 1.0 }
}

#[inline]
pub fn lerp(a: f32, b: f32, frac: f32) -> f32 {
    a + (b - a) * frac
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_ops() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_eq!(dot_product(&a, &b), 32.0);
        assert_eq!(vector_scale(&a, 2.0), [2.0, 4.0, 6.0]);
        assert_eq!(vector_lerp(&a, &b, 0.5), [2.5, 3.5, 4.5]);
        assert_eq!(vector_min(&a, &[0.0, 9.0, 3.0]), [0.0, 2.0, 3.0]);
        assert_eq!(vector_clamp(&[-1.0, 0.5, 2.0], 0.0, 1.0), [0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_step() {
        assert_eq!(step(1.0, 0.5), 0.0);
        assert_eq!(step(1.0, 1.0), 1.0);
        assert_eq!(step(1.0, 3.0), 1.0);
    }
}

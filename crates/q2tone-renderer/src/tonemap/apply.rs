//! Tone mapping kernel
//!
//! Runs in place over the frame color buffer. The grid is split into 16x16
//! work groups: bands of 16 rows are dispatched over rayon, columns within a
//! band are walked in 16-wide tiles. Every invocation reads the shared curve
//! and uniforms and writes exactly one pixel; pixels outside the output
//! rectangle are left untouched.

use rayon::prelude::*;

use q2tone_common::q_shared::{
    lerp, smoothstep, step, vector_clamp, vector_lerp, vector_min, vector_scale, Vec3, Vec4,
};

use super::blue_noise::BlueNoise;
use super::curve::{ToneCurve, ToneCurveBuffer};
use super::debug_overlay::DebugOverlay;
use super::params::{KneeConstants, ToneMapUniforms};
use super::{
    linear_to_srgb, luminance, luminance_to_bin, srgb_to_linear, GROUP_SIZE, MIN_LUMINANCE,
    SCRGB_REFERENCE_NITS,
};
use crate::framebuffer::FrameColorBuffer;

/// Luminance the legacy Reinhard operator maps the adapted luminance to.
const REINHARD_KEY: f32 = 0.18;

/// Everything one kernel invocation reads besides its own pixel.
pub struct KernelInputs<'a> {
    pub curve: &'a ToneCurve,
    pub ubo: &'a ToneMapUniforms,
    pub knee: &'a KneeConstants,
    pub noise: &'a BlueNoise,
    pub overlay: Option<DebugOverlay>,
}

/// Dispatch the kernel over `frame`. The front curve stays read-locked until
/// every pixel is written.
pub fn tone_mapping_apply(
    frame: &mut FrameColorBuffer,
    curves: &ToneCurveBuffer,
    ubo: &ToneMapUniforms,
    knee: &KneeConstants,
    noise: &BlueNoise,
) {
    let width = frame.width as usize;
    if width == 0 || frame.height == 0 {
        return;
    }

    let curve = curves.front();
    let inputs = KernelInputs {
        curve: &curve,
        ubo,
        knee,
        noise,
        overlay: DebugOverlay::new(ubo, &curve),
    };

    frame.pixels
        .par_chunks_mut(width * GROUP_SIZE)
        .enumerate()
        .for_each(|(band, rows)| {
            let y0 = band * GROUP_SIZE;
            for tile_x in (0..width).step_by(GROUP_SIZE) {
                let tile_end = (tile_x + GROUP_SIZE).min(width);
                for (row_idx, row) in rows.chunks_mut(width).enumerate() {
                    let y = (y0 + row_idx) as u32;
                    for x in tile_x..tile_end {
                        let x = x as u32;
                        if x >= ubo.output_width || y >= ubo.output_height {
                            continue;
                        }
                        let pixel = &mut row[x as usize];
                        *pixel = tonemap_pixel(*pixel, x, y, &inputs);
                    }
                }
            }
        });
}

/// Full per-pixel pipeline.
pub fn tonemap_pixel(input: Vec4, x: u32, y: u32, k: &KernelInputs) -> Vec4 {
    let ubo = k.ubo;
    let hdr = ubo.hdr_enabled != 0;

    let mut color = vector_scale(&[input[0], input[1], input[2]], 1.0 / ubo.storage_scale);
    color = apply_colorize(color, ubo.colorize);
    color = apply_blend(color, x, y, ubo, k.curve.adapted_luminance);

    let scene = color;
    color = map_luminance(color, k.curve, ubo.exposure_bias);

    if !hdr {
        color = apply_knee(color, k.knee, ubo.knee_start);
    }

    if ubo.reinhard_mix > 0.0 {
        let legacy = reinhard_legacy(scene, ubo.exposure_bias, k.curve.adapted_luminance, ubo.white_point);
        color = vector_lerp(&color, &legacy, ubo.reinhard_mix);
    }

    if hdr {
        color = apply_hdr(color, ubo);
    } else {
        color = vector_clamp(&color, 0.0, 1.0);
        if ubo.dither_enabled != 0 {
            for (ch, c) in color.iter_mut().enumerate() {
                let noise = k.noise.sample(ubo.frame_num, x, y, ch);
                *c = (*c + dither_offset(*c, noise)).clamp(0.0, 1.0);
            }
        }
    }

    if let Some(shade) = k.overlay.as_ref().and_then(|o| o.shade(x, y)) {
        let mut overlay: Vec3 = [shade[0], shade[1], shade[2]];
        if hdr {
            overlay = vector_scale(&overlay, ubo.ui_hdr_nits / SCRGB_REFERENCE_NITS);
        }
        color = vector_lerp(&color, &overlay, shade[3]);
    }

    [color[0], color[1], color[2], input[3]]
}

// ============================================================
// Stages
// ============================================================

/// Pull the color toward `colorize.rgb` at the pixel's own luminance, by
/// `colorize.a`.
#[inline]
pub fn apply_colorize(color: Vec3, colorize: Vec4) -> Vec3 {
    let strength = colorize[3];
    if strength <= 0.0 {
        return color;
    }
    let tint = [colorize[0], colorize[1], colorize[2]];
    let target = vector_scale(&tint, luminance(&color) / luminance(&tint).max(MIN_LUMINANCE));
    vector_lerp(&color, &target, strength)
}

/// Full-screen blend. The blend color is rescaled to the adapted luminance
/// so it reads the same at any exposure. With a non-zero falloff the alpha
/// grows from the screen center toward the corners.
#[inline]
pub fn apply_blend(color: Vec3, x: u32, y: u32, ubo: &ToneMapUniforms, adapted_luminance: f32) -> Vec3 {
    let alpha = ubo.blend_color[3].min(ubo.blend_max_alpha) * blend_falloff(x, y, ubo);
    if alpha <= 0.0 {
        return color;
    }
    let rgb = [ubo.blend_color[0], ubo.blend_color[1], ubo.blend_color[2]];
    let target = vector_scale(&rgb, adapted_luminance / luminance(&rgb).max(MIN_LUMINANCE));
    vector_lerp(&color, &target, alpha)
}

/// `smoothstep(0, 1, r)^falloff`, r = 0 at the center and 1 at the corners.
#[inline]
fn blend_falloff(x: u32, y: u32, ubo: &ToneMapUniforms) -> f32 {
    if ubo.blend_falloff <= 0.0 {
        return 1.0;
    }
    let w = ubo.output_width.max(1) as f32;
    let h = ubo.output_height.max(1) as f32;
    let dx = (x as f32 + 0.5) / w * 2.0 - 1.0;
    let dy = (y as f32 + 0.5) / h * 2.0 - 1.0;
    let r = ((dx * dx + dy * dy) * 0.5).sqrt();
    smoothstep(0.0, 1.0, r).powf(ubo.blend_falloff)
}

/// Look the pixel's luminance up in the curve and rescale the color to the
/// mapped luminance, preserving chroma.
#[inline]
pub fn map_luminance(color: Vec3, curve: &ToneCurve, exposure_bias: f32) -> Vec3 {
    let lum = luminance(&color).max(MIN_LUMINANCE);
    let mapped = (curve.sample(luminance_to_bin(lum)) + exposure_bias).exp2();
    vector_scale(&color, mapped / lum)
}

/// Soft knee on every channel above `knee_start`.
#[inline]
pub fn apply_knee(color: Vec3, knee: &KneeConstants, knee_start: f32) -> Vec3 {
    let mut out = color;
    for c in out.iter_mut() {
        let mask = step(knee_start, *c);
        // Evaluated at or above the start so the unused branch stays finite
        let shoulder = knee.eval(c.max(knee_start));
        *c = lerp(*c, shoulder, mask);
    }
    out
}

/// Extended Reinhard, `x(1 + x/W^2)/(1 + x)`, on the exposure-scaled scene
/// color.
#[inline]
pub fn reinhard_legacy(scene: Vec3, exposure_bias: f32, adapted_luminance: f32, white: f32) -> Vec3 {
    let exposure = exposure_bias.exp2() * REINHARD_KEY / adapted_luminance.max(MIN_LUMINANCE);
    let w2 = white * white;
    let mut out = vector_scale(&scene, exposure);
    for c in out.iter_mut() {
        let x = c.max(0.0);
        *c = x * (1.0 + x / w2) / (1.0 + x);
    }
    out
}

/// scRGB output: scale to the display peak, hold UI regions down to the UI
/// brightness, then adjust saturation around luminance.
#[inline]
pub fn apply_hdr(color: Vec3, ubo: &ToneMapUniforms) -> Vec3 {
    let mut out = vector_scale(&color, ubo.hdr_peak_nits / SCRGB_REFERENCE_NITS);
    if ubo.ui_overlay != 0 {
        let cap = ubo.ui_hdr_nits / SCRGB_REFERENCE_NITS;
        let clamped = vector_min(&out, &[cap; 3]);
        out = vector_lerp(&out, &clamped, ubo.ui_clamp_strength);
    }
    let lum = luminance(&out);
    for c in out.iter_mut() {
        *c = lum + (*c - lum) * ubo.hdr_saturation;
    }
    out
}

/// Linear-space size of one 8-bit sRGB step up from `c`, or zero if `c`
/// already encodes to an exact 8-bit value.
#[inline]
pub fn dither_amplitude(c: f32) -> f32 {
    let encoded = linear_to_srgb(c) * 255.0;
    let frac = encoded.fract();
    let representable = frac < 1.0e-3 || frac > 1.0 - 1.0e-3;
    let delta = srgb_to_linear((encoded + 1.0).min(255.0) / 255.0) - c;
    if representable {
        0.0
    } else {
        delta
    }
}

/// Zero-mean dither offset for `c` given a noise value in (0, 1).
#[inline]
pub fn dither_offset(c: f32, noise: f32) -> f32 {
    (noise - 0.5) * dither_amplitude(c)
}

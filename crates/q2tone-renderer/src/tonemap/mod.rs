//! HDR tone mapping
//!
//! Histogram-driven, temporally adapted tone mapping for SDR and HDR
//! display targets.
//!
//! Per frame the stages run in this order:
//! - `histogram`: log-luminance histogram of the frame
//! - `curve`: adaptation + histogram adjustment into a tone curve, published
//!   through the double-buffered `ToneCurveBuffer`
//! - `apply`: the per-pixel kernel (colorize, blend, curve lookup, knee or
//!   HDR scaling, dithering, debug overlay), in place over the frame
//!
//! The histogram builder and the kernel must agree on how luminance maps to
//! a bin coordinate; both go through `luminance_to_bin`.

pub mod apply;
pub mod blue_noise;
pub mod curve;
pub mod debug_overlay;
pub mod histogram;
pub mod params;

pub use apply::tone_mapping_apply;
pub use blue_noise::BlueNoise;
pub use curve::{ToneCurve, ToneCurveBuffer, ToneCurveBuilder};
pub use debug_overlay::DebugOverlay;
pub use histogram::build_histogram;
pub use params::{KneeConstants, ToneMapUniforms, TonemapSettings};

use q2tone_common::q_shared::{dot_product, Vec3};

/// Number of histogram bins / tone curve nodes.
pub const HISTOGRAM_BINS: usize = 128;

/// log2 luminance of the first curve node.
pub const HISTOGRAM_MIN_LOG_LUMINANCE: f32 = -12.0;
/// log2 luminance of the last curve node.
pub const HISTOGRAM_MAX_LOG_LUMINANCE: f32 = 4.0;

/// Bin coordinate = log2(L) * SCALE + BIAS.
pub const HISTOGRAM_LOG_SCALE: f32 =
    (HISTOGRAM_BINS - 1) as f32 / (HISTOGRAM_MAX_LOG_LUMINANCE - HISTOGRAM_MIN_LOG_LUMINANCE);
pub const HISTOGRAM_LOG_BIAS: f32 = -HISTOGRAM_MIN_LOG_LUMINANCE * HISTOGRAM_LOG_SCALE;

/// Luminance floor; keeps log2 finite for black pixels.
pub const MIN_LUMINANCE: f32 = 1.0e-7;

/// Kernel work-group edge, in pixels.
pub const GROUP_SIZE: usize = 16;

/// Reference white for scRGB output: 1.0 equals 80 nits.
pub const SCRGB_REFERENCE_NITS: f32 = 80.0;

// Binding slots shared by the histogram stage and the kernel.
pub const BINDING_FRAME_COLOR: u32 = 0;
pub const BINDING_TONE_CURVE: u32 = 1;
pub const BINDING_UNIFORMS: u32 = 2;
pub const BINDING_BLUE_NOISE: u32 = 3;

const REC709_LUMA: Vec3 = [0.2126, 0.7152, 0.0722];

/// Relative luminance of a linear Rec.709 color.
#[inline]
pub fn luminance(color: &Vec3) -> f32 {
    dot_product(color, &REC709_LUMA)
}

/// Map a linear luminance to a (fractional) bin coordinate.
///
/// Node `i` sits at coordinate `i`; the result is not clamped.
#[inline]
pub fn luminance_to_bin(lum: f32) -> f32 {
    lum.max(MIN_LUMINANCE).log2() * HISTOGRAM_LOG_SCALE + HISTOGRAM_LOG_BIAS
}

/// log2 luminance at curve node `bin`.
#[inline]
pub fn bin_to_log_luminance(bin: f32) -> f32 {
    (bin - HISTOGRAM_LOG_BIAS) / HISTOGRAM_LOG_SCALE
}

/// sRGB OETF.
#[inline]
pub fn linear_to_srgb(c: f32) -> f32 {
    if c < 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// sRGB EOTF.
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_transform_endpoints() {
        let lo = luminance_to_bin(HISTOGRAM_MIN_LOG_LUMINANCE.exp2());
        let hi = luminance_to_bin(HISTOGRAM_MAX_LOG_LUMINANCE.exp2());
        assert!(lo.abs() < 1e-4);
        assert!((hi - (HISTOGRAM_BINS - 1) as f32).abs() < 1e-3);
    }

    #[test]
    fn test_bin_transform_inverse() {
        for bin in [0.0, 10.5, 63.0, 127.0] {
            let log_lum = bin_to_log_luminance(bin);
            assert!((luminance_to_bin(log_lum.exp2()) - bin).abs() < 1e-3);
        }
    }

    #[test]
    fn test_black_is_floored() {
        assert!(luminance_to_bin(0.0).is_finite());
        assert_eq!(luminance_to_bin(0.0), luminance_to_bin(MIN_LUMINANCE));
    }

    #[test]
    fn test_srgb_roundtrip() {
        for v in [0.0, 0.002, 0.18, 0.5, 1.0] {
            assert!((srgb_to_linear(linear_to_srgb(v)) - v).abs() < 1e-5);
        }
    }

    #[test]
    fn test_luminance_white() {
        assert!((luminance(&[1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
    }
}

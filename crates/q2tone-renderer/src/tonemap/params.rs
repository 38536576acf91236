//! Tone mapping parameters: cvar-backed settings, the per-frame uniform
//! block and the knee push constants.

use bytemuck::{Pod, Zeroable};

use q2tone_common::cvar::CvarContext;
use q2tone_common::q_shared::{Vec4, CVAR_ARCHIVE};

/// Debug visualization modes (`tm_debug`).
pub const TM_DEBUG_OFF: u32 = 0;
pub const TM_DEBUG_HISTOGRAM: u32 = 1;
pub const TM_DEBUG_CURVE: u32 = 2;

/// Default per-cvar values, registered by `register_cvars`.
const TM_CVARS: &[(&str, &str)] = &[
    ("tm_enable", "1"),
    ("tm_exposure_bias", "0"),
    ("tm_exposure_speed_up", "2"),
    ("tm_exposure_speed_down", "1"),
    ("tm_min_luminance", "0.0002"),
    ("tm_max_luminance", "100"),
    ("tm_dyn_range_stops", "7"),
    ("tm_knee_start", "0.6"),
    ("tm_knee_white", "2"),
    ("tm_white_point", "10"),
    ("tm_reinhard", "0"),
    ("tm_hdr_peak_nits", "800"),
    ("tm_hdr_saturation_scale", "100"),
    ("tm_blend_enable", "1"),
    ("tm_blend_max_alpha", "0.2"),
    ("tm_blend_falloff", "0"),
    ("tm_debug", "0"),
    ("tm_dither", "1"),
    ("tm_ui_clamp_strength", "1"),
    ("ui_hdr_nits", "300"),
];

/// Register the tone mapping cvars.
pub fn register_cvars(cvars: &mut CvarContext) {
    for &(name, value) in TM_CVARS {
        cvars.get_or_create(name, value, CVAR_ARCHIVE);
    }
}

/// Host-side tone mapping settings, snapshotted from cvars once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonemapSettings {
    pub enable: bool,
    pub exposure_bias: f32,
    pub exposure_speed_up: f32,
    pub exposure_speed_down: f32,
    pub min_luminance: f32,
    pub max_luminance: f32,
    pub dyn_range_stops: f32,
    pub knee_start: f32,
    pub knee_white: f32,
    pub white_point: f32,
    pub reinhard_mix: f32,
    pub hdr_peak_nits: f32,
    pub hdr_saturation: f32,
    pub blend_enable: bool,
    pub blend_max_alpha: f32,
    pub blend_falloff: f32,
    pub debug_mode: u32,
    pub dither: bool,
    pub ui_clamp_strength: f32,
    pub ui_hdr_nits: f32,
}

impl Default for TonemapSettings {
    fn default() -> Self {
        Self {
            enable: true,
            exposure_bias: 0.0,
            exposure_speed_up: 2.0,
            exposure_speed_down: 1.0,
            min_luminance: 0.0002,
            max_luminance: 100.0,
            dyn_range_stops: 7.0,
            knee_start: 0.6,
            knee_white: 2.0,
            white_point: 10.0,
            reinhard_mix: 0.0,
            hdr_peak_nits: 800.0,
            hdr_saturation: 1.0,
            blend_enable: true,
            blend_max_alpha: 0.2,
            blend_falloff: 0.0,
            debug_mode: TM_DEBUG_OFF,
            dither: true,
            ui_clamp_strength: 1.0,
            ui_hdr_nits: 300.0,
        }
    }
}

impl TonemapSettings {
    /// Read settings from cvars, sanitizing out-of-range values.
    pub fn from_cvars(cvars: &CvarContext) -> Self {
        let v = |name: &str| cvars.variable_value(name);
        let min_luminance = v("tm_min_luminance").max(1.0e-6);
        Self {
            enable: cvars.variable_integer("tm_enable") != 0,
            exposure_bias: v("tm_exposure_bias"),
            exposure_speed_up: v("tm_exposure_speed_up").max(0.0),
            exposure_speed_down: v("tm_exposure_speed_down").max(0.0),
            min_luminance,
            max_luminance: v("tm_max_luminance").max(min_luminance),
            dyn_range_stops: v("tm_dyn_range_stops").clamp(1.0, 16.0),
            knee_start: v("tm_knee_start").clamp(0.0, 0.95),
            knee_white: v("tm_knee_white").max(1.01),
            white_point: v("tm_white_point").max(0.01),
            reinhard_mix: v("tm_reinhard").clamp(0.0, 1.0),
            hdr_peak_nits: v("tm_hdr_peak_nits").max(1.0),
            hdr_saturation: v("tm_hdr_saturation_scale").max(0.0) / 100.0,
            blend_enable: cvars.variable_integer("tm_blend_enable") != 0,
            blend_max_alpha: v("tm_blend_max_alpha").clamp(0.0, 1.0),
            blend_falloff: v("tm_blend_falloff").max(0.0),
            debug_mode: cvars.variable_integer("tm_debug").clamp(0, 2) as u32,
            dither: cvars.variable_integer("tm_dither") != 0,
            ui_clamp_strength: v("tm_ui_clamp_strength").clamp(0.0, 1.0),
            ui_hdr_nits: v("ui_hdr_nits").max(1.0),
        }
    }
}

/// Soft knee coefficients: above the knee start `s`, a channel `x` maps to
/// `(a*x + b) / (x + c)`. Pushed separately from the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct KneeConstants {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl KneeConstants {
    /// Fit the knee so that it meets the identity at `start` with matching
    /// slope and reaches exactly 1.0 at `white`.
    ///
    /// Requires `0 <= start < 1 < white`; `TonemapSettings::from_cvars`
    /// clamps the cvars into that range.
    pub fn from_knee(start: f32, white: f32) -> Self {
        let c = (white - 2.0 * start * white + start * start) / (white - 1.0);
        Self {
            a: 2.0 * start + c,
            b: -start * start,
            c,
        }
    }

    /// Evaluate the knee branch for one channel.
    #[inline]
    pub fn eval(&self, x: f32) -> f32 {
        (self.a * x + self.b) / (x + self.c)
    }
}

/// Per-frame uniform block read by the kernel. Immutable while the kernel
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ToneMapUniforms {
    /// Stops added after the curve lookup.
    pub exposure_bias: f32,
    /// Factor the frame buffer contents were multiplied by on store.
    pub storage_scale: f32,
    /// Full-screen blend color (rgb) and alpha.
    pub blend_color: Vec4,
    pub blend_max_alpha: f32,
    pub blend_falloff: f32,
    /// Colorize target color (rgb) and strength (a).
    pub colorize: Vec4,
    pub white_point: f32,
    pub reinhard_mix: f32,
    pub knee_start: f32,
    pub hdr_enabled: u32,
    pub hdr_peak_nits: f32,
    pub ui_hdr_nits: f32,
    pub ui_clamp_strength: f32,
    pub ui_overlay: u32,
    pub hdr_saturation: f32,
    pub debug_mode: u32,
    pub dither_enabled: u32,
    pub frame_num: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub overlay_scale: u32,
}

impl ToneMapUniforms {
    /// Build the uniform block for one frame.
    pub fn from_settings(
        settings: &TonemapSettings,
        blend: Vec4,
        colorize: Vec4,
        output_width: u32,
        output_height: u32,
        hdr: bool,
        ui_overlay: bool,
        frame_num: u32,
        overlay_scale: u32,
        storage_scale: f32,
    ) -> Self {
        let blend_color = if settings.blend_enable { blend } else { [0.0; 4] };
        Self {
            exposure_bias: settings.exposure_bias,
            storage_scale,
            blend_color,
            blend_max_alpha: settings.blend_max_alpha,
            blend_falloff: settings.blend_falloff,
            colorize: [colorize[0], colorize[1], colorize[2], colorize[3].clamp(0.0, 1.0)],
            white_point: settings.white_point,
            reinhard_mix: settings.reinhard_mix,
            knee_start: settings.knee_start,
            hdr_enabled: hdr as u32,
            hdr_peak_nits: settings.hdr_peak_nits,
            ui_hdr_nits: settings.ui_hdr_nits,
            ui_clamp_strength: settings.ui_clamp_strength,
            ui_overlay: ui_overlay as u32,
            hdr_saturation: settings.hdr_saturation,
            debug_mode: settings.debug_mode,
            dither_enabled: settings.dither as u32,
            frame_num,
            output_width,
            output_height,
            overlay_scale: overlay_scale.max(1),
        }
    }

    /// Raw bytes, as bound at `BINDING_UNIFORMS`.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

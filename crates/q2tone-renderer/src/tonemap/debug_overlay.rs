//! Histogram / tone curve bar chart drawn by the kernel in the bottom-left
//! corner of the output.

use q2tone_common::q_shared::Vec4;

use super::curve::ToneCurve;
use super::params::{ToneMapUniforms, TM_DEBUG_CURVE, TM_DEBUG_HISTOGRAM};
use super::HISTOGRAM_BINS;

// Geometry in unscaled pixels
const BAR_WIDTH: u32 = 2;
const CHART_HEIGHT: u32 = 100;
const BORDER: u32 = 1;
const MARGIN: u32 = 8;

const HISTOGRAM_COLOR: Vec4 = [1.0, 0.6, 0.1, 0.9];
const CURVE_COLOR: Vec4 = [0.2, 0.8, 1.0, 0.9];
const BACKGROUND_COLOR: Vec4 = [0.0, 0.0, 0.0, 0.6];
const BORDER_COLOR: Vec4 = [1.0, 1.0, 1.0, 1.0];

#[derive(Debug, Clone)]
pub struct DebugOverlay {
    bar_color: Vec4,
    /// Bar heights in [0, 1].
    values: [f32; HISTOGRAM_BINS],
    bar_width: u32,
    chart_height: u32,
    border: u32,
    /// Outer rectangle, border included.
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl DebugOverlay {
    /// Overlay for this frame, or None when `tm_debug` is off or the chart
    /// does not fit the output rectangle.
    pub fn new(ubo: &ToneMapUniforms, curve: &ToneCurve) -> Option<Self> {
        let (bar_color, values) = match ubo.debug_mode {
            TM_DEBUG_HISTOGRAM => (HISTOGRAM_COLOR, curve.normalized),
            TM_DEBUG_CURVE => (CURVE_COLOR, normalize_curve(&curve.bins)),
            _ => return None,
        };

        let scale = ubo.overlay_scale.max(1);
        let bar_width = BAR_WIDTH * scale;
        let chart_height = CHART_HEIGHT * scale;
        let border = BORDER * scale;
        let margin = MARGIN * scale;

        let left = margin;
        let right = left + 2 * border + bar_width * HISTOGRAM_BINS as u32;
        let bottom = ubo.output_height.saturating_sub(margin);
        let top = bottom.saturating_sub(2 * border + chart_height);
        if right > ubo.output_width || bottom - top < 2 * border + 1 {
            return None;
        }

        Some(Self {
            bar_color,
            values,
            bar_width,
            chart_height,
            border,
            left,
            top,
            right,
            bottom,
        })
    }

    /// Overlay color at pixel (x, y), or None outside the chart.
    #[inline]
    pub fn shade(&self, x: u32, y: u32) -> Option<Vec4> {
        if x < self.left || x >= self.right || y < self.top || y >= self.bottom {
            return None;
        }

        let ix = x - self.left;
        let iy = y - self.top;
        let inner_w = (self.right - self.left).saturating_sub(self.border);
        let inner_h = (self.bottom - self.top).saturating_sub(self.border);
        if ix < self.border || iy < self.border || ix >= inner_w || iy >= inner_h {
            return Some(BORDER_COLOR);
        }

        let bin = ((ix - self.border) / self.bar_width) as usize;
        let height_from_bottom = inner_h.saturating_sub(iy + 1) as f32;
        let bar = self.values[bin.min(HISTOGRAM_BINS - 1)].clamp(0.0, 1.0) * self.chart_height as f32;
        if height_from_bottom < bar {
            Some(self.bar_color)
        } else {
            Some(BACKGROUND_COLOR)
        }
    }
}

/// Scale curve values into [0, 1] by their own range; a flat curve draws at
/// half height.
fn normalize_curve(bins: &[f32; HISTOGRAM_BINS]) -> [f32; HISTOGRAM_BINS] {
    let lo = bins.iter().copied().fold(f32::MAX, f32::min);
    let hi = bins.iter().copied().fold(f32::MIN, f32::max);
    let range = hi - lo;
    let mut out = [0.5f32; HISTOGRAM_BINS];
    if range > 1e-6 {
        for (o, &b) in out.iter_mut().zip(bins.iter()) {
            *o = (b - lo) / range;
        }
    }
    out
}

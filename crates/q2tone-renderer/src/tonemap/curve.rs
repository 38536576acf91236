//! Tone curve: per-node output log2 luminance, derived each frame from the
//! histogram and temporally adapted.
//!
//! The curve is produced on the host side of the frame and read by the
//! kernel through a two-slot `ToneCurveBuffer`. `publish` is the only point
//! where a new curve becomes visible to the kernel.

use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::{Pod, Zeroable};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::histogram::Histogram;
use super::params::TonemapSettings;
use super::{bin_to_log_luminance, HISTOGRAM_BINS, HISTOGRAM_LOG_SCALE};

/// log2 of middle grey, where the linear fallback curve puts the adapted
/// luminance.
const MIDDLE_GREY_LOG: f32 = -2.473_931_2; // log2(0.18)

/// Ceiling trimming stops once a pass removes less than this share of the
/// original count.
const TRIM_TOLERANCE: f32 = 0.025;
const MAX_TRIM_PASSES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ToneCurve {
    /// Output log2 luminance at each node.
    pub bins: [f32; HISTOGRAM_BINS],
    /// Histogram counts scaled so the fullest bin is 1.0 (debug display).
    pub normalized: [f32; HISTOGRAM_BINS],
    pub adapted_log_luminance: f32,
    pub adapted_luminance: f32,
}

impl Default for ToneCurve {
    fn default() -> Self {
        Self::identity()
    }
}

impl ToneCurve {
    /// Curve that maps every node back to its own luminance.
    pub fn identity() -> Self {
        let mut curve = Self::zeroed();
        for (i, b) in curve.bins.iter_mut().enumerate() {
            *b = bin_to_log_luminance(i as f32);
        }
        curve.adapted_log_luminance = MIDDLE_GREY_LOG;
        curve.adapted_luminance = MIDDLE_GREY_LOG.exp2();
        curve
    }

    /// Flat float view, as bound at `BINDING_TONE_CURVE`.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(std::slice::from_ref(self))
    }

    /// Linearly interpolated curve value at a fractional bin coordinate.
    /// Coordinates outside the table clamp to the end nodes.
    #[inline]
    pub fn sample(&self, bin: f32) -> f32 {
        let x = bin.clamp(0.0, (HISTOGRAM_BINS - 1) as f32);
        let i0 = x as usize;
        let i1 = (i0 + 1).min(HISTOGRAM_BINS - 1);
        let t = x - i0 as f32;
        self.bins[i0] + (self.bins[i1] - self.bins[i0]) * t
    }
}

// ============================================================
// Double buffer
// ============================================================

/// Two curve slots. The producer fills the back slot and `publish` makes it
/// the front one; the kernel reads the front slot under a read guard for
/// the whole dispatch.
pub struct ToneCurveBuffer {
    slots: [RwLock<ToneCurve>; 2],
    front: AtomicUsize,
}

impl Default for ToneCurveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneCurveBuffer {
    pub fn new() -> Self {
        Self {
            slots: [RwLock::new(ToneCurve::identity()), RwLock::new(ToneCurve::identity())],
            front: AtomicUsize::new(0),
        }
    }

    pub fn front(&self) -> RwLockReadGuard<'_, ToneCurve> {
        self.slots[self.front.load(Ordering::Acquire)].read()
    }

    /// Write access to the slot the kernel is not reading. Blocks while a
    /// dispatch started before the last `publish` still holds it.
    pub fn back_mut(&self) -> RwLockWriteGuard<'_, ToneCurve> {
        self.slots[self.front.load(Ordering::Acquire) ^ 1].write()
    }

    /// Swap the back slot to the front.
    pub fn publish(&self) {
        self.front.fetch_xor(1, Ordering::AcqRel);
    }

    /// Reset both slots to the identity curve.
    pub fn reset(&self) {
        for slot in &self.slots {
            *slot.write() = ToneCurve::identity();
        }
    }
}

// ============================================================
// Adaptation
// ============================================================

/// Turns frame histograms into published tone curves.
#[derive(Debug, Default)]
pub struct ToneCurveBuilder {
    has_history: bool,
}

impl ToneCurveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous curve; the next update adapts instantly.
    pub fn reset(&mut self) {
        self.has_history = false;
    }

    /// Build the curve for this frame into the back slot of `buffer` and
    /// publish it. Returns false, leaving the published curve in place, if
    /// the histogram is empty.
    pub fn update(
        &mut self,
        histogram: &Histogram,
        settings: &TonemapSettings,
        dt: f32,
        buffer: &ToneCurveBuffer,
    ) -> bool {
        let total: u64 = histogram.iter().map(|&c| c as u64).sum();
        if total == 0 {
            return false;
        }

        let prev = *buffer.front();

        // Scene key: mean log luminance, clamped to the adaptation range
        let mut log_sum = 0.0f64;
        for (i, &count) in histogram.iter().enumerate() {
            log_sum += bin_to_log_luminance(i as f32) as f64 * count as f64;
        }
        let target_log = ((log_sum / total as f64) as f32)
            .clamp(settings.min_luminance.log2(), settings.max_luminance.log2());

        let (adapted_log, k) = if self.has_history {
            let rate = if target_log > prev.adapted_log_luminance {
                settings.exposure_speed_up
            } else {
                settings.exposure_speed_down
            };
            let k = 1.0 - (-dt.max(0.0) * rate).exp();
            let log = prev.adapted_log_luminance + (target_log - prev.adapted_log_luminance) * k;
            (log, k)
        } else {
            (target_log, 1.0)
        };

        let target = adjusted_curve(histogram, settings.dyn_range_stops)
            .unwrap_or_else(|| linear_curve(adapted_log));

        let max_count = histogram.iter().copied().max().unwrap_or(1).max(1) as f32;

        let mut back = buffer.back_mut();
        for i in 0..HISTOGRAM_BINS {
            back.bins[i] = prev.bins[i] + (target[i] - prev.bins[i]) * k;
            back.normalized[i] = histogram[i] as f32 / max_count;
        }
        back.adapted_log_luminance = adapted_log;
        back.adapted_luminance = adapted_log.exp2();
        drop(back);

        buffer.publish();
        self.has_history = true;
        true
    }
}

/// Histogram adjustment with a ceiling: bins holding more than their share
/// of a `dyn_range`-stop display are trimmed until the cumulative curve's
/// slope never exceeds 1. Node values span `[-dyn_range, 0]`.
///
/// Returns None when trimming collapses the histogram, which happens when
/// the scene range is narrower than the display range.
fn adjusted_curve(histogram: &Histogram, dyn_range: f32) -> Option<[f32; HISTOGRAM_BINS]> {
    let mut counts = [0.0f32; HISTOGRAM_BINS];
    for (c, &h) in counts.iter_mut().zip(histogram.iter()) {
        *c = h as f32;
    }
    let original: f32 = counts.iter().sum();
    let stops_per_bin = 1.0 / HISTOGRAM_LOG_SCALE;

    let mut total = original;
    for _ in 0..MAX_TRIM_PASSES {
        let ceiling = total * stops_per_bin / dyn_range;
        let mut trimmed = 0.0;
        for c in counts.iter_mut() {
            if *c > ceiling {
                trimmed += *c - ceiling;
                *c = ceiling;
            }
        }
        total -= trimmed;
        if total < original * TRIM_TOLERANCE {
            return None;
        }
        if trimmed < original * TRIM_TOLERANCE {
            break;
        }
    }

    let mut curve = [0.0f32; HISTOGRAM_BINS];
    let mut below = 0.0;
    for i in 0..HISTOGRAM_BINS {
        let p = (below + 0.5 * counts[i]) / total;
        curve[i] = -dyn_range + p * dyn_range;
        below += counts[i];
    }
    Some(curve)
}

/// Exposure-only curve: adapted luminance maps to middle grey.
fn linear_curve(adapted_log: f32) -> [f32; HISTOGRAM_BINS] {
    let mut curve = [0.0f32; HISTOGRAM_BINS];
    for (i, v) in curve.iter_mut().enumerate() {
        *v = bin_to_log_luminance(i as f32) - adapted_log + MIDDLE_GREY_LOG;
    }
    curve
}

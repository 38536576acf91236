//! Log-luminance histogram of the frame, the input of curve adaptation.

use rayon::prelude::*;

use super::{luminance, luminance_to_bin, HISTOGRAM_BINS};
use crate::framebuffer::FrameColorBuffer;

pub type Histogram = [u32; HISTOGRAM_BINS];

/// Bin index a luminance sample is counted in: the nearest curve node.
#[inline]
pub fn histogram_bin(lum: f32) -> usize {
    let x = luminance_to_bin(lum) + 0.5;
    (x.max(0.0) as usize).min(HISTOGRAM_BINS - 1)
}

/// Count every pixel of the `width` x `height` rectangle at the buffer
/// origin into the histogram. `storage_scale` is undone before binning.
pub fn build_histogram(
    frame: &FrameColorBuffer,
    storage_scale: f32,
    width: u32,
    height: u32,
) -> Histogram {
    let row_len = frame.width as usize;
    if row_len == 0 {
        return [0; HISTOGRAM_BINS];
    }
    let width = width.min(frame.width) as usize;
    let height = height.min(frame.height) as usize;
    let inv_scale = 1.0 / storage_scale;

    frame.pixels
        .par_chunks(row_len)
        .take(height)
        .fold(
            || [0u32; HISTOGRAM_BINS],
            |mut hist, row| {
                for p in &row[..width] {
                    let rgb = [p[0] * inv_scale, p[1] * inv_scale, p[2] * inv_scale];
                    hist[histogram_bin(luminance(&rgb))] += 1;
                }
                hist
            },
        )
        .reduce(
            || [0u32; HISTOGRAM_BINS],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x += *y;
                }
                a
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tonemap::{bin_to_log_luminance, HISTOGRAM_MAX_LOG_LUMINANCE};

    #[test]
    fn test_total_count_matches_rect() {
        let fb = FrameColorBuffer::new(37, 21);
        let hist = build_histogram(&fb, 1.0, 30, 20);
        assert_eq!(hist.iter().sum::<u32>(), 600);
    }

    #[test]
    fn test_black_lands_in_first_bin() {
        let fb = FrameColorBuffer::new(8, 8);
        let hist = build_histogram(&fb, 1.0, 8, 8);
        assert_eq!(hist[0], 64);
    }

    #[test]
    fn test_overbright_lands_in_last_bin() {
        let mut fb = FrameColorBuffer::new(4, 4);
        let hot = (HISTOGRAM_MAX_LOG_LUMINANCE + 3.0).exp2();
        fb.clear([hot, hot, hot, 1.0]);
        let hist = build_histogram(&fb, 1.0, 4, 4);
        assert_eq!(hist[HISTOGRAM_BINS - 1], 16);
    }

    #[test]
    fn test_node_luminance_lands_on_its_bin() {
        let mut fb = FrameColorBuffer::new(2, 2);
        let lum = bin_to_log_luminance(40.0).exp2();
        fb.clear([lum, lum, lum, 1.0]);
        let hist = build_histogram(&fb, 1.0, 2, 2);
        assert_eq!(hist[40], 4);
    }

    #[test]
    fn test_storage_scale_is_undone() {
        let mut fb = FrameColorBuffer::new(2, 2);
        let lum = bin_to_log_luminance(40.0).exp2();
        let scale = 4.0;
        fb.clear([lum * scale, lum * scale, lum * scale, 1.0]);
        let hist = build_histogram(&fb, scale, 2, 2);
        assert_eq!(hist[40], 4);
    }
}

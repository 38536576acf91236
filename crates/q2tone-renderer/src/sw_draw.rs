// sw_draw.rs -- 2D drawing into the frame color buffer

use q2tone_common::q_shared::Vec4;

use crate::framebuffer::FrameColorBuffer;

/// A screen-space line kept until `clear_debug_lines`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    pub start: (i32, i32),
    pub end: (i32, i32),
    pub color: Vec4,
}

// ============================================================
// Draw_Fill
// ============================================================

/// Alpha-blend a solid rectangle, clipped to the buffer.
pub fn draw_fill(fb: &mut FrameColorBuffer, x: i32, y: i32, w: i32, h: i32, color: Vec4) {
    if w <= 0 || h <= 0 {
        return;
    }
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = x.saturating_add(w).min(fb.width as i32);
    let y1 = y.saturating_add(h).min(fb.height as i32);

    for py in y0..y1 {
        for px in x0..x1 {
            fb.blend_pixel(px, py, color);
        }
    }
}

// ============================================================
// Debug lines
// ============================================================

/// Clip a segment to the buffer rectangle (Liang-Barsky). Returns the
/// rounded endpoints of the visible part, or None when nothing is visible.
fn clip_line(fb: &FrameColorBuffer, line: &DebugLine) -> Option<((i64, i64), (i64, i64))> {
    if fb.width == 0 || fb.height == 0 {
        return None;
    }
    let (x0, y0) = (line.start.0 as f64, line.start.1 as f64);
    let (x1, y1) = (line.end.0 as f64, line.end.1 as f64);
    let (dx, dy) = (x1 - x0, y1 - y0);
    let xmax = (fb.width - 1) as f64;
    let ymax = (fb.height - 1) as f64;

    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [(-dx, x0), (dx, xmax - x0), (-dy, y0), (dy, ymax - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
    }
    if t0 > t1 {
        return None;
    }

    let at = |t: f64| ((x0 + dx * t).round() as i64, (y0 + dy * t).round() as i64);
    Some((at(t0), at(t1)))
}

/// Bresenham line, clipped to the buffer first.
pub fn draw_line(fb: &mut FrameColorBuffer, line: &DebugLine) {
    let ((mut x, mut y), (x1, y1)) = match clip_line(fb, line) {
        Some(segment) => segment,
        None => return,
    };
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        fb.blend_pixel(x as i32, y as i32, line.color);
        if x == x1 && y == y1 {
            break;
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

    const WHITE: Vec4 = [1.0, 1.0, 1.0, 1.0];

    fn lit(fb: &FrameColorBuffer) -> usize {
        fb.pixels.iter().filter(|p| p[0] > 0.0).count()
    }

    #[test]
    fn test_fill_clips() {
        let mut fb = FrameColorBuffer::new(8, 8);
        draw_fill(&mut fb, -2, -2, 4, 4, WHITE);
        assert_eq!(lit(&fb), 4);
        draw_fill(&mut fb, 6, 6, 100, 100, WHITE);
        assert_eq!(lit(&fb), 8);
        draw_fill(&mut fb, 0, 0, 0, 5, WHITE);
        assert_eq!(lit(&fb), 8);
    }

    #[test]
    fn test_fill_blends() {
        let mut fb = FrameColorBuffer::new(2, 2);
        draw_fill(&mut fb, 0, 0, 2, 2, [1.0, 0.0, 0.0, 0.25]);
        assert_eq!(fb.pixels[3], [0.25, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_line_endpoints_and_length() {
        let mut fb = FrameColorBuffer::new(16, 16);
        let line = DebugLine {
            start: (1, 2),
            end: (11, 7),
            color: WHITE,
        };
        draw_line(&mut fb, &line);
        assert_eq!(fb.get(1, 2), Some(&WHITE));
        assert_eq!(fb.get(11, 7), Some(&WHITE));
        // One pixel per step along the major axis
        assert_eq!(lit(&fb), 11);
    }

    #[test]
    fn test_line_offscreen_is_clipped() {
        let mut fb = FrameColorBuffer::new(4, 4);
        let line = DebugLine {
            start: (-3, 1),
            end: (6, 1),
            color: WHITE,
        };
        draw_line(&mut fb, &line);
        assert_eq!(lit(&fb), 4);
    }

    #[test]
    fn test_line_extreme_endpoints() {
        let mut fb = FrameColorBuffer::new(8, 8);
        let line = DebugLine {
            start: (i32::MIN, 3),
            end: (i32::MAX, 3),
            color: WHITE,
        };
        draw_line(&mut fb, &line);
        assert_eq!(lit(&fb), 8);

        let diagonal = DebugLine {
            start: (i32::MIN, i32::MIN),
            end: (i32::MAX, i32::MAX),
            color: WHITE,
        };
        draw_line(&mut fb, &diagonal);
        assert_eq!(fb.get(0, 0), Some(&WHITE));
        assert_eq!(fb.get(7, 7), Some(&WHITE));
    }

    #[test]
    fn test_line_fully_outside() {
        let mut fb = FrameColorBuffer::new(8, 8);
        let line = DebugLine {
            start: (-100, -5),
            end: (100, -1),
            color: WHITE,
        };
        draw_line(&mut fb, &line);
        assert_eq!(lit(&fb), 0);
    }
}

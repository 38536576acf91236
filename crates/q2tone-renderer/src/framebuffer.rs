//! Linear HDR color buffer shared by the scene pass, the tone mapping stage
//! and 2D drawing.

use q2tone_common::q_shared::Vec4;

/// A 2D grid of linear RGBA samples, row-major, top row first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameColorBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec4>,
}

impl FrameColorBuffer {
    /// Create a buffer cleared to opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0, 0.0, 0.0, 1.0]; width as usize * height as usize],
        }
    }

    /// Resize, discarding contents. No-op if the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        *self = Self::new(width, height);
    }

    /// Fill every pixel with `color`.
    pub fn clear(&mut self, color: Vec4) {
        self.pixels.fill(color);
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Pixel at (x, y), or None outside the buffer.
    pub fn get(&self, x: u32, y: u32) -> Option<&Vec4> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(self.index(x, y))
    }

    /// Mutable pixel at (x, y), or None outside the buffer.
    pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut Vec4> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.index(x, y);
        self.pixels.get_mut(idx)
    }

    /// Alpha-blend `color` over the pixel at (x, y); ignores out-of-range
    /// coordinates.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Vec4) {
        if x < 0 || y < 0 {
            return;
        }
        if let Some(p) = self.get_mut(x as u32, y as u32) {
            let a = color[3].clamp(0.0, 1.0);
            for c in 0..3 {
                p[c] += (color[c] - p[c]) * a;
            }
        }
    }

    /// Raw float view, as bound at `BINDING_FRAME_COLOR`.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_opaque_black() {
        let fb = FrameColorBuffer::new(4, 2);
        assert_eq!(fb.pixels.len(), 8);
        assert!(fb.pixels.iter().all(|p| *p == [0.0, 0.0, 0.0, 1.0]));
        assert_eq!(fb.as_floats().len(), 32);
    }

    #[test]
    fn test_get_out_of_range() {
        let fb = FrameColorBuffer::new(4, 2);
        assert!(fb.get(3, 1).is_some());
        assert!(fb.get(4, 0).is_none());
        assert!(fb.get(0, 2).is_none());
    }

    #[test]
    fn test_blend_pixel() {
        let mut fb = FrameColorBuffer::new(2, 2);
        fb.blend_pixel(1, 1, [1.0, 1.0, 1.0, 0.5]);
        assert_eq!(fb.get(1, 1), Some(&[0.5, 0.5, 0.5, 1.0]));
        fb.blend_pixel(-1, 0, [1.0, 1.0, 1.0, 1.0]);
        fb.blend_pixel(5, 0, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(fb.get(0, 0), Some(&[0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_resize_discards() {
        let mut fb = FrameColorBuffer::new(2, 2);
        fb.clear([1.0; 4]);
        fb.resize(2, 2);
        assert_eq!(fb.pixels[0], [1.0; 4]);
        fb.resize(3, 1);
        assert_eq!(fb.pixels.len(), 3);
        assert_eq!(fb.pixels[0], [0.0, 0.0, 0.0, 1.0]);
    }
}

// scene.rs — procedural HDR test scene
//
// Sky gradient, a sun disk far above display white, a checkered floor and a
// light that slowly pulses so auto exposure has something to adapt to.

use q2tone_common::q_shared::Vec4;

const SKY_ZENITH: [f32; 3] = [0.15, 0.3, 1.2];
const SKY_HORIZON: [f32; 3] = [1.6, 1.4, 1.1];
const SUN_RADIANCE: [f32; 3] = [4000.0, 3600.0, 3000.0];
const SUN_RADIUS: f32 = 0.04;
const FLOOR_DARK: f32 = 0.02;
const FLOOR_LIGHT: f32 = 0.25;
const FLOOR_CELLS: f32 = 12.0;

/// Seconds between damage flashes.
const FLASH_PERIOD: f32 = 5.0;
const FLASH_LENGTH: f32 = 0.5;

#[derive(Default)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    radiance: Vec<Vec4>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn radiance(&self) -> &[Vec4] {
        &self.radiance
    }

    /// Fill the radiance buffer for time `t` seconds.
    pub fn render(&mut self, width: u32, height: u32, t: f32) {
        self.width = width;
        self.height = height;
        self.radiance.resize(width as usize * height as usize, [0.0, 0.0, 0.0, 1.0]);
        if width == 0 || height == 0 {
            return;
        }

        let aspect = width as f32 / height as f32;
        let horizon = 0.55;
        let sun = [0.5 + 0.3 * (t * 0.1).cos(), 0.15 + 0.1 * (t * 0.1).sin()];
        // Pulses between 0.25x and 4x so adaptation runs both ways
        let pulse = 4f32.powf((t * 0.4).sin());

        for y in 0..height {
            let v = (y as f32 + 0.5) / height as f32;
            for x in 0..width {
                let u = (x as f32 + 0.5) / width as f32;
                let idx = (y * width + x) as usize;

                let rgb = if v < horizon {
                    let k = v / horizon;
                    let dx = (u - sun[0]) * aspect;
                    let dy = v - sun[1];
                    if dx * dx + dy * dy < SUN_RADIUS * SUN_RADIUS {
                        SUN_RADIANCE
                    } else {
                        [
                            SKY_ZENITH[0] + (SKY_HORIZON[0] - SKY_ZENITH[0]) * k,
                            SKY_ZENITH[1] + (SKY_HORIZON[1] - SKY_ZENITH[1]) * k,
                            SKY_ZENITH[2] + (SKY_HORIZON[2] - SKY_ZENITH[2]) * k,
                        ]
                    }
                } else {
                    let depth = (v - horizon) / (1.0 - horizon);
                    let cx = ((u - 0.5) / depth.max(0.05) * FLOOR_CELLS).floor() as i32;
                    let cy = (FLOOR_CELLS / depth.max(0.05)).floor() as i32;
                    let albedo = if (cx + cy) & 1 == 0 { FLOOR_DARK } else { FLOOR_LIGHT };
                    let e = albedo * pulse * depth;
                    [e, e * 0.95, e * 0.9]
                };

                self.radiance[idx] = [rgb[0], rgb[1], rgb[2], 1.0];
            }
        }
    }

    /// Full-screen blend for time `t`: a short red flash every few seconds.
    pub fn blend(t: f32) -> Vec4 {
        let phase = t % FLASH_PERIOD;
        if phase < FLASH_LENGTH {
            [1.0, 0.0, 0.0, 0.5 * (1.0 - phase / FLASH_LENGTH)]
        } else {
            [0.0; 4]
        }
    }
}

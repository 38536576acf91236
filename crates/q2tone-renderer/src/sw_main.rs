// sw_main.rs — software refresh backend
//
// Renders into a linear `FrameColorBuffer` and runs the tone mapping stage
// on the CPU: histogram, curve adaptation, then the kernel in place.

use q2tone_common::common::{com_dprintf, com_printf};
use q2tone_common::cvar::CvarContext;
use q2tone_common::q_shared::{Vec4, CVAR_ARCHIVE, CVAR_REFRESH};

use crate::framebuffer::FrameColorBuffer;
use crate::ref_api::{get_auto_scale, RefConfig, RefDef, RefType, RenderError, Renderer};
use crate::sw_draw::{draw_fill, draw_line, DebugLine};
use crate::tonemap::params::register_cvars;
use crate::tonemap::{
    build_histogram, tone_mapping_apply, BlueNoise, KneeConstants, ToneCurveBuffer,
    ToneCurveBuilder, ToneMapUniforms, TonemapSettings,
};

/// Factor scene radiance is multiplied by when stored in the frame buffer.
pub const STORAGE_SCALE: f32 = 0.5;

const BLUE_NOISE_SEED: u64 = 0x51_70_4e_e5;

const CLEAR_COLOR: Vec4 = [0.0, 0.0, 0.0, 1.0];

pub struct SoftRenderer {
    frame: FrameColorBuffer,
    curves: ToneCurveBuffer,
    curve_builder: ToneCurveBuilder,
    /// Generated on total init, kept across partial restarts.
    noise: Option<BlueNoise>,
    debug_lines: Vec<DebugLine>,
    config: RefConfig,
    hdr: bool,
    frame_num: u32,
    initialized: bool,
}

impl Default for SoftRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftRenderer {
    pub fn new() -> Self {
        Self {
            frame: FrameColorBuffer::default(),
            curves: ToneCurveBuffer::new(),
            curve_builder: ToneCurveBuilder::new(),
            noise: None,
            debug_lines: Vec::new(),
            config: RefConfig::default(),
            hdr: false,
            frame_num: 0,
            initialized: false,
        }
    }

    pub fn frame_num(&self) -> u32 {
        self.frame_num
    }

    /// The published curve, for inspection.
    pub fn curves(&self) -> &ToneCurveBuffer {
        &self.curves
    }

    fn store_radiance(&mut self, fd: &RefDef) {
        let width = fd.width.min(self.frame.width) as usize;
        let height = fd.height.min(self.frame.height) as usize;
        let src_stride = fd.width as usize;
        let dst_stride = self.frame.width as usize;

        for y in 0..height {
            let src = match fd.radiance.get(y * src_stride..y * src_stride + width) {
                Some(row) => row,
                None => break,
            };
            let dst = &mut self.frame.pixels[y * dst_stride..y * dst_stride + width];
            for (d, s) in dst.iter_mut().zip(src) {
                *d = [s[0] * STORAGE_SCALE, s[1] * STORAGE_SCALE, s[2] * STORAGE_SCALE, 1.0];
            }
        }
    }

    /// Post processing with tone mapping disabled: undo the storage scale
    /// only.
    fn passthrough(&mut self, width: u32, height: u32) {
        let stride = self.frame.width as usize;
        for y in 0..height.min(self.frame.height) as usize {
            for p in &mut self.frame.pixels[y * stride..y * stride + width.min(self.frame.width) as usize] {
                for c in 0..3 {
                    p[c] /= STORAGE_SCALE;
                }
            }
        }
    }
}

impl Renderer for SoftRenderer {
    fn name(&self) -> &str {
        "soft"
    }

    fn init(&mut self, total: bool, cvars: &mut CvarContext) -> Result<RefType, RenderError> {
        com_printf("------- soft refresh init -------\n");

        register_cvars(cvars);
        cvars.get_or_create("r_hdr", "0", CVAR_REFRESH | CVAR_ARCHIVE);
        self.hdr = cvars.variable_integer("r_hdr") != 0;

        if total || self.noise.is_none() {
            self.noise = Some(BlueNoise::generate(BLUE_NOISE_SEED));
        }
        self.curves.reset();
        self.curve_builder.reset();
        self.initialized = true;

        com_dprintf(&format!("soft refresh: hdr {}\n", if self.hdr { "on" } else { "off" }));
        Ok(RefType::Soft)
    }

    fn shutdown(&mut self, total: bool) {
        if !self.initialized {
            return;
        }
        if total {
            self.noise = None;
            self.frame = FrameColorBuffer::default();
            self.config = RefConfig::default();
        }
        self.debug_lines.clear();
        self.initialized = false;
    }

    fn mode_changed(&mut self, config: &RefConfig) {
        self.config = *config;
        self.frame.resize(config.width, config.height);
        com_dprintf(&format!("soft refresh: mode {}x{}\n", config.width, config.height));
    }

    fn begin_frame(&mut self) {
        self.frame.clear(CLEAR_COLOR);
    }

    fn render_frame(&mut self, fd: &RefDef, cvars: &CvarContext) {
        let width = fd.width.min(self.frame.width);
        let height = fd.height.min(self.frame.height);
        let settings = TonemapSettings::from_cvars(cvars);

        self.store_radiance(fd);

        let histogram = build_histogram(&self.frame, STORAGE_SCALE, width, height);
        self.curve_builder.update(&histogram, &settings, fd.frametime, &self.curves);

        if !settings.enable || self.noise.is_none() {
            self.passthrough(width, height);
        } else if let Some(noise) = self.noise.as_ref() {
            let ubo = ToneMapUniforms::from_settings(
                &settings,
                fd.blend,
                fd.colorize,
                width,
                height,
                self.hdr,
                fd.ui_overlay,
                self.frame_num,
                get_auto_scale(&self.config) as u32,
                STORAGE_SCALE,
            );
            let knee = KneeConstants::from_knee(settings.knee_start, settings.knee_white);
            tone_mapping_apply(&mut self.frame, &self.curves, &ubo, &knee, noise);
        }

        for line in &self.debug_lines {
            draw_line(&mut self.frame, line);
        }
        self.frame_num = self.frame_num.wrapping_add(1);
    }

    fn draw_fill(&mut self, x: i32, y: i32, w: i32, h: i32, color: Vec4) {
        draw_fill(&mut self.frame, x, y, w, h, color);
    }

    fn end_frame(&mut self) {}

    fn is_hdr(&self) -> bool {
        self.hdr
    }

    fn supports_debug_lines(&self) -> bool {
        true
    }

    fn add_debug_line(&mut self, start: (i32, i32), end: (i32, i32), color: Vec4) {
        self.debug_lines.push(DebugLine { start, end, color });
    }

    fn clear_debug_lines(&mut self) {
        self.debug_lines.clear();
    }

    fn frame_buffer(&self) -> &FrameColorBuffer {
        &self.frame
    }
}

// ref_api.rs — renderer interface shared by the client and the backends
//
// The client owns at most one `Box<dyn Renderer>` at a time; a backend is
// either fully bound or absent. Backends are listed in `RENDERERS` and
// selected by `vid_rtx` at refresh init.

use bitflags::bitflags;

use q2tone_common::common::com_printf;
use q2tone_common::cvar::CvarContext;
use q2tone_common::q_shared::Vec4;

use crate::framebuffer::FrameColorBuffer;

/// Which kind of backend came up. `None` means initialization failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefType {
    #[default]
    None,
    Soft,
}

bitflags! {
    /// Surface state reported alongside the mode size.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VidFlags: u32 {
        const FULLSCREEN = 1 << 0;
        const HDR        = 1 << 1;
    }
}

/// Resolved display geometry, as last set by the video driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefConfig {
    pub width: u32,
    pub height: u32,
    pub flags: VidFlags,
    /// Integer DPI scale of the window's monitor, if the driver knows it.
    pub dpi_scale: Option<i32>,
}

/// Integer UI scale for the current output: 2 at 1080p, 4 at 2160p
/// (measured along the short axis), never below the driver's DPI scale.
pub fn get_auto_scale(config: &RefConfig) -> i32 {
    let mut scale = 1;

    if config.height < config.width {
        if config.height >= 2160 {
            scale = 4;
        } else if config.height >= 1080 {
            scale = 2;
        }
    } else if config.width >= 3840 {
        scale = 4;
    } else if config.width >= 1920 {
        scale = 2;
    }

    match config.dpi_scale {
        Some(min_scale) => scale.max(min_scale),
        None => scale,
    }
}

/// Per-frame scene description handed to `Renderer::render_frame`.
#[derive(Debug, Clone, Copy)]
pub struct RefDef<'a> {
    /// Viewport size; the viewport sits at the buffer origin.
    pub width: u32,
    pub height: u32,
    /// Seconds since the previous frame.
    pub frametime: f32,
    /// Full-screen blend color and alpha (damage flashes, underwater tint).
    pub blend: Vec4,
    /// Colorize color and strength.
    pub colorize: Vec4,
    /// Set while a menu or console is drawn over the scene.
    pub ui_overlay: bool,
    /// Linear scene radiance, `width * height` samples, row-major.
    pub radiance: &'a [Vec4],
}

#[derive(Debug)]
pub enum RenderError {
    /// The backend cannot run with the current driver or surface.
    Unsupported(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

/// A refresh backend.
pub trait Renderer {
    fn name(&self) -> &str;

    /// Bring the backend up. `total` is false on a partial restart
    /// (`CVAR_FILES`), where long-lived resources may be kept.
    fn init(&mut self, total: bool, cvars: &mut CvarContext) -> Result<RefType, RenderError>;

    /// Release resources. A partial shutdown keeps what a partial init
    /// would reuse.
    fn shutdown(&mut self, total: bool);

    /// The output surface changed size or state.
    fn mode_changed(&mut self, config: &RefConfig);

    fn begin_frame(&mut self);

    /// Render the scene and run post processing.
    fn render_frame(&mut self, fd: &RefDef, cvars: &CvarContext);

    /// Alpha-blended solid rectangle, in output pixels.
    fn draw_fill(&mut self, x: i32, y: i32, w: i32, h: i32, color: Vec4);

    fn end_frame(&mut self);

    fn is_hdr(&self) -> bool;

    // ========== Debug lines ==========

    /// The client only registers `cleardebuglines` when this is true.
    fn supports_debug_lines(&self) -> bool {
        false
    }

    fn add_debug_line(&mut self, _start: (i32, i32), _end: (i32, i32), _color: Vec4) {}

    fn clear_debug_lines(&mut self) {}

    /// The most recently finished frame.
    fn frame_buffer(&self) -> &FrameColorBuffer;
}

/// Registry entry for one backend.
pub struct RendererDescriptor {
    pub name: &'static str,
    /// Selected when `vid_rtx` is set.
    pub rtx: bool,
    pub create: fn() -> Box<dyn Renderer>,
}

fn create_soft() -> Box<dyn Renderer> {
    Box::new(crate::sw_main::SoftRenderer::new())
}

/// Backends compiled into this build.
pub static RENDERERS: &[RendererDescriptor] = &[RendererDescriptor {
    name: "soft",
    rtx: false,
    create: create_soft,
}];

/// Pick the backend for `vid_rtx`. Falls back to the first registered
/// backend when none matches.
pub fn r_register_functions(rtx: bool) -> &'static RendererDescriptor {
    match RENDERERS.iter().find(|r| r.rtx == rtx) {
        Some(desc) => desc,
        None => {
            com_printf(&format!(
                "No {} renderer in this build, using {}\n",
                if rtx { "RTX" } else { "raster" },
                RENDERERS[0].name
            ));
            &RENDERERS[0]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: u32, height: u32, dpi_scale: Option<i32>) -> RefConfig {
        RefConfig {
            width,
            height,
            flags: VidFlags::empty(),
            dpi_scale,
        }
    }

    #[test]
    fn test_auto_scale_landscape() {
        assert_eq!(get_auto_scale(&config(1280, 720, None)), 1);
        assert_eq!(get_auto_scale(&config(1920, 1080, None)), 2);
        assert_eq!(get_auto_scale(&config(3840, 2160, None)), 4);
    }

    #[test]
    fn test_auto_scale_portrait() {
        assert_eq!(get_auto_scale(&config(1080, 1920, None)), 1);
        assert_eq!(get_auto_scale(&config(1920, 3000, None)), 2);
        assert_eq!(get_auto_scale(&config(3840, 4000, None)), 4);
    }

    #[test]
    fn test_auto_scale_dpi_floor() {
        assert_eq!(get_auto_scale(&config(1280, 720, Some(3))), 3);
        assert_eq!(get_auto_scale(&config(3840, 2160, Some(2))), 4);
    }

    #[test]
    fn test_register_functions_falls_back() {
        assert_eq!(r_register_functions(false).name, "soft");
        assert_eq!(r_register_functions(true).name, "soft");
    }

    #[test]
    fn test_render_error_display() {
        let err = RenderError::Unsupported("no surface".to_string());
        assert_eq!(err.to_string(), "Unsupported: no surface");
    }
}

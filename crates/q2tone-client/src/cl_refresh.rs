// cl_refresh.rs — refresh (video driver + renderer) lifecycle
//
// Brings up the first working video driver together with the renderer
// selected by `vid_rtx`, reacts to mode cvar changes once per tick and
// restarts the refresh when `CVAR_REFRESH` / `CVAR_FILES` cvars change.

use bitflags::bitflags;

use q2tone_common::cmd::CmdContext;
use q2tone_common::common::{com_dprintf, com_printf, com_set_last_error, com_wprintf};
use q2tone_common::cvar::CvarContext;
use q2tone_common::q_shared::{CVAR_ARCHIVE, CVAR_FILES, CVAR_REFRESH, CVAR_ROM, CVAR_ZERO};
use q2tone_renderer::ref_api::{self, r_register_functions, RefConfig, RefType, Renderer, VidFlags};

use crate::vid::{ModeRequest, VidDriver, VidEvent};
use crate::vid_mode::{vid_get_fullscreen, vid_get_geometry, vid_set_geometry, DisplayMode};

pub const VID_GEOMETRY: &str = "1280x720";

bitflags! {
    /// Mode cvars changed since the last tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModeChanged: u32 {
        const GEOMETRY   = 1 << 0;
        const FULLSCREEN = 1 << 1;
        const MODELIST   = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No registered driver could bring up a renderer. Carries the last
    /// driver or renderer failure.
    NoDriver(String),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::NoDriver(msg) => write!(f, "Couldn't initialize refresh: {}", msg),
        }
    }
}

impl std::error::Error for RefreshError {}

pub struct RefreshState {
    pub drivers: Vec<Box<dyn VidDriver>>,
    active_driver: Option<usize>,
    renderer: Option<Box<dyn Renderer>>,
    /// Overrides the `vid_rtx` registry lookup.
    renderer_factory: Option<fn() -> Box<dyn Renderer>>,
    pub r_config: RefConfig,
    pub ref_initialized: bool,
    pub ref_type: RefType,
    mode_changed: ModeChanged,
    /// Last windowed placement, persisted to `vid_geometry` on move/resize.
    window: DisplayMode,
    cmds: CmdContext<RefreshState>,
    /// Reason the most recent driver attempt failed.
    last_error: String,
    pub quit_requested: bool,
}

fn cmd_clear_debug_lines(state: &mut RefreshState) {
    if let Some(renderer) = state.renderer.as_mut() {
        renderer.clear_debug_lines();
    }
}

impl RefreshState {
    pub fn new(drivers: Vec<Box<dyn VidDriver>>) -> Self {
        Self {
            drivers,
            active_driver: None,
            renderer: None,
            renderer_factory: None,
            r_config: RefConfig::default(),
            ref_initialized: false,
            ref_type: RefType::None,
            mode_changed: ModeChanged::empty(),
            window: DisplayMode::GEOMETRY_DEFAULT,
            cmds: CmdContext::new(),
            last_error: String::new(),
            quit_requested: false,
        }
    }

    /// Use `create` for every renderer instead of the registry.
    pub fn with_renderer_factory(mut self, create: fn() -> Box<dyn Renderer>) -> Self {
        self.renderer_factory = Some(create);
        self
    }

    pub fn renderer(&self) -> Option<&dyn Renderer> {
        self.renderer.as_deref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut (dyn Renderer + 'static)> {
        self.renderer.as_deref_mut()
    }

    fn set_last_error(&mut self, msg: &str) {
        com_set_last_error(msg);
        self.last_error = msg.to_string();
    }

    pub fn active_driver_name(&self) -> Option<&'static str> {
        self.active_driver.map(|idx| self.drivers[idx].name())
    }

    /// Run a console command registered by the refresh layer. Returns false
    /// if the command is unknown.
    pub fn execute_command(&mut self, text: &str) -> bool {
        // Handlers get the whole state; the registry is out of it meanwhile
        let cmds = std::mem::take(&mut self.cmds);
        let found = cmds.cmd_execute_string(text, self);
        self.cmds = cmds;
        found
    }

    // ============================================================
    // Init / shutdown
    // ============================================================

    pub fn cl_init_refresh(&mut self, cvars: &mut CvarContext) -> Result<(), RefreshError> {
        if self.ref_initialized {
            return Ok(());
        }

        cvars.get_or_create("vid_display", "0", CVAR_ARCHIVE | CVAR_REFRESH);
        cvars.get_or_create("vid_displaylist", "\"<unknown>\" 0", CVAR_ROM);
        cvars.get_or_create("vid_rtx", "0", CVAR_REFRESH | CVAR_ARCHIVE);
        cvars.get_or_create("vid_driver", "", CVAR_REFRESH);
        cvars.get_or_create("vid_fullscreen", "0", CVAR_ARCHIVE);
        cvars.get_or_create("_vid_fullscreen", "1", CVAR_ARCHIVE);
        cvars.get_or_create("vid_geometry", VID_GEOMETRY, CVAR_ARCHIVE);

        if cvars.variable_integer("vid_fullscreen") != 0 {
            let fs = cvars.variable_string("vid_fullscreen").to_string();
            cvars.set("_vid_fullscreen", &fs);
        } else if cvars.variable_integer("_vid_fullscreen") == 0 {
            cvars.set("_vid_fullscreen", "1");
        }

        self.set_last_error("No available video driver");

        let create = match self.renderer_factory {
            Some(create) => create,
            None => r_register_functions(cvars.variable_integer("vid_rtx") != 0).create,
        };

        // Try the requested driver first
        let requested = cvars.variable_string("vid_driver").to_string();
        let requested_idx = self.drivers.iter().position(|d| d.name() == requested);
        let mut tried = None;
        let mut ok = false;
        match requested_idx {
            Some(idx) => {
                tried = Some(idx);
                ok = self.try_driver(idx, create, cvars);
            }
            None if !requested.is_empty() => {
                let names: Vec<&str> = self.drivers.iter().map(|d| d.name()).collect();
                com_printf(&format!(
                    "No such video driver: {}.\nAvailable video drivers: {}.\n",
                    requested,
                    names.join(", ")
                ));
            }
            None => {}
        }

        // Fall back to the first one that works
        if !ok {
            for idx in 0..self.drivers.len() {
                if Some(idx) == tried || !self.drivers[idx].probe() {
                    continue;
                }
                if self.try_driver(idx, create, cvars) {
                    ok = true;
                    break;
                }
            }
            cvars.reset("vid_driver");
        }

        if !ok {
            return Err(RefreshError::NoDriver(self.last_error.clone()));
        }

        let modelist = match self.active_driver {
            Some(idx) => self.drivers[idx].get_mode_list(),
            None => String::new(),
        };
        cvars.get_or_create("vid_modelist", &modelist, CVAR_ZERO);

        self.ref_initialized = true;
        self.set_mode(cvars);

        // Initial values are not changes
        cvars.take_modified("vid_geometry");
        cvars.take_modified("vid_fullscreen");
        cvars.take_modified("vid_modelist");
        self.mode_changed = ModeChanged::empty();

        if self.renderer.as_ref().map_or(false, |r| r.supports_debug_lines()) {
            cmd_clear_debug_lines(self);
            self.cmds.cmd_add_command("cleardebuglines", cmd_clear_debug_lines);
        }

        cvars.cvar_modified &= !(CVAR_FILES | CVAR_REFRESH);

        com_printf(&format!(
            "Refresh up: {} driver, {} renderer\n",
            self.active_driver_name().unwrap_or("?"),
            self.renderer.as_ref().map(|r| r.name()).unwrap_or("?"),
        ));
        Ok(())
    }

    /// Bring up driver `idx` plus a fresh renderer. On failure everything is
    /// torn down again and the reason is left in the last error.
    fn try_driver(&mut self, idx: usize, create: fn() -> Box<dyn Renderer>, cvars: &mut CvarContext) -> bool {
        let name = self.drivers[idx].name();

        if let Err(err) = self.drivers[idx].init() {
            self.set_last_error(&err.to_string());
            com_printf(&format!("{}: {}\n", name, err));
            return false;
        }

        let mut renderer = create();
        match renderer.init(true, cvars) {
            Ok(RefType::None) => {
                self.set_last_error(&format!("{} renderer failed to initialize", renderer.name()));
            }
            Ok(ref_type) => {
                self.active_driver = Some(idx);
                self.renderer = Some(renderer);
                self.ref_type = ref_type;
                return true;
            }
            Err(err) => {
                self.set_last_error(&err.to_string());
                com_printf(&format!("{}: {}\n", name, err));
            }
        }

        self.drivers[idx].shutdown();
        false
    }

    pub fn cl_shutdown_refresh(&mut self) {
        if !self.ref_initialized {
            return;
        }

        if self.cmds.cmd_exists("cleardebuglines") {
            self.cmds.cmd_remove_command("cleardebuglines");
        }

        if let Some(mut renderer) = self.renderer.take() {
            renderer.shutdown(true);
        }
        if let Some(idx) = self.active_driver.take() {
            self.drivers[idx].shutdown();
        }

        self.ref_initialized = false;
        self.ref_type = RefType::None;
        self.mode_changed = ModeChanged::empty();
    }

    /// Total restart re-selects driver and renderer; partial restart only
    /// cycles the renderer, falling back to a total restart if that fails.
    pub fn cl_restart_refresh(&mut self, total: bool, cvars: &mut CvarContext) -> Result<(), RefreshError> {
        if !self.ref_initialized {
            return Ok(());
        }

        if total {
            com_dprintf("Restarting refresh\n");
            self.cl_shutdown_refresh();
            return self.cl_init_refresh(cvars);
        }

        com_dprintf("Restarting renderer\n");
        let restarted = match self.renderer.as_mut() {
            Some(renderer) => {
                renderer.shutdown(false);
                match renderer.init(false, cvars) {
                    Ok(RefType::None) => false,
                    Ok(ref_type) => {
                        self.ref_type = ref_type;
                        true
                    }
                    Err(err) => {
                        com_set_last_error(&err.to_string());
                        com_wprintf(&format!("Renderer restart failed: {}\n", err));
                        false
                    }
                }
            }
            None => false,
        };

        if !restarted {
            self.cl_shutdown_refresh();
            return self.cl_init_refresh(cvars);
        }

        let config = self.r_config;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.mode_changed(&config);
        }
        Ok(())
    }

    // ============================================================
    // Per-tick
    // ============================================================

    pub fn cl_run_refresh(&mut self, cvars: &mut CvarContext) -> Result<(), RefreshError> {
        if !self.ref_initialized {
            return Ok(());
        }

        self.pump_events(cvars);

        if cvars.take_modified("vid_geometry") {
            self.mode_changed |= ModeChanged::GEOMETRY;
        }
        if cvars.take_modified("vid_fullscreen") {
            self.mode_changed |= ModeChanged::FULLSCREEN;
        }
        if cvars.take_modified("vid_modelist") {
            self.mode_changed |= ModeChanged::MODELIST;
        }

        if !self.mode_changed.is_empty() {
            let fullscreen = cvars.variable_integer("vid_fullscreen") != 0;
            if self.mode_changed.contains(ModeChanged::FULLSCREEN) {
                self.set_mode(cvars);
                if fullscreen {
                    let fs = cvars.variable_string("vid_fullscreen").to_string();
                    cvars.set("_vid_fullscreen", &fs);
                }
            } else if fullscreen {
                if self.mode_changed.contains(ModeChanged::MODELIST) {
                    self.set_mode(cvars);
                }
            } else if self.mode_changed.contains(ModeChanged::GEOMETRY) {
                self.set_mode(cvars);
            }
            self.mode_changed = ModeChanged::empty();
        }

        if cvars.cvar_modified & CVAR_REFRESH != 0 {
            self.cl_restart_refresh(true, cvars)?;
            cvars.cvar_modified &= !CVAR_REFRESH;
        } else if cvars.cvar_modified & CVAR_FILES != 0 {
            self.cl_restart_refresh(false, cvars)?;
            cvars.cvar_modified &= !CVAR_FILES;
        }

        Ok(())
    }

    fn pump_events(&mut self, cvars: &mut CvarContext) {
        let idx = match self.active_driver {
            Some(idx) => idx,
            None => return,
        };
        let windowed = !self.r_config.flags.contains(VidFlags::FULLSCREEN);

        for event in self.drivers[idx].pump_events() {
            match event {
                VidEvent::Moved { x, y } => {
                    if windowed {
                        self.window.x = x;
                        self.window.y = y;
                        cvars.set_from_code("vid_geometry", &vid_set_geometry(&self.window));
                    }
                }
                VidEvent::Resized { width, height } => {
                    if windowed {
                        self.window.width = width;
                        self.window.height = height;
                        cvars.set_from_code("vid_geometry", &vid_set_geometry(&self.window));
                    }
                    self.r_config.width = width;
                    self.r_config.height = height;
                    // The window may have landed on another monitor
                    self.r_config.dpi_scale = self.drivers[idx].get_dpi_scale();
                    let config = self.r_config;
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.mode_changed(&config);
                    }
                }
                VidEvent::CloseRequested => {
                    self.quit_requested = true;
                }
            }
        }
    }

    /// Resolve the mode cvars and hand the result to the driver.
    pub fn set_mode(&mut self, cvars: &CvarContext) {
        let idx = match self.active_driver {
            Some(idx) => idx,
            None => return,
        };

        let selected = cvars.variable_integer("vid_fullscreen");
        let fullscreen = selected != 0;
        let mode = if fullscreen {
            let (mode, ok) = vid_get_fullscreen(cvars.variable_string("vid_modelist"), selected);
            if !ok {
                com_dprintf(&format!("Using default fullscreen mode {}x{}\n", mode.width, mode.height));
            }
            mode
        } else {
            let (mode, _) = vid_get_geometry(cvars.variable_string("vid_geometry"));
            self.window = mode;
            mode
        };

        let req = ModeRequest { fullscreen, mode };
        let (width, height) = match self.drivers[idx].set_mode(&req) {
            Some(size) => size,
            None => {
                com_wprintf(&format!(
                    "{}: couldn't set video mode {}x{}\n",
                    self.drivers[idx].name(),
                    mode.width,
                    mode.height
                ));
                return;
            }
        };

        let mut flags = VidFlags::empty();
        if fullscreen {
            flags |= VidFlags::FULLSCREEN;
        }
        if self.renderer.as_ref().map_or(false, |r| r.is_hdr()) {
            flags |= VidFlags::HDR;
        }
        self.r_config = RefConfig {
            width,
            height,
            flags,
            dpi_scale: self.drivers[idx].get_dpi_scale(),
        };

        let config = self.r_config;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.mode_changed(&config);
        }
    }

    // ============================================================
    // Helpers
    // ============================================================

    /// Flip between windowed and the last used fullscreen mode.
    pub fn vid_toggle_fullscreen(&mut self, cvars: &mut CvarContext) {
        if cvars.find_var("vid_fullscreen").is_none() || cvars.find_var("_vid_fullscreen").is_none() {
            return;
        }

        if cvars.variable_integer("vid_fullscreen") == 0 {
            if cvars.variable_integer("_vid_fullscreen") == 0 {
                cvars.set("_vid_fullscreen", "1");
            }
            let fs = cvars.variable_string("_vid_fullscreen").to_string();
            cvars.set("vid_fullscreen", &fs);
        } else {
            cvars.set("vid_fullscreen", "0");
        }
    }

    /// Same scale the renderer derives from the `RefConfig` it was handed.
    pub fn get_auto_scale(&self) -> i32 {
        ref_api::get_auto_scale(&self.r_config)
    }

    /// Reciprocal UI scale from a scale cvar: explicit values clamp to
    /// [1, 10], zero means automatic, a missing cvar means 1.
    pub fn r_clamp_scale(&self, cvars: &mut CvarContext, name: &str) -> f32 {
        if cvars.find_var(name).is_none() {
            return 1.0;
        }
        if cvars.variable_value(name) != 0.0 {
            return 1.0 / cvars.clamp_value(name, 1.0, 10.0);
        }
        1.0 / self.get_auto_scale() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vid::VidError;
    use q2tone_common::q_shared::Vec4;
    use q2tone_renderer::framebuffer::FrameColorBuffer;
    use q2tone_renderer::ref_api::{RefDef, RenderError};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct DriverLog {
        calls: Vec<String>,
        modes: Vec<ModeRequest>,
        events: Vec<VidEvent>,
    }

    struct MockDriver {
        name: &'static str,
        probe_ok: bool,
        init_ok: bool,
        dpi: Rc<RefCell<Option<i32>>>,
        log: Rc<RefCell<DriverLog>>,
    }

    impl MockDriver {
        fn boxed(name: &'static str, probe_ok: bool, init_ok: bool) -> (Box<dyn VidDriver>, Rc<RefCell<DriverLog>>) {
            let log = Rc::new(RefCell::new(DriverLog::default()));
            let driver = MockDriver {
                name,
                probe_ok,
                init_ok,
                dpi: Rc::new(RefCell::new(None)),
                log: log.clone(),
            };
            (Box::new(driver), log)
        }
    }

    impl VidDriver for MockDriver {
        fn name(&self) -> &'static str {
            self.name
        }

        fn probe(&mut self) -> bool {
            self.log.borrow_mut().calls.push("probe".to_string());
            self.probe_ok
        }

        fn init(&mut self) -> Result<(), VidError> {
            self.log.borrow_mut().calls.push("init".to_string());
            if self.init_ok {
                Ok(())
            } else {
                Err(VidError::Init(format!("{} is broken", self.name)))
            }
        }

        fn shutdown(&mut self) {
            self.log.borrow_mut().calls.push("shutdown".to_string());
        }

        fn get_mode_list(&self) -> String {
            "640x480 1024x768@60 desktop".to_string()
        }

        fn set_mode(&mut self, req: &ModeRequest) -> Option<(u32, u32)> {
            self.log.borrow_mut().modes.push(*req);
            if req.mode.is_desktop() {
                Some((1920, 1080))
            } else {
                Some((req.mode.width, req.mode.height))
            }
        }

        fn pump_events(&mut self) -> Vec<VidEvent> {
            std::mem::take(&mut self.log.borrow_mut().events)
        }

        fn get_dpi_scale(&self) -> Option<i32> {
            *self.dpi.borrow()
        }
    }

    /// Minimal renderer for coordinator tests.
    struct NullRenderer {
        frame: FrameColorBuffer,
        lines: usize,
        debug_lines: bool,
    }

    impl Renderer for NullRenderer {
        fn name(&self) -> &str {
            "null"
        }
        fn init(&mut self, _total: bool, _cvars: &mut CvarContext) -> Result<RefType, RenderError> {
            Ok(RefType::Soft)
        }
        fn shutdown(&mut self, _total: bool) {}
        fn mode_changed(&mut self, config: &RefConfig) {
            self.frame.resize(config.width, config.height);
        }
        fn begin_frame(&mut self) {}
        fn render_frame(&mut self, _fd: &RefDef, _cvars: &CvarContext) {}
        fn draw_fill(&mut self, _x: i32, _y: i32, _w: i32, _h: i32, _color: Vec4) {}
        fn end_frame(&mut self) {}
        fn is_hdr(&self) -> bool {
            false
        }
        fn supports_debug_lines(&self) -> bool {
            self.debug_lines
        }
        fn add_debug_line(&mut self, _start: (i32, i32), _end: (i32, i32), _color: Vec4) {
            self.lines += 1;
        }
        fn clear_debug_lines(&mut self) {
            self.lines = 0;
        }
        fn frame_buffer(&self) -> &FrameColorBuffer {
            &self.frame
        }
    }

    fn create_null() -> Box<dyn Renderer> {
        Box::new(NullRenderer {
            frame: FrameColorBuffer::default(),
            lines: 0,
            debug_lines: true,
        })
    }

    fn create_null_without_lines() -> Box<dyn Renderer> {
        Box::new(NullRenderer {
            frame: FrameColorBuffer::default(),
            lines: 0,
            debug_lines: false,
        })
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn name(&self) -> &str {
            "failing"
        }
        fn init(&mut self, _total: bool, _cvars: &mut CvarContext) -> Result<RefType, RenderError> {
            Err(RenderError::Unsupported("no surface".to_string()))
        }
        fn shutdown(&mut self, _total: bool) {}
        fn mode_changed(&mut self, _config: &RefConfig) {}
        fn begin_frame(&mut self) {}
        fn render_frame(&mut self, _fd: &RefDef, _cvars: &CvarContext) {}
        fn draw_fill(&mut self, _x: i32, _y: i32, _w: i32, _h: i32, _color: Vec4) {}
        fn end_frame(&mut self) {}
        fn is_hdr(&self) -> bool {
            false
        }
        fn frame_buffer(&self) -> &FrameColorBuffer {
            unreachable!("failing renderer never renders")
        }
    }

    fn create_failing() -> Box<dyn Renderer> {
        Box::new(FailingRenderer)
    }

    fn single_driver() -> (RefreshState, Rc<RefCell<DriverLog>>, CvarContext) {
        let (driver, log) = MockDriver::boxed("mock", true, true);
        let state = RefreshState::new(vec![driver]).with_renderer_factory(create_null);
        (state, log, CvarContext::new())
    }

    fn mode_count(log: &Rc<RefCell<DriverLog>>) -> usize {
        log.borrow().modes.len()
    }

    fn last_mode(log: &Rc<RefCell<DriverLog>>) -> ModeRequest {
        *log.borrow().modes.last().unwrap()
    }

    // ============================================================
    // Init / fallback
    // ============================================================

    #[test]
    fn test_init_registers_cvars_and_sets_mode() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();

        assert!(state.ref_initialized);
        assert_eq!(state.ref_type, RefType::Soft);
        assert_eq!(cvars.variable_string("vid_modelist"), "640x480 1024x768@60 desktop");
        assert_eq!(cvars.variable_string("_vid_fullscreen"), "1");
        assert_eq!(cvars.cvar_modified & (CVAR_REFRESH | CVAR_FILES), 0);

        let req = last_mode(&log);
        assert!(!req.fullscreen);
        assert_eq!((req.mode.width, req.mode.height), (1280, 720));
        assert_eq!((state.r_config.width, state.r_config.height), (1280, 720));
        assert!(state.execute_command("cleardebuglines"));
    }

    #[test]
    fn test_init_copies_fullscreen_selection() {
        let (mut state, log, mut cvars) = single_driver();
        cvars.get_or_create("vid_fullscreen", "2", CVAR_ARCHIVE);
        state.cl_init_refresh(&mut cvars).unwrap();
        assert_eq!(cvars.variable_string("_vid_fullscreen"), "2");
        let req = last_mode(&log);
        assert!(req.fullscreen);
        assert_eq!(req.mode.refresh_hz, 60);
        assert!(state.r_config.flags.contains(VidFlags::FULLSCREEN));
    }

    #[test]
    fn test_fallback_order() {
        let (a, log_a) = MockDriver::boxed("a", false, true);
        let (b, log_b) = MockDriver::boxed("b", true, false);
        let (c, log_c) = MockDriver::boxed("c", true, true);
        let (d, log_d) = MockDriver::boxed("d", true, true);
        let mut state = RefreshState::new(vec![a, b, c, d]).with_renderer_factory(create_null);
        let mut cvars = CvarContext::new();

        state.cl_init_refresh(&mut cvars).unwrap();
        assert_eq!(state.active_driver_name(), Some("c"));
        assert_eq!(log_a.borrow().calls, vec!["probe"]);
        assert_eq!(log_b.borrow().calls, vec!["probe", "init"]);
        assert_eq!(log_c.borrow().calls, vec!["probe", "init"]);
        assert!(log_d.borrow().calls.is_empty());
    }

    #[test]
    fn test_requested_driver_tried_first() {
        let (a, log_a) = MockDriver::boxed("a", true, true);
        let (b, log_b) = MockDriver::boxed("b", false, true);
        let mut state = RefreshState::new(vec![a, b]).with_renderer_factory(create_null);
        let mut cvars = CvarContext::new();
        cvars.get_or_create("vid_driver", "b", CVAR_REFRESH);

        state.cl_init_refresh(&mut cvars).unwrap();
        // Explicit choice skips the probe
        assert_eq!(state.active_driver_name(), Some("b"));
        assert_eq!(log_b.borrow().calls, vec!["init"]);
        assert!(log_a.borrow().calls.is_empty());
        assert_eq!(cvars.variable_string("vid_driver"), "b");
    }

    #[test]
    fn test_failed_requested_driver_not_retried() {
        let (a, log_a) = MockDriver::boxed("a", true, false);
        let (b, _log_b) = MockDriver::boxed("b", true, true);
        let mut state = RefreshState::new(vec![a, b]).with_renderer_factory(create_null);
        let mut cvars = CvarContext::new();
        cvars.get_or_create("vid_driver", "a", CVAR_REFRESH);

        state.cl_init_refresh(&mut cvars).unwrap();
        assert_eq!(state.active_driver_name(), Some("b"));
        assert_eq!(log_a.borrow().calls, vec!["init"]);
        // Fallback resets the driver choice
        assert_eq!(cvars.variable_string("vid_driver"), "");
    }

    #[test]
    fn test_unknown_driver_name_falls_back() {
        let (mut state, _log, mut cvars) = single_driver();
        cvars.get_or_create("vid_driver", "nonexistent", CVAR_REFRESH);
        state.cl_init_refresh(&mut cvars).unwrap();
        assert_eq!(state.active_driver_name(), Some("mock"));
        assert_eq!(cvars.variable_string("vid_driver"), "");
    }

    #[test]
    fn test_exhaustion_is_fatal() {
        let (a, _) = MockDriver::boxed("a", false, true);
        let (b, _) = MockDriver::boxed("b", true, false);
        let mut state = RefreshState::new(vec![a, b]).with_renderer_factory(create_null);
        let mut cvars = CvarContext::new();

        let err = state.cl_init_refresh(&mut cvars).unwrap_err();
        assert_eq!(err, RefreshError::NoDriver("Video driver init failed: b is broken".to_string()));
        assert!(!state.ref_initialized);
        assert!(state.renderer().is_none());
    }

    #[test]
    fn test_no_drivers_is_fatal() {
        let mut state = RefreshState::new(Vec::new());
        let mut cvars = CvarContext::new();
        let err = state.cl_init_refresh(&mut cvars).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't initialize refresh: No available video driver");
    }

    #[test]
    fn test_renderer_failure_shuts_driver_down() {
        let (a, log_a) = MockDriver::boxed("a", true, true);
        let mut state = RefreshState::new(vec![a]).with_renderer_factory(create_failing);
        let mut cvars = CvarContext::new();

        let err = state.cl_init_refresh(&mut cvars).unwrap_err();
        assert_eq!(err, RefreshError::NoDriver("Unsupported: no surface".to_string()));
        assert_eq!(log_a.borrow().calls, vec!["probe", "init", "shutdown"]);
    }

    #[test]
    fn test_registry_renderer_used_by_default() {
        let (a, _) = MockDriver::boxed("a", true, true);
        let mut state = RefreshState::new(vec![a]);
        let mut cvars = CvarContext::new();
        state.cl_init_refresh(&mut cvars).unwrap();
        assert_eq!(state.renderer().map(|r| r.name()), Some("soft"));
        assert!(cvars.find_var("tm_enable").is_some());
    }

    // ============================================================
    // Shutdown
    // ============================================================

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        state.cl_shutdown_refresh();
        state.cl_shutdown_refresh();

        assert!(!state.ref_initialized);
        assert_eq!(state.ref_type, RefType::None);
        assert!(state.renderer().is_none());
        assert!(!state.execute_command("cleardebuglines"));
        let shutdowns = log.borrow().calls.iter().filter(|c| *c == "shutdown").count();
        assert_eq!(shutdowns, 1);
    }

    // ============================================================
    // Mode change truth table
    // ============================================================

    #[test]
    fn test_windowed_geometry_change_sets_mode() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        let before = mode_count(&log);

        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(mode_count(&log), before);

        cvars.set("vid_geometry", "800x600+5+6");
        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(mode_count(&log), before + 1);
        let req = last_mode(&log);
        assert!(!req.fullscreen);
        assert_eq!((req.mode.x, req.mode.y, req.mode.width, req.mode.height), (5, 6, 800, 600));
    }

    #[test]
    fn test_windowed_modelist_change_ignored() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        let before = mode_count(&log);

        cvars.set("vid_modelist", "800x600");
        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(mode_count(&log), before);
    }

    #[test]
    fn test_fullscreen_change_sets_mode_and_remembers_choice() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        let before = mode_count(&log);

        cvars.set("vid_fullscreen", "2");
        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(mode_count(&log), before + 1);
        let req = last_mode(&log);
        assert!(req.fullscreen);
        assert_eq!((req.mode.width, req.mode.height), (1024, 768));
        assert_eq!(cvars.variable_string("_vid_fullscreen"), "2");

        // Back to windowed: FULLSCREEN still wins, _vid_fullscreen kept
        cvars.set("vid_fullscreen", "0");
        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(mode_count(&log), before + 2);
        assert!(!last_mode(&log).fullscreen);
        assert_eq!(cvars.variable_string("_vid_fullscreen"), "2");
    }

    #[test]
    fn test_fullscreen_geometry_change_ignored_modelist_applied() {
        let (mut state, log, mut cvars) = single_driver();
        cvars.get_or_create("vid_fullscreen", "1", CVAR_ARCHIVE);
        state.cl_init_refresh(&mut cvars).unwrap();
        let before = mode_count(&log);

        cvars.set("vid_geometry", "800x600");
        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(mode_count(&log), before);

        cvars.set("vid_modelist", "1600x900");
        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(mode_count(&log), before + 1);
        assert_eq!(last_mode(&log).mode.width, 1600);
    }

    #[test]
    fn test_desktop_mode_size_recorded() {
        let (mut state, _log, mut cvars) = single_driver();
        cvars.get_or_create("vid_fullscreen", "3", CVAR_ARCHIVE);
        state.cl_init_refresh(&mut cvars).unwrap();
        assert_eq!((state.r_config.width, state.r_config.height), (1920, 1080));
    }

    // ============================================================
    // Driver events
    // ============================================================

    #[test]
    fn test_window_move_persists_geometry_without_mode_set() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        let before = mode_count(&log);

        log.borrow_mut().events.push(VidEvent::Moved { x: -40, y: 12 });
        log.borrow_mut().events.push(VidEvent::Resized { width: 1000, height: 700 });
        state.cl_run_refresh(&mut cvars).unwrap();

        assert_eq!(cvars.variable_string("vid_geometry"), "1000x700-40+12");
        assert_eq!(mode_count(&log), before);
        assert_eq!((state.r_config.width, state.r_config.height), (1000, 700));

        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(mode_count(&log), before);
    }

    #[test]
    fn test_close_request() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        log.borrow_mut().events.push(VidEvent::CloseRequested);
        state.cl_run_refresh(&mut cvars).unwrap();
        assert!(state.quit_requested);
    }

    // ============================================================
    // Restart draining
    // ============================================================

    #[test]
    fn test_refresh_cvar_triggers_total_restart() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        log.borrow_mut().calls.clear();

        cvars.set("vid_display", "1");
        assert_ne!(cvars.cvar_modified & CVAR_REFRESH, 0);
        state.cl_run_refresh(&mut cvars).unwrap();

        assert_eq!(cvars.cvar_modified & CVAR_REFRESH, 0);
        assert!(state.ref_initialized);
        assert_eq!(log.borrow().calls, vec!["shutdown", "probe", "init"]);

        // Drained: nothing happens on the next tick
        log.borrow_mut().calls.clear();
        state.cl_run_refresh(&mut cvars).unwrap();
        assert!(log.borrow().calls.is_empty());
    }

    #[test]
    fn test_files_cvar_triggers_partial_restart() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        log.borrow_mut().calls.clear();
        cvars.get_or_create("r_picmip", "0", q2tone_common::q_shared::CVAR_FILES);

        cvars.set("r_picmip", "1");
        state.cl_run_refresh(&mut cvars).unwrap();

        assert_eq!(cvars.cvar_modified & CVAR_FILES, 0);
        assert!(state.ref_initialized);
        // Driver untouched
        assert!(log.borrow().calls.is_empty());
    }

    #[test]
    fn test_refresh_wins_over_files() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        log.borrow_mut().calls.clear();
        cvars.get_or_create("r_picmip", "0", q2tone_common::q_shared::CVAR_FILES);

        cvars.set("r_picmip", "1");
        cvars.set("vid_display", "1");
        state.cl_run_refresh(&mut cvars).unwrap();
        // Total restart re-inits and clears both bits
        assert_eq!(cvars.cvar_modified & (CVAR_REFRESH | CVAR_FILES), 0);
        assert_eq!(log.borrow().calls, vec!["shutdown", "probe", "init"]);
    }

    #[test]
    fn test_restart_when_down_is_noop() {
        let (mut state, log, mut cvars) = single_driver();
        state.cl_restart_refresh(true, &mut cvars).unwrap();
        state.cl_restart_refresh(false, &mut cvars).unwrap();
        assert!(!state.ref_initialized);
        assert!(log.borrow().calls.is_empty());
    }

    // ============================================================
    // Helpers
    // ============================================================

    #[test]
    fn test_toggle_fullscreen() {
        let (mut state, _log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();

        cvars.set("_vid_fullscreen", "0");
        state.vid_toggle_fullscreen(&mut cvars);
        assert_eq!(cvars.variable_string("vid_fullscreen"), "1");
        assert_eq!(cvars.variable_string("_vid_fullscreen"), "1");

        state.vid_toggle_fullscreen(&mut cvars);
        assert_eq!(cvars.variable_string("vid_fullscreen"), "0");

        cvars.set("_vid_fullscreen", "3");
        state.vid_toggle_fullscreen(&mut cvars);
        assert_eq!(cvars.variable_string("vid_fullscreen"), "3");
    }

    #[test]
    fn test_clamp_scale() {
        let (mut state, _log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();

        assert_eq!(state.r_clamp_scale(&mut cvars, "scr_scale"), 1.0);

        cvars.get_or_create("scr_scale", "4", CVAR_ARCHIVE);
        assert_eq!(state.r_clamp_scale(&mut cvars, "scr_scale"), 0.25);

        cvars.set("scr_scale", "40");
        assert_eq!(state.r_clamp_scale(&mut cvars, "scr_scale"), 0.1);
        assert_eq!(cvars.variable_string("scr_scale"), "10");

        // Automatic: 1280x720 window
        cvars.set("scr_scale", "0");
        assert_eq!(state.r_clamp_scale(&mut cvars, "scr_scale"), 1.0);
        state.r_config.height = 1080;
        state.r_config.width = 1920;
        assert_eq!(state.r_clamp_scale(&mut cvars, "scr_scale"), 0.5);
    }

    #[test]
    fn test_auto_scale_respects_driver_dpi() {
        let log = Rc::new(RefCell::new(DriverLog::default()));
        let dpi = Rc::new(RefCell::new(Some(3)));
        let driver = MockDriver {
            name: "hidpi",
            probe_ok: true,
            init_ok: true,
            dpi: dpi.clone(),
            log: log.clone(),
        };
        let mut state = RefreshState::new(vec![Box::new(driver)]).with_renderer_factory(create_null);
        let mut cvars = CvarContext::new();
        state.cl_init_refresh(&mut cvars).unwrap();
        assert_eq!(state.r_config.dpi_scale, Some(3));
        assert_eq!(state.get_auto_scale(), 3);

        // Dragged onto a standard-DPI monitor
        *dpi.borrow_mut() = Some(1);
        log.borrow_mut().events.push(VidEvent::Resized { width: 1280, height: 720 });
        state.cl_run_refresh(&mut cvars).unwrap();
        assert_eq!(state.r_config.dpi_scale, Some(1));
        assert_eq!(state.get_auto_scale(), 1);
    }

    #[test]
    fn test_renderer_receives_dpi_scale() {
        let (a, _log) = MockDriver::boxed("a", true, true);
        let mut state = RefreshState::new(vec![a]);
        let mut cvars = CvarContext::new();
        state.cl_init_refresh(&mut cvars).unwrap();
        cvars.set("tm_debug", "1");
        cvars.set("tm_dither", "0");

        // The soft renderer draws its chart at the coordinator's scale
        state.r_config.dpi_scale = Some(2);
        let config = state.r_config;
        let radiance = vec![[0.0, 0.0, 0.0, 1.0]; 1280 * 720];
        let fd = RefDef {
            width: 1280,
            height: 720,
            frametime: 0.016,
            blend: [0.0; 4],
            colorize: [0.0; 4],
            ui_overlay: false,
            radiance: &radiance,
        };
        let renderer = state.renderer_mut().unwrap();
        renderer.mode_changed(&config);
        renderer.begin_frame();
        renderer.render_frame(&fd, &cvars);
        assert_eq!(renderer.frame_buffer().get(16, 703).unwrap()[0], 1.0);
    }

    #[test]
    fn test_clear_debug_lines_command() {
        let (mut state, _log, mut cvars) = single_driver();
        state.cl_init_refresh(&mut cvars).unwrap();
        if let Some(r) = state.renderer_mut() {
            r.add_debug_line((0, 0), (1, 1), [1.0; 4]);
        }
        assert!(state.execute_command("cleardebuglines"));
        assert!(!state.execute_command("nosuchcommand"));
        assert!(!state.execute_command(""));
    }

    #[test]
    fn test_clear_debug_lines_needs_renderer_support() {
        let (a, _log) = MockDriver::boxed("a", true, true);
        let mut state = RefreshState::new(vec![a]).with_renderer_factory(create_null_without_lines);
        let mut cvars = CvarContext::new();
        state.cl_init_refresh(&mut cvars).unwrap();
        assert!(!state.execute_command("cleardebuglines"));

        // Shutdown copes with the command never being registered
        state.cl_shutdown_refresh();
        assert!(!state.ref_initialized);
    }
}

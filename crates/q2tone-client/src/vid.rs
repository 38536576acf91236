// vid.rs — video driver interface
//
// A driver owns the platform window (or an off-screen surface). The refresh
// coordinator probes the registered drivers in order and keeps the first one
// whose init succeeds together with a renderer.

use crate::vid_mode::DisplayMode;

/// What the coordinator asks the driver to switch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeRequest {
    pub fullscreen: bool,
    /// Fullscreen: the selected mode (all zero = desktop mode).
    /// Windowed: size and placement.
    pub mode: DisplayMode,
}

/// Window system notifications, drained once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VidEvent {
    Moved { x: i32, y: i32 },
    Resized { width: u32, height: u32 },
    CloseRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VidError {
    /// The driver cannot run on this system.
    Unavailable(String),
    /// Window or surface creation failed.
    Init(String),
}

impl std::fmt::Display for VidError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VidError::Unavailable(msg) => write!(f, "Video driver unavailable: {}", msg),
            VidError::Init(msg) => write!(f, "Video driver init failed: {}", msg),
        }
    }
}

impl std::error::Error for VidError {}

pub trait VidDriver {
    fn name(&self) -> &'static str;

    /// Cheap check whether this driver can work here at all.
    fn probe(&mut self) -> bool;

    fn init(&mut self) -> Result<(), VidError>;
    fn shutdown(&mut self);

    /// Space separated fullscreen modes, as stored in `vid_modelist`.
    fn get_mode_list(&self) -> String;

    /// Apply `req`. Returns the resulting surface size, or None if the mode
    /// could not be set.
    fn set_mode(&mut self, req: &ModeRequest) -> Option<(u32, u32)>;

    fn pump_events(&mut self) -> Vec<VidEvent>;

    /// Minimum UI scale the platform asks for, if it reports one.
    fn get_dpi_scale(&self) -> Option<i32> {
        None
    }
}

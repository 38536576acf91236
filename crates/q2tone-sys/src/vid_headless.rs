// vid_headless.rs — off-screen video driver
//
// Always available. Modes are accepted as requested; the frame buffer is
// never shown anywhere.

use q2tone_client::vid::{ModeRequest, VidDriver, VidError, VidEvent};
use q2tone_common::common::com_dprintf;

/// Size reported for the `desktop` mode.
pub const DESKTOP_WIDTH: u32 = 1920;
pub const DESKTOP_HEIGHT: u32 = 1080;

const MODE_LIST: &str = "640x480 1280x720 1920x1080@60 desktop";

#[derive(Default)]
pub struct HeadlessDriver {
    active: bool,
    size: (u32, u32),
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl VidDriver for HeadlessDriver {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn probe(&mut self) -> bool {
        true
    }

    fn init(&mut self) -> Result<(), VidError> {
        self.active = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.active = false;
        self.size = (0, 0);
    }

    fn get_mode_list(&self) -> String {
        MODE_LIST.to_string()
    }

    fn set_mode(&mut self, req: &ModeRequest) -> Option<(u32, u32)> {
        if !self.active {
            return None;
        }
        self.size = if req.fullscreen && req.mode.is_desktop() {
            (DESKTOP_WIDTH, DESKTOP_HEIGHT)
        } else {
            (req.mode.width, req.mode.height)
        };
        com_dprintf(&format!("headless: {}x{}\n", self.size.0, self.size.1));
        Some(self.size)
    }

    fn pump_events(&mut self) -> Vec<VidEvent> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use q2tone_client::vid_mode::DisplayMode;

    #[test]
    fn test_set_mode_requires_init() {
        let mut drv = HeadlessDriver::new();
        let req = ModeRequest {
            fullscreen: false,
            mode: DisplayMode::GEOMETRY_DEFAULT,
        };
        assert_eq!(drv.set_mode(&req), None);
        drv.init().unwrap();
        assert_eq!(drv.set_mode(&req), Some((1280, 720)));
        drv.shutdown();
        assert_eq!(drv.size(), (0, 0));
    }

    #[test]
    fn test_desktop_mode() {
        let mut drv = HeadlessDriver::new();
        drv.init().unwrap();
        let req = ModeRequest {
            fullscreen: true,
            mode: DisplayMode::default(),
        };
        assert_eq!(drv.set_mode(&req), Some((DESKTOP_WIDTH, DESKTOP_HEIGHT)));
    }

    #[test]
    fn test_mode_list_ends_with_desktop() {
        let drv = HeadlessDriver::new();
        assert!(drv.get_mode_list().ends_with("desktop"));
    }
}

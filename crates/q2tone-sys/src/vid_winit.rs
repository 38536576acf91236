// vid_winit.rs — winit window driver
//
// The event loop is created on first probe and lives as long as the driver;
// winit does not allow a second one per process. Init/shutdown only create
// and destroy the window.

use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::monitor::{MonitorHandle, VideoModeHandle};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use q2tone_client::vid::{ModeRequest, VidDriver, VidError, VidEvent};
use q2tone_client::vid_mode::DisplayMode;
use q2tone_common::common::{com_dprintf, com_printf, com_wprintf, DISTNAME};

/// Collects the window events the refresh layer cares about.
#[derive(Default)]
struct EventCollector {
    events: Vec<VidEvent>,
}

impl ApplicationHandler for EventCollector {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.events.push(VidEvent::CloseRequested),
            WindowEvent::Moved(pos) => self.events.push(VidEvent::Moved { x: pos.x, y: pos.y }),
            WindowEvent::Resized(size) => self.events.push(VidEvent::Resized {
                width: size.width,
                height: size.height,
            }),
            _ => {}
        }
    }
}

pub struct WinitDriver {
    event_loop: Option<EventLoop<()>>,
    window: Option<Window>,
}

impl Default for WinitDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl WinitDriver {
    pub fn new() -> Self {
        Self {
            event_loop: None,
            window: None,
        }
    }

    fn monitor(&self) -> Option<MonitorHandle> {
        let window = self.window.as_ref()?;
        window.current_monitor().or_else(|| window.primary_monitor())
    }

    /// Video mode of the current monitor closest to `mode`. Refresh rate and
    /// depth only count when requested.
    fn closest_video_mode(&self, mode: &DisplayMode) -> Option<VideoModeHandle> {
        let monitor = self.monitor()?;
        monitor.video_modes().min_by_key(|vm| {
            let size = vm.size();
            let mut cost = size.width.abs_diff(mode.width) as u64 + size.height.abs_diff(mode.height) as u64;
            cost *= 1000;
            if mode.refresh_hz != 0 {
                cost += (vm.refresh_rate_millihertz() / 1000).abs_diff(mode.refresh_hz) as u64;
            }
            if mode.color_depth != 0 {
                cost += (vm.bit_depth() as u32).abs_diff(mode.color_depth) as u64;
            }
            cost
        })
    }
}

fn format_video_mode(vm: &VideoModeHandle) -> String {
    let size = vm.size();
    format!(
        "{}x{}@{}:{}",
        size.width,
        size.height,
        (vm.refresh_rate_millihertz() + 500) / 1000,
        vm.bit_depth()
    )
}

impl VidDriver for WinitDriver {
    fn name(&self) -> &'static str {
        "winit"
    }

    fn probe(&mut self) -> bool {
        if self.event_loop.is_some() {
            return true;
        }
        match EventLoop::new() {
            Ok(event_loop) => {
                self.event_loop = Some(event_loop);
                true
            }
            Err(e) => {
                com_dprintf(&format!("winit: no event loop: {}\n", e));
                false
            }
        }
    }

    fn init(&mut self) -> Result<(), VidError> {
        if !self.probe() {
            return Err(VidError::Unavailable("no window system".to_string()));
        }
        let event_loop = match self.event_loop.as_ref() {
            Some(el) => el,
            None => return Err(VidError::Unavailable("no event loop".to_string())),
        };

        let attrs = WindowAttributes::default()
            .with_title(DISTNAME)
            .with_inner_size(PhysicalSize::new(DisplayMode::GEOMETRY_DEFAULT.width, DisplayMode::GEOMETRY_DEFAULT.height));

        // winit 0.30 wants windows created from an ActiveEventLoop
        #[allow(deprecated)]
        let window = event_loop
            .create_window(attrs)
            .map_err(|e| VidError::Init(format!("window build failed: {}", e)))?;

        com_printf("...winit window created\n");
        self.window = Some(window);
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.window.take().is_some() {
            com_dprintf("winit: destroying window\n");
        }
    }

    fn get_mode_list(&self) -> String {
        let mut modes: Vec<String> = Vec::new();
        if let Some(monitor) = self.monitor() {
            for vm in monitor.video_modes() {
                let s = format_video_mode(&vm);
                if !modes.contains(&s) {
                    modes.push(s);
                }
            }
        }
        modes.push("desktop".to_string());
        modes.join(" ")
    }

    fn set_mode(&mut self, req: &ModeRequest) -> Option<(u32, u32)> {
        let fullscreen = if !req.fullscreen {
            None
        } else if req.mode.is_desktop() {
            Some(Fullscreen::Borderless(self.monitor()))
        } else {
            match self.closest_video_mode(&req.mode) {
                Some(vm) => Some(Fullscreen::Exclusive(vm)),
                None => {
                    com_wprintf("winit: no exclusive modes, using desktop\n");
                    Some(Fullscreen::Borderless(self.monitor()))
                }
            }
        };

        let size = match &fullscreen {
            Some(Fullscreen::Exclusive(vm)) => vm.size(),
            Some(Fullscreen::Borderless(monitor)) => match monitor {
                Some(m) => m.size(),
                None => self.window.as_ref()?.inner_size(),
            },
            None => PhysicalSize::new(req.mode.width, req.mode.height),
        };

        let window = self.window.as_ref()?;
        let windowed = fullscreen.is_none();
        window.set_fullscreen(fullscreen);
        if windowed {
            let _ = window.request_inner_size(size);
            window.set_outer_position(PhysicalPosition::new(req.mode.x, req.mode.y));
        }

        com_dprintf(&format!(
            "winit: {}x{} {}\n",
            size.width,
            size.height,
            if windowed { "windowed" } else { "fullscreen" }
        ));
        Some((size.width, size.height))
    }

    fn pump_events(&mut self) -> Vec<VidEvent> {
        let event_loop = match self.event_loop.as_mut() {
            Some(el) => el,
            None => return Vec::new(),
        };
        let mut collector = EventCollector::default();
        if let PumpStatus::Exit(_) = event_loop.pump_app_events(Some(Duration::ZERO), &mut collector) {
            collector.events.push(VidEvent::CloseRequested);
        }
        collector.events
    }

    fn get_dpi_scale(&self) -> Option<i32> {
        let window = self.window.as_ref()?;
        Some((window.scale_factor().round() as i32).max(1))
    }
}

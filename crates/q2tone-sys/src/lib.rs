// Platform layer: video drivers, command line, config file and the demo scene

pub mod scene;
pub mod sys_cmdline;
pub mod sys_config;
pub mod vid_headless;
pub mod vid_winit;

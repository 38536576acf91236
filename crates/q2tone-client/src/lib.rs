#![allow(clippy::new_without_default, clippy::manual_range_contains)]
// Client side of the refresh: video driver interface, mode strings and the
// refresh lifecycle

pub mod vid;
pub mod vid_mode;
pub mod cl_refresh;

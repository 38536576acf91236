#![allow(clippy::too_many_arguments, clippy::manual_range_contains, clippy::float_cmp,
         clippy::needless_range_loop, clippy::new_without_default)]
// Refresh backends and the HDR tone mapping stage

pub mod ref_api;
pub mod framebuffer;
pub mod tonemap;
pub mod sw_draw;
pub mod sw_main;

#![allow(clippy::manual_range_contains, clippy::float_cmp, clippy::needless_range_loop,
         clippy::too_many_arguments, clippy::new_without_default)]

pub mod q_shared;
pub mod common;
pub mod cvar;
pub mod cmd;

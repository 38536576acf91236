// common.rs — misc functions used by client, renderer and platform layers

use parking_lot::Mutex;

use crate::q_shared::{ERR_DROP, ERR_FATAL};

/// Distribution name and version (for window title, version strings, etc.)
pub const DISTNAME: &str = "Q2Tone";
pub const DISTVER: f32 = 1.0;

// ============================================================
// Com_Printf / Com_DPrintf / Com_WPrintf / Com_Error
// ============================================================

/// General-purpose print function.
///
/// Messages keep the console convention of a trailing newline; it is
/// stripped before the message reaches the log facade.
pub fn com_printf(msg: &str) {
    log::info!("{}", msg.trim_end_matches('\n'));
}

/// Developer-only print. Shown when the log level admits debug output.
pub fn com_dprintf(msg: &str) {
    log::debug!("{}", msg.trim_end_matches('\n'));
}

/// Warning print.
pub fn com_wprintf(msg: &str) {
    log::warn!("{}", msg.trim_end_matches('\n'));
}

/// Engine error handler.
/// - `ERR_FATAL`: logs the error and panics.
/// - `ERR_DROP`: logs the error (non-fatal, allows recovery).
/// - `ERR_QUIT`: clean exit.
pub fn com_error(code: i32, msg: &str) {
    let msg = msg.trim_end_matches('\n');
    if code == ERR_FATAL {
        log::error!("Error: {}", msg);
        panic!("Fatal error: {}", msg);
    } else if code == ERR_DROP {
        log::error!("********************\nERROR: {}\n********************", msg);
    } else {
        log::info!("{}", msg);
        std::process::exit(0);
    }
}

// ============================================================
// Last error string
// ============================================================

static LAST_ERROR: Mutex<String> = Mutex::new(String::new());

/// Remember a failure description for a later, more general error report.
pub fn com_set_last_error(msg: &str) {
    let mut last = LAST_ERROR.lock();
    last.clear();
    last.push_str(msg);
}

/// Last failure recorded by `com_set_last_error`, or "" if none.
pub fn com_get_last_error() -> String {
    LAST_ERROR.lock().clone()
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_error_roundtrip() {
        com_set_last_error("No available video driver");
        assert_eq!(com_get_last_error(), "No available video driver");
        com_set_last_error("driver exploded");
        assert_eq!(com_get_last_error(), "driver exploded");
    }

    #[test]
    #[should_panic(expected = "Fatal error")]
    fn test_com_error_fatal_panics() {
        com_error(ERR_FATAL, "Couldn't initialize refresh\n");
    }

    #[test]
    fn test_com_error_drop_returns() {
        com_error(ERR_DROP, "recoverable\n");
    }
}

// vid_mode.rs — video mode and window geometry strings
//
// vid_modelist:  640x480 800x600@75 1024x768@75:32 1280x1024:32@60 desktop
// vid_geometry:  1280x720, 1280x720+0, 1280x720-100-100
//
// Parsing never fails hard: a bad string yields the defaults plus a false
// flag and a developer message.

use q2tone_common::common::com_dprintf;

/// A resolved mode or window placement. A fullscreen mode with all fields
/// zero means "use the desktop mode".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayMode {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub refresh_hz: u32,
    pub color_depth: u32,
}

impl DisplayMode {
    pub const FULLSCREEN_DEFAULT: DisplayMode = DisplayMode {
        x: 0,
        y: 0,
        width: 640,
        height: 480,
        refresh_hz: 0,
        color_depth: 0,
    };

    pub const GEOMETRY_DEFAULT: DisplayMode = DisplayMode {
        x: 100,
        y: 100,
        width: 1280,
        height: 720,
        refresh_hz: 0,
        color_depth: 0,
    };

    pub fn is_desktop(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

const MIN_WIDTH: u64 = 320;
const MIN_HEIGHT: u64 = 240;
const MAX_EXTENT: u64 = 8192;
const MAX_REFRESH: u64 = 1000;
const MAX_DEPTH: u64 = 32;

// ============================================================
// Scanner
// ============================================================

/// Byte cursor with C `strtoul` / `strtol` semantics.
struct Scanner<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { s: s.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.s.len()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.s[self.pos..].starts_with(prefix.as_bytes())
    }

    fn is_separator(c: u8) -> bool {
        c.is_ascii_whitespace() || c == b','
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(c) if Self::is_separator(c)) {
            self.pos += 1;
        }
    }

    /// Consume `c` if it is next.
    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Leading blanks, optional sign, decimal digits. With no digits the
    /// cursor is left where it was and 0 is returned. Saturates instead of
    /// wrapping.
    fn strtol(&mut self) -> i64 {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let negative = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b'+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        let digits_start = self.pos;
        let mut value: i64 = 0;
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            value = value.saturating_mul(10).saturating_add((c - b'0') as i64);
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.pos = start;
            return 0;
        }
        if negative {
            -value
        } else {
            value
        }
    }

    /// Unsigned variant; a negative number reads as out of range.
    fn strtoul(&mut self) -> u64 {
        let v = self.strtol();
        if v < 0 {
            u64::MAX
        } else {
            v as u64
        }
    }
}

// ============================================================
// Fullscreen modes
// ============================================================

/// Pick the `selected`th (1-based) descriptor out of `modelist`.
///
/// Returns the mode and true on success, or `DisplayMode::FULLSCREEN_DEFAULT`
/// and false if the list is empty, malformed, too short, or the selected
/// mode is out of range.
pub fn vid_get_fullscreen(modelist: &str, selected: i32) -> (DisplayMode, bool) {
    let fail = (DisplayMode::FULLSCREEN_DEFAULT, false);

    let mut s = Scanner::new(modelist);
    s.skip_separators();
    if s.at_end() {
        return fail;
    }

    let mut mode = 1;
    let (w, h, freq, depth, desktop) = loop {
        let parsed = if s.starts_with("desktop") {
            s.pos += "desktop".len();
            if matches!(s.peek(), Some(c) if !Scanner::is_separator(c)) {
                com_dprintf(&format!("Mode {} is malformed\n", mode));
                return fail;
            }
            (0, 0, 0, 0, true)
        } else {
            let w = s.strtoul();
            if !s.eat(b'x') && !s.eat(b'X') {
                com_dprintf(&format!("Mode {} is malformed\n", mode));
                return fail;
            }
            let h = s.strtoul();
            let mut freq = 0;
            let mut depth = 0;
            if s.eat(b'@') {
                freq = s.strtoul();
                if s.eat(b':') {
                    depth = s.strtoul();
                }
            } else if s.eat(b':') {
                depth = s.strtoul();
                if s.eat(b'@') {
                    freq = s.strtoul();
                }
            }
            (w, h, freq, depth, false)
        };

        if mode == selected {
            break parsed;
        }

        s.skip_separators();
        if s.at_end() {
            com_dprintf(&format!("Mode {} not found\n", selected));
            return fail;
        }
        mode += 1;
    };

    if desktop {
        return (DisplayMode::default(), true);
    }

    if w < MIN_WIDTH
        || w > MAX_EXTENT
        || h < MIN_HEIGHT
        || h > MAX_EXTENT
        || freq > MAX_REFRESH
        || depth > MAX_DEPTH
    {
        com_dprintf(&format!("Mode {}x{}@{}:{} doesn't look sane\n", w, h, freq, depth));
        return fail;
    }

    (
        DisplayMode {
            x: 0,
            y: 0,
            width: w as u32,
            height: h as u32,
            refresh_hz: freq as u32,
            color_depth: depth as u32,
        },
        true,
    )
}

// ============================================================
// Window geometry
// ============================================================

/// Parse `WxH[+-X[+-Y]]`. Position fields keep their defaults when absent.
pub fn vid_get_geometry(geometry: &str) -> (DisplayMode, bool) {
    let fail = (DisplayMode::GEOMETRY_DEFAULT, false);

    if geometry.is_empty() {
        return fail;
    }

    let mut s = Scanner::new(geometry);
    let w = s.strtoul();
    if !s.eat(b'x') && !s.eat(b'X') {
        com_dprintf("Geometry string is malformed\n");
        return fail;
    }
    let h = s.strtoul();

    let mut x = DisplayMode::GEOMETRY_DEFAULT.x as i64;
    let mut y = DisplayMode::GEOMETRY_DEFAULT.y as i64;
    if matches!(s.peek(), Some(b'+') | Some(b'-')) {
        x = s.strtol();
        if matches!(s.peek(), Some(b'+') | Some(b'-')) {
            y = s.strtol();
        }
    }

    if w < MIN_WIDTH || w > MAX_EXTENT || h < MIN_HEIGHT || h > MAX_EXTENT {
        com_dprintf(&format!("Geometry {}x{} doesn't look sane\n", w, h));
        return fail;
    }

    (
        DisplayMode {
            x: x.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            y: y.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            width: w as u32,
            height: h as u32,
            refresh_hz: 0,
            color_depth: 0,
        },
        true,
    )
}

/// Canonical geometry string, `WxH+X+Y` with explicit signs.
pub fn vid_set_geometry(rc: &DisplayMode) -> String {
    format!("{}x{}{:+}{:+}", rc.width, rc.height, rc.x, rc.y)
}

// sys_config.rs — archived cvar persistence
//
// The config file is a script of `set name "value"` lines as written by
// `CvarContext::write_variables`. It is read before the command line so
// `+set` overrides it, and rewritten on clean shutdown.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use q2tone_common::common::{com_dprintf, com_printf, DISTNAME};
use q2tone_common::cvar::CvarContext;
use q2tone_common::q_shared::CVAR_ZERO;

pub const CONFIG_FILE: &str = "q2tone.cfg";

/// Split one script line into tokens. Double quotes group, `//` starts a
/// comment.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        let c = match chars.peek() {
            Some(&c) => c,
            None => break,
        };

        if c == '"' {
            chars.next();
            let mut tok = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                tok.push(c);
            }
            tokens.push(tok);
            continue;
        }

        let mut tok = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            tok.push(c);
            chars.next();
        }
        if tok.starts_with("//") {
            break;
        }
        tokens.push(tok);
    }
    tokens
}

/// Run the `set` lines of a config script. Returns the number of cvars set.
pub fn com_exec_config(text: &str, cvars: &mut CvarContext) -> usize {
    let mut count = 0;
    for line in text.lines() {
        let argv = tokenize(line);
        match argv.first().map(|s| s.as_str()) {
            None => {}
            Some("set") if argv.len() >= 3 => {
                if cvars.find_var(&argv[1]).is_some() {
                    cvars.set(&argv[1], &argv[2]);
                } else {
                    cvars.get_or_create(&argv[1], &argv[2], CVAR_ZERO);
                }
                count += 1;
            }
            Some(cmd) => com_dprintf(&format!("config: ignoring \"{}\"\n", cmd)),
        }
    }
    count
}

/// Load `path` if it exists.
pub fn cl_load_configuration(path: &Path, cvars: &mut CvarContext) {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let count = com_exec_config(&text, cvars);
            com_dprintf(&format!("execing {} ({} cvars)\n", path.display(), count));
        }
        Err(_) => com_dprintf(&format!("no {}\n", path.display())),
    }
}

pub fn cl_write_configuration(path: &Path, cvars: &CvarContext) {
    let result = File::create(path).and_then(|f| {
        let mut f = BufWriter::new(f);
        writeln!(f, "// generated by {}, do not modify", DISTNAME)?;
        cvars.write_variables(&mut f)?;
        f.flush()
    });
    match result {
        Ok(()) => com_printf(&format!("saving config to {}\n", path.display())),
        Err(e) => com_printf(&format!("Couldn't write {}: {}\n", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use q2tone_common::q_shared::CVAR_ARCHIVE;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("set vid_geometry \"800x600+1+2\""), vec!["set", "vid_geometry", "800x600+1+2"]);
        assert_eq!(tokenize("  set a \"\" // trailing"), vec!["set", "a", ""]);
        assert!(tokenize("// only a comment").is_empty());
    }

    #[test]
    fn test_exec_config() {
        let mut cvars = CvarContext::new();
        cvars.get_or_create("vid_fullscreen", "0", CVAR_ARCHIVE);
        let text = "// header\nset vid_fullscreen \"2\"\nbind x y\nset tm_debug \"1\"\n\n";

        assert_eq!(com_exec_config(text, &mut cvars), 2);
        assert_eq!(cvars.variable_integer("vid_fullscreen"), 2);
        assert_eq!(cvars.variable_integer("tm_debug"), 1);
    }

    #[test]
    fn test_written_config_reads_back() {
        let mut cvars = CvarContext::new();
        cvars.get_or_create("vid_geometry", "1280x720", CVAR_ARCHIVE);
        cvars.set_from_code("vid_geometry", "1000x700-40+12");
        let mut buf = Vec::new();
        cvars.write_variables(&mut buf).unwrap();

        let mut fresh = CvarContext::new();
        com_exec_config(&String::from_utf8(buf).unwrap(), &mut fresh);
        assert_eq!(fresh.variable_string("vid_geometry"), "1000x700-40+12");
    }

    #[test]
    fn test_load_write_file() {
        let path = std::env::temp_dir().join(format!("q2tone-test-{}.cfg", std::process::id()));
        let mut cvars = CvarContext::new();
        cvars.get_or_create("_vid_fullscreen", "3", CVAR_ARCHIVE);
        cl_write_configuration(&path, &cvars);

        let mut loaded = CvarContext::new();
        cl_load_configuration(&path, &mut loaded);
        assert_eq!(loaded.variable_string("_vid_fullscreen"), "3");
        let _ = std::fs::remove_file(&path);
    }
}

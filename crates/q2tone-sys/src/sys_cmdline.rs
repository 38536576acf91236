// sys_cmdline.rs — command line parameters as console statements
//
// `+set name value` is applied before anything initializes. Every other
// `+command args...` runs after the refresh is up.

use q2tone_common::common::com_printf;
use q2tone_common::cvar::CvarContext;
use q2tone_common::q_shared::CVAR_ZERO;

/// Apply every `+set name value` triple and remove it from `args`.
pub fn com_add_early_commands(args: &mut Vec<String>, cvars: &mut CvarContext) {
    let mut i = 0;
    while i < args.len() {
        if args[i] != "+set" {
            i += 1;
            continue;
        }
        if i + 2 >= args.len() {
            com_printf("usage: +set <variable> <value>\n");
            args.truncate(i);
            break;
        }
        let name = args[i + 1].clone();
        let value = args[i + 2].clone();
        if cvars.find_var(&name).is_some() {
            cvars.set(&name, &value);
        } else {
            cvars.get_or_create(&name, &value, CVAR_ZERO);
        }
        args.drain(i..i + 3);
    }
}

/// Split the remaining parameters into commands. A command starts with `+`
/// and runs until the next `+` token.
pub fn com_add_late_commands(args: &[String]) -> Vec<Vec<String>> {
    let mut commands: Vec<Vec<String>> = Vec::new();
    for arg in args {
        if let Some(name) = arg.strip_prefix('+') {
            if !name.is_empty() {
                commands.push(vec![name.to_string()]);
            }
        } else if let Some(cmd) = commands.last_mut() {
            cmd.push(arg.clone());
        }
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_early_commands_set_cvars() {
        let mut cvars = CvarContext::new();
        cvars.get_or_create("vid_fullscreen", "0", 0);
        let mut args = strings(&["+set", "vid_fullscreen", "2", "+cleardebuglines", "+set", "sys_frames", "10"]);

        com_add_early_commands(&mut args, &mut cvars);
        assert_eq!(cvars.variable_integer("vid_fullscreen"), 2);
        assert_eq!(cvars.variable_integer("sys_frames"), 10);
        assert_eq!(args, strings(&["+cleardebuglines"]));
    }

    #[test]
    fn test_early_commands_truncated_set() {
        let mut cvars = CvarContext::new();
        let mut args = strings(&["+set", "tm_debug"]);
        com_add_early_commands(&mut args, &mut cvars);
        assert!(args.is_empty());
        assert!(cvars.find_var("tm_debug").is_none());
    }

    #[test]
    fn test_late_commands() {
        let args = strings(&["junk", "+tm_debug", "1", "+cleardebuglines", "+"]);
        let cmds = com_add_late_commands(&args);
        assert_eq!(cmds, vec![strings(&["tm_debug", "1"]), strings(&["cleardebuglines"])]);
    }
}

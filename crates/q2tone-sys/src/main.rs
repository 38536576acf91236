// Entry point
//
//   1. Load the saved config, then apply `+set` parameters
//   2. Install the logger (`developer 1` or RUST_LOG for debug output)
//   3. Bring up the refresh, run the remaining `+commands`
//   4. Main loop: refresh housekeeping, render the test scene
//   5. Save archived cvars

use std::path::Path;
use std::time::{Duration, Instant};

use q2tone_client::cl_refresh::RefreshState;
use q2tone_client::vid::VidDriver;
use q2tone_common::common::{com_dprintf, com_error, com_printf, DISTNAME, DISTVER};
use q2tone_common::cvar::CvarContext;
use q2tone_common::q_shared::{CVAR_ZERO, ERR_FATAL};
use q2tone_renderer::ref_api::RefDef;

use q2tone_sys::scene::Scene;
use q2tone_sys::sys_cmdline::{com_add_early_commands, com_add_late_commands};
use q2tone_sys::sys_config::{cl_load_configuration, cl_write_configuration, CONFIG_FILE};
use q2tone_sys::vid_headless::HeadlessDriver;
use q2tone_sys::vid_winit::WinitDriver;

const FRAME_TIME: Duration = Duration::from_millis(16);

fn init_logging(cvars: &CvarContext) {
    let mut builder = env_logger::Builder::new();
    if cvars.variable_integer("developer") != 0 {
        builder.filter_level(log::LevelFilter::Debug);
    } else if let Ok(filter) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();
}

fn execute_late_commands(refresh: &mut RefreshState, cvars: &mut CvarContext, commands: &[Vec<String>]) {
    for argv in commands {
        let text = argv.join(" ");
        if refresh.execute_command(&text) {
            continue;
        }
        if !cvars.command(&argv[0], argv.len(), argv.get(1).map(|s| s.as_str())) {
            com_printf(&format!("Unknown command \"{}\"\n", argv[0]));
        }
    }
}

fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut cvars = CvarContext::new();
    cvars.get_or_create("developer", "0", CVAR_ZERO);
    cvars.get_or_create("sys_frames", "0", CVAR_ZERO);
    let config = Path::new(CONFIG_FILE);
    cl_load_configuration(config, &mut cvars);
    com_add_early_commands(&mut args, &mut cvars);

    init_logging(&cvars);
    com_printf(&format!("{} {:.2}\n", DISTNAME, DISTVER));

    let drivers: Vec<Box<dyn VidDriver>> = vec![Box::new(WinitDriver::new()), Box::new(HeadlessDriver::new())];
    let mut refresh = RefreshState::new(drivers);
    if let Err(err) = refresh.cl_init_refresh(&mut cvars) {
        com_error(ERR_FATAL, &err.to_string());
        return;
    }

    execute_late_commands(&mut refresh, &mut cvars, &com_add_late_commands(&args));

    let max_frames = cvars.variable_integer("sys_frames").max(0) as u64;
    let mut scene = Scene::new();
    let start = Instant::now();
    let mut oldtime = start;
    let mut frames: u64 = 0;

    loop {
        if let Err(err) = refresh.cl_run_refresh(&mut cvars) {
            com_error(ERR_FATAL, &err.to_string());
            return;
        }
        if refresh.quit_requested {
            break;
        }

        let newtime = Instant::now();
        let frametime = (newtime - oldtime).as_secs_f32();
        oldtime = newtime;
        let t = (newtime - start).as_secs_f32();

        let (width, height) = (refresh.r_config.width, refresh.r_config.height);
        scene.render(width, height, t);

        if let Some(renderer) = refresh.renderer_mut() {
            let fd = RefDef {
                width,
                height,
                frametime,
                blend: Scene::blend(t),
                colorize: [0.0; 4],
                ui_overlay: false,
                radiance: scene.radiance(),
            };
            renderer.begin_frame();
            renderer.render_frame(&fd, &cvars);
            renderer.end_frame();

            if frames % 60 == 0 {
                if let Some(p) = renderer.frame_buffer().get(width / 2, height / 2) {
                    com_dprintf(&format!(
                        "frame {}: center {:.3} {:.3} {:.3}\n",
                        frames, p[0], p[1], p[2]
                    ));
                }
            }
        }

        frames += 1;
        if max_frames != 0 && frames >= max_frames {
            break;
        }

        let spent = newtime.elapsed();
        if spent < FRAME_TIME {
            std::thread::sleep(FRAME_TIME - spent);
        }
    }

    com_printf(&format!("{} frames in {:.1}s\n", frames, start.elapsed().as_secs_f32()));
    refresh.cl_shutdown_refresh();
    cl_write_configuration(config, &cvars);
}

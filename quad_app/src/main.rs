//! Rotating quad demo
//!
//! Brings up the software console, draws one rotating colored quad at the
//! display refresh rate, and presents it through the retrace-driven
//! double-buffered loop. Runs headless on a scripted pad: the exit button
//! fires after the configured number of frames, with an optional synthetic
//! load spike partway through for the profiling trace.
//!
//! Usage: `quad_demo [config.toml|config.ron]`

use std::sync::Arc;

use console_gfx::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading configuration from {path}");
            DemoConfig::load_from_file(&path)?
        }
        None => DemoConfig::default(),
    };
    config.validate()?;

    if config.enable_profiling {
        // Zones and frame marks go to stderr; without this the tracing
        // calls in the loop are no-ops.
        tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
            .with_writer(std::io::stderr)
            .init();
    }

    let pad = ScriptedPad::new(config.pad_schedule());
    let mut console = sim_console(config.sim_options(), pad);

    let state = display::initialize(&mut console, &config.display_config());
    let builder = FrameBuilder::new(&mut console);

    let context = Arc::new(PresentContext::new(state.framebuffer));
    console.set_post_retrace_callback(retrace_callback(Arc::clone(&context)));

    let stats = PresentLoop::new(config.rotation_speed_dps).run(
        &mut console,
        &state,
        &builder,
        &context,
    );

    log::info!(
        "presented {} frames at {:.1} fps average, final angle {:.1}°",
        stats.frames,
        stats.average_fps,
        stats.final_angle_deg
    );

    Ok(())
}

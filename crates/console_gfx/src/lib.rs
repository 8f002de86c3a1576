//! # console_gfx
//!
//! Fixed-function console graphics bring-up and a double-buffered,
//! retrace-interrupt-driven presentation loop.
//!
//! The crate models the graphics subsystem of a fixed game console: a
//! one-time display configuration sequence, a frame builder that submits one
//! rotating indexed quad per iteration, and a presentation loop whose
//! visible-buffer copy runs from a post-retrace callback gated by an atomic
//! ready flag. The hardware itself — video interface, rasterizer, input
//! pad — sits behind traits in [`hal`], with a complete software console in
//! [`hal::sim`] for headless runs and tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use console_gfx::prelude::*;
//!
//! let config = DemoConfig::default();
//! config.validate()?;
//!
//! let pad = ScriptedPad::new(config.pad_schedule());
//! let mut console = sim_console(config.sim_options(), pad);
//!
//! let state = display::initialize(&mut console, &config.display_config());
//! let builder = FrameBuilder::new(&mut console);
//! let context = Arc::new(PresentContext::new(state.framebuffer));
//! console.set_post_retrace_callback(retrace_callback(Arc::clone(&context)));
//!
//! let stats = PresentLoop::new(config.rotation_speed_dps)
//!     .run(&mut console, &state, &builder, &context);
//! println!("{} frames at {:.1} fps", stats.frames, stats.average_fps);
//! # Ok::<(), console_gfx::config::ConfigError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::cast_precision_loss)]

pub mod config;
pub mod display;
pub mod foundation;
pub mod frame;
pub mod hal;
pub mod present;

#[cfg(test)]
mod present_loop_tests;

/// Common imports for crate users
pub mod prelude {
    pub use crate::config::{Config, ConfigError, DemoConfig};
    pub use crate::display::{self, DisplayConfig, DisplayState};
    pub use crate::foundation::{
        math::{Mat4, Mat4Ext, RotationDeg, Vec3},
        time::FrameTimer,
    };
    pub use crate::frame::FrameBuilder;
    pub use crate::hal::pad::{Buttons, InputPad, ScriptedPad};
    pub use crate::hal::sim::{sim_console, SimConsole, SimOptions};
    pub use crate::hal::{
        AspectRatio, Color, Console, Rasterizer, RetraceCallback, VideoInterface,
    };
    pub use crate::present::{retrace_callback, LoopStats, PresentContext, PresentLoop};
}

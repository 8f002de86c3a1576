//! One-time display and rasterizer bring-up
//!
//! Runs the blocking setup sequence once at startup: query the preferred
//! output mode, allocate the scan-out framebuffer, push it live and wait one
//! vsync so the hardware latches it, program the display copy state to match
//! the mode, and load a perspective projection for the display aspect ratio.
//!
//! Per the firmware contract none of this can fail, so the sequence returns
//! the resulting [`DisplayState`] directly.

use crate::foundation::math::{deg_to_rad, Mat4, Mat4Ext};
use crate::hal::pad::InputPad;
use crate::hal::{
    AspectRatio, Color, Console, CopyFilter, CullMode, DisplayMode, FieldMode, FrameBufferHandle,
    Gamma, ProjectionKind, Rasterizer, ScissorRect, VideoInterface, Viewport, MAX_DEPTH,
};

/// Enumerated options for the one-time setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayConfig {
    /// Color the display copy clears the render target to
    pub clear_color: Color,
    /// Display copy filter
    pub copy_filter: CopyFilter,
    /// Display copy gamma
    pub gamma: Gamma,
    /// Vertical field of view in degrees
    pub fov_y_deg: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Override the system aspect ratio instead of querying it
    pub forced_aspect: Option<AspectRatio>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            clear_color: Color::BLACK,
            copy_filter: CopyFilter::Sharp,
            gamma: Gamma::Linear,
            fov_y_deg: 60.0,
            near: 10.0,
            far: 300.0,
            forced_aspect: None,
        }
    }
}

/// Everything the frame loop needs from the setup sequence
///
/// Created once; all members live until process exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayState {
    /// The active output mode
    pub mode: DisplayMode,
    /// The scan-out framebuffer; never reallocated
    pub framebuffer: FrameBufferHandle,
    /// Aspect ratio the projection was built for
    pub aspect: AspectRatio,
    /// The loaded projection matrix
    pub projection: Mat4,
}

impl DisplayState {
    /// The full-mode viewport the loop resets every iteration
    pub fn viewport(&self) -> Viewport {
        Viewport {
            x: 0.0,
            y: 0.0,
            width: f32::from(self.mode.width),
            height: f32::from(self.mode.efb_height),
            near: 0.0,
            far: 1.0,
        }
    }
}

/// Perform the one-time display bring-up sequence
pub fn initialize<V, R, P>(console: &mut Console<V, R, P>, config: &DisplayConfig) -> DisplayState
where
    V: VideoInterface,
    R: Rasterizer,
    P: InputPad,
{
    let mode = console.video.preferred_mode();
    log::info!(
        "display mode: {}x{} ({} scan-out rows, {}{} Hz)",
        mode.width,
        mode.efb_height,
        mode.xfb_height,
        if mode.interlaced { "interlaced, " } else { "" },
        mode.refresh_hz
    );

    let framebuffer = console.video.allocate_framebuffer(&mode);

    console.video.configure(&mode);
    console.video.set_next_framebuffer(framebuffer);
    console.video.set_black(false);
    console.video.flush();
    // One full retrace so the hardware has latched the framebuffer
    console.wait_vsync();

    let efb_rect = ScissorRect {
        x: 0,
        y: 0,
        width: mode.width,
        height: mode.efb_height,
    };

    console.gx.set_copy_clear(config.clear_color, MAX_DEPTH);
    console.gx.set_viewport(Viewport {
        x: 0.0,
        y: 0.0,
        width: f32::from(mode.width),
        height: f32::from(mode.efb_height),
        near: 0.0,
        far: 1.0,
    });
    console.gx.set_scissor(efb_rect);
    console
        .gx
        .set_display_copy(efb_rect, mode.width, mode.xfb_height, mode.copy_y_scale());
    console.gx.set_copy_filter(config.copy_filter);
    console.gx.set_field_mode(if mode.interlaced {
        FieldMode::Interlaced
    } else {
        FieldMode::Progressive
    });
    console.gx.set_cull_mode(CullMode::None);
    // Initial clearing copy so the first visible frame is defined
    console.gx.copy_display(framebuffer, true);
    console.gx.set_copy_gamma(config.gamma);

    let aspect = config
        .forced_aspect
        .unwrap_or_else(|| console.video.aspect_ratio());
    let projection = Mat4::perspective(
        deg_to_rad(config.fov_y_deg),
        aspect.ratio(),
        config.near,
        config.far,
    );
    console
        .gx
        .load_projection(&projection, ProjectionKind::Perspective);

    log::debug!("projection loaded for {:?} aspect", aspect);

    DisplayState {
        mode,
        framebuffer,
        aspect,
        projection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::pad::ScriptedPad;
    use crate::hal::sim::{sim_console, SimOptions};

    #[test]
    fn setup_latches_framebuffer_and_programs_copy_state() {
        let mut console = sim_console(SimOptions::default(), ScriptedPad::idle());
        let config = DisplayConfig {
            copy_filter: CopyFilter::Deflicker,
            gamma: Gamma::Medium,
            ..DisplayConfig::default()
        };

        let state = initialize(&mut console, &config);

        assert_eq!(console.video.scanout_framebuffer(), Some(state.framebuffer));
        assert!(!console.video.is_black());
        // The latch wait consumed one retrace
        assert_eq!(console.video.retrace_count(), 1);

        assert_eq!(console.gx.copy_filter(), CopyFilter::Deflicker);
        assert_eq!(console.gx.copy_gamma(), Gamma::Medium);
        assert_eq!(console.gx.scissor().width, state.mode.width);
        // The initial clearing copy ran
        assert_eq!(console.gx.display_copies(), 1);
    }

    #[test]
    fn aspect_follows_system_configuration_unless_forced() {
        let mut console = sim_console(
            SimOptions {
                widescreen: true,
                ..SimOptions::default()
            },
            ScriptedPad::idle(),
        );
        let state = initialize(&mut console, &DisplayConfig::default());
        assert_eq!(state.aspect, AspectRatio::Widescreen);

        let mut console = sim_console(
            SimOptions {
                widescreen: true,
                ..SimOptions::default()
            },
            ScriptedPad::idle(),
        );
        let forced = DisplayConfig {
            forced_aspect: Some(AspectRatio::Standard),
            ..DisplayConfig::default()
        };
        let state = initialize(&mut console, &forced);
        assert_eq!(state.aspect, AspectRatio::Standard);
    }

    #[test]
    fn wide_and_standard_projections_differ_only_horizontally() {
        let mut wide_console = sim_console(
            SimOptions {
                widescreen: true,
                ..SimOptions::default()
            },
            ScriptedPad::idle(),
        );
        let wide = initialize(&mut wide_console, &DisplayConfig::default());

        let mut std_console = sim_console(SimOptions::default(), ScriptedPad::idle());
        let standard = initialize(&mut std_console, &DisplayConfig::default());

        assert!(wide.projection[(0, 0)] < standard.projection[(0, 0)]);
        assert_eq!(wide.projection[(1, 1)], standard.projection[(1, 1)]);
    }
}

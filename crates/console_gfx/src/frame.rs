//! Frame builder: composes the transform for the rotating quad, submits it
//! through the fixed-function pipeline, and hands the finished frame to the
//! presentation callback via the ready flag.

use crate::foundation::math::{deg_to_rad, Mat4, Mat4Ext, Vec3};
use crate::hal::pad::InputPad;
use crate::hal::{Color, Console, Rasterizer, VideoInterface};
use crate::present::PresentContext;

/// Quad corner positions, counter-clockwise from top-left, in model units
pub const QUAD_POSITIONS: [[i16; 3]; 4] = [
    [-15, 15, 0],  // TL
    [15, 15, 0],   // TR
    [15, -15, 0],  // BR
    [-15, -15, 0], // BL
];

/// Per-corner colors: red, green, blue, yellow
pub const QUAD_COLORS: [Color; 4] = [
    Color::rgba(255, 0, 0, 255),
    Color::rgba(0, 255, 0, 255),
    Color::rgba(0, 0, 255, 255),
    Color::rgba(255, 255, 0, 255),
];

/// Fixed depth offset pushing the quad in front of the camera
pub const QUAD_DEPTH_OFFSET: f32 = -50.0;

/// Builds and submits one frame of the rotating quad
///
/// Construction uploads the indexed position and color arrays once; every
/// frame after that only loads a matrix and submits four 8-bit indices.
pub struct FrameBuilder {
    _priv: (),
}

impl FrameBuilder {
    /// Upload the quad's vertex and color arrays to the rasterizer
    pub fn new<V, R, P>(console: &mut Console<V, R, P>) -> Self
    where
        V: VideoInterface,
        R: Rasterizer,
        P: InputPad,
    {
        console.gx.upload_arrays(&QUAD_POSITIONS, &QUAD_COLORS);
        Self { _priv: () }
    }

    /// Build and submit one frame, then hand it to the presenter
    ///
    /// Composes model = rotate-Z(`angle_deg`) then translate by the fixed
    /// depth offset, concatenates the caller's view transform, loads the
    /// result into the position-matrix slot, and submits the quad's four
    /// indexed vertices.
    ///
    /// On return the GPU has finished consuming the draw (blocking draw-done
    /// sync), the ready flag is set, and one vsync period has elapsed — the
    /// flag is therefore visible before the next retrace interrupt can fire,
    /// and the loop is throttled to the display refresh rate.
    pub fn build_and_submit<V, R, P>(
        &self,
        console: &mut Console<V, R, P>,
        present: &PresentContext,
        view: &Mat4,
        angle_deg: f32,
    ) where
        V: VideoInterface,
        R: Rasterizer,
        P: InputPad,
    {
        let _zone = tracing::info_span!("screen_update").entered();

        let model = Mat4::new_translation(&Vec3::new(0.0, 0.0, QUAD_DEPTH_OFFSET))
            * Mat4::rotation_z(deg_to_rad(angle_deg));
        let model_view = view * model;

        console.gx.load_position_matrix(&model_view);

        console.gx.begin_quads(4);
        for i in 0..4 {
            console.gx.index_vertex(i, i);
        }
        console.gx.end();

        console.gx.draw_done();
        present.mark_frame_ready();

        console.wait_vsync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::pad::ScriptedPad;
    use crate::hal::sim::{sim_console, SimOptions};
    use crate::hal::{ProjectionKind, Viewport};

    #[test]
    fn submitted_frame_lands_in_the_render_target() {
        let mut console = sim_console(SimOptions::default(), ScriptedPad::idle());
        let projection = Mat4::perspective(deg_to_rad(60.0), 4.0 / 3.0, 10.0, 300.0);
        console
            .gx
            .load_projection(&projection, ProjectionKind::Perspective);
        console.gx.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: 640.0,
            height: 480.0,
            near: 0.0,
            far: 1.0,
        });
        console.gx.set_cull_mode(crate::hal::CullMode::None);

        let builder = FrameBuilder::new(&mut console);
        let mode = console.video.preferred_mode();
        let fb = console.video.allocate_framebuffer(&mode);
        let present = PresentContext::new(fb);
        let view = Mat4::look_at(
            Vec3::zeros(),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
        );

        builder.build_and_submit(&mut console, &present, &view, 0.0);

        assert!(present.is_frame_ready());
        // The quad is centered on screen at angle 0
        assert_ne!(console.gx.efb_pixel(320, 240), Color::BLACK);
    }

    #[test]
    fn submit_waits_one_vsync() {
        let mut console = sim_console(SimOptions::default(), ScriptedPad::idle());
        let builder = FrameBuilder::new(&mut console);
        let mode = console.video.preferred_mode();
        let fb = console.video.allocate_framebuffer(&mode);
        let present = PresentContext::new(fb);

        let before = console.video.retrace_count();
        builder.build_and_submit(&mut console, &present, &Mat4::identity(), 45.0);
        assert_eq!(console.video.retrace_count(), before + 1);
    }
}

//! Double-buffered presentation: the ready-flag handoff, the post-retrace
//! callback that performs the visible-buffer copy, and the main loop that
//! drives frame production.
//!
//! # Concurrency contract
//!
//! The ready flag crosses the boundary between the main execution context
//! and the interrupt-equivalent retrace context. It is an atomic byte with
//! producer/consumer ordering: the frame builder is the only writer of the
//! false→true transition (release store, after the draw-done sync), and the
//! retrace callback is the only writer of true→false (acquire load before
//! the copy, release store after). No mutex is involved anywhere on this
//! path — a blocking lock must never be taken in retrace context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::display::DisplayState;
use crate::foundation::math::{Mat4, Mat4Ext, RotationDeg, Vec3};
use crate::foundation::time::FrameTimer;
use crate::frame::FrameBuilder;
use crate::hal::pad::{Buttons, InputPad};
use crate::hal::{
    Compare, Console, DepthMode, FrameBufferHandle, Rasterizer, RetraceCallback, VideoInterface,
};

/// Button that terminates the loop
pub const EXIT_BUTTON: Buttons = Buttons::HOME;

/// Button that triggers the synthetic load spike
pub const LOAD_BUTTON: Buttons = Buttons::B;

/// Iterations of the synthetic trigonometric workload
pub const SYNTHETIC_LOAD_ITERATIONS: u32 = 2_000_000;

/// State shared between the main loop and the retrace callback
///
/// Constructed once at startup and alive until process exit. The framebuffer
/// handle is referenced by both sides but owned by neither; only its
/// contents change (via GPU commands), never the handle itself.
pub struct PresentContext {
    ready: AtomicBool,
    framebuffer: FrameBufferHandle,
}

impl PresentContext {
    /// Create the context over the framebuffer the display setup allocated
    pub fn new(framebuffer: FrameBufferHandle) -> Self {
        Self {
            ready: AtomicBool::new(false),
            framebuffer,
        }
    }

    /// The scan-out framebuffer the callback copies into
    pub fn framebuffer(&self) -> FrameBufferHandle {
        self.framebuffer
    }

    /// Signal that a fully submitted frame is safe to present
    ///
    /// Called by the frame builder only, after the draw-done sync.
    pub fn mark_frame_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Whether a submitted frame is pending presentation
    pub fn is_frame_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn clear_frame_ready(&self) {
        self.ready.store(false, Ordering::Release);
    }
}

/// Build the post-retrace callback over a shared present context
///
/// The callback fires once per physical refresh. When a frame is pending it
/// programs depth and color-update state, copies the render target to the
/// visible framebuffer, flushes the pipeline, and clears the flag. With no
/// frame pending it is a pure no-op — a normal steady-state condition, not
/// an error.
pub fn retrace_callback(context: Arc<PresentContext>) -> RetraceCallback {
    Box::new(move |gx: &mut dyn Rasterizer, _retrace: u32| {
        if context.is_frame_ready() {
            gx.set_depth_mode(DepthMode {
                enable: true,
                compare: Compare::LessEqual,
                update: true,
            });
            gx.set_color_update(true);
            gx.copy_display(context.framebuffer(), true);
            gx.flush();
            context.clear_frame_ready();
        }
    })
}

/// Statistics reported when the loop terminates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopStats {
    /// Frames submitted before the exit input fired
    pub frames: u64,
    /// Average frame rate over the whole run
    pub average_fps: f32,
    /// Rotation angle at exit, degrees
    pub final_angle_deg: f32,
}

/// The per-frame loop: timing, rotation, input, and frame production
///
/// Owns the rotation and timing state for the process lifetime. The camera
/// never moves: it sits at the origin looking down −Z with +Y up; only the
/// quad rotates.
pub struct PresentLoop {
    rotation: RotationDeg,
    rotation_speed_dps: f32,
    timer: FrameTimer,
}

impl PresentLoop {
    /// Create a loop rotating at `rotation_speed_dps` degrees per second
    pub fn new(rotation_speed_dps: f32) -> Self {
        Self {
            rotation: RotationDeg::default(),
            rotation_speed_dps,
            timer: FrameTimer::new(),
        }
    }

    /// Current rotation angle in degrees
    pub fn angle_deg(&self) -> f32 {
        self.rotation.degrees()
    }

    /// Run until the exit button is pressed
    ///
    /// Each iteration: sample time, advance the rotation with single-wrap
    /// normalization, rebuild the fixed view transform, reset the viewport,
    /// invalidate the vertex and texture caches (stale cache entries from
    /// the previous frame's indexed submission), submit the frame, poll
    /// input, and mark the frame boundary for the tracing collector.
    pub fn run<V, R, P>(
        &mut self,
        console: &mut Console<V, R, P>,
        display: &DisplayState,
        builder: &FrameBuilder,
        present: &PresentContext,
    ) -> LoopStats
    where
        V: VideoInterface,
        R: Rasterizer,
        P: InputPad,
    {
        log::info!(
            "presentation loop starting, rotation speed {}°/s",
            self.rotation_speed_dps
        );

        loop {
            let zone = tracing::info_span!("frame").entered();

            self.timer.update();
            self.rotation
                .advance(self.rotation_speed_dps, self.timer.delta_time());

            let view = Mat4::look_at(
                Vec3::zeros(),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, -1.0),
            );

            console.gx.set_viewport(display.viewport());
            console.gx.invalidate_vertex_cache();
            console.gx.invalidate_texture_cache();

            builder.build_and_submit(console, present, &view, self.rotation.degrees());

            console.pad.scan();
            let pressed = console.pad.pressed();

            if pressed.contains(EXIT_BUTTON) {
                log::info!("exit button pressed, shutting down");
                break;
            }

            if pressed.contains(LOAD_BUTTON) {
                let _load_zone = tracing::info_span!("synthetic_load").entered();
                synthetic_load(SYNTHETIC_LOAD_ITERATIONS);
            }

            drop(zone);
            frame_mark(self.timer.frame_count());
        }

        LoopStats {
            frames: self.timer.frame_count(),
            average_fps: self.timer.average_fps(),
            final_angle_deg: self.rotation.degrees(),
        }
    }
}

/// Emit the once-per-iteration frame boundary marker
///
/// Pure observability: with no tracing subscriber installed this is a no-op
/// and the loop behaves identically.
pub fn frame_mark(frame: u64) {
    tracing::trace!(target: "frame_mark", frame, "frame boundary");
}

/// Deliberately expensive trigonometric workload
///
/// Exists purely to produce a visible spike in the profiling trace when the
/// load button is pressed. Returns the accumulator so the work cannot be
/// optimized away.
pub fn synthetic_load(iterations: u32) -> f64 {
    let mut x = 0.0f64;
    for i in 0..iterations {
        let t = f64::from(i);
        x += (t * 0.001).sin() * (t * 0.002).cos();
    }
    std::hint::black_box(x)
}

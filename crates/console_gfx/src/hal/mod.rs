//! Hardware collaborator seam
//!
//! The console's video interface, fixed-function rasterizer, and input pad
//! are external, already-solved subsystems as far as this crate is
//! concerned. This module defines the traits the presentation core talks
//! through, the enumerated fixed-function state those traits accept, and the
//! [`Console`] owner that bundles the devices and delivers the post-retrace
//! callback.
//!
//! Per the console firmware contract, none of these operations can fail:
//! a hardware fault is unrecoverable by design, so the trait surface is
//! infallible and there is no error type here.

pub mod pad;
pub mod sim;

use crate::foundation::math::Mat4;
use serde::{Deserialize, Serialize};

/// An RGBA8 color, as the rasterizer and framebuffer store it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

impl Color {
    /// Opaque black
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    /// Construct an opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Construct a color with explicit alpha
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Maximum depth clear value (24-bit Z buffer, normalized on write)
pub const MAX_DEPTH: u32 = 0x00ff_ffff;

/// Display aspect ratio, as reported by the system configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 4:3
    Standard,
    /// 16:9
    Widescreen,
}

impl AspectRatio {
    /// Width over height as a float
    pub fn ratio(self) -> f32 {
        match self {
            AspectRatio::Standard => 4.0 / 3.0,
            AspectRatio::Widescreen => 16.0 / 9.0,
        }
    }
}

/// A display output mode as reported by the video interface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMode {
    /// Framebuffer width in pixels
    pub width: u16,
    /// Embedded framebuffer (render target) height
    pub efb_height: u16,
    /// External framebuffer (scan-out) height
    pub xfb_height: u16,
    /// Whether the mode scans out interlaced fields
    pub interlaced: bool,
    /// Whether the mode renders antialiased
    pub antialias: bool,
    /// Vertical refresh rate
    pub refresh_hz: f32,
}

impl DisplayMode {
    /// Vertical scale factor applied by the display copy
    pub fn copy_y_scale(&self) -> f32 {
        f32::from(self.xfb_height) / f32::from(self.efb_height)
    }
}

/// Opaque handle to a scan-out framebuffer
///
/// Allocated once during display configuration and never reallocated; the
/// presentation callback and the frame builder both reference it, neither
/// owns the underlying storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBufferHandle {
    pub(crate) id: u32,
    pub(crate) width: u16,
    pub(crate) height: u16,
}

impl FrameBufferHandle {
    /// Framebuffer width in pixels
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Framebuffer height in pixels
    pub fn height(&self) -> u16 {
        self.height
    }
}

/// Rendering viewport in framebuffer coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
    /// Near depth bound
    pub near: f32,
    /// Far depth bound
    pub far: f32,
}

/// Scissor rectangle in framebuffer coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge
    pub x: u16,
    /// Top edge
    pub y: u16,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
}

/// Display copy filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyFilter {
    /// No filtering, pixels copied as rendered
    Sharp,
    /// Vertical deflicker filter for interlaced output
    Deflicker,
}

/// Field rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// Full frames every refresh
    Progressive,
    /// Alternating half-height fields
    Interlaced,
}

/// Display copy gamma correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gamma {
    /// 1.0 (linear)
    Linear,
    /// 1.7
    Medium,
    /// 2.2
    Dark,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// No culling; both windings rasterized
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    /// Never pass
    Never,
    /// Pass when incoming depth is less
    Less,
    /// Pass when incoming depth is less or equal
    LessEqual,
    /// Always pass
    Always,
}

/// Depth test state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthMode {
    /// Whether the depth test runs at all
    pub enable: bool,
    /// Comparison against the stored depth
    pub compare: Compare,
    /// Whether passing fragments write their depth back
    pub update: bool,
}

/// Kind of projection loaded into the projection matrix slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Perspective divide enabled
    Perspective,
    /// Orthographic
    Orthographic,
}

/// The display driver side of the console
///
/// One-time configuration plus the blocking vsync wait the presentation loop
/// is throttled by. All operations are infallible hardware writes.
pub trait VideoInterface {
    /// The display's preferred output mode
    fn preferred_mode(&self) -> DisplayMode;

    /// The aspect ratio from the system configuration
    fn aspect_ratio(&self) -> AspectRatio;

    /// Allocate a scan-out framebuffer sized for `mode`
    fn allocate_framebuffer(&mut self, mode: &DisplayMode) -> FrameBufferHandle;

    /// Apply an output mode to the video hardware
    fn configure(&mut self, mode: &DisplayMode);

    /// Latch the framebuffer to scan out from the next retrace onward
    fn set_next_framebuffer(&mut self, fb: FrameBufferHandle);

    /// Gate the output black (true) or show the framebuffer (false)
    fn set_black(&mut self, black: bool);

    /// Flush pending video register writes to the hardware
    fn flush(&mut self);

    /// Block until the next vertical retrace boundary
    fn wait_vsync(&mut self);

    /// Number of retraces seen since power-on
    fn retrace_count(&self) -> u32;
}

/// The fixed-function rasterizer command interface
///
/// Mirrors the command set the demo issues: one-time copy/clear state,
/// matrix loads, indexed quad submission, and the display copy the
/// presentation callback performs from interrupt context.
pub trait Rasterizer {
    /// Set the color and depth the display copy clears the render target to
    fn set_copy_clear(&mut self, color: Color, depth: u32);

    /// Set the rendering viewport
    fn set_viewport(&mut self, viewport: Viewport);

    /// Set the scissor rectangle
    fn set_scissor(&mut self, rect: ScissorRect);

    /// Configure the display copy source rectangle, destination size, and
    /// vertical scale
    fn set_display_copy(&mut self, src: ScissorRect, dst_width: u16, dst_height: u16, y_scale: f32);

    /// Select the display copy filter
    fn set_copy_filter(&mut self, filter: CopyFilter);

    /// Select the field rendering mode
    fn set_field_mode(&mut self, mode: FieldMode);

    /// Select the display copy gamma
    fn set_copy_gamma(&mut self, gamma: Gamma);

    /// Select the face culling mode
    fn set_cull_mode(&mut self, mode: CullMode);

    /// Load the projection matrix slot
    fn load_projection(&mut self, matrix: &Mat4, kind: ProjectionKind);

    /// Upload the indexed position and color arrays vertices refer to
    fn upload_arrays(&mut self, positions: &[[i16; 3]], colors: &[Color]);

    /// Load the active position-matrix slot
    fn load_position_matrix(&mut self, matrix: &Mat4);

    /// Open a quad primitive expecting `vertex_count` indexed vertices
    fn begin_quads(&mut self, vertex_count: u8);

    /// Submit one vertex as 8-bit indices into the uploaded arrays
    fn index_vertex(&mut self, position: u8, color: u8);

    /// Close the open primitive and rasterize it
    fn end(&mut self);

    /// Invalidate the post-transform vertex cache
    fn invalidate_vertex_cache(&mut self);

    /// Invalidate the texture cache
    fn invalidate_texture_cache(&mut self);

    /// Block until the GPU reports all submitted draws consumed
    fn draw_done(&mut self);

    /// Set the depth test state
    fn set_depth_mode(&mut self, mode: DepthMode);

    /// Enable or disable color writes during the display copy
    fn set_color_update(&mut self, enable: bool);

    /// Copy the render target to `fb`, optionally clearing the render target
    /// afterwards with the copy-clear color and depth
    fn copy_display(&mut self, fb: FrameBufferHandle, clear: bool);

    /// Flush the command pipeline
    fn flush(&mut self);
}

/// Callback invoked once per post-retrace event
///
/// Runs in interrupt-equivalent context, asynchronously with respect to the
/// main loop, with command access to the rasterizer so it can issue the
/// display copy. Must not block.
pub type RetraceCallback = Box<dyn FnMut(&mut dyn Rasterizer, u32) + Send>;

/// Owner of the console's devices
///
/// Bundles the video interface, rasterizer, and pad, and holds the single
/// registered post-retrace callback. The main context only ever crosses a
/// retrace boundary inside [`Console::wait_vsync`], which is where the
/// callback is delivered with rasterizer access.
pub struct Console<V: VideoInterface, R: Rasterizer, P: pad::InputPad> {
    /// Video interface
    pub video: V,
    /// Fixed-function rasterizer
    pub gx: R,
    /// Input pad
    pub pad: P,
    retrace_callback: Option<RetraceCallback>,
}

impl<V: VideoInterface, R: Rasterizer, P: pad::InputPad> Console<V, R, P> {
    /// Bundle already-initialized devices into a console
    pub fn new(video: V, gx: R, pad: P) -> Self {
        Self {
            video,
            gx,
            pad,
            retrace_callback: None,
        }
    }

    /// Register the post-retrace callback, replacing any previous one
    pub fn set_post_retrace_callback(&mut self, callback: RetraceCallback) {
        self.retrace_callback = Some(callback);
    }

    /// Block until the next retrace, then deliver the post-retrace callback
    pub fn wait_vsync(&mut self) {
        self.video.wait_vsync();
        if let Some(callback) = self.retrace_callback.as_mut() {
            callback(&mut self.gx, self.video.retrace_count());
        }
    }
}

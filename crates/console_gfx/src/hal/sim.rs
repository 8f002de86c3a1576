//! Software console implementation of the hardware seam
//!
//! A register-faithful-enough model of the video interface and fixed-function
//! rasterizer, good for running the demo headless and for exercising the
//! presentation core in tests. The embedded framebuffer (EFB) holds color and
//! depth planes; the display copy resolves it into a per-handle external
//! framebuffer (XFB) the video interface scans out, clearing the EFB behind
//! it when asked, exactly as the hardware copy does.

use std::collections::HashMap;
use std::time::Duration;

use crate::foundation::math::{Mat4, Vec4};

use super::pad::ScriptedPad;
use super::{
    AspectRatio, Color, Compare, Console, CopyFilter, CullMode, DepthMode, DisplayMode, FieldMode,
    FrameBufferHandle, Gamma, ProjectionKind, Rasterizer, ScissorRect, VideoInterface, Viewport,
};

/// Largest render target the embedded framebuffer supports
pub const EFB_WIDTH: usize = 640;
/// Largest render target height the embedded framebuffer supports
pub const EFB_HEIGHT: usize = 528;

/// Options for the simulated console
#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    /// Vertical refresh rate reported in the preferred mode
    pub refresh_hz: f32,
    /// When true, `wait_vsync` sleeps one refresh period; tests leave it off
    pub pace_to_refresh: bool,
    /// Report a 16:9 system configuration instead of 4:3
    pub widescreen: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            refresh_hz: 60.0,
            pace_to_refresh: false,
            widescreen: false,
        }
    }
}

/// A console built entirely from the software devices
pub type SimConsole = Console<SoftwareVideo, SoftwareRasterizer, ScriptedPad>;

/// Bundle the software devices into a console
pub fn sim_console(options: SimOptions, pad: ScriptedPad) -> SimConsole {
    Console::new(SoftwareVideo::new(options), SoftwareRasterizer::new(), pad)
}

/// Software video interface: mode bookkeeping and retrace counting
pub struct SoftwareVideo {
    options: SimOptions,
    configured: Option<DisplayMode>,
    next_framebuffer: Option<FrameBufferHandle>,
    black: bool,
    retraces: u32,
    next_fb_id: u32,
}

impl SoftwareVideo {
    /// Create a video interface with the given options
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            configured: None,
            next_framebuffer: None,
            black: true,
            retraces: 0,
            next_fb_id: 1,
        }
    }

    /// The mode previously applied with `configure`, if any
    pub fn configured_mode(&self) -> Option<DisplayMode> {
        self.configured
    }

    /// The framebuffer currently latched for scan-out, if any
    pub fn scanout_framebuffer(&self) -> Option<FrameBufferHandle> {
        self.next_framebuffer
    }

    /// Whether the output is gated black
    pub fn is_black(&self) -> bool {
        self.black
    }
}

impl VideoInterface for SoftwareVideo {
    fn preferred_mode(&self) -> DisplayMode {
        DisplayMode {
            width: 640,
            efb_height: 480,
            xfb_height: 480,
            interlaced: false,
            antialias: false,
            refresh_hz: self.options.refresh_hz,
        }
    }

    fn aspect_ratio(&self) -> AspectRatio {
        if self.options.widescreen {
            AspectRatio::Widescreen
        } else {
            AspectRatio::Standard
        }
    }

    fn allocate_framebuffer(&mut self, mode: &DisplayMode) -> FrameBufferHandle {
        let handle = FrameBufferHandle {
            id: self.next_fb_id,
            width: mode.width,
            height: mode.xfb_height,
        };
        self.next_fb_id += 1;
        log::debug!(
            "allocated framebuffer {}: {}x{}",
            handle.id,
            handle.width,
            handle.height
        );
        handle
    }

    fn configure(&mut self, mode: &DisplayMode) {
        self.configured = Some(*mode);
    }

    fn set_next_framebuffer(&mut self, fb: FrameBufferHandle) {
        self.next_framebuffer = Some(fb);
    }

    fn set_black(&mut self, black: bool) {
        self.black = black;
    }

    fn flush(&mut self) {
        // Register writes apply immediately in the software model.
    }

    fn wait_vsync(&mut self) {
        if self.options.pace_to_refresh && self.options.refresh_hz > 0.0 {
            std::thread::sleep(Duration::from_secs_f32(1.0 / self.options.refresh_hz));
        }
        self.retraces += 1;
    }

    fn retrace_count(&self) -> u32 {
        self.retraces
    }
}

struct OpenPrimitive {
    expected: u8,
    // (position index, color index) per vertex
    vertices: Vec<(u8, u8)>,
}

#[derive(Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    depth: f32,
    color: Color,
}

/// Software fixed-function rasterizer
///
/// Holds the enumerated pipeline state the trait configures, rasterizes
/// indexed quads into the EFB with Gouraud-interpolated color and a depth
/// test, and resolves the EFB to XFB storage on `copy_display`.
pub struct SoftwareRasterizer {
    copy_clear_color: Color,
    copy_clear_depth: u32,
    viewport: Viewport,
    scissor: ScissorRect,
    copy_src: ScissorRect,
    copy_dst: (u16, u16),
    copy_y_scale: f32,
    copy_filter: CopyFilter,
    field_mode: FieldMode,
    gamma: Gamma,
    cull_mode: CullMode,
    depth_mode: DepthMode,
    color_update: bool,
    projection: Mat4,
    projection_kind: ProjectionKind,
    position_matrix: Mat4,
    positions: Vec<[i16; 3]>,
    colors: Vec<Color>,
    open: Option<OpenPrimitive>,
    efb_color: Vec<Color>,
    efb_depth: Vec<f32>,
    xfb: HashMap<u32, Vec<Color>>,
    display_copies: u64,
    flushes: u64,
}

impl Default for SoftwareRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareRasterizer {
    /// Create a rasterizer with hardware power-on defaults
    pub fn new() -> Self {
        Self {
            copy_clear_color: Color::BLACK,
            copy_clear_depth: super::MAX_DEPTH,
            viewport: Viewport {
                x: 0.0,
                y: 0.0,
                width: EFB_WIDTH as f32,
                height: EFB_HEIGHT as f32,
                near: 0.0,
                far: 1.0,
            },
            scissor: ScissorRect {
                x: 0,
                y: 0,
                width: EFB_WIDTH as u16,
                height: EFB_HEIGHT as u16,
            },
            copy_src: ScissorRect {
                x: 0,
                y: 0,
                width: EFB_WIDTH as u16,
                height: EFB_HEIGHT as u16,
            },
            copy_dst: (EFB_WIDTH as u16, EFB_HEIGHT as u16),
            copy_y_scale: 1.0,
            copy_filter: CopyFilter::Sharp,
            field_mode: FieldMode::Progressive,
            gamma: Gamma::Linear,
            cull_mode: CullMode::Back,
            depth_mode: DepthMode {
                enable: true,
                compare: Compare::LessEqual,
                update: true,
            },
            color_update: true,
            projection: Mat4::identity(),
            projection_kind: ProjectionKind::Orthographic,
            position_matrix: Mat4::identity(),
            positions: Vec::new(),
            colors: Vec::new(),
            open: None,
            efb_color: vec![Color::BLACK; EFB_WIDTH * EFB_HEIGHT],
            efb_depth: vec![1.0; EFB_WIDTH * EFB_HEIGHT],
            xfb: HashMap::new(),
            display_copies: 0,
            flushes: 0,
        }
    }

    /// Pixels last copied to `fb`, row major, if any copy targeted it yet
    pub fn xfb_pixels(&self, fb: FrameBufferHandle) -> Option<&[Color]> {
        self.xfb.get(&fb.id).map(Vec::as_slice)
    }

    /// Read one EFB pixel
    pub fn efb_pixel(&self, x: usize, y: usize) -> Color {
        self.efb_color[y * EFB_WIDTH + x]
    }

    /// Number of display copies issued so far
    pub fn display_copies(&self) -> u64 {
        self.display_copies
    }

    /// Number of pipeline flushes issued so far
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// The configured display copy filter
    pub fn copy_filter(&self) -> CopyFilter {
        self.copy_filter
    }

    /// The configured field mode
    pub fn field_mode(&self) -> FieldMode {
        self.field_mode
    }

    /// The configured display copy gamma
    pub fn copy_gamma(&self) -> Gamma {
        self.gamma
    }

    /// The configured scissor rectangle
    pub fn scissor(&self) -> ScissorRect {
        self.scissor
    }

    fn transform(&self, index: (u8, u8)) -> Option<ScreenVertex> {
        let position = *self.positions.get(usize::from(index.0))?;
        let color = *self.colors.get(usize::from(index.1))?;

        let total = self.projection * self.position_matrix;
        let clip = total
            * Vec4::new(
                f32::from(position[0]),
                f32::from(position[1]),
                f32::from(position[2]),
                1.0,
            );

        let w = match self.projection_kind {
            ProjectionKind::Perspective => clip.w,
            ProjectionKind::Orthographic => 1.0,
        };
        if w <= 0.0 {
            return None;
        }

        let ndc_x = clip.x / w;
        let ndc_y = clip.y / w;
        let ndc_z = clip.z / w;

        Some(ScreenVertex {
            x: self.viewport.x + (ndc_x + 1.0) * 0.5 * self.viewport.width,
            // NDC +Y is up, framebuffer rows grow downward
            y: self.viewport.y + (1.0 - (ndc_y + 1.0) * 0.5) * self.viewport.height,
            depth: self.viewport.near + ndc_z * (self.viewport.far - self.viewport.near),
            color,
        })
    }

    fn fill_triangle(&mut self, v0: ScreenVertex, v1: ScreenVertex, v2: ScreenVertex) {
        let area = edge(v0, v1, v2.x, v2.y);
        if area == 0.0 {
            return;
        }
        match self.cull_mode {
            CullMode::None => {}
            CullMode::Back if area < 0.0 => return,
            CullMode::Front if area > 0.0 => return,
            _ => {}
        }

        let min_x = v0.x.min(v1.x).min(v2.x).floor().max(f32::from(self.scissor.x)) as usize;
        let min_y = v0.y.min(v1.y).min(v2.y).floor().max(f32::from(self.scissor.y)) as usize;
        let max_x = (v0.x.max(v1.x).max(v2.x).ceil() as usize)
            .min(usize::from(self.scissor.x + self.scissor.width))
            .min(EFB_WIDTH);
        let max_y = (v0.y.max(v1.y).max(v2.y).ceil() as usize)
            .min(usize::from(self.scissor.y + self.scissor.height))
            .min(EFB_HEIGHT);

        for py in min_y..max_y {
            for px in min_x..max_x {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;

                let w0 = edge(v1, v2, cx, cy) / area;
                let w1 = edge(v2, v0, cx, cy) / area;
                let w2 = edge(v0, v1, cx, cy) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.depth + w1 * v1.depth + w2 * v2.depth;
                let index = py * EFB_WIDTH + px;

                if self.depth_mode.enable {
                    let stored = self.efb_depth[index];
                    let pass = match self.depth_mode.compare {
                        Compare::Never => false,
                        Compare::Less => depth < stored,
                        Compare::LessEqual => depth <= stored,
                        Compare::Always => true,
                    };
                    if !pass {
                        continue;
                    }
                    if self.depth_mode.update {
                        self.efb_depth[index] = depth;
                    }
                }

                self.efb_color[index] = Color {
                    r: blend(w0, w1, w2, v0.color.r, v1.color.r, v2.color.r),
                    g: blend(w0, w1, w2, v0.color.g, v1.color.g, v2.color.g),
                    b: blend(w0, w1, w2, v0.color.b, v1.color.b, v2.color.b),
                    a: blend(w0, w1, w2, v0.color.a, v1.color.a, v2.color.a),
                };
            }
        }
    }

    fn rasterize_quads(&mut self, primitive: OpenPrimitive) {
        if primitive.vertices.len() != usize::from(primitive.expected) {
            log::warn!(
                "primitive closed with {} of {} vertices",
                primitive.vertices.len(),
                primitive.expected
            );
        }

        for quad in primitive.vertices.chunks_exact(4) {
            let transformed: Vec<Option<ScreenVertex>> =
                quad.iter().map(|&idx| self.transform(idx)).collect();
            let [a, b, c, d] = [transformed[0], transformed[1], transformed[2], transformed[3]];
            if let (Some(a), Some(b), Some(c), Some(d)) = (a, b, c, d) {
                self.fill_triangle(a, b, c);
                self.fill_triangle(a, c, d);
            }
        }
    }

    fn clear_efb(&mut self) {
        let depth = self.copy_clear_depth as f32 / super::MAX_DEPTH as f32;
        self.efb_color.fill(self.copy_clear_color);
        self.efb_depth.fill(depth);
    }
}

fn edge(a: ScreenVertex, b: ScreenVertex, x: f32, y: f32) -> f32 {
    (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x)
}

#[allow(clippy::many_single_char_names)]
fn blend(w0: f32, w1: f32, w2: f32, c0: u8, c1: u8, c2: u8) -> u8 {
    (w0 * f32::from(c0) + w1 * f32::from(c1) + w2 * f32::from(c2))
        .round()
        .clamp(0.0, 255.0) as u8
}

impl Rasterizer for SoftwareRasterizer {
    fn set_copy_clear(&mut self, color: Color, depth: u32) {
        self.copy_clear_color = color;
        self.copy_clear_depth = depth.min(super::MAX_DEPTH);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn set_scissor(&mut self, rect: ScissorRect) {
        self.scissor = rect;
    }

    fn set_display_copy(&mut self, src: ScissorRect, dst_width: u16, dst_height: u16, y_scale: f32) {
        self.copy_src = src;
        self.copy_dst = (dst_width, dst_height);
        self.copy_y_scale = y_scale;
    }

    fn set_copy_filter(&mut self, filter: CopyFilter) {
        self.copy_filter = filter;
    }

    fn set_field_mode(&mut self, mode: FieldMode) {
        self.field_mode = mode;
    }

    fn set_copy_gamma(&mut self, gamma: Gamma) {
        self.gamma = gamma;
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull_mode = mode;
    }

    fn load_projection(&mut self, matrix: &Mat4, kind: ProjectionKind) {
        self.projection = *matrix;
        self.projection_kind = kind;
    }

    fn upload_arrays(&mut self, positions: &[[i16; 3]], colors: &[Color]) {
        self.positions = positions.to_vec();
        self.colors = colors.to_vec();
    }

    fn load_position_matrix(&mut self, matrix: &Mat4) {
        self.position_matrix = *matrix;
    }

    fn begin_quads(&mut self, vertex_count: u8) {
        debug_assert!(self.open.is_none(), "begin_quads with a primitive open");
        self.open = Some(OpenPrimitive {
            expected: vertex_count,
            vertices: Vec::with_capacity(usize::from(vertex_count)),
        });
    }

    fn index_vertex(&mut self, position: u8, color: u8) {
        if let Some(open) = self.open.as_mut() {
            open.vertices.push((position, color));
        } else {
            log::warn!("index_vertex with no primitive open");
        }
    }

    fn end(&mut self) {
        if let Some(primitive) = self.open.take() {
            self.rasterize_quads(primitive);
        } else {
            log::warn!("end with no primitive open");
        }
    }

    fn invalidate_vertex_cache(&mut self) {
        // The software model has no post-transform cache to invalidate.
    }

    fn invalidate_texture_cache(&mut self) {
        // No texture cache either; accepted for pipeline fidelity.
    }

    fn draw_done(&mut self) {
        // Draws complete synchronously in the software model, so the sync
        // returns immediately. A primitive left open here is a caller bug.
        debug_assert!(self.open.is_none(), "draw_done with a primitive open");
    }

    fn set_depth_mode(&mut self, mode: DepthMode) {
        self.depth_mode = mode;
    }

    fn set_color_update(&mut self, enable: bool) {
        self.color_update = enable;
    }

    fn copy_display(&mut self, fb: FrameBufferHandle, clear: bool) {
        let width = usize::from(fb.width);
        let height = usize::from(fb.height);

        if self.color_update {
            let mut out = vec![Color::BLACK; width * height];
            for dy in 0..height {
                // Map the destination row back through the vertical copy scale
                let sy = if self.copy_y_scale > 0.0 {
                    (dy as f32 / self.copy_y_scale) as usize
                } else {
                    dy
                };
                let sy = (usize::from(self.copy_src.y) + sy).min(EFB_HEIGHT - 1);
                for dx in 0..width.min(usize::from(self.copy_src.width)) {
                    let sx = usize::from(self.copy_src.x) + dx;
                    out[dy * width + dx] = self.efb_color[sy * EFB_WIDTH + sx];
                }
            }
            self.xfb.insert(fb.id, out);
        }

        if clear {
            self.clear_efb();
        }
        self.display_copies += 1;
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;

    fn draw_full_screen_quad(gx: &mut SoftwareRasterizer, color: Color) {
        // Identity projection, orthographic: vertices straddle NDC space
        gx.load_projection(&Mat4::identity(), ProjectionKind::Orthographic);
        gx.load_position_matrix(&Mat4::identity());
        gx.upload_arrays(
            &[[-1, 1, 0], [1, 1, 0], [1, -1, 0], [-1, -1, 0]],
            &[color; 4],
        );
        gx.set_cull_mode(CullMode::None);
        gx.begin_quads(4);
        for i in 0..4 {
            gx.index_vertex(i, i);
        }
        gx.end();
        gx.draw_done();
    }

    #[test]
    fn quad_rasterizes_into_efb() {
        let mut gx = SoftwareRasterizer::new();
        let red = Color::rgb(255, 0, 0);
        draw_full_screen_quad(&mut gx, red);

        assert_eq!(gx.efb_pixel(EFB_WIDTH / 2, EFB_HEIGHT / 2), red);
    }

    #[test]
    fn gouraud_interpolation_blends_corner_colors() {
        let mut gx = SoftwareRasterizer::new();
        gx.load_projection(&Mat4::identity(), ProjectionKind::Orthographic);
        gx.load_position_matrix(&Mat4::identity());
        gx.set_cull_mode(CullMode::None);
        gx.upload_arrays(
            &[[-1, 1, 0], [1, 1, 0], [1, -1, 0], [-1, -1, 0]],
            &[
                Color::rgb(255, 0, 0),
                Color::rgb(0, 255, 0),
                Color::rgb(0, 0, 255),
                Color::rgb(255, 255, 0),
            ],
        );
        gx.begin_quads(4);
        for i in 0..4 {
            gx.index_vertex(i, i);
        }
        gx.end();

        // Near the top-left the red corner dominates
        let near_tl = gx.efb_pixel(8, 8);
        assert!(near_tl.r > near_tl.g && near_tl.r > near_tl.b);
    }

    #[test]
    fn copy_display_resolves_and_clears() {
        let mut video = SoftwareVideo::new(SimOptions::default());
        let mode = video.preferred_mode();
        let fb = video.allocate_framebuffer(&mode);

        let mut gx = SoftwareRasterizer::new();
        let clear = Color::rgb(10, 20, 30);
        gx.set_copy_clear(clear, crate::hal::MAX_DEPTH);
        gx.set_display_copy(
            ScissorRect { x: 0, y: 0, width: mode.width, height: mode.efb_height },
            mode.width,
            mode.xfb_height,
            mode.copy_y_scale(),
        );

        let red = Color::rgb(255, 0, 0);
        draw_full_screen_quad(&mut gx, red);
        gx.copy_display(fb, true);

        let xfb = gx.xfb_pixels(fb).expect("copy populated the xfb");
        let center = xfb[usize::from(mode.xfb_height / 2) * usize::from(mode.width)
            + usize::from(mode.width / 2)];
        assert_eq!(center, red);

        // The post-copy clear reset the render target
        assert_eq!(gx.efb_pixel(EFB_WIDTH / 2, EFB_HEIGHT / 2), clear);
        assert_eq!(gx.display_copies(), 1);
    }

    #[test]
    fn color_update_disabled_suppresses_the_copy() {
        let mut video = SoftwareVideo::new(SimOptions::default());
        let mode = video.preferred_mode();
        let fb = video.allocate_framebuffer(&mode);

        let mut gx = SoftwareRasterizer::new();
        draw_full_screen_quad(&mut gx, Color::rgb(255, 0, 0));
        gx.set_color_update(false);
        gx.copy_display(fb, false);

        assert!(gx.xfb_pixels(fb).is_none());
    }

    #[test]
    fn depth_test_rejects_farther_fragments() {
        let mut gx = SoftwareRasterizer::new();
        gx.load_projection(&Mat4::identity(), ProjectionKind::Orthographic);
        gx.set_cull_mode(CullMode::None);

        // Near quad first (z mapped toward 0), then a farther one behind it
        gx.load_position_matrix(&Mat4::identity());
        draw_full_screen_quad(&mut gx, Color::rgb(0, 255, 0));

        let far_offset = Mat4::new_translation(&crate::foundation::math::Vec3::new(0.0, 0.0, 0.5));
        gx.load_position_matrix(&far_offset);
        gx.upload_arrays(
            &[[-1, 1, 0], [1, 1, 0], [1, -1, 0], [-1, -1, 0]],
            &[Color::rgb(255, 0, 0); 4],
        );
        gx.begin_quads(4);
        for i in 0..4 {
            gx.index_vertex(i, i);
        }
        gx.end();

        assert_eq!(
            gx.efb_pixel(EFB_WIDTH / 2, EFB_HEIGHT / 2),
            Color::rgb(0, 255, 0)
        );
    }

    #[test]
    fn vsync_advances_retrace_count() {
        let mut video = SoftwareVideo::new(SimOptions::default());
        assert_eq!(video.retrace_count(), 0);
        video.wait_vsync();
        video.wait_vsync();
        assert_eq!(video.retrace_count(), 2);
    }

    #[test]
    fn perspective_projection_places_quad_on_screen() {
        let mut gx = SoftwareRasterizer::new();
        let projection =
            Mat4::perspective(crate::foundation::math::deg_to_rad(60.0), 4.0 / 3.0, 10.0, 300.0);
        gx.load_projection(&projection, ProjectionKind::Perspective);
        gx.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: 640.0,
            height: 480.0,
            near: 0.0,
            far: 1.0,
        });
        gx.set_cull_mode(CullMode::None);
        gx.load_position_matrix(&Mat4::new_translation(&crate::foundation::math::Vec3::new(
            0.0, 0.0, -50.0,
        )));
        gx.upload_arrays(
            &[[-15, 15, 0], [15, 15, 0], [15, -15, 0], [-15, -15, 0]],
            &[Color::rgb(255, 255, 255); 4],
        );
        gx.begin_quads(4);
        for i in 0..4 {
            gx.index_vertex(i, i);
        }
        gx.end();

        assert_eq!(gx.efb_pixel(320, 240), Color::rgb(255, 255, 255));
        // Well outside the projected quad stays untouched
        assert_eq!(gx.efb_pixel(10, 10), Color::BLACK);
    }
}

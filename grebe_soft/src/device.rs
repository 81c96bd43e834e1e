// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The software rendering device.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use grebe_gfx::geom::pts_to_px_f;
use grebe_gfx::{
    BlendMode, Color, Coord, DeviceCore, FrameScope, GfxDevice, MemStack, Rect, Size, Surface,
};

use crate::line;
use crate::stretch::{self, Axis};
use crate::surface::SoftSurface;

/// Combine `src` with `dst` under `mode`. `weight` scales the source
/// contribution and carries anti-aliasing coverage.
pub(crate) fn blend_pixel(mode: BlendMode, dst: Color, src: Color, weight: u8) -> Color {
    match mode {
        BlendMode::Opaque => {
            if weight == 255 {
                src
            } else {
                dst.blend_over(src.with_alpha(255), weight)
            }
        }
        BlendMode::Blend => dst.blend_over(src, weight),
        BlendMode::Add => {
            let a = src.a as u32 * weight as u32 / 255;
            let add = |d: u8, s: u8| (d as u32 + s as u32 * a / 255).min(255) as u8;
            Color {
                r: add(dst.r, src.r),
                g: add(dst.g, src.g),
                b: add(dst.b, src.b),
                a: (dst.a as u32 + a).min(255) as u8,
            }
        }
        BlendMode::Multiply => {
            let mul = |d: u8, s: u8| {
                let product = (d as u32 * s as u32 / 255) as u8;
                // Weight fades the effect back toward the destination.
                ((product as u32 * weight as u32 + d as u32 * (255 - weight) as u32) / 255) as u8
            };
            Color {
                r: mul(dst.r, src.r),
                g: mul(dst.g, src.g),
                b: mul(dst.b, src.b),
                a: dst.a,
            }
        }
        BlendMode::Invert => {
            let a = src.a as u32 * weight as u32 / 255;
            let inv = |d: u8| (((255 - d as u32) * a + d as u32 * (255 - a)) / 255) as u8;
            Color {
                r: inv(dst.r),
                g: inv(dst.g),
                b: inv(dst.b),
                a: dst.a,
            }
        }
    }
}

/// A [`GfxDevice`] rendering into [`SoftSurface`] canvases on the CPU.
pub struct SoftGfxDevice {
    core: DeviceCore,
    canvas: Weak<SoftSurface>,
    /// Keeps an internally allocated backbuffer alive; external canvases
    /// are only held weakly.
    backbuffer: Option<Rc<SoftSurface>>,
    mem_stack: MemStack,
}

impl Default for SoftGfxDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftGfxDevice {
    pub fn new() -> Self {
        Self {
            core: DeviceCore::new(),
            canvas: Weak::new(),
            backbuffer: None,
            mem_stack: MemStack::default(),
        }
    }

    /// The currently bound canvas, if it is still alive.
    pub fn canvas(&self) -> Option<Rc<SoftSurface>> {
        let canvas = self.canvas.upgrade();
        if canvas.is_none() {
            log::warn!("drawing attempted without a bound canvas");
        }
        canvas
    }

    fn downcast_src(src: &Rc<dyn Surface>) -> Option<Rc<SoftSurface>> {
        match Rc::clone(src).as_any_rc().downcast::<SoftSurface>() {
            Ok(surface) => Some(surface),
            Err(_) => {
                log::error!("surface from a foreign backend passed to the software device");
                None
            }
        }
    }

    /// Blend an accumulated coverage map onto the canvas.
    fn blend_coverage(&self, coverage: &HashMap<(i32, i32), f32>, color: Color) {
        let Some(canvas) = self.canvas() else { return };
        let color = color.tint(self.core.tint);
        let mode = self.core.blend_mode;
        let mut pixels = canvas.lock_mut();
        for (&(x, y), &cov) in coverage {
            let weight = (cov * 255.0 + 0.5) as u8;
            if weight > 0 {
                let under = pixels.pixel(x, y);
                pixels.set_pixel(x, y, blend_pixel(mode, under, color, weight));
            }
        }
    }
}

impl GfxDevice for SoftGfxDevice {
    fn canvas_size(&self) -> Size {
        self.core.canvas_size()
    }

    fn set_canvas_size(&mut self, size: Size) -> bool {
        // An existing backbuffer of the right size is reused; a size
        // change reallocates it.
        if let Some(buffer) = &self.backbuffer {
            if buffer.pixel_size() == size {
                self.canvas = Rc::downgrade(buffer);
                self.core.bind(size);
                return true;
            }
        }
        match SoftSurface::new(size, grebe_gfx::PixelType::Bgra8) {
            Ok(surface) => {
                self.canvas = Rc::downgrade(&surface);
                self.backbuffer = Some(surface);
                self.core.bind(size);
                true
            }
            Err(err) => {
                log::warn!("set_canvas_size({}x{}) failed: {err}", size.w, size.h);
                false
            }
        }
    }

    fn set_canvas(&mut self, surface: Rc<dyn Surface>) -> bool {
        let Some(surface) = Self::downcast_src(&surface) else {
            return false;
        };
        self.core.bind(surface.pixel_size());
        // External canvases are held weakly; the owner keeps them alive.
        self.canvas = Rc::downgrade(&surface);
        self.backbuffer = None;
        true
    }

    fn begin_render(&mut self) -> bool {
        if !self.core.is_bound() {
            return false;
        }
        self.core.rendering = true;
        true
    }

    fn end_render(&mut self) -> bool {
        self.core.rendering = false;
        self.mem_stack.clear();
        true
    }

    fn set_tint_color(&mut self, color: Color) {
        self.core.tint = color;
    }

    fn tint_color(&self) -> Color {
        self.core.tint
    }

    fn set_blend_mode(&mut self, mode: BlendMode) -> bool {
        self.core.blend_mode = mode;
        true
    }

    fn blend_mode(&self) -> BlendMode {
        self.core.blend_mode
    }

    fn set_scale_factor(&mut self, scale: i32) {
        self.core.scale = scale;
    }

    fn scale_factor(&self) -> i32 {
        self.core.scale
    }

    fn set_viewport_offset(&mut self, offset: Coord) {
        self.core.set_viewport_offset(offset);
    }

    fn viewport_offset(&self) -> Coord {
        self.core.viewport_offset()
    }

    fn push_clip(&mut self, rect: Rect) {
        self.core.push_clip(rect);
    }

    fn pop_clip(&mut self) {
        self.core.pop_clip();
    }

    fn clip(&self) -> Rect {
        self.core.clip()
    }

    fn fill(&mut self, rect: Rect, color: Color) {
        let Some(canvas) = self.canvas() else { return };
        let rect = self.core.rect_to_canvas(rect).intersection(self.core.clip());
        if rect.is_empty() {
            return;
        }

        let color = color.tint(self.core.tint);
        let mode = self.core.blend_mode;
        if color.a == 0 && matches!(mode, BlendMode::Blend | BlendMode::Add) {
            return;
        }

        // A fully opaque source-over fill is a plain overwrite.
        if mode == BlendMode::Opaque || (mode == BlendMode::Blend && color.a == 255) {
            canvas.fill_rect(color, rect);
            return;
        }

        let mut pixels = canvas.lock_mut();
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let under = pixels.pixel(x, y);
                pixels.set_pixel(x, y, blend_pixel(mode, under, color, 255));
            }
        }
    }

    fn plot_pixels(&mut self, coords: &[Coord], colors: &[Color]) {
        debug_assert_eq!(coords.len(), colors.len());
        let Some(canvas) = self.canvas() else { return };
        let clip = self.core.clip();
        let mode = self.core.blend_mode;
        let tint = self.core.tint;

        let mut pixels = canvas.lock_mut();
        for (&coord, &color) in coords.iter().zip(colors) {
            let c = self.core.to_canvas(coord);
            if clip.contains(c) {
                let under = pixels.pixel(c.x, c.y);
                pixels.set_pixel(c.x, c.y, blend_pixel(mode, under, color.tint(tint), 255));
            }
        }
    }

    fn draw_line(&mut self, begin: Coord, end: Coord, color: Color, thickness: f32) {
        if !self.core.is_bound() {
            log::warn!("drawing attempted without a bound canvas");
            return;
        }
        let begin = self.core.to_canvas(begin);
        let end = self.core.to_canvas(end);
        let clip = self.core.clip();

        let thickness_px = pts_to_px_f(thickness, self.core.scale).max(0.0);
        if thickness_px == 0.0 {
            return;
        }

        // Coverage is accumulated per pixel first so that overlapping scan
        // passes blend once, at their combined weight.
        let mut coverage = HashMap::new();
        if thickness_px <= 1.0 {
            line::accumulate(&mut coverage, begin, end, thickness_px, clip);
        } else {
            // Thick lines: full-weight passes through the center, plus two
            // fractional edge passes, offset along the minor axis.
            let steep = (end.y - begin.y).abs() > (end.x - begin.x).abs();
            let offset = |d: i32| {
                if steep {
                    Coord::new(d, 0)
                } else {
                    Coord::new(0, d)
                }
            };
            let whole = thickness_px.floor() as i32;
            let frac = thickness_px - whole as f32;
            let lo = -(whole - 1) / 2;
            for d in lo..lo + whole {
                line::accumulate(&mut coverage, begin + offset(d), end + offset(d), 1.0, clip);
            }
            if frac > 0.0 {
                line::accumulate(
                    &mut coverage,
                    begin + offset(lo - 1),
                    end + offset(lo - 1),
                    frac / 2.0,
                    clip,
                );
                line::accumulate(
                    &mut coverage,
                    begin + offset(lo + whole),
                    end + offset(lo + whole),
                    frac / 2.0,
                    clip,
                );
            }
        }

        self.blend_coverage(&coverage, color);
    }

    fn blit(&mut self, src: &Rc<dyn Surface>, src_rect: Rect, dst: Coord) {
        let Some(canvas) = self.canvas() else { return };
        let Some(src) = Self::downcast_src(src) else {
            return;
        };

        let src_rect = src_rect.intersection(Rect::from_size(src.pixel_size()));
        let dst = self.core.to_canvas(dst);
        let dst_rect =
            Rect::new(dst.x, dst.y, src_rect.w, src_rect.h).intersection(self.core.clip());
        if dst_rect.is_empty() {
            return;
        }
        let sx = src_rect.x + (dst_rect.x - dst.x);
        let sy = src_rect.y + (dst_rect.y - dst.y);

        let src_fmt = src.pixel_format();
        let bpp = src_fmt.bytes_per_pixel();
        let row_bytes = dst_rect.w as usize * bpp;

        // Rows are staged through the frame allocator so that a blit from
        // the canvas to itself never holds both pixel locks at once.
        let mut scope = FrameScope::new(&mut self.mem_stack);
        let slot = scope.alloc(row_bytes * dst_rect.h as usize);
        {
            let from = src.lock();
            let buf = scope.buf_mut(slot);
            for y in 0..dst_rect.h {
                buf[y as usize * row_bytes..(y as usize + 1) * row_bytes]
                    .copy_from_slice(&from.row(sy + y, sx)[..row_bytes]);
            }
        }

        let mode = self.core.blend_mode;
        let tint = self.core.tint;
        let raw_path = src_fmt.ty == canvas.pixel_format().ty
            && mode == BlendMode::Opaque
            && tint == Color::WHITE;

        let mut to = canvas.lock_mut();
        let buf = scope.buf_mut(slot);
        for y in 0..dst_rect.h {
            let staged = &buf[y as usize * row_bytes..(y as usize + 1) * row_bytes];
            if raw_path {
                to.row_mut(dst_rect.y + y, dst_rect.x)[..row_bytes].copy_from_slice(staged);
            } else {
                for x in 0..dst_rect.w {
                    let raw = src_fmt.read_pixel(&staged[x as usize * bpp..]);
                    let color = src_fmt.pixel_to_color(raw).tint(tint);
                    let under = to.pixel(dst_rect.x + x, dst_rect.y + y);
                    to.set_pixel(
                        dst_rect.x + x,
                        dst_rect.y + y,
                        blend_pixel(mode, under, color, 255),
                    );
                }
            }
        }
    }

    fn tile_blit(&mut self, src: &Rc<dyn Surface>, src_rect: Rect, dst_rect: Rect) {
        if src_rect.is_empty() || dst_rect.is_empty() {
            return;
        }
        let mut y = dst_rect.y;
        while y < dst_rect.bottom() {
            let h = src_rect.h.min(dst_rect.bottom() - y);
            let mut x = dst_rect.x;
            while x < dst_rect.right() {
                let w = src_rect.w.min(dst_rect.right() - x);
                self.blit(
                    src,
                    Rect::new(src_rect.x, src_rect.y, w, h),
                    Coord::new(x, y),
                );
                x += src_rect.w;
            }
            y += src_rect.h;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn stretch_blit_sub_pixel_with_invert(
        &mut self,
        src: &Rc<dyn Surface>,
        sx: f32,
        sy: f32,
        sw: f32,
        sh: f32,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
    ) {
        let Some(canvas) = self.canvas() else { return };
        let Some(src) = Self::downcast_src(src) else {
            return;
        };
        if canvas.shares_storage_with(&src) {
            log::warn!("stretch blit with the canvas as its own source is not supported");
            return;
        }
        if dw < 1.0 || dh < 1.0 || sw == 0.0 || sh == 0.0 {
            return;
        }

        let ofs = self.core.viewport_offset();
        let dx = dx + ofs.x as f32;
        let dy = dy + ofs.y as f32;

        // Integer destination rect, clipped; each cut is mirrored onto the
        // source rect proportionally so the sampling stays aligned.
        let dst_rect = Rect::new(
            dx.round() as i32,
            dy.round() as i32,
            dw.round() as i32,
            dh.round() as i32,
        );
        let clipped = dst_rect.intersection(self.core.clip());
        if clipped.is_empty() {
            return;
        }

        let (sx, sw) = clip_axis(
            sx,
            sw,
            dst_rect.w,
            clipped.x - dst_rect.x,
            dst_rect.right() - clipped.right(),
        );
        let (sy, sh) = clip_axis(
            sy,
            sh,
            dst_rect.h,
            clipped.y - dst_rect.y,
            dst_rect.bottom() - clipped.bottom(),
        );

        let x_axis = Axis::new(sx, sw, clipped.w);
        let y_axis = Axis::new(sy, sh, clipped.h);

        let from = src.lock();
        let mut to = canvas.lock_mut();
        stretch::stretch_blit(
            &mut to,
            &from,
            src.pixel_size(),
            x_axis,
            y_axis,
            clipped.x,
            clipped.y,
            clipped.w,
            clipped.h,
            self.core.blend_mode,
            self.core.tint,
        );
    }
}

/// Shrink one source axis to match destination cuts of `lead` pixels at the
/// low edge and `trail` pixels at the high edge.
///
/// `extent` keeps its sign: on a mirrored axis the low destination edge
/// samples the high end of the source, so the cuts swap sides.
fn clip_axis(origin: f32, extent: f32, dest: i32, lead: i32, trail: i32) -> (f32, f32) {
    let per_pixel = extent.abs() / dest as f32;
    let (low_cut, high_cut) = if extent < 0.0 {
        (trail, lead)
    } else {
        (lead, trail)
    };
    let origin = origin + low_cut as f32 * per_pixel;
    let magnitude = extent.abs() - (low_cut + high_cut) as f32 * per_pixel;
    (origin, magnitude.copysign(extent))
}

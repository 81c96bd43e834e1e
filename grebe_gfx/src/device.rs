// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The rendering device contract widgets draw through.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::color::Color;
use crate::geom::{Coord, Rect, Size, SCALE_BASE};
use crate::surface::Surface;

/// How source pixels combine with existing canvas content.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// Overwrite, ignoring source alpha.
    Opaque,
    /// Source-over alpha blending.
    #[default]
    Blend,
    /// Saturating add, weighted by source alpha.
    Add,
    /// Per-channel multiply.
    Multiply,
    /// Invert the destination, weighted by source alpha.
    Invert,
}

/// The rendering contract.
///
/// A device is constructed once per render target and rebinds canvases via
/// the `set_canvas*` calls; binding never transfers ownership of the canvas
/// surface. All drawing is synchronous: every call completes its pixel
/// writes (or its queue submission, on the GPU backend) before returning.
///
/// Destination coordinates are translated by the viewport offset and
/// restricted to the top of the clip-rectangle stack. Drawing while no
/// canvas is bound is ignored and logged.
pub trait GfxDevice {
    /// Size of the currently bound canvas, zero while unbound.
    fn canvas_size(&self) -> Size;

    /// Allocate (or reuse) an internal backbuffer of `size` and bind it.
    ///
    /// Fails if `size` exceeds the backend's maximum or allocation fails,
    /// leaving any previous canvas binding intact.
    fn set_canvas_size(&mut self, size: Size) -> bool;

    /// Bind an already-created surface as the render target.
    ///
    /// The surface was size-validated at creation, so only backend
    /// affiliation is checked: a surface from a foreign backend is
    /// rejected.
    fn set_canvas(&mut self, surface: Rc<dyn Surface>) -> bool;

    /// Bracket one render pass. Canvas rebinding may only happen outside a
    /// pass, because clip-stack and viewport state are pass-scoped.
    fn begin_render(&mut self) -> bool;
    fn end_render(&mut self) -> bool;

    /// Constant color multiplied into fills and primitive draws. White
    /// leaves colors untouched.
    fn set_tint_color(&mut self, color: Color);
    fn tint_color(&self) -> Color;

    /// Returns `false` when the backend cannot honor `mode`, leaving the
    /// current mode unchanged.
    fn set_blend_mode(&mut self, mode: BlendMode) -> bool;
    fn blend_mode(&self) -> BlendMode;

    /// Point-to-pixel scale; [`SCALE_BASE`] means 1 point = 1 pixel.
    fn set_scale_factor(&mut self, scale: i32);
    fn scale_factor(&self) -> i32;

    /// Translate all subsequent destination coordinates by `offset`, used
    /// when the device renders into a sub-region of a larger target.
    fn set_viewport_offset(&mut self, offset: Coord);
    fn viewport_offset(&self) -> Coord;

    /// Push the intersection of `rect` with the current clip onto the clip
    /// stack. `rect` is given in the same (viewport-translated) space as
    /// drawing coordinates.
    fn push_clip(&mut self, rect: Rect);

    /// Restore the previous clip entry. Popping the base entry is a caller
    /// error and is ignored.
    fn pop_clip(&mut self);

    /// The currently active clip rectangle (canvas coordinates).
    fn clip(&self) -> Rect;

    /// Fill `rect` with `color`, clipped and blended per the current mode.
    fn fill(&mut self, rect: Rect, color: Color);

    /// Batch of clipped single-pixel writes. `coords` and `colors` must be
    /// the same length.
    fn plot_pixels(&mut self, coords: &[Coord], colors: &[Color]);

    /// Draw an anti-aliased line between two integer endpoints.
    ///
    /// `thickness` is given in points and converted through the scale
    /// factor.
    fn draw_line(&mut self, begin: Coord, end: Coord, color: Color, thickness: f32);

    /// Unscaled copy of `src_rect` from `src` to `dst` on the canvas.
    fn blit(&mut self, src: &Rc<dyn Surface>, src_rect: Rect, dst: Coord);

    /// Repeat `src_rect` from `src` over `dst_rect`.
    fn tile_blit(&mut self, src: &Rc<dyn Surface>, src_rect: Rect, dst_rect: Rect);

    /// Copy the source sub-rectangle `(sx, sy, sw, sh)` into the
    /// destination rectangle `(dx, dy, dw, dh)`, resampling bilinearly
    /// when the extents differ.
    ///
    /// Source coordinates are fractional: a non-integer `sx`/`sy` shifts
    /// sampling by a sub-pixel amount. A negative `sw` or `sh` mirrors the
    /// corresponding axis; inversion and scaling compose independently.
    /// With `sw == dw`, `sh == dh`, no inversion and integer-aligned
    /// origins the result is an exact pixel copy.
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
    );
}

/// Canvas-independent device state shared by every backend.
///
/// Tracks the clip stack, viewport offset and the current tint, blend and
/// scale settings. The clip stack is never empty while a canvas is bound;
/// its base entry is the full canvas.
#[derive(Debug, Clone)]
pub struct DeviceCore {
    canvas_size: Size,
    clip_stack: SmallVec<[Rect; 8]>,
    viewport_offset: Coord,
    pub tint: Color,
    pub blend_mode: BlendMode,
    pub scale: i32,
    pub rendering: bool,
}

impl Default for DeviceCore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCore {
    pub fn new() -> Self {
        Self {
            canvas_size: Size::new(0, 0),
            clip_stack: SmallVec::new(),
            viewport_offset: Coord::ZERO,
            tint: Color::WHITE,
            blend_mode: BlendMode::Blend,
            scale: SCALE_BASE,
            rendering: false,
        }
    }

    /// Record a successful canvas binding: reset the clip stack to the
    /// full canvas.
    pub fn bind(&mut self, size: Size) {
        self.canvas_size = size;
        self.clip_stack.clear();
        self.clip_stack.push(Rect::from_size(size));
    }

    pub fn is_bound(&self) -> bool {
        !self.clip_stack.is_empty()
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    pub fn push_clip(&mut self, rect: Rect) {
        debug_assert!(self.is_bound(), "push_clip without a bound canvas");
        let top = self.clip();
        self.clip_stack.push(top.intersection(rect.offset(self.viewport_offset)));
    }

    pub fn pop_clip(&mut self) {
        if self.clip_stack.len() > 1 {
            self.clip_stack.pop();
        } else {
            // The base entry (the full canvas) must survive while bound.
            log::warn!("unbalanced pop_clip ignored");
        }
    }

    /// Top of the clip stack, in canvas coordinates. Empty while unbound.
    pub fn clip(&self) -> Rect {
        self.clip_stack.last().copied().unwrap_or_default()
    }

    pub fn set_viewport_offset(&mut self, offset: Coord) {
        self.viewport_offset = offset;
    }

    pub fn viewport_offset(&self) -> Coord {
        self.viewport_offset
    }

    /// Translate a destination coordinate by the viewport offset.
    pub fn to_canvas(&self, c: Coord) -> Coord {
        c + self.viewport_offset
    }

    /// Translate a destination rectangle by the viewport offset.
    pub fn rect_to_canvas(&self, r: Rect) -> Rect {
        r.offset(self.viewport_offset)
    }
}

// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The surface and surface factory contracts.
//!
//! A surface is a pixel buffer plus format and size metadata. Its storage is
//! either allocated by the surface itself or supplied by the caller as a
//! shared buffer; in both cases the storage is reference counted and freed
//! by the last referrer, never by the surface directly.
//!
//! Pixel access goes through scoped lock guards ([`PixelsRef`] /
//! [`PixelsMut`]). The guards borrow the underlying `RefCell`, so writing
//! while another pass reads fails fast instead of corrupting pixels.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::color::Color;
use crate::error::GfxError;
use crate::geom::{Coord, Rect, Size};
use crate::pixel_format::{PixelFormat, PixelType};

/// Reference-counted pixel storage, shared between a surface and any
/// external holder of the buffer.
pub type SharedPixels = Rc<RefCell<Vec<u8>>>;

/// A pixel buffer with format and size metadata, owned or externally
/// referenced.
///
/// Surfaces are handed out as `Rc<dyn Surface>`; backends recover their
/// concrete type through [`as_any_rc`](Surface::as_any_rc) and reject
/// surfaces that belong to a different backend.
pub trait Surface {
    /// Size in pixels.
    fn pixel_size(&self) -> Size;

    /// The format table entry describing this surface's pixel layout.
    fn pixel_format(&self) -> &'static PixelFormat;

    /// Bytes per pixel row. At least `width × bytes_per_pixel`.
    fn pitch(&self) -> usize;

    /// Whether every pixel of the surface is fully opaque.
    fn is_opaque(&self) -> bool;

    /// Flood the whole surface with `color`.
    fn fill(&self, color: Color);

    /// Flood `rect` (clipped to the surface) with `color`.
    fn fill_rect(&self, color: Color, rect: Rect);

    /// Read a single pixel, `None` outside the surface.
    fn pixel_at(&self, coord: Coord) -> Option<Color>;

    /// Write a single pixel; out-of-bounds writes are ignored.
    fn set_pixel_at(&self, coord: Coord, color: Color);

    /// Opacity probe used for widget hit-testing. Formats without alpha
    /// report 255; out-of-bounds coordinates report 0.
    fn alpha_at(&self, coord: Coord) -> u8;

    fn as_any(&self) -> &dyn Any;

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Constructs surfaces for one specific backend and enforces that
/// backend's maximum size.
pub trait SurfaceFactory {
    /// The backend's upper bound on surface dimensions.
    fn max_size(&self) -> Size;

    /// Create a surface with storage owned by the surface, initialized to
    /// transparent black.
    fn create_surface(&self, size: Size, ty: PixelType) -> Result<Rc<dyn Surface>, GfxError>;

    /// Wrap caller-supplied pixel storage without copying it.
    ///
    /// The declared format must match the bytes physically present; the
    /// buffer must hold at least `pitch × height` bytes and must not be
    /// resized for the surface's lifetime.
    fn create_surface_from(
        &self,
        size: Size,
        ty: PixelType,
        pixels: SharedPixels,
        pitch: usize,
    ) -> Result<Rc<dyn Surface>, GfxError>;
}

/// Scoped read access to a surface's pixels.
pub struct PixelsRef<'a> {
    buf: Ref<'a, Vec<u8>>,
    format: &'static PixelFormat,
    pitch: usize,
}

impl<'a> PixelsRef<'a> {
    pub fn new(pixels: &'a SharedPixels, format: &'static PixelFormat, pitch: usize) -> Self {
        Self {
            buf: pixels.borrow(),
            format,
            pitch,
        }
    }

    pub fn format(&self) -> &'static PixelFormat {
        self.format
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// The pixel bytes of row `y`, starting at column `x`.
    pub fn row(&self, y: i32, x: i32) -> &[u8] {
        let start = y as usize * self.pitch + x as usize * self.format.bytes_per_pixel();
        &self.buf[start..]
    }

    pub fn pixel(&self, x: i32, y: i32) -> Color {
        self.format.pixel_to_color(self.format.read_pixel(self.row(y, x)))
    }
}

/// Scoped write access to a surface's pixels.
pub struct PixelsMut<'a> {
    buf: RefMut<'a, Vec<u8>>,
    format: &'static PixelFormat,
    pitch: usize,
}

impl<'a> PixelsMut<'a> {
    pub fn new(pixels: &'a SharedPixels, format: &'static PixelFormat, pitch: usize) -> Self {
        Self {
            buf: pixels.borrow_mut(),
            format,
            pitch,
        }
    }

    pub fn format(&self) -> &'static PixelFormat {
        self.format
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn row(&self, y: i32, x: i32) -> &[u8] {
        let start = y as usize * self.pitch + x as usize * self.format.bytes_per_pixel();
        &self.buf[start..]
    }

    pub fn row_mut(&mut self, y: i32, x: i32) -> &mut [u8] {
        let start = y as usize * self.pitch + x as usize * self.format.bytes_per_pixel();
        &mut self.buf[start..]
    }

    pub fn pixel(&self, x: i32, y: i32) -> Color {
        self.format.pixel_to_color(self.format.read_pixel(self.row(y, x)))
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        let raw = self.format.color_to_pixel(color);
        let format = self.format;
        format.write_pixel(self.row_mut(y, x), raw);
    }
}

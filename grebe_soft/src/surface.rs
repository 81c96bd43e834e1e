// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The software surface and its factory.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use grebe_gfx::{
    Color, Coord, GfxError, PixelFormat, PixelType, PixelsMut, PixelsRef, Rect, SharedPixels,
    Size, Surface, SurfaceFactory,
};

/// A CPU pixel buffer.
///
/// Storage is either allocated here or supplied by the caller through
/// [`SoftSurfaceFactory::create_surface_from`]; in both cases it is
/// reference counted and freed by the last referrer.
pub struct SoftSurface {
    size: Size,
    format: &'static PixelFormat,
    pitch: usize,
    pixels: SharedPixels,
}

impl SoftSurface {
    /// Software surfaces are bounded by addressable memory, not hardware.
    pub const MAX_SIZE: Size = Size::new(65536, 65536);

    /// Create a surface with owned storage, initialized to transparent
    /// black.
    pub fn new(size: Size, ty: PixelType) -> Result<Rc<Self>, GfxError> {
        let format = PixelFormat::of(ty);
        check_size(size)?;
        let pitch = size.w as usize * format.bytes_per_pixel();
        let len = pitch
            .checked_mul(size.h as usize)
            .ok_or(GfxError::AllocationFailure { requested: size })?;

        let mut buf = Vec::new();
        if buf.try_reserve_exact(len).is_err() {
            return Err(GfxError::AllocationFailure { requested: size });
        }
        buf.resize(len, 0);

        Ok(Rc::new(Self {
            size,
            format,
            pitch,
            pixels: Rc::new(RefCell::new(buf)),
        }))
    }

    /// Wrap caller-supplied storage without copying it.
    ///
    /// The declared format must match the bytes physically present; no
    /// reformatting is performed.
    pub fn from_shared(
        size: Size,
        ty: PixelType,
        pixels: SharedPixels,
        pitch: usize,
    ) -> Result<Rc<Self>, GfxError> {
        let format = PixelFormat::of(ty);
        check_size(size)?;
        if pitch < size.w as usize * format.bytes_per_pixel() {
            return Err(GfxError::FormatMismatch("pitch smaller than a pixel row"));
        }
        if pixels.borrow().len() < pitch * size.h as usize {
            return Err(GfxError::FormatMismatch(
                "buffer too small for the declared size and pitch",
            ));
        }

        Ok(Rc::new(Self {
            size,
            format,
            pitch,
            pixels,
        }))
    }

    /// Acquire scoped read access to the pixels.
    pub fn lock(&self) -> PixelsRef<'_> {
        PixelsRef::new(&self.pixels, self.format, self.pitch)
    }

    /// Acquire scoped write access to the pixels.
    pub fn lock_mut(&self) -> PixelsMut<'_> {
        PixelsMut::new(&self.pixels, self.format, self.pitch)
    }

    /// Whether two surfaces share the same pixel storage.
    pub(crate) fn shares_storage_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.pixels, &other.pixels)
    }

    fn bounds(&self) -> Rect {
        Rect::from_size(self.size)
    }

    /// Copy `src_rect` of `src` to `dst`, converting between formats
    /// through the format tables.
    ///
    /// The source must be another software surface with distinct storage;
    /// overlapping copies go through [`SoftGfxDevice::blit`], which stages
    /// rows through the frame allocator.
    ///
    /// [`SoftGfxDevice::blit`]: crate::SoftGfxDevice::blit
    pub fn copy_from(&self, src: &SoftSurface, src_rect: Rect, dst: Coord) -> bool {
        if self.shares_storage_with(src) {
            log::warn!("copy_from between surfaces sharing storage is not supported");
            return false;
        }

        // Clip the source rect to the source, then the destination rect to
        // this surface, mirroring each cut on the other side.
        let src_rect = src_rect.intersection(src.bounds());
        let dst_rect = Rect::new(dst.x, dst.y, src_rect.w, src_rect.h).intersection(self.bounds());
        if dst_rect.is_empty() {
            return true;
        }
        let sx = src_rect.x + (dst_rect.x - dst.x);
        let sy = src_rect.y + (dst_rect.y - dst.y);

        let from = src.lock();
        let mut to = self.lock_mut();
        let bpp = src.format.bytes_per_pixel();

        if src.format.ty == self.format.ty {
            for y in 0..dst_rect.h {
                let row = &from.row(sy + y, sx)[..dst_rect.w as usize * bpp];
                to.row_mut(dst_rect.y + y, dst_rect.x)[..dst_rect.w as usize * bpp]
                    .copy_from_slice(row);
            }
        } else {
            for y in 0..dst_rect.h {
                for x in 0..dst_rect.w {
                    let c = from.pixel(sx + x, sy + y);
                    to.set_pixel(dst_rect.x + x, dst_rect.y + y, c);
                }
            }
        }
        true
    }
}

impl Surface for SoftSurface {
    fn pixel_size(&self) -> Size {
        self.size
    }

    fn pixel_format(&self) -> &'static PixelFormat {
        self.format
    }

    fn pitch(&self) -> usize {
        self.pitch
    }

    fn is_opaque(&self) -> bool {
        !self.format.has_alpha()
    }

    fn fill(&self, color: Color) {
        self.fill_rect(color, self.bounds());
    }

    fn fill_rect(&self, color: Color, rect: Rect) {
        let rect = rect.intersection(self.bounds());
        if rect.is_empty() {
            return;
        }

        let mut pixels = self.lock_mut();
        let bpp = self.format.bytes_per_pixel();
        let raw = self.format.color_to_pixel(color);

        let mut pattern = vec![0_u8; rect.w as usize * bpp];
        for px in pattern.chunks_exact_mut(bpp) {
            self.format.write_pixel(px, raw);
        }
        for y in rect.y..rect.bottom() {
            pixels.row_mut(y, rect.x)[..pattern.len()].copy_from_slice(&pattern);
        }
    }

    fn pixel_at(&self, coord: Coord) -> Option<Color> {
        if !self.bounds().contains(coord) {
            return None;
        }
        Some(self.lock().pixel(coord.x, coord.y))
    }

    fn set_pixel_at(&self, coord: Coord, color: Color) {
        if !self.bounds().contains(coord) {
            return;
        }
        self.lock_mut().set_pixel(coord.x, coord.y, color);
    }

    fn alpha_at(&self, coord: Coord) -> u8 {
        match self.pixel_at(coord) {
            Some(c) => c.a,
            None => 0,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

fn check_size(size: Size) -> Result<(), GfxError> {
    if size.w < 0 || size.h < 0 || !size.fits_within(SoftSurface::MAX_SIZE) {
        return Err(GfxError::InvalidSize {
            requested: size,
            max: SoftSurface::MAX_SIZE,
        });
    }
    Ok(())
}

/// Creates [`SoftSurface`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftSurfaceFactory;

impl SoftSurfaceFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SurfaceFactory for SoftSurfaceFactory {
    fn max_size(&self) -> Size {
        SoftSurface::MAX_SIZE
    }

    fn create_surface(&self, size: Size, ty: PixelType) -> Result<Rc<dyn Surface>, GfxError> {
        Ok(SoftSurface::new(size, ty)?)
    }

    fn create_surface_from(
        &self,
        size: Size,
        ty: PixelType,
        pixels: SharedPixels,
        pitch: usize,
    ) -> Result<Rc<dyn Surface>, GfxError> {
        Ok(SoftSurface::from_shared(size, ty, pixels, pitch)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_gate_matches_max_size() {
        let factory = SoftSurfaceFactory::new();
        assert!(factory
            .create_surface(Size::new(16, 16), PixelType::Bgra8)
            .is_ok());
        let too_big = Size::new(SoftSurface::MAX_SIZE.w + 1, 1);
        assert!(matches!(
            factory.create_surface(too_big, PixelType::Bgra8),
            Err(GfxError::InvalidSize { .. })
        ));
    }

    #[test]
    fn pixel_round_trip_all_formats() {
        for ty in [PixelType::Bgra8, PixelType::Rgba8] {
            let surf = SoftSurface::new(Size::new(4, 4), ty).unwrap();
            let c = Color::new(10, 20, 30, 40);
            surf.set_pixel_at(Coord::new(2, 1), c);
            assert_eq!(surf.pixel_at(Coord::new(2, 1)), Some(c), "{ty:?}");
        }
        // 24-bit formats drop alpha and read back opaque.
        let surf = SoftSurface::new(Size::new(4, 4), PixelType::Bgr8).unwrap();
        surf.set_pixel_at(Coord::new(0, 0), Color::new(10, 20, 30, 40));
        assert_eq!(
            surf.pixel_at(Coord::new(0, 0)),
            Some(Color::new(10, 20, 30, 255))
        );
    }

    #[test]
    fn shared_buffer_is_not_copied() {
        let pixels: SharedPixels = Rc::new(RefCell::new(vec![0_u8; 8 * 8 * 4]));
        let surf =
            SoftSurface::from_shared(Size::new(8, 8), PixelType::Bgra8, pixels.clone(), 8 * 4)
                .unwrap();
        surf.set_pixel_at(Coord::new(0, 0), Color::WHITE);
        assert_eq!(pixels.borrow()[0], 255);

        // The surface holds a reference, not a copy.
        assert_eq!(Rc::strong_count(&pixels), 2);
    }

    #[test]
    fn undersized_shared_buffer_is_rejected() {
        let pixels: SharedPixels = Rc::new(RefCell::new(vec![0_u8; 16]));
        assert!(matches!(
            SoftSurface::from_shared(Size::new(8, 8), PixelType::Bgra8, pixels, 8 * 4),
            Err(GfxError::FormatMismatch(_))
        ));
    }

    #[test]
    fn copy_from_converts_between_formats() {
        let a = SoftSurface::new(Size::new(4, 4), PixelType::Bgra8).unwrap();
        let b = SoftSurface::new(Size::new(4, 4), PixelType::Rgba8).unwrap();
        let c = Color::new(1, 2, 3, 4);
        a.set_pixel_at(Coord::new(3, 3), c);
        assert!(b.copy_from(&a, Rect::new(0, 0, 4, 4), Coord::ZERO));
        assert_eq!(b.pixel_at(Coord::new(3, 3)), Some(c));
    }
}

// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The GPU surface and its factory.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use grebe_gfx::{
    Color, Coord, GfxError, PixelFormat, PixelType, PixelsMut, PixelsRef, Rect, SharedPixels,
    Size, Surface, SurfaceFactory,
};

/// A hardware-texture-backed surface.
///
/// The texture is created at construction; a surface never changes
/// dimensions, the device recreates its backbuffer surface when the canvas
/// size changes. A CPU-side buffer carries the lock protocol: pixel writes
/// land in the buffer and are flushed to the texture before the texture is
/// next sampled or rendered to. Reads through [`Surface::pixel_at`] see
/// the buffer, i.e. uploads, not the results of GPU rendering.
pub struct GpuSurface {
    size: Size,
    format: &'static PixelFormat,
    pitch: usize,
    pixels: SharedPixels,
    texture: wgpu::Texture,
    dirty: Cell<bool>,
    queue: Arc<wgpu::Queue>,
}

impl GpuSurface {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: Arc<wgpu::Queue>,
        size: Size,
        ty: PixelType,
    ) -> Result<Rc<Self>, GfxError> {
        let format = PixelFormat::of(ty);
        check_size(device, size)?;
        let pitch = size.w as usize * format.bytes_per_pixel();
        let len = pitch
            .checked_mul(size.h as usize)
            .ok_or(GfxError::AllocationFailure { requested: size })?;

        let mut buf = Vec::new();
        if buf.try_reserve_exact(len).is_err() {
            return Err(GfxError::AllocationFailure { requested: size });
        }
        buf.resize(len, 0);

        let texture = create_texture(device, size, ty)?;
        Ok(Rc::new(Self {
            size,
            format,
            pitch,
            pixels: Rc::new(RefCell::new(buf)),
            texture,
            dirty: Cell::new(false),
            queue,
        }))
    }

    pub(crate) fn from_shared(
        device: &wgpu::Device,
        queue: Arc<wgpu::Queue>,
        size: Size,
        ty: PixelType,
        pixels: SharedPixels,
        pitch: usize,
    ) -> Result<Rc<Self>, GfxError> {
        let format = PixelFormat::of(ty);
        check_size(device, size)?;
        if pitch < size.w as usize * format.bytes_per_pixel() {
            return Err(GfxError::FormatMismatch("pitch smaller than a pixel row"));
        }
        if pixels.borrow().len() < pitch * size.h as usize {
            return Err(GfxError::FormatMismatch(
                "buffer too small for the declared size and pitch",
            ));
        }

        let texture = create_texture(device, size, ty)?;
        Ok(Rc::new(Self {
            size,
            format,
            pitch,
            pixels,
            texture,
            dirty: Cell::new(true),
            queue,
        }))
    }

    /// Acquire scoped read access to the CPU-side pixels.
    pub fn lock(&self) -> PixelsRef<'_> {
        PixelsRef::new(&self.pixels, self.format, self.pitch)
    }

    /// Acquire scoped write access to the CPU-side pixels. The texture is
    /// re-uploaded before its next GPU use.
    pub fn lock_mut(&self) -> PixelsMut<'_> {
        self.dirty.set(true);
        PixelsMut::new(&self.pixels, self.format, self.pitch)
    }

    pub(crate) fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Flush CPU-side pixel writes to the texture.
    pub(crate) fn ensure_uploaded(&self) {
        if !self.dirty.replace(false) {
            return;
        }
        let buf = self.pixels.borrow();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &buf,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.pitch as u32),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: self.size.w as u32,
                height: self.size.h as u32,
                depth_or_array_layers: 1,
            },
        );
    }

    fn bounds(&self) -> Rect {
        Rect::from_size(self.size)
    }

    /// Copy `src_rect` of `src` to `dst` on the CPU side, converting
    /// between formats through the format tables. The texture is
    /// re-uploaded before its next GPU use.
    ///
    /// The source must be another GPU surface with distinct storage.
    pub fn copy_from(&self, src: &GpuSurface, src_rect: Rect, dst: Coord) -> bool {
        if Rc::ptr_eq(&self.pixels, &src.pixels) {
            log::warn!("copy_from between surfaces sharing storage is not supported");
            return false;
        }

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

    /// Read the texture's current contents back to the CPU.
    ///
    /// This is a synchronous round trip through a staging buffer and is
    /// meant for tests and debugging, not for per-frame use. Returns
    /// tightly packed rows of `width × bytes_per_pixel` bytes.
    pub fn download(&self, device: &wgpu::Device) -> Option<Vec<u8>> {
        self.ensure_uploaded();

        let width = self.size.w as u32;
        let height = self.size.h as u32;
        let row_bytes = width * 4;
        let padded_row = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grebe download"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&Default::default());
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = std::sync::mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        let _ = device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            _ => {
                log::error!("canvas download failed to map the staging buffer");
                return None;
            }
        }

        let mapped = staging.slice(..).get_mapped_range();
        let mut out = Vec::with_capacity((row_bytes * height) as usize);
        for y in 0..height {
            let start = (y * padded_row) as usize;
            out.extend_from_slice(&mapped[start..start + row_bytes as usize]);
        }
        drop(mapped);
        staging.unmap();
        Some(out)
    }
}

impl Surface for GpuSurface {
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

/// Map a pixel format onto the matching texture format.
///
/// Only 32-bit layouts have hardware equivalents; 24-bit surfaces stay on
/// the software backend.
pub(crate) fn texture_format(ty: PixelType) -> Result<wgpu::TextureFormat, GfxError> {
    match ty {
        PixelType::Bgra8 => Ok(wgpu::TextureFormat::Bgra8Unorm),
        PixelType::Rgba8 => Ok(wgpu::TextureFormat::Rgba8Unorm),
        PixelType::Bgr8 => Err(GfxError::FormatMismatch(
            "24-bit formats have no hardware texture layout",
        )),
    }
}

fn max_size(device: &wgpu::Device) -> Size {
    let max = device.limits().max_texture_dimension_2d as i32;
    Size::new(max, max)
}

fn check_size(device: &wgpu::Device, size: Size) -> Result<(), GfxError> {
    let max = max_size(device);
    if size.w < 0 || size.h < 0 || !size.fits_within(max) {
        return Err(GfxError::InvalidSize {
            requested: size,
            max,
        });
    }
    Ok(())
}

fn create_texture(
    device: &wgpu::Device,
    size: Size,
    ty: PixelType,
) -> Result<wgpu::Texture, GfxError> {
    let format = texture_format(ty)?;
    Ok(device.create_texture(&wgpu::TextureDescriptor {
        label: Some("grebe surface"),
        size: wgpu::Extent3d {
            width: size.w as u32,
            height: size.h as u32,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    }))
}

/// Creates [`GpuSurface`]s for one GPU context.
pub struct GpuSurfaceFactory {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl GpuSurfaceFactory {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Typed variant of [`SurfaceFactory::create_surface`].
    pub fn create(&self, size: Size, ty: PixelType) -> Result<Rc<GpuSurface>, GfxError> {
        GpuSurface::new(&self.device, Arc::clone(&self.queue), size, ty)
    }
}

impl SurfaceFactory for GpuSurfaceFactory {
    fn max_size(&self) -> Size {
        max_size(&self.device)
    }

    fn create_surface(&self, size: Size, ty: PixelType) -> Result<Rc<dyn Surface>, GfxError> {
        Ok(self.create(size, ty)?)
    }

    fn create_surface_from(
        &self,
        size: Size,
        ty: PixelType,
        pixels: SharedPixels,
        pitch: usize,
    ) -> Result<Rc<dyn Surface>, GfxError> {
        Ok(GpuSurface::from_shared(
            &self.device,
            Arc::clone(&self.queue),
            size,
            ty,
            pixels,
            pitch,
        )?)
    }
}

// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The GPU rendering device.

use std::rc::{Rc, Weak};
use std::sync::Arc;

use wgpu::util::DeviceExt;

use grebe_gfx::geom::pts_to_px_f;
use grebe_gfx::{BlendMode, Color, Coord, DeviceCore, GfxDevice, PixelType, Rect, Size, Surface};

use crate::shaders::{
    self, blend_index, BlitParams, Globals, PipelineLayouts, Pipelines, SolidVertex, TexVertex,
};
use crate::surface::GpuSurface;

fn color_to_f32(c: Color) -> [f32; 4] {
    [
        c.r as f32 / 255.0,
        c.g as f32 / 255.0,
        c.b as f32 / 255.0,
        c.a as f32 / 255.0,
    ]
}

/// A [`GfxDevice`] rendering into [`GpuSurface`] canvases through `wgpu`.
///
/// Every draw call records and submits its own command encoder, keeping
/// the synchronous contract: the work is queued (and fenced in
/// [`end_render`](GfxDevice::end_render)) before the call returns.
pub struct GpuGfxDevice {
    core: DeviceCore,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    canvas: Weak<GpuSurface>,
    backbuffer: Option<Rc<GpuSurface>>,
    layouts: PipelineLayouts,
    pipelines: Option<Pipelines>,
    globals_buf: wgpu::Buffer,
    globals_bind: wgpu::BindGroup,
    sampler: wgpu::Sampler,
}

impl GpuGfxDevice {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let layouts = shaders::create_layouts(&device);

        let globals_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grebe globals"),
            contents: bytemuck::bytes_of(&Globals {
                size: [0.0, 0.0],
                _pad: [0.0, 0.0],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grebe globals"),
            layout: &layouts.globals,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buf.as_entire_binding(),
            }],
        });

        // Linear filtering matches the software backend's bilinear kernel;
        // at texel centers it returns exact texel values, preserving the
        // identity-blit guarantee.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("grebe blit sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            core: DeviceCore::new(),
            device,
            queue,
            canvas: Weak::new(),
            backbuffer: None,
            layouts,
            pipelines: None,
            globals_buf,
            globals_bind,
            sampler,
        }
    }

    /// The currently bound canvas, if it is still alive.
    pub fn canvas(&self) -> Option<Rc<GpuSurface>> {
        let canvas = self.canvas.upgrade();
        if canvas.is_none() {
            log::warn!("drawing attempted without a bound canvas");
        }
        canvas
    }

    fn downcast_src(src: &Rc<dyn Surface>) -> Option<Rc<GpuSurface>> {
        match Rc::clone(src).as_any_rc().downcast::<GpuSurface>() {
            Ok(surface) => Some(surface),
            Err(_) => {
                log::error!("surface from a foreign backend passed to the GPU device");
                None
            }
        }
    }

    fn bind_canvas(&mut self, surface: &Rc<GpuSurface>) {
        let size = surface.pixel_size();
        self.core.bind(size);
        self.canvas = Rc::downgrade(surface);

        self.queue.write_buffer(
            &self.globals_buf,
            0,
            bytemuck::bytes_of(&Globals {
                size: [size.w as f32, size.h as f32],
                _pad: [0.0, 0.0],
            }),
        );

        let format = crate::surface::texture_format(surface.pixel_format().ty)
            .expect("bound surfaces always have a hardware format");
        if self.pipelines.as_ref().map(|p| p.format) != Some(format) {
            self.pipelines = Some(shaders::create_pipelines(&self.device, &self.layouts, format));
        }
    }

    /// Scissor rectangle for the current clip, `None` when everything is
    /// clipped away.
    fn scissor(&self) -> Option<(u32, u32, u32, u32)> {
        let clip = self
            .core
            .clip()
            .intersection(Rect::from_size(self.core.canvas_size()));
        if clip.is_empty() {
            None
        } else {
            Some((clip.x as u32, clip.y as u32, clip.w as u32, clip.h as u32))
        }
    }

    fn draw_solid(&self, verts: &[SolidVertex]) {
        let Some(canvas) = self.canvas() else { return };
        let Some(pipelines) = &self.pipelines else {
            return;
        };
        let Some((sx, sy, sw, sh)) = self.scissor() else {
            return;
        };
        if verts.is_empty() {
            return;
        }
        canvas.ensure_uploaded();

        let vbuf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("grebe solid vertices"),
                contents: bytemuck::cast_slice(verts),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let view = canvas
            .texture()
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&Default::default());
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("grebe solid pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipelines.solid[blend_index(self.core.blend_mode)]);
            pass.set_scissor_rect(sx, sy, sw, sh);
            pass.set_bind_group(0, &self.globals_bind, &[]);
            pass.set_vertex_buffer(0, vbuf.slice(..));
            pass.draw(0..verts.len() as u32, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_textured(&self, src: &GpuSurface, verts: &[TexVertex]) {
        let Some(canvas) = self.canvas() else { return };
        let Some(pipelines) = &self.pipelines else {
            return;
        };
        let Some((sx, sy, sw, sh)) = self.scissor() else {
            return;
        };
        if verts.is_empty() {
            return;
        }
        canvas.ensure_uploaded();
        src.ensure_uploaded();

        let src_view = src
            .texture()
            .create_view(&wgpu::TextureViewDescriptor::default());
        let params_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("grebe blit params"),
                contents: bytemuck::bytes_of(&BlitParams {
                    tint: color_to_f32(self.core.tint),
                }),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let src_bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grebe blit source"),
            layout: &self.layouts.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let vbuf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("grebe blit vertices"),
                contents: bytemuck::cast_slice(verts),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let view = canvas
            .texture()
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&Default::default());
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("grebe blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipelines.textured[blend_index(self.core.blend_mode)]);
            pass.set_scissor_rect(sx, sy, sw, sh);
            pass.set_bind_group(0, &self.globals_bind, &[]);
            pass.set_bind_group(1, &src_bind, &[]);
            pass.set_vertex_buffer(0, vbuf.slice(..));
            pass.draw(0..verts.len() as u32, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Two triangles covering `x0..x1 × y0..y1` in `color`.
    fn solid_quad(verts: &mut Vec<SolidVertex>, x0: f32, y0: f32, x1: f32, y1: f32, color: Color) {
        let color = color_to_f32(color);
        let corners = [[x0, y0], [x1, y0], [x1, y1], [x0, y0], [x1, y1], [x0, y1]];
        verts.extend(corners.map(|pos| SolidVertex { pos, color }));
    }

    /// Two textured triangles mapping `u0..u1 × v0..v1` onto
    /// `x0..x1 × y0..y1`.
    #[allow(clippy::too_many_arguments)]
    fn tex_quad(
        verts: &mut Vec<TexVertex>,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        u0: f32,
        v0: f32,
        u1: f32,
        v1: f32,
    ) {
        let quad = [
            ([x0, y0], [u0, v0]),
            ([x1, y0], [u1, v0]),
            ([x1, y1], [u1, v1]),
            ([x0, y0], [u0, v0]),
            ([x1, y1], [u1, v1]),
            ([x0, y1], [u0, v1]),
        ];
        verts.extend(quad.map(|(pos, uv)| TexVertex { pos, uv }));
    }
}

impl GfxDevice for GpuGfxDevice {
    fn canvas_size(&self) -> Size {
        self.core.canvas_size()
    }

    fn set_canvas_size(&mut self, size: Size) -> bool {
        // An existing backbuffer of the right size is reused; a size
        // change recreates surface and texture.
        if let Some(buffer) = &self.backbuffer {
            if buffer.pixel_size() == size {
                let buffer = Rc::clone(buffer);
                self.bind_canvas(&buffer);
                return true;
            }
        }
        match GpuSurface::new(
            &self.device,
            Arc::clone(&self.queue),
            size,
            PixelType::Bgra8,
        ) {
            Ok(surface) => {
                self.bind_canvas(&surface);
                self.backbuffer = Some(surface);
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
        self.bind_canvas(&surface);
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
        // Fence the pass: the synchronous model promises all queued work
        // is finished when the pass ends.
        let _ = self.device.poll(wgpu::Maintain::Wait);
        true
    }

    fn set_tint_color(&mut self, color: Color) {
        self.core.tint = color;
    }

    fn tint_color(&self) -> Color {
        self.core.tint
    }

    fn set_blend_mode(&mut self, mode: BlendMode) -> bool {
        if !shaders::GPU_BLEND_MODES.contains(&mode) {
            log::debug!("blend mode {mode:?} is not supported by the GPU backend");
            return false;
        }
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
        let rect = self.core.rect_to_canvas(rect);
        if rect.is_empty() {
            return;
        }
        let color = color.tint(self.core.tint);
        let mut verts = Vec::with_capacity(6);
        Self::solid_quad(
            &mut verts,
            rect.x as f32,
            rect.y as f32,
            rect.right() as f32,
            rect.bottom() as f32,
            color,
        );
        self.draw_solid(&verts);
    }

    fn plot_pixels(&mut self, coords: &[Coord], colors: &[Color]) {
        debug_assert_eq!(coords.len(), colors.len());
        let tint = self.core.tint;
        let mut verts = Vec::with_capacity(coords.len() * 6);
        for (&coord, &color) in coords.iter().zip(colors) {
            let c = self.core.to_canvas(coord);
            Self::solid_quad(
                &mut verts,
                c.x as f32,
                c.y as f32,
                (c.x + 1) as f32,
                (c.y + 1) as f32,
                color.tint(tint),
            );
        }
        self.draw_solid(&verts);
    }

    fn draw_line(&mut self, begin: Coord, end: Coord, color: Color, thickness: f32) {
        let thickness_px = pts_to_px_f(thickness, self.core.scale).max(0.0);
        if thickness_px == 0.0 {
            return;
        }
        let begin = self.core.to_canvas(begin);
        let end = self.core.to_canvas(end);

        // The line is a quad around the segment's center line. The GPU
        // backend has no coverage ramp at the edges; anti-aliased lines
        // are the software rasterizer's domain.
        let (x1, y1) = (begin.x as f32 + 0.5, begin.y as f32 + 0.5);
        let (x2, y2) = (end.x as f32 + 0.5, end.y as f32 + 0.5);
        let len = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
        let color = color.tint(self.core.tint);
        if len == 0.0 {
            // Zero-length line: a single point.
            let mut verts = Vec::with_capacity(6);
            Self::solid_quad(
                &mut verts,
                begin.x as f32,
                begin.y as f32,
                (begin.x + 1) as f32,
                (begin.y + 1) as f32,
                color,
            );
            self.draw_solid(&verts);
            return;
        }
        let half = thickness_px.max(1.0) / 2.0;
        let (nx, ny) = (-(y2 - y1) / len * half, (x2 - x1) / len * half);

        let c = color_to_f32(color);
        let verts = [
            SolidVertex { pos: [x1 + nx, y1 + ny], color: c },
            SolidVertex { pos: [x2 + nx, y2 + ny], color: c },
            SolidVertex { pos: [x2 - nx, y2 - ny], color: c },
            SolidVertex { pos: [x1 + nx, y1 + ny], color: c },
            SolidVertex { pos: [x2 - nx, y2 - ny], color: c },
            SolidVertex { pos: [x1 - nx, y1 - ny], color: c },
        ];
        self.draw_solid(&verts);
    }

    fn blit(&mut self, src: &Rc<dyn Surface>, src_rect: Rect, dst: Coord) {
        let Some(src) = Self::downcast_src(src) else {
            return;
        };
        let src_rect = src_rect.intersection(Rect::from_size(src.pixel_size()));
        if src_rect.is_empty() {
            return;
        }
        let dst = self.core.to_canvas(dst);
        let tw = src.pixel_size().w as f32;
        let th = src.pixel_size().h as f32;

        let mut verts = Vec::with_capacity(6);
        Self::tex_quad(
            &mut verts,
            dst.x as f32,
            dst.y as f32,
            (dst.x + src_rect.w) as f32,
            (dst.y + src_rect.h) as f32,
            src_rect.x as f32 / tw,
            src_rect.y as f32 / th,
            src_rect.right() as f32 / tw,
            src_rect.bottom() as f32 / th,
        );
        self.draw_textured(&src, &verts);
    }

    fn tile_blit(&mut self, src: &Rc<dyn Surface>, src_rect: Rect, dst_rect: Rect) {
        let Some(src_gpu) = Self::downcast_src(src) else {
            return;
        };
        if src_rect.is_empty() || dst_rect.is_empty() {
            return;
        }
        let tw = src_gpu.pixel_size().w as f32;
        let th = src_gpu.pixel_size().h as f32;

        // All tiles sample the same texture, so they batch into one draw.
        let mut verts = Vec::new();
        let mut y = dst_rect.y;
        while y < dst_rect.bottom() {
            let h = src_rect.h.min(dst_rect.bottom() - y);
            let mut x = dst_rect.x;
            while x < dst_rect.right() {
                let w = src_rect.w.min(dst_rect.right() - x);
                let d = self.core.to_canvas(Coord::new(x, y));
                Self::tex_quad(
                    &mut verts,
                    d.x as f32,
                    d.y as f32,
                    (d.x + w) as f32,
                    (d.y + h) as f32,
                    src_rect.x as f32 / tw,
                    src_rect.y as f32 / th,
                    (src_rect.x + w) as f32 / tw,
                    (src_rect.y + h) as f32 / th,
                );
                x += src_rect.w;
            }
            y += src_rect.h;
        }
        self.draw_textured(&src_gpu, &verts);
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
        let Some(src) = Self::downcast_src(src) else {
            return;
        };
        if dw <= 0.0 || dh <= 0.0 || sw == 0.0 || sh == 0.0 {
            return;
        }
        let ofs = self.core.viewport_offset();
        let (dx, dy) = (dx + ofs.x as f32, dy + ofs.y as f32);

        let tw = src.pixel_size().w as f32;
        let th = src.pixel_size().h as f32;

        // The sampler measures texel centers at half-integer coordinates
        // while the software kernel samples at integers; this bias makes
        // the two backends take their taps at the same source positions
        // for every scale, including the exact identity case.
        let bias_x = 0.5 * (1.0 - sw.abs() / dw);
        let bias_y = 0.5 * (1.0 - sh.abs() / dh);

        // Inversion swaps the texture-coordinate endpoints.
        let (u0, u1) = if sw < 0.0 {
            ((sx - sw + bias_x) / tw, (sx + bias_x) / tw)
        } else {
            ((sx + bias_x) / tw, (sx + sw + bias_x) / tw)
        };
        let (v0, v1) = if sh < 0.0 {
            ((sy - sh + bias_y) / th, (sy + bias_y) / th)
        } else {
            ((sy + bias_y) / th, (sy + sh + bias_y) / th)
        };

        let mut verts = Vec::with_capacity(6);
        Self::tex_quad(&mut verts, dx, dy, dx + dw, dy + dh, u0, v0, u1, v1);
        self.draw_textured(&src, &verts);
    }
}

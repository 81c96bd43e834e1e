// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pipelines and shaders for the GPU device.
//!
//! One shader module carries both entry-point pairs: solid-color quads
//! (fills, plotted pixels, lines) and textured quads (blits). Pixel
//! coordinates are mapped to clip space against the canvas size uniform.
//! Pipelines are built per canvas texture format and per blend mode.

use bytemuck::{Pod, Zeroable};

use grebe_gfx::BlendMode;

pub(crate) const SHADER: &str = r#"
struct Globals {
    size: vec2<f32>,
    _pad: vec2<f32>,
}

@group(0) @binding(0) var<uniform> globals: Globals;

fn to_ndc(p: vec2<f32>) -> vec4<f32> {
    let x = p.x / globals.size.x * 2.0 - 1.0;
    let y = 1.0 - p.y / globals.size.y * 2.0;
    return vec4<f32>(x, y, 0.0, 1.0);
}

struct SolidInput {
    @location(0) pos: vec2<f32>,
    @location(1) color: vec4<f32>,
}

struct SolidVarying {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_solid(input: SolidInput) -> SolidVarying {
    var out: SolidVarying;
    out.pos = to_ndc(input.pos);
    out.color = input.color;
    return out;
}

@fragment
fn fs_solid(input: SolidVarying) -> @location(0) vec4<f32> {
    return input.color;
}

struct TexInput {
    @location(0) pos: vec2<f32>,
    @location(1) uv: vec2<f32>,
}

struct TexVarying {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@group(1) @binding(0) var src_texture: texture_2d<f32>;
@group(1) @binding(1) var src_sampler: sampler;
@group(1) @binding(2) var<uniform> blit: BlitParams;

struct BlitParams {
    tint: vec4<f32>,
}

@vertex
fn vs_tex(input: TexInput) -> TexVarying {
    var out: TexVarying;
    out.pos = to_ndc(input.pos);
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_tex(input: TexVarying) -> @location(0) vec4<f32> {
    return textureSample(src_texture, src_sampler, input.uv) * blit.tint;
}
"#;

/// Canvas size uniform.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct Globals {
    pub size: [f32; 2],
    pub _pad: [f32; 2],
}

/// Per-blit uniform.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct BlitParams {
    pub tint: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct SolidVertex {
    pub pos: [f32; 2],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct TexVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

/// The blend modes the fixed-function hardware pipeline can express.
pub(crate) const GPU_BLEND_MODES: [BlendMode; 3] =
    [BlendMode::Opaque, BlendMode::Blend, BlendMode::Add];

pub(crate) fn blend_index(mode: BlendMode) -> usize {
    match mode {
        BlendMode::Opaque => 0,
        BlendMode::Blend => 1,
        BlendMode::Add => 2,
        // Rejected by set_blend_mode; fall back to source-over.
        BlendMode::Multiply | BlendMode::Invert => 1,
    }
}

fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    match mode {
        BlendMode::Opaque => wgpu::BlendState::REPLACE,
        BlendMode::Add => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        },
        _ => wgpu::BlendState::ALPHA_BLENDING,
    }
}

/// The pipeline set for one canvas texture format.
pub(crate) struct Pipelines {
    pub format: wgpu::TextureFormat,
    pub solid: Vec<wgpu::RenderPipeline>,
    pub textured: Vec<wgpu::RenderPipeline>,
}

pub(crate) struct PipelineLayouts {
    pub globals: wgpu::BindGroupLayout,
    pub texture: wgpu::BindGroupLayout,
}

pub(crate) fn create_layouts(device: &wgpu::Device) -> PipelineLayouts {
    let globals = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("grebe globals"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("grebe blit source"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    });

    PipelineLayouts { globals, texture }
}

pub(crate) fn create_pipelines(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    format: wgpu::TextureFormat,
) -> Pipelines {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("grebe shaders"),
        source: wgpu::ShaderSource::Wgsl(SHADER.into()),
    });

    let solid_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[&layouts.globals],
        push_constant_ranges: &[],
    });
    let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[&layouts.globals, &layouts.texture],
        push_constant_ranges: &[],
    });

    let solid_attrs = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];
    let tex_attrs = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    let mut solid = Vec::new();
    let mut textured = Vec::new();
    for mode in GPU_BLEND_MODES {
        let target = [Some(wgpu::ColorTargetState {
            format,
            blend: Some(blend_state(mode)),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        solid.push(
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("grebe solid"),
                layout: Some(&solid_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_solid"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<SolidVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &solid_attrs,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_solid"),
                    targets: &target,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            }),
        );

        textured.push(
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("grebe textured"),
                layout: Some(&textured_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_tex"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<TexVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &tex_attrs,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_tex"),
                    targets: &target,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            }),
        );
    }

    Pipelines {
        format,
        solid,
        textured,
    }
}

// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared contracts and leaf types for the Grebe rendering backends.
//!
//! This crate should not be used on its own; it is the foundation the
//! concrete backends build on:
//!
//! - [`grebe_soft`](https://crates.io/crates/grebe_soft) rasterizes on the CPU.
//! - [`grebe_gpu`](https://crates.io/crates/grebe_gpu) renders through `wgpu`.
//!
//! # Contents
//!
//! - Integer/float geometry and the point-to-pixel scale ([`geom`])
//! - The backend-independent 32-bit ARGB [`Color`](color::Color)
//! - The pixel format table ([`pixel_format`])
//! - The [`Surface`](surface::Surface) / [`SurfaceFactory`](surface::SurfaceFactory)
//!   and [`GfxDevice`](device::GfxDevice) contracts widgets draw through
//! - The per-pass scoped frame allocator ([`MemStack`](mem_stack::MemStack))
//!
//! Exactly one backend's `{device, surface, factory}` triad may be used
//! together per canvas; the traits here are the only boundary widgets see.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
#![forbid(unsafe_code)]

pub mod color;
pub mod device;
pub mod error;
pub mod geom;
pub mod mem_stack;
pub mod pixel_format;
pub mod surface;

pub use color::Color;
pub use device::{BlendMode, DeviceCore, GfxDevice};
pub use error::GfxError;
pub use geom::{Border, Coord, Rect, RectF, Size, SCALE_BASE};
pub use mem_stack::{FrameScope, MemSlot, MemStack};
pub use pixel_format::{PixelFormat, PixelType};
pub use surface::{PixelsMut, PixelsRef, SharedPixels, Surface, SurfaceFactory};

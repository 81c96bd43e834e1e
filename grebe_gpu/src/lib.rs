// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The GPU backend for Grebe, on top of [`wgpu`].
//!
//! Surfaces own a hardware texture next to a CPU-side staging buffer; the
//! buffer serves the lock-based pixel access protocol and is re-uploaded
//! to the texture when it is dirty. Blits are textured quads, fills and
//! lines are solid quads, and clipping is a hardware scissor rectangle.
//!
//! The platform layer bootstraps the GPU context: both
//! [`GpuSurfaceFactory`] and [`GpuGfxDevice`] are constructed from an
//! already-initialized [`wgpu::Device`] / [`wgpu::Queue`] pair. All
//! operations run synchronously on the thread owning that queue.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]

mod device;
mod shaders;
mod surface;

pub use device::GpuGfxDevice;
pub use surface::{GpuSurface, GpuSurfaceFactory};

// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The CPU rasterizer backend for Grebe.
//!
//! Surfaces are plain pixel buffers in memory and every operation is scan
//! converted and blended on the CPU. This backend carries the pixel-exact
//! algorithms of the rendering core: the 15-bit fixed-point bilinear
//! stretch blit and the incremental anti-aliased line rasterizer.
//!
//! Use [`SoftSurfaceFactory`] to create surfaces and bind them to a
//! [`SoftGfxDevice`]. Surfaces from other backends are rejected.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
#![forbid(unsafe_code)]

mod device;
mod line;
mod stretch;
mod surface;

pub use device::SoftGfxDevice;
pub use line::LineRasterizer;
pub use surface::{SoftSurface, SoftSurfaceFactory};

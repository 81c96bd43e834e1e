// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for the Grebe integration tests.

use grebe_gfx::{Color, Coord, Size, Surface};
use grebe_soft::SoftSurface;

/// Read every pixel of a software surface, row-major.
pub fn snapshot(surface: &SoftSurface) -> Vec<Color> {
    let Size { w, h } = surface.pixel_size();
    (0..h)
        .flat_map(|y| (0..w).map(move |x| Coord::new(x, y)))
        .map(|c| surface.pixel_at(c).unwrap())
        .collect()
}

/// Fill a surface with a deterministic per-pixel pattern.
pub fn checker(surface: &SoftSurface) {
    let Size { w, h } = surface.pixel_size();
    for y in 0..h {
        for x in 0..w {
            surface.set_pixel_at(
                Coord::new(x, y),
                Color::new(
                    (x * 31 % 256) as u8,
                    (y * 57 % 256) as u8,
                    ((x + y) * 11 % 256) as u8,
                    255,
                ),
            );
        }
    }
}

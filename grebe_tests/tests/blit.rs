// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blit semantics on the software backend: identity, inversion, scaling,
//! sub-pixel offsets and tiling.

use std::rc::Rc;

use grebe_gfx::{BlendMode, Color, Coord, GfxDevice, PixelType, Rect, Size, Surface};
use grebe_soft::{SoftGfxDevice, SoftSurface};
use grebe_tests::checker;

fn bound_device(w: i32, h: i32) -> (SoftGfxDevice, Rc<SoftSurface>) {
    let surface = SoftSurface::new(Size::new(w, h), PixelType::Bgra8).unwrap();
    let mut device = SoftGfxDevice::new();
    assert!(device.set_canvas(surface.clone()));
    device.set_blend_mode(BlendMode::Opaque);
    (device, surface)
}

fn checker_source(w: i32, h: i32) -> Rc<dyn Surface> {
    let surface = SoftSurface::new(Size::new(w, h), PixelType::Bgra8).unwrap();
    checker(&surface);
    surface
}

#[test]
fn identity_stretch_blit_is_an_exact_copy() {
    let (mut device, canvas) = bound_device(16, 16);
    let src = checker_source(8, 8);

    device.stretch_blit_sub_pixel_with_invert(&src, 0.0, 0.0, 8.0, 8.0, 4.0, 4.0, 8.0, 8.0);

    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(
                canvas.pixel_at(Coord::new(4 + x, 4 + y)),
                src.pixel_at(Coord::new(x, y)),
                "({x},{y})"
            );
        }
    }
    // Pixels outside the destination rect are untouched.
    assert_eq!(canvas.pixel_at(Coord::new(3, 3)), Some(Color::TRANSPARENT));
    assert_eq!(canvas.pixel_at(Coord::new(12, 12)), Some(Color::TRANSPARENT));
}

#[test]
fn negative_extent_mirrors_the_axis() {
    let (mut device, canvas) = bound_device(8, 8);
    let src = checker_source(8, 8);

    // Horizontal mirror: negative source width.
    device.stretch_blit_sub_pixel_with_invert(&src, 0.0, 0.0, -8.0, 8.0, 0.0, 0.0, 8.0, 8.0);
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(
                canvas.pixel_at(Coord::new(x, y)),
                src.pixel_at(Coord::new(7 - x, y)),
                "h-mirror ({x},{y})"
            );
        }
    }

    // Vertical mirror: negative source height.
    device.stretch_blit_sub_pixel_with_invert(&src, 0.0, 0.0, 8.0, -8.0, 0.0, 0.0, 8.0, 8.0);
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(
                canvas.pixel_at(Coord::new(x, y)),
                src.pixel_at(Coord::new(x, 7 - y)),
                "v-mirror ({x},{y})"
            );
        }
    }
}

#[test]
fn double_mirror_composes_with_scaling() {
    let (mut device, canvas) = bound_device(8, 8);
    let src = checker_source(8, 8);

    // Mirror both axes while upscaling the top-left quadrant 2x. With the
    // mirrored traversal the odd destination grid lands exactly on source
    // pixel centers.
    device.stretch_blit_sub_pixel_with_invert(&src, 0.0, 0.0, -4.0, -4.0, 0.0, 0.0, 8.0, 8.0);
    assert_eq!(
        canvas.pixel_at(Coord::new(1, 1)),
        src.pixel_at(Coord::new(3, 3))
    );
    assert_eq!(
        canvas.pixel_at(Coord::new(7, 7)),
        src.pixel_at(Coord::new(0, 0))
    );
}

#[test]
fn upscale_blends_within_interpolation_bounds() {
    let (mut device, canvas) = bound_device(100, 100);

    // Smooth gradient so the interpolation error bound is tight.
    let src = SoftSurface::new(Size::new(50, 50), PixelType::Bgra8).unwrap();
    for y in 0..50 {
        for x in 0..50 {
            src.set_pixel_at(
                Coord::new(x, y),
                Color::new((x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255),
            );
        }
    }
    let src_dyn: Rc<dyn Surface> = src.clone();

    device.stretch_blit_sub_pixel_with_invert(
        &src_dyn, 0.0, 0.0, 50.0, 50.0, 0.0, 0.0, 100.0, 100.0,
    );

    let bound = 4_i32;
    for y in 0..49 {
        for x in 0..49 {
            let expected = src.pixel_at(Coord::new(x, y)).unwrap();
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let got = canvas
                    .pixel_at(Coord::new(x * 2 + dx, y * 2 + dy))
                    .unwrap();
                assert!(
                    (got.r as i32 - expected.r as i32).abs() <= bound
                        && (got.g as i32 - expected.g as i32).abs() <= bound
                        && (got.b as i32 - expected.b as i32).abs() <= bound,
                    "({x},{y})+({dx},{dy}): {got:?} vs {expected:?}"
                );
            }
        }
    }
}

#[test]
fn sub_pixel_offset_interpolates_neighbors() {
    let (mut device, canvas) = bound_device(8, 1);
    let src = SoftSurface::new(Size::new(8, 1), PixelType::Bgra8).unwrap();
    src.set_pixel_at(Coord::new(2, 0), Color::new(100, 0, 0, 255));
    src.set_pixel_at(Coord::new(3, 0), Color::new(200, 0, 0, 255));
    let src_dyn: Rc<dyn Surface> = src;

    // A half-pixel source offset averages each pair of neighbors.
    device.stretch_blit_sub_pixel_with_invert(&src_dyn, 0.5, 0.0, 8.0, 1.0, 0.0, 0.0, 8.0, 1.0);
    let got = canvas.pixel_at(Coord::new(2, 0)).unwrap();
    assert_eq!(got.r, 150);
}

#[test]
fn blit_respects_the_clip_stack() {
    let (mut device, canvas) = bound_device(16, 16);
    let src = checker_source(8, 8);

    device.push_clip(Rect::new(0, 0, 6, 6));
    device.blit(&src, Rect::new(0, 0, 8, 8), Coord::new(4, 4));

    assert_eq!(
        canvas.pixel_at(Coord::new(5, 5)),
        src.pixel_at(Coord::new(1, 1))
    );
    // Clipped-away destination pixels stay untouched.
    assert_eq!(canvas.pixel_at(Coord::new(6, 6)), Some(Color::TRANSPARENT));
}

#[test]
fn clipped_stretch_blit_keeps_sampling_aligned() {
    let (mut device, canvas) = bound_device(16, 16);
    let src = checker_source(8, 8);

    // The same identity blit, clipped: surviving pixels must be identical
    // to the unclipped result.
    device.push_clip(Rect::new(6, 6, 4, 4));
    device.stretch_blit_sub_pixel_with_invert(&src, 0.0, 0.0, 8.0, 8.0, 4.0, 4.0, 8.0, 8.0);

    for y in 6..10 {
        for x in 6..10 {
            assert_eq!(
                canvas.pixel_at(Coord::new(x, y)),
                src.pixel_at(Coord::new(x - 4, y - 4)),
                "({x},{y})"
            );
        }
    }
    assert_eq!(canvas.pixel_at(Coord::new(5, 5)), Some(Color::TRANSPARENT));
}

#[test]
fn tile_blit_repeats_the_source() {
    let (mut device, canvas) = bound_device(9, 9);
    let src = checker_source(4, 4);

    device.tile_blit(&src, Rect::new(0, 0, 4, 4), Rect::new(0, 0, 9, 9));

    for y in 0..9 {
        for x in 0..9 {
            assert_eq!(
                canvas.pixel_at(Coord::new(x, y)),
                src.pixel_at(Coord::new(x % 4, y % 4)),
                "({x},{y})"
            );
        }
    }
}

#[test]
fn blend_blit_composites_over_canvas() {
    let (mut device, canvas) = bound_device(4, 4);
    canvas.fill(Color::new(0, 0, 0, 255));

    let src = SoftSurface::new(Size::new(4, 4), PixelType::Bgra8).unwrap();
    src.fill(Color::new(255, 255, 255, 128));
    let src_dyn: Rc<dyn Surface> = src;

    device.set_blend_mode(BlendMode::Blend);
    device.blit(&src_dyn, Rect::new(0, 0, 4, 4), Coord::ZERO);

    let got = canvas.pixel_at(Coord::new(1, 1)).unwrap();
    // Half-transparent white over black is mid grey.
    assert!((got.r as i32 - 128).abs() <= 1, "{got:?}");
    assert_eq!(got.a, 255);
}

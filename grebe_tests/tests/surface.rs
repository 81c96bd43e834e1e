// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface creation and pixel access through the factory contract.

use std::cell::RefCell;
use std::rc::Rc;

use grebe_gfx::{
    Color, Coord, GfxError, PixelType, Rect, SharedPixels, Size, Surface, SurfaceFactory,
};
use grebe_soft::{SoftSurface, SoftSurfaceFactory};

#[test]
fn creation_is_gated_by_max_size() {
    let factory = SoftSurfaceFactory::new();
    let max = factory.max_size();

    assert!(factory
        .create_surface(Size::new(64, 64), PixelType::Bgra8)
        .is_ok());
    assert!(matches!(
        factory.create_surface(Size::new(max.w + 1, 64), PixelType::Bgra8),
        Err(GfxError::InvalidSize { .. })
    ));
    assert!(matches!(
        factory.create_surface(Size::new(64, max.h + 1), PixelType::Bgra8),
        Err(GfxError::InvalidSize { .. })
    ));
}

#[test]
fn color_round_trip_per_format() {
    let factory = SoftSurfaceFactory::new();
    let color = Color::new(201, 102, 53, 204);

    for ty in [PixelType::Bgra8, PixelType::Rgba8] {
        let surface = factory.create_surface(Size::new(4, 4), ty).unwrap();
        surface.set_pixel_at(Coord::new(1, 1), color);
        assert_eq!(surface.pixel_at(Coord::new(1, 1)), Some(color), "{ty:?}");
        assert_eq!(surface.alpha_at(Coord::new(1, 1)), 204);
    }

    // 8 bits per channel are stored losslessly; the alpha-less format
    // drops alpha and reads back opaque.
    let surface = factory
        .create_surface(Size::new(4, 4), PixelType::Bgr8)
        .unwrap();
    surface.set_pixel_at(Coord::new(1, 1), color);
    assert_eq!(
        surface.pixel_at(Coord::new(1, 1)),
        Some(color.with_alpha(255))
    );
    assert!(surface.is_opaque());
}

#[test]
fn imported_buffer_is_shared_not_copied() {
    let factory = SoftSurfaceFactory::new();
    let pitch = 8 * 4;
    let pixels: SharedPixels = Rc::new(RefCell::new(vec![0_u8; pitch * 8]));

    let surface = factory
        .create_surface_from(Size::new(8, 8), PixelType::Bgra8, pixels.clone(), pitch)
        .unwrap();

    // Writes through the surface land in the caller's buffer.
    surface.set_pixel_at(Coord::new(0, 0), Color::new(3, 2, 1, 9));
    assert_eq!(&pixels.borrow()[0..4], &[1, 2, 3, 9]);

    // Writes to the buffer are visible through the surface.
    pixels.borrow_mut()[4..8].copy_from_slice(&[10, 20, 30, 40]);
    assert_eq!(
        surface.pixel_at(Coord::new(1, 0)),
        Some(Color::new(30, 20, 10, 40))
    );

    // The surface is a referrer, not an owner.
    drop(surface);
    assert_eq!(Rc::strong_count(&pixels), 1);
}

#[test]
fn imported_buffer_must_match_declared_format() {
    let factory = SoftSurfaceFactory::new();
    let pixels: SharedPixels = Rc::new(RefCell::new(vec![0_u8; 100]));
    assert!(matches!(
        factory.create_surface_from(Size::new(8, 8), PixelType::Bgra8, pixels.clone(), 8 * 4),
        Err(GfxError::FormatMismatch(_))
    ));
    assert!(matches!(
        factory.create_surface_from(Size::new(8, 8), PixelType::Bgra8, pixels, 2),
        Err(GfxError::FormatMismatch(_))
    ));
}

#[test]
fn copy_from_converts_formats_losslessly() {
    let bgra = SoftSurface::new(Size::new(8, 8), PixelType::Bgra8).unwrap();
    let rgba = SoftSurface::new(Size::new(8, 8), PixelType::Rgba8).unwrap();
    grebe_tests::checker(&bgra);

    assert!(rgba.copy_from(&bgra, Rect::new(0, 0, 8, 8), Coord::ZERO));
    assert_eq!(grebe_tests::snapshot(&rgba), grebe_tests::snapshot(&bgra));
}

#[test]
fn surface_fill_covers_only_the_rect() {
    let surface = SoftSurface::new(Size::new(8, 8), PixelType::Bgra8).unwrap();
    surface.fill_rect(Color::WHITE, Rect::new(2, 2, 3, 3));
    assert_eq!(surface.pixel_at(Coord::new(2, 2)), Some(Color::WHITE));
    assert_eq!(surface.pixel_at(Coord::new(4, 4)), Some(Color::WHITE));
    assert_eq!(surface.pixel_at(Coord::new(5, 5)), Some(Color::TRANSPARENT));
    assert_eq!(surface.pixel_at(Coord::new(1, 2)), Some(Color::TRANSPARENT));
}

// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The sub-pixel stretch blit kernel.
//!
//! Sampling is bilinear in 15-bit fixed point (one tap per destination
//! pixel, four source reads). With equal extents, integer-aligned source
//! origin and no inversion every fraction is zero and the blit degenerates
//! to an exact copy. Taps are clamped to the source's last row/column.

use grebe_gfx::{BlendMode, Color, PixelsMut, PixelsRef, Size};

use crate::device::blend_pixel;

/// Fixed-point scale: 15 binals. Offsets are kept in 64 bits so the
/// largest surfaces cannot overflow the intermediate products.
const FP_ONE: i64 = 1 << 15;

/// One axis of the source traversal, in fixed point.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Axis {
    /// Sampling offset of the first destination pixel.
    pub start: i64,
    /// Per-destination-pixel step; negative when the axis is mirrored.
    pub step: i64,
}

impl Axis {
    /// Map `extent` source pixels (negative = mirrored) starting at `origin`
    /// onto `dest` destination pixels.
    pub fn new(origin: f32, extent: f32, dest: i32) -> Self {
        let magnitude = extent.abs();
        let step = (magnitude as f64 * FP_ONE as f64 / dest as f64) as i64;
        if extent < 0.0 {
            Self {
                start: ((origin + magnitude) as f64 * FP_ONE as f64) as i64 - step,
                step: -step,
            }
        } else {
            Self {
                start: (origin as f64 * FP_ONE as f64) as i64,
                step,
            }
        }
    }
}

/// Blit `dw × dh` destination pixels starting at `(dx, dy)`, sampling the
/// source along the two axes. `dst` and `src` must not share storage.
#[allow(clippy::too_many_arguments)]
pub(crate) fn stretch_blit(
    dst: &mut PixelsMut<'_>,
    src: &PixelsRef<'_>,
    src_size: Size,
    x_axis: Axis,
    y_axis: Axis,
    dx: i32,
    dy: i32,
    dw: i32,
    dh: i32,
    blend: BlendMode,
    tint: Color,
) {
    let src_fmt = src.format();
    let dst_fmt = dst.format();
    let bpp = src_fmt.bytes_per_pixel();

    // Raw byte copy is only valid when nothing has to be converted or
    // blended per pixel.
    let raw_path = src_fmt.ty == dst_fmt.ty && blend == BlendMode::Opaque && tint == Color::WHITE;

    let max_x = src_size.w - 1;
    let max_y = src_size.h - 1;

    let mut ofs_y = y_axis.start;
    for j in 0..dh {
        let y0 = (ofs_y >> 15).clamp(0, max_y as i64) as i32;
        let y1 = (y0 + 1).min(max_y);
        let frac_y2 = (ofs_y & 0x7FFF) as i32;
        let frac_y1 = FP_ONE as i32 - frac_y2;

        let mut ofs_x = x_axis.start;
        for i in 0..dw {
            let x0 = (ofs_x >> 15).clamp(0, max_x as i64) as i32;
            let x1 = (x0 + 1).min(max_x);
            let frac_x2 = (ofs_x & 0x7FFF) as i32;
            let frac_x1 = FP_ONE as i32 - frac_x2;

            let mul11 = (frac_x1 * frac_y1) >> 15;
            let mul12 = (frac_x2 * frac_y1) >> 15;
            let mul21 = (frac_x1 * frac_y2) >> 15;
            let mul22 = (frac_x2 * frac_y2) >> 15;

            let p00 = src.row(y0, x0);
            let p01 = src.row(y0, x1);
            let p10 = src.row(y1, x0);
            let p11 = src.row(y1, x1);

            let mut sample = [0_u8; 4];
            for (c, out) in sample.iter_mut().enumerate().take(bpp) {
                *out = ((p00[c] as i32 * mul11
                    + p01[c] as i32 * mul12
                    + p10[c] as i32 * mul21
                    + p11[c] as i32 * mul22)
                    >> 15) as u8;
            }

            if raw_path {
                dst.row_mut(dy + j, dx + i)[..bpp].copy_from_slice(&sample[..bpp]);
            } else {
                let color = src_fmt
                    .pixel_to_color(src_fmt.read_pixel(&sample))
                    .tint(tint);
                let under = dst.pixel(dx + i, dy + j);
                dst.set_pixel(dx + i, dy + j, blend_pixel(blend, under, color, 255));
            }

            ofs_x += x_axis.step;
        }
        ofs_y += y_axis.step;
    }
}

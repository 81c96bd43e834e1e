// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Anti-aliased line rasterization with incremental erase/redraw.
//!
//! Coverage is produced by a Wu-style accumulation scan: for every
//! scanline (or scancolumn, for steep lines) the two pixels straddling the
//! ideal line receive coverage summing to one, weighted by distance from
//! the line's mathematical center.

use std::collections::HashMap;

use grebe_gfx::{Color, Coord, Rect, Surface};

use crate::surface::SoftSurface;

#[inline]
fn fpart(x: f32) -> f32 {
    x - x.floor()
}

#[inline]
fn rfpart(x: f32) -> f32 {
    1.0 - fpart(x)
}

/// Run the coverage scan for the line `begin → end`, emitting
/// `(x, y, coverage)` for every touched pixel. Pixels may be emitted more
/// than once (the endpoint pixels of short lines); callers accumulate.
pub(crate) fn wu_scan(begin: Coord, end: Coord, mut plot: impl FnMut(i32, i32, f32)) {
    let (mut x1, mut y1) = (begin.x as f32, begin.y as f32);
    let (mut x2, mut y2) = (end.x as f32, end.y as f32);

    let mut dx = x2 - x1;
    let mut dy = y2 - y1;

    let steep = dx.abs() < dy.abs();
    if steep {
        std::mem::swap(&mut x1, &mut y1);
        std::mem::swap(&mut x2, &mut y2);
        std::mem::swap(&mut dx, &mut dy);
    }
    if x2 < x1 {
        std::mem::swap(&mut x1, &mut x2);
        std::mem::swap(&mut y1, &mut y2);
    }

    let gradient = if dx == 0.0 { 0.0 } else { dy / dx };

    let mut emit = |x: i32, y: i32, cov: f32| {
        if cov > 0.0 {
            if steep {
                plot(y, x, cov);
            } else {
                plot(x, y, cov);
            }
        }
    };

    // First endpoint.
    let xend = (x1 + 0.5).floor();
    let yend = y1 + gradient * (xend - x1);
    let xgap = rfpart(x1 + 0.5);
    let xpxl1 = xend as i32;
    let ypxl1 = yend.floor() as i32;
    emit(xpxl1, ypxl1, rfpart(yend) * xgap);
    emit(xpxl1, ypxl1 + 1, fpart(yend) * xgap);
    let mut intery = yend + gradient;

    // Second endpoint.
    let xend = (x2 + 0.5).floor();
    let yend = y2 + gradient * (xend - x2);
    let xgap = fpart(x2 + 0.5);
    let xpxl2 = xend as i32;
    let ypxl2 = yend.floor() as i32;
    emit(xpxl2, ypxl2, rfpart(yend) * xgap);
    emit(xpxl2, ypxl2 + 1, fpart(yend) * xgap);

    for x in (xpxl1 + 1)..xpxl2 {
        emit(x, intery.floor() as i32, rfpart(intery));
        emit(x, intery.floor() as i32 + 1, fpart(intery));
        intery += gradient;
    }
}

/// Accumulate the coverage of one or more scans into a per-pixel map,
/// restricted to `clip` and saturating at full coverage.
pub(crate) fn accumulate(
    map: &mut HashMap<(i32, i32), f32>,
    begin: Coord,
    end: Coord,
    weight: f32,
    clip: Rect,
) {
    wu_scan(begin, end, |x, y, cov| {
        if clip.contains(Coord::new(x, y)) {
            let entry = map.entry((x, y)).or_insert(0.0);
            *entry = (*entry + cov * weight).min(1.0);
        }
    });
}

#[derive(Copy, Clone, Debug)]
struct DrawnPixel {
    x: i32,
    y: i32,
    /// Canvas color before the line was blended over it.
    pre: Color,
}

/// An anti-aliased line that can be moved cheaply.
///
/// The rasterizer retains the pixels of its previous draw together with the
/// canvas colors they replaced (the drawn set). Moving the line erases only
/// the pixels that left the set and blends only the pixels of the new set,
/// instead of re-rendering the whole region. Over any sequence of moves the
/// canvas ends up pixel-identical to drawing the final position once —
/// provided nothing else drew over the affected region in between.
pub struct LineRasterizer {
    drawn: Vec<DrawnPixel>,
    scratch: HashMap<(i32, i32), f32>,
}

impl Default for LineRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineRasterizer {
    pub fn new() -> Self {
        Self {
            drawn: Vec::new(),
            scratch: HashMap::new(),
        }
    }

    /// Erase the previous line (if any) and draw `begin → end` in `color`,
    /// clipped to `clip`.
    ///
    /// A zero-length line draws a single fully covered point. A line
    /// entirely outside `clip` writes no new pixels and leaves the drawn
    /// set empty.
    pub fn draw(
        &mut self,
        surface: &SoftSurface,
        begin: Coord,
        end: Coord,
        color: Color,
        clip: Rect,
    ) {
        let clip = clip.intersection(Rect::from_size(surface.pixel_size()));

        self.scratch.clear();
        accumulate(&mut self.scratch, begin, end, 1.0, clip);

        let mut pixels = surface.lock_mut();

        // Pre-draw colors of the old set, so carried-over pixels blend
        // against what was underneath the old line, not the line itself.
        let old: HashMap<(i32, i32), Color> = self
            .drawn
            .iter()
            .map(|p| ((p.x, p.y), p.pre))
            .collect();

        // (a) Restore pixels that left the set.
        for p in &self.drawn {
            if !self.scratch.contains_key(&(p.x, p.y)) {
                pixels.set_pixel(p.x, p.y, p.pre);
            }
        }

        // (b) Blend the new set against the current canvas content.
        let mut drawn = std::mem::take(&mut self.drawn);
        drawn.clear();
        for (&(x, y), &cov) in &self.scratch {
            let pre = match old.get(&(x, y)) {
                Some(&pre) => pre,
                None => pixels.pixel(x, y),
            };
            let weight = (cov * 255.0 + 0.5) as u8;
            pixels.set_pixel(x, y, pre.blend_over(color, weight));
            drawn.push(DrawnPixel { x, y, pre });
        }
        self.drawn = drawn;
    }

    /// Restore every pixel of the retained line and empty the drawn set.
    pub fn clear(&mut self, surface: &SoftSurface) {
        let mut pixels = surface.lock_mut();
        for p in self.drawn.drain(..) {
            pixels.set_pixel(p.x, p.y, p.pre);
        }
    }

    /// Whether the rasterizer currently retains any pixels.
    pub fn is_empty(&self) -> bool {
        self.drawn.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grebe_gfx::{PixelType, Size, Surface};

    fn canvas() -> std::rc::Rc<SoftSurface> {
        let surf = SoftSurface::new(Size::new(32, 32), PixelType::Bgra8).unwrap();
        surf.fill(Color::new(40, 40, 40, 255));
        surf
    }

    fn snapshot(surface: &SoftSurface) -> Vec<Color> {
        let pixels = surface.lock();
        let Size { w, h } = surface.pixel_size();
        (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .map(|(x, y)| pixels.pixel(x, y))
            .collect()
    }

    #[test]
    fn horizontal_line_covers_fully() {
        let surf = canvas();
        let mut line = LineRasterizer::new();
        line.draw(
            &surf,
            Coord::new(2, 5),
            Coord::new(10, 5),
            Color::WHITE,
            Rect::new(0, 0, 32, 32),
        );
        // Interior pixels of an axis-aligned line have full coverage.
        assert_eq!(surf.pixel_at(Coord::new(6, 5)), Some(Color::WHITE));
        // The rows above and below are untouched.
        assert_eq!(
            surf.pixel_at(Coord::new(6, 4)),
            Some(Color::new(40, 40, 40, 255))
        );
    }

    #[test]
    fn zero_length_line_is_a_point() {
        let surf = canvas();
        let mut line = LineRasterizer::new();
        line.draw(
            &surf,
            Coord::new(7, 7),
            Coord::new(7, 7),
            Color::WHITE,
            Rect::new(0, 0, 32, 32),
        );
        assert_eq!(surf.pixel_at(Coord::new(7, 7)), Some(Color::WHITE));
        assert_eq!(line.drawn.len(), 1);
    }

    #[test]
    fn redraw_equals_single_draw() {
        let clip = Rect::new(0, 0, 32, 32);
        let color = Color::new(200, 50, 50, 255);

        let moved = canvas();
        let mut line = LineRasterizer::new();
        line.draw(&moved, Coord::new(0, 0), Coord::new(10, 0), color, clip);
        line.draw(&moved, Coord::new(0, 0), Coord::new(20, 0), color, clip);
        line.draw(&moved, Coord::new(3, 2), Coord::new(17, 9), color, clip);

        let direct = canvas();
        let mut fresh = LineRasterizer::new();
        fresh.draw(&direct, Coord::new(3, 2), Coord::new(17, 9), color, clip);

        assert_eq!(snapshot(&moved), snapshot(&direct));
    }

    #[test]
    fn line_outside_clip_leaves_set_empty() {
        let surf = canvas();
        let before = snapshot(&surf);
        let mut line = LineRasterizer::new();
        line.draw(
            &surf,
            Coord::new(0, 20),
            Coord::new(10, 20),
            Color::WHITE,
            Rect::new(0, 0, 32, 10),
        );
        assert!(line.is_empty());
        assert_eq!(snapshot(&surf), before);
    }

    #[test]
    fn clear_restores_canvas() {
        let surf = canvas();
        let before = snapshot(&surf);
        let mut line = LineRasterizer::new();
        line.draw(
            &surf,
            Coord::new(1, 1),
            Coord::new(12, 8),
            Color::WHITE,
            Rect::new(0, 0, 32, 32),
        );
        assert_ne!(snapshot(&surf), before);
        line.clear(&surf);
        assert_eq!(snapshot(&surf), before);
    }
}

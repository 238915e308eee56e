// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The framebuffer that finished tiles are painted onto.  Only the
//! coordinator writes to it.

use image::png::PNGEncoder;
use image::ColorType;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::errors::RenderError;
use crate::palette::Rgba;
use crate::tiles::Tile;
use crate::worker::PixelBuffer;

/// An RGBA framebuffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Canvas {
    /// A transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Canvas {
            width,
            height,
            rgba: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The raw row-major RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    /// The pixel at a position.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let offset = self.offset(x, y);
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.rgba[offset..offset + 4]);
        rgba
    }

    /// Change size.  The contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Canvas::new(width, height);
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Copy a tile's pixels into place.  The tile is clipped to the
    /// canvas.  Returns false, and leaves the canvas alone, when the
    /// buffer is not the tile's size or the tile is off the canvas.
    pub fn composite(&mut self, tile: &Tile, buffer: &PixelBuffer) -> bool {
        if buffer.width != tile.width
            || buffer.height != tile.height
            || buffer.data.len() != tile.area() * 4
        {
            return false;
        }
        if tile.is_empty() || tile.start_x >= self.width || tile.start_y >= self.height {
            return false;
        }

        let visible_width = tile.width.min(self.width - tile.start_x) as usize;
        let visible_height = tile.height.min(self.height - tile.start_y);
        let source_stride = tile.width as usize * 4;
        for row in 0..visible_height {
            let source = row as usize * source_stride;
            let target = self.offset(tile.start_x, tile.start_y + row);
            self.rgba[target..target + visible_width * 4]
                .copy_from_slice(&buffer.data[source..source + visible_width * 4]);
        }
        true
    }

    /// Soften the whole canvas with a box blur of the given radius,
    /// horizontally and then vertically.  Used to show that the
    /// current picture is out of date while the next pass comes in.
    pub fn blur(&mut self, radius: u32) {
        if radius == 0 || self.rgba.is_empty() {
            return;
        }
        let mut scratch = vec![0; self.rgba.len()];
        box_blur(&self.rgba, &mut scratch, self.width, self.height, radius, (1, 0));
        box_blur(&scratch, &mut self.rgba, self.width, self.height, radius, (0, 1));
    }

    /// Write the canvas out as a PNG.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), RenderError> {
        let output = BufWriter::new(File::create(path)?);
        PNGEncoder::new(output).encode(&self.rgba, self.width, self.height, ColorType::RGBA(8))?;
        Ok(())
    }
}

fn box_blur(src: &[u8], dst: &mut [u8], width: u32, height: u32, radius: u32, step: (u32, u32)) {
    let (w, h, r) = (i64::from(width), i64::from(height), i64::from(radius));
    let (sx, sy) = (i64::from(step.0), i64::from(step.1));
    for y in 0..h {
        for x in 0..w {
            let mut sum = [0u32; 4];
            let mut count = 0;
            for k in -r..=r {
                let (nx, ny) = (x + k * sx, y + k * sy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let offset = ((ny * w + nx) * 4) as usize;
                for (total, value) in sum.iter_mut().zip(&src[offset..offset + 4]) {
                    *total += u32::from(*value);
                }
                count += 1;
            }
            let offset = ((y * w + x) * 4) as usize;
            for (channel, total) in dst[offset..offset + 4].iter_mut().zip(&sum) {
                *channel = (total / count) as u8;
            }
        }
    }
}

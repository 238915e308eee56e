// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The tile scheduler
//!
//! The canvas is cut into a grid of square tiles; the tiles on the
//! right and bottom edges are clipped to whatever is left of the
//! canvas.  Tiles are handed out in rings, starting from the middle
//! of the grid and working outwards, so the part of the picture the
//! viewer is looking at fills in first.  Inside a ring the order is
//! shuffled, which keeps the fill from looking like a raster scan.

use itertools::iproduct;
use rand::seq::SliceRandom;
use rand::Rng;

/// A rectangle of the canvas, in pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Column of the left edge.
    pub start_x: u32,
    /// Row of the top edge.
    pub start_y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Tile {
    /// The number of pixels covered.
    #[inline]
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// A tile with no pixels in it.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The tile grid laid over a canvas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Edge length of a full tile.
    pub tile_size: u32,
}

impl TileGrid {
    /// Describe the grid for a canvas.
    pub fn new(canvas_width: u32, canvas_height: u32, tile_size: u32) -> Self {
        TileGrid {
            canvas_width,
            canvas_height,
            tile_size,
        }
    }

    /// Tiles across and tiles down.  Zero in both directions when any
    /// dimension is zero.
    pub fn dimensions(&self) -> (u32, u32) {
        if self.tile_size == 0 || self.canvas_width == 0 || self.canvas_height == 0 {
            return (0, 0);
        }
        (
            div_ceil(self.canvas_width, self.tile_size),
            div_ceil(self.canvas_height, self.tile_size),
        )
    }

    /// The tile at a grid position, clipped to the canvas.
    pub fn tile_at(&self, column: u32, row: u32) -> Tile {
        let start_x = column * self.tile_size;
        let start_y = row * self.tile_size;
        Tile {
            start_x,
            start_y,
            width: self.tile_size.min(self.canvas_width - start_x),
            height: self.tile_size.min(self.canvas_height - start_y),
        }
    }

    /// The Chebyshev distance of a grid position from the middle of
    /// the grid.  An axis with an even number of tiles has two middle
    /// tiles, both at distance zero.
    pub fn ring_at(&self, column: u32, row: u32) -> u32 {
        let (columns, rows) = self.dimensions();
        axis_distance(column, columns).max(axis_distance(row, rows))
    }

    /// The ring a tile belongs to.
    pub fn ring_of(&self, tile: &Tile) -> u32 {
        if self.tile_size == 0 {
            return 0;
        }
        self.ring_at(tile.start_x / self.tile_size, tile.start_y / self.tile_size)
    }

    /// The outermost ring of the grid.
    pub fn max_ring(&self) -> u32 {
        let (columns, rows) = self.dimensions();
        if columns == 0 {
            return 0;
        }
        axis_distance(0, columns).max(axis_distance(0, rows))
    }
}

#[inline]
fn div_ceil(n: u32, d: u32) -> u32 {
    n / d + if n % d == 0 { 0 } else { 1 }
}

/// `|t - (n - 1) / 2|`, rounded down, in whole tiles.
#[inline]
fn axis_distance(t: u32, n: u32) -> u32 {
    let doubled = i64::from(2 * t) - (i64::from(n) - 1);
    (doubled.abs() / 2) as u32
}

/// Cut a canvas into tiles, ordered center-outward and shuffled within
/// each ring.
pub fn schedule(canvas_width: u32, canvas_height: u32, tile_size: u32) -> Vec<Tile> {
    schedule_with_rng(canvas_width, canvas_height, tile_size, &mut rand::thread_rng())
}

/// As [`schedule`], drawing the intra-ring order from `rng`.
pub fn schedule_with_rng<R: Rng + ?Sized>(
    canvas_width: u32,
    canvas_height: u32,
    tile_size: u32,
    rng: &mut R,
) -> Vec<Tile> {
    let grid = TileGrid::new(canvas_width, canvas_height, tile_size);
    let (columns, rows) = grid.dimensions();
    let mut rings: Vec<Vec<Tile>> = vec![vec![]; grid.max_ring() as usize + 1];
    for (row, column) in iproduct!(0..rows, 0..columns) {
        rings[grid.ring_at(column, row) as usize].push(grid.tile_at(column, row));
    }

    let mut tiles = Vec::with_capacity((columns * rows) as usize);
    for mut ring in rings {
        ring.shuffle(rng);
        tiles.extend(ring);
    }
    tiles
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A fixed 256-entry gradient built from three sine waves, one per
//! channel, a third of a turn out of phase with each other.  The
//! palette depends only on the index, so two tiles rendered by two
//! different workers always agree at their seam.

use crate::escape::Escape;

/// One RGBA pixel.
pub type Rgba = [u8; 4];

/// The colour used for points that never escape.
pub const INSIDE: Rgba = [0, 0, 0, 255];

/// The number of entries in the gradient.
pub const PALETTE_SIZE: usize = 256;

const FREQUENCY: f64 = 5.0;
const PHASES: [f64; 3] = [0.0, 2.0, 4.0];

/// The sine-wave gradient.
#[derive(Clone, Debug)]
pub struct Palette {
    colours: Vec<Rgba>,
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new()
    }
}

impl Palette {
    /// Build the gradient.
    pub fn new() -> Self {
        let colours = (0..PALETTE_SIZE)
            .map(|i| {
                let phase = i as f64 / 255.0;
                let channel = |offset: f64| {
                    (128.0 + 127.0 * (phase * FREQUENCY + offset).sin()).floor() as u8
                };
                [channel(PHASES[0]), channel(PHASES[1]), channel(PHASES[2]), 255]
            })
            .collect();
        Palette { colours }
    }

    /// The colour at a gradient index.  Indices past the end wrap.
    #[inline]
    pub fn get(&self, index: usize) -> Rgba {
        self.colours[index % PALETTE_SIZE]
    }

    /// The colour of an evaluated point.
    #[inline]
    pub fn colour(&self, escape: &Escape, max_iterations: u32) -> Rgba {
        match escape.colour_index(max_iterations) {
            Some(index) => self.get(index),
            None => INSIDE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::Complex;

    #[test]
    fn palette_is_opaque() {
        let palette = Palette::new();
        for i in 0..PALETTE_SIZE {
            assert_eq!(palette.get(i)[3], 255);
        }
    }

    #[test]
    fn first_entry_matches_phases() {
        // sin(0) = 0, sin(2) ~ 0.909, sin(4) ~ -0.757
        assert_eq!(Palette::new().get(0), [128, 243, 31, 255]);
    }

    #[test]
    fn palettes_agree() {
        let a = Palette::new();
        let b = Palette::default();
        for i in 0..PALETTE_SIZE {
            assert_eq!(a.get(i), b.get(i));
        }
    }

    #[test]
    fn inside_points_are_black() {
        let palette = Palette::new();
        let e = Escape {
            count: 100,
            z: Complex::new(0.1, 0.1),
        };
        assert_eq!(palette.colour(&e, 100), INSIDE);
    }
}

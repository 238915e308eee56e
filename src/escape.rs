// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape-time evaluation
//!
//! A point is iterated under `z = z^2 + c` until its magnitude
//! reaches two or the iteration budget runs out.  The number of
//! iterations taken, together with the final value of `z`, gives a
//! continuous "how far outside the set" measure that the palette
//! turns into a colour.

use num::Complex;
use std::f64::consts::LN_2;

use crate::planes::ComplexPoint;

/// The square of the escape radius.
pub const ESCAPE_RADIUS_SQR: f64 = 4.0;

/// The outcome of iterating a single point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Escape {
    /// The number of iterations performed.  Equal to the iteration
    /// limit when the point never escaped.
    pub count: u32,
    /// The value of `z` when iteration stopped.  Kept even on escape,
    /// since the smooth colouring needs it.
    pub z: ComplexPoint,
}

impl Escape {
    /// Did the point stay bounded for the whole iteration budget?
    #[inline]
    pub fn is_inside(&self, max_iterations: u32) -> bool {
        self.count >= max_iterations
    }

    /// The continuous escape value `count + 1 - log2(ln |z|)`.  Only
    /// meaningful for points that escaped; `None` otherwise.
    pub fn smoothed(&self, max_iterations: u32) -> Option<f64> {
        if self.is_inside(max_iterations) {
            return None;
        }
        let modulus = self.z.norm_sqr().sqrt();
        Some(f64::from(self.count) + 1.0 - modulus.ln().ln() / LN_2)
    }

    /// Map the escape onto one of the 255 gradient slots of the
    /// palette.  Points inside the set have no index; they are
    /// painted with the sentinel colour.
    pub fn colour_index(&self, max_iterations: u32) -> Option<usize> {
        self.smoothed(max_iterations).map(|smoothed| {
            let index = (smoothed / f64::from(max_iterations) * 255.0).floor() as i64;
            index.rem_euclid(255) as usize
        })
    }
}

/// The recurrence being drawn.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Fractal {
    /// `z0 = 0`, `c` is the pixel.
    Mandelbrot,
    /// `z0` is the pixel, `c` is the constant carried here.
    Julia(ComplexPoint),
}

impl Default for Fractal {
    fn default() -> Self {
        Fractal::Mandelbrot
    }
}

impl Fractal {
    /// Iterate the point that a pixel maps to.
    #[inline]
    pub fn evaluate(&self, point: ComplexPoint, max_iterations: u32) -> Escape {
        match *self {
            Fractal::Mandelbrot => escape(point, max_iterations),
            Fractal::Julia(k) => escape_julia(point, k, max_iterations),
        }
    }
}

/// The classic Mandelbrot iteration, started at zero.
#[inline]
pub fn escape(c: ComplexPoint, max_iterations: u32) -> Escape {
    iterate(Complex::new(0.0, 0.0), c, max_iterations)
}

/// The Julia iteration for the constant `k`, started at `z0`.
#[inline]
pub fn escape_julia(z0: ComplexPoint, k: ComplexPoint, max_iterations: u32) -> Escape {
    iterate(z0, k, max_iterations)
}

fn iterate(mut z: ComplexPoint, c: ComplexPoint, max_iterations: u32) -> Escape {
    let mut count = 0;
    while z.norm_sqr() < ESCAPE_RADIUS_SQR && count < max_iterations {
        z = z * z + c;
        count += 1;
    }
    Escape { count, z }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_never_escapes() {
        for limit in &[1, 2, 50, 100, 500] {
            let e = escape(Complex::new(0.0, 0.0), *limit);
            assert_eq!(e.count, *limit);
            assert!(e.is_inside(*limit));
        }
    }

    #[test]
    fn count_never_exceeds_limit() {
        let points = [
            Complex::new(-2.5, 1.0),
            Complex::new(0.25, 0.0),
            Complex::new(-0.75, 0.1),
            Complex::new(0.3, 0.5),
            Complex::new(10.0, -10.0),
        ];
        for c in &points {
            assert!(escape(*c, 64).count <= 64);
        }
    }

    #[test]
    fn far_point_escapes_after_one_step() {
        let e = escape(Complex::new(2.0, 2.0), 100);
        assert_eq!(e.count, 1);
        assert_eq!(e.z, Complex::new(2.0, 2.0));
        assert!(!e.is_inside(100));
    }

    #[test]
    fn main_cardioid_is_inside() {
        let e = escape(Complex::new(-0.5, 0.0), 100);
        assert_eq!(e.count, 100);
        assert_eq!(e.colour_index(100), None);
    }

    #[test]
    fn period_two_bulb_is_inside() {
        assert_eq!(escape(Complex::new(-1.0, 0.0), 300).count, 300);
    }

    #[test]
    fn escaped_points_stay_bounded_until_escape() {
        let c = Complex::new(0.3, 0.6);
        let e = escape(c, 200);
        assert!(e.count < 200);
        assert!(e.z.norm_sqr() >= ESCAPE_RADIUS_SQR);

        // One step fewer and the orbit is still inside the radius.
        let before = escape(c, e.count - 1);
        assert!(before.z.norm_sqr() < ESCAPE_RADIUS_SQR);
    }

    #[test]
    fn colour_index_stays_in_gradient() {
        for i in 0..100 {
            let c = Complex::new(-2.0 + f64::from(i) * 0.04, 0.7);
            if let Some(index) = escape(c, 120).colour_index(120) {
                assert!(index < 255);
            }
        }
    }

    #[test]
    fn smoothed_value_is_continuous_near_count() {
        let e = escape(Complex::new(0.5, 0.5), 100);
        let smoothed = e.smoothed(100).unwrap();
        assert!(smoothed > f64::from(e.count) - 1.0);
        assert!(smoothed < f64::from(e.count) + 2.0);
    }

    #[test]
    fn julia_starts_at_the_pixel() {
        // With k = 0 the Julia set is the unit disc.
        let k = Complex::new(0.0, 0.0);
        assert_eq!(escape_julia(Complex::new(0.5, 0.5), k, 50).count, 50);
        assert!(escape_julia(Complex::new(1.5, 0.0), k, 50).count < 50);
        assert_eq!(escape_julia(Complex::new(3.0, 0.0), k, 50).count, 0);
    }

    #[test]
    fn fractal_dispatches_on_kind() {
        let p = Complex::new(0.1, 0.1);
        assert_eq!(Fractal::Mandelbrot.evaluate(p, 80), escape(p, 80));
        let k = Complex::new(-0.8, 0.156);
        assert_eq!(Fractal::Julia(k).evaluate(p, 80), escape_julia(p, k, 80));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Maps between the integral plane of the canvas, with its origin at
//! the top-left pixel, and the complex plane, described by the point
//! at the middle of the canvas and a per-pixel scale.
//!
//! At a zoom of one the canvas is four units of the complex plane
//! wide, whatever its shape.  The same scale is used vertically, so
//! the picture is only undistorted when pixels are square.
use num::Complex;

/// A point on the complex plane.  The real part is the x-component
/// and the imaginary part the y-component.
pub type ComplexPoint = Complex<f64>;

/// The width of the complex plane visible at a zoom of one.
pub const PLANE_WIDTH: f64 = 4.0;

/// The size of one pixel, in complex-plane units, for a canvas of the
/// given width at the given zoom.
#[inline]
pub fn scale_for(canvas_width: u32, zoom: f64) -> f64 {
    PLANE_WIDTH / (f64::from(canvas_width) * zoom)
}

/// Given the column and row of a pixel, return the complex number
/// that corresponds to it.  The middle of the canvas maps to
/// `center`.
#[inline]
pub fn map_pixel_to_complex(
    px: f64,
    py: f64,
    canvas_width: u32,
    canvas_height: u32,
    center: ComplexPoint,
    scale: f64,
) -> ComplexPoint {
    Complex::new(
        center.re + (px - f64::from(canvas_width) / 2.0) * scale,
        center.im + (py - f64::from(canvas_height) / 2.0) * scale,
    )
}

/// The inverse of [`map_pixel_to_complex`].  The result is not
/// rounded, and may lie off the canvas.
#[inline]
pub fn map_complex_to_pixel(
    point: ComplexPoint,
    canvas_width: u32,
    canvas_height: u32,
    center: ComplexPoint,
    scale: f64,
) -> (f64, f64) {
    (
        (point.re - center.re) / scale + f64::from(canvas_width) / 2.0,
        (point.im - center.im) / scale + f64::from(canvas_height) / 2.0,
    )
}

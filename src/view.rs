// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! What the viewer is looking at, and how pointer input moves it.
//!
//! The [`Navigator`] turns wheel, click and drag events into changes
//! to a [`ViewState`].  It only reports whether the view changed;
//! deciding when to re-render is the coordinator's business.

use num::Complex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::str::FromStr;

use crate::config::RenderConfig;
use crate::escape::Fractal;
use crate::planes::{map_pixel_to_complex, scale_for, ComplexPoint};

/// Zoom multiplier for one wheel notch towards the viewer.
pub const WHEEL_ZOOM_IN: f64 = 1.2;
/// Zoom multiplier for one wheel notch away from the viewer.
pub const WHEEL_ZOOM_OUT: f64 = 0.8;
/// Zoom multiplier for a click.
pub const CLICK_ZOOM: f64 = 2.0;

/// The parameters of one view of the fractal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewState {
    /// The complex point at the middle of the canvas.
    pub center: ComplexPoint,
    /// Magnification; one shows four units of the plane across.
    pub zoom: f64,
    /// Iteration limit per point.
    pub iterations: u32,
    /// Edge length of the blocks that share one sample.
    pub resolution: u32,
    /// The recurrence being drawn.
    pub fractal: Fractal,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            center: Complex::new(-0.5, 0.0),
            zoom: 1.0,
            iterations: 100,
            resolution: 1,
            fractal: Fractal::Mandelbrot,
        }
    }
}

impl ViewState {
    /// Complex-plane units per pixel on a canvas of this width.
    pub fn scale(&self, canvas_width: u32) -> f64 {
        scale_for(canvas_width, self.zoom)
    }

    /// Change the zoom.  Anything that is not a finite positive number
    /// is refused and the view is left alone.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        if !(zoom.is_finite() && zoom > 0.0) || zoom == self.zoom {
            return false;
        }
        self.zoom = zoom;
        true
    }

    /// Change the iteration limit, clamped to the configured range.
    pub fn set_iterations(&mut self, iterations: u32, config: &RenderConfig) -> bool {
        let iterations = config.clamp_iterations(iterations);
        if iterations == self.iterations {
            return false;
        }
        self.iterations = iterations;
        true
    }

    /// Change the block size.  Zero is treated as one.
    pub fn set_resolution(&mut self, resolution: u32) -> bool {
        let resolution = resolution.max(1);
        if resolution == self.resolution {
            return false;
        }
        self.resolution = resolution;
        true
    }

    /// Jump to a preset location of the Mandelbrot set.
    pub fn apply_preset(&mut self, preset: &Preset) -> bool {
        let before = *self;
        self.center = preset.center();
        self.zoom = preset.zoom;
        self.fractal = Fractal::Mandelbrot;
        before != *self
    }

    /// Apply a quality setting.
    pub fn apply_quality(&mut self, quality: Quality, config: &RenderConfig) -> bool {
        let before = *self;
        match quality {
            Quality::Low => {
                self.resolution = 3;
            }
            Quality::Normal => {
                self.resolution = 1;
            }
            Quality::High => {
                self.resolution = 1;
                self.iterations = config.clamp_iterations(self.iterations.max(200));
            }
        }
        before != *self
    }
}

/// Coarse quality settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Quality {
    /// Three-pixel blocks.
    Low,
    /// Every pixel sampled.
    Normal,
    /// Every pixel sampled, at least 200 iterations.
    High,
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Quality::Low),
            "normal" => Ok(Quality::Normal),
            "high" => Ok(Quality::High),
            _ => Err(format!("unknown quality '{}', expected low, normal or high", s)),
        }
    }
}

/// A named location worth looking at.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Preset {
    /// Short lookup key.
    pub key: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Real part of the center.
    pub re: f64,
    /// Imaginary part of the center.
    pub im: f64,
    /// Zoom at which the feature fills the canvas.
    pub zoom: f64,
}

impl Preset {
    /// The center as a complex number.
    pub fn center(&self) -> ComplexPoint {
        Complex::new(self.re, self.im)
    }
}

/// The preset locations, starting with the whole set.
pub const PRESETS: [Preset; 7] = [
    Preset {
        key: "full",
        name: "Full Set",
        re: -0.5,
        im: 0.0,
        zoom: 1.0,
    },
    Preset {
        key: "seahorse",
        name: "Seahorse Valley",
        re: -0.75,
        im: 0.1,
        zoom: 50.0,
    },
    Preset {
        key: "spiral",
        name: "Spiral",
        re: -0.761574,
        im: -0.0847596,
        zoom: 200.0,
    },
    Preset {
        key: "elephant",
        name: "Elephant Valley",
        re: 0.3015,
        im: -0.0200,
        zoom: 25.0,
    },
    Preset {
        key: "minibrots",
        name: "Mini Mandelbrots",
        re: -1.77,
        im: 0.0,
        zoom: 30.0,
    },
    Preset {
        key: "tentacles",
        name: "Tentacles",
        re: 0.28693186889504513,
        im: 0.012787078827452934,
        zoom: 100.0,
    },
    Preset {
        key: "feather",
        name: "Feathery Edge",
        re: -1.543577002,
        im: -0.000058690069,
        zoom: 500.0,
    },
];

/// Look a preset up by key.
pub fn preset(key: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.key == key)
}

/// Pick a preset at random.
pub fn random_preset<R: Rng + ?Sized>(rng: &mut R) -> &'static Preset {
    PRESETS.choose(rng).unwrap_or(&PRESETS[0])
}

/// Pointer input, in canvas pixel coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// A wheel notch; negative `delta_y` zooms in.
    Wheel {
        /// Cursor column.
        x: f64,
        /// Cursor row.
        y: f64,
        /// Wheel movement.
        delta_y: f64,
    },
    /// A click; zooms in on the clicked point.
    Click {
        /// Cursor column.
        x: f64,
        /// Cursor row.
        y: f64,
    },
    /// A button went down; a drag may follow.
    MouseDown {
        /// Cursor column.
        x: f64,
        /// Cursor row.
        y: f64,
    },
    /// The pointer moved.
    MouseMove {
        /// Cursor column.
        x: f64,
        /// Cursor row.
        y: f64,
    },
    /// The button came back up.
    MouseUp,
}

#[derive(Copy, Clone, Debug)]
struct Drag {
    start: (f64, f64),
    center: ComplexPoint,
}

/// Pointer state between events.
#[derive(Clone, Debug, Default)]
pub struct Navigator {
    drag: Option<Drag>,
    // A drag moved the view since the last button press; the click
    // that ends it is not a zoom.
    dragged: bool,
}

impl Navigator {
    /// A navigator with no button held.
    pub fn new() -> Self {
        Navigator::default()
    }

    /// Is a drag in progress?
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Apply one input event to `view` on a canvas of the given size.
    /// Returns true when the view changed.
    pub fn apply(
        &mut self,
        view: &mut ViewState,
        event: InputEvent,
        width: u32,
        height: u32,
    ) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let scale = view.scale(width);
        match event {
            InputEvent::Wheel { x, y, delta_y } => {
                let anchor = map_pixel_to_complex(x, y, width, height, view.center, scale);
                let factor = if delta_y < 0.0 { WHEEL_ZOOM_IN } else { WHEEL_ZOOM_OUT };
                if !view.set_zoom(view.zoom * factor) {
                    return false;
                }
                let scale = view.scale(width);
                view.center = Complex::new(
                    anchor.re - (x - f64::from(width) / 2.0) * scale,
                    anchor.im - (y - f64::from(height) / 2.0) * scale,
                );
                true
            }
            InputEvent::Click { x, y } => {
                if self.dragged {
                    self.dragged = false;
                    return false;
                }
                let target = map_pixel_to_complex(x, y, width, height, view.center, scale);
                if !view.set_zoom(view.zoom * CLICK_ZOOM) {
                    return false;
                }
                view.center = target;
                true
            }
            InputEvent::MouseDown { x, y } => {
                self.drag = Some(Drag {
                    start: (x, y),
                    center: view.center,
                });
                self.dragged = false;
                false
            }
            InputEvent::MouseMove { x, y } => match self.drag {
                Some(drag) => {
                    let (dx, dy) = (x - drag.start.0, y - drag.start.1);
                    let center =
                        Complex::new(drag.center.re - dx * scale, drag.center.im - dy * scale);
                    if center == view.center {
                        return false;
                    }
                    view.center = center;
                    self.dragged = true;
                    true
                }
                None => false,
            },
            InputEvent::MouseUp => {
                self.drag = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn close(a: ComplexPoint, b: ComplexPoint) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn wheel_keeps_the_cursor_point_fixed() {
        let mut view = ViewState::default();
        let mut nav = Navigator::new();
        let before = map_pixel_to_complex(40.0, 200.0, 320, 240, view.center, view.scale(320));
        let zoom_in = InputEvent::Wheel {
            x: 40.0,
            y: 200.0,
            delta_y: -1.0,
        };
        assert!(nav.apply(&mut view, zoom_in, 320, 240));
        assert_eq!(view.zoom, 1.2);
        let after = map_pixel_to_complex(40.0, 200.0, 320, 240, view.center, view.scale(320));
        assert!(close(before, after));

        let zoom_out = InputEvent::Wheel {
            x: 40.0,
            y: 200.0,
            delta_y: 3.0,
        };
        assert!(nav.apply(&mut view, zoom_out, 320, 240));
        assert!((view.zoom - 0.96).abs() < 1e-12);
    }

    #[test]
    fn click_zooms_onto_the_point() {
        let mut view = ViewState::default();
        let mut nav = Navigator::new();
        let target = map_pixel_to_complex(10.0, 20.0, 256, 256, view.center, view.scale(256));
        assert!(nav.apply(&mut view, InputEvent::Click { x: 10.0, y: 20.0 }, 256, 256));
        assert_eq!(view.zoom, 2.0);
        assert_eq!(view.center, target);
    }

    #[test]
    fn drag_pans_against_the_pointer() {
        let mut view = ViewState::default();
        let mut nav = Navigator::new();
        assert!(!nav.apply(&mut view, InputEvent::MouseDown { x: 100.0, y: 100.0 }, 256, 256));
        assert!(nav.is_dragging());
        assert!(nav.apply(&mut view, InputEvent::MouseMove { x: 132.0, y: 84.0 }, 256, 256));
        // 4 / 256 units per pixel.
        assert!(close(view.center, Complex::new(-0.5 - 0.5, 0.25)));
        assert!(!nav.apply(&mut view, InputEvent::MouseUp, 256, 256));
        assert!(!nav.is_dragging());
    }

    #[test]
    fn moving_without_a_button_does_nothing() {
        let mut view = ViewState::default();
        let mut nav = Navigator::new();
        assert!(!nav.apply(&mut view, InputEvent::MouseMove { x: 5.0, y: 5.0 }, 256, 256));
        assert_eq!(view, ViewState::default());
    }

    #[test]
    fn click_after_a_drag_is_ignored() {
        let mut view = ViewState::default();
        let mut nav = Navigator::new();
        nav.apply(&mut view, InputEvent::MouseDown { x: 0.0, y: 0.0 }, 256, 256);
        nav.apply(&mut view, InputEvent::MouseMove { x: 10.0, y: 0.0 }, 256, 256);
        nav.apply(&mut view, InputEvent::MouseUp, 256, 256);
        let panned = view;
        assert!(!nav.apply(&mut view, InputEvent::Click { x: 10.0, y: 0.0 }, 256, 256));
        assert_eq!(view, panned);

        // A press and release without movement is an ordinary click.
        nav.apply(&mut view, InputEvent::MouseDown { x: 3.0, y: 3.0 }, 256, 256);
        nav.apply(&mut view, InputEvent::MouseUp, 256, 256);
        assert!(nav.apply(&mut view, InputEvent::Click { x: 3.0, y: 3.0 }, 256, 256));
    }

    #[test]
    fn zero_sized_canvas_ignores_input() {
        let mut view = ViewState::default();
        let mut nav = Navigator::new();
        assert!(!nav.apply(&mut view, InputEvent::Click { x: 0.0, y: 0.0 }, 0, 0));
    }

    #[test]
    fn zoom_must_stay_positive() {
        let mut view = ViewState::default();
        assert!(!view.set_zoom(0.0));
        assert!(!view.set_zoom(-3.0));
        assert!(!view.set_zoom(std::f64::NAN));
        assert!(!view.set_zoom(std::f64::INFINITY));
        assert_eq!(view.zoom, 1.0);
        assert!(view.set_zoom(4.0));
    }

    #[test]
    fn iterations_respect_the_configured_range() {
        let config = RenderConfig::default();
        let mut view = ViewState::default();
        assert!(view.set_iterations(1000, &config));
        assert_eq!(view.iterations, 500);
        assert!(view.set_iterations(1, &config));
        assert_eq!(view.iterations, 50);
    }

    #[test]
    fn presets_are_found_by_key() {
        let spiral = preset("spiral").unwrap();
        assert_eq!(spiral.name, "Spiral");
        assert!(preset("nowhere").is_none());

        let mut view = ViewState::default();
        assert!(view.apply_preset(spiral));
        assert_eq!(view.zoom, 200.0);
        assert!(!view.apply_preset(spiral));
    }

    #[test]
    fn random_preset_is_one_of_the_table() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let p = random_preset(&mut rng);
            assert!(PRESETS.iter().any(|q| q.key == p.key));
        }
    }

    #[test]
    fn quality_settings() {
        let config = RenderConfig::default();
        let mut view = ViewState::default();
        assert!(view.apply_quality(Quality::Low, &config));
        assert_eq!(view.resolution, 3);
        assert!(view.apply_quality(Quality::High, &config));
        assert_eq!((view.resolution, view.iterations), (1, 200));
        assert!(!view.apply_quality(Quality::Normal, &config));
        assert_eq!("high".parse::<Quality>(), Ok(Quality::High));
        assert!("ultra".parse::<Quality>().is_err());
    }
}

#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Progressive tiled fractal renderer
//!
//! The Mandelbrot set is the set of points `c` on the complex plane
//! for which the orbit of `z = z^2 + c`, started at zero, never
//! leaves the disc of radius two.  Rendering it is embarrassingly
//! parallel but slow at depth, so this crate renders it
//! *progressively*: the canvas is cut into tiles, the tiles are
//! handed to a background worker in rings spreading out from the
//! middle of the screen, and each finished tile is painted onto the
//! canvas as soon as it comes back.
//!
//! Every time the view changes (a zoom, a drag, a resize) the
//! current render is abandoned.  Abandoned tiles may still be in
//! flight; each carries the number of the pass that asked for it, and
//! the [`Coordinator`] throws away anything that belongs to a pass
//! other than the current one.
//!
//! The same machinery renders Julia sets; see [`Fractal`].

pub mod canvas;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod escape;
pub mod palette;
pub mod planes;
pub mod tiles;
pub mod view;
pub mod worker;

pub use crate::canvas::Canvas;
pub use crate::config::RenderConfig;
pub use crate::coordinator::{Coordinator, PassSummary, RenderState};
pub use crate::errors::RenderError;
pub use crate::escape::{Escape, Fractal};
pub use crate::palette::Palette;
pub use crate::planes::ComplexPoint;
pub use crate::tiles::{schedule, Tile};
pub use crate::view::{InputEvent, Navigator, Quality, ViewState};
pub use crate::worker::{PixelBuffer, RenderWorker, TileJob, WorkerEvent};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The render worker
//!
//! A worker thread takes one [`TileJob`] at a time off a channel,
//! evaluates every block of the tile, and sends the finished
//! [`PixelBuffer`] back on a second channel.  The buffer is moved,
//! never copied, and the worker keeps nothing from one tile to the
//! next but its palette.
//!
//! A panic while rendering a tile is caught at the thread boundary
//! and reported as a [`WorkerEvent::Failed`]; the thread carries on
//! with the next job.

use crossbeam::channel::{Receiver, Sender};
use log::{debug, trace};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::errors::RenderError;
use crate::palette::{Palette, Rgba};
use crate::planes::map_pixel_to_complex;
use crate::tiles::Tile;
use crate::view::ViewState;

/// Identifies a render pass.  Later passes have larger ids.
pub type PassId = u64;

/// One tile's worth of work, bound to the view it was scheduled for.
#[derive(Clone, Debug, PartialEq)]
pub struct TileJob {
    /// The pass that asked for this tile.
    pub pass: PassId,
    /// Position of the tile in the pass's schedule.
    pub index: usize,
    /// Number of tiles in the pass.
    pub total: usize,
    /// The region of the canvas to render.
    pub tile: Tile,
    /// A snapshot of the view when the pass started.
    pub view: ViewState,
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Complex-plane units per pixel.
    pub scale: f64,
}

impl TileJob {
    /// The fraction of the pass complete once this job is done, when
    /// jobs complete in schedule order.  An empty tile does not move
    /// the pass forward.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let done = if self.tile.is_empty() {
            self.index
        } else {
            self.index + 1
        };
        done as f64 / self.total as f64
    }
}

/// Row-major RGBA pixels for one tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// A transparent buffer of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        PixelBuffer {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// A buffer with no pixels.
    pub fn empty() -> Self {
        PixelBuffer::default()
    }

    /// Is the buffer without pixels?
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The pixel at a position inside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.data[offset..offset + 4]);
        rgba
    }

    /// Paint a rectangle, clipped to the buffer.
    pub fn fill(&mut self, x: u32, y: u32, width: u32, height: u32, colour: Rgba) {
        let right = (x + width).min(self.width);
        let bottom = (y + height).min(self.height);
        for row in y..bottom {
            let start = (row as usize * self.width as usize + x as usize) * 4;
            let end = (row as usize * self.width as usize + right as usize) * 4;
            for pixel in self.data[start..end].chunks_mut(4) {
                pixel.copy_from_slice(&colour);
            }
        }
    }
}

/// Evaluate one tile.  The escape-time evaluator runs once per
/// `resolution x resolution` block, at the block's top-left pixel, and
/// the block is filled with the result; blocks at the right and
/// bottom edges are clipped to the tile.
pub fn render_tile(job: &TileJob, palette: &Palette) -> PixelBuffer {
    let tile = job.tile;
    if tile.is_empty() {
        return PixelBuffer::empty();
    }

    let view = &job.view;
    let step = view.resolution.max(1);
    let mut buffer = PixelBuffer::new(tile.width, tile.height);
    for y in (0..tile.height).step_by(step as usize) {
        for x in (0..tile.width).step_by(step as usize) {
            let point = map_pixel_to_complex(
                f64::from(tile.start_x + x),
                f64::from(tile.start_y + y),
                job.canvas_width,
                job.canvas_height,
                view.center,
                job.scale,
            );
            let escape = view.fractal.evaluate(point, view.iterations);
            buffer.fill(x, y, step, step, palette.colour(&escape, view.iterations));
        }
    }
    buffer
}

/// Turns a job into pixels.  The worker threads share one renderer.
pub trait TileRenderer: Send + Sync {
    /// Render one tile.  May panic; the worker reports the panic as a
    /// failed tile.
    fn render(&self, job: &TileJob) -> PixelBuffer;
}

/// The escape-time renderer with the standard palette.
#[derive(Clone, Debug, Default)]
pub struct EscapeTimeRenderer {
    palette: Palette,
}

impl EscapeTimeRenderer {
    /// A renderer with the standard palette.
    pub fn new() -> Self {
        EscapeTimeRenderer {
            palette: Palette::new(),
        }
    }
}

impl TileRenderer for EscapeTimeRenderer {
    fn render(&self, job: &TileJob) -> PixelBuffer {
        render_tile(job, &self.palette)
    }
}

/// A rendered tile on its way back to the coordinator.
#[derive(Debug)]
pub struct TileResult {
    /// The pass the tile was rendered for.
    pub pass: PassId,
    /// The job's position in its pass.
    pub index: usize,
    /// Where the pixels go.
    pub tile: Tile,
    /// The pixels.
    pub buffer: PixelBuffer,
    /// Fraction of the pass complete, counting in schedule order.
    pub progress: f64,
}

/// A tile the renderer gave up on.
#[derive(Debug)]
pub struct TileFailure {
    /// The pass the tile was rendered for.
    pub pass: PassId,
    /// The job's position in its pass.
    pub index: usize,
    /// The region that stays unpainted.
    pub tile: Tile,
    /// What went wrong.
    pub reason: String,
}

/// Messages from the worker threads.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A tile finished.
    Rendered(TileResult),
    /// A tile panicked.
    Failed(TileFailure),
}

impl WorkerEvent {
    /// The pass the event belongs to.
    pub fn pass(&self) -> PassId {
        match self {
            WorkerEvent::Rendered(r) => r.pass,
            WorkerEvent::Failed(f) => f.pass,
        }
    }

    /// The job's position in its pass.
    pub fn index(&self) -> usize {
        match self {
            WorkerEvent::Rendered(r) => r.index,
            WorkerEvent::Failed(f) => f.index,
        }
    }
}

/// A pool of long-lived worker threads.
///
/// The threads run until every sender of the job channel has been
/// dropped, or the event channel has been.  Dropping the worker joins
/// them, so the job sender must go first.
pub struct RenderWorker {
    handles: Vec<JoinHandle<()>>,
}

impl RenderWorker {
    /// Start `threads` worker threads (at least one) reading jobs from
    /// `jobs` and reporting on `events`.
    pub fn spawn(
        threads: usize,
        renderer: Arc<dyn TileRenderer>,
        jobs: Receiver<TileJob>,
        events: Sender<WorkerEvent>,
    ) -> Result<Self, RenderError> {
        let mut handles = Vec::with_capacity(threads.max(1));
        for id in 0..threads.max(1) {
            let renderer = renderer.clone();
            let jobs = jobs.clone();
            let events = events.clone();
            let handle = thread::Builder::new()
                .name(format!("tilebrot-worker-{}", id))
                .spawn(move || work(id, renderer.as_ref(), jobs, events))?;
            handles.push(handle);
        }
        Ok(RenderWorker { handles })
    }

    /// The number of threads in the pool.
    pub fn threads(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                debug!("worker thread exited by panic");
            }
        }
    }
}

fn work(
    id: usize,
    renderer: &dyn TileRenderer,
    jobs: Receiver<TileJob>,
    events: Sender<WorkerEvent>,
) {
    debug!("worker {} started", id);
    for job in jobs.iter() {
        let started = Instant::now();
        let event = match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(&job))) {
            Ok(buffer) => {
                trace!(
                    "worker {}: pass {} tile {}/{} in {:?}",
                    id,
                    job.pass,
                    job.index + 1,
                    job.total,
                    started.elapsed()
                );
                WorkerEvent::Rendered(TileResult {
                    pass: job.pass,
                    index: job.index,
                    tile: job.tile,
                    progress: job.progress(),
                    buffer,
                })
            }
            Err(cause) => WorkerEvent::Failed(TileFailure {
                pass: job.pass,
                index: job.index,
                tile: job.tile,
                reason: panic_message(cause.as_ref()),
            }),
        };
        if events.send(event).is_err() {
            break;
        }
        thread::yield_now();
    }
    debug!("worker {} stopped", id);
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "tile renderer panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::Fractal;
    use crate::palette::INSIDE;
    use crate::planes::scale_for;
    use crossbeam::channel::unbounded;
    use num::Complex;
    use std::time::Duration;

    fn job(tile: Tile, resolution: u32) -> TileJob {
        let view = ViewState {
            resolution,
            ..ViewState::default()
        };
        TileJob {
            pass: 1,
            index: 0,
            total: 1,
            tile,
            view,
            canvas_width: 256,
            canvas_height: 256,
            scale: scale_for(256, view.zoom),
        }
    }

    fn tile(start_x: u32, start_y: u32, width: u32, height: u32) -> Tile {
        Tile {
            start_x,
            start_y,
            width,
            height,
        }
    }

    #[test]
    fn buffer_matches_tile_size() {
        let buffer = render_tile(&job(tile(0, 0, 64, 48), 1), &Palette::new());
        assert_eq!((buffer.width, buffer.height), (64, 48));
        assert_eq!(buffer.data.len(), 64 * 48 * 4);
    }

    #[test]
    fn center_of_default_view_is_black() {
        let buffer = render_tile(&job(tile(96, 96, 64, 64), 1), &Palette::new());
        assert_eq!(buffer.pixel(32, 32), INSIDE);
    }

    #[test]
    fn corner_of_default_view_escapes() {
        // Pixel (0, 0) is -2.5 - 2i.
        let buffer = render_tile(&job(tile(0, 0, 8, 8), 1), &Palette::new());
        assert_ne!(buffer.pixel(0, 0), INSIDE);
        assert_eq!(buffer.pixel(0, 0)[3], 255);
    }

    #[test]
    fn blocks_repeat_one_sample() {
        let palette = Palette::new();
        let coarse = render_tile(&job(tile(0, 0, 10, 10), 4), &palette);
        let fine = render_tile(&job(tile(0, 0, 10, 10), 1), &palette);
        for y in 0..10 {
            for x in 0..10 {
                let (bx, by) = (x / 4 * 4, y / 4 * 4);
                assert_eq!(coarse.pixel(x, y), fine.pixel(bx, by));
            }
        }
    }

    #[test]
    fn partial_blocks_are_clipped() {
        let buffer = render_tile(&job(tile(0, 0, 7, 5), 3), &Palette::new());
        assert_eq!(buffer.data.len(), 7 * 5 * 4);
        assert!(buffer.data.chunks(4).all(|p| p[3] == 255));
    }

    #[test]
    fn empty_tile_gives_empty_buffer() {
        let j = job(tile(10, 10, 0, 64), 1);
        assert!(render_tile(&j, &Palette::new()).is_empty());
        assert_eq!(j.progress(), 0.0);
        let j = job(tile(10, 10, 64, 0), 1);
        assert!(render_tile(&j, &Palette::new()).is_empty());
    }

    #[test]
    fn progress_counts_in_schedule_order() {
        let mut j = job(tile(0, 0, 1, 1), 1);
        j.total = 4;
        j.index = 1;
        assert_eq!(j.progress(), 0.5);
    }

    #[test]
    fn julia_jobs_render() {
        let mut j = job(tile(96, 96, 64, 64), 1);
        j.view.fractal = Fractal::Julia(Complex::new(0.0, 0.0));
        j.view.center = Complex::new(0.0, 0.0);
        let buffer = render_tile(&j, &Palette::new());
        // The unit disc is the filled Julia set of k = 0.
        assert_eq!(buffer.pixel(32, 32), INSIDE);
    }

    struct Exploding;

    impl TileRenderer for Exploding {
        fn render(&self, job: &TileJob) -> PixelBuffer {
            if job.index == 1 {
                panic!("boom");
            }
            PixelBuffer::new(job.tile.width, job.tile.height)
        }
    }

    #[test]
    fn workers_deliver_every_job() {
        let (job_tx, job_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let worker =
            RenderWorker::spawn(2, Arc::new(EscapeTimeRenderer::new()), job_rx, event_tx).unwrap();
        assert_eq!(worker.threads(), 2);
        for index in 0..3 {
            let mut j = job(tile(index * 8, 0, 8, 8), 1);
            j.index = index as usize;
            j.total = 3;
            job_tx.send(j).unwrap();
        }
        drop(job_tx);

        let mut seen = vec![];
        for _ in 0..3 {
            match event_rx.recv_timeout(Duration::from_secs(10)).unwrap() {
                WorkerEvent::Rendered(r) => {
                    assert_eq!(r.buffer.data.len(), 8 * 8 * 4);
                    assert_eq!(r.tile.start_x, r.index as u32 * 8);
                    seen.push(r.index);
                }
                WorkerEvent::Failed(f) => panic!("unexpected failure: {}", f.reason),
            }
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2]);
        drop(worker);
    }

    #[test]
    fn panics_become_failed_tiles() {
        let (job_tx, job_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let worker = RenderWorker::spawn(1, Arc::new(Exploding), job_rx, event_tx).unwrap();
        for index in 0..3 {
            let mut j = job(tile(0, 0, 4, 4), 1);
            j.index = index;
            j.total = 3;
            job_tx.send(j).unwrap();
        }
        drop(job_tx);

        let events: Vec<WorkerEvent> = (0..3)
            .map(|_| event_rx.recv_timeout(Duration::from_secs(10)).unwrap())
            .collect();
        match &events[1] {
            WorkerEvent::Failed(f) => {
                assert_eq!(f.index, 1);
                assert_eq!(f.reason, "boom");
            }
            other => panic!("expected a failure, got {:?}", other),
        }
        assert!(matches!(events[2], WorkerEvent::Rendered(_)));
        drop(worker);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The render coordinator
//!
//! The coordinator owns the view and the canvas.  A change to the
//! view abandons whatever pass is running, and, once the view has
//! been still for the debounce interval, a new pass is scheduled:
//! the canvas is cut into tiles, the tiles are queued as jobs, and
//! the jobs are fed to the workers a few at a time.  As each tile
//! comes back it is painted onto the canvas, unless it belongs to a
//! pass other than the current one, in which case it is dropped.
//!
//! ```text
//!   Idle --view change--> Scheduled --debounce--> Rendering --last tile--> Idle
//!                            ^                        |
//!                            +------view change-------+
//! ```
//!
//! Nothing here waits on its own except [`Coordinator::pump`] and
//! [`Coordinator::wait_idle`]; an interactive host calls
//! [`Coordinator::poll_at`] and [`Coordinator::handle_event`] from its
//! own loop.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::canvas::Canvas;
use crate::config::RenderConfig;
use crate::errors::RenderError;
use crate::tiles::schedule;
use crate::view::{self, InputEvent, Navigator, Quality, ViewState};
use crate::worker::{
    EscapeTimeRenderer, PassId, RenderWorker, TileJob, TileRenderer, WorkerEvent,
};

/// Where the coordinator is in its cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderState {
    /// Nothing to do.
    Idle,
    /// The view changed; waiting for it to settle.
    Scheduled,
    /// Tiles are out with the workers.
    Rendering,
}

/// How a pass went.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PassSummary {
    /// The pass.
    pub pass: PassId,
    /// Tiles scheduled.
    pub total: usize,
    /// Tiles painted.
    pub delivered: usize,
    /// Tiles left blank after failing.
    pub failed: usize,
    /// Time from scheduling to the last tile.
    pub elapsed: Duration,
}

impl PassSummary {
    /// Was every tile painted?
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.delivered == self.total
    }
}

struct RenderPass {
    id: PassId,
    jobs: Vec<TileJob>,
    next: usize,
    retries: VecDeque<usize>,
    delivered: Vec<bool>,
    failed: Vec<bool>,
    retried: Vec<bool>,
    delivered_count: usize,
    failed_count: usize,
    started: Instant,
}

impl RenderPass {
    fn new(id: PassId, jobs: Vec<TileJob>, started: Instant) -> Self {
        let total = jobs.len();
        RenderPass {
            id,
            jobs,
            next: 0,
            retries: VecDeque::new(),
            delivered: vec![false; total],
            failed: vec![false; total],
            retried: vec![false; total],
            delivered_count: 0,
            failed_count: 0,
            started,
        }
    }

    fn total(&self) -> usize {
        self.jobs.len()
    }

    fn next_job(&mut self) -> Option<TileJob> {
        if let Some(index) = self.retries.pop_front() {
            return Some(self.jobs[index].clone());
        }
        let job = self.jobs.get(self.next).cloned();
        if job.is_some() {
            self.next += 1;
        }
        job
    }

    fn mark_delivered(&mut self, index: usize) {
        if self.failed[index] {
            self.failed[index] = false;
            self.failed_count -= 1;
        }
        if !self.delivered[index] {
            self.delivered[index] = true;
            self.delivered_count += 1;
        }
    }

    fn mark_failed(&mut self, index: usize) {
        if !self.delivered[index] && !self.failed[index] {
            self.failed[index] = true;
            self.failed_count += 1;
        }
    }

    fn is_settled(&self) -> bool {
        self.delivered_count + self.failed_count == self.total()
    }

    fn progress(&self) -> f64 {
        if self.total() == 0 {
            1.0
        } else {
            self.delivered_count as f64 / self.total() as f64
        }
    }

    fn summary(&self, now: Instant) -> PassSummary {
        PassSummary {
            pass: self.id,
            total: self.total(),
            delivered: self.delivered_count,
            failed: self.failed_count,
            elapsed: now.saturating_duration_since(self.started),
        }
    }
}

/// Drives progressive rendering of a view onto a canvas.
pub struct Coordinator {
    config: RenderConfig,
    view: ViewState,
    navigator: Navigator,
    canvas: Canvas,
    painted: bool,
    state: RenderState,
    pass_id: PassId,
    deadline: Option<Instant>,
    pass: Option<RenderPass>,
    last_summary: Option<PassSummary>,
    outstanding: usize,
    // The job sender must be dropped before the worker joins its
    // threads, so it is declared first.
    jobs: Sender<TileJob>,
    events: Receiver<WorkerEvent>,
    worker: Option<RenderWorker>,
}

impl Coordinator {
    /// A coordinator with its own pool of escape-time workers.
    pub fn new(
        config: RenderConfig,
        view: ViewState,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let renderer = Arc::new(EscapeTimeRenderer::new());
        Coordinator::with_renderer(config, view, width, height, renderer)
    }

    /// A coordinator whose workers use the given renderer.
    pub fn with_renderer(
        config: RenderConfig,
        view: ViewState,
        width: u32,
        height: u32,
        renderer: Arc<dyn TileRenderer>,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        let (job_tx, job_rx) = channel::bounded(config.in_flight);
        let (event_tx, event_rx) = channel::unbounded();
        let worker = RenderWorker::spawn(config.workers, renderer, job_rx, event_tx)?;
        let mut coordinator =
            Coordinator::with_channels(config, view, width, height, job_tx, event_rx)?;
        coordinator.worker = Some(worker);
        Ok(coordinator)
    }

    /// A coordinator that sends jobs to, and takes events from,
    /// channels the caller services.
    pub fn with_channels(
        config: RenderConfig,
        mut view: ViewState,
        width: u32,
        height: u32,
        jobs: Sender<TileJob>,
        events: Receiver<WorkerEvent>,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        if !(view.zoom.is_finite() && view.zoom > 0.0) {
            return Err(RenderError::InvalidConfig(format!(
                "zoom must be a positive number, not {}",
                view.zoom
            )));
        }
        view.iterations = config.clamp_iterations(view.iterations);
        view.resolution = view.resolution.max(1);
        Ok(Coordinator {
            config,
            view,
            navigator: Navigator::new(),
            canvas: Canvas::new(width, height),
            painted: false,
            state: RenderState::Idle,
            pass_id: 0,
            deadline: None,
            pass: None,
            last_summary: None,
            outstanding: 0,
            jobs,
            events,
            worker: None,
        })
    }

    /// Worker threads owned by this coordinator; zero when the caller
    /// services the channels.
    pub fn worker_threads(&self) -> usize {
        self.worker.as_ref().map_or(0, RenderWorker::threads)
    }

    /// The configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The current view.
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// The canvas.
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Where the coordinator is in its cycle.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// The id of the current pass.  Tiles of any other pass are
    /// discarded.
    pub fn pass_id(&self) -> PassId {
        self.pass_id
    }

    /// Fraction of the current pass painted.  Zero until a pass has
    /// started.
    pub fn progress(&self) -> f64 {
        match self.pass {
            Some(ref pass) if pass.id == self.pass_id => pass.progress(),
            _ => 0.0,
        }
    }

    /// The most recently finished pass.
    pub fn last_summary(&self) -> Option<PassSummary> {
        self.last_summary
    }

    /// Abandon the current pass and schedule a new one for
    /// `now + debounce`.  Further calls before then push the start
    /// back.
    pub fn request_render_at(&mut self, now: Instant) {
        self.pass_id += 1;
        if let Some(pass) = self.pass.take() {
            if !pass.is_settled() {
                debug!(
                    "pass {} superseded by {} with {}/{} tiles painted",
                    pass.id,
                    self.pass_id,
                    pass.delivered_count,
                    pass.total()
                );
            }
        }
        self.state = RenderState::Scheduled;
        self.deadline = Some(now + self.config.debounce);
    }

    /// [`Coordinator::request_render_at`] now.
    pub fn request_render(&mut self) {
        self.request_render_at(Instant::now());
    }

    /// Feed a pointer event to the view.  Returns true when the view
    /// changed and a new pass was scheduled.
    pub fn apply_input_at(&mut self, event: InputEvent, now: Instant) -> bool {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        let changed = self.navigator.apply(&mut self.view, event, width, height);
        if changed {
            self.request_render_at(now);
        }
        changed
    }

    /// [`Coordinator::apply_input_at`] now.
    pub fn apply_input(&mut self, event: InputEvent) -> bool {
        self.apply_input_at(event, Instant::now())
    }

    fn changed(&mut self, changed: bool) -> bool {
        if changed {
            self.request_render();
        }
        changed
    }

    /// Jump to a preset location.
    pub fn navigate_to(&mut self, key: &str) -> Result<bool, RenderError> {
        let preset =
            view::preset(key).ok_or_else(|| RenderError::UnknownPreset(key.to_string()))?;
        let changed = self.view.apply_preset(preset);
        Ok(self.changed(changed))
    }

    /// Jump to a preset chosen at random; returns its key.
    pub fn navigate_random(&mut self) -> &'static str {
        let preset = view::random_preset(&mut rand::thread_rng());
        let changed = self.view.apply_preset(preset);
        self.changed(changed);
        preset.key
    }

    /// Back to the whole set with default detail.
    pub fn reset(&mut self) -> bool {
        let mut view = ViewState::default();
        view.iterations = self.config.clamp_iterations(view.iterations);
        let changed = self.view != view;
        self.view = view;
        self.changed(changed)
    }

    /// Replace the view outright.  A non-positive zoom is refused.
    pub fn set_view(&mut self, mut view: ViewState) -> bool {
        if !(view.zoom.is_finite() && view.zoom > 0.0) {
            return false;
        }
        view.iterations = self.config.clamp_iterations(view.iterations);
        view.resolution = view.resolution.max(1);
        let changed = view != self.view;
        self.view = view;
        self.changed(changed)
    }

    /// Change the iteration limit, clamped to the configured range.
    pub fn set_iterations(&mut self, iterations: u32) -> bool {
        let changed = self.view.set_iterations(iterations, &self.config);
        self.changed(changed)
    }

    /// Change the block size.
    pub fn set_resolution(&mut self, resolution: u32) -> bool {
        let changed = self.view.set_resolution(resolution);
        self.changed(changed)
    }

    /// Apply a quality setting.
    pub fn set_quality(&mut self, quality: Quality) -> bool {
        let changed = self.view.apply_quality(quality, &self.config);
        self.changed(changed)
    }

    /// The surface changed size.  The canvas is cleared and a new
    /// pass scheduled.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.canvas.width(), self.canvas.height()) {
            return false;
        }
        self.canvas.resize(width, height);
        self.painted = false;
        self.changed(true)
    }

    /// Start the scheduled pass if the view has been still long
    /// enough.  Returns true if a pass started.
    pub fn poll_at(&mut self, now: Instant) -> Result<bool, RenderError> {
        match (self.state, self.deadline) {
            (RenderState::Scheduled, Some(deadline)) if deadline <= now => {
                self.start_pass(now)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Start a pass immediately, skipping the debounce.
    pub fn render_now(&mut self) -> Result<(), RenderError> {
        if self.state != RenderState::Scheduled {
            self.request_render();
        }
        self.start_pass(Instant::now())
    }

    fn start_pass(&mut self, now: Instant) -> Result<(), RenderError> {
        self.deadline = None;
        if self.painted && self.config.blur_radius > 0 {
            self.canvas.blur(self.config.blur_radius);
        }

        let (width, height) = (self.canvas.width(), self.canvas.height());
        let scale = self.view.scale(width);
        let tiles = schedule(width, height, self.config.tile_size);
        let total = tiles.len();
        let (pass, view) = (self.pass_id, self.view);
        let jobs = tiles
            .into_iter()
            .enumerate()
            .map(|(index, tile)| TileJob {
                pass,
                index,
                total,
                tile,
                view,
                canvas_width: width,
                canvas_height: height,
                scale,
            })
            .collect();
        info!(
            "pass {}: {} tiles, center {}, zoom {}, {} iterations",
            pass, total, view.center, view.zoom, view.iterations
        );

        self.pass = Some(RenderPass::new(pass, jobs, now));
        self.state = RenderState::Rendering;
        if total == 0 {
            self.finish(now);
            return Ok(());
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Result<(), RenderError> {
        if self.state != RenderState::Rendering {
            return Ok(());
        }
        let pass = match self.pass.as_mut() {
            Some(pass) => pass,
            None => return Ok(()),
        };
        while self.outstanding < self.config.in_flight {
            let job = match pass.next_job() {
                Some(job) => job,
                None => break,
            };
            if self.jobs.send(job).is_err() {
                return Err(RenderError::WorkerDisconnected);
            }
            self.outstanding += 1;
        }
        Ok(())
    }

    /// Take one event from a worker.  Tiles of the current pass are
    /// painted; anything else is dropped.
    pub fn handle_event(&mut self, event: WorkerEvent) -> Result<(), RenderError> {
        self.outstanding = self.outstanding.saturating_sub(1);
        let current = self.pass_id;
        let total = match self.pass {
            Some(ref pass) if event.pass() == current && pass.id == current => pass.total(),
            _ => {
                debug!(
                    "dropping tile {} of stale pass {} (current {})",
                    event.index(),
                    event.pass(),
                    current
                );
                return self.dispatch();
            }
        };
        if event.index() >= total {
            warn!("pass {}: tile index {} out of range", current, event.index());
            return self.dispatch();
        }
        let pass = match self.pass.as_mut() {
            Some(pass) => pass,
            None => return Ok(()),
        };

        match event {
            WorkerEvent::Rendered(result) => {
                if self.canvas.composite(&result.tile, &result.buffer) {
                    self.painted = true;
                }
                pass.mark_delivered(result.index);
                debug!(
                    "pass {}: tile {} painted, {}/{}",
                    current,
                    result.index,
                    pass.delivered_count,
                    pass.total()
                );
            }
            WorkerEvent::Failed(failure) => {
                if self.config.retry_failed && !pass.retried[failure.index] {
                    warn!(
                        "pass {}: tile {} at ({}, {}) failed, retrying: {}",
                        current,
                        failure.index,
                        failure.tile.start_x,
                        failure.tile.start_y,
                        failure.reason
                    );
                    pass.retried[failure.index] = true;
                    pass.retries.push_back(failure.index);
                } else {
                    warn!(
                        "pass {}: tile {} at ({}, {}) failed, leaving it blank: {}",
                        current,
                        failure.index,
                        failure.tile.start_x,
                        failure.tile.start_y,
                        failure.reason
                    );
                    pass.mark_failed(failure.index);
                }
            }
        }

        if self.state == RenderState::Rendering && pass.is_settled() {
            self.finish(Instant::now());
            return Ok(());
        }
        self.dispatch()
    }

    fn finish(&mut self, now: Instant) {
        self.state = RenderState::Idle;
        if let Some(ref pass) = self.pass {
            let summary = pass.summary(now);
            if summary.is_complete() {
                info!("pass {} complete in {:?}", summary.pass, summary.elapsed);
            } else {
                warn!(
                    "pass {} finished with {} of {} tiles blank",
                    summary.pass, summary.failed, summary.total
                );
            }
            self.last_summary = Some(summary);
        }
    }

    /// Start a due pass, or wait up to `timeout` for a worker event
    /// and handle it.  Returns true if anything happened.
    pub fn pump(&mut self, timeout: Duration) -> Result<bool, RenderError> {
        let now = Instant::now();
        if self.poll_at(now)? {
            return Ok(true);
        }
        let wait = match self.deadline {
            Some(deadline) => timeout.min(deadline.saturating_duration_since(now)),
            None => timeout,
        };
        if self.outstanding == 0 {
            thread::sleep(wait);
            return self.poll_at(Instant::now());
        }
        match self.events.recv_timeout(wait) {
            Ok(event) => {
                self.handle_event(event)?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(RenderError::WorkerDisconnected),
        }
    }

    /// Block until the coordinator is idle, and report on the last
    /// pass.
    pub fn wait_idle(&mut self) -> Result<PassSummary, RenderError> {
        while self.state != RenderState::Idle {
            self.pump(Duration::from_millis(50))?;
        }
        Ok(self.last_summary.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests;

use {
    crate::{
        backend::{OutputBackend, RenderTimer},
        scene::item::ItemId,
        time::{Clock, Time},
        utils::{cell_ext::CellExt, clonecell::CloneCell, numcell::NumCell},
    },
    std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        rc::Rc,
    },
};

/// Extra headroom subtracted from the wakeup deadline to absorb scheduling
/// jitter between the timer firing and the render actually starting.
pub const SAFETY_MARGIN_NSEC: u64 = 3_000_000;

const JOURNAL_CAPACITY: usize = 60;

/// How much of the refresh interval to reserve for rendering at minimum.
/// Lower latency means waking up closer to the presentation deadline.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LatencyPolicy {
    ExtremelyLow,
    Low,
    #[default]
    Medium,
    High,
    ExtremelyHigh,
}

impl LatencyPolicy {
    fn vblank_percent(self) -> u64 {
        match self {
            LatencyPolicy::ExtremelyLow => 10,
            LatencyPolicy::Low => 25,
            LatencyPolicy::Medium => 50,
            LatencyPolicy::High => 75,
            LatencyPolicy::ExtremelyHigh => 90,
        }
    }
}

/// How measured render times from the journal are reduced to one estimate.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RenderTimeEstimator {
    Minimum,
    #[default]
    Maximum,
    Average,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum VrrPolicy {
    Never,
    Always,
    #[default]
    Automatic,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PresentMode {
    /// Presentation aligned to the vblank grid of the output.
    #[default]
    Fixed,
    /// Adaptive sync. Frames are presented as soon as they are ready, with
    /// the refresh interval only as an upper bound on the rate.
    Adaptive,
}

/// Invoked when the wakeup timer fires and a new frame should be painted.
pub trait FrameHandler {
    fn frame_requested(self: Rc<Self>);
}

/// A sliding window of measured render times.
struct RenderJournal {
    log: RefCell<VecDeque<u64>>,
}

impl RenderJournal {
    fn add(&self, render_time: u64) {
        let mut log = self.log.borrow_mut();
        if log.len() == JOURNAL_CAPACITY {
            log.pop_front();
        }
        log.push_back(render_time);
    }

    fn estimate(&self, estimator: RenderTimeEstimator) -> Option<u64> {
        let log = self.log.borrow();
        if log.is_empty() {
            return None;
        }
        let res = match estimator {
            RenderTimeEstimator::Minimum => log.iter().copied().min().unwrap_or(0),
            RenderTimeEstimator::Maximum => log.iter().copied().max().unwrap_or(0),
            RenderTimeEstimator::Average => log.iter().sum::<u64>() / log.len() as u64,
        };
        Some(res)
    }
}

/// The frame-pacing state machine of one output.
///
/// The loop decides when to wake up so that a frame rendered immediately
/// after the wakeup completes just before the next presentation deadline.
/// All timestamps are nanoseconds on the monotonic clock; a last
/// presentation timestamp of 0 means no frame has been presented yet.
pub struct RenderLoop {
    clock: Rc<dyn Clock>,
    timer: Rc<dyn RenderTimer>,
    output: Rc<dyn OutputBackend>,
    frame_handler: CloneCell<Option<Rc<dyn FrameHandler>>>,
    pending_frame_count: NumCell<u32>,
    inhibit_count: NumCell<u32>,
    pending_reschedule: Cell<bool>,
    dispatching: Cell<bool>,
    stopped: Cell<bool>,
    last_presentation: Cell<u64>,
    next_presentation: Cell<u64>,
    render_start: Cell<u64>,
    render_end: Cell<u64>,
    journal: RenderJournal,
    latency_policy: Cell<LatencyPolicy>,
    estimator: Cell<RenderTimeEstimator>,
    vrr_policy: Cell<VrrPolicy>,
    present_mode: Cell<PresentMode>,
    fullscreen_item: Cell<Option<ItemId>>,
}

impl RenderLoop {
    pub fn new(
        clock: Rc<dyn Clock>,
        timer: Rc<dyn RenderTimer>,
        output: Rc<dyn OutputBackend>,
    ) -> Rc<Self> {
        Rc::new(Self {
            clock,
            timer,
            output,
            frame_handler: Default::default(),
            pending_frame_count: Default::default(),
            inhibit_count: Default::default(),
            pending_reschedule: Cell::new(false),
            dispatching: Cell::new(false),
            stopped: Cell::new(false),
            last_presentation: Cell::new(0),
            next_presentation: Cell::new(0),
            render_start: Cell::new(0),
            render_end: Cell::new(0),
            journal: RenderJournal {
                log: Default::default(),
            },
            latency_policy: Default::default(),
            estimator: Default::default(),
            vrr_policy: Default::default(),
            present_mode: Default::default(),
            fullscreen_item: Cell::new(None),
        })
    }

    pub fn set_frame_handler(&self, handler: Rc<dyn FrameHandler>) {
        self.frame_handler.set(Some(handler));
    }

    pub fn latency_policy(&self) -> LatencyPolicy {
        self.latency_policy.get()
    }

    pub fn set_latency_policy(&self, policy: LatencyPolicy) {
        self.latency_policy.set(policy);
    }

    pub fn render_time_estimator(&self) -> RenderTimeEstimator {
        self.estimator.get()
    }

    pub fn set_render_time_estimator(&self, estimator: RenderTimeEstimator) {
        self.estimator.set(estimator);
    }

    pub fn vrr_policy(&self) -> VrrPolicy {
        self.vrr_policy.get()
    }

    pub fn set_vrr_policy(&self, policy: VrrPolicy) {
        self.vrr_policy.set(policy);
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode.get()
    }

    /// The item that covers the whole output, if any. With an automatic VRR
    /// policy, its presence is what enables adaptive sync.
    pub fn set_fullscreen_item(&self, item: Option<ItemId>) {
        self.fullscreen_item.set(item);
    }

    pub fn last_presentation_ns(&self) -> u64 {
        self.last_presentation.get()
    }

    pub fn next_presentation_ns(&self) -> u64 {
        self.next_presentation.get()
    }

    pub fn pending_frame_count(&self) -> u32 {
        self.pending_frame_count.get()
    }

    /// Requests a new frame. `item` attributes the damage that caused the
    /// request; with adaptive sync active, damage to items other than the
    /// fullscreen item does not force an earlier frame.
    ///
    /// While a frame is pending or the loop is inhibited the request is
    /// remembered and honored once the frame completes or the last
    /// inhibition is lifted.
    pub fn schedule_repaint(&self, item: Option<ItemId>) {
        if self.stopped.get() {
            return;
        }
        self.update_present_mode();
        if self.present_mode.get() == PresentMode::Adaptive
            && let Some(item) = item
            && let Some(fullscreen) = self.fullscreen_item.get()
            && item != fullscreen
        {
            return;
        }
        if self.pending_frame_count.get() > 0
            || self.inhibit_count.get() > 0
            || self.dispatching.get()
        {
            self.pending_reschedule.set(true);
            return;
        }
        self.schedule();
    }

    /// Called by the embedder when the wakeup timer expires.
    pub fn dispatch(self: &Rc<Self>) {
        if self.stopped.get() {
            return;
        }
        let Some(handler) = self.frame_handler.get() else {
            return;
        };
        self.dispatching.set(true);
        handler.frame_requested();
        self.dispatching.set(false);
        self.maybe_reschedule();
    }

    /// Marks the start of rendering of one frame. Must be paired with
    /// exactly one of `end_frame` + `notify_frame_completed` or
    /// `end_frame` + `notify_frame_failed`.
    pub fn begin_frame(&self) {
        self.pending_frame_count.fetch_add(1);
        self.render_start.set(self.clock.now().nsec());
    }

    pub fn end_frame(&self) {
        self.render_end.set(self.clock.now().nsec());
    }

    /// Presentation feedback from the display backend. `timestamp` is when
    /// the frame became visible; a zero timestamp means the backend could
    /// not tell.
    pub fn notify_frame_completed(&self, timestamp: Time) {
        if self.pending_frame_count.get() == 0 {
            log::warn!("Received a frame completion without a pending frame");
            debug_assert!(false);
        } else {
            self.pending_frame_count.fetch_sub(1);
        }
        self.journal
            .add(self.render_end.get().saturating_sub(self.render_start.get()));
        let mut ts = timestamp.nsec();
        let last = self.last_presentation.get();
        if ts == 0 || ts < last {
            if ts != 0 {
                log::warn!(
                    "Got a non-monotonic presentation timestamp: {} < {}",
                    ts,
                    last,
                );
            }
            ts = self.clock.now().nsec();
        }
        self.last_presentation.set(ts);
        self.maybe_reschedule();
    }

    /// The frame was dropped by the backend and will never be presented.
    ///
    /// This does not retry on its own; only a repaint request that arrived
    /// while the frame was pending re-arms the timer. Otherwise a
    /// persistently failing backend would repaint every vblank.
    pub fn notify_frame_failed(&self) {
        if self.pending_frame_count.get() == 0 {
            log::warn!("Received a frame failure without a pending frame");
            debug_assert!(false);
        } else {
            self.pending_frame_count.fetch_sub(1);
        }
        self.maybe_reschedule();
    }

    /// Suspends frame scheduling, e.g. during an output mode set. Nestable.
    pub fn inhibit(&self) {
        if self.inhibit_count.fetch_add(1) == 0 {
            self.timer.program(None);
        }
    }

    pub fn uninhibit(&self) {
        if self.inhibit_count.get() == 0 {
            log::error!("Unbalanced render loop uninhibit");
            debug_assert!(false);
            return;
        }
        if self.inhibit_count.fetch_sub(1) == 1 {
            self.maybe_reschedule();
        }
    }

    /// Shuts the loop down. Repaint requests and dispatches become no-ops;
    /// feedback for frames already in flight is still accounted.
    pub fn stop(&self) {
        self.stopped.set(true);
        self.pending_reschedule.set(false);
        self.timer.program(None);
    }

    fn maybe_reschedule(&self) {
        if self.pending_reschedule.get()
            && !self.stopped.get()
            && self.pending_frame_count.get() == 0
            && self.inhibit_count.get() == 0
        {
            self.pending_reschedule.set(false);
            self.schedule();
        }
    }

    fn update_present_mode(&self) {
        let mode = match self.vrr_policy.get() {
            VrrPolicy::Never => PresentMode::Fixed,
            VrrPolicy::Always => match self.output.vrr_capable() {
                true => PresentMode::Adaptive,
                false => PresentMode::Fixed,
            },
            VrrPolicy::Automatic => {
                match self.output.vrr_capable() && self.fullscreen_item.is_some() {
                    true => PresentMode::Adaptive,
                    false => PresentMode::Fixed,
                }
            }
        };
        self.present_mode.set(mode);
    }

    /// Programs the wakeup timer for the next frame.
    ///
    /// The next presentation deadline is one refresh interval after the
    /// last presentation. If that deadline already passed, fixed-mode
    /// scheduling realigns it to the vblank grid while adaptive sync
    /// presents immediately. The wakeup is then moved before the deadline
    /// by the expected render time and the safety margin.
    fn schedule(&self) {
        let now = self.clock.now().nsec();
        let refresh = self.output.refresh_rate_millihz().max(1) as u64;
        let vblank = 1_000_000_000_000 / refresh;
        let last = self.last_presentation.get();
        let mut next = match last {
            0 => now + vblank,
            _ => last + vblank,
        };
        if next < now {
            match self.present_mode.get() {
                PresentMode::Fixed => {
                    let flips = (now - last) / vblank;
                    next = last + (flips + 1) * vblank;
                }
                PresentMode::Adaptive => next = now,
            }
        }
        self.next_presentation.set(next);
        let render_time = self.expected_render_time(vblank);
        let wake = next.saturating_sub(render_time + SAFETY_MARGIN_NSEC).max(now);
        self.timer.program(Some(Time::from_nsec(wake)));
    }

    fn expected_render_time(&self, vblank: u64) -> u64 {
        let reserved = vblank * self.latency_policy.get().vblank_percent() / 100;
        let measured = self.journal.estimate(self.estimator.get()).unwrap_or(0);
        reserved.max(measured)
    }
}

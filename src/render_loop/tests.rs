use {
    crate::{
        backend::{OutputBackend, RenderTimer},
        render_loop::{
            LatencyPolicy, PresentMode, RenderLoop, RenderTimeEstimator, SAFETY_MARGIN_NSEC,
            VrrPolicy,
        },
        scene::item::ItemIds,
        time::{Clock, Time},
    },
    std::{
        cell::{Cell, RefCell},
        rc::Rc,
    },
};

const VBLANK_60HZ: u64 = 1_000_000_000_000 / 60_000;

struct ManualClock {
    now: Cell<u64>,
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        Time::from_nsec(self.now.get())
    }
}

struct RecordingTimer {
    programmed: RefCell<Vec<Option<u64>>>,
}

impl RecordingTimer {
    fn last(&self) -> Option<u64> {
        self.programmed.borrow().last().copied().flatten()
    }

    fn len(&self) -> usize {
        self.programmed.borrow().len()
    }
}

impl RenderTimer for RecordingTimer {
    fn program(&self, expires: Option<Time>) {
        self.programmed.borrow_mut().push(expires.map(|t| t.nsec()));
    }
}

struct StaticOutput {
    refresh: u32,
    vrr: Cell<bool>,
}

impl OutputBackend for StaticOutput {
    fn refresh_rate_millihz(&self) -> u32 {
        self.refresh
    }

    fn vrr_capable(&self) -> bool {
        self.vrr.get()
    }
}

fn test_loop(
    refresh: u32,
    vrr: bool,
) -> (
    Rc<RenderLoop>,
    Rc<ManualClock>,
    Rc<RecordingTimer>,
    Rc<StaticOutput>,
) {
    let clock = Rc::new(ManualClock {
        now: Cell::new(1_000_000_000),
    });
    let timer = Rc::new(RecordingTimer {
        programmed: Default::default(),
    });
    let output = Rc::new(StaticOutput {
        refresh,
        vrr: Cell::new(vrr),
    });
    let rl = RenderLoop::new(clock.clone(), timer.clone(), output.clone());
    (rl, clock, timer, output)
}

fn present(rl: &RenderLoop, clock: &ManualClock, at: u64) {
    rl.begin_frame();
    rl.end_frame();
    clock.now.set(at);
    rl.notify_frame_completed(Time::from_nsec(at));
}

#[test]
fn first_frame_waits_one_refresh_interval() {
    let (rl, clock, timer, _) = test_loop(60_000, false);
    let now = clock.now.get();
    rl.schedule_repaint(None);
    let next = now + VBLANK_60HZ;
    let expected = next - VBLANK_60HZ / 2 - SAFETY_MARGIN_NSEC;
    assert_eq!(timer.last(), Some(expected));
    assert_eq!(rl.next_presentation_ns(), next);
}

#[test]
fn steady_state_wakes_before_next_vblank() {
    let (rl, clock, timer, _) = test_loop(60_000, false);
    let t0 = 2_000_000_000;
    present(&rl, &clock, t0);
    clock.now.set(t0 + 1_000_000);
    rl.schedule_repaint(None);
    let next = t0 + VBLANK_60HZ;
    assert_eq!(rl.next_presentation_ns(), next);
    assert_eq!(timer.last(), Some(next - VBLANK_60HZ / 2 - SAFETY_MARGIN_NSEC));
}

#[test]
fn latency_policy_scales_reserved_render_time() {
    let (rl, clock, timer, _) = test_loop(60_000, false);
    rl.set_latency_policy(LatencyPolicy::High);
    let t0 = 2_000_000_000;
    present(&rl, &clock, t0);
    clock.now.set(t0 + 1_000_000);
    rl.schedule_repaint(None);
    let next = t0 + VBLANK_60HZ;
    let expected = next - VBLANK_60HZ * 75 / 100 - SAFETY_MARGIN_NSEC;
    assert_eq!(timer.last(), Some(expected));
}

#[test]
fn wakeup_never_lies_in_the_past() {
    let (rl, clock, timer, _) = test_loop(60_000, false);
    // 90% reservation plus margin exceeds the whole refresh interval.
    rl.set_latency_policy(LatencyPolicy::ExtremelyHigh);
    let t0 = 2_000_000_000;
    present(&rl, &clock, t0);
    clock.now.set(t0 + 1_000_000);
    rl.schedule_repaint(None);
    assert_eq!(timer.last(), Some(t0 + 1_000_000));
}

#[test]
fn missed_vblanks_realign_to_the_grid() {
    let (rl, clock, _, _) = test_loop(60_000, false);
    let t0 = 2_000_000_000;
    present(&rl, &clock, t0);
    clock.now.set(t0 + 5 * VBLANK_60HZ + VBLANK_60HZ / 2);
    rl.schedule_repaint(None);
    assert_eq!(rl.next_presentation_ns(), t0 + 6 * VBLANK_60HZ);
}

#[test]
fn adaptive_sync_presents_immediately_after_a_pause() {
    let (rl, clock, _, _) = test_loop(60_000, true);
    rl.set_vrr_policy(VrrPolicy::Always);
    let t0 = 2_000_000_000;
    present(&rl, &clock, t0);
    let now = t0 + 5 * VBLANK_60HZ + VBLANK_60HZ / 2;
    clock.now.set(now);
    rl.schedule_repaint(None);
    assert_eq!(rl.present_mode(), PresentMode::Adaptive);
    assert_eq!(rl.next_presentation_ns(), now);
}

#[test]
fn journal_overrides_reserved_render_time() {
    let (rl, clock, timer, _) = test_loop(60_000, false);
    assert_eq!(rl.render_time_estimator(), RenderTimeEstimator::Maximum);
    let t0 = 2_000_000_000;
    clock.now.set(t0);
    rl.begin_frame();
    clock.now.set(t0 + 12_000_000);
    rl.end_frame();
    rl.notify_frame_completed(Time::from_nsec(t0 + 13_000_000));
    clock.now.set(t0 + 14_000_000);
    rl.schedule_repaint(None);
    let next = t0 + 13_000_000 + VBLANK_60HZ;
    // The measured 12ms exceed the 50% latency reservation.
    let expected = next - 12_000_000 - SAFETY_MARGIN_NSEC;
    assert_eq!(timer.last(), Some(expected));
}

#[test]
fn pending_frame_defers_rescheduling() {
    let (rl, clock, timer, _) = test_loop(60_000, false);
    rl.schedule_repaint(None);
    let programmed = timer.len();
    rl.begin_frame();
    rl.end_frame();
    rl.schedule_repaint(None);
    assert_eq!(timer.len(), programmed);
    let t0 = 3_000_000_000;
    clock.now.set(t0);
    rl.notify_frame_completed(Time::from_nsec(t0));
    assert_eq!(timer.len(), programmed + 1);
    assert_eq!(rl.next_presentation_ns(), t0 + VBLANK_60HZ);
}

#[test]
fn completion_without_deferred_request_does_not_reschedule() {
    let (rl, clock, timer, _) = test_loop(60_000, false);
    rl.schedule_repaint(None);
    let programmed = timer.len();
    present(&rl, &clock, 3_000_000_000);
    assert_eq!(timer.len(), programmed);
}

#[test]
fn inhibit_disarms_the_timer() {
    let (rl, _, timer, _) = test_loop(60_000, false);
    rl.schedule_repaint(None);
    rl.inhibit();
    assert_eq!(timer.programmed.borrow().last(), Some(&None));
    let programmed = timer.len();
    rl.schedule_repaint(None);
    assert_eq!(timer.len(), programmed);
    rl.uninhibit();
    assert_eq!(timer.len(), programmed + 1);
    assert!(timer.last().is_some());
}

#[test]
fn nested_inhibits_require_matching_uninhibits() {
    let (rl, _, timer, _) = test_loop(60_000, false);
    rl.inhibit();
    rl.inhibit();
    rl.schedule_repaint(None);
    let programmed = timer.len();
    rl.uninhibit();
    assert_eq!(timer.len(), programmed);
    rl.uninhibit();
    assert_eq!(timer.len(), programmed + 1);
}

#[test]
fn non_monotonic_timestamp_falls_back_to_the_clock() {
    let (rl, clock, _, _) = test_loop(60_000, false);
    present(&rl, &clock, 5_000_000_000);
    rl.begin_frame();
    rl.end_frame();
    clock.now.set(5_100_000_000);
    rl.notify_frame_completed(Time::from_nsec(4_000_000_000));
    assert_eq!(rl.last_presentation_ns(), 5_100_000_000);
}

#[test]
fn failed_frame_without_a_new_request_goes_idle() {
    let (rl, _, timer, _) = test_loop(60_000, false);
    rl.schedule_repaint(None);
    rl.begin_frame();
    rl.end_frame();
    let programmed = timer.len();
    rl.notify_frame_failed();
    assert_eq!(rl.pending_frame_count(), 0);
    assert_eq!(timer.len(), programmed);
}

#[test]
fn repaint_requested_during_a_failed_frame_is_honored() {
    let (rl, _, timer, _) = test_loop(60_000, false);
    rl.schedule_repaint(None);
    rl.begin_frame();
    rl.end_frame();
    // The request arrives while the frame is in flight and is deferred.
    rl.schedule_repaint(None);
    let programmed = timer.len();
    rl.notify_frame_failed();
    assert_eq!(timer.len(), programmed + 1);
}

#[test]
fn stopped_loop_ignores_repaint_requests() {
    let (rl, _, timer, _) = test_loop(60_000, false);
    rl.stop();
    let programmed = timer.len();
    rl.schedule_repaint(None);
    assert_eq!(timer.len(), programmed);
}

#[test]
fn automatic_vrr_requires_a_fullscreen_item() {
    let (rl, _, timer, _) = test_loop(60_000, true);
    let ids = ItemIds::default();
    let fullscreen = ids.next();
    let other = ids.next();
    rl.schedule_repaint(Some(other));
    assert_eq!(rl.present_mode(), PresentMode::Fixed);
    rl.set_fullscreen_item(Some(fullscreen));
    let programmed = timer.len();
    rl.schedule_repaint(Some(other));
    assert_eq!(rl.present_mode(), PresentMode::Adaptive);
    assert_eq!(timer.len(), programmed);
    rl.schedule_repaint(Some(fullscreen));
    assert_eq!(timer.len(), programmed + 1);
}

#[test]
fn vrr_never_stays_fixed() {
    let (rl, _, _, _) = test_loop(60_000, true);
    let ids = ItemIds::default();
    rl.set_vrr_policy(VrrPolicy::Never);
    rl.set_fullscreen_item(Some(ids.next()));
    rl.schedule_repaint(None);
    assert_eq!(rl.present_mode(), PresentMode::Fixed);
}

struct CountingHandler {
    calls: Cell<u32>,
    rl: RefCell<Option<Rc<RenderLoop>>>,
}

impl crate::render_loop::FrameHandler for CountingHandler {
    fn frame_requested(self: Rc<Self>) {
        self.calls.set(self.calls.get() + 1);
        if let Some(rl) = &*self.rl.borrow() {
            rl.schedule_repaint(None);
        }
    }
}

#[test]
fn repaints_requested_during_dispatch_are_deferred() {
    let (rl, _, timer, _) = test_loop(60_000, false);
    let handler = Rc::new(CountingHandler {
        calls: Cell::new(0),
        rl: RefCell::new(Some(rl.clone())),
    });
    rl.set_frame_handler(handler.clone());
    let programmed = timer.len();
    rl.dispatch();
    assert_eq!(handler.calls.get(), 1);
    assert_eq!(timer.len(), programmed + 1);
}

#[test]
fn stopped_loop_does_not_dispatch() {
    let (rl, _, _, _) = test_loop(60_000, false);
    let handler = Rc::new(CountingHandler {
        calls: Cell::new(0),
        rl: RefCell::new(None),
    });
    rl.set_frame_handler(handler.clone());
    rl.stop();
    rl.dispatch();
    assert_eq!(handler.calls.get(), 0);
}

#[test]
fn minimum_estimator_uses_the_fastest_recorded_frame() {
    let (rl, clock, timer, _) = test_loop(60_000, false);
    rl.set_render_time_estimator(RenderTimeEstimator::Minimum);
    rl.set_latency_policy(LatencyPolicy::ExtremelyLow);
    let t0 = 2_000_000_000;
    clock.now.set(t0);
    rl.begin_frame();
    clock.now.set(t0 + 9_000_000);
    rl.end_frame();
    rl.notify_frame_completed(Time::from_nsec(t0 + 9_000_000));
    let t1 = t0 + 9_000_000;
    rl.begin_frame();
    clock.now.set(t1 + 5_000_000);
    rl.end_frame();
    rl.notify_frame_completed(Time::from_nsec(t1 + 5_000_000));
    rl.schedule_repaint(None);
    let next = rl.next_presentation_ns();
    // 5ms minimum beats the 10% (1.6ms) reservation.
    assert_eq!(timer.last(), Some(next - 5_000_000 - SAFETY_MARGIN_NSEC));
}

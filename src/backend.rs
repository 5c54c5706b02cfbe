use crate::time::Time;

/// Properties of the display output that drives a render loop.
///
/// Implemented by the display backend (DRM, nested, headless). Presentation
/// feedback does not flow through this trait; the backend reports it by
/// calling `RenderLoop::notify_frame_completed` or
/// `RenderLoop::notify_frame_failed` exactly once per submitted frame.
pub trait OutputBackend {
    /// The current refresh rate in millihertz, e.g. 60_000 for 60 Hz.
    fn refresh_rate_millihz(&self) -> u32;

    /// Whether adaptive sync can currently be used on this output.
    fn vrr_capable(&self) -> bool;
}

/// The single wakeup timer of a render loop.
///
/// The embedder backs this with a timerfd or an equivalent event-loop
/// timer and calls `RenderLoop::dispatch` when it expires. Programming the
/// timer replaces any previously armed deadline; `None` disarms it.
pub trait RenderTimer {
    fn program(&self, expires: Option<Time>);
}

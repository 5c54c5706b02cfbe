use {
    std::{
        cmp::Ordering,
        fmt::{Debug, Formatter},
    },
    uapi::c,
};

#[derive(Copy, Clone)]
pub struct Time(pub c::timespec);

impl Debug for Time {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Time")
            .field("tv_sec", &self.0.tv_sec)
            .field("tv_nsec", &self.0.tv_nsec)
            .finish()
    }
}

impl Time {
    pub fn now_unchecked() -> Time {
        let mut time = uapi::pod_zeroed();
        let _ = uapi::clock_gettime(c::CLOCK_MONOTONIC, &mut time);
        Self(time)
    }

    pub fn from_nsec(nsec: u64) -> Time {
        Self(c::timespec {
            tv_sec: (nsec / 1_000_000_000) as _,
            tv_nsec: (nsec % 1_000_000_000) as _,
        })
    }

    pub fn nsec(self) -> u64 {
        let sec = self.0.tv_sec as u64 * 1_000_000_000;
        let nsec = self.0.tv_nsec as u64;
        sec + nsec
    }
}

impl Eq for Time {}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.0.tv_sec == other.0.tv_sec && self.0.tv_nsec == other.0.tv_nsec
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .tv_sec
            .cmp(&other.0.tv_sec)
            .then_with(|| self.0.tv_nsec.cmp(&other.0.tv_nsec))
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Source of monotonic timestamps.
///
/// The render loop never calls `Time::now_unchecked` directly so that tests
/// can drive the clock deterministically.
pub trait Clock {
    fn now(&self) -> Time;
}

pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Time {
        Time::now_unchecked()
    }
}

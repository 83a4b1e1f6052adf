//! Polling cadence and the clock the plan controller waits on.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Elapsed time after which dynamic polling settles on a fixed interval.
const DYNAMIC_RAMP: Duration = Duration::from_secs(600);
const DYNAMIC_CAP: Duration = Duration::from_secs(60);
const DYNAMIC_STEP_SECS: u64 = 5;

/// How long to pause between market state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterval {
    Fixed(Duration),
    /// About one twelfth of the elapsed run time, rounded up to 5 s, and
    /// 60 s once the plan has been running for ten minutes.
    Dynamic,
}

impl PollInterval {
    /// `0` selects dynamic polling.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            PollInterval::Dynamic
        } else {
            PollInterval::Fixed(Duration::from_secs(secs))
        }
    }
}

/// Wait and stop behavior for a running plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: PollInterval,
    /// Give up waiting after this long. `None` waits indefinitely.
    pub max_wait: Option<Duration>,
    /// Treat the plan as failed if the market is still `CREATED` after this
    /// many consecutive polls. `None` or `Some(0)` disables the check.
    pub stall_polls: Option<u32>,
    /// How long `stop` waits for the market to wind down.
    pub stop_timeout: Duration,
    pub stop_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: PollInterval::Dynamic,
            max_wait: None,
            stall_polls: None,
            stop_timeout: Duration::from_secs(300),
            stop_interval: Duration::from_secs(5),
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval: PollInterval::Fixed(interval),
            ..Self::default()
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Enable stalled-start detection. `0` disables it.
    pub fn with_stall_polls(mut self, polls: u32) -> Self {
        self.stall_polls = (polls > 0).then_some(polls);
        self
    }

    /// Pause before the next query, given how long the plan has been running.
    pub fn next_wait(&self, elapsed: Duration) -> Duration {
        match self.interval {
            PollInterval::Fixed(d) => d,
            PollInterval::Dynamic if elapsed >= DYNAMIC_RAMP => DYNAMIC_CAP,
            PollInterval::Dynamic => {
                let twelfth = elapsed.as_secs_f64() / 12.0;
                let secs = (twelfth.ceil() as u64).div_ceil(DYNAMIC_STEP_SECS) * DYNAMIC_STEP_SECS;
                Duration::from_secs(secs.max(DYNAMIC_STEP_SECS))
            }
        }
    }
}

/// Monotonic time source. Swapped for a manual clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Clock that only moves when slept on. Records every sleep.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }

    /// Total simulated time since construction.
    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|o| *o).unwrap_or_default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
    }
}

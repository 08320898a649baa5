//! Countdown that gates repeated OTP dispatch requests.
//!
//! The counter is shared with an optional ticker task. The ticker is owned by
//! the timer through an abort-on-drop guard, so tearing the flow down (or
//! calling [`CooldownTimer::cancel`]) never leaves a periodic task behind.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval_at, Duration, Instant, MissedTickBehavior},
};
use tracing::{debug, warn};

/// Cooldown applied after every successful dispatch.
pub const DEFAULT_COOLDOWN_SECONDS: u32 = 60;

/// Cadence of the autonomous ticker.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Ticker(JoinHandle<()>);

impl Drop for Ticker {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Read-only view of the remaining cooldown, for displays that must not borrow
/// the flow.
#[derive(Clone, Debug)]
pub struct CooldownReader(Arc<AtomicU32>);

impl CooldownReader {
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct CooldownTimer {
    remaining: Arc<AtomicU32>,
    period: Option<Duration>,
    ticker: Option<Ticker>,
}

impl CooldownTimer {
    /// A timer that only moves when [`tick`](Self::tick) is called.
    #[must_use]
    pub fn manual() -> Self {
        Self {
            remaining: Arc::new(AtomicU32::new(0)),
            period: None,
            ticker: None,
        }
    }

    /// A timer that ticks itself once per `period` while a countdown is active.
    /// Requires a tokio runtime when [`start`](Self::start) is called.
    #[must_use]
    pub fn periodic(period: Duration) -> Self {
        Self {
            period: Some(period),
            ..Self::manual()
        }
    }

    /// Begins a countdown, replacing (and aborting) any running one.
    pub fn start(&mut self, seconds: u32) {
        self.ticker = None;
        self.remaining.store(seconds, Ordering::SeqCst);

        let Some(period) = self.period else {
            return;
        };
        if seconds == 0 {
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let remaining = Arc::clone(&self.remaining);
                self.ticker = Some(Ticker(handle.spawn(run_ticker(remaining, period))));
                debug!(seconds, "cooldown started");
            }
            Err(_) => warn!("no async runtime available, cooldown will only move on manual ticks"),
        }
    }

    /// Decrements by one unit, saturating at zero. Returns the new value.
    pub fn tick(&self) -> u32 {
        decrement(&self.remaining)
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// True iff no countdown is active.
    #[must_use]
    pub fn can_dispatch(&self) -> bool {
        self.remaining() == 0
    }

    /// True while the ticker task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|ticker| !ticker.0.is_finished())
    }

    #[must_use]
    pub fn reader(&self) -> CooldownReader {
        CooldownReader(Arc::clone(&self.remaining))
    }

    /// Stops the ticker and clears the countdown.
    pub fn cancel(&mut self) {
        self.ticker = None;
        self.remaining.store(0, Ordering::SeqCst);
    }
}

impl Default for CooldownTimer {
    fn default() -> Self {
        Self::periodic(TICK_PERIOD)
    }
}

fn decrement(remaining: &AtomicU32) -> u32 {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |value| value.checked_sub(1))
        .map_or(0, |previous| previous - 1)
}

async fn run_ticker(remaining: Arc<AtomicU32>, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if decrement(&remaining) == 0 {
            debug!("cooldown elapsed");
            break;
        }
    }
}

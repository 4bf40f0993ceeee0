//! # Frame Scheduler
//!
//! Coalesces redraw requests into update cycles.
//!
//! ```text
//!            request_frame()                 refresh fires
//!   Idle ───────────────────> Requested ─────────────────> Running
//!    ▲                           ▲  ▲                        │
//!    │      wait < 0             │  │ wait == 0              │
//!    └───────────────────────────┼──┴────────────────────────┤
//!                                │                           │ wait > 0
//!              request_frame()   │                           ▼
//!              (cancels timer)   └──────────────────── Deferred
//!                                     timer fires
//! ```
//!
//! Guarantees:
//! - at most one refresh queued and at most one deferred wake pending;
//! - never both at once: a new request cancels the pending wake;
//! - any number of requests before a refresh fires produce one cycle.
//!
//! The scheduler owns no clock and no timer. The driver asks it for the
//! next deadline ([`FrameScheduler::next_wake`]), waits, and reports back.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Identity of one armed deferred wake.
///
/// Handles are never reused, so a late fire of a cancelled wake is
/// recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// The single pending deferred wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredWake {
    /// Timer identity.
    pub handle: TimerHandle,
    /// When the wake is due.
    pub wake_at: Instant,
}

/// Observable scheduler state. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Nothing pending.
    Idle,
    /// A display refresh is queued.
    Requested,
    /// An update cycle is in progress.
    Running,
    /// A deferred wake is pending.
    Deferred(DeferredWake),
}

/// What `request_frame` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOutcome {
    /// The pending wake that was cancelled, if any.
    pub cancelled_timer: Option<TimerHandle>,
    /// True when this call queued the refresh (the driver must ask the
    /// display for one); false when one was already queued.
    pub queued_refresh: bool,
}

/// What a wake-up of the driver found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The pending wake was due and has queued a refresh.
    Fired(RequestOutcome),
    /// A wake is pending but not due until the given deadline.
    NotDue(Instant),
    /// No wake is pending: it was cancelled or has already fired.
    Stale,
}

/// What the driver should do after an update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirective {
    /// A refresh is queued; run another cycle on the next display refresh.
    Continue,
    /// Sleep until the deadline, then fire the wake.
    WakeAt(Instant),
    /// Stop; nothing runs until the next external request.
    Stop,
}

/// Scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Update cycles started.
    pub cycles: u64,
    /// Requests absorbed by an already queued refresh.
    pub requests_coalesced: u64,
    /// Deferred wakes armed.
    pub timers_armed: u64,
    /// Deferred wakes cancelled before firing.
    pub timers_cancelled: u64,
    /// Cycles whose module result was a stop signal.
    pub stops: u64,
}

/// Refresh/timer coalescing state machine.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    refresh_queued: bool,
    running: bool,
    wake: Option<DeferredWake>,
    next_timer: u64,
    stats: SchedulerStats,
}

impl FrameScheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks for an update cycle on the next display refresh.
    pub fn request_frame(&mut self) -> RequestOutcome {
        let cancelled_timer = self.cancel_wake();

        if self.refresh_queued {
            self.stats.requests_coalesced += 1;
            return RequestOutcome {
                cancelled_timer,
                queued_refresh: false,
            };
        }

        self.refresh_queued = true;
        trace!("refresh queued");
        RequestOutcome {
            cancelled_timer,
            queued_refresh: true,
        }
    }

    /// Called when the display refresh fires; enters `Running`.
    ///
    /// Returns false if no refresh had been requested (an unsolicited
    /// redraw from the windowing system). The cycle runs either way, and any
    /// pending wake is cancelled since this cycle supersedes it.
    pub fn begin_refresh(&mut self) -> bool {
        let solicited = self.refresh_queued;
        self.refresh_queued = false;
        self.cancel_wake();
        self.running = true;
        self.stats.cycles += 1;
        solicited
    }

    /// Closes the running cycle with the module's wait value.
    ///
    /// `0` queues another refresh, a positive value arms a wake that many
    /// milliseconds after `now`, a negative value stops.
    pub fn finish_frame(&mut self, wait_ms: i64, now: Instant) -> FrameDirective {
        self.running = false;

        match wait_ms {
            0 => {
                self.request_frame();
                FrameDirective::Continue
            }
            ms if ms > 0 => {
                if self.refresh_queued {
                    // A request arrived during the cycle; it wins.
                    return FrameDirective::Continue;
                }
                let wake_at = now + Duration::from_millis(ms.unsigned_abs());
                let handle = TimerHandle(self.next_timer);
                self.next_timer += 1;
                self.wake = Some(DeferredWake { handle, wake_at });
                self.stats.timers_armed += 1;
                debug!(wait_ms = ms, "deferred wake armed");
                FrameDirective::WakeAt(wake_at)
            }
            _ => {
                self.stats.stops += 1;
                debug!(wait_ms, "module asked to stop updating");
                if self.refresh_queued {
                    FrameDirective::Continue
                } else {
                    FrameDirective::Stop
                }
            }
        }
    }

    /// Leaves `Running` after a failed cycle without scheduling anything.
    pub fn abort_frame(&mut self) {
        self.running = false;
    }

    /// Fires the wake identified by `handle`.
    ///
    /// Returns `None` for a stale handle (cancelled or already fired).
    pub fn fire_timer(&mut self, handle: TimerHandle) -> Option<RequestOutcome> {
        match self.wake {
            Some(wake) if wake.handle == handle => {
                self.wake = None;
                Some(self.request_frame())
            }
            _ => {
                trace!(?handle, "stale timer ignored");
                None
            }
        }
    }

    /// Fires the pending wake if its deadline has passed.
    ///
    /// An early wake-up leaves the wake armed and reports its deadline.
    pub fn fire_due(&mut self, now: Instant) -> WakeOutcome {
        match self.wake {
            Some(wake) if wake.wake_at <= now => match self.fire_timer(wake.handle) {
                Some(outcome) => WakeOutcome::Fired(outcome),
                None => WakeOutcome::Stale,
            },
            Some(wake) => WakeOutcome::NotDue(wake.wake_at),
            None => WakeOutcome::Stale,
        }
    }

    /// Deadline of the pending wake.
    #[must_use]
    pub fn next_wake(&self) -> Option<Instant> {
        self.wake.map(|wake| wake.wake_at)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ScheduleState {
        if self.running {
            ScheduleState::Running
        } else if self.refresh_queued {
            ScheduleState::Requested
        } else if let Some(wake) = self.wake {
            ScheduleState::Deferred(wake)
        } else {
            ScheduleState::Idle
        }
    }

    /// True while a display refresh is queued.
    #[must_use]
    pub fn refresh_pending(&self) -> bool {
        self.refresh_queued
    }

    /// True while a deferred wake is pending.
    #[must_use]
    pub fn timer_pending(&self) -> bool {
        self.wake.is_some()
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn cancel_wake(&mut self) -> Option<TimerHandle> {
        let wake = self.wake.take()?;
        self.stats.timers_cancelled += 1;
        trace!(handle = ?wake.handle, "deferred wake cancelled");
        Some(wake.handle)
    }
}

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

//! A single-slot watch on a byte-sized flag.
//!
//! A [`Watch`] lets one caller ask to be notified the next time an external
//! flag reaches a given value. The flag is owned and written by someone else
//! (an interrupt handler, a protocol receiver); the watch only reads it when
//! the owning main loop calls [`Watch::poll()`] or [`Watch::poll_at()`].
//!
//! operation                        | description
//! ---------------------------------|------------------------------------------
//! `Watch::register()`              | arm the slot, fails if already armed
//! `Watch::register_until()`        | arm the slot with an absolute deadline
//! `Watch::register_with_timeout()` | arm the slot with a relative deadline
//! `Watch::poll()`                  | fire the handler once if the flag matches
//! `Watch::poll_at()`               | like `poll()`, then expire past deadlines
//! `Watch::cancel()`                | disarm without notifying
//!
//! All operations are O(1) and never block.
//!
//! The slot is guarded by a critical section, so a `Watch` can be a `static`
//! and be registered from anywhere. Handlers run *after* the slot has been
//! released, which allows them to register a follow-up watch right away.
//!
//! ```
//! use event_watch::{Poll, Watch};
//! use portable_atomic::{AtomicU8, Ordering};
//!
//! static STATUS: AtomicU8 = AtomicU8::new(0);
//! static WATCH: Watch<'static> = Watch::new();
//!
//! fn on_done() {}
//!
//! WATCH.register(&STATUS, 2, Some(&on_done)).unwrap();
//! assert_eq!(WATCH.poll(), Poll::Pending);
//!
//! // Normally done by the UART interrupt.
//! STATUS.store(2, Ordering::Release);
//! assert_eq!(WATCH.poll(), Poll::Fired);
//! assert_eq!(WATCH.poll(), Poll::Idle);
//! ```

use core::{cell::RefCell, fmt};

use critical_section::Mutex;
use portable_atomic::{AtomicU8, Ordering};
use watch_log::{debug, trace};

/// Tick rate of [`Instant`] and [`Duration`]: one tick per millisecond.
pub const TICK_HZ: u32 = 1_000;

/// Point in time used for watch deadlines, in milliseconds since an arbitrary epoch.
pub type Instant = fugit::TimerInstantU64<TICK_HZ>;

/// Span of time used for watch timeouts.
pub type Duration = fugit::TimerDurationU64<TICK_HZ>;

/// Something that wants to know when a watched flag reached its value.
///
/// Any `Fn()` closure implements this, with a no-op [`Notify::on_timeout()`].
pub trait Notify {
    /// Called once, from [`Watch::poll()`], when the flag matched.
    fn on_ready(&self);

    /// Called once, from [`Watch::poll_at()`], when the deadline passed first.
    fn on_timeout(&self) {}
}

impl<F: Fn()> Notify for F {
    fn on_ready(&self) {
        self();
    }
}

/// The handler reference stored in an armed watch.
pub type Handler<'a> = &'a (dyn Notify + Sync);

/// Errors returned when registering a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Another watch is armed. Nothing was changed; retry once it fired or was cancelled.
    SlotBusy,
    /// The requested timeout cannot be represented as a deadline.
    InvalidArgument,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotBusy => f.write_str("a watch is already armed"),
            Self::InvalidArgument => f.write_str("deadline out of range"),
        }
    }
}

impl core::error::Error for Error {}

/// What a poll observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Poll {
    /// Nothing is armed.
    Idle,
    /// A watch is armed and still waiting.
    Pending,
    /// The flag matched; the watch was consumed and its handler notified.
    Fired,
    /// The deadline passed before the flag matched; the watch was consumed.
    Expired,
}

struct Armed<'a> {
    target: &'a AtomicU8,
    expected: u8,
    handler: Option<Handler<'a>>,
    deadline: Option<Instant>,
}

impl Armed<'_> {
    fn is_ready(&self) -> bool {
        self.target.load(Ordering::Acquire) == self.expected
    }

    // Raw ticks: fugit's `Ord` assumes wrap-around and flips for instants more than half the
    // range apart.
    fn is_expired(&self, now: Option<Instant>) -> bool {
        matches!(
            (now, self.deadline),
            (Some(now), Some(deadline)) if now.ticks() >= deadline.ticks()
        )
    }
}

/// A single-slot, poll-driven watch on a byte flag.
///
/// At most one watch is armed at a time. `'a` bounds the flag and the
/// handler, which must stay alive for as long as they may be armed.
pub struct Watch<'a> {
    slot: Mutex<RefCell<Option<Armed<'a>>>>,
}

impl<'a> Watch<'a> {
    /// Creates an idle watch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(None)),
        }
    }

    /// Arms the watch: notify `handler` the next time `target` reads `expected`.
    ///
    /// A `None` handler arms a silent watch, which is consumed on match
    /// without notifying anyone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SlotBusy`] if a watch is already armed. The armed
    /// watch is left untouched.
    pub fn register(
        &self,
        target: &'a AtomicU8,
        expected: u8,
        handler: Option<Handler<'a>>,
    ) -> Result<(), Error> {
        self.arm(Armed {
            target,
            expected,
            handler,
            deadline: None,
        })
    }

    /// Like [`Watch::register()`], but the watch expires once a
    /// [`Watch::poll_at()`] observes `deadline` before the flag matched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SlotBusy`] if a watch is already armed.
    pub fn register_until(
        &self,
        target: &'a AtomicU8,
        expected: u8,
        handler: Option<Handler<'a>>,
        deadline: Instant,
    ) -> Result<(), Error> {
        self.arm(Armed {
            target,
            expected,
            handler,
            deadline: Some(deadline),
        })
    }

    /// Like [`Watch::register_until()`], with the deadline `timeout` after `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `now + timeout` overflows, and
    /// [`Error::SlotBusy`] if a watch is already armed.
    pub fn register_with_timeout(
        &self,
        target: &'a AtomicU8,
        expected: u8,
        handler: Option<Handler<'a>>,
        now: Instant,
        timeout: Duration,
    ) -> Result<(), Error> {
        // `checked_add_duration` wraps when both sides share a tick rate.
        let deadline = now
            .ticks()
            .checked_add(timeout.ticks())
            .map(Instant::from_ticks)
            .ok_or(Error::InvalidArgument)?;
        self.register_until(target, expected, handler, deadline)
    }

    fn arm(&self, armed: Armed<'a>) -> Result<(), Error> {
        critical_section::with(|cs| {
            let mut slot = self.slot.borrow(cs).borrow_mut();
            if slot.is_some() {
                debug!("watch: busy, rejecting wait for {}", armed.expected);
                return Err(Error::SlotBusy);
            }
            trace!("watch: armed, waiting for {}", armed.expected);
            *slot = Some(armed);
            Ok(())
        })
    }

    /// Checks the armed watch against its flag.
    ///
    /// Deadlines are ignored; use [`Watch::poll_at()`] for those.
    pub fn poll(&self) -> Poll {
        self.check(None)
    }

    /// Checks the armed watch against its flag, then against its deadline.
    ///
    /// A flag that matched wins over a deadline that passed in the same tick.
    pub fn poll_at(&self, now: Instant) -> Poll {
        self.check(Some(now))
    }

    fn check(&self, now: Option<Instant>) -> Poll {
        let (outcome, handler) = critical_section::with(|cs| {
            let mut slot = self.slot.borrow(cs).borrow_mut();
            let outcome = match slot.as_ref() {
                None => return (Poll::Idle, None),
                Some(armed) if armed.is_ready() => Poll::Fired,
                Some(armed) if armed.is_expired(now) => Poll::Expired,
                Some(_) => return (Poll::Pending, None),
            };
            (outcome, slot.take().and_then(|armed| armed.handler))
        });

        // The slot is free again, so handlers may register right away.
        match (outcome, handler) {
            (Poll::Fired, Some(handler)) => handler.on_ready(),
            (Poll::Expired, Some(handler)) => handler.on_timeout(),
            _ => {}
        }

        if outcome == Poll::Expired {
            debug!("watch: deadline passed");
        }

        outcome
    }

    /// Disarms the watch without notifying its handler.
    ///
    /// Returns `true` if a watch was armed.
    pub fn cancel(&self) -> bool {
        let cancelled =
            critical_section::with(|cs| self.slot.borrow(cs).borrow_mut().take().is_some());
        if cancelled {
            debug!("watch: cancelled");
        }
        cancelled
    }

    /// Returns `true` while a watch is armed.
    pub fn is_armed(&self) -> bool {
        critical_section::with(|cs| self.slot.borrow(cs).borrow().is_some())
    }

    /// Returns the deadline of the armed watch, if it has one.
    pub fn deadline(&self) -> Option<Instant> {
        critical_section::with(|cs| {
            self.slot
                .borrow(cs)
                .borrow()
                .as_ref()
                .and_then(|armed| armed.deadline)
        })
    }
}

impl Default for Watch<'_> {
    fn default() -> Self {
        Self::new()
    }
}

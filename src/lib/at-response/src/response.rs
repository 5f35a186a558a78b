//! The result of one AT command, filled in by a [`Scanner`](crate::Scanner).

use core::cell::RefCell;

use critical_section::Mutex;
use portable_atomic::{AtomicU8, Ordering};

use crate::RESPONSE_MAX;

/// Progress of a command, stored as a byte so a [`Watch`](event_watch::Watch) can target it.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// No command issued since the last reset.
    Idle = 0,
    /// A command was issued and its final result code has not arrived yet.
    InProgress = 1,
    /// The final result code arrived; see [`Response::outcome()`].
    Done = 2,
    /// The command was given up on before a final result code arrived.
    TimedOut = 3,
}

impl Status {
    /// Decodes a raw status byte.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::InProgress),
            2 => Some(Self::Done),
            3 => Some(Self::TimedOut),
            _ => None,
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as u8
    }
}

/// Final result code of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// No final result code yet.
    Pending,
    /// `OK`
    Ok,
    /// `ERROR`, or an extended error without a numeric code.
    Error,
    /// `+CME ERROR: <n>` (equipment error).
    CmeError(u16),
    /// `+CMS ERROR: <n>` (message service error).
    CmsError(u16),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Ok`].
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Returns the numeric code of an extended error.
    pub fn error_code(self) -> Option<u16> {
        match self {
            Self::CmeError(code) | Self::CmsError(code) => Some(code),
            _ => None,
        }
    }
}

struct Inner<const N: usize> {
    outcome: Outcome,
    data: heapless::Vec<u8, N>,
    truncated: bool,
}

impl<const N: usize> Inner<N> {
    const fn new() -> Self {
        Self {
            outcome: Outcome::Pending,
            data: heapless::Vec::new(),
            truncated: false,
        }
    }
}

/// Output of one AT command: status flag, final result code and intermediate lines.
///
/// Intermediate lines are kept in up to `N` bytes, joined by `\n`. Bytes that do not fit
/// are dropped and reported by [`Response::truncated()`].
pub struct Response<const N: usize = RESPONSE_MAX> {
    status: AtomicU8,
    inner: Mutex<RefCell<Inner<N>>>,
}

impl<const N: usize> Response<N> {
    /// Creates an idle, empty response.
    pub const fn new() -> Self {
        Self {
            status: AtomicU8::new(Status::Idle as u8),
            inner: Mutex::new(RefCell::new(Inner::new())),
        }
    }

    /// Forgets the previous command: status `Idle`, no outcome, no data.
    pub fn reset(&self) {
        critical_section::with(|cs| {
            *self.inner.borrow(cs).borrow_mut() = Inner::new();
            self.status.store(Status::Idle.into(), Ordering::Release);
        });
    }

    pub(crate) fn start(&self) {
        critical_section::with(|cs| {
            *self.inner.borrow(cs).borrow_mut() = Inner::new();
            self.status.store(Status::InProgress.into(), Ordering::Release);
        });
    }

    pub(crate) fn push_line(&self, line: &[u8]) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let separator = if inner.data.is_empty() { None } else { Some(b'\n') };
            for byte in separator.into_iter().chain(line.iter().copied()) {
                if inner.data.push(byte).is_err() {
                    inner.truncated = true;
                    break;
                }
            }
        });
    }

    pub(crate) fn mark_truncated(&self) {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().truncated = true);
    }

    pub(crate) fn finish(&self, outcome: Outcome) {
        critical_section::with(|cs| {
            self.inner.borrow(cs).borrow_mut().outcome = outcome;
            // outcome first, so whoever sees `Done` also sees the outcome
            self.status.store(Status::Done.into(), Ordering::Release);
        });
    }

    /// Gives up on the command in progress, marking it `TimedOut`.
    ///
    /// Returns `false` if no command was in progress.
    pub fn expire(&self) -> bool {
        self.status
            .compare_exchange(
                Status::InProgress.into(),
                Status::TimedOut.into(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Current status.
    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire)).unwrap_or(Status::Idle)
    }

    /// The raw status byte, for arming a [`Watch`](event_watch::Watch) on.
    pub fn status_flag(&self) -> &AtomicU8 {
        &self.status
    }

    /// Final result code of the last command.
    pub fn outcome(&self) -> Outcome {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().outcome)
    }

    /// Returns `true` if intermediate lines did not fit, or a line was longer than the
    /// scanner's line buffer.
    pub fn truncated(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().truncated)
    }

    /// Calls `f` with the intermediate lines collected so far.
    pub fn with_data<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        critical_section::with(|cs| f(self.inner.borrow(cs).borrow().data.as_slice()))
    }
}

impl<const N: usize> Default for Response<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_byte_round_trip() {
        for status in [
            Status::Idle,
            Status::InProgress,
            Status::Done,
            Status::TimedOut,
        ] {
            assert_eq!(Status::from_u8(status.into()), Some(status));
        }
        assert_eq!(Status::from_u8(4), None);
    }

    #[test]
    fn lines_are_joined_and_truncated() {
        let response: Response<8> = Response::new();
        response.start();
        response.push_line(b"abc");
        response.push_line(b"de");
        assert!(!response.truncated());
        response.with_data(|data| assert_eq!(data, b"abc\nde"));

        response.push_line(b"fghij");
        assert!(response.truncated());
        response.with_data(|data| assert_eq!(data, b"abc\nde\nf"));
    }

    #[test]
    fn finish_sets_outcome_then_status() {
        let response: Response<8> = Response::new();
        assert_eq!(response.status(), Status::Idle);
        assert_eq!(response.outcome(), Outcome::Pending);

        response.start();
        assert_eq!(response.status(), Status::InProgress);
        response.finish(Outcome::CmeError(10));
        assert_eq!(response.status(), Status::Done);
        assert_eq!(response.outcome().error_code(), Some(10));
        assert!(!response.outcome().is_ok());
    }

    #[test]
    fn expire_only_while_in_progress() {
        let response: Response<8> = Response::new();
        assert!(!response.expire());

        response.start();
        assert!(response.expire());
        assert_eq!(response.status(), Status::TimedOut);

        response.start();
        response.finish(Outcome::Ok);
        assert!(!response.expire());
        assert_eq!(response.status(), Status::Done);
    }

    #[test]
    fn reset_clears_everything() {
        let response: Response<8> = Response::new();
        response.start();
        response.push_line(b"123456789");
        response.finish(Outcome::Error);

        response.reset();
        assert_eq!(response.status(), Status::Idle);
        assert_eq!(response.outcome(), Outcome::Pending);
        assert!(!response.truncated());
        response.with_data(|data| assert!(data.is_empty()));
    }
}

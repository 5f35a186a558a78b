//! AT command response handling on top of [`event_watch`].
//!
//! A command round trip looks like this:
//!
//! 1. [`Scanner::begin()`] marks the shared [`Response`] in progress, then the command is
//!    written to the modem.
//! 2. [`listen()`] arms a [`Watch`] on the response's status byte becoming
//!    [`Status::Done`].
//! 3. The UART receive interrupt pushes bytes into an [`RxQueue`]; the main loop hands them
//!    to [`Scanner::drain()`], which completes the response on the final result code.
//! 4. The main loop's next [`Watch::poll()`] notifies the handler, which reads
//!    [`Response::outcome()`] and [`Response::with_data()`].
//!
//! Buffer sizes are fixed at build time:
//!
//! variable                     | default | used for
//! -----------------------------|---------|----------------------------------
//! `CONFIG_AT_LINE_MAX`         | 80      | [`Scanner`] and [`Console`] lines
//! `CONFIG_AT_RESPONSE_MAX`     | 128     | [`Response`] data
//! `CONFIG_AT_RX_QUEUE_SIZE`    | 256     | [`RxQueue`] slots
//! `CONFIG_AT_WATCH_TIMEOUT_MS` | 5000    | [`DEFAULT_TIMEOUT`]

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod console;
mod response;
mod scanner;

pub use console::{Command, Console, DispatchError};
pub use event_watch::{Duration, Handler, Instant, Notify, Poll, Watch};
pub use response::{Outcome, Response, Status};
pub use scanner::Scanner;

/// Maximum length of a modem or console line.
pub const LINE_MAX: usize = watch_utils::usize_from_env_or!("CONFIG_AT_LINE_MAX", 80);

/// Capacity of [`Response`] data.
pub const RESPONSE_MAX: usize = watch_utils::usize_from_env_or!("CONFIG_AT_RESPONSE_MAX", 128);

/// Slots in the receive queue; one less byte than this can be queued.
pub const RX_QUEUE_SIZE: usize = watch_utils::usize_from_env_or!("CONFIG_AT_RX_QUEUE_SIZE", 256);

const DEFAULT_TIMEOUT_MS: u64 =
    watch_utils::u64_from_env_or!("CONFIG_AT_WATCH_TIMEOUT_MS", 5000);

/// Timeout for [`listen_with_timeout()`] when the command has no specific one.
pub const DEFAULT_TIMEOUT: Duration = Duration::millis(DEFAULT_TIMEOUT_MS);

/// Queue between the UART receive interrupt (producer) and the [`Scanner`] (consumer).
pub type RxQueue = heapless::spsc::Queue<u8, RX_QUEUE_SIZE>;

/// Arms `watch` to notify `handler` once `response` is [`Status::Done`].
///
/// # Errors
///
/// Returns [`event_watch::Error::SlotBusy`] if `watch` is already armed.
pub fn listen<'a, const N: usize>(
    watch: &Watch<'a>,
    response: &'a Response<N>,
    handler: Option<Handler<'a>>,
) -> Result<(), event_watch::Error> {
    watch.register(response.status_flag(), Status::Done.into(), handler)
}

/// Like [`listen()`], giving up `timeout` after `now`.
///
/// On expiry the handler's [`Notify::on_timeout()`] runs; it usually calls
/// [`Response::expire()`] so late output is treated as unsolicited.
///
/// # Errors
///
/// Returns [`event_watch::Error::SlotBusy`] if `watch` is already armed, and
/// [`event_watch::Error::InvalidArgument`] if the deadline overflows.
pub fn listen_with_timeout<'a, const N: usize>(
    watch: &Watch<'a>,
    response: &'a Response<N>,
    handler: Option<Handler<'a>>,
    now: Instant,
    timeout: Duration,
) -> Result<(), event_watch::Error> {
    watch.register_with_timeout(
        response.status_flag(),
        Status::Done.into(),
        handler,
        now,
        timeout,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Capture<'r> {
        response: &'r Response<64>,
        data: Mutex<Option<(Outcome, Vec<u8>)>>,
        timeouts: Mutex<u32>,
    }

    impl<'r> Capture<'r> {
        fn new(response: &'r Response<64>) -> Self {
            Self {
                response,
                data: Mutex::new(None),
                timeouts: Mutex::new(0),
            }
        }
    }

    impl Notify for Capture<'_> {
        fn on_ready(&self) {
            let outcome = self.response.outcome();
            let data = self.response.with_data(<[u8]>::to_vec);
            *self.data.lock().unwrap() = Some((outcome, data));
        }

        fn on_timeout(&self) {
            self.response.expire();
            *self.timeouts.lock().unwrap() += 1;
        }
    }

    #[test]
    fn config_defaults() {
        assert_eq!(LINE_MAX, 80);
        assert_eq!(RESPONSE_MAX, 128);
        assert_eq!(RX_QUEUE_SIZE, 256);
        assert_eq!(DEFAULT_TIMEOUT, Duration::millis(5000));
    }

    #[test]
    fn read_imei_round_trip() {
        let response: Response<64> = Response::new();
        let capture = Capture::new(&response);
        let watch = Watch::new();
        let mut queue: heapless::spsc::Queue<u8, 64> = heapless::spsc::Queue::new();
        let (mut tx, mut rx) = queue.split();
        let mut scanner: Scanner<'_, 64, 32> = Scanner::new(&response);

        scanner.begin();
        listen(&watch, &response, Some(&capture)).unwrap();

        // a second command while the first is pending is refused
        assert_eq!(
            listen(&watch, &response, None),
            Err(event_watch::Error::SlotBusy)
        );

        for &byte in b"AT+GSN\r\r\n866425030000000\r\n" {
            tx.enqueue(byte).unwrap();
        }
        scanner.drain(&mut rx);
        assert_eq!(watch.poll(), Poll::Pending);

        for &byte in b"\r\nOK\r\n" {
            tx.enqueue(byte).unwrap();
        }
        scanner.drain(&mut rx);
        assert_eq!(watch.poll(), Poll::Fired);
        assert_eq!(watch.poll(), Poll::Idle);

        let captured = capture.data.lock().unwrap().take();
        assert_eq!(captured, Some((Outcome::Ok, b"866425030000000".to_vec())));
    }

    #[test]
    fn silent_modem_times_out() {
        let response: Response<64> = Response::new();
        let capture = Capture::new(&response);
        let watch = Watch::new();
        let mut scanner: Scanner<'_, 64, 32> = Scanner::new(&response);
        let start = Instant::from_ticks(10_000);

        scanner.begin();
        listen_with_timeout(&watch, &response, Some(&capture), start, DEFAULT_TIMEOUT).unwrap();

        assert_eq!(watch.poll_at(start + Duration::millis(4_999)), Poll::Pending);
        assert_eq!(watch.poll_at(start + DEFAULT_TIMEOUT), Poll::Expired);
        assert_eq!(*capture.timeouts.lock().unwrap(), 1);
        assert_eq!(response.status(), Status::TimedOut);

        // the late answer no longer completes anything
        for &byte in b"OK\r\n" {
            scanner.feed(byte);
        }
        assert_eq!(response.status(), Status::TimedOut);
        assert_eq!(scanner.unsolicited(), 1);
        assert!(capture.data.lock().unwrap().is_none());
    }

    #[test]
    fn next_command_after_completion() {
        let response: Response<64> = Response::new();
        let first = Capture::new(&response);
        let second = Capture::new(&response);
        let watch = Watch::new();
        let mut scanner: Scanner<'_, 64, 32> = Scanner::new(&response);

        scanner.begin();
        listen(&watch, &response, Some(&first)).unwrap();
        for &byte in b"ERROR\r\n" {
            scanner.feed(byte);
        }
        assert_eq!(watch.poll(), Poll::Fired);

        scanner.begin();
        listen(&watch, &response, Some(&second)).unwrap();
        // `begin()` reset the status, so the old `Done` does not fire the new watch
        assert_eq!(watch.poll(), Poll::Pending);
        for &byte in b"+CME ERROR: 3\r\n" {
            scanner.feed(byte);
        }
        assert_eq!(watch.poll(), Poll::Fired);

        assert_eq!(
            first.data.lock().unwrap().take(),
            Some((Outcome::Error, Vec::new()))
        );
        assert_eq!(
            second.data.lock().unwrap().take(),
            Some((Outcome::CmeError(3), Vec::new()))
        );
    }
}

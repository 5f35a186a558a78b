//! Matches modem output against the command in progress.

use heapless::spsc::Consumer;
use watch_log::{debug, trace};

use crate::{
    response::{Outcome, Response, Status},
    LINE_MAX, RESPONSE_MAX,
};

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Echo,
    Final(Outcome),
    Data,
}

fn classify(line: &[u8]) -> Line {
    if line == b"OK" {
        Line::Final(Outcome::Ok)
    } else if line == b"ERROR" {
        Line::Final(Outcome::Error)
    } else if let Some(rest) = line.strip_prefix(b"+CME ERROR:") {
        Line::Final(parse_code(rest).map_or(Outcome::Error, Outcome::CmeError))
    } else if let Some(rest) = line.strip_prefix(b"+CMS ERROR:") {
        Line::Final(parse_code(rest).map_or(Outcome::Error, Outcome::CmsError))
    } else if line.starts_with(b"AT") {
        Line::Echo
    } else {
        Line::Data
    }
}

// Verbose error reports (`+CME ERROR: SIM not inserted`) carry no number.
fn parse_code(rest: &[u8]) -> Option<u16> {
    core::str::from_utf8(rest).ok()?.trim().parse().ok()
}

/// Assembles modem output into lines and completes the [`Response`] it is bound to.
///
/// Lines end at `\r` or `\n`; lines longer than `L` bytes are cut to `L`, kept as data and
/// reported through [`Response::truncated()`]. While a command is in progress, command echo
/// (lines starting with `AT`) and blank lines are skipped, final result codes complete the
/// response, and everything else is collected as response data.
/// Lines seen while no command is in progress are counted as unsolicited and dropped.
pub struct Scanner<'r, const N: usize = RESPONSE_MAX, const L: usize = LINE_MAX> {
    response: &'r Response<N>,
    line: heapless::Vec<u8, L>,
    // the current line lost bytes past `L`
    overflowed: bool,
    unsolicited: u32,
}

impl<'r, const N: usize, const L: usize> Scanner<'r, N, L> {
    /// Creates a scanner that reports into `response`.
    pub const fn new(response: &'r Response<N>) -> Self {
        Self {
            response,
            line: heapless::Vec::new(),
            overflowed: false,
            unsolicited: 0,
        }
    }

    /// Starts a new command: the response is cleared and marked in progress.
    ///
    /// Call this right before writing the command to the modem.
    pub fn begin(&mut self) {
        self.line.clear();
        self.overflowed = false;
        self.response.start();
    }

    /// Consumes one byte of modem output.
    pub fn feed(&mut self, byte: u8) {
        match byte {
            b'\r' | b'\n' => self.end_line(),
            // overlong lines keep their first `L` bytes
            _ => {
                if self.line.push(byte).is_err() {
                    self.overflowed = true;
                }
            }
        }
    }

    /// Feeds every byte queued by the receive interrupt. Returns how many were consumed.
    pub fn drain<const Q: usize>(&mut self, rx: &mut Consumer<'_, u8, Q>) -> usize {
        let mut count = 0;
        while let Some(byte) = rx.dequeue() {
            self.feed(byte);
            count += 1;
        }
        count
    }

    /// Number of lines received while no command was in progress.
    pub fn unsolicited(&self) -> u32 {
        self.unsolicited
    }

    fn end_line(&mut self) {
        if self.line.is_empty() {
            return;
        }

        if self.response.status() == Status::InProgress {
            match classify(&self.line) {
                Line::Echo => trace!("at: echo"),
                // a cut line is never a final result code, whatever its prefix reads
                Line::Data | Line::Final(_) if self.overflowed => {
                    self.response.push_line(&self.line);
                    self.response.mark_truncated();
                }
                Line::Data => self.response.push_line(&self.line),
                Line::Final(outcome) => {
                    debug!("at: final result {:?}", outcome);
                    self.response.finish(outcome);
                }
            }
        } else {
            self.unsolicited = self.unsolicited.wrapping_add(1);
            trace!("at: unsolicited line ({} so far)", self.unsolicited);
        }

        self.line.clear();
        self.overflowed = false;
    }
}

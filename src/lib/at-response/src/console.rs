//! Line-based command console for a debug UART.
//!
//! Bytes typed on the console are collected into a line; a line is executed by looking up
//! its exact text in a table of [`Command`]s.

use core::fmt;

use watch_log::warn;

use crate::LINE_MAX;

/// A console command: typing `name` runs `handler`.
pub struct Command<'a> {
    /// Exact line that selects this command.
    pub name: &'a str,
    /// Runs the command, typically writing an AT command and arming a watch.
    pub handler: &'a dyn Fn(),
}

/// Errors from running a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// No command has this name.
    Unknown,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("can't recognize command"),
        }
    }
}

impl core::error::Error for DispatchError {}

/// Runs the command named `line`.
///
/// # Errors
///
/// Returns [`DispatchError::Unknown`] if no entry of `commands` is named `line`.
pub fn dispatch(commands: &[Command<'_>], line: &str) -> Result<(), DispatchError> {
    let command = commands
        .iter()
        .find(|command| command.name == line)
        .ok_or(DispatchError::Unknown)?;
    (command.handler)();
    Ok(())
}

/// Collects console input into lines of at most `L` bytes.
pub struct Console<const L: usize = LINE_MAX> {
    line: heapless::Vec<u8, L>,
}

impl<const L: usize> Console<L> {
    /// Creates a console with an empty line.
    pub const fn new() -> Self {
        Self {
            line: heapless::Vec::new(),
        }
    }

    /// Consumes one input byte.
    ///
    /// On `\r` or `\n` the collected line is dispatched and the result returned; blank
    /// lines are skipped. Input beyond `L` bytes is dropped.
    pub fn feed(
        &mut self,
        byte: u8,
        commands: &[Command<'_>],
    ) -> Option<Result<(), DispatchError>> {
        match byte {
            b'\r' | b'\n' => {
                if self.line.is_empty() {
                    return None;
                }
                let result = core::str::from_utf8(&self.line)
                    .map_err(|_| DispatchError::Unknown)
                    .and_then(|line| dispatch(commands, line));
                if result.is_err() {
                    warn!("console: unknown command");
                }
                self.line.clear();
                Some(result)
            }
            _ => {
                let _ = self.line.push(byte);
                None
            }
        }
    }

    /// The line typed so far.
    pub fn pending(&self) -> &[u8] {
        &self.line
    }
}

impl<const L: usize> Default for Console<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn dispatches_exact_names() {
        let imei = Cell::new(0);
        let ip = Cell::new(0);
        let commands = [
            Command {
                name: "imei",
                handler: &|| imei.set(imei.get() + 1),
            },
            Command {
                name: "ip",
                handler: &|| ip.set(ip.get() + 1),
            },
        ];

        assert_eq!(dispatch(&commands, "ip"), Ok(()));
        assert_eq!(dispatch(&commands, "imei"), Ok(()));
        assert_eq!(dispatch(&commands, "im"), Err(DispatchError::Unknown));
        assert_eq!(dispatch(&commands, "imei "), Err(DispatchError::Unknown));
        assert_eq!((imei.get(), ip.get()), (1, 1));
    }

    #[test]
    fn console_runs_line_on_terminator() {
        let sleeps = Cell::new(0);
        let commands = [Command {
            name: "sleep",
            handler: &|| sleeps.set(sleeps.get() + 1),
        }];
        let mut console: Console<16> = Console::new();

        let mut results = [None, None];
        let mut n = 0;
        for &byte in b"sleep\r\nwake\r\n" {
            if let Some(result) = console.feed(byte, &commands) {
                if let Some(slot) = results.get_mut(n) {
                    *slot = Some(result);
                }
                n += 1;
            }
        }

        assert_eq!(n, 2);
        assert_eq!(results, [Some(Ok(())), Some(Err(DispatchError::Unknown))]);
        assert_eq!(sleeps.get(), 1);
        assert!(console.pending().is_empty());
    }

    #[test]
    fn overlong_input_is_cut() {
        let mut console: Console<4> = Console::new();
        for &byte in b"gpsstart" {
            assert_eq!(console.feed(byte, &[]), None);
        }
        assert_eq!(console.pending(), b"gpss");
        assert_eq!(console.feed(b'\r', &[]), Some(Err(DispatchError::Unknown)));
    }

    #[test]
    fn invalid_utf8_is_unknown() {
        let mut console: Console<4> = Console::new();
        console.feed(0xff, &[]);
        assert_eq!(console.feed(b'\n', &[]), Some(Err(DispatchError::Unknown)));
    }
}

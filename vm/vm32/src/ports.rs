//! Port-mapped devices reached through IN/OUT.
//!
//! Ports 0–7 belong to the console, 8–15 to the timer. Reserved ports
//! read as zero and swallow writes.

use crate::errors::VmError;
use crate::machine::Vm;
use std::time::{Duration, Instant};

/// Standard input/output, one byte at a time.
pub const PORT_STDIO: u16 = 0;
/// Standard error, write-only.
pub const PORT_STDERR: u16 = 1;
/// Elapsed timer milliseconds.
pub const PORT_TIMER_VALUE: u16 = 8;
/// Timer control: 0 stop, 1 start, 2 reset.
pub const PORT_TIMER_CONTROL: u16 = 9;

pub const TIMER_STOP: u32 = 0;
pub const TIMER_START: u32 = 1;
pub const TIMER_RESET: u32 = 2;

/// A stopwatch on the host clock. Accumulates across stop/start;
/// reset zeroes it without changing the running state.
pub(crate) struct Timer {
    running: bool,
    since: Instant,
    accumulated: Duration,
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            running: false,
            since: Instant::now(),
            accumulated: Duration::ZERO,
        }
    }

    pub fn value_ms(&self) -> u32 {
        let mut elapsed = self.accumulated;
        if self.running {
            elapsed += self.since.elapsed();
        }
        elapsed.as_millis() as u32
    }

    pub fn control(&mut self, command: u32) {
        match command {
            TIMER_STOP => {
                if self.running {
                    self.accumulated += self.since.elapsed();
                    self.running = false;
                }
            }
            TIMER_START => {
                if !self.running {
                    self.since = Instant::now();
                    self.running = true;
                }
            }
            TIMER_RESET => {
                self.accumulated = Duration::ZERO;
                self.since = Instant::now();
            }
            other => log::warn!("ignoring unknown timer command {other}"),
        }
    }
}

impl Vm {
    pub(crate) fn port_read(&mut self, port: u16) -> Result<u32, VmError> {
        match port {
            PORT_STDIO => Ok(self.console.read_byte()?.unwrap_or(0) as u32),
            PORT_TIMER_VALUE => Ok(self.timer.value_ms()),
            PORT_TIMER_CONTROL => Ok(self.timer.running as u32),
            _ => Ok(0),
        }
    }

    pub(crate) fn port_write(&mut self, port: u16, value: u32) -> Result<(), VmError> {
        match port {
            PORT_STDIO => {
                self.console.write_out(&[value as u8])?;
                self.console.flush()?;
            }
            PORT_STDERR => {
                self.console.write_err(&[value as u8])?;
                self.console.flush()?;
            }
            PORT_TIMER_CONTROL => self.timer.control(value),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn timer_accumulates_only_while_running() {
        let mut timer = Timer::new();
        assert_eq!(timer.value_ms(), 0);

        timer.control(TIMER_START);
        thread::sleep(Duration::from_millis(15));
        timer.control(TIMER_STOP);
        let stopped_at = timer.value_ms();
        assert!(stopped_at >= 10);

        thread::sleep(Duration::from_millis(10));
        assert_eq!(timer.value_ms(), stopped_at);

        timer.control(TIMER_RESET);
        assert_eq!(timer.value_ms(), 0);
    }
}

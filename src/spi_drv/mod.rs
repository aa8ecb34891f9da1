pub mod bus;
pub mod cs;
pub mod driver;
#[cfg(feature = "stm32f4")]
pub mod f4;
pub mod regs;
pub mod ring;
pub mod state;
pub mod timeout;

use core::fmt;

use crate::constants;

pub use bus::Bus;
pub use cs::ChipSelect;
pub use driver::{Diagnostics, Driver};
pub use regs::{Interrupts, Registers, Status};
pub use ring::RingBuffer;
pub use state::State;
pub use timeout::{Deadline, Duration, Instant, Monotonic};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
  /// A received byte arrived before the previous one was read.
  BusOverrun,
  ModeFault,
  FrameError,
  /// The peripheral needed transmit data before it was supplied.
  Underrun,
  Timeout,
  /// The receive ring lapped its reader and dropped bytes.
  BufferOverrun,
  InvalidRequest,
  /// Transfer torn down by `Driver::abort` before it completed.
  Aborted,
}

impl Error {
  /// Kinds raised by the peripheral itself and recovered in the interrupt.
  pub fn is_hardware(self) -> bool {
    matches!(self, Error::BusOverrun | Error::ModeFault | Error::FrameError | Error::Underrun)
  }

  /// First hardware error found in `status`, checked in the order the
  /// interrupt handler services them.
  pub fn from_status(status: Status) -> Option<Error> {
    if status.contains(Status::OVR) {
      Some(Error::BusOverrun)
    } else if status.contains(Status::MODF) {
      Some(Error::ModeFault)
    } else if status.contains(Status::TIFRE) {
      Some(Error::FrameError)
    } else if status.contains(Status::UDR) {
      Some(Error::Underrun)
    } else {
      None
    }
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Error::BusOverrun => "receive overrun",
      Error::ModeFault => "mode fault",
      Error::FrameError => "frame format error",
      Error::Underrun => "transmit underrun",
      Error::Timeout => "transfer timed out",
      Error::BufferOverrun => "receive ring overrun",
      Error::InvalidRequest => "invalid transfer request",
      Error::Aborted => "transfer aborted",
    };
    f.write_str(s)
  }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
  Tx,
  Rx,
  TxRx,
}

impl Direction {
  /// `None` when both sides are empty.
  pub fn from_lengths(send_len: usize, recv_len: usize) -> Option<Direction> {
    match (send_len, recv_len) {
      (0, 0) => None,
      (_, 0) => Some(Direction::Tx),
      (0, _) => Some(Direction::Rx),
      (_, _) => Some(Direction::TxRx),
    }
  }

  pub fn sends(self) -> bool {
    self != Direction::Rx
  }

  pub fn receives(self) -> bool {
    self != Direction::Tx
  }
}

/// Where the interrupt puts received bytes before the caller collects them.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RxPath {
  /// Straight into the per-transfer staging buffer.
  Direct,
  /// Through the ring buffer, drained by the caller after completion.
  Ring,
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
  pub timeout: Duration,
  pub rx_path: RxPath,
  pub dummy_byte: u8,
}

impl Config {
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn rx_path(mut self, rx_path: RxPath) -> Self {
    self.rx_path = rx_path;
    self
  }

  pub fn dummy_byte(mut self, byte: u8) -> Self {
    self.dummy_byte = byte;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Config {
      timeout: Duration::millis(constants::SPI_TIMEOUT_MS),
      rx_path: if cfg!(feature = "rx-ring") { RxPath::Ring } else { RxPath::Direct },
      dummy_byte: constants::DUMMY_BYTE,
    }
  }
}

// Capability contract offered to device drivers. A peripheral implements only
// the traits it can actually serve; every call returns once the transfer has
// completed, failed, or timed out.

pub trait Initialize {
  fn initialize(&mut self) -> bool;
}

pub trait Transmit {
  fn transmit(&mut self, send: &[u8]) -> bool;
}

pub trait Receive {
  fn receive(&mut self, recv: &mut [u8]) -> bool;
}

pub trait TransmitReceive {
  fn transmit_receive(&mut self, send: &[u8], recv: &mut [u8]) -> bool;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn direction_from_lengths() {
    assert_eq!(Direction::from_lengths(0, 0), None);
    assert_eq!(Direction::from_lengths(3, 0), Some(Direction::Tx));
    assert_eq!(Direction::from_lengths(0, 1), Some(Direction::Rx));
    assert_eq!(Direction::from_lengths(2, 5), Some(Direction::TxRx));
  }

  #[test]
  fn overrun_wins_over_other_flags() {
    let status = Status::UDR | Status::OVR | Status::MODF;
    assert_eq!(Error::from_status(status), Some(Error::BusOverrun));
    assert_eq!(Error::from_status(Status::UDR), Some(Error::Underrun));
    assert_eq!(Error::from_status(Status::EOT | Status::SUSP), None);
  }

  #[test]
  fn default_timeout_is_ten_ms() {
    let cfg = Config::default();
    assert_eq!(cfg.timeout.ticks(), constants::TICK_HZ / 100);
  }
}

//! Register-level view of the SPI block the engine drives.
//!
//! Flag names and bit positions follow the STM32 SPI v2 status (SR) and
//! interrupt enable (IER) layout. Parts without some of these flags (the F4
//! block has no DXP or EOT) synthesize them in their `Registers` adapter.

use bitflags::bitflags;

use crate::spi_drv::Direction;

bitflags! {
  /// Pending-event and error flags (SR).
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct Status: u32 {
    /// Receive packet available.
    const RXP = 1 << 0;
    /// Transmit slot free.
    const TXP = 1 << 1;
    /// Duplex packet: RXP and TXP at once.
    const DXP = 1 << 2;
    /// End of transfer, the programmed size has been exchanged.
    const EOT = 1 << 3;
    const TXTF = 1 << 4;
    const UDR = 1 << 5;
    const OVR = 1 << 6;
    const CRCE = 1 << 7;
    /// TI mode frame format error.
    const TIFRE = 1 << 8;
    const MODF = 1 << 9;
    const TSERF = 1 << 10;
    /// Master transfer suspended.
    const SUSP = 1 << 11;

    const ERRORS = Self::UDR.bits() | Self::OVR.bits() | Self::TIFRE.bits() | Self::MODF.bits();
    const DATA = Self::RXP.bits() | Self::TXP.bits() | Self::DXP.bits();
  }
}

bitflags! {
  /// Interrupt sources (IER). Bits line up with `Status`.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct Interrupts: u32 {
    const RXP = 1 << 0;
    const TXP = 1 << 1;
    const DXP = 1 << 2;
    const EOT = 1 << 3;
    const TXTF = 1 << 4;
    const UDR = 1 << 5;
    const OVR = 1 << 6;
    const CRCE = 1 << 7;
    const TIFRE = 1 << 8;
    const MODF = 1 << 9;
    const TSERF = 1 << 10;

    const DATA = Self::RXP.bits() | Self::TXP.bits() | Self::DXP.bits();
  }
}

impl Interrupts {
  /// Sources armed when a transfer in `direction` starts.
  pub fn for_direction(direction: Direction) -> Interrupts {
    let common = Interrupts::EOT | Interrupts::MODF | Interrupts::TIFRE;
    match direction {
      Direction::Tx => common | Interrupts::TXP | Interrupts::UDR,
      Direction::Rx => common | Interrupts::RXP | Interrupts::OVR,
      Direction::TxRx => common | Interrupts::DXP | Interrupts::UDR | Interrupts::OVR,
    }
  }
}

/// Pending flags that are also enabled as interrupt sources.
pub fn cause(status: Status, enabled: Interrupts) -> Status {
  status & Status::from_bits_truncate(enabled.bits())
}

/// Named operations on one SPI peripheral instance.
///
/// Implemented by the target adapter and by the simulated register file the
/// tests drive. Calls must not block: they run in interrupt context.
pub trait Registers {
  fn status(&self) -> Status;

  /// Currently enabled interrupt sources.
  fn interrupts(&self) -> Interrupts;

  fn listen(&mut self, sources: Interrupts);

  fn unlisten(&mut self, sources: Interrupts);

  /// Clears latched flags. Data flags are cleared by moving data, not here.
  fn clear(&mut self, flags: Status);

  fn set_direction(&mut self, direction: Direction);

  /// Number of frames the peripheral exchanges before raising EOT.
  fn set_transfer_size(&mut self, frames: u16);

  fn enable(&mut self);

  fn disable(&mut self);

  fn is_enabled(&self) -> bool;

  /// Master transfer start.
  fn start(&mut self);

  fn write_data(&mut self, byte: u8);

  fn read_data(&mut self) -> u8;
}

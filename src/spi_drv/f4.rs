//! `Registers` for the STM32F4 SPI block.
//!
//! The F4 peripheral only has RXNE/TXE and no transfer size, so this adapter
//! counts frames itself and synthesizes DXP and EOT from those counts. It
//! always runs the block full duplex: in a send-only transfer received bytes
//! are read and dropped here, and they are what marks the end of the last
//! frame. In a receive-only transfer the dummy bytes that clock data in are
//! written here.
//!
//! TXE and RXNE are separate events on this block and rarely coincide, so DXP
//! is seldom reported. A duplex frame is then serviced as a transmit-only
//! interrupt followed by a receive-only one. Byte order and counts are
//! unaffected, but the one-interrupt-per-exchange pairing only holds on
//! blocks that report DXP natively.

use core::cell::Cell;
use core::ops::Deref;

use cortex_m::peripheral::DWT;
use stm32f4xx_hal::stm32::spi1::RegisterBlock;

use crate::constants::DUMMY_BYTE;
use crate::spi_drv::regs::{Interrupts, Registers, Status};
use crate::spi_drv::{Direction, Instant, Monotonic};

pub struct F4Spi<SPI> {
  spi: SPI,
  direction: Direction,
  size: u16,
  sent: Cell<u16>,
  received: Cell<u16>,
  started: Cell<bool>,
  listening: Interrupts,
}

impl<SPI> F4Spi<SPI>
where
  SPI: Deref<Target = RegisterBlock>,
{
  /// Takes a peripheral already configured as master (clock, mode, baud
  /// rate and pins set up through `stm32f4xx_hal::spi::Spi`, then `free`d).
  pub fn new(spi: SPI) -> Self {
    spi.cr1.modify(|_, w| w.spe().clear_bit());
    spi.cr2.modify(|_, w| w.txeie().clear_bit().rxneie().clear_bit().errie().clear_bit());

    F4Spi {
      spi,
      direction: Direction::TxRx,
      size: 0,
      sent: Cell::new(0),
      received: Cell::new(0),
      started: Cell::new(false),
      listening: Interrupts::empty(),
    }
  }

  pub fn free(self) -> SPI {
    self.spi
  }

  fn frames_done(&self) -> bool {
    self.started.get() && self.received.get() >= self.size
  }

  // drop a byte nobody asked for, only in send-only transfers
  fn absorb(&self) {
    if self.direction == Direction::Tx && self.spi.sr.read().rxne().bit_is_set() {
      let _ = self.spi.dr.read().dr().bits();
      self.received.set(self.received.get() + 1);
    }
  }

  // last frame of a send-only transfer: wait it out so EOT is already
  // visible when the engine checks for it, instead of closing mid-byte
  fn settle(&self) {
    while self.received.get() < self.size {
      let sr = self.spi.sr.read();
      if sr.rxne().bit_is_set() {
        let _ = self.spi.dr.read().dr().bits();
        self.received.set(self.received.get() + 1);
      } else if sr.txe().bit_is_set() && sr.bsy().bit_is_clear() {
        // nothing left on the wire
        break;
      }
    }
  }

  fn sync_cr2(&self) {
    let started = self.started.get();
    let txe = started
      && self.sent.get() < self.size
      && self.listening.intersects(Interrupts::TXP | Interrupts::DXP);
    let rxne = started
      && (self.listening.intersects(Interrupts::RXP | Interrupts::DXP)
        || (self.direction == Direction::Tx && self.listening.contains(Interrupts::EOT)));
    let err = self.listening.intersects(Interrupts::OVR | Interrupts::MODF | Interrupts::TIFRE | Interrupts::UDR);

    self.spi.cr2.modify(|_, w| w.txeie().bit(txe).rxneie().bit(rxne).errie().bit(err));
  }

  fn write_dummy_if_needed(&self) {
    if self.direction == Direction::Rx && self.sent.get() < self.size {
      self.spi.dr.write(|w| unsafe { w.dr().bits(u16::from(DUMMY_BYTE)) });
      self.sent.set(self.sent.get() + 1);
    }
  }
}

impl<SPI> Registers for F4Spi<SPI>
where
  SPI: Deref<Target = RegisterBlock>,
{
  fn status(&self) -> Status {
    self.absorb();
    let sr = self.spi.sr.read();
    let mut status = Status::empty();

    let tx_ready = sr.txe().bit_is_set() && self.sent.get() < self.size && self.direction.sends();
    let rx_ready = sr.rxne().bit_is_set() && self.direction.receives();
    if tx_ready {
      status |= Status::TXP;
    }
    if rx_ready {
      status |= Status::RXP;
    }
    if tx_ready && rx_ready {
      status |= Status::DXP;
    }
    if self.frames_done() {
      status |= Status::EOT | Status::TXTF;
    }

    if sr.ovr().bit_is_set() {
      status |= Status::OVR;
    }
    if sr.modf().bit_is_set() {
      status |= Status::MODF;
    }
    if sr.fre().bit_is_set() {
      status |= Status::TIFRE;
    }
    if sr.udr().bit_is_set() {
      status |= Status::UDR;
    }
    status
  }

  fn interrupts(&self) -> Interrupts {
    let mut irq = self.listening;
    if irq.contains(Interrupts::DXP) {
      irq |= Interrupts::TXP | Interrupts::RXP;
    }
    irq
  }

  fn listen(&mut self, sources: Interrupts) {
    self.listening |= sources;
    // TXE and RXNE are separate lines here, keep RX armed after TX drains
    if sources.contains(Interrupts::DXP) {
      self.listening |= Interrupts::TXP | Interrupts::RXP;
    }
    self.sync_cr2();
  }

  fn unlisten(&mut self, sources: Interrupts) {
    self.listening &= !sources;
    self.sync_cr2();
  }

  fn clear(&mut self, flags: Status) {
    if flags.contains(Status::OVR) {
      // DR then SR read
      let _ = self.spi.dr.read().dr().bits();
      let _ = self.spi.sr.read().bits();
    }
    if flags.contains(Status::MODF) {
      // SR read then CR1 write
      let _ = self.spi.sr.read().bits();
      self.spi.cr1.modify(|_, w| w);
    }
    if flags.contains(Status::TIFRE) {
      let _ = self.spi.sr.read().bits();
    }
    if flags.intersects(Status::EOT | Status::TXTF) {
      self.started.set(false);
    }
  }

  fn set_direction(&mut self, direction: Direction) {
    self.direction = direction;
  }

  fn set_transfer_size(&mut self, frames: u16) {
    self.size = frames;
  }

  fn enable(&mut self) {
    self.spi.cr1.modify(|_, w| w.spe().set_bit());
  }

  fn disable(&mut self) {
    self.started.set(false);
    self.sync_cr2();
    self.spi.cr1.modify(|_, w| w.spe().clear_bit());
  }

  fn is_enabled(&self) -> bool {
    self.spi.cr1.read().spe().bit_is_set()
  }

  fn start(&mut self) {
    self.sent.set(0);
    self.received.set(0);
    self.started.set(true);
    self.write_dummy_if_needed();
    self.sync_cr2();
  }

  fn write_data(&mut self, byte: u8) {
    self.spi.dr.write(|w| unsafe { w.dr().bits(u16::from(byte)) });
    self.sent.set(self.sent.get() + 1);
    if self.direction == Direction::Tx && self.sent.get() == self.size {
      self.settle();
    }
    self.sync_cr2();
  }

  fn read_data(&mut self) -> u8 {
    let byte = self.spi.dr.read().dr().bits() as u8;
    self.received.set(self.received.get() + 1);
    self.write_dummy_if_needed();
    self.sync_cr2();
    byte
  }
}

/// DWT cycle counter as the wait tick source. Needs the counter enabled in
/// `init` (`DCB::enable_trace`, `DWT::enable_cycle_counter`).
pub struct DwtClock;

impl Monotonic for DwtClock {
  fn now(&self) -> Instant {
    Instant::from_ticks(DWT::get_cycle_count())
  }
}

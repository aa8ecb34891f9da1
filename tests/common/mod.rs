//! Host-side stand-ins for the SPI block, the CS pin, the tick source and the
//! RTIC resource lock.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;
use rtic_core::Mutex;

use stm32f4_spi::spi_drv::regs;
use stm32f4_spi::spi_drv::{
  ChipSelect,
  Config,
  Direction,
  Driver,
  Instant,
  Interrupts,
  Monotonic,
  Registers,
  State,
  Status,
};

pub type TestDriver = Driver<SimRegisters, SimPin>;

/// Register file that exchanges one frame per data-register access. Bytes
/// written land in `mosi`; reads pop `miso` (0xFF once it is empty). EOT is
/// raised as soon as the programmed number of frames has been exchanged,
/// unless built with `without_eot`.
pub struct SimRegisters {
  latched: Status,
  irq: Interrupts,
  enabled: bool,
  started: bool,
  direction: Direction,
  size: u16,
  frames: u16,
  wrote: bool,
  read: bool,
  eot: bool,
  pub miso: VecDeque<u8>,
  pub mosi: Vec<u8>,
  pub starts: u32,
}

impl SimRegisters {
  pub fn new() -> Self {
    SimRegisters {
      latched: Status::empty(),
      irq: Interrupts::empty(),
      enabled: false,
      started: false,
      direction: Direction::TxRx,
      size: 0,
      frames: 0,
      wrote: false,
      read: false,
      eot: true,
      miso: VecDeque::new(),
      mosi: Vec::new(),
      starts: 0,
    }
  }

  pub fn with_miso(bytes: &[u8]) -> Self {
    let mut sim = SimRegisters::new();
    sim.miso.extend(bytes.iter().copied());
    sim
  }

  /// Moves data normally but never reports end-of-transfer.
  pub fn without_eot() -> Self {
    let mut sim = SimRegisters::new();
    sim.eot = false;
    sim
  }

  /// Latches flags as if the hardware raised them.
  pub fn raise(&mut self, flags: Status) {
    self.latched |= flags;
  }

  /// An enabled source has a pending flag.
  pub fn pending(&self) -> bool {
    !regs::cause(self.status(), self.irq).is_empty()
  }

  fn step(&mut self) {
    let tx_ok = !self.direction.sends() || self.wrote;
    let rx_ok = !self.direction.receives() || self.read;
    if tx_ok && rx_ok {
      self.frames += 1;
      self.wrote = false;
      self.read = false;
      if self.frames == self.size && self.eot {
        self.latched |= Status::EOT | Status::TXTF;
      }
    }
  }
}

impl Registers for SimRegisters {
  fn status(&self) -> Status {
    let mut status = self.latched;
    if self.enabled && self.started && self.frames < self.size {
      let tx = self.direction.sends() && !self.wrote;
      let rx = self.direction.receives() && !self.read;
      if tx {
        status |= Status::TXP;
      }
      if rx {
        status |= Status::RXP;
      }
      if tx && rx {
        status |= Status::DXP;
      }
    }
    status
  }

  fn interrupts(&self) -> Interrupts {
    self.irq
  }

  fn listen(&mut self, sources: Interrupts) {
    self.irq |= sources;
  }

  fn unlisten(&mut self, sources: Interrupts) {
    self.irq &= !sources;
  }

  fn clear(&mut self, flags: Status) {
    self.latched &= !flags;
  }

  fn set_direction(&mut self, direction: Direction) {
    self.direction = direction;
  }

  fn set_transfer_size(&mut self, frames: u16) {
    self.size = frames;
  }

  fn enable(&mut self) {
    self.enabled = true;
  }

  fn disable(&mut self) {
    self.enabled = false;
    self.started = false;
  }

  fn is_enabled(&self) -> bool {
    self.enabled
  }

  fn start(&mut self) {
    self.started = true;
    self.frames = 0;
    self.wrote = false;
    self.read = false;
    self.starts += 1;
  }

  fn write_data(&mut self, byte: u8) {
    self.mosi.push(byte);
    self.wrote = true;
    self.step();
  }

  fn read_data(&mut self) -> u8 {
    let byte = self.miso.pop_front().unwrap_or(0xFF);
    self.read = true;
    self.step();
    byte
  }
}

/// Output pin that records every level written, `true` for high.
#[derive(Default)]
pub struct SimPin {
  pub levels: Vec<bool>,
}

impl OutputPin for SimPin {
  type Error = Infallible;

  fn set_low(&mut self) -> Result<(), Self::Error> {
    self.levels.push(false);
    Ok(())
  }

  fn set_high(&mut self) -> Result<(), Self::Error> {
    self.levels.push(true);
    Ok(())
  }
}

/// Clock that moves forward by `step` ticks every time it is read.
pub struct SimClock {
  now: Cell<u32>,
  step: u32,
  first: Cell<Option<u32>>,
  last: Cell<u32>,
}

impl SimClock {
  pub fn new(step: u32) -> Self {
    SimClock {
      now: Cell::new(0),
      step,
      first: Cell::new(None),
      last: Cell::new(0),
    }
  }

  pub fn starting_at(start: u32, step: u32) -> Self {
    let clock = SimClock::new(step);
    clock.now.set(start);
    clock
  }

  /// Ticks between the first and the last reading.
  pub fn span(&self) -> u32 {
    self.last.get().wrapping_sub(self.first.get().unwrap_or(0))
  }

  pub fn reads(&self) -> u32 {
    self.span() / self.step + 1
  }
}

impl Monotonic for SimClock {
  fn now(&self) -> Instant {
    let t = self.now.get();
    if self.first.get().is_none() {
      self.first.set(Some(t));
    }
    self.last.set(t);
    self.now.set(t.wrapping_add(self.step));
    Instant::from_ticks(t)
  }
}

/// Resource lock for the caller side. Before each lock window it lets one
/// pending interrupt run, the way the SPI1 task preempts `idle` between polls.
pub struct Preempting {
  pub spi: TestDriver,
  pub deliver: bool,
  pub interrupts: u32,
  pub states: Vec<State>,
}

impl Preempting {
  pub fn new(spi: TestDriver) -> Self {
    let states = vec![spi.state()];
    Preempting { spi, deliver: true, interrupts: 0, states }
  }

  pub fn muted(spi: TestDriver) -> Self {
    let mut lock = Preempting::new(spi);
    lock.deliver = false;
    lock
  }

  /// States seen, with consecutive repeats folded.
  pub fn transitions(&self) -> Vec<State> {
    let mut out = self.states.clone();
    out.dedup();
    out
  }

  fn record(&mut self) {
    self.states.push(self.spi.state());
  }
}

impl Mutex for Preempting {
  type T = TestDriver;

  fn lock<R>(&mut self, f: impl FnOnce(&mut TestDriver) -> R) -> R {
    if self.deliver && self.spi.registers().pending() {
      self.spi.on_interrupt();
      self.interrupts += 1;
      self.record();
    }
    let r = f(&mut self.spi);
    self.record();
    r
  }
}

pub fn driver(sim: SimRegisters, config: Config) -> TestDriver {
  let mut spi = Driver::new(sim, ChipSelect::software(SimPin::default()), config);
  spi.initialize();
  spi
}

pub fn pin(spi: &TestDriver) -> &SimPin {
  spi.chip_select().pin().unwrap()
}

/// Runs the interrupt handler until nothing enabled is pending.
pub fn pump(spi: &mut TestDriver) -> u32 {
  let mut count = 0;
  while spi.registers().pending() {
    spi.on_interrupt();
    count += 1;
    assert!(count < 100_000, "interrupt storm");
  }
  count
}

/// One millisecond in ticks.
pub const MS: u32 = stm32f4_spi::constants::TICK_HZ / 1_000;

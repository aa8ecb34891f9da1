use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;
use log::{debug, warn};

use crate::constants::{MAX_TRANSFER_LEN, RX_RING_SIZE};
use crate::spi_drv::regs::{self, Interrupts, Registers, Status};
use crate::spi_drv::state::{Action, Event, State};
use crate::spi_drv::{ChipSelect, Config, Direction, Error, RingBuffer, RxPath};

/// Snapshot of the counters kept across transfers.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Diagnostics {
  pub state: State,
  pub error_count: u32,
  pub timeout_count: u32,
  pub last_error: Option<Error>,
  pub rx_overrun: bool,
}

/// Transaction context for one SPI peripheral.
///
/// Created once at start-up and shared between the caller, which starts a
/// transfer and then polls for it, and the peripheral's interrupt, which
/// moves the bytes and closes the transfer. While the state is busy only the
/// interrupt writes the transfer fields; the caller goes back to writing
/// them once the state is `Ready` again.
pub struct Driver<R, P> {
  regs: R,
  cs: ChipSelect<P>,
  config: Config,
  state: State,
  tx_buffer: [u8; MAX_TRANSFER_LEN],
  tx_index: usize,
  tx_remaining: usize,
  // dummy frames sent after the data in an uneven duplex transfer
  tx_padding: usize,
  rx_buffer: [u8; MAX_TRANSFER_LEN],
  rx_len: usize,
  rx_remaining: usize,
  rx_discard: usize,
  ring: RingBuffer<RX_RING_SIZE>,
  // ring bytes already handed to the waiter
  rx_taken: usize,
  tx_done: bool,
  rx_done: bool,
  outcome: Option<Error>,
  last_error: Option<Error>,
  error_count: u32,
  timeout_count: u32,
}

impl<R, P> Driver<R, P>
where
  R: Registers,
  P: OutputPin<Error = Infallible>,
{
  pub fn new(regs: R, cs: ChipSelect<P>, config: Config) -> Self {
    Driver {
      regs,
      cs,
      config,
      state: State::Ready,
      tx_buffer: [0; MAX_TRANSFER_LEN],
      tx_index: 0,
      tx_remaining: 0,
      tx_padding: 0,
      rx_buffer: [0; MAX_TRANSFER_LEN],
      rx_len: 0,
      rx_remaining: 0,
      rx_discard: 0,
      ring: RingBuffer::new(),
      rx_taken: 0,
      tx_done: true,
      rx_done: true,
      outcome: None,
      last_error: None,
      error_count: 0,
      timeout_count: 0,
    }
  }

  /// Quiesces the peripheral, releases chip select and resets every counter.
  /// A transfer still in flight is aborted first.
  pub fn initialize(&mut self) {
    if self.state.is_busy() {
      self.abort();
    }

    self.regs.unlisten(Interrupts::all());
    self.regs.disable();
    self.regs.clear(Status::all());
    self.cs.reset();

    self.state = State::Ready;
    self.tx_index = 0;
    self.tx_remaining = 0;
    self.tx_padding = 0;
    self.rx_len = 0;
    self.rx_remaining = 0;
    self.rx_discard = 0;
    self.rx_taken = 0;
    self.ring.clear();
    self.ring.clear_overrun();
    self.tx_done = true;
    self.rx_done = true;
    self.outcome = None;
    self.last_error = None;
    self.error_count = 0;
    self.timeout_count = 0;
  }

  /// Starts a transfer of `send` out and `recv_len` bytes in.
  ///
  /// Rejected with `InvalidRequest`, before anything is touched, when both
  /// lengths are zero, a length exceeds what can be staged, or a transfer is
  /// still running.
  pub fn start(&mut self, send: &[u8], recv_len: usize) -> Result<(), Error> {
    let direction = Direction::from_lengths(send.len(), recv_len).ok_or(Error::InvalidRequest)?;

    let recv_limit = match self.config.rx_path {
      RxPath::Direct => MAX_TRANSFER_LEN,
      RxPath::Ring => usize::from(u16::MAX),
    };
    if send.len() > MAX_TRANSFER_LEN || recv_len > recv_limit {
      return Err(Error::InvalidRequest);
    }

    let (state, action) = self.state.next(&Event::Start(direction));
    match action {
      Action::Begin(d) => {
        self.state = state;
        self.begin(d, send, recv_len);
        Ok(())
      }
      _ => {
        debug!("spi start rejected in {:?}", self.state);
        Err(Error::InvalidRequest)
      }
    }
  }

  fn begin(&mut self, direction: Direction, send: &[u8], recv_len: usize) {
    let frames = send.len().max(recv_len);

    // fits, checked in start()
    self.tx_buffer[..send.len()].copy_from_slice(send);
    self.tx_index = 0;
    self.tx_remaining = send.len();
    self.tx_padding = if direction.sends() { frames - send.len() } else { 0 };

    self.rx_len = 0;
    self.ring.clear();
    self.rx_taken = 0;
    self.rx_remaining = recv_len;
    self.rx_discard = if direction.receives() { frames - recv_len } else { 0 };

    self.tx_done = !direction.sends();
    self.rx_done = !direction.receives();
    self.outcome = None;

    self.cs.assert();

    self.regs.clear(Status::EOT | Status::TXTF | Status::SUSP | Status::ERRORS);
    self.regs.set_direction(direction);
    // frames <= u16::MAX, checked in start()
    self.regs.set_transfer_size(frames as u16);
    self.regs.enable();
    self.regs.listen(Interrupts::for_direction(direction));

    debug!("spi start {:?}: {} out, {} in", direction, send.len(), recv_len);
    self.regs.start();
  }

  /// Interrupt handler body. Moves at most one frame in each direction.
  pub fn on_interrupt(&mut self) {
    let status = self.regs.status();
    let cause = regs::cause(status, self.regs.interrupts());

    // duplex first so a paired exchange is never split across two calls
    let handled = if cause.contains(Status::DXP) && !cause.intersects(Status::OVR | Status::UDR) {
      self.push_tx();
      self.pull_rx();
      if self.tx_exhausted() && self.rx_exhausted() {
        self.regs.unlisten(Interrupts::DATA);
      }
      true
    } else if cause.contains(Status::RXP) && !cause.contains(Status::OVR) {
      self.pull_rx();
      if self.rx_exhausted() {
        self.regs.unlisten(Interrupts::RXP | Interrupts::DXP);
      }
      true
    } else if cause.contains(Status::TXP) && !cause.contains(Status::UDR) {
      self.push_tx();
      if self.tx_exhausted() {
        self.regs.unlisten(Interrupts::TXP | Interrupts::DXP);
      }
      true
    } else {
      false
    };

    if handled {
      if self.state.is_busy() && self.tx_exhausted() && self.rx_exhausted() && !self.finish() {
        if self.regs.status().contains(Status::SUSP) {
          // the EOT interrupt acknowledges SUSP, then finalizes
          self.regs.unlisten(Interrupts::DATA);
          self.regs.listen(Interrupts::EOT);
        } else {
          self.complete();
          debug!("spi transfer closed without end-of-transfer");
        }
      }
      return;
    }

    self.finish();
    self.handle_error();
  }

  fn push_tx(&mut self) {
    if self.tx_remaining > 0 {
      let byte = self.tx_buffer[self.tx_index];
      self.tx_index += 1;
      self.tx_remaining -= 1;
      self.regs.write_data(byte);
    } else if self.tx_padding > 0 {
      self.tx_padding -= 1;
      self.regs.write_data(self.config.dummy_byte);
    }
  }

  fn pull_rx(&mut self) {
    // always read, a pending byte left in the data register keeps RXP set
    let byte = self.regs.read_data();

    if self.rx_remaining > 0 {
      self.rx_remaining -= 1;
      match self.config.rx_path {
        // fits, checked in start()
        RxPath::Direct => {
          self.rx_buffer[self.rx_len] = byte;
          self.rx_len += 1;
        }
        RxPath::Ring => self.ring.write(byte),
      }
    } else if self.rx_discard > 0 {
      self.rx_discard -= 1;
    }
  }

  fn tx_exhausted(&self) -> bool {
    self.tx_remaining == 0 && self.tx_padding == 0
  }

  fn rx_exhausted(&self) -> bool {
    self.rx_remaining == 0 && self.rx_discard == 0
  }

  /// Closes the transfer if the peripheral reports end-of-transfer. Returns
  /// false, changing nothing, if it does not (or is suspended).
  fn finish(&mut self) -> bool {
    let status = self.regs.status();
    if !status.contains(Status::EOT) || status.contains(Status::SUSP) {
      return false;
    }

    if !self.complete() {
      return false;
    }
    debug!("spi transfer complete");
    true
  }

  // Busy -> Ready with the exit actions, whether or not EOT was seen
  fn complete(&mut self) -> bool {
    let (state, action) = self.state.next(&Event::EndOfTransfer);
    if action != Action::Finish {
      return false;
    }

    self.regs.clear(Status::EOT | Status::TXTF);
    self.state = state;
    self.close();
    true
  }

  // exit actions shared by every way out of a busy state
  fn close(&mut self) {
    self.regs.unlisten(Interrupts::all());
    self.regs.disable();
    self.cs.deassert();
    self.tx_done = true;
    self.rx_done = true;
  }

  /// Recovers from whichever hardware error flag is latched. With no flag
  /// set this does nothing, so calling it again is harmless.
  pub fn handle_error(&mut self) {
    let status = self.regs.status();

    // suspend raised together with EOT re-triggers forever unless acknowledged
    if status.contains(Status::SUSP | Status::EOT) {
      self.regs.clear(Status::SUSP);
      return;
    }

    let error = match Error::from_status(status) {
      Some(e) => e,
      None => return,
    };

    self.regs.clear(status & Status::ERRORS);
    self.regs.unlisten(Interrupts::all());
    self.regs.disable();

    let was_busy = self.state.is_busy();
    let (state, action) = self.state.next(&Event::Fault(error));
    if let Action::RecordFault(e) = action {
      self.state = state;
      self.last_error = Some(e);
      self.error_count += 1;
      warn!("spi fault: {}", e);
    }

    self.cs.deassert();
    if was_busy {
      self.outcome = Some(error);
      self.tx_done = true;
      self.rx_done = true;
    }

    (self.state, ..) = self.state.next(&Event::Recover);
  }

  /// Tears down a running transfer. Any waiter is released with `Aborted`.
  /// Returns false when nothing was running.
  pub fn abort(&mut self) -> bool {
    let (state, action) = self.state.next(&Event::Abort);
    if action != Action::Teardown {
      return false;
    }
    self.state = state;

    self.regs.unlisten(Interrupts::all());
    self.regs.disable();
    self.regs.clear(Status::all());
    self.cs.deassert();
    self.outcome = Some(Error::Aborted);
    self.tx_done = true;
    self.rx_done = true;
    warn!("spi transfer aborted");

    (self.state, ..) = self.state.next(&Event::Recover);
    true
  }

  /// Caller side of the wait. `WouldBlock` until the interrupt has finished
  /// the transfer, then copies the received bytes into `recv`.
  ///
  /// On the ring path every call, finished or not, moves what the ring holds
  /// into `recv` after the bytes taken by earlier calls, so the ring only has
  /// to cover the gap between two polls. If it lapped anyway, the bytes it
  /// dropped are missing from `recv` and `check_rx_overrun` reports the loss.
  pub fn poll(&mut self, recv: &mut [u8]) -> nb::Result<(), Error> {
    let done = self.tx_done && self.rx_done;

    if self.config.rx_path == RxPath::Ring && self.outcome.is_none() {
      if let Some(rest) = recv.get_mut(self.rx_taken..) {
        self.rx_taken += self.ring.drain(rest);
      }
    }

    if !done {
      return Err(nb::Error::WouldBlock);
    }

    if let Some(e) = self.outcome.take() {
      return Err(nb::Error::Other(e));
    }

    if self.config.rx_path == RxPath::Direct {
      let n = self.rx_len.min(recv.len());
      recv[..n].copy_from_slice(&self.rx_buffer[..n]);
    }

    self.rx_len = 0;
    self.rx_taken = 0;
    Ok(())
  }

  /// Called by the waiter when its deadline passes. The transfer is left
  /// running; the interrupt still closes it when the hardware finishes.
  pub fn note_timeout(&mut self) {
    self.timeout_count += 1;
    warn!("spi transfer timed out in {:?}", self.state);
  }

  /// Reports and clears a lapped receive ring.
  pub fn check_rx_overrun(&mut self) -> Result<(), Error> {
    if self.ring.overrun() {
      self.ring.clear_overrun();
      return Err(Error::BufferOverrun);
    }
    Ok(())
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn tx_remaining(&self) -> usize {
    self.tx_remaining
  }

  pub fn rx_remaining(&self) -> usize {
    self.rx_remaining
  }

  pub fn error_count(&self) -> u32 {
    self.error_count
  }

  pub fn timeout_count(&self) -> u32 {
    self.timeout_count
  }

  pub fn diagnostics(&self) -> Diagnostics {
    Diagnostics {
      state: self.state,
      error_count: self.error_count,
      timeout_count: self.timeout_count,
      last_error: self.last_error,
      rx_overrun: self.ring.overrun(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn chip_select(&self) -> &ChipSelect<P> {
    &self.cs
  }

  pub fn registers(&self) -> &R {
    &self.regs
  }

  pub fn registers_mut(&mut self) -> &mut R {
    &mut self.regs
  }
}

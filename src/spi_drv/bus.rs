use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;
use rtic_core::Mutex;

use crate::spi_drv::{
  Deadline,
  Driver,
  Error,
  Initialize,
  Monotonic,
  Receive,
  Registers,
  Transmit,
  TransmitReceive,
};

/// Blocking front end used from the caller context.
///
/// The driver is reached only through `M`'s lock, one short critical section
/// per step (start, each poll, timeout bookkeeping), so the peripheral's
/// interrupt runs between polls and completes the transfer.
pub struct Bus<M, C> {
  spi: M,
  clock: C,
}

impl<M, C, R, P> Bus<M, C>
where
  M: Mutex<T = Driver<R, P>>,
  C: Monotonic,
  R: Registers,
  P: OutputPin<Error = Infallible>,
{
  pub fn new(spi: M, clock: C) -> Self {
    Bus { spi, clock }
  }

  /// Sends `send` and receives `recv.len()` bytes, returning once the
  /// interrupt has finished the transfer or the configured timeout passed.
  pub fn transfer(&mut self, send: &[u8], recv: &mut [u8]) -> Result<(), Error> {
    let recv_len = recv.len();
    let limit = self.spi.lock(|spi| spi.start(send, recv_len).map(|()| spi.config().timeout))?;
    let deadline = Deadline::start(&self.clock, limit);

    loop {
      match self.spi.lock(|spi| spi.poll(recv)) {
        Ok(()) => return Ok(()),
        Err(nb::Error::Other(e)) => return Err(e),
        Err(nb::Error::WouldBlock) => (),
      }

      if deadline.expired(self.clock.now()) {
        self.spi.lock(|spi| spi.note_timeout());
        return Err(Error::Timeout);
      }
    }
  }

  /// Runs `f` with the driver locked, e.g. to read diagnostics.
  pub fn with_driver<T>(&mut self, f: impl FnOnce(&mut Driver<R, P>) -> T) -> T {
    self.spi.lock(f)
  }

  pub fn free(self) -> (M, C) {
    (self.spi, self.clock)
  }
}

impl<M, C, R, P> Initialize for Bus<M, C>
where
  M: Mutex<T = Driver<R, P>>,
  C: Monotonic,
  R: Registers,
  P: OutputPin<Error = Infallible>,
{
  fn initialize(&mut self) -> bool {
    self.spi.lock(|spi| spi.initialize());
    true
  }
}

impl<M, C, R, P> TransmitReceive for Bus<M, C>
where
  M: Mutex<T = Driver<R, P>>,
  C: Monotonic,
  R: Registers,
  P: OutputPin<Error = Infallible>,
{
  fn transmit_receive(&mut self, send: &[u8], recv: &mut [u8]) -> bool {
    self.transfer(send, recv).is_ok()
  }
}

impl<M, C, R, P> Transmit for Bus<M, C>
where
  M: Mutex<T = Driver<R, P>>,
  C: Monotonic,
  R: Registers,
  P: OutputPin<Error = Infallible>,
{
  fn transmit(&mut self, send: &[u8]) -> bool {
    self.transfer(send, &mut []).is_ok()
  }
}

impl<M, C, R, P> Receive for Bus<M, C>
where
  M: Mutex<T = Driver<R, P>>,
  C: Monotonic,
  R: Registers,
  P: OutputPin<Error = Infallible>,
{
  fn receive(&mut self, recv: &mut [u8]) -> bool {
    self.transfer(&[], recv).is_ok()
  }
}

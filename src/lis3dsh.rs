use core::fmt;

use crate::spi_drv::{Transmit, TransmitReceive};

const READ_MASK: u8 = 0x80;
const WRITE_MASK: u8 = 0x00;

/// Expected WHO_AM_I contents.
pub const DEVICE_ID: u8 = 0x3F;

// longest burst read, one full XYZ sample
const MAX_READ: usize = 6;

pub mod register {
  pub const WHO_AM_I: u8 = 0x0F;
  pub const CTRL_REG4: u8 = 0x20;
  pub const CTRL_REG6: u8 = 0x25;
  pub const STATUS: u8 = 0x27;
  pub const OUT_X_L: u8 = 0x28;
}

// 100 Hz, block data update, X/Y/Z on
const CTRL_REG4_100HZ_XYZ: u8 = 0x6F;
// register address auto-increment for burst reads
const CTRL_REG6_ADD_INC: u8 = 0x10;
// new X, Y and Z data available
const STATUS_ZYXDA: u8 = 0x08;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
  /// The SPI transfer failed or timed out.
  Bus,
  /// WHO_AM_I did not match, carries what was read.
  NotDetected(u8),
  /// Burst longer than one sample.
  TooLong,
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::Bus => write!(f, "spi transfer failed"),
      Error::NotDetected(id) => write!(f, "unexpected device id {:#04x}", id),
      Error::TooLong => write!(f, "read longer than {} bytes", MAX_READ),
    }
  }
}

/// LIS3DSH accelerometer on any bus that can send and exchange bytes.
pub struct Lis3dsh<B> {
  bus: B,
}

impl<B> Lis3dsh<B>
where
  B: Transmit + TransmitReceive,
{
  pub fn new(bus: B) -> Self {
    Lis3dsh { bus }
  }

  /// Checks the device id, then enables all three axes at 100 Hz.
  pub fn init(&mut self) -> Result<(), Error> {
    let id = self.who_am_i()?;
    if id != DEVICE_ID {
      return Err(Error::NotDetected(id));
    }

    self.write_register(register::CTRL_REG6, CTRL_REG6_ADD_INC)?;
    self.write_register(register::CTRL_REG4, CTRL_REG4_100HZ_XYZ)
  }

  pub fn who_am_i(&mut self) -> Result<u8, Error> {
    self.read_register(register::WHO_AM_I)
  }

  pub fn read_register(&mut self, reg: u8) -> Result<u8, Error> {
    let mut value = [0u8; 1];
    self.read_registers(reg, &mut value)?;
    Ok(value[0])
  }

  /// Burst read starting at `reg`, needs auto-increment for more than one byte.
  pub fn read_registers(&mut self, reg: u8, out: &mut [u8]) -> Result<(), Error> {
    if out.len() > MAX_READ {
      return Err(Error::TooLong);
    }

    // the first byte comes back while the address is still going out
    let mut rx = [0u8; MAX_READ + 1];
    let rx = &mut rx[..out.len() + 1];
    if !self.bus.transmit_receive(&[reg | READ_MASK], rx) {
      return Err(Error::Bus);
    }

    out.copy_from_slice(&rx[1..]);
    Ok(())
  }

  pub fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error> {
    if self.bus.transmit(&[reg | WRITE_MASK, value]) {
      Ok(())
    } else {
      Err(Error::Bus)
    }
  }

  pub fn data_ready(&mut self) -> Result<bool, Error> {
    Ok(self.read_register(register::STATUS)? & STATUS_ZYXDA != 0)
  }

  /// Raw X, Y, Z output, little endian on the wire.
  pub fn read_acceleration(&mut self) -> Result<[i16; 3], Error> {
    let mut raw = [0u8; MAX_READ];
    self.read_registers(register::OUT_X_L, &mut raw)?;

    Ok([
      i16::from_le_bytes([raw[0], raw[1]]),
      i16::from_le_bytes([raw[2], raw[3]]),
      i16::from_le_bytes([raw[4], raw[5]]),
    ])
  }

  pub fn bus_mut(&mut self) -> &mut B {
    &mut self.bus
  }

  pub fn free(self) -> B {
    self.bus
  }
}

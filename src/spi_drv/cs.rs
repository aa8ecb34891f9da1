use core::convert::Infallible;
use embedded_hal::digital::v2::OutputPin;

/// Chip-select line for one bus instance.
///
/// `Hardware` means the peripheral drives NSS itself; every operation on it is
/// a no-op. `Software` owns a GPIO output (the port clock is already running
/// once the HAL hands the pin out) and tracks the level it last drove so that
/// repeated assert/deassert calls do not produce extra edges.
pub enum ChipSelect<P> {
  Hardware,
  Software { pin: P, asserted: bool, edges: u32 },
}

impl<P> ChipSelect<P>
where
  P: OutputPin<Error = Infallible>,
{
  /// Binds `pin` and drives it inactive before any transfer can run.
  pub fn software(mut pin: P) -> Self {
    drive_high(&mut pin);
    ChipSelect::Software { pin, asserted: false, edges: 0 }
  }

  pub fn hardware() -> Self {
    ChipSelect::Hardware
  }

  pub fn assert(&mut self) {
    if let ChipSelect::Software { pin, asserted, edges } = self {
      if !*asserted {
        drive_low(pin);
        *asserted = true;
        *edges += 1;
      }
    }
  }

  pub fn deassert(&mut self) {
    if let ChipSelect::Software { pin, asserted, edges } = self {
      if *asserted {
        drive_high(pin);
        *asserted = false;
        *edges += 1;
      }
    }
  }

  /// Forces the line inactive regardless of the tracked level.
  pub fn reset(&mut self) {
    if let ChipSelect::Software { pin, asserted, .. } = self {
      drive_high(pin);
      *asserted = false;
    }
  }

  pub fn is_asserted(&self) -> bool {
    match self {
      ChipSelect::Hardware => false,
      ChipSelect::Software { asserted, .. } => *asserted,
    }
  }

  /// Level changes driven since the line was bound.
  pub fn edges(&self) -> u32 {
    match self {
      ChipSelect::Hardware => 0,
      ChipSelect::Software { edges, .. } => *edges,
    }
  }

  pub fn pin(&self) -> Option<&P> {
    match self {
      ChipSelect::Hardware => None,
      ChipSelect::Software { pin, .. } => Some(pin),
    }
  }
}

fn drive_low<P: OutputPin<Error = Infallible>>(pin: &mut P) {
  pin.set_low().unwrap_or_else(|e| match e {})
}

fn drive_high<P: OutputPin<Error = Infallible>>(pin: &mut P) {
  pin.set_high().unwrap_or_else(|e| match e {})
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct Pin {
    high: bool,
    writes: u32,
  }

  impl OutputPin for Pin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
      self.high = false;
      self.writes += 1;
      Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
      self.high = true;
      self.writes += 1;
      Ok(())
    }
  }

  #[test]
  fn binding_drives_inactive() {
    let cs = ChipSelect::software(Pin::default());
    let pin = cs.pin().unwrap();
    assert!(pin.high);
    assert!(!cs.is_asserted());
    assert_eq!(cs.edges(), 0);
  }

  #[test]
  fn assert_and_deassert_are_idempotent() {
    let mut cs = ChipSelect::software(Pin::default());
    cs.assert();
    cs.assert();
    assert!(cs.is_asserted());
    assert!(!cs.pin().unwrap().high);

    cs.deassert();
    cs.deassert();
    assert!(cs.pin().unwrap().high);
    assert_eq!(cs.edges(), 2);
    // bind + one low + one high
    assert_eq!(cs.pin().unwrap().writes, 3);
  }

  #[test]
  fn hardware_line_is_a_no_op() {
    let mut cs: ChipSelect<Pin> = ChipSelect::hardware();
    cs.assert();
    assert!(!cs.is_asserted());
    cs.deassert();
    assert_eq!(cs.edges(), 0);
    assert!(cs.pin().is_none());
  }
}

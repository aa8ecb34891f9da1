use crate::constants;

pub const fn convert_us_to_cycles(us: u32) -> u32 {
  us * (constants::CPU_FREQ / 1_000_000)
}

pub const fn convert_ms_to_ticks(ms: u32) -> u32 {
  ms * (constants::TICK_HZ / 1_000)
}

/// Log sink that prints over semihosting, but only while a debugger is
/// attached. Semihosting calls hard fault without a host on the other end.
#[cfg(feature = "stm32f4")]
pub mod debugger {
  use core::sync::atomic::{AtomicBool, Ordering};
  use cortex_m_semihosting::hprintln;
  use log::{LevelFilter, Log, Metadata, Record};

  // DHCSR, bit 0 is C_DEBUGEN
  const DHCSR: usize = 0xE000_EDF0;

  static ENABLED: AtomicBool = AtomicBool::new(false);
  static LOGGER: Debugger = Debugger;

  struct Debugger;

  impl Log for Debugger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
      ENABLED.load(Ordering::Relaxed)
    }

    fn log(&self, record: &Record) {
      if self.enabled(record.metadata()) {
        hprintln!("[{}] {}: {}", record.level(), record.target(), record.args()).ok();
      }
    }

    fn flush(&self) {}
  }

  pub fn is_connected() -> bool {
    let r = DHCSR as *const u32;
    unsafe { core::ptr::read_volatile(r) & 1 == 1 }
  }

  pub fn init(level: LevelFilter) {
    ENABLED.store(is_connected(), Ordering::Relaxed);

    // a second init keeps the first logger, the level still applies
    log::set_logger(&LOGGER).ok();
    log::set_max_level(level);
  }
}

#![no_main]
#![no_std]

use panic_semihosting as _;

use stm32f4_spi::spi_drv::f4::F4Spi;
use stm32f4_spi::spi_drv::Driver;
use stm32f4xx_hal::{
  gpio::gpioe::PE3,
  gpio::Output,
  gpio::PushPull,
  stm32::SPI1,
};

type SpiDriver = Driver<F4Spi<SPI1>, PE3<Output<PushPull>>>;

#[rtic::app(device = stm32f4xx_hal::stm32, peripherals = true)]
mod app {
  use cortex_m::asm;
  use embedded_hal::spi::MODE_3;
  use log::{error, info, warn, LevelFilter};
  use rtic::Mutex;
  use stm32f4xx_hal::{prelude::*, spi::Spi, stm32};

  use stm32f4_spi::constants;
  use stm32f4_spi::lis3dsh::Lis3dsh;
  use stm32f4_spi::spi_drv::f4::{DwtClock, F4Spi};
  use stm32f4_spi::spi_drv::{Bus, ChipSelect, Config, Driver};
  use stm32f4_spi::util::{self, debugger};

  use super::SpiDriver;

  #[resources]
  struct Resources {
    spi: SpiDriver,
  }

  #[init]
  fn init(cx: init::Context) -> init::LateResources {
    let mut core = cx.core;
    core.DCB.enable_trace();
    core.DWT.enable_cycle_counter();

    debugger::init(LevelFilter::Info);
    info!("init");

    // device specific peripherals
    let device: stm32::Peripherals = cx.device;

    let rcc = device.RCC.constrain();
    let clocks = rcc.cfgr.sysclk(constants::CPU_FREQ.hz()).freeze();

    let gpioa = device.GPIOA.split();
    let gpioe = device.GPIOE.split();

    // LIS3DSH on the discovery board: SCK PA5, MISO PA6, MOSI PA7, CS PE3
    let sck = gpioa.pa5.into_alternate_af5();
    let miso = gpioa.pa6.into_alternate_af5();
    let mosi = gpioa.pa7.into_alternate_af5();
    let cs = gpioe.pe3.into_push_pull_output();

    let (spi1, _pins) = Spi::spi1(device.SPI1, (sck, miso, mosi), MODE_3, 1.mhz().into(), clocks).free();

    let mut spi = Driver::new(F4Spi::new(spi1), ChipSelect::software(cs), Config::default());
    spi.initialize();

    init::LateResources { spi }
  }

  #[task(binds = SPI1, resources = [spi])]
  fn spi1_irq(mut cx: spi1_irq::Context) {
    cx.resources.spi.lock(|spi| spi.on_interrupt());
  }

  // caller context: blocking transfers spin here while SPI1 preempts
  #[idle(resources = [spi])]
  fn idle(cx: idle::Context) -> ! {
    let mut lis = Lis3dsh::new(Bus::new(cx.resources.spi, DwtClock));

    match lis.init() {
      Ok(()) => info!("lis3dsh ready"),
      Err(e) => error!("lis3dsh init failed: {}", e),
    }

    loop {
      let sample = match lis.data_ready() {
        Ok(true) => lis.read_acceleration().map(Some),
        Ok(false) => Ok(None),
        Err(e) => Err(e),
      };

      match sample {
        Ok(Some([x, y, z])) => info!("accel x={} y={} z={}", x, y, z),
        Ok(None) => (),
        Err(e) => {
          let diag = lis.bus_mut().with_driver(|spi| spi.diagnostics());
          warn!("accel read failed: {} ({:?})", e, diag);
        }
      }

      asm::delay(util::convert_us_to_cycles(500_000));
    }
  }
}

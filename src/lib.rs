//! Interrupt-driven SPI master transfers for the STM32F4-Discovery.
//!
//! `spi_drv` holds the transaction engine: the caller starts a transfer and
//! spins on a bounded wait while the peripheral's interrupt moves the bytes
//! and closes the transfer. Everything above the `Registers` trait builds and
//! tests on the host; the F4 adapter and the firmware need `--features stm32f4`.

#![cfg_attr(not(test), no_std)]

pub mod constants;
pub mod lis3dsh;
pub mod spi_drv;
pub mod util;

pub const CPU_FREQ: u32 = 168_000_000;

/// Rate of the monotonic tick source used to bound blocking transfers. On
/// target this is the DWT cycle counter, so one tick is one core cycle.
pub const TICK_HZ: u32 = CPU_FREQ;

pub const SPI_TIMEOUT_MS: u32 = 10;

/// Largest single transfer in either direction, bounded by the staging buffers.
pub const MAX_TRANSFER_LEN: usize = 64;

/// Ring buffer storage, must be a power of two. Index mask is `RX_RING_SIZE - 1`.
pub const RX_RING_SIZE: usize = 256;

// clocked out while only receiving
pub const DUMMY_BYTE: u8 = 0x00;

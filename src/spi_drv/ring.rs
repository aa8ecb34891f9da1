/// Byte ring written from the SPI interrupt and drained by the blocked caller.
///
/// `N` must be a power of two; indices wrap with `N - 1` as the mask. One slot
/// is always left empty so `head == tail` means "empty" on read. A write that
/// lands on `head == tail` has lapped the reader: the oldest byte is dropped
/// and the sticky overrun flag is raised. Writing never blocks and never fails.
pub struct RingBuffer<const N: usize> {
  data: [u8; N],
  head: usize,
  tail: usize,
  overrun: bool,
}

impl<const N: usize> RingBuffer<N> {
  const MASK: usize = {
    assert!(N.is_power_of_two(), "ring size must be a power of two");
    N - 1
  };

  pub const fn new() -> Self {
    RingBuffer {
      data: [0; N],
      head: 0,
      tail: 0,
      overrun: false,
    }
  }

  /// Storage size. At most `capacity() - 1` bytes can be held without loss.
  pub const fn capacity(&self) -> usize {
    N
  }

  pub fn write(&mut self, byte: u8) {
    self.data[self.head] = byte;
    self.head = (self.head + 1) & Self::MASK;

    if self.head == self.tail {
      self.overrun = true;
      self.tail = (self.tail + 1) & Self::MASK;
    }
  }

  /// Copies queued bytes into `dest` oldest first and returns how many were
  /// copied. Bytes that do not fit stay queued.
  pub fn drain(&mut self, dest: &mut [u8]) -> usize {
    let count = self.len().min(dest.len());

    for slot in dest.iter_mut().take(count) {
      *slot = self.data[self.tail];
      self.tail = (self.tail + 1) & Self::MASK;
    }

    count
  }

  pub fn len(&self) -> usize {
    self.head.wrapping_sub(self.tail) & Self::MASK
  }

  pub fn is_empty(&self) -> bool {
    self.head == self.tail
  }

  pub fn overrun(&self) -> bool {
    self.overrun
  }

  pub fn clear_overrun(&mut self) {
    self.overrun = false;
  }

  /// Discards queued bytes. The overrun flag is left for the consumer.
  pub fn clear(&mut self) {
    self.tail = self.head;
  }
}

impl<const N: usize> Default for RingBuffer<N> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip_below_capacity() {
    let mut ring = RingBuffer::<8>::new();
    for b in 1..=7u8 {
      ring.write(b);
    }

    let mut out = [0u8; 8];
    assert_eq!(ring.drain(&mut out), 7);
    assert_eq!(&out[..7], &[1, 2, 3, 4, 5, 6, 7]);
    assert!(!ring.overrun());
    assert!(ring.is_empty());
  }

  #[test]
  fn writing_capacity_bytes_overruns() {
    let mut ring = RingBuffer::<8>::new();
    for b in 0..8u8 {
      ring.write(b);
    }
    assert!(ring.overrun());

    // oldest byte was dropped
    let mut out = [0u8; 8];
    assert_eq!(ring.drain(&mut out), 7);
    assert_eq!(&out[..7], &[1, 2, 3, 4, 5, 6, 7]);
  }

  #[test]
  fn overrun_is_sticky_until_cleared() {
    let mut ring = RingBuffer::<4>::new();
    for b in 0..10u8 {
      ring.write(b);
    }
    let mut out = [0u8; 4];
    ring.drain(&mut out);
    ring.write(0xAA);
    assert!(ring.overrun());

    ring.clear_overrun();
    assert!(!ring.overrun());
  }

  #[test]
  fn drain_empty_returns_zero() {
    let mut ring = RingBuffer::<4>::new();
    let mut out = [0u8; 4];
    assert_eq!(ring.drain(&mut out), 0);
  }

  #[test]
  fn short_destination_leaves_remainder() {
    let mut ring = RingBuffer::<16>::new();
    for b in 10..15u8 {
      ring.write(b);
    }

    let mut out = [0u8; 2];
    assert_eq!(ring.drain(&mut out), 2);
    assert_eq!(out, [10, 11]);
    assert_eq!(ring.len(), 3);

    let mut rest = [0u8; 8];
    assert_eq!(ring.drain(&mut rest), 3);
    assert_eq!(&rest[..3], &[12, 13, 14]);
  }

  #[test]
  fn indices_wrap_across_many_cycles() {
    let mut ring = RingBuffer::<4>::new();
    let mut out = [0u8; 4];
    for round in 0..50u8 {
      ring.write(round);
      ring.write(round.wrapping_add(1));
      assert_eq!(ring.drain(&mut out), 2);
      assert_eq!(&out[..2], &[round, round.wrapping_add(1)]);
    }
    assert!(!ring.overrun());
  }
}

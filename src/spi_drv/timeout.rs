use crate::constants::TICK_HZ;

pub type Instant = fugit::TimerInstantU32<TICK_HZ>;
pub type Duration = fugit::TimerDurationU32<TICK_HZ>;

/// Free-running tick source read by the caller while it waits on a transfer.
/// The counter may wrap; elapsed time is computed with wrapping arithmetic.
pub trait Monotonic {
  fn now(&self) -> Instant;
}

impl<M: Monotonic + ?Sized> Monotonic for &M {
  fn now(&self) -> Instant {
    (**self).now()
  }
}

/// Wall-clock bound on one blocking wait.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
  start: Instant,
  limit: Duration,
}

impl Deadline {
  pub fn start<M: Monotonic>(clock: &M, limit: Duration) -> Self {
    Deadline { start: clock.now(), limit }
  }

  pub fn elapsed(&self, now: Instant) -> Duration {
    Duration::from_ticks(now.ticks().wrapping_sub(self.start.ticks()))
  }

  /// True once strictly more than `limit` has passed.
  pub fn expired(&self, now: Instant) -> bool {
    self.elapsed(now).ticks() > self.limit.ticks()
  }
}

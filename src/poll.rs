//! Sleep-then-recheck waiting.
//!
//! Nothing here blocks on a lock or a condition variable. A waiter looks at
//! shared state, sleeps for `interval`, and looks again, optionally giving up
//! after a fixed number of looks.

use std::{thread, time::Duration};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollStrategy {
  interval: Duration,
  attempts: Option<u32>,
}

/// A bounded wait ran out of attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedOut {
  pub attempts: u32,
}

impl PollStrategy {
  /// Polls forever.
  pub const fn unbounded(interval: Duration) -> PollStrategy {
    PollStrategy { interval, attempts: None }
  }

  /// Polls at most `attempts` times (at least once).
  pub const fn bounded(interval: Duration, attempts: u32) -> PollStrategy {
    PollStrategy { interval, attempts: Some(attempts) }
  }

  pub fn interval(&self) -> Duration { self.interval }

  pub fn attempts(&self) -> Option<u32> { self.attempts }

  pub fn is_bounded(&self) -> bool { self.attempts.is_some() }

  /// Calls `check` until it yields something.
  pub fn wait_for<T>(&self, mut check: impl FnMut() -> Option<T>) -> Result<T, TimedOut> {
    let mut tries = 0u32;
    loop {
      if let Some(found) = check() {
        return Ok(found);
      }
      tries = tries.saturating_add(1);
      if let Some(limit) = self.attempts {
        if tries >= limit {
          return Err(TimedOut { attempts: tries });
        }
      }
      thread::sleep(self.interval);
    }
  }

  pub fn wait_until(&self, mut done: impl FnMut() -> bool) -> Result<(), TimedOut> {
    self.wait_for(|| done().then_some(()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  #[test]
  fn bounded_gives_up_after_its_attempts() {
    let looks = Cell::new(0);
    let poll = PollStrategy::bounded(Duration::from_micros(1), 5);
    let res = poll.wait_until(|| { looks.set(looks.get() + 1); false });
    assert_eq!(res, Err(TimedOut { attempts: 5 }));
    assert_eq!(looks.get(), 5);
  }

  #[test]
  fn returns_as_soon_as_the_check_passes() {
    let looks = Cell::new(0);
    let poll = PollStrategy::unbounded(Duration::from_micros(1));
    let got = poll.wait_for(|| {
      looks.set(looks.get() + 1);
      (looks.get() == 3).then_some("found")
    });
    assert_eq!(got, Ok("found"));
  }

  #[test]
  fn zero_attempts_still_looks_once() {
    let poll = PollStrategy::bounded(Duration::from_secs(60), 0);
    assert_eq!(poll.wait_for(|| Some(1)), Ok(1));
    assert!(poll.wait_until(|| false).is_err());
  }
}

use crate::poll::PollStrategy;
use crate::secret::Seed;
use std::time::Duration;

/// Pins the secret seed.
pub const SEED_ENV: &str = "STACKSTRIDE_SEED";
/// `demo` or `test`.
pub const MODE_ENV: &str = "STACKSTRIDE_MODE";
/// Log level for the binaries.
pub const LOG_ENV: &str = "STACKSTRIDE_LOG";
/// Seed used in test mode when none is given.
pub const TEST_SEED: u64 = 631;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
  /// Unbounded waits and best-effort probing, like the classroom programs.
  Demo,
  /// Every wait is bounded and every probe gap is an error.
  Test,
}

#[derive(Clone, Debug)]
pub struct Config {
  pub mode: Mode,
  pub seed: Seed,
  pub poll_interval: Duration,
  /// Only consulted in test mode.
  pub poll_attempts: u32,
  /// Only consulted in test mode.
  pub join_timeout: Duration,
}

impl Config {
  pub fn demo() -> Config {
    Config {
      mode: Mode::Demo,
      seed: Seed::from_clock(),
      poll_interval: Duration::from_micros(500),
      poll_attempts: u32::MAX,
      join_timeout: Duration::MAX,
    }
  }

  pub fn test(seed: u64) -> Config {
    Config {
      mode: Mode::Test,
      seed: Seed(seed),
      poll_interval: Duration::from_micros(100),
      poll_attempts: 20_000,
      join_timeout: Duration::from_secs(10),
    }
  }

  pub fn for_mode(mode: Mode, seed: Option<u64>) -> Config {
    let mut config = match mode {
      Mode::Demo => Config::demo(),
      Mode::Test => Config::test(TEST_SEED),
    };
    if let Some(seed) = seed {
      config.seed = Seed(seed);
    }
    config
  }

  /// How workers wait for each other.
  pub fn poll(&self) -> PollStrategy {
    match self.mode {
      Mode::Demo => PollStrategy::unbounded(self.poll_interval),
      Mode::Test => PollStrategy::bounded(self.poll_interval, self.poll_attempts),
    }
  }

  /// How the driver waits for a worker to finish. `None` means a plain blocking join.
  pub fn join_poll(&self) -> Option<PollStrategy> {
    match self.mode {
      Mode::Demo => None,
      Mode::Test => {
        let tick = Duration::from_millis(1);
        let attempts = (self.join_timeout.as_millis() / tick.as_millis()).clamp(1, u128::from(u32::MAX));
        Some(PollStrategy::bounded(tick, attempts as u32))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_mode_bounds_everything() {
    let config = Config::test(7);
    assert!(config.poll().is_bounded());
    assert_eq!(config.join_poll().and_then(|p| p.attempts()), Some(10_000));
    assert_eq!(config.seed, Seed(7));
  }

  #[test]
  fn demo_mode_waits_forever() {
    let config = Config::for_mode(Mode::Demo, Some(3));
    assert!(!config.poll().is_bounded());
    assert!(config.join_poll().is_none());
    assert_eq!(config.seed, Seed(3));
  }

  #[test]
  fn test_mode_without_a_seed_is_pinned() {
    assert_eq!(Config::for_mode(Mode::Test, None).seed, Seed(TEST_SEED));
    assert_eq!(Config::for_mode(Mode::Test, Some(9)).seed, Seed(9));
  }
}

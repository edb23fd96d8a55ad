//! Reaching into a sibling's stack without being told where it is.
//!
//! Threads created back to back get stacks a fixed distance apart, so a
//! thread that knows that distance can find a sibling's locals from the
//! address of one of its own. The victim keeps a secret and waits; the
//! guesser adds the offset to the address of its anchor local, peeks at
//! whatever is there, writes over it, and raises the flag.
//!
//! The offset is never checked. A wrong guess reads or writes unrelated
//! memory, or takes the process down.

use crate::config::{Config, Mode};
use crate::driver::Driver;
use crate::error::Error;
use crate::foreign;
use crate::poll::PollStrategy;
use crate::publish::{Address, Publication, ReadyFlag};
use crate::secret::{Secret, Seed, OVERWRITE};
use std::hint::black_box;
use std::num::NonZeroIsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Size of the victim's secret buffer.
pub const GUESS_SECRET_SIZE: usize = 16;
pub const VICTIM: usize = 0;
pub const GUESSER: usize = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuessMode {
  /// Touch nothing; just report how far apart the two frames were.
  Calibrate,
  /// Read and overwrite whatever sits at anchor + offset.
  Strike(NonZeroIsize),
}

#[derive(Clone, Debug)]
pub struct GuessConfig {
  pub seed: Seed,
  pub poll: PollStrategy,
  /// How long the guesser waits between peeking and writing.
  pub delay: Duration,
}

impl GuessConfig {
  pub fn new(config: &Config) -> GuessConfig {
    let delay = match config.mode {
      Mode::Demo => Duration::from_micros(500),
      Mode::Test => Duration::from_micros(50),
    };
    GuessConfig { seed: config.seed, poll: config.poll(), delay }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VictimReport {
  pub address: Address,
  pub initial: Secret,
  pub final_secret: Secret,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuesserReport {
  pub anchor: Address,
  /// Where the guesser went looking. `None` when calibrating.
  pub guessed: Option<Address>,
  /// What it found there before writing.
  pub observed: Option<Secret>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuessReport {
  pub mode: GuessMode,
  pub victim: VictimReport,
  pub guesser: GuesserReport,
}

impl GuessReport {
  /// The offset that would have been right this time.
  pub fn observed_offset(&self) -> isize {
    self.victim.address.offset_from(self.guesser.anchor)
  }

  pub fn hit(&self) -> bool {
    self.guesser.guessed == Some(self.victim.address)
  }

  pub fn overwritten(&self) -> bool {
    self.victim.final_secret.as_str() == OVERWRITE && self.victim.initial.as_str() != OVERWRITE
  }
}

/// Parses the guesser's offset argument. Zero is refused: it would mean
/// "write to my own anchor", and it is what a garbled number parses to.
pub fn parse_offset(raw: Option<&str>) -> Result<NonZeroIsize, Error> {
  let raw = raw.ok_or(Error::MissingArgument("offset"))?;
  raw
    .trim()
    .parse::<isize>()
    .ok()
    .and_then(NonZeroIsize::new)
    .ok_or_else(|| Error::InvalidOffset(raw.to_owned()))
}

#[inline(never)]
fn victim(ready: &ReadyFlag, config: &GuessConfig) -> Result<VictimReport, Error> {
  let mut buf = [0u8; GUESS_SECRET_SIZE];
  let initial = Secret::random(&mut config.seed.for_thread(VICTIM));
  initial.store(&mut buf);
  let address = Address::of(black_box(buf.as_mut_ptr()) as *const u8);
  info!(%address, secret = %initial, "victim waiting");

  config
    .poll
    .wait_until(|| ready.is_raised(Publication::Racy))
    .map_err(|t| Error::PeerNeverPublished { index: VICTIM, peer: GUESSER, attempts: t.attempts })?;

  let final_secret = Secret::from_bytes(&unsafe { foreign::read(address, GUESS_SECRET_SIZE) });
  black_box(&mut buf);
  Ok(VictimReport { address, initial, final_secret })
}

#[inline(never)]
fn guesser(mode: GuessMode, ready: &ReadyFlag, config: &GuessConfig) -> GuesserReport {
  let marker = 0u8;
  let anchor = black_box(&marker) as *const u8;
  let mut report = GuesserReport { anchor: Address::of(anchor), guessed: None, observed: None };

  if let GuessMode::Strike(offset) = mode {
    let target = foreign::guess(anchor, offset.get());
    debug!(anchor = %report.anchor, %target, offset = offset.get(), "guessing");
    // Anything can be at `target`. If it isn't mapped, this is where we die.
    let observed = Secret::from_bytes(&unsafe { foreign::read(target, GUESS_SECRET_SIZE) });
    thread::sleep(config.delay);
    unsafe { foreign::write(target, &Secret::literal(OVERWRITE).encode(GUESS_SECRET_SIZE)) };
    info!(%target, found = %observed, "wrote over the guess");
    report.guessed = Some(target);
    report.observed = Some(observed);
  } else {
    thread::sleep(config.delay);
  }

  ready.raise(Publication::Racy);
  report
}

/// Spawns the victim, then the guesser, and joins both.
pub fn run(driver: &Driver, mode: GuessMode, config: &GuessConfig) -> Result<GuessReport, Error> {
  let ready = Arc::new(ReadyFlag::new());
  let victim_worker = {
    let (ready, config) = (Arc::clone(&ready), config.clone());
    driver.spawn(VICTIM, move || victim(&ready, &config))?
  };
  let guesser_worker = {
    let (ready, config) = (Arc::clone(&ready), config.clone());
    driver.spawn(GUESSER, move || Ok(guesser(mode, &ready, &config)))?
  };
  let victim = driver.join(victim_worker)?;
  let guesser = driver.join(guesser_worker)?;
  let report = GuessReport { mode, victim, guesser };
  if let GuessMode::Strike(_) = mode {
    if !report.hit() {
      warn!(observed = report.observed_offset(), "guess missed the victim's buffer");
    }
  }
  Ok(report)
}

//! Spawning, joining, and the stride run.

use crate::config::{Config, Mode};
use crate::error::Error;
use crate::poll::PollStrategy;
use crate::publish::Address;
use crate::stack::{self, OsProbe, StackDescriptor};
use std::any::Any;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Spawns workers fresh for every run and waits for all of them.
#[derive(Clone, Debug)]
pub struct Driver {
  mode: Mode,
  join: Option<PollStrategy>,
}

/// A spawned worker that has not been joined yet.
pub struct Worker<T> {
  index: usize,
  handle: JoinHandle<Result<T, Error>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrideSample {
  pub index: usize,
  pub descriptor: StackDescriptor,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrideReport {
  /// One per thread, in index order.
  pub samples: Vec<StrideSample>,
  /// `deltas[i - 1]` is thread `i - 1`'s address minus thread `i`'s.
  pub deltas: Vec<isize>,
}

impl Driver {
  pub fn new(config: &Config) -> Driver {
    Driver { mode: config.mode, join: config.join_poll() }
  }

  pub fn spawn<T, F>(&self, index: usize, work: F) -> Result<Worker<T>, Error>
  where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
  {
    let handle = thread::Builder::new()
      .name(format!("worker-{}", index))
      .spawn(work)
      .map_err(|source| Error::SpawnFailure { index, source })?;
    debug!(index, "spawned worker");
    Ok(Worker { index, handle })
  }

  /// Waits for one worker and hands back whatever it returned.
  ///
  /// In test mode the wait is bounded. A worker that overstays is left
  /// running (there is no safe way to stop it) and reported as a failure.
  pub fn join<T>(&self, worker: Worker<T>) -> Result<T, Error> {
    let Worker { index, handle } = worker;
    if let Some(poll) = self.join {
      poll.wait_until(|| handle.is_finished()).map_err(|timeout| Error::JoinFailure {
        index,
        reason: format!("still running after {} polls", timeout.attempts),
      })?;
    }
    match handle.join() {
      Ok(result) => result,
      Err(panic) => Err(Error::JoinFailure { index, reason: panic_message(&*panic) }),
    }
  }

  /// Joins in index order; the first failure ends the run.
  pub fn join_all<T>(&self, workers: Vec<Worker<T>>) -> Result<Vec<T>, Error> {
    workers.into_iter().map(|w| self.join(w)).collect()
  }

  /// Spawns `thread_count` probing threads and works out how far apart their
  /// stacks ended up.
  pub fn run(&self, thread_count: usize) -> Result<StrideReport, Error> {
    check_thread_count(thread_count)?;
    let mode = self.mode;
    let workers = (0..thread_count)
      .map(|index| self.spawn(index, move || stride_worker(index, mode)))
      .collect::<Result<Vec<_>, _>>()?;
    let samples = self.join_all(workers)?;
    let addresses: Vec<Address> = samples.iter().map(|s| s.descriptor.local).collect();
    Ok(StrideReport { deltas: deltas(&addresses), samples })
  }
}

/// A stride run needs at least one thread.
pub fn check_thread_count(thread_count: usize) -> Result<usize, Error> {
  match thread_count {
    0 => Err(Error::InvalidThreadCount(thread_count.to_string())),
    n => Ok(n),
  }
}

fn stride_worker(index: usize, mode: Mode) -> Result<StrideSample, Error> {
  let descriptor = stack::probe_in(mode, &OsProbe)?;
  info!(index, address = %descriptor.local, stack_size = descriptor.stack_size, "thread reporting in");
  Ok(StrideSample { index, descriptor })
}

/// `addresses[i - 1] - addresses[i]` for every consecutive pair.
pub fn deltas(addresses: &[Address]) -> Vec<isize> {
  addresses.windows(2).map(|pair| pair[0].offset_from(pair[1])).collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(msg) = panic.downcast_ref::<&str>() {
    format!("panicked: {}", msg)
  } else if let Some(msg) = panic.downcast_ref::<String>() {
    format!("panicked: {}", msg)
  } else {
    "panicked".to_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deltas_are_exact_differences() {
    let addrs = [0x7000_0000, 0x6f00_0000, 0x6f80_0000].map(Address::from_usize);
    assert_eq!(deltas(&addrs), vec![0x0100_0000, -0x0080_0000]);
    assert!(deltas(&addrs[..1]).is_empty());
    assert!(deltas(&[]).is_empty());
  }

  #[test]
  fn panics_become_join_failures() {
    let driver = Driver::new(&Config::test(1));
    let worker = driver.spawn(4, || -> Result<(), Error> { panic!("boom") }).unwrap();
    match driver.join(worker) {
      Err(Error::JoinFailure { index: 4, reason }) => assert!(reason.contains("boom")),
      other => panic!("expected a join failure, got {:?}", other),
    }
  }
}

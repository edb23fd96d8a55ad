//! Two threads that know where each other's stacks are.
//!
//! Each thread keeps a secret in a buffer on its own stack, publishes the
//! buffer's address, waits for the other's, and then reads it straight out
//! of the other thread's frame. The leader (index 0) goes one step further:
//! once the follower says it is done, the leader overwrites the follower's
//! secret in place.
//!
//! Nothing guards the buffers. The table and flags only guarantee that an
//! address becomes visible eventually.

use crate::config::{Config, Mode};
use crate::driver::Driver;
use crate::error::Error;
use crate::foreign;
use crate::poll::PollStrategy;
use crate::publish::{Address, AddressTable, Publication, ReadyFlag};
use crate::secret::{Secret, Seed, OVERWRITE};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Size of each thread's secret buffer.
pub const SECRET_SIZE: usize = 64;
pub const LEADER: usize = 0;
pub const FOLLOWER: usize = 1;
const PARTIES: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffState {
  Init,
  WroteLocalSecret,
  Published,
  WaitingForPeer,
  ReadPeer,
  /// Leader only.
  MutatedPeer,
  /// Follower only.
  SetReady,
  Done,
}

/// What the follower does between raising the flag and reading its own
/// buffer one last time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Linger {
  /// Sleep and hope the leader got there first.
  Sleep(Duration),
  /// Wait for the leader to say it has written.
  AwaitOverwrite,
}

#[derive(Clone, Debug)]
pub struct HandoffConfig {
  pub seed: Seed,
  pub publication: Publication,
  pub poll: PollStrategy,
  /// Pause either side of writing the secret.
  pub settle: Duration,
  pub linger: Linger,
}

impl HandoffConfig {
  pub fn new(config: &Config) -> HandoffConfig {
    match config.mode {
      Mode::Demo => HandoffConfig {
        seed: config.seed,
        publication: Publication::Racy,
        poll: config.poll(),
        settle: Duration::from_micros(500),
        linger: Linger::Sleep(Duration::from_micros(750)),
      },
      Mode::Test => HandoffConfig {
        seed: config.seed,
        publication: Publication::Atomic,
        poll: config.poll(),
        settle: Duration::from_micros(50),
        linger: Linger::AwaitOverwrite,
      },
    }
  }
}

/// The state both threads share.
#[derive(Debug)]
pub struct Handoff {
  table: AddressTable,
  ready: ReadyFlag,
  overwritten: ReadyFlag,
}

impl Default for Handoff {
  fn default() -> Self { Handoff::new() }
}

impl Handoff {
  pub fn new() -> Handoff {
    Handoff { table: AddressTable::new(PARTIES), ready: ReadyFlag::new(), overwritten: ReadyFlag::new() }
  }

  pub fn table(&self) -> &AddressTable { &self.table }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoffReport {
  pub index: usize,
  pub address: Address,
  pub peer_address: Address,
  pub initial: Secret,
  /// The peer's secret as read out of its frame.
  pub observed_peer: Secret,
  /// This thread's own buffer after everything is over.
  pub final_secret: Secret,
  pub trace: Vec<HandoffState>,
}

struct Tracker {
  index: usize,
  states: Vec<HandoffState>,
}

impl Tracker {
  fn enter(&mut self, state: HandoffState) {
    debug!(index = self.index, ?state, "handoff");
    self.states.push(state);
  }
}

/// Runs one side of the handoff on the calling thread. `index` must be
/// [`LEADER`] or [`FOLLOWER`].
#[inline(never)]
pub fn run_worker(index: usize, handoff: &Handoff, config: &HandoffConfig) -> Result<HandoffReport, Error> {
  if index >= PARTIES {
    return Err(Error::NoSuchParty(index));
  }
  let peer = PARTIES - 1 - index;
  let mut track = Tracker { index, states: Vec::new() };
  track.enter(HandoffState::Init);
  let mut buf = [0u8; SECRET_SIZE];

  thread::sleep(config.settle);
  let initial = Secret::random(&mut config.seed.for_thread(index));
  initial.store(&mut buf);
  let address = Address::of(black_box(buf.as_mut_ptr()) as *const u8);
  track.enter(HandoffState::WroteLocalSecret);

  handoff.table.publish_with(config.publication, index, address);
  track.enter(HandoffState::Published);
  thread::sleep(config.settle);

  track.enter(HandoffState::WaitingForPeer);
  let peer_address = config
    .poll
    .wait_for(|| handoff.table.read_with(config.publication, peer))
    .map_err(|t| Error::PeerNeverPublished { index, peer, attempts: t.attempts })?;

  // The peer is still inside its own run_worker until we let it go.
  let observed_peer = Secret::from_bytes(&unsafe { foreign::read(peer_address, SECRET_SIZE) });
  info!(index, peer, %peer_address, secret = %observed_peer, "read peer's secret");
  track.enter(HandoffState::ReadPeer);

  if index == LEADER {
    config
      .poll
      .wait_until(|| handoff.ready.is_raised(config.publication))
      .map_err(|t| Error::PeerNeverPublished { index, peer, attempts: t.attempts })?;
    // The follower lingers after raising the flag; that is all that keeps
    // this write from landing in a dead frame.
    unsafe { foreign::write(peer_address, &Secret::literal(OVERWRITE).encode(SECRET_SIZE)) };
    handoff.overwritten.raise(config.publication);
    info!(index, peer, "overwrote peer's secret");
    track.enter(HandoffState::MutatedPeer);
  } else {
    thread::sleep(config.settle);
    handoff.ready.raise(config.publication);
    track.enter(HandoffState::SetReady);
    match config.linger {
      Linger::Sleep(pause) => thread::sleep(pause),
      Linger::AwaitOverwrite => config
        .poll
        .wait_until(|| handoff.overwritten.is_raised(config.publication))
        .map_err(|t| Error::PeerNeverPublished { index, peer, attempts: t.attempts })?,
    }
  }

  let final_secret = Secret::from_bytes(&unsafe { foreign::read(address, SECRET_SIZE) });
  track.enter(HandoffState::Done);
  black_box(&mut buf);
  Ok(HandoffReport { index, address, peer_address, initial, observed_peer, final_secret, trace: track.states })
}

/// Runs the leader and the follower on fresh threads and returns their
/// reports in index order.
pub fn peek(driver: &Driver, config: &HandoffConfig) -> Result<Vec<HandoffReport>, Error> {
  let handoff = Arc::new(Handoff::new());
  let workers = (0..PARTIES)
    .map(|index| {
      let (handoff, config) = (Arc::clone(&handoff), config.clone());
      driver.spawn(index, move || run_worker(index, &handoff, &config))
    })
    .collect::<Result<Vec<_>, _>>()?;
  driver.join_all(workers)
}

//! Where is this thread's stack, and how big is it?
//!
//! There is no portable way to ask for the top of the current stack, so the
//! "address" of a stack is the address of a local inside [`probe_in`]. Sizes
//! come from the OS, one implementation per platform; a platform we don't
//! know how to ask reports [`Error::UnsupportedPlatform`] instead of failing
//! to build.

use crate::config::Mode;
use crate::error::Error;
use crate::publish::Address;
use std::hint::black_box;
use tracing::{debug, warn};

#[cfg(unix)]
mod os_unix;
#[cfg(unix)]
pub use os_unix::*;

#[cfg(not(unix))]
mod os_other;
#[cfg(not(unix))]
pub use os_other::*;

/// The questions we know how to ask about stacks.
pub trait StackProbe {
  /// Size of the calling thread's stack.
  fn stack_size(&self) -> Result<usize, Error>;
  /// Guard size a new thread gets from default attributes. Zero means guard
  /// pages are off, which is allowed.
  fn guard_size(&self) -> Result<usize, Error>;
  /// The process stack resource limit, `None` when unlimited.
  fn stack_limit(&self) -> Result<Option<usize>, Error>;
  fn page_size(&self) -> Result<PageSize, Error>;
}

/// What one thread learnt about its own stack. Never changes once made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackDescriptor {
  /// A local in the probe's frame; a stand-in for the stack pointer.
  pub local: Address,
  pub stack_size: usize,
  pub guard_size: usize,
}

/// Process-wide stack facts, as printed before any thread is spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessStack {
  pub guard_size: usize,
  pub stack_limit: Option<usize>,
  pub page_size: Option<PageSize>,
}

#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A value holding the operating system's standard pagesize (probably 4k).
pub struct PageSize(usize);

impl PageSize {
  pub fn new(size: usize) -> PageSize { PageSize(size.max(1)) }
  pub fn get() -> Result<PageSize, Error> { OsProbe.page_size() }
  pub fn size(self) -> usize { self.0 }
  /// How many pages `bytes` covers, rounding up.
  pub fn pages(self, bytes: usize) -> usize { bytes.div_ceil(self.0) }
}

/// Probes the calling thread, treating any missing query as an error.
pub fn probe() -> Result<StackDescriptor, Error> {
  probe_in(Mode::Test, &OsProbe)
}

/// Probes the calling thread.
///
/// In demo mode an unsupported query is logged and reported as `0`; in test
/// mode it is an error. OS errors are always errors.
#[inline(never)]
pub fn probe_in(mode: Mode, probe: &impl StackProbe) -> Result<StackDescriptor, Error> {
  let marker = 0u8;
  let local = Address::of(black_box(&marker) as *const u8);
  let stack_size = tolerate(mode, probe.stack_size(), 0)?;
  let guard_size = tolerate(mode, probe.guard_size(), 0)?;
  debug!(%local, stack_size, guard_size, "probed stack");
  Ok(StackDescriptor { local, stack_size, guard_size })
}

pub fn process_stack(mode: Mode, probe: &impl StackProbe) -> Result<ProcessStack, Error> {
  Ok(ProcessStack {
    guard_size: tolerate(mode, probe.guard_size(), 0)?,
    stack_limit: tolerate(mode, probe.stack_limit(), None)?,
    page_size: tolerate(mode, probe.page_size().map(Some), None)?,
  })
}

fn tolerate<T>(mode: Mode, answer: Result<T, Error>, unknown: T) -> Result<T, Error> {
  match (mode, answer) {
    (Mode::Demo, Err(Error::UnsupportedPlatform(query))) => {
      warn!(query, "stack query unsupported here, reporting it as unknown");
      Ok(unknown)
    }
    (_, answer) => answer,
  }
}

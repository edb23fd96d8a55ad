use super::{PageSize, StackProbe};
use crate::error::Error;
use crate::publish::Address;

/// Knows nothing; every query reports the platform as unsupported.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsProbe;

impl StackProbe for OsProbe {
  fn stack_size(&self) -> Result<usize, Error> { Err(Error::UnsupportedPlatform("thread stack size")) }
  fn guard_size(&self) -> Result<usize, Error> { Err(Error::UnsupportedPlatform("guard size")) }
  fn stack_limit(&self) -> Result<Option<usize>, Error> { Err(Error::UnsupportedPlatform("stack limit")) }
  fn page_size(&self) -> Result<PageSize, Error> { Err(Error::UnsupportedPlatform("page size")) }
}

pub fn environment() -> Option<Address> { None }

use std::{fmt, io};

/// Exit code for usage errors (`EX_USAGE`).
pub const EXIT_USAGE: u8 = 64;
/// Exit code for a stack query this platform cannot answer (`EX_UNAVAILABLE`).
pub const EXIT_UNSUPPORTED: u8 = 69;
/// Exit code for thread creation, join, and role failures (`EX_SOFTWARE`).
pub const EXIT_THREAD: u8 = 70;
/// Exit code for a stack query the OS refused (`EX_OSERR`).
pub const EXIT_PROBE: u8 = 71;
/// Exit code for a peer that never published or signalled (`EX_TEMPFAIL`).
pub const EXIT_PEER: u8 = 75;

#[derive(Debug)]
pub enum Error {
  /// The named stack query does not exist on this platform.
  UnsupportedPlatform(&'static str),
  /// The named stack query exists but the OS said no.
  ProbeFailed { query: &'static str, source: io::Error },
  SpawnFailure { index: usize, source: io::Error },
  JoinFailure { index: usize, reason: String },
  /// A worker was handed an index with no role in a two-party exchange.
  NoSuchParty(usize),
  /// A bounded wait ran out before `peer` published (or signalled) to `index`.
  PeerNeverPublished { index: usize, peer: usize, attempts: u32 },
  InvalidOffset(String),
  MissingArgument(&'static str),
  InvalidThreadCount(String),
}

impl Error {
  /// Stable process exit code for this category of failure.
  pub fn exit_code(&self) -> u8 {
    match self {
      Error::UnsupportedPlatform(_) => EXIT_UNSUPPORTED,
      Error::ProbeFailed { .. } => EXIT_PROBE,
      Error::SpawnFailure { .. } | Error::JoinFailure { .. } | Error::NoSuchParty(_) => EXIT_THREAD,
      Error::PeerNeverPublished { .. } => EXIT_PEER,
      Error::InvalidOffset(_) | Error::MissingArgument(_) | Error::InvalidThreadCount(_) => EXIT_USAGE,
    }
  }

  pub fn is_usage(&self) -> bool { self.exit_code() == EXIT_USAGE }

  pub(crate) fn probe(query: &'static str, code: i32) -> Error {
    Error::ProbeFailed { query, source: io::Error::from_raw_os_error(code) }
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Error::UnsupportedPlatform(query) => write!(f, "{} is not available on this platform", query),
      Error::ProbeFailed { query, source } => write!(f, "{}: {}", query, source),
      Error::SpawnFailure { index, source } => write!(f, "could not spawn thread {}: {}", index, source),
      Error::JoinFailure { index, reason } => write!(f, "could not join thread {}: {}", index, reason),
      Error::NoSuchParty(index) => write!(f, "thread {} has no part in a two-party exchange", index),
      Error::PeerNeverPublished { index, peer, attempts } =>
        write!(f, "thread {} gave up on thread {} after {} polls", index, peer, attempts),
      Error::InvalidOffset(raw) => write!(f, "Invalid offset: {:?}", raw),
      Error::MissingArgument(name) => write!(f, "missing required argument <{}>", name),
      Error::InvalidThreadCount(raw) => write!(f, "Invalid thread count: {:?}", raw),
    }
  }
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Error::ProbeFailed { source, .. } | Error::SpawnFailure { source, .. } => Some(source),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn usage_errors_share_a_code() {
    assert_eq!(Error::InvalidOffset("0".into()).exit_code(), EXIT_USAGE);
    assert_eq!(Error::MissingArgument("offset").exit_code(), EXIT_USAGE);
    assert!(Error::InvalidThreadCount("0".into()).is_usage());
    assert!(!Error::UnsupportedPlatform("pthread_getattr_np").is_usage());
  }

  #[test]
  fn probe_failures_carry_the_os_error() {
    let err = Error::probe("pthread_attr_getguardsize", 22);
    assert_eq!(err.exit_code(), EXIT_PROBE);
    assert!(std::error::Error::source(&err).is_some());
    assert!(err.to_string().starts_with("pthread_attr_getguardsize: "));
  }
}

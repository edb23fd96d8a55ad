//! The "secrets" threads keep in their stack buffers.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// What every run overwrites a peer's secret with.
pub const OVERWRITE: &str = "1111111111";

/// Base seed for a run. Thread `i` draws from `seed + i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seed(pub u64);

impl Seed {
  /// Wall clock seconds plus our pid. Two runs in the same second can still
  /// collide if the pid gets reused.
  pub fn from_clock() -> Seed {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    Seed(secs.wrapping_add(u64::from(std::process::id())))
  }

  pub fn for_thread(self, index: usize) -> Pcg64Mcg {
    Pcg64Mcg::seed_from_u64(self.0.wrapping_add(index as u64))
  }
}

/// A C string's worth of text, as it sits in some thread's buffer.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
  /// A non-negative 31-bit number in decimal.
  pub fn random(rng: &mut impl Rng) -> Secret {
    Secret(rng.gen_range(0..=i32::MAX).to_string())
  }

  pub fn literal(text: &str) -> Secret { Secret(text.to_owned()) }

  /// Everything up to the first NUL (or the whole slice if there is none).
  pub fn from_bytes(bytes: &[u8]) -> Secret {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    Secret(String::from_utf8_lossy(&bytes[..end]).into_owned())
  }

  /// The bytes that would land in a `len`-byte buffer: truncated to
  /// `len - 1` and NUL terminated. Empty if `len` is zero.
  pub fn encode(&self, len: usize) -> Vec<u8> {
    if len == 0 {
      return Vec::new();
    }
    let text = self.0.as_bytes();
    let keep = text.len().min(len - 1);
    let mut out = Vec::with_capacity(keep + 1);
    out.extend_from_slice(&text[..keep]);
    out.push(0);
    out
  }

  /// Writes into `buf` the way `snprintf` would.
  pub fn store(&self, buf: &mut [u8]) {
    let bytes = self.encode(buf.len());
    buf[..bytes.len()].copy_from_slice(&bytes);
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "Secret({:?})", self.0) }
}

impl fmt::Display for Secret {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(&self.0) }
}

/// The first secret thread `index` draws under `seed`.
pub fn secret_for(seed: Seed, index: usize) -> Secret {
  Secret::random(&mut seed.for_thread(index))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_truncates_like_snprintf() {
    let mut buf = [0xffu8; 4];
    Secret::literal("123456").store(&mut buf);
    assert_eq!(&buf, b"123\0");
    assert_eq!(Secret::from_bytes(&buf).as_str(), "123");
  }

  #[test]
  fn from_bytes_stops_at_nul() {
    assert_eq!(Secret::from_bytes(b"42\0junk").as_str(), "42");
    assert_eq!(Secret::from_bytes(b"no nul").as_str(), "no nul");
  }

  #[test]
  fn seeded_secrets_repeat() {
    let seed = Seed(631);
    assert_eq!(secret_for(seed, 0), secret_for(seed, 0));
    assert_ne!(secret_for(seed, 0), secret_for(seed, 1));
    let n: i64 = secret_for(seed, 1).as_str().parse().unwrap();
    assert!((0..=i64::from(i32::MAX)).contains(&n));
  }
}

//! Unchecked access to memory owned by another thread.
//!
//! This is the only place in the crate that dereferences an address it got
//! from someone else. Every byte goes through a volatile access, so the
//! compiler can neither cache a buffer another thread is scribbling on nor
//! drop a write it thinks nobody reads.

use crate::publish::Address;
use std::ptr;

/// Copies `len` bytes starting at `addr`.
///
/// # Safety
///
/// * `addr..addr + len` must be mapped and readable for the whole call.
/// * Nothing stops the owner from writing concurrently. The bytes you get
///   back may be torn; that is the point.
pub unsafe fn read(addr: Address, len: usize) -> Vec<u8> {
  let src = addr.as_ptr() as *const u8;
  (0..len).map(|i| unsafe { ptr::read_volatile(src.wrapping_add(i)) }).collect()
}

/// Writes `bytes` starting at `addr`.
///
/// # Safety
///
/// * `addr..addr + bytes.len()` must be mapped and writable.
/// * Whoever owns that memory gets no say and no warning.
pub unsafe fn write(addr: Address, bytes: &[u8]) {
  let dst = addr.as_ptr();
  for (i, byte) in bytes.iter().enumerate() {
    unsafe { ptr::write_volatile(dst.wrapping_add(i), *byte) }
  }
}

/// `anchor + offset`, with no check of any kind.
pub fn guess<T>(anchor: *const T, offset: isize) -> Address {
  Address::of(anchor.cast::<u8>().wrapping_offset(offset))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_and_writes_through_a_bare_address() {
    let mut buf = [0u8; 8];
    let addr = Address::of(buf.as_mut_ptr() as *const u8);
    unsafe { write(addr, b"abc") };
    assert_eq!(unsafe { read(addr, 4) }, b"abc\0");
  }

  #[test]
  fn guessing_is_plain_arithmetic() {
    let buf = [0u8; 32];
    let anchor = buf.as_ptr();
    assert_eq!(guess(anchor, 16).offset_from(Address::of(anchor)), 16);
    assert_eq!(guess(anchor, -8).offset_from(Address::of(anchor)), -8);
  }
}

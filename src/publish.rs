//! The publish table and the ready flag.
//!
//! Each slot has exactly one writer, the thread whose index it is. Readers
//! may look at any slot at any time; a slot that reads as zero has not been
//! published yet.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A bare machine address.
///
/// This is not a pointer to anything we own. Once the publishing thread has
/// moved on (or exited) it may point at garbage.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(usize);

impl Address {
  pub const NULL: Address = Address(0);

  pub fn of<T>(ptr: *const T) -> Address { Address(ptr as usize) }

  pub fn from_usize(raw: usize) -> Address { Address(raw) }

  pub fn get(self) -> usize { self.0 }

  pub fn is_null(self) -> bool { self.0 == 0 }

  pub fn as_ptr(self) -> *mut u8 { self.0 as *mut u8 }

  /// `self - other` in bytes. Wraps rather than panicking.
  pub fn offset_from(self, other: Address) -> isize {
    self.0.wrapping_sub(other.0) as isize
  }
}

impl fmt::Debug for Address {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "Address({:#x})", self.0) }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{:#x}", self.0) }
}

/// How a store is made visible to other threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publication {
  /// Plain store; readers see it whenever they happen to.
  Racy,
  /// Release store paired with acquire loads.
  Atomic,
}

impl Publication {
  fn store(self) -> Ordering {
    match self { Publication::Racy => Ordering::Relaxed, Publication::Atomic => Ordering::Release }
  }
  fn load(self) -> Ordering {
    match self { Publication::Racy => Ordering::Relaxed, Publication::Atomic => Ordering::Acquire }
  }
}

/// Fixed-length table of published addresses, indexed by thread index.
pub struct AddressTable {
  slots: Box<[AtomicUsize]>,
}

impl AddressTable {
  pub fn new(len: usize) -> AddressTable {
    AddressTable { slots: (0..len).map(|_| AtomicUsize::new(0)).collect() }
  }

  pub fn len(&self) -> usize { self.slots.len() }

  pub fn is_empty(&self) -> bool { self.slots.is_empty() }

  /// Stores `address` with no ordering guarantee at all.
  ///
  /// Panics if `index` is out of range.
  pub fn publish(&self, index: usize, address: Address) {
    self.publish_with(Publication::Racy, index, address)
  }

  /// Stores `address` so that a later [`read_atomic`](Self::read_atomic)
  /// which observes it also observes everything written before it.
  pub fn publish_atomic(&self, index: usize, address: Address) {
    self.publish_with(Publication::Atomic, index, address)
  }

  pub fn publish_with(&self, publication: Publication, index: usize, address: Address) {
    self.slots[index].store(address.get(), publication.store())
  }

  /// `None` until the slot's owner has published.
  pub fn read(&self, index: usize) -> Option<Address> {
    self.read_with(Publication::Racy, index)
  }

  pub fn read_atomic(&self, index: usize) -> Option<Address> {
    self.read_with(Publication::Atomic, index)
  }

  pub fn read_with(&self, publication: Publication, index: usize) -> Option<Address> {
    match self.slots[index].load(publication.load()) {
      0 => None,
      raw => Some(Address(raw)),
    }
  }
}

impl fmt::Debug for AddressTable {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let slots: Vec<_> = (0..self.len()).map(|i| self.read(i)).collect();
    f.debug_struct("AddressTable").field("slots", &slots).finish()
  }
}

/// A one-shot "I'm done" signal. Raised once, polled by everyone else.
#[derive(Debug, Default)]
pub struct ReadyFlag(AtomicBool);

impl ReadyFlag {
  pub fn new() -> ReadyFlag { ReadyFlag(AtomicBool::new(false)) }

  pub fn raise(&self, publication: Publication) { self.0.store(true, publication.store()) }

  pub fn is_raised(&self, publication: Publication) -> bool { self.0.load(publication.load()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn offsets_are_signed() {
    let low = Address::from_usize(0x1000);
    let high = Address::from_usize(0x3000);
    assert_eq!(high.offset_from(low), 0x2000);
    assert_eq!(low.offset_from(high), -0x2000);
  }

  #[test]
  fn addresses_print_in_hex() {
    assert_eq!(Address::from_usize(0xbeef).to_string(), "0xbeef");
  }
}

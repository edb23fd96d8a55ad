//! Finding thread stacks, and reaching into them.
//!
//! Every thread in a process shares one address space, so a thread that
//! knows (or guesses) where a sibling's stack is can read and write the
//! sibling's locals. This crate measures where stacks land ([`stack`],
//! [`driver`]), lets threads announce their buffers to each other
//! ([`publish`], [`handoff`]), and shows that the announcement isn't even
//! needed when the layout is predictable ([`guess`]).
//!
//! The unsafety is real and confined to [`foreign`].

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod foreign;
pub mod guess;
pub mod handoff;
pub mod poll;
pub mod publish;
pub mod secret;
pub mod stack;

pub use config::{Config, Mode};
pub use driver::Driver;
pub use error::Error;
pub use publish::{Address, AddressTable, Publication, ReadyFlag};
pub use stack::{probe, StackDescriptor};

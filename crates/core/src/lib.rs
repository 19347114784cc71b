//! Domain types for the cutout editing client.
//!
//! Everything in this crate is pure data and validation: edit options and
//! their reducer, uploaded asset identities, export job bookkeeping, and
//! the compare-view divider. No I/O happens here.

pub mod asset;
pub mod compare;
pub mod error;
pub mod job;
pub mod options;

//! Test doubles.
//!
//! The in-memory store client lives in [`crate::stores::memory`] because it
//! is a usable backend on its own; this module holds what only tests need.

pub mod clock;

pub use clock::FixedClock;

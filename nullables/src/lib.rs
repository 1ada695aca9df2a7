//! Nullable infrastructure for deterministic testing.
//!
//! External inputs are abstracted behind traits in `drawtree-types`; this
//! crate provides controllable implementations that never read the real
//! environment. Swap them in for the real ones in tests.

pub mod clock;

pub use clock::NullClock;

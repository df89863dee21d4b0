//! Deterministic random number generation
//!
//! Uses xorshift64* for a fast, seedable stream.
//! CRITICAL: Every random draw made by the scheduler, by timing functions and
//! by actions goes through one `RngManager`. There are no per-agent streams.

mod xorshift;

pub use xorshift::RngManager;
